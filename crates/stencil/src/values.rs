use std::{cmp::Ordering, fmt};

use serde_json::{Number, Value};

use crate::ExecErrorKind;

/// A value flowing through template evaluation.
///
/// Lookups into the data borrow from it; function results are owned.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Datum<'v> {
    /// Result of a missing key lookup in [`MissingKey::Default`](crate::MissingKey::Default) mode.
    NoValue,
    Ref(&'v Value),
    Owned(Value),
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Key<'k> {
    Field(&'k str),
    Index(&'k Value),
}

impl Key<'_> {
    /// The key as reported in missing key errors.
    pub(crate) fn name(&self) -> String {
        match self {
            Self::Field(name) => (*name).to_owned(),
            Self::Index(Value::String(name)) => name.clone(),
            Self::Index(other) => other.to_string(),
        }
    }
}

impl<'v> Datum<'v> {
    pub(crate) fn value(&self) -> Option<&Value> {
        match self {
            Self::NoValue => None,
            Self::Ref(value) => Some(value),
            Self::Owned(value) => Some(value),
        }
    }

    /// Borrow without cloning owned values.
    pub(crate) fn reborrow(&self) -> Datum<'_> {
        match self {
            Self::NoValue => Datum::NoValue,
            Self::Ref(value) => Datum::Ref(value),
            Self::Owned(value) => Datum::Ref(value),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.value().map_or("no value", kind_of)
    }

    pub(crate) fn is_truthy(&self) -> bool {
        match self.value() {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
        }
    }

    /// Look `key` up in this value.
    ///
    /// `Ok(None)` means the key is absent from an object; the caller decides
    /// whether that is an error.
    pub(crate) fn select(self, key: Key<'_>) -> Result<Option<Datum<'v>>, ExecErrorKind> {
        match self {
            Self::NoValue => Ok(Some(Self::NoValue)),
            Self::Ref(value) => Ok(select(value, key)?.map(Datum::Ref)),
            Self::Owned(value) => Ok(select(&value, key)?.cloned().map(Datum::Owned)),
        }
    }
}

impl fmt::Display for Datum<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            None => f.write_str("<no value>"),
            Some(Value::Null) => f.write_str("<nil>"),
            Some(Value::String(s)) => f.write_str(s),
            Some(other) => write!(f, "{other}"),
        }
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn select<'v>(value: &'v Value, key: Key<'_>) -> Result<Option<&'v Value>, ExecErrorKind> {
    match (value, key) {
        (Value::Object(map), Key::Field(name)) => Ok(map.get(name)),
        (Value::Null, Key::Field(name)) => Err(ExecErrorKind::NilField(name.to_owned())),
        (other, Key::Field(name)) => Err(ExecErrorKind::NotAnObject {
            field: name.to_owned(),
            kind: kind_of(other),
        }),

        (Value::Object(map), Key::Index(Value::String(name))) => Ok(map.get(name)),
        (Value::Array(items), Key::Index(Value::Number(n))) => {
            let index = n.as_i64().ok_or(ExecErrorKind::BadIndexKey {
                kind: "array",
                key: "non-integer number",
            })?;
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .map(Some)
                .ok_or(ExecErrorKind::IndexOutOfRange {
                    index,
                    len: items.len(),
                })
        }
        (Value::Null, Key::Index(_)) => Err(ExecErrorKind::CannotIndex("null")),
        (value @ (Value::Object(_) | Value::Array(_)), Key::Index(key)) => {
            Err(ExecErrorKind::BadIndexKey {
                kind: kind_of(value),
                key: kind_of(key),
            })
        }
        (other, Key::Index(_)) => Err(ExecErrorKind::CannotIndex(kind_of(other))),
    }
}

/// Compare two data for `eq`/`ne`. Missing values compare like `null`.
pub(crate) fn equal(a: &Datum<'_>, b: &Datum<'_>) -> Result<bool, ExecErrorKind> {
    let (a, b) = (
        a.value().unwrap_or(&Value::Null),
        b.value().unwrap_or(&Value::Null),
    );
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(compare_numbers(x, y) == Some(Ordering::Equal)),
        (Value::Null, _) | (_, Value::Null) => Ok(a == b),
        (x, y) if kind_of(x) == kind_of(y) => Ok(x == y),
        (x, y) => Err(ExecErrorKind::Incomparable(kind_of(x), kind_of(y))),
    }
}

/// Order two data for `lt`/`le`/`gt`/`ge`; only numbers and strings are ordered.
pub(crate) fn order(a: &Datum<'_>, b: &Datum<'_>) -> Result<Ordering, ExecErrorKind> {
    match (a.value(), b.value()) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            compare_numbers(x, y).ok_or(ExecErrorKind::NotOrdered("number"))
        }
        (Some(Value::String(x)), Some(Value::String(y))) => Ok(x.cmp(y)),
        (Some(x @ (Value::Number(_) | Value::String(_))), Some(y))
            if kind_of(x) != kind_of(y) =>
        {
            Err(ExecErrorKind::Incomparable(kind_of(x), kind_of(y)))
        }
        (Some(Value::Number(_) | Value::String(_)), None) => Err(ExecErrorKind::NotOrdered("no value")),
        (x, _) => Err(ExecErrorKind::NotOrdered(x.map_or("no value", kind_of))),
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        Some(x.cmp(&y))
    } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        Some(x.cmp(&y))
    } else {
        x.as_f64()?.partial_cmp(&y.as_f64()?)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!Datum::Owned(falsy.clone()).is_truthy(), "{falsy}");
        }
        for truthy in [json!(true), json!(-1), json!(" "), json!([0]), json!({"a": null})] {
            assert!(Datum::Owned(truthy.clone()).is_truthy(), "{truthy}");
        }
        assert!(!Datum::NoValue.is_truthy());
    }

    #[test]
    fn integer_and_float_compare_equal() {
        let one = Datum::Owned(json!(1));
        let one_f = Datum::Owned(json!(1.0));
        assert!(equal(&one, &one_f).unwrap());
        assert_eq!(order(&one, &Datum::Owned(json!(2.5))).unwrap(), Ordering::Less);
    }

    #[test]
    fn mixed_kinds_do_not_compare() {
        let err = equal(&Datum::Owned(json!(1)), &Datum::Owned(json!("1"))).unwrap_err();
        assert_eq!(err, ExecErrorKind::Incomparable("number", "string"));
        assert!(!equal(&Datum::Owned(json!(1)), &Datum::NoValue).unwrap());
    }

    #[test]
    fn array_index_bounds() {
        let items = json!(["a"]);
        let err = Datum::Ref(&items).select(Key::Index(&json!(3))).unwrap_err();
        assert_eq!(err, ExecErrorKind::IndexOutOfRange { index: 3, len: 1 });
        let err = Datum::Ref(&items).select(Key::Index(&json!(-1))).unwrap_err();
        assert_eq!(err, ExecErrorKind::IndexOutOfRange { index: -1, len: 1 });
    }
}
