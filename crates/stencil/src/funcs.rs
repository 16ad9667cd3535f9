use std::{cmp::Ordering, fmt::Write as _};

use serde_json::Value;

use crate::{
    values::{equal, order, Datum, Key},
    ExecErrorKind, MissingKey,
};

/// Built-in functions callable from actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Func {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Len,
    Index,
    Print,
    Println,
}

impl Func {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "lt" => Self::Lt,
            "le" => Self::Le,
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "len" => Self::Len,
            "index" => Self::Index,
            "print" => Self::Print,
            "println" => Self::Println,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Len => "len",
            Self::Index => "index",
            Self::Print => "print",
            Self::Println => "println",
        }
    }

    fn arity(self, got: usize) -> Result<(), ExecErrorKind> {
        let (ok, want) = match self {
            Self::Not | Self::Len => (got == 1, "1"),
            Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => (got == 2, "2"),
            Self::Eq => (got >= 2, "at least 2"),
            Self::And | Self::Or | Self::Index => (got >= 1, "at least 1"),
            Self::Print | Self::Println => (true, "any"),
        };
        if ok {
            Ok(())
        } else {
            Err(ExecErrorKind::WrongArgCount {
                func: self.name(),
                want,
                got,
            })
        }
    }
}

/// Call `func` with fully evaluated arguments.
///
/// `and` and `or` short-circuit: the executor stops evaluating arguments at
/// the first deciding one and passes only the evaluated prefix.
pub(crate) fn call<'v>(
    func: Func,
    args: Vec<Datum<'v>>,
    missing_key: MissingKey,
) -> Result<Datum<'v>, ExecErrorKind> {
    func.arity(args.len())?;

    let mut args = args.into_iter();

    Ok(match func {
        Func::And | Func::Or => {
            let stop_on = func == Func::Or;
            let mut last = take(&mut args);
            for arg in args.by_ref() {
                if last.is_truthy() == stop_on {
                    break;
                }
                last = arg;
            }
            last
        }
        Func::Not => Datum::Owned(Value::Bool(!take(&mut args).is_truthy())),
        Func::Eq => {
            let first = take(&mut args);
            let mut found = false;
            for other in args.by_ref() {
                if equal(&first, &other)? {
                    found = true;
                    break;
                }
            }
            Datum::Owned(Value::Bool(found))
        }
        Func::Ne => {
            let (a, b) = (take(&mut args), take(&mut args));
            Datum::Owned(Value::Bool(!equal(&a, &b)?))
        }
        Func::Lt | Func::Le | Func::Gt | Func::Ge => {
            let (a, b) = (take(&mut args), take(&mut args));
            let ordering = order(&a, &b)?;
            Datum::Owned(Value::Bool(match func {
                Func::Lt => ordering == Ordering::Less,
                Func::Le => ordering != Ordering::Greater,
                Func::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        Func::Len => {
            let arg = take(&mut args);
            let len = match arg.value() {
                Some(Value::String(s)) => s.chars().count(),
                Some(Value::Array(items)) => items.len(),
                Some(Value::Object(map)) => map.len(),
                _ => return Err(ExecErrorKind::NoLen(arg.kind())),
            };
            Datum::Owned(Value::from(len))
        }
        Func::Index => {
            let mut item = take(&mut args);
            for arg in args.by_ref() {
                let Some(key_value) = arg.value() else {
                    return Err(ExecErrorKind::BadIndexKey {
                        kind: item.kind(),
                        key: "no value",
                    });
                };
                let key = Key::Index(key_value);
                let name = key.name();
                item = match item.select(key)? {
                    Some(found) => found,
                    None if missing_key == MissingKey::Error => {
                        return Err(ExecErrorKind::MissingKey(name))
                    }
                    None => Datum::NoValue,
                };
            }
            item
        }
        Func::Print => Datum::Owned(Value::String(sprint(args, false))),
        Func::Println => Datum::Owned(Value::String(sprint(args, true))),
    })
}

fn take<'v>(args: &mut std::vec::IntoIter<Datum<'v>>) -> Datum<'v> {
    args.next().unwrap_or(Datum::NoValue)
}

/// Concatenate the printed forms of `args`.
///
/// `print` separates two operands with a space when neither is a string;
/// `println` always separates them and appends a newline.
fn sprint<'v>(args: impl Iterator<Item = Datum<'v>>, line: bool) -> String {
    let mut out = String::new();
    let mut prev_is_string: Option<bool> = None;
    for arg in args {
        let is_string = matches!(arg.value(), Some(Value::String(_)));
        if let Some(prev_is_string) = prev_is_string {
            if line || (!prev_is_string && !is_string) {
                out.push(' ');
            }
        }
        write!(out, "{arg}").ok();
        prev_is_string = Some(is_string);
    }
    if line {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn owned(values: &[Value]) -> Vec<Datum<'static>> {
        values.iter().cloned().map(Datum::Owned).collect()
    }

    fn call_ok(func: &str, values: &[Value]) -> Value {
        let func = Func::lookup(func).unwrap();
        call(func, owned(values), MissingKey::Error)
            .unwrap()
            .value()
            .cloned()
            .unwrap()
    }

    #[test]
    fn lookup_round_trips_names() {
        for name in ["and", "or", "not", "eq", "ne", "lt", "le", "gt", "ge", "len", "index", "print", "println"] {
            assert_eq!(Func::lookup(name).unwrap().name(), name);
        }
        assert_eq!(Func::lookup("printf"), None);
    }

    #[test]
    fn and_or_return_deciding_operand() {
        assert_eq!(call_ok("and", &[json!(1), json!(0), json!(2)]), json!(0));
        assert_eq!(call_ok("and", &[json!(1), json!("x")]), json!("x"));
        assert_eq!(call_ok("or", &[json!(0), json!(""), json!("y")]), json!("y"));
        assert_eq!(call_ok("or", &[json!(0), json!(null)]), json!(null));
    }

    #[test]
    fn comparisons() {
        assert_eq!(call_ok("eq", &[json!("a"), json!("b"), json!("a")]), json!(true));
        assert_eq!(call_ok("ne", &[json!(1), json!(1.0)]), json!(false));
        assert_eq!(call_ok("lt", &[json!("a"), json!("b")]), json!(true));
        assert_eq!(call_ok("ge", &[json!(2), json!(2)]), json!(true));
        assert_eq!(call_ok("gt", &[json!(-1), json!(2)]), json!(false));
    }

    #[test]
    fn len_counts_chars() {
        assert_eq!(call_ok("len", &[json!("Матвей")]), json!(6));
        assert_eq!(call_ok("len", &[json!({"a": 1})]), json!(1));
        let err = call(Func::Len, owned(&[json!(3)]), MissingKey::Error).unwrap_err();
        assert_eq!(err, ExecErrorKind::NoLen("number"));
    }

    #[test]
    fn index_walks_keys() {
        let data = json!({"a": [10, {"b": "deep"}]});
        assert_eq!(call_ok("index", &[data.clone(), json!("a"), json!(1), json!("b")]), json!("deep"));

        let err = call(Func::Index, owned(&[data.clone(), json!("zz")]), MissingKey::Error).unwrap_err();
        assert_eq!(err, ExecErrorKind::MissingKey("zz".into()));

        let found = call(Func::Index, owned(&[data, json!("zz")]), MissingKey::Default).unwrap();
        assert_eq!(found, Datum::NoValue);
    }

    #[test]
    fn arity_is_checked() {
        let err = call(Func::Not, owned(&[]), MissingKey::Error).unwrap_err();
        assert_eq!(
            err,
            ExecErrorKind::WrongArgCount {
                func: "not",
                want: "1",
                got: 0
            }
        );
    }

    #[test]
    fn print_spacing() {
        assert_eq!(call_ok("print", &[json!("a"), json!("b")]), json!("ab"));
        assert_eq!(call_ok("print", &[json!(1), json!(2), json!("x"), json!(3)]), json!("1 2x3"));
        assert_eq!(call_ok("println", &[json!("a"), json!(1)]), json!("a 1\n"));
    }
}
