use serde_json::json;
use stencil::{ExecErrorKind, MissingKey, ParseErrorKind, RenderError, Template};

#[test]
fn renders_names_in_any_order() {
    let template = Template::parse(
        "name",
        "{{.lastName}} {{.firstName}} {{.middleName}}",
    )
    .unwrap();
    let data = json!({
        "firstName": "Нахман",
        "lastName": "Абрамович",
        "middleName": "Моисеевич",
    });
    assert_eq!(
        template.render(&data).unwrap(),
        "Абрамович Нахман Моисеевич"
    );
}

#[test]
fn rerender_with_different_data() {
    let template = Template::parse("t", "{{range .}}{{.id}};{{end}}").unwrap();
    assert_eq!(template.render(&json!([{"id": 1}, {"id": 2}])).unwrap(), "1;2;");
    assert_eq!(template.render(&json!([])).unwrap(), "");
    assert_eq!(template.render(&json!(null)).unwrap(), "");
}

#[test]
fn report_template() {
    let src = r#"{{- /* header */ -}}
Users: {{len .users}}
{{range .users -}}
- {{.name}}{{if .admin}} (admin){{end}}{{with .email}} <{{.}}>{{end}}
{{end -}}
{{if and .users (not .archived)}}active{{else}}inactive{{end}}"#;
    let template = Template::parse("report", src).unwrap();
    let data = json!({
        "users": [
            {"name": "ada", "admin": true, "email": "ada@example.com"},
            {"name": "bob", "admin": false, "email": ""},
        ],
        "archived": false,
    });
    assert_eq!(
        template.render(&data).unwrap(),
        "Users: 2\n- ada (admin) <ada@example.com>\n- bob\nactive"
    );
}

#[test]
fn strict_lookups_name_the_failing_node() {
    let template = Template::parse("t", "{{with .user}}{{.profile.city}}{{end}}")
        .unwrap()
        .with_missing_key(MissingKey::Error);

    let Err(RenderError::Exec(err)) = template.render(&json!({"user": {"profile": {}}})) else {
        panic!("expected an exec error");
    };
    assert_eq!(err.kind(), &ExecErrorKind::MissingKey("city".into()));
    assert_eq!(err.node(), ".profile.city");
    assert_eq!(err.position(), (1, 17));
    assert_eq!(err.name(), "t");
}

#[test]
fn multi_line_actions_report_on_one_line() {
    let template = Template::parse("t", "{{index .\n    \"k\"}}")
        .unwrap()
        .with_missing_key(MissingKey::Error);

    let Err(RenderError::Exec(err)) = template.render(&json!({})) else {
        panic!("expected an exec error");
    };
    assert_eq!(err.node(), r#"index . "k""#);
    assert_eq!(err.to_string().lines().count(), 1);
}

#[test]
fn policy_can_be_changed_after_parsing() {
    let mut template = Template::parse("t", "{{.a}}").unwrap();
    assert_eq!(template.missing_key(), MissingKey::Default);
    assert_eq!(template.render(&json!({})).unwrap(), "<no value>");

    template.set_missing_key(MissingKey::Error);
    assert!(template.render(&json!({})).is_err());
    assert_eq!(template.render(&json!({"a": 0})).unwrap(), "0");
}

#[test]
fn parse_errors_carry_position() {
    let err = Template::parse("bad", "ok\n{{if .a}}\nnever closed").unwrap_err();
    assert_eq!(err.kind(), &ParseErrorKind::UnclosedBlock("if"));
    assert_eq!(err.line(), 2);
    assert_eq!(err.name(), "bad");
    assert_eq!(
        err.to_string(),
        "template: bad:2: unexpected EOF: {{if}} is never closed"
    );
}

#[test]
fn unknown_function_fails_at_parse_time() {
    let err = Template::parse("t", "{{upper .name}}").unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"template: t:1: function "upper" not defined"#
    );
}

#[test]
fn exposes_name_and_source() {
    let template = Template::parse("page", "{{.}}").unwrap();
    assert_eq!(template.name(), "page");
    assert_eq!(template.source(), "{{.}}");
}
