use engine_handlebars::{Engine, EngineError, Helper, Invocation};
use futures::future::BoxFuture;
use serde_json::{json, Value};

fn upper() -> Helper {
    Helper::async_fn(
        |inv: Invocation| -> BoxFuture<'static, Result<Value, EngineError>> {
            Box::pin(async move {
                let s = inv.param_str(0).unwrap_or_default().to_uppercase();
                Ok(Value::String(s))
            })
        },
    )
}

fn partial_key() -> Helper {
    Helper::sync(|inv: &Invocation| {
        Ok(Value::String(format!(
            "partial_{}",
            inv.param_str(0).unwrap_or_default()
        )))
    })
}

fn engine_with_chain() -> Engine {
    let mut engine = Engine::new();
    engine.register_helper("upper", upper());
    engine.register_helper("partial", partial_key());
    engine.register_partial("PARTIAL_FOO", r#"foo {{> (upper (partial "bar"))}} foo"#);
    engine.register_partial("PARTIAL_BAR", r#"bar {{> (upper (partial "baz"))}} bar"#);
    engine.register_partial("PARTIAL_BAZ", "baz {{name}} baz");
    engine
}

#[tokio::test]
async fn test_chained_dynamic_partials_resolve_in_dependency_order() {
    let engine = engine_with_chain();
    let out = engine
        .render(
            r#"{{> (upper (partial "foo"))}}"#,
            &json!({"name": "Halle Schlinkert"}),
        )
        .await
        .unwrap();
    assert_eq!(out, "foo bar baz Halle Schlinkert baz bar foo");
    assert!(!out.contains("__async_"));
}

#[tokio::test]
async fn test_unknown_partial_name_surfaces_as_terminal_error() {
    let engine = engine_with_chain();
    let err = engine
        .render(r#"{{> (upper (partial "nope"))}}"#, &json!({}))
        .await
        .unwrap_err();
    match err {
        EngineError::PartialNotFound { name } => assert_eq!(name, "PARTIAL_NOPE"),
        other => panic!("expected PartialNotFound, got {}", other),
    }
}

#[tokio::test]
async fn test_sync_dynamic_name_resolves_natively() {
    let mut engine = Engine::new();
    engine.register_helper("pick", Helper::sync(|_: &Invocation| Ok(json!("inner"))));
    engine.register_partial("inner", "hello {{name}}");

    let out = engine
        .render("{{> (pick)}}", &json!({"name": "jon"}))
        .await
        .unwrap();
    assert_eq!(out, "hello jon");
}

#[tokio::test]
async fn test_deferred_partial_indentation() {
    let mut engine = Engine::new();
    engine.register_helper("upper", upper());
    engine.register_helper("partial", partial_key());
    engine.register_partial("PARTIAL_BLOCK", "alpha\nbeta");

    let out = engine
        .render("  {{> (upper (partial \"block\"))}}", &json!({}))
        .await
        .unwrap();
    assert_eq!(out, "  alpha\n  beta");
}
