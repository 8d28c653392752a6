use std::fs;
use std::path::Path;

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

fn include() -> Helper {
    Helper::sync(|inv: &Invocation| {
        let name = inv
            .param_str(0)
            .ok_or_else(|| EngineError::resolution("include needs a file name"))?;
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name);
        let contents =
            fs::read_to_string(&path).map_err(|e| EngineError::resolution(e.to_string()))?;
        Ok(Value::String(contents.trim_end().to_owned()))
    })
}

#[tokio::test]
async fn test_async_helper_value_is_spliced_in() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut engine = Engine::new();
    engine.register_helper("upper", upper());

    let out = engine
        .render("hello {{upper name}}!", &json!({"name": "jon"}))
        .await
        .unwrap();
    assert_eq!(out, "hello JON!");
}

#[tokio::test]
async fn test_async_helper_over_sync_include() {
    let mut engine = Engine::new();
    engine.register_helper("upper", upper());
    engine.register_helper("include", include());

    let out = engine
        .render(r#"{{upper (include "content.hbs")}}"#, &json!({}))
        .await
        .unwrap();
    assert_eq!(out, "JON SCHLINKERT");
}

#[tokio::test]
async fn test_static_partial_with_async_helper() {
    let mut engine = Engine::new();
    engine.register_helper("upper", upper());
    engine.register_partial("head", "[{{upper title}}]");

    let out = engine
        .render("{{> head}} body", &json!({"title": "news"}))
        .await
        .unwrap();
    assert_eq!(out, "[NEWS] body");
}

#[tokio::test]
async fn test_resolver_failure_aborts_the_render() {
    let mut engine = Engine::new();
    engine.register_helper(
        "fail",
        Helper::async_fn(
            |_: Invocation| -> BoxFuture<'static, Result<Value, EngineError>> {
                Box::pin(async { Err(EngineError::resolution("backing store unavailable")) })
            },
        ),
    );

    let err = engine
        .render("a {{fail}} b", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Resolution { .. }));
    assert!(err.to_string().contains("backing store unavailable"));
}

#[test]
fn test_render_sync_leaves_placeholders_unresolved() {
    let mut engine = Engine::new();
    engine.register_helper("upper", upper());

    let out = engine
        .render_sync("{{upper name}}", &json!({"name": "jon"}))
        .unwrap();
    assert!(out.contains("__async_"));
    assert!(!out.contains("JON"));
}

#[tokio::test]
async fn test_renders_on_one_engine_do_not_share_state() {
    let mut engine = Engine::new();
    engine.register_helper("upper", upper());

    let first = engine
        .render("{{upper name}}", &json!({"name": "ada"}))
        .await
        .unwrap();
    let second = engine
        .render("{{upper name}}", &json!({"name": "grace"}))
        .await
        .unwrap();
    assert_eq!(first, "ADA");
    assert_eq!(second, "GRACE");
}
