use engine_handlebars::{Engine, EngineError, Helper, Invocation, RenderOptions};
use serde_json::{json, Value};

#[test]
fn test_render_is_transparent_passthrough() {
    let engine = Engine::new();
    let data = json!({"name": "Halle Schlinkert"});

    let adapted = engine.render_sync("{{ name }}", &data).unwrap();
    let direct = handlebars::Handlebars::new()
        .render_template("{{ name }}", &data)
        .unwrap();

    assert_eq!(adapted, direct);
    assert_eq!(adapted, "Halle Schlinkert");
}

#[tokio::test]
async fn test_async_render_without_async_helpers() {
    let engine = Engine::new();
    let out = engine
        .render("Halle {{name}}", &json!({"name": "Schlinkert"}))
        .await
        .unwrap();
    assert_eq!(out, "Halle Schlinkert");
}

#[test]
fn test_compile_is_idempotent() {
    let engine = Engine::new();
    let compiled = engine.compile("Halle {{name}}").unwrap();
    let again = engine.compile(compiled.clone()).unwrap();
    assert!(compiled.ptr_eq(&again));
}

#[test]
fn test_compiled_template_renders() {
    let engine = Engine::new();
    let compiled = engine.compile("Halle {{name}}").unwrap();
    let out = engine
        .render_sync(&compiled, &json!({"name": "Schlinkert"}))
        .unwrap();
    assert_eq!(out, "Halle Schlinkert");
}

#[test]
fn test_parse_failure_is_a_parse_error() {
    let engine = Engine::new();
    let err = engine
        .render_sync("{{#if name}}unclosed", &json!({}))
        .unwrap_err();
    assert!(matches!(err, EngineError::Compile(_)));
    assert!(err.to_string().contains("parse error"));
}

#[tokio::test]
async fn test_parse_failure_comes_back_through_the_error_channel() {
    let engine = Engine::new();
    let err = engine
        .render("{{#each items}}no closing tag", &json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("parse error"));
}

#[tokio::test]
async fn test_render_options_do_not_leak_into_the_engine() {
    let engine = Engine::new();
    let options = RenderOptions::new()
        .helper(
            "shout",
            Helper::sync(|inv: &Invocation| {
                Ok(Value::String(
                    inv.param_str(0).unwrap_or_default().to_uppercase(),
                ))
            }),
        )
        .partial("greeting", "hi {{name}}");

    let out = engine
        .render_with(
            "{{shout name}} {{> greeting}}",
            &json!({"name": "jon"}),
            &options,
        )
        .await
        .unwrap();
    assert_eq!(out, "JON hi jon");

    // same engine, no options: the helper is gone again
    assert!(engine
        .render_sync("{{shout name}}", &json!({"name": "jon"}))
        .is_err());
}

#[test]
fn test_compile_with_registers_on_the_engine() {
    let mut engine = Engine::new();
    let options = RenderOptions::new().partial("signature", "-- {{name}}");
    engine.compile_with("{{> signature}}", options).unwrap();

    let out = engine
        .render_sync("{{> signature}}", &json!({"name": "jon"}))
        .unwrap();
    assert_eq!(out, "-- jon");
}

#[test]
fn test_engine_options_defaults() {
    let engine = Engine::new();
    assert_eq!(Engine::NAME, "handlebars");
    assert_eq!(engine.options().src_ext, ".hbs");
    assert_eq!(engine.options().dest_ext, ".html");
}
