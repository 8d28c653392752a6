//! Handlebars engine adapter for file-processing build pipelines.
//!
//! This crate normalizes compile/render calls against the [`handlebars`]
//! runtime behind the uniform interface such pipelines expect from any
//! templating engine: string and file rendering, non-destructive context
//! merging, per-call helper and partial registration, and a tagged error
//! taxonomy.
//!
//! Its one non-trivial capability is asynchronous helper support. A
//! helper registered with [`Helper::async_fn`] may perform I/O or any
//! other deferred computation: the synchronous render pass embeds an
//! opaque placeholder where the value belongs and continues, and a
//! post-render fixed-point pass substitutes resolved values. This covers
//! partials whose *name* is itself produced by an asynchronous helper
//! chain, resolved recursively:
//!
//! ```
//! use engine_handlebars::{Engine, EngineError, Helper, Invocation};
//! use futures::future::BoxFuture;
//! use serde_json::{json, Value};
//!
//! let mut engine = Engine::new();
//! engine.register_helper(
//!     "upper",
//!     Helper::async_fn(|inv: Invocation| -> BoxFuture<'static, Result<Value, EngineError>> {
//!         Box::pin(async move {
//!             let s = inv.param_str(0).unwrap_or_default().to_uppercase();
//!             Ok(Value::String(s))
//!         })
//!     }),
//! );
//!
//! let out = futures::executor::block_on(
//!     engine.render("{{upper name}}", &json!({"name": "world"})),
//! )
//! .unwrap();
//! assert_eq!(out, "WORLD");
//! ```
//!
//! [`Engine::render_sync`] skips the resolution pass and therefore leaves
//! asynchronous placeholders unresolved; use it only with synchronous
//! helpers.

pub mod context;
pub mod engine;
pub mod error;
pub mod helper;
mod partial;
mod tokens;

pub use crate::context::{merge_context, Object, TemplateFile};
pub use crate::engine::{CompiledTemplate, Engine, EngineOptions, RenderOptions, Source};
pub use crate::error::EngineError;
pub use crate::helper::{AsyncHelperDef, Helper, Invocation, SyncHelperDef};
