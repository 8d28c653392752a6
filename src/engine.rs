//! The adapter surface: compiling, rendering, and per-render pass
//! construction on top of the opaque runtime.

use std::collections::HashMap;
use std::sync::Arc;

use handlebars::Handlebars;
use log::debug;
use serde::Serialize;
use serde_json::Value as Json;

use crate::context::{merge_context, TemplateFile};
use crate::error::EngineError;
use crate::helper::{AsyncHelperBridge, Helper, SyncHelperBridge};
use crate::partial::{DynamicPartialBridge, DYNAMIC_PARTIAL, PARTIAL_BRIDGE, PARTIAL_STUB_BODY};
use crate::tokens::AsyncTokens;

/// Validated template source. Cheap to clone and reusable across renders;
/// two clones of one compile share the same backing allocation.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    source: Arc<str>,
}

impl CompiledTemplate {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Identity comparison: true when both values came from the same
    /// `compile` call.
    pub fn ptr_eq(&self, other: &CompiledTemplate) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

/// Raw template text or an already-compiled template.
#[derive(Debug, Clone)]
pub enum Source {
    Raw(String),
    Compiled(CompiledTemplate),
}

impl From<&str> for Source {
    fn from(s: &str) -> Source {
        Source::Raw(s.to_owned())
    }
}

impl From<String> for Source {
    fn from(s: String) -> Source {
        Source::Raw(s)
    }
}

impl From<CompiledTemplate> for Source {
    fn from(t: CompiledTemplate) -> Source {
        Source::Compiled(t)
    }
}

impl From<&CompiledTemplate> for Source {
    fn from(t: &CompiledTemplate) -> Source {
        Source::Compiled(t.clone())
    }
}

/// Helpers and partials scoped to a single call.
///
/// These are layered over the engine's own registrations for one render
/// (or merged into the engine by [`Engine::compile_with`]); concurrent
/// renders never observe each other's options.
#[derive(Clone, Default)]
pub struct RenderOptions {
    pub helpers: HashMap<String, Helper>,
    pub partials: HashMap<String, String>,
}

impl RenderOptions {
    pub fn new() -> RenderOptions {
        RenderOptions::default()
    }

    pub fn helper<S: Into<String>>(mut self, name: S, helper: Helper) -> RenderOptions {
        self.helpers.insert(name.into(), helper);
        self
    }

    pub fn partial<S: Into<String>, T: Into<String>>(mut self, name: S, source: T) -> RenderOptions {
        self.partials.insert(name.into(), source.into());
        self
    }
}

/// Engine identity consumed by pipeline engine registries.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub src_ext: String,
    pub dest_ext: String,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions {
            src_ext: ".hbs".to_owned(),
            dest_ext: ".html".to_owned(),
        }
    }
}

/// Immutable snapshot of helpers and partials for one render pass,
/// shared with the bridges so deferred resolvers can rebuild a runtime
/// instance long after the engine borrow has ended.
pub(crate) struct PassState {
    helpers: HashMap<String, Helper>,
    partials: HashMap<String, Arc<str>>,
}

impl PassState {
    pub(crate) fn partial(&self, name: &str) -> Option<Arc<str>> {
        self.partials.get(name).cloned()
    }
}

/// Build the runtime instance for one synchronous pass: every partial
/// registered as a template and every helper wrapped in its bridge. When
/// any helper is asynchronous, the stub partial and its resolution bridge
/// are wired in last so user registrations cannot shadow them.
pub(crate) fn build_pass_registry(
    pass: &Arc<PassState>,
    tokens: &Arc<AsyncTokens>,
) -> Result<Handlebars<'static>, EngineError> {
    let mut registry = Handlebars::new();
    for (name, source) in &pass.partials {
        registry.register_template_string(name, source.as_ref())?;
    }
    let mut has_async = false;
    for (name, helper) in &pass.helpers {
        match helper {
            Helper::Sync(f) => {
                registry.register_helper(
                    name,
                    Box::new(SyncHelperBridge {
                        inner: Arc::clone(f),
                    }),
                );
            }
            Helper::Async(f) => {
                has_async = true;
                registry.register_helper(
                    name,
                    Box::new(AsyncHelperBridge {
                        inner: Arc::clone(f),
                        tokens: Arc::clone(tokens),
                    }),
                );
            }
        }
    }
    if has_async {
        registry.register_template_string(DYNAMIC_PARTIAL, PARTIAL_STUB_BODY)?;
        registry.register_helper(
            PARTIAL_BRIDGE,
            Box::new(DynamicPartialBridge {
                pass: Arc::clone(pass),
                tokens: Arc::clone(tokens),
            }),
        );
    }
    Ok(registry)
}

/// A template engine instance.
///
/// Owns its helper and partial registrations outright; there is no
/// module-global runtime state, so independent engines (and concurrent
/// renders on one engine) cannot interfere with each other.
///
/// ```
/// use engine_handlebars::Engine;
/// use serde_json::json;
///
/// let engine = Engine::new();
/// let out = engine
///     .render_sync("Hello {{name}}", &json!({"name": "world"}))
///     .unwrap();
/// assert_eq!(out, "Hello world");
/// ```
#[derive(Clone, Default)]
pub struct Engine {
    helpers: HashMap<String, Helper>,
    partials: HashMap<String, Arc<str>>,
    options: EngineOptions,
}

impl Engine {
    /// Engine identifier used by pipeline registries.
    pub const NAME: &'static str = "handlebars";

    pub fn new() -> Engine {
        Engine::default()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut EngineOptions {
        &mut self.options
    }

    /// Register a helper on this engine. Later registrations under the
    /// same name win.
    pub fn register_helper<S: Into<String>>(&mut self, name: S, helper: Helper) {
        self.helpers.insert(name.into(), helper);
    }

    /// Register a partial source on this engine.
    pub fn register_partial<S: Into<String>, T: Into<String>>(&mut self, name: S, source: T) {
        self.partials.insert(name.into(), Arc::from(source.into()));
    }

    /// Validate and wrap template source. Idempotent: an already-compiled
    /// input is returned unchanged. Compilation is always synchronous;
    /// only invocation of the compiled template can involve asynchronous
    /// helpers.
    pub fn compile<S: Into<Source>>(&self, source: S) -> Result<CompiledTemplate, EngineError> {
        match source.into() {
            Source::Compiled(compiled) => Ok(compiled),
            Source::Raw(text) => {
                let mut probe = Handlebars::new();
                probe.register_template_string("__compile__", &text)?;
                Ok(CompiledTemplate {
                    source: Arc::from(text),
                })
            }
        }
    }

    /// Register the options' helpers and partials on this engine, then
    /// compile.
    pub fn compile_with<S: Into<Source>>(
        &mut self,
        source: S,
        options: RenderOptions,
    ) -> Result<CompiledTemplate, EngineError> {
        for (name, helper) in options.helpers {
            self.helpers.insert(name, helper);
        }
        for (name, partial) in options.partials {
            self.partials.insert(name, Arc::from(partial));
        }
        self.compile(source)
    }

    /// Render `source` against `locals`, waiting for every asynchronous
    /// helper and dynamically named partial to resolve.
    ///
    /// All failures (parse, runtime, resolution) come back through the
    /// returned `Result`; nothing panics across this boundary.
    pub async fn render<S, T>(&self, source: S, locals: &T) -> Result<String, EngineError>
    where
        S: Into<Source>,
        T: Serialize,
    {
        self.render_with(source, locals, &RenderOptions::default())
            .await
    }

    /// [`Engine::render`] with call-scoped helpers and partials layered
    /// over the engine's own.
    pub async fn render_with<S, T>(
        &self,
        source: S,
        locals: &T,
        options: &RenderOptions,
    ) -> Result<String, EngineError>
    where
        S: Into<Source>,
        T: Serialize,
    {
        let data = to_data(locals)?;
        let tokens = AsyncTokens::new();
        let output = self.sync_pass(source.into(), &data, Some(options), &tokens)?;
        tokens.resolve(output).await
    }

    /// Render without a resolution pass.
    ///
    /// Asynchronous helpers cannot complete here, since there is nothing
    /// to wait on; their placeholders appear literally in the output.
    /// That is a documented limitation of the synchronous entry point,
    /// not an error.
    pub fn render_sync<S, T>(&self, source: S, locals: &T) -> Result<String, EngineError>
    where
        S: Into<Source>,
        T: Serialize,
    {
        self.render_sync_with(source, locals, &RenderOptions::default())
    }

    pub fn render_sync_with<S, T>(
        &self,
        source: S,
        locals: &T,
        options: &RenderOptions,
    ) -> Result<String, EngineError>
    where
        S: Into<Source>,
        T: Serialize,
    {
        let data = to_data(locals)?;
        let tokens = AsyncTokens::new();
        self.sync_pass(source.into(), &data, Some(options), &tokens)
    }

    /// Render a template file in place: the file's `data` is merged over
    /// `locals` (data wins), its cached compiled template is preferred
    /// over `contents`, and the rendered output is written back into
    /// `contents`.
    pub async fn render_file<T>(
        &self,
        file: &mut TemplateFile,
        locals: &T,
    ) -> Result<(), EngineError>
    where
        T: Serialize,
    {
        let locals = to_data(locals)?;
        let data = merge_context(&locals, file.data.as_ref());
        let source = match &file.compiled {
            Some(compiled) => Source::Compiled(compiled.clone()),
            None => Source::Raw(file.contents.clone()),
        };
        let tokens = AsyncTokens::new();
        let output = self.sync_pass(source, &data, None, &tokens)?;
        file.contents = tokens.resolve(output).await?;
        Ok(())
    }

    fn pass_state(&self, options: Option<&RenderOptions>) -> Arc<PassState> {
        let mut helpers = self.helpers.clone();
        let mut partials = self.partials.clone();
        if let Some(options) = options {
            for (name, helper) in &options.helpers {
                helpers.insert(name.clone(), helper.clone());
            }
            for (name, partial) in &options.partials {
                partials.insert(name.clone(), Arc::from(partial.as_str()));
            }
        }
        Arc::new(PassState { helpers, partials })
    }

    /// One synchronous pass: compile, build the pass registry, render.
    /// The output may still embed placeholder tokens.
    fn sync_pass(
        &self,
        source: Source,
        data: &Json,
        options: Option<&RenderOptions>,
        tokens: &Arc<AsyncTokens>,
    ) -> Result<String, EngineError> {
        let compiled = self.compile(source)?;
        let pass = self.pass_state(options);
        let registry = build_pass_registry(&pass, tokens)?;
        debug!("starting synchronous render pass");
        Ok(registry.render_template(compiled.source(), data)?)
    }
}

fn to_data<T: Serialize>(locals: &T) -> Result<Json, EngineError> {
    serde_json::to_value(locals)
        .map_err(|e| EngineError::InvalidInput(format!("locals are not serializable: {}", e)))
}
