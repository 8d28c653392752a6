//! Helper registration and the bridges that adapt both helper variants
//! onto the runtime's `HelperDef` extension point.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use handlebars::{
    Context, Handlebars, Helper as HelperBinding, HelperDef, HelperResult, JsonRender, Output,
    RenderContext, RenderError, ScopedJson,
};
use serde_json::Value as Json;

use crate::error::EngineError;
use crate::partial::DYNAMIC_PARTIAL;
use crate::tokens::AsyncTokens;

/// A named callable exposed to templates.
///
/// The variant is decided at registration time, because the two kinds are
/// invoked differently: a synchronous helper computes its value inline
/// during the render pass, while an asynchronous helper only yields a
/// placeholder there and delivers its real value afterwards.
#[derive(Clone)]
pub enum Helper {
    Sync(Arc<dyn SyncHelperDef>),
    Async(Arc<dyn AsyncHelperDef>),
}

impl Helper {
    /// Wrap a synchronous helper function.
    pub fn sync<F>(f: F) -> Helper
    where
        F: SyncHelperDef + 'static,
    {
        Helper::Sync(Arc::new(f))
    }

    /// Wrap an asynchronous helper function.
    ///
    /// The helper's value is spliced into the output verbatim once it
    /// resolves. Used as a subexpression, an asynchronous helper is only
    /// supported in partial-name position (`{{> (helper ...)}}`); its
    /// result cannot feed another helper's parameter list.
    pub fn async_fn<F>(f: F) -> Helper
    where
        F: AsyncHelperDef + 'static,
    {
        Helper::Async(Arc::new(f))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Helper::Async(_))
    }
}

/// Synchronous helper: returns its value immediately.
pub trait SyncHelperDef: Send + Sync {
    fn call(&self, inv: &Invocation) -> Result<Json, EngineError>;
}

impl<F> SyncHelperDef for F
where
    F: Fn(&Invocation) -> Result<Json, EngineError> + Send + Sync,
{
    fn call(&self, inv: &Invocation) -> Result<Json, EngineError> {
        self(inv)
    }
}

/// Asynchronous helper: hands back a future resolved after the
/// synchronous render pass has completed.
pub trait AsyncHelperDef: Send + Sync {
    fn call(&self, inv: Invocation) -> BoxFuture<'static, Result<Json, EngineError>>;
}

impl<F> AsyncHelperDef for F
where
    F: Fn(Invocation) -> BoxFuture<'static, Result<Json, EngineError>> + Send + Sync,
{
    fn call(&self, inv: Invocation) -> BoxFuture<'static, Result<Json, EngineError>> {
        self(inv)
    }
}

/// Owned arguments for one helper invocation.
///
/// Params, hash and scope are detached from the runtime's borrowed types
/// so an asynchronous resolver can outlive the render pass that spawned
/// it.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub name: String,
    pub params: Vec<Json>,
    pub hash: BTreeMap<String, Json>,
    /// Value in scope at the call site.
    pub context: Json,
}

impl Invocation {
    pub fn param(&self, idx: usize) -> Option<&Json> {
        self.params.get(idx)
    }

    pub fn param_str(&self, idx: usize) -> Option<&str> {
        self.param(idx).and_then(Json::as_str)
    }

    fn from_binding<'reg: 'rc, 'rc>(
        h: &HelperBinding<'reg, 'rc>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
    ) -> Invocation {
        Invocation {
            name: h.name().to_owned(),
            params: h.params().iter().map(|p| p.value().clone()).collect(),
            hash: h
                .hash()
                .iter()
                .map(|(k, v)| (k.to_string(), v.value().clone()))
                .collect(),
            context: current_scope(ctx, rc),
        }
    }
}

/// Owned snapshot of the value in scope at the call site, falling back to
/// the root data when the path cannot be evaluated.
pub(crate) fn current_scope<'reg: 'rc, 'rc>(
    ctx: &'rc Context,
    rc: &RenderContext<'reg, 'rc>,
) -> Json {
    rc.evaluate(ctx, "this")
        .map(|scoped| scoped.as_json().clone())
        .unwrap_or_else(|_| ctx.data().clone())
}

/// Runs a synchronous helper inline. Implemented through `call_inner` so
/// the value is usable both in expression position and as a
/// subexpression (including dynamic partial names).
pub(crate) struct SyncHelperBridge {
    pub(crate) inner: Arc<dyn SyncHelperDef>,
}

impl HelperDef for SyncHelperBridge {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &HelperBinding<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let inv = Invocation::from_binding(h, ctx, rc);
        let value = self
            .inner
            .call(&inv)
            .map_err(|e| RenderError::new(e.to_string()))?;
        Ok(ScopedJson::Derived(value))
    }
}

/// Defers an asynchronous helper: the render pass receives a placeholder
/// token and the real computation is parked in the token registry.
pub(crate) struct AsyncHelperBridge {
    pub(crate) inner: Arc<dyn AsyncHelperDef>,
    pub(crate) tokens: Arc<AsyncTokens>,
}

impl AsyncHelperBridge {
    fn register(&self, inv: Invocation) -> String {
        let fut = self.inner.call(inv);
        self.tokens.register(
            Box::pin(async move {
                fut.await
                    .map(|value| value.render())
                    .map_err(EngineError::into_resolution)
            }),
            false,
        )
    }
}

impl HelperDef for AsyncHelperBridge {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &HelperBinding<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let token = self.register(Invocation::from_binding(h, ctx, rc));
        out.write(&token)?;
        Ok(())
    }

    // Subexpression position: the value is about to become a partial
    // name. Leave the token on the deferred-name stack and route the
    // runtime to the stub partial that picks it up.
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &HelperBinding<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let token = self.register(Invocation::from_binding(h, ctx, rc));
        self.tokens.push_deferred(token);
        Ok(ScopedJson::Derived(Json::String(DYNAMIC_PARTIAL.to_owned())))
    }
}
