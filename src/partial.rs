//! Deferred resolution for dynamically named partials.
//!
//! A partial name produced by an asynchronous helper is not known while
//! the synchronous pass runs. The subexpression bridge leaves the
//! unresolved name on the deferred stack and yields the reserved stub
//! name instead, so the runtime's own partial machinery lands on the stub
//! below. The stub's body invokes [`DynamicPartialBridge`], which parks a
//! resolver that waits for the concrete name, renders the real partial,
//! and splices the result over a fresh placeholder.

use std::sync::{Arc, Weak};

use handlebars::{
    Context, Handlebars, Helper as HelperBinding, HelperDef, HelperResult, Output, RenderContext,
    RenderError,
};
use log::debug;
use serde_json::Value as Json;

use crate::engine::{build_pass_registry, PassState};
use crate::error::EngineError;
use crate::helper::current_scope;
use crate::tokens::{AsyncTokens, Resolver};

/// Reserved partial name that routes dynamically named inclusions through
/// the resolution bridge.
pub(crate) const DYNAMIC_PARTIAL: &str = "__dynamic_partial__";

/// Helper invoked by the stub partial's body.
pub(crate) const PARTIAL_BRIDGE: &str = "__resolve_partial__";

/// Body registered under [`DYNAMIC_PARTIAL`].
pub(crate) const PARTIAL_STUB_BODY: &str = "{{__resolve_partial__}}";

pub(crate) struct DynamicPartialBridge {
    pub(crate) pass: Arc<PassState>,
    pub(crate) tokens: Arc<AsyncTokens>,
}

impl HelperDef for DynamicPartialBridge {
    fn call<'reg: 'rc, 'rc>(
        &self,
        _: &HelperBinding<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let pending = self
            .tokens
            .pop_deferred()
            .ok_or_else(|| RenderError::new("dynamic partial invoked without a pending name"))?;
        let scope = current_scope(ctx, rc);
        let resolver = deferred_partial(
            Arc::clone(&self.pass),
            Arc::downgrade(&self.tokens),
            pending,
            scope,
        );
        // indent-aware: the substitution re-applies the call site's
        // leading whitespace to every line of the partial's output
        let token = self.tokens.register(resolver, true);
        out.write(&token)?;
        Ok(())
    }
}

/// Resolver for a partial whose name is still an unresolved placeholder.
///
/// Waits for the name's own token(s), looks the partial up in the pass
/// state, and renders it against the scope captured at the invocation
/// site. The nested render is bound to the same token registry, so any
/// asynchronous helpers it triggers feed back into the caller's
/// fixed-point loop.
fn deferred_partial(
    pass: Arc<PassState>,
    tokens: Weak<AsyncTokens>,
    pending: String,
    scope: Json,
) -> Resolver {
    Box::pin(async move {
        let tokens = tokens
            .upgrade()
            .ok_or_else(|| EngineError::resolution("render pass already finished"))?;
        let name = if tokens.has_pending(&pending) {
            tokens.resolve(pending).await?
        } else {
            pending
        };
        debug!("deferred partial resolved to name {:?}", name);
        let source = pass
            .partial(&name)
            .ok_or_else(|| EngineError::PartialNotFound { name: name.clone() })?;
        let registry = build_pass_registry(&pass, &tokens)?;
        let rendered = registry.render_template(source.as_ref(), &scope)?;
        Ok(rendered)
    })
}
