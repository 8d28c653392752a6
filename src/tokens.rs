//! Placeholder bookkeeping for asynchronous helpers.
//!
//! The runtime's render pass is synchronous string concatenation. When a
//! helper cannot produce its value inline, the pass writes an opaque
//! placeholder token instead and the real computation is parked here,
//! keyed by that token. After the pass finishes, [`AsyncTokens::resolve`]
//! substitutes every placeholder with its resolved value, looping until
//! none remain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use log::{debug, trace};

use crate::error::EngineError;

/// Deferred computation producing the final text for one token.
pub(crate) type Resolver = BoxFuture<'static, Result<String, EngineError>>;

/// Registry instance ids come from a process-wide counter so tokens from
/// overlapping renders can never collide.
static INSTANCE_SEQ: AtomicU64 = AtomicU64::new(0);

struct Entry {
    resolver: Resolver,
    /// Deferred partials re-apply the call site's indentation to every
    /// line of the substituted result; plain helper values do not.
    indent_aware: bool,
}

/// Pending-token set for a single render invocation.
///
/// One instance is created per top-level `render` call and shared, via
/// `Arc`, with every helper bridge and nested pass belonging to that
/// render. It is never reused across renders.
pub(crate) struct AsyncTokens {
    instance: u64,
    seq: AtomicU64,
    entries: Mutex<HashMap<String, Entry>>,
    /// Names of dynamic partials waiting to be picked up by the partial
    /// bridge, pushed by the subexpression that produced them.
    deferred: Mutex<Vec<String>>,
}

impl AsyncTokens {
    pub(crate) fn new() -> Arc<AsyncTokens> {
        Arc::new(AsyncTokens {
            instance: INSTANCE_SEQ.fetch_add(1, Ordering::Relaxed),
            seq: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
            deferred: Mutex::new(Vec::new()),
        })
    }

    /// Store `resolver` and hand back a fresh placeholder to embed in the
    /// render output. Each token is handed out exactly once.
    pub(crate) fn register(&self, resolver: Resolver, indent_aware: bool) -> String {
        let token = format!(
            "__async_{}_{}__",
            self.instance,
            self.seq.fetch_add(1, Ordering::Relaxed)
        );
        self.entries.lock().unwrap().insert(
            token.clone(),
            Entry {
                resolver,
                indent_aware,
            },
        );
        trace!("registered async token {}", token);
        token
    }

    /// Whether `candidate` is, or embeds, a live placeholder.
    pub(crate) fn has_pending(&self, candidate: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .keys()
            .any(|token| candidate.contains(token.as_str()))
    }

    pub(crate) fn push_deferred(&self, name: String) {
        self.deferred.lock().unwrap().push(name);
    }

    pub(crate) fn pop_deferred(&self) -> Option<String> {
        self.deferred.lock().unwrap().pop()
    }

    /// Remove and return one entry whose token occurs in `haystack`.
    fn take_embedded(&self, haystack: &str) -> Option<(String, Entry)> {
        let mut entries = self.entries.lock().unwrap();
        let token = entries
            .keys()
            .find(|token| haystack.contains(token.as_str()))?
            .clone();
        let entry = entries.remove(&token)?;
        Some((token, entry))
    }

    /// Substitute every live token embedded in `input` with its resolved
    /// value, repeating until a pass finds none.
    ///
    /// This must loop rather than scan once: a resolver may render nested
    /// templates against the same registry and therefore emit new tokens
    /// of its own. A resolver failure aborts the whole loop; the caller
    /// never sees partially substituted output. Entries whose token never
    /// reached `input` are left untouched and dropped with the registry.
    pub(crate) fn resolve(&self, input: String) -> BoxFuture<'_, Result<String, EngineError>> {
        Box::pin(async move {
            let mut out = input;
            while let Some((token, entry)) = self.take_embedded(&out) {
                debug!("resolving async token {}", token);
                let value = entry.resolver.await?;
                out = substitute(&out, &token, &value, entry.indent_aware);
            }
            Ok(out)
        })
    }
}

/// Replace every occurrence of `token` in `source` with `value`, applying
/// the indentation fix-up for partial substitutions. Each replacement is
/// whole-token for whole-value; a token is never split.
fn substitute(source: &str, token: &str, value: &str, indent_aware: bool) -> String {
    let replacement = if indent_aware {
        match line_indent(source, token) {
            Some(indent) => indent_lines(value, &indent),
            None => value.to_owned(),
        }
    } else {
        value.to_owned()
    };
    source.replace(token, &replacement)
}

/// Whitespace prefix of the line `token` starts on, provided the token is
/// the first non-whitespace content of that line.
fn line_indent(source: &str, token: &str) -> Option<String> {
    let pos = source.find(token)?;
    let line_start = source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &source[line_start..pos];
    if !prefix.is_empty() && prefix.chars().all(|c| c == ' ' || c == '\t') {
        Some(prefix.to_owned())
    } else {
        None
    }
}

/// Prefix every line after the first with `indent`, skipping a trailing
/// empty line. The first line keeps the indent already present at the
/// call site.
fn indent_lines(value: &str, indent: &str) -> String {
    let total = value.split('\n').count();
    let mut out = String::with_capacity(value.len() + indent.len() * total);
    for (i, line) in value.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !(line.is_empty() && i + 1 == total) {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}
