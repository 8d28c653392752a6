use thiserror::Error;

/// Errors surfaced by the adapter.
///
/// Every failure a caller can observe is one of these tagged variants;
/// the runtime's own error types are wrapped rather than re-exported so
/// downstream engine registries only need to pattern-match on this enum
/// (or on the message, for the `parse error` case).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Template or partial source failed to parse.
    ///
    /// The message always carries the `parse error` prefix; engine
    /// registries match on that substring to classify failures.
    #[error("parse error in template: {0}")]
    Compile(#[from] handlebars::TemplateError),

    /// The runtime reported a failure during the synchronous render pass.
    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),

    /// A dynamically named partial could not be located once its name
    /// resolved to a concrete string.
    #[error("the partial {name:?} could not be resolved")]
    PartialNotFound { name: String },

    /// An asynchronous helper signalled failure while its placeholder was
    /// being resolved after the render pass.
    #[error("async helper resolution failed: {message}")]
    Resolution { message: String },

    /// The value handed to `render_file` does not look like a template
    /// file object.
    #[error("expected a template file object: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Build a `Resolution` error from any displayable message. This is
    /// the conventional failure value for user-written helpers.
    pub fn resolution<T: Into<String>>(message: T) -> EngineError {
        EngineError::Resolution {
            message: message.into(),
        }
    }

    /// Coerce an arbitrary engine error into the resolution family,
    /// keeping an already-tagged resolution failure untouched.
    pub(crate) fn into_resolution(self) -> EngineError {
        match self {
            e @ EngineError::Resolution { .. } => e,
            other => EngineError::Resolution {
                message: other.to_string(),
            },
        }
    }
}
