//! Context merging and the injected file abstraction.

use std::path::PathBuf;

use serde_json::{Map, Value as Json};

use crate::engine::CompiledTemplate;
use crate::error::EngineError;

/// JSON object used for template data.
pub type Object = Map<String, Json>;

/// Merge file-level `data` over caller `locals`, shallowly.
///
/// `data` wins on key conflicts. Neither input is mutated; non-object
/// locals pass through untouched when there is no data to merge.
pub fn merge_context(locals: &Json, data: Option<&Object>) -> Json {
    match (locals, data) {
        (Json::Object(locals), Some(data)) => {
            let mut merged = locals.clone();
            for (k, v) in data {
                merged.insert(k.clone(), v.clone());
            }
            Json::Object(merged)
        }
        (Json::Object(locals), None) => Json::Object(locals.clone()),
        (_, Some(data)) => Json::Object(data.clone()),
        (other, None) => other.clone(),
    }
}

/// In-memory file flowing through the build pipeline.
///
/// `contents` holds the template source before rendering and the rendered
/// output afterwards. `data` is file-level context that beats caller
/// locals during the merge, and `compiled` caches a compiled template so
/// repeated renders skip parsing.
#[derive(Debug, Clone, Default)]
pub struct TemplateFile {
    pub path: Option<PathBuf>,
    pub contents: String,
    pub data: Option<Object>,
    pub compiled: Option<CompiledTemplate>,
}

impl TemplateFile {
    pub fn new<S: Into<String>>(contents: S) -> TemplateFile {
        TemplateFile {
            contents: contents.into(),
            ..TemplateFile::default()
        }
    }

    pub fn with_data(mut self, data: Object) -> TemplateFile {
        self.data = Some(data);
        self
    }
}

impl TryFrom<Json> for TemplateFile {
    type Error = EngineError;

    /// Shape-check a loosely typed value before treating it as a file.
    /// Anything that is not an object with string `contents` is refused
    /// up front so `render_file` never guesses at malformed input.
    fn try_from(value: Json) -> Result<TemplateFile, EngineError> {
        let mut map = match value {
            Json::Object(map) => map,
            other => {
                return Err(EngineError::InvalidInput(format!(
                    "got {} instead of an object",
                    json_type(&other)
                )))
            }
        };
        let contents = match map.remove("contents") {
            Some(Json::String(s)) => s,
            Some(other) => {
                return Err(EngineError::InvalidInput(format!(
                    "`contents` must be a string, got {}",
                    json_type(&other)
                )))
            }
            None => {
                return Err(EngineError::InvalidInput(
                    "missing `contents` field".to_owned(),
                ))
            }
        };
        let data = match map.remove("data") {
            Some(Json::Object(data)) => Some(data),
            Some(other) => {
                return Err(EngineError::InvalidInput(format!(
                    "`data` must be an object, got {}",
                    json_type(&other)
                )))
            }
            None => None,
        };
        let path = map
            .remove("path")
            .and_then(|p| p.as_str().map(PathBuf::from));
        Ok(TemplateFile {
            path,
            contents,
            data,
            compiled: None,
        })
    }
}

fn json_type(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
