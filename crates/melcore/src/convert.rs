use crate::{AnyEnvelope, ConvertError};
use std::collections::HashMap;
use std::sync::Arc;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_JSON_PRETTY: &str = "application/json; format=pretty";

/// Wire format for envelopes. Implementations must keep every field,
/// including `errors` and `meta`.
pub trait Converter: Send + Sync {
    fn content_type(&self) -> &str;

    fn marshal(&self, envelope: &AnyEnvelope) -> Result<Vec<u8>, ConvertError>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<AnyEnvelope, ConvertError>;
}

/// JSON converter, compact or pretty printed
#[derive(Debug, Clone, Copy)]
pub struct JsonConverter {
    pretty: bool,
}

impl JsonConverter {
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Default for JsonConverter {
    fn default() -> Self {
        Self::compact()
    }
}

impl Converter for JsonConverter {
    fn content_type(&self) -> &str {
        if self.pretty {
            CONTENT_TYPE_JSON_PRETTY
        } else {
            CONTENT_TYPE_JSON
        }
    }

    fn marshal(&self, envelope: &AnyEnvelope) -> Result<Vec<u8>, ConvertError> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(envelope)
        } else {
            serde_json::to_vec(envelope)
        };
        encoded.map_err(ConvertError::Encode)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<AnyEnvelope, ConvertError> {
        serde_json::from_slice(bytes).map_err(ConvertError::Decode)
    }
}

/// Converters available to a process, keyed by content type
#[derive(Clone, Default)]
pub struct ConverterSet {
    converters: HashMap<String, Arc<dyn Converter>>,
}

impl ConverterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding the compact and pretty JSON converters.
    pub fn with_defaults() -> Self {
        let mut set = Self::new();
        set.register(Arc::new(JsonConverter::compact()));
        set.register(Arc::new(JsonConverter::pretty()));
        set
    }

    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        tracing::debug!(content_type = converter.content_type(), "Registering converter");
        self.converters
            .insert(converter.content_type().to_string(), converter);
    }

    pub fn get(&self, content_type: &str) -> Result<&Arc<dyn Converter>, ConvertError> {
        self.converters
            .get(content_type)
            .ok_or_else(|| ConvertError::UnsupportedContentType(content_type.to_string()))
    }

    pub fn marshal(&self, content_type: &str, envelope: &AnyEnvelope) -> Result<Vec<u8>, ConvertError> {
        self.get(content_type)?.marshal(envelope)
    }

    pub fn unmarshal(&self, content_type: &str, bytes: &[u8]) -> Result<AnyEnvelope, ConvertError> {
        self.get(content_type)?.unmarshal(bytes)
    }

    pub fn content_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.converters.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Converter>> {
        self.converters.values()
    }
}
