//! Pipeline message types.
//!
//! A [`Message`] is one event flowing through the pipeline. Its metadata is an
//! ordered mapping of string keys to [`MetaValue`]s, a tagged union that keeps
//! error objects apart from plain values so that stages can look errors up by
//! type instead of probing shapes at runtime.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Metadata key holding the primary error of a message.
pub const ERROR_KEY: &str = "error";
/// Metadata key holding a per-message notify override.
pub const NOTIFY_KEY: &str = "notify";
/// Metadata key holding a stack trace captured alongside the text.
pub const STACK_KEY: &str = "stack";
/// Metadata key holding the id of the request that produced the message.
pub const REQUEST_ID_KEY: &str = "request_id";

/// Severity of a message, ordered from the most verbose to the most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Silly,
    Verbose,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Silly => "silly",
            Level::Verbose => "verbose",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silly" => Ok(Level::Silly),
            "verbose" => Ok(Level::Verbose),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// An error object carried in message metadata or sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorValue {
    #[serde(default = "default_error_name")]
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

fn default_error_name() -> String {
    "Error".to_string()
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: default_error_name(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Captures a Rust error, recording its source chain as the stack.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut value = Self::new(err.to_string());
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        if !causes.is_empty() {
            value.stack = Some(causes.join("\n"));
        }
        value
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ErrorValue {}

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Error(ErrorValue),
    Json(serde_json::Value),
}

impl MetaValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            MetaValue::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::String(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Number(value.into())
    }
}

impl From<u64> for MetaValue {
    fn from(value: u64) -> Self {
        MetaValue::Number(value.into())
    }
}

impl From<ErrorValue> for MetaValue {
    fn from(value: ErrorValue) -> Self {
        MetaValue::Error(value)
    }
}

impl From<serde_json::Value> for MetaValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => MetaValue::Null,
            serde_json::Value::Bool(b) => MetaValue::Bool(b),
            serde_json::Value::Number(n) => MetaValue::Number(n),
            serde_json::Value::String(s) => MetaValue::String(s),
            other => MetaValue::Json(other),
        }
    }
}

/// Message metadata. Keys keep their insertion order, which is the order
/// used when scanning for embedded errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    entries: Vec<(String, MetaValue)>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Merges another mapping into this one; later values win.
    pub fn extend(&mut self, other: Meta) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `notify` override, only when it holds a boolean.
    pub fn notify_override(&self) -> Option<bool> {
        self.get(NOTIFY_KEY).and_then(MetaValue::as_bool)
    }

    pub fn stack(&self) -> Option<&str> {
        self.get(STACK_KEY).and_then(MetaValue::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(REQUEST_ID_KEY).and_then(MetaValue::as_str)
    }

    /// Resolves the error to report: the `error` entry when it holds an
    /// error, otherwise the first error-typed value in key order.
    pub fn resolve_error(&self) -> Option<&ErrorValue> {
        self.get(ERROR_KEY)
            .and_then(MetaValue::as_error)
            .or_else(|| self.entries.iter().find_map(|(_, v)| v.as_error()))
    }
}

impl<K, V> FromIterator<(K, V)> for Meta
where
    K: Into<String>,
    V: Into<MetaValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Meta::new();
        for (key, value) in iter {
            meta.insert(key, value);
        }
        meta
    }
}

impl Serialize for Meta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Meta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MetaVisitor;

        impl<'de> Visitor<'de> for MetaVisitor {
            type Value = Meta;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a metadata object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Meta, A::Error> {
                let mut meta = Meta::new();
                while let Some((key, value)) = access.next_entry::<String, MetaValue>()? {
                    meta.insert(key, value);
                }
                Ok(meta)
            }
        }

        deserializer.deserialize_map(MetaVisitor)
    }
}

/// Caller location attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub project: Option<String>,
    pub module: Option<String>,
    pub function: Option<String>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.module.is_none() && self.function.is_none()
    }
}

/// The primary value a message is built from, and the payload handed to a
/// backend notifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Error(ErrorValue),
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<ErrorValue> for Payload {
    fn from(value: ErrorValue) -> Self {
        Payload::Error(value)
    }
}

/// One pipeline event. Stages receive it by shared reference and never
/// mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub level: Level,
    pub text: String,
    pub meta: Meta,
    pub timestamp: DateTime<Utc>,
    pub location: Option<Location>,
}

impl Message {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            meta: Meta::new(),
            timestamp: Utc::now(),
            location: None,
        }
    }

    /// Builds a message from a payload and a bundle of metadata mappings.
    ///
    /// An error payload becomes the text (its message) and is also stored
    /// under the `error` key together with its stack.
    pub fn from_payload(
        level: Level,
        payload: Payload,
        metadata: impl IntoIterator<Item = Meta>,
    ) -> Self {
        let mut message = Message::new(level, "");
        match payload {
            Payload::Text(text) => message.text = text,
            Payload::Error(error) => {
                message.text = error.message.clone();
                if let Some(stack) = &error.stack {
                    message.meta.insert(STACK_KEY, stack.clone());
                }
                message.meta.insert(ERROR_KEY, error);
            }
        }
        for meta in metadata {
            message.meta.extend(meta);
        }
        message
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta.extend(meta);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// A serialized message as accepted on the wire (e.g. JSON lines on stdin).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageRecord {
    pub level: Level,
    pub text: String,
    pub error: Option<ErrorValue>,
    pub meta: Meta,
    pub location: Option<Location>,
}

/// Builds messages on behalf of a pipeline, stamping a default caller
/// location when the caller supplies none.
#[derive(Debug, Clone, Default)]
pub struct MessageFactory {
    location: Option<Location>,
}

impl MessageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(location: Location) -> Self {
        Self {
            location: Some(location).filter(|l| !l.is_empty()),
        }
    }

    pub fn create(
        &self,
        level: Level,
        payload: Payload,
        metadata: impl IntoIterator<Item = Meta>,
    ) -> Message {
        let mut message = Message::from_payload(level, payload, metadata);
        message.location = self.location.clone();
        message
    }

    pub fn from_record(&self, record: MessageRecord) -> Message {
        let level = record.level;
        let mut message = match record.error {
            Some(error) if record.text.is_empty() => {
                Message::from_payload(level, Payload::Error(error), [record.meta])
            }
            Some(error) => Message::new(level, record.text)
                .with_meta(Meta::new().with(ERROR_KEY, error))
                .with_meta(record.meta),
            None => Message::from_payload(level, Payload::Text(record.text), [record.meta]),
        };
        message.location = record.location.or_else(|| self.location.clone());
        message
    }
}
