// src/formatting.rs

use crate::config::{env_flag, EnvSource};
use crate::message::{Location, Message};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

pub const LOG_TIMESTAMP_ENV: &str = "LOG_TIMESTAMP";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const LOG_REQID_ENV: &str = "LOG_REQID";
pub const LOG_ENVIRONMENT_ENV: &str = "LOG_ENVIRONMENT";

/// Which segments make up the timing/level prefix of an outgoing text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixSettings {
    pub timestamp: bool,
    pub level: bool,
    pub request_id: bool,
    pub environment: bool,
}

impl PrefixSettings {
    /// Applies `LOG_*` environment overrides. Only the literal strings
    /// `"true"` and `"false"` are honoured.
    pub fn resolve(&self, env: &dyn EnvSource) -> PrefixSettings {
        PrefixSettings {
            timestamp: env_flag(env, LOG_TIMESTAMP_ENV).unwrap_or(self.timestamp),
            level: env_flag(env, LOG_LEVEL_ENV).unwrap_or(self.level),
            request_id: env_flag(env, LOG_REQID_ENV).unwrap_or(self.request_id),
            environment: env_flag(env, LOG_ENVIRONMENT_ENV).unwrap_or(self.environment),
        }
    }
}

impl Message {
    /// Formats the `[timestamp:environment:LEVEL:request-id] ` prefix.
    ///
    /// Returns an empty string when no segment is enabled or available.
    pub fn prefix(&self, settings: &PrefixSettings, environment: &str) -> String {
        let mut segments: Vec<String> = Vec::with_capacity(4);
        if settings.timestamp {
            segments.push(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        if settings.environment && !environment.is_empty() {
            segments.push(environment.to_string());
        }
        if settings.level {
            segments.push(self.level.as_str().to_uppercase());
        }
        if settings.request_id {
            if let Some(request_id) = self.meta.request_id() {
                segments.push(request_id.to_string());
            }
        }

        if segments.is_empty() {
            String::new()
        } else {
            format!("[{}] ", segments.join(":"))
        }
    }

    /// Formats the `[project module function] ` caller-location prefix.
    pub fn location_prefix(&self) -> String {
        self.location
            .as_ref()
            .map(format_location)
            .unwrap_or_default()
    }

    /// Prepends the timing/level prefix and then the location prefix to `text`.
    pub fn prefixed(&self, text: &str, settings: &PrefixSettings, environment: &str) -> String {
        format!(
            "{}{}{}",
            self.prefix(settings, environment),
            self.location_prefix(),
            text
        )
    }
}

fn format_location(location: &Location) -> String {
    let parts: Vec<&str> = [&location.project, &location.module, &location.function]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!("[{}] ", parts.join(" "))
    }
}
