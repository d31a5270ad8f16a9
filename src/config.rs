//! Configuration for the notification link.
//!
//! Two layers are involved. [`LinkSettings`] is the settings object handed to
//! a link; the link then applies environment overrides on top of it through an
//! [`EnvSource`], with environment variables taking precedence. Registration
//! values are resolved once at construction while the enablement flag and the
//! minimum level are re-read on every call.
//!
//! [`AppConfig`] is what the command-line tool loads with `figment`: defaults,
//! then a TOML file, then `BUGSNAG_LINK_*` environment variables, then CLI
//! arguments.

use crate::cli::Cli;
use crate::error::Result;
use crate::formatting::PrefixSettings;
use crate::message::Level;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use tracing::warn;

pub const TOKEN_ENV: &str = "BUGS_TOKEN";
pub const TOKEN_FALLBACK_ENV: &str = "BUGSNAG_TOKEN";
pub const LOGGING_ENV: &str = "BUGSNAG_LOGGING";
pub const RELEASE_STAGES_ENV: &str = "BUGSNAG_RELEASE_STAGES";
pub const APP_VERSION_ENV: &str = "BUGSNAG_APP_VERSION";
pub const PRESET_ENV: &str = "BUGSNAG_PRESET";
pub const MIN_LOG_LEVEL_ENV: &str = "MIN_LOG_LEVEL";
pub const MIN_LOG_LEVEL_LINK_ENV: &str = "MIN_LOG_LEVEL_BUGSNAG";
pub const APP_ENV: &str = "APP_ENV";

/// Release stage reported when `APP_ENV` is unset.
pub const DEFAULT_RELEASE_STAGE: &str = "local";

/// A read-only view of environment variables.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment on every lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// An in-memory environment that can be changed while links hold it.
#[derive(Debug, Default)]
pub struct MapEnv {
    vars: RwLock<HashMap<String, String>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut vars) = self.vars.write() {
            vars.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut vars) = self.vars.write() {
            vars.remove(key);
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.read().ok().and_then(|vars| vars.get(key).cloned())
    }
}

/// Reads a tri-state flag: `Some` only for the literal `"true"`/`"false"`.
pub fn env_flag(env: &dyn EnvSource, key: &str) -> Option<bool> {
    match env.var(key).as_deref() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Environment value first, then the settings value, then the default.
pub fn resolve<T>(env_value: Option<T>, setting: Option<T>, default: T) -> T {
    env_value.or(setting).unwrap_or(default)
}

/// Splits a comma-separated stage list, dropping blank entries.
pub fn split_stages(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|stage| !stage.is_empty())
        .map(str::to_string)
        .collect()
}

/// What the link does when the backend fails to deliver a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendFailure {
    /// Return the error to the caller of `handle`.
    #[default]
    Propagate,
    /// Log the error and carry on.
    Log,
}

/// Named bundles of forced settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    DialOnce,
}

impl Preset {
    pub fn release_stages(&self) -> Vec<String> {
        match self {
            Preset::DialOnce => vec!["production".to_string(), "staging".to_string()],
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dial-once" => Ok(Preset::DialOnce),
            other => Err(format!("unknown preset '{}'", other)),
        }
    }
}

/// The settings object handed to a notification link.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Backend credential. Without it the link stays inert.
    pub token: Option<String>,
    /// Enablement flag; `None` falls back to the link policy default.
    pub logging: Option<bool>,
    /// Release stages for which the backend should deliver notifications.
    pub release_stages: Option<Vec<String>>,
    /// Minimum level the pipeline delivers to the link.
    pub min_log_level: Option<Level>,
    pub app_version: Option<String>,
    /// Preset name; `dial-once` is the only one recognized.
    pub preset: Option<String>,
    pub on_send_failure: SendFailure,
    pub prefix: PrefixSettings,
}

/// Options derived for the one-time backend registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub release_stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_release_stages: Option<Vec<String>>,
}

impl RegistrationOptions {
    /// Whether the current release stage is one notifications go out for.
    pub fn allows_release_stage(&self) -> bool {
        self.notify_release_stages
            .as_ref()
            .map_or(true, |stages| stages.iter().any(|s| *s == self.release_stage))
    }
}

impl LinkSettings {
    /// The credential, ignoring blank values.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// The preset named by `BUGSNAG_PRESET` or the settings. Unknown names
    /// are logged and ignored.
    pub fn preset(&self, env: &dyn EnvSource) -> Option<Preset> {
        let name = env.var(PRESET_ENV).or_else(|| self.preset.clone())?;
        match name.parse() {
            Ok(preset) => Some(preset),
            Err(e) => {
                warn!("Ignoring preset: {}", e);
                None
            }
        }
    }

    /// Resolves the registration options against the environment. A preset
    /// overrides any stage list from either source.
    pub fn registration_options(&self, env: &dyn EnvSource) -> RegistrationOptions {
        let notify_release_stages = match self.preset(env) {
            Some(preset) => Some(preset.release_stages()),
            None => env
                .var(RELEASE_STAGES_ENV)
                .map(|raw| split_stages(&raw))
                .or_else(|| self.release_stages.clone()),
        };

        RegistrationOptions {
            release_stage: env
                .var(APP_ENV)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_RELEASE_STAGE.to_string()),
            app_version: env.var(APP_VERSION_ENV).or_else(|| self.app_version.clone()),
            notify_release_stages,
        }
    }

    /// Resolves the minimum level: link-specific env var, then the general
    /// one, then the settings value. Unparseable values are skipped.
    pub fn min_level(&self, env: &dyn EnvSource) -> Level {
        let from_env = |key: &str| env.var(key).and_then(|raw| raw.parse::<Level>().ok());
        resolve(
            from_env(MIN_LOG_LEVEL_LINK_ENV).or_else(|| from_env(MIN_LOG_LEVEL_ENV)),
            self.min_log_level,
            Level::Silly,
        )
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Configuration for the JSON webhook notifier.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WebhookConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// The command-line tool's configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    /// The logging level for the tool itself.
    pub log_level: String,
    /// The settings object for the notification link.
    #[serde(default)]
    pub link: LinkSettings,
    /// When absent, notifications are written to the log instead.
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            link: LinkSettings::default(),
            webhook: None,
        }
    }
}

impl AppConfig {
    /// Loads the configuration by layering defaults, the optional TOML file,
    /// `BUGSNAG_LINK_*` environment variables and the CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: AppConfig = figment
            // Nested keys use a double underscore, e.g. BUGSNAG_LINK_LINK__LOGGING=true
            .merge(Env::prefixed("BUGSNAG_LINK_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}
