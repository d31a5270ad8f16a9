//! Command-Line Interface (CLI) argument parsing.
//!
//! These arguments are parsed at startup and merged, with the highest
//! priority, over the configuration file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Reads JSON-lines messages from stdin, prints them and forwards error-level
/// ones to the error-reporting backend.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Webhook endpoint notifications are posted to.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Logging level for the tool itself.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Force the link on or off, like the `logging` setting.
    #[arg(long, value_name = "BOOL")]
    pub logging: Option<bool>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(endpoint) = &self.endpoint {
            let mut webhook = Dict::new();
            webhook.insert("endpoint".into(), Value::from(endpoint.clone()));
            dict.insert("webhook".into(), Value::from(webhook));
        }

        if let Some(logging) = self.logging {
            let mut link = Dict::new();
            link.insert("logging".into(), Value::from(logging));
            dict.insert("link".into(), Value::from(link));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
