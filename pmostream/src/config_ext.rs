//! Extension pour intégrer les réglages du service de streaming dans pmoconfig
//!
//! Toutes les clés vivent sous `host.streams` :
//!
//! ```yaml
//! host:
//!   streams:
//!     directory: streams
//!     ttl_secs: 3600
//!     sweep_interval_secs: 3600
//!     max_jobs: 0
//!     max_concurrent_fetches: 4
//!     fetch_timeout_secs: 1800
//!     reuse_ready: false
//!     api_key: ""
//! ```

use crate::coordinator::DEFAULT_MAX_CONCURRENT_FETCHES;
use crate::service::StreamSettings;
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use std::time::Duration;

const STREAMS: &str = "streams";
const DEFAULT_DIRECTORY: &str = "streams";
const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 1800;

/// Trait d'extension pour lire les réglages de streaming depuis pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmostream::StreamConfigExt;
///
/// let config = get_config();
/// let settings = config.get_stream_settings()?;
/// ```
pub trait StreamConfigExt {
    /// Répertoire de travail (absolu ou relatif au répertoire de config)
    fn get_streams_dir(&self) -> Result<String>;

    fn set_streams_dir(&self, directory: String) -> Result<()>;

    /// Durée d'inactivité avant éviction
    fn get_streams_ttl(&self) -> Duration;

    fn set_streams_ttl(&self, ttl: Duration) -> Result<()>;

    fn get_streams_sweep_interval(&self) -> Duration;

    fn get_streams_max_jobs(&self) -> usize;

    fn get_streams_max_concurrent_fetches(&self) -> usize;

    /// `None` si la valeur configurée est 0
    fn get_streams_fetch_timeout(&self) -> Option<Duration>;

    fn get_streams_reuse_ready(&self) -> bool;

    fn set_streams_reuse_ready(&self, reuse: bool) -> Result<()>;

    /// Clé d'API exigée pour soumettre ; `None` si vide
    fn get_streams_api_key(&self) -> Option<String>;

    /// Assemble tous les réglages du service
    fn get_stream_settings(&self) -> Result<StreamSettings>;
}

impl StreamConfigExt for Config {
    fn get_streams_dir(&self) -> Result<String> {
        self.get_managed_dir(&["host", STREAMS, "directory"], DEFAULT_DIRECTORY)
    }

    fn set_streams_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["host", STREAMS, "directory"], directory)
    }

    fn get_streams_ttl(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(&["host", STREAMS, "ttl_secs"], DEFAULT_TTL_SECS))
    }

    fn set_streams_ttl(&self, ttl: Duration) -> Result<()> {
        self.set_value(
            &["host", STREAMS, "ttl_secs"],
            Value::Number(Number::from(ttl.as_secs())),
        )
    }

    fn get_streams_sweep_interval(&self) -> Duration {
        let secs = self.get_u64_or(
            &["host", STREAMS, "sweep_interval_secs"],
            DEFAULT_SWEEP_INTERVAL_SECS,
        );
        Duration::from_secs(secs.max(1))
    }

    fn get_streams_max_jobs(&self) -> usize {
        self.get_u64_or(&["host", STREAMS, "max_jobs"], 0) as usize
    }

    fn get_streams_max_concurrent_fetches(&self) -> usize {
        let n = self.get_u64_or(
            &["host", STREAMS, "max_concurrent_fetches"],
            DEFAULT_MAX_CONCURRENT_FETCHES as u64,
        );
        (n as usize).max(1)
    }

    fn get_streams_fetch_timeout(&self) -> Option<Duration> {
        match self.get_u64_or(
            &["host", STREAMS, "fetch_timeout_secs"],
            DEFAULT_FETCH_TIMEOUT_SECS,
        ) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn get_streams_reuse_ready(&self) -> bool {
        matches!(
            self.get_value(&["host", STREAMS, "reuse_ready"]),
            Ok(Value::Bool(true))
        )
    }

    fn set_streams_reuse_ready(&self, reuse: bool) -> Result<()> {
        self.set_value(&["host", STREAMS, "reuse_ready"], Value::Bool(reuse))
    }

    fn get_streams_api_key(&self) -> Option<String> {
        match self.get_value(&["host", STREAMS, "api_key"]) {
            Ok(Value::String(key)) if !key.trim().is_empty() => Some(key.trim().to_string()),
            _ => None,
        }
    }

    fn get_stream_settings(&self) -> Result<StreamSettings> {
        let mut settings = StreamSettings::new(self.get_streams_dir()?);
        settings.ttl = self.get_streams_ttl();
        settings.sweep_interval = self.get_streams_sweep_interval();
        settings.max_jobs = self.get_streams_max_jobs();
        settings.reuse_ready = self.get_streams_reuse_ready();
        settings.max_concurrent_fetches = self.get_streams_max_concurrent_fetches();
        settings.fetch_timeout = self.get_streams_fetch_timeout();
        Ok(settings)
    }
}
