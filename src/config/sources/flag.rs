//! In-memory config source for flag-driven startup.
//!
//! [`FlagSource`] wraps a config synthesized from `--upstream` so the
//! run command can treat flag-only and file-backed startup uniformly.
//! It never reports a change, so the refresh loop stays idle.

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::GatewayError;

pub struct FlagSource {
    config: Config,
}

impl FlagSource {
    #[must_use]
    pub fn new(upstream_url: &str) -> Self {
        Self {
            config: Config::for_upstream(upstream_url),
        }
    }
}

#[async_trait]
impl ConfigSource for FlagSource {
    fn name(&self) -> &'static str {
        "flags"
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), GatewayError> {
        if let Err(errors) = validate(&self.config) {
            return Err(GatewayError::ConfigValidation { errors });
        }

        let serialized =
            serde_json::to_string(&self.config).map_err(|e| GatewayError::ConfigParse {
                path: "flags".into(),
                source: Box::new(e),
            })?;

        let hash = sha256_hex(serialized.as_bytes());
        Ok((self.config.clone(), ConfigVersion::Hash(hash)))
    }

    async fn has_changed(&self, _current: &ConfigVersion) -> Result<bool, GatewayError> {
        Ok(false)
    }
}
