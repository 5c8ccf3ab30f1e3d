//! `authgate init` — generate a starter configuration file.
//!
//! Serializes a default [`Config`] in the chosen format. Defaults are
//! skipped during serialization, so the generated file stays minimal:
//! edit `auth.enforce` or the `forwarding` section to diverge from them.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::config::model::Config;
use crate::error::GatewayError;

const DEFAULT_UPSTREAM: &str = "http://localhost:8080";

pub fn execute(args: &InitArgs) -> Result<(), GatewayError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("authgate.{}", args.format.extension())));

    if output.exists() {
        return Err(GatewayError::FileExists { path: output });
    }

    let upstream = args.upstream.as_deref().unwrap_or(DEFAULT_UPSTREAM);
    let config = Config::for_upstream(upstream);
    let content = serialize_config(&config, &args.format)?;

    std::fs::write(&output, content)?;

    println!("Created {}", output.display());
    if args.upstream.is_none() {
        println!("\n  Edit upstream.url to point at your backend (currently {DEFAULT_UPSTREAM}).");
    }
    println!(
        "\n  Next steps:\n    authgate validate {}\n    authgate run -c {}",
        output.display(),
        output.display()
    );
    Ok(())
}

/// Serialize a `Config` to a formatted string in the given format.
fn serialize_config(config: &Config, format: &ConfigFormat) -> Result<String, GatewayError> {
    match format {
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => serde_yml::to_string(config)
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(not(feature = "yaml"))]
        ConfigFormat::Yaml => Err(GatewayError::UnsupportedFormat("yaml".into())),

        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(feature = "toml")]
        ConfigFormat::Toml => toml::to_string_pretty(config)
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(GatewayError::UnsupportedFormat("toml".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_starter_parses_back() {
        let config = Config::for_upstream("http://imgsrv:9000");
        let content = serialize_config(&config, &ConfigFormat::Json).unwrap();
        let parsed: Config = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.upstream.url, "http://imgsrv:9000");
        assert!(parsed.auth.enforce);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_starter_parses_back() {
        let config = Config::for_upstream("http://imgsrv:9000");
        let content = serialize_config(&config, &ConfigFormat::Yaml).unwrap();
        let parsed: Config = serde_yml::from_str(&content).unwrap();
        assert_eq!(parsed.upstream.url, "http://imgsrv:9000");
    }
}
