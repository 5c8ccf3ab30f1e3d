//! Serde data structures for the authgate configuration file.
//!
//! Contains [`Config`] (the root), [`Upstream`], [`Auth`],
//! [`Forwarding`], and [`HeaderRules`]. All types derive `Serialize`
//! and `Deserialize` with `deny_unknown_fields` for strict parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const fn default_timeout() -> u64 {
    30_000
}

const fn default_true() -> bool {
    true
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_default_auth(v: &Auth) -> bool {
    v.enforce
}

fn is_default_forwarding(v: &Forwarding) -> bool {
    v.timeout == default_timeout()
        && v.forward_headers
        && v.proxy_headers
        && v.strip_hop_by_hop
        && v.headers.is_default()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub upstream: Upstream,

    #[serde(default, skip_serializing_if = "is_default_auth")]
    pub auth: Auth,

    #[serde(default, skip_serializing_if = "is_default_forwarding")]
    pub forwarding: Forwarding,
}

impl Config {
    /// Minimal config for running straight from `--upstream` with no file.
    #[must_use]
    pub fn for_upstream(url: &str) -> Self {
        Self {
            upstream: Upstream {
                url: url.to_string(),
            },
            auth: Auth::default(),
            forwarding: Forwarding::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Upstream {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Auth {
    /// Reject requests without an `Authorization` header.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub enforce: bool,
}

impl Default for Auth {
    fn default() -> Self {
        Self { enforce: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Forwarding {
    /// Upstream call timeout in milliseconds.
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub forward_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub proxy_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub strip_hop_by_hop: bool,

    #[serde(default, skip_serializing_if = "HeaderRules::is_default")]
    pub headers: HeaderRules,
}

impl Default for Forwarding {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            forward_headers: default_true(),
            proxy_headers: default_true(),
            strip_hop_by_hop: default_true(),
            headers: HeaderRules::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRules {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub add: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strip: Vec<String>,
}

impl HeaderRules {
    pub(crate) fn is_default(&self) -> bool {
        self.add.is_empty() && self.strip.is_empty()
    }
}
