//! Pub/sub broker endpoint configuration.
//!
//! The core never dials the broker itself; these parameters are handed to
//! the embedding process, which owns connection establishment and retry
//! policy.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct BrokerConfig {
    /// Leading topic segment for telemetry, alert, and control topics.
    #[serde(default = "default_namespace")]
    #[validate(custom(function = validation::validate_topic_segment))]
    pub namespace: String,

    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Client identifier prefix; the assay id is appended at connect time.
    #[serde(default = "default_client_id")]
    #[validate(custom(function = validation::validate_topic_segment))]
    pub client_id: String,
}

fn default_namespace() -> String {
    "rumen".into()
}
fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "rumensim".into()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        BrokerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_namespace_with_separator() {
        let config = BrokerConfig {
            namespace: "rumen/extra".into(),
            ..BrokerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
