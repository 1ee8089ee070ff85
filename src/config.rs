use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_versions() -> Vec<u16> {
    vec![5, 9]
}

fn default_sflow() -> bool {
    true
}

fn default_sample_types() -> Vec<u32> {
    vec![
        crate::sflow::SAMPLE_FLOW,
        crate::sflow::SAMPLE_COUNTER,
        crate::sflow::SAMPLE_EXPANDED_FLOW,
        crate::sflow::SAMPLE_EXPANDED_COUNTER,
    ]
}

fn default_transaction_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// UDP ports the host binds for flow export. The decoder itself never
    /// touches a socket; the list is carried for the embedding collector.
    #[serde(default)]
    pub ports: Vec<u16>,

    /// NetFlow versions to attempt, any subset of {5, 9, 10}. Datagrams
    /// with a version outside this list fail with `UnsupportedVersion`.
    #[serde(default = "default_versions")]
    pub versions: Vec<u16>,

    /// Whether sFlow v5 datagrams are decoded at all.
    #[serde(default = "default_sflow")]
    pub sflow: bool,

    /// sFlow sample tags to decode. Samples with a tag outside this list
    /// are skipped by their declared length.
    #[serde(default = "default_sample_types")]
    pub sample_types: Vec<u32>,

    /// Upper bound on template age, for hosts that periodically purge the
    /// template cache. The decoder does not evict on its own.
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ports: Vec::new(),
            versions: default_versions(),
            sflow: default_sflow(),
            sample_types: default_sample_types(),
            transaction_timeout: default_transaction_timeout(),
        }
    }
}

impl Config {
    pub fn decodes_version(&self, version: u16) -> bool {
        self.versions.contains(&version)
    }

    pub fn decodes_sample_type(&self, tag: u32) -> bool {
        self.sample_types.contains(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert!(config.decodes_version(5));
        assert!(config.decodes_version(9));
        assert!(!config.decodes_version(10));
        assert!(config.sflow);
        assert!(config.decodes_sample_type(1));
        assert!(!config.decodes_sample_type(999));
    }

    #[test]
    fn deserialize_overrides() {
        let config: Config = serde_json::from_str(
            r#"{"versions": [9], "sample_types": [1, 3], "ports": [2055, 6343]}"#,
        )
        .unwrap();

        assert!(!config.decodes_version(5));
        assert!(config.decodes_version(9));
        assert!(!config.decodes_sample_type(2));
        assert_eq!(config.ports, vec![2055, 6343]);
        assert_eq!(config.transaction_timeout, Duration::from_secs(10));
    }
}
