//! The shared, serializable configuration every crate in the workspace is
//! handed at construction time. `pdp-host`'s `clap`-derived `Opt` is the
//! thing a human fills in; this is what it gets turned into before being
//! threaded through the core, so no crate below `pdp-host` needs to know
//! about command-line parsing or environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Node identity string returned by `GET /pdp/ping` and logged at startup.
/// Kept as config rather than a constant (per the design note that global
/// state belongs in config, not in `const`s) so a deployment can report
/// whatever string its operators expect.
pub const DEFAULT_NODE_TYPE: &str = "pdp-storage-provider";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Reported by `/pdp/ping` and attached to every log line as a span field.
    pub node_type: String,

    /// Directory blobs are staged in before a commP job promotes them into
    /// the blobstore proper.
    pub stash_dir: PathBuf,

    /// Root directory the content-addressed blobstore is rooted at.
    pub blobstore_root: PathBuf,

    /// Postgres connection string for the `pdp-db` connection pool.
    pub database_url: String,

    /// Size of the `pdp-db` r2d2 connection pool.
    pub database_pool_size: u32,

    pub chain: ChainConfig,

    /// Number of concurrent workers per task-engine queue.
    pub task_workers_per_queue: usize,

    /// Maximum accepted request body size, enforced by the HTTP layer's
    /// body-size-limit middleware.
    pub max_body_size_bytes: usize,

    /// Bound on concurrent in-flight blob downloads the service will serve,
    /// used by the `Stop` shutdown poll.
    pub max_concurrent_downloads: usize,
    /// Bound on concurrent in-flight blob uploads, same purpose.
    pub max_concurrent_uploads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub verifier_address: String,
    pub service_view_address: String,
    pub registry_address: String,
    pub signing_service_url: String,
    /// How often the chain scheduler polls for new tip-sets when it has no
    /// subscription transport available.
    pub poll_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            node_type: DEFAULT_NODE_TYPE.to_string(),
            stash_dir: PathBuf::from("./data/stash"),
            blobstore_root: PathBuf::from("./data/blobstore"),
            database_url: "postgres://localhost/pdp".to_string(),
            database_pool_size: 10,
            chain: ChainConfig {
                rpc_url: "http://localhost:8545".to_string(),
                verifier_address: "0x0000000000000000000000000000000000000000".to_string(),
                service_view_address: "0x0000000000000000000000000000000000000000".to_string(),
                registry_address: "0x0000000000000000000000000000000000000000".to_string(),
                signing_service_url: "http://localhost:8080".to_string(),
                poll_interval_secs: 10,
            },
            task_workers_per_queue: 4,
            max_body_size_bytes: 1 << 30,
            max_concurrent_downloads: 64,
            max_concurrent_uploads: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes_round_trip() {
        let config = ServiceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.node_type, back.node_type);
        assert_eq!(config.chain.rpc_url, back.chain.rpc_url);
    }
}
