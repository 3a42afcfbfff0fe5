//! # raft-node
//!
//! why: start a node from its config file and refuse to run on state it cannot recover
//! relations: loads raft_core::NodeConfig, opens state through raft_storage::open_node
//! what: process entry point, logger setup

use std::env;
use std::path::PathBuf;
use std::process;

use log::{error, info, LevelFilter};
use raft_core::NodeConfig;
use simple_logger::SimpleLogger;

/// Looked up in the working directory, in order, when no path is given
const DEFAULT_CONFIGS: [&str; 2] = ["raft.yaml", "raft.json"];

fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("could not install logger: {e}");
    }

    let candidates: Vec<PathBuf> = match env::args_os().nth(1) {
        Some(path) => vec![PathBuf::from(path)],
        None => DEFAULT_CONFIGS.into_iter().map(PathBuf::from).collect(),
    };

    let config = match load_config(&candidates) {
        Some(config) => config,
        None => process::exit(1),
    };

    let node = match raft_storage::open_node(&config) {
        Ok(node) => node,
        Err(e) => {
            error!("could not recover node state: {e}");
            process::exit(1);
        }
    };

    info!(
        "node {} starting up in term {} as {:?} with {} log entries",
        node.id(),
        node.current_term(),
        node.state(),
        node.last_log_index()
    );
}

/// First candidate that loads and validates. Every failure is logged.
fn load_config(candidates: &[PathBuf]) -> Option<NodeConfig> {
    for path in candidates {
        match NodeConfig::from_file(path) {
            Ok(config) => {
                info!("read config from {}", path.display());
                return Some(config);
            }
            Err(e) => error!("could not read config from {}: {e}", path.display()),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONFIG: &str = "config: {term_info_path: t, log_path: l, servers: [{port: 7001, local: true}]}";

    #[test]
    fn falls_back_to_the_next_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("raft.json");
        fs::write(&json, r#"{"config": {"term_info_path": "t", "log_path": "l"}}"#).unwrap();

        let config = load_config(&[dir.path().join("raft.yaml"), json]).unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn first_loadable_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("raft.yaml");
        let json = dir.path().join("raft.json");
        fs::write(&yaml, CONFIG).unwrap();
        fs::write(&json, r#"{"config": {"term_info_path": "t", "log_path": "l"}}"#).unwrap();

        let config = load_config(&[yaml, json]).unwrap();
        assert_eq!(config.local_id(), Some(1));
    }

    #[test]
    fn no_loadable_candidate_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&[dir.path().join("raft.yaml")]).is_none());
    }
}
