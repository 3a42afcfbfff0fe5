//! # config
//!
//! why: tell a node where its durable state lives and who its peers are
//! relations: loaded by the raft-node binary, consumed by raft-storage's open_node
//! what: NodeConfig, ServerEntry, yaml/json loading and validation

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::term::NodeId;

/// One member of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: NodeId,
    pub port: u32,
    /// marks the entry describing this process
    #[serde(default)]
    pub local: bool,
}

/// Validated startup configuration for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub term_info_path: PathBuf,
    pub log_path: PathBuf,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

/// on-disk shape: everything lives under a top-level "config" key
#[derive(Deserialize)]
struct ConfigFile {
    config: RawConfig,
}

#[derive(Deserialize)]
struct RawConfig {
    term_info_path: PathBuf,
    log_path: PathBuf,
    #[serde(default)]
    servers: Vec<RawServer>,
}

/// `id` may be left out, in which case the server's 1-based position is used
#[derive(Deserialize)]
struct RawServer {
    #[serde(default)]
    id: Option<NodeId>,
    port: u32,
    #[serde(default)]
    local: bool,
}

impl From<RawConfig> for NodeConfig {
    fn from(raw: RawConfig) -> Self {
        let servers = raw
            .servers
            .into_iter()
            .zip(1..)
            .map(|(server, position)| ServerEntry {
                id: server.id.unwrap_or(position),
                port: server.port,
                local: server.local,
            })
            .collect();
        Self {
            term_info_path: raw.term_info_path,
            log_path: raw.log_path,
            servers,
        }
    }
}

impl NodeConfig {
    /// Parse and validate a json config document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(text).map_err(|e| Error::Config(format!("json: {e}")))?;
        Self::checked(file)
    }

    /// Parse and validate a yaml config document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_yaml::from_str(text).map_err(|e| Error::Config(format!("yaml: {e}")))?;
        Self::checked(file)
    }

    /// Load a config file, read as yaml first and as json if that fails.
    ///
    /// Only parsing falls through to json; a document that parses but does
    /// not validate is rejected straight away.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io("read config", path, e))?;
        let file = match serde_yaml::from_str::<ConfigFile>(&text) {
            Ok(file) => file,
            Err(yaml) => serde_json::from_str::<ConfigFile>(&text).map_err(|json| {
                Error::Config(format!(
                    "{} is neither yaml ({yaml}) nor json ({json})",
                    path.display()
                ))
            })?,
        };
        Self::checked(file)
    }

    fn checked(file: ConfigFile) -> Result<Self> {
        let config = NodeConfig::from(file.config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.term_info_path.as_os_str().is_empty() {
            return Err(Error::Config("term_info_path is not set".into()));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(Error::Config("log_path is not set".into()));
        }
        if self.term_info_path == self.log_path {
            return Err(Error::Config(
                "term_info_path and log_path must be different files".into(),
            ));
        }

        let locals = self.servers.iter().filter(|s| s.local).count();
        if locals > 1 {
            return Err(Error::Config(format!(
                "{locals} servers are marked local, at most one is allowed"
            )));
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.id) {
                return Err(Error::Config(format!("duplicate server id {}", server.id)));
            }
        }
        Ok(())
    }

    /// Id of the entry marked local, if any
    pub fn local_id(&self) -> Option<NodeId> {
        self.servers.iter().find(|s| s.local).map(|s| s.id)
    }

    /// Ids of every server other than the local one
    pub fn peer_ids(&self) -> Vec<NodeId> {
        self.servers
            .iter()
            .filter(|s| !s.local)
            .map(|s| s.id)
            .collect()
    }
}
