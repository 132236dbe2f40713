use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::Host;

/// Topology is the subset of a containerlab topology file the lab needs
#[derive(Debug, Clone, Deserialize)]
pub struct Topology {
    pub name: String,
    #[serde(default)]
    pub topology: TopologyNodes,
    /// Directory containerlab runs from; lab directories are relative to it
    #[serde(skip, default = "default_workdir")]
    pub workdir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyNodes {
    #[serde(default)]
    pub nodes: BTreeMap<String, serde_yaml::Value>,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

impl Topology {
    pub fn new(name: &str, workdir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            topology: TopologyNodes::default(),
            workdir: workdir.into(),
        }
    }

    /// Parse a containerlab topology file
    pub fn load(path: &Path, workdir: impl Into<PathBuf>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read topology file '{}'", path.display()))?;
        let mut topology: Topology = serde_yaml::from_str(&content)
            .with_context(|| format!("Unable to parse topology file '{}'", path.display()))?;
        topology.workdir = workdir.into();
        Ok(topology)
    }

    /// Name of the container backing a host, e.g. "clab-lab-spine1"
    pub fn container_name(&self, host: &Host) -> String {
        format!("clab-{}-{}", self.name, host.name)
    }

    /// Lab directory containerlab creates for a host
    pub fn node_dir(&self, host: &Host) -> PathBuf {
        self.workdir
            .join(format!("clab-{}", self.name))
            .join(&host.name)
    }

    /// Host directory bind-mounted as the device's flash
    pub fn flash_dir(&self, host: &Host) -> PathBuf {
        self.node_dir(host).join("flash")
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.topology.nodes.contains_key(name)
    }
}
