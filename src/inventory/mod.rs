use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::LabError;
use crate::fleet::Fleet;
use crate::models::{Credentials, Group, Host, HostData};

/// Inventory is loaded once at startup and never mutated afterwards
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub hosts: Vec<Arc<Host>>,
    pub groups: BTreeMap<String, Group>,
    pub defaults: Credentials,
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    defaults: Credentials,
    #[serde(default)]
    groups: BTreeMap<String, Group>,
    #[serde(default)]
    hosts: BTreeMap<String, HostEntry>,
}

#[derive(Debug, Deserialize)]
struct HostEntry {
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    data: HostData,
}

impl Inventory {
    /// Load an inventory YAML file with `defaults`, `groups` and `hosts` sections
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read inventory file '{}'", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Unable to parse inventory file '{}'", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: InventoryFile = serde_yaml::from_str(content)?;

        let mut hosts = Vec::with_capacity(file.hosts.len());
        for (name, entry) in file.hosts {
            if !crate::utils::is_valid_hostname(&name) {
                anyhow::bail!("Invalid host name '{}'", name);
            }
            for group in &entry.groups {
                if !file.groups.contains_key(group) {
                    tracing::debug!("{}: group '{}' has no group entry", name, group);
                }
            }
            hosts.push(Arc::new(Host {
                name,
                hostname: entry.hostname,
                groups: entry.groups,
                data: entry.data,
            }));
        }

        Ok(Self {
            hosts,
            groups: file.groups,
            defaults: file.defaults,
        })
    }

    /// Every host of the inventory as a fleet
    pub fn fleet(&self) -> Fleet {
        Fleet::new(self.hosts.clone())
    }

    pub fn group(&self, name: &str) -> Result<&Group, LabError> {
        self.groups
            .get(name)
            .ok_or_else(|| LabError::UnknownGroup(name.to_string()))
    }
}
