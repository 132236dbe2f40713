use serde::{Deserialize, Serialize};

use crate::error::LabError;

/// Host is one managed device of the lab
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    /// Management address; the container name is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub data: HostData,
}

/// HostData holds the optional per-host inventory fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    /// Display name of the peer network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_path_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbor_ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbor_ipv6: Option<String>,
}

impl Host {
    pub fn new(name: &str, groups: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            hostname: None,
            groups: groups.iter().map(|g| g.to_string()).collect(),
            data: HostData::default(),
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Unwrap an optional data field, naming it in the error when absent
    pub fn require<T: Clone>(&self, value: &Option<T>, field: &'static str) -> Result<T, LabError> {
        value.clone().ok_or_else(|| LabError::MissingHostData {
            host: self.name.clone(),
            field,
        })
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Group is an inventory group; only its data is read by operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub data: GroupData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
}

/// Device credentials shared by every host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}
