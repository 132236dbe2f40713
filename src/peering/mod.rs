mod network;
mod ripestat;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

pub use network::{Family, IpNetwork};
pub use ripestat::RipeStat;

/// Upper bound of loopback interfaces the peering template may create
pub const MAX_LOOPBACKS: u32 = 2100;

/// PrefixRegistry returns the prefixes currently announced by an AS
#[async_trait]
pub trait PrefixRegistry: Send + Sync {
    async fn announced_prefixes(&self, asn: u32) -> Result<Vec<String>>;
}

/// Drop every range that contains another range of the set, keeping the
/// more specific one. Duplicates collapse to one entry; input order is
/// otherwise preserved, and the result does not depend on it.
pub fn remove_overlaps(networks: &[IpNetwork]) -> Vec<IpNetwork> {
    let mut kept: Vec<IpNetwork> = Vec::with_capacity(networks.len());
    for network in networks {
        let is_outer = networks
            .iter()
            .any(|other| other != network && network.contains(other));
        if !is_outer && !kept.contains(network) {
            kept.push(*network);
        }
    }
    kept
}

/// Host and network literals derived from announced prefixes, per family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkVars {
    pub hosts: Vec<String>,
    pub hosts_ipv6: Vec<String>,
    pub prefixes: Vec<String>,
    pub prefixes_ipv6: Vec<String>,
}

/// Parse, deduplicate, partition and derive template variables
pub fn build_network_vars(prefixes: &[String]) -> Result<NetworkVars> {
    let networks = prefixes
        .iter()
        .map(|p| p.parse::<IpNetwork>())
        .collect::<Result<Vec<_>>>()
        .context("Registry returned an invalid prefix")?;

    let mut vars = NetworkVars::default();
    for network in remove_overlaps(&networks) {
        match network.family() {
            Family::V4 => {
                vars.hosts.push(network.first_host_cidr());
                vars.prefixes.push(network.to_string());
            }
            Family::V6 => {
                vars.hosts_ipv6.push(network.first_host_cidr());
                vars.prefixes_ipv6.push(network.to_string());
            }
        }
    }
    Ok(vars)
}

/// Full variable set of the peering template
#[derive(Debug, Clone, Serialize)]
pub struct PeeringVars {
    pub name: String,
    pub asn: u32,
    pub description: String,
    pub as_path_length: u32,
    pub max_loopback: u32,
    pub neighbor_name: String,
    pub neighbor_as: u32,
    pub neighbor_ipv4: Option<String>,
    pub neighbor_ipv6: Option<String>,
    #[serde(flatten)]
    pub networks: NetworkVars,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(list: &[&str]) -> Vec<IpNetwork> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn strings(list: &[IpNetwork]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_overlap_keeps_more_specific() {
        let kept = remove_overlaps(&nets(&["10.0.0.0/8", "10.1.0.0/16"]));
        assert_eq!(strings(&kept), vec!["10.1.0.0/16"]);

        let reversed = remove_overlaps(&nets(&["10.1.0.0/16", "10.0.0.0/8"]));
        assert_eq!(strings(&reversed), vec!["10.1.0.0/16"]);
    }

    #[test]
    fn test_overlap_chain_and_disjoint() {
        let kept = remove_overlaps(&nets(&[
            "10.0.0.0/8",
            "10.1.0.0/16",
            "10.1.2.0/24",
            "192.0.2.0/24",
            "2001:db8::/32",
            "2001:db8:1::/48",
        ]));
        assert_eq!(strings(&kept), vec!["10.1.2.0/24", "192.0.2.0/24", "2001:db8:1::/48"]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let kept = remove_overlaps(&nets(&["192.0.2.0/24", "192.0.2.0/24"]));
        assert_eq!(strings(&kept), vec!["192.0.2.0/24"]);
    }

    #[test]
    fn test_no_survivors_overlap() {
        let kept = remove_overlaps(&nets(&[
            "10.0.0.0/8", "10.128.0.0/9", "10.0.0.0/9", "10.64.0.0/10", "172.16.0.0/12",
        ]));
        for (i, a) in kept.iter().enumerate() {
            for b in kept.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{} overlaps {}", a, b);
            }
        }
    }

    #[test]
    fn test_build_network_vars_partitions_families() {
        let vars = build_network_vars(&[
            "193.0.0.0/21".to_string(),
            "193.0.0.0/16".to_string(),
            "2001:67c:2e8::/48".to_string(),
        ])
        .unwrap();

        assert_eq!(vars.hosts, vec!["193.0.0.1/21"]);
        assert_eq!(vars.prefixes, vec!["193.0.0.0/21"]);
        assert_eq!(vars.hosts_ipv6, vec!["2001:67c:2e8::1/48"]);
        assert_eq!(vars.prefixes_ipv6, vec!["2001:67c:2e8::/48"]);
    }

    #[test]
    fn test_build_network_vars_rejects_garbage() {
        assert!(build_network_vars(&["bogus".to_string()]).is_err());
    }
}
