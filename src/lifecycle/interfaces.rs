use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_yaml::Value;

use super::Lab;
use crate::device::ApplyMode;
use crate::error::LabError;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::{Host, CONFIG_CHANGED};

const ISIS_INSTANCE: &str = "ISIS Instance";
const ISIS_METRIC: &str = "ISIS Metric";

/// Addressing of one side of a point-to-point link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfacePlan {
    pub description: String,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub isis_instance: Option<String>,
    pub isis_metric: Option<String>,
}

impl InterfacePlan {
    /// EOS interface stanza for `interface`
    pub fn to_config(&self, interface: &str) -> String {
        let mut config = format!("interface {}\n   no switchport\n   description {}\n", interface, self.description);
        if let Some(ipv4) = &self.ipv4 {
            let _ = writeln!(config, "   ip address {}", ipv4);
        }
        if let Some(ipv6) = &self.ipv6 {
            let _ = writeln!(config, "   ipv6 address {}", ipv6);
        }
        if let Some(instance) = &self.isis_instance {
            let _ = writeln!(config, "   isis enable {}", instance);
            config.push_str("   isis network point-to-point\n");
            if let Some(metric) = &self.isis_metric {
                let _ = writeln!(config, "   isis metric {}", metric);
            }
        }
        config
    }
}

/// IpPlan maps host name to interface name to interface addressing.
///
/// The plan file is a YAML list of link rows keyed by the column names of
/// the lab IP plan sheet (`Device 1`, `Interface 1`, `IPv4 Address 1`, ...).
/// Every row configures both ends of the link.
#[derive(Debug, Clone, Default)]
pub struct IpPlan {
    hosts: BTreeMap<String, BTreeMap<String, InterfacePlan>>,
}

impl IpPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read IP plan '{}'", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let rows: Vec<BTreeMap<String, Value>> =
            serde_yaml::from_str(content).context("IP plan must be a list of link rows")?;

        let mut plan = IpPlan::default();
        for (index, row) in rows.iter().enumerate() {
            let row_number = index + 1;
            for (local, remote) in [(1, 2), (2, 1)] {
                let device = required(row, row_number, &format!("Device {}", local))?;
                let interface = required(row, row_number, &format!("Interface {}", local))?;
                let neighbor = required(row, row_number, &format!("Device {}", remote))?;
                let neighbor_interface = required(row, row_number, &format!("Interface {}", remote))?;

                let entry = InterfacePlan {
                    description: format!("to {} {}", neighbor, neighbor_interface),
                    ipv4: cell(row, &format!("IPv4 Address {}", local)),
                    ipv6: cell(row, &format!("IPv6 Address {}", local)),
                    isis_instance: cell(row, ISIS_INSTANCE),
                    isis_metric: cell(row, ISIS_METRIC),
                };
                plan.hosts.entry(device).or_default().insert(interface, entry);
            }
        }
        Ok(plan)
    }

    pub fn interfaces(&self, host: &str) -> Option<&BTreeMap<String, InterfacePlan>> {
        self.hosts.get(host)
    }

    /// Merged stanza text for every interface of `host`, or None when the host has no link
    pub fn host_config(&self, host: &str) -> Option<String> {
        self.interfaces(host).map(|interfaces| {
            interfaces
                .iter()
                .map(|(name, plan)| plan.to_config(name))
                .collect::<String>()
        })
    }
}

/// Non-empty cell value rendered as text
fn cell(row: &BTreeMap<String, Value>, column: &str) -> Option<String> {
    let text = match row.get(column)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn required(row: &BTreeMap<String, Value>, row_number: usize, column: &str) -> Result<String, LabError> {
    cell(row, column).ok_or_else(|| LabError::IpPlan {
        row: row_number,
        reason: format!("'{}' is empty", column),
    })
}

impl Lab {
    /// Configure the point-to-point interfaces described by the IP plan at `links`
    pub async fn configure_interfaces(self: &Arc<Self>, fleet: &Fleet, links: &Path) -> Result<AggregatedResult> {
        let plan = IpPlan::load(links)?;
        Ok(self.configure_interfaces_with(fleet, plan).await)
    }

    pub async fn configure_interfaces_with(self: &Arc<Self>, fleet: &Fleet, plan: IpPlan) -> AggregatedResult {
        let lab = self.clone();
        let plan = Arc::new(plan);
        fleet
            .run("Configure point-to-point interfaces", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                let plan = plan.clone();
                async move {
                    let outcome = lab.configure_host_interfaces(&host, &plan, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    async fn configure_host_interfaces(&self, host: &Host, plan: &IpPlan, progress: &Progress) -> Result<Outcome> {
        let Some(config) = plan.host_config(&host.name) else {
            progress.log(format!("{}: No point-to-point interface in IP plan.", host));
            return Ok(Outcome::Unchanged);
        };

        let changed = self.device.apply_config(host, &config, ApplyMode::Merge).await?;
        progress.log(format!(
            "{}: Point-to-point interfaces configured.{}",
            host,
            if changed { CONFIG_CHANGED } else { "" }
        ));
        Ok(Outcome::changed(changed))
    }
}
