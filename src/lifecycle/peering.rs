use std::sync::Arc;

use anyhow::{Context as _, Result};
use tera::Context;

use super::Lab;
use crate::device::ApplyMode;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::{Host, CONFIG_CHANGED};
use crate::peering::{build_network_vars, PeeringVars, MAX_LOOPBACKS};

const PEERING_FOLDER: &str = "peering";
const PEERING_TEMPLATE: &str = "isp.j2";

/// The backbone side of every peering session
#[derive(Debug, Clone)]
struct Neighbor {
    name: String,
    asn: u32,
}

impl Lab {
    /// Configure the members of `group` as peers of `neighbor_group`, announcing
    /// the prefixes their AS currently announces on the internet.
    pub async fn configure_peering(
        self: &Arc<Self>,
        fleet: &Fleet,
        group: &str,
        neighbor_group: &str,
    ) -> Result<AggregatedResult> {
        let data = &self.inventory.group(neighbor_group)?.data;
        let neighbor = Neighbor {
            name: data
                .network_name
                .clone()
                .with_context(|| format!("Group '{}' has no network_name", neighbor_group))?,
            asn: data
                .asn
                .with_context(|| format!("Group '{}' has no asn", neighbor_group))?,
        };

        let peers = fleet.in_group(group);
        let lab = self.clone();
        let neighbor = Arc::new(neighbor);
        Ok(peers
            .run("Configure peering devices", peers.len() as u64, move |host, progress| {
                let lab = lab.clone();
                let neighbor = neighbor.clone();
                async move {
                    let outcome = lab.configure_host_peering(&host, &neighbor, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await)
    }

    async fn configure_host_peering(&self, host: &Host, neighbor: &Neighbor, progress: &Progress) -> Result<Outcome> {
        let vars = self.peering_vars(host, neighbor).await?;
        let context = Context::from_serialize(&vars)
            .map_err(|e| anyhow::anyhow!("Invalid peering variables: {}", e))?;
        let config = self.templates.render(
            PEERING_TEMPLATE,
            &self.templates_dir.join(PEERING_FOLDER),
            &context,
        )?;

        let changed = self.device.apply_config(host, &config, ApplyMode::Merge).await?;
        progress.log(format!(
            "{}: Peering with {} configured.{}",
            host,
            neighbor.name,
            if changed { CONFIG_CHANGED } else { "" }
        ));
        Ok(Outcome::changed(changed))
    }

    async fn peering_vars(&self, host: &Host, neighbor: &Neighbor) -> Result<PeeringVars> {
        let data = &host.data;
        let asn = host.require(&data.asn, "asn")?;
        let name = host.require(&data.isp, "isp")?;
        let description = host.require(&data.description, "description")?;
        let as_path_length = host.require(&data.as_path_length, "as_path_length")?;

        let prefixes = self.registry.announced_prefixes(asn).await?;
        tracing::debug!("{}: AS{} announces {} prefixes", host, asn, prefixes.len());
        let networks = build_network_vars(&prefixes)?;

        Ok(PeeringVars {
            name,
            asn,
            description,
            as_path_length,
            max_loopback: MAX_LOOPBACKS,
            neighbor_name: neighbor.name.clone(),
            neighbor_as: neighbor.asn,
            neighbor_ipv4: data.neighbor_ipv4.clone(),
            neighbor_ipv6: data.neighbor_ipv6.clone(),
            networks,
        })
    }
}
