//! cEOS identity files written to a host's flash directory before its
//! container boots. cEOS reads them only on first start, so an existing
//! identity is never overwritten.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::Lab;
use crate::error::LabError;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::{flash_file, Host};
use crate::utils::normalize_mac;

impl Lab {
    /// Write system MAC address and serial number files, and copy the
    /// onboarding token when one is given
    pub async fn init_flash(self: &Arc<Self>, fleet: &Fleet, token: Option<&Path>) -> Result<Vec<AggregatedResult>> {
        let mut results = vec![
            self.configure_system_mac(fleet).await,
            self.configure_serial_number(fleet).await,
        ];
        if let Some(token) = token {
            results.push(self.init_tokens(fleet, token).await?);
        }
        Ok(results)
    }

    pub async fn configure_system_mac(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        let lab = self.clone();
        fleet
            .run("Configure System MAC address", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                async move {
                    let outcome = lab.write_system_mac(&host, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    pub async fn configure_serial_number(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        let lab = self.clone();
        fleet
            .run("Configure serial number", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                async move {
                    let outcome = lab.write_serial_number(&host, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    async fn write_system_mac(&self, host: &Host, progress: &Progress) -> Result<Outcome> {
        let Some(mac) = &host.data.system_mac else {
            progress.log(format!("{}: System MAC address omitted in inventory. Not configuring...", host));
            return Ok(Outcome::Unchanged);
        };
        let mac = normalize_mac(mac).ok_or_else(|| LabError::InvalidMac(mac.clone()))?;

        let flash = self.topology.flash_dir(host);
        let path = flash.join(flash_file::SYSTEM_MAC);
        if path.exists() {
            progress.log(format!(
                "{}: System MAC address already configured. Cannot override the system MAC address.",
                host
            ));
            return Ok(Outcome::Unchanged);
        }

        write_flash_file(&flash, &path, &mac, progress).await?;
        progress.log(format!("{}: System MAC address configured.", host));
        Ok(Outcome::Changed)
    }

    async fn write_serial_number(&self, host: &Host, progress: &Progress) -> Result<Outcome> {
        let Some(serial) = &host.data.serial_number else {
            progress.log(format!("{}: Serial number omitted in inventory. Not configuring...", host));
            return Ok(Outcome::Unchanged);
        };

        let container = self.topology.container_name(host);
        if self.containers.exists(&container).await? {
            progress.log(format!(
                "{}: Container has already been created. Cannot override the serial number.",
                host
            ));
            return Ok(Outcome::Unchanged);
        }

        let flash = self.topology.flash_dir(host);
        let path = flash.join(flash_file::CEOS_CONFIG);
        write_flash_file(&flash, &path, &format!("SERIALNUMBER={}", serial), progress).await?;
        progress.log(format!("{}: Serial number configured.", host));
        Ok(Outcome::Changed)
    }
}

async fn write_flash_file(flash: &Path, path: &Path, content: &str, progress: &Progress) -> Result<()> {
    tokio::fs::create_dir_all(flash)
        .await
        .with_context(|| format!("Unable to create {}", flash.display()))?;
    progress.log(format!("Creating {}", path.display()));
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Unable to write {}", path.display()))
}
