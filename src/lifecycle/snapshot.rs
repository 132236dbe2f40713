use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::Lab;
use crate::device::ApplyMode;
use crate::error::LabError;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::Host;
use crate::templates::{host_context, keep_management_config, management_config};

const CONFIG_EXTENSION: &str = "cfg";

fn config_path(folder: &Path, host: &Host) -> PathBuf {
    folder.join(format!("{}.{}", host.name, CONFIG_EXTENSION))
}

impl Lab {
    /// Persist each running configuration to startup-config and to `<folder>/<host>.cfg`
    pub async fn save(self: &Arc<Self>, fleet: &Fleet, folder: &Path) -> Result<AggregatedResult> {
        tokio::fs::create_dir_all(folder)
            .await
            .with_context(|| format!("Unable to create folder '{}'", folder.display()))?;

        let lab = self.clone();
        let folder = folder.to_path_buf();
        Ok(fleet
            .run("Save configuration", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                let folder = folder.clone();
                async move {
                    let outcome = lab.save_host(&host, &folder, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await)
    }

    /// Replace each running configuration with `<folder>/<host>.cfg`
    pub async fn load(self: &Arc<Self>, fleet: &Fleet, folder: &Path) -> AggregatedResult {
        let lab = self.clone();
        let folder = folder.to_path_buf();
        fleet
            .run("Load configuration", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                let folder = folder.clone();
                async move {
                    let outcome = lab.load_host(&host, &folder, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    async fn save_host(&self, host: &Host, folder: &Path, progress: &Progress) -> Result<Outcome> {
        self.device
            .run_commands(host, &["copy running-config startup-config"])
            .await?;
        let config = self.device.running_config(host).await?;

        let path = config_path(folder, host);
        tokio::fs::write(&path, config)
            .await
            .with_context(|| format!("Unable to write '{}'", path.display()))?;
        progress.log(format!("{}: Configuration saved to {}.", host, path.display()));
        Ok(Outcome::Changed)
    }

    async fn load_host(&self, host: &Host, folder: &Path, progress: &Progress) -> Result<Outcome> {
        let path = config_path(folder, host);
        if !path.is_file() {
            return Err(LabError::ConfigurationNotFound {
                host: host.name.clone(),
                folder: folder.to_path_buf(),
            }
            .into());
        }

        let name = format!("{}.{}", host.name, CONFIG_EXTENSION);
        let rendered = self
            .templates
            .render(&name, folder, &host_context(host, &self.inventory.hosts))?;
        let running = self.device.running_config(host).await?;
        let config = keep_management_config(&rendered, management_config(&running).as_deref());

        let changed = self.device.apply_config(host, &config, ApplyMode::Replace).await?;
        if changed {
            progress.log(format!("{}: Configuration loaded from {}.", host, path.display()));
        } else {
            progress.log(format!("{}: Configuration already up to date.", host));
        }
        Ok(Outcome::changed(changed))
    }
}
