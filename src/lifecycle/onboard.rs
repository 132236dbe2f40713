use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::Lab;
use crate::device::ApplyMode;
use crate::error::LabError;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::{flash_file, Host};

const ONBOARD_FOLDER: &str = "onboard";
/// Drops any TerminAttr daemon left over from the lab image
const CLEAN_TERMINATTR: &str = "no daemon TerminAttr";

impl Lab {
    /// Prepare devices for CloudVision onboarding, then apply the onboarding
    /// templates to the hosts that were prepared
    pub async fn onboard(self: &Arc<Self>, fleet: &Fleet, token: &Path) -> Result<Vec<AggregatedResult>> {
        ensure_token(token)?;
        let templates = self.templates_dir.join(ONBOARD_FOLDER);
        if !templates.is_dir() {
            return Err(LabError::TemplateFolderNotFound(templates).into());
        }

        let lab = self.clone();
        let token = token.to_path_buf();
        let prepared = fleet
            .run("Prepare devices to CloudVision onboarding", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                let token = token.clone();
                async move {
                    let outcome = lab.prepare_onboarding(&host, &token, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await;

        // a host without its token must not start TerminAttr
        let ready = fleet.without_failed(&prepared);
        let applied = self.apply_templates(&ready, &templates, false).await?;
        Ok(vec![prepared, applied])
    }

    /// Copy the onboarding token into every host's flash directory
    pub async fn init_tokens(self: &Arc<Self>, fleet: &Fleet, token: &Path) -> Result<AggregatedResult> {
        ensure_token(token)?;
        let lab = self.clone();
        let token = token.to_path_buf();
        Ok(fleet
            .run("Copy CloudVision token to flash", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                let token = token.clone();
                async move {
                    let outcome = lab.copy_token(&host, &token, &progress).await.map(Outcome::changed);
                    progress.advance(1);
                    outcome
                }
            })
            .await)
    }

    async fn prepare_onboarding(&self, host: &Host, token: &Path, progress: &Progress) -> Result<Outcome> {
        let copied = self.copy_token(host, token, progress).await?;
        let cleaned = self.device.apply_config(host, CLEAN_TERMINATTR, ApplyMode::Merge).await?;
        Ok(Outcome::changed(copied || cleaned))
    }

    /// Copy `token` to the host's flash directory, which containerlab must
    /// have created. Returns false when the same token is already there.
    pub(crate) async fn copy_token(&self, host: &Host, token: &Path, progress: &Progress) -> Result<bool> {
        let flash = self.topology.flash_dir(host);
        if !flash.is_dir() {
            return Err(LabError::FlashNotFound {
                host: host.name.clone(),
                path: flash,
            }
            .into());
        }

        let target = flash.join(flash_file::ONBOARDING_TOKEN);
        let wanted = tokio::fs::read(token)
            .await
            .with_context(|| format!("Unable to read {}", token.display()))?;
        if tokio::fs::read(&target).await.is_ok_and(|current| current == wanted) {
            progress.log(format!("{}: Token already present.", host));
            return Ok(false);
        }

        progress.log(format!("Copying {} to {}", token.display(), target.display()));
        tokio::fs::write(&target, wanted)
            .await
            .with_context(|| format!("Unable to copy {} to {}", token.display(), target.display()))?;
        Ok(true)
    }
}

fn ensure_token(token: &Path) -> Result<()> {
    if !token.is_file() {
        anyhow::bail!("Token file '{}' not found", token.display());
    }
    Ok(())
}
