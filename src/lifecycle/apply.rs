use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use super::Lab;
use crate::device::ApplyMode;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::Host;
use crate::templates::{discover, host_context, strip_management_config, TemplateFile};

impl Lab {
    /// Render every template of `folder` for each host and merge it into the
    /// running configuration. With `groups`, templates in a sub-folder only
    /// apply to members of the group the sub-folder is named after.
    pub async fn apply_templates(
        self: &Arc<Self>,
        fleet: &Fleet,
        folder: &Path,
        groups: bool,
    ) -> Result<AggregatedResult> {
        let templates = Arc::new(discover(folder, groups)?);
        let total = (fleet.len() * templates.len()) as u64;
        let title = format!("Apply templates from {}", folder.display());

        let lab = self.clone();
        Ok(fleet
            .run(&title, total, move |host, progress| {
                let lab = lab.clone();
                let templates = templates.clone();
                async move { lab.apply_host_templates(&host, &templates, &progress).await }
            })
            .await)
    }

    pub(crate) async fn apply_host_templates(
        &self,
        host: &Host,
        templates: &[TemplateFile],
        progress: &Progress,
    ) -> Result<Outcome> {
        let mut changed = false;
        for (done, template) in templates.iter().enumerate() {
            if !template.applies_to(host) {
                progress.advance(1);
                continue;
            }
            match self.apply_template(host, template, progress).await {
                Ok(c) => changed |= c,
                Err(e) => {
                    // keep the bar consistent with the units this host will never run
                    progress.advance((templates.len() - done) as u64);
                    return Err(e.context(format!("{}: template {} failed", host, template.name)));
                }
            }
            progress.advance(1);
        }
        Ok(Outcome::changed(changed))
    }

    async fn apply_template(&self, host: &Host, template: &TemplateFile, progress: &Progress) -> Result<bool> {
        let context = host_context(host, &self.inventory.hosts);
        let rendered = self.templates.render(&template.name, &template.dir, &context)?;
        let config = strip_management_config(&rendered);

        let changed = self.device.apply_config(host, &config, ApplyMode::Merge).await?;
        if changed {
            progress.log(format!("{}: {} applied.", host, template.name));
        } else {
            progress.log(format!("{}: {} already applied.", host, template.name));
        }
        Ok(changed)
    }
}
