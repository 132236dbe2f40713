use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use ignore::WalkBuilder;
use tera::{Context, Tera};

use crate::error::LabError;
use crate::models::Host;

/// Management interface addressing of the lab bootstrap configuration
const MANAGEMENT_REGEX: &str = r"interface Management[0-1]\n(.  ip address .*)?(\n   ipv6 address .*)?";

const TEMPLATE_EXTENSION: &str = "j2";

/// TemplateFile describes one template discovered in a template folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    /// Directory holding the template; used as the render search path
    pub dir: PathBuf,
    pub name: String,
    /// Owning group, or None when the template applies to every host
    pub group: Option<String>,
}

impl TemplateFile {
    pub fn applies_to(&self, host: &Host) -> bool {
        match &self.group {
            None => true,
            Some(group) => host.in_group(group),
        }
    }
}

/// Discover `*.j2` templates under `folder`.
///
/// With `groups`, a template inside a sub-folder belongs to the group named
/// after the first sub-folder level; templates directly in `folder` have no
/// group. Without `groups`, every template applies to every host.
pub fn discover(folder: &Path, groups: bool) -> Result<Vec<TemplateFile>> {
    if !folder.is_dir() {
        return Err(LabError::TemplateFolderNotFound(folder.to_path_buf()).into());
    }

    let walker = WalkBuilder::new(folder)
        .standard_filters(false)
        .hidden(true)
        .sort_by_file_name(Ord::cmp)
        .build();

    let mut templates = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", folder.display()))?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|ft| ft.is_file()) || !is_template(path) {
            continue;
        }
        let Some(dir) = path.parent() else { continue };
        let group = if groups {
            dir.strip_prefix(folder)
                .ok()
                .and_then(|rel| rel.components().next())
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
        } else {
            None
        };
        templates.push(TemplateFile {
            dir: dir.to_path_buf(),
            name: entry.file_name().to_string_lossy().into_owned(),
            group,
        });
    }
    Ok(templates)
}

fn management_regex() -> Option<regex_lite::Regex> {
    regex_lite::Regex::new(MANAGEMENT_REGEX)
        .map_err(|e| tracing::error!("Invalid management pattern: {}", e))
        .ok()
}

/// Remove the management interface addressing block from a rendered configuration
pub fn strip_management_config(config: &str) -> String {
    match management_regex() {
        Some(re) => re.replace_all(config, "").into_owned(),
        None => config.to_string(),
    }
}

/// The management interface addressing block of a configuration, if any
pub fn management_config(config: &str) -> Option<String> {
    management_regex()?
        .find(config)
        .map(|m| m.as_str().to_string())
}

/// Put the device's live management block in place of the rendered one.
///
/// A full replace must carry the live block, or the device loses the
/// address it is reached on. The rendered block is dropped either way; the
/// live block lands where it was, or at the end when the rendered
/// configuration had none.
pub fn keep_management_config(rendered: &str, live: Option<&str>) -> String {
    let Some(live) = live else {
        return strip_management_config(rendered);
    };
    let Some(re) = management_regex() else {
        return rendered.to_string();
    };

    if re.is_match(rendered) {
        let mut spliced = false;
        re.replace_all(rendered, |_: &regex_lite::Captures<'_>| {
            if std::mem::replace(&mut spliced, true) {
                String::new()
            } else {
                live.to_string()
            }
        })
        .into_owned()
    } else {
        let mut config = rendered.trim_end_matches('\n').to_string();
        config.push('\n');
        config.push_str(live);
        config.push('\n');
        config
    }
}

/// TemplateEngine renders named templates found in a search path
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Render `name` from `search_path`.
    ///
    /// A `*.j2` target is registered together with its `*.j2` siblings so
    /// templates can include one another. Any other file is rendered on its
    /// own; a snapshot folder holds one file per host and those never depend
    /// on each other.
    pub fn render(&self, name: &str, search_path: &Path, context: &Context) -> Result<String> {
        let target = search_path.join(name);
        if !target.is_file() {
            anyhow::bail!("Template {} not found", target.display());
        }

        let mut sources = vec![(name.to_string(), read_template(&target)?)];
        if is_template(&target) {
            for entry in std::fs::read_dir(search_path)
                .with_context(|| format!("Failed to read template folder {}", search_path.display()))?
            {
                let path = entry?.path();
                if path == target || !path.is_file() || !is_template(&path) {
                    continue;
                }
                let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    continue;
                };
                sources.push((file_name, read_template(&path)?));
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)
            .map_err(|e| anyhow::anyhow!("Invalid template in {}: {}", search_path.display(), e))?;

        tera.render(name, context)
            .map_err(|e| anyhow::anyhow!("Template rendering failed for {}: {:?}", name, e))
    }
}

fn is_template(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION)
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read template {}", path.display()))
}

/// Variables every host template sees: the host itself and the whole inventory
pub fn host_context(host: &Host, hosts: &[std::sync::Arc<Host>]) -> Context {
    let mut context = Context::new();
    context.insert("host", host);
    let all: std::collections::BTreeMap<&str, &Host> =
        hosts.iter().map(|h| (h.name.as_str(), h.as_ref())).collect();
    context.insert("hosts", &all);
    context
}
