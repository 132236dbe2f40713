//! Lifecycle operations run across the lab fleet.
//!
//! Every operation builds a per-host unit of work from the device, template,
//! container and prefix-registry collaborators held by [`Lab`] and hands it
//! to [`Fleet::run`](crate::fleet::Fleet::run). Input defects that affect the
//! whole run (missing template folder, malformed IP plan, unknown group) are
//! returned before any host is touched.

mod apply;
mod backup;
mod ceos;
mod containers;
mod interfaces;
mod onboard;
mod peering;
mod snapshot;

use std::path::PathBuf;
use std::sync::Arc;

use crate::containers::ContainerDriver;
use crate::device::DeviceClient;
use crate::inventory::Inventory;
use crate::models::Topology;
use crate::peering::PrefixRegistry;
use crate::templates::TemplateEngine;

/// Lab holds the read-only context shared by every per-host task of a run
pub struct Lab {
    pub inventory: Inventory,
    pub topology: Topology,
    pub device: Arc<dyn DeviceClient>,
    pub containers: Arc<dyn ContainerDriver>,
    pub registry: Arc<dyn PrefixRegistry>,
    pub templates: TemplateEngine,
    /// Folder holding the built-in `onboard` and `peering` template sets
    pub templates_dir: PathBuf,
}

impl Lab {
    pub fn new(
        inventory: Inventory,
        topology: Topology,
        device: Arc<dyn DeviceClient>,
        containers: Arc<dyn ContainerDriver>,
        registry: Arc<dyn PrefixRegistry>,
        templates_dir: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            inventory,
            topology,
            device,
            containers,
            registry,
            templates: TemplateEngine::new(),
            templates_dir,
        })
    }
}
