mod ssh;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{flash_file, Host};

pub use ssh::SshDevice;

pub const DIR_FLASH_CMD: &str = "dir flash:";

/// How a configuration blob is applied to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Incremental merge into the running configuration
    Merge,
    /// Full replacement of the running configuration
    Replace,
}

/// DeviceClient is the command/configuration transport to one device.
///
/// Implementations must report `changed` accurately: applying the same
/// configuration twice yields `false` on the second call.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Run read-only or exec-mode commands, returning their concatenated output
    async fn run_commands(&self, host: &Host, commands: &[&str]) -> Result<String>;

    async fn running_config(&self, host: &Host) -> Result<String>;

    /// Apply `config` and report whether the device configuration changed
    async fn apply_config(&self, host: &Host, config: &str, mode: ApplyMode) -> Result<bool>;
}

/// List the device's flash storage
pub async fn list_flash(client: &dyn DeviceClient, host: &Host) -> Result<String> {
    client.run_commands(host, &[DIR_FLASH_CMD]).await
}

/// Whether a flash listing contains the backup marker
pub fn has_backup(listing: &str) -> bool {
    listing.contains(flash_file::BACKUP)
}

/// Probe the device and report whether a backup is present
pub async fn backup_present(client: &dyn DeviceClient, host: &Host) -> Result<bool> {
    let listing = list_flash(client, host).await?;
    Ok(has_backup(&listing))
}
