mod host;
mod topology;

pub use host::*;
pub use topology::*;

/// Well-known artifact names on a device's flash storage
pub mod flash_file {
    /// Backup marker; its presence in `dir flash:` is the only witness of a backup
    pub const BACKUP: &str = "rollback-config";
    pub const ONBOARDING_TOKEN: &str = "cv-onboarding-token";
    pub const SYSTEM_MAC: &str = "system_mac_address";
    pub const CEOS_CONFIG: &str = "ceos-config";
    pub const STARTUP_CONFIG: &str = "startup-config";
}

/// Appended to per-host log lines when an apply reported a change
pub const CONFIG_CHANGED: &str = " New configuration applied.";
