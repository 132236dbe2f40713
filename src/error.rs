use std::path::PathBuf;

use thiserror::Error;

/// Typed lab errors. Operations return them wrapped in `anyhow::Error` so
/// callers and tests can downcast instead of matching on message text.
#[derive(Debug, Error)]
pub enum LabError {
    #[error("{host}: Backup not found.")]
    BackupNotFound { host: String },

    #[error("Configuration of {host} not found in folder {}", folder.display())]
    ConfigurationNotFound { host: String, folder: PathBuf },

    #[error("{host}: flash directory {} does not exist", path.display())]
    FlashNotFound { host: String, path: PathBuf },

    #[error("{host}: '{field}' is missing from inventory data")]
    MissingHostData { host: String, field: &'static str },

    #[error("Could not find template folder {}", .0.display())]
    TemplateFolderNotFound(PathBuf),

    #[error("Group '{0}' is not defined in the inventory")]
    UnknownGroup(String),

    #[error("IP plan row {row}: {reason}")]
    IpPlan { row: usize, reason: String },

    #[error("Could not get announced prefixes for AS{asn}: HTTP {status}")]
    AnnouncedPrefixes { asn: u32, status: u16 },

    #[error("{host}: {message}")]
    Device { host: String, message: String },

    #[error("Invalid system MAC address '{0}'")]
    InvalidMac(String),
}
