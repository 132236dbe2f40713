use std::sync::Arc;

use anyhow::Result;

use super::Lab;
use crate::device::backup_present;
use crate::error::LabError;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::{flash_file, Host};

impl Lab {
    /// Copy the running configuration to flash unless a backup already exists
    pub async fn create_backups(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        let lab = self.clone();
        fleet
            .run("Backup configuration to flash", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                async move {
                    let outcome = lab.create_backup(&host, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    /// Replace the running configuration with the flash backup
    pub async fn restore_backups(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        let lab = self.clone();
        fleet
            .run("Restore backup configuration from flash", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                async move {
                    let outcome = lab.restore_backup(&host, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    pub async fn delete_backups(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        let lab = self.clone();
        fleet
            .run("Delete backup on flash", fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                async move {
                    let outcome = lab.delete_backup(&host, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    pub(crate) async fn create_backup(&self, host: &Host, progress: &Progress) -> Result<Outcome> {
        if backup_present(self.device.as_ref(), host).await? {
            progress.log(format!("{}: Backup already present.", host));
            return Ok(Outcome::Unchanged);
        }

        let copy = format!("copy running-config flash:{}", flash_file::BACKUP);
        self.device.run_commands(host, &[copy.as_str()]).await?;
        progress.log(format!("{}: Backup created.", host));
        Ok(Outcome::Changed)
    }

    pub(crate) async fn restore_backup(&self, host: &Host, progress: &Progress) -> Result<Outcome> {
        if !backup_present(self.device.as_ref(), host).await? {
            return Err(LabError::BackupNotFound { host: host.name.clone() }.into());
        }

        // running-config is not copied to startup-config, so the previous
        // configuration stays recoverable from startup-config
        let replace = format!("configure replace flash:{}", flash_file::BACKUP);
        self.device.run_commands(host, &[replace.as_str()]).await?;
        progress.log(format!("{}: Backup restored.", host));
        Ok(Outcome::Changed)
    }

    pub(crate) async fn delete_backup(&self, host: &Host, progress: &Progress) -> Result<Outcome> {
        if !backup_present(self.device.as_ref(), host).await? {
            progress.log(format!("{}: Backup not found.", host));
            return Ok(Outcome::Unchanged);
        }

        let delete = format!("delete flash:{}", flash_file::BACKUP);
        self.device.run_commands(host, &[delete.as_str()]).await?;
        progress.log(format!("{}: Backup deleted.", host));
        Ok(Outcome::Changed)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LabError;
    use crate::fleet::Outcome;
    use crate::models::flash_file;
    use crate::testing::{inventory, TestLab};

    fn setup(names: &[&str]) -> (std::sync::Arc<crate::testing::FakeDevice>, std::sync::Arc<super::Lab>, tempfile::TempDir) {
        let hosts: Vec<(&str, &[&str])> = names.iter().map(|n| (*n, &[][..])).collect();
        let test_lab = TestLab::new(inventory(&hosts));
        let device = test_lab.device.clone();
        let dir = tempfile::tempdir().unwrap();
        let lab = test_lab.build(dir.path(), dir.path());
        (device, lab, dir)
    }

    #[tokio::test]
    async fn test_create_backups_skips_existing_marker() {
        let (device, lab, _dir) = setup(&["host1", "host2", "host3"]);
        device.put_flash("host1", flash_file::BACKUP, "hostname host1");
        device.set_running("host2", "hostname host2");

        let result = lab.create_backups(&lab.inventory.fleet()).await;

        assert_eq!(result.len(), 3);
        assert_eq!(result.get("host1"), Some(&Outcome::Unchanged));
        assert_eq!(result.get("host2"), Some(&Outcome::Changed));
        assert_eq!(result.get("host3"), Some(&Outcome::Changed));
        assert_eq!(device.flash("host1", flash_file::BACKUP).as_deref(), Some("hostname host1"));
        assert_eq!(device.flash("host2", flash_file::BACKUP).as_deref(), Some("hostname host2"));
    }

    #[tokio::test]
    async fn test_no_double_backup() {
        let (device, lab, _dir) = setup(&["leaf1"]);
        device.set_running("leaf1", "hostname leaf1");

        let first = lab.create_backups(&lab.inventory.fleet()).await;
        device.set_running("leaf1", "hostname leaf1-changed");
        let second = lab.create_backups(&lab.inventory.fleet()).await;

        assert_eq!(first.get("leaf1"), Some(&Outcome::Changed));
        assert_eq!(second.get("leaf1"), Some(&Outcome::Unchanged));
        assert_eq!(device.flash("leaf1", flash_file::BACKUP).as_deref(), Some("hostname leaf1"));
        let copies = device
            .commands("leaf1")
            .iter()
            .filter(|c| c.starts_with("copy running-config flash:"))
            .count();
        assert_eq!(copies, 1);
    }

    #[tokio::test]
    async fn test_restore_without_backup_fails_without_mutation() {
        let (device, lab, _dir) = setup(&["spine1"]);

        let result = lab.restore_backups(&lab.inventory.fleet()).await;

        let expected = LabError::BackupNotFound { host: "spine1".into() }.to_string();
        assert_eq!(result.get("spine1"), Some(&Outcome::Failed(expected)));
        assert!(result.get("spine1").map(|o| matches!(o, Outcome::Failed(c) if c.contains("Backup not found"))).unwrap());
        assert_eq!(device.mutations("spine1"), 0);
    }

    #[tokio::test]
    async fn test_restore_replaces_running_config() {
        let (device, lab, _dir) = setup(&["spine1"]);
        device.put_flash("spine1", flash_file::BACKUP, "hostname spine1\nip routing");
        device.set_running("spine1", "hostname broken");

        let result = lab.restore_backups(&lab.inventory.fleet()).await;

        assert_eq!(result.get("spine1"), Some(&Outcome::Changed));
        assert_eq!(device.running("spine1"), "hostname spine1\nip routing");
    }

    #[tokio::test]
    async fn test_delete_backup_reports_absent_marker() {
        let (device, lab, _dir) = setup(&["a", "b"]);
        device.put_flash("a", flash_file::BACKUP, "hostname a");

        let result = lab.delete_backups(&lab.inventory.fleet()).await;

        assert_eq!(result.get("a"), Some(&Outcome::Changed));
        assert_eq!(result.get("b"), Some(&Outcome::Unchanged));
        assert!(device.flash("a", flash_file::BACKUP).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_device_fails_only_that_host() {
        let (device, lab, _dir) = setup(&["up", "down"]);
        device.set_unreachable("down");

        let result = lab.create_backups(&lab.inventory.fleet()).await;

        assert_eq!(result.get("up"), Some(&Outcome::Changed));
        assert!(matches!(result.get("down"), Some(Outcome::Failed(cause)) if cause.contains("Connection refused")));
    }
}
