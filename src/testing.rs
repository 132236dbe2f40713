//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::containers::ContainerDriver;
use crate::device::{ApplyMode, DeviceClient, DIR_FLASH_CMD};
use crate::error::LabError;
use crate::inventory::Inventory;
use crate::lifecycle::Lab;
use crate::models::{flash_file, Host, Topology};
use crate::peering::PrefixRegistry;

#[derive(Debug, Default)]
struct DeviceState {
    running: Vec<String>,
    flash: BTreeMap<String, String>,
    unreachable: bool,
    rejected: Vec<String>,
    mutations: usize,
    commands: Vec<String>,
}

/// FakeDevice emulates the EOS commands the lifecycle operations use
#[derive(Default)]
pub struct FakeDevice {
    devices: Mutex<HashMap<String, DeviceState>>,
}

impl FakeDevice {
    pub fn new(names: &[&str]) -> Self {
        let devices = names
            .iter()
            .map(|n| (n.to_string(), DeviceState::default()))
            .collect();
        Self {
            devices: Mutex::new(devices),
        }
    }

    fn with<T>(&self, host: &str, f: impl FnOnce(&mut DeviceState) -> Result<T>) -> Result<T> {
        let mut devices = self.devices.lock().unwrap();
        let state = devices.get_mut(host).ok_or_else(|| LabError::Device {
            host: host.to_string(),
            message: "no such device".to_string(),
        })?;
        if state.unreachable {
            return Err(LabError::Device {
                host: host.to_string(),
                message: "TCP connection failed: Connection refused".to_string(),
            }
            .into());
        }
        f(state)
    }

    pub fn put_flash(&self, host: &str, name: &str, content: &str) {
        let mut devices = self.devices.lock().unwrap();
        devices
            .get_mut(host)
            .unwrap()
            .flash
            .insert(name.to_string(), content.to_string());
    }

    pub fn flash(&self, host: &str, name: &str) -> Option<String> {
        self.devices.lock().unwrap()[host].flash.get(name).cloned()
    }

    pub fn set_running(&self, host: &str, config: &str) {
        let mut devices = self.devices.lock().unwrap();
        devices.get_mut(host).unwrap().running = config_lines(config);
    }

    pub fn running(&self, host: &str) -> String {
        self.devices.lock().unwrap()[host].running.join("\n")
    }

    pub fn set_unreachable(&self, host: &str) {
        self.devices.lock().unwrap().get_mut(host).unwrap().unreachable = true;
    }

    /// Make the device refuse `line`, either as a command or inside a
    /// configuration, as EOS does with a '%' error. Nothing is changed.
    pub fn reject(&self, host: &str, line: &str) {
        self.devices.lock().unwrap().get_mut(host).unwrap().rejected.push(line.to_string());
    }

    pub fn mutations(&self, host: &str) -> usize {
        self.devices.lock().unwrap()[host].mutations
    }

    pub fn commands(&self, host: &str) -> Vec<String> {
        self.devices.lock().unwrap()[host].commands.clone()
    }
}

fn config_lines(config: &str) -> Vec<String> {
    config
        .lines()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.trim().is_empty())
        .collect()
}

#[async_trait]
impl DeviceClient for FakeDevice {
    async fn run_commands(&self, host: &Host, commands: &[&str]) -> Result<String> {
        self.with(&host.name, |state| {
            let mut output = String::new();
            for command in commands {
                if state.rejected.iter().any(|r| r.as_str() == *command) {
                    anyhow::bail!("% Error: '{}' refused", command);
                }
                state.commands.push(command.to_string());
                if *command == DIR_FLASH_CMD {
                    output.push_str("Directory of flash:/\n\n");
                    for (name, content) in &state.flash {
                        output.push_str(&format!("       -rwx {:>10}  Jan 1 00:00  {}\n", content.len(), name));
                    }
                } else if *command == "copy running-config startup-config" {
                    state.mutations += 1;
                    let running = state.running.join("\n");
                    state.flash.insert(flash_file::STARTUP_CONFIG.to_string(), running);
                } else if let Some(name) = command.strip_prefix("copy running-config flash:") {
                    state.mutations += 1;
                    let running = state.running.join("\n");
                    state.flash.insert(name.to_string(), running);
                } else if let Some(name) = command.strip_prefix("configure replace flash:") {
                    state.mutations += 1;
                    let content = state
                        .flash
                        .get(name)
                        .ok_or_else(|| anyhow::anyhow!("% Error: flash:{} not found", name))?;
                    state.running = config_lines(content);
                } else if let Some(name) = command.strip_prefix("delete flash:") {
                    state.mutations += 1;
                    state
                        .flash
                        .remove(name)
                        .ok_or_else(|| anyhow::anyhow!("% Error deleting flash:{}", name))?;
                }
            }
            Ok(output)
        })
    }

    async fn running_config(&self, host: &Host) -> Result<String> {
        self.with(&host.name, |state| Ok(state.running.join("\n")))
    }

    async fn apply_config(&self, host: &Host, config: &str, mode: ApplyMode) -> Result<bool> {
        self.with(&host.name, |state| {
            let lines = config_lines(config);
            if let Some(bad) = lines.iter().find(|l| state.rejected.contains(l)) {
                return Err(LabError::Device {
                    host: host.name.clone(),
                    message: format!("'configure session' failed: % Invalid input ({})", bad.trim()),
                }
                .into());
            }
            state.mutations += 1;
            match mode {
                ApplyMode::Replace => {
                    let changed = state.running != lines;
                    state.running = lines;
                    Ok(changed)
                }
                ApplyMode::Merge => {
                    let mut changed = false;
                    for line in lines {
                        if !state.running.contains(&line) {
                            state.running.push(line);
                            changed = true;
                        }
                    }
                    Ok(changed)
                }
            }
        })
    }
}

/// FakeDriver tracks container existence and run state
#[derive(Default)]
pub struct FakeDriver {
    containers: Mutex<HashMap<String, bool>>,
}

impl FakeDriver {
    pub fn with_containers(running: &[(&str, bool)]) -> Self {
        Self {
            containers: Mutex::new(running.iter().map(|(n, r)| (n.to_string(), *r)).collect()),
        }
    }

    pub fn running(&self, name: &str) -> Option<bool> {
        self.containers.lock().unwrap().get(name).copied()
    }

    fn set(&self, name: &str, running: bool) -> Result<()> {
        match self.containers.lock().unwrap().get_mut(name) {
            Some(state) => {
                *state = running;
                Ok(())
            }
            None => anyhow::bail!("No such container: {}", name),
        }
    }
}

#[async_trait]
impl ContainerDriver for FakeDriver {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.containers.lock().unwrap().contains_key(name))
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        self.running(name)
            .ok_or_else(|| anyhow::anyhow!("No such container: {}", name))
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.set(name, true)
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.set(name, false)
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.set(name, true)
    }
}

/// FakeRegistry answers with canned prefixes or an HTTP status
#[derive(Default)]
pub struct FakeRegistry {
    answers: HashMap<u32, Result<Vec<String>, u16>>,
}

impl FakeRegistry {
    pub fn answer(mut self, asn: u32, prefixes: &[&str]) -> Self {
        self.answers
            .insert(asn, Ok(prefixes.iter().map(|p| p.to_string()).collect()));
        self
    }

    pub fn fail(mut self, asn: u32, status: u16) -> Self {
        self.answers.insert(asn, Err(status));
        self
    }
}

#[async_trait]
impl PrefixRegistry for FakeRegistry {
    async fn announced_prefixes(&self, asn: u32) -> Result<Vec<String>> {
        match self.answers.get(&asn) {
            Some(Ok(prefixes)) => Ok(prefixes.clone()),
            Some(Err(status)) => Err(LabError::AnnouncedPrefixes { asn, status: *status }.into()),
            None => Err(LabError::AnnouncedPrefixes { asn, status: 404 }.into()),
        }
    }
}

/// Collaborators a test lab is built from
pub struct TestLab {
    pub device: Arc<FakeDevice>,
    pub driver: Arc<FakeDriver>,
    pub registry: FakeRegistry,
    pub inventory: Inventory,
}

impl TestLab {
    pub fn new(inventory: Inventory) -> Self {
        let names: Vec<String> = inventory.hosts.iter().map(|h| h.name.clone()).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        Self {
            device: Arc::new(FakeDevice::new(&names)),
            driver: Arc::new(FakeDriver::default()),
            registry: FakeRegistry::default(),
            inventory,
        }
    }

    /// Lab named "lab" rooted at `workdir`, using `templates_dir` for built-in templates
    pub fn build(self, workdir: &Path, templates_dir: &Path) -> Arc<Lab> {
        Lab::new(
            self.inventory,
            Topology::new("lab", workdir),
            self.device,
            self.driver,
            Arc::new(self.registry),
            templates_dir.to_path_buf(),
        )
    }
}

/// Inventory of plain hosts with the given groups
pub fn inventory(hosts: &[(&str, &[&str])]) -> Inventory {
    Inventory {
        hosts: hosts
            .iter()
            .map(|(name, groups)| Arc::new(Host::new(name, groups)))
            .collect(),
        ..Default::default()
    }
}
