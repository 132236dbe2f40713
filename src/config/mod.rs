use std::env;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub inventory_path: String,
    pub topology_path: String,
    pub templates_dir: String,
    pub workdir: String,
    pub ssh_user: String,
    pub ssh_pass: String,
    pub ssh_timeout_secs: u64,
    pub prefix_registry_url: String,
    pub prefix_lookback_days: i64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            inventory_path: get_env("LAB_INVENTORY", "inventory.yaml"),
            topology_path: get_env("LAB_TOPOLOGY", "topology.clab.yml"),
            templates_dir: get_env("LAB_TEMPLATES_DIR", "templates"),
            workdir: get_env("LAB_WORKDIR", "."),
            ssh_user: get_env("LAB_SSH_USER", "admin"),
            ssh_pass: get_env("LAB_SSH_PASS", "admin"),
            ssh_timeout_secs: get_env("LAB_SSH_TIMEOUT", "30")
                .parse()
                .unwrap_or(30),
            prefix_registry_url: get_env(
                "LAB_PREFIX_REGISTRY_URL",
                "https://stat.ripe.net/data/announced-prefixes/data.json",
            ),
            prefix_lookback_days: get_env("LAB_PREFIX_LOOKBACK_DAYS", "10")
                .parse()
                .unwrap_or(10),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
