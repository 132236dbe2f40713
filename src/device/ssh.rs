use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{ApplyMode, DeviceClient};
use crate::error::LabError;
use crate::models::{Host, Topology};

/// Keyboard-interactive prompt handler that always responds with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// SshDevice drives EOS devices over SSH.
///
/// Configuration is staged in a configuration session and committed only
/// when every line was accepted, so a replace is atomic. Change detection
/// compares the running configuration before and after the commit.
#[derive(Clone)]
pub struct SshDevice {
    user: String,
    pass: String,
    timeout_secs: u64,
    topology: Topology,
}

impl SshDevice {
    pub fn new(user: String, pass: String, timeout_secs: u64, topology: Topology) -> Self {
        Self {
            user,
            pass,
            timeout_secs,
            topology,
        }
    }

    /// Management address of a host: inventory hostname or the container name
    fn address(&self, host: &Host) -> String {
        host.hostname
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| self.topology.container_name(host))
    }

    /// Run a blocking SSH job on the blocking thread pool
    async fn with_session<T, F>(&self, host: &Host, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ssh2::Session) -> Result<T, String> + Send + 'static,
    {
        let address = self.address(host);
        let user = self.user.clone();
        let pass = self.pass.clone();
        let timeout_secs = self.timeout_secs;
        let name = host.name.clone();

        tokio::task::spawn_blocking(move || {
            let session = ssh_connect(&address, &user, &pass, timeout_secs)?;
            job(&session)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e))?
        .map_err(|message| LabError::Device { host: name, message }.into())
    }
}

#[async_trait]
impl DeviceClient for SshDevice {
    async fn run_commands(&self, host: &Host, commands: &[&str]) -> Result<String> {
        let commands: Vec<String> = commands.iter().map(|c| c.to_string()).collect();
        self.with_session(host, move |session| {
            let mut output = String::new();
            for command in &commands {
                let out = ssh_exec_on_session(session, command)?;
                check_cli_errors(command, &out)?;
                output.push_str(&out);
            }
            Ok(output)
        })
        .await
    }

    async fn running_config(&self, host: &Host) -> Result<String> {
        self.run_commands(host, &["show running-config"]).await
    }

    async fn apply_config(&self, host: &Host, config: &str, mode: ApplyMode) -> Result<bool> {
        let session_name = format!("labctl-{}", chrono::Utc::now().format("%Y%m%d%H%M%S%f"));
        let config = config.to_string();

        self.with_session(host, move |session| {
            let before = ssh_exec_on_session(session, "show running-config")?;
            push_config_session(|script| ssh_run_interactive(session, script), &session_name, &config, mode)?;
            let after = ssh_exec_on_session(session, "show running-config")?;
            Ok(normalize_running_config(&before) != normalize_running_config(&after))
        })
        .await
    }
}

/// Stage `config` in a named configuration session, then commit it only when
/// EOS accepted every line. A rejected line aborts the session so nothing of
/// it reaches the running configuration.
fn push_config_session<R>(mut run: R, session_name: &str, config: &str, mode: ApplyMode) -> Result<(), String>
where
    R: FnMut(&str) -> Result<String, String>,
{
    let staged = run(&session_body(session_name, config, mode))?;
    if let Err(e) = check_cli_errors("configure session", &staged) {
        if let Err(abort) = run(&session_end(session_name, false)) {
            tracing::warn!("Could not abort session {}: {}", session_name, abort);
        }
        return Err(e);
    }

    let committed = run(&session_end(session_name, true))?;
    check_cli_errors("commit", &committed)
}

/// CLI script staging `config` in a configuration session without committing it
fn session_body(session_name: &str, config: &str, mode: ApplyMode) -> String {
    let mut script = String::from("enable\n");
    script.push_str(&format!("configure session {}\n", session_name));
    if mode == ApplyMode::Replace {
        script.push_str("rollback clean-config\n");
    }
    for line in config.lines() {
        // "end" would leave the session
        if line.trim().eq_ignore_ascii_case("end") {
            continue;
        }
        script.push_str(line);
        script.push('\n');
    }
    script.push_str("exit\n");
    script
}

/// CLI script closing a pending session with a commit or an abort
fn session_end(session_name: &str, commit: bool) -> String {
    format!(
        "enable\nconfigure session {}\n{}\nexit\n",
        session_name,
        if commit { "commit" } else { "abort" }
    )
}

/// Drop comment lines so header noise does not count as a change
fn normalize_running_config(config: &str) -> String {
    config
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim_start().starts_with('!') && !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// EOS reports CLI errors on lines starting with '%'
fn check_cli_errors(command: &str, output: &str) -> Result<(), String> {
    match output.lines().map(str::trim).find(|l| l.starts_with('%')) {
        Some(error) => Err(format!("'{}' failed: {}", command, error)),
        None => Ok(()),
    }
}

/// Create an SSH session and authenticate with password + keyboard-interactive.
/// This is blocking, so call from a spawn_blocking context.
fn ssh_connect(host: &str, user: &str, pass: &str, timeout_secs: u64) -> Result<ssh2::Session, String> {
    let addr = format!("{}:22", host)
        .to_socket_addrs()
        .map_err(|e| format!("Invalid address {}: {}", host, e))?
        .next()
        .ok_or_else(|| format!("Could not resolve {}", host))?;
    let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(timeout_secs))
        .map_err(|e| format!("TCP connection failed: {}", e))?;

    tcp.set_read_timeout(Some(Duration::from_secs(timeout_secs))).ok();
    tcp.set_write_timeout(Some(Duration::from_secs(timeout_secs))).ok();

    let mut session = ssh2::Session::new()
        .map_err(|e| format!("Failed to create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout_secs as u32 * 1000);
    session.handshake()
        .map_err(|e| format!("SSH handshake failed: {}", e))?;

    // Try password auth first
    match session.userauth_password(user, pass) {
        Ok(_) if session.authenticated() => return Ok(session),
        _ => {}
    }

    // EOS needs keyboard-interactive
    let mut prompter = PasswordPrompt { password: pass.to_string() };
    let _ = session.userauth_keyboard_interactive(user, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err("SSH authentication failed: all methods exhausted".to_string())
    }
}

/// Execute one command on its own channel and return the raw output
fn ssh_exec_on_session(session: &ssh2::Session, command: &str) -> Result<String, String> {
    let mut channel = session.channel_session()
        .map_err(|e| format!("Failed to open channel: {}", e))?;

    channel.exec(command)
        .map_err(|e| format!("Failed to execute '{}': {}", command, e))?;

    let mut output = String::new();
    channel.read_to_string(&mut output)
        .map_err(|e| format!("Failed to read output: {}", e))?;

    channel.wait_close()
        .map_err(|e| format!("Failed to close channel: {}", e))?;

    Ok(output)
}

/// Feed a multi-line script to an interactive shell (configuration mode needs a PTY)
fn ssh_run_interactive(session: &ssh2::Session, script: &str) -> Result<String, String> {
    let mut channel = session.channel_session()
        .map_err(|e| format!("Failed to open channel: {}", e))?;
    channel.request_pty("vt100", None, Some((200, 50, 0, 0)))
        .map_err(|e| format!("Failed to request PTY: {}", e))?;
    channel.shell()
        .map_err(|e| format!("Failed to start shell: {}", e))?;

    channel.write_all(script.as_bytes())
        .map_err(|e| format!("Failed to send configuration: {}", e))?;
    channel.send_eof()
        .map_err(|e| format!("Failed to send EOF: {}", e))?;

    let mut output = String::new();
    channel.read_to_string(&mut output)
        .map_err(|e| format!("Failed to read output: {}", e))?;
    channel.wait_close()
        .map_err(|e| format!("Failed to close channel: {}", e))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_body_merge() {
        let body = session_body("s1", "interface Ethernet1\n   no switchport\nend\n", ApplyMode::Merge);
        assert_eq!(body, "enable\nconfigure session s1\ninterface Ethernet1\n   no switchport\nexit\n");
        assert!(!body.contains("commit"));
    }

    #[test]
    fn test_session_body_replace_cleans_first() {
        let body = session_body("s1", "hostname leaf1", ApplyMode::Replace);
        assert!(body.starts_with("enable\nconfigure session s1\nrollback clean-config\nhostname leaf1\n"));
    }

    #[test]
    fn test_accepted_session_is_committed() {
        let mut scripts = Vec::new();
        push_config_session(
            |script| {
                scripts.push(script.to_string());
                Ok("leaf1(config-s-s1)#".to_string())
            },
            "s1",
            "hostname leaf1",
            ApplyMode::Replace,
        )
        .unwrap();

        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[1], "enable\nconfigure session s1\ncommit\nexit\n");
    }

    #[test]
    fn test_rejected_line_aborts_session() {
        let mut scripts = Vec::new();
        let err = push_config_session(
            |script| {
                scripts.push(script.to_string());
                if script.contains("router bgp") {
                    Ok("leaf1(config-s-s1)#router bgp x\n% Invalid input\n".to_string())
                } else {
                    Ok(String::new())
                }
            },
            "s1",
            "hostname leaf1\nrouter bgp x\n",
            ApplyMode::Merge,
        )
        .unwrap_err();

        assert!(err.contains("% Invalid input"));
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[1], "enable\nconfigure session s1\nabort\nexit\n");
        assert!(scripts.iter().all(|s| !s.contains("commit")));
    }

    #[test]
    fn test_rejected_commit_is_reported() {
        let err = push_config_session(
            |script| {
                if script.contains("commit") {
                    Ok("% Failure to commit: session is stale\n".to_string())
                } else {
                    Ok(String::new())
                }
            },
            "s1",
            "hostname leaf1",
            ApplyMode::Replace,
        )
        .unwrap_err();

        assert!(err.starts_with("'commit' failed"));
    }

    #[test]
    fn test_normalize_ignores_comments() {
        let before = "! Command: show running-config\n! device: leaf1 (cEOSLab)\nhostname leaf1\n!\n";
        let after = "! Command: show running-config\n! device: leaf1 (cEOSLab, EOS-4.31)\nhostname leaf1\n";
        assert_eq!(normalize_running_config(before), normalize_running_config(after));
    }

    #[test]
    fn test_cli_errors_detected() {
        assert!(check_cli_errors("dir flash:", "Directory of flash:/\n").is_ok());
        let err = check_cli_errors("delete flash:x", "% Error deleting flash:/x (No such file)\n").unwrap_err();
        assert!(err.contains("No such file"));
    }

    #[test]
    fn test_address_defaults_to_container_name() {
        let device = SshDevice::new("admin".into(), "admin".into(), 5, Topology::new("lab", "."));
        let mut host = Host::new("spine1", &[]);
        assert_eq!(device.address(&host), "clab-lab-spine1");
        host.hostname = Some("172.20.20.2".into());
        assert_eq!(device.address(&host), "172.20.20.2");
    }
}
