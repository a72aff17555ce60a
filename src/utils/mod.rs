use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ChannelError;

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

/// Where and how to log in to the management host
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

/// Exit status and captured streams of a remote or local command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Nonzero exit becomes a `CommandFailed` error
    pub fn into_result(self) -> Result<CommandOutput, ChannelError> {
        if self.status == 0 {
            Ok(self)
        } else {
            Err(ChannelError::CommandFailed {
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Validate a hostname.
/// Allows alphanumeric, hyphens, dots, and underscores. No path separators or shell metacharacters.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }
    hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Bridge names are interface names: ASCII alphanumeric, 1 to 15 characters
pub fn is_valid_bridge_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 15 && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Join argv into one shell command line, single-quoting anything unusual
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Create an SSH session and authenticate with a private key, a password, or
/// keyboard-interactive. This is blocking, so call from a spawn_blocking context.
pub fn ssh_connect(target: &SshTarget) -> Result<ssh2::Session, ChannelError> {
    let timeout = Duration::from_secs(target.timeout_secs);
    let addr = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| ChannelError::Connect(format!("Invalid address {}:{}: {}", target.host, target.port, e)))?
        .next()
        .ok_or_else(|| ChannelError::Connect(format!("No address for {}", target.host)))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| ChannelError::Connect(format!("TCP connection failed: {}", e)))?;

    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session = ssh2::Session::new()
        .map_err(|e| ChannelError::Connect(format!("Failed to create SSH session: {}", e)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(target.timeout_secs.saturating_mul(1000).min(u32::MAX as u64) as u32);
    session
        .handshake()
        .map_err(|e| ChannelError::Connect(format!("SSH handshake failed: {}", e)))?;

    if let Some(key) = &target.key_path {
        match session.userauth_pubkey_file(&target.user, None, key, target.password.as_deref()) {
            Ok(_) if session.authenticated() => return Ok(session),
            Ok(_) => {}
            Err(e) => tracing::debug!("Key auth with {} failed: {}", key.display(), e),
        }
    }

    if let Some(pass) = &target.password {
        match session.userauth_password(&target.user, pass) {
            Ok(_) if session.authenticated() => return Ok(session),
            _ => {}
        }

        let mut prompter = PasswordPrompt { password: pass.clone() };
        let _ = session.userauth_keyboard_interactive(&target.user, &mut prompter);
    }

    if session.authenticated() {
        Ok(session)
    } else {
        Err(ChannelError::Auth(format!(
            "all methods exhausted for {}@{}",
            target.user, target.host
        )))
    }
}

/// Connect via SSH and run a single command, capturing exit status and both streams.
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_run_command(target: &SshTarget, command: &str) -> Result<CommandOutput, ChannelError> {
    let session = ssh_connect(target)?;

    let mut channel = session
        .channel_session()
        .map_err(|e| ChannelError::Connect(format!("Failed to open channel: {}", e)))?;

    channel
        .exec(command)
        .map_err(|e| ChannelError::Connect(format!("Failed to execute command: {}", e)))?;

    let mut stdout = String::new();
    channel.read_to_string(&mut stdout)?;
    let mut stderr = String::new();
    channel.stderr().read_to_string(&mut stderr)?;

    channel
        .wait_close()
        .map_err(|e| ChannelError::Connect(format!("Failed to close channel: {}", e)))?;
    let status = channel
        .exit_status()
        .map_err(|e| ChannelError::Connect(format!("Failed to read exit status: {}", e)))?;

    Ok(CommandOutput { status, stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_hostname() {
        assert!(is_valid_hostname("mininet-host"));
        assert!(is_valid_hostname("192.168.0.15"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("host name"));
        assert!(!is_valid_hostname("host;rm"));
    }

    #[test]
    fn test_is_valid_bridge_name() {
        assert!(is_valid_bridge_name("e000001"));
        assert!(is_valid_bridge_name("br0"));
        assert!(!is_valid_bridge_name(""));
        assert!(!is_valid_bridge_name("bridge-with-dash"));
        assert!(!is_valid_bridge_name("a0123456789abcdef"));
        assert!(!is_valid_bridge_name("e0;reboot"));
    }

    #[test]
    fn test_shell_join() {
        let args: Vec<String> = ["sudo", "ovs-ofctl", "add-flow", "e000001", "nw_dst=0.0.0.2/0.0.0.255,priority=10"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            shell_join(&args),
            "sudo ovs-ofctl add-flow e000001 nw_dst=0.0.0.2/0.0.0.255,priority=10"
        );
        let odd = vec!["echo".to_string(), "it's; here".to_string(), String::new()];
        assert_eq!(shell_join(&odd), r"echo 'it'\''s; here' ''");
    }

    #[test]
    fn test_command_output_status() {
        let ok = CommandOutput { status: 0, stdout: "done".into(), stderr: String::new() };
        assert!(ok.into_result().is_ok());
        let failed = CommandOutput { status: 1, stdout: String::new(), stderr: "no bridge\n".into() };
        match failed.into_result() {
            Err(ChannelError::CommandFailed { status, stderr }) => {
                assert_eq!(status, 1);
                assert_eq!(stderr, "no bridge");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
