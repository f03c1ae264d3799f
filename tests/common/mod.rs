#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rs_webshell::config::TerminalConfig;
use rs_webshell::protocol::ChannelClient;
use rs_webshell::service::SessionManager;
use tempfile::TempDir;

pub const PROMPT: &str = "READY> ";

/// Line-oriented test shell: `echo X` prints X, `exit` exits, anything else is
/// reported as unknown. Echo is off so output only contains what it prints.
pub const PROMPT_SHELL: &str = r#"#!/bin/sh
stty -echo
printf 'READY> '
while IFS= read -r line; do
  line=$(printf '%s' "$line" | tr -d '\r')
  case "$line" in
    "") continue ;;
    exit) exit 0 ;;
    "echo "*) printf '%s\n' "${line#echo }" ;;
    *) printf 'unknown: %s\n' "$line" ;;
  esac
  printf 'READY> '
done
"#;

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn config_for(shell: &Path) -> TerminalConfig {
    let mut config = TerminalConfig::default();
    config.shell.path = Some(shell.to_path_buf());
    config.session.kill_grace_ms = 500;
    config.session.drain_timeout_ms = 500;
    config
}

/// Manager whose sessions run [`PROMPT_SHELL`]. Keep the dir alive.
pub fn prompt_manager() -> (SessionManager, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let shell = write_script(dir.path(), "prompt.sh", PROMPT_SHELL);
    (SessionManager::new(&config_for(&shell)), dir)
}

/// Appends output frames to `collected` until `needle` appears in the newly
/// received part, or the stream ends.
pub async fn read_until(client: &mut ChannelClient, collected: &mut String, needle: &str) {
    let start = collected.len();
    let result = tokio::time::timeout(Duration::from_secs(10), async {
        while !collected[start..].contains(needle) {
            match client.recv().await {
                Some(frame) => collected.push_str(&frame),
                None => break,
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {needle:?}, got {collected:?}");
}

/// Drains the client until the server closes the connection.
pub async fn read_to_end(client: &mut ChannelClient) -> Vec<String> {
    let mut frames = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(frame) = client.recv().await {
            frames.push(frame);
        }
    })
    .await
    .expect("connection never closed");
    frames
}

pub fn pid_gone(pid: u32) -> bool {
    let pid = nix::unistd::Pid::from_raw(pid as i32);
    nix::sys::signal::kill(pid, None) == Err(nix::errno::Errno::ESRCH)
}

pub async fn wait_pid_gone(pid: u32) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !pid_gone(pid) {
        assert!(tokio::time::Instant::now() < deadline, "process {pid} still alive");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Sessions register while `run` arms the bridge; wait for that before
/// addressing them through the manager.
pub async fn wait_registered(manager: &SessionManager, id: &rs_webshell::app_state::SessionId) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while manager.get(id).await.is_err() {
        assert!(tokio::time::Instant::now() < deadline, "session {id} never registered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
