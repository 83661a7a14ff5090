//! Container sandbox for shell commands.
//!
//! Commands run inside a small Debian image with the workDir mounted at
//! `/data`. The image is built on first use from the embedded Dockerfile,
//! so the only host requirement is a working `docker` binary.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub const SANDBOX_IMAGE: &str = "codeclaw-sandbox:0";

/// In-container wall clock limit, enforced with coreutils `timeout`.
pub const COMMAND_TIMEOUT_SECS: u64 = 30;

const DOCKERFILE: &str = "\
FROM debian:bookworm-slim
RUN apt-get update \\
 && apt-get install -y --no-install-recommends git jq curl grep ripgrep tree \\
 && rm -rf /var/lib/apt/lists/*
WORKDIR /data
";

#[derive(Debug)]
pub struct SandboxOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Builds the sandbox image if it is not already present.
pub async fn ensure_image() -> Result<(), String> {
    let inspect = Command::new("docker")
        .args(["image", "inspect", SANDBOX_IMAGE])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| format!("docker is not available: {e}"))?;
    if inspect.success() {
        return Ok(());
    }

    debug!(image = SANDBOX_IMAGE, "building sandbox image");
    let mut child = Command::new("docker")
        .args(["build", "-q", "-t", SANDBOX_IMAGE, "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("docker is not available: {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(DOCKERFILE.as_bytes())
            .await
            .map_err(|e| format!("failed to send Dockerfile to docker build: {e}"))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("docker build did not finish: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("sandbox image build failed: {}", stderr.trim()));
    }
    Ok(())
}

/// Runs `command args...` inside the sandbox with `work_dir` mounted at /data.
pub async fn run_in_sandbox(
    work_dir: &Path,
    read_write: bool,
    command: &str,
    args: &[String],
) -> Result<SandboxOutput, String> {
    ensure_image().await?;

    let root = std::fs::canonicalize(work_dir)
        .map_err(|e| format!("workDir is not accessible: {e}"))?;
    let mount = mount_spec(&root, read_write);
    let run_args = docker_run_args(&mount, command, args);

    debug!(%command, read_write, "running sandboxed command");
    let output = Command::new("docker")
        .args(&run_args)
        .output()
        .await
        .map_err(|e| format!("docker run failed to start: {e}"))?;

    Ok(SandboxOutput {
        status_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Bind mount spec for the workDir. Read-only sessions get a `:ro` mount so
/// not even the container can write through it.
pub fn mount_spec(work_dir: &Path, read_write: bool) -> String {
    let suffix = if read_write { "" } else { ":ro" };
    format!("{}:/data{suffix}", work_dir.display())
}

pub fn docker_run_args(mount: &str, command: &str, args: &[String]) -> Vec<String> {
    let mut run_args: Vec<String> = vec![
        "run".into(),
        "--rm".into(),
        "-v".into(),
        mount.to_string(),
        "-w".into(),
        "/data".into(),
        SANDBOX_IMAGE.into(),
        "timeout".into(),
        COMMAND_TIMEOUT_SECS.to_string(),
        command.into(),
    ];
    run_args.extend(args.iter().cloned());
    run_args
}

/// Assembles labeled STDOUT / STDERR blocks, dropping empty streams.
pub fn format_output(stdout: &str, stderr: &str) -> String {
    let mut blocks = Vec::new();
    let out = stdout.trim();
    let err = stderr.trim();
    if !out.is_empty() {
        blocks.push(format!("STDOUT:\n{out}"));
    }
    if !err.is_empty() {
        blocks.push(format!("STDERR:\n{err}"));
    }
    blocks.join("\n\n")
}
