//! Interpreter sandbox.
//!
//! The generator is a Python program; it runs inside a private directory
//! that exposes the virtual roots `/repo`, `/recipe`, `/tmp` and `/builder`.
//! Every request is one interpreter run of a small glue module speaking JSON
//! over stdin/stdout. File payloads travel base64-encoded so script content
//! never needs quoting.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

const GLUE_SOURCE: &str = include_str!("glue.py");
const GLUE_FILE: &str = "recipe_bridge_glue.py";
const ROOT_ENV: &str = "RECIPE_BRIDGE_SANDBOX";

/// Virtual directories every sandbox provides.
pub const VIRTUAL_ROOTS: &[&str] = &["repo", "recipe", "tmp", "builder"];

/// Execution environment for the generator.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Install interpreter add-on packages.
    async fn install_packages(&self, packages: &[&str]) -> Result<()>;

    /// Write a file at a virtual path, creating parent directories.
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Read a UTF-8 file from a virtual path.
    async fn read_text(&self, path: &str) -> Result<String>;

    /// Call a generator entry point with JSON arguments.
    async fn invoke(&self, call: &str, args: Value) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct GlueResponse {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// [`Sandbox`] backed by a local Python interpreter.
pub struct ProcessSandbox {
    python: String,
    root: PathBuf,
    glue: OnceCell<PathBuf>,
}

impl ProcessSandbox {
    pub fn new(python: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            root: root.into(),
            glue: OnceCell::new(),
        }
    }

    /// Lay out the virtual roots and the glue module, once.
    async fn prepare(&self) -> Result<&PathBuf> {
        self.glue
            .get_or_try_init(|| async {
                for dir in VIRTUAL_ROOTS {
                    let path = self.root.join(dir);
                    tokio::fs::create_dir_all(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                }
                let glue = self.root.join(GLUE_FILE);
                tokio::fs::write(&glue, GLUE_SOURCE)
                    .await
                    .with_context(|| format!("Failed to write {}", glue.display()))?;
                Ok::<_, anyhow::Error>(glue)
            })
            .await
    }

    async fn request(&self, op: &str, args: Value) -> Result<Value> {
        let glue = self.prepare().await?;
        let payload = serde_json::to_vec(&json!({ "op": op, "args": args }))?;

        debug!("Sandbox request: {}", op);
        let mut child = Command::new(&self.python)
            .arg(glue)
            .env(ROOT_ENV, &self.root)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start interpreter '{}'", self.python))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .context("Failed to send sandbox request")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for interpreter")?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("Sandbox stderr ({}): {}", op, stderr.trim());
        }

        let response: GlueResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            anyhow!(
                "Sandbox '{}' returned no response (exit {:?}, {}): {}",
                op,
                output.status.code(),
                e,
                stderr.trim()
            )
        })?;

        if !response.ok {
            bail!(
                "{}",
                response
                    .error
                    .unwrap_or_else(|| format!("sandbox '{}' failed", op))
            );
        }
        Ok(response.value)
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn install_packages(&self, packages: &[&str]) -> Result<()> {
        self.request("install", json!({ "packages": packages }))
            .await
            .with_context(|| format!("Failed to install {}", packages.join(", ")))?;
        Ok(())
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.request(
            "stage_file",
            json!({ "path": path, "data": STANDARD.encode(contents) }),
        )
        .await
        .with_context(|| format!("Failed to stage {}", path))?;
        Ok(())
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let value = self
            .request("read_file", json!({ "path": path }))
            .await
            .with_context(|| format!("Failed to read {}", path))?;
        let encoded = value
            .as_str()
            .ok_or_else(|| anyhow!("Sandbox returned non-text content for {}", path))?;
        let bytes = STANDARD
            .decode(encoded)
            .with_context(|| format!("Invalid payload for {}", path))?;
        String::from_utf8(bytes).with_context(|| format!("{} is not UTF-8", path))
    }

    async fn invoke(&self, call: &str, args: Value) -> Result<Value> {
        self.request(call, args).await
    }
}
