use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn atlas_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_atlas"))
}

/// `atlas` pointed at `data`, with the environment scrubbed so the host's
/// STACKATLAS_DATA or RUST_LOG cannot leak into the run.
pub fn atlas(data: &Path) -> Command {
    let mut cmd = Command::new(atlas_binary());
    cmd.env_remove("STACKATLAS_DATA")
        .env_remove("RUST_LOG")
        .arg("--data")
        .arg(data);
    cmd
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

pub fn stdout_json(output: &Output) -> Result<Value> {
    serde_json::from_slice(&output.stdout).context("stdout is not JSON")
}

/// A dataset directory holding `categories.json` and one document per
/// listed partition. Partitions not listed are absent on disk.
pub struct Dataset {
    pub dir: TempDir,
}

impl Dataset {
    pub fn new(categories: Value) -> Result<Self> {
        let dir = TempDir::new().context("allocating dataset dir")?;
        let dataset = Self { dir };
        dataset.write("categories.json", &categories)?;
        Ok(dataset)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(self.dir.path().join(name), bytes).with_context(|| format!("writing {name}"))
    }

    pub fn write_raw(&self, name: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.dir.path().join(name), bytes).with_context(|| format!("writing {name}"))
    }

    /// Write an empty document for every partition not already on disk.
    pub fn fill_empty_partitions(&self) -> Result<()> {
        for letter in stackatlas::PARTITION_ALPHABET.chars() {
            let path = self.dir.path().join(format!("{letter}.json"));
            if !path.exists() {
                fs::write(&path, b"{}").with_context(|| format!("writing {}", path.display()))?;
            }
        }
        Ok(())
    }
}
