use std::path::Path;

use anyhow::{bail, Context};

const DEFAULT_AGENTS: &str = r#"agents:
  codex:
    type: codex
    args: ["--full-auto"]
    timeout: 45m
    capture: [stdout, stderr]
"#;

const DEFAULT_CONFIG: &str = r#"version: 1

workflow:
  - type: agent
    name: write
    agent: codex
    input:
      from: input
    output:
      stdout: true
"#;

/// Write a starter workflow config plus its agents.yaml base layer.
pub fn write_starter(cfg_path: &Path, force: bool) -> anyhow::Result<()> {
    if cfg_path.as_os_str().is_empty() {
        bail!("config path is empty");
    }
    if cfg_path.exists() && !force {
        bail!("config already exists: {}", cfg_path.display());
    }

    if let Some(dir) = cfg_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).context("create config dir")?;
        }
    }

    let agents_path = cfg_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("agents.yaml");
    if !agents_path.exists() || force {
        std::fs::write(&agents_path, DEFAULT_AGENTS).context("write agents.yaml")?;
    }

    std::fs::write(cfg_path, DEFAULT_CONFIG).context("write config")?;
    Ok(())
}
