//! Drives one run end to end: artifact directory, prompt loading,
//! preflight, execution, and the terminal summary.

use std::path::{Path, PathBuf};

use tracing::info;

use baton_core::config::{collect_agent_names, config_dir, WorkflowConfig};
use baton_core::context::RunContext;
use baton_core::error::{BatonError, Result};

use crate::artifacts::{self, RunStatus};
use crate::executor::WorkflowEngine;

#[derive(Debug, Default)]
pub struct RunOptions {
    pub prompt: Option<String>,
    pub prompt_file: Option<PathBuf>,
    pub workdir: Option<PathBuf>,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Outcome of a run. Execution failures land here (with the artifacts
/// path preserved) rather than in `Err`, so callers can always point the
/// operator at the run directory; `Err` is reserved for failures before
/// the run directory exists.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_dir: PathBuf,
    pub status: RunStatus,
    pub error: Option<String>,
}

pub async fn run(cfg: &WorkflowConfig, cfg_path: &Path, opts: RunOptions) -> Result<RunOutcome> {
    let workdir = match &opts.workdir {
        Some(dir) => dir.clone(),
        None => {
            let dir = config_dir(cfg_path);
            if dir.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                dir
            }
        }
    };

    let input = load_prompt(opts.prompt.as_deref(), opts.prompt_file.as_deref())?;

    let run_id = format!(
        "{}-workflow",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let run_dir = workdir.join(".baton").join("runs").join(&run_id);
    std::fs::create_dir_all(&run_dir)
        .map_err(|e| BatonError::Config(format!("create run dir: {}", e)))?;

    artifacts::write_skeleton(&run_dir, &input, &cfg.workflow)?;

    let mut ctx = RunContext::new(input, run_dir.clone(), workdir.clone(), opts.verbose);

    if let Err(err) = ensure_agent_commands(cfg, &workdir) {
        let message = err.to_string();
        artifacts::write_summary(&run_dir, RunStatus::Failed, Some(&message), &ctx.node_results)?;
        return Ok(RunOutcome {
            run_dir,
            status: RunStatus::Failed,
            error: Some(message),
        });
    }

    info!(nodes = cfg.workflow.len(), "run started");
    info!(path = %run_dir.display(), "run artifacts");

    if opts.dry_run {
        artifacts::write_summary(&run_dir, RunStatus::DryRun, None, &ctx.node_results)?;
        return Ok(RunOutcome {
            run_dir,
            status: RunStatus::DryRun,
            error: None,
        });
    }

    let engine = WorkflowEngine::new(cfg.clone());
    match engine.execute(&mut ctx).await {
        Ok(()) => {
            artifacts::write_summary(&run_dir, RunStatus::Success, None, &ctx.node_results)?;
            Ok(RunOutcome {
                run_dir,
                status: RunStatus::Success,
                error: None,
            })
        }
        Err(err) => {
            let message = err.to_string();
            artifacts::write_summary(
                &run_dir,
                RunStatus::Failed,
                Some(&message),
                &ctx.node_results,
            )?;
            Ok(RunOutcome {
                run_dir,
                status: RunStatus::Failed,
                error: Some(message),
            })
        }
    }
}

/// Load the run's input from inline text or a prompt file. Passing both
/// is a caller-facing validation error.
pub fn load_prompt(prompt: Option<&str>, prompt_file: Option<&Path>) -> Result<String> {
    match (prompt, prompt_file) {
        (Some(_), Some(_)) => Err(BatonError::Config(
            "provide only one of --prompt or --prompt-file".into(),
        )),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| BatonError::Config(format!("read prompt file: {}", e))),
        (Some(text), None) => Ok(text.to_string()),
        (None, None) => Ok(String::new()),
    }
}

/// Preflight: every agent referenced by the workflow must resolve to a
/// locatable command before anything runs.
pub fn ensure_agent_commands(cfg: &WorkflowConfig, workdir: &Path) -> Result<()> {
    for name in collect_agent_names(&cfg.workflow) {
        let Some(agent) = cfg.agents.get(&name) else {
            continue;
        };
        let command = agent.resolve_command().ok_or_else(|| {
            BatonError::Config(format!("agent {} has no command configured", name))
        })?;
        command_available(&command, workdir).map_err(|e| {
            BatonError::Config(format!(
                "agent {} command not found: {} ({})",
                name, command, e
            ))
        })?;
    }
    Ok(())
}

/// Check that a command is locatable: absolute paths and paths with a
/// separator must exist (the latter relative to the workdir); bare names
/// must be on PATH with the executable bit set.
pub fn command_available(command: &str, workdir: &Path) -> std::io::Result<()> {
    let as_path = Path::new(command);
    if as_path.is_absolute() {
        std::fs::metadata(as_path)?;
        return Ok(());
    }
    if command.contains('/') {
        std::fs::metadata(workdir.join(command))?;
        return Ok(());
    }
    look_path(command).map(|_| ())
}

fn look_path(command: &str) -> std::io::Result<PathBuf> {
    let path_env = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_env) {
        let candidate = dir.join(command);
        if let Ok(meta) = std::fs::metadata(&candidate) {
            if meta.is_file() && is_executable(&meta) {
                return Ok(candidate);
            }
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "not in PATH",
    ))
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_core::config::{AgentConfig, AgentKind};
    use std::collections::HashMap;

    #[test]
    fn test_load_prompt_exclusivity() {
        let err = load_prompt(Some("hi"), Some(Path::new("p.md"))).unwrap_err();
        assert!(err.to_string().contains("only one of"));

        assert_eq!(load_prompt(Some("hi"), None).unwrap(), "hi");
        assert_eq!(load_prompt(None, None).unwrap(), "");
    }

    #[test]
    fn test_load_prompt_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "from file").unwrap();
        assert_eq!(load_prompt(None, Some(&path)).unwrap(), "from file");
        assert!(load_prompt(None, Some(&dir.path().join("nope.md"))).is_err());
    }

    #[test]
    fn test_command_available_on_path() {
        command_available("sh", Path::new(".")).unwrap();
        assert!(command_available("definitely-not-a-real-command-xyz", Path::new(".")).is_err());
    }

    #[test]
    fn test_ensure_agent_commands_reports_missing() {
        let mut agents = HashMap::new();
        agents.insert(
            "ghost".to_string(),
            AgentConfig {
                kind: Some(AgentKind::Generic),
                command: Some("definitely-not-a-real-command-xyz".into()),
                ..Default::default()
            },
        );
        let cfg = WorkflowConfig {
            version: 1,
            agents,
            workflow: vec![baton_core::config::WorkflowItem::Agent(
                baton_core::config::AgentNode {
                    name: "a".into(),
                    agent: "ghost".into(),
                    input: Default::default(),
                    output: Default::default(),
                    session: None,
                },
            )],
        };
        let err = ensure_agent_commands(&cfg, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(err.to_string().contains("command not found"));
    }
}
