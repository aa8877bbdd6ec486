//! Run-directory layout and persisted documents.
//!
//! Per run: `input.md`, `resolved-workflow.json`,
//! `nodes/<name>/{stdout.log,stderr.log,meta.json}`, and `summary.md`
//! holding a human header plus a structured JSON block.

use std::path::{Path, PathBuf};

use serde::Serialize;

use baton_core::config::WorkflowItem;
use baton_core::context::NodeResult;
use baton_core::error::Result;

/// Terminal status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Success,
    Failed,
    DryRun,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::DryRun => "dry-run",
        })
    }
}

/// Artifact directory for one node's invocation.
pub fn node_dir(run_dir: &Path, name: &str) -> PathBuf {
    let name = if name.is_empty() { "node" } else { name };
    run_dir.join("nodes").join(name)
}

/// Write the up-front artifacts: raw input, the resolved workflow
/// snapshot, and the nodes directory.
pub fn write_skeleton(run_dir: &Path, input: &str, workflow: &[WorkflowItem]) -> Result<()> {
    std::fs::write(run_dir.join("input.md"), input)?;
    let mut raw = serde_json::to_string_pretty(workflow)?;
    raw.push('\n');
    std::fs::write(run_dir.join("resolved-workflow.json"), raw)?;
    std::fs::create_dir_all(run_dir.join("nodes"))?;
    Ok(())
}

#[derive(Serialize)]
struct NodeMeta<'a> {
    #[serde(flatten)]
    result: &'a NodeResult,
    stdout_log: String,
    stderr_log: String,
}

/// Persist a node's metadata next to its stream logs. Written for every
/// invocation, failing ones included.
pub fn write_node_meta(dir: &Path, result: &NodeResult) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let meta = NodeMeta {
        result,
        stdout_log: dir.join("stdout.log").display().to_string(),
        stderr_log: dir.join("stderr.log").display().to_string(),
    };
    let mut raw = serde_json::to_string_pretty(&meta)?;
    raw.push('\n');
    std::fs::write(dir.join("meta.json"), raw)?;
    Ok(())
}

#[derive(Serialize)]
struct Summary<'a> {
    status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    time: String,
    nodes: &'a [NodeResult],
}

/// Write the run-level summary, both human-readable and structured.
pub fn write_summary(
    run_dir: &Path,
    status: RunStatus,
    error: Option<&str>,
    nodes: &[NodeResult],
) -> Result<()> {
    let summary = Summary {
        status,
        error,
        time: chrono::Utc::now().to_rfc3339(),
        nodes,
    };
    let json = serde_json::to_string_pretty(&summary)?;

    let mut content = String::from("# baton run summary\n\n");
    content.push_str(&format!("- status: {}\n", status));
    if let Some(error) = error {
        content.push_str(&format!("- error: {}\n", error));
    }
    content.push_str(&format!("- nodes: {}\n", nodes.len()));
    content.push_str("\n```json\n");
    content.push_str(&json);
    content.push_str("\n```\n");

    std::fs::write(run_dir.join("summary.md"), content)?;
    Ok(())
}
