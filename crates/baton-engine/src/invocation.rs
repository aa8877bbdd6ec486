//! Per-kind command-line synthesis.
//!
//! Each agent kind knows how to turn (definition, resolved input, session
//! table) into an invocation; dispatch is keyed on the kind enumeration.

use std::collections::HashMap;

use tracing::warn;

use baton_core::config::{AgentConfig, AgentKind, SessionResume};
use baton_core::error::{BatonError, Result};

/// A fully resolved command ready for the process executor.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub command: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl AgentInvocation {
    /// The rendered command line as recorded in node results.
    pub fn command_line(&self) -> String {
        let mut line = self.command.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Everything kind-specific synthesis needs besides the definition.
pub struct InvocationInputs<'a> {
    /// The resolved input text for this node.
    pub input: &'a str,
    /// Effective session policy (node override, agent default, or new).
    pub session: SessionResume,
    /// Session ids observed so far, keyed by agent kind.
    pub sessions: &'a HashMap<String, String>,
    /// Rendered output-schema path, if configured.
    pub output_schema: Option<String>,
    /// Rendered output-file path, if configured.
    pub output_file: Option<String>,
}

/// Build the invocation for one agent node.
pub fn build_invocation(
    kind: AgentKind,
    agent: &AgentConfig,
    node: &str,
    inputs: &InvocationInputs<'_>,
) -> Result<AgentInvocation> {
    match kind {
        AgentKind::Codex => codex_invocation(agent, node, inputs),
        AgentKind::Claude => claude_invocation(agent, inputs),
        AgentKind::Generic => generic_invocation(agent, inputs),
    }
}

fn codex_invocation(
    agent: &AgentConfig,
    node: &str,
    inputs: &InvocationInputs<'_>,
) -> Result<AgentInvocation> {
    let mut resume_last = inputs.session == SessionResume::Last;
    if resume_last && (inputs.output_schema.is_some() || inputs.output_file.is_some()) {
        // codex exec resume does not accept the output flags
        warn!(node = %node, "codex resume disabled for output schema/file");
        resume_last = false;
    }

    let mut args: Vec<String> = Vec::new();
    if resume_last {
        args.extend(["exec", "resume", "--last"].map(String::from));
    } else {
        args.push("exec".to_string());
    }
    if let Some(model) = &agent.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if let Some(thinking) = agent.thinking {
        args.push("-c".to_string());
        args.push(format!("model_reasoning_effort={}", thinking.as_str()));
    }
    args.extend(agent.args.clone().unwrap_or_default());
    if let Some(schema) = &inputs.output_schema {
        args.push("--output-schema".to_string());
        args.push(schema.clone());
    }
    if let Some(file) = &inputs.output_file {
        args.push("--output-last-message".to_string());
        args.push(file.clone());
    }
    args.push(inputs.input.to_string());

    Ok(AgentInvocation {
        command: resolved_command(agent, AgentKind::Codex)?,
        args,
        stdin: None,
    })
}

fn claude_invocation(
    agent: &AgentConfig,
    inputs: &InvocationInputs<'_>,
) -> Result<AgentInvocation> {
    let mut args = vec!["-p".to_string(), inputs.input.to_string()];
    if let Some(model) = &agent.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    args.extend(agent.args.clone().unwrap_or_default());
    if inputs.session == SessionResume::Last {
        let session_id = inputs
            .sessions
            .get(AgentKind::Claude.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BatonError::Session(
                    "claude resume requested but no session_id is available".into(),
                )
            })?;
        args.push("--resume".to_string());
        args.push(session_id.clone());
    }

    Ok(AgentInvocation {
        command: resolved_command(agent, AgentKind::Claude)?,
        args,
        stdin: None,
    })
}

fn generic_invocation(
    agent: &AgentConfig,
    inputs: &InvocationInputs<'_>,
) -> Result<AgentInvocation> {
    let command = agent
        .command
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| BatonError::Config("generic agent requires command".into()))?;
    let mut args = agent.args.clone().unwrap_or_default();
    if !inputs.input.is_empty() {
        args.push(inputs.input.to_string());
    }
    Ok(AgentInvocation {
        command,
        args,
        stdin: None,
    })
}

fn resolved_command(agent: &AgentConfig, kind: AgentKind) -> Result<String> {
    if let Some(command) = &agent.command {
        if !command.is_empty() {
            return Ok(command.clone());
        }
    }
    kind.default_command()
        .map(String::from)
        .ok_or_else(|| BatonError::Config(format!("agent kind {} has no command", kind)))
}
