//! The workflow execution engine.
//!
//! Walks the item sequence in document order, renders node inputs against
//! the run context, dispatches invocations to the process executor, and
//! folds each result back into the context before the next node runs.

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{debug, info};

use baton_core::config::{
    effective_session, AgentKind, AgentNode, LoopNode, StreamName, WorkflowConfig, WorkflowItem,
};
use baton_core::context::{NodeResult, RunContext, PREVIOUS_JSON_KEY, PREVIOUS_KEY};
use baton_core::error::{BatonError, Result};

use crate::artifacts;
use crate::condition::eval_condition;
use crate::invocation::{build_invocation, InvocationInputs};
use crate::process::{self, ProcessRequest, StreamPolicy};
use crate::template::TemplateRenderer;

/// Character budget for the stderr tail embedded in node failures.
const STDERR_SUMMARY_BUDGET: usize = 4000;

pub struct WorkflowEngine {
    config: WorkflowConfig,
    renderer: TemplateRenderer,
}

impl WorkflowEngine {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Execute the whole workflow, mutating `ctx` as nodes complete.
    ///
    /// The first error aborts the remainder of the run; artifacts written
    /// so far are left in place.
    pub async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        self.execute_items(ctx, &self.config.workflow).await
    }

    fn execute_items<'a>(
        &'a self,
        ctx: &'a mut RunContext,
        items: &'a [WorkflowItem],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for item in items {
                match item {
                    WorkflowItem::Agent(node) => self.execute_agent(ctx, node).await?,
                    WorkflowItem::Loop(l) => self.execute_loop(ctx, l).await?,
                }
            }
            Ok(())
        })
    }

    /// Run the loop body up to `max_iters` times, evaluating the
    /// termination condition after each full pass. Node failures inside
    /// the body propagate immediately; the loop only retries when the
    /// body completed but the condition is still false.
    async fn execute_loop(&self, ctx: &mut RunContext, l: &LoopNode) -> Result<()> {
        for i in 0..l.max_iters {
            if ctx.verbose {
                debug!(iteration = i + 1, max = l.max_iters, "loop iteration");
            }
            self.execute_items(ctx, &l.body).await?;

            if eval_condition(&l.until, &ctx.template_data())? {
                info!(iteration = i + 1, max = l.max_iters, "loop condition met");
                return Ok(());
            }
        }
        Err(BatonError::LoopExhausted {
            max_iters: l.max_iters,
        })
    }

    async fn execute_agent(&self, ctx: &mut RunContext, node: &AgentNode) -> Result<()> {
        // Validation checks this already; re-check at dispatch time since
        // validation and execution can be driven independently.
        let agent = self.config.agents.get(&node.agent).ok_or_else(|| {
            BatonError::Config(format!("unknown agent: {}", node.agent))
        })?;
        let kind = agent
            .kind
            .ok_or_else(|| BatonError::Config(format!("agent {} missing type", node.agent)))?;

        let data = ctx.template_data();
        let input = self.resolve_input(ctx, node, &data)?;
        let output_schema = match &agent.output_schema {
            Some(tpl) => Some(self.renderer.render(tpl, &data)?),
            None => None,
        };
        let output_file = match &agent.output_file {
            Some(tpl) => Some(self.renderer.render(tpl, &data)?),
            None => None,
        };
        let session = effective_session(agent.session.as_ref(), node.session.as_ref());
        let invocation = build_invocation(
            kind,
            agent,
            &node.name,
            &InvocationInputs {
                input: &input,
                session,
                sessions: &ctx.sessions,
                output_schema,
                output_file,
            },
        )?;

        let timeout = match &agent.timeout {
            Some(raw) => Some(humantime::parse_duration(raw).map_err(|e| {
                BatonError::Config(format!("agent {} timeout: {}", node.agent, e))
            })?),
            None => None,
        };

        let node_dir = artifacts::node_dir(&ctx.run_dir, &node.name);
        info!(
            node = %node.name,
            agent = %node.agent,
            command = %invocation.command,
            "node start"
        );

        let request = ProcessRequest {
            command: invocation.command.clone(),
            args: invocation.args.clone(),
            workdir: ctx.workdir.clone(),
            env: agent.env.clone().unwrap_or_default(),
            stdin: invocation.stdin.clone(),
            timeout,
            stdout: StreamPolicy {
                capture: agent.captures(StreamName::Stdout),
                echo: agent.prints(StreamName::Stdout),
            },
            stderr: StreamPolicy {
                capture: agent.captures(StreamName::Stderr),
                echo: agent.prints(StreamName::Stderr),
            },
        };
        let output = process::run(&request, &node_dir).await?;

        let result = NodeResult {
            name: node.name.clone(),
            agent: node.agent.clone(),
            exit_code: output.exit_code,
            duration_ms: output.duration.as_millis() as u64,
            command: invocation.command_line(),
        };
        artifacts::write_node_meta(&node_dir, &result)?;
        ctx.node_results.push(result);

        if output.exit_code != 0 {
            let tail = summarize_stderr(&output.stderr);
            let stderr_path = node_dir.join("stderr.log");
            let detail = if tail.is_empty() {
                format!("see {}", stderr_path.display())
            } else {
                format!("stderr: {} (see {})", tail, stderr_path.display())
            };
            return Err(BatonError::NodeFailed {
                node: node.name.clone(),
                exit_code: output.exit_code,
                detail,
            });
        }

        self.apply_output(ctx, node, &output.stdout)?;
        if kind.session_capable() {
            update_session(ctx, kind, &output.stdout);
        }

        info!(
            node = %node.name,
            exit = output.exit_code,
            duration_ms = output.duration.as_millis() as u64,
            "node done"
        );
        Ok(())
    }

    fn resolve_input(
        &self,
        ctx: &RunContext,
        node: &AgentNode,
        data: &Value,
    ) -> Result<String> {
        let input = &node.input;
        if let Some(prompt) = &input.prompt {
            return self.renderer.render(prompt, data);
        }
        if let Some(file) = &input.file {
            let path = self.renderer.render(file, data)?;
            return std::fs::read_to_string(&path)
                .map_err(|e| BatonError::Input(format!("read input file {}: {}", path, e)));
        }
        if let Some(from) = &input.from {
            return match from.as_str() {
                "previous" | "prev" | "last" => {
                    Ok(output_as_string(ctx.outputs.get(PREVIOUS_KEY)))
                }
                "input" => Ok(ctx.input.clone()),
                name => match ctx.outputs.get(name) {
                    Some(value) => Ok(output_as_string(Some(value))),
                    None => Err(BatonError::Input(format!(
                        "input from unknown node: {}",
                        name
                    ))),
                },
            };
        }
        Err(BatonError::Input(format!(
            "node {} input is empty",
            node.name
        )))
    }

    fn apply_output(&self, ctx: &mut RunContext, node: &AgentNode, stdout: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(stdout).to_string();

        if node.output.to_next {
            ctx.last_output = text.clone();
            ctx.outputs
                .insert(PREVIOUS_KEY.to_string(), Value::String(text.clone()));
            ctx.outputs
                .insert(node.name.clone(), Value::String(text.clone()));

            // Structured companion keys are best-effort.
            if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
                let normalized = normalize_structured(parsed);
                ctx.outputs
                    .insert(PREVIOUS_JSON_KEY.to_string(), normalized.clone());
                ctx.outputs
                    .insert(format!("{}_json", node.name), normalized);
            }
        }

        if let Some(file) = &node.output.file {
            let path = self.renderer.render(file, &ctx.template_data())?;
            std::fs::write(&path, stdout)
                .map_err(|e| BatonError::Input(format!("write output file {}: {}", path, e)))?;
        }

        if node.output.stdout {
            echo_to_stdout(stdout)?;
        }
        Ok(())
    }
}

/// Convert a threaded output value to prompt text: strings verbatim,
/// structured values as their JSON encoding.
fn output_as_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Wrap a parsed JSON object so templates can address the payload either
/// directly or under `structured_output`. Arrays and scalars pass through.
fn normalize_structured(value: Value) -> Value {
    match value {
        Value::Object(map) if !map.contains_key("structured_output") => {
            let mut wrapped = Map::new();
            wrapped.insert("structured_output".to_string(), Value::Object(map.clone()));
            for (key, inner) in map {
                wrapped.insert(key, inner);
            }
            Value::Object(wrapped)
        }
        other => other,
    }
}

/// Session continuity is best-effort: stdout that is not JSON, or JSON
/// without a session_id, leaves the table untouched.
fn update_session(ctx: &mut RunContext, kind: AgentKind, stdout: &[u8]) {
    let Ok(value) = serde_json::from_slice::<Value>(stdout) else {
        return;
    };
    if let Some(id) = value.get("session_id").and_then(Value::as_str) {
        if !id.is_empty() {
            ctx.sessions.insert(kind.as_str().to_string(), id.to_string());
        }
    }
}

/// Tail-truncate stderr for the failure message, keeping the end of the
/// text within the budget.
fn summarize_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_SUMMARY_BUDGET {
        return text.to_string();
    }
    let mut cut = text.len() - STDERR_SUMMARY_BUDGET;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    format!("...(truncated)...\n{}", &text[cut..])
}

fn echo_to_stdout(bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    let mut out = std::io::stdout();
    out.write_all(b"\n")?;
    out.write_all(bytes)?;
    if !bytes.is_empty() && bytes[bytes.len() - 1] != b'\n' {
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
