use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BatonError, Result};

/// The closed set of agent runtimes baton knows how to invoke.
///
/// `Codex` and `Claude` carry built-in command-line conventions; `Generic`
/// runs whatever command the definition names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Codex,
    Claude,
    Generic,
}

impl AgentKind {
    /// Command used when the agent definition has no explicit override.
    pub fn default_command(&self) -> Option<&'static str> {
        match self {
            Self::Codex => Some("codex"),
            Self::Claude => Some("claude"),
            Self::Generic => None,
        }
    }

    /// Whether stdout of this kind may carry a resumable session id.
    pub fn session_capable(&self) -> bool {
        matches!(self, Self::Claude)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasoning-effort hint, only meaningful for codex agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Minimal,
    Low,
    Medium,
    High,
    Xhigh,
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Xhigh => "xhigh",
        }
    }
}

/// Session continuity policy for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionResume {
    /// Start a fresh conversation.
    #[default]
    New,
    /// Resume the most recent session observed for this agent kind.
    Last,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<SessionResume>,
}

/// Which child streams a policy list refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// A named, reusable invocation template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Name of another agent definition to inherit fields from (one level).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AgentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Path to a JSON schema for structured output; may be templated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,
    /// Path to write the agent's last message to; may be templated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    /// Timeout as a humantime string ("90s", "5m").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Streams to capture into the result. Unset or empty means both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<Vec<StreamName>>,
    /// Streams to echo live to the caller. Unset or empty means neither.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<Vec<StreamName>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSpec>,
}

impl AgentConfig {
    /// The command this agent resolves to, if any.
    pub fn resolve_command(&self) -> Option<String> {
        if let Some(cmd) = &self.command {
            return Some(cmd.clone());
        }
        self.kind.and_then(|k| k.default_command().map(String::from))
    }

    pub fn captures(&self, stream: StreamName) -> bool {
        match &self.capture {
            None => true,
            Some(list) if list.is_empty() => true,
            Some(list) => list.contains(&stream),
        }
    }

    pub fn prints(&self, stream: StreamName) -> bool {
        match &self.print {
            None => false,
            Some(list) => list.contains(&stream),
        }
    }
}

/// Where an agent node's prompt comes from. Exactly one field must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// What happens to an agent node's stdout. Any non-empty subset of the
/// three flags is allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// Thread stdout forward as the implicit previous output and under
    /// the node's own name.
    #[serde(default)]
    pub to_next: bool,
    /// Write stdout to this (templated) path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Echo stdout to the caller's stdout.
    #[serde(default)]
    pub stdout: bool,
}

/// An agent invocation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentNode {
    pub name: String,
    pub agent: String,
    #[serde(default)]
    pub input: InputSpec,
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSpec>,
}

/// A bounded retry loop around a nested item sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopNode {
    pub max_iters: u32,
    pub until: String,
    #[serde(default)]
    pub body: Vec<WorkflowItem>,
}

/// One step of the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkflowItem {
    Agent(AgentNode),
    Loop(LoopNode),
}

/// The validated, in-memory workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
    #[serde(default)]
    pub workflow: Vec<WorkflowItem>,
}

/// Load, merge, and validate a workflow configuration.
///
/// The file's directory must also contain an `agents.yaml` base layer;
/// agents in the workflow file override or extend that layer.
pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| BatonError::Config(format!("read config {}: {}", path.display(), e)))?;
    let mut cfg: WorkflowConfig = serde_yaml::from_str(&raw)
        .map_err(|e| BatonError::Config(format!("parse yaml: {}", e)))?;

    let base_agents = load_base_agents(path)?;
    if cfg.version != 1 {
        return Err(BatonError::Config(format!(
            "unsupported config version: {}",
            cfg.version
        )));
    }
    cfg.agents = merge_agents(&base_agents, &cfg.agents)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Directory containing the config file, or empty for bare filenames.
pub fn config_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if dir != Path::new("") => dir.to_path_buf(),
        _ => PathBuf::new(),
    }
}

/// Sorted names of all merged agent definitions.
pub fn agent_names(cfg: &WorkflowConfig) -> Vec<String> {
    let mut names: Vec<String> = cfg.agents.keys().cloned().collect();
    names.sort();
    names
}

/// The set of agent names actually referenced by workflow nodes,
/// including nodes nested in loop bodies. Exposed for preflight checks.
pub fn collect_agent_names(items: &[WorkflowItem]) -> Vec<String> {
    let mut used = Vec::new();
    collect_into(items, &mut used);
    used.sort();
    used.dedup();
    used
}

fn collect_into(items: &[WorkflowItem], used: &mut Vec<String>) {
    for item in items {
        match item {
            WorkflowItem::Agent(node) => used.push(node.agent.clone()),
            WorkflowItem::Loop(l) => collect_into(&l.body, used),
        }
    }
}

fn load_base_agents(config_path: &Path) -> Result<HashMap<String, AgentConfig>> {
    let mut dir = config_dir(config_path);
    if dir.as_os_str().is_empty() {
        dir = PathBuf::from(".");
    }
    let agents_path = dir.join("agents.yaml");
    let raw = match std::fs::read_to_string(&agents_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BatonError::Config(format!(
                "agents.yaml not found: {}",
                agents_path.display()
            )));
        }
        Err(e) => {
            return Err(BatonError::Config(format!(
                "read agents.yaml: {}",
                e
            )));
        }
    };

    #[derive(Deserialize)]
    struct BaseAgents {
        #[serde(default)]
        agents: HashMap<String, AgentConfig>,
    }
    let payload: BaseAgents = serde_yaml::from_str(&raw)
        .map_err(|e| BatonError::Config(format!("parse agents.yaml: {}", e)))?;
    Ok(payload.agents)
}

/// Merge the base agents layer with workflow-file overrides.
///
/// An override with `extends: <name>` starts from that base definition;
/// otherwise it starts from the same-named entry if one exists. Extending
/// an unknown name is a configuration error.
pub fn merge_agents(
    base: &HashMap<String, AgentConfig>,
    overrides: &HashMap<String, AgentConfig>,
) -> Result<HashMap<String, AgentConfig>> {
    let mut merged = base.clone();
    for (name, agent) in overrides {
        let base_agent = if let Some(parent) = &agent.extends {
            base.get(parent)
                .cloned()
                .ok_or_else(|| {
                    BatonError::Config(format!(
                        "agent {} extends unknown agent: {}",
                        name, parent
                    ))
                })?
        } else {
            merged.get(name).cloned().unwrap_or_default()
        };
        merged.insert(name.clone(), merge_agent_config(base_agent, agent));
    }
    Ok(merged)
}

/// Field-by-field override merge of two agent definitions.
///
/// Fields set on `over` win; `env` merges per key. The extends marker is
/// cleared on the result so a merged record can never be re-extended.
fn merge_agent_config(base: AgentConfig, over: &AgentConfig) -> AgentConfig {
    let mut result = base;
    if over.kind.is_some() {
        result.kind = over.kind;
    }
    if over.command.is_some() {
        result.command = over.command.clone();
    }
    if over.model.is_some() {
        result.model = over.model.clone();
    }
    if over.thinking.is_some() {
        result.thinking = over.thinking;
    }
    if over.args.is_some() {
        result.args = over.args.clone();
    }
    if over.output_schema.is_some() {
        result.output_schema = over.output_schema.clone();
    }
    if over.output_file.is_some() {
        result.output_file = over.output_file.clone();
    }
    if let Some(env) = &over.env {
        let merged_env = result.env.get_or_insert_with(HashMap::new);
        for (key, value) in env {
            merged_env.insert(key.clone(), value.clone());
        }
    }
    if over.timeout.is_some() {
        result.timeout = over.timeout.clone();
    }
    if over.capture.is_some() {
        result.capture = over.capture.clone();
    }
    if over.print.is_some() {
        result.print = over.print.clone();
    }
    if over.session.is_some() {
        result.session = over.session;
    }
    result.extends = None;
    result
}

/// Validate every invariant of the data model. Runs at load time, before
/// any execution.
pub fn validate_config(cfg: &WorkflowConfig) -> Result<()> {
    if cfg.agents.is_empty() {
        return Err(BatonError::Config("agents map is empty".into()));
    }
    if cfg.workflow.is_empty() {
        return Err(BatonError::Config("workflow is empty".into()));
    }
    for (name, agent) in &cfg.agents {
        let kind = agent
            .kind
            .ok_or_else(|| BatonError::Config(format!("agent {} missing type", name)))?;
        if kind == AgentKind::Generic && agent.command.as_deref().unwrap_or("").is_empty() {
            return Err(BatonError::Config(format!(
                "agent {} type generic requires command",
                name
            )));
        }
        if agent.model.is_some() && kind == AgentKind::Generic {
            return Err(BatonError::Config(format!(
                "agent {} model is only supported for codex or claude",
                name
            )));
        }
        if agent.thinking.is_some() && kind != AgentKind::Codex {
            return Err(BatonError::Config(format!(
                "agent {} thinking is only supported for codex",
                name
            )));
        }
        if let Some(timeout) = &agent.timeout {
            humantime::parse_duration(timeout).map_err(|e| {
                BatonError::Config(format!("agent {} timeout: {}", name, e))
            })?;
        }
    }
    let mut seen = std::collections::HashSet::new();
    validate_items(cfg, &cfg.workflow, &mut seen)
}

fn validate_items(
    cfg: &WorkflowConfig,
    items: &[WorkflowItem],
    seen: &mut std::collections::HashSet<String>,
) -> Result<()> {
    for (idx, item) in items.iter().enumerate() {
        match item {
            WorkflowItem::Agent(node) => {
                if node.agent.is_empty() {
                    return Err(BatonError::Config(format!(
                        "workflow[{}] agent is required",
                        idx
                    )));
                }
                if !cfg.agents.contains_key(&node.agent) {
                    return Err(BatonError::Config(format!(
                        "workflow[{}] references unknown agent: {}",
                        idx, node.agent
                    )));
                }
                if node.name.is_empty() {
                    return Err(BatonError::Config(format!(
                        "workflow[{}] name is required",
                        idx
                    )));
                }
                if !seen.insert(node.name.clone()) {
                    return Err(BatonError::Config(format!(
                        "duplicate workflow name: {}",
                        node.name
                    )));
                }
                validate_input(&node.input, idx)?;
                validate_output(&node.output, idx)?;
            }
            WorkflowItem::Loop(l) => {
                if l.max_iters == 0 {
                    return Err(BatonError::Config(format!(
                        "workflow[{}] loop maxIters must be > 0",
                        idx
                    )));
                }
                if l.until.trim().is_empty() {
                    return Err(BatonError::Config(format!(
                        "workflow[{}] loop until is required",
                        idx
                    )));
                }
                if l.body.is_empty() {
                    return Err(BatonError::Config(format!(
                        "workflow[{}] loop body is empty",
                        idx
                    )));
                }
                validate_items(cfg, &l.body, seen)?;
            }
        }
    }
    Ok(())
}

fn validate_input(input: &InputSpec, idx: usize) -> Result<()> {
    let count = [
        input.prompt.is_some(),
        input.file.is_some(),
        input.from.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();
    if count == 0 {
        return Err(BatonError::Config(format!(
            "workflow[{}] input requires one of prompt, file, or from",
            idx
        )));
    }
    if count > 1 {
        return Err(BatonError::Config(format!(
            "workflow[{}] input must specify only one of prompt, file, or from",
            idx
        )));
    }
    Ok(())
}

// toNext, file, and stdout combine freely; only the empty set is invalid.
fn validate_output(output: &OutputSpec, idx: usize) -> Result<()> {
    if !output.to_next && output.file.is_none() && !output.stdout {
        return Err(BatonError::Config(format!(
            "workflow[{}] output requires at least one of toNext, file, or stdout",
            idx
        )));
    }
    Ok(())
}

/// Effective session policy for a node: node override first, then the
/// agent's default, then a fresh session.
pub fn effective_session(
    agent_session: Option<&SessionSpec>,
    node_session: Option<&SessionSpec>,
) -> SessionResume {
    if let Some(spec) = node_session {
        if let Some(resume) = spec.resume {
            return resume;
        }
    }
    if let Some(spec) = agent_session {
        if let Some(resume) = spec.resume {
            return resume;
        }
    }
    SessionResume::New
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic_agent(command: &str) -> AgentConfig {
        AgentConfig {
            kind: Some(AgentKind::Generic),
            command: Some(command.to_string()),
            ..Default::default()
        }
    }

    fn agent_node(name: &str, agent: &str) -> WorkflowItem {
        WorkflowItem::Agent(AgentNode {
            name: name.to_string(),
            agent: agent.to_string(),
            input: InputSpec {
                prompt: Some("hi".into()),
                ..Default::default()
            },
            output: OutputSpec {
                to_next: true,
                ..Default::default()
            },
            session: None,
        })
    }

    fn minimal_config() -> WorkflowConfig {
        let mut agents = HashMap::new();
        agents.insert("echo".to_string(), generic_agent("echo"));
        WorkflowConfig {
            version: 1,
            agents,
            workflow: vec![agent_node("first", "echo")],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        validate_config(&minimal_config()).unwrap();
    }

    #[test]
    fn test_generic_requires_command() {
        let mut cfg = minimal_config();
        cfg.agents.get_mut("echo").unwrap().command = None;
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("requires command"));
    }

    #[test]
    fn test_model_rejected_for_generic() {
        let mut cfg = minimal_config();
        cfg.agents.get_mut("echo").unwrap().model = Some("gpt-5".into());
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn test_thinking_only_for_codex() {
        let mut cfg = minimal_config();
        cfg.agents.insert(
            "cc".into(),
            AgentConfig {
                kind: Some(AgentKind::Claude),
                thinking: Some(ThinkingLevel::High),
                ..Default::default()
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("thinking"));
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let mut cfg = minimal_config();
        cfg.agents.get_mut("echo").unwrap().timeout = Some("soon".into());
        assert!(validate_config(&cfg).is_err());

        cfg.agents.get_mut("echo").unwrap().timeout = Some("90s".into());
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn test_duplicate_names_across_loop_bodies() {
        let mut cfg = minimal_config();
        cfg.workflow.push(WorkflowItem::Loop(LoopNode {
            max_iters: 3,
            until: "true".into(),
            body: vec![agent_node("first", "echo")],
        }));
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("duplicate workflow name: first"));
    }

    #[test]
    fn test_input_exactly_one() {
        let mut cfg = minimal_config();
        if let WorkflowItem::Agent(node) = &mut cfg.workflow[0] {
            node.input.file = Some("prompt.md".into());
        }
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("only one of prompt, file, or from"));

        if let WorkflowItem::Agent(node) = &mut cfg.workflow[0] {
            node.input = InputSpec::default();
        }
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("requires one of"));
    }

    #[test]
    fn test_output_flags_combine_freely() {
        let mut cfg = minimal_config();
        if let WorkflowItem::Agent(node) = &mut cfg.workflow[0] {
            node.output = OutputSpec {
                to_next: true,
                file: Some("out.txt".into()),
                stdout: true,
            };
        }
        validate_config(&cfg).unwrap();

        if let WorkflowItem::Agent(node) = &mut cfg.workflow[0] {
            node.output = OutputSpec::default();
        }
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("output requires at least one"));
    }

    #[test]
    fn test_loop_bounds_validated() {
        let mut cfg = minimal_config();
        cfg.workflow = vec![WorkflowItem::Loop(LoopNode {
            max_iters: 0,
            until: "true".into(),
            body: vec![agent_node("a", "echo")],
        })];
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("maxIters"));
    }

    #[test]
    fn test_merge_extends_keeps_base_fields() {
        let mut base = HashMap::new();
        base.insert(
            "codex-base".to_string(),
            AgentConfig {
                kind: Some(AgentKind::Codex),
                model: Some("gpt-5.1".into()),
                timeout: Some("10m".into()),
                env: Some(HashMap::from([("A".to_string(), "1".to_string())])),
                ..Default::default()
            },
        );
        let mut overrides = HashMap::new();
        overrides.insert(
            "reviewer".to_string(),
            AgentConfig {
                extends: Some("codex-base".into()),
                thinking: Some(ThinkingLevel::High),
                env: Some(HashMap::from([("B".to_string(), "2".to_string())])),
                ..Default::default()
            },
        );

        let merged = merge_agents(&base, &overrides).unwrap();
        let reviewer = &merged["reviewer"];
        assert_eq!(reviewer.kind, Some(AgentKind::Codex));
        assert_eq!(reviewer.model.as_deref(), Some("gpt-5.1"));
        assert_eq!(reviewer.thinking, Some(ThinkingLevel::High));
        assert_eq!(reviewer.timeout.as_deref(), Some("10m"));
        let env = reviewer.env.as_ref().unwrap();
        assert_eq!(env["A"], "1");
        assert_eq!(env["B"], "2");
        assert!(reviewer.extends.is_none());
    }

    #[test]
    fn test_merge_unknown_extends_fails() {
        let base = HashMap::new();
        let mut overrides = HashMap::new();
        overrides.insert(
            "x".to_string(),
            AgentConfig {
                extends: Some("nope".into()),
                ..Default::default()
            },
        );
        let err = merge_agents(&base, &overrides).unwrap_err();
        assert!(err.to_string().contains("extends unknown agent"));
    }

    #[test]
    fn test_merge_same_name_overrides_base() {
        let mut base = HashMap::new();
        base.insert("runner".to_string(), generic_agent("echo"));
        let mut overrides = HashMap::new();
        overrides.insert(
            "runner".to_string(),
            AgentConfig {
                command: Some("printf".into()),
                ..Default::default()
            },
        );
        let merged = merge_agents(&base, &overrides).unwrap();
        assert_eq!(merged["runner"].command.as_deref(), Some("printf"));
        assert_eq!(merged["runner"].kind, Some(AgentKind::Generic));
    }

    #[test]
    fn test_collect_agent_names_recurses() {
        let items = vec![
            agent_node("a", "echo"),
            WorkflowItem::Loop(LoopNode {
                max_iters: 2,
                until: "true".into(),
                body: vec![agent_node("b", "codex-base")],
            }),
        ];
        assert_eq!(collect_agent_names(&items), vec!["codex-base", "echo"]);
    }

    #[test]
    fn test_effective_session_precedence() {
        let agent = SessionSpec {
            resume: Some(SessionResume::Last),
        };
        let node = SessionSpec {
            resume: Some(SessionResume::New),
        };
        assert_eq!(
            effective_session(Some(&agent), Some(&node)),
            SessionResume::New
        );
        assert_eq!(
            effective_session(Some(&agent), None),
            SessionResume::Last
        );
        assert_eq!(effective_session(None, None), SessionResume::New);
    }

    #[test]
    fn test_capture_and_print_defaults() {
        let agent = generic_agent("echo");
        assert!(agent.captures(StreamName::Stdout));
        assert!(agent.captures(StreamName::Stderr));
        assert!(!agent.prints(StreamName::Stdout));

        let agent = AgentConfig {
            capture: Some(vec![StreamName::Stdout]),
            print: Some(vec![StreamName::Stderr]),
            ..generic_agent("echo")
        };
        assert!(agent.captures(StreamName::Stdout));
        assert!(!agent.captures(StreamName::Stderr));
        assert!(agent.prints(StreamName::Stderr));
        assert!(!agent.prints(StreamName::Stdout));
    }

    #[test]
    fn test_workflow_item_yaml_roundtrip() {
        let yaml = r#"
- type: agent
  name: plan
  agent: planner
  input:
    prompt: "Plan: {{input.prompt}}"
  output:
    toNext: true
- type: loop
  maxIters: 3
  until: "{{ outputs.check == \"ok\" }}"
  body:
    - type: agent
      name: fix
      agent: fixer
      input:
        from: previous
      output:
        toNext: true
"#;
        let items: Vec<WorkflowItem> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(items.len(), 2);
        match &items[1] {
            WorkflowItem::Loop(l) => {
                assert_eq!(l.max_iters, 3);
                assert_eq!(l.body.len(), 1);
            }
            _ => panic!("expected loop"),
        }
        // Resolved workflows are persisted as JSON.
        let json = serde_json::to_string_pretty(&items).unwrap();
        assert!(json.contains("\"type\": \"agent\""));
        assert!(json.contains("\"maxIters\": 3"));
    }
}
