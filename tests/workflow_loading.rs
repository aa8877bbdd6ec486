use std::path::PathBuf;

use baton_core::config::{load_config, AgentKind};

fn write_config(dir: &std::path::Path, agents: &str, workflow: &str) -> PathBuf {
    std::fs::write(dir.join("agents.yaml"), agents).expect("write agents.yaml");
    let cfg_path = dir.join("baton.yaml");
    std::fs::write(&cfg_path, workflow).expect("write baton.yaml");
    cfg_path
}

const BASE_AGENTS: &str = r#"
agents:
  codex:
    type: codex
    model: gpt-5.1
    thinking: high
    timeout: 45m
  shell:
    type: generic
    command: echo
"#;

#[test]
fn test_load_full_config_from_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(
        dir.path(),
        BASE_AGENTS,
        r#"
version: 1

agents:
  reviewer:
    extends: codex
    thinking: xhigh
    args: ["--full-auto"]

workflow:
  - type: agent
    name: review
    agent: reviewer
    input:
      prompt: "Review: {{input.prompt}}"
    output:
      toNext: true
  - type: loop
    maxIters: 3
    until: "{{ last == \"done\" }}"
    body:
      - type: agent
        name: fix
        agent: shell
        input:
          from: previous
        output:
          toNext: true
"#,
    );

    let cfg = load_config(&cfg_path).expect("load config");

    assert_eq!(cfg.version, 1);
    // base layer + override are both present
    assert!(cfg.agents.contains_key("codex"));
    assert!(cfg.agents.contains_key("shell"));

    let reviewer = &cfg.agents["reviewer"];
    assert_eq!(reviewer.kind, Some(AgentKind::Codex));
    assert_eq!(reviewer.model.as_deref(), Some("gpt-5.1"));
    assert_eq!(reviewer.thinking.map(|t| t.as_str()), Some("xhigh"));
    assert_eq!(reviewer.timeout.as_deref(), Some("45m"));
    assert!(reviewer.extends.is_none());

    assert_eq!(cfg.workflow.len(), 2);
}

#[test]
fn test_missing_agents_yaml_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = dir.path().join("baton.yaml");
    std::fs::write(&cfg_path, "version: 1\nworkflow: []\n").expect("write");

    let err = load_config(&cfg_path).expect_err("should fail");
    assert!(err.to_string().contains("agents.yaml not found"));
}

#[test]
fn test_unsupported_version_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(dir.path(), BASE_AGENTS, "version: 2\nworkflow: []\n");

    let err = load_config(&cfg_path).expect_err("should fail");
    assert!(err.to_string().contains("unsupported config version: 2"));
}

#[test]
fn test_duplicate_node_names_fail_before_execution() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(
        dir.path(),
        BASE_AGENTS,
        r#"
version: 1
workflow:
  - type: agent
    name: step
    agent: shell
    input: { prompt: "a" }
    output: { toNext: true }
  - type: loop
    maxIters: 2
    until: "true"
    body:
      - type: agent
        name: step
        agent: shell
        input: { prompt: "b" }
        output: { toNext: true }
"#,
    );

    let err = load_config(&cfg_path).expect_err("should fail");
    assert!(err.to_string().contains("duplicate workflow name: step"));
}

#[test]
fn test_unknown_agent_reference_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(
        dir.path(),
        BASE_AGENTS,
        r#"
version: 1
workflow:
  - type: agent
    name: step
    agent: ghost
    input: { prompt: "a" }
    output: { toNext: true }
"#,
    );

    let err = load_config(&cfg_path).expect_err("should fail");
    assert!(err.to_string().contains("unknown agent: ghost"));
}

#[test]
fn test_unknown_agent_kind_fails_at_parse() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(
        dir.path(),
        "agents:\n  odd:\n    type: mystery\n",
        "version: 1\nworkflow: []\n",
    );

    assert!(load_config(&cfg_path).is_err());
}

#[test]
fn test_invalid_thinking_level_fails_at_parse() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg_path = write_config(
        dir.path(),
        "agents:\n  codex:\n    type: codex\n    thinking: hardest\n",
        "version: 1\nworkflow: []\n",
    );

    assert!(load_config(&cfg_path).is_err());
}
