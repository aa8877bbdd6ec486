use std::path::{Path, PathBuf};

use baton_core::config::{collect_agent_names, config_dir, load_config, WorkflowConfig};
use baton_engine::runner::command_available;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

/// Run environment and config health checks. Returns the issue count.
pub fn run_doctor(cfg_path: &Path) -> usize {
    let mut checks = Vec::new();

    let cfg = match load_config(cfg_path) {
        Ok(cfg) => {
            checks.push(CheckResult {
                label: "Config".into(),
                ok: true,
                detail: format!("{} loads and validates", cfg_path.display()),
            });
            Some(cfg)
        }
        Err(e) => {
            checks.push(CheckResult {
                label: "Config".into(),
                ok: false,
                detail: e.to_string(),
            });
            None
        }
    };

    if let Some(cfg) = &cfg {
        let mut workdir = config_dir(cfg_path);
        if workdir.as_os_str().is_empty() {
            workdir = PathBuf::from(".");
        }
        checks.extend(check_agent_commands(cfg, &workdir));
        checks.extend(check_output_schemas(cfg, &workdir));
        checks.push(check_workdir(&workdir));
    }

    let mut ok_count = 0;
    let mut fail_count = 0;
    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }
    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);

    fail_count
}

fn check_agent_commands(cfg: &WorkflowConfig, workdir: &Path) -> Vec<CheckResult> {
    let mut checks = Vec::new();
    for name in collect_agent_names(&cfg.workflow) {
        let Some(agent) = cfg.agents.get(&name) else {
            continue;
        };
        let label = format!("Agent {}", name);
        match agent.resolve_command() {
            Some(command) => match command_available(&command, workdir) {
                Ok(()) => checks.push(CheckResult {
                    label,
                    ok: true,
                    detail: command,
                }),
                Err(e) => checks.push(CheckResult {
                    label,
                    ok: false,
                    detail: format!("command not found: {} ({})", command, e),
                }),
            },
            None => checks.push(CheckResult {
                label,
                ok: false,
                detail: "no command configured".into(),
            }),
        }
    }
    checks
}

fn check_output_schemas(cfg: &WorkflowConfig, workdir: &Path) -> Vec<CheckResult> {
    let mut checks = Vec::new();
    for (name, agent) in &cfg.agents {
        let Some(schema) = &agent.output_schema else {
            continue;
        };
        // Templated schema paths can only be checked once a run context
        // exists; preflight covers the static ones.
        if schema.contains("{{") {
            continue;
        }
        let mut path = PathBuf::from(schema);
        if !path.is_absolute() {
            path = workdir.join(path);
        }
        checks.push(CheckResult {
            label: format!("Schema {}", name),
            ok: path.is_file(),
            detail: path.display().to_string(),
        });
    }
    checks
}

fn check_workdir(workdir: &Path) -> CheckResult {
    if !workdir.is_dir() {
        return CheckResult {
            label: "Workdir".into(),
            ok: false,
            detail: format!("{} (does not exist)", workdir.display()),
        };
    }
    let probe = workdir.join(".doctor_probe");
    match std::fs::write(&probe, "probe") {
        Ok(()) => {
            std::fs::remove_file(&probe).ok();
            CheckResult {
                label: "Workdir".into(),
                ok: true,
                detail: workdir.display().to_string(),
            }
        }
        Err(e) => CheckResult {
            label: "Workdir".into(),
            ok: false,
            detail: format!("{} (not writable: {})", workdir.display(), e),
        },
    }
}
