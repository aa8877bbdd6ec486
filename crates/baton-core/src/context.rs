use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Reserved outputs key holding the most recent threaded output.
pub const PREVIOUS_KEY: &str = "__previous__";
/// Reserved outputs key holding the previous output parsed as JSON.
pub const PREVIOUS_JSON_KEY: &str = "__previous_json__";

/// Result of one completed node invocation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub name: String,
    pub agent: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    /// The fully rendered command line.
    pub command: String,
}

/// Mutable state threaded through one run.
///
/// Created once at run start, mutated only by the execution engine after
/// each node completes, and read-only to the template renderer and
/// condition evaluator.
#[derive(Debug)]
pub struct RunContext {
    /// The run's original input text.
    pub input: String,
    /// Node outputs keyed by node name plus the reserved keys.
    pub outputs: Map<String, Value>,
    /// The last threaded output, verbatim.
    pub last_output: String,
    /// Most recent session id observed per agent kind.
    pub sessions: HashMap<String, String>,
    /// Artifact root for this run.
    pub run_dir: PathBuf,
    pub workdir: PathBuf,
    pub verbose: bool,
    /// Append-only record of completed invocations, in execution order.
    pub node_results: Vec<NodeResult>,
}

impl RunContext {
    pub fn new(input: String, run_dir: PathBuf, workdir: PathBuf, verbose: bool) -> Self {
        Self {
            input,
            outputs: Map::new(),
            last_output: String::new(),
            sessions: HashMap::new(),
            run_dir,
            workdir,
            verbose,
            node_results: Vec::new(),
        }
    }

    /// The context tree exposed to templates and conditions.
    ///
    /// Keys that have not been produced yet are simply absent; consumers
    /// treat missing paths as lookup failures, not crashes.
    pub fn template_data(&self) -> Value {
        json!({
            "input": { "prompt": self.input },
            "outputs": Value::Object(self.outputs.clone()),
            "last": self.last_output,
            "sessions": self.sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_data_shape() {
        let mut ctx = RunContext::new(
            "fix the tests".into(),
            PathBuf::from("/tmp/run"),
            PathBuf::from("."),
            false,
        );
        ctx.outputs
            .insert("plan".into(), Value::String("step one".into()));
        ctx.last_output = "step one".into();
        ctx.sessions.insert("claude".into(), "sess-42".into());

        let data = ctx.template_data();
        assert_eq!(data["input"]["prompt"], "fix the tests");
        assert_eq!(data["outputs"]["plan"], "step one");
        assert_eq!(data["last"], "step one");
        assert_eq!(data["sessions"]["claude"], "sess-42");
    }

    #[test]
    fn test_template_data_empty_context() {
        let ctx = RunContext::new(String::new(), PathBuf::new(), PathBuf::new(), false);
        let data = ctx.template_data();
        assert!(data["outputs"].as_object().unwrap().is_empty());
        assert_eq!(data["last"], "");
    }
}
