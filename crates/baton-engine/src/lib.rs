pub mod artifacts;
pub mod condition;
pub mod executor;
pub mod invocation;
pub mod process;
pub mod runner;
pub mod template;

pub use artifacts::RunStatus;
pub use condition::eval_condition;
pub use executor::WorkflowEngine;
pub use invocation::{build_invocation, AgentInvocation, InvocationInputs};
pub use process::{ProcessOutput, ProcessRequest, StreamPolicy, EXIT_NOT_FOUND, EXIT_TIMEOUT};
pub use runner::{command_available, ensure_agent_commands, load_prompt, run, RunOptions, RunOutcome};
pub use template::{shell_escape, TemplateRenderer};
