pub mod config;
pub mod context;
pub mod error;

pub use config::{
    agent_names, collect_agent_names, config_dir, effective_session, load_config, merge_agents,
    validate_config, AgentConfig, AgentKind, AgentNode, InputSpec, LoopNode, OutputSpec,
    SessionResume, SessionSpec, StreamName, ThinkingLevel, WorkflowConfig, WorkflowItem,
};
pub use context::{NodeResult, RunContext, PREVIOUS_JSON_KEY, PREVIOUS_KEY};
pub use error::{BatonError, Result};
