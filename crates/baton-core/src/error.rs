use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatonError {
    // Configuration errors (reported before any execution begins)
    #[error("config error: {0}")]
    Config(String),

    // Template errors
    #[error("template error: {0}")]
    Template(String),

    // Condition errors
    #[error("condition error: {0}")]
    Condition(String),

    // Input resolution errors
    #[error("input error: {0}")]
    Input(String),

    // Session continuity errors (resume requested with no known session)
    #[error("session error: {0}")]
    Session(String),

    // A workflow node exited non-zero (includes launch failures as 127
    // and timeouts as 124)
    #[error("node failed: {node} (exit {exit_code}). {detail}")]
    NodeFailed {
        node: String,
        exit_code: i32,
        detail: String,
    },

    // A loop ran out of iterations without its condition turning true
    #[error("loop exhausted after {max_iters} iterations without meeting condition")]
    LoopExhausted { max_iters: u32 },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BatonError>;
