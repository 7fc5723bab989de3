use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Graph error: {0}")]
    Graph(String),
    #[error("Transform error: {0}")]
    Transform(String),
    #[error("Pipeline error: {0}")]
    Pipeline(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    pub fn graph(msg: impl Into<String>) -> Self {
        EngineError::Graph(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        EngineError::Transform(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        EngineError::Pipeline(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        EngineError::InvalidArgument(msg.into())
    }
}
