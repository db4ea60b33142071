use thiserror::Error;

/// Failures while reading or rewriting one of the local JSON files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures talking to the remote document store.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected remote document: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not valid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("model error: {0}")]
    Model(#[from] chatgpt::err::Error),

    #[error("the model answer contained no valid question")]
    NoValidQuestions,
}
