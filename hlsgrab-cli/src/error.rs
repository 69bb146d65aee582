use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Grab(#[from] hlsgrab_engine::GrabError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("{failed} of {total} segments failed")]
    Incomplete { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, AppError>;
