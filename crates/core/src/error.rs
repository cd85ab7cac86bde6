#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnvValue { name: &'static str, value: String },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
