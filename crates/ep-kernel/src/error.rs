use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid kernel parameters: {0}")]
    InvalidParams(String),
}

pub type KernelResult<T> = Result<T, KernelError>;
