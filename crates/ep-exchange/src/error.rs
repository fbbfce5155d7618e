use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("buffer truncated: wanted {wanted} more bytes at offset {at}")]
    Truncated { wanted: usize, at: usize },

    #[error("unknown wire tag {0:#04x}")]
    BadTag(u8),

    #[error("collective round expected {expected} participants, got {got}")]
    RankCount { expected: usize, got: usize },

    #[error("reply chain at offset {0} loops or leaves the buffer")]
    BrokenChain(u32),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
