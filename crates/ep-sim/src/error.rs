use ep_exchange::ExchangeError;
use ep_schedule::ScheduleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("engine configuration error: {0}")]
    Config(String),

    #[error("collective spans {got} ranks but the configuration declares {expected}")]
    RankCount { expected: usize, got: usize },

    #[error("exchange round failed: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("event scheduling failed: {0}")]
    Schedule(#[from] ScheduleError),
}

pub type SimResult<T> = Result<T, SimError>;
