use ep_core::Step;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("event offset {offset} does not fit the rolling window of {window} slots")]
    WindowOverflow { offset: u64, window: usize },

    #[error("event at {at} lies before the current step {now}")]
    PastEvent { at: Step, now: Step },
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
