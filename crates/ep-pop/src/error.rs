use ep_core::{EpiError, HouseholdId, PatchId, PersonId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PopError {
    #[error("household {0} has no persons")]
    EmptyHousehold(HouseholdId),

    #[error("person {0} assigned to patch {1} outside this rank")]
    PersonOutsideRank(PersonId, PatchId),

    #[error("administrative-unit tree contains a cycle through unit {0}")]
    UnitCycle(u16),

    #[error("world construction error: {0}")]
    Build(String),

    #[error(transparent)]
    Core(#[from] EpiError),

    #[error(transparent)]
    Kernel(#[from] ep_kernel::KernelError),
}

pub type PopResult<T> = Result<T, PopError>;
