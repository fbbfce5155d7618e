//! The distance-decay contact kernel.

use crate::{KernelError, KernelResult};

/// Parameters of one administrative unit's contact kernel.
///
/// The kernel value at separation `d` is
///
///   F(d) = 1 / (1 + (d / scale_km)^shape)     for d ≤ cutoff_km
///        = 0                                   for d > cutoff_km
///
/// i.e. a power-law decay with a hard spatial cutoff.  `F` is 1 at `d = 0`
/// and non-increasing, so it can be used directly as an acceptance
/// probability.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelParams {
    /// Distance at which the kernel has decayed to 1/2.
    pub scale_km: f64,
    /// Decay exponent.  Larger values localize contacts more sharply.
    pub shape: f64,
    /// Contacts beyond this separation never happen.
    pub cutoff_km: f64,
}

impl KernelParams {
    /// Kernel value at separation `d` km.
    #[inline]
    pub fn kernel_f(&self, d: f64) -> f64 {
        if d > self.cutoff_km {
            return 0.0;
        }
        1.0 / (1.0 + (d / self.scale_km).powf(self.shape))
    }

    /// Reject parameter sets the kernel formula cannot handle.
    pub fn validate(&self) -> KernelResult<()> {
        if self.scale_km <= 0.0 || !self.scale_km.is_finite() {
            return Err(KernelError::InvalidParams(format!(
                "kernel scale must be positive and finite, got {}",
                self.scale_km
            )));
        }
        if self.shape < 0.0 || !self.shape.is_finite() {
            return Err(KernelError::InvalidParams(format!(
                "kernel shape must be non-negative, got {}",
                self.shape
            )));
        }
        if self.cutoff_km < 0.0 {
            return Err(KernelError::InvalidParams(format!(
                "kernel cutoff must be non-negative, got {}",
                self.cutoff_km
            )));
        }
        Ok(())
    }
}

impl Default for KernelParams {
    /// A broad national-scale kernel; real runs override per unit.
    fn default() -> Self {
        Self {
            scale_km: 4.0,
            shape: 3.0,
            cutoff_km: 500.0,
        }
    }
}
