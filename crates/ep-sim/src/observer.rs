//! Engine observer trait for progress reporting and data export.

use ep_core::Step;
use ep_pop::World;

/// Callbacks invoked by [`Engine::run`][crate::Engine::run] at key points in
/// the timestep loop.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// `on_step_end` fires after the statistics reduction, while the per-step
/// `new_cases`/`new_infections` counters are still populated; `on_snapshot`
/// fires at every day boundary, before the daily counters roll over.
pub trait EngineObserver {
    /// Called at the end of each step, before the per-step counters reset.
    fn on_step_end(&mut self, _step: Step, _world: &World) {}

    /// Called at the end of each simulated day.
    fn on_snapshot(&mut self, _day: u64, _world: &World) {}

    /// Called once after the run quiesces or hits the step ceiling.
    fn on_run_end(&mut self, _final_step: Step, _world: &World) {}
}

/// An [`EngineObserver`] that does nothing.  Use when you need to call `run`
/// but don't want progress callbacks.
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}
