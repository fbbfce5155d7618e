//! Unit tests for ep-schedule.

use ep_core::{CaseId, SimConfig, Step};

use crate::{EventQueues, RollingQueue, ScheduleError, window_len};

fn config() -> SimConfig {
    SimConfig {
        steps_per_day: 4,
        latent_cutoff_days: 14,
        infectious_cutoff_days: 21,
        workers: 2,
        ..SimConfig::default()
    }
}

// ── RollingQueue ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod ring {
    use super::*;

    #[test]
    fn push_and_drain_current() {
        let mut q: RollingQueue<u32> = RollingQueue::new(8, 2);
        q.push(0, 0, 10).unwrap();
        q.push(0, 1, 11).unwrap();
        q.push(3, 0, 12).unwrap();
        assert_eq!(q.len(), 3);

        // Current slot drains in worker order.
        assert_eq!(q.drain_current(), vec![10, 11]);
        assert_eq!(q.len(), 1);
        // Nothing due for the next two steps.
        q.advance();
        assert!(q.drain_current().is_empty());
        q.advance();
        assert!(q.drain_current().is_empty());
        q.advance();
        assert_eq!(q.drain_current(), vec![12]);
        assert!(q.is_empty());
    }

    #[test]
    fn offset_wraps_around_ring() {
        let mut q: RollingQueue<u32> = RollingQueue::new(4, 1);
        // Walk the cursor most of the way around, then schedule across the
        // wrap boundary.
        for _ in 0..3 {
            q.drain_current();
            q.advance();
        }
        q.push(2, 0, 99).unwrap(); // physical slot (3 + 2) % 4 = 1
        q.drain_current();
        q.advance();
        q.drain_current();
        q.advance();
        assert_eq!(q.drain_current(), vec![99]);
    }

    #[test]
    fn window_overflow_is_rejected() {
        let mut q: RollingQueue<u32> = RollingQueue::new(4, 1);
        assert!(q.push(3, 0, 1).is_ok());
        assert_eq!(
            q.push(4, 0, 2),
            Err(ScheduleError::WindowOverflow { offset: 4, window: 4 })
        );
    }

    #[test]
    fn adversarial_maximal_duration_fits() {
        // The worst legal event horizon: latent + infectious cutoffs, in
        // steps.  The window must accept it with slack to spare.
        let cfg = config();
        let w = window_len(&cfg);
        let max_event = ((cfg.latent_cutoff_days + cfg.infectious_cutoff_days)
            * cfg.steps_per_day) as u64;
        let mut q: RollingQueue<u32> = RollingQueue::new(w, 1);
        assert!(q.push(max_event, 0, 1).is_ok());
        // Two days of slack beyond the maximum, then the boundary.
        assert!(q.push(w as u64 - 1, 0, 2).is_ok());
        assert!(q.push(w as u64, 0, 3).is_err());
    }

    #[test]
    fn no_aliasing_within_window() {
        // Two events at distinct future steps must never land in the same
        // slot, for every cursor position.
        let w = 8;
        let mut q: RollingQueue<u64> = RollingQueue::new(w, 1);
        for start in 0..w as u64 {
            for offset in 0..w as u64 {
                q.push(offset, 0, start * 100 + offset).unwrap();
            }
            // Drain every slot and check each holds exactly one event with
            // the matching offset tag.
            for offset in 0..w as u64 {
                let drained = q.drain_current();
                assert_eq!(drained, vec![start * 100 + offset]);
                q.advance();
            }
        }
    }
}

// ── Window sizing ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod window {
    use super::*;

    #[test]
    fn formula() {
        // (2 + 14 + 21) days × 4 steps/day
        assert_eq!(window_len(&config()), 148);
    }

    #[test]
    fn strictly_exceeds_max_duration() {
        let cfg = config();
        let max_steps =
            (cfg.latent_cutoff_days + cfg.infectious_cutoff_days) * cfg.steps_per_day;
        assert!(window_len(&cfg) > max_steps as usize);
    }
}

// ── EventQueues ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod queues {
    use super::*;

    #[test]
    fn schedules_by_absolute_step() {
        let mut q = EventQueues::new(&config());
        q.schedule_recovery(Step(3), 0, CaseId(7)).unwrap();
        q.schedule_symptom(Step(1), 0, CaseId(7)).unwrap();

        assert!(q.due_recoveries().is_empty());
        assert!(q.due_symptoms().is_empty());
        q.due_contacts();
        q.advance(); // now = 1

        assert_eq!(q.due_symptoms(), vec![CaseId(7)]);
        assert!(q.due_recoveries().is_empty());
        q.due_contacts();
        q.advance(); // now = 2
        q.due_symptoms();
        q.due_recoveries();
        q.due_contacts();
        q.advance(); // now = 3

        assert_eq!(q.due_recoveries(), vec![CaseId(7)]);
    }

    #[test]
    fn past_events_are_rejected() {
        let mut q = EventQueues::new(&config());
        q.due_contacts();
        q.due_symptoms();
        q.due_recoveries();
        q.advance();
        assert_eq!(
            q.schedule_contact(Step(0), 0, CaseId(1)),
            Err(ScheduleError::PastEvent { at: Step(0), now: Step(1) })
        );
    }

    #[test]
    fn confirmation_fires_exactly_one_step_later() {
        let mut q = EventQueues::new(&config());
        q.schedule_confirmation(CaseId(5));
        // Not yet due in the scheduling step.
        assert!(q.due_confirmations().is_empty());
        q.due_contacts();
        q.due_symptoms();
        q.due_recoveries();
        q.advance();
        assert_eq!(q.due_confirmations(), vec![CaseId(5)]);
        // And never again.
        q.due_contacts();
        q.due_symptoms();
        q.due_recoveries();
        q.advance();
        assert!(q.due_confirmations().is_empty());
    }

    #[test]
    fn pending_counts_all_queues() {
        let mut q = EventQueues::new(&config());
        q.schedule_contact(Step(1), 0, CaseId(0)).unwrap();
        q.schedule_recovery(Step(2), 1, CaseId(0)).unwrap();
        q.schedule_confirmation(CaseId(0));
        assert_eq!(q.pending(), 3);
    }
}
