//! Unit tests for ep-intervene.

use ep_core::UnitId;
use ep_kernel::KernelParams;
use ep_pop::AdminUnit;

use crate::def::{Accumulation, Basis, Intervention, Measure, Metric, Trigger};
use crate::live::{InterventionSet, LiveIntervention};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn unit_with_population(pop: u64) -> AdminUnit {
    let mut unit = AdminUnit::new(UnitId(0), None, KernelParams::default());
    unit.population = pop;
    unit
}

fn record_cases(unit: &mut AdminUnit, n: u64) {
    unit.new_cases.community += n;
    unit.absorb_step();
}

fn threshold_start(threshold: f64, delay_days: u64) -> Trigger {
    Trigger::Threshold {
        metric: Metric::Cases,
        accumulation: Accumulation::Rolling,
        basis: Basis::Absolute,
        threshold,
        delay_days,
    }
}

fn quarantine(start: Trigger, stop: Trigger) -> Intervention {
    Intervention {
        name: "quarantine".into(),
        measure: Measure::Quarantine { contact_mult: 0.25 },
        start,
        stop,
    }
}

// ── Triggers ──────────────────────────────────────────────────────────────────

mod triggers {
    use super::*;

    #[test]
    fn fixed_day_fires_on_and_after() {
        let unit = unit_with_population(100);
        let t = Trigger::FixedDay { day: 10 };
        assert!(!t.fires(&unit, 9, None));
        assert!(t.fires(&unit, 10, None));
        assert!(t.fires(&unit, 11, None));
    }

    #[test]
    fn after_days_counts_from_activation() {
        let unit = unit_with_population(100);
        let t = Trigger::AfterDays { days: 7 };
        assert!(!t.fires(&unit, 20, None));
        assert!(!t.fires(&unit, 20, Some(15)));
        assert!(t.fires(&unit, 22, Some(15)));
    }

    #[test]
    fn absolute_threshold_watches_the_rolling_window() {
        let mut unit = unit_with_population(1000);
        let t = threshold_start(5.0, 0);
        assert!(!t.fires(&unit, 0, None));
        record_cases(&mut unit, 3);
        assert!(!t.fires(&unit, 0, None));
        record_cases(&mut unit, 2);
        assert!(t.fires(&unit, 0, None));
    }

    #[test]
    fn rolling_window_lets_the_trigger_lapse() {
        let mut unit = unit_with_population(1000);
        let t = threshold_start(5.0, 0);
        record_cases(&mut unit, 6);
        unit.close_day();
        assert!(t.fires(&unit, 1, None));
        // Ten quiet days push the spike out of the window.
        for _ in 0..10 {
            unit.close_day();
        }
        assert!(!t.fires(&unit, 11, None));
    }

    #[test]
    fn per_population_threshold_scales_with_unit_size() {
        let mut unit = unit_with_population(200);
        let t = Trigger::Threshold {
            metric: Metric::Infections,
            accumulation: Accumulation::Cumulative,
            basis: Basis::PerPopulation,
            threshold: 0.05,
            delay_days: 0,
        };
        unit.new_infections.household += 9;
        unit.absorb_step();
        assert!(!t.fires(&unit, 0, None)); // 9/200 = 4.5%
        unit.new_infections.household += 1;
        unit.absorb_step();
        assert!(t.fires(&unit, 0, None)); // 10/200 = 5%
    }

    #[test]
    fn empty_unit_never_fires_per_population() {
        let unit = unit_with_population(0);
        let t = Trigger::Threshold {
            metric: Metric::Cases,
            accumulation: Accumulation::Cumulative,
            basis: Basis::PerPopulation,
            threshold: 0.0,
            delay_days: 0,
        };
        assert!(!t.fires(&unit, 0, None));
    }
}

// ── State machine ─────────────────────────────────────────────────────────────

mod state_machine {
    use super::*;

    #[test]
    fn activation_copies_params_and_deactivation_clears_them() {
        let def = quarantine(Trigger::FixedDay { day: 5 }, Trigger::FixedDay { day: 20 });
        let mut unit = unit_with_population(100);
        let mut live = LiveIntervention::new(0);

        live.evaluate(&def, &mut unit, 4);
        assert!(!live.active);
        assert_eq!(unit.live.quarantine_mult, None);

        live.evaluate(&def, &mut unit, 5);
        assert!(live.active);
        assert_eq!(unit.live.quarantine_mult, Some(0.25));

        live.evaluate(&def, &mut unit, 20);
        assert!(!live.active);
        assert_eq!(unit.live.quarantine_mult, None);
    }

    /// Re-checking while the trigger stays true must not re-activate or move
    /// the switch day.
    #[test]
    fn evaluation_is_idempotent_while_the_condition_holds() {
        let def = quarantine(threshold_start(3.0, 4), Trigger::Never);
        let mut unit = unit_with_population(100);
        let mut live = LiveIntervention::new(0);

        record_cases(&mut unit, 5);
        live.evaluate(&def, &mut unit, 10);
        assert_eq!(live.pending, Some(14));

        // Condition still true on later days; the armed day must not drift.
        live.evaluate(&def, &mut unit, 11);
        live.evaluate(&def, &mut unit, 12);
        assert_eq!(live.pending, Some(14));
        assert!(!live.active);

        live.evaluate(&def, &mut unit, 14);
        assert!(live.active);
        let activated = live.activated_day;

        // Re-evaluating an active measure changes nothing.
        live.evaluate(&def, &mut unit, 15);
        live.evaluate(&def, &mut unit, 16);
        assert!(live.active);
        assert_eq!(live.activated_day, activated);
        assert_eq!(unit.live.quarantine_mult, Some(0.25));
    }

    #[test]
    fn duration_stop_then_reactivation() {
        let def = quarantine(Trigger::FixedDay { day: 0 }, Trigger::AfterDays { days: 10 });
        let mut unit = unit_with_population(100);
        let mut live = LiveIntervention::new(0);

        live.evaluate(&def, &mut unit, 0);
        assert!(live.active);
        live.evaluate(&def, &mut unit, 9);
        assert!(live.active);
        live.evaluate(&def, &mut unit, 10);
        assert!(!live.active);
        assert_eq!(unit.live.quarantine_mult, None);

        // Start trigger still true: the measure arms and runs again.
        live.evaluate(&def, &mut unit, 11);
        assert!(live.active);
        assert_eq!(live.activated_day, Some(11));
        assert_eq!(unit.live.quarantine_mult, Some(0.25));
    }

    #[test]
    fn every_measure_kind_drives_its_own_live_field() {
        let measures = [
            Measure::BorderControl { deny: 0.9 },
            Measure::Treatment { infectiousness_mult: 0.5 },
            Measure::Prophylaxis { susceptibility_mult: 0.3 },
            Measure::Vaccination { rate_per_day: 0.01 },
            Measure::Quarantine { contact_mult: 0.25 },
            Measure::Closure { household_mult: 1.5 },
        ];
        let mut unit = unit_with_population(100);
        for measure in measures {
            let def = Intervention {
                name: "m".into(),
                measure,
                start: Trigger::FixedDay { day: 0 },
                stop: Trigger::Never,
            };
            let mut live = LiveIntervention::new(0);
            live.evaluate(&def, &mut unit, 0);
            assert!(live.active);
        }
        assert_eq!(unit.live.border_deny, Some(0.9));
        assert_eq!(unit.live.treatment_mult, Some(0.5));
        assert_eq!(unit.live.prophylaxis_mult, Some(0.3));
        assert_eq!(unit.live.vaccination_rate, Some(0.01));
        assert_eq!(unit.live.quarantine_mult, Some(0.25));
        assert_eq!(unit.live.closure_mult, Some(1.5));
    }

    #[test]
    fn set_pairs_every_definition_with_every_unit() {
        let defs = vec![
            quarantine(Trigger::FixedDay { day: 0 }, Trigger::Never),
            Intervention {
                name: "closure".into(),
                measure: Measure::Closure { household_mult: 2.0 },
                start: Trigger::FixedDay { day: 3 },
                stop: Trigger::Never,
            },
        ];
        let mut units =
            vec![unit_with_population(10), unit_with_population(20)];
        let mut set = InterventionSet::new(defs, units.len());

        set.evaluate_all(&mut units, 0);
        for unit in &units {
            assert_eq!(unit.live.quarantine_mult, Some(0.25));
            assert_eq!(unit.live.closure_mult, None);
        }
        set.evaluate_all(&mut units, 3);
        for unit in &units {
            assert_eq!(unit.live.closure_mult, Some(2.0));
        }
    }
}
