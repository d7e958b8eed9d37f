use hytra::settings::ConfigError;
use hytra::stepsize::{Stepsize, StepsizeController, StepsizeError, GROWTH_ITERATION_THRESHOLD};
use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;

#[test]
fn adapt_grows_on_fast_convergence_and_shrinks_otherwise() {
    let mut controller = StepsizeController::new(Stepsize::new(1.0).adaptive(1.1, 1e-5));
    controller.adapt(1.0, GROWTH_ITERATION_THRESHOLD - 1);
    assert_scalar_eq!(controller.value(), 1.1, comp = abs, tol = 1e-14);
    controller.adapt(2.1, GROWTH_ITERATION_THRESHOLD);
    assert_scalar_eq!(controller.value(), 1.0, comp = abs, tol = 1e-14);
}

#[test]
fn adapt_respects_caps() {
    let settings = Stepsize::new(1.0).adaptive(2.0, 0.0).with_dt_max(3.0).with_stop(10.0, 0.5);
    let mut controller = StepsizeController::new(settings);
    controller.adapt(1.0, 1);
    controller.adapt(2.0, 1);
    assert_eq!(controller.value(), 3.0);
    controller.adapt(10.0, 1);
    assert_eq!(controller.value(), 0.5);
}

#[test]
fn unit_ratio_keeps_step_constant() {
    let mut controller = StepsizeController::new(Stepsize::new(0.25));
    controller.adapt(1.0, 1);
    controller.adapt(2.0, 20);
    assert_eq!(controller.value(), 0.25);
    assert_eq!(controller.shrink(), Ok(0.125));
}

#[test]
fn shrink_fails_below_minimum() {
    let mut controller = StepsizeController::new(Stepsize::new(1.0).adaptive(10.0, 0.05));
    assert_scalar_eq!(controller.shrink().unwrap(), 0.1, comp = abs, tol = 1e-15);
    assert!(matches!(controller.shrink(), Err(StepsizeError::BelowMinimum { dt_min, .. }) if dt_min == 0.05));
}

#[test]
fn clamp_lands_exactly_on_final_time() {
    let mut controller = StepsizeController::new(Stepsize::new(0.4));
    assert!(!controller.clamp(0.0, 1.0));
    assert_eq!(controller.value(), 0.4);
    assert!(controller.clamp(0.8, 1.0));
    assert_scalar_eq!(controller.value(), 0.2, comp = abs, tol = 1e-15);

    // Steps that overshoot by less than the tolerance are shortened as well
    let mut controller = StepsizeController::new(Stepsize::new(0.5));
    assert!(controller.clamp(0.5 + 1e-14, 1.0));
}

#[test]
fn parameter_follows_controller() {
    let mut controller = StepsizeController::new(Stepsize::new(2.0));
    let dt = controller.expr();
    controller.shrink().unwrap();
    assert_eq!(dt.eval_at(0.0, 0.0), 1.0);
    assert_eq!(controller.parameter().get(), 1.0);
}

#[test]
fn stepsize_validation() {
    assert_eq!(Stepsize::new(1.0).adaptive(1.1, 1e-3).check(), Ok(()));
    for invalid in [
        Stepsize::new(0.0),
        Stepsize::new(1.0).adaptive(0.9, 0.0),
        Stepsize::new(1.0).adaptive(1.1, 2.0),
        Stepsize::new(1.0).adaptive(1.1, 0.1).with_dt_max(0.01),
        Stepsize {
            t_stop: Some(1.0),
            ..Stepsize::new(1.0)
        },
    ] {
        assert!(matches!(invalid.check(), Err(ConfigError::InvalidStepsize(_))), "{:?}", invalid);
    }

    let json = r#"{ "initial_value": 0.5, "stepsize_change_ratio": 1.1, "dt_min": 1e-5 }"#;
    let stepsize: Stepsize = serde_json::from_str(json).unwrap();
    assert_eq!(stepsize, Stepsize::new(0.5).adaptive(1.1, 1e-5));
}

proptest! {
    #[test]
    fn adapted_step_stays_within_bounds(
        ratio in 1.0..3.0f64,
        iterations in prop::collection::vec(0usize..10, 1..20),
        dt_max in 0.5..5.0f64,
    ) {
        let mut controller = StepsizeController::new(Stepsize::new(0.1).adaptive(ratio, 0.0).with_dt_max(dt_max));
        let mut t = 0.0;
        for iterations in iterations {
            let before = controller.value();
            t += before;
            controller.adapt(t, iterations);
            let after = controller.value();
            prop_assert!(after <= dt_max);
            if iterations < GROWTH_ITERATION_THRESHOLD {
                prop_assert!(after >= before.min(dt_max));
            } else {
                prop_assert!(after <= before);
            }
        }
    }
}
