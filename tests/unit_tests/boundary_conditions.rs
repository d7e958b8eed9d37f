use crate::relative_error;
use hytra::boundary_conditions::BoundaryCondition;
use hytra::expr::{Expr, SubExpressions};
use hytra::form::Measure;
use hytra::settings::{ConfigError, Settings};
use hytra::sources::{Field, Source};
use hytra::K_B;

#[test]
fn field_names_round_trip() {
    for field in [Field::Mobile, Field::Trap(0), Field::Trap(4), Field::Temperature, Field::Retention] {
        assert_eq!(field.to_string().parse::<Field>(), Ok(field));
    }
    assert_eq!("0".parse::<Field>(), Ok(Field::Mobile));
    assert_eq!("2".parse::<Field>(), Ok(Field::Trap(1)));
    assert!(matches!("trapped".parse::<Field>(), Err(ConfigError::InvalidField(_))));

    assert_eq!(Field::Mobile.component(), Some(0));
    assert_eq!(Field::Trap(2).component(), Some(3));
    assert_eq!(Field::Retention.component(), None);
    assert_eq!(serde_json::to_string(&Field::Trap(1)).unwrap(), r#"{"trap":1}"#);
}

#[test]
fn sources_act_on_listed_volumes() {
    assert_eq!(Source::new(1.0, vec![], Field::Mobile).measures(), vec![Measure::Domain]);
    assert_eq!(
        Source::new(1.0, vec![2, 3], Field::Mobile).measures(),
        vec![Measure::Volume(2), Measure::Volume(3)]
    );
}

#[test]
fn dirichlet_values_are_registered_on_clocks() {
    let temperature = Expr::constant(500.0);
    let mut sub_expressions = SubExpressions::new();

    let bc = BoundaryCondition::dirichlet(vec![1], 2.0 * Expr::time(), Field::Mobile);
    assert!(bc.is_dirichlet());
    let value = bc.dirichlet_value(&temperature, &mut sub_expressions).unwrap();
    assert_eq!(sub_expressions.len(), 1);
    sub_expressions.set_time(3.0);
    assert_eq!(value.eval_at(0.0, 0.0), 6.0);

    let sieverts = BoundaryCondition::sieverts(vec![1], 2.0, 0.1, 1e4);
    let value = sieverts.dirichlet_value(&temperature, &mut sub_expressions).unwrap();
    let expected = 2.0 * f64::exp(-0.1 / (K_B * 500.0)) * 100.0;
    assert!(relative_error(value.as_constant().unwrap(), expected) < 1e-12);

    let implantation = BoundaryCondition::implantation(vec![1], 1e18, 1e-9, 1e-7, 0.0, Some((1e-20, 0.0)));
    let value = implantation.dirichlet_value(&temperature, &mut sub_expressions).unwrap();
    let expected = 1e18 * 1e-9 / 1e-7 + f64::sqrt(1e18 / 1e-20);
    assert!(relative_error(value.as_constant().unwrap(), expected) < 1e-12);

    let flux = BoundaryCondition::flux(vec![2], 1.0, Field::Mobile);
    assert!(!flux.is_dirichlet());
    assert!(flux.dirichlet_value(&temperature, &mut sub_expressions).is_none());
}

#[test]
fn flux_expressions() {
    let temperature = Expr::x();
    let solute = Expr::time();
    let mut sub_expressions = SubExpressions::new();

    let recombination = BoundaryCondition::recombination(vec![2], 3.0, 0.0, 2);
    assert!(recombination.acts_on_concentration());
    let flux = recombination
        .flux_expression(&temperature, Some(&solute), &mut sub_expressions)
        .unwrap()
        .unwrap();
    assert_eq!(flux.eval_at(600.0, 2.0), -12.0);
    assert!(matches!(
        recombination.flux_expression(&temperature, None, &mut sub_expressions),
        Err(ConfigError::InvalidField(_))
    ));

    let convective = BoundaryCondition::convective_flux(vec![1], 10.0, 300.0);
    assert_eq!(convective.field, Field::Temperature);
    assert!(!convective.acts_on_concentration());
    let flux = convective
        .flux_expression(&temperature, None, &mut sub_expressions)
        .unwrap()
        .unwrap();
    assert_eq!(flux.eval_at(350.0, 0.0), -500.0);

    let dirichlet = BoundaryCondition::dirichlet(vec![1], 1.0, Field::Mobile);
    assert_eq!(dirichlet.flux_expression(&temperature, None, &mut sub_expressions), Ok(None));
}

#[test]
fn settings_validation() {
    let settings = Settings::new(1e-10, 1e-9).with_maximum_iterations(12);
    assert_eq!(settings.check(), Ok(()));
    assert_eq!(settings.newton_settings().max_iterations, Some(12));

    assert!(matches!(
        Settings::new(-1.0, 1e-9).check(),
        Err(ConfigError::InvalidSettings(_))
    ));
    assert!(matches!(
        Settings::new(1e-10, 1e-9).with_maximum_iterations(0).check(),
        Err(ConfigError::InvalidSettings(_))
    ));
    assert!(matches!(
        Settings::new(1e-10, 1e-9).transient(-1.0).check(),
        Err(ConfigError::InvalidSettings(_))
    ));

    let json = r#"{ "absolute_tolerance": 1e-10, "relative_tolerance": 1e-9, "transient": true, "final_time": 100.0 }"#;
    let settings: Settings = serde_json::from_str(json).unwrap();
    assert_eq!(settings, Settings::new(1e-10, 1e-9).transient(100.0));
}
