//! Weak forms of hydrogen transport and extrinsic trap evolution.
//!
//! The hydrogen transport unknown `u` holds the mobile concentration in component 0 and the
//! trapped concentration of trap `i` in component `i + 1`. Materials with a solubility law
//! use the chemical potential variable: the unknown is `c / S(T)`, so that the concentration
//! `c = u_0 S(T)` may jump across interfaces between materials of different solubility.
use crate::boundary_conditions::BoundaryCondition;
use crate::expr::{Expr, SubExpressions};
use crate::form::{Form, Measure};
use crate::materials::{Material, Materials};
use crate::settings::ConfigError;
use crate::sources::{Field, Source};
use crate::space::Function;
use crate::traps::{Trap, TrapKind};
use crate::R;
use log::debug;

/// Inputs shared by the hydrogen transport formulation.
#[derive(Debug, Clone, Copy)]
pub struct FormulationContext<'a> {
    pub materials: &'a Materials,
    pub traps: &'a [Trap],
    /// Densities of the extrinsic traps, in declaration order.
    pub extrinsic_densities: &'a [Function],
    pub boundary_conditions: &'a [BoundaryCondition],
    pub sources: &'a [Source],
    pub temperature: &'a Expr,
    pub temperature_n: &'a Expr,
    pub dt: &'a Expr,
    pub transient: bool,
}

/// Mobile concentration in `material`, given the mobile component of the unknown.
pub(crate) fn concentration(material: &Material, solute: &Expr, temperature: &Expr) -> Expr {
    match material.solubility(temperature) {
        Some(solubility) => solute * solubility,
        None => solute.clone(),
    }
}

/// Builds the residual of the hydrogen transport problem.
///
/// Returns the form and the sub-expressions whose clocks must be advanced every time step.
/// In steady state all time derivative terms are omitted and `dt` is not used.
pub fn formulation(
    context: &FormulationContext,
    u: &Function,
    u_n: &Function,
) -> Result<(Form, SubExpressions), ConfigError> {
    let FormulationContext {
        materials,
        traps,
        extrinsic_densities,
        boundary_conditions,
        sources,
        temperature,
        temperature_n,
        dt,
        transient,
    } = *context;

    let num_extrinsic = traps.iter().filter(|trap| trap.is_extrinsic()).count();
    if num_extrinsic != extrinsic_densities.len() {
        return Err(ConfigError::InvalidTrap(format!(
            "{} extrinsic traps but {} extrinsic densities",
            num_extrinsic,
            extrinsic_densities.len()
        )));
    }
    if u.num_components() != traps.len() + 1 {
        return Err(ConfigError::InvalidField(format!(
            "unknown has {} components, expected {}",
            u.num_components(),
            traps.len() + 1
        )));
    }

    let mesh = u.space().mesh();
    let mut form = Form::new();
    let mut sub_expressions = SubExpressions::new();

    let solute = Expr::coefficient(u, 0);
    let solute_n = Expr::coefficient(u_n, 0);
    let v_0 = Expr::test(0);
    let grad_v_0 = Expr::test_grad(0);

    for material in materials.iter() {
        let c = concentration(material, &solute, temperature);
        let c_n = concentration(material, &solute_n, temperature_n);
        let diffusivity = material.diffusivity(temperature);
        let heat_of_transport = material
            .heat_of_transport(temperature)
            .filter(|h| !h.is_zero());

        for id in &material.ids {
            let dx = Measure::Volume(*id);
            if transient {
                form += ((&c - &c_n) / dt * &v_0) * dx;
            }
            form += (&diffusivity * c.grad() * &grad_v_0) * dx;
            if let Some(h) = &heat_of_transport {
                // Soret flux
                let thermophoresis = &diffusivity * h * &c / (R * temperature.clone().powi(2));
                form += (thermophoresis * temperature.grad() * &grad_v_0) * dx;
            }
        }
    }

    add_sources(&mut form, &mut sub_expressions, sources, Field::Mobile, 0);

    let mut extrinsic_index = 0;
    for (i, trap) in traps.iter().enumerate() {
        let k = i + 1;
        let trapped = Expr::coefficient(u, k);
        let trapped_n = Expr::coefficient(u_n, k);
        let v_k = Expr::test(k);

        let density = match &trap.kind {
            TrapKind::Intrinsic { density } => sub_expressions.register(density.clone()),
            TrapKind::Extrinsic(_) => {
                let density = Expr::coefficient(&extrinsic_densities[extrinsic_index], 0);
                extrinsic_index += 1;
                density
            }
        };

        if transient {
            form += ((&trapped - &trapped_n) / dt * &v_k) * Measure::Domain;
        }

        let trapping_rate = trap.trapping_rate(temperature);
        let release_rate = trap.release_rate(temperature);
        for id in &trap.materials {
            let material = materials.require(*id, &format!("trap {}", i))?;
            let c = concentration(material, &solute, temperature);
            let dx = Measure::Volume(*id);
            form += (-(&trapping_rate * c * (&density - &trapped)) * &v_k) * dx;
            form += (&release_rate * &trapped * &v_k) * dx;
        }

        if transient {
            // Trapped hydrogen leaves the mobile population
            form += ((&trapped - &trapped_n) / dt * &v_0) * Measure::Domain;
        }

        add_sources(&mut form, &mut sub_expressions, sources, Field::Trap(i), k);
    }

    for bc in boundary_conditions.iter().filter(|bc| !bc.is_dirichlet()) {
        let component = match bc.field.component() {
            Some(component) if component < u.num_components() => component,
            _ => continue,
        };
        if bc.acts_on_concentration() {
            for surface in &bc.surfaces {
                let c = match materials.on_surface(mesh, *surface) {
                    Some(material) => concentration(material, &solute, temperature),
                    None => solute.clone(),
                };
                if let Some(flux) = bc.flux_expression(temperature, Some(&c), &mut sub_expressions)? {
                    form += (-(flux * Expr::test(component))) * Measure::Surface(*surface);
                }
            }
        } else if let Some(flux) = bc.flux_expression(temperature, None, &mut sub_expressions)? {
            for surface in &bc.surfaces {
                form += (-(&flux * Expr::test(component))) * Measure::Surface(*surface);
            }
        }
    }

    debug!(
        "Hydrogen transport formulation: {} integrals, {} time-dependent sub-expressions",
        form.len(),
        sub_expressions.len()
    );
    Ok((form, sub_expressions))
}

fn add_sources(
    form: &mut Form,
    sub_expressions: &mut SubExpressions,
    sources: &[Source],
    field: Field,
    component: usize,
) {
    for source in sources.iter().filter(|source| source.field == field) {
        let value = sub_expressions.register(source.value.clone());
        for dx in source.measures() {
            *form += (-(&value * Expr::test(component))) * dx;
        }
    }
}

/// Builds one residual per extrinsic trap for the evolution of its density `n`:
///
/// ```text
/// (n - n_n) / dt v dx - phi_0 sum_i (1 - n / n_max_i) eta_i f_i v dx
/// ```
///
/// The sub-expressions are `phi_0` followed by the masks `f_i` of each trap.
pub fn formulation_extrinsic_traps(
    traps: &[Trap],
    densities: &[Function],
    densities_n: &[Function],
    dt: &Expr,
) -> Result<(Vec<Form>, SubExpressions), ConfigError> {
    let extrinsic: Vec<_> = traps
        .iter()
        .filter_map(|trap| match &trap.kind {
            TrapKind::Extrinsic(parameters) => Some(parameters),
            TrapKind::Intrinsic { .. } => None,
        })
        .collect();
    if extrinsic.len() != densities.len() || extrinsic.len() != densities_n.len() {
        return Err(ConfigError::InvalidTrap(format!(
            "{} extrinsic traps but {} densities and {} previous densities",
            extrinsic.len(),
            densities.len(),
            densities_n.len()
        )));
    }

    let mut forms = Vec::with_capacity(extrinsic.len());
    let mut sub_expressions = SubExpressions::new();
    let v = Expr::test(0);

    for ((parameters, n), n_n) in extrinsic.into_iter().zip(densities).zip(densities_n) {
        let n = Expr::coefficient(n, 0);
        let n_n = Expr::coefficient(n_n, 0);
        let phi_0 = sub_expressions.register(parameters.phi_0.clone());

        let mut generation = Expr::zero();
        for channel in &parameters.channels {
            let mask = sub_expressions.register(channel.mask.clone());
            generation += (1.0 - &n / channel.n_max) * channel.eta * mask;
        }

        let mut form = Form::new();
        form += ((&n - &n_n) / dt * &v) * Measure::Domain;
        form += (-(phi_0 * generation) * &v) * Measure::Domain;
        forms.push(form);
    }

    Ok((forms, sub_expressions))
}
