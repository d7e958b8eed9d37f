//! The simulation lifecycle: problem setup, time stepping and post-processing.
use crate::assembly::FormError;
use crate::boundary_conditions::BoundaryCondition;
use crate::expr::{EvaluationPoint, Expr, Parameter, SubExpressions};
use crate::exports::{DerivedQuantities, ErrorExport, ErrorValue, Snapshot, VtkExports};
use crate::form::Form;
use crate::formulation::{formulation, formulation_extrinsic_traps, FormulationContext};
use crate::heat_transfer::Temperature;
use crate::materials::Materials;
use crate::mesh::IntervalMesh;
use crate::problem::{DirichletBc, NonlinearProblem};
use crate::settings::{ConfigError, Settings};
use crate::sources::{Field, InitialCondition, Source};
use crate::space::{Function, FunctionSpace};
use crate::stepsize::{Stepsize, StepsizeController, StepsizeError};
use crate::traps::{Trap, TrapKind};
use hytra_optimize::newton::NewtonError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Consecutive failed attempts of one time step after which the run is aborted.
pub const MAX_CONSECUTIVE_FAILURES: usize = 64;

#[derive(Debug)]
pub enum SimulationError {
    Configuration(ConfigError),
    Form(FormError),
    /// The step size could not be reduced any further.
    Stepsize(StepsizeError),
    /// A stationary solve failed. Transient solves are retried with a smaller step instead.
    Solver(NewtonError),
    /// Writing an export failed.
    Export(eyre::Report),
    /// An operation was called in the wrong lifecycle state.
    State(String),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Configuration(err) => write!(f, "Configuration error: {}", err),
            SimulationError::Form(err) => write!(f, "Invalid weak form: {}", err),
            SimulationError::Stepsize(err) => write!(f, "Time stepping failed: {}", err),
            SimulationError::Solver(err) => write!(f, "Nonlinear solve failed: {}", err),
            SimulationError::Export(err) => write!(f, "Export failed: {:#}", err),
            SimulationError::State(msg) => write!(f, "Invalid simulation state: {}", msg),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimulationError::Configuration(err) => Some(err),
            SimulationError::Form(err) => Some(err),
            SimulationError::Stepsize(err) => Some(err),
            SimulationError::Solver(err) => Some(err),
            SimulationError::Export(_) | SimulationError::State(_) => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(err: ConfigError) -> Self {
        SimulationError::Configuration(err)
    }
}

impl From<FormError> for SimulationError {
    fn from(err: FormError) -> Self {
        SimulationError::Form(err)
    }
}

impl From<NewtonError> for SimulationError {
    fn from(err: NewtonError) -> Self {
        SimulationError::Solver(err)
    }
}

impl From<StepsizeError> for SimulationError {
    fn from(err: StepsizeError) -> Self {
        SimulationError::Stepsize(err)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SimulationState {
    Uninitialized,
    Initialized,
    Running,
    Finished,
}

/// Scalar results of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub errors: Vec<ErrorValue>,
    pub derived_quantity_headers: Vec<String>,
    pub derived_quantities: Vec<Vec<f64>>,
    pub final_time: f64,
    pub accepted_steps: usize,
}

#[derive(Debug, Default)]
pub struct Exports {
    pub vtk: Option<VtkExports>,
    pub derived_quantities: Option<DerivedQuantities>,
    pub errors: Vec<ErrorExport>,
}

#[derive(Debug)]
struct ExtrinsicDensity {
    density: Function,
    density_n: Function,
    problem: NonlinearProblem,
}

/// Everything built by [`Simulation::initialise`].
#[derive(Debug)]
struct Runtime {
    u: Function,
    u_n: Function,
    form: Form,
    problem: NonlinearProblem,
    extrinsic: Vec<ExtrinsicDensity>,
    sub_expressions: SubExpressions,
    temperature: Expr,
    /// Clocks of a prescribed temperature at the current and previous time.
    temperature_clocks: Option<(Parameter, Parameter)>,
    controller: StepsizeController,
    t: f64,
    accepted_steps: usize,
}

/// A hydrogen transport simulation.
#[derive(Debug)]
pub struct Simulation {
    pub mesh: IntervalMesh,
    pub materials: Materials,
    pub traps: Vec<Trap>,
    pub boundary_conditions: Vec<BoundaryCondition>,
    pub sources: Vec<Source>,
    pub initial_conditions: Vec<InitialCondition>,
    pub temperature: Temperature,
    pub settings: Settings,
    pub stepsize: Option<Stepsize>,
    pub exports: Exports,
    state: SimulationState,
    runtime: Option<Runtime>,
}

/// Nodal values of the mobile unknown whose concentration at t = 0 is `concentration`.
fn mobile_initial_values(
    mesh: &IntervalMesh,
    materials: &Materials,
    concentration: &Expr,
    temperature: &Expr,
) -> Vec<f64> {
    (0..mesh.num_vertices())
        .map(|vertex| {
            let (cell, xi) = mesh.vertex_cell(vertex);
            let point = EvaluationPoint {
                cell,
                xi,
                x: mesh.vertices()[vertex],
                t: 0.0,
            };
            let value = concentration.eval(&point);
            match materials
                .find_by_id(mesh.volume_marker(cell))
                .and_then(|material| material.solubility(temperature))
            {
                Some(solubility) => value / solubility.eval(&point),
                None => value,
            }
        })
        .collect()
}

impl Simulation {
    pub fn new(mesh: IntervalMesh, materials: Materials, temperature: Temperature, settings: Settings) -> Self {
        Self {
            mesh,
            materials,
            traps: Vec::new(),
            boundary_conditions: Vec::new(),
            sources: Vec::new(),
            initial_conditions: Vec::new(),
            temperature,
            settings,
            stepsize: None,
            exports: Exports::default(),
            state: SimulationState::Uninitialized,
            runtime: None,
        }
    }

    pub fn with_traps(self, traps: Vec<Trap>) -> Self {
        Self { traps, ..self }
    }

    pub fn with_boundary_conditions(self, boundary_conditions: Vec<BoundaryCondition>) -> Self {
        Self {
            boundary_conditions,
            ..self
        }
    }

    pub fn with_sources(self, sources: Vec<Source>) -> Self {
        Self { sources, ..self }
    }

    pub fn with_initial_conditions(self, initial_conditions: Vec<InitialCondition>) -> Self {
        Self {
            initial_conditions,
            ..self
        }
    }

    pub fn with_stepsize(self, stepsize: Stepsize) -> Self {
        Self {
            stepsize: Some(stepsize),
            ..self
        }
    }

    pub fn with_vtk_exports(mut self, vtk: VtkExports) -> Self {
        self.exports.vtk = Some(vtk);
        self
    }

    pub fn with_derived_quantities(mut self, derived_quantities: DerivedQuantities) -> Self {
        self.exports.derived_quantities = Some(derived_quantities);
        self
    }

    pub fn with_error_export(mut self, error: ErrorExport) -> Self {
        self.exports.errors.push(error);
        self
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// The hydrogen transport unknown, available once initialised.
    pub fn solution(&self) -> Option<&Function> {
        self.runtime.as_ref().map(|runtime| &runtime.u)
    }

    pub fn previous_solution(&self) -> Option<&Function> {
        self.runtime.as_ref().map(|runtime| &runtime.u_n)
    }

    /// The hydrogen transport residual.
    pub fn form(&self) -> Option<&Form> {
        self.runtime.as_ref().map(|runtime| &runtime.form)
    }

    pub fn extrinsic_densities(&self) -> Vec<&Function> {
        self.runtime
            .iter()
            .flat_map(|runtime| runtime.extrinsic.iter().map(|extrinsic| &extrinsic.density))
            .collect()
    }

    pub fn temperature_function(&self) -> Option<&Function> {
        match &self.temperature {
            Temperature::HeatTransfer(heat) => heat.temperature(),
            Temperature::Expression(_) => None,
        }
    }

    pub fn time(&self) -> f64 {
        self.runtime.as_ref().map(|runtime| runtime.t).unwrap_or(0.0)
    }

    pub fn stepsize_value(&self) -> Option<f64> {
        self.runtime
            .as_ref()
            .map(|runtime| runtime.controller.value())
    }

    fn check_configuration(&self) -> Result<(), ConfigError> {
        self.settings.check()?;
        if self.settings.transient {
            self.stepsize
                .as_ref()
                .ok_or_else(|| ConfigError::InvalidStepsize("transient simulations need a step size".to_string()))?
                .check()?;
        }

        let (heat_transfer, transient_heat) = match &self.temperature {
            Temperature::Expression(_) => (false, false),
            Temperature::HeatTransfer(heat) => (true, heat.transient),
        };
        if transient_heat && !self.settings.transient {
            return Err(ConfigError::InvalidSettings(
                "a transient heat transfer problem needs a transient simulation".to_string(),
            ));
        }
        self.materials
            .check_consistency(heat_transfer, transient_heat)?;

        for (i, trap) in self.traps.iter().enumerate() {
            trap.check(i)?;
            if trap.is_extrinsic() && !self.settings.transient {
                return Err(ConfigError::InvalidTrap(format!(
                    "extrinsic trap {} needs a transient simulation",
                    i
                )));
            }
            for id in &trap.materials {
                self.materials.require(*id, &format!("trap {}", i))?;
            }
        }

        let check_field = |field: Field, what: &str| match field {
            Field::Mobile => Ok(()),
            Field::Trap(i) if i < self.traps.len() => Ok(()),
            other => Err(ConfigError::InvalidField(format!("{} cannot target field {}", what, other))),
        };
        for source in &self.sources {
            check_field(source.field, "source")?;
            for id in &source.volumes {
                self.materials.require(*id, "source")?;
            }
        }
        for bc in &self.boundary_conditions {
            check_field(bc.field, "boundary condition")?;
        }
        for initial_condition in &self.initial_conditions {
            check_field(initial_condition.field, "initial condition")?;
        }

        if let Some(vtk) = &self.exports.vtk {
            vtk.check(self.traps.len())?;
        }
        Ok(())
    }

    /// Validates the configuration and builds function spaces, initial values and weak forms.
    pub fn initialise(&mut self) -> Result<(), SimulationError> {
        if self.state != SimulationState::Uninitialized {
            return Err(SimulationError::State(format!("cannot initialise in state {:?}", self.state)));
        }
        info!("Initialising simulation");
        self.check_configuration()?;

        let mut mesh = self.mesh.clone();
        self.materials.mark_mesh(&mut mesh);
        for marker in mesh.volume_markers() {
            self.materials.require(*marker, "mesh")?;
        }
        let mesh = Arc::new(mesh);
        let space = FunctionSpace::new(Arc::clone(&mesh), self.traps.len() + 1);
        let scalar_space = FunctionSpace::scalar(Arc::clone(&mesh));

        let controller = StepsizeController::new(
            self.stepsize
                .clone()
                .unwrap_or_else(|| Stepsize::new(1.0)),
        );
        let dt = controller.expr();

        let (temperature, temperature_n, temperature_clocks) = match &mut self.temperature {
            Temperature::Expression(value) => {
                let clock = Parameter::new("t", 0.0);
                let clock_n = Parameter::new("t_n", 0.0);
                let temperature = Expr::timed(value.clone(), &clock);
                let temperature_n = Expr::timed(value.clone(), &clock_n);
                (temperature, temperature_n, Some((clock, clock_n)))
            }
            Temperature::HeatTransfer(heat) => {
                heat.create_functions(&scalar_space, &self.materials, &dt, &self.settings)?;
                let (t, t_n) = heat
                    .temperature()
                    .zip(heat.previous_temperature())
                    .ok_or_else(|| SimulationError::State("temperature functions were not created".to_string()))?;
                (Expr::coefficient(t, 0), Expr::coefficient(t_n, 0), None)
            }
        };

        let u = Function::new(space.clone(), "u");
        let u_n = Function::new(space, "u_n");
        for initial_condition in &self.initial_conditions {
            let component = match initial_condition.field.component() {
                Some(component) => component,
                None => continue,
            };
            if initial_condition.field == Field::Mobile {
                let values = mobile_initial_values(&mesh, &self.materials, &initial_condition.value, &temperature_n);
                u_n.set_component_values(component, &values);
            } else {
                u_n.interpolate_component(component, &initial_condition.value, 0.0);
            }
        }
        u.assign(&u_n);

        let mut densities = Vec::new();
        let mut densities_n = Vec::new();
        for (i, trap) in self.traps.iter().enumerate() {
            if let TrapKind::Extrinsic(parameters) = &trap.kind {
                let density_n = Function::new(scalar_space.clone(), &format!("n_{}_n", i + 1));
                density_n.interpolate_component(0, &parameters.initial_density, 0.0);
                let density = Function::new(scalar_space.clone(), &format!("n_{}", i + 1));
                density.assign(&density_n);
                densities.push(density);
                densities_n.push(density_n);
            }
        }

        let context = FormulationContext {
            materials: &self.materials,
            traps: &self.traps,
            extrinsic_densities: &densities,
            boundary_conditions: &self.boundary_conditions,
            sources: &self.sources,
            temperature: &temperature,
            temperature_n: &temperature_n,
            dt: &dt,
            transient: self.settings.transient,
        };
        let (form, mut sub_expressions) = formulation(&context, &u, &u_n)?;

        let mut bcs = Vec::new();
        for bc in &self.boundary_conditions {
            let component = match bc.field.component() {
                Some(component) => component,
                None => continue,
            };
            let value = match bc.dirichlet_value(&temperature, &mut sub_expressions) {
                Some(value) => value,
                None => continue,
            };
            for surface in &bc.surfaces {
                // The unknown is the concentration divided by the solubility
                let solubility = match bc.field {
                    Field::Mobile => self.materials.on_surface(&mesh, *surface)
                        .and_then(|material| material.solubility(&temperature)),
                    _ => None,
                };
                let value = match solubility {
                    Some(solubility) => &value / solubility,
                    None => value.clone(),
                };
                bcs.push(DirichletBc::new(component, *surface, value));
            }
        }
        let problem = NonlinearProblem::new(&form, &u, &bcs)?;

        let (extrinsic_forms, extrinsic_sub_expressions) =
            formulation_extrinsic_traps(&self.traps, &densities, &densities_n, &dt)?;
        sub_expressions.extend(extrinsic_sub_expressions);
        let mut extrinsic = Vec::with_capacity(extrinsic_forms.len());
        for ((density, density_n), form) in densities.into_iter().zip(densities_n).zip(&extrinsic_forms) {
            let problem = NonlinearProblem::new(form, &density, &[])?;
            extrinsic.push(ExtrinsicDensity {
                density,
                density_n,
                problem,
            });
        }

        info!(
            "Simulation initialised: {} cells, {} dofs, {} traps ({} extrinsic)",
            mesh.num_cells(),
            u.space().num_dofs(),
            self.traps.len(),
            extrinsic.len()
        );

        self.runtime = Some(Runtime {
            u,
            u_n,
            form,
            problem,
            extrinsic,
            sub_expressions,
            temperature,
            temperature_clocks,
            controller,
            t: 0.0,
            accepted_steps: 0,
        });
        self.state = SimulationState::Initialized;
        Ok(())
    }

    /// Runs the simulation to completion, initialising it first if needed.
    pub fn run(&mut self) -> Result<SimulationOutput, SimulationError> {
        if self.state == SimulationState::Uninitialized {
            self.initialise()?;
        }
        if self.state != SimulationState::Initialized {
            return Err(SimulationError::State(format!("cannot run in state {:?}", self.state)));
        }
        self.state = SimulationState::Running;

        if self.settings.transient {
            self.run_transient()?;
        } else {
            self.run_steady()?;
        }

        let output = self.finish()?;
        self.state = SimulationState::Finished;
        Ok(output)
    }

    fn runtime_mut(&mut self) -> Result<&mut Runtime, SimulationError> {
        self.runtime
            .as_mut()
            .ok_or_else(|| SimulationError::State("simulation is not initialised".to_string()))
    }

    fn run_steady(&mut self) -> Result<(), SimulationError> {
        info!("Solving steady state problem");
        let settings = self.settings.newton_settings();
        let line_search = self.settings.line_search;
        let runtime = self.runtime_mut()?;
        runtime.set_clocks(0.0, 0.0);
        runtime.problem.set_time(0.0);
        let iterations = runtime.problem.solve(settings, line_search)?;
        debug!("Steady state converged in {} Newton iterations", iterations);
        runtime.u_n.assign(&runtime.u);
        runtime.accepted_steps = 1;
        self.post_process(true)
    }

    fn run_transient(&mut self) -> Result<(), SimulationError> {
        let final_time = self.settings.final_time.ok_or_else(|| {
            ConfigError::InvalidSettings("final_time is required for transient simulations".to_string())
        })?;
        info!("Time stepping to t = {}", final_time);

        let mut failures = 0;
        loop {
            let runtime = self.runtime_mut()?;
            let t = runtime.t;
            let reaches_final = runtime.controller.clamp(t, final_time);
            let t_next = if reaches_final {
                final_time
            } else {
                t + runtime.controller.value()
            };
            runtime.set_clocks(t_next, t);

            match self.solve_step(t_next) {
                Ok(iterations) => {
                    failures = 0;
                    self.accept_step(t_next);
                    let runtime = self.runtime_mut()?;
                    info!(
                        "Accepted step {} to t = {:e} ({} Newton iterations)",
                        runtime.accepted_steps,
                        t_next,
                        iterations
                    );
                    if !reaches_final {
                        runtime.controller.adapt(t_next, iterations);
                    }
                    self.post_process(reaches_final)?;
                    if reaches_final {
                        return Ok(());
                    }
                }
                Err(err) => {
                    failures += 1;
                    self.reject_step();
                    let runtime = self.runtime_mut()?;
                    warn!(
                        "Step from t = {:e} with dt = {:e} failed: {}. Retrying with a smaller step.",
                        t,
                        runtime.controller.value(),
                        err
                    );
                    runtime.controller.shrink()?;
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        return Err(StepsizeError::TooManyFailures { failures }.into());
                    }
                }
            }
        }
    }

    /// Solves heat transfer, extrinsic trap densities and hydrogen transport at `t`, in this
    /// order. Returns the Newton iterations of the hydrogen transport solve.
    fn solve_step(&mut self, t: f64) -> Result<usize, NewtonError> {
        let settings = self.settings.newton_settings();
        let line_search = self.settings.line_search;

        if let Temperature::HeatTransfer(heat) = &mut self.temperature {
            if heat.transient {
                heat.sub_expressions().set_time(t);
                heat.solve(t)?;
            }
        }

        let runtime = match self.runtime.as_mut() {
            Some(runtime) => runtime,
            None => return Ok(0),
        };
        for extrinsic in &mut runtime.extrinsic {
            extrinsic.problem.set_time(t);
            extrinsic.problem.solve(settings, line_search)?;
        }
        runtime.problem.set_time(t);
        runtime.problem.solve(settings, line_search)
    }

    fn accept_step(&mut self, t: f64) {
        if let Temperature::HeatTransfer(heat) = &self.temperature {
            heat.update_previous();
        }
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.u_n.assign(&runtime.u);
            for extrinsic in &runtime.extrinsic {
                extrinsic.density_n.assign(&extrinsic.density);
            }
            runtime.t = t;
            runtime.accepted_steps += 1;
        }
    }

    fn reject_step(&mut self) {
        if let Temperature::HeatTransfer(heat) = &self.temperature {
            heat.restore_previous();
        }
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.u.assign(&runtime.u_n);
            for extrinsic in &runtime.extrinsic {
                extrinsic.density.assign(&extrinsic.density_n);
            }
        }
    }

    fn snapshot(&self) -> Result<Snapshot<'_>, SimulationError> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| SimulationError::State("simulation is not initialised".to_string()))?;
        Ok(Snapshot {
            materials: &self.materials,
            u: &runtime.u,
            num_traps: self.traps.len(),
            temperature: &runtime.temperature,
            temperature_function: self.temperature_function(),
            t: runtime.t,
        })
    }

    /// Runs the exporters on the accepted step. Export failures are fatal.
    fn post_process(&mut self, final_step: bool) -> Result<(), SimulationError> {
        let mut exports = std::mem::take(&mut self.exports);
        let result = self.run_exports(&mut exports, final_step);
        self.exports = exports;
        result
    }

    fn run_exports(&self, exports: &mut Exports, final_step: bool) -> Result<(), SimulationError> {
        let snapshot = self.snapshot()?;
        if let Some(vtk) = exports.vtk.as_mut() {
            vtk.export(&snapshot, final_step)
                .map_err(SimulationError::Export)?;
        }
        if let Some(derived_quantities) = exports.derived_quantities.as_mut() {
            derived_quantities.compute(&snapshot, final_step);
        }
        Ok(())
    }

    fn finish(&self) -> Result<SimulationOutput, SimulationError> {
        let snapshot = self.snapshot()?;
        let mut errors = Vec::with_capacity(self.exports.errors.len());
        for error in &self.exports.errors {
            let value = error.compute(&snapshot)?;
            info!("{:?} error of {} at t = {}: {:e}", value.norm, value.field, value.t, value.value);
            errors.push(value);
        }

        let (derived_quantity_headers, derived_quantities) = match &self.exports.derived_quantities {
            Some(derived_quantities) => {
                derived_quantities
                    .write()
                    .map_err(SimulationError::Export)?;
                (derived_quantities.headers(), derived_quantities.rows().to_vec())
            }
            None => (Vec::new(), Vec::new()),
        };

        let accepted_steps = self
            .runtime
            .as_ref()
            .map(|runtime| runtime.accepted_steps)
            .unwrap_or(0);
        info!("Simulation finished at t = {} after {} steps", snapshot.t, accepted_steps);
        Ok(SimulationOutput {
            errors,
            derived_quantity_headers,
            derived_quantities,
            final_time: snapshot.t,
            accepted_steps,
        })
    }
}

impl Runtime {
    /// Advances every clock to `t`, and the clock of the previous prescribed temperature to
    /// `t_previous`.
    fn set_clocks(&self, t: f64, t_previous: f64) {
        self.sub_expressions.set_time(t);
        if let Some((clock, clock_n)) = &self.temperature_clocks {
            clock.set(t);
            clock_n.set(t_previous);
        }
    }
}
