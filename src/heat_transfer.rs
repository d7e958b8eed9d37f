//! Heat transfer: prescribed temperature or the solution of the heat equation.
use crate::boundary_conditions::BoundaryCondition;
use crate::expr::{Expr, SubExpressions};
use crate::form::{Form, Measure};
use crate::materials::Materials;
use crate::problem::{DirichletBc, NonlinearProblem};
use crate::settings::{ConfigError, Settings};
use crate::simulation::SimulationError;
use crate::sources::{Field, Source};
use crate::space::{Function, FunctionSpace};
use hytra_optimize::newton::{NewtonError, NewtonSettings};
use log::info;

/// The temperature model of a simulation.
#[derive(Debug)]
pub enum Temperature {
    /// A prescribed expression of `x` and `t`.
    Expression(Expr),
    HeatTransfer(HeatTransferProblem),
}

impl Temperature {
    pub fn expression(value: impl Into<Expr>) -> Self {
        Temperature::Expression(value.into())
    }
}

/// The heat equation `rho cp dT/dt - div(k grad T) = f`, steady or transient.
#[derive(Debug)]
pub struct HeatTransferProblem {
    pub transient: bool,
    pub initial_value: Expr,
    pub sources: Vec<Source>,
    pub boundary_conditions: Vec<BoundaryCondition>,
    functions: Option<(Function, Function)>,
    form: Form,
    sub_expressions: SubExpressions,
    dirichlet_bcs: Vec<DirichletBc>,
    problem: Option<NonlinearProblem>,
    newton_settings: Option<NewtonSettings<f64>>,
    line_search: bool,
}

impl HeatTransferProblem {
    pub fn new(transient: bool, initial_value: impl Into<Expr>) -> Self {
        Self {
            transient,
            initial_value: initial_value.into(),
            sources: Vec::new(),
            boundary_conditions: Vec::new(),
            functions: None,
            form: Form::new(),
            sub_expressions: SubExpressions::new(),
            dirichlet_bcs: Vec::new(),
            problem: None,
            newton_settings: None,
            line_search: false,
        }
    }

    pub fn steady() -> Self {
        Self::new(false, 0.0)
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_boundary_condition(mut self, bc: BoundaryCondition) -> Self {
        self.boundary_conditions.push(bc);
        self
    }

    /// Current temperature `T`, available after [`HeatTransferProblem::create_functions`].
    pub fn temperature(&self) -> Option<&Function> {
        self.functions.as_ref().map(|(t, _)| t)
    }

    /// Temperature at the previous time step.
    pub fn previous_temperature(&self) -> Option<&Function> {
        self.functions.as_ref().map(|(_, t_n)| t_n)
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn dirichlet_bcs(&self) -> &[DirichletBc] {
        &self.dirichlet_bcs
    }

    pub fn sub_expressions(&self) -> &SubExpressions {
        &self.sub_expressions
    }

    /// Creates `T` and `T_n` on `space` and builds the heat equation.
    ///
    /// A transient problem starts from the initial value. A steady problem is solved
    /// immediately and its solution copied to `T_n`.
    pub fn create_functions(
        &mut self,
        space: &FunctionSpace,
        materials: &Materials,
        dt: &Expr,
        settings: &Settings,
    ) -> Result<(), SimulationError> {
        let temperature = Function::new(space.clone(), "T");
        let temperature_n = Function::new(space.clone(), "T_n");

        if self.transient {
            temperature_n.interpolate_component(0, &self.initial_value, 0.0);
            temperature.assign(&temperature_n);
        }
        self.functions = Some((temperature.clone(), temperature_n.clone()));

        self.define_variational_problem(materials, dt)?;
        self.create_dirichlet_bcs()?;
        self.newton_settings = Some(settings.newton_settings());
        self.line_search = settings.line_search;
        self.problem = Some(NonlinearProblem::new(&self.form, &temperature, &self.dirichlet_bcs)?);

        if !self.transient {
            info!("Solving stationary heat equation");
            self.sub_expressions.set_time(0.0);
            self.solve(0.0)?;
            temperature_n.assign(&temperature);
        }
        Ok(())
    }

    /// Builds the residual of the heat equation from the materials' thermal properties,
    /// the sources and the flux boundary conditions on the temperature.
    pub fn define_variational_problem(&mut self, materials: &Materials, dt: &Expr) -> Result<&Form, ConfigError> {
        let (temperature, temperature_n) = self
            .functions
            .as_ref()
            .ok_or_else(|| ConfigError::InvalidField("temperature functions have not been created".to_string()))?;
        info!("Defining variational problem heat transfers");

        let t = Expr::coefficient(temperature, 0);
        let t_n = Expr::coefficient(temperature_n, 0);
        let v = Expr::test(0);
        let grad_v = Expr::test_grad(0);

        let mut form = Form::new();
        let mut sub_expressions = SubExpressions::new();

        for material in materials.iter() {
            let missing = |property| ConfigError::MissingProperty {
                material: material.name_id(),
                property,
            };
            let thermal_cond = material
                .thermal_cond
                .as_ref()
                .ok_or_else(|| missing("thermal_cond"))?
                .evaluate(&t);

            if self.transient {
                let cp = material
                    .heat_capacity
                    .as_ref()
                    .ok_or_else(|| missing("heat_capacity"))?
                    .evaluate(&t);
                let rho = material
                    .rho
                    .as_ref()
                    .ok_or_else(|| missing("rho"))?
                    .evaluate(&t);
                for id in &material.ids {
                    form += (&rho * &cp * (&t - &t_n) / dt * &v) * Measure::Volume(*id);
                }
            }
            for id in &material.ids {
                form += (&thermal_cond * t.grad() * &grad_v) * Measure::Volume(*id);
            }
        }

        for source in self.sources.iter().filter(|source| source.field == Field::Temperature) {
            let value = sub_expressions.register(source.value.clone());
            for dx in source.measures() {
                form += (-(&value * &v)) * dx;
            }
        }

        for bc in &self.boundary_conditions {
            if bc.is_dirichlet() || bc.field != Field::Temperature {
                continue;
            }
            if let Some(flux) = bc.flux_expression(&t, None, &mut sub_expressions)? {
                for surface in &bc.surfaces {
                    form += (-(&flux * &v)) * Measure::Surface(*surface);
                }
            }
        }

        self.form = form;
        self.sub_expressions.extend(sub_expressions);
        Ok(&self.form)
    }

    fn create_dirichlet_bcs(&mut self) -> Result<(), ConfigError> {
        let t = match &self.functions {
            Some((temperature, _)) => Expr::coefficient(temperature, 0),
            None => return Err(ConfigError::InvalidField("temperature functions have not been created".to_string())),
        };
        self.dirichlet_bcs.clear();
        for bc in &self.boundary_conditions {
            if bc.field != Field::Temperature {
                continue;
            }
            if let Some(value) = bc.dirichlet_value(&t, &mut self.sub_expressions) {
                for surface in &bc.surfaces {
                    self.dirichlet_bcs
                        .push(DirichletBc::new(0, *surface, value.clone()));
                }
            }
        }
        Ok(())
    }

    /// Solves the heat equation at time `t`. Clocks of the sub-expressions must already be set.
    pub fn solve(&mut self, t: f64) -> Result<usize, NewtonError> {
        let settings = self.newton_settings.unwrap_or(NewtonSettings {
            max_iterations: Some(30),
            absolute_tolerance: 1e-10,
            relative_tolerance: 1e-9,
        });
        match self.problem.as_mut() {
            Some(problem) => {
                problem.set_time(t);
                problem.solve(settings, self.line_search)
            }
            None => Ok(0),
        }
    }

    /// Copies `T` into `T_n`.
    pub fn update_previous(&self) {
        if let Some((temperature, temperature_n)) = &self.functions {
            temperature_n.assign(temperature);
        }
    }

    /// Restores `T` from `T_n`, e.g. after a failed time step.
    pub fn restore_previous(&self) {
        if let Some((temperature, temperature_n)) = &self.functions {
            temperature.assign(temperature_n);
        }
    }
}
