//! Adaptive step size control for transient runs.
use crate::expr::{Expr, Parameter};
use crate::settings::ConfigError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Newton iteration count below which a converged step grows the step size.
pub const GROWTH_ITERATION_THRESHOLD: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stepsize {
    pub initial_value: f64,
    /// Factor by which the step size grows or shrinks. A ratio of 1 disables adaptation,
    /// except that failed steps are still halved.
    #[serde(default = "default_change_ratio")]
    pub stepsize_change_ratio: f64,
    #[serde(default)]
    pub dt_min: f64,
    #[serde(default)]
    pub dt_max: Option<f64>,
    /// Time after which the step size is capped at `stepsize_stop_max`.
    #[serde(default)]
    pub t_stop: Option<f64>,
    #[serde(default)]
    pub stepsize_stop_max: Option<f64>,
}

fn default_change_ratio() -> f64 {
    1.0
}

impl Stepsize {
    pub fn new(initial_value: f64) -> Self {
        Self {
            initial_value,
            stepsize_change_ratio: default_change_ratio(),
            dt_min: 0.0,
            dt_max: None,
            t_stop: None,
            stepsize_stop_max: None,
        }
    }

    pub fn adaptive(self, stepsize_change_ratio: f64, dt_min: f64) -> Self {
        Self {
            stepsize_change_ratio,
            dt_min,
            ..self
        }
    }

    pub fn with_dt_max(self, dt_max: f64) -> Self {
        Self {
            dt_max: Some(dt_max),
            ..self
        }
    }

    pub fn with_stop(self, t_stop: f64, stepsize_stop_max: f64) -> Self {
        Self {
            t_stop: Some(t_stop),
            stepsize_stop_max: Some(stepsize_stop_max),
            ..self
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if !(self.initial_value > 0.0) {
            return Err(ConfigError::InvalidStepsize(format!(
                "initial value must be positive, got {}",
                self.initial_value
            )));
        }
        if !(self.stepsize_change_ratio >= 1.0) {
            return Err(ConfigError::InvalidStepsize(format!(
                "stepsize_change_ratio must be at least 1, got {}",
                self.stepsize_change_ratio
            )));
        }
        if !(self.dt_min >= 0.0) {
            return Err(ConfigError::InvalidStepsize(format!("dt_min must be non-negative, got {}", self.dt_min)));
        }
        if self.initial_value < self.dt_min {
            return Err(ConfigError::InvalidStepsize(format!(
                "initial value {} is below dt_min {}",
                self.initial_value, self.dt_min
            )));
        }
        if let Some(dt_max) = self.dt_max {
            if dt_max < self.dt_min {
                return Err(ConfigError::InvalidStepsize(format!(
                    "dt_max {} is below dt_min {}",
                    dt_max, self.dt_min
                )));
            }
        }
        if self.t_stop.is_some() != self.stepsize_stop_max.is_some() {
            return Err(ConfigError::InvalidStepsize(
                "t_stop and stepsize_stop_max must be given together".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepsizeError {
    /// The step size fell below `dt_min` after a failed step.
    BelowMinimum { dt: f64, dt_min: f64 },
    /// Too many consecutive failed attempts of the same step.
    TooManyFailures { failures: usize },
}

impl fmt::Display for StepsizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepsizeError::BelowMinimum { dt, dt_min } => {
                write!(f, "Step size {:e} fell below the minimum {:e}.", dt, dt_min)
            }
            StepsizeError::TooManyFailures { failures } => {
                write!(f, "Time step failed {} consecutive times.", failures)
            }
        }
    }
}

impl Error for StepsizeError {}

/// Owns the step size `dt`, shared with the weak forms through a [`Parameter`].
#[derive(Debug, Clone)]
pub struct StepsizeController {
    settings: Stepsize,
    dt: Parameter,
}

impl StepsizeController {
    pub fn new(settings: Stepsize) -> Self {
        let dt = Parameter::new("dt", settings.initial_value);
        Self { settings, dt }
    }

    pub fn settings(&self) -> &Stepsize {
        &self.settings
    }

    pub fn value(&self) -> f64 {
        self.dt.get()
    }

    pub fn parameter(&self) -> &Parameter {
        &self.dt
    }

    /// The step size as an expression whose value follows the controller.
    pub fn expr(&self) -> Expr {
        Expr::parameter(&self.dt)
    }

    /// Adapts the step size after an accepted step ending at time `t`.
    pub fn adapt(&mut self, t: f64, newton_iterations: usize) {
        let ratio = self.settings.stepsize_change_ratio;
        let mut dt = self.dt.get();
        if newton_iterations < GROWTH_ITERATION_THRESHOLD {
            dt *= ratio;
        } else {
            dt /= ratio;
        }
        if let (Some(t_stop), Some(stop_max)) = (self.settings.t_stop, self.settings.stepsize_stop_max) {
            if t >= t_stop {
                dt = dt.min(stop_max);
            }
        }
        if let Some(dt_max) = self.settings.dt_max {
            dt = dt.min(dt_max);
        }
        debug!("Step size adapted from {:e} to {:e}", self.dt.get(), dt);
        self.dt.set(dt);
    }

    /// Shrinks the step size after a failed step.
    pub fn shrink(&mut self) -> Result<f64, StepsizeError> {
        let ratio = self.settings.stepsize_change_ratio;
        let dt = if ratio > 1.0 {
            self.dt.get() / ratio
        } else {
            self.dt.get() / 2.0
        };
        self.dt.set(dt);
        if dt < self.settings.dt_min || !(dt > 0.0) {
            return Err(StepsizeError::BelowMinimum {
                dt,
                dt_min: self.settings.dt_min,
            });
        }
        debug!("Step size reduced to {:e}", dt);
        Ok(dt)
    }

    /// Shortens the step so that it does not go past `final_time` when starting from `t`.
    /// Returns `true` if this step reaches the final time.
    pub fn clamp(&mut self, t: f64, final_time: f64) -> bool {
        let eps = 1e-12 * final_time.abs().max(1.0);
        let dt = self.dt.get();
        if t + dt >= final_time - eps {
            self.dt.set(final_time - t);
            true
        } else {
            false
        }
    }
}
