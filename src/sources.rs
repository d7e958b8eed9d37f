//! Fields of the problem, volumetric sources and initial conditions.
use crate::expr::Expr;
use crate::form::Measure;
use crate::settings::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A field of the hydrogen transport problem.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Mobile (solute) concentration.
    Mobile,
    /// Trapped concentration of the trap with the given index, in declaration order.
    Trap(usize),
    Temperature,
    /// Sum of the mobile and all trapped concentrations. Only available for exports.
    Retention,
}

impl Field {
    /// Component of the hydrogen transport unknown holding this field.
    pub fn component(&self) -> Option<usize> {
        match self {
            Field::Mobile => Some(0),
            Field::Trap(i) => Some(i + 1),
            Field::Temperature | Field::Retention => None,
        }
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    /// Parses `"solute"`, `"retention"`, `"T"` or a component index, where `"0"` is the
    /// mobile concentration and `"i"` the trapped concentration of trap `i - 1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solute" | "0" => Ok(Field::Mobile),
            "T" | "temperature" => Ok(Field::Temperature),
            "retention" => Ok(Field::Retention),
            other => match other.parse::<usize>() {
                Ok(i) if i > 0 => Ok(Field::Trap(i - 1)),
                _ => Err(ConfigError::InvalidField(other.to_string())),
            },
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Mobile => write!(f, "solute"),
            Field::Trap(i) => write!(f, "{}", i + 1),
            Field::Temperature => write!(f, "T"),
            Field::Retention => write!(f, "retention"),
        }
    }
}

/// A volumetric source of one field.
#[derive(Debug, Clone)]
pub struct Source {
    pub value: Expr,
    /// Volumes the source acts on. An empty list means the whole domain.
    pub volumes: Vec<usize>,
    pub field: Field,
}

impl Source {
    pub fn new(value: impl Into<Expr>, volumes: Vec<usize>, field: Field) -> Self {
        Self {
            value: value.into(),
            volumes,
            field,
        }
    }

    pub fn measures(&self) -> Vec<Measure> {
        if self.volumes.is_empty() {
            vec![Measure::Domain]
        } else {
            self.volumes.iter().map(|id| Measure::Volume(*id)).collect()
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitialCondition {
    pub field: Field,
    pub value: Expr,
}

impl InitialCondition {
    pub fn new(field: Field, value: impl Into<Expr>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}
