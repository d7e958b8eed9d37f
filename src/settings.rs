//! Solver settings and configuration errors.
use crate::mesh::MeshError;
use hytra_optimize::newton::NewtonSettings;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Errors in the problem definition, reported before any solve takes place.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NoMaterials,
    /// Two materials claim the same subdomain id.
    OverlappingMaterials { id: usize },
    /// A subdomain id is referenced but no material is defined on it.
    UnknownSubdomain { id: usize, referenced_by: String },
    MissingProperty { material: usize, property: &'static str },
    EmptyFolder,
    /// The numbers of exported fields and labels differ.
    LabelCountMismatch { fields: usize, labels: usize },
    InvalidField(String),
    InvalidSettings(String),
    InvalidStepsize(String),
    InvalidTrap(String),
    Mesh(MeshError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoMaterials => write!(f, "At least one material must be defined."),
            ConfigError::OverlappingMaterials { id } => {
                write!(f, "Subdomain {} is claimed by more than one material.", id)
            }
            ConfigError::UnknownSubdomain { id, referenced_by } => {
                write!(f, "Subdomain {} referenced by {} has no material.", id, referenced_by)
            }
            ConfigError::MissingProperty { material, property } => {
                write!(f, "Material {} is missing the property {}.", material, property)
            }
            ConfigError::EmptyFolder => write!(f, "Export folder cannot be an empty string."),
            ConfigError::LabelCountMismatch { fields, labels } => write!(
                f,
                "Number of fields to be exported ({}) doesn't match number of labels ({}).",
                fields, labels
            ),
            ConfigError::InvalidField(field) => write!(f, "Invalid field: {}", field),
            ConfigError::InvalidSettings(msg) => write!(f, "Invalid settings: {}", msg),
            ConfigError::InvalidStepsize(msg) => write!(f, "Invalid stepsize: {}", msg),
            ConfigError::InvalidTrap(msg) => write!(f, "Invalid trap: {}", msg),
            ConfigError::Mesh(err) => write!(f, "Invalid mesh: {}", err),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Mesh(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MeshError> for ConfigError {
    fn from(err: MeshError) -> Self {
        ConfigError::Mesh(err)
    }
}

fn default_maximum_iterations() -> usize {
    30
}

/// Nonlinear solver and run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub absolute_tolerance: f64,
    pub relative_tolerance: f64,
    #[serde(default = "default_maximum_iterations")]
    pub maximum_iterations: usize,
    #[serde(default)]
    pub transient: bool,
    #[serde(default)]
    pub final_time: Option<f64>,
    /// Use a backtracking line search in Newton's method.
    #[serde(default)]
    pub line_search: bool,
}

impl Settings {
    pub fn new(absolute_tolerance: f64, relative_tolerance: f64) -> Self {
        Self {
            absolute_tolerance,
            relative_tolerance,
            maximum_iterations: default_maximum_iterations(),
            transient: false,
            final_time: None,
            line_search: false,
        }
    }

    pub fn with_maximum_iterations(self, maximum_iterations: usize) -> Self {
        Self {
            maximum_iterations,
            ..self
        }
    }

    pub fn transient(self, final_time: f64) -> Self {
        Self {
            transient: true,
            final_time: Some(final_time),
            ..self
        }
    }

    pub fn with_line_search(self, line_search: bool) -> Self {
        Self { line_search, ..self }
    }

    pub fn newton_settings(&self) -> NewtonSettings<f64> {
        NewtonSettings {
            max_iterations: Some(self.maximum_iterations),
            absolute_tolerance: self.absolute_tolerance,
            relative_tolerance: self.relative_tolerance,
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if !(self.absolute_tolerance >= 0.0) || !(self.relative_tolerance >= 0.0) {
            return Err(ConfigError::InvalidSettings("tolerances must be non-negative".to_string()));
        }
        if self.maximum_iterations == 0 {
            return Err(ConfigError::InvalidSettings(
                "maximum_iterations must be positive".to_string(),
            ));
        }
        if self.transient {
            match self.final_time {
                Some(final_time) if final_time > 0.0 => {}
                Some(final_time) => {
                    return Err(ConfigError::InvalidSettings(format!(
                        "final_time must be positive, got {}",
                        final_time
                    )))
                }
                None => {
                    return Err(ConfigError::InvalidSettings(
                        "final_time is required for transient simulations".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}
