//! Exports of accepted time steps: VTK snapshots, derived quantities and error norms.
use crate::assembly::{evaluate_on_surface, integrate, DEFAULT_QUADRATURE_POINTS};
use crate::error::{estimate_L2_error, max_vertex_error};
use crate::expr::{EvaluationPoint, Expr};
use crate::form::Measure;
use crate::formulation::concentration;
use crate::io::csv::write_rows;
use crate::io::vtk::{interval_mesh_dataset, write_vtk};
use crate::materials::{Material, Materials};
use crate::mesh::IntervalMesh;
use crate::settings::ConfigError;
use crate::sources::Field;
use crate::space::Function;
use eyre::eyre;
use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Read-only view of the fields of an accepted time step.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub materials: &'a Materials,
    /// Hydrogen transport unknown.
    pub u: &'a Function,
    pub num_traps: usize,
    pub temperature: &'a Expr,
    /// The temperature function, if the heat equation is solved.
    pub temperature_function: Option<&'a Function>,
    pub t: f64,
}

impl<'a> Snapshot<'a> {
    pub fn mesh(&self) -> &'a IntervalMesh {
        self.u.space().mesh()
    }

    fn check_field(&self, field: Field) -> Result<(), ConfigError> {
        match field {
            Field::Trap(i) if i >= self.num_traps => Err(ConfigError::InvalidField(format!(
                "trap {} requested but only {} traps are defined",
                i, self.num_traps
            ))),
            _ => Ok(()),
        }
    }

    /// Expression of `field` inside `material`.
    ///
    /// The mobile field is the concentration, i.e. the unknown multiplied by the solubility
    /// where the material defines one.
    pub fn field_expression(&self, field: Field, material: Option<&Material>) -> Result<Expr, ConfigError> {
        self.check_field(field)?;
        let solute = Expr::coefficient(self.u, 0);
        let mobile = || match material {
            Some(material) => concentration(material, &solute, self.temperature),
            None => solute.clone(),
        };
        Ok(match field {
            Field::Mobile => mobile(),
            Field::Trap(i) => Expr::coefficient(self.u, i + 1),
            Field::Temperature => self.temperature.clone(),
            Field::Retention => {
                let mut retention = mobile();
                for i in 0..self.num_traps {
                    retention += Expr::coefficient(self.u, i + 1);
                }
                retention
            }
        })
    }

    pub fn field_expression_in_cell(&self, field: Field, cell: usize) -> Result<Expr, ConfigError> {
        let material = self.materials.find_by_id(self.mesh().volume_marker(cell));
        self.field_expression(field, material)
    }

    /// Values of `field` at the mesh vertices. At interfaces the value in the left cell is taken.
    pub fn vertex_values(&self, field: Field) -> Result<Vec<f64>, ConfigError> {
        let mesh = self.mesh();
        let mut expressions: FxHashMap<usize, Expr> = FxHashMap::default();
        let mut values = Vec::with_capacity(mesh.num_vertices());
        for (vertex, x) in mesh.vertices().iter().enumerate() {
            let (cell, xi) = mesh.vertex_cell(vertex);
            let marker = mesh.volume_marker(cell);
            if !expressions.contains_key(&marker) {
                expressions.insert(marker, self.field_expression_in_cell(field, cell)?);
            }
            let expr = &expressions[&marker];
            values.push(expr.eval(&EvaluationPoint { cell, xi, x: *x, t: self.t }));
        }
        Ok(values)
    }
}

/// Writes VTK snapshots of selected fields.
#[derive(Debug, Clone)]
pub struct VtkExports {
    fields: Vec<Field>,
    labels: Vec<String>,
    folder: PathBuf,
    nb_iterations_between_exports: usize,
    last_timestep_only: bool,
    iterations: usize,
    written: Vec<PathBuf>,
}

impl VtkExports {
    pub fn new(fields: Vec<Field>, labels: Vec<String>, folder: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let folder = folder.into();
        if folder.as_os_str().is_empty() {
            return Err(ConfigError::EmptyFolder);
        }
        if fields.len() != labels.len() {
            return Err(ConfigError::LabelCountMismatch {
                fields: fields.len(),
                labels: labels.len(),
            });
        }
        Ok(Self {
            fields,
            labels,
            folder,
            nb_iterations_between_exports: 1,
            last_timestep_only: false,
            iterations: 0,
            written: Vec::new(),
        })
    }

    pub fn with_nb_iterations_between_exports(self, nb_iterations_between_exports: usize) -> Self {
        Self {
            nb_iterations_between_exports: nb_iterations_between_exports.max(1),
            ..self
        }
    }

    pub fn with_last_timestep_only(self, last_timestep_only: bool) -> Self {
        Self {
            last_timestep_only,
            ..self
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn check(&self, num_traps: usize) -> Result<(), ConfigError> {
        for field in &self.fields {
            if let Field::Trap(i) = field {
                if *i >= num_traps {
                    return Err(ConfigError::InvalidField(field.to_string()));
                }
            }
        }
        Ok(())
    }

    fn is_export_step(&self, final_step: bool) -> bool {
        if self.last_timestep_only {
            final_step
        } else {
            self.iterations % self.nb_iterations_between_exports == 0 || final_step
        }
    }

    /// Called after every accepted step. Returns the path of the written file, if any.
    pub fn export(&mut self, snapshot: &Snapshot, final_step: bool) -> eyre::Result<Option<PathBuf>> {
        self.iterations += 1;
        if !self.is_export_step(final_step) {
            return Ok(None);
        }

        let mut point_data = Vec::with_capacity(self.fields.len());
        for (field, label) in self.fields.iter().zip(&self.labels) {
            point_data.push((label.clone(), snapshot.vertex_values(*field)?));
        }
        let dataset = interval_mesh_dataset(snapshot.mesh(), &point_data)?;
        let path = self
            .folder
            .join(format!("snapshot_{:06}.vtk", self.written.len()));
        write_vtk(dataset, &path, &format!("t = {}", snapshot.t))?;
        info!("Exported {} at t = {}", path.display(), snapshot.t);
        self.written.push(path.clone());
        Ok(Some(path))
    }
}

/// A scalar computed from the fields of an accepted time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DerivedQuantity {
    TotalVolume { field: Field, volume: usize },
    AverageVolume { field: Field, volume: usize },
    MinimumVolume { field: Field, volume: usize },
    MaximumVolume { field: Field, volume: usize },
    /// Outward flux `-D grad c . n` of the mobile field, or `-k grad T . n` of the temperature.
    SurfaceFlux { field: Field, surface: usize },
    PointValue { field: Field, x: f64 },
}

impl fmt::Display for DerivedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedQuantity::TotalVolume { field, volume } => write!(f, "Total {} volume {}", field, volume),
            DerivedQuantity::AverageVolume { field, volume } => write!(f, "Average {} volume {}", field, volume),
            DerivedQuantity::MinimumVolume { field, volume } => write!(f, "Minimum {} volume {}", field, volume),
            DerivedQuantity::MaximumVolume { field, volume } => write!(f, "Maximum {} volume {}", field, volume),
            DerivedQuantity::SurfaceFlux { field, surface } => write!(f, "Flux surface {}: {}", surface, field),
            DerivedQuantity::PointValue { field, x } => write!(f, "{} value at {}", field, x),
        }
    }
}

impl DerivedQuantity {
    pub fn compute(&self, snapshot: &Snapshot) -> eyre::Result<f64> {
        let mesh = snapshot.mesh();
        let value = match self {
            DerivedQuantity::TotalVolume { field, volume } => {
                let expr = volume_expression(snapshot, *field, *volume)?;
                integrate(&expr, mesh, Measure::Volume(*volume), snapshot.t)
            }
            DerivedQuantity::AverageVolume { field, volume } => {
                let expr = volume_expression(snapshot, *field, *volume)?;
                let total = integrate(&expr, mesh, Measure::Volume(*volume), snapshot.t);
                total / integrate(&Expr::one(), mesh, Measure::Volume(*volume), snapshot.t)
            }
            DerivedQuantity::MinimumVolume { field, volume } => volume_vertex_values(snapshot, *field, *volume)?
                .into_iter()
                .fold(f64::INFINITY, f64::min),
            DerivedQuantity::MaximumVolume { field, volume } => volume_vertex_values(snapshot, *field, *volume)?
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max),
            DerivedQuantity::SurfaceFlux { field, surface } => surface_flux(snapshot, *field, *surface)?,
            DerivedQuantity::PointValue { field, x } => {
                let cell = mesh
                    .find_cell(*x)
                    .ok_or_else(|| eyre!("point {} is outside the mesh", x))?;
                let xi = mesh.reference_coordinate(cell, *x);
                snapshot
                    .field_expression_in_cell(*field, cell)?
                    .eval(&EvaluationPoint { cell, xi, x: *x, t: snapshot.t })
            }
        };
        if !value.is_finite() {
            return Err(eyre!("{} is not finite", self));
        }
        Ok(value)
    }
}

fn volume_expression(snapshot: &Snapshot, field: Field, volume: usize) -> eyre::Result<Expr> {
    let mesh = snapshot.mesh();
    if !mesh.volume_markers().contains(&volume) {
        return Err(eyre!("volume {} has no cells", volume));
    }
    Ok(snapshot.field_expression(field, snapshot.materials.find_by_id(volume))?)
}

fn volume_vertex_values(snapshot: &Snapshot, field: Field, volume: usize) -> eyre::Result<Vec<f64>> {
    let mesh = snapshot.mesh();
    let expr = volume_expression(snapshot, field, volume)?;
    let mut values = Vec::new();
    for cell in (0..mesh.num_cells()).filter(|cell| mesh.volume_marker(*cell) == volume) {
        let [a, b] = mesh.cell_bounds(cell);
        for (xi, x) in [(-1.0, a), (1.0, b)] {
            values.push(expr.eval(&EvaluationPoint { cell, xi, x, t: snapshot.t }));
        }
    }
    Ok(values)
}

fn surface_flux(snapshot: &Snapshot, field: Field, surface: usize) -> eyre::Result<f64> {
    let mesh = snapshot.mesh();
    let vertices: Vec<_> = (0..mesh.num_vertices())
        .filter(|vertex| mesh.surface_marker(*vertex) == surface)
        .collect();
    let first = vertices
        .first()
        .ok_or_else(|| eyre!("surface {} has no vertices", surface))?;
    let marker = mesh.volume_marker(mesh.vertex_cell(*first).0);
    if vertices
        .iter()
        .any(|vertex| mesh.volume_marker(mesh.vertex_cell(*vertex).0) != marker)
    {
        return Err(eyre!("surface {} is adjacent to several volumes", surface));
    }
    let material = snapshot
        .materials
        .find_by_id(marker)
        .ok_or_else(|| eyre!("volume {} has no material", marker))?;

    let property = match field {
        Field::Mobile => material.diffusivity(snapshot.temperature),
        Field::Temperature => material
            .thermal_cond
            .as_ref()
            .ok_or_else(|| eyre!("material {} has no thermal conductivity", material.name_id()))?
            .evaluate(snapshot.temperature),
        other => return Err(eyre!("surface flux is not defined for field {}", other)),
    };
    let expr = snapshot.field_expression(field, Some(material))?;
    let flux = -property * expr.grad();

    Ok(evaluate_on_surface(&flux, mesh, surface, snapshot.t)
        .into_iter()
        .map(|(vertex, value)| value * mesh.outward_normal(vertex))
        .sum())
}

/// A table of derived quantities, one row per accepted time step.
#[derive(Debug, Clone, Default)]
pub struct DerivedQuantities {
    quantities: Vec<DerivedQuantity>,
    filename: Option<PathBuf>,
    nb_iterations_between_compute: usize,
    iterations: usize,
    rows: Vec<Vec<f64>>,
}

impl DerivedQuantities {
    pub fn new(quantities: Vec<DerivedQuantity>) -> Self {
        Self {
            quantities,
            filename: None,
            nb_iterations_between_compute: 1,
            iterations: 0,
            rows: Vec::new(),
        }
    }

    /// Writes the table as CSV to `filename` at the end of the run.
    pub fn with_filename(self, filename: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let filename = filename.into();
        if filename.as_os_str().is_empty() {
            return Err(ConfigError::EmptyFolder);
        }
        Ok(Self {
            filename: Some(filename),
            ..self
        })
    }

    pub fn with_nb_iterations_between_compute(self, nb_iterations_between_compute: usize) -> Self {
        Self {
            nb_iterations_between_compute: nb_iterations_between_compute.max(1),
            ..self
        }
    }

    pub fn quantities(&self) -> &[DerivedQuantity] {
        &self.quantities
    }

    pub fn headers(&self) -> Vec<String> {
        std::iter::once("t(s)".to_string())
            .chain(self.quantities.iter().map(|quantity| quantity.to_string()))
            .collect()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Computes a row for the snapshot. Failed quantities are logged and recorded as NaN.
    pub fn compute(&mut self, snapshot: &Snapshot, final_step: bool) {
        self.iterations += 1;
        if self.iterations % self.nb_iterations_between_compute != 0 && !final_step {
            return;
        }
        let mut row = Vec::with_capacity(self.quantities.len() + 1);
        row.push(snapshot.t);
        for quantity in &self.quantities {
            match quantity.compute(snapshot) {
                Ok(value) => row.push(value),
                Err(err) => {
                    warn!("Failed to compute {} at t = {}: {}", quantity, snapshot.t, err);
                    row.push(f64::NAN);
                }
            }
        }
        self.rows.push(row);
    }

    pub fn write(&self) -> eyre::Result<()> {
        match &self.filename {
            Some(filename) => write_rows(filename, &self.headers(), &self.rows),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorNorm {
    /// Maximum error over the mesh vertices.
    Max,
    L2,
}

/// Error of a field against an exact solution, computed at the end of the run.
#[derive(Debug, Clone)]
pub struct ErrorExport {
    pub field: Field,
    pub exact: Expr,
    pub norm: ErrorNorm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub field: Field,
    pub norm: ErrorNorm,
    pub t: f64,
    pub value: f64,
}

impl ErrorExport {
    pub fn new(field: Field, exact: impl Into<Expr>, norm: ErrorNorm) -> Self {
        Self {
            field,
            exact: exact.into(),
            norm,
        }
    }

    /// The error of the unknown itself, not of the concentration.
    pub fn compute(&self, snapshot: &Snapshot) -> Result<ErrorValue, ConfigError> {
        snapshot.check_field(self.field)?;
        let function_component = match self.field {
            Field::Mobile => Some((snapshot.u, 0)),
            Field::Trap(i) => Some((snapshot.u, i + 1)),
            Field::Temperature => snapshot.temperature_function.map(|function| (function, 0)),
            Field::Retention => {
                return Err(ConfigError::InvalidField(
                    "errors are not computed for the retention".to_string(),
                ))
            }
        };

        let t = snapshot.t;
        let value = match (function_component, self.norm) {
            (Some((function, component)), ErrorNorm::Max) => max_vertex_error(function, component, &self.exact, t),
            (Some((function, component)), ErrorNorm::L2) => {
                estimate_L2_error(function, component, &self.exact, t, DEFAULT_QUADRATURE_POINTS)
            }
            (None, ErrorNorm::Max) => snapshot
                .vertex_values(Field::Temperature)?
                .into_iter()
                .zip(snapshot.mesh().vertices())
                .map(|(value, x)| (value - self.exact.eval_at(*x, t)).abs())
                .fold(0.0, f64::max),
            (None, ErrorNorm::L2) => {
                let difference = (snapshot.temperature - &self.exact).powi(2);
                integrate(&difference, snapshot.mesh(), Measure::Domain, t).sqrt()
            }
        };

        Ok(ErrorValue {
            field: self.field,
            norm: self.norm,
            t,
            value,
        })
    }
}
