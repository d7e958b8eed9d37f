//! Material properties and their lookup by subdomain id.
use crate::expr::Expr;
use crate::mesh::IntervalMesh;
use crate::settings::ConfigError;
use crate::K_B;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A material property that is either constant or a function of temperature.
#[derive(Clone)]
pub enum Property {
    Constant(f64),
    TemperatureDependent(Arc<dyn Fn(&Expr) -> Expr + Send + Sync>),
}

impl Property {
    pub fn temperature_dependent(f: impl Fn(&Expr) -> Expr + Send + Sync + 'static) -> Self {
        Property::TemperatureDependent(Arc::new(f))
    }

    /// The property as an expression of the given temperature.
    pub fn evaluate(&self, temperature: &Expr) -> Expr {
        match self {
            Property::Constant(value) => Expr::Constant(*value),
            Property::TemperatureDependent(f) => f(temperature),
        }
    }
}

impl From<f64> for Property {
    fn from(value: f64) -> Self {
        Property::Constant(value)
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Constant(value) => write!(f, "Constant({})", value),
            Property::TemperatureDependent(_) => write!(f, "TemperatureDependent(..)"),
        }
    }
}

/// Heat of transport `H(T) = enthalpy + entropy * T` used by the Soret flux.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HeatOfTransport {
    pub enthalpy: f64,
    pub entropy: f64,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub ids: Vec<usize>,
    pub d_0: f64,
    pub e_d: f64,
    /// Solubility pre-exponential factor and activation energy.
    pub solubility: Option<(f64, f64)>,
    pub thermal_cond: Option<Property>,
    pub heat_capacity: Option<Property>,
    pub rho: Option<Property>,
    pub heat_of_transport: Option<HeatOfTransport>,
    /// Extent of the material, used to mark mesh cells.
    pub borders: Option<[f64; 2]>,
}

impl Material {
    pub fn new(id: usize, d_0: f64, e_d: f64) -> Self {
        Self {
            ids: vec![id],
            d_0,
            e_d,
            solubility: None,
            thermal_cond: None,
            heat_capacity: None,
            rho: None,
            heat_of_transport: None,
            borders: None,
        }
    }

    pub fn with_ids(self, ids: Vec<usize>) -> Self {
        Self { ids, ..self }
    }

    pub fn with_solubility(self, s_0: f64, e_s: f64) -> Self {
        Self {
            solubility: Some((s_0, e_s)),
            ..self
        }
    }

    pub fn with_thermal_cond(self, thermal_cond: impl Into<Property>) -> Self {
        Self {
            thermal_cond: Some(thermal_cond.into()),
            ..self
        }
    }

    pub fn with_heat_capacity(self, heat_capacity: impl Into<Property>) -> Self {
        Self {
            heat_capacity: Some(heat_capacity.into()),
            ..self
        }
    }

    pub fn with_rho(self, rho: impl Into<Property>) -> Self {
        Self {
            rho: Some(rho.into()),
            ..self
        }
    }

    pub fn with_heat_of_transport(self, enthalpy: f64, entropy: f64) -> Self {
        Self {
            heat_of_transport: Some(HeatOfTransport { enthalpy, entropy }),
            ..self
        }
    }

    pub fn with_borders(self, borders: [f64; 2]) -> Self {
        Self {
            borders: Some(borders),
            ..self
        }
    }

    /// The first id, used to name the material in messages.
    pub fn name_id(&self) -> usize {
        self.ids.first().copied().unwrap_or(0)
    }

    /// `D_0 exp(-E_D / (k_B T))`.
    pub fn diffusivity(&self, temperature: &Expr) -> Expr {
        arrhenius(self.d_0, self.e_d, temperature)
    }

    /// `S_0 exp(-E_S / (k_B T))`, if the material defines a solubility law.
    pub fn solubility(&self, temperature: &Expr) -> Option<Expr> {
        self.solubility
            .map(|(s_0, e_s)| arrhenius(s_0, e_s, temperature))
    }

    pub fn heat_of_transport(&self, temperature: &Expr) -> Option<Expr> {
        self.heat_of_transport
            .map(|h| h.enthalpy + h.entropy * temperature)
    }
}

/// `pre_factor * exp(-energy / (k_B T))`.
pub fn arrhenius(pre_factor: f64, energy: f64, temperature: &Expr) -> Expr {
    pre_factor * (-energy / K_B / temperature).exp()
}

#[derive(Debug, Clone, Default)]
pub struct Materials {
    materials: Vec<Material>,
    by_id: FxHashMap<usize, usize>,
}

impl Materials {
    pub fn new(materials: Vec<Material>) -> Self {
        let mut by_id = FxHashMap::default();
        for (index, material) in materials.iter().enumerate() {
            for id in &material.ids {
                by_id.entry(*id).or_insert(index);
            }
        }
        Self { materials, by_id }
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn find_by_id(&self, id: usize) -> Option<&Material> {
        self.by_id.get(&id).map(|index| &self.materials[*index])
    }

    /// The material of the cell adjacent to the first vertex marked with `surface`.
    pub fn on_surface(&self, mesh: &IntervalMesh, surface: usize) -> Option<&Material> {
        (0..mesh.num_vertices())
            .find(|vertex| mesh.surface_marker(*vertex) == surface)
            .and_then(|vertex| self.find_by_id(mesh.volume_marker(mesh.vertex_cell(vertex).0)))
    }

    /// Looks up the material of a subdomain referenced by another entity.
    pub fn require(&self, id: usize, referenced_by: &str) -> Result<&Material, ConfigError> {
        self.find_by_id(id).ok_or_else(|| ConfigError::UnknownSubdomain {
            id,
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Checks that material ids are disjoint and that the properties needed by the chosen
    /// temperature model are present.
    pub fn check_consistency(&self, heat_transfer: bool, transient_heat: bool) -> Result<(), ConfigError> {
        if self.materials.is_empty() {
            return Err(ConfigError::NoMaterials);
        }

        let mut owner = FxHashMap::default();
        for (index, material) in self.materials.iter().enumerate() {
            if material.ids.is_empty() {
                return Err(ConfigError::InvalidSettings(format!("material {} has no subdomain id", index)));
            }
            for id in &material.ids {
                if owner.insert(*id, index).is_some() {
                    return Err(ConfigError::OverlappingMaterials { id: *id });
                }
            }
        }

        let has_borders = self.materials.iter().filter(|m| m.borders.is_some()).count();
        if has_borders != 0 && has_borders != self.materials.len() {
            return Err(ConfigError::InvalidSettings(
                "either all or no materials must define borders".to_string(),
            ));
        }

        if heat_transfer {
            for material in &self.materials {
                let missing = |property| ConfigError::MissingProperty {
                    material: material.name_id(),
                    property,
                };
                if material.thermal_cond.is_none() {
                    return Err(missing("thermal_cond"));
                }
                if transient_heat {
                    if material.heat_capacity.is_none() {
                        return Err(missing("heat_capacity"));
                    }
                    if material.rho.is_none() {
                        return Err(missing("rho"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Marks mesh cells with the ids of materials that define borders.
    pub fn mark_mesh(&self, mesh: &mut IntervalMesh) {
        let borders: Vec<_> = self
            .materials
            .iter()
            .filter_map(|m| m.borders.map(|b| (b, m.name_id())))
            .collect();
        if !borders.is_empty() {
            mesh.mark_volumes_from_borders(&borders);
        }
    }
}
