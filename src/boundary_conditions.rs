//! Boundary conditions on marked surfaces.
use crate::expr::{Expr, SubExpressions};
use crate::materials::arrhenius;
use crate::settings::ConfigError;
use crate::sources::Field;

#[derive(Debug, Clone)]
pub enum BoundaryConditionKind {
    /// Prescribed value.
    Dirichlet { value: Expr },
    /// Sieverts' law `c = S_0 exp(-E_S / (k_B T)) sqrt(P)`.
    Sieverts { s_0: f64, e_s: f64, pressure: Expr },
    /// Surface concentration under implantation,
    /// `c = phi R_p / D(T) + sqrt(phi / K_r(T))`, where the second term is only present
    /// if a recombination coefficient is given.
    ImplantationDirichlet {
        phi: Expr,
        r_p: f64,
        d_0: f64,
        e_d: f64,
        recombination: Option<(f64, f64)>,
    },
    /// Prescribed inward flux.
    Flux { value: Expr },
    /// Recombination flux `-K_r(T) c^order`.
    Recombination { k_r_0: f64, e_r: f64, order: i32 },
    /// Convective heat flux `-h (T - T_ext)`.
    Convective { h_coeff: Expr, t_ext: Expr },
}

#[derive(Debug, Clone)]
pub struct BoundaryCondition {
    pub kind: BoundaryConditionKind,
    pub surfaces: Vec<usize>,
    pub field: Field,
}

impl BoundaryCondition {
    pub fn new(kind: BoundaryConditionKind, surfaces: Vec<usize>, field: Field) -> Self {
        Self { kind, surfaces, field }
    }

    pub fn dirichlet(surfaces: Vec<usize>, value: impl Into<Expr>, field: Field) -> Self {
        Self::new(BoundaryConditionKind::Dirichlet { value: value.into() }, surfaces, field)
    }

    pub fn sieverts(surfaces: Vec<usize>, s_0: f64, e_s: f64, pressure: impl Into<Expr>) -> Self {
        Self::new(
            BoundaryConditionKind::Sieverts {
                s_0,
                e_s,
                pressure: pressure.into(),
            },
            surfaces,
            Field::Mobile,
        )
    }

    pub fn implantation(
        surfaces: Vec<usize>,
        phi: impl Into<Expr>,
        r_p: f64,
        d_0: f64,
        e_d: f64,
        recombination: Option<(f64, f64)>,
    ) -> Self {
        Self::new(
            BoundaryConditionKind::ImplantationDirichlet {
                phi: phi.into(),
                r_p,
                d_0,
                e_d,
                recombination,
            },
            surfaces,
            Field::Mobile,
        )
    }

    pub fn flux(surfaces: Vec<usize>, value: impl Into<Expr>, field: Field) -> Self {
        Self::new(BoundaryConditionKind::Flux { value: value.into() }, surfaces, field)
    }

    pub fn recombination(surfaces: Vec<usize>, k_r_0: f64, e_r: f64, order: i32) -> Self {
        Self::new(
            BoundaryConditionKind::Recombination { k_r_0, e_r, order },
            surfaces,
            Field::Mobile,
        )
    }

    pub fn convective_flux(surfaces: Vec<usize>, h_coeff: impl Into<Expr>, t_ext: impl Into<Expr>) -> Self {
        Self::new(
            BoundaryConditionKind::Convective {
                h_coeff: h_coeff.into(),
                t_ext: t_ext.into(),
            },
            surfaces,
            Field::Temperature,
        )
    }

    pub fn is_dirichlet(&self) -> bool {
        matches!(
            self.kind,
            BoundaryConditionKind::Dirichlet { .. }
                | BoundaryConditionKind::Sieverts { .. }
                | BoundaryConditionKind::ImplantationDirichlet { .. }
        )
    }

    /// The prescribed value of a Dirichlet-type condition.
    ///
    /// Time-dependent inputs are registered in `sub_expressions`. Returns `None` for flux
    /// conditions.
    pub fn dirichlet_value(&self, temperature: &Expr, sub_expressions: &mut SubExpressions) -> Option<Expr> {
        match &self.kind {
            BoundaryConditionKind::Dirichlet { value } => Some(sub_expressions.register(value.clone())),
            BoundaryConditionKind::Sieverts { s_0, e_s, pressure } => {
                let pressure = sub_expressions.register(pressure.clone());
                Some(arrhenius(*s_0, *e_s, temperature) * pressure.sqrt())
            }
            BoundaryConditionKind::ImplantationDirichlet {
                phi,
                r_p,
                d_0,
                e_d,
                recombination,
            } => {
                let phi = sub_expressions.register(phi.clone());
                let mut value = &phi * *r_p / arrhenius(*d_0, *e_d, temperature);
                if let Some((k_r_0, e_r)) = recombination {
                    value += (&phi / arrhenius(*k_r_0, *e_r, temperature)).sqrt();
                }
                Some(value)
            }
            _ => None,
        }
    }

    /// Returns true if the flux depends on the mobile concentration.
    pub fn acts_on_concentration(&self) -> bool {
        matches!(self.kind, BoundaryConditionKind::Recombination { .. })
    }

    /// The inward flux of a flux-type condition, entering the residual as `-flux v ds`.
    ///
    /// `solute` is the mobile concentration, not the chemical potential unknown, and is
    /// required by recombination fluxes. Returns
    /// `Ok(None)` for Dirichlet-type conditions.
    pub fn flux_expression(
        &self,
        temperature: &Expr,
        solute: Option<&Expr>,
        sub_expressions: &mut SubExpressions,
    ) -> Result<Option<Expr>, ConfigError> {
        match &self.kind {
            BoundaryConditionKind::Flux { value } => Ok(Some(sub_expressions.register(value.clone()))),
            BoundaryConditionKind::Recombination { k_r_0, e_r, order } => {
                let solute = solute.ok_or_else(|| {
                    ConfigError::InvalidField("recombination flux requires the solute concentration".to_string())
                })?;
                Ok(Some(-arrhenius(*k_r_0, *e_r, temperature) * solute.clone().powi(*order)))
            }
            BoundaryConditionKind::Convective { h_coeff, t_ext } => {
                let h_coeff = sub_expressions.register(h_coeff.clone());
                let t_ext = sub_expressions.register(t_ext.clone());
                Ok(Some(-h_coeff * (temperature - t_ext)))
            }
            _ => Ok(None),
        }
    }
}
