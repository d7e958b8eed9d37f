//! Intrinsic and extrinsic hydrogen traps.
use crate::expr::Expr;
use crate::materials::arrhenius;
use crate::settings::ConfigError;

/// A creation channel of an extrinsic trap: `(1 - n / n_max) * eta * mask(x)`.
#[derive(Debug, Clone)]
pub struct GenerationChannel {
    pub n_max: f64,
    pub eta: f64,
    pub mask: Expr,
}

impl GenerationChannel {
    pub fn new(n_max: f64, eta: f64, mask: impl Into<Expr>) -> Self {
        Self {
            n_max,
            eta,
            mask: mask.into(),
        }
    }
}

/// Parameters of the rate equation governing an extrinsic trap density.
#[derive(Debug, Clone)]
pub struct ExtrinsicTrapParameters {
    /// Damage rate `phi_0`, usually a function of time.
    pub phi_0: Expr,
    pub channels: Vec<GenerationChannel>,
    /// Density at `t = 0`.
    pub initial_density: Expr,
}

impl ExtrinsicTrapParameters {
    pub fn new(phi_0: impl Into<Expr>, channels: Vec<GenerationChannel>) -> Self {
        Self {
            phi_0: phi_0.into(),
            channels,
            initial_density: Expr::zero(),
        }
    }

    pub fn with_initial_density(self, initial_density: impl Into<Expr>) -> Self {
        Self {
            initial_density: initial_density.into(),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub enum TrapKind {
    /// A trap with a prescribed density.
    Intrinsic { density: Expr },
    /// A trap whose density evolves through its own rate equation.
    Extrinsic(ExtrinsicTrapParameters),
}

/// A trap with trapping rate `p_0 exp(-E_p / (k_B T))` and release rate
/// `k_0 exp(-E_k / (k_B T))`, active in the listed materials.
#[derive(Debug, Clone)]
pub struct Trap {
    pub k_0: f64,
    pub e_k: f64,
    pub p_0: f64,
    pub e_p: f64,
    pub materials: Vec<usize>,
    pub kind: TrapKind,
}

impl Trap {
    pub fn intrinsic(
        k_0: f64,
        e_k: f64,
        p_0: f64,
        e_p: f64,
        materials: Vec<usize>,
        density: impl Into<Expr>,
    ) -> Self {
        Self {
            k_0,
            e_k,
            p_0,
            e_p,
            materials,
            kind: TrapKind::Intrinsic {
                density: density.into(),
            },
        }
    }

    pub fn extrinsic(
        k_0: f64,
        e_k: f64,
        p_0: f64,
        e_p: f64,
        materials: Vec<usize>,
        parameters: ExtrinsicTrapParameters,
    ) -> Self {
        Self {
            k_0,
            e_k,
            p_0,
            e_p,
            materials,
            kind: TrapKind::Extrinsic(parameters),
        }
    }

    pub fn is_extrinsic(&self) -> bool {
        matches!(self.kind, TrapKind::Extrinsic(_))
    }

    pub fn trapping_rate(&self, temperature: &Expr) -> Expr {
        arrhenius(self.p_0, self.e_p, temperature)
    }

    pub fn release_rate(&self, temperature: &Expr) -> Expr {
        arrhenius(self.k_0, self.e_k, temperature)
    }

    pub fn check(&self, index: usize) -> Result<(), ConfigError> {
        if self.materials.is_empty() {
            return Err(ConfigError::InvalidTrap(format!("trap {} is not active in any material", index)));
        }
        if let TrapKind::Extrinsic(parameters) = &self.kind {
            if parameters.channels.is_empty() || parameters.channels.len() > 2 {
                return Err(ConfigError::InvalidTrap(format!(
                    "extrinsic trap {} needs one or two generation channels, got {}",
                    index,
                    parameters.channels.len()
                )));
            }
            if let Some(channel) = parameters.channels.iter().find(|c| !(c.n_max > 0.0)) {
                return Err(ConfigError::InvalidTrap(format!(
                    "extrinsic trap {} has non-positive saturation density {}",
                    index, channel.n_max
                )));
            }
        }
        Ok(())
    }
}

/// Indices of the extrinsic traps among `traps`, in declaration order.
pub fn extrinsic_trap_indices(traps: &[Trap]) -> Vec<usize> {
    traps
        .iter()
        .enumerate()
        .filter(|(_, trap)| trap.is_extrinsic())
        .map(|(i, _)| i)
        .collect()
}
