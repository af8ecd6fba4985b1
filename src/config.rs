//! Run-time configuration of flows and solvers
//!
//! Everything is plain data with `serde` defaults, so a JSON file only has to
//! name what differs from the defaults:
//! ```
//! use flowctl::config::{FlowConfig, FlowKind};
//! let config: FlowConfig = serde_json::from_str(r#"{"kind": "step", "reynolds": 150}"#).unwrap();
//! assert_eq!(config.kind, FlowKind::Step);
//! assert_eq!(config.solver.newton.max_iterations, 30);
//! ```
use crate::error::{FlowError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Flow configuration to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    /// Rotating cylinder wake
    Cylinder,
    /// Three-cylinder fluidic pinball
    Pinball,
    /// Backward-facing step
    Step,
}

impl Default for FlowKind {
    fn default() -> Self {
        Self::Cylinder
    }
}

impl FlowKind {
    /// Lower-case name, as used in checkpoints
    pub fn name(self) -> &'static str {
        match self {
            Self::Cylinder => "cylinder",
            Self::Pinball => "pinball",
            Self::Step => "step",
        }
    }

    /// Reynolds number used when none is configured
    pub fn default_reynolds(self) -> f64 {
        match self {
            Self::Cylinder | Self::Step => 100.,
            Self::Pinball => 20.,
        }
    }
}

/// Mesh refinement level of the built-in geometries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Quick to solve, good enough for tests
    Coarse,
    /// Twice the coarse resolution
    Medium,
    /// Four times the coarse resolution
    Fine,
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Coarse
    }
}

impl Resolution {
    /// Number of sub-cells per coarse lattice cell in each direction
    pub fn refinement(self) -> usize {
        match self {
            Self::Coarse => 1,
            Self::Medium => 2,
            Self::Fine => 4,
        }
    }
}

/// Newton iteration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewtonConfig {
    /// Absolute tolerance on the residual 2-norm
    #[serde(default = "default_atol")]
    pub atol: f64,

    /// Tolerance relative to the initial residual
    #[serde(default = "default_rtol")]
    pub rtol: f64,

    /// Iteration budget
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Step halvings tried by the line search
    #[serde(default = "default_max_backtracks")]
    pub max_backtracks: usize,

    /// Log every iteration at info level (debug otherwise)
    #[serde(default)]
    pub monitor: bool,
}

fn default_atol() -> f64 {
    1e-10
}
fn default_rtol() -> f64 {
    1e-9
}
fn default_max_iterations() -> usize {
    30
}
fn default_max_backtracks() -> usize {
    8
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            atol: default_atol(),
            rtol: default_rtol(),
            max_iterations: default_max_iterations(),
            max_backtracks: default_max_backtracks(),
            monitor: false,
        }
    }
}

/// Solver settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Nonlinear solver
    #[serde(default)]
    pub newton: NewtonConfig,
}

impl SolverConfig {
    /// Check tolerances and budgets
    ///
    /// # Errors
    /// Non-positive tolerance or zero iteration budget
    pub fn validate(&self) -> Result<()> {
        let n = &self.newton;
        if !(n.atol > 0. && n.rtol > 0.) {
            return Err(FlowError::Configuration(format!(
                "newton tolerances must be positive, got atol={} rtol={}",
                n.atol, n.rtol
            )));
        }
        if n.max_iterations == 0 {
            return Err(FlowError::Configuration(
                "newton needs at least one iteration".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to build a flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Which flow
    #[serde(default)]
    pub kind: FlowKind,

    /// Reynolds number, defaults depend on the flow
    #[serde(default)]
    pub reynolds: Option<f64>,

    /// Built-in mesh resolution
    #[serde(default)]
    pub resolution: Resolution,

    /// Solver settings
    #[serde(default)]
    pub solver: SolverConfig,
}

impl FlowConfig {
    /// Default configuration of a flow kind
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Builder style Reynolds number
    pub fn with_reynolds(mut self, re: f64) -> Self {
        self.reynolds = Some(re);
        self
    }

    /// Builder style resolution
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Configured Reynolds number, or the flow's default
    pub fn reynolds(&self) -> f64 {
        self.reynolds.unwrap_or_else(|| self.kind.default_reynolds())
    }

    /// Read from json file
    ///
    /// # Errors
    /// Unreadable file or invalid json
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| FlowError::Configuration(format!("{:?}: {}", path.as_ref(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameters
    ///
    /// # Errors
    /// Invalid Reynolds number or solver settings
    pub fn validate(&self) -> Result<()> {
        check_reynolds(self.reynolds())?;
        self.solver.validate()
    }
}

/// Reynolds numbers must be positive and finite
pub(crate) fn check_reynolds(re: f64) -> Result<()> {
    if re.is_finite() && re > 0. {
        Ok(())
    } else {
        Err(FlowError::Configuration(format!(
            "Reynolds number must be positive, got {}",
            re
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: FlowConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.kind, FlowKind::Cylinder);
        assert_eq!(config.resolution, Resolution::Coarse);
        assert!((config.reynolds() - 100.).abs() < 1e-12);
        assert!(!config.solver.newton.monitor);
        config.validate().unwrap();
    }

    #[test]
    fn test_pinball_default_reynolds() {
        let config = FlowConfig::new(FlowKind::Pinball);
        assert!((config.reynolds() - 20.).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_reynolds() {
        let config = FlowConfig::new(FlowKind::Step).with_reynolds(-1.);
        assert!(matches!(config.validate(), Err(FlowError::Configuration(_))));
    }

    #[test]
    fn test_invalid_tolerance() {
        let mut config = FlowConfig::default();
        config.solver.newton.rtol = 0.;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.json");
        std::fs::write(
            &path,
            r#"{"kind": "pinball", "resolution": "medium", "solver": {"newton": {"monitor": true}}}"#,
        )
        .unwrap();
        let config = FlowConfig::from_file(&path).unwrap();
        assert_eq!(config.kind, FlowKind::Pinball);
        assert_eq!(config.resolution.refinement(), 2);
        assert!(config.solver.newton.monitor);
        assert_eq!(config.solver.newton.max_backtracks, 8);
    }
}
