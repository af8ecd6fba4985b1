//! # Backward-facing step
//!
//! Channel flow over a step of height 0.5. The inlet channel spans
//! `y in [0, 1]` for `x < 0`, downstream the domain widens to
//! `y in [-0.5, 1]`. A slot in the upstream floor just before the step edge
//! blows (or sucks) wall-normal with a parabolic profile of amplitude `c`.
//! The observation is the streamwise force on the lower wall downstream of
//! the step.
use super::flow_eq::traction;
use super::{flow_io, Flow, FlowCore, Observation};
use crate::config::{FlowConfig, FlowKind, Resolution};
use crate::error::{FlowError, Result};
use crate::fem::{DirichletBc, MixedState};
use crate::mesh::{breaks, Lattice, Mesh, Tag};
use ndarray::Array1;
use std::path::Path;
use std::sync::Arc;

/// Left boundary of the inlet channel
pub const INLET: Tag = 1;
/// Right boundary
pub const OUTLET: Tag = 2;
/// Top wall, upstream floor and step face
pub const WALL: Tag = 3;
/// Lower wall downstream of the step
pub const BOTTOM: Tag = 4;
/// Actuation slot
pub const CONTROL: Tag = 5;

/// Slot `[x0, x1]` on `y = 0`
pub const SLOT: [f64; 2] = [-0.5, 0.];

const TOL: f64 = 1e-9;

/// Built-in mesh of the step geometry, `x in [-2, 8]`
///
/// # Errors
/// Lattice construction failed
pub fn mesh(resolution: Resolution) -> Result<Mesh> {
    let r = resolution.refinement();
    let xs = breaks(&[(-2., 0., 4), (0., 2., 8), (2., 8., 12)], r);
    let ys = breaks(&[(-0.5, 0., 2), (0., 1., 4)], r);
    Lattice::new(xs, ys)
        .with_solid([-2., 0., -0.5, 0.])
        .build(|x| {
            if (x[0] + 2.).abs() < TOL {
                Some(INLET)
            } else if (x[0] - 8.).abs() < TOL {
                Some(OUTLET)
            } else if (x[1] - 1.).abs() < TOL {
                Some(WALL)
            } else if (x[1] + 0.5).abs() < TOL {
                Some(BOTTOM)
            } else if x[1].abs() < TOL {
                if x[0] > SLOT[0] && x[0] < SLOT[1] {
                    Some(CONTROL)
                } else {
                    Some(WALL)
                }
            } else if x[0].abs() < TOL {
                Some(WALL)
            } else {
                None
            }
        })
}

fn inflow(x: [f64; 2]) -> [f64; 2] {
    [4. * x[1] * (1. - x[1]), 0.]
}

/// Blowing velocity through the slot for amplitude `c`
fn blowing(c: f64) -> impl Fn([f64; 2]) -> [f64; 2] {
    move |x| {
        let s = (x[0] - SLOT[0]) / (SLOT[1] - SLOT[0]);
        [0., c * 4. * s * (1. - s)]
    }
}

#[derive(Debug, Clone)]
struct Bcs {
    inflow: DirichletBc,
    noslip: DirichletBc,
    actuation: DirichletBc,
    outflow: DirichletBc,
}

/// Backward-facing step
#[derive(Debug, Clone)]
pub struct Step {
    core: FlowCore,
    amplitude: f64,
    bcs: Option<Bcs>,
}

impl Step {
    /// Step on its built-in mesh
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(config: &FlowConfig) -> Result<Self> {
        Self::from_mesh(Arc::new(mesh(config.resolution)?), config)
    }

    /// Step on a given mesh
    ///
    /// # Errors
    /// Mesh lacks one of the boundary tags
    pub fn from_mesh(mesh: Arc<Mesh>, config: &FlowConfig) -> Result<Self> {
        mesh.require_tags(&[INLET, OUTLET, WALL, BOTTOM, CONTROL])?;
        Ok(Self {
            core: FlowCore::from_config(mesh, config)?,
            amplitude: 0.,
            bcs: None,
        })
    }

    /// Rebuild from a checkpoint
    ///
    /// # Errors
    /// See [`crate::flow::FlowVariant::from_checkpoint`]
    pub fn from_checkpoint(path: &Path, config: &FlowConfig) -> Result<Self> {
        let config = FlowConfig {
            kind: FlowKind::Step,
            ..config.clone()
        };
        flow_io::restore(path, &config, Self::from_mesh)
    }
}

fn not_initialized() -> FlowError {
    FlowError::Configuration("step boundary conditions are not initialized".to_string())
}

impl Flow for Step {
    fn kind(&self) -> FlowKind {
        FlowKind::Step
    }

    fn core(&self) -> &FlowCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FlowCore {
        &mut self.core
    }

    fn init_bcs(&mut self, mixed: bool) -> Result<()> {
        let space = self.core.space();
        let (v, q) = space.function_spaces(mixed);
        self.bcs = Some(Bcs {
            inflow: DirichletBc::velocity("inflow", space, v, &[INLET], inflow)?,
            noslip: DirichletBc::velocity("noslip", space, v, &[WALL, BOTTOM], |_| [0.; 2])?,
            actuation: DirichletBc::velocity(
                "control",
                space,
                v,
                &[CONTROL],
                blowing(self.amplitude),
            )?,
            outflow: DirichletBc::pressure("outflow", space, q, &[OUTLET], |_| 0.)?,
        });
        Ok(())
    }

    fn collect_bcu(&self) -> Result<Vec<&DirichletBc>> {
        let bcs = self.bcs.as_ref().ok_or_else(not_initialized)?;
        Ok(vec![&bcs.inflow, &bcs.noslip, &bcs.actuation])
    }

    fn collect_bcp(&self) -> Result<Vec<&DirichletBc>> {
        let bcs = self.bcs.as_ref().ok_or_else(not_initialized)?;
        Ok(vec![&bcs.outflow])
    }

    fn observe(&self, state: &MixedState) -> Result<Observation> {
        self.core.check_state(state.as_array())?;
        let f = traction(
            self.core.space(),
            state.as_array(),
            self.core.reynolds(),
            &[BOTTOM],
        );
        Ok(Observation::Scalars(vec![f[0]]))
    }

    fn num_controls(&self) -> usize {
        1
    }

    fn control(&self) -> Vec<f64> {
        vec![self.amplitude]
    }

    fn set_control(&mut self, control: &[f64]) -> Result<()> {
        match control {
            [c] => {
                self.amplitude = *c;
                if let Some(bcs) = self.bcs.as_mut() {
                    bcs.actuation.set_velocity(blowing(*c));
                }
                Ok(())
            }
            _ => Err(FlowError::Configuration(format!(
                "step takes one control value, got {}",
                control.len()
            ))),
        }
    }

    fn reset_control(&mut self) -> Result<()> {
        self.set_control(&[0.])
    }

    fn linearize_bcs(&mut self) -> Result<()> {
        self.amplitude = 0.;
        self.init_bcs(true)?;
        if let Some(bcs) = self.bcs.as_mut() {
            bcs.inflow.homogenize();
        }
        Ok(())
    }

    fn control_lift(&self, index: usize) -> Result<Array1<f64>> {
        if index != 0 {
            return Err(FlowError::UnsupportedOperation(format!(
                "step has no control channel {}",
                index
            )));
        }
        let space = self.core.space();
        let (v, _) = space.function_spaces(true);
        let unit = DirichletBc::velocity("control", space, v, &[CONTROL], blowing(1.))?;
        let mut lift = Array1::zeros(space.len());
        for (i, value) in unit.constraints() {
            lift[i] = value;
        }
        Ok(lift)
    }
}
