//! # Flow past a rotating cylinder
//!
//! Uniform inflow `U = (1, 0)` past a cylinder of diameter 1 centered at
//! the origin. The cylinder rotates with rate $\omega$, which is the only
//! control channel. Observations are lift and drag coefficients
//! $$
//! C_L = 2 \int f_y, \quad C_D = 2 \int f_x, \quad f = -\sigma(u, p) \cdot n
//! $$
//! over the cylinder surface.
use super::flow_eq::traction;
use super::{flow_io, Flow, FlowCore, Observation};
use crate::config::{FlowConfig, FlowKind, Resolution};
use crate::error::{FlowError, Result};
use crate::fem::{DirichletBc, MixedState};
use crate::mesh::{breaks, CircleBody, Lattice, Mesh, Tag};
use ndarray::Array1;
use std::path::Path;
use std::sync::Arc;

/// Left boundary
pub const INLET: Tag = 1;
/// Top and bottom boundary
pub const FREESTREAM: Tag = 2;
/// Right boundary
pub const OUTLET: Tag = 3;
/// Cylinder surface
pub const CYLINDER: Tag = 4;

/// Cylinder radius
pub const RADIUS: f64 = 0.5;
/// Bound of [`Cylinder::clamp`]
pub const MAX_CONTROL: f64 = std::f64::consts::FRAC_PI_2;

const U_INF: [f64; 2] = [1., 0.];
const TOL: f64 = 1e-9;

/// Built-in mesh of `[-4, 10] x [-4, 4]` around the cylinder
///
/// # Errors
/// Lattice construction failed
pub fn mesh(resolution: Resolution) -> Result<Mesh> {
    let r = resolution.refinement();
    let xs = breaks(&[(-4., -1.5, 3), (-1.5, 1.5, 12), (1.5, 4., 5), (4., 10., 6)], r);
    let ys = breaks(&[(-4., -1.5, 3), (-1.5, 1.5, 12), (1.5, 4., 3)], r);
    Lattice::new(xs, ys)
        .with_body(CircleBody {
            center: [0., 0.],
            radius: RADIUS,
            tag: CYLINDER,
            bbox: [-0.75, 0.75, -0.75, 0.75],
            layers: 2 * r,
        })
        .build(|x| {
            if (x[0] + 4.).abs() < TOL {
                Some(INLET)
            } else if (x[0] - 10.).abs() < TOL {
                Some(OUTLET)
            } else if (x[1].abs() - 4.).abs() < TOL {
                Some(FREESTREAM)
            } else {
                None
            }
        })
}

/// Surface velocity of a cylinder rotating with rate `omega`
fn tangential(omega: f64) -> impl Fn([f64; 2]) -> [f64; 2] {
    move |x| {
        let theta = x[1].atan2(x[0]);
        [-omega * RADIUS * theta.sin(), omega * RADIUS * theta.cos()]
    }
}

#[derive(Debug, Clone)]
struct Bcs {
    inflow: DirichletBc,
    freestream: DirichletBc,
    cylinder: DirichletBc,
    outflow: DirichletBc,
}

/// Rotating cylinder
#[derive(Debug, Clone)]
pub struct Cylinder {
    core: FlowCore,
    omega: f64,
    bcs: Option<Bcs>,
}

impl Cylinder {
    /// Cylinder on its built-in mesh
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(config: &FlowConfig) -> Result<Self> {
        Self::from_mesh(Arc::new(mesh(config.resolution)?), config)
    }

    /// Cylinder on a given mesh
    ///
    /// # Errors
    /// Mesh lacks one of the boundary tags
    pub fn from_mesh(mesh: Arc<Mesh>, config: &FlowConfig) -> Result<Self> {
        mesh.require_tags(&[INLET, FREESTREAM, OUTLET, CYLINDER])?;
        Ok(Self {
            core: FlowCore::from_config(mesh, config)?,
            omega: 0.,
            bcs: None,
        })
    }

    /// Rebuild from a checkpoint
    ///
    /// # Errors
    /// See [`crate::flow::FlowVariant::from_checkpoint`]
    pub fn from_checkpoint(path: &Path, config: &FlowConfig) -> Result<Self> {
        let config = FlowConfig {
            kind: FlowKind::Cylinder,
            ..config.clone()
        };
        flow_io::restore(path, &config, Self::from_mesh)
    }

    /// Rotation rate
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Limit a rotation rate to `[-MAX_CONTROL, MAX_CONTROL]`
    pub fn clamp(omega: f64) -> f64 {
        omega.clamp(-MAX_CONTROL, MAX_CONTROL)
    }

    /// Rebind the cylinder boundary values to the current rotation rate
    ///
    /// # Errors
    /// Boundary conditions were not initialized
    pub fn update_rotation(&mut self) -> Result<()> {
        let bcs = self.bcs.as_mut().ok_or_else(not_initialized)?;
        bcs.cylinder.set_velocity(tangential(self.omega));
        Ok(())
    }
}

fn not_initialized() -> FlowError {
    FlowError::Configuration("cylinder boundary conditions are not initialized".to_string())
}

impl Flow for Cylinder {
    fn kind(&self) -> FlowKind {
        FlowKind::Cylinder
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
            inflow: DirichletBc::velocity("inflow", space, v, &[INLET], |_| U_INF)?,
            freestream: DirichletBc::velocity("freestream", space, v, &[FREESTREAM], |_| U_INF)?,
            cylinder: DirichletBc::velocity("cylinder", space, v, &[CYLINDER], |_| [0.; 2])?,
            outflow: DirichletBc::pressure("outflow", space, q, &[OUTLET], |_| 0.)?,
        });
        self.update_rotation()
    }

    fn collect_bcu(&self) -> Result<Vec<&DirichletBc>> {
        let bcs = self.bcs.as_ref().ok_or_else(not_initialized)?;
        Ok(vec![&bcs.inflow, &bcs.freestream, &bcs.cylinder])
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
            &[CYLINDER],
        );
        Ok(Observation::Scalars(vec![2. * f[1], 2. * f[0]]))
    }

    fn num_controls(&self) -> usize {
        1
    }

    fn control(&self) -> Vec<f64> {
        vec![self.omega]
    }

    fn set_control(&mut self, control: &[f64]) -> Result<()> {
        match control {
            [omega] => {
                self.omega = *omega;
                if self.bcs.is_some() {
                    self.update_rotation()?;
                }
                Ok(())
            }
            _ => Err(FlowError::Configuration(format!(
                "cylinder takes one control value, got {}",
                control.len()
            ))),
        }
    }

    fn reset_control(&mut self) -> Result<()> {
        self.set_control(&[0.])
    }

    fn linearize_bcs(&mut self) -> Result<()> {
        self.omega = 0.;
        self.init_bcs(true)?;
        if let Some(bcs) = self.bcs.as_mut() {
            bcs.inflow.homogenize();
            bcs.freestream.homogenize();
        }
        Ok(())
    }

    fn control_lift(&self, index: usize) -> Result<Array1<f64>> {
        if index != 0 {
            return Err(FlowError::UnsupportedOperation(format!(
                "cylinder has no control channel {}",
                index
            )));
        }
        let space = self.core.space();
        let (v, _) = space.function_spaces(true);
        let unit = DirichletBc::velocity("cylinder", space, v, &[CYLINDER], tangential(1.))?;
        let mut lift = Array1::zeros(space.len());
        for (i, value) in unit.constraints() {
            lift[i] = value;
        }
        Ok(lift)
    }
}
