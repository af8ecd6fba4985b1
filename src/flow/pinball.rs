//! # Fluidic pinball
//!
//! Three cylinders of diameter 1 on the corners of an equilateral-like
//! triangle pointing upstream. Lift and drag are observed on every body
//! separately; the configuration has no actuation.
use super::flow_eq::traction;
use super::{flow_io, Flow, FlowCore, Observation};
use crate::config::{FlowConfig, FlowKind, Resolution};
use crate::error::{FlowError, Result};
use crate::fem::{DirichletBc, MixedState};
use crate::mesh::{breaks, CircleBody, Lattice, Mesh, Tag};
use std::path::Path;
use std::sync::Arc;

/// Left boundary
pub const INLET: Tag = 1;
/// Top and bottom boundary
pub const FREESTREAM: Tag = 2;
/// Right boundary
pub const OUTLET: Tag = 3;
/// Front, top and bottom cylinder
pub const CYLINDER: [Tag; 3] = [4, 5, 6];

/// Cylinder radius
pub const RADIUS: f64 = 0.5;

const U_INF: [f64; 2] = [1., 0.];
const TOL: f64 = 1e-9;

/// Built-in mesh of `[-6, 10] x [-4, 4]` around the three cylinders
///
/// # Errors
/// Lattice construction failed
pub fn mesh(resolution: Resolution) -> Result<Mesh> {
    let r = resolution.refinement();
    let xs = breaks(&[(-6., -2., 4), (-2., 1., 24), (1., 3., 4), (3., 10., 7)], r);
    let ys = breaks(&[(-4., -1.5, 3), (-1.5, 1.5, 24), (1.5, 4., 3)], r);
    // (center, box)
    let bodies = [
        ([-1.25, 0.], [-1.875, -0.625, -0.625, 0.625]),
        ([0., 0.75], [-0.625, 0.625, 0.125, 1.375]),
        ([0., -0.75], [-0.625, 0.625, -1.375, -0.125]),
    ];
    let mut lattice = Lattice::new(xs, ys);
    for ((center, bbox), tag) in bodies.iter().zip(CYLINDER.iter()) {
        lattice = lattice.with_body(CircleBody {
            center: *center,
            radius: RADIUS,
            tag: *tag,
            bbox: *bbox,
            layers: 2 * r,
        });
    }
    lattice.build(|x| {
        if (x[0] + 6.).abs() < TOL {
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

#[derive(Debug, Clone)]
struct Bcs {
    inflow: DirichletBc,
    freestream: DirichletBc,
    cylinders: DirichletBc,
    outflow: DirichletBc,
}

/// Fluidic pinball
#[derive(Debug, Clone)]
pub struct Pinball {
    core: FlowCore,
    bcs: Option<Bcs>,
}

impl Pinball {
    /// Pinball on its built-in mesh
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(config: &FlowConfig) -> Result<Self> {
        Self::from_mesh(Arc::new(mesh(config.resolution)?), config)
    }

    /// Pinball on a given mesh
    ///
    /// # Errors
    /// Mesh lacks one of the boundary tags
    pub fn from_mesh(mesh: Arc<Mesh>, config: &FlowConfig) -> Result<Self> {
        mesh.require_tags(&[INLET, FREESTREAM, OUTLET])?;
        mesh.require_tags(&CYLINDER)?;
        Ok(Self {
            core: FlowCore::from_config(mesh, config)?,
            bcs: None,
        })
    }

    /// Rebuild from a checkpoint
    ///
    /// # Errors
    /// See [`crate::flow::FlowVariant::from_checkpoint`]
    pub fn from_checkpoint(path: &Path, config: &FlowConfig) -> Result<Self> {
        let config = FlowConfig {
            kind: FlowKind::Pinball,
            ..config.clone()
        };
        flow_io::restore(path, &config, Self::from_mesh)
    }
}

fn not_initialized() -> FlowError {
    FlowError::Configuration("pinball boundary conditions are not initialized".to_string())
}

impl Flow for Pinball {
    fn kind(&self) -> FlowKind {
        FlowKind::Pinball
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
            cylinders: DirichletBc::velocity("cylinders", space, v, &CYLINDER, |_| [0.; 2])?,
            outflow: DirichletBc::pressure("outflow", space, q, &[OUTLET], |_| 0.)?,
        });
        Ok(())
    }

    fn collect_bcu(&self) -> Result<Vec<&DirichletBc>> {
        let bcs = self.bcs.as_ref().ok_or_else(not_initialized)?;
        Ok(vec![&bcs.inflow, &bcs.freestream, &bcs.cylinders])
    }

    fn collect_bcp(&self) -> Result<Vec<&DirichletBc>> {
        let bcs = self.bcs.as_ref().ok_or_else(not_initialized)?;
        Ok(vec![&bcs.outflow])
    }

    fn observe(&self, state: &MixedState) -> Result<Observation> {
        self.core.check_state(state.as_array())?;
        let (lift, drag) = CYLINDER
            .iter()
            .map(|tag| {
                let f = traction(
                    self.core.space(),
                    state.as_array(),
                    self.core.reynolds(),
                    &[*tag],
                );
                (2. * f[1], 2. * f[0])
            })
            .unzip();
        Ok(Observation::Bodies { lift, drag })
    }

    fn set_control(&mut self, control: &[f64]) -> Result<()> {
        if control.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Configuration(format!(
                "pinball has no control channels, got {} values",
                control.len()
            )))
        }
    }

    fn reset_control(&mut self) -> Result<()> {
        Ok(())
    }

    fn linearize_bcs(&mut self) -> Result<()> {
        self.init_bcs(true)?;
        if let Some(bcs) = self.bcs.as_mut() {
            bcs.inflow.homogenize();
            bcs.freestream.homogenize();
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::flow::{Backend, FlowVariant};

    #[test]
    fn test_observation_per_body() {
        let flow = Pinball::new(&FlowConfig::new(FlowKind::Pinball)).unwrap();
        assert!((flow.reynolds() - 20.).abs() < 1e-14);
        match flow.collect_observations().unwrap() {
            Observation::Bodies { lift, drag } => {
                assert_eq!(lift.len(), CYLINDER.len());
                assert_eq!(drag.len(), CYLINDER.len());
            }
            other => panic!("unexpected observation {:?}", other),
        }
        let mesh = flow.core().mesh();
        assert_eq!(mesh.tags().len(), 3 + CYLINDER.len());
        for tag in CYLINDER.iter() {
            assert!(mesh.boundary_length(*tag) > 3.);
        }
    }

    #[test]
    fn test_steady_forces_per_body() {
        let mut flow = Pinball::new(&FlowConfig::new(FlowKind::Pinball)).unwrap();
        let base = flow.solve_steady().unwrap();
        let (lift, drag) = match flow.observe(&base).unwrap() {
            Observation::Bodies { lift, drag } => (lift, drag),
            other => panic!("unexpected observation {:?}", other),
        };
        for d in drag.iter() {
            assert!(d.is_finite() && *d > 0., "{:?}", drag);
        }
        // mirror symmetry about y = 0: opposite lift on the rear bodies,
        // almost none on the front body
        let [front, top, bottom] = [lift[0], lift[1], lift[2]];
        assert!(top * bottom < 0., "{:?}", lift);
        assert!(front.abs() < 0.5 * top.abs().min(bottom.abs()), "{:?}", lift);
        assert!((drag[0] - drag[1]).abs() > 1e-6, "{:?}", drag);

        // bodies add up to the force on all cylinders together
        let total = traction(
            flow.core().space(),
            base.as_array(),
            flow.reynolds(),
            &CYLINDER,
        );
        let sum_drag: f64 = drag.iter().sum();
        let sum_lift: f64 = lift.iter().sum();
        assert!((2. * total[0] - sum_drag).abs() < 1e-10 * sum_drag.abs().max(1.));
        assert!((2. * total[1] - sum_lift).abs() < 1e-10 * sum_drag.abs().max(1.));
    }

    #[test]
    fn test_no_controls() {
        let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Pinball)).unwrap();
        assert_eq!(flow.num_controls(), 0);
        assert!(flow.control().is_empty());
        assert!(flow.set_control(&[]).is_ok());
        assert!(matches!(
            flow.set_control(&[1.]),
            Err(FlowError::Configuration(_))
        ));
        let base = flow.state().clone();
        assert!(matches!(
            flow.linearize(&base, true, Backend::Sparse),
            Err(FlowError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            flow.control_sensitivity(0),
            Err(FlowError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_collect_bcs_order() {
        let mut flow = Pinball::new(&FlowConfig::new(FlowKind::Pinball)).unwrap();
        flow.init_bcs(true).unwrap();
        let names: Vec<&str> = flow.collect_bcs().unwrap().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["inflow", "freestream", "cylinders", "outflow"]);
    }
}
