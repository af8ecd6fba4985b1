//! # Flow configurations
//!
//! A flow owns a mesh, the mixed Taylor-Hood space over it and the current
//! state. The [`Flow`] trait is the capability set shared by all
//! configurations; [`FlowVariant`] selects one of them at run time.
//!
//! ```no_run
//! use flowctl::config::{FlowConfig, FlowKind};
//! use flowctl::flow::{Flow, FlowVariant};
//!
//! let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Cylinder)).unwrap();
//! flow.solve_steady().unwrap();
//! println!("{:?}", flow.collect_observations().unwrap());
//! ```
pub mod continuation;
pub mod cylinder;
pub mod flow_eq;
pub mod flow_io;
pub mod functions;
pub mod linearize;
pub mod pinball;
pub mod step;
pub mod transient;
pub use continuation::ramp_reynolds;
pub use cylinder::Cylinder;
pub use functions::NamedField;
pub use linearize::{Backend, LinearSystem, Operator};
pub use pinball::Pinball;
pub use step::Step;
pub use transient::Transient;

use crate::config::{check_reynolds, FlowConfig, FlowKind, SolverConfig};
use crate::error::{FlowError, Result};
use crate::fem::{Constraints, DirichletBc, MixedSpace, MixedState, Velocity};
use crate::mesh::Mesh;
use crate::solver::{newton, CsrMatrix, NonlinearProblem, Solve, SparseLu};
use ndarray::prelude::*;
use std::path::Path;
use std::sync::Arc;

/// Measured output of a flow
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Fixed number of scalars
    Scalars(Vec<f64>),
    /// Lift and drag coefficient of every body
    Bodies {
        /// Lift per body
        lift: Vec<f64>,
        /// Drag per body
        drag: Vec<f64>,
    },
}

impl Observation {
    /// All values in one vector, lifts before drags
    pub fn flatten(&self) -> Vec<f64> {
        match self {
            Self::Scalars(v) => v.clone(),
            Self::Bodies { lift, drag } => lift.iter().chain(drag.iter()).copied().collect(),
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            Self::Scalars(v) => v.len(),
            Self::Bodies { lift, drag } => lift.len() + drag.len(),
        }
    }

    /// No values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response of the steady state to a unit change of one control channel
#[derive(Debug, Clone)]
pub struct Sensitivity {
    /// Derivative of the state
    pub state: MixedState,
    /// Derivative of the observations
    pub observation: Vec<f64>,
}

/// Mesh, spaces, state and parameters shared by all flows
#[derive(Debug, Clone)]
pub struct FlowCore {
    space: MixedSpace,
    state: MixedState,
    reynolds: f64,
    /// Solver settings
    pub solver: SolverConfig,
}

impl FlowCore {
    /// Build spaces over `mesh` with a zero state
    ///
    /// # Errors
    /// Invalid Reynolds number or solver settings
    pub fn new(mesh: Arc<Mesh>, reynolds: f64, solver: SolverConfig) -> Result<Self> {
        check_reynolds(reynolds)?;
        solver.validate()?;
        let space = MixedSpace::new(mesh);
        let state = MixedState::zeros(&space);
        Ok(Self {
            space,
            state,
            reynolds,
            solver,
        })
    }

    /// Build from configuration
    ///
    /// # Errors
    /// See [`FlowCore::new`]
    pub fn from_config(mesh: Arc<Mesh>, config: &FlowConfig) -> Result<Self> {
        Self::new(mesh, config.reynolds(), config.solver.clone())
    }

    /// Mixed space
    pub fn space(&self) -> &MixedSpace {
        &self.space
    }

    /// Mesh
    pub fn mesh(&self) -> &Arc<Mesh> {
        self.space.mesh()
    }

    /// Current state
    pub fn state(&self) -> &MixedState {
        &self.state
    }

    /// Velocity view of the current state
    pub fn velocity(&self) -> Velocity<'_> {
        self.state.velocity()
    }

    /// Pressure view of the current state
    pub fn pressure(&self) -> ArrayView1<'_, f64> {
        self.state.pressure()
    }

    /// Reynolds number
    pub fn reynolds(&self) -> f64 {
        self.reynolds
    }

    /// Change the Reynolds number in place
    ///
    /// # Errors
    /// Non-positive or non-finite value
    pub fn set_reynolds(&mut self, re: f64) -> Result<()> {
        check_reynolds(re)?;
        self.reynolds = re;
        Ok(())
    }

    /// Replace the state
    ///
    /// # Errors
    /// State does not belong to this space
    pub fn commit_state(&mut self, state: MixedState) -> Result<()> {
        self.check_state(state.as_array())?;
        self.state = state;
        Ok(())
    }

    /// Fails unless `q` has the size of the space
    ///
    /// # Errors
    /// Size mismatch
    pub fn check_state(&self, q: &Array1<f64>) -> Result<()> {
        if q.len() == self.space.len() {
            Ok(())
        } else {
            Err(FlowError::Configuration(format!(
                "state of size {} does not fit space of size {}",
                q.len(),
                self.space.len()
            )))
        }
    }

    /// Replace the coefficients of the state
    ///
    /// # Errors
    /// Wrong length
    pub fn commit_array(&mut self, q: Array1<f64>) -> Result<()> {
        let state = MixedState::from_array(&self.space, q)?;
        self.commit_state(state)
    }

    pub(crate) fn state_mut(&mut self) -> &mut MixedState {
        &mut self.state
    }
}

/// Steady equations with Dirichlet rows replaced by `q_i - g_i`
pub(crate) struct SteadyProblem<'a> {
    pub space: &'a MixedSpace,
    pub reynolds: f64,
    pub constraints: &'a Constraints,
}

impl NonlinearProblem for SteadyProblem<'_> {
    fn residual(&self, q: &Array1<f64>) -> Array1<f64> {
        let mut r = flow_eq::steady_residual(self.space, q, self.reynolds);
        self.constraints.replace_residual(&mut r, q);
        r
    }

    fn jacobian(&self, q: &Array1<f64>) -> CsrMatrix {
        flow_eq::steady_jacobian(self.space, q, self.reynolds)
            .with_identity_rows(self.constraints.mask())
    }
}

/// Capabilities every flow configuration provides
#[enum_dispatch]
pub trait Flow {
    /// Which configuration
    fn kind(&self) -> FlowKind;

    /// Shared data
    fn core(&self) -> &FlowCore;

    /// Shared data, mutable
    fn core_mut(&mut self) -> &mut FlowCore;

    /// (Re)create the boundary conditions, addressed into the mixed space
    /// (`mixed = true`) or into standalone velocity/pressure spaces.
    ///
    /// # Errors
    /// Missing boundary regions
    fn init_bcs(&mut self, mixed: bool) -> Result<()>;

    /// Velocity boundary conditions, in application order
    ///
    /// # Errors
    /// Not provided by this flow, or not initialized
    fn collect_bcu(&self) -> Result<Vec<&DirichletBc>> {
        Err(FlowError::NotImplemented(format!(
            "{} does not define velocity boundary conditions",
            self.kind().name()
        )))
    }

    /// Pressure boundary conditions, in application order
    ///
    /// # Errors
    /// Not provided by this flow, or not initialized
    fn collect_bcp(&self) -> Result<Vec<&DirichletBc>> {
        Err(FlowError::NotImplemented(format!(
            "{} does not define pressure boundary conditions",
            self.kind().name()
        )))
    }

    /// Velocity conditions followed by pressure conditions
    ///
    /// # Errors
    /// See [`Flow::collect_bcu`]
    fn collect_bcs(&self) -> Result<Vec<&DirichletBc>> {
        let mut bcs = self.collect_bcu()?;
        bcs.extend(self.collect_bcp()?);
        Ok(bcs)
    }

    /// Observations of an arbitrary state under the current control
    ///
    /// # Errors
    /// State does not belong to this flow
    fn observe(&self, state: &MixedState) -> Result<Observation>;

    /// Observations of the current state
    ///
    /// # Errors
    /// See [`Flow::observe`]
    fn collect_observations(&self) -> Result<Observation> {
        self.observe(self.core().state())
    }

    /// Number of control channels
    fn num_controls(&self) -> usize {
        0
    }

    /// Current control values
    fn control(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Set actuation, one value per channel. Values are not clamped.
    ///
    /// # Errors
    /// Wrong number of values
    fn set_control(&mut self, control: &[f64]) -> Result<()>;

    /// Back to the unactuated configuration
    ///
    /// # Errors
    /// Boundary conditions cannot be rebuilt
    fn reset_control(&mut self) -> Result<()>;

    /// Replace the boundary conditions by those of the perturbation
    /// equations (zero actuation, homogeneous far field)
    ///
    /// # Errors
    /// Boundary conditions cannot be rebuilt
    fn linearize_bcs(&mut self) -> Result<()>;

    /// Boundary values of a unit actuation of channel `index`, zero elsewhere
    ///
    /// # Errors
    /// Flow has no such channel
    fn control_lift(&self, index: usize) -> Result<Array1<f64>> {
        Err(FlowError::UnsupportedOperation(format!(
            "{} has no control channel {}",
            self.kind().name(),
            index
        )))
    }

    /// Reynolds number
    fn reynolds(&self) -> f64 {
        self.core().reynolds()
    }

    /// Change the Reynolds number in place
    ///
    /// # Errors
    /// Non-positive value
    fn set_reynolds(&mut self, re: f64) -> Result<()> {
        self.core_mut().set_reynolds(re)
    }

    /// Current state
    fn state(&self) -> &MixedState {
        self.core().state()
    }

    /// Replace the current state
    ///
    /// # Errors
    /// State does not belong to this flow
    fn assign_state(&mut self, state: MixedState) -> Result<()> {
        self.core_mut().commit_state(state)
    }

    /// Steady weak residual of `state`, without boundary conditions
    fn steady_residual(&self, state: &MixedState) -> Array1<f64> {
        let core = self.core();
        flow_eq::steady_residual(core.space(), state.as_array(), core.reynolds())
    }

    /// Solve the steady equations with Newton's method, starting from the
    /// current state. On success the solution becomes the current state and a
    /// copy of it is returned; on failure the current state is unchanged.
    ///
    /// # Errors
    /// `ConvergenceError` if Newton fails
    fn solve_steady(&mut self) -> Result<MixedState> {
        self.init_bcs(true)?;
        let constraints = {
            let bcs = self.collect_bcs()?;
            Constraints::new(self.core().space().len(), &bcs)
        };
        let core = self.core_mut();
        let mut q0 = core.state().as_array().clone();
        constraints.apply(&mut q0);
        let problem = SteadyProblem {
            space: core.space(),
            reynolds: core.reynolds(),
            constraints: &constraints,
        };
        let report = newton(&problem, q0, &core.solver.newton)?;
        tracing::info!(
            reynolds = core.reynolds(),
            iterations = report.iterations,
            residual = report.residual,
            "steady state converged"
        );
        core.commit_array(report.q)?;
        Ok(core.state().clone())
    }

    /// Linear operator and mass of the perturbation equations around `base`
    /// $$
    /// L = -\frac{\partial F}{\partial q}(q_B), \quad M = \int u \cdot v
    /// $$
    /// No boundary conditions are applied.
    ///
    /// # Errors
    /// `base` does not belong to this flow
    fn linearized_forms(&self, base: &MixedState) -> Result<(CsrMatrix, CsrMatrix)> {
        linearize::linearized_forms(self.core(), base)
    }

    /// Control input vector of channel `index` around `base`
    ///
    /// # Errors
    /// No such channel
    fn linearize_control(&mut self, base: &MixedState, index: usize) -> Result<Array1<f64>> {
        linearize::linearize_control(self, base, index)
    }

    /// Matrices `(M, A[, B])` of the linearized dynamics `M dq/dt = A q + B c`
    ///
    /// # Errors
    /// `UnsupportedOperation` when `control` is requested on a flow without
    /// control channels
    fn linearize(
        &mut self,
        base: &MixedState,
        control: bool,
        backend: Backend,
    ) -> Result<LinearSystem> {
        linearize::linearize(self, base, control, backend)
    }

    /// Tangent sensitivity of the steady state at the current state with
    /// respect to control channel `index`. Observations are linear functionals
    /// of the state, so their derivative is the observation of the state
    /// derivative.
    ///
    /// # Errors
    /// No such channel or singular Jacobian
    fn control_sensitivity(&mut self, index: usize) -> Result<Sensitivity> {
        let lift = self.control_lift(index)?;
        self.init_bcs(true)?;
        let constraints = {
            let bcs = self.collect_bcs()?;
            Constraints::new(self.core().space().len(), &bcs)
        };
        let core = self.core();
        let jac = flow_eq::steady_jacobian(core.space(), core.state().as_array(), core.reynolds())
            .with_identity_rows(constraints.mask());
        let mut rhs = Array1::zeros(lift.len());
        for i in constraints.dofs() {
            rhs[i] = lift[i];
        }
        let dq = SparseLu::from_matrix(&jac)?.solve_vec(&rhs);
        let state = MixedState::from_array(core.space(), dq)?;
        let observation = self.observe(&state)?.flatten();
        Ok(Sensitivity { state, observation })
    }

    /// Vorticity projected onto the pressure space
    ///
    /// # Errors
    /// Singular mass matrix
    fn vorticity(&self) -> Result<NamedField> {
        functions::vorticity(self.core().space(), self.core().state())
    }

    /// Largest Courant number of the current velocity for time step `dt`
    fn max_cfl(&self, dt: f64) -> f64 {
        functions::max_cfl(self.core().space(), self.core().state(), dt)
    }

    /// Kinetic energy of the current velocity
    fn kinetic_energy(&self) -> f64 {
        functions::kinetic_energy(self.core().space(), self.core().state())
    }

    /// Kinetic energy of the deviation of the current velocity from `base`
    ///
    /// # Errors
    /// `base` does not belong to this flow
    fn fluctuation_energy(&self, base: &MixedState) -> Result<f64> {
        functions::fluctuation_energy(self.core().space(), self.core().state(), base)
    }

    /// Add uniform noise in `[-amp, amp]` to the unconstrained velocity
    ///
    /// # Errors
    /// Boundary conditions cannot be built
    fn random_disturbance(&mut self, amp: f64) -> Result<()> {
        functions::random_disturbance(self, amp)
    }

    /// Write mesh, state and parameters to `path`
    ///
    /// # Errors
    /// I/O failure
    fn save_checkpoint(&self, path: &Path) -> Result<()> {
        flow_io::save_checkpoint(self, path)
    }
}

/// Flow configuration selected at run time
#[enum_dispatch(Flow)]
#[derive(Debug, Clone)]
pub enum FlowVariant {
    /// Rotating cylinder
    Cylinder(Cylinder),
    /// Fluidic pinball
    Pinball(Pinball),
    /// Backward-facing step
    Step(Step),
}

impl FlowVariant {
    /// Build the configured flow on its built-in mesh
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(config: &FlowConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config.kind {
            FlowKind::Cylinder => Cylinder::new(config)?.into(),
            FlowKind::Pinball => Pinball::new(config)?.into(),
            FlowKind::Step => Step::new(config)?.into(),
        })
    }

    /// Build the configured flow on a given mesh
    ///
    /// # Errors
    /// Mesh lacks boundary tags of the flow
    pub fn from_mesh(mesh: Arc<Mesh>, config: &FlowConfig) -> Result<Self> {
        Ok(match config.kind {
            FlowKind::Cylinder => Cylinder::from_mesh(mesh, config)?.into(),
            FlowKind::Pinball => Pinball::from_mesh(mesh, config)?.into(),
            FlowKind::Step => Step::from_mesh(mesh, config)?.into(),
        })
    }

    /// Rebuild a flow from a checkpoint
    ///
    /// # Errors
    /// Unreadable checkpoint or mismatching flow kind, mesh or state
    pub fn from_checkpoint(path: &Path, config: &FlowConfig) -> Result<Self> {
        flow_io::restore(path, config, Self::from_mesh)
    }

    /// Rebuild whatever flow the checkpoint holds; `config.kind` is ignored
    ///
    /// # Errors
    /// Unreadable checkpoint or mismatching mesh or state
    pub fn restart(path: &Path, config: &FlowConfig) -> Result<Self> {
        flow_io::restore_any(path, config, Self::from_mesh)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_observation_flatten() {
        let obs = Observation::Bodies {
            lift: vec![1., 2.],
            drag: vec![3., 4.],
        };
        assert_eq!(obs.flatten(), vec![1., 2., 3., 4.]);
        assert_eq!(obs.len(), 4);
        assert!(Observation::Scalars(vec![]).is_empty());
    }

    #[test]
    fn test_variant_dispatch() {
        let flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        assert_eq!(flow.kind(), FlowKind::Step);
        assert_eq!(flow.num_controls(), 1);
        assert!((flow.reynolds() - 100.).abs() < 1e-12);
    }

    #[test]
    fn test_set_reynolds_in_place() {
        let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        flow.set_reynolds(150.).unwrap();
        assert!((flow.reynolds() - 150.).abs() < 1e-12);
        assert!(flow.set_reynolds(0.).is_err());
    }
}
