//! # Time integration
//!
//! Linearly implicit Euler: the residual is linearized around the current
//! state,
//! $$
//! \left(\frac{M}{\Delta t} + J(q_n)\right) \delta = -F(q_n), \quad
//! q_{n+1} = q_n + \delta,
//! $$
//! with Dirichlet rows replaced by $\delta_i = g_i - q_{n,i}$. Boundary
//! conditions are rebuilt every step, so control changes between steps act
//! on the next one.
use super::flow_eq::{assemble_steady, velocity_mass};
use super::{Flow, Observation};
use crate::callbacks::Callback;
use crate::error::{FlowError, Result};
use crate::fem::Constraints;
use crate::solver::{CsrMatrix, Solve, SparseLu};
use crate::Integrate;

/// Feedback law `(time, observation) -> control`
pub type Controller = Box<dyn FnMut(f64, &Observation) -> Vec<f64>>;

/// Time stepper around a flow
pub struct Transient<F: Flow> {
    flow: F,
    time: f64,
    dt: f64,
    iteration: usize,
    mass: CsrMatrix,
    callbacks: Vec<Box<dyn Callback<F>>>,
    controller: Option<Controller>,
}

impl<F: Flow> Transient<F> {
    /// Stepper with time step `dt`, starting at `t = 0` from the current
    /// state of `flow`
    ///
    /// # Errors
    /// Non-positive time step
    pub fn new(flow: F, dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.) {
            return Err(FlowError::Configuration(format!(
                "time step must be positive, got {}",
                dt
            )));
        }
        let mass = velocity_mass(flow.core().space());
        Ok(Self {
            flow,
            time: 0.,
            dt,
            iteration: 0,
            mass,
            callbacks: Vec::new(),
            controller: None,
        })
    }

    /// Register a callback
    pub fn add_callback(&mut self, callback: Box<dyn Callback<F>>) {
        self.callbacks.push(callback);
    }

    /// Apply `controller` before every step
    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = Some(controller);
        self
    }

    /// The flow
    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// The flow, mutable (e.g. to set a control)
    pub fn flow_mut(&mut self) -> &mut F {
        &mut self.flow
    }

    /// Release the flow
    pub fn into_flow(self) -> F {
        self.flow
    }

    /// Steps taken
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Advance one step
    ///
    /// # Errors
    /// Boundary conditions cannot be built or the step matrix is singular
    pub fn step(&mut self) -> Result<()> {
        if let Some(controller) = self.controller.as_mut() {
            let obs = self.flow.collect_observations()?;
            let control = controller(self.time, &obs);
            self.flow.set_control(&control)?;
        }
        self.flow.init_bcs(true)?;
        let constraints = {
            let bcs = self.flow.collect_bcs()?;
            Constraints::new(self.flow.core().space().len(), &bcs)
        };
        let core = self.flow.core();
        let q = core.state().as_array();
        let (r, jac) = assemble_steady(core.space(), q, core.reynolds(), true);
        let jac = jac.ok_or_else(|| FlowError::singular("jacobian was not assembled"))?;
        let lhs = self
            .mass
            .add_scaled(1. / self.dt, &jac, 1.)
            .with_identity_rows(constraints.mask());
        let mut rhs = -r;
        let g = constraints.values();
        for i in constraints.dofs() {
            rhs[i] = g[i] - q[i];
        }
        let delta = SparseLu::from_matrix(&lhs)?.solve_vec(&rhs);
        let next = q + &delta;
        self.flow.core_mut().commit_array(next)?;
        self.time += self.dt;
        self.iteration += 1;
        Ok(())
    }
}

impl<F: Flow> Integrate for Transient<F> {
    fn update(&mut self) -> Result<()> {
        self.step()
    }

    fn get_time(&self) -> f64 {
        self.time
    }

    fn get_dt(&self) -> f64 {
        self.dt
    }

    fn callback(&mut self) -> Result<()> {
        for cb in &mut self.callbacks {
            if cb.is_due(self.iteration) {
                cb.call(self.iteration, self.time, &self.flow)?;
            }
        }
        Ok(())
    }

    fn exit(&mut self) -> bool {
        let finite = self.flow.state().as_array().iter().all(|v| v.is_finite());
        if !finite {
            tracing::warn!(time = self.time, "state is not finite");
        }
        !finite
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{FlowConfig, FlowKind};
    use crate::flow::{Cylinder, Step};
    use crate::integrate;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Record(Rc<RefCell<Vec<usize>>>);

    impl<F: Flow> Callback<F> for Record {
        fn interval(&self) -> usize {
            2
        }

        fn call(&mut self, iter: usize, _time: f64, _flow: &F) -> Result<()> {
            self.0.borrow_mut().push(iter);
            Ok(())
        }
    }

    #[test]
    fn test_integrate_with_callbacks() {
        let flow = Step::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        let mut solver = Transient::new(flow, 0.05).unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        solver.add_callback(Box::new(Record(Rc::clone(&calls))));
        integrate(&mut solver, 0.3, None).unwrap();
        assert_eq!(solver.iteration(), 6);
        assert!((solver.get_time() - 0.3).abs() < 1e-12);
        assert_eq!(*calls.borrow(), vec![2, 4, 6]);
        let q = solver.flow().state().as_array();
        assert!(q.iter().all(|v| v.is_finite()));
        // inflow is imposed after the first step
        assert!(solver.flow().kinetic_energy() > 0.);
    }

    #[test]
    fn test_steady_state_is_fixed_point() {
        let mut flow = Step::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        let base = flow.solve_steady().unwrap();
        let mut solver = Transient::new(flow, 0.1).unwrap();
        solver.step().unwrap();
        assert!(solver.flow().state().max_difference(&base) < 1e-5);
    }

    #[test]
    fn test_controller_sets_rotation() {
        let flow = Cylinder::new(&FlowConfig::new(FlowKind::Cylinder)).unwrap();
        let mut solver = Transient::new(flow, 0.1)
            .unwrap()
            .with_controller(Box::new(|t: f64, _: &Observation| vec![0.5 + t]));
        solver.step().unwrap();
        solver.step().unwrap();
        assert!((solver.flow().omega() - 0.6).abs() < 1e-12);
        assert!(Transient::new(solver.into_flow(), 0.).is_err());
    }
}
