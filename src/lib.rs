//! # `flowctl`: Finite-element Navier-Stokes flows for flow control
//!
//! Incompressible two-dimensional flows discretized with Taylor-Hood
//! (P2 velocity, P1 pressure) elements, exposed through one interface that
//! flow control studies need:
//! - steady solutions by damped Newton iteration, see [`Flow::solve_steady`]
//! - continuation in the Reynolds number, see [`flow::ramp_reynolds`]
//! - linearized dynamics `M dq/dt = A q + B u`, see [`Flow::linearize`]
//! - actuation and observation hooks, see [`Flow::set_control`] and
//!   [`Flow::collect_observations`]
//! - time stepping with callbacks, see [`flow::Transient`] and [`integrate`]
//! - JSON checkpoints, see [`io::Checkpoint`]
//!
//! ## Implemented flows
//!
//! - `Cylinder`: wake behind a rotating cylinder, see [`flow::Cylinder`]
//! - `Pinball`: three cylinders in a triangle, see [`flow::Pinball`]
//! - `Step`: backward-facing step with a blowing slot, see [`flow::Step`]
//!
//! # Example
//! Steady cylinder wake at Re = 40, then lift and drag
//! ```no_run
//! use flowctl::config::{FlowConfig, FlowKind};
//! use flowctl::{Flow, FlowVariant};
//!
//! let config = FlowConfig::new(FlowKind::Cylinder).with_reynolds(40.);
//! let mut flow = FlowVariant::new(&config).unwrap();
//! flow.solve_steady().unwrap();
//! println!("{:?}", flow.collect_observations().unwrap());
//! ```
//!
//! Logging goes through `tracing`; the binary installs a subscriber that
//! honours `RUST_LOG`.
#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod fem;
pub mod flow;
pub mod io;
pub mod mesh;
pub mod solver;

pub use error::{FlowError, Result};
pub use flow::{Flow, FlowVariant};

const MAX_TIMESTEP: usize = 10_000_000;

/// Integrate trait, step forward in time, and write results
pub trait Integrate {
    /// Update solution
    ///
    /// # Errors
    /// The step could not be taken
    fn update(&mut self) -> Result<()>;
    /// Receive current time
    fn get_time(&self) -> f64;
    /// Get timestep
    fn get_dt(&self) -> f64;
    /// Callback function (can be used for i/o)
    ///
    /// # Errors
    /// Callback specific
    fn callback(&mut self) -> Result<()>;
    /// Additional break criteria
    fn exit(&mut self) -> bool;
}

/// Integrate pde, that implements the Integrate trait.
///
/// Without `save_intervall` the callback runs after every step, otherwise
/// only when the time crosses a multiple of `save_intervall`.
///
/// Stop Criteria:
/// 1. Timestep limit
/// 2. Time limit
/// 3. [`Integrate::exit`]
///
/// # Errors
/// First failing update or callback
pub fn integrate<T: Integrate>(pde: &mut T, max_time: f64, save_intervall: Option<f64>) -> Result<()> {
    let mut timestep: usize = 0;
    let eps_dt = pde.get_dt() * 1e-4;
    loop {
        // Update
        pde.update()?;
        timestep += 1;

        // Save
        match save_intervall {
            Some(dt_save) => {
                let rest = pde.get_time() % dt_save;
                if rest < pde.get_dt() / 2. || rest > dt_save - pde.get_dt() / 2. {
                    pde.callback()?;
                }
            }
            None => pde.callback()?,
        }

        // Break
        if pde.get_time() + eps_dt >= max_time {
            tracing::info!(time = pde.get_time(), "time limit reached");
            break;
        }
        if timestep >= MAX_TIMESTEP {
            tracing::info!(timestep, "timestep limit reached");
            break;
        }
        if pde.exit() {
            tracing::info!(time = pde.get_time(), "break criteria triggered");
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    struct Counter {
        time: f64,
        calls: usize,
        fail_at: Option<usize>,
    }

    impl Integrate for Counter {
        fn update(&mut self) -> Result<()> {
            self.time += 0.1;
            Ok(())
        }

        fn get_time(&self) -> f64 {
            self.time
        }

        fn get_dt(&self) -> f64 {
            0.1
        }

        fn callback(&mut self) -> Result<()> {
            self.calls += 1;
            if Some(self.calls) == self.fail_at {
                return Err(FlowError::Configuration("stop".to_string()));
            }
            Ok(())
        }

        fn exit(&mut self) -> bool {
            false
        }
    }

    #[test]
    fn test_integrate_save_intervall() {
        let mut pde = Counter {
            time: 0.,
            calls: 0,
            fail_at: None,
        };
        integrate(&mut pde, 1.0, Some(0.5)).unwrap();
        assert!((pde.time - 1.0).abs() < 1e-9);
        assert_eq!(pde.calls, 2);
    }

    #[test]
    fn test_integrate_propagates_callback_error() {
        let mut pde = Counter {
            time: 0.,
            calls: 0,
            fail_at: Some(3),
        };
        assert!(integrate(&mut pde, 1.0, None).is_err());
        assert_eq!(pde.calls, 3);
    }
}
