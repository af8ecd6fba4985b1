//! # Callbacks of the time integration
//!
//! A callback runs every `interval` iterations of a
//! [`Transient`](crate::flow::Transient) driver and receives the iteration,
//! the time and the flow.
use crate::error::Result;
use crate::fem::MixedState;
use crate::flow::Flow;
use std::path::{Path, PathBuf};

/// Post-processing hook called during time integration
pub trait Callback<F: Flow> {
    /// Call every `interval` iterations
    fn interval(&self) -> usize;

    /// Run the callback
    ///
    /// # Errors
    /// Callback specific, aborts the integration
    fn call(&mut self, iter: usize, time: f64, flow: &F) -> Result<()>;

    /// Whether iteration `iter` is an output step
    fn is_due(&self, iter: usize) -> bool {
        iter % self.interval().max(1) == 0
    }
}

/// Log time, Courant number, kinetic energy and observations.
///
/// With a base flow the energy of the fluctuation about it is logged too.
#[derive(Debug, Clone)]
pub struct LogCallback {
    interval: usize,
    dt: f64,
    base: Option<MixedState>,
}

impl LogCallback {
    /// Log every `interval` steps of size `dt`
    pub fn new(interval: usize, dt: f64) -> Self {
        Self {
            interval,
            dt,
            base: None,
        }
    }

    /// Also log the fluctuation energy about `base`
    pub fn with_base(mut self, base: MixedState) -> Self {
        self.base = Some(base);
        self
    }
}

impl<F: Flow> Callback<F> for LogCallback {
    fn interval(&self) -> usize {
        self.interval
    }

    fn call(&mut self, iter: usize, time: f64, flow: &F) -> Result<()> {
        let obs = flow.collect_observations()?.flatten();
        let tke = match &self.base {
            Some(base) => Some(flow.fluctuation_energy(base)?),
            None => None,
        };
        tracing::info!(
            iter,
            time,
            cfl = flow.max_cfl(self.dt),
            ke = flow.kinetic_energy(),
            tke,
            obs = ?obs,
            "step"
        );
        Ok(())
    }
}

/// Save a checkpoint, overwriting the previous one
#[derive(Debug, Clone)]
pub struct CheckpointCallback {
    interval: usize,
    path: PathBuf,
}

impl CheckpointCallback {
    /// Write to `path` every `interval` steps
    pub fn new<P: AsRef<Path>>(interval: usize, path: P) -> Self {
        Self {
            interval,
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl<F: Flow> Callback<F> for CheckpointCallback {
    fn interval(&self) -> usize {
        self.interval
    }

    fn call(&mut self, _iter: usize, _time: f64, flow: &F) -> Result<()> {
        flow.save_checkpoint(&self.path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{FlowConfig, FlowKind};
    use crate::flow::{FlowVariant, Step};

    #[test]
    fn test_is_due() {
        let cb = LogCallback::new(3, 0.1);
        let due: Vec<usize> = (0..10)
            .filter(|&i| Callback::<Step>::is_due(&cb, i))
            .collect();
        assert_eq!(due, vec![0, 3, 6, 9]);
        // interval 0 behaves like 1
        let cb = LogCallback::new(0, 0.1);
        assert!(Callback::<Step>::is_due(&cb, 7));
    }

    #[test]
    fn test_checkpoint_callback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("cp.json");
        let flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        let mut cb = CheckpointCallback::new(1, &path);
        cb.call(0, 0., &flow).unwrap();
        assert!(path.exists());
        let mut log = LogCallback::new(1, 0.1);
        log.call(0, 0., &flow).unwrap();
    }

    #[test]
    fn test_log_callback_with_base() {
        let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        flow.random_disturbance(0.1).unwrap();
        let base = flow.state().clone();
        assert!(flow.fluctuation_energy(&base).unwrap().abs() < 1e-14);
        let zero = MixedState::zeros(flow.core().space());
        let tke = flow.fluctuation_energy(&zero).unwrap();
        assert!(tke > 0.);
        assert!((tke - flow.kinetic_energy()).abs() < 1e-12 * tke.max(1.));

        let mut log = LogCallback::new(1, 0.1).with_base(base);
        log.call(0, 0., &flow).unwrap();
        // base of another flow is rejected
        let other = FlowVariant::new(&FlowConfig::new(FlowKind::Cylinder)).unwrap();
        let mut log = LogCallback::new(1, 0.1).with_base(other.state().clone());
        assert!(log.call(0, 0., &flow).is_err());
    }
}
