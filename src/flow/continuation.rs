//! Continuation in the Reynolds number
use super::Flow;
use crate::error::{FlowError, Result};
use crate::fem::MixedState;

/// Solve the steady equations at each Reynolds number in `levels`, each
/// solve warm-started from the previous one. Returns the last state.
///
/// # Errors
/// Empty `levels`, or the `ConvergenceError` of the first failing level;
/// the flow then holds the last converged state.
pub fn ramp_reynolds<F: Flow + ?Sized>(flow: &mut F, levels: &[f64]) -> Result<MixedState> {
    let mut last = None;
    for &re in levels {
        flow.set_reynolds(re)?;
        tracing::info!(reynolds = re, "continuation level");
        last = Some(flow.solve_steady()?);
    }
    last.ok_or_else(|| FlowError::Configuration("no Reynolds numbers to ramp through".to_string()))
}

/// Reynolds numbers `start, start + step, ...` up to and including `stop`
pub fn reynolds_levels(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step.is_nan() || step <= 0. || start > stop {
        return vec![stop];
    }
    let n = ((stop - start) / step + 1e-9).floor() as usize;
    let mut levels: Vec<f64> = (0..=n).map(|i| start + step * i as f64).collect();
    if levels.last().map_or(true, |&re| (re - stop).abs() > 1e-9 * stop.abs()) {
        levels.push(stop);
    }
    levels
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{FlowConfig, FlowKind};
    use crate::flow::FlowVariant;

    #[test]
    fn test_levels() {
        assert_eq!(reynolds_levels(100., 600., 100.), vec![100., 200., 300., 400., 500., 600.]);
        assert_eq!(reynolds_levels(100., 250., 100.), vec![100., 200., 250.]);
        assert_eq!(reynolds_levels(300., 100., 100.), vec![100.]);
        assert_eq!(reynolds_levels(50., 50., 0.), vec![50.]);
    }

    #[test]
    fn test_empty_ramp() {
        let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        assert!(ramp_reynolds(&mut flow, &[]).is_err());
        assert!(ramp_reynolds(&mut flow, &[-1.]).is_err());
    }
}
