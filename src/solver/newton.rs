//! Damped Newton iteration with backtracking line search
use crate::config::NewtonConfig;
use crate::error::{FlowError, Result};
use crate::solver::{CsrMatrix, Solve, SparseLu};
use ndarray::prelude::*;
use tracing::{debug, info, warn};

/// Sufficient decrease parameter of the line search
const ARMIJO: f64 = 1e-4;

/// Residual and Jacobian of a nonlinear system `F(q) = 0`
pub trait NonlinearProblem {
    /// Evaluate `F(q)`
    fn residual(&self, q: &Array1<f64>) -> Array1<f64>;

    /// Evaluate `dF/dq`
    fn jacobian(&self, q: &Array1<f64>) -> CsrMatrix;
}

/// Outcome of a converged Newton solve
#[derive(Debug, Clone)]
pub struct NewtonReport {
    /// Solution
    pub q: Array1<f64>,
    /// Newton steps taken
    pub iterations: usize,
    /// Final residual 2-norm
    pub residual: f64,
}

fn norm(x: &Array1<f64>) -> f64 {
    x.dot(x).sqrt()
}

/// Solve `F(q) = 0` starting from `q0`
///
/// # Errors
/// Non-finite residual, singular Jacobian, failed line search or
/// exhausted iteration budget
pub fn newton<P: NonlinearProblem>(
    problem: &P,
    q0: Array1<f64>,
    config: &NewtonConfig,
) -> Result<NewtonReport> {
    let mut q = q0;
    let mut r = problem.residual(&q);
    let mut rnorm = norm(&r);
    let tol = config.atol.max(config.rtol * rnorm);
    let fail = |iterations: usize, residual: f64, reason: &str| FlowError::Convergence {
        iterations,
        residual,
        reason: reason.to_string(),
    };
    if !rnorm.is_finite() {
        return Err(fail(0, rnorm, "initial residual is not finite"));
    }
    for it in 0..config.max_iterations {
        if config.monitor {
            info!(iteration = it, residual = rnorm, "newton");
        } else {
            debug!(iteration = it, residual = rnorm, "newton");
        }
        if rnorm <= tol {
            return Ok(NewtonReport {
                q,
                iterations: it,
                residual: rnorm,
            });
        }
        let jac = problem.jacobian(&q);
        let lu = SparseLu::from_matrix(&jac).map_err(|e| fail(it, rnorm, &e.to_string()))?;
        let dq = lu.solve_vec(&r);

        // backtracking
        let mut alpha = 1.;
        let mut best: Option<(Array1<f64>, Array1<f64>, f64)> = None;
        for _ in 0..=config.max_backtracks {
            let q_try = &q - &(&dq * alpha);
            let r_try = problem.residual(&q_try);
            let n_try = norm(&r_try);
            if n_try.is_finite() {
                let accept = n_try <= (1. - ARMIJO * alpha) * rnorm;
                let better = best.as_ref().map_or(true, |b| n_try < b.2);
                if accept {
                    best = Some((q_try, r_try, n_try));
                    break;
                }
                if better {
                    best = Some((q_try, r_try, n_try));
                }
            }
            alpha *= 0.5;
        }
        match best {
            Some((q_new, r_new, n_new)) => {
                if n_new > (1. - ARMIJO * alpha) * rnorm {
                    warn!(iteration = it, residual = n_new, "line search found no decrease");
                }
                q = q_new;
                r = r_new;
                rnorm = n_new;
            }
            None => return Err(fail(it + 1, f64::NAN, "residual is not finite along the step")),
        }
    }
    if rnorm <= tol {
        Ok(NewtonReport {
            q,
            iterations: config.max_iterations,
            residual: rnorm,
        })
    } else {
        Err(fail(config.max_iterations, rnorm, "iteration budget exhausted"))
    }
}
