//! Linearized dynamics around a base flow
//!
//! Perturbations $q'$ of a steady state $q_B$ obey
//! $$
//! M \dot{q'} = A q' + B c
//! $$
//! with $A = -\partial F / \partial q (q_B)$ restricted by the homogeneous
//! boundary conditions and one column of $B$ per control channel.
use super::flow_eq::{steady_jacobian, velocity_mass};
use super::{Flow, FlowCore};
use crate::error::{FlowError, Result};
use crate::fem::{Constraints, MixedState};
use crate::solver::CsrMatrix;
use clap::ValueEnum;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Storage of the assembled operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Compressed sparse rows
    Sparse,
    /// Dense ndarray
    Dense,
}

impl Default for Backend {
    fn default() -> Self {
        Self::Sparse
    }
}

/// Assembled linear operator
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Sparse storage
    Sparse(CsrMatrix),
    /// Dense storage
    Dense(Array2<f64>),
}

impl Operator {
    fn new(m: CsrMatrix, backend: Backend) -> Self {
        match backend {
            Backend::Sparse => Self::Sparse(m),
            Backend::Dense => Self::Dense(m.to_dense()),
        }
    }

    /// Rows and columns
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Sparse(m) => m.shape(),
            Self::Dense(m) => m.dim(),
        }
    }

    /// Matrix-vector product
    pub fn dot(&self, x: &Array1<f64>) -> Array1<f64> {
        match self {
            Self::Sparse(m) => m.dot(x),
            Self::Dense(m) => m.dot(x),
        }
    }

    /// Dense copy
    pub fn to_dense(&self) -> Array2<f64> {
        match self {
            Self::Sparse(m) => m.to_dense(),
            Self::Dense(m) => m.clone(),
        }
    }
}

/// Matrices of the linearized system
#[derive(Debug, Clone)]
pub struct LinearSystem {
    /// Mass matrix `M`
    pub mass: Operator,
    /// Dynamics matrix `A`
    pub dynamics: Operator,
    /// Control vectors, one per channel, if requested
    pub control: Option<Vec<Array1<f64>>>,
}

impl LinearSystem {
    /// Number of unknowns
    pub fn len(&self) -> usize {
        self.dynamics.shape().0
    }

    /// No unknowns
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `(L, M)` without boundary conditions
pub(crate) fn linearized_forms(
    core: &FlowCore,
    base: &MixedState,
) -> Result<(CsrMatrix, CsrMatrix)> {
    core.check_state(base.as_array())?;
    let space = core.space();
    let jac = steady_jacobian(space, base.as_array(), core.reynolds());
    Ok((jac.scaled(-1.), velocity_mass(space)))
}

/// Homogeneous perturbation constraints of `flow`
fn perturbation_constraints<F: Flow + ?Sized>(flow: &mut F) -> Result<Constraints> {
    flow.linearize_bcs()?;
    let bcs = flow.collect_bcs()?;
    Ok(Constraints::new(flow.core().space().len(), &bcs))
}

/// `B_i = L x_i` with `x_i` the boundary lift of channel `i`, constrained
/// rows zeroed
pub(crate) fn linearize_control<F: Flow + ?Sized>(
    flow: &mut F,
    base: &MixedState,
    index: usize,
) -> Result<Array1<f64>> {
    let lift = flow.control_lift(index)?;
    let (l, _) = flow.linearized_forms(base)?;
    let constraints = perturbation_constraints(flow)?;
    let mut b = l.dot(&lift);
    constraints.zero(&mut b);
    Ok(b)
}

/// Assemble `M`, `A` and optionally `B`. Leaves the flow with its
/// perturbation boundary conditions.
pub(crate) fn linearize<F: Flow + ?Sized>(
    flow: &mut F,
    base: &MixedState,
    control: bool,
    backend: Backend,
) -> Result<LinearSystem> {
    if control && flow.num_controls() == 0 {
        return Err(FlowError::UnsupportedOperation(format!(
            "{} has no control channels to linearize",
            flow.kind().name()
        )));
    }
    let (l, m) = flow.linearized_forms(base)?;
    let constraints = perturbation_constraints(flow)?;
    let a = l.with_symmetric_rows(constraints.mask(), 1.);
    let m = m.with_symmetric_rows(constraints.mask(), 1.);
    let control = if control {
        let b = (0..flow.num_controls())
            .map(|i| flow.linearize_control(base, i))
            .collect::<Result<Vec<_>>>()?;
        Some(b)
    } else {
        None
    };
    tracing::debug!(
        size = a.shape().0,
        nnz = a.nnz(),
        controls = control.as_ref().map_or(0, Vec::len),
        "linearized flow"
    );
    Ok(LinearSystem {
        mass: Operator::new(m, backend),
        dynamics: Operator::new(a, backend),
        control,
    })
}
