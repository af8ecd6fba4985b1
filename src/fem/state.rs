//! Coefficients of the mixed velocity-pressure field
use super::space::MixedSpace;
use crate::error::{FlowError, Result};
use ndarray::prelude::*;

/// Velocity components, borrowed from a [`MixedState`]
#[derive(Debug, Clone, Copy)]
pub struct Velocity<'a> {
    /// x-component at the P2 nodes
    pub ux: ArrayView1<'a, f64>,
    /// y-component at the P2 nodes
    pub uy: ArrayView1<'a, f64>,
}

impl Velocity<'_> {
    /// Velocity vector at node `i`
    pub fn at(&self, i: usize) -> [f64; 2] {
        [self.ux[i], self.uy[i]]
    }
}

/// Mixed state `q = (u, p)`
///
/// Velocity and pressure are views into `q`, they are never stored apart
/// from it.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedState {
    q: Array1<f64>,
    n2: usize,
}

impl MixedState {
    /// Zero state on `space`
    pub fn zeros(space: &MixedSpace) -> Self {
        Self {
            q: Array1::zeros(space.len()),
            n2: space.velocity_nodes(),
        }
    }

    /// Wrap coefficients
    ///
    /// # Errors
    /// Length does not match the space
    pub fn from_array(space: &MixedSpace, q: Array1<f64>) -> Result<Self> {
        if q.len() != space.len() {
            return Err(FlowError::Configuration(format!(
                "state has {} coefficients, space needs {}",
                q.len(),
                space.len()
            )));
        }
        Ok(Self {
            q,
            n2: space.velocity_nodes(),
        })
    }

    /// All coefficients
    pub fn as_array(&self) -> &Array1<f64> {
        &self.q
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array1<f64> {
        &mut self.q
    }

    /// Consume and return the coefficients
    pub fn into_array(self) -> Array1<f64> {
        self.q
    }

    /// Number of coefficients
    pub fn len(&self) -> usize {
        self.q.len()
    }

    /// No coefficients
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// Velocity view
    pub fn velocity(&self) -> Velocity<'_> {
        Velocity {
            ux: self.q.slice(s![..self.n2]),
            uy: self.q.slice(s![self.n2..2 * self.n2]),
        }
    }

    /// Pressure view
    pub fn pressure(&self) -> ArrayView1<'_, f64> {
        self.q.slice(s![2 * self.n2..])
    }

    /// Both views
    pub fn split(&self) -> (Velocity<'_>, ArrayView1<'_, f64>) {
        (self.velocity(), self.pressure())
    }

    /// Largest absolute difference to `other`
    pub fn max_difference(&self, other: &Self) -> f64 {
        self.q
            .iter()
            .zip(other.q.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0., f64::max)
    }
}
