//! Dirichlet boundary conditions
//!
//! A condition fixes a field on the nodes of one or more tagged boundary
//! regions. Values are interpolated at the nodes. When several conditions
//! touch the same unknown, the one applied last wins.
use super::space::{Field, MixedSpace, SubSpace};
use crate::error::{FlowError, Result};
use crate::mesh::Tag;
use ndarray::prelude::*;

/// Strongly imposed boundary values of one field
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletBc {
    name: String,
    space: SubSpace,
    tags: Vec<Tag>,
    nodes: Vec<usize>,
    coords: Vec<[f64; 2]>,
    /// One entry per node, pressure uses the first slot only
    values: Vec<[f64; 2]>,
}

impl DirichletBc {
    fn on_nodes(name: &str, space: &MixedSpace, sub: SubSpace, tags: &[Tag]) -> Result<Self> {
        let nodes = space.boundary_nodes(sub.field, tags);
        if nodes.is_empty() {
            return Err(FlowError::Configuration(format!(
                "boundary condition '{}' has no nodes on tags {:?}",
                name, tags
            )));
        }
        let coords = nodes
            .iter()
            .map(|&n| space.node_coords(sub.field, n))
            .collect();
        Ok(Self {
            name: name.to_string(),
            space: sub,
            tags: tags.to_vec(),
            values: vec![[0.; 2]; nodes.len()],
            nodes,
            coords,
        })
    }

    /// Velocity condition `u = f(x)` on `tags`
    ///
    /// # Errors
    /// `sub` is not a velocity space or the tags have no facets
    pub fn velocity<F>(
        name: &str,
        space: &MixedSpace,
        sub: SubSpace,
        tags: &[Tag],
        f: F,
    ) -> Result<Self>
    where
        F: Fn([f64; 2]) -> [f64; 2],
    {
        if sub.field != Field::Velocity {
            return Err(FlowError::Configuration(format!(
                "'{}' expects the velocity space",
                name
            )));
        }
        let mut bc = Self::on_nodes(name, space, sub, tags)?;
        bc.set_velocity(f);
        Ok(bc)
    }

    /// Pressure condition `p = f(x)` on `tags`
    ///
    /// # Errors
    /// `sub` is not a pressure space or the tags have no facets
    pub fn pressure<F>(
        name: &str,
        space: &MixedSpace,
        sub: SubSpace,
        tags: &[Tag],
        f: F,
    ) -> Result<Self>
    where
        F: Fn([f64; 2]) -> f64,
    {
        if sub.field != Field::Pressure {
            return Err(FlowError::Configuration(format!(
                "'{}' expects the pressure space",
                name
            )));
        }
        let mut bc = Self::on_nodes(name, space, sub, tags)?;
        bc.set_pressure(f);
        Ok(bc)
    }

    /// Re-evaluate velocity values
    pub fn set_velocity<F: Fn([f64; 2]) -> [f64; 2]>(&mut self, f: F) {
        for (v, x) in self.values.iter_mut().zip(self.coords.iter()) {
            *v = f(*x);
        }
    }

    /// Re-evaluate pressure values
    pub fn set_pressure<F: Fn([f64; 2]) -> f64>(&mut self, f: F) {
        for (v, x) in self.values.iter_mut().zip(self.coords.iter()) {
            *v = [f(*x), 0.];
        }
    }

    /// Set all values to zero
    pub fn homogenize(&mut self) {
        self.values.iter_mut().for_each(|v| *v = [0.; 2]);
    }

    /// Name of the condition
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constrained field
    pub fn field(&self) -> Field {
        self.space.field
    }

    /// Boundary regions
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Space the indices refer to
    pub fn space(&self) -> SubSpace {
        self.space
    }

    /// `(index, value)` of every constrained unknown
    pub fn constraints(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        let comps = self.space.components();
        (0..comps).flat_map(move |c| {
            self.nodes
                .iter()
                .zip(self.values.iter())
                .map(move |(&n, v)| (self.space.dof(n, c), v[c]))
        })
    }

    /// Constrained indices
    pub fn dofs(&self) -> Vec<usize> {
        self.constraints().map(|(i, _)| i).collect()
    }
}

/// Dirichlet data of an ordered list of conditions, merged into one mask
#[derive(Debug, Clone)]
pub struct Constraints {
    mask: Vec<bool>,
    values: Array1<f64>,
}

impl Constraints {
    /// Merge `bcs` in order, later conditions override earlier ones
    pub fn new(size: usize, bcs: &[&DirichletBc]) -> Self {
        let mut mask = vec![false; size];
        let mut values = Array1::zeros(size);
        for bc in bcs {
            for (i, v) in bc.constraints() {
                mask[i] = true;
                values[i] = v;
            }
        }
        Self { mask, values }
    }

    /// `true` for constrained unknowns
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Boundary values (zero on free unknowns)
    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Constrained indices
    pub fn dofs(&self) -> Vec<usize> {
        (0..self.mask.len()).filter(|&i| self.mask[i]).collect()
    }

    /// Overwrite constrained entries of `q` with the boundary values
    pub fn apply(&self, q: &mut Array1<f64>) {
        for (i, &m) in self.mask.iter().enumerate() {
            if m {
                q[i] = self.values[i];
            }
        }
    }

    /// Replace constrained residual rows by `q_i - g_i`
    pub fn replace_residual(&self, r: &mut Array1<f64>, q: &Array1<f64>) {
        for (i, &m) in self.mask.iter().enumerate() {
            if m {
                r[i] = q[i] - self.values[i];
            }
        }
    }

    /// Zero constrained entries
    pub fn zero(&self, r: &mut Array1<f64>) {
        for (i, &m) in self.mask.iter().enumerate() {
            if m {
                r[i] = 0.;
            }
        }
    }
}
