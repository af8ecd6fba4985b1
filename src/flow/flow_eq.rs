//! Weak form of the steady incompressible Navier-Stokes equations
//!
//! For test functions $(v, s)$ the residual reads
//! $$
//! F(u, p; v, s) = \int (u \cdot \nabla u) \cdot v + \sigma(u, p) : \epsilon(v)
//! + \int_{\partial \Omega} p\\, n \cdot v - \nu (\nabla u^T n) \cdot v
//! + \int (\nabla \cdot u)\\, s
//! $$
//! with $\sigma = 2 \nu \epsilon(u) - p I$ and $\nu = 1/Re$. The boundary
//! terms leave $\nu \partial_n u = 0$ as natural condition wherever no
//! velocity is imposed.
use crate::fem::element::{p2_gradients, p2_values, CellGeometry};
use crate::fem::quadrature::{LINE_GAUSS3, TRIANGLE_DEG5};
use crate::fem::MixedSpace;
use crate::mesh::{BoundaryFacet, Tag};
use crate::solver::{CsrMatrix, Triplets};
use ndarray::prelude::*;

/// 2x2 tensor, `t[i][j]`
pub type Tensor = [[f64; 2]; 2];

/// Symmetric gradient, `grad[i][j] = du_i/dx_j`
pub fn epsilon(grad: &Tensor) -> Tensor {
    let mut e = [[0.; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            e[i][j] = 0.5 * (grad[i][j] + grad[j][i]);
        }
    }
    e
}

/// Newtonian stress
/// $$
/// \sigma = \frac{2}{Re} \epsilon(u) - p I
/// $$
pub fn sigma(grad: &Tensor, p: f64, re: f64) -> Tensor {
    let e = epsilon(grad);
    let mut s = [[0.; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            s[i][j] = 2. / re * e[i][j];
        }
        s[i][i] -= p;
    }
    s
}

/// Local unknowns: six `u_x`, six `u_y`, three `p`
pub(crate) const NLOC: usize = 15;

/// Basis functions of one cell at one quadrature point
pub(crate) struct Basis {
    /// Quadrature weight times measure
    pub w: f64,
    pub phi: [f64; 6],
    pub dphi: [[f64; 2]; 6],
    pub psi: [f64; 3],
}

/// Interpolated fields at a quadrature point
pub(crate) struct PointValues {
    pub u: [f64; 2],
    pub grad: Tensor,
    pub p: f64,
}

impl Basis {
    pub fn new(geo: &CellGeometry, l: &[f64; 3], w: f64) -> Self {
        Self {
            w,
            phi: p2_values(l),
            dphi: p2_gradients(l, &geo.grad_lambda),
            psi: *l,
        }
    }

    pub fn interpolate(&self, ql: &[f64; NLOC]) -> PointValues {
        let mut u = [0.; 2];
        let mut grad = [[0.; 2]; 2];
        for c in 0..2 {
            for a in 0..6 {
                let coef = ql[c * 6 + a];
                u[c] += coef * self.phi[a];
                grad[c][0] += coef * self.dphi[a][0];
                grad[c][1] += coef * self.dphi[a][1];
            }
        }
        let p = (0..3).map(|k| ql[12 + k] * self.psi[k]).sum();
        PointValues { u, grad, p }
    }
}

/// Gather local coefficients
pub(crate) fn gather(q: &Array1<f64>, dofs: &[usize; NLOC]) -> [f64; NLOC] {
    let mut ql = [0.; NLOC];
    for (v, &d) in ql.iter_mut().zip(dofs.iter()) {
        *v = q[d];
    }
    ql
}

/// Quadrature points of a cell, as basis evaluations
pub(crate) fn cell_points(geo: &CellGeometry) -> impl Iterator<Item = Basis> + '_ {
    let area = geo.area();
    TRIANGLE_DEG5
        .iter()
        .map(move |(l, w)| Basis::new(geo, l, w * area))
}

/// Quadrature points of a boundary facet, with the outward normal
pub(crate) fn facet_points<'a>(
    geo: &'a CellGeometry,
    facet: &BoundaryFacet,
) -> impl Iterator<Item = (Basis, [f64; 2])> + 'a {
    let e = facet.local;
    let len = geo.edge_length(e);
    let n = geo.outward_normal(e);
    LINE_GAUSS3.iter().map(move |&(t, w)| {
        let l = CellGeometry::edge_point(e, t);
        (Basis::new(geo, &l, w * len), n)
    })
}

fn volume_residual(b: &Basis, v: &PointValues, nu: f64, r: &mut [f64; NLOC]) {
    let eps = epsilon(&v.grad);
    for c in 0..2 {
        let conv = v.grad[c][0] * v.u[0] + v.grad[c][1] * v.u[1];
        for a in 0..6 {
            let visc = 2. * nu * (eps[c][0] * b.dphi[a][0] + eps[c][1] * b.dphi[a][1]);
            r[c * 6 + a] += b.w * (b.phi[a] * conv + visc - v.p * b.dphi[a][c]);
        }
    }
    let div = v.grad[0][0] + v.grad[1][1];
    for k in 0..3 {
        r[12 + k] += b.w * div * b.psi[k];
    }
}

fn volume_jacobian(b: &Basis, v: &PointValues, nu: f64, jac: &mut [[f64; NLOC]; NLOC]) {
    for bb in 0..6 {
        let adv = v.u[0] * b.dphi[bb][0] + v.u[1] * b.dphi[bb][1];
        for a in 0..6 {
            let lap = b.dphi[a][0] * b.dphi[bb][0] + b.dphi[a][1] * b.dphi[bb][1];
            for c in 0..2 {
                for d in 0..2 {
                    let mut val = b.phi[a] * b.phi[bb] * v.grad[c][d]
                        + nu * b.dphi[bb][c] * b.dphi[a][d];
                    if c == d {
                        val += b.phi[a] * adv + nu * lap;
                    }
                    jac[c * 6 + a][d * 6 + bb] += b.w * val;
                }
            }
        }
    }
    for a in 0..6 {
        for c in 0..2 {
            for l in 0..3 {
                // pressure gradient and continuity
                jac[c * 6 + a][12 + l] -= b.w * b.psi[l] * b.dphi[a][c];
                jac[12 + l][c * 6 + a] += b.w * b.dphi[a][c] * b.psi[l];
            }
        }
    }
}

fn boundary_residual(b: &Basis, v: &PointValues, n: &[f64; 2], nu: f64, r: &mut [f64; NLOC]) {
    for c in 0..2 {
        let flux = v.p * n[c] - nu * (v.grad[0][c] * n[0] + v.grad[1][c] * n[1]);
        for a in 0..6 {
            r[c * 6 + a] += b.w * b.phi[a] * flux;
        }
    }
}

fn boundary_jacobian(b: &Basis, n: &[f64; 2], nu: f64, jac: &mut [[f64; NLOC]; NLOC]) {
    for a in 0..6 {
        for c in 0..2 {
            let row = c * 6 + a;
            for l in 0..3 {
                jac[row][12 + l] += b.w * b.phi[a] * b.psi[l] * n[c];
            }
            for bb in 0..6 {
                for d in 0..2 {
                    jac[row][d * 6 + bb] -= b.w * nu * b.phi[a] * b.dphi[bb][c] * n[d];
                }
            }
        }
    }
}

fn scatter(
    dofs: &[usize; NLOC],
    rl: &[f64; NLOC],
    jl: Option<&[[f64; NLOC]; NLOC]>,
    r: &mut Array1<f64>,
    triplets: &mut Option<Triplets>,
) {
    for (i, &d) in dofs.iter().enumerate() {
        r[d] += rl[i];
    }
    if let (Some(jl), Some(t)) = (jl, triplets.as_mut()) {
        for i in 0..NLOC {
            for j in 0..NLOC {
                // the pressure-pressure block vanishes
                if i >= 12 && j >= 12 {
                    continue;
                }
                t.push(dofs[i], dofs[j], jl[i][j]);
            }
        }
    }
}

/// Residual and, if requested, its exact Jacobian at `q`
pub fn assemble_steady(
    space: &MixedSpace,
    q: &Array1<f64>,
    re: f64,
    with_jacobian: bool,
) -> (Array1<f64>, Option<CsrMatrix>) {
    let nu = 1. / re;
    let mesh = space.mesh();
    let n = space.len();
    let mut r = Array1::zeros(n);
    let mut triplets = if with_jacobian {
        Some(Triplets::with_capacity(
            (mesh.num_cells() + mesh.facets().len()) * NLOC * NLOC,
        ))
    } else {
        None
    };
    for c in 0..mesh.num_cells() {
        let dofs = space.cell_dofs(c);
        let ql = gather(q, &dofs);
        let geo = CellGeometry::new(mesh.cell_coords(c));
        let mut rl = [0.; NLOC];
        let mut jl = [[0.; NLOC]; NLOC];
        for b in cell_points(&geo) {
            let v = b.interpolate(&ql);
            volume_residual(&b, &v, nu, &mut rl);
            if with_jacobian {
                volume_jacobian(&b, &v, nu, &mut jl);
            }
        }
        scatter(&dofs, &rl, Some(&jl), &mut r, &mut triplets);
    }
    for facet in mesh.facets() {
        let dofs = space.cell_dofs(facet.cell);
        let ql = gather(q, &dofs);
        let geo = CellGeometry::new(mesh.cell_coords(facet.cell));
        let mut rl = [0.; NLOC];
        let mut jl = [[0.; NLOC]; NLOC];
        for (b, normal) in facet_points(&geo, facet) {
            let v = b.interpolate(&ql);
            boundary_residual(&b, &v, &normal, nu, &mut rl);
            if with_jacobian {
                boundary_jacobian(&b, &normal, nu, &mut jl);
            }
        }
        scatter(&dofs, &rl, Some(&jl), &mut r, &mut triplets);
    }
    let jac = triplets.map(|t| CsrMatrix::from_triplets(n, n, &t));
    (r, jac)
}

/// Steady residual tested against every basis function
pub fn steady_residual(space: &MixedSpace, q: &Array1<f64>, re: f64) -> Array1<f64> {
    assemble_steady(space, q, re, false).0
}

/// Exact derivative of [`steady_residual`] with respect to `q`
pub fn steady_jacobian(space: &MixedSpace, q: &Array1<f64>, re: f64) -> CsrMatrix {
    match assemble_steady(space, q, re, true).1 {
        Some(jac) => jac,
        None => CsrMatrix::identity(space.len()),
    }
}

/// Velocity mass matrix on the mixed space (zero pressure block)
pub fn velocity_mass(space: &MixedSpace) -> CsrMatrix {
    let mesh = space.mesh();
    let n = space.len();
    let mut t = Triplets::with_capacity(mesh.num_cells() * 72);
    for c in 0..mesh.num_cells() {
        let dofs = space.cell_dofs(c);
        let geo = CellGeometry::new(mesh.cell_coords(c));
        let mut ml = [[0.; 6]; 6];
        for b in cell_points(&geo) {
            for a in 0..6 {
                for bb in 0..6 {
                    ml[a][bb] += b.w * b.phi[a] * b.phi[bb];
                }
            }
        }
        for comp in 0..2 {
            for a in 0..6 {
                for bb in 0..6 {
                    t.push(dofs[comp * 6 + a], dofs[comp * 6 + bb], ml[a][bb]);
                }
            }
        }
    }
    CsrMatrix::from_triplets(n, n, &t)
}

/// Force exerted by the fluid on the boundary regions `tags`
/// $$
/// f = \int -\sigma(u, p) \cdot n \\, ds
/// $$
/// with `n` pointing out of the fluid domain.
pub fn traction(space: &MixedSpace, q: &Array1<f64>, re: f64, tags: &[Tag]) -> [f64; 2] {
    let mesh = space.mesh();
    let mut force = [0.; 2];
    for facet in mesh.facets_with_tags(tags) {
        let dofs = space.cell_dofs(facet.cell);
        let ql = gather(q, &dofs);
        let geo = CellGeometry::new(mesh.cell_coords(facet.cell));
        for (b, n) in facet_points(&geo, facet) {
            let v = b.interpolate(&ql);
            let s = sigma(&v.grad, v.p, re);
            for i in 0..2 {
                force[i] -= b.w * (s[i][0] * n[0] + s[i][1] * n[1]);
            }
        }
    }
    force
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fem::Field;
    use crate::mesh::{breaks, Lattice, Mesh};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use std::sync::Arc;

    fn channel() -> MixedSpace {
        let mesh: Mesh = Lattice::new(breaks(&[(0., 2., 4)], 1), breaks(&[(0., 1., 3)], 1))
            .build(|x| {
                if x[0].abs() < 1e-9 {
                    Some(1)
                } else if (x[0] - 2.).abs() < 1e-9 {
                    Some(3)
                } else {
                    Some(2)
                }
            })
            .unwrap();
        MixedSpace::new(Arc::new(mesh))
    }

    #[test]
    fn test_sigma() {
        let grad = [[1., 2.], [0., -1.]];
        let s = sigma(&grad, 3., 2.);
        assert!((s[0][0] - (1. - 3.)).abs() < 1e-14);
        assert!((s[0][1] - 1.).abs() < 1e-14);
        assert!((s[1][0] - s[0][1]).abs() < 1e-14);
        assert!((s[1][1] - (-1. - 3.)).abs() < 1e-14);
    }

    #[test]
    fn test_poiseuille_is_discrete_solution() {
        // u = 4y(1-y), p = 8 nu (2 - x)
        let space = channel();
        let re = 10.;
        let nu = 1. / re;
        let n2 = space.velocity_nodes();
        let mut q = Array1::zeros(space.len());
        for i in 0..n2 {
            let x = space.node_coords(Field::Velocity, i);
            q[i] = 4. * x[1] * (1. - x[1]);
        }
        for i in 0..space.pressure_nodes() {
            let x = space.node_coords(Field::Pressure, i);
            q[2 * n2 + i] = 8. * nu * (2. - x[0]);
        }
        let r = steady_residual(&space, &q, re);
        // rows on the inlet and the walls are replaced by the boundary
        // conditions, all others must vanish
        let (v, p) = space.function_spaces(true);
        let mut constrained = vec![false; space.len()];
        for node in space.boundary_nodes(Field::Velocity, &[1, 2]) {
            constrained[v.dof(node, 0)] = true;
            constrained[v.dof(node, 1)] = true;
        }
        for node in space.boundary_nodes(Field::Pressure, &[3]) {
            constrained[p.dof(node, 0)] = true;
        }
        for i in 0..space.len() {
            if !constrained[i] {
                assert!(r[i].abs() < 1e-12, "row {}: {}", i, r[i]);
            }
        }
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let space = channel();
        let re = 7.;
        let q: Array1<f64> = Array1::random(space.len(), Uniform::new(-1., 1.));
        let dq: Array1<f64> = Array1::random(space.len(), Uniform::new(-1., 1.));
        let jac = steady_jacobian(&space, &q, re);
        let h = 1e-6;
        let rp = steady_residual(&space, &(&q + &(&dq * h)), re);
        let rm = steady_residual(&space, &(&q - &(&dq * h)), re);
        let fd = (rp - rm) / (2. * h);
        let exact = jac.dot(&dq);
        for (a, b) in fd.iter().zip(exact.iter()) {
            assert!((a - b).abs() < 1e-6 * (1. + b.abs()), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_mass_integrates_area() {
        let space = channel();
        let n2 = space.velocity_nodes();
        let m = velocity_mass(&space);
        let mut ones = Array1::zeros(space.len());
        ones.slice_mut(s![..n2]).fill(1.);
        // int 1 dx over [0, 2] x [0, 1]
        assert!((ones.dot(&m.dot(&ones)) - 2.).abs() < 1e-12);
    }

    #[test]
    fn test_traction_of_hydrostatic_pressure() {
        // p = 1, u = 0: forces cancel over the closed boundary, on the outlet f = n
        let space = channel();
        let n2 = space.velocity_nodes();
        let mut q = Array1::zeros(space.len());
        q.slice_mut(s![2 * n2..]).fill(1.);
        let f = traction(&space, &q, 1., &[3]);
        assert!((f[0] - 1.).abs() < 1e-12);
        assert!(f[1].abs() < 1e-12);
        let total = traction(&space, &q, 1., &[1, 2, 3]);
        assert!(total[0].abs() < 1e-12 && total[1].abs() < 1e-12);
    }
}
