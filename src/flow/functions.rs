//! Derived fields and diagnostics of a flow state
use super::flow_eq::{cell_points, gather};
use super::Flow;
use crate::error::{FlowError, Result};
use crate::fem::{CellGeometry, Constraints, MixedSpace, MixedState};
use crate::solver::{CsrMatrix, Solve, SparseLu, Triplets};
use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

/// Scalar field at the pressure (vertex) nodes
#[derive(Debug, Clone, PartialEq)]
pub struct NamedField {
    /// Name, used as key in output files
    pub name: String,
    /// Nodal values
    pub values: Array1<f64>,
}

impl NamedField {
    /// Wrap nodal values
    pub fn new(name: &str, values: Array1<f64>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }
}

/// P1 mass matrix on the vertices
fn p1_mass(space: &MixedSpace) -> CsrMatrix {
    let mesh = space.mesh();
    let n = space.pressure_nodes();
    let mut t = Triplets::with_capacity(mesh.num_cells() * 9);
    for c in 0..mesh.num_cells() {
        let cell = mesh.cell(c);
        let geo = CellGeometry::new(mesh.cell_coords(c));
        for b in cell_points(&geo) {
            for i in 0..3 {
                for j in 0..3 {
                    t.push(cell[i], cell[j], b.w * b.psi[i] * b.psi[j]);
                }
            }
        }
    }
    CsrMatrix::from_triplets(n, n, &t)
}

/// L2 projection of $\omega = \partial_x u_y - \partial_y u_x$ onto P1
///
/// # Errors
/// Singular mass matrix (degenerate mesh)
pub fn vorticity(space: &MixedSpace, state: &MixedState) -> Result<NamedField> {
    let mesh = space.mesh();
    let q = state.as_array();
    let mut rhs = Array1::zeros(space.pressure_nodes());
    for c in 0..mesh.num_cells() {
        let cell = mesh.cell(c);
        let ql = gather(q, &space.cell_dofs(c));
        let geo = CellGeometry::new(mesh.cell_coords(c));
        for b in cell_points(&geo) {
            let v = b.interpolate(&ql);
            let w = v.grad[1][0] - v.grad[0][1];
            for k in 0..3 {
                rhs[cell[k]] += b.w * w * b.psi[k];
            }
        }
    }
    let lu = SparseLu::from_matrix(&p1_mass(space))?;
    Ok(NamedField::new("vort", lu.solve_vec(&rhs)))
}

/// Largest `|u| dt / h` over all cells, with `h` the longest cell edge
pub fn max_cfl(space: &MixedSpace, state: &MixedState, dt: f64) -> f64 {
    let mesh = space.mesh();
    let u = state.velocity();
    let mut cfl: f64 = 0.;
    for c in 0..mesh.num_cells() {
        let h = CellGeometry::new(mesh.cell_coords(c)).diameter();
        for node in space.velocity_cell_nodes(c).iter() {
            let [ux, uy] = u.at(*node);
            cfl = cfl.max((ux * ux + uy * uy).sqrt() * dt / h);
        }
    }
    cfl
}

fn energy(space: &MixedSpace, q: &Array1<f64>) -> f64 {
    let mesh = space.mesh();
    let mut energy = 0.;
    for c in 0..mesh.num_cells() {
        let ql = gather(q, &space.cell_dofs(c));
        let geo = CellGeometry::new(mesh.cell_coords(c));
        for b in cell_points(&geo) {
            let v = b.interpolate(&ql);
            energy += 0.5 * b.w * (v.u[0] * v.u[0] + v.u[1] * v.u[1]);
        }
    }
    energy
}

/// $\frac{1}{2} \int |u|^2$
pub fn kinetic_energy(space: &MixedSpace, state: &MixedState) -> f64 {
    energy(space, state.as_array())
}

/// Energy of the fluctuation about a base flow, $\frac{1}{2} \int |u - u_B|^2$
///
/// # Errors
/// `base` has a different size than `state`
pub fn fluctuation_energy(space: &MixedSpace, state: &MixedState, base: &MixedState) -> Result<f64> {
    if base.len() != state.len() {
        return Err(FlowError::Configuration(format!(
            "base flow of size {} does not fit state of size {}",
            base.len(),
            state.len()
        )));
    }
    Ok(energy(space, &(state.as_array() - base.as_array())))
}

/// Perturb the free velocity unknowns of the current state with uniform
/// noise in `[-amp, amp]`; boundary values are left untouched.
///
/// # Errors
/// Negative or non-finite amplitude, or missing boundary conditions
pub fn random_disturbance<F: Flow + ?Sized>(flow: &mut F, amp: f64) -> Result<()> {
    if !amp.is_finite() || amp < 0. {
        return Err(FlowError::Configuration(format!(
            "disturbance amplitude must be finite and non-negative, got {}",
            amp
        )));
    }
    flow.init_bcs(true)?;
    let constraints = {
        let bcs = flow.collect_bcs()?;
        Constraints::new(flow.core().space().len(), &bcs)
    };
    let nvel = 2 * flow.core().space().velocity_nodes();
    let mut noise: Array1<f64> = Array1::random(nvel, Uniform::new_inclusive(-amp, amp));
    for (i, &m) in constraints.mask()[..nvel].iter().enumerate() {
        if m {
            noise[i] = 0.;
        }
    }
    let mut u = flow.core_mut().state_mut().as_array_mut().slice_mut(s![..nvel]);
    u += &noise;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{FlowConfig, FlowKind};
    use crate::fem::Field;
    use crate::flow::FlowVariant;
    use crate::mesh::{breaks, Lattice};
    use std::sync::Arc;

    fn square() -> MixedSpace {
        let mesh = Lattice::new(breaks(&[(0., 1., 4)], 1), breaks(&[(0., 1., 4)], 1))
            .build(|_| Some(1))
            .unwrap();
        MixedSpace::new(Arc::new(mesh))
    }

    fn square_coarse() -> MixedSpace {
        let mesh = Lattice::new(breaks(&[(0., 1., 2)], 1), breaks(&[(0., 1., 2)], 1))
            .build(|_| Some(1))
            .unwrap();
        MixedSpace::new(Arc::new(mesh))
    }

    fn state_from<G: Fn([f64; 2]) -> [f64; 2]>(space: &MixedSpace, f: G) -> MixedState {
        let n2 = space.velocity_nodes();
        let mut q = Array1::zeros(space.len());
        for i in 0..n2 {
            let u = f(space.node_coords(Field::Velocity, i));
            q[i] = u[0];
            q[n2 + i] = u[1];
        }
        MixedState::from_array(space, q).unwrap()
    }

    #[test]
    fn test_rigid_rotation_vorticity() {
        // u = (-y, x) has vorticity 2 everywhere
        let space = square();
        let state = state_from(&space, |x| [-x[1], x[0]]);
        let w = vorticity(&space, &state).unwrap();
        assert_eq!(w.name, "vort");
        for v in w.values.iter() {
            assert!((v - 2.).abs() < 1e-10, "{}", v);
        }
    }

    #[test]
    fn test_kinetic_energy_of_uniform_flow() {
        let space = square();
        let state = state_from(&space, |_| [2., 0.]);
        assert!((kinetic_energy(&space, &state) - 2.).abs() < 1e-12);
    }

    #[test]
    fn test_fluctuation_energy() {
        let space = square();
        let state = state_from(&space, |x| [2., x[0]]);
        let zero = MixedState::zeros(&space);
        let e = fluctuation_energy(&space, &state, &zero).unwrap();
        assert!((e - kinetic_energy(&space, &state)).abs() < 1e-14);
        assert!(fluctuation_energy(&space, &state, &state).unwrap().abs() < 1e-14);
        // u - u_B = (1, 0) on the unit square
        let base = state_from(&space, |x| [1., x[0]]);
        let e = fluctuation_energy(&space, &state, &base).unwrap();
        assert!((e - 0.5).abs() < 1e-12);
        let other = MixedState::zeros(&square_coarse());
        assert!(fluctuation_energy(&space, &state, &other).is_err());
    }

    #[test]
    fn test_cfl_scales_with_dt() {
        let space = square();
        let state = state_from(&space, |_| [1., 0.]);
        let a = max_cfl(&space, &state, 0.1);
        let b = max_cfl(&space, &state, 0.2);
        assert!(a > 0.);
        assert!((b - 2. * a).abs() < 1e-14);
    }

    #[test]
    fn test_random_disturbance_rejects_bad_amplitude() {
        let mut flow = FlowVariant::new(&FlowConfig::new(FlowKind::Step)).unwrap();
        for &amp in &[f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -0.1] {
            assert!(matches!(
                flow.random_disturbance(amp),
                Err(FlowError::Configuration(_))
            ));
        }
        assert!(flow.state().as_array().iter().all(|v| *v == 0.));
        flow.random_disturbance(0.).unwrap();
    }
}
