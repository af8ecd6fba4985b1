//! Taylor-Hood function spaces
//!
//! Velocity: continuous vector P2, nodes are the mesh vertices followed by
//! the edge midpoints. Pressure: continuous P1 on the vertices. The mixed
//! space orders its unknowns `[u_x | u_y | p]`.
use crate::mesh::{Mesh, Tag};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Component of the mixed space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Vector valued, quadratic
    Velocity,
    /// Scalar, linear
    Pressure,
}

/// Position of a field inside a (mixed or standalone) coefficient vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubSpace {
    /// Which field
    pub field: Field,
    /// Index of the first unknown of the field
    pub offset: usize,
    /// Number of nodes (velocity components are `nodes` apart)
    pub nodes: usize,
}

impl SubSpace {
    /// Global index of component `comp` at node `node`
    pub fn dof(&self, node: usize, comp: usize) -> usize {
        self.offset + comp * self.nodes + node
    }

    /// Number of components
    pub fn components(&self) -> usize {
        match self.field {
            Field::Velocity => 2,
            Field::Pressure => 1,
        }
    }
}

/// Mixed P2-P1 space over a mesh
#[derive(Debug, Clone)]
pub struct MixedSpace {
    mesh: Arc<Mesh>,
    n2: usize,
    n1: usize,
}

impl MixedSpace {
    /// Build spaces over `mesh`
    pub fn new(mesh: Arc<Mesh>) -> Self {
        let n1 = mesh.num_vertices();
        let n2 = n1 + mesh.num_edges();
        Self { mesh, n2, n1 }
    }

    /// Underlying mesh
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Number of velocity nodes
    pub fn velocity_nodes(&self) -> usize {
        self.n2
    }

    /// Number of pressure nodes
    pub fn pressure_nodes(&self) -> usize {
        self.n1
    }

    /// Size of the mixed coefficient vector
    pub fn len(&self) -> usize {
        2 * self.n2 + self.n1
    }

    /// Never empty for a valid mesh
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Velocity and pressure positions, inside the mixed vector
    /// (`mixed = true`) or as standalone spaces
    pub fn function_spaces(&self, mixed: bool) -> (SubSpace, SubSpace) {
        let velocity = SubSpace {
            field: Field::Velocity,
            offset: 0,
            nodes: self.n2,
        };
        let pressure = SubSpace {
            field: Field::Pressure,
            offset: if mixed { 2 * self.n2 } else { 0 },
            nodes: self.n1,
        };
        (velocity, pressure)
    }

    /// P2 nodes of cell `c`
    pub fn velocity_cell_nodes(&self, c: usize) -> [usize; 6] {
        let v = self.mesh.cell(c);
        let e = self.mesh.cell_edges(c);
        let nv = self.n1;
        [v[0], v[1], v[2], nv + e[0], nv + e[1], nv + e[2]]
    }

    /// Mixed indices of the 15 unknowns of cell `c`: six `u_x`, six `u_y`,
    /// three `p`
    pub fn cell_dofs(&self, c: usize) -> [usize; 15] {
        let nodes = self.velocity_cell_nodes(c);
        let v = self.mesh.cell(c);
        let mut dofs = [0; 15];
        for i in 0..6 {
            dofs[i] = nodes[i];
            dofs[6 + i] = self.n2 + nodes[i];
        }
        for i in 0..3 {
            dofs[12 + i] = 2 * self.n2 + v[i];
        }
        dofs
    }

    /// Coordinates of a node of `field`
    pub fn node_coords(&self, field: Field, node: usize) -> [f64; 2] {
        let nv = self.n1;
        if field == Field::Pressure || node < nv {
            self.mesh.vertex(node)
        } else {
            let [a, b] = self.mesh.edge(node - nv);
            let (pa, pb) = (self.mesh.vertex(a), self.mesh.vertex(b));
            [0.5 * (pa[0] + pb[0]), 0.5 * (pa[1] + pb[1])]
        }
    }

    /// Nodes of `field` on the boundary facets tagged `tags`, sorted
    pub fn boundary_nodes(&self, field: Field, tags: &[Tag]) -> Vec<usize> {
        let mut nodes = BTreeSet::new();
        for f in self.mesh.facets_with_tags(tags) {
            let [a, b] = self.mesh.facet_vertices(f);
            nodes.insert(a);
            nodes.insert(b);
            if field == Field::Velocity {
                nodes.insert(self.n1 + self.mesh.facet_edge(f));
            }
        }
        nodes.into_iter().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::{breaks, Lattice};

    fn space() -> MixedSpace {
        let mesh = Lattice::new(breaks(&[(0., 2., 2)], 1), breaks(&[(0., 1., 1)], 1))
            .build(|x| if x[1].abs() < 1e-9 { Some(1) } else { Some(2) })
            .unwrap();
        MixedSpace::new(Arc::new(mesh))
    }

    #[test]
    fn test_sizes() {
        let s = space();
        // 6 vertices, 9 edges
        assert_eq!(s.pressure_nodes(), 6);
        assert_eq!(s.velocity_nodes(), 15);
        assert_eq!(s.len(), 36);
        let (v, p) = s.function_spaces(true);
        assert_eq!(p.dof(3, 0), 33);
        assert_eq!(v.dof(3, 1), 18);
        assert_eq!(s.function_spaces(false).1.offset, 0);
    }

    #[test]
    fn test_boundary_nodes() {
        let s = space();
        // bottom: 3 vertices + 2 midpoints
        let nodes = s.boundary_nodes(Field::Velocity, &[1]);
        assert_eq!(nodes.len(), 5);
        for n in &nodes {
            assert!(s.node_coords(Field::Velocity, *n)[1].abs() < 1e-12);
        }
        assert_eq!(s.boundary_nodes(Field::Pressure, &[1]).len(), 3);
    }

    #[test]
    fn test_cell_dofs() {
        let s = space();
        let dofs = s.cell_dofs(0);
        assert_eq!(dofs[6], dofs[0] + 15);
        assert!(dofs[12] >= 30);
    }
}
