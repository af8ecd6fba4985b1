//! # Triangle meshes with tagged boundaries
//!
//! Cells are vertex triples with positive orientation. Local edge `e` of a
//! cell joins its vertices `e` and `(e + 1) % 3`. Every edge gets a global
//! number, which the quadratic elements use for their midpoint nodes.
//! Boundary facets are stored as `(cell, local edge, tag)`.
pub mod lattice;
pub use lattice::{breaks, CircleBody, Lattice};

use crate::error::{FlowError, Result};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Boundary region identifier
pub type Tag = u32;

/// Cells with smaller (doubled) area are rejected
const MIN_DET: f64 = 1e-14;

/// A boundary edge, seen from the cell that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryFacet {
    /// Owning cell
    pub cell: usize,
    /// Local edge number in that cell
    pub local: usize,
    /// Boundary region
    pub tag: Tag,
}

/// Serializable mesh description, see [`Mesh::to_data`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshData {
    /// Geometric dimension, always 2
    pub dim: usize,
    /// Cell shape, always "triangle"
    pub cell_type: String,
    /// Vertex coordinates (n, 2)
    pub vertices: Array2<f64>,
    /// Vertex indices of each cell
    pub cells: Vec<[usize; 3]>,
    /// Tagged boundary facets
    pub facets: Vec<BoundaryFacet>,
}

/// Unstructured 2-D triangle mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Array2<f64>,
    cells: Vec<[usize; 3]>,
    facets: Vec<BoundaryFacet>,
    edges: Vec<[usize; 2]>,
    cell_edges: Vec<[usize; 3]>,
}

impl Mesh {
    /// Build mesh, derive edges and validate the boundary
    ///
    /// # Errors
    /// Bad vertex indices, degenerate or negatively oriented cells,
    /// facets that are not on the boundary
    pub fn new(
        vertices: Array2<f64>,
        cells: Vec<[usize; 3]>,
        facets: Vec<BoundaryFacet>,
    ) -> Result<Self> {
        let bad = |msg: String| Err(FlowError::Configuration(msg));
        if vertices.ncols() != 2 {
            return bad(format!("expected 2-D vertices, got {}", vertices.ncols()));
        }
        let nv = vertices.nrows();
        let mut edge_ids: HashMap<[usize; 2], usize> = HashMap::new();
        let mut edges = Vec::new();
        let mut edge_cells: Vec<usize> = Vec::new();
        let mut cell_edges = Vec::with_capacity(cells.len());
        for (c, cell) in cells.iter().enumerate() {
            if cell.iter().any(|&v| v >= nv) {
                return bad(format!("cell {} references a missing vertex", c));
            }
            let det = signed_det(&vertices, cell);
            if det < MIN_DET {
                return bad(format!("cell {} is degenerate or clockwise", c));
            }
            let mut ce = [0; 3];
            for (e, slot) in ce.iter_mut().enumerate() {
                let (a, b) = (cell[e], cell[(e + 1) % 3]);
                let key = [a.min(b), a.max(b)];
                let id = *edge_ids.entry(key).or_insert_with(|| {
                    edges.push(key);
                    edge_cells.push(0);
                    edges.len() - 1
                });
                edge_cells[id] += 1;
                *slot = id;
            }
            cell_edges.push(ce);
        }
        for f in &facets {
            if f.cell >= cells.len() || f.local > 2 {
                return bad(format!("facet {:?} does not exist", f));
            }
            if edge_cells[cell_edges[f.cell][f.local]] != 1 {
                return bad(format!("facet {:?} is an interior edge", f));
            }
        }
        Ok(Self {
            vertices,
            cells,
            facets,
            edges,
            cell_edges,
        })
    }

    /// Rebuild from serialized data
    ///
    /// # Errors
    /// Wrong dimension, cell type or inconsistent topology
    pub fn from_data(data: MeshData) -> Result<Self> {
        if data.dim != 2 || data.cell_type != "triangle" {
            return Err(FlowError::Checkpoint(format!(
                "expected a 2-D triangle mesh, got dim={} cells={}",
                data.dim, data.cell_type
            )));
        }
        Self::new(data.vertices, data.cells, data.facets).map_err(|e| match e {
            FlowError::Configuration(msg) => FlowError::Checkpoint(msg),
            other => other,
        })
    }

    /// Serializable copy
    pub fn to_data(&self) -> MeshData {
        MeshData {
            dim: 2,
            cell_type: "triangle".to_string(),
            vertices: self.vertices.clone(),
            cells: self.cells.clone(),
            facets: self.facets.clone(),
        }
    }

    /// Number of vertices
    pub fn num_vertices(&self) -> usize {
        self.vertices.nrows()
    }

    /// Number of cells
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of edges
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Coordinates of vertex `v`
    pub fn vertex(&self, v: usize) -> [f64; 2] {
        [self.vertices[[v, 0]], self.vertices[[v, 1]]]
    }

    /// Vertex coordinates (n, 2)
    pub fn vertices(&self) -> ArrayView2<f64> {
        self.vertices.view()
    }

    /// Vertices of cell `c`
    pub fn cell(&self, c: usize) -> [usize; 3] {
        self.cells[c]
    }

    /// Global edge numbers of cell `c`
    pub fn cell_edges(&self, c: usize) -> [usize; 3] {
        self.cell_edges[c]
    }

    /// Vertex pair of edge `e`
    pub fn edge(&self, e: usize) -> [usize; 2] {
        self.edges[e]
    }

    /// Corner coordinates of cell `c`
    pub fn cell_coords(&self, c: usize) -> [[f64; 2]; 3] {
        let cell = self.cells[c];
        [
            self.vertex(cell[0]),
            self.vertex(cell[1]),
            self.vertex(cell[2]),
        ]
    }

    /// All boundary facets
    pub fn facets(&self) -> &[BoundaryFacet] {
        &self.facets
    }

    /// Boundary facets carrying one of `tags`
    pub fn facets_with_tags<'a>(
        &'a self,
        tags: &'a [Tag],
    ) -> impl Iterator<Item = &'a BoundaryFacet> + 'a {
        self.facets.iter().filter(move |f| tags.contains(&f.tag))
    }

    /// Vertices of a boundary facet, in cell order
    pub fn facet_vertices(&self, f: &BoundaryFacet) -> [usize; 2] {
        let cell = self.cells[f.cell];
        [cell[f.local], cell[(f.local + 1) % 3]]
    }

    /// Global edge of a boundary facet
    pub fn facet_edge(&self, f: &BoundaryFacet) -> usize {
        self.cell_edges[f.cell][f.local]
    }

    /// Distinct boundary tags
    pub fn tags(&self) -> BTreeSet<Tag> {
        self.facets.iter().map(|f| f.tag).collect()
    }

    /// Fails unless every tag in `required` is present
    ///
    /// # Errors
    /// Missing tag
    pub fn require_tags(&self, required: &[Tag]) -> Result<()> {
        let present = self.tags();
        match required.iter().find(|t| !present.contains(t)) {
            Some(t) => Err(FlowError::Configuration(format!(
                "mesh has no boundary facets tagged {}",
                t
            ))),
            None => Ok(()),
        }
    }

    /// Total area
    pub fn area(&self) -> f64 {
        self.cells
            .iter()
            .map(|cell| 0.5 * signed_det(&self.vertices, cell))
            .sum()
    }

    /// Total length of the boundary facets with tag `tag`
    pub fn boundary_length(&self, tag: Tag) -> f64 {
        self.facets_with_tags(&[tag])
            .map(|f| {
                let [a, b] = self.facet_vertices(f);
                let (pa, pb) = (self.vertex(a), self.vertex(b));
                (pb[0] - pa[0]).hypot(pb[1] - pa[1])
            })
            .sum()
    }
}

fn signed_det(vertices: &Array2<f64>, cell: &[usize; 3]) -> f64 {
    let p = |i: usize| (vertices[[cell[i], 0]], vertices[[cell[i], 1]]);
    let (x0, y0) = p(0);
    let (x1, y1) = p(1);
    let (x2, y2) = p(2);
    (x1 - x0) * (y2 - y0) - (x2 - x0) * (y1 - y0)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Unit square split along the diagonal
    fn square() -> Mesh {
        let vertices = array![[0., 0.], [1., 0.], [1., 1.], [0., 1.]];
        let cells = vec![[0, 1, 2], [0, 2, 3]];
        let facets = vec![
            BoundaryFacet { cell: 0, local: 0, tag: 1 },
            BoundaryFacet { cell: 0, local: 1, tag: 2 },
            BoundaryFacet { cell: 1, local: 1, tag: 1 },
            BoundaryFacet { cell: 1, local: 2, tag: 3 },
        ];
        Mesh::new(vertices, cells, facets).unwrap()
    }

    #[test]
    fn test_topology() {
        let mesh = square();
        assert_eq!(mesh.num_edges(), 5);
        assert!((mesh.area() - 1.).abs() < 1e-14);
        assert!((mesh.boundary_length(1) - 2.).abs() < 1e-14);
        assert_eq!(mesh.tags().into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        // shared diagonal
        assert_eq!(mesh.cell_edges(0)[2], mesh.cell_edges(1)[0]);
    }

    #[test]
    fn test_interior_facet_rejected() {
        let vertices = array![[0., 0.], [1., 0.], [1., 1.], [0., 1.]];
        let facets = vec![BoundaryFacet { cell: 0, local: 2, tag: 1 }];
        let result = Mesh::new(vertices, vec![[0, 1, 2], [0, 2, 3]], facets);
        assert!(matches!(result, Err(FlowError::Configuration(_))));
    }

    #[test]
    fn test_clockwise_rejected() {
        let vertices = array![[0., 0.], [1., 0.], [1., 1.]];
        assert!(Mesh::new(vertices, vec![[0, 2, 1]], vec![]).is_err());
    }

    #[test]
    fn test_data_roundtrip() {
        let mesh = square();
        let json = serde_json::to_string(&mesh.to_data()).unwrap();
        let data: MeshData = serde_json::from_str(&json).unwrap();
        let back = Mesh::from_data(data).unwrap();
        assert_eq!(back.num_cells(), 2);
        assert_eq!(back.facets(), mesh.facets());
    }

    #[test]
    fn test_wrong_dimension_is_checkpoint_error() {
        let mut data = square().to_data();
        data.dim = 3;
        assert!(matches!(
            Mesh::from_data(data),
            Err(FlowError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_require_tags() {
        let mesh = square();
        assert!(mesh.require_tags(&[1, 3]).is_ok());
        assert!(mesh.require_tags(&[4]).is_err());
    }
}
