//! Structured background lattice with circular holes
//!
//! The domain is a rectangle divided by the break points `xs` and `ys`.
//! Lattice cells become two triangles each (alternating diagonals). A
//! circular body occupies a box of lattice cells; that box is replaced by an
//! O-grid whose outer ring is the box perimeter and whose inner ring lies
//! on the circle. Boxes of solid lattice cells can be cut out as well.
use super::{BoundaryFacet, Mesh, Tag};
use crate::error::{FlowError, Result};
use ndarray::Array2;
use std::collections::HashMap;

/// Tolerance when locating coordinates on the lattice
const SNAP: f64 = 1e-9;

/// Piecewise uniform break points. Each segment `(start, end, n)` is split
/// into `n * refine` intervals.
pub fn breaks(segments: &[(f64, f64, usize)], refine: usize) -> Vec<f64> {
    let mut points: Vec<f64> = Vec::new();
    for &(a, b, n) in segments {
        let n = n * refine.max(1);
        for i in 0..=n {
            let x = a + (b - a) * i as f64 / n as f64;
            if points.last().map_or(true, |&last| (x - last).abs() > SNAP) {
                points.push(x);
            }
        }
    }
    points
}

/// Circular hole meshed with an O-grid
#[derive(Debug, Clone)]
pub struct CircleBody {
    /// Center
    pub center: [f64; 2],
    /// Radius
    pub radius: f64,
    /// Tag of the circle facets
    pub tag: Tag,
    /// Box `[x0, x1, y0, y1]`, must lie on lattice lines
    pub bbox: [f64; 4],
    /// Number of radial cell layers
    pub layers: usize,
}

/// Lattice mesher
#[derive(Debug, Clone)]
pub struct Lattice {
    xs: Vec<f64>,
    ys: Vec<f64>,
    bodies: Vec<CircleBody>,
    solids: Vec<[f64; 4]>,
}

impl Lattice {
    /// Lattice spanned by break points
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        Self {
            xs,
            ys,
            bodies: vec![],
            solids: vec![],
        }
    }

    /// Add a circular body
    pub fn with_body(mut self, body: CircleBody) -> Self {
        self.bodies.push(body);
        self
    }

    /// Remove the lattice cells inside `[x0, x1, y0, y1]`
    pub fn with_solid(mut self, bbox: [f64; 4]) -> Self {
        self.solids.push(bbox);
        self
    }

    fn locate(points: &[f64], x: f64) -> Result<usize> {
        points
            .iter()
            .position(|&p| (p - x).abs() < SNAP)
            .ok_or_else(|| {
                FlowError::Configuration(format!("{} is not a lattice coordinate", x))
            })
    }

    fn index_box(&self, bbox: &[f64; 4]) -> Result<[usize; 4]> {
        let i0 = Self::locate(&self.xs, bbox[0])?;
        let i1 = Self::locate(&self.xs, bbox[1])?;
        let j0 = Self::locate(&self.ys, bbox[2])?;
        let j1 = Self::locate(&self.ys, bbox[3])?;
        if i1 <= i0 || j1 <= j0 {
            return Err(FlowError::Configuration(format!("empty box {:?}", bbox)));
        }
        Ok([i0, i1, j0, j1])
    }

    /// Triangulate. Circle facets get the body tag, every other boundary
    /// facet is tagged by `classify(midpoint)`.
    ///
    /// # Errors
    /// Boxes off the lattice, bodies not inside their box, or boundary
    /// facets that `classify` cannot place
    pub fn build<F>(&self, classify: F) -> Result<Mesh>
    where
        F: Fn([f64; 2]) -> Option<Tag>,
    {
        let (nx, ny) = (self.xs.len(), self.ys.len());
        if nx < 2 || ny < 2 {
            return Err(FlowError::Configuration("lattice needs two breaks per axis".into()));
        }
        let mut builder = Builder::default();
        let mut blocked = vec![false; (nx - 1) * (ny - 1)];
        let mut block = |b: [usize; 4]| {
            for i in b[0]..b[1] {
                for j in b[2]..b[3] {
                    blocked[i * (ny - 1) + j] = true;
                }
            }
        };
        for solid in &self.solids {
            block(self.index_box(solid)?);
        }
        let body_boxes = self
            .bodies
            .iter()
            .map(|b| self.index_box(&b.bbox))
            .collect::<Result<Vec<_>>>()?;
        for b in &body_boxes {
            block(*b);
        }

        // background
        let mut lattice_ids: HashMap<(usize, usize), usize> = HashMap::new();
        let mut lattice_vertex = |builder: &mut Builder, i: usize, j: usize| -> usize {
            *lattice_ids
                .entry((i, j))
                .or_insert_with(|| builder.vertex([self.xs[i], self.ys[j]]))
        };
        for i in 0..nx - 1 {
            for j in 0..ny - 1 {
                if blocked[i * (ny - 1) + j] {
                    continue;
                }
                let v00 = lattice_vertex(&mut builder, i, j);
                let v10 = lattice_vertex(&mut builder, i + 1, j);
                let v11 = lattice_vertex(&mut builder, i + 1, j + 1);
                let v01 = lattice_vertex(&mut builder, i, j + 1);
                if (i + j) % 2 == 0 {
                    builder.triangle([v00, v10, v11]);
                    builder.triangle([v00, v11, v01]);
                } else {
                    builder.triangle([v00, v10, v01]);
                    builder.triangle([v10, v11, v01]);
                }
            }
        }

        // O-grids
        let mut circle_edges: HashMap<[usize; 2], Tag> = HashMap::new();
        for (body, b) in self.bodies.iter().zip(body_boxes.iter()) {
            let [i0, i1, j0, j1] = *b;
            let mut perimeter: Vec<(usize, usize)> = Vec::new();
            perimeter.extend((i0..i1).map(|i| (i, j0)));
            perimeter.extend((j0..j1).map(|j| (i1, j)));
            perimeter.extend((i0 + 1..=i1).rev().map(|i| (i, j1)));
            perimeter.extend((j0 + 1..=j1).rev().map(|j| (i0, j)));
            let layers = body.layers.max(1);
            let c = body.center;
            let mut rings: Vec<Vec<usize>> = vec![Vec::with_capacity(perimeter.len()); layers + 1];
            for &(i, j) in &perimeter {
                let p = [self.xs[i], self.ys[j]];
                let theta = (p[1] - c[1]).atan2(p[0] - c[0]);
                let q = [
                    c[0] + body.radius * theta.cos(),
                    c[1] + body.radius * theta.sin(),
                ];
                if (p[0] - c[0]).hypot(p[1] - c[1]) <= body.radius + SNAP {
                    return Err(FlowError::Configuration(format!(
                        "body at {:?} does not fit inside its box",
                        c
                    )));
                }
                for (l, ring) in rings.iter_mut().enumerate() {
                    let id = if l == layers {
                        lattice_vertex(&mut builder, i, j)
                    } else {
                        let s = l as f64 / layers as f64;
                        builder.vertex([q[0] + s * (p[0] - q[0]), q[1] + s * (p[1] - q[1])])
                    };
                    ring.push(id);
                }
            }
            let m = perimeter.len();
            for l in 0..layers {
                for k in 0..m {
                    let kn = (k + 1) % m;
                    let (a, b) = (rings[l][k], rings[l][kn]);
                    let (c2, d) = (rings[l + 1][kn], rings[l + 1][k]);
                    builder.triangle([a, b, c2]);
                    builder.triangle([a, c2, d]);
                }
            }
            for k in 0..m {
                let (a, b) = (rings[0][k], rings[0][(k + 1) % m]);
                circle_edges.insert([a.min(b), a.max(b)], body.tag);
            }
        }
        builder.finish(&circle_edges, classify)
    }
}

#[derive(Default)]
struct Builder {
    vertices: Vec<[f64; 2]>,
    cells: Vec<[usize; 3]>,
}

impl Builder {
    fn vertex(&mut self, x: [f64; 2]) -> usize {
        self.vertices.push(x);
        self.vertices.len() - 1
    }

    /// Add triangle with positive orientation
    fn triangle(&mut self, t: [usize; 3]) {
        let [a, b, c] = t;
        let (pa, pb, pc) = (self.vertices[a], self.vertices[b], self.vertices[c]);
        let det = (pb[0] - pa[0]) * (pc[1] - pa[1]) - (pc[0] - pa[0]) * (pb[1] - pa[1]);
        if det > 0. {
            self.cells.push([a, b, c]);
        } else {
            self.cells.push([a, c, b]);
        }
    }

    fn finish<F>(self, circle_edges: &HashMap<[usize; 2], Tag>, classify: F) -> Result<Mesh>
    where
        F: Fn([f64; 2]) -> Option<Tag>,
    {
        let mut count: HashMap<[usize; 2], usize> = HashMap::new();
        for cell in &self.cells {
            for e in 0..3 {
                let (a, b) = (cell[e], cell[(e + 1) % 3]);
                *count.entry([a.min(b), a.max(b)]).or_insert(0) += 1;
            }
        }
        let mut facets = Vec::new();
        for (c, cell) in self.cells.iter().enumerate() {
            for e in 0..3 {
                let (a, b) = (cell[e], cell[(e + 1) % 3]);
                let key = [a.min(b), a.max(b)];
                if count[&key] != 1 {
                    continue;
                }
                let tag = match circle_edges.get(&key) {
                    Some(&t) => t,
                    None => {
                        let (pa, pb) = (self.vertices[a], self.vertices[b]);
                        let mid = [0.5 * (pa[0] + pb[0]), 0.5 * (pa[1] + pb[1])];
                        classify(mid).ok_or_else(|| {
                            FlowError::Configuration(format!(
                                "boundary facet at ({:.4}, {:.4}) has no tag",
                                mid[0], mid[1]
                            ))
                        })?
                    }
                };
                facets.push(BoundaryFacet { cell: c, local: e, tag });
            }
        }
        let mut vertices = Array2::zeros((self.vertices.len(), 2));
        for (i, v) in self.vertices.iter().enumerate() {
            vertices[[i, 0]] = v[0];
            vertices[[i, 1]] = v[1];
        }
        Mesh::new(vertices, self.cells, facets)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn box_tags(x: [f64; 2]) -> Option<Tag> {
        if x[0].abs() < 1e-9 || (x[0] - 4.).abs() < 1e-9 {
            Some(1)
        } else if x[1].abs() < 1e-9 || (x[1] - 2.).abs() < 1e-9 {
            Some(2)
        } else {
            None
        }
    }

    #[test]
    fn test_breaks() {
        let b = breaks(&[(0., 1., 2), (1., 3., 2)], 2);
        assert_eq!(b.len(), 9);
        assert!((b[4] - 1.).abs() < 1e-14);
        assert!((b[8] - 3.).abs() < 1e-14);
    }

    #[test]
    fn test_plain_lattice() {
        let mesh = Lattice::new(breaks(&[(0., 4., 4)], 1), breaks(&[(0., 2., 2)], 1))
            .build(box_tags)
            .unwrap();
        assert_eq!(mesh.num_cells(), 16);
        assert_eq!(mesh.num_vertices(), 15);
        assert!((mesh.area() - 8.).abs() < 1e-12);
        assert!((mesh.boundary_length(1) - 4.).abs() < 1e-12);
        assert!((mesh.boundary_length(2) - 8.).abs() < 1e-12);
    }

    #[test]
    fn test_lattice_with_body_and_solid() {
        let body = CircleBody {
            center: [1., 1.],
            radius: 0.3,
            tag: 7,
            bbox: [0.5, 1.5, 0.5, 1.5],
            layers: 2,
        };
        let mesh = Lattice::new(breaks(&[(0., 4., 8)], 1), breaks(&[(0., 2., 4)], 1))
            .with_body(body)
            .with_solid([3., 4., 0., 0.5])
            .build(|x| {
                box_tags(x).or_else(|| {
                    // faces of the solid notch
                    if (x[0] - 3.).abs() < 1e-9 || (x[1] - 0.5).abs() < 1e-9 {
                        Some(3)
                    } else {
                        None
                    }
                })
            })
            .unwrap();
        let circle = std::f64::consts::PI * 0.3 * 0.3;
        let expected = 8. - 0.5 - circle;
        // inscribed 8-gon is smaller than the circle
        assert!(mesh.area() > expected && mesh.area() < expected + 0.05);
        let perimeter = mesh.boundary_length(7);
        assert!(perimeter < 2. * std::f64::consts::PI * 0.3 && perimeter > 1.6);
        assert!((mesh.boundary_length(3) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_unclassified_facet() {
        let result = Lattice::new(vec![0., 1.], vec![0., 1.]).build(|_| None);
        assert!(matches!(result, Err(FlowError::Configuration(_))));
    }

    #[test]
    fn test_box_off_lattice() {
        let body = CircleBody {
            center: [1., 1.],
            radius: 0.3,
            tag: 7,
            bbox: [0.55, 1.5, 0.5, 1.5],
            layers: 1,
        };
        let result = Lattice::new(breaks(&[(0., 4., 8)], 1), breaks(&[(0., 2., 4)], 1))
            .with_body(body)
            .build(box_tags);
        assert!(result.is_err());
    }
}
