//! Lagrange basis functions on triangles
//!
//! Local P2 nodes are the three vertices followed by the midpoints of local
//! edges (0,1), (1,2) and (2,0).
//! $$
//! \phi_i = \lambda_i (2 \lambda_i - 1), \quad
//! \phi_{3+e} = 4 \lambda_e \lambda_{e+1}
//! $$

/// Affine geometry of one cell
#[derive(Debug, Clone, Copy)]
pub struct CellGeometry {
    /// Corner coordinates
    pub x: [[f64; 2]; 3],
    /// Twice the signed area
    pub det: f64,
    /// Gradients of the barycentric coordinates
    pub grad_lambda: [[f64; 2]; 3],
}

impl CellGeometry {
    /// Geometry of the triangle with corners `x`
    pub fn new(x: [[f64; 2]; 3]) -> Self {
        let det = (x[1][0] - x[0][0]) * (x[2][1] - x[0][1])
            - (x[2][0] - x[0][0]) * (x[1][1] - x[0][1]);
        let g1 = [(x[2][1] - x[0][1]) / det, -(x[2][0] - x[0][0]) / det];
        let g2 = [-(x[1][1] - x[0][1]) / det, (x[1][0] - x[0][0]) / det];
        let g0 = [-g1[0] - g2[0], -g1[1] - g2[1]];
        Self {
            x,
            det,
            grad_lambda: [g0, g1, g2],
        }
    }

    /// Area
    pub fn area(&self) -> f64 {
        0.5 * self.det.abs()
    }

    /// Physical point of barycentric coordinates `l`
    pub fn point(&self, l: &[f64; 3]) -> [f64; 2] {
        [
            l[0] * self.x[0][0] + l[1] * self.x[1][0] + l[2] * self.x[2][0],
            l[0] * self.x[0][1] + l[1] * self.x[1][1] + l[2] * self.x[2][1],
        ]
    }

    /// Length of local edge `e`
    pub fn edge_length(&self, e: usize) -> f64 {
        let (a, b) = (self.x[e], self.x[(e + 1) % 3]);
        (b[0] - a[0]).hypot(b[1] - a[1])
    }

    /// Longest edge
    pub fn diameter(&self) -> f64 {
        (0..3).map(|e| self.edge_length(e)).fold(0., f64::max)
    }

    /// Unit normal of local edge `e`, pointing out of the cell
    pub fn outward_normal(&self, e: usize) -> [f64; 2] {
        let (a, b) = (self.x[e], self.x[(e + 1) % 3]);
        let len = self.edge_length(e);
        let n = [(b[1] - a[1]) / len, -(b[0] - a[0]) / len];
        if self.det > 0. {
            n
        } else {
            [-n[0], -n[1]]
        }
    }

    /// Barycentric coordinates of the point at parameter `t` along local edge `e`
    pub fn edge_point(e: usize, t: f64) -> [f64; 3] {
        let mut l = [0.; 3];
        l[e] = 1. - t;
        l[(e + 1) % 3] = t;
        l
    }
}

/// Values of the six quadratic basis functions
pub fn p2_values(l: &[f64; 3]) -> [f64; 6] {
    [
        l[0] * (2. * l[0] - 1.),
        l[1] * (2. * l[1] - 1.),
        l[2] * (2. * l[2] - 1.),
        4. * l[0] * l[1],
        4. * l[1] * l[2],
        4. * l[2] * l[0],
    ]
}

/// Physical gradients of the six quadratic basis functions
pub fn p2_gradients(l: &[f64; 3], g: &[[f64; 2]; 3]) -> [[f64; 2]; 6] {
    let mut d = [[0.; 2]; 6];
    for k in 0..2 {
        for i in 0..3 {
            d[i][k] = (4. * l[i] - 1.) * g[i][k];
        }
        for e in 0..3 {
            let f = (e + 1) % 3;
            d[3 + e][k] = 4. * (l[e] * g[f][k] + l[f] * g[e][k]);
        }
    }
    d
}

#[cfg(test)]
mod test {
    use super::*;

    fn geometry() -> CellGeometry {
        CellGeometry::new([[0.2, 0.1], [1.3, 0.4], [0.5, 1.2]])
    }

    #[test]
    fn test_p2_nodal() {
        let nodes = [
            [1., 0., 0.],
            [0., 1., 0.],
            [0., 0., 1.],
            [0.5, 0.5, 0.],
            [0., 0.5, 0.5],
            [0.5, 0., 0.5],
        ];
        for (i, l) in nodes.iter().enumerate() {
            let phi = p2_values(l);
            for (j, v) in phi.iter().enumerate() {
                let expected = if i == j { 1. } else { 0. };
                assert!((v - expected).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_p2_gradients_reproduce_quadratic() {
        // f = x^2 + 3xy is represented exactly by P2
        let geo = geometry();
        let f = |p: [f64; 2]| p[0] * p[0] + 3. * p[0] * p[1];
        let nodes = [
            [1., 0., 0.],
            [0., 1., 0.],
            [0., 0., 1.],
            [0.5, 0.5, 0.],
            [0., 0.5, 0.5],
            [0.5, 0., 0.5],
        ];
        let coef: Vec<f64> = nodes.iter().map(|l| f(geo.point(l))).collect();
        let l = [0.2, 0.5, 0.3];
        let p = geo.point(&l);
        let d = p2_gradients(&l, &geo.grad_lambda);
        let gx: f64 = (0..6).map(|i| coef[i] * d[i][0]).sum();
        let gy: f64 = (0..6).map(|i| coef[i] * d[i][1]).sum();
        assert!((gx - (2. * p[0] + 3. * p[1])).abs() < 1e-12);
        assert!((gy - 3. * p[0]).abs() < 1e-12);
    }

    #[test]
    fn test_outward_normal() {
        let geo = CellGeometry::new([[0., 0.], [1., 0.], [0., 1.]]);
        let n = geo.outward_normal(0);
        assert!((n[0]).abs() < 1e-14 && (n[1] + 1.).abs() < 1e-14);
        let n = geo.outward_normal(1);
        let s = 0.5_f64.sqrt();
        assert!((n[0] - s).abs() < 1e-14 && (n[1] - s).abs() < 1e-14);
        assert!((geo.area() - 0.5).abs() < 1e-14);
    }
}
