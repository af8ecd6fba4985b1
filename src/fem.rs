//! # Finite element discretization
//!
//! Just enough of a finite element toolkit for incompressible flow:
//! quadratic/linear Lagrange elements on triangles, quadrature, the mixed
//! Taylor-Hood space, its state vector and Dirichlet conditions.
pub mod bcs;
pub mod element;
pub mod quadrature;
pub mod space;
pub mod state;
pub use bcs::{Constraints, DirichletBc};
pub use element::CellGeometry;
pub use space::{Field, MixedSpace, SubSpace};
pub use state::{MixedState, Velocity};
