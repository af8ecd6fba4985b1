//! # Persistence
//!
//! Checkpoints are self-describing json documents holding the mesh, the
//! parameters and the state of a flow, so that a flow can be rebuilt
//! without its original mesh generator.
pub mod checkpoint;
pub mod traits;
pub use checkpoint::Checkpoint;
pub use traits::ReadWrite;
