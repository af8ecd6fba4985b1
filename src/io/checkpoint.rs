//! Checkpoint document
use super::ReadWrite;
use crate::config::FlowKind;
use crate::error::{FlowError, Result};
use crate::mesh::{Mesh, MeshData};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Identifies checkpoint files
pub const FORMAT: &str = "flowctl-checkpoint";
/// Current layout version
pub const VERSION: u32 = 1;
/// Key of the mixed state
pub const STATE: &str = "q";

/// Everything needed to rebuild a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Always [`FORMAT`]
    pub format: String,
    /// Layout version
    pub version: u32,
    /// Flow configuration that wrote the file
    pub kind: FlowKind,
    /// Reynolds number at the time of writing
    pub reynolds: f64,
    /// Control values at the time of writing
    pub control: Vec<f64>,
    /// Mesh
    pub mesh: MeshData,
    /// Named coefficient vectors, at least [`STATE`]
    pub fields: BTreeMap<String, Array1<f64>>,
}

impl Checkpoint {
    /// Checkpoint of a state on `mesh`
    pub fn new(kind: FlowKind, reynolds: f64, control: Vec<f64>, mesh: &Mesh, q: Array1<f64>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(STATE.to_string(), q);
        Self {
            format: FORMAT.to_string(),
            version: VERSION,
            kind,
            reynolds,
            control,
            mesh: mesh.to_data(),
            fields,
        }
    }

    /// Read and check format and version
    ///
    /// # Errors
    /// Unreadable file or foreign document
    pub fn load(path: &Path) -> Result<Self> {
        let cp = Self::read(path).map_err(|e| match e {
            FlowError::Io(e) => FlowError::Checkpoint(format!("{:?}: {}", path, e)),
            e => e,
        })?;
        if cp.format != FORMAT {
            return Err(FlowError::Checkpoint(format!(
                "{:?} is not a checkpoint (format '{}')",
                path, cp.format
            )));
        }
        if cp.version != VERSION {
            return Err(FlowError::Checkpoint(format!(
                "{:?} has version {}, expected {}",
                path, cp.version, VERSION
            )));
        }
        Ok(cp)
    }

    /// Named field
    ///
    /// # Errors
    /// Field missing
    pub fn field(&self, name: &str) -> Result<&Array1<f64>> {
        self.fields
            .get(name)
            .ok_or_else(|| FlowError::Checkpoint(format!("missing field '{}'", name)))
    }

    /// Mixed state coefficients
    ///
    /// # Errors
    /// Field missing
    pub fn state(&self) -> Result<&Array1<f64>> {
        self.field(STATE)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::{breaks, Lattice};

    fn checkpoint() -> Checkpoint {
        let mesh = Lattice::new(breaks(&[(0., 1., 2)], 1), breaks(&[(0., 1., 2)], 1))
            .build(|_| Some(7))
            .unwrap();
        let q = Array1::linspace(0., 1., 5);
        Checkpoint::new(FlowKind::Step, 42., vec![0.5], &mesh, q)
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        checkpoint().write(&path).unwrap();
        let cp = Checkpoint::load(&path).unwrap();
        assert_eq!(cp.kind, FlowKind::Step);
        assert!((cp.reynolds - 42.).abs() < 1e-14);
        assert_eq!(cp.control, vec![0.5]);
        assert_eq!(cp.state().unwrap().len(), 5);
        assert!(cp.field("vorticity").is_err());
        assert!(Mesh::from_data(cp.mesh).is_ok());
    }

    #[test]
    fn test_reject_foreign_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        let mut cp = checkpoint();
        cp.format = "something-else".to_string();
        cp.write(&path).unwrap();
        assert!(matches!(
            Checkpoint::load(&path),
            Err(FlowError::Checkpoint(_))
        ));
        let mut cp = checkpoint();
        cp.version = VERSION + 1;
        cp.write(&path).unwrap();
        assert!(Checkpoint::load(&path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Checkpoint::load(&dir.path().join("missing.json")),
            Err(FlowError::Checkpoint(_))
        ));
        // plain reads keep the io error
        assert!(matches!(
            Checkpoint::read(&dir.path().join("missing.json")),
            Err(FlowError::Io(_))
        ));
    }
}
