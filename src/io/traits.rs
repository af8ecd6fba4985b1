//! `ReadWrite` trait
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Read and write json documents
pub trait ReadWrite: Sized {
    /// Read from file
    ///
    /// # Errors
    /// Can't read or parse file
    fn read(path: &Path) -> Result<Self>;

    /// Read from file and log failures
    fn read_unwrap(path: &Path) -> Option<Self> {
        match Self::read(path) {
            Ok(value) => {
                tracing::info!(?path, "read file");
                Some(value)
            }
            Err(e) => {
                tracing::error!(?path, error = %e, "error while reading file");
                None
            }
        }
    }

    /// Write to file. The file is replaced atomically.
    ///
    /// # Errors
    /// Can't write file
    fn write(&self, path: &Path) -> Result<()>;

    /// Write to file and log failures
    fn write_unwrap(&self, path: &Path) {
        if let Err(e) = self.write(path) {
            tracing::error!(?path, error = %e, "error while writing file");
        }
    }
}

impl<T: Serialize + DeserializeOwned> ReadWrite for T {
    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_vec(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let result = fs::write(&tmp, content).and_then(|_| fs::rename(&tmp, path));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("map.json");
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 0.1_f64);
        map.insert("b".to_string(), -3.0e-17);
        map.write(&path).unwrap();
        let back = BTreeMap::<String, f64>::read(&path).unwrap();
        assert_eq!(map, back);
        assert!(!dir.path().join("nested").join("map.json.tmp").exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Vec::<f64>::read(&dir.path().join("missing.json")).is_err());
        assert!(Vec::<f64>::read_unwrap(&dir.path().join("missing.json")).is_none());
    }

    #[test]
    fn test_failed_write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a directory in place of the target makes the rename fail
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), "x").unwrap();
        assert!(vec![1.0_f64].write(&path).is_err());
        assert!(!dir.path().join("taken.tmp").exists());
        assert!(path.join("inner").exists());
    }
}
