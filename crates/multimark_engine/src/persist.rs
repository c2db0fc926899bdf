use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage directory {dir:?} is unusable: {source}")]
    StorageDir { dir: PathBuf, source: io::Error },
    #[error("storage path {dir:?} is not a directory")]
    NotADirectory { dir: PathBuf },
    #[error("failed to store `{key}`: {source}")]
    Write { key: String, source: io::Error },
}

/// Ensure the storage directory exists; create it if missing.
pub fn ensure_storage_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |source| PersistError::StorageDir {
        dir: dir.to_path_buf(),
        source,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PersistError::NotADirectory {
            dir: dir.to_path_buf(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(unusable)
        }
        Err(err) => Err(unusable(err)),
    }
}

/// A directory holding one document per storage key, as `{dir}/{key}.json`.
///
/// Documents are replaced through a temp file in the same directory and a
/// rename, so a reader sees either the old or the new document.
#[derive(Debug, Clone)]
pub struct DocumentDir {
    dir: PathBuf,
}

impl DocumentDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Returns `None` when nothing was stored under `key` yet.
    pub fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn write(&self, key: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_storage_dir(&self.dir)?;
        let failed = |source| PersistError::Write {
            key: key.to_string(),
            source,
        };

        let target = self.path_for(key);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(failed)?;
        tmp.write_all(content.as_bytes()).map_err(failed)?;
        tmp.as_file_mut().sync_all().map_err(failed)?;
        tmp.persist(&target).map_err(|err| failed(err.error))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{DocumentDir, PersistError};

    #[test]
    fn replaces_documents_and_creates_the_directory() {
        let temp = TempDir::new().unwrap();
        let docs = DocumentDir::new(temp.path().join("nested").join("storage"));
        assert_eq!(docs.read("searchLogs").unwrap(), None);

        docs.write("searchLogs", "[]").unwrap();
        let path = docs.write("searchLogs", "[1]").unwrap();

        assert_eq!(path, docs.path_for("searchLogs"));
        assert_eq!(docs.read("searchLogs").unwrap().as_deref(), Some("[1]"));
        assert_eq!(fs::read_dir(docs.dir()).unwrap().count(), 1);
    }

    #[test]
    fn file_in_place_of_directory_is_rejected() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("storage");
        fs::write(&blocker, "not a directory").unwrap();

        let err = DocumentDir::new(blocker.clone())
            .write("searchLogs", "[]")
            .unwrap_err();
        assert!(matches!(err, PersistError::NotADirectory { dir } if dir == blocker));
    }
}
