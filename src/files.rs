//! Thin wrappers over the filesystem that attach the offending path to errors.

use std::{fs, path::Path, time::SystemTime};

use crate::error::{Error, Result};

pub fn exists(path: &Path) -> bool {
    path.is_file()
}

pub fn modified(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|e| Error::io(path, e))
}

pub fn read_binary(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).map_err(|e| Error::io(path, e))?;
    log::debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

pub fn write_binary(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).map_err(|e| Error::io(path, e))?;
    log::debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    write_binary(path, text.as_bytes())
}

/// Creates `dir` (and parents) when it is missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        log::warn!("Creating directory {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_binary_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("note.txt");
        let blob = dir.path().join("blob.bin");

        assert!(!exists(&text));
        write_text(&text, "hello").unwrap();
        write_binary(&blob, &[0, 1, 2, 255]).unwrap();

        assert!(exists(&text));
        assert_eq!(read_text(&text).unwrap(), "hello");
        assert_eq!(read_binary(&blob).unwrap(), vec![0, 1, 2, 255]);
        assert!(modified(&blob).is_ok());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.spv");
        match read_binary(&path) {
            Err(Error::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected {other:?}"),
        }
        assert!(modified(&path).is_err());
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }
}
