//! Local view of a node's files directory: the set of filenames advertised
//! in `REGISTER`, and read/write access for blocks sent and received.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Storage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filenames currently present in the directory, used to build the
    /// `REGISTER` message's file list.
    pub fn list_files(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn read_file(&self, filename: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(filename))
    }

    pub fn file_size(&self, filename: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.root.join(filename))?.len())
    }

    /// Writes a fully-reassembled file in one call; the spec forbids ever
    /// writing a file partially (§4.5).
    pub fn write_file(&self, filename: &str, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.root.join(filename), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_files_present_in_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        let storage = Storage::new(dir.path()).unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn round_trips_written_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path()).unwrap();
        storage.write_file("hello.txt", b"Hello, world!").unwrap();
        assert_eq!(storage.read_file("hello.txt").unwrap(), b"Hello, world!");
        assert_eq!(storage.file_size("hello.txt").unwrap(), 13);
    }

    #[test]
    fn creates_missing_root_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("files");
        let storage = Storage::new(&nested).unwrap();
        assert!(storage.root().exists());
    }
}
