//! Access to files on disk.

use std::io;

use crate::prelude::*;

/// Abstract interface for reading the files referred to by `source` entries.
pub trait FileReader {
    /// Read the entire contents of the file at `path`.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Read files from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

impl FileReader for LocalFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        trace!("reading {}", path.display());
        std::fs::read(path)
    }
}
