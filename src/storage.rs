//! Block storage capability as the pipeline sees it: one volume root,
//! directories directly under it, and append-only files inside those.
//!
//! Paths are `/`-separated and relative to the volume root (`""` is the root
//! itself, `"DIR3"` a session directory, `"DIR3/FILE_0.txt"` a segment).

use crate::config::MAX_PATH_LEN;

pub type PathBuf = heapless::String<MAX_PATH_LEN>;

/// One directory listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub name: &'a str,
    pub is_dir: bool,
}

pub trait Storage {
    type Error: core::fmt::Debug;
    /// Handle of a file opened for append
    type File;

    /// Call `visit` for every entry directly inside `dir`.
    fn list<F>(&mut self, dir: &str, visit: F) -> Result<(), Self::Error>
    where
        F: FnMut(Entry<'_>);

    fn mkdir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Open `path` for append, creating it if missing.
    fn open_append(&mut self, path: &str) -> Result<Self::File, Self::Error>;

    /// Append `data`; returns how many bytes actually reached the file.
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, Self::Error>;

    fn close(&mut self, file: Self::File) -> Result<(), Self::Error>;
}
