#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use embassy_time::{Duration, Instant};
use serial_sd_logger::{Clock, Entry, Storage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemError {
    ListFailed,
    Exists(String),
    NotFound(String),
    OpenFailed(String),
    WriteFailed,
}

/// RAM volume: top-level directories plus append-only files, with knobs to
/// inject failures.
#[derive(Default)]
pub struct MemStorage {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub fail_list: bool,
    pub fail_mkdir: bool,
    /// Fail this many upcoming `open_append` calls
    pub fail_opens: usize,
    /// Fail this many upcoming `write` calls
    pub fail_writes: usize,
    /// Next write stores only this many bytes
    pub short_write: Option<usize>,
    pub open_handles: usize,
    pub opens: usize,
}

impl MemStorage {
    pub fn with_dirs(names: &[&str]) -> Self {
        let mut storage = Self::default();
        for name in names {
            storage.dirs.insert(name.to_string());
        }
        storage
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn files_in(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{dir}/");
        self.files
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

impl Storage for MemStorage {
    type Error = MemError;
    type File = String;

    fn list<F>(&mut self, dir: &str, mut visit: F) -> Result<(), Self::Error>
    where
        F: FnMut(Entry<'_>),
    {
        if self.fail_list {
            return Err(MemError::ListFailed);
        }
        if dir.is_empty() {
            for name in &self.dirs {
                visit(Entry { name, is_dir: true });
            }
            for path in self.files.keys().filter(|p| !p.contains('/')) {
                visit(Entry {
                    name: path,
                    is_dir: false,
                });
            }
            return Ok(());
        }
        if !self.dirs.contains(dir) {
            return Err(MemError::NotFound(dir.to_string()));
        }
        let prefix = format!("{dir}/");
        for path in self.files.keys() {
            if let Some(name) = path.strip_prefix(&prefix) {
                visit(Entry { name, is_dir: false });
            }
        }
        Ok(())
    }

    fn mkdir(&mut self, path: &str) -> Result<(), Self::Error> {
        if self.fail_mkdir || self.dirs.contains(path) {
            return Err(MemError::Exists(path.to_string()));
        }
        self.dirs.insert(path.to_string());
        Ok(())
    }

    fn open_append(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.opens += 1;
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            return Err(MemError::OpenFailed(path.to_string()));
        }
        if let Some((dir, _)) = path.split_once('/') {
            if !self.dirs.contains(dir) {
                return Err(MemError::NotFound(dir.to_string()));
            }
        }
        self.files.entry(path.to_string()).or_default();
        self.open_handles += 1;
        Ok(path.to_string())
    }

    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(MemError::WriteFailed);
        }
        let n = self.short_write.take().unwrap_or(data.len()).min(data.len());
        self.files
            .get_mut(file.as_str())
            .ok_or_else(|| MemError::NotFound(file.clone()))?
            .extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn close(&mut self, _file: Self::File) -> Result<(), Self::Error> {
        self.open_handles -= 1;
        Ok(())
    }
}

/// Clock that only moves when the test says so.
#[derive(Clone, Default)]
pub struct ManualClock {
    micros: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.micros.set(self.micros.get() + by.as_micros());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.micros.get())
    }
}

/// `n` bytes of chunk `k`: every byte is `k`.
pub fn chunk_bytes(k: u8, n: usize) -> Vec<u8> {
    vec![k; n]
}

pub fn leak_buffers<const N: usize, const P: usize>() -> impl Iterator<Item = &'static mut [u8; N]> {
    Box::leak(Box::new([[0u8; N]; P])).iter_mut()
}
