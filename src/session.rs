//! Session directories: one `DIR<n>` per boot, numbered past everything
//! already on the card.
//!
//! The next index is derived from what exists on the volume and nothing
//! else, so a boot that died half way through (directory created, nothing
//! written) still pushes the next boot's index forward.

use core::fmt::Write;

use crate::config::{MAX_PATH_LEN, SEGMENT_FILE_EXT, SEGMENT_FILE_PREFIX, SESSION_DIR_PREFIX};
use crate::storage::{PathBuf, Storage};

// "DIR" + u32 + "/" + "FILE_" + u32 + ".txt"
const _: () = assert!(
    MAX_PATH_LEN
        >= SESSION_DIR_PREFIX.len() + 10 + 1 + SEGMENT_FILE_PREFIX.len() + 10 + 1 + SEGMENT_FILE_EXT.len()
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError<E> {
    /// The volume root could not be listed
    List(E),
    /// `DIR<n>` could not be created
    CreateDir(E),
    /// `DIR4294967295` already exists
    IndexExhausted,
}

/// Parse a session directory name: the exact prefix followed by one or more
/// ASCII digits and nothing else. Values that overflow `u32` are rejected.
pub fn parse_session_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(SESSION_DIR_PREFIX)?.as_bytes();
    if digits.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for &d in digits {
        if !d.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(u32::from(d - b'0'))?;
    }
    Some(value)
}

/// Scan the volume root and return the index for this boot's session:
/// one past the highest `DIR<n>` present, or 0 on an empty card.
pub fn discover_next_session_index<S: Storage>(storage: &mut S) -> Result<u32, SessionError<S::Error>> {
    let mut max_seen: Option<u32> = None;
    storage
        .list("", |entry| {
            if !entry.is_dir {
                debug!("Skipping file {}", entry.name);
                return;
            }
            match parse_session_index(entry.name) {
                Some(index) => {
                    debug!("Found session directory {}", entry.name);
                    max_seen = Some(max_seen.map_or(index, |m| m.max(index)));
                }
                None => info!("Directory name does not match session format: {}", entry.name),
            }
        })
        .map_err(SessionError::List)?;

    match max_seen {
        None => Ok(0),
        Some(max) => max.checked_add(1).ok_or(SessionError::IndexExhausted),
    }
}

/// The directory this boot writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    index: u32,
    dir: PathBuf,
}

impl Session {
    pub fn new(index: u32) -> Self {
        let mut dir = PathBuf::new();
        // Fits by the const assertion above.
        let _ = write!(dir, "{}{}", SESSION_DIR_PREFIX, index);
        Self { index, dir }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Directory path relative to the volume root, e.g. `DIR7`
    pub fn dir(&self) -> &str {
        self.dir.as_str()
    }

    /// Path of segment `segment` inside this session, e.g. `DIR7/FILE_2.txt`
    pub fn segment_path(&self, segment: u32) -> PathBuf {
        let mut path = PathBuf::new();
        let _ = write!(
            path,
            "{}/{}{}.{}",
            self.dir, SEGMENT_FILE_PREFIX, segment, SEGMENT_FILE_EXT
        );
        path
    }
}

/// Pick the next session index and create its directory. Any error here is
/// fatal for the boot: there is nowhere valid to put data.
pub fn start_session<S: Storage>(storage: &mut S) -> Result<Session, SessionError<S::Error>> {
    let index = discover_next_session_index(storage)?;
    let session = Session::new(index);
    storage.mkdir(session.dir()).map_err(SessionError::CreateDir)?;
    info!("Session directory {} created", session.dir());
    Ok(session)
}
