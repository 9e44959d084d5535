mod common;

use common::{MemError, MemStorage};
use serial_sd_logger::{discover_next_session_index, start_session, SessionError, Storage};

#[test]
fn empty_card_starts_at_zero() {
    let mut storage = MemStorage::default();
    let session = start_session(&mut storage).unwrap();

    assert_eq!(session.index(), 0);
    assert_eq!(session.dir(), "DIR0");
    assert!(storage.dirs.contains("DIR0"));
}

#[test]
fn next_index_is_one_past_highest_existing() {
    let mut storage = MemStorage::with_dirs(&["DIR0", "DIR10", "DIR3"]);
    assert_eq!(discover_next_session_index(&mut storage), Ok(11));
}

#[test]
fn foreign_entries_are_ignored() {
    let mut storage = MemStorage::with_dirs(&["DIR2", "DIRX", "LOGS", "DIR5A", "SYSTEM~1", "dir9"]);
    // A file that looks like a session directory does not count.
    storage.files.insert("DIR50".to_string(), Vec::new());
    storage.files.insert("DIR2/FILE_0.txt".to_string(), vec![1, 2, 3]);

    assert_eq!(discover_next_session_index(&mut storage), Ok(3));
}

#[test]
fn only_foreign_entries_behaves_like_empty_card() {
    let mut storage = MemStorage::with_dirs(&["LOST.DIR", "DIR"]);
    assert_eq!(discover_next_session_index(&mut storage), Ok(0));
}

#[test]
fn every_boot_gets_a_strictly_greater_index() {
    // Pre-existing sessions created out of order.
    let mut storage = MemStorage::with_dirs(&["DIR7", "DIR2", "DIR4"]);

    let mut previous_max = 7;
    for _ in 0..20 {
        let session = start_session(&mut storage).unwrap();
        assert!(session.index() > previous_max);
        assert_eq!(session.index(), previous_max + 1);
        previous_max = session.index();
    }
    assert_eq!(storage.dirs.len(), 23);
}

#[test]
fn interrupted_session_is_never_reused() {
    // Boot 1 created DIR4 and lost power before writing anything.
    let mut storage = MemStorage::default();
    for _ in 0..5 {
        start_session(&mut storage).unwrap();
    }
    assert!(storage.files_in("DIR4").is_empty());

    let next = start_session(&mut storage).unwrap();
    assert_eq!(next.index(), 5);
}

#[test]
fn listing_failure_is_fatal() {
    let mut storage = MemStorage {
        fail_list: true,
        ..Default::default()
    };
    assert_eq!(
        start_session(&mut storage),
        Err(SessionError::List(MemError::ListFailed))
    );
    assert!(storage.dirs.is_empty());
}

#[test]
fn mkdir_failure_is_fatal() {
    let mut storage = MemStorage {
        fail_mkdir: true,
        ..Default::default()
    };
    assert_eq!(
        start_session(&mut storage),
        Err(SessionError::CreateDir(MemError::Exists("DIR0".to_string())))
    );
}

#[test]
fn index_space_exhaustion_is_reported() {
    let mut storage = MemStorage::with_dirs(&["DIR4294967295"]);
    assert_eq!(
        discover_next_session_index(&mut storage),
        Err(SessionError::IndexExhausted)
    );
}

#[test]
fn segments_land_inside_the_new_session() {
    let mut storage = MemStorage::with_dirs(&["DIR1"]);
    let session = start_session(&mut storage).unwrap();

    let path = session.segment_path(0);
    let mut file = storage.open_append(&path).unwrap();
    storage.write(&mut file, b"abc").unwrap();
    storage.close(file).unwrap();

    assert_eq!(storage.files_in("DIR2"), vec!["DIR2/FILE_0.txt".to_string()]);
}
