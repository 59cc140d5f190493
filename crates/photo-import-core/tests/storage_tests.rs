use chrono::{NaiveDate, NaiveDateTime};
use photo_import_core::storage::models::*;
use photo_import_core::storage::{Database, NewMediaFile};
use photo_import_core::MediaKind;

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn make_new_file(batch_id: i64, path: &str, extracted: Option<NaiveDateTime>) -> NewMediaFile {
    NewMediaFile {
        batch_id,
        source_path: path.to_string(),
        filename: path.rsplit('/').next().unwrap_or(path).to_string(),
        file_size: 1_000,
        extension: "jpg".to_string(),
        extracted_date: extracted,
        created_at: at(2020, 1, 1),
        modified_at: at(2020, 1, 2),
        scanned_at: at(2024, 5, 5),
        checksum: None,
    }
}

#[test]
fn test_create_batch_starts_scanning() {
    let db = Database::open_in_memory().unwrap();
    let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
    assert!(batch.id > 0);
    assert_eq!(batch.status, BatchStatus::Scanning);
    assert_eq!(batch.media_kind, MediaKind::Photo);
    assert_eq!(batch.total_files, 0);
    assert!(batch.scan_completed_at.is_none());

    let fetched = db.get_batch(batch.id).unwrap().unwrap();
    assert_eq!(fetched.source_root, "/src");
    assert_eq!(fetched.target_root, "/dst");
    assert!(db.get_batch(batch.id + 100).unwrap().is_none());
}

#[test]
fn test_status_transitions_stamp_timestamps() {
    let db = Database::open_in_memory().unwrap();
    let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();

    db.update_batch_status(batch.id, BatchStatus::Scanned).unwrap();
    let b = db.get_batch(batch.id).unwrap().unwrap();
    assert_eq!(b.status, BatchStatus::Scanned);
    assert!(b.scan_completed_at.is_some());
    assert!(b.copy_started_at.is_none());

    db.update_batch_status(batch.id, BatchStatus::Copying).unwrap();
    db.update_batch_status(batch.id, BatchStatus::Completed).unwrap();
    let b = db.get_batch(batch.id).unwrap().unwrap();
    assert_eq!(b.status, BatchStatus::Completed);
    assert!(b.copy_started_at.is_some());
    assert!(b.completed_at.is_some());
}

#[test]
fn test_active_batch_ignores_finished_and_other_kinds() {
    let db = Database::open_in_memory().unwrap();
    let done = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
    db.update_batch_status(done.id, BatchStatus::Completed).unwrap();
    assert!(db.get_active_batch("/src", MediaKind::Photo).unwrap().is_none());

    let paused = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
    db.update_batch_status(paused.id, BatchStatus::Paused).unwrap();
    let active = db.get_active_batch("/src", MediaKind::Photo).unwrap().unwrap();
    assert_eq!(active.id, paused.id);

    assert!(db.get_active_batch("/src", MediaKind::Video).unwrap().is_none());
    assert!(db.get_active_batch("/other", MediaKind::Photo).unwrap().is_none());
}

#[test]
fn test_latest_and_list_batches_newest_first() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.get_latest_batch().unwrap().is_none());

    let ids: Vec<i64> = (0..3)
        .map(|i| {
            db.create_batch(&format!("/src{i}"), "/dst", MediaKind::Photo)
                .unwrap()
                .id
        })
        .collect();

    assert_eq!(db.get_latest_batch().unwrap().unwrap().id, ids[2]);
    let listed: Vec<i64> = db.list_batches(2).unwrap().iter().map(|b| b.id).collect();
    assert_eq!(listed, vec![ids[2], ids[1]]);
}

#[test]
fn test_bulk_insert_ignores_known_paths() {
    let db = Database::open_in_memory().unwrap();
    let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();

    let first = vec![
        make_new_file(batch.id, "/src/a.jpg", Some(at(2019, 1, 1))),
        make_new_file(batch.id, "/src/b.jpg", None),
    ];
    assert_eq!(db.insert_files_bulk(&first).unwrap(), 2);

    let second = vec![
        make_new_file(batch.id, "/src/b.jpg", None),
        make_new_file(batch.id, "/src/c.jpg", None),
    ];
    assert_eq!(db.insert_files_bulk(&second).unwrap(), 1);

    assert!(db.file_exists("/src/a.jpg").unwrap());
    assert!(!db.file_exists("/src/z.jpg").unwrap());

    let known = db
        .catalogued_paths(&["/src/a.jpg".to_string(), "/src/z.jpg".to_string()])
        .unwrap();
    assert!(known.contains("/src/a.jpg"));
    assert_eq!(known.len(), 1);

    let file = db.get_file_by_path("/src/a.jpg").unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Pending);
    assert_eq!(file.filename, "a.jpg");
    assert_eq!(file.extracted_date, Some(at(2019, 1, 1)));
    assert_eq!(db.get_file(file.id).unwrap().unwrap().source_path, "/src/a.jpg");
}

#[test]
fn test_pending_files_are_ordered_and_limited() {
    let db = Database::open_in_memory().unwrap();
    let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
    let files = vec![
        make_new_file(batch.id, "/src/c.jpg", None),
        make_new_file(batch.id, "/src/a.jpg", None),
        make_new_file(batch.id, "/src/b.jpg", None),
    ];
    db.insert_files_bulk(&files).unwrap();

    let all: Vec<String> = db
        .get_pending_files(batch.id, None)
        .unwrap()
        .into_iter()
        .map(|f| f.source_path)
        .collect();
    assert_eq!(all, vec!["/src/a.jpg", "/src/b.jpg", "/src/c.jpg"]);

    assert_eq!(db.get_pending_files(batch.id, Some(2)).unwrap().len(), 2);
    assert_eq!(db.count_pending(batch.id).unwrap(), 3);
}

#[test]
fn test_file_transitions_and_counts() {
    let db = Database::open_in_memory().unwrap();
    let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
    db.insert_files_bulk(&[
        make_new_file(batch.id, "/src/a.jpg", Some(at(2019, 1, 1))),
        make_new_file(batch.id, "/src/b.jpg", None),
        make_new_file(batch.id, "/src/c.jpg", None),
        make_new_file(batch.id, "/src/d.jpg", None),
    ])
    .unwrap();

    let a = db.get_file_by_path("/src/a.jpg").unwrap().unwrap();
    let b = db.get_file_by_path("/src/b.jpg").unwrap().unwrap();
    let c = db.get_file_by_path("/src/c.jpg").unwrap().unwrap();

    db.update_file_status(a.id, FileStatus::Copied, Some("/dst/2019_01_01/a.jpg"), None)
        .unwrap();
    db.update_file_status(b.id, FileStatus::Failed, None, Some("Copy failed: disk full"))
        .unwrap();
    db.update_file_status(c.id, FileStatus::Skipped, None, Some("No extracted date available"))
        .unwrap();

    let a = db.get_file(a.id).unwrap().unwrap();
    assert_eq!(a.target_path.as_deref(), Some("/dst/2019_01_01/a.jpg"));
    assert!(a.copied_at.is_some());
    assert!(a.error_message.is_none());

    let stats = db.update_batch_counts(batch.id).unwrap();
    assert_eq!(
        stats,
        BatchStats {
            total: 4,
            pending: 1,
            copied: 1,
            failed: 1,
            skipped: 1,
            with_extracted_date: 1,
            total_size: 4_000,
        }
    );

    let refreshed = db.get_batch(batch.id).unwrap().unwrap();
    assert_eq!(refreshed.total_files, 4);
    assert_eq!(refreshed.copied_files, 1);
    assert_eq!(refreshed.failed_files, 1);
    assert_eq!(refreshed.skipped_files, 1);
    assert_eq!(db.get_batch_stats(batch.id).unwrap(), stats);
}

#[test]
fn test_copied_clears_previous_error() {
    let db = Database::open_in_memory().unwrap();
    let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
    db.insert_files_bulk(&[make_new_file(batch.id, "/src/a.jpg", None)])
        .unwrap();
    let file = db.get_file_by_path("/src/a.jpg").unwrap().unwrap();

    db.update_file_status(file.id, FileStatus::Failed, None, Some("Copy failed: busy"))
        .unwrap();
    db.update_file_status(file.id, FileStatus::Copied, Some("/dst/x/a.jpg"), None)
        .unwrap();

    let file = db.get_file(file.id).unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Copied);
    assert!(file.error_message.is_none());
}

#[test]
fn test_reset_failed_files_only_touches_failed() {
    let db = Database::open_in_memory().unwrap();
    let batch = db.create_batch("/src", "/dst", MediaKind::Photo).unwrap();
    db.insert_files_bulk(&[
        make_new_file(batch.id, "/src/a.jpg", None),
        make_new_file(batch.id, "/src/b.jpg", None),
        make_new_file(batch.id, "/src/c.jpg", None),
    ])
    .unwrap();
    let a = db.get_file_by_path("/src/a.jpg").unwrap().unwrap();
    let b = db.get_file_by_path("/src/b.jpg").unwrap().unwrap();
    db.update_file_status(a.id, FileStatus::Failed, None, Some("boom"))
        .unwrap();
    db.update_file_status(b.id, FileStatus::Copied, Some("/dst/b.jpg"), None)
        .unwrap();

    assert_eq!(db.reset_failed_files(batch.id).unwrap(), 1);
    let a = db.get_file(a.id).unwrap().unwrap();
    assert_eq!(a.status, FileStatus::Pending);
    assert!(a.error_message.is_none());
    assert_eq!(
        db.get_file(b.id).unwrap().unwrap().status,
        FileStatus::Copied
    );
    assert_eq!(db.reset_failed_files(batch.id).unwrap(), 0);
}

#[test]
fn test_progress_checkpoint_persists() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ledger.db");
    let batch_id = {
        let db = Database::open(&path).unwrap();
        let batch = db.create_batch("/src", "/dst", MediaKind::Video).unwrap();
        db.set_batch_total(batch.id, 10).unwrap();
        db.update_batch_progress(batch.id, 5, "/src/e.mp4").unwrap();
        batch.id
    };

    let db = Database::open(&path).unwrap();
    let batch = db.get_batch(batch_id).unwrap().unwrap();
    assert_eq!(batch.total_files, 10);
    assert_eq!(batch.scanned_files, 5);
    assert_eq!(batch.last_processed_path.as_deref(), Some("/src/e.mp4"));
    assert_eq!(batch.media_kind, MediaKind::Video);
}
