use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::warn;

use crate::storage::models::MediaFile;

/// Suffix counters at or above this are worth a warning.
const COLLISION_WARN_THRESHOLD: u64 = 100;

/// Best-known date for a file.
///
/// The extracted date wins. Without one, the filesystem creation date is used
/// when the fallback is enabled, the modification date otherwise.
pub fn placement_date(file: &MediaFile, use_filesystem_date_fallback: bool) -> NaiveDateTime {
    match file.extracted_date {
        Some(date) => date,
        None if use_filesystem_date_fallback => file.created_at,
        None => file.modified_at,
    }
}

/// `YYYY_MM_DD` directory name for a date.
pub fn date_folder(date: &NaiveDateTime) -> String {
    date.format("%Y_%m_%d").to_string()
}

/// `target_root/YYYY_MM_DD/<original filename>`, before collision handling.
pub fn target_path(
    target_root: &Path,
    file: &MediaFile,
    use_filesystem_date_fallback: bool,
) -> PathBuf {
    let date = placement_date(file, use_filesystem_date_fallback);
    target_root.join(date_folder(&date)).join(&file.filename)
}

/// First free name among `name.ext`, `name_1.ext`, `name_2.ext`, ...
pub fn resolve_conflict<F>(target: PathBuf, is_taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    if !is_taken(&target) {
        return target;
    }

    let parent = target.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter: u64 = 1;
    loop {
        let candidate = parent.join(format!("{stem}_{counter}{extension}"));
        if !is_taken(&candidate) {
            if counter >= COLLISION_WARN_THRESHOLD {
                warn!(
                    "Excessive name collisions: {} needed suffix {}",
                    target.display(),
                    counter
                );
            }
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::FileStatus;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn media_file(extracted: Option<NaiveDateTime>) -> MediaFile {
        MediaFile {
            id: 1,
            batch_id: 1,
            source_path: "/src/IMG_0001.jpg".to_string(),
            filename: "IMG_0001.jpg".to_string(),
            file_size: 10,
            extension: "jpg".to_string(),
            extracted_date: extracted,
            created_at: at(2019, 2, 2),
            modified_at: at(2018, 3, 3),
            target_path: None,
            status: FileStatus::Pending,
            error_message: None,
            scanned_at: at(2024, 1, 1),
            copied_at: None,
            checksum: None,
        }
    }

    #[test]
    fn test_date_precedence() {
        let root = Path::new("/out");
        let with_exif = media_file(Some(at(2020, 1, 1)));
        assert_eq!(
            target_path(root, &with_exif, true),
            PathBuf::from("/out/2020_01_01/IMG_0001.jpg")
        );
        assert_eq!(
            target_path(root, &with_exif, false),
            PathBuf::from("/out/2020_01_01/IMG_0001.jpg")
        );

        let without = media_file(None);
        assert_eq!(
            target_path(root, &without, true),
            PathBuf::from("/out/2019_02_02/IMG_0001.jpg")
        );
        assert_eq!(
            target_path(root, &without, false),
            PathBuf::from("/out/2018_03_03/IMG_0001.jpg")
        );
    }

    #[test]
    fn test_resolve_conflict_appends_counter() {
        let taken: HashSet<PathBuf> = ["/out/d/a.jpg", "/out/d/a_1.jpg"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let resolved = resolve_conflict(PathBuf::from("/out/d/a.jpg"), |p| taken.contains(p));
        assert_eq!(resolved, PathBuf::from("/out/d/a_2.jpg"));

        let free = resolve_conflict(PathBuf::from("/out/d/b.jpg"), |p| taken.contains(p));
        assert_eq!(free, PathBuf::from("/out/d/b.jpg"));
    }

    #[test]
    fn test_resolve_conflict_without_extension() {
        let resolved = resolve_conflict(PathBuf::from("/out/d/README"), |p| {
            p == Path::new("/out/d/README")
        });
        assert_eq!(resolved, PathBuf::from("/out/d/README_1"));
    }

    #[test]
    fn test_conflicts_resolved_against_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let file = media_file(Some(at(2021, 6, 15)));
        let on_disk = |p: &Path| p.exists();
        let first = resolve_conflict(target_path(tmp.path(), &file, true), on_disk);
        assert_eq!(first, tmp.path().join("2021_06_15/IMG_0001.jpg"));

        std::fs::create_dir_all(first.parent().unwrap()).unwrap();
        std::fs::write(&first, b"x").unwrap();
        let second = resolve_conflict(target_path(tmp.path(), &file, true), on_disk);
        assert_eq!(second, tmp.path().join("2021_06_15/IMG_0001_1.jpg"));
    }
}
