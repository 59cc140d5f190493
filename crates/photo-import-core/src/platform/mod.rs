use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};

/// Filesystem (creation, modification) dates as local naive datetimes.
///
/// Creation is the birth time when the platform reports one. Otherwise it is
/// the earlier of the inode change time (unix) and the modification time.
pub fn file_dates(path: &Path) -> io::Result<(NaiveDateTime, NaiveDateTime)> {
    let metadata = fs::metadata(path)?;
    let modified = metadata.modified()?;
    let created = match metadata.created() {
        Ok(birth) => birth,
        Err(_) => change_time(&metadata).map_or(modified, |ctime| ctime.min(modified)),
    };
    Ok((to_local(created), to_local(modified)))
}

pub fn to_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

#[cfg(unix)]
fn change_time(metadata: &Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, UNIX_EPOCH};

    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).ok()?;
    UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn change_time(_metadata: &Metadata) -> Option<SystemTime> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, FileTimes};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_birth_time_wins_over_backdated_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.jpg");
        fs::write(&path, b"x").unwrap();
        // 2015-05-05T12:00:00Z
        let old = UNIX_EPOCH + Duration::from_secs(1_430_827_200);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_times(FileTimes::new().set_modified(old).set_accessed(old))
            .unwrap();

        let metadata = fs::metadata(&path).unwrap();
        let (created, modified) = file_dates(&path).unwrap();
        assert_eq!(modified, to_local(old));
        match metadata.created() {
            Ok(birth) => {
                assert_eq!(created, to_local(birth));
                assert_ne!(created, modified);
            }
            // Without birth time the older of ctime and mtime is used.
            Err(_) => assert_eq!(created, modified),
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_dates(&dir.path().join("gone")).is_err());
    }
}
