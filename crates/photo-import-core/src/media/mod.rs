pub mod photo;
pub mod video;

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::hasher;

pub use photo::ExifExtractor;
pub use video::FfprobeExtractor;

/// Which family of files a batch catalogues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Photo, MediaKind::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    /// Lowercase extension allow-list, without the leading dot.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Photo => photo::EXTENSIONS,
            MediaKind::Video => video::EXTENSIONS,
        }
    }

    pub fn accepts(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// The built-in extractor for this kind.
    pub fn extractor(self) -> Arc<dyn MetadataExtractor> {
        match self {
            MediaKind::Photo => Arc::new(ExifExtractor),
            MediaKind::Video => Arc::new(FfprobeExtractor::default()),
        }
    }
}

/// What the extractor recovered for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub date: Option<NaiveDateTime>,
    pub checksum: Option<String>,
}

/// Format-specific "taken on" date recovery.
///
/// Implementations must not fail: anything that goes wrong is `None`.
pub trait MetadataExtractor: Send + Sync {
    fn media_kind(&self) -> MediaKind;

    fn date_taken(&self, path: &Path) -> Option<NaiveDateTime>;

    fn extract(&self, path: &Path, with_checksum: bool) -> Extracted {
        let checksum = if with_checksum {
            match hasher::file_checksum(path) {
                Ok(sum) => Some(sum),
                Err(e) => {
                    debug!("Failed to checksum {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };
        Extracted {
            date: self.date_taken(path),
            checksum,
        }
    }
}

/// Parse the textual date layouts found in embedded metadata. Sub-second
/// suffixes are dropped.
pub fn parse_metadata_date(raw: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: [&str; 3] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    const DATE_FORMATS: [&str; 2] = ["%Y:%m:%d", "%Y-%m-%d"];

    let trimmed = raw.trim().trim_matches('\0');
    let trimmed = trimmed.split('.').next().unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|fmt| {
                chrono::NaiveDate::parse_from_str(trimmed, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_accepts_is_case_insensitive() {
        assert!(MediaKind::Photo.accepts(Path::new("/a/IMG_0001.JPG")));
        assert!(MediaKind::Photo.accepts(Path::new("b.heic")));
        assert!(!MediaKind::Photo.accepts(Path::new("clip.mov")));
        assert!(MediaKind::Video.accepts(Path::new("clip.MOV")));
        assert!(!MediaKind::Video.accepts(Path::new("noext")));
    }

    #[test]
    fn test_parse_metadata_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2019, 7, 4)
            .unwrap()
            .and_hms_opt(13, 5, 9)
            .unwrap();
        assert_eq!(parse_metadata_date("2019:07:04 13:05:09"), Some(expected));
        assert_eq!(parse_metadata_date("2019-07-04 13:05:09.123"), Some(expected));
        assert_eq!(parse_metadata_date("2019/07/04 13:05:09"), Some(expected));
        assert_eq!(
            parse_metadata_date("2019:07:04"),
            NaiveDate::from_ymd_opt(2019, 7, 4).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_metadata_date("0000:00:00 00:00:00"), None);
        assert_eq!(parse_metadata_date(""), None);
    }
}
