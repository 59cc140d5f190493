use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Tag, Value};
use tracing::{debug, trace};

use super::{parse_metadata_date, MediaKind, MetadataExtractor};

pub const EXTENSIONS: &[&str] = &[
    // JPEG
    "jpg", "jpeg", "jpe", "jif", "jfif",
    // TIFF
    "tif", "tiff",
    "png",
    // RAW
    "raw", "cr2", "cr3", "nef", "arw", "dng", "orf", "rw2", "pef", "srw",
    // HEIC/HEIF
    "heic", "heif",
    "webp", "bmp",
];

/// Tags tried in order: when the shutter fired, when it was digitized, and
/// the camera's last-modified stamp.
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// EXIF reader for still images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Photo
    }

    fn date_taken(&self, path: &Path) -> Option<NaiveDateTime> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                debug!("Cannot open {}: {}", path.display(), e);
                return None;
            }
        };
        let mut reader = BufReader::new(file);
        let exif = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(e) => {
                trace!("No EXIF in {}: {}", path.display(), e);
                return None;
            }
        };

        let found = DATE_TAGS.iter().find_map(|tag| {
            let field = exif.get_field(*tag, In::PRIMARY)?;
            let Value::Ascii(ref values) = field.value else {
                return None;
            };
            values.iter().find_map(|raw| ascii_to_datetime(raw))
        });
        if found.is_none() {
            debug!("No EXIF date found for {}", path.display());
        }
        found
    }
}

fn ascii_to_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    if let Ok(dt) = exif::DateTime::from_ascii(raw) {
        let parsed = NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())
            .and_then(|d| d.and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into()));
        if parsed.is_some() {
            return parsed;
        }
    }
    parse_metadata_date(&String::from_utf8_lossy(raw))
}
