use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use super::{MediaKind, MetadataExtractor};

pub const EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "mkv", "wmv", "flv",
    // HD camcorder
    "mts", "m2ts", "ts",
    // Mobile
    "3gp", "3g2",
    // Web
    "webm", "ogv",
    "mpg", "mpeg", "vob", "divx", "asf",
];

const DATE_TAGS: [&str; 3] = ["creation_time", "date", "DATE"];

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: serde_json::Map<String, serde_json::Value>,
}

/// Container metadata through an external `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeExtractor {
    pub program: String,
    pub timeout: Duration,
}

impl Default for FfprobeExtractor {
    fn default() -> Self {
        Self {
            program: "ffprobe".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl FfprobeExtractor {
    fn probe(&self, path: &Path) -> io::Result<Option<String>> {
        let mut child = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path.as_os_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // Drain stdout on a helper thread so a chatty probe cannot block on a
        // full pipe while we wait for it.
        let mut stdout = child.stdout.take();
        let reader = thread::spawn(move || {
            let mut buf = String::new();
            if let Some(out) = stdout.as_mut() {
                if let Err(e) = out.read_to_string(&mut buf) {
                    debug!("Unreadable ffprobe output: {}", e);
                }
            }
            buf
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                debug!("ffprobe timeout for {}", path.display());
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = reader.join().unwrap_or_default();
        if !status.success() {
            debug!("ffprobe exited with {} for {}", status, path.display());
            return Ok(None);
        }
        Ok(Some(output))
    }
}

impl MetadataExtractor for FfprobeExtractor {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn date_taken(&self, path: &Path) -> Option<NaiveDateTime> {
        let output = match self.probe(path) {
            Ok(Some(output)) => output,
            Ok(None) => return None,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found, using file dates only", self.program);
                return None;
            }
            Err(e) => {
                debug!("ffprobe failed for {}: {}", path.display(), e);
                return None;
            }
        };
        date_from_probe_json(&output)
    }
}

fn date_from_probe_json(json: &str) -> Option<NaiveDateTime> {
    let probe: ProbeOutput = match serde_json::from_str(json) {
        Ok(p) => p,
        Err(e) => {
            debug!("Unreadable ffprobe output: {}", e);
            return None;
        }
    };
    DATE_TAGS.iter().find_map(|tag| {
        probe
            .format
            .tags
            .get(*tag)
            .and_then(|v| v.as_str())
            .and_then(parse_container_date)
    })
}

/// Accepts `2020-03-15T10:30:45.000000Z`, RFC 3339 with offsets, and plain
/// `2020-03-15`. Offsets are dropped, keeping the recorded wall-clock time.
fn parse_container_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        let stripped = raw.split('.').next().unwrap_or(raw).trim_end_matches('Z');
        return NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M:%S").ok();
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_json() {
        let json = r#"{"format": {"filename": "x.mov", "tags": {"major_brand": "qt  ",
            "creation_time": "2020-03-15T10:30:45.000000Z"}}}"#;
        let expected = NaiveDate::from_ymd_opt(2020, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 45)
            .unwrap();
        assert_eq!(date_from_probe_json(json), Some(expected));
    }

    #[test]
    fn test_offset_keeps_wall_clock_time() {
        let expected = NaiveDate::from_ymd_opt(2020, 3, 15)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap();
        assert_eq!(parse_container_date("2020-03-15T23:30:00+02:00"), Some(expected));
        assert_eq!(parse_container_date("2020-03-15T23:30:00-05:00"), Some(expected));
    }

    #[test]
    fn test_parse_probe_json_fallback_tags() {
        let json = r#"{"format": {"tags": {"DATE": "2018-12-01"}}}"#;
        assert_eq!(
            date_from_probe_json(json),
            NaiveDate::from_ymd_opt(2018, 12, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(date_from_probe_json(r#"{"format": {}}"#), None);
        assert_eq!(date_from_probe_json("not json"), None);
    }

    #[test]
    fn test_missing_program_yields_none() {
        let extractor = FfprobeExtractor {
            program: "definitely-not-a-real-ffprobe".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(extractor.date_taken(Path::new("/tmp/clip.mp4")), None);
    }
}
