use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use log::{debug, warn};
use serde::Serialize;

use super::classify::{classify, LineKind};

pub const NUM_OF_FROM_SCRATCH: &str = "num_of_from_scratch";
pub const CAPRICA: &str = "caprica";

/// Metrics extracted from one build log, keyed by metric name.
///
/// Values are kept exactly as they appear in the log; numeric parsing is
/// left to the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogMetrics(BTreeMap<String, String>);

impl LogMetrics {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LogMetrics {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Single-pass accumulator of [`LogMetrics`] for one build.
#[derive(Debug, Default)]
pub struct MetricExtractor {
    metrics: LogMetrics,
}

impl MetricExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line. Returns whether the line was recognized.
    ///
    /// Identity keys keep their first declaration; timings, the scratch
    /// counter and the report URL keep the last one seen.
    pub fn observe(&mut self, line: &str) -> bool {
        match classify(line) {
            LineKind::Identity { key, value } => {
                if self.metrics.get(key).is_none() {
                    self.metrics.set(key, &value);
                }
            }
            LineKind::ScratchCount(count) => self.metrics.set(NUM_OF_FROM_SCRATCH, count),
            LineKind::PhaseTiming { phase, duration } => {
                debug!("{:?} took {duration}", phase);
                self.metrics.set(phase.metric(), duration);
            }
            LineKind::ReportUrl(url) => self.metrics.set(CAPRICA, url),
            LineKind::Unrecognized => return false,
        }
        true
    }

    pub fn finish(self) -> LogMetrics {
        self.metrics
    }
}

/// Streams a build log line by line and extracts its metrics.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected. A read
/// error ends extraction early and keeps whatever was collected so far.
pub fn extract_metrics<R: BufRead>(mut reader: R) -> LogMetrics {
    let mut extractor = MetricExtractor::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                extractor.observe(line.trim_end_matches(['\r', '\n']));
            }
            Err(e) => {
                warn!("Stopped reading build log early: {e}");
                break;
            }
        }
    }

    extractor.finish()
}

/// Extracts metrics from the log file at `path`.
///
/// A missing or unreadable log yields empty metrics.
pub fn extract_from_file(path: &Path) -> LogMetrics {
    match File::open(path) {
        Ok(file) => extract_metrics(BufReader::new(file)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No build log at {}", path.display());
            LogMetrics::default()
        }
        Err(e) => {
            warn!("Cannot open build log {}: {e}", path.display());
            LogMetrics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    const SAMPLE_LOG: &str = r#"Build Configuration:
BB_VERSION           = "1.40.0"
BUILD_SYS            = "x86_64-linux"
NATIVELSBSTRING      = "ubuntu-18.04"
TARGET_SYS           = "arm-starfish-linux-gnueabi"
MACHINE              = "k7hp"
DISTRO               = "starfish"
DISTRO_VERSION       = "6.0.0"
TUNE_FEATURES        = "arm armv7a vfp thumb neon cortexa9 webos-cortexa9"
TARGET_FPU           = "softfp"
WEBOS_ENCRYPTION_KEY_TYPE = "develkey"
NOTE: Executing SetScene Tasks
NOTE: do_populate_lic: 54.8% sstate reuse (125 setscene, 103 scratch)
NOTE: Tasks Summary: Attempted 4012 tasks of which 3811 didn't need to be rerun and all succeeded.
NOTE: Build report: http://caprica.lge.com/Builds/Details/123456
TIME: 2020-09-13T12:00:00 12.5 real 0.0 user 0.0 sys 0.0 rss 0 pid rm -rf /work/BUILD
"#;

    #[test]
    fn test_extracts_sample_log() {
        let metrics = extract_metrics(Cursor::new(SAMPLE_LOG));

        assert_eq!(metrics.get("BB_VERSION"), Some("\"1.40.0\""));
        assert_eq!(metrics.get("MACHINE"), Some("\"k7hp\""));
        assert_eq!(
            metrics.get("TUNE_FEATURES"),
            Some("\"arm armv7a vfp thumb neon cortexa9 webos-cortexa9\"")
        );
        assert_eq!(metrics.get(NUM_OF_FROM_SCRATCH), Some("103"));
        assert_eq!(
            metrics.get(CAPRICA),
            Some("http://caprica.lge.com/Builds/Details/123456")
        );
        assert_eq!(metrics.get("time_rm_BUILD"), Some("12.5"));
        assert_eq!(metrics.get("time_bitbake"), None);
        assert_eq!(metrics.len(), 13);
    }

    #[test]
    fn test_first_identity_declaration_wins() {
        let log = "DISTRO = \"starfish\"\nDISTRO = \"other\"\n";
        let metrics = extract_metrics(Cursor::new(log));
        assert_eq!(metrics.get("DISTRO"), Some("\"starfish\""));
    }

    #[test]
    fn test_last_timing_wins() {
        let log = "TIME: t 1.0 a b c d e f g h i rm -rf /w/BUILD\n\
                   TIME: t 2.0 a b c d e f g h i rm -rf /w/BUILD\n";
        let metrics = extract_metrics(Cursor::new(log));
        assert_eq!(metrics.get("time_rm_BUILD"), Some("2.0"));
    }

    #[test]
    fn test_unrecognized_lines_leave_metrics_unchanged() {
        let mut extractor = MetricExtractor::new();
        assert!(extractor.observe("DISTRO = \"starfish\""));
        let before = extractor.metrics.clone();

        assert!(!extractor.observe("ERROR: something odd"));
        assert!(!extractor.observe(""));
        assert!(!extractor.observe("   "));

        assert_eq!(extractor.finish(), before);
    }

    #[test]
    fn test_handles_crlf_and_invalid_utf8() {
        let mut bytes = b"DISTRO = \"starfish\"\r\n".to_vec();
        bytes.extend_from_slice(b"garbage \xff\xfe line\n");
        bytes.extend_from_slice(b"MACHINE = \"h15\"");

        let metrics = extract_metrics(Cursor::new(bytes));
        assert_eq!(metrics.get("DISTRO"), Some("\"starfish\""));
        assert_eq!(metrics.get("MACHINE"), Some("\"h15\""));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let first = extract_metrics(Cursor::new(SAMPLE_LOG));
        let second = extract_metrics(Cursor::new(SAMPLE_LOG));
        assert_eq!(first, second);
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(ErrorKind::Other, "disk went away"));
            }
            self.served = true;
            let line = b"DISTRO = \"starfish\"\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn test_read_error_keeps_partial_metrics() {
        let metrics = extract_metrics(BufReader::new(FailingReader { served: false }));
        assert_eq!(metrics.get("DISTRO"), Some("\"starfish\""));
    }

    #[test]
    fn test_missing_file_yields_empty_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = extract_from_file(&dir.path().join("log"));
        assert_eq!(metrics, LogMetrics::default());
    }
}
