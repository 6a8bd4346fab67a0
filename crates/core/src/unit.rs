// Work units
//
// A work unit is one chapter file in a series' source directory. Its key is
// the file stem; the completion artifact path is derived from series + key.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{RunConfig, DEFAULT_ARTIFACT_SUFFIX};
use crate::error::Result;

const SOURCE_EXTENSION: &str = "txt";

/// One chapter to translate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkUnit {
    /// Series identifier
    pub series: String,
    /// Stable key within the series (source file stem)
    pub key: String,
    /// Source text file
    pub source_path: PathBuf,
}

impl WorkUnit {
    pub fn new(series: impl Into<String>, key: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            series: series.into(),
            key: key.into(),
            source_path: source_path.into(),
        }
    }

    /// Chapter ordinal parsed from the key
    pub fn ordinal(&self) -> Option<u32> {
        parse_ordinal(&self.key)
    }

    /// `series/key`, used in logs and task labels
    pub fn label(&self) -> String {
        format!("{}/{}", self.series, self.key)
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series, self.key)
    }
}

/// First run of ASCII digits in a key, if it fits in a `u32`
///
/// `"chapter-0042"` → 42, `"ch12_part2"` → 12, `"prologue"` → `None`.
pub fn parse_ordinal(key: &str) -> Option<u32> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static regex"));
    re.find(key)?.as_str().parse().ok()
}

/// List the work units in a flat source directory
///
/// Keeps regular `.txt` files, ignores hidden files and sub-directories, and
/// orders units by ordinal (units without one last) then by key. Keys are
/// unique: when two files share a stem (`ch1.txt`, `ch1.TXT`) only the first
/// by path is kept.
pub async fn discover_units(series: &str, dir: &Path) -> Result<Vec<WorkUnit>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut units = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            debug!(path = %path.display(), "Skipping non UTF-8 file name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let is_source = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if !is_source {
            continue;
        }

        let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        units.push(WorkUnit::new(series, key, path.clone()));
    }

    units.sort_by(compare_units);

    let mut seen = HashSet::new();
    units.retain(|unit| {
        if seen.insert(unit.key.clone()) {
            return true;
        }
        warn!(
            series,
            key = %unit.key,
            source = %unit.source_path.display(),
            "Duplicate chapter key; ignoring file"
        );
        false
    });

    debug!(series, dir = %dir.display(), count = units.len(), "Discovered work units");
    Ok(units)
}

fn compare_units(a: &WorkUnit, b: &WorkUnit) -> Ordering {
    let by_ordinal = match (a.ordinal(), b.ordinal()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_ordinal
        .then_with(|| a.key.cmp(&b.key))
        .then_with(|| a.source_path.cmp(&b.source_path))
}

/// Where completion artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub output_dir: PathBuf,
    pub suffix: String,
}

impl ArtifactLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
        }
    }

    /// Layout for a run's output directory and artifact suffix
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(&config.output_dir).with_suffix(&config.artifact_suffix)
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Directory holding a series' artifacts
    pub fn series_dir(&self, series: &str) -> PathBuf {
        self.output_dir.join(series)
    }

    /// `<output_dir>/<series>/<key><suffix>`
    pub fn artifact_path(&self, unit: &WorkUnit) -> PathBuf {
        self.series_dir(&unit.series)
            .join(format!("{}{}", unit.key, self.suffix))
    }
}
