// Resumable unit resolver
//
// Decides, before any network work, whether a unit still needs translating.
// The completion artifact's existence is the only "done" signal; nothing is
// cached between runs.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SeriesConfig;
use crate::unit::{ArtifactLayout, WorkUnit};

/// Why a unit was left out of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The whole series is marked `skip`
    SeriesSkipped,
    /// Range bounds are configured but the key has no ordinal
    UnparsableOrdinal,
    BelowMinimum { ordinal: u32, min: u32 },
    AboveMaximum { ordinal: u32, max: u32 },
    /// Completion artifact already exists
    AlreadyDone { artifact: PathBuf },
}

impl SkipReason {
    /// Short stable name for summaries
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::SeriesSkipped => "series_skipped",
            SkipReason::UnparsableOrdinal => "unparsable_ordinal",
            SkipReason::BelowMinimum { .. } | SkipReason::AboveMaximum { .. } => "out_of_range",
            SkipReason::AlreadyDone { .. } => "already_done",
        }
    }
}

/// Include/skip verdict for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Include { artifact: PathBuf },
    Skip(SkipReason),
}

impl Decision {
    pub fn is_included(&self) -> bool {
        matches!(self, Decision::Include { .. })
    }
}

/// A unit together with its verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub unit: WorkUnit,
    pub decision: Decision,
}

/// Filters work units against series settings and existing artifacts
pub struct UnitResolver<'a> {
    series: &'a SeriesConfig,
    layout: &'a ArtifactLayout,
}

impl<'a> UnitResolver<'a> {
    pub fn new(series: &'a SeriesConfig, layout: &'a ArtifactLayout) -> Self {
        Self { series, layout }
    }

    /// Decide one unit
    ///
    /// Cheap checks run first: series flag, then ordinal bounds, then the
    /// artifact existence check.
    pub async fn resolve_unit(&self, unit: WorkUnit) -> Resolution {
        let decision = self.decide(&unit).await;
        if let Decision::Skip(reason) = &decision {
            match reason {
                SkipReason::UnparsableOrdinal => {
                    warn!(unit = %unit, "Cannot parse chapter number; skipping")
                }
                SkipReason::AlreadyDone { artifact } => {
                    debug!(unit = %unit, artifact = %artifact.display(), "Already translated; skipping")
                }
                other => debug!(unit = %unit, reason = other.kind(), "Skipping unit"),
            }
        }
        Resolution { unit, decision }
    }

    async fn decide(&self, unit: &WorkUnit) -> Decision {
        if self.series.skip {
            return Decision::Skip(SkipReason::SeriesSkipped);
        }

        if self.series.has_range() {
            let Some(ordinal) = unit.ordinal() else {
                return Decision::Skip(SkipReason::UnparsableOrdinal);
            };
            if let Some(min) = self.series.min_chapter {
                if ordinal < min {
                    return Decision::Skip(SkipReason::BelowMinimum { ordinal, min });
                }
            }
            if let Some(max) = self.series.max_chapter {
                if ordinal > max {
                    return Decision::Skip(SkipReason::AboveMaximum { ordinal, max });
                }
            }
        }

        let artifact = self.layout.artifact_path(unit);
        match tokio::fs::try_exists(&artifact).await {
            Ok(true) => Decision::Skip(SkipReason::AlreadyDone { artifact }),
            Ok(false) => Decision::Include { artifact },
            Err(e) => {
                // Unknown state: translating again is the safe side
                warn!(unit = %unit, artifact = %artifact.display(), error = %e, "Cannot check artifact; including unit");
                Decision::Include { artifact }
            }
        }
    }

    /// Decide every unit, preserving order
    ///
    /// A skipped series short-circuits without inspecting any unit.
    pub async fn resolve(&self, units: Vec<WorkUnit>) -> Vec<Resolution> {
        if self.series.skip {
            info!(series = %self.series.id, units = units.len(), "Series marked skip");
            return units
                .into_iter()
                .map(|unit| Resolution {
                    unit,
                    decision: Decision::Skip(SkipReason::SeriesSkipped),
                })
                .collect();
        }

        let mut resolutions = Vec::with_capacity(units.len());
        for unit in units {
            resolutions.push(self.resolve_unit(unit).await);
        }
        resolutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(key: &str) -> WorkUnit {
        WorkUnit::new("novel", key, format!("/in/novel/{key}.txt"))
    }

    #[tokio::test]
    async fn test_range_bounds_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let series = SeriesConfig::new("novel").with_range(Some(10), Some(50));
        let resolver = UnitResolver::new(&series, &layout);

        let results = resolver
            .resolve(vec![
                unit("chapter-5"),
                unit("chapter-10"),
                unit("chapter-50"),
                unit("chapter-51"),
                unit("extra"),
            ])
            .await;

        let decisions: Vec<_> = results.iter().map(|r| r.decision.clone()).collect();
        assert_eq!(
            decisions[0],
            Decision::Skip(SkipReason::BelowMinimum { ordinal: 5, min: 10 })
        );
        assert!(decisions[1].is_included());
        assert!(decisions[2].is_included());
        assert_eq!(
            decisions[3],
            Decision::Skip(SkipReason::AboveMaximum { ordinal: 51, max: 50 })
        );
        assert_eq!(decisions[4], Decision::Skip(SkipReason::UnparsableOrdinal));
    }

    #[tokio::test]
    async fn test_no_range_keeps_unnumbered_units() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let series = SeriesConfig::new("novel");
        let resolver = UnitResolver::new(&series, &layout);

        let result = resolver.resolve_unit(unit("prologue")).await;
        assert!(result.decision.is_included());
    }

    #[tokio::test]
    async fn test_existing_artifact_skips() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let series = SeriesConfig::new("novel");
        let resolver = UnitResolver::new(&series, &layout);

        let done = unit("chapter-1");
        let artifact = layout.artifact_path(&done);
        tokio::fs::create_dir_all(artifact.parent().unwrap()).await.unwrap();
        tokio::fs::write(&artifact, "translated").await.unwrap();

        let result = resolver.resolve_unit(done).await;
        assert_eq!(
            result.decision,
            Decision::Skip(SkipReason::AlreadyDone { artifact })
        );
    }

    #[tokio::test]
    async fn test_skipped_series_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let series = SeriesConfig::new("novel").skipped();
        let resolver = UnitResolver::new(&series, &layout);

        let results = resolver.resolve(vec![unit("chapter-1"), unit("bogus")]).await;
        assert!(results
            .iter()
            .all(|r| r.decision == Decision::Skip(SkipReason::SeriesSkipped)));
    }

    #[test]
    fn test_decision_serialization() {
        let skip = Decision::Skip(SkipReason::BelowMinimum { ordinal: 5, min: 10 });
        assert_eq!(
            serde_json::to_value(&skip).unwrap(),
            serde_json::json!({ "decision": "skip", "reason": "below_minimum", "ordinal": 5, "min": 10 })
        );

        let include = Decision::Include {
            artifact: PathBuf::from("/out/novel/chapter-1.translated.txt"),
        };
        assert_eq!(
            serde_json::to_value(&include).unwrap(),
            serde_json::json!({ "decision": "include", "artifact": "/out/novel/chapter-1.translated.txt" })
        );
    }

    #[test]
    fn test_skip_reason_kind() {
        assert_eq!(SkipReason::BelowMinimum { ordinal: 1, min: 2 }.kind(), "out_of_range");
        assert_eq!(SkipReason::AboveMaximum { ordinal: 3, max: 2 }.kind(), "out_of_range");
        assert_eq!(SkipReason::SeriesSkipped.kind(), "series_skipped");
    }
}
