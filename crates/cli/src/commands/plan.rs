// Plan command: discovery and resolution only

use std::path::PathBuf;

use anyhow::Result;
use scrivener_core::{discover_units, ArtifactLayout, Decision, Resolution, UnitResolver};
use serde::Serialize;
use tracing::warn;

use crate::output::{print_table_header, print_table_row, OutputFormat};

#[derive(Debug, Serialize)]
struct SeriesPlan {
    series: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    units: Vec<Resolution>,
}

pub async fn run(
    selected: &[String],
    show_all: bool,
    series_file: Option<PathBuf>,
    output: OutputFormat,
) -> Result<()> {
    let config = super::load_config(series_file)?;
    let catalog = super::load_catalog(&config, selected).await?;
    let layout = ArtifactLayout::from_config(&config);

    let mut plans = Vec::with_capacity(catalog.series.len());
    for series in &catalog.series {
        let dir = config.source_dir_for(series);
        let plan = match discover_units(&series.id, &dir).await {
            Ok(units) => SeriesPlan {
                series: series.id.clone(),
                error: None,
                units: UnitResolver::new(series, &layout).resolve(units).await,
            },
            Err(e) => {
                warn!(series = %series.id, source_dir = %dir.display(), error = %e, "Cannot list source directory");
                SeriesPlan {
                    series: series.id.clone(),
                    error: Some(e.to_string()),
                    units: Vec::new(),
                }
            }
        };
        plans.push(plan);
    }

    if !show_all {
        for plan in &mut plans {
            plan.units.retain(|r| r.decision.is_included());
        }
    }

    if !output.is_text() {
        return output.print_value(&plans);
    }

    for plan in &plans {
        if let Some(error) = &plan.error {
            println!("{}: {}", plan.series, error);
            continue;
        }
        let pending = plan.units.iter().filter(|r| r.decision.is_included()).count();
        println!("{} ({} to translate)", plan.series, pending);
        if plan.units.is_empty() {
            continue;
        }

        print_table_header(&[("  UNIT", 30), ("DECISION", 20), ("ARTIFACT", 50)]);
        for resolution in &plan.units {
            let (decision, artifact) = match &resolution.decision {
                Decision::Include { artifact } => {
                    ("translate".to_string(), artifact.display().to_string())
                }
                Decision::Skip(reason) => (format!("skip: {}", reason.kind()), String::new()),
            };
            let unit = format!("  {}", resolution.unit.key);
            print_table_row(&[(&unit, 30), (&decision, 20), (&artifact, 50)]);
        }
        println!();
    }

    Ok(())
}
