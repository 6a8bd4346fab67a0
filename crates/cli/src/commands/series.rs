// Series listing command

use std::path::PathBuf;

use anyhow::Result;

use crate::output::{print_table_header, print_table_row, OutputFormat};

pub async fn run(series_file: Option<PathBuf>, output: OutputFormat) -> Result<()> {
    let config = super::load_config(series_file)?;
    let catalog = super::load_catalog(&config, &[]).await?;

    if !output.is_text() {
        return output.print_value(&catalog);
    }

    if catalog.series.is_empty() {
        println!("No series configured in {}", config.series_file.display());
        return Ok(());
    }

    print_table_header(&[("ID", 24), ("RANGE", 12), ("LANGUAGES", 20), ("SOURCE", 30)]);
    for series in &catalog.series {
        let range = match (series.min_chapter, series.max_chapter) {
            (None, None) => "all".to_string(),
            (min, max) => format!(
                "{}-{}",
                min.map(|n| n.to_string()).unwrap_or_default(),
                max.map(|n| n.to_string()).unwrap_or_default()
            ),
        };
        let range = if series.skip { "skip".to_string() } else { range };
        let languages = format!("{} > {}", series.source_language, series.target_language);
        let source = config.source_dir_for(series).display().to_string();
        print_table_row(&[(&series.id, 24), (&range, 12), (&languages, 20), (&source, 30)]);
    }

    Ok(())
}
