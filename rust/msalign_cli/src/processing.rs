use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use msalign::{
    AlignmentPipeline,
    AlignmentResult,
    InMemoryAccessor,
    InMemoryRawData,
    PipelineStage,
    ProgressReporter,
    RawSpectrum,
    ScanProperty,
};
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tabled::settings::Style;
use tabled::{
    Table,
    Tabled,
};
use tracing::{
    info,
    warn,
};

use crate::config::Config;
use crate::errors::CliError;

pub fn read_peaks(path: &Path) -> Result<InMemoryAccessor, CliError> {
    info!("Reading peak lists from {:?}", path);
    let file = std::fs::File::open(path).map_err(|e| CliError::io(e, path))?;
    let files: Vec<Vec<ScanProperty>> = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| CliError::DataReading {
            source: format!("{:?}: {}", path, e),
        })?;
    Ok(InMemoryAccessor::new(files))
}

pub fn read_raw(path: &Path) -> Result<InMemoryRawData, CliError> {
    info!("Reading raw spectra from {:?}", path);
    let file = std::fs::File::open(path).map_err(|e| CliError::io(e, path))?;
    let files: Vec<Vec<RawSpectrum>> = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| CliError::DataReading {
            source: format!("{:?}: {}", path, e),
        })?;
    Ok(InMemoryRawData::new(files))
}

/// Shows one progress bar, reset whenever a new stage starts.
struct BarProgress {
    bar: ProgressBar,
    stage: Mutex<Option<PipelineStage>>,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} {msg:<22} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            bar.set_style(style);
        }
        Self {
            bar,
            stage: Mutex::new(None),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for BarProgress {
    fn report(&self, stage: PipelineStage, done: usize, total: usize) -> ControlFlow<()> {
        if let Ok(mut current) = self.stage.lock() {
            if *current != Some(stage) {
                *current = Some(stage);
                self.bar.reset();
                self.bar.set_message(stage.to_string());
                self.bar.set_length(total as u64);
            }
        }
        self.bar.set_position(done as u64);
        ControlFlow::Continue(())
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Count")]
    count: usize,
}

fn summary_table(result: &AlignmentResult) -> String {
    let stats = &result.stats;
    let mut rows = vec![
        SummaryRow {
            step: "Files".into(),
            count: stats.num_files,
        },
        SummaryRow {
            step: "Input features".into(),
            count: stats.input_features,
        },
        SummaryRow {
            step: "Joined spots".into(),
            count: stats.joined_spots,
        },
    ];
    if let Some(gap_filling) = &stats.gap_filling {
        rows.push(SummaryRow {
            step: "Missing before filling".into(),
            count: gap_filling.missing_before,
        });
        rows.push(SummaryRow {
            step: "Gap filled".into(),
            count: gap_filling.filled,
        });
    }
    let refinement = &stats.refinement;
    rows.extend([
        SummaryRow {
            step: "Duplicates dropped".into(),
            count: refinement.duplicates_dropped,
        },
        SummaryRow {
            step: "Orphan isotopes dropped".into(),
            count: refinement.orphan_isotopes_dropped,
        },
        SummaryRow {
            step: "Empty spots dropped".into(),
            count: refinement.empty_dropped,
        },
        SummaryRow {
            step: "Retained spots".into(),
            count: refinement.retained,
        },
        SummaryRow {
            step: "Peak groups".into(),
            count: refinement.peak_groups,
        },
    ]);
    Table::new(rows).with(Style::rounded()).to_string()
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), CliError> {
    let file = std::fs::File::create(path).map_err(|e| CliError::io(e, path))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value).map_err(|e| {
        CliError::Io {
            source: e.to_string(),
            path: Some(path.to_string_lossy().to_string()),
        }
    })?;
    info!("Wrote {:?}", path);
    Ok(())
}

pub fn run_alignment(config: Config) -> Result<(), CliError> {
    let (input, output) = match (config.input, config.output) {
        (Some(input), Some(output)) => (input, output),
        _ => {
            return Err(CliError::Config {
                source: "Both input and output need to be configured".to_string(),
            });
        }
    };

    let threads = config.alignment.gap_filling.threads;
    if threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            warn!("Could not configure the global thread pool: {}", e);
        }
    }

    let accessor = read_peaks(&input.peaks)?;
    let raw = match &input.raw {
        Some(path) => Some(read_raw(path)?),
        None => None,
    };

    std::fs::create_dir_all(&output.directory)
        .map_err(|e| CliError::io(e, &output.directory))?;
    write_json(
        &config.alignment,
        &output.directory.join("alignment_config.json"),
    )?;

    let start = Instant::now();
    let pipeline = AlignmentPipeline::new(config.alignment);
    let progress = BarProgress::new();
    let result = pipeline.run(
        &accessor,
        raw.as_ref().map(|x| x as &dyn msalign::RawDataProvider),
        &progress,
    );
    progress.finish();
    let result = result?;
    info!("Alignment finished in {:?}", start.elapsed());

    write_json(
        &result.spots,
        &output.directory.join("alignment_spots.json"),
    )?;
    write_json(
        &result.stats,
        &output.directory.join("alignment_stats.json"),
    )?;
    println!("{}", summary_table(&result));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use msalign::{
        AlignmentConfig,
        NoProgress,
    };

    #[test]
    fn test_summary_lists_every_step() {
        let accessor = InMemoryAccessor::new(vec![
            vec![ScanProperty::new(0, 300.0, 5.0, 100.0)],
            vec![ScanProperty::new(0, 300.001, 5.01, 120.0)],
        ]);
        let result = AlignmentPipeline::new(AlignmentConfig::default())
            .run(&accessor, None, &NoProgress)
            .unwrap();
        let table = summary_table(&result);
        assert!(table.contains("Joined spots"));
        assert!(table.contains("Retained spots"));
        assert!(!table.contains("Gap filled"));
    }

    #[test]
    fn test_reads_peak_lists() {
        let dir = std::env::temp_dir().join("msalign_cli_read_peaks");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("peaks.json");
        let files = vec![vec![ScanProperty::new(0, 300.0, 5.0, 100.0)], vec![]];
        std::fs::write(&path, serde_json::to_string(&files).unwrap()).unwrap();
        let accessor = read_peaks(&path).unwrap();
        use msalign::DataAccessor;
        assert_eq!(accessor.num_files(), 2);
        assert!(read_peaks(&dir.join("missing.json")).is_err());
    }
}
