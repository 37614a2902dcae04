use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use kdd_partition::data::loader::FileSource;
use kdd_partition::data::model::PartitionKind;
use kdd_partition::{build_report_from, PipelineConfig, ReportBundle, ReportView};

/// Split an ARFF traffic dataset into stratified train/validation/test
/// partitions and chart the category frequencies of each.
#[derive(Parser, Debug)]
#[command(name = "kdd-partition", version)]
struct Cli {
    /// ARFF dataset to read. Falls back to `dataset_path` from the config.
    dataset: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the sampling seed.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Directory for charts, report.json and the frequency CSV.
    #[arg(short, long, default_value = "report")]
    out: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the report was produced.
fn run(cli: Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    let dataset = cli
        .dataset
        .or_else(|| config.dataset_path.clone())
        .context("no dataset given on the command line or in the config")?;

    info!("building report for {}", dataset.display());
    let outcome = build_report_from(&mut FileSource::new(&dataset), &config);

    fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating output directory {}", cli.out.display()))?;

    let ok = outcome.is_ok();
    if let Ok(bundle) = &outcome {
        write_artifacts(bundle, &config.stratify_column, &cli.out)?;
        print_summary(bundle);
    }

    let view = ReportView::from(outcome);
    if let Some(message) = &view.error {
        eprintln!("error: {message}");
    }
    let report_path = cli.out.join("report.json");
    let file = File::create(&report_path)
        .with_context(|| format!("creating {}", report_path.display()))?;
    serde_json::to_writer_pretty(file, &view).context("writing report.json")?;
    info!("wrote {}", report_path.display());

    Ok(ok)
}

fn write_artifacts(bundle: &ReportBundle, column: &str, out: &Path) -> Result<()> {
    for (kind, chart) in PartitionKind::ALL.iter().zip(&bundle.charts) {
        let path = out.join(format!("{}.png", kind.name()));
        fs::write(&path, &chart.png).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote '{}' to {}", chart.title, path.display());
    }

    let csv_path = out.join(format!("{column}_counts.csv"));
    let file =
        File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?;
    bundle.protocol_counts.write_csv(file, column)?;
    Ok(())
}

fn print_summary(bundle: &ReportBundle) {
    let sizes = &bundle.sizes;
    println!(
        "rows: total {}, train {}, val {}, test {}",
        sizes.total, sizes.train, sizes.val, sizes.test
    );
    for (category, count) in bundle.protocol_counts.iter() {
        println!("  {category:<12} {count}");
    }
}
