use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use thundercast::assembler::ForecastAssemblerBuilder;
use thundercast::config::{AnalysisOpts, NowcastOpts};
use thundercast::io::{
    read_grid, read_observations, read_series, CsvForecastWriter, CsvSeriesSource, ForecastWriter,
    IoError, OutputTemplate,
};
use thundercast::observations::ObservationSet;
use thundercast::series::FieldSeries;

const VERSION: &str = env!("THUNDERCAST_VERSION");

/// Probability of thunder nowcast.
///
/// Builds an analysis field from lightning observations, estimates a motion
/// field from the recent precipitation-rate frames and extrapolates the
/// analysis 4 hours forward at 15 minute steps.
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Analysis time, formatted %Y%m%d%H%M
    #[clap(long)]
    start_time: String,

    /// Width of the recent observation window in minutes
    #[clap(long, default_value = "15")]
    obs_time_window: i64,

    /// Width of the older observation window in minutes (defaults to the
    /// recent width)
    #[clap(long)]
    older_obs_window: Option<i64>,

    /// Precipitation-rate frame files, any order; they are sorted by file
    /// name before assembly
    #[clap(long)]
    rprate_0_file: PathBuf,
    #[clap(long)]
    rprate_1_file: PathBuf,
    #[clap(long)]
    rprate_2_file: PathBuf,
    #[clap(long)]
    rprate_3_file: PathBuf,

    /// Single backup source covering the full history window
    #[clap(long)]
    backup_file: Option<PathBuf>,

    /// Lightning observation table (latitude,longitude,time)
    #[clap(long)]
    obs_file: PathBuf,

    /// Grid coordinate table
    #[clap(long)]
    grid_file: PathBuf,

    /// Model thunder-probability field echoed when no nowcast is possible
    #[clap(long)]
    template_file: Option<PathBuf>,

    /// Output file path
    #[clap(long)]
    output: PathBuf,
}

fn parse_start_time(text: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M")
        .with_context(|| format!("start_time '{}' is not %Y%m%d%H%M", text))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Oldest-first ordering by file name, matching the timestamped naming of
/// the operational file layout.
fn order_frame_paths(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort_by_key(|path| path.file_name().map(|name| name.to_os_string()));
    paths
}

fn entrypoint() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let analysis_time = parse_start_time(&cli.start_time)?;
    let grid = read_grid(&cli.grid_file)?;

    let reports = match read_observations(&cli.obs_file) {
        Ok(reports) => reports,
        Err(IoError::MissingInputFile(path)) => {
            warn!("observation table {} missing", path.display());
            Vec::new()
        }
        Err(err) => return Err(err.into()),
    };
    let analysis_opts = AnalysisOpts {
        obs_time_window: cli.obs_time_window,
        older_window: cli.older_obs_window,
        ..AnalysisOpts::default()
    };
    let observations = ObservationSet::bucketed(&reports, analysis_time, &analysis_opts);

    let template: Option<FieldSeries> = match &cli.template_file {
        Some(path) => Some(read_series(path)?),
        None => None,
    };

    let primary = order_frame_paths(vec![
        cli.rprate_3_file.clone(),
        cli.rprate_2_file.clone(),
        cli.rprate_1_file.clone(),
        cli.rprate_0_file.clone(),
    ]);
    let provider = CsvSeriesSource::new(primary, cli.backup_file.clone());

    let nowcast_opts = NowcastOpts::default();
    let assembler = ForecastAssemblerBuilder::default()
        .nowcast_opts(&nowcast_opts)
        .analysis_opts(&analysis_opts)
        .build()?;
    let result = assembler.run(
        &provider,
        &grid,
        &observations,
        template.as_ref(),
        analysis_time,
    )?;
    info!(
        "assembled {:?} product through states {:?}",
        result.report.product, result.report.path
    );

    let output_template = OutputTemplate::new(
        analysis_time,
        nowcast_opts.step_minutes,
        "probability-of-thunder",
        result.sequence.shape(),
    );
    CsvForecastWriter::new(cli.output.clone()).write(&output_template, &result.sequence)?;
    Ok(())
}

fn main() -> ExitCode {
    match entrypoint() {
        Err(e) => {
            eprintln!("Error: {:?}: {}", e, e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}
