use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use sf_core::consts::c_to_k;
use sf_core::{RunConfig, TimestepLevel};
use sf_engine::{ArchiveSource, PixelUnit, RunDriver, StateStore, StepController};
use sf_physics::{BulkTransferModel, ForcingRecord, ModelParams, SiteProps, SnowState};
use sf_results::PointWriter;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(about = "snowflow CLI - adaptive snowpack simulation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a run file and print the timestep ladder
    Validate {
        /// Path to the run YAML file
        run_path: PathBuf,
    },
    /// Run a point simulation
    Run {
        /// Path to the run YAML file
        run_path: PathBuf,
        /// Path to the forcing CSV file
        #[arg(long)]
        forcing: PathBuf,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Everything one point run needs: engine options plus the site and the
/// measured initial snow properties.
#[derive(Debug, Deserialize)]
struct RunSpec {
    /// Timestamp of the first forcing record.
    start_time: DateTime<Utc>,
    site: SiteSpec,
    #[serde(default)]
    initial: InitialSnow,
    #[serde(default)]
    engine: RunConfig,
}

#[derive(Debug, Deserialize)]
struct SiteSpec {
    /// Elevation (m).
    elevation: f64,
    /// Roughness length (m).
    roughness_length: f64,
}

/// Initial snow properties, temperatures in Celsius as the legacy
/// snow-properties files carry them. Defaults to bare ground.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InitialSnow {
    z_s: f64,
    rho: f64,
    t_s_0: f64,
    t_s: f64,
    h2o_sat: f64,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Config(#[from] sf_core::ConfigError),

    #[error(transparent)]
    Engine(#[from] sf_engine::EngineError),

    #[error("Results error: {0}")]
    Results(#[from] sf_results::ResultsError),

    #[error("Forcing parse error at line {line}: {message}")]
    ForcingParse { line: usize, message: String },
}

type CliResult<T> = Result<T, CliError>;

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { run_path } => cmd_validate(&run_path),
        Commands::Run {
            run_path,
            forcing,
            output,
        } => cmd_run(&run_path, &forcing, output.as_deref()),
    }
}

fn load_spec(run_path: &Path) -> CliResult<RunSpec> {
    let content = fs::read_to_string(run_path)?;
    Ok(serde_yaml::from_str(&content)?)
}

fn cmd_validate(run_path: &Path) -> CliResult<()> {
    println!("Validating run file: {}", run_path.display());
    let spec = load_spec(run_path)?;
    let hierarchy = spec.engine.build_hierarchy()?;

    println!("✓ Run file is valid");
    println!("  Start time: {}", spec.start_time);
    println!("  Elevation:  {} m", spec.site.elevation);
    println!("\nTimestep ladder:");
    for level in TimestepLevel::ALL {
        let info = hierarchy.level(level);
        match info.threshold {
            Some(t) => println!(
                "  {:<7} {:>6.0} s  x{:<3} threshold {} kg/m^2",
                level.name(),
                info.duration_s,
                info.intervals,
                t
            ),
            None => println!(
                "  {:<7} {:>6.0} s  x{}",
                level.name(),
                info.duration_s,
                info.intervals
            ),
        }
    }
    Ok(())
}

fn cmd_run(run_path: &Path, forcing_path: &Path, output: Option<&Path>) -> CliResult<()> {
    let spec = load_spec(run_path)?;
    let config = &spec.engine;
    let hierarchy = config.build_hierarchy()?;

    let records = read_forcing(forcing_path)?;
    if records.len() < 2 {
        return Err(CliError::ForcingParse {
            line: records.len(),
            message: "need at least two forcing records".to_string(),
        });
    }

    let data_step = Duration::seconds(hierarchy.data_duration_s() as i64);
    let times: Vec<DateTime<Utc>> = (0..records.len())
        .map(|k| spec.start_time + data_step * k as i32)
        .collect();
    let mut source = ArchiveSource::new();
    for (&t, rec) in times.iter().zip(&records) {
        source.insert(t, vec![*rec]);
    }

    let site = SiteProps::new(spec.site.elevation, spec.site.roughness_length);
    let initial = &spec.initial;
    let snow = SnowState::from_initial(
        initial.z_s,
        initial.rho,
        initial.t_s_0,
        initial.t_s,
        initial.h2o_sat,
    );
    let store = StateStore::new(vec![PixelUnit::new(site, snow)]);

    let params = model_params(config);
    let controller = StepController::new(hierarchy, params, config.stop_no_snow);
    let model = BulkTransferModel;
    let mut driver = RunDriver::new(
        &model,
        controller,
        store,
        config.output_frequency as usize,
        config.temps_in_c,
    );

    info!(steps = times.len() - 1, forcing = %forcing_path.display(), "starting point run");

    let summary = match output {
        Some(path) => {
            let file = fs::File::create(path)?;
            let mut sink = PointWriter::new(io::BufWriter::new(file));
            driver.run(&mut source, &mut sink, &times)?
        }
        None => {
            let stdout = io::stdout();
            let mut sink = PointWriter::new(stdout.lock());
            driver.run(&mut source, &mut sink, &times)?
        }
    };

    let mut out = io::stderr();
    writeln!(
        out,
        "✓ Run complete: {} steps, {} records",
        summary.steps_run, summary.records_emitted
    )?;
    if summary.floor_units > 0 {
        writeln!(out, "  ran at floor resolution: {} unit(s)", summary.floor_units)?;
    }
    Ok(())
}

fn model_params(config: &RunConfig) -> ModelParams {
    ModelParams {
        max_h2o_vol: config.max_h2o_vol,
        max_z_s_0: config.max_z_s_0,
        relative_heights: config.relative_heights,
        z_u: config.z_u,
        z_t: config.z_t,
        z_g: config.z_g,
    }
}

const FORCING_COLUMNS: [&str; 10] = [
    "S_n",
    "I_lw",
    "T_a",
    "e_a",
    "u",
    "T_g",
    "m_pp",
    "percent_snow",
    "rho_snow",
    "T_pp",
];

/// Read a forcing CSV: a header naming the ten expected columns, then one
/// row per data timestep. Temperatures are Celsius in the file and Kelvin
/// in memory.
fn read_forcing(path: &Path) -> CliResult<Vec<ForcingRecord>> {
    let content = fs::read_to_string(path)?;
    parse_forcing(&content)
}

fn parse_forcing(content: &str) -> CliResult<Vec<ForcingRecord>> {
    let mut lines = content.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((n, line)) => break (n, line),
            None => {
                return Err(CliError::ForcingParse {
                    line: 0,
                    message: "empty forcing file".to_string(),
                });
            }
        }
    };
    let names: Vec<&str> = header.1.split(',').map(str::trim).collect();
    if names != FORCING_COLUMNS {
        return Err(CliError::ForcingParse {
            line: header.0 + 1,
            message: format!("expected columns {}", FORCING_COLUMNS.join(",")),
        });
    }

    let mut records = Vec::new();
    for (n, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_row(line, n + 1)?;
        records.push(ForcingRecord {
            s_n: fields[0],
            i_lw: fields[1],
            t_a: c_to_k(fields[2]),
            e_a: fields[3],
            u: fields[4],
            t_g: c_to_k(fields[5]),
            m_pp: fields[6],
            percent_snow: fields[7],
            rho_snow: fields[8],
            t_pp: c_to_k(fields[9]),
        });
    }
    Ok(records)
}

fn parse_row(line: &str, line_no: usize) -> CliResult<[f64; 10]> {
    let raw: Vec<&str> = line.split(',').map(str::trim).collect();
    if raw.len() != 10 {
        return Err(CliError::ForcingParse {
            line: line_no,
            message: format!("expected 10 columns, found {}", raw.len()),
        });
    }
    let mut fields = [0.0; 10];
    for (i, value) in raw.iter().enumerate() {
        fields[i] = value.parse().map_err(|_| CliError::ForcingParse {
            line: line_no,
            message: format!("bad value '{}' in column {}", value, FORCING_COLUMNS[i]),
        })?;
    }
    Ok(fields)
}
