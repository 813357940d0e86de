//! Trigger efficiency measurement for the HLT tutorial
//!
//!
//! # Introduction (for the physicist)
//!
//! The efficiency of a trigger is measured with the tag-and-probe-like
//! "reference trigger" method: events are recorded by an orthogonal trigger
//! (here, single muon paths), and among those which pass an offline selection
//! we count how many are also accepted by the trigger of interest, as a
//! function of the variable that this trigger cuts on.
//!
//! Three triggers are covered:
//!
//! * PFHT, which cuts on the scalar sum of the jet transverse momenta
//! * AK8, which cuts on the momentum and soft-drop mass of large-radius jets
//! * MET, which cuts on the missing transverse momentum
//!
//!
//! # Introduction (for the computer guy)
//!
//! The program works in two fully decoupled stages:
//!
//! * `trigeff fill` reads event records, applies the event filters of the
//!   configured channel and fills integer-count histograms, which are saved
//!   to a file.
//! * `trigeff plot` reads that file back, divides numerators by denominators,
//!   attaches exact binomial intervals, and draws the result.
//!
//! Histograms only ever hold integer counts and per-file results are merged
//! in input order, so runs are reproducible bit for bit.

#![warn(missing_docs)]

mod analysis;
mod config;
mod efficiency;
mod evcut;
mod event;
mod histogram;
mod kinematics;
mod numeric;
mod output;
mod plot;
mod preselection;
mod reader;
mod scheduling;

use crate::{
    analysis::{ak8::Ak8Analysis, met::MetAnalysis, pfht::PfhtAnalysis, TriggerAnalysis},
    config::{Channel, Configuration},
    output::HistogramFile,
    plot::{ImageFormat, PlotOptions},
};
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use std::{path::PathBuf, time::Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// We'll use eyre's type-erased result type throughout the application
type Result<T> = eyre::Result<T>;

/// Where plots are saved
const PLOT_DIRECTORY: &str = "plots";

/// Command-line interface
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Print debugging information
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Filter events and fill trigger efficiency histograms
    Fill {
        /// Job configuration file
        #[arg(value_name = "CONFIG")]
        config: String,
    },

    /// Draw trigger efficiencies from a histogram file
    Plot {
        /// Histogram file written by the fill stage
        #[arg(long, value_name = "PATH", default_value = "histos_HadTrigNanoAOD.json")]
        rfile: PathBuf,

        /// Data-taking year shown on the plots
        #[arg(long, default_value = "2023")]
        year: String,

        /// Image formats, comma-separated
        #[arg(long, value_delimiter = ',', default_value = "png,svg")]
        formats: Vec<String>,
    },
}

/// Install the log subscriber. RUST_LOG takes precedence over the verbosity
/// flag.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run one channel's analysis and save its histograms
fn fill<A: TriggerAnalysis>(config: &Configuration) -> Result<()> {
    // Start the clock after configuration I/O
    let saved_time = Instant::now();

    // Run the analysis over every input
    let results = scheduling::run_analysis::<A>(config)?;
    let (histograms, cut_flow) = results.accumulator.finalize();

    // Save the histograms and report on the run
    let file = HistogramFile {
        channel: config.channel,
        directory: config.directory.clone(),
        histograms,
    };
    file.save(&config.output)
        .wrap_err("Failed to save the histograms")?;
    info!(
        "Saved {} histograms to {}:{}",
        file.histograms.len(),
        config.output.display(),
        file.directory
    );
    output::log_summary(&results.read_stats, &cut_flow, saved_time.elapsed());
    Ok(())
}

/// This will act as our main function, with suitable error handling
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Fill { config } => {
            let config =
                Configuration::load(&config).wrap_err("Failed to load the configuration")?;
            match config.channel {
                Channel::Pfht => fill::<PfhtAnalysis>(&config),
                Channel::Ak8 => fill::<Ak8Analysis>(&config),
                Channel::Met => fill::<MetAnalysis>(&config),
            }
        }

        Commands::Plot {
            rfile,
            year,
            formats,
        } => {
            let formats = formats
                .iter()
                .map(|format| format.parse::<ImageFormat>())
                .collect::<Result<Vec<_>>>()?;
            let file = HistogramFile::load(&rfile)?;
            let options = PlotOptions {
                year,
                formats,
                directory: PLOT_DIRECTORY.into(),
            };
            let saved = plot::plot_all(&file, &options).wrap_err("Failed to draw the plots")?;
            info!("Saved {} plots to {PLOT_DIRECTORY}/", saved.len());
            Ok(())
        }
    }
}
