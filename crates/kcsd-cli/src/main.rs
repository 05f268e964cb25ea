//! kCSD command-line interface.
//!
//! Run estimations from TOML job files:
//! ```sh
//! kcsd-cli run job.toml
//! kcsd-cli validate job.toml
//! kcsd-cli bases
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kcsd_core::BasisShape;

#[derive(Parser)]
#[command(name = "kcsd-cli")]
#[command(about = "kCSD: kernel current source density estimation in 3D")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an estimation from a TOML job file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a job file and resolve the model without assembling matrices.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the available basis-source shapes.
    Bases,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("kCSD 3D Estimator");
            println!("=================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_estimation(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_fields {
                runner::write_fields_csv(&result, &out_dir.join("fields.csv"))?;
            }
            if job.output.save_summary {
                runner::write_summary_json(&result.summary, &out_dir.join("summary.json"))?;
            }

            println!("Estimation complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let model = runner::build_model(&job)?;
            println!("{}", model);
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Bases => {
            println!("Available basis shapes:");
            println!();
            for shape in BasisShape::ALL {
                let description = match shape {
                    BasisShape::Step => "uniform ball of radius R",
                    BasisShape::Gaussian => "gaussian with standard deviation R/3",
                    BasisShape::GaussianLimited => "gaussian with standard deviation R/3, cut at R",
                };
                println!("  {:<18} {}", shape.name(), description);
            }
            Ok(())
        }
    }
}
