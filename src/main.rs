use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{debug, info, LevelFilter};

use heart_risk::artifacts::{self, ArtifactPaths};
use heart_risk::inspect::{self, InspectOptions};
use heart_risk::server;
use heart_risk::train::{self, TrainOptions};

static DEFAULT_DATASET: &str = "heart_disease_uci.csv";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct HeartRiskArgs {
    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Verbose level")]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the imputer, scaler and classifier and write the artifacts
    Train {
        #[arg(short, long, default_value = DEFAULT_DATASET, help = "Input CSV")]
        data: PathBuf,
        #[arg(short, long, default_value = ".", help = "Directory the artifacts are written to")]
        artifacts_dir: PathBuf,
    },
    /// Serve POST /predict from previously written artifacts
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
        #[arg(short, long, default_value = ".", help = "Directory the artifacts are read from")]
        artifacts_dir: PathBuf,
    },
    /// Report missing values per column after cleaning
    Inspect {
        #[arg(short, long, default_value = DEFAULT_DATASET, help = "Input CSV")]
        data: PathBuf,
        #[arg(short, long, help = "Write the cleaned frame to a .csv or .parquet file")]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = HeartRiskArgs::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("HEART_RISK_LOG");
    Builder::new()
        .filter(Some("heart_risk"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    heart_risk_app(cli.command).await
}

async fn heart_risk_app(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Train {
            data,
            artifacts_dir,
        } => {
            let options = TrainOptions {
                dataset: data,
                artifacts: ArtifactPaths::in_dir(artifacts_dir),
            };
            let report = tokio::task::spawn_blocking(move || train::run(&options)).await??;
            println!("Final model trained with accuracy: {:.4}", report.accuracy);
        }
        Command::Serve {
            host,
            port,
            artifacts_dir,
        } => {
            let predictor = artifacts::load(&ArtifactPaths::in_dir(artifacts_dir))?;
            server::serve(SocketAddr::new(host, port), Arc::new(predictor)).await?;
        }
        Command::Inspect { data, export } => {
            let options = InspectOptions {
                dataset: data,
                export,
            };
            let report = tokio::task::spawn_blocking(move || inspect::run(&options)).await??;
            print!("{report}");
            info!("{} column(s) checked", report.missing.len());
        }
    }
    Ok(())
}
