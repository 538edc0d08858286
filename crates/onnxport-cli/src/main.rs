//! Command line front end for converting Hub models to ONNX.

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use onnxport_core::{
    Config, ConversionRequest, HubClient, Pipeline, RunOutcome, SystemCommandRunner,
};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

const TRUST_REMOTE_CODE_WARNING: &str = "This option should only be enabled for repositories \
     you trust and in which you have read the code, as it will execute arbitrary code present \
     in the model repository. When this option is enabled, you must use your own Hugging Face \
     write token.";

#[derive(Parser, Debug)]
#[command(name = "onnxport")]
#[command(about = "Convert a Hub model to ONNX and republish it", long_about = None)]
struct Args {
    /// Source model id, as namespace/name
    model_id: String,

    /// Hugging Face write token; the converted model is published under your account
    #[arg(short, long)]
    token: Option<String>,

    /// Allow the converter to execute code shipped with the model repository
    #[arg(long)]
    trust_remote_code: bool,

    /// Upload the ONNX weights to the source repository instead of a new one
    #[arg(long)]
    same_repo: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    if !run(args).await? {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> Result<bool> {
    if args.trust_remote_code {
        eprintln!("Warning: {}", TRUST_REMOTE_CODE_WARNING);
    }

    let config = Config::resolve(args.token)
        .await
        .context("Failed to resolve configuration")?;
    debug!("Publishing as {}", config.registry_username);

    let registry = HubClient::new(&config)?;
    let runner = SystemCommandRunner;
    let pipeline = Pipeline::new(&config, &registry, &runner);

    let request = ConversionRequest {
        source_model_id: args.model_id,
        trust_remote_code: args.trust_remote_code,
        reuse_same_repository: args.same_repo,
    };

    let plan = pipeline.plan(&request).await?;
    if plan.already_converted {
        println!("This model has already been converted!");
        println!("Go to {}", plan.destination_url);
        return Ok(true);
    }

    println!("URL where the model will be converted and uploaded to:");
    println!("{}", plan.destination_url);

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Proceed with conversion?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(true);
        }
    }

    println!("Converting model...");
    let report = pipeline.execute(&request, &plan).await?;

    match report.outcome {
        RunOutcome::AlreadyConverted => {
            println!("This model has already been converted!");
            println!("Go to {}", report.destination_url);
            Ok(true)
        }
        RunOutcome::ConversionFailed { log } => {
            eprintln!("Conversion failed: {}", log);
            Ok(false)
        }
        RunOutcome::PublishFailed { log, error } => {
            println!("Conversion successful!");
            print_converter_log(&log);
            eprintln!("Upload failed: {}", error);
            Ok(false)
        }
        RunOutcome::Published { log } => {
            println!("Conversion successful!");
            print_converter_log(&log);
            println!("Upload successful!");
            println!("You can now go and view the model on Hugging Face!");
            println!("Go to {}", report.destination_url);
            Ok(true)
        }
    }
}

/// Prints the converter's captured output, if it produced any.
fn print_converter_log(log: &str) {
    let trimmed = log.trim_end();
    if !trimmed.is_empty() {
        println!("{}", trimmed);
    }
}
