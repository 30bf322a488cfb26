//! launch_composer CLI

use clap::{Args, Parser, Subcommand};
use launch_composer::{
    find_launch_file, frontend::load_description, AmentIndex, Composer, Composition,
    StartFailurePolicy, StartMode, Supervisor, SupervisorConfig,
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "launch_composer")]
#[command(about = "Compose and run declarative launch descriptions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a launch file from an installed package
    Launch {
        /// Package name
        package: String,

        /// Launch file name
        file: String,

        /// Launch arguments (key:=value)
        #[arg(value_parser = parse_launch_arg)]
        args: Vec<(String, String)>,

        #[command(flatten)]
        run: RunOptions,
    },

    /// Run a launch file from a direct file path
    File {
        /// Launch file path
        path: PathBuf,

        /// Launch arguments (key:=value)
        #[arg(value_parser = parse_launch_arg)]
        args: Vec<(String, String)>,

        #[command(flatten)]
        run: RunOptions,
    },

    /// List the arguments a launch file declares
    ShowArgs {
        /// Launch file path
        path: PathBuf,
    },
}

#[derive(Args)]
struct RunOptions {
    /// Compose only and print the composition record instead of starting processes
    #[arg(long)]
    dry_run: bool,

    /// Write the composition record to this file (implies --dry-run)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for processes with output="log"
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Start all processes at once instead of in order
    #[arg(long)]
    concurrent: bool,

    /// Keep running when a process fails to start
    #[arg(long)]
    continue_on_failure: bool,

    /// Seconds to wait after SIGTERM before SIGKILL
    #[arg(long, default_value_t = 5.0)]
    shutdown_timeout: f64,
}

fn parse_launch_arg(s: &str) -> Result<(String, String), String> {
    match s.split_once(":=") {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("Invalid launch argument format: {} (expected name:=value)", s)),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let locator = Arc::new(AmentIndex::from_env());
    let composer = Composer::new(locator.clone());

    let result = match cli.command {
        Commands::Launch {
            package,
            file,
            args,
            run,
        } => match find_launch_file(locator.as_ref(), &package, &file) {
            Ok(path) => {
                log::info!("Launching {} from package {}", file, package);
                run_launch_file(&composer, &path, args, &run).await
            }
            Err(e) => Err(e.into()),
        },
        Commands::File { path, args, run } => {
            log::info!("Launching {}", path.display());
            run_launch_file(&composer, &path, args, &run).await
        }
        Commands::ShowArgs { path } => show_args(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run_launch_file(
    composer: &Composer,
    path: &Path,
    args: Vec<(String, String)>,
    run: &RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let cli_args: HashMap<String, String> = args.into_iter().collect();
    let composition = composer.compose_file(path, cli_args)?;
    log::info!(
        "Composed {} process(es) from {} argument(s)",
        composition.directives().len(),
        composition.arguments().len()
    );

    if run.dry_run || run.output.is_some() {
        return write_record(&composition, run.output.as_deref());
    }

    let mut config = SupervisorConfig {
        shutdown_timeout: Duration::from_secs_f64(run.shutdown_timeout.max(0.0)),
        start_mode: if run.concurrent {
            StartMode::Concurrent
        } else {
            StartMode::Sequential
        },
        on_start_failure: if run.continue_on_failure {
            StartFailurePolicy::Continue
        } else {
            StartFailurePolicy::ShutdownAll
        },
        ..Default::default()
    };
    if let Some(log_dir) = &run.log_dir {
        config.log_dir = log_dir.clone();
    }

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, initiating shutdown...");
        let _ = shutdown_tx.send(());
    })?;

    let mut supervisor = Supervisor::new(config);
    let report = supervisor.launch(composition.directives()).await?;
    for failure in &report.failures {
        log::warn!("{}", failure);
    }

    // Wait for shutdown signal or all processes to exit
    supervisor.wait(shutdown_rx).await;
    supervisor.shutdown().await;

    log::info!("launch_composer exiting");
    Ok(())
}

fn write_record(
    composition: &Composition,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = composition.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            log::info!("Generated composition record: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn show_args(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let description = load_description(path)?;
    let arguments = description.declared_arguments();

    if arguments.is_empty() {
        println!("No arguments.");
        return Ok(());
    }

    println!("Arguments (pass arguments as '<name>:=<value>'):");
    for arg in arguments {
        println!();
        println!("    '{}':", arg.name);
        println!(
            "        {}",
            arg.description.as_deref().unwrap_or("no description given")
        );
        if let Some(choices) = &arg.choices {
            println!("        Valid choices are: {}", choices.join(", "));
        }
        match &arg.default {
            Some(default) => println!("        (default: '{}')", default),
            None => println!("        (required)"),
        }
    }
    Ok(())
}
