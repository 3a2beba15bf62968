use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::{Read, Write};
use std::path::PathBuf;

use rawhttp_harness::logging::init_logging;
use rawhttp_harness::{
    ExecutableLocator, FixtureServer, HarnessSettings, ProbeClient, ProcessController, Suite,
};

#[derive(Parser)]
#[command(name = "rawhttp-harness")]
#[command(version)]
#[command(about = "Black-box test harness for raw HTTP command-line tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Enable verbose output", global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the fixture HTTP server until interrupted")]
    Serve {
        #[arg(short, long, help = "Port to listen on (0 picks a free one)")]
        port: Option<u16>,
    },

    #[command(about = "Send one raw HTTP request and print the raw response")]
    Probe {
        #[arg(short, long, conflicts_with = "file", help = "Request text")]
        text: Option<String>,

        #[arg(short, long, help = "File containing the request")]
        file: Option<PathBuf>,

        #[arg(long, help = "host:port to connect to instead of the Host header")]
        address: Option<String>,

        #[arg(
            short,
            long,
            value_parser = clap::value_parser!(u32).range(1..),
            help = "Connection attempts before giving up"
        )]
        attempts: Option<u32>,
    },

    #[command(about = "Show how the CLI under test will be launched")]
    Locate,

    #[command(about = "Run the scenario suite against the CLI under test")]
    Check {
        #[arg(short, long, help = "CLI executable or jar to test")]
        executable: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{} {e}", "⚠".yellow());
    }

    match run(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded
async fn run(command: Commands) -> Result<bool> {
    let settings = HarnessSettings::load()?;

    match command {
        Commands::Serve { port } => {
            serve(settings, port).await?;
            Ok(true)
        }
        Commands::Probe {
            text,
            file,
            address,
            attempts,
        } => {
            probe(settings, text, file, address, attempts).await?;
            Ok(true)
        }
        Commands::Locate => {
            let executable = ExecutableLocator::from_env()?.locate()?;
            println!("{executable}");
            Ok(true)
        }
        Commands::Check { executable } => check(settings, executable).await,
    }
}

async fn serve(settings: HarnessSettings, port: Option<u16>) -> Result<()> {
    let mut server = FixtureServer::new(&settings)?;
    if let Some(port) = port {
        server = server.port(port);
    }
    let handle = server.start().await?;

    println!(
        "{} Fixture server listening on {}",
        "→".green(),
        handle.local_addr().to_string().cyan()
    );
    println!("{}", "Press Ctrl-C to stop".dimmed());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    handle.stop().await?;
    Ok(())
}

async fn probe(
    settings: HarnessSettings,
    text: Option<String>,
    file: Option<PathBuf>,
    address: Option<String>,
    attempts: Option<u32>,
) -> Result<()> {
    let request = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?,
        (None, None) => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read request from stdin")?;
            text
        }
    };

    let mut client = ProbeClient::new(&settings);
    if let Some(attempts) = attempts {
        client = client.attempts(attempts);
    }

    let response = match address {
        Some(address) => client.send_to(&address, &request).await?,
        None => client.send(&request).await?,
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&response.to_bytes())?;
    stdout.flush()?;
    Ok(())
}

async fn check(settings: HarnessSettings, executable: Option<PathBuf>) -> Result<bool> {
    let mut locator = ExecutableLocator::from_env()?;
    if let Some(path) = executable {
        locator = locator.configured(path);
    }
    let executable = locator.locate()?;

    println!(
        "{} Testing {}",
        "→".green(),
        executable.to_string().cyan().bold()
    );

    let controller = ProcessController::new(executable, &settings);
    let report = Suite::new(controller, settings).run().await?;
    report.print();
    Ok(report.all_passed())
}
