use std::{error::Error, fs::File, io, path::PathBuf, process::ExitCode, time::Duration};

use clap::{Parser, Subcommand};

use clamber::{
    BatchResult, ClamdClient, ScanTarget, Scanner,
    client::{
        DEFAULT_COMMAND_TIMEOUT, DEFAULT_DIAL_TIMEOUT, DEFAULT_MAX_CONCURRENCY,
        DEFAULT_STREAM_TIMEOUT,
    },
};

/// Diagnostics and scans against a running clamd daemon.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon address as host:port
    #[arg(long, default_value = "127.0.0.1:3310")]
    address: String,

    /// Dial timeout in seconds
    #[arg(long, default_value_t = DEFAULT_DIAL_TIMEOUT.as_secs())]
    dial_timeout: u64,

    /// Line-command timeout in seconds
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs())]
    command_timeout: u64,

    /// Stream-upload timeout in seconds
    #[arg(long, default_value_t = DEFAULT_STREAM_TIMEOUT.as_secs())]
    stream_timeout: u64,

    /// Worker threads for batch scans
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Check that the daemon is alive
    Ping,
    /// Print the daemon's version banner
    Version,
    /// Ask the daemon to reload its signature database
    Reload,
    /// Ask the daemon to shut down
    Shutdown,
    /// Scan daemon-visible paths, concurrently when more than one
    Scan {
        /// Paths as seen from the daemon's filesystem
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Upload a file (or stdin) and scan the bytes in transit
    Instream {
        /// File to upload; reads stdin when omitted
        path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let client = ClamdClient::new(cli.address)
        .with_dial_timeout(Duration::from_secs(cli.dial_timeout))
        .with_command_timeout(Duration::from_secs(cli.command_timeout))
        .with_stream_timeout(Duration::from_secs(cli.stream_timeout))
        .with_max_concurrency(cli.max_concurrency);

    match cli.action {
        Action::Ping => {
            client.ping()?;
            println!("PONG");
            Ok(ExitCode::SUCCESS)
        }
        Action::Version => {
            println!("{}", client.version()?);
            Ok(ExitCode::SUCCESS)
        }
        Action::Reload => {
            client.reload()?;
            println!("reloading");
            Ok(ExitCode::SUCCESS)
        }
        Action::Shutdown => {
            client.shutdown()?;
            println!("shutdown requested");
            Ok(ExitCode::SUCCESS)
        }
        Action::Scan { paths } => {
            let targets = paths.into_iter().map(ScanTarget::path).collect();
            Ok(report(client.scan_all(targets)))
        }
        Action::Instream { path } => {
            let outcome = match &path {
                Some(path) => client.scan_stream(&mut File::open(path)?),
                None => client.scan_stream(&mut io::stdin().lock()),
            };
            let label = path
                .as_deref()
                .map_or_else(|| "stdin".to_string(), |p| p.display().to_string());
            Ok(report(BatchResult::from([(label, outcome)])))
        }
    }
}

/// Prints one line per target and picks the scanner exit code: 0 with
/// everything clean, 1 when anything was flagged, 2 when any scan failed.
fn report(results: BatchResult) -> ExitCode {
    let mut lines: Vec<_> = results.into_iter().collect();
    lines.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut infected = false;
    let mut failed = false;
    for (identifier, outcome) in lines {
        println!("{identifier}: {outcome}");
        infected |= outcome.is_infected();
        failed |= outcome.is_error();
    }

    if failed {
        ExitCode::from(2)
    } else if infected {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
