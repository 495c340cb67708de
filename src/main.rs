// SPDX-License-Identifier: MPL-2.0

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vidpaper::{
    FileRecordStore, Pid, RecordStore, SessionStatus, StopOutcome, SystemProcesses, desktop,
    launcher, terminator,
};
use vidpaper_config::Config;

/// Play a looping video behind the desktop icons
#[derive(Parser)]
#[command(name = "vidpaper")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Renderer program, overriding the config
    #[arg(long, global = true)]
    renderer: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set a video as the desktop background
    Start {
        /// Video file to loop
        video: PathBuf,
    },

    /// Stop the running video wallpaper
    Stop,

    /// Show whether a video wallpaper is running
    Status,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load_or_default(cli.config.as_deref());
    if let Some(renderer) = cli.renderer {
        config.renderer = renderer;
    }

    let records = FileRecordStore::new(config.record_location());
    let processes = SystemProcesses;

    match cli.command {
        Commands::Start { video } => {
            // missing renderer or video are reported before any platform error
            let program = launcher::preflight(&config.renderer, &video)?;
            let windows = desktop::system()?;
            let pid =
                launcher::start_with(&config, program, &video, &windows, &processes, &records)
                    .wrap_err_with(|| format!("could not start {}", video.display()))?;
            println!("wallpaper running as process {pid}");
        }

        Commands::Stop => match terminator::stop(&config.renderer, &processes, &records)? {
            StopOutcome::Stopped(pid) => println!("stopped wallpaper process {pid}"),
            StopOutcome::AlreadyExited(pid) => {
                println!("wallpaper process {pid} had already exited")
            }
            StopOutcome::NothingToDo => println!("no wallpaper is running"),
        },

        Commands::Status => match terminator::status(&config.renderer, &processes, &records)? {
            SessionStatus::Inactive => println!("no wallpaper is running"),
            SessionStatus::Active(process) => {
                println!("wallpaper running as process {}", process.pid)
            }
            SessionStatus::Stale { pid, found } => {
                match &found {
                    Some(name) => warn!(pid, name = %name, "recorded process is not the renderer"),
                    None => warn!(pid, "recorded process is gone"),
                }
                println!("{}", stale_hint(pid, found.as_deref(), records.location()));
            }
        },
    }

    Ok(())
}

/// `stop` only cleans up after a renderer that is gone; a record naming some
/// other process has to be removed by hand.
fn stale_hint(pid: Pid, found: Option<&str>, record: &Path) -> String {
    match found {
        Some(name) => format!(
            "stale record for process {pid}, which is now `{name}`; remove {} manually",
            record.display()
        ),
        None => format!("stale record for process {pid}, run `vidpaper stop` to clean up"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_hint_only_suggests_stop_when_it_would_help() {
        let record = Path::new("/tmp/vidpaper.pid");

        let reused = stale_hint(7, Some("explorer"), record);
        assert!(reused.contains("/tmp/vidpaper.pid"), "{reused}");
        assert!(reused.contains("manually"), "{reused}");
        assert!(!reused.contains("vidpaper stop"), "{reused}");

        let gone = stale_hint(7, None, record);
        assert!(gone.contains("vidpaper stop"), "{gone}");
    }
}
