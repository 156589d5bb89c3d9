use anyhow::Result;
use clap::{Parser, Subcommand};
use likesync_core::{
    init_logging, AppDirs, Config, DuplicateReport, Library, SpotifyConfig, SyncError, SyncMode,
    SyncReport, SyncRun, SyncSettings,
};
use spotify_provider::{SpotifyLibrary, SpotifyOptions};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "likesync", version, about = "Mirror your liked songs into a playlist")]
struct Cli {
    /// Spotify access token (takes precedence over config)
    #[arg(long, global = true, env = "LIKESYNC_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
    /// Target playlist name (takes precedence over config)
    #[arg(long, global = true)]
    playlist: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Make the playlist match the liked songs
    Sync(SyncCommand),
    /// Unlike older copies of songs liked more than once
    Dedupe(DedupeCommand),
    /// Scheduled job: dedupe, then sync
    Run(RunCommand),
}

#[derive(Debug, Parser, Clone)]
struct SyncCommand {
    /// Stop at the first liked song already in the playlist
    #[arg(long)]
    fast: bool,
    /// Report the edit without applying it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Parser, Clone)]
struct DedupeCommand {
    /// Report duplicates without unliking them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Parser, Clone)]
struct RunCommand {
    #[arg(long)]
    fast: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JobPlan {
    playlist: String,
    dedupe: bool,
    sync: Option<SyncMode>,
    dry_run: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no access token: pass --access-token, set LIKESYNC_ACCESS_TOKEN or spotify.access_token")]
    MissingToken,
}

fn mode(fast: bool) -> SyncMode {
    if fast {
        SyncMode::Fast
    } else {
        SyncMode::Full
    }
}

impl Command {
    fn plan(&self, settings: &SyncSettings, cli_playlist: Option<&str>) -> JobPlan {
        let playlist = cli_playlist
            .unwrap_or(&settings.playlist_name)
            .to_string();
        match self {
            Command::Sync(cmd) => JobPlan {
                playlist,
                dedupe: false,
                sync: Some(mode(cmd.fast)),
                dry_run: cmd.dry_run,
            },
            Command::Dedupe(cmd) => JobPlan {
                playlist,
                dedupe: true,
                sync: None,
                dry_run: cmd.dry_run,
            },
            Command::Run(cmd) => JobPlan {
                playlist,
                dedupe: settings.remove_duplicates,
                sync: Some(mode(cmd.fast)),
                dry_run: false,
            },
        }
    }
}

fn resolve_token(cli_token: Option<&str>, config: &SpotifyConfig) -> Result<String, CliError> {
    cli_token
        .or(config.access_token.as_deref())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(CliError::MissingToken)
}

#[derive(Debug, Default)]
struct JobOutcome {
    duplicates: Option<DuplicateReport>,
    sync: Option<SyncReport>,
}

fn execute<L: Library + ?Sized>(
    run: &mut SyncRun<'_, L>,
    plan: &JobPlan,
) -> Result<JobOutcome, SyncError> {
    let mut outcome = JobOutcome::default();
    if plan.dedupe {
        outcome.duplicates = Some(run.remove_liked_duplicates(plan.dry_run)?);
    }
    if let Some(mode) = plan.sync {
        outcome.sync = Some(run.sync_liked_with_playlist(&plan.playlist, mode, plan.dry_run)?);
    }
    Ok(outcome)
}

fn print_outcome(outcome: &JobOutcome) {
    if let Some(dupes) = &outcome.duplicates {
        for group in &dupes.plan.groups {
            println!("{group}");
        }
        if dupes.dry_run {
            println!("Would unlike {} songs", dupes.plan.to_unlike().len());
        } else {
            println!("Unliked {} songs", dupes.unliked);
        }
    }
    if let Some(report) = &outcome.sync {
        println!("{report}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    let logging = init_logging(&config.logging, &dirs)?;
    tracing::debug!("Writing logs to {}", logging.log_dir().display());

    let plan = cli.command.plan(&config.sync, cli.playlist.as_deref());
    let token = resolve_token(cli.access_token.as_deref(), &config.spotify)?;
    let library = SpotifyLibrary::new(SpotifyOptions::from_config(&config.spotify, token))?;
    tracing::info!(
        "Running {:?} against {} (config dir: {})",
        plan,
        library.name(),
        dirs.config_dir().display()
    );

    let mut run = SyncRun::new(&library, config.sync.clone());
    match execute(&mut run, &plan) {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(err) => {
            if let (Some((applied, total)), Some(operation)) =
                (err.applied_chunks(), err.failed_operation())
            {
                eprintln!(
                    "Applied {applied} of {total} chunks before '{}' failed",
                    operation.as_str()
                );
            }
            Err(err.into())
        }
    }
}
