use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tickfx_cli::commands::{self, ConfigChange};
use tickfx_cli::readline;
use tickfx_cli::world::World;
use tickfx_core::config::{default_config_path, load_config};
use tickfx_core::effects::{DamageOverTimeSpec, ModMagicProtectionSpec};
use tokio::sync::RwLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Rotated log files kept on disk
const MAX_LOG_FILES: usize = 7;

/// Log to stderr, or to a daily rotated file under `TICKFX_LOG_DIR` when set.
/// The returned guard flushes the file writer on drop.
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if let Ok(dir) = std::env::var("TICKFX_LOG_DIR") {
        let path = PathBuf::from(dir).join("tickfx.log");
        match BasicRollingFileAppender::new(&path, RollingConditionBasic::new().daily(), MAX_LOG_FILES)
        {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer)
                    .init();
                return Some(guard);
            }
            Err(e) => eprintln!("Cannot open log file {}: {e}", path.display()),
        }
    }

    // Fallback to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    None
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let _guard = init_logging();

    let config = match default_config_path() {
        Some(path) => load_config(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load engine config, using defaults");
            Default::default()
        }),
        None => Default::default(),
    };
    let state = Arc::new(RwLock::new(World::new(config)));

    loop {
        let Some(line) = readline()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, Arc::clone(&state)).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "tickfx operator shell")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a new character
    Spawn {
        name: String,
        #[arg(long)]
        hp: Option<i32>,
    },
    /// Make a character unreachable (e.g. mid-migration)
    Hide { name: String },
    /// Make a character reachable again
    Show { name: String },
    /// Modify a magic protection for a while
    Protect {
        target: String,
        #[arg(short, long, default_value = "fire")]
        kind: String,
        #[arg(long, allow_hyphen_values = true)]
        m1: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        m2: i32,
        #[arg(short, long)]
        duration: u64,
        #[arg(long, default_value_t = 0)]
        lockout: u64,
        #[arg(long)]
        by: Option<String>,
    },
    /// Periodic hit point loss
    Dot {
        target: String,
        #[arg(long)]
        damage: i32,
        #[arg(short, long)]
        period: u64,
        #[arg(short, long)]
        duration: u64,
        #[arg(long)]
        by: Option<String>,
    },
    /// End an effect early
    Dispel { id: u64 },
    /// Advance the world clock
    Tick {
        #[arg(default_value_t = 1)]
        count: u64,
    },
    /// Show characters and their effects
    Status { name: Option<String> },
    /// Save a character's effects and unload it
    Logout { name: String },
    /// Reload a logged out character with its effects
    Login { name: String },
    /// Write every effect to a snapshot file
    Save {
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Restore effects from a snapshot file
    Load {
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Show or change engine settings
    Config {
        #[arg(long)]
        retry_delay: Option<u32>,
        #[arg(long)]
        retry_warn_after: Option<u32>,
        #[arg(long, conflicts_with = "unbounded")]
        max_retries: Option<u32>,
        #[arg(long)]
        unbounded: bool,
        #[arg(long)]
        apply_effects: Option<bool>,
        #[arg(long)]
        save: bool,
    },
    Exit,
}

async fn respond(line: &str, state: Arc<RwLock<World>>) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "tickfx".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match cli.command {
        Some(Commands::Spawn { name, hp }) => commands::spawn(&name, hp, state).await?,
        Some(Commands::Hide { name }) => commands::set_accessible(&name, false, state).await?,
        Some(Commands::Show { name }) => commands::set_accessible(&name, true, state).await?,
        Some(Commands::Protect {
            target,
            kind,
            m1,
            m2,
            duration,
            lockout,
            by,
        }) => {
            let spec = ModMagicProtectionSpec {
                protection: commands::parse_protection(&kind)?,
                modifier1: m1,
                modifier2: m2,
                disable_ticks: lockout,
            };
            commands::protect(&target, spec, duration, by.as_deref(), state).await?
        }
        Some(Commands::Dot {
            target,
            damage,
            period,
            duration,
            by,
        }) => {
            let spec = DamageOverTimeSpec {
                damage_per_tick: damage,
                period,
            };
            commands::damage_over_time(&target, spec, duration, by.as_deref(), state).await?
        }
        Some(Commands::Dispel { id }) => commands::dispel(id, state).await?,
        Some(Commands::Tick { count }) => commands::tick(count, state).await?,
        Some(Commands::Status { name }) => commands::status(name.as_deref(), state).await?,
        Some(Commands::Logout { name }) => commands::logout(&name, state).await?,
        Some(Commands::Login { name }) => commands::login(&name, state).await?,
        Some(Commands::Save { path }) => commands::save(path.as_deref(), state).await?,
        Some(Commands::Load { path }) => commands::load(path.as_deref(), state).await?,
        Some(Commands::Config {
            retry_delay,
            retry_warn_after,
            max_retries,
            unbounded,
            apply_effects,
            save,
        }) => {
            let change = ConfigChange {
                retry_delay,
                retry_warn_after,
                max_retries,
                unbounded,
                apply_effects,
                save,
            };
            commands::config(change, state).await?
        }
        Some(Commands::Exit) => {
            commands::exit();
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Commands {
        let mut args = shlex::split(line).unwrap();
        args.insert(0, "tickfx".to_string());
        Cli::try_parse_from(args).unwrap().command.unwrap()
    }

    #[test]
    fn test_protect_accepts_negative_modifiers() {
        let Commands::Protect { m1, m2, kind, .. } =
            parse("protect Tank --kind cold --m1 5 --m2 -2 -d 10")
        else {
            panic!("expected protect");
        };
        assert_eq!((m1, m2), (5, -2));
        assert_eq!(kind, "cold");
    }

    #[test]
    fn test_quoted_names() {
        let Commands::Spawn { name, hp } = parse("spawn \"Old Guard\" --hp 250") else {
            panic!("expected spawn");
        };
        assert_eq!(name, "Old Guard");
        assert_eq!(hp, Some(250));
    }

    #[test]
    fn test_tick_defaults_to_one() {
        assert!(matches!(parse("tick"), Commands::Tick { count: 1 }));
    }

    #[tokio::test]
    async fn test_logout_login_round_trip() {
        let state = Arc::new(RwLock::new(World::new(Default::default())));
        for line in [
            "spawn Tank --hp 50",
            "protect Tank --m1 5 --m2 -2 -d 10",
            "tick 3",
            "logout Tank",
        ] {
            respond(line, Arc::clone(&state)).await.unwrap();
        }
        {
            let world = state.read().await;
            assert_eq!(world.engine.active_count(), 0);
            assert_eq!(world.parked.len(), 1);
        }

        respond("login Tank", Arc::clone(&state)).await.unwrap();
        let world = state.read().await;
        assert!(world.parked.is_empty());
        assert_eq!(world.engine.active_count(), 1);
        let row = world.roster.find_by_name("Tank").unwrap();
        let key = world.engine.keys()[0];
        assert_eq!(key.target, row);
        // 7 ticks were left at logout
        assert_eq!(world.engine.next_firing(key), Some(3 + 7));
    }

    #[tokio::test]
    async fn test_lockout_is_kept_across_logout() {
        let state = Arc::new(RwLock::new(World::new(Default::default())));
        for line in [
            "spawn Tank",
            "protect Tank --m1 3 -d 5 --lockout 40",
            "tick 10",
            "logout Tank",
            "login Tank",
        ] {
            respond(line, Arc::clone(&state)).await.unwrap();
        }

        let err = respond("protect Tank --m1 3 -d 5", Arc::clone(&state))
            .await
            .unwrap_err();
        assert!(err.contains("locked"), "{err}");

        respond("tick 30", Arc::clone(&state)).await.unwrap();
        assert!(respond("protect Tank --m1 3 -d 5", state).await.is_ok());
    }
}
