//! # FastCMD — Virtual Command Blocks
//!
//! Named actions that fire after a delay, repeat on a period and hand off to
//! a connected block, all driven by a fixed-length tick clock.
//!
//! Usage:
//!   fastcmd                          # Interactive console
//!   fastcmd --dry-run                # Log actions instead of running them
//!   fastcmd run sun moon             # Run blocks until they go idle
//!   fastcmd list                     # Show stored blocks
//!   fastcmd init                     # Write ~/.fastcmd/config.toml

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fastcmd_core::config::FastCmdConfig;
use fastcmd_core::traits::ActionExecutor;
use fastcmd_scheduler::{FastCmd, LogExecutor, ShellExecutor};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::console::Outcome;

#[derive(Parser)]
#[command(
    name = "fastcmd",
    version,
    about = "⚡ FastCMD — virtual command blocks on a tick clock"
)]
struct Cli {
    /// Config file (default: ~/.fastcmd/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory holding blocks.json (overrides config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Tick length in milliseconds (overrides config)
    #[arg(long)]
    tick_millis: Option<u64>,

    /// Log actions instead of running them through the shell
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console (default)
    Console,
    /// List stored blocks
    List,
    /// Run blocks and wait until nothing is scheduled
    Run {
        /// Block names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Write the default config file
    Init,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(cli: &Cli) -> Result<FastCmdConfig> {
    let mut config = match &cli.config {
        Some(path) => FastCmdConfig::load_from(&PathBuf::from(expand_path(path)))?,
        None => FastCmdConfig::load()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = expand_path(dir);
    } else if !config.data_dir.is_empty() {
        config.data_dir = expand_path(&config.data_dir);
    }
    if let Some(tick) = cli.tick_millis {
        anyhow::ensure!(tick > 0, "--tick-millis must be at least 1");
        config.tick_millis = tick;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize logging
    let filter = if cli.verbose || config.debug {
        "fastcmd=debug,fastcmd_scheduler=debug,fastcmd_core=debug"
    } else {
        "fastcmd=info,fastcmd_scheduler=info,fastcmd_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    if let Some(Commands::Init) = cli.command {
        let path = match &cli.config {
            Some(path) => PathBuf::from(expand_path(path)),
            None => FastCmdConfig::default_path(),
        };
        if path.exists() {
            println!("⚠️  Config already exists: {}", path.display());
        } else {
            FastCmdConfig::default().save_to(&path)?;
            println!("✅ Config written: {}", path.display());
        }
        return Ok(());
    }

    let executor: Arc<dyn ActionExecutor> = if cli.dry_run {
        Arc::new(LogExecutor)
    } else {
        Arc::new(ShellExecutor::new())
    };
    tracing::debug!("Executor: {}", executor.name());

    let ctx = FastCmd::open(config, executor)?;

    match cli.command {
        Some(Commands::List) => {
            if let Outcome::Reply(lines) = console::execute(&ctx, "list")? {
                for line in lines {
                    println!("{line}");
                }
            }
        }
        Some(Commands::Run { names }) => run_until_idle(&ctx, &names).await?,
        _ => interactive(&ctx).await?,
    }

    ctx.shutdown()?;
    Ok(())
}

/// Run the named blocks and return once nothing is scheduled or on Ctrl-C.
async fn run_until_idle(ctx: &FastCmd, names: &[String]) -> Result<()> {
    for name in names {
        ctx.run(name)?;
    }
    let mut ticker = tokio::time::interval(ctx.config().tick());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Interrupted");
                break;
            }
            _ = ticker.tick() => {
                if ctx.scheduler().active_count() == 0 {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn interactive(ctx: &FastCmd) -> Result<()> {
    println!("⚡ FastCMD v{}", env!("CARGO_PKG_VERSION"));
    println!("   📦 Blocks:  {}", ctx.registry().len());
    println!("   ⏱️  Tick:    {}ms", ctx.config().tick_millis);
    println!("   Type 'help' for commands, 'quit' to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match console::execute(ctx, &line) {
            Ok(Outcome::Reply(reply)) => {
                for line in reply {
                    println!("{line}");
                }
            }
            Ok(Outcome::Quit) => break,
            Err(e) => println!("❌ {e}"),
        }
    }
    println!("👋 Stopping {} running block(s)", ctx.scheduler().active_count());
    Ok(())
}
