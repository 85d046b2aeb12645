//! 🚀 stow-cli: the front door, the bouncer, the maitre d' of stowaway.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary is a thin wrapper: parse args, set up logging, load config,
//! then let the library do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🧳 Back up local directories to an object-storage bucket.
#[derive(Debug, Parser)]
#[command(name = "stow", version, about)]
struct Args {
    /// TOML file with the configuration
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

/// 🚀 Steps:
/// 1. Init tracing (`RUST_LOG=stow=debug` if you want to watch the sausage get made)
/// 2. Parse args (clap prints usage and exits non-zero when `--config` is missing)
/// 3. Load and validate config
/// 4. Run the backup
/// 5. Exit 0 if a summary got printed, 1 if setup fell over
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let result = async {
        let app_config = stow::app_config::load_config(&args.config)
            .context("💀 Couldn't load the config file. Check the path, then check the contents.")?;
        stow::run(app_config).await
    }
    .await;

    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("dispatch failure")
                || cause_str.contains("error sending request")
                || cause_str.contains("onnection refused")
                || cause_str.contains("dns error")
                || cause_str.contains("timed out")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }
        // -- stderr too, so the failure shows up even without RUST_LOG
        eprintln!("[ERROR] {:#}", err);

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: the bucket endpoint isn't reachable. Check `endpoint_url`, \
                 `region`, and that the network can see the storage service."
            );
        }

        std::process::exit(1);
    }

    // ✅ a summary got printed. individual file failures are in it, not in the exit code.
    Ok(())
}
