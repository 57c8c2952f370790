//! Huddle chat backend.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ request id ─▶ trace ─▶ timeout ─▶ body limit
//!                                                          │
//!                                                          ▼
//!                                             ┌────────────────────────┐
//!                                             │      request gate      │
//!                                             │ rate limit (/api only) │
//!                                             │ session cookie presence│
//!                                             └───────────┬────────────┘
//!                                                         ▼
//!           ┌──────────┬──────────┬────────────┬───────────────┬───────────┐
//!           │   auth   │    me    │   media    │ conversations │   admin   │
//!           │ sessions │ profile  │ sniff/store│ msgs/reactions│   users   │
//!           └──────────┴──────────┴────────────┴───────────────┴───────────┘
//!
//!     Cross-cutting: config (+ hot reload), observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Huddle chat backend", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "HUDDLE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    huddle::lifecycle::start(cli.config.as_deref()).await?;
    Ok(())
}
