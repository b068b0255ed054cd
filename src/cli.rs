use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tubely")]
#[command(author, version, about = "Video upload service with MP4 fast-start rewriting")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Rewrite an MP4 file so that it can start playing before it is fully downloaded
    Faststart {
        /// MP4 file to rewrite
        #[arg(required = true)]
        input: PathBuf,

        /// Output path (default: <input>.faststart.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the box layout and video geometry of an MP4 file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Issue an access token for a user
    IssueToken {
        /// User id (UUID)
        user_id: String,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
