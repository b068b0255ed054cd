mod cli;

use tubely::{
    config,
    server::{self, auth, AppContext},
    storage,
};
use tubely_db::pool::init_pool;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn serve(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting tubely");

    let db_path = config.database.path.to_string_lossy().into_owned();
    tracing::info!("Initializing database at {}", db_path);
    let db = init_pool(&db_path).with_context(|| format!("Failed to open database {}", db_path))?;

    let storage = storage::create_operator(&config.storage)?;

    server::start_server(AppContext::new(config, db, storage)).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "tubely=trace,tubely_media=trace,tubely_db=debug,tubely_common=debug,tower_http=debug"
                .to_string()
        } else {
            "tubely=debug,tubely_media=debug,tubely_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(host, port, cli.config.as_deref()))
        }
        Commands::Faststart { input, output } => faststart(&input, output.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::IssueToken { user_id } => issue_token(&user_id, cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate(path.as_deref())
        }
        Commands::Version => {
            println!("tubely {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn faststart(input: &Path, output: Option<&Path>) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| tubely_media::mp4::default_output_path(input));

    let outcome = tubely_media::rewrite_to(input, &output)
        .with_context(|| format!("Failed to rewrite {:?}", input))?;

    if outcome.is_rewritten() {
        println!("Wrote fast-start copy to {}", outcome.path().display());
    } else {
        println!("{} is already fast start, nothing written", input.display());
    }
    Ok(())
}

fn probe_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let summary =
        tubely_media::probe(file).with_context(|| format!("Failed to probe {:?}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Size: {} bytes", summary.file_size);
    println!("Fast start: {}", if summary.fast_start { "yes" } else { "no" });

    println!("\nTop-level boxes: {}", summary.boxes.len());
    for b in &summary.boxes {
        println!("  {:<4} @ {:>12}  {} bytes", b.box_type, b.offset, b.size);
    }

    match (summary.geometry, summary.aspect_ratio) {
        (Some(g), Some(ratio)) => {
            let (w, h) = tubely_media::mp4::reduced_ratio(g.width_px(), g.height_px())?;
            println!("\nVideo: {}x{} ({}:{}, {})", g.width_px(), g.height_px(), w, h, ratio);
        }
        (Some(g), None) => println!("\nVideo: {}x{}", g.width_px(), g.height_px()),
        _ => println!("\nVideo: none"),
    }

    Ok(())
}

fn issue_token(user_id: &str, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let user_id = user_id
        .parse::<tubely_common::UserId>()
        .with_context(|| format!("Invalid user id: {}", user_id))?;

    let ttl_hours = i64::try_from(config.auth.token_ttl_hours).context("token_ttl_hours too large")?;
    let token = auth::make_jwt(user_id, &config.auth.jwt_secret, chrono::Duration::hours(ttl_hours))?;
    println!("{}", token);
    Ok(())
}

fn validate(path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(path)?;

    println!("Configuration is valid");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  Max upload: {} bytes", config.server.max_upload_bytes);
    println!("  Database: {}", config.database.path.display());
    match &config.storage {
        config::StorageConfig::Fs { root } => println!("  Storage: fs at {}", root),
        config::StorageConfig::S3 { bucket, .. } => println!("  Storage: s3 bucket {}", bucket),
    }
    Ok(())
}
