use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use slugstash::archive::{self, ArchiveEntry};
use slugstash::client;
use slugstash::config::{AppConfig, CONFIG_FILE};
use slugstash::store::Namespace;
use slugstash::sweep::Sweeper;

#[derive(Parser)]
#[command(name = "slugstash")]
#[command(about = "Slug-addressed JSON, folder and auth-archive store", long_about = None)]
struct Cli {
    /// Data directory (overrides config file and SLUGSTASH_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a JSON document ("-" reads stdin)
    PutJson {
        /// Custom slug (generated when omitted)
        #[arg(short, long)]
        slug: Option<String>,

        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Store a folder, or a single zip, as a file tree
    PutFolder {
        #[arg(short, long)]
        slug: Option<String>,

        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Store an auth folder (zipped before upload), or a zip of one, with a time-to-live
    PutAuth {
        #[arg(short, long)]
        slug: Option<String>,

        /// Time-to-live in seconds (defaults to the configured TTL)
        #[arg(short, long)]
        ttl: Option<u64>,

        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Print a record as JSON
    Get {
        #[arg(value_enum)]
        namespace: Namespace,
        slug: String,
    },

    /// Download a record as a zip archive
    Download {
        #[arg(value_enum)]
        namespace: Namespace,
        slug: String,

        /// Output file (defaults to <slug>.zip)
        #[arg(short, long, conflicts_with = "extract")]
        output: Option<PathBuf>,

        /// Extract into this directory, replacing its contents
        #[arg(short = 'x', long, value_name = "DIR")]
        extract: Option<PathBuf>,
    },

    /// Delete a record (and its archive)
    Delete {
        #[arg(value_enum)]
        namespace: Namespace,
        slug: String,
    },

    /// Remove expired auth archives
    Sweep {
        /// Keep running, sweeping on the configured interval until Ctrl-C
        #[arg(short, long)]
        watch: bool,

        /// Interval in seconds for --watch
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Generate configuration file (.slugstash.toml) in current directory
    Genconfig {
        /// Force overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger, default info level, display file line number and time
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            let level_style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "[{} {level_style}{}{level_style:#} {}:{}] {level_style}{}{level_style:#}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();

    let cli = Cli::parse();

    if let Commands::Genconfig { force } = cli.command {
        if let Err(e) = AppConfig::generate_config_file(Path::new(CONFIG_FILE), force) {
            error!("Error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut app_config = match AppConfig::load(Path::new(CONFIG_FILE)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration file: {}, using defaults", e);
            AppConfig::default().apply_env()
        }
    };
    if let Some(dir) = cli.data_dir {
        app_config.data_dir = Some(dir);
    }

    let store = client::init(&app_config);

    match cli.command {
        Commands::PutJson { slug, file } => {
            let text = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?
            };
            let payload: Value = serde_json::from_str(&text).context("Invalid JSON payload")?;
            let receipt = store.upload_json(slug.as_deref(), payload).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Commands::PutFolder { slug, path } => {
            let files = collect_upload(&path)?;
            let receipt = store.upload_folder(slug.as_deref(), files).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Commands::PutAuth { slug, ttl, path } => {
            let files = if path.is_dir() {
                info!("Compressing {}...", path.display());
                vec![ArchiveEntry::new("auth.zip", archive::pack_dir(&path)?)]
            } else {
                collect_upload(&path)?
            };
            let receipt = store.upload_auth(slug.as_deref(), files, ttl).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Commands::Get { namespace, slug } => {
            let record = store.get(namespace, &slug).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Download {
            namespace,
            slug,
            output,
            extract,
        } => {
            let mut stream = store.archive_stream(namespace, &slug).await?;
            if let Some(dir) = extract {
                let mut bytes = Vec::new();
                stream
                    .read_to_end(&mut bytes)
                    .await
                    .context("Failed to read archive")?;
                drop(stream);
                let target = dir.clone();
                tokio::task::spawn_blocking(move || archive::unpack_to_dir(&bytes, &target))
                    .await
                    .context("Extract task failed")??;
                info!("Extracted to {}", dir.display());
            } else {
                let output = output.unwrap_or_else(|| PathBuf::from(stream.file_name()));
                let mut file = tokio::fs::File::create(&output)
                    .await
                    .with_context(|| format!("Failed to create file: {}", output.display()))?;
                if let Err(e) = tokio::io::copy(&mut stream, &mut file).await {
                    drop(file);
                    let _ = tokio::fs::remove_file(&output).await;
                    return Err(e).context("Failed to write archive");
                }
                info!("Download success: {}", output.display());
            }
        }

        Commands::Delete { namespace, slug } => {
            store.delete(namespace, &slug).await?;
            info!("Deleted {}", namespace.key(&slug));
        }

        Commands::Sweep { watch, interval } => {
            let sweeper = Sweeper::new(store);
            if watch {
                let period = interval
                    .map(std::time::Duration::from_secs)
                    .unwrap_or_else(|| app_config.sweep_interval());
                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        on_signal.cancel();
                    }
                });
                info!("Sweeping every {}s, Ctrl-C to stop", period.as_secs());
                sweeper.run_periodic(period, cancel).await;
            } else {
                let report = sweeper.sweep().await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                info!("Cleanup done");
            }
        }

        Commands::Genconfig { .. } => unreachable!("handled before the store is opened"),
    }

    Ok(())
}

/// A directory is uploaded file by file; a single file (usually a zip)
/// is uploaded under its own name.
fn collect_upload(path: &Path) -> Result<Vec<ArchiveEntry>> {
    if path.is_dir() {
        let files = archive::read_dir_entries(path)?;
        info!("Collected {} file(s) from {}", files.len(), path.display());
        return Ok(files);
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.zip")
        .to_string();
    let mut bytes = Vec::new();
    std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(vec![ArchiveEntry::new(name, bytes)])
}
