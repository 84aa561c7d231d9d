//! WasmPress CLI - Command line interface for storage and project operations.
//!
//! This tool drives the storage provider registry and the project store
//! from the command line: inspecting providers, moving objects in and out
//! of a backend, and saving or loading builder projects.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wasmpress_common::{ObjectKey, ProjectId};
use wasmpress_project::{Project, ProjectStore, SettingsStore};
use wasmpress_storage::{default_registry, Content, ContentFormat, StorageProvider};

#[derive(Parser)]
#[command(name = "wasmpress")]
#[command(about = "WasmPress - Storage and project management")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered storage providers and their capabilities.
    Providers,

    /// Connect a provider and report its state.
    Connect {
        /// Provider name (e.g. "local", "s3").
        #[arg(short, long)]
        provider: String,

        /// Provider configuration: inline JSON or @path/to/file.json.
        #[arg(short, long)]
        config: String,
    },

    /// Upload a file to a provider.
    Upload {
        /// Provider name.
        #[arg(short, long)]
        provider: String,

        /// Provider configuration: inline JSON or @path/to/file.json.
        #[arg(short, long)]
        config: String,

        /// Source file to upload.
        #[arg(short, long)]
        source: PathBuf,

        /// Destination object key.
        #[arg(short, long)]
        key: String,
    },

    /// Download an object from a provider.
    Download {
        /// Provider name.
        #[arg(short, long)]
        provider: String,

        /// Provider configuration: inline JSON or @path/to/file.json.
        #[arg(short, long)]
        config: String,

        /// Object key to download.
        #[arg(short, long)]
        key: String,

        /// Output format: "text", "bytes", or "json".
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete an object from a provider.
    Delete {
        /// Provider name.
        #[arg(short, long)]
        provider: String,

        /// Provider configuration: inline JSON or @path/to/file.json.
        #[arg(short, long)]
        config: String,

        /// Object key to delete.
        #[arg(short, long)]
        key: String,
    },

    /// List objects under a key prefix.
    Ls {
        /// Provider name.
        #[arg(short, long)]
        provider: String,

        /// Provider configuration: inline JSON or @path/to/file.json.
        #[arg(short, long)]
        config: String,

        /// Key prefix to list (default: everything).
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Show metadata for a single object.
    Stat {
        /// Provider name.
        #[arg(short, long)]
        provider: String,

        /// Provider configuration: inline JSON or @path/to/file.json.
        #[arg(short, long)]
        config: String,

        /// Object key to inspect.
        #[arg(short, long)]
        key: String,
    },

    /// Project document operations.
    Project {
        /// Provider name.
        #[arg(short, long)]
        provider: String,

        /// Provider configuration: inline JSON or @path/to/file.json.
        #[arg(short, long)]
        config: String,

        #[command(subcommand)]
        command: ProjectCommands,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Save a project document read from a JSON file.
    Save {
        /// Path to the project JSON document.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Load a project document and print it.
    Load {
        /// Project identifier.
        #[arg(short, long)]
        id: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List stored project identifiers.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Providers => cmd_providers(),

        Commands::Connect { provider, config } => cmd_connect(&provider, &config).await,

        Commands::Upload {
            provider,
            config,
            source,
            key,
        } => cmd_upload(&provider, &config, &source, &key).await,

        Commands::Download {
            provider,
            config,
            key,
            format,
            output,
        } => cmd_download(&provider, &config, &key, &format, output.as_deref()).await,

        Commands::Delete {
            provider,
            config,
            key,
        } => cmd_delete(&provider, &config, &key).await,

        Commands::Ls {
            provider,
            config,
            prefix,
        } => cmd_ls(&provider, &config, &prefix).await,

        Commands::Stat {
            provider,
            config,
            key,
        } => cmd_stat(&provider, &config, &key).await,

        Commands::Project {
            provider,
            config,
            command,
        } => cmd_project(&provider, &config, command).await,
    }
}

/// Parse a provider configuration argument: inline JSON or @file.
fn parse_config(arg: &str) -> Result<serde_json::Value> {
    let text = if let Some(path) = arg.strip_prefix('@') {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?
    } else {
        arg.to_string()
    };
    serde_json::from_str(&text).context("Config is not valid JSON")
}

/// Connect the named provider and hand back its instance.
async fn connect_provider(name: &str, config: &str) -> Result<Arc<dyn StorageProvider>> {
    let registry = default_registry();
    let config = parse_config(config)?;
    registry
        .connect(name, config)
        .await
        .with_context(|| format!("Failed to connect provider '{}'", name))?;
    registry.get(name).context("Provider disappeared after connect")
}

fn parse_key(key: &str) -> Result<ObjectKey> {
    ObjectKey::parse(key).with_context(|| format!("Invalid object key: {}", key))
}

/// List registered providers.
fn cmd_providers() -> Result<()> {
    let registry = default_registry();
    println!("{:<10} {:<8} CAPABILITIES", "NAME", "KIND");
    for desc in registry.descriptors() {
        let caps = &desc.capabilities;
        let mut flags = Vec::new();
        if caps.upload {
            flags.push("upload");
        }
        if caps.download {
            flags.push("download");
        }
        if caps.delete {
            flags.push("delete");
        }
        if caps.list {
            flags.push("list");
        }
        if caps.public_url {
            flags.push("public-url");
        }
        println!("{:<10} {:<8} {}", desc.name, desc.kind.to_string(), flags.join(","));
    }
    Ok(())
}

/// Connect a provider and report its state.
async fn cmd_connect(name: &str, config: &str) -> Result<()> {
    let provider = connect_provider(name, config).await?;
    println!("Connected to '{}'", provider.name());
    println!("  Kind: {}", provider.kind());
    println!("  State: {:?}", provider.state());
    Ok(())
}

/// Upload a local file.
async fn cmd_upload(name: &str, config: &str, source: &Path, key: &str) -> Result<()> {
    let provider = connect_provider(name, config).await?;
    let key = parse_key(key)?;
    let data = tokio::fs::read(source)
        .await
        .with_context(|| format!("Failed to read {}", source.display()))?;

    info!("Uploading {} bytes to {}", data.len(), key);
    let receipt = provider
        .upload(&key, data)
        .await
        .context("Upload failed")?;

    println!("Uploaded {}", receipt.key);
    println!("  Size: {} bytes", receipt.size);
    println!("  Hash: {}", receipt.hash);
    if let Some(url) = &receipt.url {
        println!("  URL: {}", url);
    }
    Ok(())
}

/// Download an object to stdout or a file.
async fn cmd_download(
    name: &str,
    config: &str,
    key: &str,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let format = match format {
        "text" => ContentFormat::Text,
        "bytes" => ContentFormat::Bytes,
        "json" => ContentFormat::Json,
        _ => {
            anyhow::bail!("Invalid format. Use: text, bytes, or json");
        }
    };

    let provider = connect_provider(name, config).await?;
    let key = parse_key(key)?;
    let content = provider
        .download_as(&key, format)
        .await
        .context("Download failed")?;

    let bytes = match content {
        Content::Text(text) => text.into_bytes(),
        Content::Bytes(data) => data,
        Content::Json(value) => serde_json::to_vec_pretty(&value)?,
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            if !bytes.ends_with(b"\n") {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

/// Delete an object.
async fn cmd_delete(name: &str, config: &str, key: &str) -> Result<()> {
    let provider = connect_provider(name, config).await?;
    let key = parse_key(key)?;
    let deleted = provider.delete(&key).await.context("Delete failed")?;
    if deleted {
        println!("Deleted {}", key);
    } else {
        println!("Nothing deleted for {}", key);
    }
    Ok(())
}

/// List objects under a prefix.
async fn cmd_ls(name: &str, config: &str, prefix: &str) -> Result<()> {
    let provider = connect_provider(name, config).await?;
    let objects = provider.list(prefix).await.context("List failed")?;

    if objects.is_empty() {
        println!("No objects under '{}'", prefix);
        return Ok(());
    }
    println!("{:<12} {:<24} KEY", "SIZE", "MODIFIED");
    for meta in objects {
        println!(
            "{:<12} {:<24} {}",
            meta.size,
            meta.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            meta.key
        );
    }
    Ok(())
}

/// Show metadata for an object.
async fn cmd_stat(name: &str, config: &str, key: &str) -> Result<()> {
    let provider = connect_provider(name, config).await?;
    let key = parse_key(key)?;
    let meta = provider.metadata(&key).await.context("Stat failed")?;

    println!("Key: {}", meta.key);
    println!("  Size: {} bytes", meta.size);
    if let Some(content_type) = &meta.content_type {
        println!("  Content-Type: {}", content_type);
    }
    println!("  Modified: {}", meta.modified);
    if let Some(etag) = &meta.etag {
        println!("  ETag: {}", etag);
    }
    for (k, v) in &meta.metadata {
        println!("  {}: {}", k, v);
    }
    Ok(())
}

/// Default location of the settings file.
fn settings_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wasmpress")
        .join("settings.json")
}

/// Project document operations.
async fn cmd_project(name: &str, config: &str, command: ProjectCommands) -> Result<()> {
    let provider = connect_provider(name, config).await?;
    let settings = Arc::new(
        SettingsStore::open(settings_path())
            .await
            .context("Failed to open settings store")?,
    );
    let store = ProjectStore::new(provider).with_settings(settings);

    match command {
        ProjectCommands::Save { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut project: Project =
                serde_json::from_str(&content).context("Invalid project document")?;
            store.save(&mut project).await.context("Save failed")?;
            println!("Saved project '{}'", project.id);
        }
        ProjectCommands::Load { id, output } => {
            let id = ProjectId::new(&id).context("Invalid project id")?;
            let project = store.load(&id).await.context("Load failed")?;
            let json = serde_json::to_string_pretty(&project)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json.as_bytes())
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote project '{}' to {}", id, path.display());
                }
                None => println!("{}", json),
            }
        }
        ProjectCommands::List => {
            let ids = store.list_projects().await.context("List failed")?;
            if ids.is_empty() {
                println!("No projects stored");
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
    }
    Ok(())
}
