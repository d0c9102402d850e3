use std::env;
use std::io::{Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use anyhow::{Context, Result};
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use tracing_subscriber::EnvFilter;
use ferry::{ClientConfig, FileMeta, ProgressUpdate, UploadClient, UploadIntent};

const USAGE: &str = "usage: ferry <file> <title> [config.toml]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let file_path = PathBuf::from(args.next().context(USAGE)?);
    let title = args.next().context(USAGE)?;
    let mut config = match args.next() {
        Some(path) => ClientConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ClientConfig::default(),
    };
    if config.resume_path.is_none() {
        config.resume_path = Some(PathBuf::from(".ferry-resume.json"));
    }

    let metadata = std::fs::metadata(&file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;
    let last_modified_ms = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or_default();

    let intent = UploadIntent {
        title,
        description: None,
        space: None,
        duration_seconds: None,
        tags: Vec::new(),
        file: FileMeta {
            name: file_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("upload.bin")
                .to_string(),
            content_type: "video/webm".to_string(),
            size_bytes: metadata.len(),
            last_modified_ms,
        },
    };

    let client = UploadClient::new(config)?;
    let on_progress = Arc::new(|update: ProgressUpdate| {
        let mut out = stdout();
        let _ = execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
        let percent = update
            .percent
            .map(|p| format!("{p:>3}%"))
            .unwrap_or_else(|| "  --".to_string());
        let _ = write!(
            out,
            "{} {} / {} bytes",
            percent, update.bytes_done, update.bytes_total
        );
        let _ = out.flush();
    });

    let outcome = client.upload(&intent, &file_path, on_progress).await;
    println!();

    if outcome.ok {
        println!("Upload finished with status {}", outcome.status);
    } else {
        println!(
            "Upload failed: status={}, {}",
            outcome.status,
            outcome.text.unwrap_or_default()
        );
        std::process::exit(1);
    }

    Ok(())
}
