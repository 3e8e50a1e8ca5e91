use std::path::Path;

use anyhow::Context;
use elliptics_storage::{Content, SaveOptions, Storage, StorageConfig};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::Command;

/// Runs one command and returns the process exit code.
pub(crate) async fn run(config: StorageConfig, command: Command) -> anyhow::Result<i32> {
    let storage = Storage::new(config)?;

    match command {
        Command::Put { key, file, append } => {
            let content = match file {
                Some(path) => open(&path).await?,
                None => Content::from_reader(tokio::io::stdin()),
            };
            let report = storage
                .save_with_report(&key, content, SaveOptions { append })
                .await?;
            info!(
                key = %report.key,
                bytes = report.bytes,
                requests = report.requests,
                "upload complete"
            );
            println!("{}", report.key);
        }
        Command::Get { key, output } => {
            let body = storage.fetch(&key).await?;
            match output {
                Some(path) => tokio::fs::write(&path, &body)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&body).await?;
                    stdout.flush().await?;
                }
            }
        }
        Command::Exists { key } => {
            let exists = storage.exists(&key).await?;
            println!("{exists}");
            return Ok(if exists { 0 } else { 1 });
        }
        Command::Delete { key } => {
            storage.delete(&key).await?;
        }
        Command::Url { key } => {
            println!("{}", storage.url(&key));
        }
    }

    Ok(0)
}

async fn open(path: &Path) -> anyhow::Result<Content> {
    Content::from_file(path)
        .await
        .with_context(|| format!("opening {}", path.display()))
}
