//! Manual check of a running relay's streaming speech endpoint.
//!
//! Posts a sentence to `/tts_stream` and writes the streamed MP3 to disk as
//! it arrives, so it can be played back to judge latency and quality.

use anyhow::{Context, bail};
use clap::Parser;
use futures_util::StreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Save the streamed speech of a KB relay to an MP3 file")]
struct Args {
    /// Base URL of the relay.
    #[arg(long, default_value = "http://127.0.0.1:8002")]
    url: String,

    /// Sentence to synthesize.
    #[arg(long, default_value = "Pronto, questo è solo un test.")]
    text: String,

    /// Output file.
    #[arg(long, short, default_value = "out.mp3")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    let args = Args::parse();

    let endpoint = format!("{}/tts_stream", args.url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&endpoint)
        .json(&serde_json::json!({ "text": args.text }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {endpoint}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Relay answered {status}: {body}");
    }

    let mut file = tokio::fs::File::create(&args.out)
        .await
        .with_context(|| format!("Failed to create {}", args.out.display()))?;
    let mut chunks = response.bytes_stream();
    let mut written = 0usize;
    let mut count = 0usize;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("Audio stream interrupted")?;
        file.write_all(&chunk).await?;
        written += chunk.len();
        count += 1;
    }
    file.flush().await?;

    info!(chunks = count, bytes = written, out = %args.out.display(), "Saved streamed speech; play it back to listen.");
    Ok(())
}
