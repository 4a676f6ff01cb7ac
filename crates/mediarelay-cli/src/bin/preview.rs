use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use mediarelay_cli::{default_output_path, format_bytes, init_tracing};
use mediarelay_processing::{FfmpegEngineLoader, PreviewConverter};

#[derive(Parser, Debug)]
#[command(name = "preview")]
#[command(about = "Convert a remote clip into a small web-playable MP4 preview")]
struct Args {
    /// URL of the source clip
    #[arg(long)]
    url: String,

    /// Where to write the preview (default: <name>.preview.mp4)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// ffmpeg binary to use
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.url));

    let converter = PreviewConverter::new(FfmpegEngineLoader::new(args.ffmpeg));
    let preview = converter
        .convert(&args.url)
        .await
        .ok_or_else(|| anyhow!("preview conversion failed for {}", args.url))?;

    tokio::fs::write(&output, &preview)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Wrote {} ({})", output.display(), format_bytes(preview.len()));
    Ok(())
}
