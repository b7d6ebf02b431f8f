use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::info;
use verdict::{
    initialize_in_background, AssetDir, ClassificationEngine, ClassificationResult, PredictionRequest,
    PredictionState, RuntimeConfig,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the model assets (defaults to $VERDICT_ASSETS or the platform data dir)
    #[arg(short, long)]
    assets: Option<PathBuf>,

    /// Asset name of the model manifest
    #[arg(short, long, default_value = verdict::manifest::DEFAULT_MANIFEST_NAME)]
    manifest: String,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    intra_threads: usize,

    /// ONNX Runtime inter-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    inter_threads: usize,

    /// Texts to classify; reads one text per line from stdin when omitted
    text: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting Text Classification Demo ===");

    let engine = Arc::new(
        ClassificationEngine::builder()
            .with_manifest(args.manifest.clone())
            .with_runtime_config(RuntimeConfig {
                inter_threads: args.inter_threads,
                intra_threads: args.intra_threads,
                ..RuntimeConfig::default()
            })
            .build()?,
    );

    let assets = args
        .assets
        .map(AssetDir::new)
        .unwrap_or_else(AssetDir::default_location);
    info!("Loading model assets from {}", assets.root().display());

    let start_time = Instant::now();
    initialize_in_background(Arc::clone(&engine), assets)
        .await
        .context("initialization task panicked")?
        .context("failed to initialize the classification engine")?;
    info!("=== Engine Ready (took {:.2?}) ===", start_time.elapsed());

    if let Some(info) = engine.info() {
        println!("Labels: {}", info.labels.join(", "));
    }

    let mut request = PredictionRequest::new();
    if !args.text.is_empty() {
        for text in &args.text {
            classify(&engine, &mut request, text).await;
        }
        return Ok(());
    }

    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        classify(&engine, &mut request, &line).await;
        prompt()?;
    }
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

async fn classify(engine: &Arc<ClassificationEngine>, request: &mut PredictionRequest, text: &str) {
    let started = Instant::now();
    request.submit(engine, text);
    match request.settle().await {
        PredictionState::Success(result) => {
            print_result(result);
            info!("Classified in {:.2?}", started.elapsed());
        }
        PredictionState::Error(failure) => {
            eprintln!("Error ({}): {}", failure.kind, failure.message);
        }
        PredictionState::Idle | PredictionState::Loading => {}
    }
}

fn print_result(result: &ClassificationResult) {
    println!("\nPrediction Result:");
    println!("  {} ({:.1}%)", result.label(), result.score() * 100.0);
    if result.truncated() {
        println!("  (input was truncated to the model's maximum length)");
    }

    let mut scores = result.scores().to_vec();
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    println!("  Scores (sorted):");
    for entry in scores {
        println!("    {}: {:.1}%", entry.label, entry.score * 100.0);
    }
}
