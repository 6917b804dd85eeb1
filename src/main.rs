mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use cli::Cli;
use tonalis::audio::analysis::analyze_clip;
use tonalis::audio::decode::decode_audio;
use tonalis::config::{self, EngineConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let engine_config = resolve_config(&cli)?;

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("tonalis - note and key analysis");
    log::info!("Input: {}", cli.input.display());

    log::info!("Decoding audio...");
    let audio = decode_audio(&cli.input)?;

    log::info!("Analyzing audio (hop={})...", cli.hop);
    let mut clip = analyze_clip(&audio.samples, audio.sample_rate, cli.hop, &engine_config)
        .with_context(|| format!("Analysis failed for {}", cli.input.display()))?;

    if cli.significant_only {
        let before = clip.frames.len();
        clip.frames.retain(|f| f.result.is_significant());
        log::info!("Kept {} of {} significant frames", clip.frames.len(), before);
    }

    match &cli.output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&clip)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            log::info!("Wrote {} frames to {}", clip.frames.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&clip.summary)?),
    }

    Ok(())
}

/// Explicit --config must load; auto-detected files are best effort.
fn resolve_config(cli: &Cli) -> Result<EngineConfig> {
    if let Some(path) = &cli.config {
        let cfg = config::load_config(path)?;
        log::info!("Loaded config from {}", path.display());
        return Ok(cfg);
    }

    let candidates = [
        Some(PathBuf::from("tonalis.toml")),
        dirs::config_dir().map(|dir| dir.join("tonalis").join("config.toml")),
    ];
    for path in candidates.into_iter().flatten() {
        if !path.exists() {
            continue;
        }
        match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                return Ok(cfg);
            }
            Err(e) => log::warn!("Ignoring config {}: {:#}", path.display(), e),
        }
    }
    Ok(EngineConfig::default())
}
