use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use loa_gateway::api::ApiServer;
use loa_gateway::assets::AssetStore;
use loa_gateway::config::file::load_config_file;
use loa_gateway::error::with_timeout;
use loa_gateway::intent::{classify, normalize_transcript};
use loa_gateway::voice::{SpeechSynthesizer, TextToSpeech, split_sentences, wav};
use loa_gateway::{Config, Gateway, Services};

/// Loa - Vietnamese voice assistant gateway for embedded speakers
#[derive(Parser)]
#[command(name = "loa", version, about)]
struct Cli {
    /// Port to listen on (overrides config and environment)
    #[arg(long)]
    port: Option<u16>,

    /// Config file (default: ~/.config/loa/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Accept device connections (default)
    Serve,
    /// Print the intent for a transcript, offline
    Classify {
        /// Transcript text
        text: String,
    },
    /// Synthesize text into a WAV file
    Speak {
        /// Text to speak
        text: String,
        /// Output file
        #[arg(short, long, default_value = "speech.wav")]
        out: PathBuf,
    },
    /// List music and check announcement recordings
    Assets,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,loa_gateway=info",
        1 => "info,loa_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = cli.config.as_deref();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(path, cli.port).await,
        Command::Classify { text } => {
            let intent = classify(&normalize_transcript(&text));
            println!("{}\t{intent}", intent.kind());
            Ok(())
        }
        Command::Speak { text, out } => speak(path, &text, &out).await,
        Command::Assets => list_assets(path),
    }
}

/// Configuration without the startup key checks, for offline commands
fn load_lenient(path: Option<&Path>) -> anyhow::Result<Config> {
    let fc = load_config_file(path)?;
    Ok(Config::resolve(fc, |name| std::env::var(name).ok())?)
}

async fn serve(path: Option<&Path>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load(path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        stt = %config.stt.url,
        tts = %config.tts.url,
        model = %config.llm.model,
        "starting loa gateway"
    );

    let config = Arc::new(config);
    let services = Services::from_config(&config);
    let gateway = Gateway::new(Arc::clone(&config), services);

    let missing = gateway.assets().missing();
    for path in &missing {
        tracing::warn!(path = %path.display(), "announcement recording missing");
    }

    ApiServer::new(Arc::new(gateway)).run().await?;
    Ok(())
}

async fn speak(path: Option<&Path>, text: &str, out: &Path) -> anyhow::Result<()> {
    let config = load_lenient(path)?;
    let tts = TextToSpeech::new(
        config.tts.url.clone(),
        config.tts.voice.clone(),
        config.tts.rate.clone(),
        config.tts.volume.clone(),
    );

    let units = split_sentences(text);
    if units.is_empty() {
        anyhow::bail!("nothing to speak");
    }

    let mut pcm = Vec::new();
    for unit in &units {
        let audio = with_timeout("tts", config.tts.timeout, tts.synthesize(&unit.text)).await?;
        tracing::debug!(index = unit.index, bytes = audio.len(), "sentence synthesized");
        pcm.extend_from_slice(wav::pcm_payload(&audio));
    }

    tokio::fs::write(out, wav::build_container(&pcm)).await?;
    println!(
        "{}: {} sentence(s), {} ms",
        out.display(),
        units.len(),
        wav::duration_ms(pcm.len())
    );
    Ok(())
}

fn list_assets(path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_lenient(path)?;
    let store = AssetStore::new(&config.assets);

    println!("Music ({}):", config.assets.music_dir.display());
    let tracks = store.music_tracks();
    if tracks.is_empty() {
        println!("  (none)");
    }
    for track in &tracks {
        match AssetStore::check_format(&config.assets.music_dir.join(track)) {
            Ok(()) => println!("  {track}"),
            Err(e) => println!("  {track}  [{e}]"),
        }
    }

    let missing = store.missing();
    if missing.is_empty() {
        println!("All announcement recordings present.");
        return Ok(());
    }

    println!("Missing recordings:");
    for path in &missing {
        println!("  {}", path.display());
    }
    anyhow::bail!("{} recording(s) missing", missing.len())
}
