//! noise-reducer: clean one WAV or MP3 file from the command line

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use noise_reducer::{
    CleanError, Cleaner, DenoiseMethod, OutputFormat, PipelineConfig, ProcessingResult, Result,
    ServiceConfig,
};

#[derive(Parser, Debug)]
#[command(name = "noise-reducer")]
#[command(about = "Remove background noise and even out levels in a voice recording")]
#[command(version)]
struct Args {
    /// Audio file to clean (.wav or .mp3)
    input: PathBuf,

    /// Directory the cleaned file is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Noise reduction strength, 0 to 1
    #[arg(long, default_value_t = 1.0)]
    strength: f32,

    /// Clarity boost in dB, 0 to 10
    #[arg(long, default_value_t = 0)]
    boost: u8,

    /// Remove rumble below 100 Hz
    #[arg(long)]
    high_pass: bool,

    /// Shorten long silences
    #[arg(long)]
    trim_silence: bool,

    /// Output format: wav or mp3
    #[arg(long, default_value = "wav")]
    format: OutputFormat,

    /// Noise reduction backend
    #[arg(long, value_enum, default_value_t = Method::Spectral)]
    method: Method,

    /// JSON file with service settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Upload size limit in MiB, overrides the settings file
    #[arg(long)]
    max_upload_mb: Option<u64>,

    /// Print result metadata as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Method {
    Spectral,
    Neural,
}

impl From<Method> for DenoiseMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Spectral => DenoiseMethod::Spectral,
            Method::Neural => DenoiseMethod::Neural,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut service = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(mb) = args.max_upload_mb {
        service.max_upload_bytes = mb.saturating_mul(1024 * 1024);
    }

    let options = PipelineConfig {
        noise_strength: args.strength,
        clarity_boost_db: args.boost,
        apply_high_pass: args.high_pass,
        apply_silence_trim: args.trim_silence,
        output_format: args.format,
        denoise_method: args.method.into(),
    };

    let cleaner = Cleaner::new(service);
    let upload = cleaner.load_upload(&args.input)?;

    // Decoding and DSP are CPU-bound
    let result = tokio::task::spawn_blocking(move || cleaner.process(&upload, &options))
        .await
        .map_err(|e| CleanError::Io(std::io::Error::other(format!("Cleaning task failed: {}", e))))??;

    let written = write_output(&args.output_dir, &result)?;

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| CleanError::Io(std::io::Error::other(e)))?;
        println!("{}", json);
    } else {
        println!(
            "{} ({}, {:.2}s, {} Hz, {} bytes)",
            written.display(),
            result.mime_type,
            result.duration_secs,
            result.sample_rate,
            result.bytes.len()
        );
    }
    Ok(())
}

fn write_output(dir: &Path, result: &ProcessingResult) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&result.filename);
    std::fs::write(&path, &result.bytes)?;
    log::info!("Wrote {:?}", path);
    Ok(path)
}
