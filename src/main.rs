use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::Parser;
use photobooth::{
    logger::{self, LogLevel, LoggerConfig},
    BoothConfig, DataUrl, GeminiImageClient, GenerationStatus, SessionController, SourceFile,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Upload photos, describe a scene, and get one AI-generated picture back.
#[derive(Debug, Parser)]
#[command(name = "photobooth", version, about)]
struct Cli {
    /// What the generated picture should show
    #[arg(short, long)]
    prompt: String,

    /// Photos to send (png, jpeg or webp)
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Write the generated image here instead of printing its data URL
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the Gemini model id
    #[arg(long)]
    model: Option<String>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let cli = Cli::parse();

    let mut log_config = LoggerConfig::from_env();
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    logger::init_with_config(log_config)?;
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::debug!("No .env file found, using system environment variables");
    }

    let mut config = BoothConfig::from_env();
    if let Some(model) = cli.model {
        config.gemini = config.gemini.with_model(model);
    }
    logger::log_config_info(&config);

    let client = match GeminiImageClient::new(config.gemini.clone()) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to initialize Gemini client: {}", e);
            return Err(e.into());
        }
    };

    let mut session = SessionController::from_config(&config, Arc::new(client));
    logger::set_session_id(session.session_id());

    let mut files = Vec::with_capacity(cli.images.len());
    for path in &cli.images {
        let file = match SourceFile::from_path(path).await {
            Ok(file) => file,
            Err(e) => {
                render_failure(&e.to_string());
                std::process::exit(1);
            }
        };
        if !file.is_accepted_type() {
            log::warn!(
                "{} is {}, the service may not accept it",
                file.name,
                file.content_type
            );
        }
        files.push(file);
    }

    session.set_prompt(cli.prompt);
    if session.add_files(files).await.is_err() || session.generate().await.is_err() {
        render(session.status(), None).await?;
        std::process::exit(1);
    }

    render(session.status(), cli.output.as_ref()).await
}

async fn render(
    status: &GenerationStatus,
    output: Option<&PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match status {
        GenerationStatus::Success(url) => match output {
            Some(path) => {
                let image = DataUrl::parse(url)?;
                let bytes = BASE64.decode(image.payload.as_bytes())?;
                tokio::fs::write(path, bytes).await?;
                log::info!("💾 Image ({}) saved to {}", image.mime_type, path.display());
            }
            None => println!("{}", url),
        },
        GenerationStatus::Error(message) => render_failure(message),
        GenerationStatus::Idle | GenerationStatus::Loading => {
            eprintln!("Your generated image will appear here.");
        }
    }
    Ok(())
}

fn render_failure(message: &str) {
    eprintln!("Oops! Something went wrong.");
    eprintln!("{}", message);
}
