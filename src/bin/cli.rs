use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use vidgrab::web::{self, AppState};
use vidgrab::{Session, Settings};
use vidgrab_extractor::fetcher::deps::Libraries;

#[derive(Parser, Clone)]
#[command(version, about = "Download one video at the best available quality")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(
        long = "verbosity",
        short,
        global = true,
        default_value = "info",
        value_parser = clap::builder::PossibleValuesParser::new([
            "info", "debug", "error", "none", "full"
        ])
    )]
    pub verbosity: String,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Serve the web UI. The default when no command is given.
    Serve {
        /// Address to listen on; overrides the config file.
        #[arg(long = "bind", short)]
        bind: Option<String>,
    },
    /// Look up and download one video from the terminal.
    Get {
        url: String,

        #[arg(long = "output-dir", short, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Install yt-dlp and ffmpeg into the managed libraries directory.
    Install,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Cli::parse();
    let multi = vidgrab::init_logger(&args.verbosity)?;
    let settings = Settings::load();

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            let muxer = vidgrab::locate_muxer(&settings);
            let service = Arc::new(vidgrab::extraction_service(&settings));
            web::serve(&bind, AppState::new(service, muxer)).await?;
        }
        Command::Get { url, output_dir } => get(&settings, &multi, &url, output_dir).await?,
        Command::Install => {
            let libs_dir = settings.managed_libs_dir();
            info!("Installing binaries into {}", libs_dir.display());
            let libraries = Libraries::in_dir(&libs_dir).install_dependencies().await?;
            let version = vidgrab_extractor::YtDlp::new(&libraries.youtube).version().await?;
            info!("yt-dlp {}: {}", version, libraries.youtube.display());
            info!("ffmpeg: {}", libraries.ffmpeg.display());
        }
    }
    Ok(())
}

async fn get(
    settings: &Settings,
    multi: &MultiProgress,
    url: &str,
    output_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let muxer = vidgrab::locate_muxer(settings);
    let service = vidgrab::extraction_service(settings);
    let mut session = Session::new();

    let lookup = match session.search(&service, url).await {
        Ok(lookup) => lookup,
        Err(e) => {
            error!("{}", e);
            return Err(vidgrab::ExtractionError::USER_MESSAGE.into());
        }
    };
    info!(
        "{} | {} | {} | {} views",
        lookup.title,
        lookup.uploader,
        lookup.duration_label(),
        lookup.views_label()
    );

    let bar = multi.add(ProgressBar::new(1000));
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {msg}")?.progress_chars("##-"),
    );

    let result = session.download(&service, muxer.as_deref(), bar.clone()).await;
    bar.finish();
    let artifact = result?;

    tokio::fs::create_dir_all(&output_dir).await?;
    let destination = output_dir.join(&artifact.file_name);
    tokio::fs::write(&destination, &artifact.bytes).await?;
    info!("Saved '{}' to {}", artifact.file_name, destination.display());
    Ok(())
}
