use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use astrocast::{
    AudioOutput, BlobCache, Database, DownloadPipeline, Episode, PlaybackController,
};

#[derive(Parser)]
#[command(name = "astrocast", version, about = "Offline playback and download engine for podcasts")]
struct Cli {
    /// Path to the download record database
    #[arg(long, default_value = "astrocast.db")]
    database: PathBuf,

    /// Override the audio blob cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download an episode into the offline cache
    Download {
        /// Stable episode identifier
        #[arg(long)]
        id: String,
        /// Remote audio URL
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "Untitled episode")]
        title: String,
        #[arg(long)]
        podcast: Option<String>,
    },
    /// Play an episode, preferring the local blob over the remote source
    Play {
        /// Stable episode identifier
        id: String,
        /// Remote audio URL, required when the episode is not downloaded
        #[arg(long)]
        url: Option<String>,
    },
    /// List download records
    Downloads,
    /// Mark a download deleted and purge its blob
    Delete { id: String },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let database = Database::open(&cli.database)
        .with_context(|| format!("opening database at {:?}", cli.database))?;
    let cache = match &cli.cache_dir {
        Some(dir) => BlobCache::at(dir.clone()),
        None => BlobCache::new(),
    };
    let pipeline = DownloadPipeline::new(database.clone(), cache.clone())
        .context("loading download records")?;

    match cli.command {
        Command::Download {
            id,
            url,
            title,
            podcast,
        } => {
            let episode = Episode {
                id,
                title,
                audio_url: url,
                image_url: None,
                podcast_id: None,
                podcast_name: podcast,
                duration: None,
            };

            pipeline.subscribe(Arc::new(|update| {
                println!("{}: {}%", update.episode_id, update.percent);
            }));

            let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
            let outcome = runtime
                .block_on(pipeline.start_download(&episode))
                .context("download failed")?;
            println!("{}: {:?}", episode.id, outcome);
        }
        Command::Play { id, url } => {
            if pipeline.local_episode_path(&id).is_none() && url.is_none() {
                bail!("episode {} is not downloaded; pass --url to stream it", id);
            }

            let episode = Episode {
                id: id.clone(),
                title: id.clone(),
                audio_url: url.unwrap_or_default(),
                image_url: None,
                podcast_id: None,
                podcast_name: None,
                duration: None,
            };

            let settings = database.get_settings().unwrap_or_default();
            let mut controller = PlaybackController::with_volume(settings.default_volume);
            let mut output = AudioOutput::new();

            controller.set_queue_and_play(vec![episode], 0);

            loop {
                output.sync(&mut controller, &cache);
                if !controller.is_playing() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(250));
            }
        }
        Command::Downloads => {
            for record in pipeline.records() {
                println!(
                    "{}  {:12}  {:3}%  {}",
                    record.episode_id,
                    record.status.as_str(),
                    record.progress_percentage,
                    record
                        .error_message
                        .as_deref()
                        .unwrap_or(""),
                );
            }
        }
        Command::Delete { id } => {
            pipeline.delete_download(&id).context("deleting download")?;
            println!("{}: deleted", id);
        }
    }

    Ok(())
}
