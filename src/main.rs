mod config;
mod download;
mod flickr;
mod index;
mod metadata;
mod model;
mod naming;
mod oauth;
mod report;
mod retry;
mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use env_logger::Env;
use git_version::git_version;

use crate::config::Config;
use crate::flickr::{Collection, FlickrClient, MediaApi};
use crate::sync::Syncer;

pub const GIT_VERSION: &str = git_version!(fallback = "unknown");

/// Flickr Mirror
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON config file holding API keys and OAuth tokens
    #[clap(short, long, default_value = "flickr-mirror.json")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One-time OAuth authorization; saves the token into the config file
    Authorize,
    /// Mirror the authorizing user's favorites
    Favorites {
        #[clap(short, long, default_value = ".")]
        output_directory: PathBuf,
    },
    /// Mirror photos of the authorizing user posted by others
    Photosof {
        #[clap(short, long, default_value = ".")]
        output_directory: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("Flickr Mirror {GIT_VERSION}");

    let config = Config::load(&args.config)?;

    match args.command {
        Command::Authorize => authorize(config, &args.config).await,
        Command::Favorites { output_directory } => {
            mirror(config, Collection::Favorites, output_directory).await
        }
        Command::Photosof { output_directory } => {
            mirror(config, Collection::PhotosOf, output_directory).await
        }
    }
}

async fn authorize(mut config: Config, config_path: &std::path::Path) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let access = oauth::authorize(&client, &config.api_key, &config.api_secret).await?;

    config.oauth_token = Some(access.token);
    config.oauth_token_secret = Some(access.secret);
    config.user_nsid = Some(access.user_nsid);
    config.username = Some(access.username.clone());
    config.save(config_path)?;

    // Prove the new token actually works before declaring victory.
    let flickr = FlickrClient::new(config)?;
    let nsid = flickr.verify_credentials().await?;
    println!(
        "Authorized as {name} ({nsid}). Token saved to {path}.",
        name = access.username,
        path = config_path.display()
    );
    Ok(())
}

async fn mirror(
    config: Config,
    collection: Collection,
    output_directory: PathBuf,
) -> anyhow::Result<()> {
    let client = FlickrClient::new(config)?;
    let syncer = Syncer::new(client, &output_directory, collection);

    println!(
        "Mirroring {what} to {dir}. This may take several minutes...",
        what = collection.dir_name(),
        dir = output_directory.join(collection.dir_name()).display()
    );
    let summary = syncer.run().await?;

    println!(
        "Finished. {downloaded} new, {skipped} already present, {failed} failed.",
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed
    );
    if summary.failed > 0 {
        log::warn!(
            "{failed} item(s) failed; re-running will retry just those",
            failed = summary.failed
        );
    }
    Ok(())
}
