use clap::Parser;
use std::path::PathBuf;

use m3u8dl::config::Config;

#[derive(Parser)]
#[command(name = "m3u8dl")]
#[command(author, version, about = "Download a m3u8 url, or all urls in a list file")]
pub struct Cli {
    /// Playlist URL, or a file with one URL per line
    #[arg(value_name = "URL|LIST_FILE")]
    pub target: String,

    /// Disable the http proxy
    #[arg(short = 'P', long)]
    pub no_proxy: bool,

    /// Proxy to use as host:port
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Output file type, default is "ts"
    #[arg(short = 't', long = "type", value_name = "EXT")]
    pub extension: Option<String>,

    /// Directory to write output files to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if self.no_proxy {
            config.proxy = None;
        } else if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        if let Some(ext) = &self.extension {
            config.extension = ext.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(path) = &self.ffmpeg {
            config.ffmpeg_path = Some(path.clone());
        }
    }
}
