use clap::Parser;
use std::path::PathBuf;

use crate::config::SourceSettings;
use crate::entities::frame::FrameCodec;

// Video backend info (compile-time)
#[cfg(feature = "ffmpeg")]
const VIDEO_BACKEND: &str = "playa-ffmpeg 8.0 (static)";
#[cfg(not(feature = "ffmpeg"))]
const VIDEO_BACKEND: &str = "none (synthetic only)";

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  ", VIDEO_BACKEND, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Decode a video-backed image asset and write one frame as PNG
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Asset file name as exported (e.g. img_0.jpeg), resolved to its video
    #[arg(value_name = "NAME", required_unless_present = "catalog")]
    pub name: Option<String>,

    /// Asset subdirectory, tried after the base directory
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub directory: Option<String>,

    /// Lottie animation JSON to take the asset from (with --asset)
    #[arg(long = "catalog", value_name = "JSON", requires = "asset")]
    pub catalog: Option<PathBuf>,

    /// Asset id in the catalog
    #[arg(short = 'a', long = "asset", value_name = "ID")]
    pub asset: Option<String>,

    /// Directory asset names are resolved against
    #[arg(short = 'b', long = "base-dir", value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Time of the frame to write, seconds
    #[arg(short = 't', long = "at", value_name = "SECONDS", default_value = "0")]
    pub at: f64,

    /// Decode rate / cache quantization
    #[arg(long = "fps", value_name = "N")]
    pub fps: Option<u32>,

    /// Accepted distance between requested and decoded frame, seconds
    #[arg(long = "tolerance", value_name = "SECONDS")]
    pub tolerance: Option<f64>,

    /// Cache encoding: raw, png or jpeg
    #[arg(short = 'e', long = "encoding", value_name = "FORMAT")]
    pub encoding: Option<String>,

    /// JPEG quality for --encoding jpeg (1-100)
    #[arg(short = 'q', long = "quality", value_name = "Q", default_value = "100")]
    pub quality: u8,

    /// Decode threads (0 = auto)
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Output PNG path
    #[arg(short = 'o', long = "out", value_name = "PNG", default_value = "frame.png")]
    pub out: PathBuf,

    /// Generate frames procedurally for a video of this length instead of
    /// decoding (the video file must still exist)
    #[arg(long = "synthetic", value_name = "SECONDS")]
    pub synthetic: Option<f64>,

    /// Enable debug logging to file (default: flipbook.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Override loaded settings with the flags given on the command line.
    pub fn apply_to(&self, settings: &mut SourceSettings) -> anyhow::Result<()> {
        if let Some(dir) = &self.base_dir {
            settings.base_dir = dir.clone();
        }
        if let Some(fps) = self.fps {
            settings.fps = fps;
        }
        if let Some(tolerance) = self.tolerance {
            settings.tolerance_secs = tolerance;
        }
        if let Some(workers) = self.workers {
            settings.decode_workers = workers;
        }
        if let Some(encoding) = &self.encoding {
            settings.encoding = match encoding.to_ascii_lowercase().as_str() {
                "raw" => FrameCodec::Raw,
                "png" => FrameCodec::Png,
                "jpeg" | "jpg" => FrameCodec::Jpeg { quality: self.quality },
                other => anyhow::bail!("Unknown encoding: {} (expected raw, png or jpeg)", other),
            };
        }
        Ok(())
    }
}
