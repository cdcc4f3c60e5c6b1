use flipbook::cli::Args;
use flipbook::config::SourceSettings;
use flipbook::entities::asset::{AssetCatalog, AssetDescriptor};
use flipbook::entities::frame::png_bytes;
use flipbook::entities::traits::{ImageLayer, MediaDecoder};
use flipbook::paths::{self, PathConfig};
use flipbook::{ImageSlot, LayerRegistry, MainQueue, SyntheticDecoder, VideoImageSource};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use std::sync::Arc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    init_logging(&args, &path_config)?;

    info!("flipbook {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let mut settings = SourceSettings::load_or_default(&path_config)?;
    args.apply_to(&mut settings)?;
    debug!("Effective settings: {:?}", settings);

    let asset = select_asset(&args)?;
    info!("Asset: {} ({})", asset.id, asset.name);

    let decoder = make_decoder(&args)?;
    let main_queue = MainQueue::new();
    let source = Arc::new(
        VideoImageSource::spawn(settings, decoder, Arc::new(main_queue.clone()))
            .context("Invalid source settings")?,
    );

    // One slot bound through the registry, the same path a renderer takes
    let catalog = AssetCatalog::new([asset.clone()]);
    let registry = LayerRegistry::new(catalog, source.clone());
    let slot = Arc::new(ImageSlot::new(asset.id.clone()));
    registry.bind([slot.clone() as Arc<dyn ImageLayer>]);

    let report = source.prepare_blocking(&asset);
    let Some(video) = &report.path else {
        bail!(
            "No video found for {} under {}",
            asset.name,
            source.settings().base_dir.display()
        );
    };
    println!(
        "{}: {} frames requested, {} cached, {} dropped",
        video.display(),
        report.requested,
        report.stored,
        report.dropped
    );

    registry.refresh(Some(args.at));
    let Some(image) = slot.image() else {
        bail!("No frame cached at {:.3}s", args.at);
    };

    let png = png_bytes(&image).context("Failed to encode PNG")?;
    std::fs::write(&args.out, png)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    println!(
        "Wrote {}x{} frame at {:.3}s to {}",
        image.width(),
        image.height(),
        args.at,
        args.out.display()
    );

    let stats = source.cache_stats();
    info!(
        "Cache: {} entries, {} bytes, hit rate {:.0}%",
        stats.entries,
        stats.bytes,
        stats.hit_rate() * 100.0
    );
    Ok(())
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // Initialize logger based on --log flag
    if let Some(log_path_opt) = &args.log_file {
        // File logging with specified verbosity level
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| paths::config_file("flipbook.log", path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!(
            "Logging to file: {} (level: {:?})",
            log_path.display(),
            log_level
        );
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(log_level.as_str().to_lowercase()),
        )
        .format_timestamp_millis()
        .init();
    }
    Ok(())
}

/// Asset from the catalog (`--catalog` + `--asset`) or from the positional name
fn select_asset(args: &Args) -> Result<AssetDescriptor> {
    if let Some(catalog_path) = &args.catalog {
        let catalog = AssetCatalog::load(catalog_path)?;
        let id = args.asset.as_deref().unwrap_or_default();
        return catalog
            .get(id)
            .cloned()
            .with_context(|| format!("Asset {} not in {}", id, catalog_path.display()));
    }

    let Some(name) = &args.name else {
        bail!("Either NAME or --catalog with --asset is required");
    };
    let id = args.asset.clone().unwrap_or_else(|| name.clone());
    let asset = AssetDescriptor::new(id, name.clone());
    Ok(match &args.directory {
        Some(dir) => asset.with_directory(dir.clone()),
        None => asset,
    })
}

fn make_decoder(args: &Args) -> Result<Arc<dyn MediaDecoder>> {
    if let Some(duration) = args.synthetic {
        info!("Using synthetic decoder ({:.3}s)", duration);
        return Ok(Arc::new(SyntheticDecoder::new(duration).with_size(64, 64)));
    }

    #[cfg(feature = "ffmpeg")]
    {
        Ok(Arc::new(flipbook::entities::loader_video::FfmpegDecoder))
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        bail!("Built without the `ffmpeg` feature; use --synthetic SECONDS")
    }
}
