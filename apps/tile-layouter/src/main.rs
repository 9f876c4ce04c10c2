use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use gst::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tile_layouter::{gst_utils, CompositorRuntime, LayoutConfig, Layouter, SourceHandle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PATTERNS: &[&str] = &["smpte", "ball", "snow", "circular", "pinwheel", "spokes"];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TILE_LAYOUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Number of test sources to attach
    #[arg(short = 'n', long, default_value_t = 4)]
    sources: usize,

    /// Delay between attach and detach steps
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,

    /// Video sink element, fakesink for headless runs
    #[arg(long, default_value = "autovideosink")]
    sink: String,

    /// Mute and unmute the first source before detaching
    #[arg(long)]
    toggle_mute: bool,

    /// Check available GStreamer plugins and exit
    #[arg(long)]
    check_plugins: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LayoutConfig::from_file(path)?,
        None => LayoutConfig::default(),
    };

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting tile-layouter v{}", env!("CARGO_PKG_VERSION"));

    let gst_capabilities = gst_utils::initialize()?;
    if args.check_plugins {
        gst_utils::print_plugin_info(&gst_capabilities);
        return Ok(());
    }

    let pipeline = gst::Pipeline::builder().name("tile-layouter").build();
    let compositor = gst::ElementFactory::make("compositor")
        .name("mixer")
        .build()
        .context("Failed to create compositor")?;
    let convert = gst::ElementFactory::make("videoconvert")
        .build()
        .context("Failed to create videoconvert")?;
    let sink = gst::ElementFactory::make(&args.sink)
        .build()
        .with_context(|| format!("Failed to create sink {}", args.sink))?;

    pipeline.add_many([&compositor, &convert, &sink])?;
    gst::Element::link_many([&compositor, &convert, &sink])?;

    compositor.connect_pad_added(|_, pad| info!("Mixer pad added: {}", pad.name()));
    compositor.connect_pad_removed(|_, pad| info!("Mixer pad removed: {}", pad.name()));

    let runtime = CompositorRuntime::new(&compositor, &config)?;
    let layouter = Layouter::new(runtime, config)?;

    let bus = pipeline.bus().context("Pipeline has no bus")?;
    let bus_task = tokio::spawn(async move {
        let mut messages = bus.stream();
        while let Some(msg) = messages.next().await {
            match msg.view() {
                gst::MessageView::Error(err) => {
                    error!(
                        "Error from {}: {} ({:?})",
                        err.src().map(|s| s.path_string()).unwrap_or_default(),
                        err.error(),
                        err.debug()
                    );
                    break;
                }
                gst::MessageView::Eos(_) => {
                    info!("Pipeline received EOS");
                    break;
                }
                _ => {}
            }
        }
    });

    pipeline.set_state(gst::State::Playing)?;

    tokio::select! {
        result = run_demo(&args, &pipeline, &layouter) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    bus_task.abort();
    pipeline.set_state(gst::State::Null)?;
    info!("Pipeline stopped");

    Ok(())
}

/// Attaches test sources one by one, then detaches them in reverse order.
async fn run_demo(
    args: &Args,
    pipeline: &gst::Pipeline,
    layouter: &Layouter<CompositorRuntime>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    ticker.tick().await;

    let mut attached: Vec<(gst::Element, SourceHandle)> = Vec::with_capacity(args.sources);
    for index in 0..args.sources {
        let source = gst::ElementFactory::make("videotestsrc")
            .property("is-live", true)
            .property_from_str("pattern", PATTERNS[index % PATTERNS.len()])
            .build()
            .context("Failed to create videotestsrc")?;
        pipeline.add(&source)?;

        let pad = source.static_pad("src").context("videotestsrc has no src pad")?;
        let handle = layouter.attach(pad, false)?;
        source.sync_state_with_parent()?;
        info!("Attached {} ({} sources)", handle.slot_name(), layouter.source_count());

        attached.push((source, handle));
        ticker.tick().await;
    }

    if args.toggle_mute {
        if let Some((_, handle)) = attached.first() {
            layouter.mute(handle, true)?;
            ticker.tick().await;
            layouter.mute(handle, false)?;
            ticker.tick().await;
        }
    }

    while let Some((source, handle)) = attached.pop() {
        let slot_name = handle.slot_name().to_string();
        let removed = layouter.detach_future(handle)?;

        // the producer's state may only change off its own streaming thread
        match removed.await {
            Some(_) => {
                source.set_state(gst::State::Null)?;
                pipeline.remove(&source)?;
                info!("Removed producer of {}", slot_name);
            }
            None => warn!("{} is still linked, leaving its producer in place", slot_name),
        }
        ticker.tick().await;
    }

    Ok(())
}
