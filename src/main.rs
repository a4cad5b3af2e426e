use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gstreamer as gst;
use tracing::info;

use resilient_relay::config::Config;
use resilient_relay::graph::Graph;
use resilient_relay::sync::{self, wire_appsink, Counters, FrameSlot, RenderLoop};
use resilient_relay::{error, signals, stats, supervisor, watchdog, Cli};

fn init_logging(verbose: bool) {
    let _ = tracing_log::LogTracer::init();
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).context("failed to load config file")?,
        None => Config::default(),
    };
    config.apply_cli(&cli);

    gst::init().context("failed to initialize GStreamer")?;

    let graph = Graph::new(&config).context("failed to build graph")?;

    let counters = Arc::new(Counters::new());
    let frame_slot = Arc::new(FrameSlot::new(Arc::clone(&counters)));
    wire_appsink(&graph.appsink, Arc::clone(&frame_slot));

    let fallback_frame = sync::fallback_frame::build_fallback_frame(config.output.width, config.output.height)
        .context("failed to build output fallback frame")?;

    let main_loop = glib::MainLoop::new(None, false);
    let fatal = Arc::new(AtomicBool::new(false));

    let supervisor = supervisor::Supervisor::new(
        Arc::clone(&graph.mutator),
        Arc::clone(&graph.selector),
        main_loop.clone(),
        Arc::clone(&fatal),
    );
    let _ingest_watch = supervisor
        .watch_ingest(&graph.ingest_pipeline)
        .map_err(|e| anyhow::anyhow!("failed to install ingest bus watch: {e}"))?;
    let _output_watch = supervisor
        .watch_output(&graph.output_pipeline)
        .map_err(|e| anyhow::anyhow!("failed to install output bus watch: {e}"))?;

    let watchdog = Arc::clone(&graph.watchdog);
    let selector_for_watchdog = Arc::clone(&graph.selector);
    let _watchdog_timer = glib::timeout_add(Duration::from_millis(500), move || {
        // A stall alone is not a graph-topology error: the watchdog only
        // routes around it. Rebuilds are requested solely by the supervisor
        // in response to an actual bus error, per the ingest/error split in
        // the component design.
        if watchdog.tick() == watchdog::WatchdogEvent::SwitchToFallback {
            selector_for_watchdog.activate_fallback();
        }
        glib::ControlFlow::Continue
    });

    let _stats_timer = stats::install(Arc::clone(&counters), config.stats_interval_s);

    signals::install(main_loop.clone()).context("failed to install signal handlers")?;

    graph.set_playing().context("failed to start pipelines")?;

    let render_loop = RenderLoop::start(
        graph.appsrc.clone(),
        graph.output_pipeline.clone(),
        Arc::clone(&frame_slot),
        fallback_frame,
        Arc::clone(&counters),
        config.output.fps,
        Duration::from_millis(config.thresholds.no_signal_timeout_ms),
    );

    info!(port = config.input.port, "resilient-relay running");
    main_loop.run();

    drop(render_loop);
    graph.set_null();

    if fatal.load(Ordering::SeqCst) {
        let err = error::RelayError::Fatal {
            source_name: "pipeline".to_string(),
            detail: "a non-recoverable bus error or output EOS stopped the main loop".to_string(),
        };
        std::process::exit(err.exit_code());
    }

    info!("clean shutdown");
    Ok(())
}
