//! proctord - exam proctoring daemon.
//!
//! Loads the detector models once, spawns the HTTP surface, and serves
//! until interrupted:
//! 1. `/video_feed` streams the camera through the frame-alert pipeline
//! 2. `/get_alerts` serves the most recent alert log entries
//! 3. `/` serves the landing page embedding both

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use clap::Parser;

use proctord::{
    AlertLog, ApiConfig, ApiServer, InferenceContext, Pipeline, ProctordConfig,
};

#[derive(Parser, Debug)]
#[command(name = "proctord", about = "Exam proctoring daemon", version)]
struct Args {
    /// Path to a JSON config file (overrides PROCTOR_CONFIG).
    #[arg(long, env = "PROCTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Camera URL override: stub://..., http(s)://..., or a device path.
    #[arg(long)]
    camera: Option<String>,

    /// Listen address override, e.g. 127.0.0.1:5000.
    #[arg(long)]
    listen: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = ProctordConfig::load_from(args.config.as_deref())?;
    if let Some(camera) = args.camera {
        cfg.camera.url = camera;
    }
    if let Some(listen) = args.listen {
        cfg.api_addr = listen;
    }

    log::info!(
        "proctord {} starting: camera={} backend={}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.url,
        cfg.detection.backend
    );

    // Models load once here and are shared by every stream.
    let ctx = InferenceContext::from_settings(&cfg.detection, cfg.camera.width, cfg.camera.height)
        .context("build inference context")?;
    ctx.warm_up().context("warm up detectors")?;

    let alert_log = Arc::new(AlertLog::new());
    let pipeline = Pipeline::new(Arc::new(ctx), alert_log.clone());

    let api_cfg = ApiConfig {
        addr: cfg.api_addr.clone(),
    };
    let handle = ApiServer::new(api_cfg, pipeline, cfg.camera.clone()).spawn()?;
    log::info!("listening on http://{}", handle.addr);
    log::info!(
        "open http://{} for the live feed; alerts at /get_alerts",
        handle.addr
    );

    let shutdown = handle.shutdown_flag();
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
        let _ = tx.send(());
    })
    .context("install ctrl-c handler")?;

    rx.recv().ok();
    log::info!("shutting down ({} alerts this session)", alert_log.len());
    handle.stop()?;
    Ok(())
}
