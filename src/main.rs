use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use ventscope::config::Config;
use ventscope::decoder::ParameterSet;
use ventscope::error::LinkError;
use ventscope::link::{LinkEvent, LinkSession, LinkWorker};
use ventscope::monitor::{MonitorSettings, SweepMonitor};
use ventscope::store::{MeasurementKind, MemoryStore};
use ventscope::sweep::SweepLines;

/// Replay a captured ventilator link stream through the sweep chart pipeline
#[derive(Parser, Debug)]
#[command(name = "ventscope", version)]
struct Args {
    /// File holding the raw link text
    capture: PathBuf,

    #[arg(long, default_value_t = 1)]
    device_id: i64,

    /// Characters per simulated link chunk
    #[arg(long, default_value_t = 20)]
    chunk_size: usize,

    /// Delay between chunks in milliseconds
    #[arg(long, default_value_t = 10)]
    chunk_delay_ms: u64,

    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    loaded.unwrap_or_else(|e| {
        log::warn!("{}; using defaults", e);
        Config::default()
    })
}

fn chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

async fn replay(worker: LinkWorker, chunks: Vec<String>, delay: Duration) -> Result<(), LinkError> {
    for chunk in chunks {
        worker.send_chunk(chunk)?;
        tokio::time::sleep(delay).await;
    }
    worker.close_async().await
}

fn report(lines: &SweepLines, parameters: &ParameterSet) {
    log::info!(
        "sweep: {} background ({} visible), {} foreground, position {:?} ms, range {:?}",
        lines.background.len(),
        lines.visible_background().len(),
        lines.foreground.len(),
        lines.sweep_position(),
        lines.y_range(),
    );
    if !parameters.is_empty() {
        log::info!(
            "parameters: P.control {:?}, BPM {:?}, I:E 1:{:?}, PIP {:?}, PEEP {:?}, volume {:?}, cycles {:?}",
            parameters.pres_control,
            parameters.bpm,
            parameters.ie_ratio_value(),
            parameters.pip,
            parameters.peep,
            parameters.volume,
            parameters.cycle_count,
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref());
    let text = std::fs::read_to_string(&args.capture)?;

    let store = MemoryStore::new();
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let worker = LinkWorker::spawn(
        LinkSession::new(args.device_id, config.trailing_fragment),
        store.clone(),
        event_tx,
    );

    let monitor = SweepMonitor::new(MonitorSettings::from_config(
        args.device_id,
        MeasurementKind::Pressure,
        &config,
    ));
    let handle = monitor.handle();
    let (lines_tx, mut lines_rx) = mpsc::channel(8);
    let monitor_task = tokio::spawn(monitor.run(store.clone(), config.poll_interval(), lines_tx));

    let mut replay_task = tokio::spawn(replay(
        worker,
        chunks(&text, args.chunk_size),
        Duration::from_millis(args.chunk_delay_ms),
    ));

    let mut parameters = ParameterSet::default();
    let absorb_events = |parameters: &mut ParameterSet| {
        for event in event_rx.try_iter() {
            match event {
                LinkEvent::Parameters(current) => *parameters = current,
                LinkEvent::StoreFailed(reason) => log::warn!("Store failed: {}", reason),
                LinkEvent::Closed => log::debug!("Link worker closed"),
            }
        }
    };

    loop {
        tokio::select! {
            Some(lines) = lines_rx.recv() => {
                absorb_events(&mut parameters);
                report(&lines, &parameters);
            }
            result = &mut replay_task => {
                result??;
                break;
            }
        }
    }

    // One more frame so the tail of the capture is charted
    if let Some(lines) = lines_rx.recv().await {
        absorb_events(&mut parameters);
        report(&lines, &parameters);
    }

    handle.stop();
    while lines_rx.recv().await.is_some() {}
    monitor_task.await?;

    log::info!(
        "Replayed {} pressure rows for device {}",
        store.len(args.device_id, MeasurementKind::Pressure)?,
        args.device_id
    );
    Ok(())
}
