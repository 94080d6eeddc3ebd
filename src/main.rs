mod bluetooth;
mod config;
mod error;
mod models;
mod telemetry;
mod utils;

use log::{error, info, warn};
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use bluetooth::DeviceLink;
use config::TelemetryConfig;
use telemetry::{LinkEvent, Snapshot, TelemetryPipeline};
use utils::{format_readouts, format_status, summarize_chart, Chart};

const LINK_EVENT_QUEUE: usize = 256;

/// Control surface commands read from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Connect,
    Disconnect,
    Reset,
    Status,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "connect" | "c" => Some(Command::Connect),
            "disconnect" | "d" => Some(Command::Disconnect),
            "reset" | "r" => Some(Command::Reset),
            "status" | "s" => Some(Command::Status),
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Owns the running device link, if any
struct Frontend {
    config: TelemetryConfig,
    pipeline: TelemetryPipeline,
    events: mpsc::Sender<LinkEvent>,
    link: Option<DeviceLink>,
    // (points buffered, latest arrival) at the last render
    rendered: Option<(usize, Option<OffsetDateTime>)>,
}

impl Frontend {
    fn connect(&mut self) {
        let id = match self.pipeline.request_connect() {
            Ok(id) => id,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };
        // A previous attempt may still be winding down; the new one waits for it
        let previous = self.link.take();
        self.link = Some(DeviceLink::spawn(
            self.config.link.clone(),
            id,
            self.events.clone(),
            previous,
        ));
    }

    fn disconnect(&mut self) {
        self.pipeline.request_disconnect();
        if let Some(link) = self.link.take() {
            info!("Closing link {}", link.id());
            tokio::spawn(link.close());
        }
    }

    /// Stop routing and wait for the device to be released
    async fn shutdown(&mut self) {
        self.pipeline.request_disconnect();
        if let Some(link) = self.link.take() {
            info!("Closing link {}", link.id());
            link.close().await;
        }
    }

    fn status(&self) {
        for line in format_status(&self.pipeline.snapshot(), self.config.max_points) {
            info!("{}", line);
        }
    }

    fn render(&mut self) {
        let snapshot = self.pipeline.snapshot();
        let key = (snapshot.len(), snapshot.latest.as_ref().map(|s| s.captured_at));
        if self.rendered == Some(key) {
            return;
        }
        self.rendered = Some(key);
        render_snapshot(&snapshot);
    }
}

fn render_snapshot(snapshot: &Snapshot) {
    if snapshot.is_empty() {
        info!("No telemetry buffered ({})", snapshot.connection);
        return;
    }
    let readouts = format_readouts(snapshot.latest.as_ref())
        .into_iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join(" | ");
    info!("{}", readouts);

    for chart in Chart::ALL {
        if let Some(summary) = summarize_chart(chart, snapshot) {
            info!("  {}", summary);
        }
    }
}

fn print_help() {
    info!("Commands: connect, disconnect, reset, status, help, quit");
}

async fn main_loop(config: TelemetryConfig, pipeline: TelemetryPipeline) {
    let (tx, mut rx) = mpsc::channel(LINK_EVENT_QUEUE);
    let mut render_tick = interval(Duration::from_millis(config.render_interval_ms));
    render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut watching_signal = true;

    let auto_connect = config.auto_connect;
    let mut frontend = Frontend {
        config,
        pipeline,
        events: tx,
        link: None,
        rendered: None,
    };

    print_help();
    if auto_connect {
        frontend.connect();
    }

    loop {
        tokio::select! {
            result = &mut shutdown, if watching_signal => match result {
                Ok(()) => {
                    info!("Program terminated by user. Exiting gracefully.");
                    break;
                }
                Err(e) => {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    watching_signal = false;
                }
            },
            Some(event) = rx.recv() => frontend.pipeline.handle_event(event),
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match Command::parse(&line) {
                    Some(Command::Connect) => frontend.connect(),
                    Some(Command::Disconnect) => frontend.disconnect(),
                    Some(Command::Reset) => frontend.pipeline.request_reset(),
                    Some(Command::Status) => frontend.status(),
                    Some(Command::Help) => print_help(),
                    Some(Command::Quit) => break,
                    None => {
                        warn!("Unknown command '{}'", line.trim());
                        print_help();
                    }
                },
                Ok(None) => {
                    info!("Standard input closed, commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    error!("Failed to read command: {}", e);
                    stdin_open = false;
                }
            },
            _ = render_tick.tick() => frontend.render(),
        }
    }

    frontend.shutdown().await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match TelemetryConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let pipeline =
        TelemetryPipeline::new(config.max_points, &config.channels, config.missing_value);

    // Runs until quit or Ctrl+C, and releases the device either way
    main_loop(config, pipeline.clone()).await;
    info!("Session ended");

    pipeline.teardown();
    Ok(())
}
