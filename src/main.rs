//! VitalWatch Agent CLI
//!
//! Personalised risk scoring for wearable vital signs.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;
use vitalwatch_agent::{
    activity::create_shared_log_with_persistence,
    config::Config,
    core::{predict_next, RiskEngine},
    pipeline::{IncomingReading, MemoryRepository, Pipeline, PipelineOptions},
    reading::{input::parse_reading, AnalyzeRequest, Channel, PredictRequest},
    LogNotifier, MEDICAL_DISCLAIMER, VERSION,
};

#[derive(Parser)]
#[command(name = "vitalwatch")]
#[command(author = "VitalWatch")]
#[command(version = VERSION)]
#[command(about = "Personalised risk scoring for wearable vital signs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse one reading against its history
    Analyze {
        /// JSON file with {data, history, age?, underlyingConditions?}
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Forecast the next value of a channel
    Predict {
        /// JSON file with {history} or a bare history array
        #[arg(long, short)]
        input: PathBuf,

        /// Channel to forecast (bpm, hrv, temp, spO2, totalAcc)
        #[arg(long)]
        key: Option<String>,

        /// Number of recent values to average
        #[arg(long)]
        window: Option<usize>,
    },

    /// Replay a JSON Lines file of readings through the pipeline
    Replay {
        /// File with one reading object per line
        #[arg(long, short)]
        input: PathBuf,

        /// Device the readings belong to
        #[arg(long, default_value = "device1")]
        device: String,

        /// Keep history and records in the data directory between runs
        #[arg(long)]
        persist: bool,
    },

    /// Start the HTTP analysis server (requires server feature)
    Serve {
        /// Port to bind to (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show cumulative processing statistics
    Status,

    /// Show configuration
    Config {
        /// Write the current settings to the config file
        #[arg(long)]
        init: bool,
    },

    /// Display the medical disclaimer
    Disclaimer,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze { input } => cmd_analyze(&input),
        Commands::Predict { input, key, window } => cmd_predict(&input, key, window),
        Commands::Replay {
            input,
            device,
            persist,
        } => cmd_replay(&input, &device, persist),
        Commands::Serve { port } => cmd_serve(port),
        Commands::Status => cmd_status(),
        Commands::Config { init } => cmd_config(init),
        Commands::Disclaimer => {
            println!("{MEDICAL_DISCLAIMER}");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config, using defaults: {e}");
            Config::default()
        }
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("could not read {path:?}"))?;
    serde_json::from_str(&content).with_context(|| format!("{path:?} is not valid JSON"))
}

fn cmd_analyze(input: &Path) -> anyhow::Result<()> {
    let config = load_config();
    let request = AnalyzeRequest::from_value(&read_json(input)?)?;

    let engine = RiskEngine::new(config.timezone);
    let result = engine.analyze(&request.reading, &request.history, &request.profile);

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_predict(input: &Path, key: Option<String>, window: Option<usize>) -> anyhow::Result<()> {
    let config = load_config();

    let body = match read_json(input)? {
        history @ Value::Array(_) => json!({ "history": history }),
        other => other,
    };
    let mut request = PredictRequest::from_value(&body)?;

    if let Some(key) = key {
        request.channel = key.parse::<Channel>()?;
    }
    if let Some(window) = window {
        request.window_size = window;
    } else if body.get("windowSize").is_none() {
        request.window_size = config.forecast_window;
    }

    let prediction = predict_next(&request.history, request.channel, request.window_size);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "key": request.channel, "prediction": prediction }))?
    );
    Ok(())
}

fn cmd_replay(input: &Path, device: &str, persist: bool) -> anyhow::Result<()> {
    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let file = std::fs::File::open(input).with_context(|| format!("could not open {input:?}"))?;

    println!("VitalWatch Agent v{VERSION}");
    println!();
    println!("Replaying {input:?} as device '{device}'");
    println!("  Timezone: {}", config.timezone);
    println!("  History limit: {}", config.history_limit);
    println!("  Retention: {} days", config.retention.as_secs() / 86_400);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let repository = if persist {
        MemoryRepository::with_persistence(config.store_path(), config.retention)
    } else {
        MemoryRepository::new(config.retention)
    };
    let activity = create_shared_log_with_persistence(config.activity_path());

    #[cfg_attr(not(feature = "webhook"), allow(unused_mut))]
    let mut pipeline = Pipeline::new(repository, RiskEngine::new(config.timezone))
        .with_options(PipelineOptions::from_config(&config))
        .with_activity_log(activity.clone())
        .with_sink(LogNotifier);

    #[cfg(feature = "webhook")]
    if config.webhook.is_enabled() {
        match vitalwatch_agent::WebhookNotifier::new(&config.webhook) {
            Ok(notifier) => {
                println!("  Webhook: {}", notifier.url());
                pipeline = pipeline.with_sink(notifier);
            }
            Err(e) => eprintln!("Warning: Webhook disabled: {e}"),
        }
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let (sender, receiver) = crossbeam_channel::bounded::<IncomingReading>(1024);
    let producer_running = running.clone();
    let device_id = device.to_string();

    let producer = thread::spawn(move || {
        let mut sent = 0u64;
        for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
            if !producer_running.load(Ordering::SeqCst) {
                break;
            }
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    eprintln!("Error reading input: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let reading = serde_json::from_str::<Value>(&line)
                .map_err(|e| e.to_string())
                .and_then(|v| parse_reading(&v).map_err(|e| e.to_string()));
            match reading {
                Ok(reading) => {
                    if sender.send(IncomingReading::new(device_id.clone(), reading)).is_err() {
                        break;
                    }
                    sent += 1;
                }
                Err(e) => eprintln!("Warning: Skipping line {}: {e}", line_no + 1),
            }
        }
        sent
    });

    let processed = pipeline.run(&receiver, &running);
    drop(receiver);

    let sent = match producer.join() {
        Ok(sent) => sent,
        Err(_) => bail!("input reader thread panicked"),
    };

    println!();
    println!("Processed {processed} of {sent} readings");

    if persist {
        pipeline.repository().save()?;
        println!("Saved store to {:?}", config.store_path());
    }
    if let Err(e) = activity.save() {
        eprintln!("Warning: Could not save activity log: {e}");
    }

    println!();
    println!("{}", activity.summary());
    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(port: Option<u16>) -> anyhow::Result<()> {
    use vitalwatch_agent::server::{run, ServerConfig};

    let config = load_config();
    let mut server_config = ServerConfig::from_config(&config);
    if let Some(port) = port {
        server_config.port = port;
    }

    let runtime = tokio::runtime::Runtime::new().context("could not start runtime")?;
    runtime.block_on(async {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("VitalWatch server listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        println!();
        println!("Stopping server...");
        let _ = shutdown_tx.send(());
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_port: Option<u16>) -> anyhow::Result<()> {
    bail!("server feature not enabled at compile time")
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config();

    println!("VitalWatch Agent Status");
    println!("=======================");
    println!();
    println!("Configuration:");
    println!("  Timezone: {}", config.timezone);
    println!("  Forecast window: {}", config.forecast_window);
    println!(
        "  Webhook: {}",
        if config.webhook.is_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    let stats_path = config.activity_path();
    if stats_path.exists() {
        let stats = read_json(&stats_path)?;
        println!("Cumulative Statistics:");
        for (label, key) in [
            ("Readings processed", "readings_processed"),
            ("Waiting for more data", "insufficient_data"),
            ("Alerts raised", "alerts_raised"),
            ("Physical-limit alerts", "physical_alerts"),
            ("Notifications sent", "notifications_sent"),
            ("Notification failures", "notification_failures"),
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {label}: {value}");
            }
        }
    } else {
        println!("No previous session data found.");
    }

    let store_path = config.store_path();
    if store_path.exists() {
        let store = MemoryRepository::with_persistence(store_path, config.retention);
        println!();
        println!("Stored devices:");
        for device in store.device_ids() {
            println!(
                "  {device}: {} history entries, {} records",
                store.history(&device).len(),
                store.records(&device).len()
            );
        }
    }
    Ok(())
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    let config = load_config();

    if init {
        config.save().context("could not save config")?;
        println!("Wrote {:?}", Config::config_path());
        return Ok(());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
