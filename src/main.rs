//! Preload Core simulator.
//!
//! Drives a staged preload manager over a simulated playlist and prints what
//! was preloaded for each playback position.
//!
//! ## CLI Subcommands
//!
//! - `preload-core-sim` or `preload-core-sim run [positions...]` - Run the simulation
//! - `preload-core-sim config` - Print the effective configuration as JSON
//! - `preload-core-sim version` - Print the version

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use preload_core::config::{self, EffectiveConfig, EnvConfig};
use preload_core::staged::{FailurePoint, SimulatedFactory, SourceProfile, SourceState};
use preload_core::telemetry::{init_logging, init_metrics};
use preload_core::{
    PreloadError, PreloadListener, PreloadStatus, SchedulerError, StagedPreloadManager,
};

const PLAYLIST_LEN: i64 = 10;
const FAILING_INDEX: i64 = 4;
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("run");
    let config = config::load();

    match command {
        "run" => {
            let positions = match parse_positions(&args[2.min(args.len())..]) {
                Ok(p) => p,
                Err(bad) => {
                    eprintln!("Invalid playback position: {}", bad);
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = init_logging(&config.log) {
                eprintln!("Logging setup failed: {}", e);
                return ExitCode::FAILURE;
            }
            init_metrics();
            match run_simulation(&config, &positions).await {
                Ok(report) => print_json(&report),
                Err(e) => {
                    eprintln!("Simulation error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "config" => print_json(&config.effective_config()),
        "version" | "--version" | "-V" => {
            println!("preload-core-sim {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!(
        "Usage: preload-core-sim [run [POSITION...] | config | version | help]

Simulates a {PLAYLIST_LEN}-item playlist. For each POSITION (default: 0 3 7)
the playing index is moved there and preloading runs until it settles.

Environment: PRELOAD_CORE_WORKER_NAME, PRELOAD_CORE_DISPATCH_BATCH,
PRELOAD_CORE_LOG_LEVEL, PRELOAD_CORE_LOG_FORMAT, PRELOAD_CORE_LOG_FILE"
    );
}

fn parse_positions(args: &[String]) -> Result<Vec<i64>, String> {
    if args.is_empty() {
        return Ok(vec![0, 3, 7]);
    }
    args.iter()
        .map(|a| a.parse::<i64>().map_err(|_| a.clone()))
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    config: EffectiveConfig,
    rounds: Vec<Round>,
}

#[derive(Debug, Default, Serialize)]
struct Round {
    playing_index: i64,
    completed: Vec<String>,
    errors: Vec<String>,
    /// Source state of every playlist item once the round settled.
    states: BTreeMap<String, SourceState>,
    timed_out: bool,
}

#[derive(Default)]
struct Recorder {
    completed: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl Recorder {
    fn take(&self, playing_index: i64) -> Round {
        Round {
            playing_index,
            completed: std::mem::take(&mut *self.completed.lock()),
            errors: std::mem::take(&mut *self.errors.lock()),
            states: BTreeMap::new(),
            timed_out: false,
        }
    }
}

impl PreloadListener<String> for Recorder {
    fn on_completed(&self, item: &String) {
        self.completed.lock().push(item.clone());
    }

    fn on_error(&self, error: &PreloadError<String>) {
        self.errors.lock().push(error.to_string());
    }
}

/// How far to preload an item, by distance from the playing index.
fn target_for(distance: u64) -> Option<PreloadStatus> {
    match distance {
        0 | 1 => Some(PreloadStatus::loaded_for_duration_ms(2_000)),
        2 | 3 => Some(PreloadStatus::tracks_selected()),
        4 | 5 => Some(PreloadStatus::source_prepared()),
        _ => None,
    }
}

fn item_name(index: i64) -> String {
    format!("clip-{:02}", index)
}

async fn run_simulation(config: &EnvConfig, positions: &[i64]) -> Result<Report, SchedulerError> {
    let playing = Arc::new(AtomicI64::new(0));
    let policy_playing = Arc::clone(&playing);
    let policy =
        move |index: &i64| target_for(index.abs_diff(policy_playing.load(Ordering::SeqCst)));

    let base = SourceProfile {
        duration_us: 30_000_000,
        chunk_us: 500_000,
        step_delay: Duration::from_millis(2),
        ..Default::default()
    };
    let failing = SourceProfile {
        fail_at: Some(FailurePoint::Loading { after_us: 1_000_000 }),
        ..base.clone()
    };
    let factory = SimulatedFactory::new(base).with_profile(item_name(FAILING_INDEX), failing);

    let manager = StagedPreloadManager::builder(factory, policy).env_config(config).build()?;
    let recorder = Arc::new(Recorder::default());
    manager.add_listener(recorder.clone());
    for index in 0..PLAYLIST_LEN {
        manager.add(item_name(index), index)?;
    }

    let mut rounds = Vec::with_capacity(positions.len());
    for &position in positions {
        playing.store(position, Ordering::SeqCst);
        manager.set_current_playing_index(position);
        manager.invalidate();
        info!(position, active = ?manager.active_item(), "playback moved");

        let mut timed_out = false;
        while manager.active_item().is_some() {
            if tokio::time::timeout(EVENT_TIMEOUT, manager.dispatch_next()).await.is_err() {
                warn!(position, "no preload progress, giving up on this round");
                timed_out = true;
                break;
            }
        }
        let mut round = recorder.take(position);
        round.timed_out = timed_out;
        round.states = (0..PLAYLIST_LEN)
            .filter_map(|index| {
                let name = item_name(index);
                manager.get(&name).map(|source| (name, source.state()))
            })
            .collect();
        rounds.push(round);
    }

    manager.release();
    Ok(Report { config: config.effective_config(), rounds })
}
