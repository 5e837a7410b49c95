use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use kurier_ctl::doctor::check_config;
use kurier_ctl::snapshot::{CommandPublisher, CommandSubscriber};
use kurier_ctl::{Autopilot, AutopilotConfig};
use kurier_proto::telemetry::{EventKind, TelemetryEvent};
use kurier_proto::{ActuatorCommand, FlightMode};
use kurier_sim::plant::{Plant, PlantParams, PlantState};
use kurier_sim::scenario::{run_demo, DemoKind, Environment};

#[derive(Debug, Parser)]
#[command(name = "kurier", version, about = "kurier - fixed-wing/VTOL autopilot control core")]
struct Cli {
    /// TOML config; built-in defaults when omitted.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sanity-check the autopilot config.
    Doctor,
    /// Run a canned closed-loop scenario against the simulated plant as fast as possible.
    Demo {
        /// hold | cruise | land | geofence
        #[arg(long, default_value = "cruise")]
        scenario: String,
        #[arg(long, default_value_t = 20.0)]
        seconds: f64,
        /// Print the full trace as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Fly the simulated plant in real time at the configured control rate.
    Run {
        /// Initial mode: MANUAL, HOLD_ALT, CRUISE, RTL, LAND.
        #[arg(long, default_value = "CRUISE")]
        mode: String,
        #[arg(long)]
        alt: Option<f64>,
        #[arg(long)]
        airspeed: Option<f64>,
        /// Stop after this many seconds (runs until Ctrl-C when omitted).
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// List flight modes.
    Modes,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    autopilot: AutopilotConfig,
    control: ControlCfg,
    plant: PlantParams,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct ControlCfg {
    rate_hz: f64,
    /// Emit a status telemetry line every N commands (mode changes and failsafes always).
    telemetry_every_n: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { rate_hz: 10.0, telemetry_every_n: 10 }
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else { return Ok(Config::default()) };
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg),
        Command::Demo { scenario, seconds, json } => demo(&cfg, &scenario, seconds, json),
        Command::Run { mode, alt, airspeed, seconds } => {
            run(&cfg, &mode, alt, airspeed, seconds).await
        }
        Command::Modes => {
            for m in FlightMode::ALL {
                println!("{}", m);
            }
            Ok(())
        }
    }
}

/// Checks shared by every command that flies the controller.
fn preflight(cfg: &Config) -> Result<()> {
    check_config(&cfg.autopilot)?;
    anyhow::ensure!(
        cfg.control.rate_hz >= 1.0 && cfg.control.rate_hz <= 400.0,
        "control.rate_hz should be 1..400"
    );
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    preflight(cfg)?;
    if cfg.control.rate_hz < 5.0 {
        warn!("control.rate_hz={} is slow for altitude hold", cfg.control.rate_hz);
    }
    info!("doctor: OK");
    Ok(())
}

fn demo(cfg: &Config, scenario: &str, seconds: f64, json: bool) -> Result<()> {
    let kind: DemoKind = scenario.parse()?;
    anyhow::ensure!(seconds > 0.0, "--seconds must be > 0");
    preflight(cfg)?;
    let dt = 1.0 / cfg.control.rate_hz;
    let trace = run_demo(kind, &cfg.autopilot, seconds, dt)?;

    if json {
        for s in &trace {
            println!("{}", serde_json::to_string(s)?);
        }
    } else if let Some(last) = trace.last() {
        println!(
            "[{:?}] t={:.1}s alt={:.1} m v={:.1} m/s mode={} targets={:.1}/{:.1} failsafe={}",
            kind,
            last.t_s,
            last.state.alt_m,
            last.state.airspeed_ms,
            last.cmd.mode,
            last.cmd.targets.alt_m,
            last.cmd.targets.airspeed_ms,
            last.cmd.failsafe_reason_str(),
        );
    }
    Ok(())
}

async fn run(
    cfg: &Config,
    mode: &str,
    alt: Option<f64>,
    airspeed: Option<f64>,
    seconds: Option<f64>,
) -> Result<()> {
    info!("run: starting");
    preflight(cfg)?;

    let mut ap = Autopilot::new(&cfg.autopilot)?;
    ap.set_mode_by_name(mode, alt, airspeed).context("initial mode")?;

    let dt = 1.0 / cfg.control.rate_hz;
    let env = Environment::default();
    let mut plant = Plant::new(cfg.plant, PlantState::default());

    // single writer (this loop), telemetry reads snapshots
    let (publisher, commands) = CommandPublisher::new();
    let (state_tx, state_rx) = watch::channel(plant.state());
    let every_n = cfg.control.telemetry_every_n.max(1);
    let telemetry = tokio::spawn(telemetry_task(commands, state_rx, every_n));

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs_f64(dt));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let max_ticks = seconds.map(|s| (s / dt).round() as u64);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("run: interrupted");
                break;
            }
        }

        let sensors = env.sensors(&plant.state());
        let cmd = ap.update(&sensors, &env.system(dt), None)?;
        let state = plant.step(&cmd, dt);
        publisher.publish(cmd);
        let _ = state_tx.send(state);

        tick += 1;
        if max_ticks.is_some_and(|m| tick >= m) {
            break;
        }
    }

    drop(publisher);
    telemetry.await.context("telemetry task")?;
    info!("run: done after {} ticks", tick);
    Ok(())
}

async fn telemetry_task(
    mut commands: CommandSubscriber,
    state: watch::Receiver<PlantState>,
    every_n: u32,
) {
    let mut prev: Option<ActuatorCommand> = None;
    let mut n: u32 = 0;

    while let Some(cmd) = commands.changed().await {
        let kind = TelemetryEvent::classify(prev.as_ref(), &cmd);
        n = n.wrapping_add(1);
        if kind != EventKind::Status || n % every_n == 0 {
            let s = *state.borrow();
            let ev = TelemetryEvent {
                ts_unix_ms: unix_ms_now(),
                kind,
                mode: cmd.mode,
                failsafe_reason: cmd.failsafe_reason,
                alt_m: Some(s.alt_m),
                airspeed_ms: s.airspeed_ms,
                thrust: cmd.thrust,
                pitch: cmd.pitch,
                target_alt_m: cmd.targets.alt_m,
                target_airspeed_ms: cmd.targets.airspeed_ms,
                msg: format!("{} {}", cmd.mode, cmd.failsafe_reason_str()).trim_end().to_string(),
            };
            match kind {
                EventKind::Failsafe => warn!(
                    "telemetry {:?}: mode={} reason={} alt={:.1}",
                    ev.kind, ev.mode, cmd.failsafe_reason_str(), s.alt_m
                ),
                _ => info!(
                    "telemetry {:?}: mode={} alt={:.1}/{:.1} v={:.1}/{:.1} thrust={:.2} pitch={:.2}",
                    ev.kind,
                    ev.mode,
                    s.alt_m,
                    ev.target_alt_m,
                    ev.airspeed_ms,
                    ev.target_airspeed_ms,
                    ev.thrust,
                    ev.pitch
                ),
            }
            match serde_json::to_string(&ev) {
                Ok(line) => tracing::debug!(target: "kurier::telemetry", "{}", line),
                Err(e) => warn!("telemetry encode failed: {}", e),
            }
        }
        prev = Some(cmd);
    }
}

fn unix_ms_now() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
