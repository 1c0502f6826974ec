//! Simulated asset sensor with threshold alerting.
//!
//! Generates synthetic telemetry on an interval, evaluates it against
//! configured thresholds (strictly greater; an exact-threshold reading is
//! not an alert), debounces repeat alerts, and appends alert records to a
//! JSONL file. Every reading is broadcast as a namespaced envelope on
//! stdout; `start`/`stop`/`sample` command envelopes are accepted on stdin.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{MonitorSettings, ThresholdSettings};

/// Namespace tag on every envelope; foreign namespaces are ignored
pub const NAMESPACE: &str = "asset-monitor";

/// One synthetic sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetReading {
    pub temperature_celsius: f64,
    pub pressure_bar: f64,
    pub vibration_mm_s: f64,
}

/// An emitted alert record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetAlert {
    pub message: String,
    pub reading: AssetReading,
    /// Epoch seconds
    pub triggered_at: f64,
}

/// Cross-context message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub namespace: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Envelope {
    pub fn reading(reading: &AssetReading, ts: f64) -> Self {
        Self {
            namespace: NAMESPACE.to_string(),
            kind: "reading".to_string(),
            payload: Some(serde_json::json!({
                "temperature_celsius": reading.temperature_celsius,
                "pressure_bar": reading.pressure_bar,
                "vibration_mm_s": reading.vibration_mm_s,
                "ts": ts,
            })),
        }
    }
}

/// Commands accepted from the embedding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Sample,
}

impl Command {
    /// Decode a command envelope; `None` for foreign namespaces or unknown kinds
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        if envelope.namespace != NAMESPACE {
            return None;
        }
        match envelope.kind.as_str() {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "sample" => Some(Command::Sample),
            _ => None,
        }
    }
}

/// Generate a synthetic reading. In a real system this would come from
/// field I/O or an API.
pub fn generate_reading<R: Rng>(rng: &mut R) -> AssetReading {
    AssetReading {
        temperature_celsius: 70.0 + rng.gen_range(-5.0..25.0),
        pressure_bar: 100.0 + rng.gen_range(-10.0..30.0),
        vibration_mm_s: 2.0 + rng.gen_range(-1.0..6.0),
    }
}

/// Apply bounded jitter to the temperature channel
pub fn apply_jitter<R: Rng>(
    reading: AssetReading,
    max_jitter: f64,
    rng: &mut R,
) -> Result<AssetReading> {
    if max_jitter < 0.0 {
        return Err(anyhow!("max_jitter must be non-negative, got {}", max_jitter));
    }
    let jitter = if max_jitter == 0.0 {
        0.0
    } else {
        rng.gen_range(-max_jitter..=max_jitter)
    };
    Ok(AssetReading {
        temperature_celsius: reading.temperature_celsius + jitter,
        ..reading
    })
}

/// Strictly-greater threshold check; equal values do not alert
pub fn should_trigger_alert(reading: &AssetReading, thresholds: &ThresholdSettings) -> bool {
    reading.temperature_celsius > thresholds.temperature_celsius
        || reading.pressure_bar > thresholds.pressure_bar
        || reading.vibration_mm_s > thresholds.vibration_mm_s
}

pub fn format_alert(reading: &AssetReading) -> String {
    format!(
        "ALERT: temp={:.2}C, pressure={:.2}bar, vibration={:.2}mm/s",
        reading.temperature_celsius, reading.pressure_bar, reading.vibration_mm_s
    )
}

/// Append an alert record to the alerts file, one JSON object per line
pub fn write_alert(alert: &AssetAlert, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let record = serde_json::to_string(alert).context("Failed to serialize alert")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{}", record).context("Failed to write alert record")?;

    Ok(())
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// The simulation state machine driven by the run loop and commands
pub struct Simulator {
    settings: MonitorSettings,
    running: bool,
    last_alert_ts: Option<f64>,
    pub last_reading: Option<AssetReading>,
}

impl Simulator {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            // The service starts sampling immediately; `stop` pauses it
            running: true,
            last_alert_ts: None,
            last_reading: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start => {
                self.running = true;
                false
            }
            Command::Stop => {
                self.running = false;
                false
            }
            // Sample forces one reading even while stopped
            Command::Sample => true,
        }
    }

    /// Evaluate one reading: threshold check, debounce, alert record.
    /// Returns the alert if one was emitted.
    pub fn evaluate(&mut self, reading: AssetReading, now: f64) -> Result<Option<AssetAlert>> {
        self.last_reading = Some(reading);

        if !should_trigger_alert(&reading, &self.settings.thresholds) {
            log::info!(
                "OK: temp={:.2}, pressure={:.2}, vibration={:.2}",
                reading.temperature_celsius,
                reading.pressure_bar,
                reading.vibration_mm_s
            );
            return Ok(None);
        }

        if let Some(last) = self.last_alert_ts {
            if now - last < self.settings.debounce_seconds as f64 {
                log::warn!("alert suppressed due to debounce interval");
                return Ok(None);
            }
        }

        let alert = AssetAlert {
            message: format_alert(&reading),
            reading,
            triggered_at: now,
        };
        write_alert(&alert, &self.settings.alerts_file)?;
        log::warn!("{}", alert.message);
        self.last_alert_ts = Some(now);

        Ok(Some(alert))
    }

    /// One sampling step: generate, jitter, evaluate, broadcast
    fn sample_once(&mut self) -> Result<()> {
        let mut rng = rand::thread_rng();
        let reading = generate_reading(&mut rng);
        let reading = apply_jitter(reading, self.settings.max_jitter, &mut rng)?;
        let now = epoch_seconds();

        if self.settings.alerts_enabled {
            self.evaluate(reading, now)?;
        } else {
            self.last_reading = Some(reading);
            log::info!("alerts are disabled by configuration");
        }

        broadcast(&Envelope::reading(&reading, now));
        Ok(())
    }
}

/// Broadcast an envelope to the embedding context (one JSON line on stdout)
fn broadcast(envelope: &Envelope) {
    if let Ok(line) = serde_json::to_string(envelope) {
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
}

/// Read command envelopes from stdin on a background thread
fn spawn_command_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Envelope>(trimmed) {
                Ok(envelope) => {
                    if let Some(command) = Command::from_envelope(&envelope) {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => log::warn!("ignoring malformed command envelope: {}", e),
            }
        }
    });

    rx
}

/// Run the monitor loop until Ctrl-C.
///
/// Failures inside a sampling step are logged and the loop continues; only
/// setup errors abort.
pub async fn run(settings: MonitorSettings) -> Result<()> {
    log::info!("starting asset monitor");

    let interval = Duration::from_secs(settings.read_interval_seconds.max(1));
    let mut simulator = Simulator::new(settings);
    let commands = spawn_command_reader();

    let mut next_due = Instant::now();

    loop {
        // Drain pending commands before the next tick
        while let Ok(command) = commands.try_recv() {
            if simulator.handle_command(command) {
                if let Err(e) = simulator.sample_once() {
                    log::warn!("unexpected error in monitor step: {}", e);
                }
            }
        }

        if simulator.is_running() && Instant::now() >= next_due {
            if let Err(e) = simulator.sample_once() {
                log::warn!("unexpected error in monitor step: {}", e);
            }
            next_due = Instant::now() + interval;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            _ = tokio::signal::ctrl_c() => {
                if let Some(reading) = simulator.last_reading {
                    log::info!(
                        "last reading: temp={:.2}, pressure={:.2}, vibration={:.2}",
                        reading.temperature_celsius,
                        reading.pressure_bar,
                        reading.vibration_mm_s
                    );
                }
                log::info!("received shutdown signal, exiting gracefully");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_settings(alerts_file: PathBuf) -> MonitorSettings {
        MonitorSettings {
            thresholds: ThresholdSettings {
                temperature_celsius: 90.0,
                pressure_bar: 120.0,
                vibration_mm_s: 5.0,
            },
            read_interval_seconds: 1,
            alerts_enabled: true,
            alerts_file,
            debounce_seconds: 2,
            max_jitter: 1.0,
        }
    }

    fn safe_reading() -> AssetReading {
        AssetReading {
            temperature_celsius: 50.0,
            pressure_bar: 100.0,
            vibration_mm_s: 4.0,
        }
    }

    #[test]
    fn test_generate_reading_in_expected_ranges() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let r = generate_reading(&mut rng);
            assert!(r.temperature_celsius >= 65.0 && r.temperature_celsius < 95.0);
            assert!(r.pressure_bar >= 90.0 && r.pressure_bar < 130.0);
            assert!(r.vibration_mm_s >= 1.0 && r.vibration_mm_s < 8.0);
        }
    }

    #[test]
    fn test_apply_jitter_bounded() {
        let mut rng = rand::thread_rng();
        let reading = safe_reading();
        for _ in 0..100 {
            let jittered = apply_jitter(reading, 1.0, &mut rng).unwrap();
            assert!((jittered.temperature_celsius - reading.temperature_celsius).abs() <= 1.0);
            // Only the temperature channel is jittered
            assert_eq!(jittered.pressure_bar, reading.pressure_bar);
            assert_eq!(jittered.vibration_mm_s, reading.vibration_mm_s);
        }
    }

    #[test]
    fn test_apply_jitter_rejects_negative_max() {
        let mut rng = rand::thread_rng();
        assert!(apply_jitter(safe_reading(), -0.1, &mut rng).is_err());
    }

    #[test]
    fn test_apply_jitter_zero_is_identity() {
        let mut rng = rand::thread_rng();
        let reading = safe_reading();
        let jittered = apply_jitter(reading, 0.0, &mut rng).unwrap();
        assert_eq!(jittered, reading);
    }

    #[test]
    fn test_alert_triggers_per_metric() {
        let thresholds = ThresholdSettings::default();

        let mut over_temp = safe_reading();
        over_temp.temperature_celsius = 100.0;
        assert!(should_trigger_alert(&over_temp, &thresholds));

        let mut over_pressure = safe_reading();
        over_pressure.pressure_bar = 130.0;
        assert!(should_trigger_alert(&over_pressure, &thresholds));

        let mut over_vibration = safe_reading();
        over_vibration.vibration_mm_s = 6.0;
        assert!(should_trigger_alert(&over_vibration, &thresholds));

        assert!(!should_trigger_alert(&safe_reading(), &thresholds));
    }

    #[test]
    fn test_threshold_boundary_does_not_trigger() {
        // Exact-threshold values are not alerts
        let thresholds = ThresholdSettings::default();
        let at_boundary = AssetReading {
            temperature_celsius: thresholds.temperature_celsius,
            pressure_bar: thresholds.pressure_bar,
            vibration_mm_s: thresholds.vibration_mm_s,
        };
        assert!(!should_trigger_alert(&at_boundary, &thresholds));
    }

    #[test]
    fn test_evaluate_triggers_and_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let alerts_file = dir.path().join("alerts.log");
        let mut simulator = Simulator::new(test_settings(alerts_file.clone()));

        let mut reading = safe_reading();
        reading.temperature_celsius = 100.0;

        let alert = simulator.evaluate(reading, 1000.0).unwrap();
        let alert = alert.expect("expected an alert");
        assert!(alert.message.starts_with("ALERT"));
        assert!(alerts_file.exists());

        let content = std::fs::read_to_string(&alerts_file).unwrap();
        let record: AssetAlert = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(record.triggered_at, 1000.0);
        assert_eq!(record.reading.temperature_celsius, 100.0);
    }

    #[test]
    fn test_evaluate_respects_debounce() {
        let dir = tempfile::tempdir().unwrap();
        let mut simulator = Simulator::new(test_settings(dir.path().join("alerts.log")));

        let mut reading = safe_reading();
        reading.temperature_celsius = 100.0;

        let first = simulator.evaluate(reading, 1000.0).unwrap();
        assert!(first.is_some());

        // One second later, inside the 2s debounce window
        let second = simulator.evaluate(reading, 1001.0).unwrap();
        assert!(second.is_none());

        // Past the window
        let third = simulator.evaluate(reading, 1003.0).unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn test_evaluate_safe_reading_no_alert() {
        let dir = tempfile::tempdir().unwrap();
        let alerts_file = dir.path().join("alerts.log");
        let mut simulator = Simulator::new(test_settings(alerts_file.clone()));

        let alert = simulator.evaluate(safe_reading(), 1000.0).unwrap();
        assert!(alert.is_none());
        assert!(!alerts_file.exists());
    }

    #[test]
    fn test_commands_drive_running_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut simulator = Simulator::new(test_settings(dir.path().join("alerts.log")));

        assert!(simulator.is_running());
        assert!(!simulator.handle_command(Command::Stop));
        assert!(!simulator.is_running());
        assert!(!simulator.handle_command(Command::Start));
        assert!(simulator.is_running());
        // Sample requests an immediate reading without changing run state
        simulator.handle_command(Command::Stop);
        assert!(simulator.handle_command(Command::Sample));
        assert!(!simulator.is_running());
    }

    #[test]
    fn test_command_envelope_decoding() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"namespace":"asset-monitor","type":"start"}"#).unwrap();
        assert_eq!(Command::from_envelope(&envelope), Some(Command::Start));

        let foreign: Envelope =
            serde_json::from_str(r#"{"namespace":"other","type":"start"}"#).unwrap();
        assert_eq!(Command::from_envelope(&foreign), None);

        let unknown: Envelope =
            serde_json::from_str(r#"{"namespace":"asset-monitor","type":"reset"}"#).unwrap();
        assert_eq!(Command::from_envelope(&unknown), None);
    }

    #[test]
    fn test_reading_envelope_shape() {
        let envelope = Envelope::reading(&safe_reading(), 1234.5);
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["namespace"], "asset-monitor");
        assert_eq!(json["type"], "reading");
        assert_eq!(json["payload"]["temperature_celsius"], 50.0);
        assert_eq!(json["payload"]["ts"], 1234.5);
    }

    #[test]
    fn test_write_alert_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("alerts.log");

        let alert = AssetAlert {
            message: "ALERT: test".to_string(),
            reading: safe_reading(),
            triggered_at: 1.0,
        };
        write_alert(&alert, &path).unwrap();
        write_alert(&alert, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
