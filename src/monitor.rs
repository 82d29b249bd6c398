// src/monitor.rs
//! Main GPS monitor coordination
//!
//! A bridge task stands in for the UART interrupt and fills the receive ring;
//! a blocking application loop polls the transport, assembles lines and
//! decodes them into the shared [`MonitorState`].

use crate::{
    display::terminal::TerminalDisplay,
    error::{GpsError, Result},
    gps::{nmea, DecodeOptions, GpsRecord, LineAssembler},
    uart::{run_bridge, SerialDriver, TransportConfig, TransportStats, UartDriver, UartTransport},
};
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock, RwLockWriteGuard,
    },
    thread,
    time::Duration,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;

/// How long the application loop sleeps when the receive ring is empty
const POLL_INTERVAL: Duration = Duration::from_millis(5);
const RAW_HISTORY_LEN: usize = 5;

/// GPS data source configuration
#[derive(Debug, Clone)]
pub enum GpsSource {
    Serial { port: String, baudrate: u32 },
    /// Recorded NMEA log fed through the transport at `baudrate`
    Replay { path: PathBuf, baudrate: u32 },
}

/// Everything the display needs, updated by the application loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorState {
    pub record: GpsRecord,
    pub last_update: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub raw_data: String,
    pub raw_history: Vec<String>,
    pub sentences_decoded: usize,
    pub decode_errors: usize,
    pub last_error: Option<String>,
    pub transport: TransportStats,
    pub line_overflows: usize,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the age of the GPS data in seconds
    pub fn age_seconds(&self) -> Option<i64> {
        self.last_update
            .map(|ts| Utc::now().signed_duration_since(ts).num_seconds())
    }

    /// Check if the GPS data is recent (within 10 seconds)
    pub fn is_recent(&self) -> bool {
        self.age_seconds().map_or(false, |age| age < 10)
    }

    /// Update the timestamp to now
    pub fn update_timestamp(&mut self) {
        self.last_update = Some(Utc::now());
    }

    /// Set the data source
    pub fn set_source(&mut self, source: &str) {
        self.source = Some(source.to_string());
    }

    /// Add a raw NMEA sentence to history (keep last 5)
    pub fn add_raw_sentence(&mut self, sentence: &str) {
        self.raw_data = sentence.to_string();
        self.raw_history.push(sentence.to_string());

        if self.raw_history.len() > RAW_HISTORY_LEN {
            self.raw_history.remove(0);
        }
    }

    /// Decode one assembled line into the record and update the counters
    pub fn apply_sentence(&mut self, line: &str, options: &DecodeOptions) {
        self.add_raw_sentence(line);

        match nmea::update_record(&mut self.record, line, options) {
            Ok(Some(kind)) => {
                self.sentences_decoded += 1;
                self.update_timestamp();
                trace!("decoded {:?} sentence", kind);
            }
            Ok(None) => trace!("ignoring sentence {}", line),
            Err(e) => {
                self.decode_errors += 1;
                self.last_error = Some(format!("{}: {}", e, line));
                debug!("failed to decode {:?}: {}", line, e);
            }
        }
    }
}

/// Main GPS monitor that coordinates data collection and display
#[derive(Clone)]
pub struct GpsMonitor {
    state: Arc<RwLock<MonitorState>>,
    running: Arc<AtomicBool>,
    options: DecodeOptions,
    transport_config: TransportConfig,
    init_commands: Vec<String>,
}

impl GpsMonitor {
    /// Create a new GPS monitor
    pub fn new(options: DecodeOptions, transport_config: TransportConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(MonitorState::new())),
            running: Arc::new(AtomicBool::new(true)),
            options,
            transport_config,
            init_commands: Vec::new(),
        }
    }

    /// Sentences to send to the receiver once the link is up
    pub fn with_init_commands(mut self, commands: Vec<String>) -> Self {
        self.init_commands = commands;
        self
    }

    /// Start monitoring GPS data from the specified source
    pub async fn start(&self, source: GpsSource) -> Result<()> {
        match source {
            GpsSource::Serial { port, baudrate } => self.connect_serial(&port, baudrate).await,
            GpsSource::Replay { path, baudrate } => self.replay_file(path, baudrate).await,
        }
    }

    /// Start the display
    pub async fn run_display(&self, refresh: Duration) -> Result<()> {
        let terminal_display = TerminalDisplay::new(refresh);
        terminal_display
            .run(Arc::clone(&self.state), Arc::clone(&self.running))
            .await
    }

    /// Connect to a GPS device via serial port
    async fn connect_serial(&self, port: &str, baudrate: u32) -> Result<()> {
        info!("Connecting to GPS on {} at {} baud...", port, baudrate);

        let serial = tokio_serial::new(port, baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| {
                GpsError::Connection(format!("Failed to open serial port {}: {}", port, e))
            })?;

        info!("Connected successfully!");
        let (reader, writer) = tokio::io::split(serial);
        self.attach(reader, writer, None, "Serial GPS");
        Ok(())
    }

    /// Feed a captured NMEA log through the same transport as a live port
    async fn replay_file(&self, path: PathBuf, baudrate: u32) -> Result<()> {
        info!("Replaying {} at {} baud", path.display(), baudrate);

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| {
                GpsError::Connection(format!("Failed to open {}: {}", path.display(), e))
            })?;

        self.attach(file, tokio::io::sink(), Some(baudrate), "Replay");
        Ok(())
    }

    fn attach<R, W>(&self, reader: R, writer: W, pace_baud: Option<u32>, source: &str)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        write_state(&self.state).set_source(source);

        let driver = Arc::new(SerialDriver::new());
        let (transport, handler) = UartTransport::new(Arc::clone(&driver), self.transport_config);

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let bridge = run_bridge(reader, writer, handler, driver, running, pace_baud);
            if let Err(e) = bridge.await {
                warn!("Serial link stopped: {}", e);
            }
        });

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let options = self.options;
        let commands = self.init_commands.clone();
        tokio::task::spawn_blocking(move || {
            poll_loop(transport, state, running, options, commands)
        });
    }

    /// Stop the monitor
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Get a clone of the current state
    pub fn get_state(&self) -> MonitorState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Application side: drain the receive ring into complete sentences until
/// `running` is cleared.
pub fn poll_loop<D: UartDriver>(
    mut transport: UartTransport<D>,
    state: Arc<RwLock<MonitorState>>,
    running: Arc<AtomicBool>,
    options: DecodeOptions,
    commands: Vec<String>,
) {
    let mut assembler = LineAssembler::new();

    for command in &commands {
        let framed = if command.ends_with("\r\n") {
            command.clone()
        } else {
            format!("{}\r\n", command)
        };
        match transport.write_str(&framed) {
            Ok(()) => debug!("sent {}", command),
            Err(e) => warn!("could not send {}: {}", command, e),
        }
    }

    while running.load(Ordering::Relaxed) {
        if process_available(&mut transport, &mut assembler, &state, &options) == 0 {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Consume every byte currently queued, returning how many were read.
pub fn process_available<D: UartDriver>(
    transport: &mut UartTransport<D>,
    assembler: &mut LineAssembler,
    state: &RwLock<MonitorState>,
    options: &DecodeOptions,
) -> usize {
    let mut read = 0;
    let mut lines = Vec::new();

    while let Some(b) = transport.read_byte() {
        read += 1;
        if let Some(line) = assembler.push(b) {
            lines.push(line);
        }
    }

    let mut guard = write_state(state);
    for line in &lines {
        guard.apply_sentence(line, options);
    }
    guard.transport = transport.stats();
    guard.line_overflows = assembler.overflows();
    read
}

fn write_state(state: &RwLock<MonitorState>) -> RwLockWriteGuard<'_, MonitorState> {
    match state.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// List available serial ports
pub async fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| GpsError::Other(format!("Failed to list serial ports: {}", e)))?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::RmcLayout;
    use crate::uart::LineErrors;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

    fn standard() -> DecodeOptions {
        DecodeOptions {
            rmc_layout: RmcLayout::Standard,
            ..Default::default()
        }
    }

    #[test]
    fn test_process_available_decodes_lines() {
        let driver = Arc::new(SerialDriver::new());
        let (mut transport, mut handler) = UartTransport::new(driver, TransportConfig::default());
        let state = RwLock::new(MonitorState::new());
        let mut assembler = LineAssembler::new();

        let input = format!("{}{}$GPGSV,3,1\r\n$GPGGA,12\r\n", GGA, RMC);
        for b in input.bytes() {
            assert!(handler.on_receive(b));
        }

        let read = process_available(&mut transport, &mut assembler, &state, &standard());
        assert_eq!(read, GGA.len() + RMC.len() + 23);

        let state = state.into_inner().unwrap();
        assert_eq!(state.sentences_decoded, 2);
        assert_eq!(state.decode_errors, 1);
        assert_eq!(state.record.gga.satellites, 8);
        assert_eq!(state.record.gga.altitude.altitude, 545_400);
        assert_eq!(state.record.rmc.speed_knots, 22_400);
        assert_eq!(state.raw_history.len(), 4);
        assert_eq!(state.raw_data, "$GPGGA,12");
        assert!(state.last_error.is_some());
        assert!(state.is_recent());
    }

    #[test]
    fn test_line_error_drops_partial_sentence() {
        let driver = Arc::new(SerialDriver::new());
        let (mut transport, mut handler) =
            UartTransport::new(Arc::clone(&driver), TransportConfig::default());
        let state = RwLock::new(MonitorState::new());
        let mut assembler = LineAssembler::new();

        for b in "$GPGGA,1235".bytes() {
            handler.on_receive(b);
        }
        driver.raise_line_errors(LineErrors::NOISE);
        process_available(&mut transport, &mut assembler, &state, &standard());

        for b in GGA.bytes() {
            handler.on_receive(b);
        }
        process_available(&mut transport, &mut assembler, &state, &standard());

        let state = state.into_inner().unwrap();
        assert_eq!(state.transport.line_error_resets, 1);
        assert_eq!(state.sentences_decoded, 1);
        assert_eq!(state.decode_errors, 0);
    }

    #[test]
    fn test_raw_history_is_bounded() {
        let mut state = MonitorState::new();
        for i in 0..8 {
            state.add_raw_sentence(&format!("$GPTXT,{}", i));
        }
        assert_eq!(state.raw_history.len(), RAW_HISTORY_LEN);
        assert_eq!(state.raw_history[0], "$GPTXT,3");
        assert_eq!(state.raw_data, "$GPTXT,7");
    }

    #[tokio::test]
    async fn test_replay_source() {
        let path =
            std::env::temp_dir().join(format!("gps-stream-replay-{}.nmea", std::process::id()));
        std::fs::write(&path, format!("{}{}", GGA, RMC)).unwrap();

        let monitor = GpsMonitor::new(standard(), TransportConfig::default());
        monitor
            .start(GpsSource::Replay {
                path: path.clone(),
                baudrate: 115_200,
            })
            .await
            .unwrap();

        let mut decoded = 0;
        for _ in 0..200 {
            decoded = monitor.get_state().sentences_decoded;
            if decoded == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        monitor.stop();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(decoded, 2);
        let state = monitor.get_state();
        assert_eq!(state.source.as_deref(), Some("Replay"));
        assert_eq!(state.record.rmc.course, 8_440);
        assert!(state.record.timestamp().is_some());
    }

    #[tokio::test]
    async fn test_missing_replay_file_is_connection_error() {
        let monitor = GpsMonitor::new(DecodeOptions::default(), TransportConfig::default());
        let err = monitor
            .start(GpsSource::Replay {
                path: PathBuf::from("/nonexistent/gps-stream.nmea"),
                baudrate: 9600,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GpsError::Connection(_)));
    }
}
