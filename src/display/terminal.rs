// src/display/terminal.rs
//! Terminal-based display implementation

use crate::{
    error::Result,
    gps::{GgaFix, Location, RmcFix},
    monitor::MonitorState,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use log::warn;
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::time::sleep;

pub struct TerminalDisplay {
    refresh: Duration,
}

impl TerminalDisplay {
    pub fn new(refresh: Duration) -> Self {
        Self { refresh }
    }

    /// Start the terminal display loop
    pub async fn run(
        &self,
        state: Arc<RwLock<MonitorState>>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        // Set up Ctrl+C handler
        let running_clone = Arc::clone(&running);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for Ctrl+C: {}", e);
            }
            running_clone.store(false, Ordering::Relaxed);
        });

        while running.load(Ordering::Relaxed) {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;

            let snapshot = match state.read() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            self.render_display(&mut stdout, &snapshot)?;

            stdout.flush()?;
            sleep(self.refresh).await;
        }

        execute!(stdout, Show, EnableLineWrap)?;
        println!("\nShutting down...");
        Ok(())
    }

    /// Render the monitor state to the terminal
    pub fn render_display(&self, stdout: &mut impl Write, state: &MonitorState) -> Result<()> {
        // Header
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("GPS Stream - NMEA GGA/RMC Monitor"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;

        let timestamp_str = match state.record.timestamp() {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => "No fix time".to_string(),
        };
        let age_str = match state.age_seconds() {
            Some(age) => format!("{}s ago", age),
            None => "never".to_string(),
        };
        let source_str = state.source.as_deref().unwrap_or("Unknown");
        execute!(
            stdout,
            Print(format!(
                "GPS Time: {}  Updated: {} ({})\n\n",
                timestamp_str, age_str, source_str
            ))
        )?;

        self.render_position_section(stdout, &state.record.gga)?;
        self.render_movement_section(stdout, &state.record.rmc)?;
        self.render_quality_section(stdout, &state.record.gga, &state.record.rmc)?;
        self.render_link_section(stdout, state)?;
        self.render_raw_data_section(stdout, state)?;

        // Footer
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Press Ctrl+C to exit"),
            Print("\n"),
            ResetColor
        )?;

        Ok(())
    }

    fn render_position_section(&self, stdout: &mut impl Write, gga: &GgaFix) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("POSITION:\n"),
            ResetColor
        )?;

        execute!(
            stdout,
            Print(format!("  Latitude:  {}\n", format_latitude(&gga.location))),
            Print(format!("  Longitude: {}\n", format_longitude(&gga.location))),
            Print(format!(
                "  Altitude:  {:>12.3} {}\n\n",
                gga.altitude.metres(),
                unit_label(gga.altitude.unit)
            ))
        )?;
        Ok(())
    }

    fn render_movement_section(&self, stdout: &mut impl Write, rmc: &RmcFix) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("MOVEMENT:\n"),
            ResetColor
        )?;

        execute!(
            stdout,
            Print(format!(
                "  Speed:     {:>12.3} kn ({:.1} km/h)\n",
                rmc.speed_knots_f64(),
                rmc.speed_kmh()
            )),
            Print(format!("  Course:    {:>12.2} °\n\n", rmc.course_degrees()))
        )?;
        Ok(())
    }

    fn render_quality_section(
        &self,
        stdout: &mut impl Write,
        gga: &GgaFix,
        rmc: &RmcFix,
    ) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Magenta),
            Print("QUALITY:\n"),
            ResetColor
        )?;

        let status = if rmc.data_valid { "Valid" } else { "Void" };
        let fix_color = if gga.has_fix() { Color::Green } else { Color::Red };
        execute!(
            stdout,
            Print(format!("  Satellites: {:>11}\n", gga.satellites)),
            Print("  Fix Type:   "),
            SetForegroundColor(fix_color),
            Print(format!("{:>11}\n", gga.fix_description())),
            ResetColor,
            Print(format!("  Status:     {:>11}\n\n", status))
        )?;
        Ok(())
    }

    fn render_link_section(&self, stdout: &mut impl Write, state: &MonitorState) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::DarkYellow),
            Print("LINK:\n"),
            ResetColor
        )?;

        let stats = &state.transport;
        execute!(
            stdout,
            Print(format!(
                "  Sentences:  {} decoded, {} rejected, {} overlong\n",
                state.sentences_decoded, state.decode_errors, state.line_overflows
            )),
            Print(format!(
                "  RX:         {} queued, {} dropped, {} line errors\n",
                stats.rx_available, stats.rx_dropped, stats.line_error_resets
            )),
            Print(format!(
                "  TX:         {} pending, {} dropped\n",
                stats.tx_pending, stats.tx_dropped
            ))
        )?;

        if let Some(err) = &state.last_error {
            execute!(
                stdout,
                SetForegroundColor(Color::Red),
                Print(format!("  Last error: {}\n", err)),
                ResetColor
            )?;
        }

        execute!(stdout, Print("\n"))?;
        Ok(())
    }

    fn render_raw_data_section(&self, stdout: &mut impl Write, state: &MonitorState) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Blue),
            Print("RAW DATA:\n"),
            ResetColor
        )?;

        if state.raw_history.is_empty() {
            execute!(stdout, Print("  No data\n"))?;
        }
        for line in &state.raw_history {
            execute!(stdout, Print(format!("  {}\n", line)))?;
        }

        execute!(stdout, Print("\n"))?;
        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

fn format_latitude(location: &Location) -> String {
    format_coordinate(location.latitude_degrees(), location.ns)
}

fn format_longitude(location: &Location) -> String {
    format_coordinate(location.longitude_degrees(), location.ew)
}

fn format_coordinate(degrees: f64, hemisphere: char) -> String {
    let hemisphere = if hemisphere == '\0' { '-' } else { hemisphere };
    format!("{:>12.7}° {}", degrees.abs(), hemisphere)
}

fn unit_label(unit: char) -> String {
    match unit {
        'M' => "m".to_string(),
        '\0' => String::new(),
        other => other.to_string(),
    }
}
