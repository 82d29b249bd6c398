// src/main.rs
//! GPS Stream - serial NMEA monitor and decoder

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use gps_stream::{
    config::GpsConfig,
    gps::{init_gps_record, update_record},
    monitor::{list_serial_ports, GpsMonitor, GpsSource},
    DecodeOptions, RmcLayout,
};
use log::{info, warn};
use std::{io::BufRead, path::PathBuf};

#[derive(Parser)]
#[command(name = "gps-stream", version, about = "Serial NMEA GGA/RMC monitor")]
struct Cli {
    /// Configuration file (defaults to the per-user config path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a serial GPS receiver and show the decoded fix
    Monitor {
        #[arg(short, long)]
        port: Option<String>,
        #[arg(short, long)]
        baud: Option<u32>,
        /// Sentence to send after connecting, may be repeated
        #[arg(short, long)]
        send: Vec<String>,
        /// Remember the port and baud rate in the config file
        #[arg(long)]
        save: bool,
    },
    /// Play back a captured NMEA log through the transport
    Replay {
        file: PathBuf,
        #[arg(short, long, default_value_t = 9600)]
        baud: u32,
    },
    /// Decode sentences given as arguments (or stdin) and print the record as JSON
    Decode {
        sentences: Vec<String>,
        #[arg(long)]
        strict: bool,
        #[arg(long, value_enum)]
        layout: Option<Layout>,
    },
    /// List available serial ports
    Ports,
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    Compact,
    Standard,
}

impl From<Layout> for RmcLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Compact => RmcLayout::Compact,
            Layout::Standard => RmcLayout::Standard,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn,gps_stream=info"))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => GpsConfig::load_from(path)?,
        None => GpsConfig::load().unwrap_or_else(|e| {
            warn!("Using default configuration: {}", e);
            GpsConfig::default()
        }),
    };

    match cli.command {
        Command::Monitor { port, baud, send, save } => {
            let port = port
                .or_else(|| config.serial_port.clone())
                .context("no serial port given and none configured")?;
            let baudrate = baud.unwrap_or(config.serial_baudrate);

            if save {
                config.update_serial(port.clone(), baudrate);
                match &cli.config {
                    Some(path) => config.save_to(path)?,
                    None => config.save()?,
                }
                info!("Saved serial settings");
            }

            let mut commands = config.init_commands.clone();
            commands.extend(send);

            let monitor = GpsMonitor::new(config.decode_options(), config.transport_config())
                .with_init_commands(commands);
            monitor.start(GpsSource::Serial { port, baudrate }).await?;
            monitor.run_display(config.refresh_interval()).await?;
            monitor.stop();
        }
        Command::Replay { file, baud } => {
            let monitor = GpsMonitor::new(config.decode_options(), config.transport_config());
            monitor
                .start(GpsSource::Replay { path: file, baudrate: baud })
                .await?;
            monitor.run_display(config.refresh_interval()).await?;
            monitor.stop();
        }
        Command::Decode { sentences, strict, layout } => {
            let mut options: DecodeOptions = config.decode_options();
            options.strict |= strict;
            if let Some(layout) = layout {
                options.rmc_layout = layout.into();
            }

            let sentences = if sentences.is_empty() {
                std::io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?
            } else {
                sentences
            };

            let mut record = init_gps_record();
            for sentence in sentences.iter().filter(|s| !s.trim().is_empty()) {
                if let Err(e) = update_record(&mut record, sentence, &options) {
                    warn!("{}: {}", e, sentence.trim());
                }
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Ports => list_serial_ports().await?,
    }

    Ok(())
}
