// src/uart/serial.rs
//! Host-side stand-in for the UART interrupt
//!
//! On a desktop there is no receive interrupt, so a tokio task plays its part:
//! it reads the serial port into the receive ring and drains the transmit ring
//! whenever the transport asks for the transmit interrupt.

use super::transport::{LineErrorLatch, LineErrors, UartDriver, UartInterruptHandler};
use log::{debug, info, warn};
use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Notify,
    time::sleep,
};

const READ_CHUNK: usize = 64;
const IDLE_CHECK: Duration = Duration::from_millis(200);

/// Driver for a serial port or a replayed capture
#[derive(Debug, Default)]
pub struct SerialDriver {
    rx_enabled: AtomicBool,
    tx_wake: Notify,
    errors: LineErrorLatch,
}

impl SerialDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive_enabled(&self) -> bool {
        self.rx_enabled.load(Ordering::Acquire)
    }

    pub fn raise_line_errors(&self, errors: LineErrors) {
        self.errors.raise(errors)
    }

    /// Map a failed port read onto the receiver error it most resembles
    pub fn line_errors_for(error: &io::Error) -> LineErrors {
        match error.kind() {
            io::ErrorKind::InvalidData => LineErrors::FRAMING,
            _ => LineErrors::OVERRUN,
        }
    }
}

impl UartDriver for SerialDriver {
    fn enable_receive_interrupt(&self) {
        self.rx_enabled.store(true, Ordering::Release);
    }

    fn enable_transmit_interrupt(&self) {
        self.tx_wake.notify_one();
    }

    fn byte_available_for_transmit(&self) -> bool {
        // write_all below applies the port's own back-pressure
        true
    }

    fn line_errors(&self) -> LineErrors {
        self.errors.peek()
    }

    fn clear_line_errors(&self, errors: LineErrors) {
        self.errors.clear(errors)
    }
}

/// Pump bytes between a port and the interrupt half of a transport until the
/// port closes or `running` is cleared.
///
/// `pace_baud` throttles reads to the given line rate, which keeps a replayed
/// file from outrunning the receive ring.
pub async fn run_bridge<R, W>(
    mut reader: R,
    mut writer: W,
    mut handler: UartInterruptHandler,
    driver: Arc<SerialDriver>,
    running: Arc<AtomicBool>,
    pace_baud: Option<u32>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    let mut out = Vec::with_capacity(READ_CHUNK);

    while running.load(Ordering::Relaxed) {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("serial input closed");
                    break;
                }
                Ok(n) => {
                    if !driver.receive_enabled() {
                        continue;
                    }
                    let dropped = buf[..n]
                        .iter()
                        .filter(|&&b| !handler.on_receive(b))
                        .count();
                    if dropped > 0 {
                        debug!("receive buffer full, dropped {} bytes", dropped);
                    }
                    if let Some(baud) = pace_baud.filter(|&b| b > 0) {
                        // 8N1: ten bit times per byte
                        let micros = n as u64 * 10_000_000 / baud as u64;
                        sleep(Duration::from_micros(micros)).await;
                    }
                }
                Err(e) => match e.kind() {
                    io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock => {}
                    io::ErrorKind::InvalidData => {
                        warn!("serial read error: {}", e);
                        driver.raise_line_errors(SerialDriver::line_errors_for(&e));
                    }
                    _ => {
                        driver.raise_line_errors(SerialDriver::line_errors_for(&e));
                        return Err(e);
                    }
                },
            },
            _ = driver.tx_wake.notified() => {
                if handler.has_pending_transmit() {
                    out.clear();
                    handler.drain_transmit(&*driver, |b| out.push(b));
                    writer.write_all(&out).await?;
                    writer.flush().await?;
                }
            },
            _ = sleep(IDLE_CHECK) => {}
        }
    }

    Ok(())
}
