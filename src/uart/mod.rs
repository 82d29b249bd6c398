// src/uart/mod.rs
//! Interrupt-safe byte transport

pub mod ring;
pub mod serial;
pub mod transport;

pub use ring::{RingBuffer, UART_BUFFER_SIZE};
pub use serial::{run_bridge, SerialDriver};
pub use transport::{
    InterruptHandler, LineErrors, Transport, TransportConfig, TransportStats, UartDriver,
    UartInterruptHandler, UartTransport,
};
