// src/uart/transport.rs
//! Byte stream transport between an interrupt-driven UART and application code
//!
//! The transport owns the consumer side of the receive ring and the producer
//! side of the transmit ring. The matching [`InterruptHandler`] owns the other
//! two halves and is driven from the interrupt (or the task standing in for it).

use super::ring::{Consumer, Producer, RingBuffer, UART_BUFFER_SIZE};
use crate::error::TransportError;
use log::{debug, warn};
use serde::Serialize;
use std::{
    io,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

/// Number of busy-wait iterations between yields while the transmit ring is full
const SPINS_PER_YIELD: u32 = 64;

/// Error conditions latched by the UART receiver
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineErrors {
    pub framing: bool,
    pub noise: bool,
    pub overrun: bool,
}

impl LineErrors {
    pub const FRAMING: Self = Self {
        framing: true,
        noise: false,
        overrun: false,
    };
    pub const NOISE: Self = Self {
        framing: false,
        noise: true,
        overrun: false,
    };
    pub const OVERRUN: Self = Self {
        framing: false,
        noise: false,
        overrun: true,
    };

    pub fn any(&self) -> bool {
        self.framing || self.noise || self.overrun
    }

    pub fn bits(&self) -> u8 {
        (self.framing as u8) | (self.noise as u8) << 1 | (self.overrun as u8) << 2
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            framing: bits & 0b001 != 0,
            noise: bits & 0b010 != 0,
            overrun: bits & 0b100 != 0,
        }
    }
}

/// Lock-free latch for [`LineErrors`], set from interrupt context and
/// cleared by the transport.
#[derive(Debug, Default)]
pub struct LineErrorLatch(AtomicU8);

impl LineErrorLatch {
    pub fn raise(&self, errors: LineErrors) {
        self.0.fetch_or(errors.bits(), Ordering::AcqRel);
    }

    pub fn peek(&self) -> LineErrors {
        LineErrors::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn clear(&self, errors: LineErrors) {
        self.0.fetch_and(!errors.bits(), Ordering::AcqRel);
    }
}

/// The UART peripheral as seen by the transport
pub trait UartDriver {
    fn enable_receive_interrupt(&self);

    /// Ask the peripheral to start (or keep) draining the transmit ring
    fn enable_transmit_interrupt(&self);

    /// Whether the peripheral can accept another byte right now
    fn byte_available_for_transmit(&self) -> bool;

    fn line_errors(&self) -> LineErrors;

    fn clear_line_errors(&self, errors: LineErrors);
}

impl<T: UartDriver + ?Sized> UartDriver for Arc<T> {
    fn enable_receive_interrupt(&self) {
        (**self).enable_receive_interrupt()
    }

    fn enable_transmit_interrupt(&self) {
        (**self).enable_transmit_interrupt()
    }

    fn byte_available_for_transmit(&self) -> bool {
        (**self).byte_available_for_transmit()
    }

    fn line_errors(&self) -> LineErrors {
        (**self).line_errors()
    }

    fn clear_line_errors(&self, errors: LineErrors) {
        (**self).clear_line_errors(errors)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransportConfig {
    /// Upper bound for `write_byte` to wait on a full transmit ring.
    /// `None` spins until the interrupt side frees a slot.
    pub write_timeout: Option<Duration>,
}

/// Snapshot of transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    pub rx_available: usize,
    pub rx_dropped: usize,
    pub tx_pending: usize,
    pub tx_dropped: usize,
    pub line_error_resets: usize,
}

pub type UartTransport<D> = Transport<D, UART_BUFFER_SIZE, UART_BUFFER_SIZE>;
pub type UartInterruptHandler = InterruptHandler<UART_BUFFER_SIZE, UART_BUFFER_SIZE>;

pub struct Transport<D, const RX: usize, const TX: usize> {
    driver: D,
    rx: Consumer<RX>,
    tx: Producer<TX>,
    config: TransportConfig,
    line_error_resets: usize,
}

impl<D: UartDriver, const RX: usize, const TX: usize> Transport<D, RX, TX> {
    /// Build both rings, clear any stale line errors and enable reception.
    pub fn new(driver: D, config: TransportConfig) -> (Self, InterruptHandler<RX, TX>) {
        let (rx_send, rx_recv) = RingBuffer::<RX>::new().split();
        let (tx_send, tx_recv) = RingBuffer::<TX>::new().split();

        let mut transport = Self {
            driver,
            rx: rx_recv,
            tx: tx_send,
            config,
            line_error_resets: 0,
        };
        transport.service_line_errors();
        transport.driver.enable_receive_interrupt();

        let handler = InterruptHandler {
            rx: rx_send,
            tx: tx_recv,
        };
        (transport, handler)
    }

    /// Next received byte, or `None` if nothing is queued
    pub fn read_byte(&mut self) -> Option<u8> {
        self.service_line_errors();
        self.rx.pop()
    }

    /// Queue one byte for transmission, waiting while the transmit ring is full.
    ///
    /// On timeout the byte gets one last push attempt; if the ring is still
    /// full it is counted as dropped.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        let _ = self.wait_for(|tx| !tx.is_full());

        if !self.tx.push(byte) {
            debug!("transmit timed out, dropped byte {:#04x}", byte);
            return Err(TransportError::Timeout);
        }
        self.driver.enable_transmit_interrupt();
        Ok(())
    }

    /// Wait until the interrupt side has taken every queued byte.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.wait_for(|tx| tx.is_empty())
    }

    pub fn write_str(&mut self, text: &str) -> Result<(), TransportError> {
        for b in text.bytes() {
            self.write_byte(b)?;
        }
        Ok(())
    }

    pub fn available_to_read(&self) -> usize {
        self.rx.available()
    }

    pub fn tx_pending(&self) -> usize {
        self.tx.available()
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            rx_available: self.rx.available(),
            rx_dropped: self.rx.dropped(),
            tx_pending: self.tx.available(),
            tx_dropped: self.tx.dropped(),
            line_error_resets: self.line_error_resets,
        }
    }

    /// Clear latched line errors and throw away whatever was received with
    /// them. The transmit ring is left alone.
    pub fn service_line_errors(&mut self) -> bool {
        let errors = self.driver.line_errors();
        if !errors.any() {
            return false;
        }

        self.driver.clear_line_errors(errors);
        let discarded = self.rx.available();
        self.rx.reset();
        self.line_error_resets += 1;
        warn!("UART line error {:?}, discarded {} received bytes", errors, discarded);
        true
    }

    // Spin until `ready` holds for the transmit ring, bounded by the write timeout
    fn wait_for(&mut self, ready: impl Fn(&Producer<TX>) -> bool) -> Result<(), TransportError> {
        if ready(&self.tx) {
            return Ok(());
        }

        let started = Instant::now();
        let mut spins = 0u32;

        debug!("waiting for the UART to drain the transmit buffer");
        while !ready(&self.tx) {
            if let Some(limit) = self.config.write_timeout {
                if started.elapsed() >= limit {
                    return Err(TransportError::Timeout);
                }
            }

            self.driver.enable_transmit_interrupt();
            spins = spins.wrapping_add(1);
            if spins % SPINS_PER_YIELD == 0 {
                thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
        Ok(())
    }
}

impl<D: UartDriver, const RX: usize, const TX: usize> io::Write for Transport<D, RX, TX> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for (written, &b) in buf.iter().enumerate() {
            if let Err(e) = self.write_byte(b) {
                if written > 0 {
                    return Ok(written);
                }
                return Err(io::Error::new(io::ErrorKind::TimedOut, e));
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Transport::flush(self).map_err(|e| io::Error::new(io::ErrorKind::TimedOut, e))
    }
}

/// Interrupt-side halves of a [`Transport`]
pub struct InterruptHandler<const RX: usize, const TX: usize> {
    rx: Producer<RX>,
    tx: Consumer<TX>,
}

impl<const RX: usize, const TX: usize> InterruptHandler<RX, TX> {
    /// Store a received byte; `false` if the receive ring was full and the
    /// byte was dropped.
    pub fn on_receive(&mut self, byte: u8) -> bool {
        self.rx.push(byte)
    }

    /// Next byte to hand to the transmitter
    pub fn on_transmit_ready(&mut self) -> Option<u8> {
        self.tx.pop()
    }

    pub fn has_pending_transmit(&self) -> bool {
        !self.tx.is_empty()
    }

    /// Move bytes to `sink` for as long as the peripheral can take them.
    pub fn drain_transmit<D: UartDriver>(&mut self, driver: &D, mut sink: impl FnMut(u8)) -> usize {
        let mut sent = 0;
        while driver.byte_available_for_transmit() {
            match self.tx.pop() {
                Some(b) => {
                    sink(b);
                    sent += 1;
                }
                None => break,
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::Write,
        sync::atomic::{AtomicBool, AtomicUsize},
    };

    #[derive(Default)]
    struct TestDriver {
        rx_enabled: AtomicBool,
        tx_enables: AtomicUsize,
        tx_blocked: AtomicBool,
        errors: LineErrorLatch,
    }

    impl UartDriver for TestDriver {
        fn enable_receive_interrupt(&self) {
            self.rx_enabled.store(true, Ordering::SeqCst);
        }

        fn enable_transmit_interrupt(&self) {
            self.tx_enables.fetch_add(1, Ordering::SeqCst);
        }

        fn byte_available_for_transmit(&self) -> bool {
            !self.tx_blocked.load(Ordering::SeqCst)
        }

        fn line_errors(&self) -> LineErrors {
            self.errors.peek()
        }

        fn clear_line_errors(&self, errors: LineErrors) {
            self.errors.clear(errors)
        }
    }

    fn small(
        driver: Arc<TestDriver>,
    ) -> (Transport<Arc<TestDriver>, 8, 4>, InterruptHandler<8, 4>) {
        Transport::new(
            driver,
            TransportConfig {
                write_timeout: Some(Duration::from_millis(20)),
            },
        )
    }

    #[test]
    fn test_new_enables_receive_and_clears_stale_errors() {
        let driver = Arc::new(TestDriver::default());
        driver.errors.raise(LineErrors::OVERRUN);

        let (transport, _handler) = small(Arc::clone(&driver));

        assert!(driver.rx_enabled.load(Ordering::SeqCst));
        assert!(!driver.line_errors().any());
        assert_eq!(transport.stats().line_error_resets, 1);
    }

    #[test]
    fn test_read_is_non_blocking() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, mut handler) = small(driver);

        assert_eq!(transport.read_byte(), None);
        assert!(handler.on_receive(b'$'));
        assert!(handler.on_receive(b'G'));
        assert_eq!(transport.available_to_read(), 2);
        assert_eq!(transport.read_byte(), Some(b'$'));
        assert_eq!(transport.read_byte(), Some(b'G'));
        assert_eq!(transport.read_byte(), None);
    }

    #[test]
    fn test_receive_overflow_is_counted() {
        let driver = Arc::new(TestDriver::default());
        let (transport, mut handler) = small(driver);

        for b in 0..10u8 {
            handler.on_receive(b);
        }
        let stats = transport.stats();
        assert_eq!(stats.rx_available, 7);
        assert_eq!(stats.rx_dropped, 3);
    }

    #[test]
    fn test_write_enables_transmit_interrupt() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, mut handler) = small(Arc::clone(&driver));

        transport.write_str("ok").unwrap();
        assert_eq!(driver.tx_enables.load(Ordering::SeqCst), 2);
        assert!(handler.has_pending_transmit());

        let mut sent = Vec::new();
        assert_eq!(handler.drain_transmit(&*driver, |b| sent.push(b)), 2);
        assert_eq!(sent, b"ok");
        assert_eq!(handler.on_transmit_ready(), None);
    }

    #[test]
    fn test_drain_respects_transmitter_readiness() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, mut handler) = small(Arc::clone(&driver));

        transport.write_byte(b'x').unwrap();
        driver.tx_blocked.store(true, Ordering::SeqCst);
        assert_eq!(handler.drain_transmit(&*driver, |_| panic!("transmitter busy")), 0);
        assert_eq!(transport.tx_pending(), 1);
    }

    #[test]
    fn test_write_times_out_on_full_buffer() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, _handler) = small(driver);

        transport.write_str("abc").unwrap();
        assert_eq!(transport.write_byte(b'd'), Err(TransportError::Timeout));
        assert_eq!(transport.tx_pending(), 3);
        assert_eq!(transport.stats().tx_dropped, 1);
    }

    #[test]
    fn test_flush_waits_for_drain() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, mut handler): (Transport<_, 8, 4>, _) =
            Transport::new(Arc::clone(&driver), TransportConfig::default());

        let drainer = thread::spawn(move || {
            let mut out = Vec::new();
            while out.len() < 3 {
                thread::sleep(Duration::from_millis(1));
                if let Some(b) = handler.on_transmit_ready() {
                    out.push(b);
                }
            }
            out
        });

        transport.write_all(b"abc").unwrap();
        Write::flush(&mut transport).unwrap();
        assert_eq!(transport.tx_pending(), 0);
        assert_eq!(drainer.join().unwrap(), b"abc");
    }

    #[test]
    fn test_flush_times_out_while_bytes_pending() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, mut handler) = small(driver);

        transport.write_all(b"abc").unwrap();
        let err = Write::flush(&mut transport).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(transport.flush(), Err(TransportError::Timeout));
        assert_eq!(transport.tx_pending(), 3);

        while handler.on_transmit_ready().is_some() {}
        assert_eq!(transport.flush(), Ok(()));
    }

    #[test]
    fn test_write_waits_for_drain() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, mut handler): (Transport<_, 8, 4>, _) =
            Transport::new(Arc::clone(&driver), TransportConfig::default());

        let drainer = thread::spawn(move || {
            let mut out = Vec::new();
            while out.len() < 10 {
                if let Some(b) = handler.on_transmit_ready() {
                    out.push(b);
                } else {
                    thread::yield_now();
                }
            }
            out
        });

        transport.write_str("0123456789").unwrap();
        assert_eq!(drainer.join().unwrap(), b"0123456789");
    }

    #[test]
    fn test_line_error_resets_only_receive() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, mut handler) = small(Arc::clone(&driver));

        handler.on_receive(b'x');
        handler.on_receive(b'y');
        transport.write_byte(b'z').unwrap();

        driver.errors.raise(LineErrors::FRAMING);
        assert_eq!(transport.read_byte(), None);
        assert_eq!(transport.available_to_read(), 0);
        assert_eq!(transport.tx_pending(), 1);
        assert!(!driver.line_errors().any());

        handler.on_receive(b'$');
        assert_eq!(transport.read_byte(), Some(b'$'));
        assert_eq!(handler.on_transmit_ready(), Some(b'z'));
    }

    #[test]
    fn test_io_write_reports_timeout() {
        let driver = Arc::new(TestDriver::default());
        let (mut transport, _handler) = small(driver);

        assert_eq!(transport.write(b"abcdef").unwrap(), 3);
        let err = transport.write(b"g").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(transport.stats().tx_dropped, 2);
    }

    #[test]
    fn test_line_error_bits() {
        let all = LineErrors {
            framing: true,
            noise: true,
            overrun: true,
        };
        assert_eq!(LineErrors::from_bits(all.bits()), all);
        assert_eq!(LineErrors::from_bits(0), LineErrors::default());
        assert!(!LineErrors::default().any());
    }
}
