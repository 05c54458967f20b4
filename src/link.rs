//! The serial link between the laptop and its peripheral controller.
//!
//! The print engine only talks to the printer through the primitives of
//! [`Link`]. Framed packets go through a shared transmit buffer whose length
//! is part of the link contract; [`TxPacket`] loads it for one send and
//! empties it again however the send ends.

use log::{debug, trace};
use std::time::Duration;

use crate::error::Error;

/// Query the attached printer model.
pub const CMD_PRINTER_QUERY: u8 = 0x09;
/// Send a framed packet of print data.
pub const CMD_PRINT_SEND_BYTES: u8 = 0x11;

/// Acknowledge of each byte of a framed packet but the last.
pub const REPLY_SEND_BUFFER_OK: u8 = 0x03;
/// Acknowledge of the checksum, ending a framed packet.
pub const REPLY_BUFFER_XFER_OK: u8 = 0x01;

/// Per byte reply timeout of the link protocol.
pub const LINK_TIMEOUT: Duration = Duration::from_millis(200);

/// Capacity of the shared transmit buffer.
pub const TX_BUF_SIZE: usize = 14;

/// Outgoing payload and its length, as handed to `send_cmd_and_buffer`.
#[derive(Debug, Clone, Copy)]
pub struct TxBuffer {
    data: [u8; TX_BUF_SIZE],
    len: usize,
}

impl Default for TxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TxBuffer {
    pub fn new() -> Self {
        TxBuffer {
            data: [0; TX_BUF_SIZE],
            len: 0,
        }
    }

    /// Replace the contents with `payload`.
    ///
    /// A payload longer than [`TX_BUF_SIZE`] is refused and the buffer is
    /// left as it was.
    pub fn load(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > TX_BUF_SIZE {
            return Err(Error::PayloadTooLong(payload.len()));
        }
        self.data[..payload.len()].copy_from_slice(payload);
        self.len = payload.len();
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// Byte level primitives of the peripheral link.
///
/// Implementations are not re-entrant; the engine serializes every call.
pub trait Link {
    /// Transmit one byte without waiting for a reply.
    fn send_byte(&mut self, byte: u8);

    /// Wait up to `timeout` for an incoming byte.
    ///
    /// Returns whether one arrived; its value is then in [`Link::rx_byte`].
    fn read_byte_with_timeout(&mut self, timeout: Duration) -> bool;

    /// The last byte received.
    fn rx_byte(&self) -> u8;

    /// The shared transmit buffer.
    fn tx_buf(&mut self) -> &mut TxBuffer;

    /// Send `cmd` followed by the transmit buffer as one framed packet.
    fn send_cmd_and_buffer(&mut self, cmd: u8) -> bool;

    /// Ask the controller which printer is attached, as a raw status code.
    fn printer_query(&mut self) -> u8;

    /// Drop bytes that arrived but were never read.
    ///
    /// Called before every exchange that reads a reply, so a late
    /// acknowledgement is never taken for the next one.
    fn discard_rx(&mut self) {}

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A loaded transmit buffer, emptied again on drop.
pub struct TxPacket<'a, L: Link + ?Sized> {
    link: &'a mut L,
}

impl<'a, L: Link + ?Sized> TxPacket<'a, L> {
    pub fn load(link: &'a mut L, payload: &[u8]) -> Result<Self, Error> {
        link.tx_buf().load(payload)?;
        Ok(TxPacket { link })
    }

    pub fn send(&mut self, cmd: u8) -> bool {
        self.link.send_cmd_and_buffer(cmd)
    }

    /// Send with up to `attempts` tries, pausing `delay` after each one.
    ///
    /// The controller firmware would otherwise block forever on a printer
    /// that stopped answering.
    pub fn send_with_retry(&mut self, cmd: u8, attempts: u8, delay: Duration) -> bool {
        for attempt in 1..=attempts {
            let sent = self.link.send_cmd_and_buffer(cmd);
            self.link.delay(delay);
            if sent {
                if attempt > 1 {
                    debug!("packet accepted on attempt {}", attempt);
                }
                return true;
            }
        }
        false
    }
}

impl<'a, L: Link + ?Sized> Drop for TxPacket<'a, L> {
    fn drop(&mut self) {
        self.link.tx_buf().clear();
    }
}

/// Send `byte` and require `expected` back within `timeout`.
pub fn send_byte_and_check_ack<L: Link + ?Sized>(
    link: &mut L,
    byte: u8,
    timeout: Duration,
    expected: u8,
) -> bool {
    link.send_byte(byte);
    if !link.read_byte_with_timeout(timeout) {
        trace!("no ack for {:#04X}", byte);
        return false;
    }
    if link.rx_byte() != expected {
        trace!(
            "ack for {:#04X} was {:#04X}, expected {:#04X}",
            byte,
            link.rx_byte(),
            expected
        );
        return false;
    }
    true
}

/// Checksum byte closing a framed packet: two's complement of the byte sum.
pub fn packet_checksum(cmd: u8, payload: &[u8]) -> u8 {
    let length = payload.len() as u8 + 2;
    let sum = payload
        .iter()
        .fold(cmd.wrapping_add(length), |sum, &b| sum.wrapping_add(b));
    sum.wrapping_neg()
}

/// Framed packet exchange over the byte primitives.
///
/// Wire order: command, length (payload + 2), payload, checksum. Every byte
/// is acknowledged with [`REPLY_SEND_BUFFER_OK`] except the checksum, which
/// gets [`REPLY_BUFFER_XFER_OK`].
pub fn send_framed<L: Link + ?Sized>(link: &mut L, cmd: u8) -> bool {
    link.discard_rx();
    let tx = *link.tx_buf();
    let payload = tx.as_slice();

    if !send_byte_and_check_ack(link, cmd, LINK_TIMEOUT, REPLY_SEND_BUFFER_OK) {
        return false;
    }
    let length = payload.len() as u8 + 2;
    if !send_byte_and_check_ack(link, length, LINK_TIMEOUT, REPLY_SEND_BUFFER_OK) {
        return false;
    }
    for &byte in payload {
        if !send_byte_and_check_ack(link, byte, LINK_TIMEOUT, REPLY_SEND_BUFFER_OK) {
            return false;
        }
    }
    send_byte_and_check_ack(
        link,
        packet_checksum(cmd, payload),
        LINK_TIMEOUT,
        REPLY_BUFFER_XFER_OK,
    )
}

/// Printer query over the byte primitives: silence means no printer.
pub fn query_printer<L: Link + ?Sized>(link: &mut L) -> u8 {
    link.discard_rx();
    link.send_byte(CMD_PRINTER_QUERY);
    if link.read_byte_with_timeout(LINK_TIMEOUT) {
        link.rx_byte()
    } else {
        0
    }
}

/// Everything a [`LoopbackLink`] saw, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Byte(u8),
    Packet {
        cmd: u8,
        payload: Vec<u8>,
        accepted: bool,
    },
    Read {
        timeout: Duration,
        arrived: bool,
    },
    Query(u8),
    Delay(Duration),
}

/// A link with no hardware behind it.
///
/// It answers the printer query with a fixed status, accepts packets (all,
/// none, or the first few), and records every event instead of sleeping.
/// Used for dry runs and for exercising the engine.
#[derive(Debug)]
pub struct LoopbackLink {
    tx: TxBuffer,
    rx: u8,
    status: u8,
    accept_packets: Option<usize>,
    reads_arrive: bool,
    events: Vec<WireEvent>,
}

impl LoopbackLink {
    /// Loopback reporting `status` to printer queries.
    pub fn new(status: u8) -> Self {
        LoopbackLink {
            tx: TxBuffer::new(),
            rx: 0,
            status,
            accept_packets: None,
            reads_arrive: true,
            events: Vec::new(),
        }
    }

    /// Accept only the first `count` packet attempts, reject the rest.
    pub fn accept_packets(self, count: usize) -> Self {
        LoopbackLink {
            accept_packets: Some(count),
            ..self
        }
    }

    pub fn reject_packets(self) -> Self {
        self.accept_packets(0)
    }

    /// Never deliver incoming bytes: every read times out.
    pub fn silent(self) -> Self {
        LoopbackLink {
            reads_arrive: false,
            ..self
        }
    }

    pub fn events(&self) -> &[WireEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<WireEvent> {
        std::mem::take(&mut self.events)
    }

    /// Payloads of the accepted packets.
    pub fn packets(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.events.iter().filter_map(|event| match event {
            WireEvent::Packet {
                payload,
                accepted: true,
                ..
            } => Some(payload.as_slice()),
            _ => None,
        })
    }

    pub fn packet_attempts(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, WireEvent::Packet { .. }))
            .count()
    }

    /// Bytes sent outside of packets.
    pub fn raw_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.events.iter().filter_map(|event| match event {
            WireEvent::Byte(b) => Some(*b),
            _ => None,
        })
    }
}

impl Link for LoopbackLink {
    fn send_byte(&mut self, byte: u8) {
        self.events.push(WireEvent::Byte(byte));
    }

    fn read_byte_with_timeout(&mut self, timeout: Duration) -> bool {
        let arrived = self.reads_arrive;
        if arrived {
            self.rx = REPLY_BUFFER_XFER_OK;
        }
        self.events.push(WireEvent::Read { timeout, arrived });
        arrived
    }

    fn rx_byte(&self) -> u8 {
        self.rx
    }

    fn tx_buf(&mut self) -> &mut TxBuffer {
        &mut self.tx
    }

    fn send_cmd_and_buffer(&mut self, cmd: u8) -> bool {
        let accepted = match self.accept_packets.as_mut() {
            None => true,
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
        };
        self.events.push(WireEvent::Packet {
            cmd,
            payload: self.tx.as_slice().to_vec(),
            accepted,
        });
        accepted
    }

    fn printer_query(&mut self) -> u8 {
        self.events.push(WireEvent::Query(self.status));
        self.status
    }

    fn delay(&mut self, duration: Duration) {
        self.events.push(WireEvent::Delay(duration));
    }
}
