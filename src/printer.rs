use log::{debug, info, trace, warn};
use std::time::Duration;

use crate::{
    error::Error,
    link::{Link, TxPacket, CMD_PRINT_SEND_BYTES},
    model::{PrinterStatus, PrinterType},
    row::RowBuffer,
    screen::{Screen, VblankMask},
    tile::Plane,
    SCREEN_HEIGHT_TILES,
};

/// Return the print head to the start of the row.
pub const CARRIAGE_RETURN: u8 = 0x0D;
/// Feed the paper to the next row.
pub const LINE_FEED: u8 = 0x0A;

const PACKET_DATA_LEN: usize = 12;

const ONE_PASS_PACKETS: usize = 4;
const ONE_PASS_BULK_BYTES: usize = 118;
const ONE_PASS_BULK_DATA_BYTES: usize = 112;

const TWO_PASS_PACKETS: usize = 14;
const END_ROW_DATA_LEN: usize = 4;
const END_ROW_CR_LEN: usize = 5;
const END_ROW_CRLF_LEN: usize = 6;
const CR_IDX: usize = END_ROW_CR_LEN - 1;
const LF_IDX: usize = END_ROW_CRLF_LEN - 1;

/// Where a print job is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Querying,
    /// The blank row sent ahead of the screen.
    Preamble,
    /// Screen tile row `r`.
    Body(u8),
    /// Blank row `k` fed after the screen.
    Trailer(u8),
    Epilogue,
}

///
/// Timing and retry settings of a print job.
///
/// The defaults are what the printer needs in practice, loosen them only
/// for links without real hardware behind them.
///
#[derive(Debug, Clone)]
pub struct Config {
    packet_retries: u8,
    retry_delay: Duration,
    row_delay: Duration,
    bulk_ack_timeout: Duration,
    row_end_ack_timeout: Duration,
    trailing_blank_rows: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        Config {
            packet_retries: 10,
            retry_delay: Duration::from_millis(1),
            row_delay: Duration::from_millis(1000),
            bulk_ack_timeout: Duration::from_millis(100),
            row_end_ack_timeout: Duration::from_millis(200),
            trailing_blank_rows: 4,
        }
    }

    /// Attempts per framed packet before the row fails.
    pub fn packet_retries(self, packet_retries: u8) -> Self {
        Config {
            packet_retries,
            ..self
        }
    }

    pub fn retry_delay(self, retry_delay: Duration) -> Self {
        Config {
            retry_delay,
            ..self
        }
    }

    /// Pause after each single pass row.
    ///
    /// The carriage return takes about 500 ms, then the head waits about
    /// 600 ms before moving again. Sending earlier skips tiles, and polling
    /// the controller too soon after the last row resets the CPU.
    pub fn row_delay(self, row_delay: Duration) -> Self {
        Config { row_delay, ..self }
    }

    pub fn bulk_ack_timeout(self, bulk_ack_timeout: Duration) -> Self {
        Config {
            bulk_ack_timeout,
            ..self
        }
    }

    pub fn row_end_ack_timeout(self, row_end_ack_timeout: Duration) -> Self {
        Config {
            row_end_ack_timeout,
            ..self
        }
    }

    /// Blank rows fed after the screen to get it past the tear off edge.
    pub fn trailing_blank_rows(self, trailing_blank_rows: u8) -> Self {
        Config {
            trailing_blank_rows,
            ..self
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.packet_retries == 0 {
            return Err(Error::InvalidConfig(
                "packet_retries must be at least 1".to_string(),
            ));
        }
        if self.trailing_blank_rows == 0 {
            return Err(Error::InvalidConfig(
                "trailing_blank_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Prints the visible screen on the laptop's thermal printer.
///
/// Owns the link and the row buffer for as long as it lives, so one printer
/// never interleaves two jobs.
pub struct Printer<L: Link> {
    link: L,
    config: Config,
    row: RowBuffer,
}

impl<L: Link> Printer<L> {
    pub fn new(link: L, config: Config) -> Result<Self, Error> {
        config.validate()?;
        debug!("{:?}", config);
        Ok(Printer {
            link,
            config,
            row: RowBuffer::new(),
        })
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// The row buffer as last sent.
    pub fn row_buffer(&self) -> &RowBuffer {
        &self.row
    }

    /// Query which printer is attached.
    pub fn check_status(&mut self) -> Result<PrinterType, Error> {
        let status = PrinterStatus::from_code(self.link.printer_query());
        debug!("printer query returned {:?}", status);
        status.printer_type().ok_or(Error::NoPrinter(status))
    }

    /// Print the visible 20 x 18 tiles of `screen`.
    ///
    /// The vertical blank interrupt stays masked for the whole job and the
    /// interrupt enable register is restored on every exit. A failed packet
    /// ends the job where it is; rows already printed stay printed.
    pub fn print_screen<S: Screen + ?Sized>(&mut self, screen: &mut S) -> Result<(), Error> {
        debug!("phase {:?}", Phase::Querying);
        let printer_type = self.check_status()?;
        info!("printing screen on {:?} printer", printer_type);

        let masked = VblankMask::new(screen);
        let result = self.print_job(&*masked, printer_type);
        drop(masked);
        debug!("phase {:?}", Phase::Epilogue);

        match &result {
            Ok(()) => info!("print finished"),
            Err(err) => warn!("print failed: {}", err),
        }
        result
    }

    fn print_job<S: Screen + ?Sized>(
        &mut self,
        screen: &S,
        printer_type: PrinterType,
    ) -> Result<(), Error> {
        // Starting with a blank row avoids a skipped tile in the first printed row
        self.print_blank_row(printer_type, Phase::Preamble)?;

        for r in 0..SCREEN_HEIGHT_TILES {
            let phase = Phase::Body(r);
            trace!("phase {:?}", phase);
            let sent = match printer_type {
                PrinterType::OnePass => {
                    self.row.assemble(screen, r, Plane::Both);
                    self.send_tile_row_1pass()
                }
                PrinterType::TwoPass => [Plane::Plane0, Plane::Plane1].iter().all(|&plane| {
                    self.row.assemble(screen, r, plane);
                    self.send_tile_row_2pass(plane)
                }),
            };
            Self::check_sent(sent, phase)?;
        }

        for k in 0..self.config.trailing_blank_rows {
            self.print_blank_row(printer_type, Phase::Trailer(k))?;
        }
        Ok(())
    }

    fn print_blank_row(&mut self, printer_type: PrinterType, phase: Phase) -> Result<(), Error> {
        debug!("phase {:?}", phase);
        self.row.clear();
        let sent = match printer_type {
            PrinterType::OnePass => self.send_tile_row_1pass(),
            PrinterType::TwoPass => {
                self.send_tile_row_2pass(Plane::Plane0) && self.send_tile_row_2pass(Plane::Plane1)
            }
        };
        Self::check_sent(sent, phase)
    }

    fn check_sent(sent: bool, phase: Phase) -> Result<(), Error> {
        if sent {
            Ok(())
        } else {
            Err(Error::PacketSendTimeout { phase })
        }
    }

    /// Send the row buffer to a single pass printer.
    ///
    /// The first 48 bytes go as framed packets. The other 112, plus 6 zero
    /// bytes, go one by one, each after the printer signals it is ready.
    /// Missed ready signals and end of row acknowledgements are tolerated.
    pub fn send_tile_row_1pass(&mut self) -> bool {
        let Printer { link, config, row } = self;
        let (packets, bulk) = row
            .as_bytes()
            .split_at(ONE_PASS_PACKETS * PACKET_DATA_LEN);

        for (n, chunk) in packets.chunks(PACKET_DATA_LEN).enumerate() {
            let sent = send_packet(&mut *link, config, chunk);
            if !sent {
                warn!(
                    "packet {} not accepted after {} attempts",
                    n, config.packet_retries
                );
                // Same pause as after a good row, or the next command glitches
                link.delay(config.row_delay);
                return false;
            }
        }

        let padding = [0u8; ONE_PASS_BULK_BYTES - ONE_PASS_BULK_DATA_BYTES];
        let mut missed = 0;
        for &byte in bulk.iter().chain(padding.iter()) {
            if !link.read_byte_with_timeout(config.bulk_ack_timeout) {
                missed += 1;
            }
            link.send_byte(byte);
        }

        // Bulk data ACK, then carriage return ACK
        for _ in 0..2 {
            if !link.read_byte_with_timeout(config.row_end_ack_timeout) {
                missed += 1;
            }
        }
        if missed > 0 {
            trace!("{} acknowledgements missed", missed);
        }

        link.delay(config.row_delay);
        true
    }

    /// Send one bitplane of the row buffer to a double pass printer.
    ///
    /// 13 packets of 12 bytes then a last one of 4 bytes plus CR. The second
    /// plane's last packet also carries LF to feed the paper. `Plane::Both`
    /// is sent as a first pass.
    pub fn send_tile_row_2pass(&mut self, plane: Plane) -> bool {
        let Printer { link, config, row } = self;
        let data = row.as_bytes();

        for packet in 0..TWO_PASS_PACKETS {
            let start = packet * PACKET_DATA_LEN;
            let mut payload = [0u8; PACKET_DATA_LEN];
            let len = if packet < TWO_PASS_PACKETS - 1 {
                payload.copy_from_slice(&data[start..start + PACKET_DATA_LEN]);
                PACKET_DATA_LEN
            } else {
                payload[..END_ROW_DATA_LEN].copy_from_slice(&data[start..start + END_ROW_DATA_LEN]);
                payload[CR_IDX] = CARRIAGE_RETURN;
                match plane {
                    Plane::Plane1 => {
                        payload[LF_IDX] = LINE_FEED;
                        END_ROW_CRLF_LEN
                    }
                    Plane::Plane0 | Plane::Both => END_ROW_CR_LEN,
                }
            };

            let sent = send_packet(&mut *link, config, &payload[..len]);
            if !sent {
                warn!(
                    "{:?} packet {} not accepted after {} attempts",
                    plane, packet, config.packet_retries
                );
                return false;
            }
        }

        if !link.read_byte_with_timeout(config.row_end_ack_timeout) {
            trace!("carriage return acknowledgement missed");
        }
        true
    }
}

/// One framed print packet through the retry wrapper.
fn send_packet<L: Link>(link: &mut L, config: &Config, payload: &[u8]) -> bool {
    match TxPacket::load(link, payload) {
        Ok(mut packet) => packet.send_with_retry(
            CMD_PRINT_SEND_BYTES,
            config.packet_retries,
            config.retry_delay,
        ),
        Err(err) => {
            warn!("{}", err);
            false
        }
    }
}
