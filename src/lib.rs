//! Mega Duck Printer Driver
//!
//! This crate prints the visible screen of a tile based framebuffer on the
//! Mega Duck laptop's thermal printer. Tiles are converted to the print
//! head's column format, assembled into 8 pixel tall rows and streamed to
//! the printer with the pacing and retries the hardware needs.
//!
//! # Example
//!
//! ```rust,no_run
//! use duck_printer::{Config, Printer, UsbLink, Vram};
//!
//! let link = UsbLink::open(0x1209, 0x0001, None).unwrap();
//! let mut printer = Printer::new(link, Config::new()).unwrap();
//! let mut vram = Vram::new();
//! printer.print_screen(&mut vram).unwrap();
//! ```

mod error;
mod link;
mod model;
mod printer;
mod row;
mod screen;
mod tile;
mod usb;
mod utils;

pub use crate::{
    error::Error,
    link::{
        packet_checksum, query_printer, send_byte_and_check_ack, send_framed, Link, LoopbackLink,
        TxBuffer, TxPacket, WireEvent, CMD_PRINTER_QUERY, CMD_PRINT_SEND_BYTES, LINK_TIMEOUT,
        REPLY_BUFFER_XFER_OK, REPLY_SEND_BUFFER_OK, TX_BUF_SIZE,
    },
    model::{PrinterStatus, PrinterType},
    printer::{Config, Phase, Printer, CARRIAGE_RETURN, LINE_FEED},
    row::{RowBuffer, ROW_BUFFER_LEN},
    screen::{Interrupts, Lcdc, Screen, VblankMask, Vram, MAP_SIZE, VRAM_SIZE},
    tile::{
        convert_tile, convert_tile_dithered, convert_tile_plane, Plane, PrinterTile, Tile,
        BYTES_PER_PRINTER_TILE, BYTES_PER_VRAM_TILE, TILE_SIZE,
    },
    usb::UsbLink,
    utils::preview_row,
};

/// Width of the visible screen in tiles.
///
/// The printer only takes full width rows: 20 tiles, 160 pixels.
pub const SCREEN_WIDTH_TILES: u8 = 20;

/// Height of the visible screen in tiles, one printed row each.
pub const SCREEN_HEIGHT_TILES: u8 = 18;
