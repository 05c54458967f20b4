//! Tile conversion from the screen format to the print head format.
//!
//! A screen tile stores 8 rows of 2 bits per pixel as interleaved bitplanes,
//! bit 7 of each byte being the leftmost pixel. The print head wants one byte
//! per *column*, bit 7 being the top pixel. So a tile gets mirrored
//! horizontally, rotated -90 degrees and reduced to 1 bit per pixel:
//!
//! ```text
//!    source bits         tile            printer bytes
//!      7 ___ 0           bytes             0 ___ 7
//!   0 X.......  = [0] = 0x80            7 X.......  bit
//!     X.......  = [1] = 0x80              X.......
//!     X.......  = [2] = 0x80              X.......
//!     X.......  = [3] = 0x80              X.......
//!     ........  = [4] = 0x00              ........
//!     ........  = [5] = 0x00              ........
//!     ........  = [6] = 0x00              ........
//!   7 .XXXXXXX  = [7] = 0x7F            0 .XXXXXXX
//!
//!   printer tile = {0xF0, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01}
//! ```

/// Bytes in one 2bpp screen tile.
pub const BYTES_PER_VRAM_TILE: usize = 16;
/// Bytes in one 1bpp printer tile.
pub const BYTES_PER_PRINTER_TILE: usize = 8;
/// Tile edge length in pixels.
pub const TILE_SIZE: usize = 8;

/// A screen tile: byte pairs `(plane0, plane1)` for rows 0 to 7.
pub type Tile = [u8; BYTES_PER_VRAM_TILE];

/// A printer tile: one byte per source column, bit 7 is source row 0.
pub type PrinterTile = [u8; BYTES_PER_PRINTER_TILE];

/// Which part of a screen tile ends up on paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    /// Low bit of each pixel only.
    Plane0,
    /// High bit of each pixel only.
    Plane1,
    /// Both planes, with shade 1 dithered.
    Both,
}

impl Plane {
    fn offset(self) -> usize {
        match self {
            Self::Plane0 => 0,
            Self::Plane1 => 1,
            Self::Both => 0,
        }
    }
}

/// Convert a screen tile with the given plane selection.
pub fn convert_tile(tile: &Tile, plane: Plane) -> PrinterTile {
    match plane {
        Plane::Both => convert_tile_dithered(tile),
        Plane::Plane0 | Plane::Plane1 => convert_tile_plane(tile, plane),
    }
}

/// Convert a single bitplane: a pixel is printed when its bit in that plane is set.
///
/// `Plane::Both` reads plane 0 here; use [`convert_tile_dithered`] for both.
pub fn convert_tile_plane(tile: &Tile, plane: Plane) -> PrinterTile {
    let mut out: PrinterTile = [0; BYTES_PER_PRINTER_TILE];

    // Skip the interleaved bytes of the other plane
    let mut out_bit = 0x80u8;
    for tile_byte in tile.iter().skip(plane.offset()).step_by(2) {
        let mut tile_bit = 0x80u8;
        for column in out.iter_mut() {
            if tile_byte & tile_bit != 0 {
                *column |= out_bit;
            }
            tile_bit >>= 1;
        }
        out_bit >>= 1;
    }

    out
}

/// Convert both planes into dithered monochrome.
///
/// Shade 0 is always white, shades 2 and 3 always black. Shade 1 is black
/// on a checkerboard that starts with `0xAA` on row 0 and flips every row.
pub fn convert_tile_dithered(tile: &Tile) -> PrinterTile {
    let mut out: PrinterTile = [0; BYTES_PER_PRINTER_TILE];

    let mut out_bit = 0x80u8;
    let mut dither = 0xAAu8;
    for planes in tile.chunks_exact(2) {
        let (plane0, plane1) = (planes[0], planes[1]);

        let mut tile_bit = 0x80u8;
        for column in out.iter_mut() {
            if plane1 & tile_bit != 0 || plane0 & dither & tile_bit != 0 {
                *column |= out_bit;
            }
            tile_bit >>= 1;
        }
        dither = !dither;
        out_bit >>= 1;
    }

    out
}
