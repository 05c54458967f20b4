use log::trace;

use crate::{
    screen::{Screen, MAP_SIZE},
    tile::{convert_tile, Plane, PrinterTile, BYTES_PER_PRINTER_TILE, TILE_SIZE},
    SCREEN_WIDTH_TILES,
};

/// Bytes in one printed row: one printer tile per visible column.
pub const ROW_BUFFER_LEN: usize = SCREEN_WIDTH_TILES as usize * BYTES_PER_PRINTER_TILE;

/// One 8 pixel tall strip across the full screen width, in print head format.
///
/// Every assembly rewrites the whole buffer, nothing carries over between rows.
#[derive(Clone)]
pub struct RowBuffer {
    buf: [u8; ROW_BUFFER_LEN],
}

impl Default for RowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowBuffer {
    pub fn new() -> Self {
        RowBuffer {
            buf: [0; ROW_BUFFER_LEN],
        }
    }

    pub fn clear(&mut self) {
        self.buf = [0; ROW_BUFFER_LEN];
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Printer tile at visible column `slot`, `None` past the last column.
    pub fn tile(&self, slot: usize) -> Option<&[u8]> {
        self.buf
            .get(slot * BYTES_PER_PRINTER_TILE..(slot + 1) * BYTES_PER_PRINTER_TILE)
    }

    fn set_tile(&mut self, slot: usize, tile: &PrinterTile) {
        self.buf[slot * BYTES_PER_PRINTER_TILE..(slot + 1) * BYTES_PER_PRINTER_TILE]
            .copy_from_slice(tile);
    }

    /// Fill the buffer with visible tile row `row` of the screen.
    ///
    /// Below the window top line (when the window is on) tiles come from the
    /// window map, counted from its first row. Otherwise they come from the
    /// background map offset by the scroll registers. Scroll and window
    /// positions are rounded down to whole tiles.
    pub fn assemble<S: Screen + ?Sized>(&mut self, screen: &S, row: u8, plane: Plane) {
        let tile_size = TILE_SIZE as u16;
        let use_window = row as u16 * tile_size >= screen.wy() as u16 && screen.window_enabled();

        let (map_row, first_col) = if use_window {
            (row.wrapping_sub(screen.wy() / TILE_SIZE as u8) % MAP_SIZE, 0)
        } else {
            (
                row.wrapping_add(screen.scy() / TILE_SIZE as u8) % MAP_SIZE,
                screen.scx() / TILE_SIZE as u8,
            )
        };
        trace!(
            "assemble row {} from {} map row {} col {} ({:?})",
            row,
            if use_window { "window" } else { "background" },
            map_row,
            first_col,
            plane
        );

        for slot in 0..SCREEN_WIDTH_TILES {
            let map_col = first_col.wrapping_add(slot) % MAP_SIZE;
            let id = if use_window {
                screen.win_tile_xy(map_col, map_row)
            } else {
                screen.bkg_tile_xy(map_col, map_row)
            };
            let tile = screen.bkg_data(id);
            self.set_tile(slot as usize, &convert_tile(&tile, plane));
        }
    }
}
