//! The framebuffer the printer reads from.
//!
//! The print engine never owns the screen. It reads tile maps, tile patterns
//! and scroll registers through [`Screen`], and masks the vertical blank
//! interrupt for the length of a job through [`VblankMask`].

use bitflags::bitflags;
use std::ops::{Deref, DerefMut};

use crate::{error::Error, tile::Tile, tile::BYTES_PER_VRAM_TILE};

/// Tile map edge length, in tiles.
pub const MAP_SIZE: u8 = 32;
/// Size of a VRAM image: tile data at 0x8000 up to both maps at 0x9FFF.
pub const VRAM_SIZE: usize = 0x2000;

const TILE_DATA_8000: usize = 0x0000;
const TILE_DATA_9000: usize = 0x1000;
const MAP_9800: usize = 0x1800;
const MAP_9C00: usize = 0x1C00;

bitflags! {
    /// LCD control register (LCDC).
    pub struct Lcdc: u8 {
        const BG_ON = 0x01;
        const OBJ_ON = 0x02;
        const OBJ_8X16 = 0x04;
        const BG_9C00 = 0x08;
        const BG_8000 = 0x10;
        const WIN_ON = 0x20;
        const WIN_9C00 = 0x40;
        const LCD_ON = 0x80;
    }
}

bitflags! {
    /// Interrupt enable register (IE).
    pub struct Interrupts: u8 {
        const VBLANK = 0x01;
        const LCD_STAT = 0x02;
        const TIMER = 0x04;
        const SERIAL = 0x08;
        const JOYPAD = 0x10;
    }
}

/// Read access to the tile framebuffer plus the interrupt enable register.
pub trait Screen {
    /// Tile id on the background map.
    fn bkg_tile_xy(&self, col: u8, row: u8) -> u8;

    /// Tile id on the window map.
    fn win_tile_xy(&self, col: u8, row: u8) -> u8;

    /// Pattern data of a background tile id.
    fn bkg_data(&self, id: u8) -> Tile;

    fn scx(&self) -> u8;
    fn scy(&self) -> u8;
    fn wy(&self) -> u8;
    fn lcdc(&self) -> Lcdc;

    fn interrupt_enable(&self) -> Interrupts;
    fn set_interrupt_enable(&mut self, ie: Interrupts);

    fn window_enabled(&self) -> bool {
        self.lcdc().contains(Lcdc::WIN_ON)
    }
}

/// Keeps the vertical blank interrupt masked while alive.
///
/// The interrupt enable register is restored to the value it had on
/// creation when the guard drops, unwinding included.
pub struct VblankMask<'a, S: Screen + ?Sized> {
    screen: &'a mut S,
    saved: Interrupts,
}

impl<'a, S: Screen + ?Sized> VblankMask<'a, S> {
    pub fn new(screen: &'a mut S) -> Self {
        let saved = screen.interrupt_enable();
        screen.set_interrupt_enable(saved - Interrupts::VBLANK);
        VblankMask { screen, saved }
    }
}

impl<'a, S: Screen + ?Sized> Deref for VblankMask<'a, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.screen
    }
}

impl<'a, S: Screen + ?Sized> DerefMut for VblankMask<'a, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.screen
    }
}

impl<'a, S: Screen + ?Sized> Drop for VblankMask<'a, S> {
    fn drop(&mut self) {
        self.screen.set_interrupt_enable(self.saved);
    }
}

/// An in-memory video RAM image with its registers.
///
/// Memory is laid out as on hardware from 0x8000: tile data blocks, then
/// the 0x9800 and 0x9C00 maps. Tile ids resolve through LCDC the way the
/// LCD does, so a dump taken from a running machine prints as displayed.
#[derive(Clone)]
pub struct Vram {
    mem: Vec<u8>,
    scx: u8,
    scy: u8,
    wy: u8,
    lcdc: Lcdc,
    ie: Interrupts,
}

impl Default for Vram {
    fn default() -> Self {
        Self::new()
    }
}

impl Vram {
    /// Blank VRAM with the display and background on, tile data at 0x8000.
    pub fn new() -> Self {
        Vram {
            mem: vec![0; VRAM_SIZE],
            scx: 0,
            scy: 0,
            wy: 0,
            lcdc: Lcdc::LCD_ON | Lcdc::BG_8000 | Lcdc::BG_ON,
            ie: Interrupts::VBLANK,
        }
    }

    /// Load an 8 KiB dump of 0x8000..0xA000.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != VRAM_SIZE {
            return Err(Error::InvalidDump(bytes.len()));
        }
        Ok(Vram {
            mem: bytes.to_vec(),
            ..Self::new()
        })
    }

    /// Store consecutive tile patterns starting at tile `first`.
    ///
    /// `data` holds 16 bytes per tile; a trailing partial tile is ignored.
    pub fn set_bkg_data(&mut self, first: u8, data: &[u8]) {
        for (n, tile) in data.chunks_exact(BYTES_PER_VRAM_TILE).enumerate() {
            let offset = self.tile_offset(first.wrapping_add(n as u8));
            self.mem[offset..offset + BYTES_PER_VRAM_TILE].copy_from_slice(tile);
        }
    }

    pub fn set_bkg_tile_xy(&mut self, col: u8, row: u8, id: u8) {
        let index = self.bkg_map() + Self::map_index(col, row);
        self.mem[index] = id;
    }

    pub fn set_win_tile_xy(&mut self, col: u8, row: u8, id: u8) {
        let index = self.win_map() + Self::map_index(col, row);
        self.mem[index] = id;
    }

    /// Fill a rectangle of the background map with one tile id.
    pub fn fill_bkg_rect(&mut self, x: u8, y: u8, w: u8, h: u8, id: u8) {
        for row in y..y.saturating_add(h) {
            for col in x..x.saturating_add(w) {
                self.set_bkg_tile_xy(col, row, id);
            }
        }
    }

    pub fn set_scroll(&mut self, scx: u8, scy: u8) {
        self.scx = scx;
        self.scy = scy;
    }

    /// Set the window top line and whether the window is shown.
    pub fn set_window(&mut self, wy: u8, enabled: bool) {
        self.wy = wy;
        self.lcdc.set(Lcdc::WIN_ON, enabled);
    }

    pub fn set_lcdc(&mut self, lcdc: Lcdc) {
        self.lcdc = lcdc;
    }

    fn map_index(col: u8, row: u8) -> usize {
        (row % MAP_SIZE) as usize * MAP_SIZE as usize + (col % MAP_SIZE) as usize
    }

    fn bkg_map(&self) -> usize {
        if self.lcdc.contains(Lcdc::BG_9C00) {
            MAP_9C00
        } else {
            MAP_9800
        }
    }

    fn win_map(&self) -> usize {
        if self.lcdc.contains(Lcdc::WIN_9C00) {
            MAP_9C00
        } else {
            MAP_9800
        }
    }

    // 0x8800 addressing takes the id as signed, centred on 0x9000
    fn tile_offset(&self, id: u8) -> usize {
        if self.lcdc.contains(Lcdc::BG_8000) {
            TILE_DATA_8000 + id as usize * BYTES_PER_VRAM_TILE
        } else {
            let signed = id as i8 as isize;
            (TILE_DATA_9000 as isize + signed * BYTES_PER_VRAM_TILE as isize) as usize
        }
    }
}

impl Screen for Vram {
    fn bkg_tile_xy(&self, col: u8, row: u8) -> u8 {
        self.mem[self.bkg_map() + Self::map_index(col, row)]
    }

    fn win_tile_xy(&self, col: u8, row: u8) -> u8 {
        self.mem[self.win_map() + Self::map_index(col, row)]
    }

    fn bkg_data(&self, id: u8) -> Tile {
        let offset = self.tile_offset(id);
        let mut tile: Tile = [0; BYTES_PER_VRAM_TILE];
        tile.copy_from_slice(&self.mem[offset..offset + BYTES_PER_VRAM_TILE]);
        tile
    }

    fn scx(&self) -> u8 {
        self.scx
    }

    fn scy(&self) -> u8 {
        self.scy
    }

    fn wy(&self) -> u8 {
        self.wy
    }

    fn lcdc(&self) -> Lcdc {
        self.lcdc
    }

    fn interrupt_enable(&self) -> Interrupts {
        self.ie
    }

    fn set_interrupt_enable(&mut self, ie: Interrupts) {
        self.ie = ie;
    }
}
