use crate::ppu::banks::VideoMemory;
use crate::ppu::registers::{BgMode, BitsPerPixel, Registers};
use crate::ppu::{LineBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
use snes_ppu_common::num::GetBit;
use std::cmp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgLayer {
    pub bg: usize,
    pub bpp: BitsPerPixel,
    // CGRAM offset added to every pixel; mode 0 gives each layer its own 32 colors
    pub palette_offset: u16,
}

impl BgLayer {
    /// `None` if the mode doesn't draw layer `bg`
    pub fn new(mode: BgMode, bg: usize) -> Option<Self> {
        let bpp = mode.layer_depth(bg)?;
        let palette_offset = if mode == BgMode::Mode0 { 32 * bg as u16 } else { 0 };

        Some(Self { bg, bpp, palette_offset })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BgMapEntry {
    tile_number: u16,
    palette: u8,
    priority: bool,
    x_flip: bool,
    y_flip: bool,
}

impl BgMapEntry {
    fn new(map_entry: u16) -> Self {
        Self {
            tile_number: map_entry.bits(0..=9),
            palette: map_entry.bits(10..=12) as u8,
            priority: map_entry.bit(13),
            x_flip: map_entry.bit(14),
            y_flip: map_entry.bit(15),
        }
    }
}

fn bg_map_entry(memory: &VideoMemory, registers: &Registers, bg: usize, x: u16, y: u16) -> u16 {
    let map_size = registers.bg_map_size[bg];
    let x = x & (map_size.width_pixels() - 1);
    let y = y & (map_size.height_pixels() - 1);

    let screen_address =
        registers.bg_map_address[bg].wrapping_add(map_size.screen_offset(x, y));
    let tile_row = (y & 0xFF) / 8;
    let tile_col = (x & 0xFF) / 8;
    memory.vram_word(screen_address.wrapping_add(32 * tile_row + tile_col))
}

/// Draw the tiles of one background layer that match the requested priority onto a line.
///
/// Pixels with color index 0 are transparent and leave the line untouched.
pub fn render_line(
    memory: &VideoMemory,
    registers: &Registers,
    layer: BgLayer,
    line: u16,
    high_priority: bool,
    out: &mut LineBuffer,
) {
    let bg = layer.bg;
    let y = line.wrapping_add(registers.bg_scroll_y[bg]);
    let tile_row = y % 8;
    let tile_base_address = registers.bg_tile_address[bg];

    let mut x = registers.bg_scroll_x[bg];
    let mut pixel = 0;
    while pixel < SCREEN_WIDTH {
        let fine_x = usize::from(x % 8);
        let span = cmp::min(8 - fine_x, SCREEN_WIDTH - pixel);

        let entry = BgMapEntry::new(bg_map_entry(memory, registers, bg, x, y));
        if entry.priority == high_priority {
            let row = if entry.y_flip { 7 - tile_row } else { tile_row };
            let tile_address = tile_base_address
                .wrapping_add(entry.tile_number.wrapping_mul(layer.bpp.tile_size_words()));
            let colors = memory.tile_row(layer.bpp, tile_address, row);

            // For 8bpp the shifted palette lands above bit 7 and is dropped by the u8 cast below
            let palette_base =
                layer.palette_offset + (u16::from(entry.palette) << layer.bpp.palette_shift());

            for (i, out_color) in out[pixel..pixel + span].iter_mut().enumerate() {
                let col = fine_x + i;
                let color = colors[if entry.x_flip { 7 - col } else { col }];
                if color != 0 {
                    *out_color = memory.cgram_color((palette_base + u16::from(color)) as u8);
                }
            }
        }

        pixel += span;
        x = x.wrapping_add(span as u16);
    }
}

/// A tilemap entry within the visible window of a background layer, resolved to the tile's VRAM
/// address and a palette number suitable for the tile cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleTile {
    pub bg: usize,
    pub bpp: BitsPerPixel,
    pub palette: u8,
    pub vram_address: u16,
    pub high_priority: bool,
    pub x_flip: bool,
    pub y_flip: bool,
    pub screen_col: u16,
    pub screen_row: u16,
}

pub fn visible_tiles(
    memory: &VideoMemory,
    registers: &Registers,
    layer: BgLayer,
    out: &mut Vec<VisibleTile>,
) {
    let bg = layer.bg;
    let h_scroll = registers.bg_scroll_x[bg];
    let v_scroll = registers.bg_scroll_y[bg];
    let tile_base_address = registers.bg_tile_address[bg];

    // Mode 0 layers each use their own block of 8 4-color palettes
    let palette_offset = (layer.palette_offset >> layer.bpp.palette_shift()) as u8;

    // One extra row and column for partially visible tiles
    for screen_row in 0..=(SCREEN_HEIGHT / 8) as u16 {
        for screen_col in 0..=(SCREEN_WIDTH / 8) as u16 {
            let x = h_scroll.wrapping_add(8 * screen_col);
            let y = v_scroll.wrapping_add(8 * screen_row);
            let entry = BgMapEntry::new(bg_map_entry(memory, registers, bg, x, y));

            out.push(VisibleTile {
                bg,
                bpp: layer.bpp,
                palette: palette_offset + entry.palette,
                vram_address: tile_base_address
                    .wrapping_add(entry.tile_number.wrapping_mul(layer.bpp.tile_size_words())),
                high_priority: entry.priority,
                x_flip: entry.x_flip,
                y_flip: entry.y_flip,
                screen_col,
                screen_row,
            });
        }
    }
}
