use crate::ppu::banks::{SpriteAttributes, VRAM_ADDRESS_MASK, VideoMemory};
use crate::ppu::registers::{BitsPerPixel, Registers};
use crate::ppu::{LineBuffer, SCREEN_WIDTH};
use snes_ppu_common::num::GetBit;

const OBJ_PALETTE_BASE: u8 = 0x80;

fn line_overlaps_sprite(sprite_y: u8, sprite_height: u16, scanline: u16) -> bool {
    let scanline = scanline as u8;
    let sprite_bottom = sprite_y.wrapping_add((sprite_height - 1) as u8);
    if sprite_bottom > sprite_y {
        (sprite_y..=sprite_bottom).contains(&scanline)
    } else {
        // Sprite wraps around the bottom of the 256-line coordinate space
        scanline >= sprite_y || scanline <= sprite_bottom
    }
}

fn obj_tile_address(
    registers: &Registers,
    base_tile_number: u16,
    tile_x_offset: u16,
    tile_y_offset: u16,
) -> u16 {
    // Unlike BG tiles, overflows in large OBJ tiles do not carry to the next nibble
    let mut tile_number = base_tile_number;
    tile_number = (tile_number & !0xF) | (tile_number.wrapping_add(tile_x_offset) & 0xF);
    tile_number = (tile_number & !0xF0) | (tile_number.wrapping_add(tile_y_offset << 4) & 0xF0);

    let tile_size_words = BitsPerPixel::OBJ.tile_size_words();
    let table_address = if tile_number.bit(8) {
        registers
            .obj_tile_address
            .wrapping_add(256 * tile_size_words)
            .wrapping_add(registers.obj_table_gap)
    } else {
        registers.obj_tile_address
    };

    table_address.wrapping_add((tile_number & 0xFF) * tile_size_words) & VRAM_ADDRESS_MASK
}

/// Draw every sprite of the given priority that overlaps the line.
///
/// Sprites are visited from highest index to lowest, starting just below the first sprite
/// selected by OAMADDH priority rotation, so the first sprite is drawn last and ends up on top.
pub fn render_line(
    memory: &VideoMemory,
    registers: &Registers,
    line: u16,
    priority: u8,
    out: &mut LineBuffer,
) {
    let mut index = registers.first_sprite;
    for _ in 0..128 {
        index = index.wrapping_sub(1) & 0x7F;

        let sprite = memory.sprite(index);
        if sprite.priority != priority {
            continue;
        }

        let (width, height) = registers.obj_sizes[usize::from(sprite.large)];

        // Sprites are displayed starting one line below their Y coordinate
        let top = sprite.y.wrapping_add(1);
        if !line_overlaps_sprite(top, height, line) {
            continue;
        }

        let sprite_line = (line as u8).wrapping_sub(top);
        render_sprite_line(memory, registers, &sprite, (width, height), sprite_line, out);
    }
}

fn render_sprite_line(
    memory: &VideoMemory,
    registers: &Registers,
    sprite: &SpriteAttributes,
    (width, height): (u16, u16),
    sprite_line: u8,
    out: &mut LineBuffer,
) {
    let mut sprite_line = u16::from(sprite_line) & (height - 1);
    if sprite.y_flip {
        sprite_line = height - 1 - sprite_line;
    }
    let tile_y_offset = sprite_line / 8;
    let tile_row = sprite_line % 8;

    // X is a 9-bit signed coordinate; negative sprites have their left columns clipped
    let (mut screen_x, mut sprite_x) = if sprite.x_negative {
        let offscreen_pixels = 0x100 - u16::from(sprite.x);
        if offscreen_pixels >= width {
            return;
        }
        (0_usize, offscreen_pixels)
    } else {
        (usize::from(sprite.x), 0)
    };

    let palette_base = OBJ_PALETTE_BASE | (sprite.palette << 4);
    let width_tiles = width / 8;

    while sprite_x < width {
        let tile_col = sprite_x / 8;
        let tile_x_offset = if sprite.x_flip { width_tiles - 1 - tile_col } else { tile_col };
        let tile_address =
            obj_tile_address(registers, sprite.tile_number, tile_x_offset, tile_y_offset);
        let colors = memory.tile_row(BitsPerPixel::OBJ, tile_address, tile_row);

        let fine_x = sprite_x % 8;
        for col in fine_x..8 {
            if screen_x >= SCREEN_WIDTH {
                return;
            }

            let color = colors[usize::from(if sprite.x_flip { 7 - col } else { col })];
            if color != 0 {
                out[screen_x] = memory.cgram_color(palette_base | color);
            }
            screen_x += 1;
        }

        sprite_x += 8 - fine_x;
    }
}
