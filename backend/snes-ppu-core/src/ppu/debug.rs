use crate::ppu::Ppu;
use crate::ppu::banks::VRAM_LEN_WORDS;
use crate::ppu::colortable;
use crate::ppu::registers::BitsPerPixel;
use snes_ppu_common::frontend::Color;

impl Ppu {
    pub fn copy_cgram(&self, out: &mut [Color]) {
        for (out_color, &cgram_color) in out.iter_mut().zip(self.memory.cgram()) {
            *out_color = colortable::snes_to_rgb888(cgram_color);
        }
    }

    /// Number of tiles of the given depth that fit in VRAM
    #[must_use]
    pub fn vram_tile_count(bpp: BitsPerPixel) -> usize {
        VRAM_LEN_WORDS / usize::from(bpp.tile_size_words())
    }

    /// Render every tile in VRAM as a sheet `row_len` tiles wide.
    ///
    /// `out` must hold `vram_tile_count(bpp) * 64` pixels. The palette is ignored for 8bpp, and
    /// nothing is written if `row_len` is 0.
    pub fn copy_vram_tiles(
        &self,
        out: &mut [Color],
        bpp: BitsPerPixel,
        palette: u8,
        row_len: usize,
    ) {
        if row_len == 0 {
            log::debug!("Ignoring VRAM tile sheet request with a row length of 0");
            return;
        }

        let palette_base = u16::from(palette) << bpp.palette_shift();

        for tile_number in 0..Self::vram_tile_count(bpp) {
            let tile_address = (tile_number as u16).wrapping_mul(bpp.tile_size_words());
            let out_tile_idx = tile_number / row_len * row_len * 64 + (tile_number % row_len) * 8;

            for row in 0..8 {
                let colors = self.memory.tile_row(bpp, tile_address, row as u16);

                for (col, &snes_color) in colors.iter().enumerate() {
                    let out_idx = out_tile_idx + row * row_len * 8 + col;
                    let Some(out_color) = out.get_mut(out_idx) else { return };

                    let color = if snes_color != 0 {
                        self.memory.cgram_color((palette_base + u16::from(snes_color)) as u8)
                    } else {
                        0
                    };
                    *out_color = colortable::snes_to_rgb888(color);
                }
            }
        }
    }
}
