use anyhow::Context;
use snes_ppu_common::frontend::{Color, FrameSize};
use snes_ppu_core::ppu::colortable::rgb5_to_rgb8;
use snes_ppu_core::tilecache::{ATLAS_WIDTH_TILES, AtlasCoord, TileCache};
use std::path::Path;

pub fn write_png(path: &Path, size: FrameSize, pixels: &[Color]) -> anyhow::Result<()> {
    let bytes: Vec<u8> = bytemuck::cast_slice(pixels).to_vec();
    let image = image::RgbaImage::from_raw(size.width, size.height, bytes).with_context(|| {
        format!("{} pixels do not fill a {}x{} image", pixels.len(), size.width, size.height)
    })?;

    image.save(path).with_context(|| format!("Failed to write PNG to '{}'", path.display()))?;

    log::info!("Wrote {}x{} image to '{}'", size.width, size.height, path.display());

    Ok(())
}

#[must_use]
pub fn rgba5551_to_color(texel: u16) -> Color {
    let r = rgb5_to_rgb8((texel >> 11) & 0x1F);
    let g = rgb5_to_rgb8((texel >> 6) & 0x1F);
    let b = rgb5_to_rgb8((texel >> 1) & 0x1F);
    let a = if texel & 1 != 0 { 255 } else { 0 };
    Color::rgba(r, g, b, a)
}

/// Lay out every atlas slot as a plain image, top tile row first (slot 0 is at the top left)
#[must_use]
pub fn unswizzle_atlas(cache: &TileCache) -> (FrameSize, Vec<Color>) {
    let width_tiles = u32::from(ATLAS_WIDTH_TILES);
    let height_tiles = u32::from(cache.capacity()).div_ceil(width_tiles);
    let size = FrameSize { width: width_tiles * 8, height: height_tiles * 8 };

    let mut pixels = vec![Color::TRANSPARENT; size.len()];
    for slot in 0..cache.capacity() {
        let coord = AtlasCoord::from_slot(slot);
        let tile_x = u32::from(slot) % width_tiles * 8;
        let tile_y = u32::from(slot) / width_tiles * 8;

        for y in 0..8_u8 {
            for x in 0..8_u8 {
                let idx = (tile_y + u32::from(y)) * size.width + tile_x + u32::from(x);
                pixels[idx as usize] = rgba5551_to_color(cache.texel(coord, x, y));
            }
        }
    }

    (size, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snes_ppu_core::ppu::colortable::snes_to_rgba5551;
    use snes_ppu_core::ppu::{BitsPerPixel, VideoMemory};
    use test_log::test;

    #[test]
    fn rgba5551_conversion() {
        assert_eq!(rgba5551_to_color(0), Color::TRANSPARENT);
        assert_eq!(rgba5551_to_color(snes_to_rgba5551(0x001F)), Color::rgb(255, 0, 0));
        assert_eq!(rgba5551_to_color(snes_to_rgba5551(0x7C00)), Color::rgb(0, 0, 255));
    }

    #[test]
    fn unswizzled_atlas_has_tiles_upright() {
        let mut memory = VideoMemory::new();
        // Second tile's top row: colors 3,2,1,0,...
        memory.write_vram_word(0x0008, 0xCCAA);
        memory.write_cgram_color(1, 0x7C00);
        memory.write_cgram_color(3, 0x001F);

        let mut cache = TileCache::with_capacity(256).unwrap();
        cache.get_or_decode_tile(&memory, BitsPerPixel::Two, 0, 0x0000);
        let coord = cache.get_or_decode_tile(&memory, BitsPerPixel::Two, 0, 0x0008);
        assert_eq!(coord.slot(), 1);

        let (size, pixels) = unswizzle_atlas(&cache);
        assert_eq!(size, FrameSize { width: 1024, height: 16 });

        assert_eq!(pixels[8], Color::rgb(255, 0, 0));
        assert_eq!(pixels[10], Color::rgb(0, 0, 255));
        assert_eq!(pixels[11], Color::TRANSPARENT);
        // Second row of the tile is transparent
        assert_eq!(pixels[1024 + 8], Color::TRANSPARENT);
    }
}
