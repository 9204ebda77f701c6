//! Conversion from 15-bit SNES BGR colors to host pixel formats

use snes_ppu_common::boxedarray::BoxedArray;
use snes_ppu_common::frontend::Color;

pub const COLOR_TABLE_LEN: usize = 1 << 16;

#[inline]
#[must_use]
pub fn rgb5_to_rgb8(component: u16) -> u8 {
    let component = (component & 0x1F) as u8;
    (component << 3) | (component >> 2)
}

#[must_use]
pub fn snes_to_rgb888(snes_color: u16) -> Color {
    let r = rgb5_to_rgb8(snes_color);
    let g = rgb5_to_rgb8(snes_color >> 5);
    let b = rgb5_to_rgb8(snes_color >> 10);
    Color::rgb(r, g, b)
}

/// RGBA5551 with the alpha bit set, as used by the tile cache atlas
#[must_use]
pub fn snes_to_rgba5551(snes_color: u16) -> u16 {
    let r = snes_color & 0x1F;
    let g = (snes_color >> 5) & 0x1F;
    let b = (snes_color >> 10) & 0x1F;
    (r << 11) | (g << 6) | (b << 1) | 1
}

/// Lookup table from SNES color to host pixel, indexed by the full 16-bit value so that no
/// masking is needed on lookup
#[derive(Debug, Clone)]
pub struct ColorTable<P>(BoxedArray<P, COLOR_TABLE_LEN>);

impl<P: Copy + Default> ColorTable<P> {
    pub fn from_fn(convert: impl Fn(u16) -> P) -> Self {
        let mut table: BoxedArray<P, COLOR_TABLE_LEN> = BoxedArray::new();
        for (i, pixel) in table.iter_mut().enumerate() {
            *pixel = convert((i & 0x7FFF) as u16);
        }
        Self(table)
    }
}

impl<P: Copy> ColorTable<P> {
    #[inline]
    #[must_use]
    pub fn get(&self, snes_color: u16) -> P {
        self.0[snes_color as usize]
    }
}

impl ColorTable<Color> {
    #[must_use]
    pub fn rgb888() -> Self {
        Self::from_fn(snes_to_rgb888)
    }
}

impl ColorTable<u16> {
    #[must_use]
    pub fn rgba5551() -> Self {
        Self::from_fn(snes_to_rgba5551)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn component_expansion() {
        assert_eq!(rgb5_to_rgb8(0), 0);
        assert_eq!(rgb5_to_rgb8(0x1F), 0xFF);
        assert_eq!(rgb5_to_rgb8(0x10), 0x84);
    }

    #[test]
    fn table_ignores_bit_15() {
        let table = ColorTable::rgb888();

        assert_eq!(table.get(0x001F), Color::rgb(0xFF, 0, 0));
        assert_eq!(table.get(0x03E0), Color::rgb(0, 0xFF, 0));
        assert_eq!(table.get(0x7C00), Color::rgb(0, 0, 0xFF));
        assert_eq!(table.get(0x801F), table.get(0x001F));
    }

    #[test]
    fn rgba5551_layout() {
        assert_eq!(snes_to_rgba5551(0x001F), 0xF801);
        assert_eq!(snes_to_rgba5551(0x03E0), 0x07C1);
        assert_eq!(snes_to_rgba5551(0x7C00), 0x003F);
        assert_eq!(ColorTable::rgba5551().get(0), 0x0001);
    }
}
