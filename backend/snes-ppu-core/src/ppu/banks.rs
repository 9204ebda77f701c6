//! Video memory banks (VRAM, OAM, CGRAM) and the write stamps that the tile cache uses to detect
//! modified tiles and palettes

use crate::ppu::registers::BitsPerPixel;
use bincode::{Decode, Encode};
use snes_ppu_common::boxedarray::{BoxedArray, BoxedByteArray, BoxedWordArray};
use snes_ppu_common::num::{GetBit, U16Ext};
use std::ops::Range;

pub const VRAM_LEN_WORDS: usize = 64 * 1024 / 2;
pub const OAM_LOW_LEN_WORDS: usize = 512 / 2;
pub const OAM_HIGH_LEN_BYTES: usize = 32;
pub const CGRAM_LEN_WORDS: usize = 256;

pub const VRAM_ADDRESS_MASK: u16 = (1 << 15) - 1;

// 16-byte granules
pub const VRAM_GRANULE_SHIFT: u16 = 3;
pub const VRAM_GRANULES: usize = VRAM_LEN_WORDS >> VRAM_GRANULE_SHIFT;

#[derive(Debug, Clone, Encode, Decode)]
pub struct WriteStamps {
    sequence: u64,
    vram_granules: BoxedArray<u64, VRAM_GRANULES>,
    cgram: BoxedArray<u64, CGRAM_LEN_WORDS>,
}

impl WriteStamps {
    fn new() -> Self {
        Self { sequence: 0, vram_granules: BoxedArray::new(), cgram: BoxedArray::new() }
    }

    fn stamp_vram(&mut self, word_address: u16) {
        self.sequence += 1;
        self.vram_granules[(word_address >> VRAM_GRANULE_SHIFT) as usize] = self.sequence;
    }

    fn stamp_cgram(&mut self, index: u8) {
        self.sequence += 1;
        self.cgram[index as usize] = self.sequence;
    }
}

/// Attributes for one of the 128 sprites, unpacked from the low and high OAM tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteAttributes {
    pub x: u8,
    pub x_negative: bool,
    pub y: u8,
    pub tile_number: u16,
    pub palette: u8,
    pub priority: u8,
    pub x_flip: bool,
    pub y_flip: bool,
    pub large: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct VideoMemory {
    vram: BoxedWordArray<VRAM_LEN_WORDS>,
    oam_low: BoxedWordArray<OAM_LOW_LEN_WORDS>,
    oam_high: BoxedByteArray<OAM_HIGH_LEN_BYTES>,
    cgram: BoxedWordArray<CGRAM_LEN_WORDS>,
    stamps: WriteStamps,
}

impl Default for VideoMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            vram: BoxedArray::new(),
            oam_low: BoxedArray::new(),
            oam_high: BoxedArray::new(),
            cgram: BoxedArray::new(),
            stamps: WriteStamps::new(),
        }
    }

    #[inline]
    pub fn vram_word(&self, word_address: u16) -> u16 {
        self.vram[(word_address & VRAM_ADDRESS_MASK) as usize]
    }

    pub fn write_vram_lsb(&mut self, word_address: u16, value: u8) {
        let word_address = word_address & VRAM_ADDRESS_MASK;
        self.vram[word_address as usize].set_lsb(value);
        self.stamps.stamp_vram(word_address);
    }

    pub fn write_vram_msb(&mut self, word_address: u16, value: u8) {
        let word_address = word_address & VRAM_ADDRESS_MASK;
        self.vram[word_address as usize].set_msb(value);
        self.stamps.stamp_vram(word_address);
    }

    pub fn write_vram_word(&mut self, word_address: u16, value: u16) {
        let word_address = word_address & VRAM_ADDRESS_MASK;
        self.vram[word_address as usize] = value;
        self.stamps.stamp_vram(word_address);
    }

    #[inline]
    pub fn cgram_color(&self, index: u8) -> u16 {
        self.cgram[index as usize]
    }

    pub fn write_cgram_color(&mut self, index: u8, color: u16) {
        self.cgram[index as usize] = color & 0x7FFF;
        self.stamps.stamp_cgram(index);
    }

    /// Read a byte of OAM by 10-bit byte address; $220-$3FF mirror the 32-byte high table
    pub fn oam_byte(&self, address: u16) -> u8 {
        if address >= 0x200 {
            self.oam_high[(address & 0x1F) as usize]
        } else {
            let word = self.oam_low[(address >> 1) as usize];
            if address.bit(0) { word.msb() } else { word.lsb() }
        }
    }

    pub fn write_oam_high(&mut self, address: u16, value: u8) {
        self.oam_high[(address & 0x1F) as usize] = value;
    }

    pub fn write_oam_low_word(&mut self, byte_address: u16, value: u16) {
        self.oam_low[((byte_address >> 1) & 0xFF) as usize] = value;
    }

    /// Write a single OAM byte without going through the data port's low byte latch
    pub fn write_oam_byte(&mut self, address: u16, value: u8) {
        let address = address & 0x3FF;
        if address >= 0x200 {
            self.write_oam_high(address, value);
        } else {
            let word = &mut self.oam_low[(address >> 1) as usize];
            if address.bit(0) {
                word.set_msb(value);
            } else {
                word.set_lsb(value);
            }
        }
    }

    pub fn sprite(&self, index: u8) -> SpriteAttributes {
        let oam_low_addr = usize::from(index & 0x7F) << 1;
        let [x, y] = self.oam_low[oam_low_addr].to_le_bytes();
        let [tile_number_lsb, attributes] = self.oam_low[oam_low_addr + 1].to_le_bytes();

        let oam_high_shift = 2 * (index & 3);
        let oam_high_bits = self.oam_high[usize::from((index & 0x7F) >> 2)] >> oam_high_shift;

        SpriteAttributes {
            x,
            x_negative: oam_high_bits.bit(0),
            y,
            tile_number: u16::from_le_bytes([tile_number_lsb, u8::from(attributes.bit(0))]),
            palette: (attributes >> 1) & 0x07,
            priority: (attributes >> 4) & 0x03,
            x_flip: attributes.bit(6),
            y_flip: attributes.bit(7),
            large: oam_high_bits.bit(1),
        }
    }

    /// Decode one 8-pixel row of a tile into color indices, leftmost pixel first
    pub fn tile_row(&self, bpp: BitsPerPixel, tile_address: u16, row: u16) -> [u8; 8] {
        let mut colors = [0_u8; 8];

        for (tile_col, color) in colors.iter_mut().enumerate() {
            let bit_index = (7 - tile_col) as u8;

            // Bitplanes are stored in interleaved pairs, 8 words per pair
            for plane in (0..bpp.bitplanes()).step_by(2) {
                let word_address = tile_address.wrapping_add(row + 4 * plane as u16);
                let word = self.vram_word(word_address);

                *color |= u8::from(word.bit(bit_index)) << plane;
                *color |= u8::from(word.bit(bit_index + 8)) << (plane + 1);
            }
        }

        colors
    }

    pub fn write_sequence(&self) -> u64 {
        self.stamps.sequence
    }

    /// Most recent write stamp across the VRAM granules covering the given tile
    pub fn tile_stamp(&self, bpp: BitsPerPixel, tile_address: u16) -> u64 {
        let first_granule = tile_address & VRAM_ADDRESS_MASK;
        (0..bpp.tile_size_words() >> VRAM_GRANULE_SHIFT)
            .map(|i| {
                let address = first_granule.wrapping_add(i << VRAM_GRANULE_SHIFT)
                    & VRAM_ADDRESS_MASK;
                self.stamps.vram_granules[(address >> VRAM_GRANULE_SHIFT) as usize]
            })
            .max()
            .unwrap_or(0)
    }

    /// Most recent write stamp across a range of CGRAM entries
    pub fn palette_stamp(&self, entries: Range<u16>) -> u64 {
        entries.map(|index| self.stamps.cgram[(index & 0xFF) as usize]).max().unwrap_or(0)
    }

    pub fn vram(&self) -> &[u16] {
        self.vram.as_slice()
    }

    pub fn cgram(&self) -> &[u16] {
        self.cgram.as_slice()
    }
}
