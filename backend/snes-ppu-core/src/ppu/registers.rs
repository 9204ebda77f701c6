use crate::ppu::banks::VideoMemory;
use bincode::{Decode, Encode};
use snes_ppu_common::num::{GetBit, U16Ext, U24Ext};

pub const WRAM_PORT_ADDRESS_MASK: u32 = (1 << 17) - 1;

const OAM_ADDRESS_MASK: u16 = (1 << 10) - 1;
const CGRAM_ADDRESS_MASK: u16 = (1 << 9) - 1;
const VRAM_WORD_ADDRESS_MASK: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum BitsPerPixel {
    Two,
    Four,
    Eight,
}

impl BitsPerPixel {
    pub const OBJ: Self = Self::Four;

    pub const ALL: [Self; 3] = [Self::Two, Self::Four, Self::Eight];

    pub const fn bitplanes(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    pub const fn tile_size_words(self) -> u16 {
        // 8 rows, one word per pair of bitplanes
        4 * self.bitplanes() as u16
    }

    /// Number of CGRAM entries in one palette of this depth
    pub const fn palette_len(self) -> u16 {
        1 << self.bitplanes()
    }

    /// Shift applied to a tilemap palette select to produce a CGRAM offset; 8bpp tiles shift the
    /// select bits out of the 8-bit color index entirely
    pub const fn palette_shift(self) -> u8 {
        self.bitplanes() as u8
    }
}

/// Display mode, BGMODE bits 0-2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum BgMode {
    #[default]
    Mode0,
    Mode1,
    Mode2,
    Mode3,
    Mode4,
    Mode5,
    Mode6,
    Mode7,
}

const TWO: Option<BitsPerPixel> = Some(BitsPerPixel::Two);
const FOUR: Option<BitsPerPixel> = Some(BitsPerPixel::Four);
const EIGHT: Option<BitsPerPixel> = Some(BitsPerPixel::Eight);

// BG1-BG4 color depth per mode. Offset-per-tile and hi-res are ignored, and the mode 7 affine
// layer is not drawn.
const LAYER_DEPTHS: [[Option<BitsPerPixel>; 4]; 8] = [
    [TWO, TWO, TWO, TWO],
    [FOUR, FOUR, TWO, None],
    [FOUR, FOUR, None, None],
    [EIGHT, FOUR, None, None],
    [EIGHT, TWO, None, None],
    [FOUR, TWO, None, None],
    [FOUR, None, None, None],
    [None, None, None, None],
];

impl BgMode {
    const ALL: [Self; 8] = [
        Self::Mode0,
        Self::Mode1,
        Self::Mode2,
        Self::Mode3,
        Self::Mode4,
        Self::Mode5,
        Self::Mode6,
        Self::Mode7,
    ];

    fn from_bits(value: u8) -> Self {
        Self::ALL[usize::from(value & 0x07)]
    }

    /// Color depth of background layer `bg` (0-3), or `None` if this mode doesn't draw it
    pub fn layer_depth(self, bg: usize) -> Option<BitsPerPixel> {
        LAYER_DEPTHS[self as usize].get(bg).copied().flatten()
    }
}

/// Tilemap dimensions from BGnSC bits 0-1. A map is made of 1-4 screens of 32x32 entries, each
/// screen 1024 words long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct BgMapSize {
    pub wide: bool,
    pub tall: bool,
}

impl BgMapSize {
    fn from_bits(value: u8) -> Self {
        Self { wide: value.bit(0), tall: value.bit(1) }
    }

    pub fn width_pixels(self) -> u16 {
        if self.wide { 512 } else { 256 }
    }

    pub fn height_pixels(self) -> u16 {
        if self.tall { 512 } else { 256 }
    }

    /// Word offset of the screen that holds pixel (x, y), which must already be wrapped to the
    /// map size. Screens are stored left to right, then top to bottom.
    pub fn screen_offset(self, x: u16, y: u16) -> u16 {
        let col = u16::from(x >= 256);
        let row = u16::from(y >= 256);
        let screens_per_row = if self.wide { 2 } else { 1 };
        (row * screens_per_row + col) * 1024
    }
}

// (small, large) OBJ width and height for each of the 8 OBSEL size presets
const OBJ_SIZE_PRESETS: [[(u16, u16); 2]; 8] = [
    [(8, 8), (16, 16)],
    [(8, 8), (32, 32)],
    [(8, 8), (64, 64)],
    [(16, 16), (32, 32)],
    [(16, 16), (64, 64)],
    [(32, 32), (64, 64)],
    [(16, 32), (32, 64)],
    [(16, 32), (32, 32)],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VramIncrementMode {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Registers {
    pub bg_mode: BgMode,
    pub mode_1_bg3_priority: bool,
    pub bg_map_size: [BgMapSize; 4],
    pub bg_map_address: [u16; 4],
    pub bg_tile_address: [u16; 4],
    pub bg_scroll_x: [u16; 4],
    pub bg_scroll_y: [u16; 4],
    // Last byte written to any scroll register
    pub scroll_latch: u8,
    pub obj_tile_address: u16,
    // Extra distance between the first and second OBJ name tables
    pub obj_table_gap: u16,
    // Indexed by a sprite's size-select bit
    pub obj_sizes: [(u16, u16); 2],
    pub sub_backdrop_color: u16,
    pub vram_increment_step: u16,
    pub vram_increment_mode: VramIncrementMode,
    pub vram_address: u16,
    pub vram_prefetch_buffer: u16,
    // Byte address; $200-$21F is the high table
    pub oam_address: u16,
    pub oam_reload_address: u16,
    pub oam_priority_rotation: bool,
    pub first_sprite: u8,
    pub oam_write_buffer: u8,
    // Byte address; 2 bytes per color
    pub cgram_address: u16,
    pub cgram_write_buffer: u8,
    pub wram_port_address: u32,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            bg_mode: BgMode::default(),
            mode_1_bg3_priority: false,
            bg_map_size: [BgMapSize::default(); 4],
            bg_map_address: [0; 4],
            bg_tile_address: [0; 4],
            bg_scroll_x: [0; 4],
            bg_scroll_y: [0; 4],
            scroll_latch: 0,
            obj_tile_address: 0,
            obj_table_gap: 0,
            obj_sizes: OBJ_SIZE_PRESETS[0],
            sub_backdrop_color: 0,
            vram_increment_step: 1,
            vram_increment_mode: VramIncrementMode::default(),
            vram_address: 0,
            vram_prefetch_buffer: 0,
            oam_address: 0,
            oam_reload_address: 0,
            oam_priority_rotation: false,
            first_sprite: 0,
            oam_write_buffer: 0,
            cgram_address: 0,
            cgram_write_buffer: 0,
            wram_port_address: 0,
        }
    }

    pub fn write_obj_select(&mut self, value: u8) {
        // Name base in 8K-word steps, name table gap in 4K-word steps, then the size preset
        self.obj_tile_address = u16::from(value & 0x07) << 13;
        self.obj_table_gap = u16::from((value >> 3) & 0x03) << 12;
        self.obj_sizes = OBJ_SIZE_PRESETS[usize::from(value >> 5)];

        log::trace!(
            "  OBJ tiles at {:04X}, gap {:04X}, sizes {:?}",
            self.obj_tile_address,
            self.obj_table_gap,
            self.obj_sizes
        );
    }

    pub fn write_bg_mode(&mut self, value: u8) {
        self.bg_mode = BgMode::from_bits(value);
        self.mode_1_bg3_priority = value.bit(3);

        if value & 0xF0 != 0 {
            log::debug!("16x16 BG tiles requested ({value:02X}); rendering as 8x8");
        }

        log::trace!("  {:?}, BG3 priority: {}", self.bg_mode, self.mode_1_bg3_priority);
    }

    pub fn write_bg_map(&mut self, bg: usize, value: u8) {
        // Bits 2-7 select the map in 1K-word pages
        self.bg_map_size[bg] = BgMapSize::from_bits(value);
        self.bg_map_address[bg] = u16::from(value >> 2) << 10;

        log::trace!(
            "  BG{} map at {:04X}, size {:?}",
            bg + 1,
            self.bg_map_address[bg],
            self.bg_map_size[bg]
        );
    }

    /// One nibble per layer, low nibble first, in 4K-word pages
    pub fn write_bg_tile_addresses(&mut self, first_bg: usize, value: u8) {
        for (bg, page) in [(first_bg, value & 0x0F), (first_bg + 1, value >> 4)] {
            self.bg_tile_address[bg] = u16::from(page) << 12;
            log::trace!("  BG{} tiles at {:04X}", bg + 1, self.bg_tile_address[bg]);
        }
    }

    pub fn write_bg_scroll_x(&mut self, bg: usize, value: u8) {
        // Bits 0-2 of the low byte survive from the previous high byte; the rest come from the
        // shared latch
        let fine = self.bg_scroll_x[bg].msb() & 0x07;
        self.bg_scroll_x[bg] = u16::from_le_bytes([(self.scroll_latch & !0x07) | fine, value]);
        self.scroll_latch = value;

        log::trace!("  BG{} X scroll: {:04X}", bg + 1, self.bg_scroll_x[bg]);
    }

    pub fn write_bg_scroll_y(&mut self, bg: usize, value: u8) {
        self.bg_scroll_y[bg] = u16::from_le_bytes([self.scroll_latch, value]);
        self.scroll_latch = value;

        log::trace!("  BG{} Y scroll: {:04X}", bg + 1, self.bg_scroll_y[bg]);
    }

    pub fn write_sub_backdrop(&mut self, value: u8) {
        let intensity = u16::from(value & 0x1F);

        // Bits 5/6/7 select R/G/B
        for (select_bit, shift) in [(5, 0), (6, 5), (7, 10)] {
            if value.bit(select_bit) {
                self.sub_backdrop_color =
                    (self.sub_backdrop_color & !(0x1F << shift)) | (intensity << shift);
            }
        }

        log::trace!("  Sub screen backdrop color: {:04X}", self.sub_backdrop_color);
    }

    pub fn write_oam_address_low(&mut self, value: u8) {
        self.oam_address = (self.oam_address & 0x200) | (u16::from(value) << 1);
        self.latch_oam_address();
    }

    pub fn write_oam_address_high(&mut self, value: u8) {
        self.oam_address = (self.oam_address & 0x1FE) | (u16::from(value & 0x01) << 9);
        self.oam_priority_rotation = value.bit(7);
        self.latch_oam_address();
    }

    fn latch_oam_address(&mut self) {
        self.oam_reload_address = self.oam_address;
        self.first_sprite =
            if self.oam_priority_rotation { ((self.oam_address >> 1) & 0x7F) as u8 } else { 0 };

        log::trace!("  OAM address: {:03X}, first sprite: {}", self.oam_address, self.first_sprite);
    }

    pub fn increment_oam_address(&mut self) {
        self.oam_address = (self.oam_address + 1) & OAM_ADDRESS_MASK;
    }

    pub fn reload_oam_address(&mut self) {
        self.oam_address = self.oam_reload_address;
    }

    pub fn write_vram_increment(&mut self, value: u8) {
        self.vram_increment_step = match value & 0x03 {
            0x00 => 1,
            0x01 => 32,
            _ => 128,
        };
        self.vram_increment_mode =
            if value.bit(7) { VramIncrementMode::High } else { VramIncrementMode::Low };

        // Address remapping (bits 2-3) and bits 4-6 are not supported
        if value & 0x7C != 0 {
            log::warn!("Unsupported VRAM increment settings in VMAIN write: {value:02X}");
        }

        log::trace!(
            "  VRAM step {} on {:?} byte",
            self.vram_increment_step,
            self.vram_increment_mode
        );
    }

    pub fn write_vram_address_low(&mut self, value: u8, memory: &VideoMemory) {
        let mut address = self.vram_address;
        address.set_lsb(value);
        self.set_vram_address(address, memory);
    }

    pub fn write_vram_address_high(&mut self, value: u8, memory: &VideoMemory) {
        let mut address = self.vram_address;
        address.set_msb(value);
        self.set_vram_address(address, memory);
    }

    /// Every address write refills the prefetch buffer from the new address
    pub fn set_vram_address(&mut self, address: u16, memory: &VideoMemory) {
        self.vram_address = address & VRAM_WORD_ADDRESS_MASK;
        self.vram_prefetch_buffer = memory.vram_word(self.vram_address);

        log::trace!("  VRAM data port address: {:04X}", self.vram_address);
    }

    pub fn increment_vram_address(&mut self) {
        self.vram_address =
            self.vram_address.wrapping_add(self.vram_increment_step) & VRAM_WORD_ADDRESS_MASK;
    }

    pub fn write_cgram_address(&mut self, value: u8) {
        self.cgram_address = u16::from(value) << 1;

        log::trace!("  CGRAM data port color: {value:02X}");
    }

    pub fn increment_cgram_address(&mut self) {
        self.cgram_address = (self.cgram_address + 1) & CGRAM_ADDRESS_MASK;
    }

    pub fn write_wram_address_low(&mut self, value: u8) {
        self.wram_port_address.set_low_byte(value);
        log::trace!("  WRAM port address: {:05X}", self.wram_port_address);
    }

    pub fn write_wram_address_mid(&mut self, value: u8) {
        self.wram_port_address.set_mid_byte(value);
        log::trace!("  WRAM port address: {:05X}", self.wram_port_address);
    }

    pub fn write_wram_address_high(&mut self, value: u8) {
        // Only bit 16 exists
        self.wram_port_address.set_high_byte(value & 0x01);
        log::trace!("  WRAM port address: {:05X}", self.wram_port_address);
    }

    pub fn increment_wram_port_address(&mut self) {
        self.wram_port_address = (self.wram_port_address + 1) & WRAM_PORT_ADDRESS_MASK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn sub_backdrop_channel_select() {
        let mut registers = Registers::new();

        // R and B in one write
        registers.write_sub_backdrop(0xA0 | 0x1F);
        assert_eq!(registers.sub_backdrop_color, 0x7C1F);

        // G only; R and B retained
        registers.write_sub_backdrop(0x40 | 0x05);
        assert_eq!(registers.sub_backdrop_color, 0x7C1F | (0x05 << 5));

        // No channel selected
        registers.write_sub_backdrop(0x1F);
        assert_eq!(registers.sub_backdrop_color, 0x7C1F | (0x05 << 5));
    }

    #[test]
    fn x_scroll_keeps_fine_bits_of_previous_high_byte() {
        let mut registers = Registers::new();

        registers.write_bg_scroll_x(0, 0xFD);
        registers.write_bg_scroll_x(0, 0x01);
        // Latch $FD contributes $F8, previous high byte $FD contributes 5
        assert_eq!(registers.bg_scroll_x[0], 0x01FD);
    }

    #[test]
    fn obj_select_presets() {
        let mut registers = Registers::new();
        assert_eq!(registers.obj_sizes, [(8, 8), (16, 16)]);

        registers.write_obj_select(0xC0 | 0x18 | 0x03);
        assert_eq!(registers.obj_sizes, [(16, 32), (32, 64)]);
        assert_eq!(registers.obj_tile_address, 0x6000);
        assert_eq!(registers.obj_table_gap, 0x3000);

        registers.write_obj_select(0xE0);
        assert_eq!(registers.obj_sizes, [(16, 32), (32, 32)]);
    }

    #[test]
    fn layer_depths_per_mode() {
        use BitsPerPixel::{Eight, Four, Two};

        let depths = |mode: BgMode| -> Vec<_> { (0..4).map(|bg| mode.layer_depth(bg)).collect() };

        assert_eq!(depths(BgMode::Mode0), [Some(Two); 4]);
        assert_eq!(depths(BgMode::Mode1), [Some(Four), Some(Four), Some(Two), None]);
        assert_eq!(depths(BgMode::Mode3), [Some(Eight), Some(Four), None, None]);
        assert_eq!(depths(BgMode::Mode6), [Some(Four), None, None, None]);
        assert_eq!(depths(BgMode::Mode7), [None; 4]);

        let mut registers = Registers::new();
        registers.write_bg_mode(0x09);
        assert_eq!(registers.bg_mode, BgMode::Mode1);
        assert!(registers.mode_1_bg3_priority);
    }

    #[test]
    fn map_screen_offsets() {
        let one = BgMapSize::from_bits(0);
        let wide = BgMapSize::from_bits(1);
        let tall = BgMapSize::from_bits(2);
        let both = BgMapSize::from_bits(3);

        assert_eq!((wide.width_pixels(), wide.height_pixels()), (512, 256));
        assert_eq!((tall.width_pixels(), tall.height_pixels()), (256, 512));

        assert_eq!(one.screen_offset(255, 255), 0);
        assert_eq!(wide.screen_offset(256, 0), 0x400);
        assert_eq!(tall.screen_offset(0, 256), 0x400);
        assert_eq!(both.screen_offset(0, 256), 0x800);
        assert_eq!(both.screen_offset(256, 256), 0xC00);
    }

    #[test]
    fn tilemap_and_tileset_addresses() {
        let mut registers = Registers::new();

        registers.write_bg_map(2, 0x7B);
        assert_eq!(registers.bg_map_address[2], 0x7800);
        assert_eq!(registers.bg_map_size[2], BgMapSize { wide: true, tall: true });

        registers.write_bg_tile_addresses(0, 0x52);
        assert_eq!(registers.bg_tile_address[0], 0x2000);
        assert_eq!(registers.bg_tile_address[1], 0x5000);
    }

    #[test]
    fn wram_port_address_wraps_at_128k() {
        let mut registers = Registers::new();

        registers.write_wram_address_low(0xFF);
        registers.write_wram_address_mid(0xFF);
        registers.write_wram_address_high(0xFF);
        assert_eq!(registers.wram_port_address, 0x1FFFF);

        registers.increment_wram_port_address();
        assert_eq!(registers.wram_port_address, 0);
    }
}
