//! SNES PPU (picture processing unit)

mod background;
mod banks;
pub mod colortable;
mod debug;
mod registers;
mod sprites;


use crate::bus::PortBus;
use crate::ppu::background::BgLayer;
use crate::ppu::registers::{BgMode, Registers, VramIncrementMode};
use bincode::{Decode, Encode};
use snes_ppu_common::frontend::FrameSize;
use snes_ppu_common::num::{GetBit, U16Ext};
use snes_ppu_config::{DisplayOrientation, PpuConfig, WideWriteMode};

pub use background::VisibleTile;
pub use banks::{SpriteAttributes, VideoMemory};
pub use colortable::ColorTable;
pub use registers::BitsPerPixel;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 224;

type LineBuffer = [u16; SCREEN_WIDTH];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawStep {
    Bg { bg: usize, high_priority: bool },
    Obj { priority: u8 },
}

const fn bg(bg: usize, high_priority: bool) -> DrawStep {
    DrawStep::Bg { bg, high_priority }
}

const fn obj(priority: u8) -> DrawStep {
    DrawStep::Obj { priority }
}

// Layers are drawn back to front; each step only draws tiles/sprites of the given priority
const MODE_0_ORDER: &[DrawStep] = &[
    bg(3, false),
    bg(2, false),
    obj(0),
    bg(3, true),
    bg(2, true),
    obj(1),
    bg(1, false),
    bg(0, false),
    obj(2),
    bg(1, true),
    bg(0, true),
    obj(3),
];

const MODE_1_ORDER: &[DrawStep] = &[
    bg(2, false),
    obj(0),
    bg(2, true),
    obj(1),
    bg(1, false),
    bg(0, false),
    obj(2),
    bg(1, true),
    bg(0, true),
    obj(3),
];

// BGMODE bit 3 moves BG3 high priority tiles in front of everything else
const MODE_1_BG3_PRIORITY_ORDER: &[DrawStep] = &[
    bg(2, false),
    obj(0),
    obj(1),
    bg(1, false),
    bg(0, false),
    obj(2),
    bg(1, true),
    bg(0, true),
    obj(3),
    bg(2, true),
];

const MODE_2_TO_6_ORDER: &[DrawStep] = &[
    bg(1, false),
    obj(0),
    bg(0, false),
    obj(1),
    bg(1, true),
    obj(2),
    bg(0, true),
    obj(3),
];

const MODE_7_ORDER: &[DrawStep] = &[obj(0), obj(1), obj(2), obj(3)];

#[derive(Debug, Clone, Encode, Decode)]
struct State {
    frame_count: u64,
    skipping_frame: bool,
    last_rendered_mode: Option<BgMode>,
}

impl State {
    fn new() -> Self {
        Self { frame_count: 0, skipping_frame: false, last_rendered_mode: None }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ppu {
    config: PpuConfig,
    registers: Registers,
    state: State,
    memory: VideoMemory,
    line_buffer: LineBuffer,
}

impl Ppu {
    #[must_use]
    pub fn new(config: PpuConfig) -> Self {
        Self {
            config,
            registers: Registers::new(),
            state: State::new(),
            memory: VideoMemory::new(),
            line_buffer: [0; SCREEN_WIDTH],
        }
    }

    pub fn read_port<B: PortBus>(&mut self, address: u16, bus: &mut B) -> u8 {
        log::trace!("Read PPU register: {address:02X}");

        match address {
            0x38 => {
                // RDOAM: OAM data port, read
                self.read_oam_data_port()
            }
            0x39 => {
                // RDVRAML: VRAM data port, read, low byte
                self.read_vram_data_port_low()
            }
            0x3A => {
                // RDVRAMH: VRAM data port, read, high byte
                self.read_vram_data_port_high()
            }
            0x40..=0x43 => {
                // APUIO0-3: Audio CPU communication ports
                bus.read_apu_port((address & 0x03) as usize)
            }
            0x80 => {
                // WMDATA: WRAM port, read
                let value = bus.read_wram(self.registers.wram_port_address);
                self.registers.increment_wram_port_address();
                value
            }
            0x00..=0x43 | 0x81..=0x83 => {
                log::debug!("Read from unmapped PPU register {address:02X}");
                0
            }
            _ => {
                log::warn!("Read from out-of-range PPU register offset {address:04X}");
                0
            }
        }
    }

    pub fn read_port_16<B: PortBus>(&mut self, address: u16, bus: &mut B) -> u16 {
        let lsb = self.read_port(address, bus);
        let msb = self.read_port(address.wrapping_add(1), bus);
        u16::from_le_bytes([lsb, msb])
    }

    pub fn write_port<B: PortBus>(&mut self, address: u16, value: u8, bus: &mut B) {
        if log::log_enabled!(log::Level::Trace) {
            // Don't log data port writes
            if !matches!(address, 0x04 | 0x18 | 0x19 | 0x22 | 0x80) {
                log::trace!("PPU register write: {address:02X} {value:02X}");
            }
        }

        match address {
            0x01 => self.registers.write_obj_select(value),
            0x02 => self.registers.write_oam_address_low(value),
            0x03 => self.registers.write_oam_address_high(value),
            0x04 => {
                // OAMDATA: OAM data port (write)
                self.write_oam_data_port(value);
            }
            0x05 => self.registers.write_bg_mode(value),
            0x07..=0x0A => {
                let bg = (address - 0x07) as usize;
                self.registers.write_bg_map(bg, value);
            }
            0x0B => self.registers.write_bg_tile_addresses(0, value),
            0x0C => self.registers.write_bg_tile_addresses(2, value),
            0x0D..=0x14 => {
                // BG1HOFS-BG4VOFS: Alternating horizontal/vertical scroll for BG1-4
                let bg = ((address - 0x0D) >> 1) as usize;
                if (address - 0x0D).bit(0) {
                    self.registers.write_bg_scroll_y(bg, value);
                } else {
                    self.registers.write_bg_scroll_x(bg, value);
                }
            }
            0x15 => self.registers.write_vram_increment(value),
            0x16 => self.registers.write_vram_address_low(value, &self.memory),
            0x17 => self.registers.write_vram_address_high(value, &self.memory),
            0x18 => {
                // VMDATAL: VRAM data port (write), low byte
                self.write_vram_data_port_low(value);
            }
            0x19 => {
                // VMDATAH: VRAM data port (write), high byte
                self.write_vram_data_port_high(value);
            }
            0x21 => self.registers.write_cgram_address(value),
            0x22 => {
                // CGDATA: CGRAM data port (write)
                self.write_cgram_data_port(value);
            }
            0x32 => self.registers.write_sub_backdrop(value),
            0x40..=0x43 => {
                // APUIO0-3: Audio CPU communication ports
                bus.write_apu_port((address & 0x03) as usize, value);
            }
            0x80 => {
                // WMDATA: WRAM port, write
                bus.write_wram(self.registers.wram_port_address, value);
                self.registers.increment_wram_port_address();
            }
            0x81 => self.registers.write_wram_address_low(value),
            0x82 => self.registers.write_wram_address_mid(value),
            0x83 => self.registers.write_wram_address_high(value),
            0x00..=0x43 => {
                log::debug!("Write to unmapped PPU register {address:02X}: {value:02X}");
            }
            _ => {
                log::warn!("Write to out-of-range PPU register offset {address:04X}: {value:02X}");
            }
        }
    }

    pub fn write_port_16<B: PortBus>(&mut self, address: u16, value: u16, bus: &mut B) {
        if self.config.wide_write_mode == WideWriteMode::Combined {
            match address {
                0x16 => {
                    self.registers.set_vram_address(value, &self.memory);
                    return;
                }
                0x18 => {
                    // Whole word is written before a single address increment
                    self.memory.write_vram_word(self.registers.vram_address, value);
                    self.registers.increment_vram_address();
                    return;
                }
                0x81 => {
                    self.registers.write_wram_address_low(value.lsb());
                    self.registers.write_wram_address_mid(value.msb());
                    return;
                }
                _ => {}
            }
        }

        self.write_port(address, value.lsb(), bus);
        self.write_port(address.wrapping_add(1), value.msb(), bus);
    }

    fn write_vram_data_port_low(&mut self, value: u8) {
        self.memory.write_vram_lsb(self.registers.vram_address, value);

        if self.registers.vram_increment_mode == VramIncrementMode::Low {
            self.registers.increment_vram_address();
        }
    }

    fn write_vram_data_port_high(&mut self, value: u8) {
        self.memory.write_vram_msb(self.registers.vram_address, value);

        if self.registers.vram_increment_mode == VramIncrementMode::High {
            self.registers.increment_vram_address();
        }
    }

    fn read_vram_data_port_low(&mut self) -> u8 {
        let vram_byte = self.registers.vram_prefetch_buffer.lsb();

        if self.registers.vram_increment_mode == VramIncrementMode::Low {
            // Fill prefetch buffer *before* address increment
            self.fill_vram_prefetch_buffer();
            self.registers.increment_vram_address();
        }

        vram_byte
    }

    fn read_vram_data_port_high(&mut self) -> u8 {
        let vram_byte = self.registers.vram_prefetch_buffer.msb();

        if self.registers.vram_increment_mode == VramIncrementMode::High {
            // Fill prefetch buffer *before* address increment
            self.fill_vram_prefetch_buffer();
            self.registers.increment_vram_address();
        }

        vram_byte
    }

    fn fill_vram_prefetch_buffer(&mut self) {
        self.registers.vram_prefetch_buffer = self.memory.vram_word(self.registers.vram_address);
    }

    fn write_oam_data_port(&mut self, value: u8) {
        let oam_address = self.registers.oam_address;

        if oam_address >= 0x200 {
            // $200-$3FF go straight to the high table; $220-$3FF mirror $200-$21F
            self.memory.write_oam_high(oam_address, value);
        } else if oam_address.bit(0) {
            // Odd address: write the latched low byte and this byte as one word
            let word = u16::from_le_bytes([self.registers.oam_write_buffer, value]);
            self.memory.write_oam_low_word(oam_address - 1, word);
        } else {
            // Even address: latch only
            self.registers.oam_write_buffer = value;
        }

        self.registers.increment_oam_address();
    }

    fn read_oam_data_port(&mut self) -> u8 {
        let value = self.memory.oam_byte(self.registers.oam_address);
        self.registers.increment_oam_address();
        value
    }

    fn write_cgram_data_port(&mut self, value: u8) {
        let cgram_address = self.registers.cgram_address;

        if cgram_address.bit(0) {
            // Only bits 6-0 of high byte are persisted
            let color = u16::from_le_bytes([self.registers.cgram_write_buffer, value & 0x7F]);
            self.memory.write_cgram_color((cgram_address >> 1) as u8, color);
        } else {
            self.registers.cgram_write_buffer = value;
        }

        self.registers.increment_cgram_address();
    }

    /// Restore the OAM address from the value latched by the last OAMADDL/OAMADDH write.
    ///
    /// Must be called once per frame, after the last visible line and before the next frame's
    /// first register access.
    pub fn on_vertical_blank(&mut self) {
        self.registers.reload_oam_address();
    }

    /// Composite one visible line and write it into the frame buffer through the color table.
    ///
    /// The frame buffer must be at least as large as [`Self::frame_size`]. Lines outside the
    /// visible area are ignored.
    pub fn render_scanline<P: Copy>(
        &mut self,
        line: u16,
        color_table: &ColorTable<P>,
        frame_buffer: &mut [P],
    ) {
        if line == 0 {
            self.state.skipping_frame = self.config.frame_skip && self.state.frame_count % 2 == 1;
            self.state.frame_count = self.state.frame_count.wrapping_add(1);

            if self.state.skipping_frame {
                log::trace!("Skipping frame {}", self.state.frame_count);
            }
        }

        if self.state.skipping_frame {
            return;
        }

        if usize::from(line) >= SCREEN_HEIGHT {
            log::debug!("Ignoring render request for non-visible line {line}");
            return;
        }

        let frame_size = self.frame_size();
        if frame_buffer.len() < frame_size.len() {
            log::warn!(
                "Frame buffer of len {} is too small for frame size {frame_size:?}",
                frame_buffer.len()
            );
            return;
        }

        self.compose_line(line);
        self.write_line_to_frame_buffer(line, color_table, frame_buffer);
    }

    fn compose_line(&mut self, line: u16) {
        self.line_buffer.fill(self.memory.cgram_color(0));

        let mode = self.registers.bg_mode;
        if self.state.last_rendered_mode != Some(mode) {
            log::debug!("Rendering in BG mode {mode:?}");
            if mode == BgMode::Mode7 {
                log::debug!("Mode 7 background is not rendered; only sprites will be drawn");
            }
            self.state.last_rendered_mode = Some(mode);
        }

        let draw_order = match mode {
            BgMode::Mode0 => MODE_0_ORDER,
            BgMode::Mode1 if self.registers.mode_1_bg3_priority => MODE_1_BG3_PRIORITY_ORDER,
            BgMode::Mode1 => MODE_1_ORDER,
            BgMode::Mode2 | BgMode::Mode3 | BgMode::Mode4 | BgMode::Mode5 | BgMode::Mode6 => {
                MODE_2_TO_6_ORDER
            }
            BgMode::Mode7 => MODE_7_ORDER,
        };

        for &step in draw_order {
            match step {
                DrawStep::Bg { bg, high_priority } => {
                    let Some(layer) = BgLayer::new(mode, bg) else { continue };
                    background::render_line(
                        &self.memory,
                        &self.registers,
                        layer,
                        line,
                        high_priority,
                        &mut self.line_buffer,
                    );
                }
                DrawStep::Obj { priority } => {
                    sprites::render_line(
                        &self.memory,
                        &self.registers,
                        line,
                        priority,
                        &mut self.line_buffer,
                    );
                }
            }
        }
    }

    fn write_line_to_frame_buffer<P: Copy>(
        &self,
        line: u16,
        color_table: &ColorTable<P>,
        frame_buffer: &mut [P],
    ) {
        let line = usize::from(line);

        match self.config.orientation {
            DisplayOrientation::Normal => {
                let row = &mut frame_buffer[line * SCREEN_WIDTH..(line + 1) * SCREEN_WIDTH];
                for (out, &color) in row.iter_mut().zip(&self.line_buffer) {
                    *out = color_table.get(color);
                }
            }
            DisplayOrientation::Rotated90 => {
                // Each line becomes a column, with line 0 on the right edge
                for (x, &color) in self.line_buffer.iter().enumerate() {
                    frame_buffer[x * SCREEN_HEIGHT + (SCREEN_HEIGHT - 1 - line)] =
                        color_table.get(color);
                }
            }
        }
    }

    #[must_use]
    pub fn frame_size(&self) -> FrameSize {
        match self.config.orientation {
            DisplayOrientation::Normal => {
                FrameSize { width: SCREEN_WIDTH as u32, height: SCREEN_HEIGHT as u32 }
            }
            DisplayOrientation::Rotated90 => {
                FrameSize { width: SCREEN_HEIGHT as u32, height: SCREEN_WIDTH as u32 }
            }
        }
    }

    /// Tilemap entries covering the visible screen for every background layer of the current
    /// mode, for hosts that draw backgrounds from the tile cache. Mode 7 has none.
    #[must_use]
    pub fn visible_bg_tiles(&self) -> Vec<VisibleTile> {
        let mode = self.registers.bg_mode;
        let mut tiles = Vec::new();
        for layer in (0..4).filter_map(|bg| BgLayer::new(mode, bg)) {
            background::visible_tiles(&self.memory, &self.registers, layer, &mut tiles);
        }
        tiles
    }

    /// The most recently composited line, as 15-bit BGR colors
    #[must_use]
    pub fn line_buffer(&self) -> &[u16; SCREEN_WIDTH] {
        &self.line_buffer
    }

    #[must_use]
    pub fn memory(&self) -> &VideoMemory {
        &self.memory
    }

    /// Direct VRAM write that bypasses the data port cursor, e.g. for DMA or loaders
    pub fn write_vram_word(&mut self, word_address: u16, value: u16) {
        self.memory.write_vram_word(word_address, value);
    }

    /// Direct CGRAM write that bypasses the data port latch
    pub fn write_cgram_color(&mut self, index: u8, color: u16) {
        self.memory.write_cgram_color(index, color);
    }

    /// Direct OAM write by 10-bit byte address that bypasses the data port latch
    pub fn write_oam_byte(&mut self, address: u16, value: u8) {
        self.memory.write_oam_byte(address, value);
    }

    #[must_use]
    pub fn config(&self) -> PpuConfig {
        self.config
    }

    pub fn update_config(&mut self, config: PpuConfig) {
        if config.orientation != self.config.orientation {
            log::info!("Display orientation changed to {}", config.orientation);
        }

        self.config = config;
    }

    /// Reset register state while keeping memory contents
    pub fn reset(&mut self) {
        self.registers = Registers::new();
        self.state = State::new();
    }
}
