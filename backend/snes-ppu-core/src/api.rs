//! PPU public interface for hosts: owns the PPU together with its port bus, color table, frame
//! buffer, and tile cache

use crate::bus::{LatchedPortBus, PortBus};
use crate::ppu::{BitsPerPixel, ColorTable, Ppu, SCREEN_HEIGHT};
use crate::tilecache::{AtlasCoord, TileCache, TileCacheError};
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use snes_ppu_common::frontend::{Color, FrameSize};
use snes_ppu_config::PpuConfig;
use thiserror::Error;

pub const VISIBLE_LINES: u16 = SCREEN_HEIGHT as u16;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("Error encoding save state: {0}")]
    Encode(#[from] EncodeError),
    #[error("Error decoding save state: {0}")]
    Decode(#[from] DecodeError),
}

pub struct SnesPpuInstance<B = LatchedPortBus> {
    ppu: Ppu,
    bus: B,
    config: PpuConfig,
    color_table: ColorTable<Color>,
    frame_buffer: Vec<Color>,
    tile_cache: TileCache,
}

impl SnesPpuInstance<LatchedPortBus> {
    /// Create an instance whose port bus owns work RAM and latches audio port values.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured tile cache capacity is invalid.
    pub fn create(config: PpuConfig) -> Result<Self, TileCacheError> {
        Self::with_bus(config, LatchedPortBus::new())
    }
}

impl<B: PortBus> SnesPpuInstance<B> {
    /// # Errors
    ///
    /// Returns an error if the configured tile cache capacity is invalid.
    pub fn with_bus(config: PpuConfig, bus: B) -> Result<Self, TileCacheError> {
        let tile_cache = TileCache::with_capacity(config.tile_cache_slots)?;
        let ppu = Ppu::new(config);
        let frame_buffer = vec![Color::default(); ppu.frame_size().len()];

        log::info!("Created PPU instance with config:\n{config}");

        Ok(Self {
            ppu,
            bus,
            config,
            color_table: ColorTable::rgb888(),
            frame_buffer,
            tile_cache,
        })
    }

    pub fn read_port(&mut self, address: u16) -> u8 {
        self.ppu.read_port(address, &mut self.bus)
    }

    pub fn write_port(&mut self, address: u16, value: u8) {
        self.ppu.write_port(address, value, &mut self.bus);
    }

    pub fn read_port_16(&mut self, address: u16) -> u16 {
        self.ppu.read_port_16(address, &mut self.bus)
    }

    pub fn write_port_16(&mut self, address: u16, value: u16) {
        self.ppu.write_port_16(address, value, &mut self.bus);
    }

    pub fn render_scanline(&mut self, line: u16) {
        self.ppu.render_scanline(line, &self.color_table, &mut self.frame_buffer);
    }

    /// Render every visible line, then run vertical blank housekeeping
    pub fn render_frame(&mut self) {
        for line in 0..VISIBLE_LINES {
            self.render_scanline(line);
        }
        self.on_vertical_blank();
    }

    pub fn on_vertical_blank(&mut self) {
        self.ppu.on_vertical_blank();
    }

    pub fn get_or_decode_tile(
        &mut self,
        bpp: BitsPerPixel,
        palette: u8,
        vram_address: u16,
    ) -> AtlasCoord {
        self.tile_cache.get_or_decode_tile(self.ppu.memory(), bpp, palette, vram_address)
    }

    /// Make sure every background tile on screen is present in the tile cache, returning each
    /// tile's atlas position in the same order as [`Ppu::visible_bg_tiles`]
    pub fn cache_visible_tiles(&mut self) -> Vec<AtlasCoord> {
        self.ppu
            .visible_bg_tiles()
            .into_iter()
            .map(|tile| {
                self.tile_cache.get_or_decode_tile(
                    self.ppu.memory(),
                    tile.bpp,
                    tile.palette,
                    tile.vram_address,
                )
            })
            .collect()
    }

    #[must_use]
    pub fn frame_buffer(&self) -> &[Color] {
        &self.frame_buffer
    }

    #[must_use]
    pub fn frame_size(&self) -> FrameSize {
        self.ppu.frame_size()
    }

    #[must_use]
    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    #[must_use]
    pub fn tile_cache(&self) -> &TileCache {
        &self.tile_cache
    }

    #[must_use]
    pub fn config(&self) -> PpuConfig {
        self.config
    }

    /// # Errors
    ///
    /// Returns an error if the new tile cache capacity is invalid, in which case the config is
    /// left unchanged.
    pub fn reload_config(&mut self, config: PpuConfig) -> Result<(), TileCacheError> {
        if config.tile_cache_slots != self.config.tile_cache_slots {
            self.tile_cache = TileCache::with_capacity(config.tile_cache_slots)?;
        }

        self.ppu.update_config(config);
        self.frame_buffer.resize(self.ppu.frame_size().len(), Color::default());
        self.config = config;

        Ok(())
    }

    /// Reset PPU registers; memory contents and cached tiles are kept
    pub fn reset(&mut self) {
        log::info!("Resetting PPU");
        self.ppu.reset();
    }
}

impl<B: PortBus + Encode + Decode<()>> SnesPpuInstance<B> {
    /// # Errors
    ///
    /// Returns an error if state encoding fails.
    pub fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        let bytes = bincode::encode_to_vec((&self.ppu, &self.bus), bincode::config::standard())?;

        log::debug!("Encoded save state of {} bytes", bytes.len());

        Ok(bytes)
    }

    /// Restore state saved by [`Self::save_state`]. The current config is kept, and the tile
    /// cache is cleared since it may refer to memory contents that no longer exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid save state, in which case the current state
    /// is left unchanged.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), SaveStateError> {
        let ((mut ppu, bus), _): ((Ppu, B), usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;

        ppu.update_config(self.config);
        self.ppu = ppu;
        self.bus = bus;
        self.tile_cache.clear();

        log::info!("Loaded save state");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn small_cache_config() -> PpuConfig {
        PpuConfig { tile_cache_slots: 64, ..PpuConfig::default() }
    }

    #[test]
    fn render_frame_fills_frame_buffer() {
        let mut instance = SnesPpuInstance::create(small_cache_config()).unwrap();

        // Backdrop color through CGADD/CGDATA
        instance.write_port(0x21, 0x00);
        instance.write_port(0x22, 0x1F);
        instance.write_port(0x22, 0x00);

        instance.render_frame();

        assert_eq!(instance.frame_buffer().len(), 256 * 224);
        assert!(instance.frame_buffer().iter().all(|&color| color == Color::rgb(255, 0, 0)));
    }

    #[test]
    fn invalid_cache_capacity() {
        let config = PpuConfig { tile_cache_slots: 1000, ..PpuConfig::default() };
        assert!(matches!(
            SnesPpuInstance::create(config),
            Err(TileCacheError::InvalidCapacity(1000))
        ));

        let mut instance = SnesPpuInstance::create(small_cache_config()).unwrap();
        assert!(instance.reload_config(config).is_err());
        assert_eq!(instance.config().tile_cache_slots, 64);
        assert_eq!(instance.tile_cache().capacity(), 64);
    }

    #[test]
    fn reload_config_resizes_frame_buffer() {
        use snes_ppu_config::DisplayOrientation;

        let mut instance = SnesPpuInstance::create(small_cache_config()).unwrap();
        let rotated =
            PpuConfig { orientation: DisplayOrientation::Rotated90, ..small_cache_config() };
        instance.reload_config(rotated).unwrap();

        assert_eq!(instance.frame_size(), FrameSize { width: 224, height: 256 });
        assert_eq!(instance.frame_buffer().len(), 224 * 256);
    }

    #[test]
    fn save_state_round_trip() {
        let mut instance = SnesPpuInstance::create(small_cache_config()).unwrap();

        instance.write_port(0x05, 0x01);
        instance.write_port_16(0x16, 0x0100);
        instance.write_port_16(0x18, 0xBEEF);
        instance.write_port_16(0x81, 0x0010);
        instance.write_port(0x80, 0x77);

        instance.get_or_decode_tile(BitsPerPixel::Two, 0, 0x0100);
        assert_eq!(instance.tile_cache().stats().decodes, 1);

        let state = instance.save_state().unwrap();

        let mut restored = SnesPpuInstance::create(small_cache_config()).unwrap();
        restored.load_state(&state).unwrap();

        assert_eq!(restored.ppu().memory().vram_word(0x0100), 0xBEEF);
        assert_eq!(restored.bus().wram()[0x0010], 0x77);
        // Data port continues from the saved address
        restored.write_port_16(0x18, 0x1234);
        assert_eq!(restored.ppu().memory().vram_word(0x0101), 0x1234);

        // Loading clears the tile cache
        instance.load_state(&state).unwrap();
        instance.get_or_decode_tile(BitsPerPixel::Two, 0, 0x0100);
        assert_eq!(instance.tile_cache().stats().decodes, 2);
    }

    #[test]
    fn invalid_save_state_is_rejected() {
        let mut instance = SnesPpuInstance::create(small_cache_config()).unwrap();
        instance.write_port(0x05, 0x01);

        assert!(matches!(instance.load_state(&[1, 2, 3]), Err(SaveStateError::Decode(_))));
    }

    #[test]
    fn visible_tiles_are_cached_once() {
        let mut instance = SnesPpuInstance::create(small_cache_config()).unwrap();

        // Every visible tile references tile 0 with palette 0
        let coords = instance.cache_visible_tiles();
        assert_eq!(coords.len(), 4 * 29 * 33);

        // Mode 0 layers use different palette blocks, so one decode per layer
        assert_eq!(instance.tile_cache().stats().decodes, 4);
    }
}
