use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};

/// Maximum number of 8x8 tiles that the tile cache atlas can hold (128x128 tiles)
pub const MAX_TILE_CACHE_SLOTS: u16 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum DisplayOrientation {
    /// Lines are written as rows, 256x224 frame
    #[default]
    Normal,
    /// Lines are written as columns, rotated 90 degrees clockwise into a 224x256 frame
    #[strum(to_string = "Rotated 90°")]
    Rotated90,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum WideWriteMode {
    /// 16-bit writes to VRAM address/data and RAM window address ports are applied in one step
    #[default]
    Combined,
    /// All 16-bit writes are decomposed into two 8-bit writes
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PpuConfig {
    pub frame_skip: bool,
    pub orientation: DisplayOrientation,
    pub wide_write_mode: WideWriteMode,
    pub tile_cache_slots: u16,
}

impl Default for PpuConfig {
    fn default() -> Self {
        Self {
            frame_skip: false,
            orientation: DisplayOrientation::default(),
            wide_write_mode: WideWriteMode::default(),
            tile_cache_slots: MAX_TILE_CACHE_SLOTS,
        }
    }
}

impl Display for PpuConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "frame_skip: {}", self.frame_skip)?;
        writeln!(f, "orientation: {}", self.orientation)?;
        writeln!(f, "wide_write_mode: {}", self.wide_write_mode)?;
        write!(f, "tile_cache_slots: {}", self.tile_cache_slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn default_config() {
        let config = PpuConfig::default();
        assert!(!config.frame_skip);
        assert_eq!(config.orientation, DisplayOrientation::Normal);
        assert_eq!(config.wide_write_mode, WideWriteMode::Combined);
        assert_eq!(config.tile_cache_slots, MAX_TILE_CACHE_SLOTS);
    }

    #[test]
    fn config_display() {
        let display = PpuConfig::default().to_string();
        assert!(display.contains("orientation: Normal"));
        assert!(display.ends_with("tile_cache_slots: 16384"));
    }

    #[test]
    fn enum_display_names() {
        assert_eq!(DisplayOrientation::Normal.to_string(), "Normal");
        assert_eq!(DisplayOrientation::Rotated90.to_string(), "Rotated 90°");
        assert_eq!(WideWriteMode::Combined.to_string(), "Combined");
        assert_eq!(WideWriteMode::Split.to_string(), "Split");

        let config =
            PpuConfig { orientation: DisplayOrientation::Rotated90, ..PpuConfig::default() };
        assert!(config.to_string().contains("orientation: Rotated 90°"));
    }
}
