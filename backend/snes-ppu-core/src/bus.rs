//! Collaborators reached through the PPU's register space: the work RAM window at $2180-$2183
//! and the four audio CPU communication ports at $2140-$2143

use bincode::{Decode, Encode};
use snes_ppu_common::boxedarray::BoxedByteArray;

pub const WRAM_LEN: usize = 128 * 1024;

pub trait PortBus {
    fn read_wram(&mut self, address: u32) -> u8;

    fn write_wram(&mut self, address: u32, value: u8);

    /// Read one of the ports that the audio CPU writes to
    fn read_apu_port(&mut self, port: usize) -> u8;

    /// Write one of the ports that the audio CPU reads from
    fn write_apu_port(&mut self, port: usize, value: u8);
}

/// A `PortBus` that owns its work RAM and latches audio port values without running an audio CPU
#[derive(Debug, Clone, Encode, Decode)]
pub struct LatchedPortBus {
    wram: BoxedByteArray<WRAM_LEN>,
    apu_outputs: [u8; 4],
    apu_inputs: [u8; 4],
}

impl LatchedPortBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            wram: BoxedByteArray::new(),
            // Values left in the ports by the audio CPU's boot ROM once it is ready for a transfer
            apu_outputs: [0xAA, 0xBB, 0x00, 0x00],
            apu_inputs: [0; 4],
        }
    }

    #[must_use]
    pub fn wram(&self) -> &[u8] {
        self.wram.as_slice()
    }

    #[must_use]
    pub fn apu_inputs(&self) -> [u8; 4] {
        self.apu_inputs
    }

    pub fn set_apu_output(&mut self, port: usize, value: u8) {
        self.apu_outputs[port & 3] = value;
    }
}

impl Default for LatchedPortBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PortBus for LatchedPortBus {
    fn read_wram(&mut self, address: u32) -> u8 {
        self.wram[(address as usize) & (WRAM_LEN - 1)]
    }

    fn write_wram(&mut self, address: u32, value: u8) {
        self.wram[(address as usize) & (WRAM_LEN - 1)] = value;
    }

    fn read_apu_port(&mut self, port: usize) -> u8 {
        self.apu_outputs[port & 3]
    }

    fn write_apu_port(&mut self, port: usize, value: u8) {
        self.apu_inputs[port & 3] = value;
    }
}
