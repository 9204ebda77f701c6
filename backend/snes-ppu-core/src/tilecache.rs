//! Cache of decoded 8x8 tiles packed into a 1024x1024 texel atlas, for hosts that composite
//! backgrounds on a GPU instead of using the scanline renderer.
//!
//! Each slot holds one tile decoded against one palette. Texels are RGBA5551 and stored in the
//! swizzled order that GPU tiled textures expect (see [`TILE_TEXEL_ORDER`]). Entries are
//! re-decoded lazily when the VRAM granules or CGRAM entries they were decoded from have been
//! written since.


use crate::ppu::colortable;
use crate::ppu::{BitsPerPixel, VideoMemory};
use snes_ppu_config::MAX_TILE_CACHE_SLOTS;
use thiserror::Error;

pub const ATLAS_WIDTH_TILES: u16 = 128;
pub const ATLAS_WIDTH_TEXELS: usize = ATLAS_WIDTH_TILES as usize * 8;
pub const TILE_TEXELS: usize = 64;

const KEY_ADDRESS_BITS: u32 = 12;
const NOT_CACHED: u16 = u16::MAX;

/// Storage position within a tile's 64 texels -> `y * 8 + x` of the source pixel.
///
/// Bits 0/2/4 of the storage index are X bits 0/1/2, and bits 1/3/5 are the inverted Y bits, so
/// tile row 0 ends up at the bottom of its 8x8 block.
pub const TILE_TEXEL_ORDER: [u8; TILE_TEXELS] = [
    56, 57, 48, 49, 58, 59, 50, 51, //
    40, 41, 32, 33, 42, 43, 34, 35, //
    60, 61, 52, 53, 62, 63, 54, 55, //
    44, 45, 36, 37, 46, 47, 38, 39, //
    24, 25, 16, 17, 26, 27, 18, 19, //
    8, 9, 0, 1, 10, 11, 2, 3, //
    28, 29, 20, 21, 30, 31, 22, 23, //
    12, 13, 4, 5, 14, 15, 6, 7, //
];

/// Storage position of pixel (x, y) within a tile; inverse of [`TILE_TEXEL_ORDER`]
#[must_use]
pub fn texel_offset(x: u8, y: u8) -> usize {
    let x = usize::from(x & 7);
    let y = usize::from(7 - (y & 7));

    (x & 1) | ((y & 1) << 1) | ((x & 2) << 1) | ((y & 2) << 2) | ((x & 4) << 2) | ((y & 4) << 3)
}

#[derive(Debug, Error)]
pub enum TileCacheError {
    #[error("tile cache capacity must be a power of two between 1 and {MAX_TILE_CACHE_SLOTS}, was {0}")]
    InvalidCapacity(u16),
}

/// Position of a tile in the atlas, in tiles. V counts up from the bottom of the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasCoord {
    pub u: u8,
    pub v: u8,
}

impl AtlasCoord {
    #[must_use]
    pub fn from_slot(slot: u16) -> Self {
        Self { u: (slot & 0x7F) as u8, v: 0x7F - (slot >> 7) as u8 }
    }

    #[must_use]
    pub fn slot(self) -> u16 {
        u16::from(self.u & 0x7F) | (u16::from(0x7F - (self.v & 0x7F)) << 7)
    }

    /// U in the low byte and V in the high byte
    #[must_use]
    pub fn packed(self) -> u16 {
        u16::from_le_bytes([self.u, self.v])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileKey {
    bpp: BitsPerPixel,
    key: u32,
}

#[derive(Debug, Clone, Copy)]
struct SlotOwner {
    key: TileKey,
    decoded_at: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileCacheStats {
    pub lookups: u64,
    pub hits: u64,
    pub decodes: u64,
    pub evictions: u64,
}

fn palette_bits(bpp: BitsPerPixel) -> u32 {
    match bpp {
        BitsPerPixel::Two => 5,
        BitsPerPixel::Four => 4,
        BitsPerPixel::Eight => 0,
    }
}

fn table_index(bpp: BitsPerPixel) -> usize {
    match bpp {
        BitsPerPixel::Two => 0,
        BitsPerPixel::Four => 1,
        BitsPerPixel::Eight => 2,
    }
}

#[derive(Debug, Clone)]
pub struct TileCache {
    // Per bit depth: key -> slot, or NOT_CACHED
    forward: [Vec<u16>; 3],
    owners: Vec<Option<SlotOwner>>,
    atlas: Vec<u16>,
    next_slot: u16,
    stats: TileCacheStats,
}

impl TileCache {
    /// Create a cache with `slots` atlas slots.
    ///
    /// # Errors
    ///
    /// Returns an error if `slots` is not a power of two in `1..=16384`.
    pub fn with_capacity(slots: u16) -> Result<Self, TileCacheError> {
        if slots == 0 || slots > MAX_TILE_CACHE_SLOTS || !slots.is_power_of_two() {
            return Err(TileCacheError::InvalidCapacity(slots));
        }

        let forward = BitsPerPixel::ALL
            .map(|bpp| vec![NOT_CACHED; 1 << (KEY_ADDRESS_BITS + palette_bits(bpp))]);

        Ok(Self {
            forward,
            owners: vec![None; usize::from(slots)],
            atlas: vec![0; usize::from(slots) * TILE_TEXELS],
            next_slot: 0,
            stats: TileCacheStats::default(),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> u16 {
        self.owners.len() as u16
    }

    /// Return the atlas position of the tile at `vram_address` decoded with `palette`, decoding
    /// it first if it is not cached or if its VRAM or palette entries were written since it was
    /// last decoded.
    ///
    /// The address is a VRAM word address and is rounded down to a 16-byte boundary. The palette
    /// is masked to 5 bits for 2bpp and 4 bits for 4bpp, and is ignored for 8bpp.
    pub fn get_or_decode_tile(
        &mut self,
        memory: &VideoMemory,
        bpp: BitsPerPixel,
        palette: u8,
        vram_address: u16,
    ) -> AtlasCoord {
        self.stats.lookups += 1;

        let palette = u32::from(palette) & ((1 << palette_bits(bpp)) - 1);
        let granule = u32::from(vram_address >> 3) & ((1 << KEY_ADDRESS_BITS) - 1);
        let key = TileKey { bpp, key: granule | (palette << KEY_ADDRESS_BITS) };
        let tile_address = (granule << 3) as u16;
        let palette_base = (palette as u16) << bpp.palette_shift();

        let slot = self.forward[table_index(bpp)][key.key as usize];
        if slot != NOT_CACHED {
            if let Some(owner) = self.owners[usize::from(slot)] {
                if owner.key == key {
                    if !Self::is_stale(memory, owner, tile_address, palette_base) {
                        self.stats.hits += 1;
                        return AtlasCoord::from_slot(slot);
                    }

                    self.decode_into(memory, key, tile_address, palette_base, slot);
                    return AtlasCoord::from_slot(slot);
                }
            }
        }

        let slot = self.allocate_slot(key);
        self.decode_into(memory, key, tile_address, palette_base, slot);
        AtlasCoord::from_slot(slot)
    }

    fn is_stale(
        memory: &VideoMemory,
        owner: SlotOwner,
        tile_address: u16,
        palette_base: u16,
    ) -> bool {
        let bpp = owner.key.bpp;
        let palette_entries = palette_base + 1..palette_base + bpp.palette_len();

        memory.tile_stamp(bpp, tile_address) > owner.decoded_at
            || memory.palette_stamp(palette_entries) > owner.decoded_at
    }

    fn allocate_slot(&mut self, key: TileKey) -> u16 {
        let slot = self.next_slot;
        self.next_slot = (self.next_slot + 1) & (self.capacity() - 1);

        if let Some(evicted) = self.owners[usize::from(slot)] {
            let forward = &mut self.forward[table_index(evicted.key.bpp)][evicted.key.key as usize];
            if *forward == slot {
                *forward = NOT_CACHED;
            }
            self.stats.evictions += 1;

            log::trace!("Evicted tile {:?} from atlas slot {slot}", evicted.key);
        }

        self.forward[table_index(key.bpp)][key.key as usize] = slot;
        slot
    }

    fn decode_into(
        &mut self,
        memory: &VideoMemory,
        key: TileKey,
        tile_address: u16,
        palette_base: u16,
        slot: u16,
    ) {
        let rows: [[u8; 8]; 8] =
            std::array::from_fn(|row| memory.tile_row(key.bpp, tile_address, row as u16));

        let start = usize::from(slot) * TILE_TEXELS;
        let texels = &mut self.atlas[start..start + TILE_TEXELS];
        for (texel, &pixel) in texels.iter_mut().zip(&TILE_TEXEL_ORDER) {
            let color = rows[usize::from(pixel / 8)][usize::from(pixel % 8)];
            *texel = if color == 0 {
                0
            } else {
                let cgram_index = (palette_base + u16::from(color)) as u8;
                colortable::snes_to_rgba5551(memory.cgram_color(cgram_index))
            };
        }

        self.owners[usize::from(slot)] =
            Some(SlotOwner { key, decoded_at: memory.write_sequence() });
        self.stats.decodes += 1;
    }

    /// Forget every cached tile; the next lookup of any tile decodes it again
    pub fn clear(&mut self) {
        for table in &mut self.forward {
            table.fill(NOT_CACHED);
        }
        self.owners.fill(None);
        self.next_slot = 0;
    }

    #[must_use]
    pub fn stats(&self) -> TileCacheStats {
        self.stats
    }

    /// Raw atlas texels, 64 per slot in slot order
    #[must_use]
    pub fn atlas_texels(&self) -> &[u16] {
        &self.atlas
    }

    /// RGBA5551 texel for pixel (x, y) of the tile at `coord`, with y = 0 being the tile's top row
    #[must_use]
    pub fn texel(&self, coord: AtlasCoord, x: u8, y: u8) -> u16 {
        let slot = usize::from(coord.slot());
        self.atlas.get(slot * TILE_TEXELS + texel_offset(x, y)).copied().unwrap_or(0)
    }
}
