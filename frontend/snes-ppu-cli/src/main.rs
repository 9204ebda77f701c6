mod images;
mod trace;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use env_logger::Env;
use snes_ppu_common::frontend::{Color, FrameSize};
use snes_ppu_config::{DisplayOrientation, MAX_TILE_CACHE_SLOTS, PpuConfig, WideWriteMode};
use snes_ppu_core::api::SnesPpuInstance;
use snes_ppu_core::ppu::{BitsPerPixel, Ppu};
use std::fs;
use std::path::PathBuf;

const TILE_SHEET_ROW_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TileDepth {
    #[value(name = "2")]
    Two,
    #[value(name = "4")]
    Four,
    #[value(name = "8")]
    Eight,
}

impl From<TileDepth> for BitsPerPixel {
    fn from(value: TileDepth) -> Self {
        match value {
            TileDepth::Two => Self::Two,
            TileDepth::Four => Self::Four,
            TileDepth::Eight => Self::Eight,
        }
    }
}

#[derive(Parser)]
struct Args {
    /// Register trace file path
    #[arg(short = 't', long)]
    trace_path: PathBuf,

    /// Output PNG path for the rendered frame
    #[arg(short = 'o', long)]
    output_path: PathBuf,

    /// Number of frames to render after replaying the trace
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Skip rendering every other frame
    #[arg(long, default_value_t)]
    frame_skip: bool,

    /// Display orientation
    #[arg(long, default_value_t, value_enum)]
    orientation: DisplayOrientation,

    /// How 16-bit port writes are applied
    #[arg(long, default_value_t, value_enum)]
    wide_write_mode: WideWriteMode,

    /// Tile cache capacity in tiles, must be a power of two
    #[arg(long, default_value_t = MAX_TILE_CACHE_SLOTS)]
    tile_cache_slots: u16,

    /// Optional PNG path for a sheet of every tile in VRAM
    #[arg(long)]
    tiles_path: Option<PathBuf>,

    /// Color depth used to decode the VRAM tile sheet
    #[arg(long, default_value = "4", value_enum)]
    tiles_bpp: TileDepth,

    /// Palette used for the VRAM tile sheet (ignored for 8bpp)
    #[arg(long, default_value_t)]
    tiles_palette: u8,

    /// Optional PNG path for the tile cache atlas after caching every visible background tile
    #[arg(long)]
    atlas_path: Option<PathBuf>,
}

impl Args {
    fn ppu_config(&self) -> PpuConfig {
        PpuConfig {
            frame_skip: self.frame_skip,
            orientation: self.orientation,
            wide_write_mode: self.wide_write_mode,
            tile_cache_slots: self.tile_cache_slots,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let trace_text = fs::read_to_string(&args.trace_path)
        .with_context(|| format!("Failed to read trace file '{}'", args.trace_path.display()))?;
    let commands = trace::parse(&trace_text)
        .with_context(|| format!("Invalid trace file '{}'", args.trace_path.display()))?;

    log::info!("Loaded {} commands from '{}'", commands.len(), args.trace_path.display());

    let mut instance = SnesPpuInstance::create(args.ppu_config())?;

    let trace_frames = trace::replay(&mut instance, &commands);
    for _ in 0..args.frames {
        instance.render_frame();
    }

    log::info!("Rendered {} frames", trace_frames + args.frames);

    images::write_png(&args.output_path, instance.frame_size(), instance.frame_buffer())?;

    if let Some(tiles_path) = &args.tiles_path {
        let bpp = args.tiles_bpp.into();
        let tile_count = Ppu::vram_tile_count(bpp);
        let size = FrameSize {
            width: (TILE_SHEET_ROW_LEN * 8) as u32,
            height: (tile_count.div_ceil(TILE_SHEET_ROW_LEN) * 8) as u32,
        };

        let mut pixels = vec![Color::BLACK; size.len()];
        instance.ppu().copy_vram_tiles(&mut pixels, bpp, args.tiles_palette, TILE_SHEET_ROW_LEN);
        images::write_png(tiles_path, size, &pixels)?;
    }

    if let Some(atlas_path) = &args.atlas_path {
        let visible = instance.cache_visible_tiles();
        let stats = instance.tile_cache().stats();
        log::info!(
            "Cached {} visible tiles: {} lookups, {} hits, {} decodes, {} evictions",
            visible.len(),
            stats.lookups,
            stats.hits,
            stats.decodes,
            stats.evictions
        );

        let (size, pixels) = images::unswizzle_atlas(instance.tile_cache());
        images::write_png(atlas_path, size, &pixels)?;
    }

    Ok(())
}
