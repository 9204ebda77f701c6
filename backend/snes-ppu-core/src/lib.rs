pub mod api;
pub mod bus;
pub mod ppu;
pub mod tilecache;
