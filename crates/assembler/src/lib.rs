//! Pure text transforms over a generated site: page resolution, asset
//! inlining and static export.

pub mod export;
pub mod inject;
pub mod pages;

pub use export::export_site;
pub use inject::{assemble, inline_assets};
pub use pages::{entry_point, list_pages, resolve};
