//! Presentation-layer state for previewing a generated site.
//!
//! A [`PreviewSession`] owns the working site and keeps the page selection,
//! the sandboxed renderer and the regeneration controller consistent with it.

pub mod frame;
pub mod regenerate;
pub mod renderer;
pub mod selection;
pub mod session;

pub use frame::{FrameSurface, NAVIGATE_MESSAGE};
pub use regenerate::{Completion, Phase, RegenerateError, RegenerationController, Ticket};
pub use renderer::{
    ClickOutcome, LinkClick, SandboxedRenderer, Surface, SurfaceError, link_target,
};
pub use selection::PageSelection;
pub use session::PreviewSession;
