mod category;
mod context;
mod event;

pub use category::*;
pub use context::*;
pub use event::*;
