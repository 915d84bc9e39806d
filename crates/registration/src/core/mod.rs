pub mod warning;
pub mod context;
pub mod result;

pub use warning::*;
pub use context::*;
pub use result::*;
