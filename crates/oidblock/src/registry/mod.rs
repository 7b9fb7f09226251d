mod builder;
mod registry;

pub use builder::*;
pub use registry::*;
