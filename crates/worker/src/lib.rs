//! Task spawning shared by the module and widget loaders.

mod class;
mod spawn;

pub use class::TaskClass;
pub use spawn::spawn;
