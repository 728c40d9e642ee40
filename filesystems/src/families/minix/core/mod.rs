pub mod constants;
pub mod structures;

pub use constants::*;
pub use structures::*;
