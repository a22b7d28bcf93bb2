pub mod config;
pub mod display;

pub use config::*;
pub use display::*;
