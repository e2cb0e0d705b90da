//! Side-effecting seams: desktop, time, files.

pub mod assets;
pub mod clock;
pub mod config;
pub mod desktop;
pub mod host;
pub mod sheet;
