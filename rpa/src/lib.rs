//! Spreadsheet-to-SICAL data entry automation.
//!
//! This crate drives a desktop accounting form by perceiving it through
//! reference images and entering one spreadsheet row at a time with
//! synthesized keyboard and mouse input. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (cell normalization, column
//!   roles, shared types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting seams (desktop host, clock, configuration,
//!   reference images, spreadsheet loading). Isolated behind traits so the
//!   automation can be driven by a scripted desktop in tests.
//!
//! Orchestration modules ([`locator`], [`injector`], [`dialogs`], [`waiter`],
//! [`row`], [`driver`]) combine the two through a [`session::Session`].

pub mod cancel;
pub mod core;
pub mod dialogs;
pub mod driver;
pub mod exit_codes;
pub mod injector;
pub mod io;
pub mod locator;
pub mod logging;
pub mod progress;
pub mod row;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod waiter;
