//! Deterministic, pure logic shared by the automation core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod cell;
pub mod columns;
pub mod types;
