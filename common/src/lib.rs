//! Types shared between the Lucid CA crates.

pub mod views;
