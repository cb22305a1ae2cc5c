//! Deterministic simulator for the rivet engine boundary.
//!
//! `SimEngine` reads JSON documents (see [`document`]) and implements the
//! engine-side behaviour the handle layer depends on. It is used by the
//! workspace's tests and by the headless demo.

pub mod document;
mod engine;
mod machine;
mod timeline;

pub use document::{Document, SUPPORTED_MAJOR};
pub use engine::{DrawHook, EngineStats, SimEngine};
