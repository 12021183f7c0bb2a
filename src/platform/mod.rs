//! Platform abstraction layer
//!
//! The simulation core is host-agnostic; this layer adapts it to a browser
//! requestAnimationFrame loop.

#[cfg(target_arch = "wasm32")]
pub mod web;
