// src/engine/mod.rs
//
// The adaptive core: per-section level adjustment driven by answer
// streaks, cross-section propagation of level shifts, and the terminal
// aggregation into a test-level score, level and narrative feedback.

pub mod adjuster;
pub mod config;
pub mod finalizer;
pub mod propagator;
