// =============================================================================
// Technical Indicators Module (C5)
// =============================================================================
//
// Pure, side-effect-free implementations of the technical indicators used by
// the signal synthesizer. Every calculator takes a candle window (oldest to
// newest) and returns a plain value — no shared state, no I/O.

pub mod ema;
pub mod macd;
pub mod pipeline;
pub mod rsi;
pub mod swing;
pub mod volume;
pub mod vwap;

pub use pipeline::compute_snapshot;
