// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// Every fallible boundary in the engine returns `EngineError` (or wraps one
// via `anyhow::Context` for internal glue code that only needs to propagate,
// not branch on, the failure). Handlers in the HTTP façade map variants to
// status codes per the documented propagation policy.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("rate limited")]
    RateLimited,

    #[error("insufficient data: need {needed} candles, have {have}")]
    InsufficientData { needed: usize, have: usize },

    #[error("out of order: candle openTime {got} <= tail openTime {tail}")]
    OutOfOrder { got: i64, tail: i64 },

    #[error("risk rejected: {0}")]
    RiskRejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this error should be logged at WARN (recovered locally) rather
    /// than ERROR. Matches the propagation policy: rate limiting, data
    /// warm-up, and transient network hiccups are routine, not alarming.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::RateLimited
                | EngineError::InsufficientData { .. }
                | EngineError::Network(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
