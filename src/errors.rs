//! Errors

use thiserror::Error;

/// Result of a timing / scaler calculation or of applying it to the adapter.
pub type Result<T> = core::result::Result<T, Error>;

/// Driver errors.
///
/// Any calculation error aborts the mode set or overlay update before a
/// single register is touched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No divider combination satisfies frequency, VCO and PLL input bounds.
    #[error("no PLL divider combination for {target_hz} Hz")]
    NoSolution { target_hz: u32 },

    /// Every CRT timing tweak was tried, none keeps frame drift in bounds.
    #[error("frame rate drift of {max_drift} not achievable within tweak bounds")]
    ToleranceNotAchieved { max_drift: u32 },

    /// Display timing violates `display <= sync_start <= sync_end <= total`.
    #[error("inconsistent display timing")]
    InvalidTiming,

    /// CRT vertical blank too short to cover the TV blank lines, so the
    /// encoder restart point can't be placed.
    #[error("CRT vertical blank shorter than the TV blank")]
    ShortVerticalBlank,

    /// Overlay source or destination has no extent, scale ratio is undefined.
    #[error("overlay source or destination rectangle is empty")]
    InvalidSource,

    /// Hardware never acknowledged the register update lock.
    #[error("register update lock timed out")]
    Timeout,

    /// Timing FIFO collaborator failed.
    #[error("timing FIFO write failed")]
    Fifo,
}
