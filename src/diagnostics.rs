//! Structured warnings and a single diagnostics funnel.
//!
//! The teacher crate routes every browser-console message through one `logw()` wrapper instead of
//! scattering `console.log` calls across call sites. This crate keeps that shape but drops the
//! browser backend: diagnostics are structured [`Warning`] values passed to a [`WarningSink`]
//! supplied explicitly at reader construction, rather than a process-global logger. The default
//! sink forwards to the `log` crate so existing `log`-based deployments need no extra wiring.

use std::fmt;

/// The structured warnings this crate can raise. Unlike [`crate::error::BamError`], a warning
/// never aborts the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The BGZF EOF marker was not found at the end of the file.
    Truncated,
    /// A non-fatal condition with a free-form message, e.g. an index file that could not be
    /// opened when random access was not required.
    Message(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Truncated => write!(f, "no EOF marker found; file may be truncated"),
            Warning::Message(m) => write!(f, "{m}"),
        }
    }
}

/// A sink that receives [`Warning`]s raised during reading.
///
/// Implementations must be safe to hold behind a shared reference, since a reader may be cloned
/// across `multiple_iterators`-derived instances that all report to the same sink.
pub trait WarningSink: Send + Sync {
    fn warn(&self, warning: &Warning);
}

/// Default sink: forwards every warning to `log::warn!`.
#[derive(Debug, Default)]
pub struct LogWarningSink;

impl WarningSink for LogWarningSink {
    fn warn(&self, warning: &Warning) {
        log::warn!("bamcore: {warning}");
    }
}

/// A sink that silently drops every warning. Useful for tests that intentionally trigger
/// warning-producing conditions and don't want them to reach the global logger.
#[derive(Debug, Default)]
pub struct NullWarningSink;

impl WarningSink for NullWarningSink {
    fn warn(&self, _warning: &Warning) {}
}
