//! # Engine Error Taxonomy
//!
//! All errors that can cross a system boundary.
//!
//! Per-cell failures are isolated: they mark one cache entry failed and are
//! surfaced to the host through the error channel. The rendering loop never
//! halts on a single bad tile. Only [`EngineError::InternalInvariant`] is
//! fatal-class; the host decides whether to restart the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;

/// Errors that can occur in the map engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A tile or fragment download failed after exhausting retries.
    #[error("download failed for cell {cell}: {reason}")]
    Download {
        /// Cell address the download was for, rendered as `z/x/y`.
        cell: String,
        /// Underlying network/timeout failure.
        reason: String,
    },

    /// A downloaded payload could not be decoded.
    #[error("malformed payload for cell {cell}: {reason}")]
    Decode {
        /// Cell address the payload was for, rendered as `z/x/y`.
        cell: String,
        /// What the decoder rejected.
        reason: String,
    },

    /// A geocoding query could not be resolved.
    #[error("geocoding failed for {query:?}: {reason}")]
    Geocoding {
        /// The query that failed to resolve.
        query: String,
        /// Provider-supplied failure description.
        reason: String,
    },

    /// Invalid configuration, e.g. a zero cache limit.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A system precondition was violated, e.g. a missing singleton entity.
    ///
    /// This is the only fatal error class.
    #[error("engine invariant violated: {0}")]
    InternalInvariant(String),
}

impl EngineError {
    /// Returns `true` for the fatal error class.
    ///
    /// Fatal errors indicate the engine state can no longer be trusted; the
    /// host should dispose and rebuild the engine.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalInvariant(_))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Capacity of the error channel.
///
/// Errors past this bound are dropped; a stuck host must not grow
/// engine memory.
const ERROR_CHANNEL_CAPACITY: usize = 256;

/// Sending half of the engine error channel.
///
/// Cloned into every system context. Reporting never blocks the frame
/// thread.
#[derive(Clone)]
pub struct ErrorReporter {
    sender: Sender<EngineError>,
    fatal_seen: Arc<AtomicBool>,
}

impl ErrorReporter {
    /// Reports an error to the host (non-blocking).
    ///
    /// Returns `false` if the channel was full and the error was dropped.
    /// Fatal errors additionally latch the sink's fatal flag even when
    /// dropped.
    pub fn report(&self, error: EngineError) -> bool {
        if error.is_fatal() {
            tracing::error!(%error, "fatal engine error");
            self.fatal_seen.store(true, Ordering::Release);
        } else {
            tracing::warn!(%error, "engine error");
        }

        match self.sender.try_send(error) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Receiving half of the engine error channel, held by the host.
pub struct ErrorSink {
    receiver: Receiver<EngineError>,
    fatal_seen: Arc<AtomicBool>,
}

impl ErrorSink {
    /// Creates a connected reporter/sink pair.
    #[must_use]
    pub fn channel() -> (ErrorReporter, ErrorSink) {
        let (sender, receiver) = bounded(ERROR_CHANNEL_CAPACITY);
        let fatal_seen = Arc::new(AtomicBool::new(false));
        (
            ErrorReporter {
                sender,
                fatal_seen: Arc::clone(&fatal_seen),
            },
            ErrorSink {
                receiver,
                fatal_seen,
            },
        )
    }

    /// Whether a fatal error was ever reported.
    ///
    /// Sticky; survives `drain`. The host uses it to decide whether the
    /// engine should keep running.
    #[must_use]
    pub fn fatal_seen(&self) -> bool {
        self.fatal_seen.load(Ordering::Acquire)
    }

    /// Drains all pending errors (non-blocking).
    pub fn drain(&self) -> Vec<EngineError> {
        let mut errors = Vec::new();
        while let Ok(error) = self.receiver.try_recv() {
            errors.push(error);
        }
        errors
    }

    /// Returns `true` if errors are waiting to be drained.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let fatal = EngineError::InternalInvariant("missing camera".into());
        assert!(fatal.is_fatal());

        let isolated = EngineError::Download {
            cell: "3/1/2".into(),
            reason: "timeout".into(),
        };
        assert!(!isolated.is_fatal());
    }

    #[test]
    fn test_report_and_drain() {
        let (reporter, sink) = ErrorSink::channel();

        assert!(reporter.report(EngineError::Configuration("cache limit is zero".into())));
        assert!(reporter.report(EngineError::Geocoding {
            query: "Gondor".into(),
            reason: "no such region".into(),
        }));

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_fatal_flag_is_sticky() {
        let (reporter, sink) = ErrorSink::channel();
        assert!(!sink.fatal_seen());

        reporter.report(EngineError::InternalInvariant("camera missing".into()));
        assert!(sink.fatal_seen());

        let _ = sink.drain();
        assert!(sink.fatal_seen());
    }

    #[test]
    fn test_channel_bounded() {
        let (reporter, sink) = ErrorSink::channel();

        for _ in 0..(ERROR_CHANNEL_CAPACITY + 10) {
            let _ = reporter.report(EngineError::Configuration("overflow".into()));
        }

        assert_eq!(sink.drain().len(), ERROR_CHANNEL_CAPACITY);
    }
}
