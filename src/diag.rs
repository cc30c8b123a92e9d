//! Process-wide optional diagnostics. A sink is installed at most once at
//! startup; reporting with no sink installed is a no-op, so core logic never
//! depends on one being present.

use std::sync::OnceLock;

/// Receiver for diagnostic events.
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, event: &str, context: &str);
}

static SINK: OnceLock<Box<dyn DiagnosticsSink>> = OnceLock::new();

/// Install the process-wide sink. Returns false if one was already installed.
pub fn init(sink: Box<dyn DiagnosticsSink>) -> bool {
    SINK.set(sink).is_ok()
}

/// Report an event to the installed sink, if any.
pub fn report(event: &str, context: &str) {
    if let Some(sink) = SINK.get() {
        sink.report(event, context);
    }
}
