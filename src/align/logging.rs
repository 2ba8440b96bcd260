//! Explicit logging sinks standing in for `original_source`'s global
//! `DRAGEN_*_LOG` streams (spec §9 "Reshaping source patterns").

/// A sink for per-block pipeline diagnostics. Production code installs
/// [`LogFacadeSink`]; tests may install a capturing sink to assert on emitted
/// messages without depending on global logger state.
pub trait LogSink: Send + Sync {
    fn debug(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Discards everything; used where a sink is required but diagnostics are
/// not interesting (e.g. throwaway benchmarking harnesses).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn debug(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}

/// Forwards to the `log` facade, matching the pack's chosen logging stack
/// (`log` + `env_logger`, installed by the CLI binary).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        messages: Mutex<Vec<String>>,
    }

    impl LogSink for CapturingSink {
        fn debug(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
        fn warn(&self, message: &str) {
            self.messages.lock().unwrap().push(format!("WARN: {message}"));
        }
    }

    #[test]
    fn null_sink_accepts_messages_without_panicking() {
        let sink = NullSink;
        sink.debug("block 3 processed");
        sink.warn("thread pool retrying");
    }

    #[test]
    fn capturing_sink_records_messages() {
        let sink = CapturingSink::default();
        sink.debug("hello");
        sink.warn("careful");
        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.as_slice(), &["hello".to_string(), "WARN: careful".to_string()]);
    }
}
