//! Wire-level field tracing through the `log` facade

use log::{log_enabled, trace, Level};
use protocol::codec::{FieldTrace, TraceHook};

/// Logs every encoded or decoded field as one JSON line at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceHook for LogTrace {
    fn on_field(&self, field: &FieldTrace<'_>) {
        if !log_enabled!(Level::Trace) {
            return;
        }
        match serde_json::to_string(field) {
            Ok(line) => trace!("{}", line),
            Err(e) => trace!("{} {}: unserializable ({})", field.name, field.raw.len(), e),
        }
    }
}
