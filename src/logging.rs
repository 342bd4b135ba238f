//! Log implementation selections.
//!
//! The crate always logs through `tracing`; the `logImpl` setting picks whether the
//! configuration's own events are emitted ([`TracingLog`]) or suppressed ([`NoLogging`]).

use crate::types::{TypeDescriptor, TypeKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl TracingLog {
    pub const TYPE_NAME: &'static str = "sqlsession::logging::TracingLog";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::Log)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogging;

impl NoLogging {
    pub const TYPE_NAME: &'static str = "sqlsession::logging::NoLogging";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::Log)
    }
}

/// True when `log_impl` (a resolved log type name) silences configuration events.
pub fn is_silenced(log_impl: Option<&str>) -> bool {
    log_impl == Some(NoLogging::TYPE_NAME)
}
