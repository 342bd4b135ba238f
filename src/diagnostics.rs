//! Scoped diagnostic context for resolution and session assembly.
//!
//! The context is thread-local so that collaborators (mapper parsers, factories) can
//! record what they are working on without threading a handle through every call.
//! It is only ever populated in synchronous sections and must not be held across an
//! `.await`.

use std::cell::RefCell;
use std::fmt;

thread_local! {
    static CONTEXT: RefCell<ErrorContext> = RefCell::new(ErrorContext::default());
}

/// What the current thread was doing when an error surfaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    resource: Option<String>,
    activity: Option<String>,
    object: Option<String>,
}

impl ErrorContext {
    /// Record the resource (file, URL, logical name) being processed.
    pub fn set_resource(resource: impl Into<String>) {
        let resource = resource.into();
        CONTEXT.with(|ctx| ctx.borrow_mut().resource = Some(resource));
    }

    /// Record the activity in progress.
    pub fn set_activity(activity: impl Into<String>) {
        let activity = activity.into();
        CONTEXT.with(|ctx| ctx.borrow_mut().activity = Some(activity));
    }

    /// Record the object (element id, type name) being worked on.
    pub fn set_object(object: impl Into<String>) {
        let object = object.into();
        CONTEXT.with(|ctx| ctx.borrow_mut().object = Some(object));
    }

    /// Clear everything recorded on this thread.
    pub fn reset() {
        CONTEXT.with(|ctx| *ctx.borrow_mut() = ErrorContext::default());
    }

    /// Copy of the context recorded on this thread.
    pub fn snapshot() -> ErrorContext {
        CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Enter a scope that resets the context when dropped, on every exit path.
    pub fn scope(resource: impl Into<String>) -> ErrorScope {
        Self::reset();
        Self::set_resource(resource);
        ErrorScope { _private: () }
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn activity(&self) -> Option<&str> {
        self.activity.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_none() && self.activity.is_none() && self.object.is_none()
    }

    /// Suffix appended to boundary error messages; empty when nothing was recorded.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" ({})", self)
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(resource) = &self.resource {
            parts.push(format!("the error may exist in {}", resource));
        }
        if let Some(activity) = &self.activity {
            parts.push(format!("the error occurred while {}", activity));
        }
        if let Some(object) = &self.object {
            parts.push(format!("the error may involve {}", object));
        }
        f.write_str(&parts.join("; "))
    }
}

/// RAII guard returned by [`ErrorContext::scope`].
#[must_use = "the diagnostic scope is released as soon as the guard is dropped"]
pub struct ErrorScope {
    _private: (),
}

impl Drop for ErrorScope {
    fn drop(&mut self) {
        ErrorContext::reset();
    }
}
