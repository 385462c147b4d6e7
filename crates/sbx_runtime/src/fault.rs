//! Fault records and the host notification seam.
//!
//! The first fault of a run stops the scheduler. It is logged, drawn over the
//! last frame and handed to the host exactly once.

use glam::Vec2;
use mlua::prelude::*;
use sbx_core::map::EntityId;
use thiserror::Error;

use crate::locator::BEHAVIOR_CHUNK;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The behaviour source did not parse.
    Compile,
    /// A hook (or top-level script code) raised.
    Lifecycle,
    /// An engine call referenced a text, sound, object or entity that does
    /// not exist.
    Resource,
}

impl FaultKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Lifecycle => "lifecycle",
            Self::Resource => "resource",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPhase {
    Compile,
    Construct,
    Start,
    Update,
}

impl FaultPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Construct => "construct",
            Self::Start => "start",
            Self::Update => "update",
        }
    }
}

/// Row (and column, when the trace carries one) in the user's own source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub row: u32,
    pub col: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFault {
    pub kind: FaultKind,
    pub phase: FaultPhase,
    pub object_index: usize,
    pub entity_id: Option<EntityId>,
    /// Placement position in squares when the fault was raised.
    pub position: Option<Vec2>,
    /// First line of the error, without the chunk position prefix.
    pub summary: String,
    /// Full error text including any traceback.
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl RuntimeFault {
    /// `Object <i> (line <r> col <c>):`, dropping whatever location parts
    /// are unknown.
    pub fn header(&self) -> String {
        match self.location {
            Some(SourceLocation { row, col: Some(col) }) => {
                format!("Object {} (line {row} col {col}):", self.object_index)
            }
            Some(SourceLocation { row, col: None }) => {
                format!("Object {} (line {row}):", self.object_index)
            }
            None => format!("Object {}:", self.object_index),
        }
    }

    pub fn overlay_lines(&self) -> Vec<String> {
        vec![self.header(), self.summary.clone()]
    }
}

impl std::fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} fault: {} {}",
            self.phase.label(),
            self.kind.label(),
            self.header(),
            self.summary
        )
    }
}

/// Raised by engine calls that name something that does not exist.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    #[error("{0} is not a text")]
    UnknownText(String),
    #[error("{0} is not a sound")]
    UnknownSound(String),
    #[error("{0} is not an object")]
    UnknownObject(i64),
    #[error("entity {0} has been deleted")]
    DeletedEntity(EntityId),
}

/// Receives the run's first fault.
pub trait RuntimeHost {
    fn on_error(&mut self, fault: &RuntimeFault);
}

impl<F: FnMut(&RuntimeFault)> RuntimeHost for F {
    fn on_error(&mut self, fault: &RuntimeFault) {
        self(fault)
    }
}

/// Host that only logs; used when nobody else is listening.
pub struct LogHost;

impl RuntimeHost for LogHost {
    fn on_error(&mut self, fault: &RuntimeFault) {
        log::error!("Runtime halted: {fault}");
    }
}

pub fn classify(err: &LuaError) -> FaultKind {
    if resource_cause(err).is_some() {
        return FaultKind::Resource;
    }
    match root_cause(err) {
        LuaError::SyntaxError { .. } => FaultKind::Compile,
        _ => FaultKind::Lifecycle,
    }
}

pub fn resource_cause(err: &LuaError) -> Option<&ResourceError> {
    match err {
        LuaError::CallbackError { cause, .. } | LuaError::WithContext { cause, .. } => {
            resource_cause(cause)
        }
        LuaError::ExternalError(inner) => inner.downcast_ref::<ResourceError>(),
        _ => None,
    }
}

fn root_cause(err: &LuaError) -> &LuaError {
    match err {
        LuaError::CallbackError { cause, .. } | LuaError::WithContext { cause, .. } => {
            root_cause(cause)
        }
        _ => err,
    }
}

/// First line of the innermost error, with a leading `<behavior>:N:`
/// position stripped.
pub fn summarize(err: &LuaError) -> String {
    let root = match root_cause(err) {
        LuaError::SyntaxError { message, .. } => message.clone(),
        LuaError::RuntimeError(message) => message.clone(),
        other => other.to_string(),
    };
    let first = root.lines().next().unwrap_or_default().trim();
    strip_position(first).to_string()
}

fn strip_position(line: &str) -> &str {
    let Some(rest) = line.strip_prefix(BEHAVIOR_CHUNK) else {
        return line;
    };
    let Some(rest) = rest.strip_prefix(':') else {
        return line;
    };
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return line;
    }
    rest[digits..]
        .strip_prefix(':')
        .map(str::trim_start)
        .unwrap_or(line)
}
