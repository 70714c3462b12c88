//! Error taxonomy: a `Copy`, no-payload kind plus a side-channel message.
//!
//! Ground: `lua_vm::lua_error::{LuaError, LuaFullError}` — the teacher
//! splits a cheap-to-propagate `Copy` error code from an optional owned
//! message precisely so the hot path (arithmetic on wrong types, missing
//! method) never allocates, and only the embedder-facing report does. This
//! keeps that split rather than reaching for `thiserror`, since the whole
//! point of the teacher's design is avoiding a heap-allocating error type on
//! the hot path.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The allocator could not satisfy a request under the configured heap
    /// ceiling.
    OutOfMemory,
    /// A primitive or foreign method was called on a receiver type it does
    /// not support.
    TypeMismatch,
    /// A list, map, or buffer index was out of bounds.
    IndexOutOfRange,
    /// A class has no method bound at the requested symbol.
    MethodNotFound,
    /// A module name was not found in the VM's module registry.
    ModuleNotFound,
    /// A module-level variable was referenced before it was defined.
    VariableNotDefined,
    /// The embedder's `load_module` / `bind_foreign_*` callback declined to
    /// service a request.
    ForeignFailure,
    /// A fiber was resumed, called, or transferred into in a state that does
    /// not permit it (already running, already finished, not yet started
    /// where required).
    FiberState,
    /// Catch-all for conditions the core detects but that don't warrant
    /// their own variant; the message carries the detail.
    Runtime,
}

impl ErrorKind {
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::IndexOutOfRange => "index out of range",
            ErrorKind::MethodNotFound => "method not found",
            ErrorKind::ModuleNotFound => "module not found",
            ErrorKind::VariableNotDefined => "variable not defined",
            ErrorKind::ForeignFailure => "foreign call failed",
            ErrorKind::FiberState => "invalid fiber state",
            ErrorKind::Runtime => "runtime error",
        }
    }
}

/// The full, embedder-facing error: a kind plus an owned message. Cloning a
/// `Value`-carrying runtime error into this shape happens exactly once, at
/// the point it crosses out of the core (see `Fiber::error`, which stores a
/// String object instead, per §4.9, to avoid paying this cost mid-execution).
#[derive(Debug, Clone)]
pub struct EmberError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EmberError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
        }
    }
}

impl fmt::Display for EmberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EmberError {}

pub type Result<T> = std::result::Result<T, EmberError>;
