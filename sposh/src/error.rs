//! Error taxonomy for plan compilation and capability registration.
//!
//! Build-time errors are typed so hosts can tell a malformed plan from a plan
//! that does not fit the registered behaviours. Runtime failures raised by
//! capabilities are plain `anyhow::Error`s and pass through the engine
//! untouched.

use thiserror::Error;

/// An illegal character found while lexing. Non-fatal: the lexer skips it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line}: illegal character '{ch}'")]
pub struct LexError {
    pub line: usize,
    pub ch: char,
}

/// A grammar violation or unexpected end of input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Which kind of plan node a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Competence,
    ActionPattern,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Competence => f.write_str("competence"),
            NodeKind::ActionPattern => f.write_str("action pattern"),
        }
    }
}

/// Which registry set a capability name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Action,
    Sense,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Action => f.write_str("action"),
            CapabilityKind::Sense => f.write_str("sense"),
        }
    }
}

/// A plan name that cannot be bound unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameResolutionError {
    #[error("more than one {kind} named '{name}'")]
    DuplicateNode { kind: NodeKind, name: String },

    #[error("{kind} name '{name}' clashes with {other} of the same name")]
    NodeClash {
        kind: NodeKind,
        name: String,
        other: NodeKind,
    },

    #[error("{kind} name '{name}' clashes with {capability} of the same name")]
    CapabilityClash {
        kind: NodeKind,
        name: String,
        capability: CapabilityKind,
    },

    #[error("no action, competence or action pattern named '{name}' found")]
    NotFound { name: String },

    #[error("{kind} '{name}' not provided by any behaviour")]
    CapabilityNotFound { kind: CapabilityKind, name: String },

    #[error("action '{name}' is also the name of a competence or action pattern")]
    ActionClash { name: String },

    #[error("action pattern '{pattern}' cannot use '{name}' here: {reason}")]
    IllegalPatternStep {
        pattern: String,
        name: String,
        reason: &'static str,
    },

    #[error("plan has no drive collection, competence or action pattern to run")]
    NoRoot,
}

/// A drive-collection tag the engine does not implement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("drive collection of type '{tag}' not supported (expected SDC, SRDC, DC or RDC)")]
pub struct UnsupportedVariantError {
    pub tag: String,
}

/// Everything that can abort `compile`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    NameResolution(#[from] NameResolutionError),
    #[error(transparent)]
    UnsupportedVariant(#[from] UnsupportedVariantError),
}

/// Rejected behaviour registrations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("behaviour '{0}' cannot be registered twice")]
    DuplicateBehaviour(String),

    #[error("{kind} '{name}' registered twice: by '{first}' and '{second}'")]
    DuplicateCapability {
        kind: CapabilityKind,
        name: String,
        first: String,
        second: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_uses_line_prefix() {
        let err = SyntaxError::new(7, "expected ')'");
        assert_eq!(err.to_string(), "Line 7: expected ')'");
    }

    #[test]
    fn compile_error_is_transparent() {
        let err: CompileError = NameResolutionError::NotFound {
            name: "doThing".to_string(),
        }
        .into();
        assert!(err.to_string().contains("doThing"));
    }
}
