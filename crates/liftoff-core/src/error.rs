use std::fmt;

use crate::module::ModuleId;

/// Machine-readable error codes for operator- and agent-friendly decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    ConfigParseError,
    UnknownModule,
    CircularDependency,
    ActivationFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidArgument => "E1001",
            Self::ConfigParseError => "E1002",
            Self::UnknownModule => "E2001",
            Self::CircularDependency => "E2002",
            Self::ActivationFailed => "E3001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidArgument => "Invalid argument",
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownModule => "Unknown module",
            Self::CircularDependency => "Circular module dependency",
            Self::ActivationFailed => "Module activation failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument => {
                Some("Pass a non-empty module id and at least one valid phase name.")
            }
            Self::ConfigParseError => Some("Fix syntax in the liftoff config file and retry."),
            Self::UnknownModule => Some("Register the module before declaring it as a dependency."),
            Self::CircularDependency => {
                Some("Remove or invert one dependency in the reported loop to keep the graph acyclic.")
            }
            Self::ActivationFailed => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the orchestration core.
///
/// Failures coming out of a module's own hooks, observers, or the activator
/// are carried by [`LiftoffError::Activation`] unchanged: the display and
/// source chain are those of the original error.
#[derive(Debug, thiserror::Error)]
pub enum LiftoffError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown module '{0}'")]
    UnknownModule(ModuleId),

    #[error("circular dependency: '{from}' depends on '{to}', which closes the loop {}", .path.join(" → "))]
    CircularDependency {
        /// Dependent side of the edge closing the loop.
        from: ModuleId,
        /// Dependency side of the edge closing the loop.
        to: ModuleId,
        /// The loop, starting and ending at the same module.
        path: Vec<String>,
    },

    #[error(transparent)]
    Activation(#[from] anyhow::Error),
}

impl LiftoffError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigParseError,
            Self::UnknownModule(_) => ErrorCode::UnknownModule,
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::Activation(_) => ErrorCode::ActivationFailed,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type Result<T, E = LiftoffError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, LiftoffError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::InvalidArgument,
            ErrorCode::ConfigParseError,
            ErrorCode::UnknownModule,
            ErrorCode::CircularDependency,
            ErrorCode::ActivationFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::CircularDependency.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn circular_dependency_names_the_loop() {
        let err = LiftoffError::CircularDependency {
            from: "c".into(),
            to: "a".into(),
            path: vec!["c".into(), "a".into(), "b".into(), "c".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'c' depends on 'a'"), "msg: {msg}");
        assert!(msg.contains("c → a → b → c"), "msg: {msg}");
        assert_eq!(err.code(), ErrorCode::CircularDependency);
    }

    #[test]
    fn activation_errors_display_unchanged() {
        let err = LiftoffError::from(anyhow::anyhow!("database unreachable"));
        assert_eq!(err.to_string(), "database unreachable");
        assert_eq!(err.code(), ErrorCode::ActivationFailed);
        assert!(err.hint().is_none());
    }
}
