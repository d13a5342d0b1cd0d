use thiserror::Error;

pub type RunResult<T> = Result<T, ExecutionError>;

/// A failure while running a program, tagged with the line that raised it.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[error("line {line}: {kind}")]
pub struct ExecutionError {
    line: usize,
    kind: ErrorKind,
}

impl ExecutionError {
    pub fn new(line: usize, kind: ErrorKind) -> Self {
        Self { line, kind }
    }

    /// 1-based source line of the statement that failed.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The Python-style exception name, as matched by `except` clauses.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Step limit errors belong to the runner, not the program, so `except`
    /// never sees them.
    pub fn is_catchable(&self) -> bool {
        !matches!(self.kind, ErrorKind::StepLimit { .. })
    }
}

#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    #[error("NameError: name '{0}' is not defined")]
    Name(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("AttributeError: {owner} has no attribute '{attribute}'")]
    Attribute { owner: String, attribute: String },
    #[error("ZeroDivisionError: integer division or modulo by zero")]
    ZeroDivision,
    #[error("OverflowError: integer result out of range")]
    Overflow,
    #[error("RecursionError: maximum call depth of {limit} exceeded")]
    Recursion { limit: usize },
    #[error("step limit of {limit} exceeded")]
    StepLimit { limit: u64 },
}

impl ErrorKind {
    pub fn at(self, line: usize) -> ExecutionError {
        ExecutionError::new(line, self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Name(_) => "NameError",
            Self::Type(_) => "TypeError",
            Self::Attribute { .. } => "AttributeError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Overflow => "OverflowError",
            Self::Recursion { .. } => "RecursionError",
            Self::StepLimit { .. } => "StepLimit",
        }
    }

    /// The message without the exception name, as `str(e)` would give it.
    pub fn message(&self) -> String {
        let text = self.to_string();
        let prefix = format!("{}: ", self.name());

        match text.strip_prefix(&prefix) {
            Some(message) => message.to_owned(),
            None => text,
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorKind;

    #[test]
    fn display_names_the_line() {
        let error = ErrorKind::Name("undefinedName".to_owned()).at(27);

        assert_eq!(
            error.to_string(),
            "line 27: NameError: name 'undefinedName' is not defined"
        );
        assert_eq!(error.kind_name(), "NameError");
        assert!(error.is_catchable());
    }

    #[test]
    fn message_drops_the_name() {
        assert_eq!(
            ErrorKind::type_error("unsupported operand").message(),
            "unsupported operand"
        );
        assert_eq!(
            ErrorKind::StepLimit { limit: 5 }.message(),
            "step limit of 5 exceeded"
        );
    }

    #[test]
    fn step_limit_is_not_catchable() {
        assert!(!ErrorKind::StepLimit { limit: 1 }.at(1).is_catchable());
        assert!(ErrorKind::Recursion { limit: 1 }.at(1).is_catchable());
    }
}
