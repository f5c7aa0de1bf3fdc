use thiserror::Error;

use crate::bytecode::label::LabelError;

/// Failures that abort a compilation.
///
/// Ordinary source errors never end up here; they are collected as
/// [`Diagnostic`](crate::diagnostics::Diagnostic)s and the pass keeps going.
/// A `CompileError` means the translator itself broke an invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("internal compiler error at {line}:{col}: {source}")]
    Label {
        line: usize,
        col: usize,
        #[source]
        source: LabelError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_position() {
        let err = CompileError::Label {
            line: 3,
            col: 7,
            source: LabelError::DefinedTwice(2),
        };
        assert_eq!(
            err.to_string(),
            "internal compiler error at 3:7: label L2 has been defined twice"
        );
    }
}
