use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frontend::token::TokenKind;

/// Every user-facing error the compiler can report, with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Message {
    // ---------------------------------------------------------------------
    // Lexical
    // ---------------------------------------------------------------------
    #[error("invalid character {0:?}")]
    InvalidChar(char),
    #[error("empty character constant")]
    EmptyCharConst,
    #[error("undefined escape sequence \\{0}")]
    UndefinedEscape(char),
    #[error("missing quote at end of character constant")]
    MissingQuote,
    #[error("illegal line end in character constant")]
    IllegalLineEnd,
    #[error("unexpected end of file in comment")]
    EofInComment,
    #[error("{0} too big for integer value")]
    BigNum(String),

    // ---------------------------------------------------------------------
    // Syntactic
    // ---------------------------------------------------------------------
    #[error("{0} expected")]
    TokenExpected(TokenKind),
    #[error("invalid declaration")]
    InvalidDecl,
    #[error("invalid statement")]
    InvalidStat,
    #[error("invalid method declaration")]
    MethDecl,
    #[error("invalid factor")]
    InvalidFact,
    #[error("number or character constant expected")]
    ConstDecl,
    #[error("assignment, method call, ++ or -- expected")]
    DesignFollow,
    #[error("assignment operator expected")]
    AssignOp,
    #[error("relational operator expected")]
    RelOp,

    // ---------------------------------------------------------------------
    // Semantic
    // ---------------------------------------------------------------------
    #[error("{0} already declared")]
    DeclName(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} is not a field")]
    NoField(String),
    #[error("type expected")]
    NoType,
    #[error("class type expected")]
    NoClassType,
    #[error("dereferenced object is not a class")]
    NoClass,
    #[error("indexed object is not an array")]
    NoArray,
    #[error("array index must be an integer")]
    ArrayIndex,
    #[error("array size must be an integer")]
    ArraySize,
    #[error("operand must be of type int")]
    NoInt,
    #[error("operands must be of type int")]
    NoIntOp,
    #[error("incompatible types")]
    IncompTypes,
    #[error("only (un)equality checks are allowed for reference types")]
    EqCheck,
    #[error("value expected")]
    NoVal,
    #[error("cannot store to read-only operand")]
    NoVar,
    #[error("called object is not a method")]
    NoMeth,
    #[error("cannot create code operand for this kind of symbol")]
    NoOperand,
    #[error("procedure called as a function")]
    InvalidCall,
    #[error("parameter type mismatch")]
    ParamType,
    #[error("more actual than formal parameters")]
    MoreActualParams,
    #[error("less actual than formal parameters")]
    LessActualParams,
    #[error("void method must not return a value")]
    ReturnVoid,
    #[error("return type must match method type")]
    ReturnType,
    #[error("return value expected")]
    ReturnNoVal,
    #[error("method {0} not found")]
    MethNotFound(String),
    #[error("main method must not have any parameters")]
    MainWithParams,
    #[error("main method must return void")]
    MainNotVoid,
    #[error("break is not within a loop")]
    NoLoopBreak,
    #[error("continue is not within a loop")]
    NoLoopContinue,
    #[error("value of constant does not match its type")]
    ConstType,
    #[error("can only print int or char values")]
    PrintValue,
    #[error("can only read int or char values")]
    ReadValue,
    #[error("too many global variables")]
    TooManyGlobals,
    #[error("too many local variables")]
    TooManyLocals,
    #[error("too many fields")]
    TooManyFields,
    #[error("code too large")]
    CodeTooLarge,
}

impl Message {
    /// True for errors raised by the lexer.
    pub fn is_lexical(&self) -> bool {
        matches!(
            self,
            Message::InvalidChar(_)
                | Message::EmptyCharConst
                | Message::UndefinedEscape(_)
                | Message::MissingQuote
                | Message::IllegalLineEnd
                | Message::EofInComment
                | Message::BigNum(_)
        )
    }

    /// True for grammar errors that trigger synchronization.
    pub fn is_syntactic(&self) -> bool {
        matches!(
            self,
            Message::TokenExpected(_)
                | Message::InvalidDecl
                | Message::InvalidStat
                | Message::MethDecl
                | Message::InvalidFact
                | Message::ConstDecl
                | Message::DesignFollow
                | Message::AssignOp
                | Message::RelOp
        )
    }
}

/// A reported error with source location.
///
/// `line` and `col` are 1-based positions taken from the token the error
/// was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub col: usize,
    pub message: Message,
}

impl std::fmt::Display for Diagnostic {
    /// Formats as `line:col: message` for CLI-friendly diagnostics.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

/// Accumulated diagnostics of one compilation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, line: usize, col: usize, message: Message) {
        tracing::trace!(line, col, %message, "diagnostic");
        self.items.push(Diagnostic { line, col, message });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            line: 4,
            col: 9,
            message: Message::NotFound("foo".to_string()),
        };
        assert_eq!(d.to_string(), "4:9: foo not found");
    }

    #[test]
    fn test_token_expected_uses_spelling() {
        let msg = Message::TokenExpected(TokenKind::Semicolon);
        assert_eq!(msg.to_string(), "; expected");
    }

    #[test]
    fn test_message_classification() {
        assert!(Message::InvalidChar('#').is_lexical());
        assert!(!Message::InvalidChar('#').is_syntactic());
        assert!(Message::InvalidStat.is_syntactic());
        assert!(!Message::IncompTypes.is_syntactic());
        assert!(!Message::IncompTypes.is_lexical());
    }

    #[test]
    fn test_diagnostics_accumulate_in_order() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_empty());
        diag.report(1, 1, Message::NoType);
        diag.report(2, 5, Message::NoVal);
        assert_eq!(diag.len(), 2);
        let lines: Vec<usize> = diag.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![1, 2]);
    }
}
