use serde::{Deserialize, Serialize};

/// Token classification produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Placeholder for invalid input (and the look-ahead before the first scan).
    None,

    // Literals
    Ident,
    Number,
    CharConst,

    // Arithmetic
    Plus,
    Minus,
    Times,
    Slash,
    Rem,

    // Comparison
    Eql,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,

    // Logic
    And,
    Or,

    // Assignment
    Assign,
    PlusAssign,
    MinusAssign,
    TimesAssign,
    SlashAssign,
    RemAssign,
    PlusPlus,
    MinusMinus,

    // Delimiters
    Semicolon,
    Comma,
    Period,
    LPar,
    RPar,
    LBrack,
    RBrack,
    LBrace,
    RBrace,

    // Keywords
    Break,
    Class,
    Continue,
    Else,
    Final,
    If,
    New,
    Print,
    Program,
    Read,
    Return,
    Void,
    While,

    Eof,
}

impl TokenKind {
    /// Looks up a keyword by its spelling.
    pub fn keyword(name: &str) -> Option<TokenKind> {
        Some(match name {
            "break" => TokenKind::Break,
            "class" => TokenKind::Class,
            "continue" => TokenKind::Continue,
            "else" => TokenKind::Else,
            "final" => TokenKind::Final,
            "if" => TokenKind::If,
            "new" => TokenKind::New,
            "print" => TokenKind::Print,
            "program" => TokenKind::Program,
            "read" => TokenKind::Read,
            "return" => TokenKind::Return,
            "void" => TokenKind::Void,
            "while" => TokenKind::While,
            _ => return None,
        })
    }

    /// Surface spelling, used in "expected" diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::None => "none",
            TokenKind::Ident => "identifier",
            TokenKind::Number => "number",
            TokenKind::CharConst => "character constant",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Times => "*",
            TokenKind::Slash => "/",
            TokenKind::Rem => "%",
            TokenKind::Eql => "==",
            TokenKind::Neq => "!=",
            TokenKind::Lss => "<",
            TokenKind::Leq => "<=",
            TokenKind::Gtr => ">",
            TokenKind::Geq => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::TimesAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::RemAssign => "%=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Period => ".",
            TokenKind::LPar => "(",
            TokenKind::RPar => ")",
            TokenKind::LBrack => "[",
            TokenKind::RBrack => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Break => "break",
            TokenKind::Class => "class",
            TokenKind::Continue => "continue",
            TokenKind::Else => "else",
            TokenKind::Final => "final",
            TokenKind::If => "if",
            TokenKind::New => "new",
            TokenKind::Print => "print",
            TokenKind::Program => "program",
            TokenKind::Read => "read",
            TokenKind::Return => "return",
            TokenKind::Void => "void",
            TokenKind::While => "while",
            TokenKind::Eof => "end of file",
        }
    }

    /// Returns true if this token is a reserved word.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Break
                | TokenKind::Class
                | TokenKind::Continue
                | TokenKind::Else
                | TokenKind::Final
                | TokenKind::If
                | TokenKind::New
                | TokenKind::Print
                | TokenKind::Program
                | TokenKind::Read
                | TokenKind::Return
                | TokenKind::Void
                | TokenKind::While
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// A lexeme with its source position.
///
/// `text` holds the spelling of identifiers (and of numbers, for diagnostics);
/// `val` holds the decoded value of number and character constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
    pub val: i32,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, col: usize) -> Self {
        Token {
            kind,
            line,
            col,
            val: 0,
            text: String::new(),
        }
    }
}

/// Pull-based source of tokens that drives the translator.
///
/// Lexical errors are pushed into `diag` as they are found; the source must
/// keep returning `Eof` once the input is exhausted.
pub trait TokenSource {
    fn next_token(&mut self, diag: &mut crate::diagnostics::Diagnostics) -> Token;
}
