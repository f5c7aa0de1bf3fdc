use std::fmt::Write;

use crate::frontend::token::{Token, TokenKind};

/// Renders a token list for `--tokens`.
pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for token in tokens {
            self.write_one(&mut out, token);
        }
        out
    }

    fn write_one(&self, out: &mut String, t: &Token) {
        let (colr, reset) = if self.color {
            (self.color(t.kind), Self::RESET)
        } else {
            ("", "")
        };
        let value = match t.kind {
            TokenKind::Ident => t.text.clone(),
            TokenKind::Number => t.val.to_string(),
            TokenKind::CharConst => format!("{:?}", char::from_u32(t.val as u32).unwrap_or('?')),
            _ => t.kind.describe().to_string(),
        };
        let _ = writeln!(
            out,
            "[{:02}:{:02}] {}{:<8} {}{}",
            t.line,
            t.col,
            colr,
            Self::class(t.kind),
            value,
            reset
        );
    }

    fn class(kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            None => "INVALID",
            Eof => "EOF",
            Number => "INT",
            CharConst => "CHAR",
            Ident => "IDENT",
            LPar | RPar | LBrack | RBrack | LBrace | RBrace | Semicolon | Comma | Period => "PUNCT",
            Plus | Minus | Times | Slash | Rem | And | Or => "OP",
            Eql | Neq | Lss | Leq | Gtr | Geq => "CMP",
            Assign | PlusAssign | MinusAssign | TimesAssign | SlashAssign | RemAssign | PlusPlus
            | MinusMinus => "ASSIGN",
            k if k.is_keyword() => "KEYWORD",
            _ => "OTHER",
        }
    }

    fn color(&self, kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            None | Eof => Self::DIM,
            CharConst => Self::GRN,
            Number => Self::CYN,
            Ident => Self::YEL,
            Plus | Minus | Times | Slash | Rem | And | Or => Self::MAG,
            Eql | Neq | Lss | Leq | Gtr | Geq => Self::MAG,
            _ => Self::RESET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::frontend::lexer::Lexer;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_dump() {
        let mut diag = Diagnostics::new();
        let tokens = Lexer::new("x += 'a';").tokenize(&mut diag);
        let text = TokenDumper::new().no_color().dump(&tokens);
        assert_eq!(
            text,
            "[01:01] IDENT    x\n\
             [01:03] ASSIGN   +=\n\
             [01:06] CHAR     'a'\n\
             [01:09] PUNCT    ;\n\
             [01:10] EOF      end of file\n"
        );
    }

    #[test]
    fn test_keywords_and_comparisons() {
        let mut diag = Diagnostics::new();
        let tokens = Lexer::new("while a<=b").tokenize(&mut diag);
        let text = TokenDumper::new().no_color().dump(&tokens);
        let classes: Vec<&str> = text
            .lines()
            .filter_map(|l| l.split_whitespace().nth(1))
            .collect();
        assert_eq!(classes, vec!["KEYWORD", "IDENT", "CMP", "IDENT", "EOF"]);
    }
}
