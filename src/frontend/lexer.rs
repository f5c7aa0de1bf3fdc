use crate::diagnostics::{Diagnostics, Message};
use crate::frontend::token::{Token, TokenKind, TokenSource};

/// Character-level scanner for MicroJava source text.
///
/// Tokens are produced one at a time through [`TokenSource::next_token`].
/// Lexical errors are reported into the caller's diagnostics and scanning
/// continues; an invalid character yields a `TokenKind::None` token.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else if ch.is_some() {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Scans the whole input, for tools that want the token list up front.
    pub fn tokenize(&mut self, diag: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(diag);
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn read_name(&mut self, token: &mut Token) {
        let mut name = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        token.kind = TokenKind::keyword(&name).unwrap_or(TokenKind::Ident);
        token.text = name;
    }

    fn read_number(&mut self, token: &mut Token, diag: &mut Diagnostics) {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        token.kind = TokenKind::Number;
        match digits.parse::<i32>() {
            Ok(value) => token.val = value,
            Err(_) => {
                token.val = 0;
                diag.report(token.line, token.col, Message::BigNum(digits.clone()));
            }
        }
        token.text = digits;
    }

    fn read_char_const(&mut self, token: &mut Token, diag: &mut Diagnostics) {
        token.kind = TokenKind::CharConst;
        self.advance(); // opening quote

        match self.current() {
            Some('\'') => {
                diag.report(token.line, token.col, Message::EmptyCharConst);
                self.advance();
                return;
            }
            Some('\\') => {
                self.advance();
                match self.current() {
                    Some('\'') => token.val = '\'' as i32,
                    Some('\\') => token.val = '\\' as i32,
                    Some('r') => token.val = '\r' as i32,
                    Some('n') => token.val = '\n' as i32,
                    Some(ch) => {
                        diag.report(token.line, token.col, Message::UndefinedEscape(ch));
                    }
                    None => {}
                }
            }
            Some('\n') | None => {
                diag.report(token.line, token.col, Message::IllegalLineEnd);
                return;
            }
            Some(ch) => token.val = ch as i32,
        }

        // closing quote
        self.advance();
        if self.current() == Some('\'') {
            self.advance();
        } else {
            diag.report(token.line, token.col, Message::MissingQuote);
        }
    }

    /// Skips a (possibly nested) block comment; the cursor is on the `/`.
    fn skip_comment(&mut self, token: &Token, diag: &mut Diagnostics) {
        self.advance(); // '/'
        self.advance(); // '*'

        let mut depth = 1;
        while depth > 0 {
            match (self.current(), self.peek()) {
                (None, _) => {
                    diag.report(token.line, token.col, Message::EofInComment);
                    return;
                }
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                (Some('*'), Some('/')) => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Reads an operator or delimiter, returning `None` for an invalid character.
    fn read_operator(&mut self, ch: char) -> Option<TokenKind> {
        let next = self.peek();

        let (kind, width) = match (ch, next) {
            ('=', Some('=')) => (TokenKind::Eql, 2),
            ('!', Some('=')) => (TokenKind::Neq, 2),
            ('<', Some('=')) => (TokenKind::Leq, 2),
            ('>', Some('=')) => (TokenKind::Geq, 2),
            ('&', Some('&')) => (TokenKind::And, 2),
            ('|', Some('|')) => (TokenKind::Or, 2),
            ('+', Some('=')) => (TokenKind::PlusAssign, 2),
            ('+', Some('+')) => (TokenKind::PlusPlus, 2),
            ('-', Some('=')) => (TokenKind::MinusAssign, 2),
            ('-', Some('-')) => (TokenKind::MinusMinus, 2),
            ('*', Some('=')) => (TokenKind::TimesAssign, 2),
            ('/', Some('=')) => (TokenKind::SlashAssign, 2),
            ('%', Some('=')) => (TokenKind::RemAssign, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('<', _) => (TokenKind::Lss, 1),
            ('>', _) => (TokenKind::Gtr, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Times, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Rem, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('.', _) => (TokenKind::Period, 1),
            ('(', _) => (TokenKind::LPar, 1),
            (')', _) => (TokenKind::RPar, 1),
            ('[', _) => (TokenKind::LBrack, 1),
            (']', _) => (TokenKind::RBrack, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            _ => return None,
        };

        for _ in 0..width {
            self.advance();
        }
        Some(kind)
    }
}

impl TokenSource for Lexer {
    fn next_token(&mut self, diag: &mut Diagnostics) -> Token {
        loop {
            self.skip_whitespace();
            let mut token = Token::new(TokenKind::None, self.line, self.col);

            let Some(ch) = self.current() else {
                token.kind = TokenKind::Eof;
                return token;
            };

            if ch == '/' && self.peek() == Some('*') {
                self.skip_comment(&token, diag);
                continue;
            }

            if ch.is_ascii_alphabetic() {
                self.read_name(&mut token);
            } else if ch.is_ascii_digit() {
                self.read_number(&mut token, diag);
            } else if ch == '\'' {
                self.read_char_const(&mut token, diag);
            } else if let Some(kind) = self.read_operator(ch) {
                token.kind = kind;
            } else {
                diag.report(token.line, token.col, Message::InvalidChar(ch));
                self.advance();
            }

            return token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<Token>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let tokens = Lexer::new(src).tokenize(&mut diag);
        (tokens, diag)
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let (tokens, diag) = lex("program Foo class x_1 while");
        assert!(diag.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Program);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].text, "Foo");
        assert_eq!(tokens[2].kind, TokenKind::Class);
        assert_eq!(tokens[3].text, "x_1");
        assert_eq!(tokens[4].kind, TokenKind::While);
        assert_eq!(tokens[5].kind, TokenKind::Eof);
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("+= -= *= /= %= ++ -- == != <= >= && ||"),
            vec![
                TokenKind::PlusAssign,
                TokenKind::MinusAssign,
                TokenKind::TimesAssign,
                TokenKind::SlashAssign,
                TokenKind::RemAssign,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Eql,
                TokenKind::Neq,
                TokenKind::Leq,
                TokenKind::Geq,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_are_one_based() {
        let (tokens, _) = lex("x = 1;\n  y");

        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (1, 3));
        assert_eq!((tokens[2].line, tokens[2].col), (1, 5));
        assert_eq!((tokens[3].line, tokens[3].col), (1, 6));
        assert_eq!((tokens[4].line, tokens[4].col), (2, 3));
    }

    #[test]
    fn test_numbers_and_overflow() {
        let (tokens, diag) = lex("42 2147483647 2147483648");
        assert_eq!(tokens[0].val, 42);
        assert_eq!(tokens[1].val, i32::MAX);
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].val, 0);
        assert_eq!(diag.len(), 1);
        assert!(matches!(
            diag.iter().next().map(|d| &d.message),
            Some(Message::BigNum(s)) if s == "2147483648"
        ));
    }

    #[test]
    fn test_char_constants() {
        let (tokens, diag) = lex(r"'a' '\n' '\'' '\\' '\r'");
        assert!(diag.is_empty());
        let vals: Vec<i32> = tokens.iter().take(5).map(|t| t.val).collect();
        assert_eq!(vals, vec!['a' as i32, 10, '\'' as i32, '\\' as i32, 13]);
        assert!(tokens.iter().take(5).all(|t| t.kind == TokenKind::CharConst));
    }

    #[test]
    fn test_char_constant_errors() {
        let (_, diag) = lex("''");
        assert_eq!(diag.iter().next().map(|d| d.message.clone()), Some(Message::EmptyCharConst));

        let (_, diag) = lex(r"'\t'");
        assert_eq!(
            diag.iter().next().map(|d| d.message.clone()),
            Some(Message::UndefinedEscape('t'))
        );

        let (_, diag) = lex("'ab'");
        assert_eq!(diag.iter().next().map(|d| d.message.clone()), Some(Message::MissingQuote));

        let (_, diag) = lex("'\n'");
        assert_eq!(diag.iter().next().map(|d| d.message.clone()), Some(Message::IllegalLineEnd));
    }

    #[test]
    fn test_nested_comments_are_skipped() {
        assert_eq!(
            kinds("a /* outer /* inner */ still comment */ b"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_comment() {
        let (tokens, diag) = lex("a /* never closed");
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        assert_eq!(diag.iter().next().map(|d| d.message.clone()), Some(Message::EofInComment));
    }

    #[test]
    fn test_invalid_characters() {
        let (tokens, diag) = lex("a ! b & c | #");
        assert_eq!(diag.len(), 4);
        assert_eq!(tokens[1].kind, TokenKind::None);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn test_eof_repeats() {
        let mut diag = Diagnostics::new();
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token(&mut diag).kind, TokenKind::Eof);
        assert_eq!(lexer.next_token(&mut diag).kind, TokenKind::Eof);
    }
}
