//! Hand-written cursor tokenizer. Produces a flat token stream with spans;
//! never panics on malformed input (invalid input is an `E_LEX` diagnostic).

use crate::diagnostic::Diagnostic;
use crate::span::Span;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // literals
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,
    Ident(String),

    // keywords
    Cap,
    Budget,
    Import,
    As,
    Let,
    Return,
    Do,
    Assert,
    Check,
    If,
    Else,
    For,
    Fn,
    Match,
    Try,
    Catch,
    Filter,
    Loop,
    CallQ,

    // punctuation / operators
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Dot,
    DotDotDot,
    Arrow,
    Eq,
    EqEq,
    NotEq,
    Ge,
    Le,
    Gt,
    Lt,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

struct Cursor<'a> {
    file: String,
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    fn new(file: &str, src: &'a str) -> Self {
        Cursor {
            file: file.to_string(),
            src,
            chars: src.char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek2(&mut self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next().map(|(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn pos(&mut self) -> (u32, u32) {
        (self.line, self.col)
    }
}

/// Tokenizes `src`. `file` is the logical file name used in spans (e.g. the
/// path passed to `a0 run`, or `"<stdin>"`).
pub fn tokenize(file: &str, src: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut cursor = Cursor::new(file, src);
    let mut tokens = Vec::new();

    loop {
        skip_ws_and_comments(&mut cursor);
        let (start_line, start_col) = cursor.pos();
        let Some(c) = cursor.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(file, start_line, start_col, start_line, start_col),
            });
            break;
        };

        let kind = if c.is_ascii_digit() {
            lex_number(&mut cursor)?
        } else if c == '"' {
            lex_string(&mut cursor)?
        } else if c == '_' || c.is_alphabetic() {
            lex_ident_or_keyword(&mut cursor)
        } else {
            lex_punct(&mut cursor, file, start_line, start_col)?
        };

        let (end_line, end_col) = cursor.pos();
        tokens.push(Token {
            kind,
            span: Span::new(file, start_line, start_col, end_line, end_col),
        });
    }

    Ok(tokens)
}

fn skip_ws_and_comments(cursor: &mut Cursor) {
    loop {
        match cursor.peek() {
            Some(c) if c == ' ' || c == '\t' || c == '\r' || c == '\n' => {
                cursor.bump();
            }
            Some('#') => {
                while let Some(c) = cursor.peek() {
                    if c == '\n' {
                        break;
                    }
                    cursor.bump();
                }
            }
            _ => break,
        }
    }
}

fn lex_number(cursor: &mut Cursor) -> Result<TokenKind, Diagnostic> {
    let mut text = String::new();
    while let Some(c) = cursor.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            cursor.bump();
        } else {
            break;
        }
    }

    let mut is_float = false;

    // A `.` only starts a fraction if it is not the start of `...` and is
    // followed by a digit.
    if cursor.peek() == Some('.') && cursor.peek2() != Some('.') {
        let mut lookahead = cursor.chars.clone();
        lookahead.next();
        if matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            cursor.bump();
            while let Some(c) = cursor.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    cursor.bump();
                } else {
                    break;
                }
            }
        }
    }

    if matches!(cursor.peek(), Some('e') | Some('E')) {
        let mut lookahead = cursor.chars.clone();
        lookahead.next();
        let next = lookahead.peek().map(|&(_, c)| c);
        let exponent_valid = match next {
            Some(d) if d.is_ascii_digit() => true,
            Some('+') | Some('-') => {
                lookahead.next();
                matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit())
            }
            _ => false,
        };
        if exponent_valid {
            is_float = true;
            text.push(cursor.bump().unwrap());
            if matches!(cursor.peek(), Some('+') | Some('-')) {
                text.push(cursor.bump().unwrap());
            }
            while let Some(c) = cursor.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    cursor.bump();
                } else {
                    break;
                }
            }
        }
    }

    if is_float {
        let v: f64 = text.parse().map_err(|_| {
            Diagnostic::lex(format!("invalid float literal '{}'", text), point(cursor))
        })?;
        Ok(TokenKind::Float(v))
    } else {
        let v: i64 = text.parse().map_err(|_| {
            Diagnostic::lex(format!("invalid integer literal '{}'", text), point(cursor))
        })?;
        Ok(TokenKind::Int(v))
    }
}

fn lex_string(cursor: &mut Cursor) -> Result<TokenKind, Diagnostic> {
    cursor.bump(); // opening quote
    let mut out = String::new();
    loop {
        match cursor.bump() {
            None => return Err(Diagnostic::lex("unterminated string literal", point(cursor))),
            Some('"') => break,
            Some('\\') => match cursor.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('/') => out.push('/'),
                Some('u') => {
                    let mut hex = String::new();
                    for _ in 0..4 {
                        match cursor.bump() {
                            Some(h) if h.is_ascii_hexdigit() => hex.push(h),
                            _ => {
                                return Err(Diagnostic::lex("invalid \\u escape", point(cursor)))
                            }
                        }
                    }
                    let code = u32::from_str_radix(&hex, 16)
                        .map_err(|_| Diagnostic::lex("invalid \\u escape", point(cursor)))?;
                    out.push(
                        char::from_u32(code)
                            .ok_or_else(|| Diagnostic::lex("invalid unicode escape", point(cursor)))?,
                    );
                }
                _ => return Err(Diagnostic::lex("invalid escape sequence", point(cursor))),
            },
            Some(c) => out.push(c),
        }
    }
    Ok(TokenKind::Str(out))
}

fn lex_ident_or_keyword(cursor: &mut Cursor) -> TokenKind {
    let mut text = String::new();
    while let Some(c) = cursor.peek() {
        if c == '_' || c.is_alphanumeric() {
            text.push(c);
            cursor.bump();
        } else {
            break;
        }
    }

    // `call?` is the only keyword with a trailing `?`.
    if text == "call" && cursor.peek() == Some('?') {
        cursor.bump();
        return TokenKind::CallQ;
    }

    match text.as_str() {
        "cap" => TokenKind::Cap,
        "budget" => TokenKind::Budget,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "let" => TokenKind::Let,
        "return" => TokenKind::Return,
        "do" => TokenKind::Do,
        "assert" => TokenKind::Assert,
        "check" => TokenKind::Check,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "fn" => TokenKind::Fn,
        "match" => TokenKind::Match,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "filter" => TokenKind::Filter,
        "loop" => TokenKind::Loop,
        _ => TokenKind::Ident(text),
    }
}

fn lex_punct(cursor: &mut Cursor, file: &str, line: u32, col: u32) -> Result<TokenKind, Diagnostic> {
    let c = cursor.bump().unwrap();
    let kind = match c {
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        ':' => TokenKind::Colon,
        ',' => TokenKind::Comma,
        '.' => {
            if cursor.peek() == Some('.') && cursor.peek2() == Some('.') {
                cursor.bump();
                cursor.bump();
                TokenKind::DotDotDot
            } else {
                TokenKind::Dot
            }
        }
        '-' => {
            if cursor.peek() == Some('>') {
                cursor.bump();
                TokenKind::Arrow
            } else {
                TokenKind::Minus
            }
        }
        '=' => {
            if cursor.peek() == Some('=') {
                cursor.bump();
                TokenKind::EqEq
            } else {
                TokenKind::Eq
            }
        }
        '!' => {
            if cursor.peek() == Some('=') {
                cursor.bump();
                TokenKind::NotEq
            } else {
                return Err(Diagnostic::lex("unexpected character '!'", Span::new(file, line, col, line, col)));
            }
        }
        '>' => {
            if cursor.peek() == Some('=') {
                cursor.bump();
                TokenKind::Ge
            } else {
                TokenKind::Gt
            }
        }
        '<' => {
            if cursor.peek() == Some('=') {
                cursor.bump();
                TokenKind::Le
            } else {
                TokenKind::Lt
            }
        }
        '+' => TokenKind::Plus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        '%' => TokenKind::Percent,
        other => {
            return Err(Diagnostic::lex(
                format!("unexpected character '{}'", other),
                Span::new(file, line, col, line, col),
            ))
        }
    };
    Ok(kind)
}

fn point(cursor: &mut Cursor) -> Span {
    let (l, c) = cursor.pos();
    Span::point(cursor.file.clone(), l, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize("t.a0", src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::Int(42), TokenKind::Eof]);
        assert_eq!(kinds("3.14"), vec![TokenKind::Float(3.14), TokenKind::Eof]);
        assert_eq!(kinds("1e3"), vec![TokenKind::Float(1000.0), TokenKind::Eof]);
    }

    #[test]
    fn dots_do_not_absorb_into_float() {
        assert_eq!(kinds("1..."), vec![TokenKind::Int(1), TokenKind::DotDotDot, TokenKind::Eof]);
    }

    #[test]
    fn exponent_requires_digit() {
        // `e` with no following digit is just an identifier start, not consumed
        // as part of the number.
        let toks = kinds("1e");
        assert_eq!(toks[0], TokenKind::Int(1));
        assert_eq!(toks[1], TokenKind::Ident("e".to_string()));
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            kinds(r#""a\nbA""#),
            vec![TokenKind::Str("a\nbA".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn keyword_vs_identifier_exact_match() {
        assert_eq!(kinds("cap"), vec![TokenKind::Cap, TokenKind::Eof]);
        assert_eq!(kinds("capital"), vec![TokenKind::Ident("capital".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn call_question_is_one_token() {
        assert_eq!(kinds("call?"), vec![TokenKind::CallQ, TokenKind::Eof]);
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("-> == != >= <= > < ..."),
            vec![
                TokenKind::Arrow,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Ge,
                TokenKind::Le,
                TokenKind::Gt,
                TokenKind::Lt,
                TokenKind::DotDotDot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(kinds("1 # comment\n2"), vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]);
    }

    #[test]
    fn crlf_line_counting() {
        let toks = tokenize("t.a0", "1\r\n2").unwrap();
        assert_eq!(toks[1].span.start_line, 2);
    }

    #[test]
    fn invalid_character_is_a_diagnostic_not_a_panic() {
        let err = tokenize("t.a0", "@").unwrap_err();
        assert_eq!(err.code(), "E_LEX");
    }
}
