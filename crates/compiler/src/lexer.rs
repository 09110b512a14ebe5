//! Tokenizer for Amber source
//!
//! Produces typed tokens with 0-indexed line and column positions.
//! Function bodies are delimited by `%{` and `%}` and kept verbatim.

use crate::error::ParseError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    /// One of `: { } [ ] ( ) , .` or `->`
    Symbol(&'static str),
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Raw text between `%{` and `%}`
    Text(String),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Symbol(sym) => write!(f, "{}", sym),
            TokenKind::Bool(b) => write!(f, "{}", b),
            TokenKind::Int(i) => write!(f, "{}", i),
            TokenKind::Float(v) => write!(f, "{}", v),
            TokenKind::Str(s) => write!(f, "{:?}", s),
            TokenKind::Text(_) => write!(f, "%{{...%}}"),
            TokenKind::Eof => write!(f, "<end of input>"),
        }
    }
}

/// A token with source position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed)
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Token { kind, line, column }
    }
}

const SYMBOLS: &[&str] = &["->", ":", "{", "}", "[", "]", "(", ")", ",", "."];

struct Cursor<'a> {
    chars: &'a [char],
    pos: usize,
    line: usize,
    column: usize,
}

impl Cursor<'_> {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: &str, line: usize) -> ParseError {
        ParseError::new(message, line, None)
    }
}

/// Split source text into tokens, folding adjacent string literals.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut cur = Cursor {
        chars: &chars,
        pos: 0,
        line: 0,
        column: 0,
    };
    let mut tokens = Vec::new();

    while let Some(ch) = cur.peek(0) {
        let (line, column) = (cur.line, cur.column);

        if ch.is_whitespace() {
            cur.bump();
            continue;
        }

        // Comments
        if ch == '/' && cur.peek(1) == Some('/') {
            while cur.peek(0).is_some_and(|c| c != '\n') {
                cur.bump();
            }
            continue;
        }
        if ch == '/' && cur.peek(1) == Some('*') {
            cur.bump();
            cur.bump();
            loop {
                match cur.peek(0) {
                    None => return Err(cur.error("Unterminated comment", line)),
                    Some('*') if cur.peek(1) == Some('/') => {
                        cur.bump();
                        cur.bump();
                        break;
                    }
                    Some(_) => {
                        cur.bump();
                    }
                }
            }
            continue;
        }

        // Function body text
        if ch == '%' && cur.peek(1) == Some('{') {
            cur.bump();
            cur.bump();
            let mut text = String::new();
            loop {
                match cur.peek(0) {
                    None => return Err(cur.error("Unterminated text block", line)),
                    Some('%') if cur.peek(1) == Some('}') => {
                        cur.bump();
                        cur.bump();
                        break;
                    }
                    Some(c) => {
                        text.push(c);
                        cur.bump();
                    }
                }
            }
            tokens.push(Token::new(TokenKind::Text(text), line, column));
            continue;
        }

        if ch == '"' {
            cur.bump();
            let mut value = String::new();
            loop {
                match cur.bump() {
                    None | Some('\n') => {
                        return Err(cur.error("Unterminated string literal", line));
                    }
                    Some('"') => break,
                    Some('\\') => match cur.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => return Err(cur.error("Unterminated string literal", line)),
                    },
                    Some(c) => value.push(c),
                }
            }
            tokens.push(Token::new(TokenKind::Str(value), line, column));
            continue;
        }

        let negative_number = ch == '-' && cur.peek(1).is_some_and(|c| c.is_ascii_digit());
        if ch.is_ascii_digit() || negative_number {
            let kind = lex_number(&mut cur)
                .ok_or_else(|| cur.error("Invalid number literal", line))?;
            tokens.push(Token::new(kind, line, column));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let mut ident = String::new();
            while let Some(c) = cur.peek(0) {
                if !(c.is_alphanumeric() || c == '_') {
                    break;
                }
                ident.push(c);
                cur.bump();
            }
            let kind = match ident.as_str() {
                "true" => TokenKind::Bool(true),
                "false" => TokenKind::Bool(false),
                _ => TokenKind::Identifier(ident),
            };
            tokens.push(Token::new(kind, line, column));
            continue;
        }

        let symbol = SYMBOLS.iter().find(|sym| {
            sym.chars()
                .enumerate()
                .all(|(i, c)| cur.peek(i) == Some(c))
        });
        match symbol {
            Some(sym) => {
                for _ in 0..sym.len() {
                    cur.bump();
                }
                tokens.push(Token::new(TokenKind::Symbol(*sym), line, column));
            }
            None => {
                return Err(ParseError::new(
                    format!("Unexpected character '{}'", ch),
                    line,
                    None,
                ));
            }
        }
    }

    tokens.push(Token::new(TokenKind::Eof, cur.line, cur.column));
    Ok(fold_strings(tokens))
}

fn lex_number(cur: &mut Cursor<'_>) -> Option<TokenKind> {
    let mut text = String::new();
    let mut is_float = false;
    if cur.peek(0) == Some('-') {
        text.push('-');
        cur.bump();
    }
    while let Some(c) = cur.peek(0) {
        if c.is_ascii_digit() {
            text.push(c);
        } else if c == '.' && !is_float && cur.peek(1).is_some_and(|n| n.is_ascii_digit()) {
            is_float = true;
            text.push(c);
        } else if (c == 'e' || c == 'E')
            && (cur.peek(1).is_some_and(|n| n.is_ascii_digit())
                || (matches!(cur.peek(1), Some('+') | Some('-'))
                    && cur.peek(2).is_some_and(|n| n.is_ascii_digit())))
        {
            is_float = true;
            text.push(c);
            cur.bump();
            if let Some(sign) = cur.peek(0).filter(|s| *s == '+' || *s == '-') {
                text.push(sign);
                cur.bump();
            }
            continue;
        } else {
            break;
        }
        cur.bump();
    }
    if is_float {
        text.parse().ok().map(TokenKind::Float)
    } else {
        text.parse().ok().map(TokenKind::Int)
    }
}

/// Join runs of adjacent string literals into one token that keeps the
/// position of the first.
fn fold_strings(tokens: Vec<Token>) -> Vec<Token> {
    let mut result: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let TokenKind::Str(next) = &token.kind
            && let Some(Token {
                kind: TokenKind::Str(prev),
                ..
            }) = result.last_mut()
        {
            prev.push_str(next);
            continue;
        }
        result.push(token);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_member_tokens() {
        assert_eq!(
            kinds("a: Int -3"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Symbol(":"),
                TokenKind::Identifier("Int".to_string()),
                TokenKind::Int(-3),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_arrow_and_floats() {
        assert_eq!(
            kinds("-> 1.5 2e3 x.y"),
            vec![
                TokenKind::Symbol("->"),
                TokenKind::Float(1.5),
                TokenKind::Float(2000.0),
                TokenKind::Identifier("x".to_string()),
                TokenKind::Symbol("."),
                TokenKind::Identifier("y".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_text_block_is_raw() {
        let tokens = tokenize("f: Func() %{ return \"%\" + 1 ; %}").unwrap();
        assert_eq!(
            tokens[5].kind,
            TokenKind::Text(" return \"%\" + 1 ; ".to_string())
        );
    }

    #[test]
    fn test_adjacent_strings_fold() {
        let tokens = tokenize("\"a\\n\"\n\"b\\t\" x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str("a\nb\t".to_string()));
        assert_eq!(tokens[0].line, 0);
        assert_eq!(tokens[1].kind, TokenKind::Identifier("x".to_string()));
        assert_eq!(tokens[1].line, 1);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("// comment\n  root: Object").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 2);
        assert_eq!(tokens[2].column, 8);
    }

    #[test]
    fn test_unterminated_text() {
        let err = tokenize("f: Func() %{ return 1 ;").unwrap_err();
        assert!(err.message.contains("Unterminated text block"));
        assert_eq!(err.line, 0);
    }
}
