//! Tokenizer for script text.

use crate::error::{ScriptError, ScriptResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Line number (0-indexed)
    pub line: usize,
}

/// Punctuators, longest first so that greedy matching works.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=", "%=",
    "{", "}", "(", ")", "[", "]", ";", ",", ".", "?", ":", "=", "<", ">", "+", "-", "*", "/",
    "%", "!",
];

pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 0;

    while pos < chars.len() {
        let ch = chars[pos];

        if ch == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        // Comments
        if ch == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }
        if ch == '/' && chars.get(pos + 1) == Some(&'*') {
            let start_line = line;
            pos += 2;
            loop {
                match chars.get(pos) {
                    None => return Err(ScriptError::syntax("Unterminated comment", start_line)),
                    Some('*') if chars.get(pos + 1) == Some(&'/') => {
                        pos += 2;
                        break;
                    }
                    Some('\n') => {
                        line += 1;
                        pos += 1;
                    }
                    Some(_) => pos += 1,
                }
            }
            continue;
        }

        if ch.is_ascii_digit()
            || (ch == '.' && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit()))
        {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                pos += 1;
            }
            if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
                pos += 1;
                if pos < chars.len() && (chars[pos] == '+' || chars[pos] == '-') {
                    pos += 1;
                }
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ScriptError::syntax(format!("Invalid number '{}'", text), line))?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                line,
            });
            continue;
        }

        if ch == '"' || ch == '\'' {
            let quote = ch;
            let start_line = line;
            pos += 1;
            let mut value = String::new();
            loop {
                match chars.get(pos) {
                    None | Some('\n') => {
                        return Err(ScriptError::syntax("Unterminated string", start_line));
                    }
                    Some(c) if *c == quote => {
                        pos += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped = chars
                            .get(pos + 1)
                            .ok_or_else(|| ScriptError::syntax("Unterminated string", start_line))?;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            '0' => '\0',
                            other => *other,
                        });
                        pos += 2;
                    }
                    Some(c) => {
                        value.push(*c);
                        pos += 1;
                    }
                }
            }
            tokens.push(Token {
                kind: TokenKind::Str(value),
                line: start_line,
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '$')
            {
                pos += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(chars[start..pos].iter().collect()),
                line,
            });
            continue;
        }

        let punct = PUNCTUATORS.iter().find(|p| {
            p.chars()
                .enumerate()
                .all(|(i, c)| chars.get(pos + i) == Some(&c))
        });
        match punct {
            Some(p) => {
                tokens.push(Token {
                    kind: TokenKind::Punct(p),
                    line,
                });
                pos += p.len();
            }
            None => {
                return Err(ScriptError::syntax(
                    format!("Unexpected character '{}'", ch),
                    line,
                ));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
    });
    Ok(tokens)
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
    fn test_operators_are_greedy() {
        assert_eq!(
            kinds("a === b"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Punct("==="),
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = tokenize("// first\n/* a\nb */ x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("x".to_string()));
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb""#),
            vec![
                TokenKind::Str("it's".to_string()),
                TokenKind::Str("a\tb".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(ScriptError::Syntax { .. })
        ));
    }
}
