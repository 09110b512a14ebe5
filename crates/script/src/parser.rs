//! Recursive descent parser for the script subset.
//!
//! Binary operators use precedence climbing; statements are parsed
//! with optional semicolons.

use crate::ast::{BinaryOp, Expr, FunctionDecl, LogicalOp, Stmt, Target, UnaryOp};
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::{Token, TokenKind, tokenize};
use std::rc::Rc;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a complete script into its statement list.
pub fn parse_program(source: &str) -> ScriptResult<Vec<Stmt>> {
    let mut parser = Parser::new(source)?;
    parser.parse_program()
}

impl Parser {
    pub fn new(source: &str) -> ScriptResult<Self> {
        Ok(Parser {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    pub fn parse_program(&mut self) -> ScriptResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> ScriptResult<Stmt> {
        if self.consume_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.check_punct("{") {
            self.advance();
            return Ok(Stmt::Block(self.parse_block_body()?));
        }

        let keyword = match &self.current().kind {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        };
        let stmt = match keyword.as_deref() {
            Some("let") | Some("const") | Some("var") => {
                self.advance();
                let decl = self.parse_declarations()?;
                self.consume_punct(";");
                decl
            }
            Some("function") if matches!(self.peek_kind(1), TokenKind::Ident(_)) => {
                self.advance();
                let func = self.parse_function_rest()?;
                Stmt::Function(Rc::new(func))
            }
            Some("return") => {
                self.advance();
                let value = if self.check_punct(";") || self.check_punct("}") || self.is_at_end()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_punct(";");
                Stmt::Return(value)
            }
            Some("if") => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.consume_keyword("else") {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Stmt::If {
                    test,
                    consequent,
                    alternate,
                }
            }
            Some("while") => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                Stmt::While { test, body }
            }
            Some("for") => {
                self.advance();
                self.parse_for()?
            }
            Some("break") => {
                self.advance();
                self.consume_punct(";");
                Stmt::Break
            }
            Some("continue") => {
                self.advance();
                self.consume_punct(";");
                Stmt::Continue
            }
            Some("throw") => {
                self.advance();
                let value = self.parse_expression()?;
                self.consume_punct(";");
                Stmt::Throw(value)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_punct(";");
                Stmt::Expression(expr)
            }
        };
        Ok(stmt)
    }

    fn parse_block_body(&mut self) -> ScriptResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.check_punct("}") {
            if self.is_at_end() {
                return Err(self.error("Expected '}' before end of script"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_declarations(&mut self) -> ScriptResult<Stmt> {
        let mut declarations = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.consume_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarations.push((name, init));
            if !self.consume_punct(",") {
                break;
            }
        }
        Ok(Stmt::Let(declarations))
    }

    fn parse_for(&mut self) -> ScriptResult<Stmt> {
        self.expect_punct("(")?;
        let init = if self.consume_punct(";") {
            None
        } else {
            let stmt = if self.consume_keyword("let")
                || self.consume_keyword("var")
                || self.consume_keyword("const")
            {
                self.parse_declarations()?
            } else {
                Stmt::Expression(self.parse_expression()?)
            };
            self.expect_punct(";")?;
            Some(Box::new(stmt))
        };
        let test = if self.check_punct(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.check_punct(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    /// Parse the part of a function after the `function` keyword.
    fn parse_function_rest(&mut self) -> ScriptResult<FunctionDecl> {
        let name = match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.consume_punct(")") {
            loop {
                params.push(self.expect_ident()?);
                if self.consume_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("{")?;
        let body = self.parse_block_body()?;
        Ok(FunctionDecl { name, params, body })
    }

    pub fn parse_expression(&mut self) -> ScriptResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ScriptResult<Expr> {
        let expr = self.parse_conditional()?;
        let op = match &self.current().kind {
            TokenKind::Punct("=") => Some(None),
            TokenKind::Punct("+=") => Some(Some(BinaryOp::Add)),
            TokenKind::Punct("-=") => Some(Some(BinaryOp::Sub)),
            TokenKind::Punct("*=") => Some(Some(BinaryOp::Mul)),
            TokenKind::Punct("/=") => Some(Some(BinaryOp::Div)),
            TokenKind::Punct("%=") => Some(Some(BinaryOp::Rem)),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let target = self.to_target(expr)?;
                let value = Box::new(self.parse_assignment()?);
                Ok(Expr::Assign { op, target, value })
            }
            None => Ok(expr),
        }
    }

    fn to_target(&self, expr: Expr) -> ScriptResult<Target> {
        match expr {
            Expr::Identifier(name) => Ok(Target::Variable(name)),
            Expr::Member { object, property } => Ok(Target::Member { object, property }),
            Expr::Index { object, index } => Ok(Target::Index { object, index }),
            _ => Err(self.error("Invalid assignment target")),
        }
    }

    fn parse_conditional(&mut self) -> ScriptResult<Expr> {
        let test = self.parse_logical_or()?;
        if self.consume_punct("?") {
            let consequent = Box::new(self.parse_assignment()?);
            self.expect_punct(":")?;
            let alternate = Box::new(self.parse_assignment()?);
            return Ok(Expr::Conditional {
                test: Box::new(test),
                consequent,
                alternate,
            });
        }
        Ok(test)
    }

    fn parse_logical_or(&mut self) -> ScriptResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.consume_punct("||") {
            let right = self.parse_logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> ScriptResult<Expr> {
        let mut left = self.parse_binary(0)?;
        while self.consume_punct("&&") {
            let right = self.parse_binary(0)?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match &self.current().kind {
            TokenKind::Punct("==") => (BinaryOp::Eq, 1),
            TokenKind::Punct("!=") => (BinaryOp::NotEq, 1),
            TokenKind::Punct("===") => (BinaryOp::StrictEq, 1),
            TokenKind::Punct("!==") => (BinaryOp::StrictNotEq, 1),
            TokenKind::Punct("<") => (BinaryOp::Less, 2),
            TokenKind::Punct("<=") => (BinaryOp::LessEq, 2),
            TokenKind::Punct(">") => (BinaryOp::Greater, 2),
            TokenKind::Punct(">=") => (BinaryOp::GreaterEq, 2),
            TokenKind::Punct("+") => (BinaryOp::Add, 3),
            TokenKind::Punct("-") => (BinaryOp::Sub, 3),
            TokenKind::Punct("*") => (BinaryOp::Mul, 4),
            TokenKind::Punct("/") => (BinaryOp::Div, 4),
            TokenKind::Punct("%") => (BinaryOp::Rem, 4),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ScriptResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((op, prec)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        let op = match &self.current().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr::Unary { op, operand });
        }
        if self.check_punct("++") || self.check_punct("--") {
            let increment = self.check_punct("++");
            self.advance();
            let operand = self.parse_unary()?;
            let target = self.to_target(operand)?;
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.consume_punct(".") {
                let property = self.expect_ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.consume_punct("[") {
                let index = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.consume_punct("(") {
                let args = self.parse_arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.check_punct("++") || self.check_punct("--") {
                let increment = self.check_punct("++");
                self.advance();
                let target = self.to_target(expr)?;
                expr = Expr::Update {
                    increment,
                    prefix: false,
                    target,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ScriptResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.consume_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment()?);
            if self.consume_punct(")") {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }

    fn parse_primary(&mut self) -> ScriptResult<Expr> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    "null" => Ok(Expr::Null),
                    "undefined" => Ok(Expr::Undefined),
                    "function" => Ok(Expr::Function(Rc::new(self.parse_function_rest()?))),
                    _ => Ok(Expr::Identifier(name)),
                }
            }
            TokenKind::Punct("(") => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut elements = Vec::new();
                while !self.consume_punct("]") {
                    elements.push(self.parse_assignment()?);
                    if !self.check_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Array(elements))
            }
            TokenKind::Punct("{") => {
                self.advance();
                let mut properties = Vec::new();
                while !self.consume_punct("}") {
                    let key = match &self.current().kind {
                        TokenKind::Ident(name) | TokenKind::Str(name) => name.clone(),
                        TokenKind::Number(n) => crate::value::format_number(*n),
                        _ => return Err(self.error("Expected property name")),
                    };
                    self.advance();
                    self.expect_punct(":")?;
                    let value = self.parse_assignment()?;
                    properties.push((key, value));
                    if !self.check_punct("}") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Object(properties))
            }
            TokenKind::Eof => Err(self.error("Unexpected end of script")),
            TokenKind::Punct(p) => Err(self.error(&format!("Unexpected token '{}'", p))),
        }
    }

    fn current(&self) -> &Token {
        // tokenize always terminates the stream with Eof
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self, n: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)].kind
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn check_punct(&self, punct: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Punct(p) if *p == punct)
    }

    fn consume_punct(&mut self, punct: &str) -> bool {
        if self.check_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if matches!(&self.current().kind, TokenKind::Ident(name) if name == keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> ScriptResult<()> {
        if self.consume_punct(punct) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected '{}'", punct)))
        }
    }

    fn expect_ident(&mut self) -> ScriptResult<String> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    fn error(&self, message: &str) -> ScriptError {
        ScriptError::syntax(message, self.current().line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let program = parse_program("1 + 2 * 3").unwrap();
        match &program[0] {
            Stmt::Expression(Expr::Binary { op, right, .. }) => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("Expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn test_function_assignment() {
        let program = parse_program("tmp = function(self, a) {\n return a ;\n}\n").unwrap();
        match &program[0] {
            Stmt::Expression(Expr::Assign { target, value, .. }) => {
                assert_eq!(*target, Target::Variable("tmp".to_string()));
                match value.as_ref() {
                    Expr::Function(decl) => {
                        assert_eq!(decl.params, vec!["self", "a"]);
                        assert_eq!(decl.body, vec![Stmt::Return(Some(Expr::Identifier(
                            "a".to_string()
                        )))]);
                    }
                    other => panic!("Expected function, got {:?}", other),
                }
            }
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_member_assignment_target() {
        let program = parse_program("self.p = 3").unwrap();
        assert!(matches!(
            &program[0],
            Stmt::Expression(Expr::Assign {
                target: Target::Member { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse_program("1 = 2").is_err());
    }

    #[test]
    fn test_missing_brace() {
        let err = parse_program("if (x) { return 1").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }
}
