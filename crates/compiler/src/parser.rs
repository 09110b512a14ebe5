//! Parser for Amber source
//!
//! Syntax:
//! ```text
//! root: Object {
//!   a: Int 0
//!   f: Int Listner(x: self.a) %{ return x + 1 ; %}
//!   g: Func(a, b) -> Int %{ return a + b ; %}
//!   sub: Object {
//!     b: Float 1.5
//!   }
//! }
//! ```
//!
//! The first error aborts the parse; there is no recovery.

use crate::ast::{
    Argument, EventFunction, Frame, FunctionKind, InitFunction, ListenerFunction, Member,
    PathArgument, PathExpression, ProcedureFunction, Scalar, Value, ValueType,
};
use crate::enums::EnumTable;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind, tokenize};
use std::collections::BTreeMap;

/// What an identifier in type position denotes. Resolution order:
/// built-in keyword, registered enum, function keyword, class name.
#[derive(Debug, Clone, PartialEq)]
enum TypeToken {
    Value(ValueType),
    Function(FunctionKind),
    Class(String),
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    enums: EnumTable,
}

/// Parse a complete source text into its root frame.
pub fn parse_frame(source: &str, enums: &EnumTable) -> Result<Frame, ParseError> {
    Parser::with_enums(source, enums)?.parse()
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        Self::with_enums(source, &EnumTable::new())
    }

    pub fn with_enums(source: &str, enums: &EnumTable) -> Result<Self, ParseError> {
        Ok(Parser {
            tokens: tokenize(source)?,
            pos: 0,
            enums: enums.clone(),
        })
    }

    pub fn parse(&mut self) -> Result<Frame, ParseError> {
        let ident = self.expect_identifier("Identifier")?;
        self.expect_symbol(":")?;
        let class_name = self.expect_class_name()?;
        let frame = self.parse_frame_body(ident, class_name)?;
        if !self.is_at_end() {
            return Err(self.error("Unexpected token after the root frame"));
        }
        Ok(frame)
    }

    fn resolve_type(&self, name: &str) -> TypeToken {
        let builtin = match name {
            "Bool" => Some(ValueType::Bool),
            "Int" => Some(ValueType::Int),
            "Float" => Some(ValueType::Float),
            "String" => Some(ValueType::String),
            "URL" => Some(ValueType::Url),
            "Array" => Some(ValueType::Array(None)),
            "Dictionary" => Some(ValueType::Dictionary(None)),
            _ => None,
        };
        if let Some(value_type) = builtin {
            return TypeToken::Value(value_type);
        }
        if self.enums.search(name).is_some() {
            return TypeToken::Value(ValueType::Enum(name.to_string()));
        }
        if let Some(kind) = FunctionKind::from_keyword(name) {
            return TypeToken::Function(kind);
        }
        TypeToken::Class(name.to_string())
    }

    fn expect_class_name(&mut self) -> Result<String, ParseError> {
        let line = self.current().line;
        let name = self.expect_identifier("Class name")?;
        match self.resolve_type(&name) {
            TypeToken::Class(class_name) => Ok(class_name),
            _ => Err(ParseError::new(
                format!("\"{}\" can not be used as a class name", name),
                line,
                Some(name),
            )),
        }
    }

    fn parse_frame_body(
        &mut self,
        instance_name: String,
        class_name: String,
    ) -> Result<Frame, ParseError> {
        let mut frame = Frame::new(class_name, instance_name);
        self.expect_symbol("{")?;
        while !self.consume_symbol("}") {
            if self.is_at_end() {
                return Err(self.require_symbol_error("}"));
            }
            let member = self.parse_member()?;
            frame.members.push(member);
            // members may be separated by an optional comma
            self.consume_symbol(",");
        }
        Ok(frame)
    }

    fn parse_member(&mut self) -> Result<Member, ParseError> {
        let line = self.current().line;
        let ident = self.expect_identifier("Identifier")?;
        self.expect_symbol(":")?;
        let type_name = self.expect_identifier("Type")?;

        let member = match self.resolve_type(&type_name) {
            TypeToken::Function(kind) => self.parse_function(ident, kind, None)?,
            TypeToken::Class(class_name) => {
                let child = self.parse_frame_body(ident.clone(), class_name.clone())?;
                Member::new(ident, ValueType::Frame(class_name), Value::Frame(child))
            }
            TypeToken::Value(value_type) => match self.current_function_keyword() {
                Some(kind) => {
                    self.advance();
                    self.parse_function(ident, kind, Some(value_type))?
                }
                None => self.parse_property(ident, value_type)?,
            },
        };
        Ok(member.at_line(line))
    }

    fn current_function_keyword(&self) -> Option<FunctionKind> {
        match &self.current().kind {
            TokenKind::Identifier(name) => FunctionKind::from_keyword(name),
            _ => None,
        }
    }

    /// `prefix` is the type written before the function keyword.
    fn parse_function(
        &mut self,
        ident: String,
        kind: FunctionKind,
        prefix: Option<ValueType>,
    ) -> Result<Member, ParseError> {
        let (declared_type, value) = match kind {
            FunctionKind::Init => {
                self.reject_return_type(prefix.is_some())?;
                let mut arguments = if self.check_symbol("(") {
                    self.parse_arguments()?
                } else {
                    Vec::new()
                };
                arguments.retain(|arg| arg.name != "self");
                if arguments.len() > 1 {
                    return Err(self.error("Init function takes at most one argument"));
                }
                self.reject_return_type(false)?;
                let script = self.expect_text("Init function body")?;
                let func = InitFunction {
                    argument: arguments.pop(),
                    script,
                };
                (ValueType::InitFunction, Value::Init(func))
            }
            FunctionKind::Event => {
                self.reject_return_type(prefix.is_some())?;
                let arguments = self.parse_arguments()?;
                self.reject_return_type(false)?;
                let script = self.expect_text("Event function body")?;
                let func = EventFunction { arguments, script };
                (ValueType::EventFunction, Value::Event(func))
            }
            FunctionKind::Listener => {
                let arguments = self.parse_path_arguments()?;
                let return_type = self
                    .parse_return_type(prefix)?
                    .ok_or_else(|| self.require_declaration_error("Return type of Listner"))?;
                let script = self.expect_text("Listner function body")?;
                let func = ListenerFunction {
                    arguments,
                    return_type,
                    script,
                };
                (ValueType::ListenerFunction, Value::Listener(func))
            }
            FunctionKind::Procedure => {
                let arguments = self.parse_arguments()?;
                let return_type = self.parse_return_type(prefix)?;
                let script = self.expect_text("Procedure function body")?;
                let func = ProcedureFunction {
                    arguments,
                    return_type,
                    script,
                };
                (ValueType::ProcedureFunction, Value::Procedure(func))
            }
        };
        Ok(Member::new(ident, declared_type, value))
    }

    fn reject_return_type(&self, has_prefix: bool) -> Result<(), ParseError> {
        if has_prefix || self.check_symbol("->") {
            return Err(self.error("Event/Init function does not have return type"));
        }
        Ok(())
    }

    fn parse_return_type(
        &mut self,
        prefix: Option<ValueType>,
    ) -> Result<Option<ValueType>, ParseError> {
        if !self.consume_symbol("->") {
            return Ok(prefix);
        }
        if prefix.is_some() {
            return Err(self.error("Return type is declared twice"));
        }
        self.expect_value_type("Return type").map(Some)
    }

    fn expect_value_type(&mut self, declaration: &str) -> Result<ValueType, ParseError> {
        let line = self.current().line;
        let name = self.expect_identifier(declaration)?;
        match self.resolve_type(&name) {
            TypeToken::Value(value_type) => Ok(value_type),
            _ => Err(ParseError::new(
                format!("{} must be a value type, not \"{}\"", declaration, name),
                line,
                Some(name),
            )),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        self.expect_symbol("(")?;
        let mut arguments = Vec::new();
        while !self.consume_symbol(")") {
            if !arguments.is_empty() {
                self.expect_symbol(",")?;
            }
            let name = self.expect_identifier("Argument name")?;
            let annotation = if self.consume_symbol(":") {
                Some(self.expect_value_type("Argument type")?)
            } else {
                None
            };
            arguments.push(Argument { name, annotation });
        }
        Ok(arguments)
    }

    fn parse_path_arguments(&mut self) -> Result<Vec<PathArgument>, ParseError> {
        self.expect_symbol("(")?;
        let mut arguments = Vec::new();
        while !self.consume_symbol(")") {
            if !arguments.is_empty() {
                self.expect_symbol(",")?;
            }
            let name = self.expect_identifier("Listening argument name")?;
            self.expect_symbol(":")?;
            let path = self.parse_path_expression()?;
            arguments.push(PathArgument { name, path });
        }
        Ok(arguments)
    }

    fn parse_path_expression(&mut self) -> Result<PathExpression, ParseError> {
        let mut elements = vec![self.expect_identifier("Path expression")?];
        while self.consume_symbol(".") {
            elements.push(self.expect_identifier("Path expression element")?);
        }
        if elements.len() < 2 {
            return Err(self.error(&format!(
                "Path expression \"{}\" needs an object and a property",
                elements.join(".")
            )));
        }
        Ok(PathExpression { elements })
    }

    fn parse_property(
        &mut self,
        ident: String,
        value_type: ValueType,
    ) -> Result<Member, ParseError> {
        let (declared_type, value) = match value_type {
            ValueType::Array(None) => {
                self.expect_symbol("[")?;
                (ValueType::Array(None), Value::Array(self.parse_array(None)?))
            }
            ValueType::Dictionary(None) => {
                self.expect_symbol("{")?;
                let entries = self.parse_dictionary(None)?;
                (ValueType::Dictionary(None), Value::Dictionary(entries))
            }
            leaf => {
                if self.consume_symbol("[") {
                    let items = self.parse_array(Some(&leaf))?;
                    (ValueType::Array(Some(Box::new(leaf))), Value::Array(items))
                } else if self.consume_symbol("{") {
                    let entries = self.parse_dictionary(Some(&leaf))?;
                    (
                        ValueType::Dictionary(Some(Box::new(leaf))),
                        Value::Dictionary(entries),
                    )
                } else {
                    let scalar = self.parse_scalar(Some(&leaf))?;
                    (leaf, Value::Scalar(scalar))
                }
            }
        };
        Ok(Member::new(ident, declared_type, value))
    }

    fn parse_element(&mut self, leaf: Option<&ValueType>) -> Result<Value, ParseError> {
        if self.consume_symbol("[") {
            Ok(Value::Array(self.parse_array(leaf)?))
        } else if self.consume_symbol("{") {
            Ok(Value::Dictionary(self.parse_dictionary(leaf)?))
        } else {
            Ok(Value::Scalar(self.parse_scalar(leaf)?))
        }
    }

    /// Elements after the opening `[`.
    fn parse_array(&mut self, leaf: Option<&ValueType>) -> Result<Vec<Value>, ParseError> {
        let mut items = Vec::new();
        while !self.consume_symbol("]") {
            if !items.is_empty() && !self.consume_symbol(",") {
                return Err(self.error("\",\" is required between array elements"));
            }
            items.push(self.parse_element(leaf)?);
        }
        Ok(items)
    }

    /// Entries after the opening `{`.
    fn parse_dictionary(
        &mut self,
        leaf: Option<&ValueType>,
    ) -> Result<BTreeMap<String, Value>, ParseError> {
        let mut entries = BTreeMap::new();
        while !self.consume_symbol("}") {
            if !entries.is_empty() && !self.consume_symbol(",") {
                return Err(self.error("\",\" is required between dictionary elements"));
            }
            let key = match &self.current().kind {
                TokenKind::Identifier(key) => key.clone(),
                _ => return Err(self.error("The key identifier of dictionary is required")),
            };
            if entries.contains_key(&key) {
                return Err(self.error(&format!("Multi defined dictionary key \"{}\"", key)));
            }
            self.advance();
            if !self.consume_symbol(":") {
                return Err(self.error("\":\" is required between dictionary key and value"));
            }
            let value = self.parse_element(leaf)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    /// Literal checked against `expected`; with no expected type the
    /// literal's own type is used.
    fn parse_scalar(&mut self, expected: Option<&ValueType>) -> Result<Scalar, ParseError> {
        let scalar = match (expected, &self.current().kind) {
            (_, TokenKind::Eof) => return Err(self.error("Unexpected end of input stream")),
            (None | Some(ValueType::Bool), TokenKind::Bool(b)) => Scalar::Bool(*b),
            (None | Some(ValueType::Int), TokenKind::Int(i)) => Scalar::Int(*i),
            (Some(ValueType::Float), TokenKind::Int(i)) => Scalar::Float(*i as f64),
            (None | Some(ValueType::Float), TokenKind::Float(v)) => Scalar::Float(*v),
            (None, TokenKind::Str(s)) => Scalar::String(s.clone()),
            (Some(ValueType::String), TokenKind::Str(s) | TokenKind::Text(s)) => {
                Scalar::String(s.clone())
            }
            (Some(ValueType::Url), TokenKind::Str(s)) => Scalar::Url(s.clone()),
            (Some(ValueType::Enum(type_name)), TokenKind::Identifier(member)) => {
                let value = self
                    .enums
                    .search(type_name)
                    .and_then(|t| t.search_by_member(member))
                    .ok_or_else(|| {
                        self.error(&format!(
                            "Unknown member of Enum \"{}\" value",
                            type_name
                        ))
                    })?;
                Scalar::Enum {
                    type_name: type_name.clone(),
                    member: member.clone(),
                    value,
                }
            }
            (None, TokenKind::Identifier(ident)) => {
                return Err(self.error(&format!("Unexpected identifier: \"{}\"", ident)));
            }
            (Some(expected), _) => {
                return Err(self.error(&format!("{} value is expected", expected.keyword())));
            }
            (None, _) => return Err(self.error("Unexpected token")),
        };
        self.advance();
        Ok(scalar)
    }

    fn current(&self) -> &Token {
        // tokenize always ends the stream with Eof
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn check_symbol(&self, symbol: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Symbol(s) if *s == symbol)
    }

    fn consume_symbol(&mut self, symbol: &str) -> bool {
        if self.check_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), ParseError> {
        if self.consume_symbol(symbol) {
            Ok(())
        } else {
            Err(self.require_symbol_error(symbol))
        }
    }

    fn expect_identifier(&mut self, declaration: &str) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.require_declaration_error(declaration)),
        }
    }

    fn expect_text(&mut self, declaration: &str) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Text(text) => {
                let text = text.clone();
                self.advance();
                Ok(text)
            }
            _ => Err(self.require_declaration_error(declaration)),
        }
    }

    fn require_symbol_error(&self, symbol: &str) -> ParseError {
        self.error(&format!(
            "Symbol \"{}\" is required but it is not given",
            symbol
        ))
    }

    fn require_declaration_error(&self, declaration: &str) -> ParseError {
        self.error(&format!("{} is required but it is not given", declaration))
    }

    fn error(&self, message: &str) -> ParseError {
        let token = self.current();
        let near = match token.kind {
            TokenKind::Eof => None,
            ref kind => Some(kind.to_string()),
        };
        ParseError::new(message, token.line, near)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::EnumType;

    fn parse(source: &str) -> Frame {
        Parser::new(source).unwrap().parse().unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        match Parser::new(source).and_then(|mut p| p.parse()) {
            Ok(frame) => panic!("Expected parse error, got {:?}", frame),
            Err(e) => e,
        }
    }

    #[test]
    fn test_scalar_properties() {
        let frame = parse("root: Object { a: Int 1 b: Float 2 c: String \"x\" d: Bool true e: URL \"file:/a\" }");
        assert_eq!(frame.instance_name, "root");
        assert_eq!(frame.class_name, "Object");
        let values: Vec<&Value> = frame.members.iter().map(|m| &m.value).collect();
        assert_eq!(
            values,
            vec![
                &Value::Scalar(Scalar::Int(1)),
                &Value::Scalar(Scalar::Float(2.0)),
                &Value::Scalar(Scalar::String("x".into())),
                &Value::Scalar(Scalar::Bool(true)),
                &Value::Scalar(Scalar::Url("file:/a".into())),
            ]
        );
    }

    #[test]
    fn test_listener_forms() {
        let frame = parse(
            "root: Object {\n a: Int 0\n f: Int Listner(x: self.a) %{ return x ; %}\n g: Listener(y: root.a) -> Int %{ return y ; %}\n}",
        );
        for name in ["f", "g"] {
            match &frame.member(name).unwrap().value {
                Value::Listener(func) => {
                    assert_eq!(func.return_type, ValueType::Int);
                    assert_eq!(func.arguments.len(), 1);
                    assert_eq!(func.arguments[0].path.elements.len(), 2);
                }
                other => panic!("Expected listener, got {:?}", other),
            }
        }
        assert_eq!(frame.member("g").unwrap().line, 3);
    }

    #[test]
    fn test_listener_requires_return_type() {
        let err = parse_err("root: Object { f: Listner(x: self.a) %{ return x ; %} }");
        assert!(err.message.contains("Return type of Listner is required"));
    }

    #[test]
    fn test_procedure_without_return_type() {
        let frame = parse("obj: Object { f: Func(a, b: Int) %{ return a+b ; %} }");
        match &frame.members[0].value {
            Value::Procedure(func) => {
                assert_eq!(func.return_type, None);
                assert_eq!(func.arguments[1].annotation, Some(ValueType::Int));
            }
            other => panic!("Expected procedure, got {:?}", other),
        }
    }

    #[test]
    fn test_init_forms() {
        let frame = parse(
            "root: Object { i0: Init %{ %} i1: Init() %{ %} i2: Init(self, arg) %{ %} }",
        );
        let arguments: Vec<Option<String>> = frame
            .members
            .iter()
            .map(|m| match &m.value {
                Value::Init(func) => func.argument.as_ref().map(|a| a.name.clone()),
                other => panic!("Expected init, got {:?}", other),
            })
            .collect();
        assert_eq!(arguments, vec![None, None, Some("arg".to_string())]);

        let err = parse_err("root: Object { i: Init(a, b) %{ %} }");
        assert!(err.message.contains("at most one argument"));
        let err = parse_err("root: Object { e: Int Event(a) %{ %} }");
        assert!(err.message.contains("does not have return type"));
    }

    #[test]
    fn test_nested_frames() {
        let frame = parse("root: Object { sub: Box { b: Int 1 } c: Int 2 }");
        let child = frame.children().next().unwrap();
        assert_eq!(child.instance_name, "sub");
        assert_eq!(child.class_name, "Box");
        assert_eq!(
            frame.member("sub").unwrap().declared_type,
            ValueType::Frame("Box".into())
        );
    }

    #[test]
    fn test_comma_between_members() {
        let frame = parse("root: Object { a: Int 0, sub: Object { b: Int 1 }, c: Bool true }");
        assert_eq!(frame.members.len(), 3);
    }

    #[test]
    fn test_collections() {
        let frame = parse(
            "root: Object { a: Array [1, \"s\", [true]] d: Dictionary {k: 1.5, j: {x: 1}} t: Float [1, 2.5] }",
        );
        assert_eq!(frame.members[0].declared_type, ValueType::Array(None));
        match &frame.members[2].value {
            Value::Array(items) => assert_eq!(
                items,
                &vec![
                    Value::Scalar(Scalar::Float(1.0)),
                    Value::Scalar(Scalar::Float(2.5))
                ]
            ),
            other => panic!("Expected array, got {:?}", other),
        }
        assert_eq!(
            frame.members[2].declared_type,
            ValueType::Array(Some(Box::new(ValueType::Float)))
        );
        let err = parse_err("root: Object { t: Int [1, \"x\"] }");
        assert!(err.message.contains("Int value is expected"));
    }

    #[test]
    fn test_enum_values() {
        let enums = EnumTable::new().with(
            EnumType::new("Align")
                .with_member("left", 0)
                .with_member("center", 1),
        );
        let frame = parse_frame("root: Object { a: Align center }", &enums).unwrap();
        assert_eq!(
            frame.members[0].value,
            Value::Scalar(Scalar::Enum {
                type_name: "Align".into(),
                member: "center".into(),
                value: 1,
            })
        );
        let err = parse_frame("root: Object { a: Align top }", &enums).unwrap_err();
        assert!(err.message.contains("Unknown member of Enum"));
        // without the registry the type name is a class
        assert!(parse_frame("root: Object { a: Align center }", &EnumTable::new()).is_err());
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let err = parse_err("root: Object { a: Int \"x\" }");
        assert_eq!(err.message, "Int value is expected");
        assert_eq!(err.near.as_deref(), Some("\"x\""));
    }

    #[test]
    fn test_short_path_rejected() {
        let err = parse_err("root: Object { f: Int Listner(x: a) %{ return x ; %} }");
        assert!(err.message.contains("needs an object and a property"));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse_err("root: Object { } extra");
        assert!(err.message.contains("after the root frame"));
    }

    #[test]
    fn test_missing_symbol_reports_line() {
        let err = parse_err("root: Object {\n a Int 1\n}");
        assert_eq!(err.message, "Symbol \":\" is required but it is not given");
        assert_eq!(err.line, 1);
        assert_eq!(err.near.as_deref(), Some("Int"));
    }

    #[test]
    fn test_reserved_class_name() {
        let err = parse_err("root: Int { }");
        assert!(err.message.contains("can not be used as a class name"));
    }
}
