//! XPath 1.0 expression parser.
//!
//! Recursive descent over the token stream from [`super::lexer`], producing
//! an [`Expr`] AST. Operator precedence, low to high: `or`, `and`, equality,
//! relational, additive, multiplicative, unary `-`, union `|`, then path
//! and filter expressions.
//!
//! Core function names and their argument counts are checked here, at
//! compile time; a bad name or arity is an `XPathCompile` error.

use crate::error::Error;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::lexer::{expand_abbreviations, Lexer, Token};

/// The XPath 1.0 core function library: name, minimum and maximum argument
/// counts (`None` = unbounded).
const CORE_FUNCTIONS: &[(&str, usize, Option<usize>)] = &[
    ("last", 0, Some(0)),
    ("position", 0, Some(0)),
    ("count", 1, Some(1)),
    ("id", 1, Some(1)),
    ("local-name", 0, Some(1)),
    ("namespace-uri", 0, Some(1)),
    ("name", 0, Some(1)),
    ("string", 0, Some(1)),
    ("concat", 2, None),
    ("starts-with", 2, Some(2)),
    ("contains", 2, Some(2)),
    ("substring-before", 2, Some(2)),
    ("substring-after", 2, Some(2)),
    ("substring", 2, Some(3)),
    ("string-length", 0, Some(1)),
    ("normalize-space", 0, Some(1)),
    ("translate", 3, Some(3)),
    ("boolean", 1, Some(1)),
    ("not", 1, Some(1)),
    ("true", 0, Some(0)),
    ("false", 0, Some(0)),
    ("lang", 1, Some(1)),
    ("number", 0, Some(1)),
    ("sum", 1, Some(1)),
    ("floor", 1, Some(1)),
    ("ceiling", 1, Some(1)),
    ("round", 1, Some(1)),
];

/// Parses an XPath expression string into an AST.
///
/// # Errors
///
/// Returns `XPathCompile` for syntax errors, unknown functions, and wrong
/// argument counts.
pub fn parse(input: &str) -> Result<Expr, Error> {
    let expanded = expand_abbreviations(input);
    let tokens = Lexer::new(&expanded).tokenize()?;

    if tokens.is_empty() {
        return Err(Error::XPathCompile {
            message: "empty XPath expression".to_string(),
            position: 0,
        });
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;

    if parser.pos < parser.tokens.len() {
        return Err(parser.error(format!(
            "unexpected token '{}' after expression",
            parser.tokens[parser.pos]
        )));
    }

    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    // --- Token helpers ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), Error> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{token}', found {}",
                self.describe_current()
            )))
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn describe_current(&self) -> String {
        self.peek()
            .map_or_else(|| "end of expression".to_string(), |t| format!("'{t}'"))
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::XPathCompile {
            message: message.into(),
            position: self.pos,
        }
    }

    // --- Grammar productions ---

    /// `Expr ::= OrExpr`
    fn parse_expr(&mut self) -> Result<Expr, Error> {
        self.parse_or_expr()
    }

    /// `OrExpr ::= AndExpr ('or' AndExpr)*`
    fn parse_or_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and_expr()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    /// `AndExpr ::= EqualityExpr ('and' EqualityExpr)*`
    fn parse_and_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_equality_expr()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality_expr()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    /// `EqualityExpr ::= RelationalExpr (('=' | '!=') RelationalExpr)*`
    fn parse_equality_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_relational_expr()?;
        loop {
            let op = if self.eat(&Token::Equal) {
                BinaryOp::Eq
            } else if self.eat(&Token::NotEqual) {
                BinaryOp::Neq
            } else {
                break;
            };
            let right = self.parse_relational_expr()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `RelationalExpr ::= AdditiveExpr (('<'|'<='|'>'|'>=') AdditiveExpr)*`
    fn parse_relational_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = if self.eat(&Token::LessThan) {
                BinaryOp::Lt
            } else if self.eat(&Token::LessThanEqual) {
                BinaryOp::Lte
            } else if self.eat(&Token::GreaterThan) {
                BinaryOp::Gt
            } else if self.eat(&Token::GreaterThanEqual) {
                BinaryOp::Gte
            } else {
                break;
            };
            let right = self.parse_additive_expr()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `AdditiveExpr ::= MultiplicativeExpr (('+' | '-') MultiplicativeExpr)*`
    fn parse_additive_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinaryOp::Add
            } else if self.eat(&Token::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_multiplicative_expr()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `MultiplicativeExpr ::= UnaryExpr (('*' | 'div' | 'mod') UnaryExpr)*`
    fn parse_multiplicative_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = if self.eat(&Token::Star) {
                BinaryOp::Mul
            } else if self.eat(&Token::Div) {
                BinaryOp::Div
            } else if self.eat(&Token::Mod) {
                BinaryOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary_expr()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `UnaryExpr ::= '-'* UnionExpr`
    fn parse_unary_expr(&mut self) -> Result<Expr, Error> {
        if self.eat(&Token::Minus) {
            let inner = self.parse_unary_expr()?;
            Ok(Expr::UnaryNeg(Box::new(inner)))
        } else {
            self.parse_union_expr()
        }
    }

    /// `UnionExpr ::= PathExpr ('|' PathExpr)*`
    fn parse_union_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// `PathExpr ::= LocationPath | FilterExpr (('/' | '//') RelativeLocationPath)?`
    ///
    /// Location paths begin with `/`, an axis name, a node type, or a name
    /// test; filter expressions begin with a primary expression.
    fn parse_path_expr(&mut self) -> Result<Expr, Error> {
        match self.peek() {
            Some(Token::Slash | Token::AxisName(_) | Token::NodeType(_) | Token::Name(_)) => {
                self.parse_location_path()
            }
            Some(
                Token::VariableReference(_)
                | Token::Literal(_)
                | Token::Number(_)
                | Token::LeftParen
                | Token::FunctionName(_),
            ) => {
                let expr = self.parse_filter_expr()?;
                if self.eat(&Token::Slash) {
                    let mut steps = Vec::new();
                    self.parse_relative_path_into(&mut steps)?;
                    Ok(Expr::PathFrom {
                        base: Box::new(expr),
                        steps,
                    })
                } else {
                    Ok(expr)
                }
            }
            _ => Err(self.error(format!(
                "expected expression, found {}",
                self.describe_current()
            ))),
        }
    }

    /// `FilterExpr ::= PrimaryExpr Predicate*`
    fn parse_filter_expr(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_primary_expr()?;
        let predicates = self.parse_predicates()?;
        if predicates.is_empty() {
            Ok(expr)
        } else {
            Ok(Expr::Filter {
                expr: Box::new(expr),
                predicates,
            })
        }
    }

    /// `PrimaryExpr ::= VariableReference | '(' Expr ')' | Literal | Number
    ///                | FunctionCall`
    fn parse_primary_expr(&mut self) -> Result<Expr, Error> {
        match self.peek().cloned() {
            Some(Token::VariableReference(name)) => {
                self.pos += 1;
                Ok(Expr::Variable(name))
            }
            Some(Token::Literal(value)) => {
                self.pos += 1;
                Ok(Expr::String(value))
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::LeftParen) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::FunctionName(_)) => self.parse_function_call(),
            _ => Err(self.error(format!(
                "expected primary expression, found {}",
                self.describe_current()
            ))),
        }
    }

    /// `FunctionCall ::= FunctionName '(' (Expr (',' Expr)*)? ')'`
    ///
    /// The function must be in the core library, with a matching argument
    /// count.
    fn parse_function_call(&mut self) -> Result<Expr, Error> {
        let Some(Token::FunctionName(name)) = self.advance() else {
            return Err(self.error("expected function name"));
        };
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !self.check(&Token::RightParen) {
            args.push(self.parse_expr()?);
            while self.eat(&Token::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&Token::RightParen)?;

        let Some(&(_, min, max)) = CORE_FUNCTIONS.iter().find(|(n, _, _)| *n == name) else {
            return Err(self.error(format!("unknown function '{name}()'")));
        };
        let ok = args.len() >= min && max.map_or(true, |m| args.len() <= m);
        if !ok {
            return Err(self.error(format!(
                "wrong number of arguments for '{name}()': got {}, expected {}",
                args.len(),
                match max {
                    Some(m) if m == min => format!("{min}"),
                    Some(m) => format!("{min} to {m}"),
                    None => format!("at least {min}"),
                }
            )));
        }

        Ok(Expr::FunctionCall { name, args })
    }

    /// `LocationPath ::= '/' RelativeLocationPath? | RelativeLocationPath`
    fn parse_location_path(&mut self) -> Result<Expr, Error> {
        if self.eat(&Token::Slash) {
            let mut steps = Vec::new();
            if self.is_step_start() {
                self.parse_relative_path_into(&mut steps)?;
            }
            Ok(Expr::RootPath { steps })
        } else {
            let mut steps = Vec::new();
            self.parse_relative_path_into(&mut steps)?;
            Ok(Expr::Path { steps })
        }
    }

    fn is_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::AxisName(_) | Token::NodeType(_) | Token::Name(_))
        )
    }

    /// `RelativeLocationPath ::= Step ('/' Step)*`
    fn parse_relative_path_into(&mut self, steps: &mut Vec<Step>) -> Result<(), Error> {
        steps.push(self.parse_step()?);
        while self.eat(&Token::Slash) {
            steps.push(self.parse_step()?);
        }
        Ok(())
    }

    /// `Step ::= (AxisName '::')? NodeTest Predicate*`
    fn parse_step(&mut self) -> Result<Step, Error> {
        let axis = if let Some(Token::AxisName(name)) = self.peek().cloned() {
            self.pos += 1;
            self.expect(&Token::ColonColon)?;
            Axis::parse(&name)
                .ok_or_else(|| self.error(format!("unknown axis '{name}'")))?
        } else {
            Axis::Child
        };

        let node_test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;

        Ok(Step {
            axis,
            node_test,
            predicates,
        })
    }

    /// `NodeTest ::= NameTest | NodeType '(' Literal? ')'`
    fn parse_node_test(&mut self) -> Result<NodeTest, Error> {
        match self.advance() {
            Some(Token::Name(name)) => {
                if name == "*" {
                    Ok(NodeTest::Wildcard)
                } else if let Some(prefix) = name.strip_suffix(":*") {
                    Ok(NodeTest::PrefixWildcard(prefix.to_string()))
                } else {
                    Ok(NodeTest::Name(name))
                }
            }
            Some(Token::NodeType(kind)) => {
                self.expect(&Token::LeftParen)?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => {
                        if let Some(Token::Literal(target)) = self.peek().cloned() {
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        } else {
                            NodeTest::ProcessingInstruction(None)
                        }
                    }
                    other => return Err(self.error(format!("unknown node type '{other}()'"))),
                };
                self.expect(&Token::RightParen)?;
                Ok(test)
            }
            other => Err(self.error(format!(
                "expected node test, found {}",
                other.map_or_else(|| "end of expression".to_string(), |t| format!("'{t}'"))
            ))),
        }
    }

    /// `Predicate ::= '[' Expr ']'`
    fn parse_predicates(&mut self) -> Result<Vec<Expr>, Error> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(&Token::RightBracket)?;
        }
        Ok(predicates)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_path() {
        let expr = parse("/a/b/c").unwrap();
        match expr {
            Expr::RootPath { steps } => {
                assert_eq!(steps.len(), 3);
                assert_eq!(steps[0].axis, Axis::Child);
                assert_eq!(steps[0].node_test, NodeTest::Name("a".to_string()));
            }
            other => panic!("expected RootPath, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_descendant_abbreviation() {
        let expr = parse("//person").unwrap();
        match expr {
            Expr::RootPath { steps } => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[0].axis, Axis::DescendantOrSelf);
                assert_eq!(steps[0].node_test, NodeTest::Node);
                assert_eq!(steps[1].node_test, NodeTest::Name("person".to_string()));
            }
            other => panic!("expected RootPath, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_attribute_abbreviation() {
        let expr = parse("@id").unwrap();
        match expr {
            Expr::Path { steps } => {
                assert_eq!(steps[0].axis, Axis::Attribute);
                assert_eq!(steps[0].node_test, NodeTest::Name("id".to_string()));
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_predicate() {
        let expr = parse("person[@id = '1']").unwrap();
        match expr {
            Expr::Path { steps } => {
                assert_eq!(steps.len(), 1);
                assert_eq!(steps[0].predicates.len(), 1);
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_positional_predicate() {
        let expr = parse("item[2]").unwrap();
        match expr {
            Expr::Path { steps } => match &steps[0].predicates[0] {
                Expr::Number(n) => assert_eq!(*n, 2.0),
                other => panic!("expected number predicate, got {other:?}"),
            },
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_union() {
        let expr = parse("a | b | c").unwrap();
        assert!(matches!(expr, Expr::Union(_, _)));
    }

    #[test]
    fn test_parse_operator_precedence() {
        // or binds loosest: (a and b) or c
        let expr = parse("a and b or c").unwrap();
        match expr {
            Expr::BinaryOp { op, left, .. } => {
                assert_eq!(op, BinaryOp::Or);
                assert!(matches!(
                    *left,
                    Expr::BinaryOp {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("expected BinaryOp, got {other:?}"),
        }

        // multiplication binds tighter than addition: 1 + (2 * 3)
        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::BinaryOp { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    *right,
                    Expr::BinaryOp {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected BinaryOp, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unary_minus() {
        let expr = parse("-1").unwrap();
        assert!(matches!(expr, Expr::UnaryNeg(_)));
        let expr = parse("--1").unwrap();
        assert!(matches!(expr, Expr::UnaryNeg(_)));
    }

    #[test]
    fn test_parse_function_call() {
        let expr = parse("count(//a)").unwrap();
        match expr {
            Expr::FunctionCall { name, args } => {
                assert_eq!(name, "count");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected FunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_function_rejected() {
        let err = parse("frobnicate()").unwrap_err();
        assert!(matches!(err, Error::XPathCompile { .. }));
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_arity_checked_at_parse_time() {
        assert!(parse("count()").is_err());
        assert!(parse("count(a, b)").is_err());
        assert!(parse("concat('a')").is_err());
        assert!(parse("concat('a', 'b', 'c', 'd')").is_ok());
        assert!(parse("substring('a', 1, 2, 3)").is_err());
        assert!(parse("true(1)").is_err());
        assert!(parse("not()").is_err());
    }

    #[test]
    fn test_parse_variable() {
        let expr = parse("$x + 1").unwrap();
        match expr {
            Expr::BinaryOp { left, .. } => {
                assert!(matches!(*left, Expr::Variable(ref name) if name == "x"));
            }
            other => panic!("expected BinaryOp, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_filter_with_path_continuation() {
        let expr = parse("id('x')/child::p").unwrap();
        assert!(matches!(expr, Expr::PathFrom { .. }));
    }

    #[test]
    fn test_parse_node_type_tests() {
        let expr = parse("text()").unwrap();
        match expr {
            Expr::Path { steps } => assert_eq!(steps[0].node_test, NodeTest::Text),
            other => panic!("expected Path, got {other:?}"),
        }

        let expr = parse("processing-instruction('style')").unwrap();
        match expr {
            Expr::Path { steps } => assert_eq!(
                steps[0].node_test,
                NodeTest::ProcessingInstruction(Some("style".to_string()))
            ),
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_wildcards() {
        let expr = parse("*").unwrap();
        match expr {
            Expr::Path { steps } => assert_eq!(steps[0].node_test, NodeTest::Wildcard),
            other => panic!("expected Path, got {other:?}"),
        }

        let expr = parse("z:*").unwrap();
        match expr {
            Expr::Path { steps } => {
                assert_eq!(
                    steps[0].node_test,
                    NodeTest::PrefixWildcard("z".to_string())
                );
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_root() {
        let expr = parse("/").unwrap();
        match expr {
            Expr::RootPath { steps } => assert!(steps.is_empty()),
            other => panic!("expected RootPath, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_dot_abbreviations() {
        let expr = parse(".").unwrap();
        match expr {
            Expr::Path { steps } => {
                assert_eq!(steps[0].axis, Axis::Self_);
                assert_eq!(steps[0].node_test, NodeTest::Node);
            }
            other => panic!("expected Path, got {other:?}"),
        }

        let expr = parse("../sibling").unwrap();
        match expr {
            Expr::Path { steps } => {
                assert_eq!(steps[0].axis, Axis::Parent);
                assert_eq!(steps[1].node_test, NodeTest::Name("sibling".to_string()));
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse("a b").is_err());
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn test_empty_expression_rejected() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }
}
