//! Abstract syntax tree for XPath 1.0 expressions.
//!
//! The AST follows the XPath 1.0 grammar
//! (<https://www.w3.org/TR/xpath-10/#section-Basics>). Location paths are
//! composed of [`Step`]s, each with an [`Axis`], a [`NodeTest`], and zero
//! or more predicate expressions. Expression nodes are plain boxed sums;
//! evaluation is a pure function over `(context, expression)`.

/// An XPath 1.0 expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A numeric literal (e.g., `42`, `3.14`).
    Number(f64),

    /// A string literal (e.g., `"hello"` or `'world'`).
    String(String),

    /// A variable reference (`$foo`), name stored without the `$`.
    Variable(String),

    /// A binary operation (`a + b`, `x = y`, `p and q`, ...).
    BinaryOp {
        /// The operator.
        op: BinaryOp,
        /// The left-hand operand.
        left: Box<Expr>,
        /// The right-hand operand.
        right: Box<Expr>,
    },

    /// Unary negation (`-x`).
    UnaryNeg(Box<Expr>),

    /// A function call (`contains(@name, 'foo')`).
    FunctionCall {
        /// The function name.
        name: String,
        /// The argument expressions.
        args: Vec<Expr>,
    },

    /// A relative location path (`child::p/child::a`).
    Path {
        /// The steps, evaluated left to right.
        steps: Vec<Step>,
    },

    /// An absolute location path (`/html/body`). Empty `steps` is the bare
    /// `/` (the root node).
    RootPath {
        /// The steps following the initial `/`.
        steps: Vec<Step>,
    },

    /// A filter expression with predicates (`$nodes[1]`).
    Filter {
        /// The primary expression being filtered.
        expr: Box<Expr>,
        /// The predicates, applied in order.
        predicates: Vec<Expr>,
    },

    /// A location path continuing from a filter expression
    /// (`id('x')/child::p`).
    PathFrom {
        /// The expression producing the starting node-set.
        base: Box<Expr>,
        /// The steps applied to it.
        steps: Vec<Step>,
    },

    /// A union of two node-sets (`a | b`).
    Union(Box<Expr>, Box<Expr>),
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Sub,
    /// Multiplication (`*`).
    Mul,
    /// Division (`div`).
    Div,
    /// Modulo (`mod`).
    Mod,
    /// Equality (`=`).
    Eq,
    /// Inequality (`!=`).
    Neq,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Lte,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Gte,
    /// Logical conjunction (`and`).
    And,
    /// Logical disjunction (`or`).
    Or,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::And => "and",
            Self::Or => "or",
        };
        f.write_str(s)
    }
}

/// One step in a location path: axis, node test, predicates.
#[derive(Debug, Clone)]
pub struct Step {
    /// The traversal direction.
    pub axis: Axis,
    /// The test applied to each candidate node.
    pub node_test: NodeTest,
    /// Predicates filtering the selected nodes, applied left to right.
    pub predicates: Vec<Expr>,
}

/// An XPath axis. All 13 axes of XPath 1.0 §2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Direct children.
    Child,
    /// All descendants.
    Descendant,
    /// The immediate parent.
    Parent,
    /// All ancestors up to the root.
    Ancestor,
    /// Siblings after the context node.
    FollowingSibling,
    /// Siblings before the context node.
    PrecedingSibling,
    /// Everything after the context node in document order.
    Following,
    /// Everything before the context node in document order.
    Preceding,
    /// The context node's attributes.
    Attribute,
    /// The context node's in-scope namespace declarations.
    Namespace,
    /// The context node itself.
    Self_,
    /// The context node and its descendants.
    DescendantOrSelf,
    /// The context node and its ancestors.
    AncestorOrSelf,
}

impl Axis {
    /// The axis name as written in XPath syntax.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::Parent => "parent",
            Self::Ancestor => "ancestor",
            Self::FollowingSibling => "following-sibling",
            Self::PrecedingSibling => "preceding-sibling",
            Self::Following => "following",
            Self::Preceding => "preceding",
            Self::Attribute => "attribute",
            Self::Namespace => "namespace",
            Self::Self_ => "self",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::AncestorOrSelf => "ancestor-or-self",
        }
    }

    /// Parses an axis name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Self::Child),
            "descendant" => Some(Self::Descendant),
            "parent" => Some(Self::Parent),
            "ancestor" => Some(Self::Ancestor),
            "following-sibling" => Some(Self::FollowingSibling),
            "preceding-sibling" => Some(Self::PrecedingSibling),
            "following" => Some(Self::Following),
            "preceding" => Some(Self::Preceding),
            "attribute" => Some(Self::Attribute),
            "namespace" => Some(Self::Namespace),
            "self" => Some(Self::Self_),
            "descendant-or-self" => Some(Self::DescendantOrSelf),
            "ancestor-or-self" => Some(Self::AncestorOrSelf),
            _ => None,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node test in a location path step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A name test. May be an `NCName` (matches the local name) or a
    /// `QName` (matches prefix and local name).
    Name(String),

    /// The `*` wildcard.
    Wildcard,

    /// `prefix:*` — any local name under the given prefix.
    PrefixWildcard(String),

    /// `node()` — any node.
    Node,

    /// `text()` — text and CDATA nodes.
    Text,

    /// `comment()`.
    Comment,

    /// `processing-instruction()`, optionally with a target literal.
    ProcessingInstruction(Option<String>),
}

impl std::fmt::Display for NodeTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Wildcard => f.write_str("*"),
            Self::PrefixWildcard(prefix) => write!(f, "{prefix}:*"),
            Self::Node => f.write_str("node()"),
            Self::Text => f.write_str("text()"),
            Self::Comment => f.write_str("comment()"),
            Self::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
            Self::ProcessingInstruction(Some(target)) => {
                write!(f, "processing-instruction('{target}')")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_roundtrip() {
        let axes = [
            Axis::Child,
            Axis::Descendant,
            Axis::Parent,
            Axis::Ancestor,
            Axis::FollowingSibling,
            Axis::PrecedingSibling,
            Axis::Following,
            Axis::Preceding,
            Axis::Attribute,
            Axis::Namespace,
            Axis::Self_,
            Axis::DescendantOrSelf,
            Axis::AncestorOrSelf,
        ];
        for axis in axes {
            assert_eq!(Axis::parse(axis.as_str()), Some(axis));
        }
        assert_eq!(Axis::parse("sideways"), None);
    }

    #[test]
    fn test_node_test_display() {
        assert_eq!(NodeTest::Name("foo".to_string()).to_string(), "foo");
        assert_eq!(NodeTest::Wildcard.to_string(), "*");
        assert_eq!(NodeTest::PrefixWildcard("z".to_string()).to_string(), "z:*");
        assert_eq!(NodeTest::Text.to_string(), "text()");
        assert_eq!(
            NodeTest::ProcessingInstruction(Some("pi".to_string())).to_string(),
            "processing-instruction('pi')"
        );
    }

    #[test]
    fn test_binary_op_display() {
        assert_eq!(BinaryOp::Div.to_string(), "div");
        assert_eq!(BinaryOp::Neq.to_string(), "!=");
        assert_eq!(BinaryOp::And.to_string(), "and");
    }
}
