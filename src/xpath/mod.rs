//! XPath 1.0 engine.
//!
//! Compile an expression once with [`XPath::compile`], then evaluate it
//! against any document. Evaluation never mutates the tree, so one
//! compiled expression may serve many read-only queries.
//!
//! ```
//! use ferroxml::{Document, xpath::{Context, XPath}};
//!
//! let doc = Document::parse_str("<persons><person id=\"1\"/></persons>").unwrap();
//! let root = doc.root_element().unwrap();
//! let xp = XPath::compile("//person").unwrap();
//! let hits = xp.evaluate_elements(&doc, root, &Context::new()).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

pub mod ast;
mod eval;
pub mod lexer;
pub mod parser;
mod types;

pub use types::{format_xpath_number, Value, XNode};

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tree::{Document, NodeId, NodeKind};

/// Variable bindings for expression evaluation.
///
/// Referenced from expressions as `$name`; an unbound name is an
/// evaluation error.
#[derive(Debug, Clone, Default)]
pub struct Context {
    variables: HashMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a variable to a string, number, or boolean value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// A compiled XPath 1.0 expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: ast::Expr,
}

impl XPath {
    /// Compiles an XPath 1.0 expression.
    ///
    /// # Errors
    ///
    /// Returns `XPathCompile` for syntax errors, unknown functions, and
    /// wrong argument counts.
    pub fn compile(source: &str) -> Result<Self> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// The original expression source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression with `node` as the context node.
    ///
    /// # Errors
    ///
    /// Returns `XPathEval` on type errors or unbound variables.
    pub fn evaluate(&self, doc: &Document, node: NodeId, context: &Context) -> Result<Value> {
        eval::Evaluator::new(doc, context).evaluate(&self.expr, node)
    }

    /// Evaluates and returns the resulting node-set, all node kinds
    /// included.
    ///
    /// # Errors
    ///
    /// Returns `XPathEval` if evaluation fails or produces a non-node-set.
    pub fn evaluate_nodes(
        &self,
        doc: &Document,
        node: NodeId,
        context: &Context,
    ) -> Result<Vec<XNode>> {
        match self.evaluate(doc, node, context)? {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(Error::xpath_eval(format!(
                "expression '{}' produced a {}, not a node-set",
                self.source,
                other.type_name()
            ))),
        }
    }

    /// Evaluates and returns only the element nodes of the result set.
    ///
    /// # Errors
    ///
    /// See [`evaluate_nodes`](Self::evaluate_nodes).
    pub fn evaluate_elements(
        &self,
        doc: &Document,
        node: NodeId,
        context: &Context,
    ) -> Result<Vec<NodeId>> {
        let nodes = self.evaluate_nodes(doc, node, context)?;
        Ok(nodes
            .into_iter()
            .filter_map(XNode::node_id)
            .filter(|&id| matches!(doc.node(id).kind, NodeKind::Element { .. }))
            .collect())
    }

    /// Evaluates the expression against the document containing `node` and
    /// reports whether `node` is in the result set.
    ///
    /// # Errors
    ///
    /// See [`evaluate_nodes`](Self::evaluate_nodes).
    pub fn matches(&self, doc: &Document, node: NodeId, context: &Context) -> Result<bool> {
        let nodes = self.evaluate_nodes(doc, doc.root(), context)?;
        Ok(nodes.contains(&XNode::Tree(node)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_reports_position() {
        let err = XPath::compile("//a[").unwrap_err();
        assert!(matches!(err, Error::XPathCompile { .. }));
    }

    #[test]
    fn test_source_preserved() {
        let xp = XPath::compile("//a | //b").unwrap();
        assert_eq!(xp.source(), "//a | //b");
    }

    #[test]
    fn test_evaluate_elements_filters_non_elements() {
        let doc = Document::parse_str("<r>text<x/><!--c--></r>").unwrap();
        let root = doc.root_element().unwrap();
        let xp = XPath::compile("node()").unwrap();
        let all = xp.evaluate_nodes(&doc, root, &Context::new()).unwrap();
        assert_eq!(all.len(), 3);
        let elements = xp.evaluate_elements(&doc, root, &Context::new()).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(doc.node_name(elements[0]), Some("x"));
    }

    #[test]
    fn test_evaluate_nodes_rejects_scalar_result() {
        let doc = Document::parse_str("<r/>").unwrap();
        let root = doc.root_element().unwrap();
        let xp = XPath::compile("1 + 1").unwrap();
        assert!(xp.evaluate_nodes(&doc, root, &Context::new()).is_err());
    }

    #[test]
    fn test_matches() {
        let doc = Document::parse_str("<r><a/><b/></r>").unwrap();
        let root = doc.root_element().unwrap();
        let a = doc.first_child(root).unwrap();
        let b = doc.last_child(root).unwrap();

        let xp = XPath::compile("//a").unwrap();
        assert!(xp.matches(&doc, a, &Context::new()).unwrap());
        assert!(!xp.matches(&doc, b, &Context::new()).unwrap());
    }

    #[test]
    fn test_variable_binding_types() {
        let doc = Document::parse_str(r#"<r><i v="7"/></r>"#).unwrap();
        let root = doc.root_element().unwrap();

        let mut ctx = Context::new();
        ctx.set("threshold", 5.0);
        ctx.set("label", "seven");

        let xp = XPath::compile("i[@v > $threshold]").unwrap();
        assert_eq!(xp.evaluate_nodes(&doc, root, &ctx).unwrap().len(), 1);
    }
}
