//! XPath 1.0 expression evaluator.
//!
//! A tree-walking interpreter over the [`Expr`] AST. Evaluation is a pure
//! function of `(document, context, expression)`; the DOM is never
//! mutated, so read-only evaluations may run concurrently.
//!
//! All 13 axes are implemented over the document's parent/sibling links.
//! Attribute and namespace nodes are addressed as [`XNode::Attribute`]
//! values; the attribute axis yields ordinary attributes, the namespace
//! axis yields the element's `xmlns` declarations. Node-sets are kept in
//! document order with duplicates removed, and predicates see positions
//! in that order.

use crate::error::{Error, Result};
use crate::tree::{Document, NodeId, NodeKind};
use crate::util::split_name;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::types::{parse_xpath_number, Value, XNode};
use super::Context;

/// Evaluation state: the document, variable bindings, and the context
/// node/position/size triple.
pub(crate) struct Evaluator<'a> {
    doc: &'a Document,
    context: &'a Context,
}

/// The per-node part of the evaluation context (XPath 1.0 §1).
#[derive(Clone, Copy)]
struct EvalCtx {
    node: XNode,
    /// 1-based position within the context node-set.
    position: usize,
    /// Size of the context node-set.
    size: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(doc: &'a Document, context: &'a Context) -> Self {
        Self { doc, context }
    }

    /// Evaluates `expr` with `node` as the context node.
    pub fn evaluate(&self, expr: &Expr, node: NodeId) -> Result<Value> {
        let ctx = EvalCtx {
            node: XNode::Tree(node),
            position: 1,
            size: 1,
        };
        self.eval(ctx, expr)
    }

    fn eval(&self, ctx: EvalCtx, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Variable(name) => {
                self.context
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::xpath_eval(format!("undefined variable '${name}'")))
            }
            Expr::BinaryOp { op, left, right } => self.eval_binary(ctx, *op, left, right),
            Expr::UnaryNeg(inner) => {
                let value = self.eval(ctx, inner)?;
                Ok(Value::Number(-value.to_number(self.doc)))
            }
            Expr::FunctionCall { name, args } => self.eval_function(ctx, name, args),
            Expr::Path { steps } => {
                let nodes = self.eval_steps(vec![ctx.node], steps)?;
                Ok(Value::NodeSet(nodes))
            }
            Expr::RootPath { steps } => {
                let start = vec![XNode::Tree(self.doc.root())];
                let nodes = self.eval_steps(start, steps)?;
                Ok(Value::NodeSet(nodes))
            }
            Expr::Filter { expr, predicates } => {
                let mut nodes = match self.eval(ctx, expr)? {
                    Value::NodeSet(nodes) => nodes,
                    other => {
                        return Err(Error::xpath_eval(format!(
                            "predicates require a node-set, found {}",
                            other.type_name()
                        )))
                    }
                };
                sort_document_order(&mut nodes);
                for predicate in predicates {
                    nodes = self.apply_predicate(nodes, predicate)?;
                }
                Ok(Value::NodeSet(nodes))
            }
            Expr::PathFrom { base, steps } => {
                let nodes = match self.eval(ctx, base)? {
                    Value::NodeSet(nodes) => nodes,
                    other => {
                        return Err(Error::xpath_eval(format!(
                            "location path requires a node-set, found {}",
                            other.type_name()
                        )))
                    }
                };
                let nodes = self.eval_steps(nodes, steps)?;
                Ok(Value::NodeSet(nodes))
            }
            Expr::Union(left, right) => {
                let lv = self.eval(ctx, left)?;
                let rv = self.eval(ctx, right)?;
                let (Value::NodeSet(mut nodes), Value::NodeSet(right_nodes)) = (lv, rv) else {
                    return Err(Error::xpath_eval(
                        "operands of '|' must be node-sets".to_string(),
                    ));
                };
                for node in right_nodes {
                    if !nodes.contains(&node) {
                        nodes.push(node);
                    }
                }
                sort_document_order(&mut nodes);
                Ok(Value::NodeSet(nodes))
            }
        }
    }

    // -----------------------------------------------------------------
    // Location paths
    // -----------------------------------------------------------------

    fn eval_steps(&self, start: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>> {
        let mut nodes = start;
        for step in steps {
            nodes = self.apply_step(&nodes, step)?;
        }
        Ok(nodes)
    }

    /// One step: expand the axis from every input node, filter by the node
    /// test, sort into document order, then apply each predicate in turn.
    fn apply_step(&self, input: &[XNode], step: &Step) -> Result<Vec<XNode>> {
        let mut result: Vec<XNode> = Vec::new();
        for &node in input {
            for candidate in self.expand_axis(node, step.axis) {
                if self.matches_test(candidate, &step.node_test, step.axis)
                    && !result.contains(&candidate)
                {
                    result.push(candidate);
                }
            }
        }
        sort_document_order(&mut result);

        for predicate in &step.predicates {
            result = self.apply_predicate(result, predicate)?;
        }
        Ok(result)
    }

    fn apply_predicate(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = EvalCtx {
                node,
                position: index + 1,
                size,
            };
            let value = self.eval(ctx, predicate)?;
            let keep = match value {
                // A numeric predicate selects by position (§2.4).
                #[allow(clippy::float_cmp, clippy::cast_precision_loss)]
                Value::Number(n) => n == (index + 1) as f64,
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    // -----------------------------------------------------------------
    // Axes
    // -----------------------------------------------------------------

    fn expand_axis(&self, node: XNode, axis: Axis) -> Vec<XNode> {
        match axis {
            Axis::Self_ => vec![node],
            Axis::Child => match node {
                XNode::Tree(id) => self.doc.children(id).map(XNode::Tree).collect(),
                XNode::Attribute(..) => Vec::new(),
            },
            Axis::Descendant => match node {
                XNode::Tree(id) => self.doc.descendants(id).map(XNode::Tree).collect(),
                XNode::Attribute(..) => Vec::new(),
            },
            Axis::DescendantOrSelf => {
                let mut result = vec![node];
                if let XNode::Tree(id) = node {
                    result.extend(self.doc.descendants(id).map(XNode::Tree));
                }
                result
            }
            Axis::Parent => match node {
                XNode::Tree(id) => self.doc.parent(id).map(XNode::Tree).into_iter().collect(),
                XNode::Attribute(elem, _) => vec![XNode::Tree(elem)],
            },
            Axis::Ancestor => self.ancestors_of(node),
            Axis::AncestorOrSelf => {
                let mut result = vec![node];
                result.extend(self.ancestors_of(node));
                result
            }
            Axis::FollowingSibling => match node {
                XNode::Tree(id) => {
                    let mut result = Vec::new();
                    let mut current = self.doc.next_sibling(id);
                    while let Some(sibling) = current {
                        result.push(XNode::Tree(sibling));
                        current = self.doc.next_sibling(sibling);
                    }
                    result
                }
                XNode::Attribute(..) => Vec::new(),
            },
            Axis::PrecedingSibling => match node {
                XNode::Tree(id) => {
                    let mut result = Vec::new();
                    let mut current = self.doc.prev_sibling(id);
                    while let Some(sibling) = current {
                        result.push(XNode::Tree(sibling));
                        current = self.doc.prev_sibling(sibling);
                    }
                    result
                }
                XNode::Attribute(..) => Vec::new(),
            },
            Axis::Following => match node {
                XNode::Tree(id) => self.following_nodes(id),
                XNode::Attribute(elem, _) => self.following_nodes(elem),
            },
            Axis::Preceding => match node {
                XNode::Tree(id) => self.preceding_nodes(id),
                XNode::Attribute(elem, _) => self.preceding_nodes(elem),
            },
            Axis::Attribute => match node {
                XNode::Tree(id) => self
                    .doc
                    .attributes(id)
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| !a.is_namespace_decl())
                    .map(|(index, _)| XNode::Attribute(id, index))
                    .collect(),
                XNode::Attribute(..) => Vec::new(),
            },
            Axis::Namespace => match node {
                XNode::Tree(id) => self
                    .doc
                    .attributes(id)
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.is_namespace_decl())
                    .map(|(index, _)| XNode::Attribute(id, index))
                    .collect(),
                XNode::Attribute(..) => Vec::new(),
            },
        }
    }

    fn ancestors_of(&self, node: XNode) -> Vec<XNode> {
        let mut result = Vec::new();
        let mut current = match node {
            XNode::Tree(id) => self.doc.parent(id),
            XNode::Attribute(elem, _) => Some(elem),
        };
        while let Some(id) = current {
            result.push(XNode::Tree(id));
            current = self.doc.parent(id);
        }
        result
    }

    /// Everything after `node` in document order, excluding descendants.
    fn following_nodes(&self, node: NodeId) -> Vec<XNode> {
        let mut result = Vec::new();
        let mut anchor = Some(node);
        while let Some(current) = anchor {
            let mut sibling = self.doc.next_sibling(current);
            while let Some(s) = sibling {
                result.push(XNode::Tree(s));
                result.extend(self.doc.descendants(s).map(XNode::Tree));
                sibling = self.doc.next_sibling(s);
            }
            anchor = self.doc.parent(current);
        }
        result
    }

    /// Everything before `node` in document order, excluding ancestors.
    fn preceding_nodes(&self, node: NodeId) -> Vec<XNode> {
        let mut result = Vec::new();
        let mut anchor = Some(node);
        while let Some(current) = anchor {
            let mut sibling = self.doc.prev_sibling(current);
            while let Some(s) = sibling {
                let descendants: Vec<NodeId> = self.doc.descendants(s).collect();
                for &d in descendants.iter().rev() {
                    result.push(XNode::Tree(d));
                }
                result.push(XNode::Tree(s));
                sibling = self.doc.prev_sibling(s);
            }
            anchor = self.doc.parent(current);
        }
        result
    }

    // -----------------------------------------------------------------
    // Node tests
    // -----------------------------------------------------------------

    fn matches_test(&self, node: XNode, test: &NodeTest, axis: Axis) -> bool {
        let attr_axis = matches!(axis, Axis::Attribute | Axis::Namespace);
        match test {
            NodeTest::Node => true,
            NodeTest::Name(qname) => {
                let (test_prefix, test_local) = split_name(qname);
                if attr_axis {
                    let Some(attr) = self.attribute_of(node) else {
                        return false;
                    };
                    match test_prefix {
                        Some(p) => attr.prefix.as_deref() == Some(p) && attr.name == test_local,
                        None => attr.name == test_local,
                    }
                } else {
                    let XNode::Tree(id) = node else { return false };
                    match &self.doc.node(id).kind {
                        NodeKind::Element { name, prefix, .. } => match test_prefix {
                            Some(p) => prefix.as_deref() == Some(p) && name == test_local,
                            None => name == test_local,
                        },
                        _ => false,
                    }
                }
            }
            NodeTest::Wildcard => {
                if attr_axis {
                    self.attribute_of(node).is_some()
                } else {
                    matches!(
                        node,
                        XNode::Tree(id)
                            if matches!(self.doc.node(id).kind, NodeKind::Element { .. })
                    )
                }
            }
            NodeTest::PrefixWildcard(test_prefix) => {
                if attr_axis {
                    self.attribute_of(node)
                        .is_some_and(|a| a.prefix.as_deref() == Some(test_prefix.as_str()))
                } else {
                    let XNode::Tree(id) = node else { return false };
                    match &self.doc.node(id).kind {
                        NodeKind::Element { prefix, .. } => {
                            prefix.as_deref() == Some(test_prefix.as_str())
                        }
                        _ => false,
                    }
                }
            }
            NodeTest::Text => matches!(
                node,
                XNode::Tree(id)
                    if matches!(
                        self.doc.node(id).kind,
                        NodeKind::Text { .. } | NodeKind::CData { .. }
                    )
            ),
            NodeTest::Comment => matches!(
                node,
                XNode::Tree(id)
                    if matches!(self.doc.node(id).kind, NodeKind::Comment { .. })
            ),
            NodeTest::ProcessingInstruction(target) => {
                let XNode::Tree(id) = node else { return false };
                match &self.doc.node(id).kind {
                    NodeKind::ProcessingInstruction { target: t, .. } => {
                        target.as_ref().map_or(true, |expected| t == expected)
                    }
                    _ => false,
                }
            }
        }
    }

    fn attribute_of(&self, node: XNode) -> Option<&crate::tree::Attribute> {
        match node {
            XNode::Attribute(elem, index) => self.doc.attributes(elem).get(index),
            XNode::Tree(_) => None,
        }
    }

    // -----------------------------------------------------------------
    // Node names
    // -----------------------------------------------------------------

    fn node_qname(&self, node: XNode) -> String {
        match node {
            XNode::Tree(id) => self.doc.node_qname(id).unwrap_or_default(),
            XNode::Attribute(..) => self
                .attribute_of(node)
                .map(crate::tree::Attribute::qname)
                .unwrap_or_default(),
        }
    }

    fn node_local_name(&self, node: XNode) -> String {
        match node {
            XNode::Tree(id) => self.doc.node_name(id).unwrap_or_default().to_string(),
            XNode::Attribute(..) => self
                .attribute_of(node)
                .map(|a| a.name.clone())
                .unwrap_or_default(),
        }
    }

    fn node_namespace_uri(&self, node: XNode) -> String {
        match node {
            XNode::Tree(id) => self.doc.node_namespace(id).unwrap_or_default().to_string(),
            XNode::Attribute(..) => self
                .attribute_of(node)
                .and_then(|a| a.namespace.clone())
                .unwrap_or_default(),
        }
    }

    // -----------------------------------------------------------------
    // Binary operators
    // -----------------------------------------------------------------

    fn eval_binary(&self, ctx: EvalCtx, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        match op {
            BinaryOp::And => {
                if !self.eval(ctx, left)?.to_boolean() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.eval(ctx, right)?.to_boolean()))
            }
            BinaryOp::Or => {
                if self.eval(ctx, left)?.to_boolean() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.eval(ctx, right)?.to_boolean()))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let ln = self.eval(ctx, left)?.to_number(self.doc);
                let rn = self.eval(ctx, right)?.to_number(self.doc);
                let result = match op {
                    BinaryOp::Add => ln + rn,
                    BinaryOp::Sub => ln - rn,
                    BinaryOp::Mul => ln * rn,
                    BinaryOp::Div => ln / rn,
                    BinaryOp::Mod => ln % rn,
                    _ => unreachable!(),
                };
                Ok(Value::Number(result))
            }
            BinaryOp::Eq | BinaryOp::Neq => {
                let lv = self.eval(ctx, left)?;
                let rv = self.eval(ctx, right)?;
                let eq = self.compare_equality(&lv, &rv);
                Ok(Value::Boolean(if op == BinaryOp::Eq { eq } else { !eq }))
            }
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                let lv = self.eval(ctx, left)?;
                let rv = self.eval(ctx, right)?;
                Ok(Value::Boolean(self.compare_relational(op, &lv, &rv)))
            }
        }
    }

    /// Equality per §3.4: node-set pairs succeed on any matching pair of
    /// string-values; node-set vs. primitive tests each node; primitive
    /// pairs coerce by type precedence boolean > number > string.
    #[allow(clippy::float_cmp)]
    fn compare_equality(&self, lhs: &Value, rhs: &Value) -> bool {
        match (lhs, rhs) {
            (Value::NodeSet(left), Value::NodeSet(right)) => {
                for &l in left {
                    let lsv = l.string_value(self.doc);
                    for &r in right {
                        if lsv == r.string_value(self.doc) {
                            return true;
                        }
                    }
                }
                false
            }
            (Value::NodeSet(nodes), Value::Boolean(b))
            | (Value::Boolean(b), Value::NodeSet(nodes)) => !nodes.is_empty() == *b,
            (Value::NodeSet(nodes), Value::Number(n))
            | (Value::Number(n), Value::NodeSet(nodes)) => nodes
                .iter()
                .any(|node| parse_xpath_number(&node.string_value(self.doc)) == *n),
            (Value::NodeSet(nodes), Value::String(s))
            | (Value::String(s), Value::NodeSet(nodes)) => {
                nodes.iter().any(|node| node.string_value(self.doc) == *s)
            }
            (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                lhs.to_boolean() == rhs.to_boolean()
            }
            (Value::Number(_), _) | (_, Value::Number(_)) => {
                lhs.to_number(self.doc) == rhs.to_number(self.doc)
            }
            _ => lhs.to_xpath_string(self.doc) == rhs.to_xpath_string(self.doc),
        }
    }

    fn compare_relational(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
        let cmp = |a: f64, b: f64| match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Lte => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Gte => a >= b,
            _ => false,
        };

        match (lhs, rhs) {
            (Value::NodeSet(left), Value::NodeSet(right)) => {
                for &l in left {
                    let ln = parse_xpath_number(&l.string_value(self.doc));
                    for &r in right {
                        if cmp(ln, parse_xpath_number(&r.string_value(self.doc))) {
                            return true;
                        }
                    }
                }
                false
            }
            (Value::NodeSet(nodes), other) => {
                let rn = other.to_number(self.doc);
                nodes
                    .iter()
                    .any(|n| cmp(parse_xpath_number(&n.string_value(self.doc)), rn))
            }
            (other, Value::NodeSet(nodes)) => {
                let ln = other.to_number(self.doc);
                nodes
                    .iter()
                    .any(|n| cmp(ln, parse_xpath_number(&n.string_value(self.doc))))
            }
            _ => cmp(lhs.to_number(self.doc), rhs.to_number(self.doc)),
        }
    }

    // -----------------------------------------------------------------
    // Core function library (§4)
    // -----------------------------------------------------------------

    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    fn eval_function(&self, ctx: EvalCtx, name: &str, args: &[Expr]) -> Result<Value> {
        match name {
            // --- Node-set functions (§4.1) ---
            "last" => Ok(Value::Number(ctx.size as f64)),
            "position" => Ok(Value::Number(ctx.position as f64)),
            "count" => {
                let value = self.eval(ctx, &args[0])?;
                match value.as_node_set() {
                    Some(nodes) => Ok(Value::Number(nodes.len() as f64)),
                    None => Err(Error::xpath_eval(format!(
                        "count() requires a node-set, found {}",
                        value.type_name()
                    ))),
                }
            }
            "id" => {
                let value = self.eval(ctx, &args[0])?;
                let mut tokens: Vec<String> = Vec::new();
                match &value {
                    Value::NodeSet(nodes) => {
                        for node in nodes {
                            tokens.extend(
                                node.string_value(self.doc)
                                    .split_ascii_whitespace()
                                    .map(String::from),
                            );
                        }
                    }
                    other => tokens.extend(
                        other
                            .to_xpath_string(self.doc)
                            .split_ascii_whitespace()
                            .map(String::from),
                    ),
                }
                let mut result: Vec<XNode> = Vec::new();
                for token in tokens {
                    if let Some(elem) = self.doc.element_by_id(&token) {
                        let node = XNode::Tree(elem);
                        if !result.contains(&node) {
                            result.push(node);
                        }
                    }
                }
                sort_document_order(&mut result);
                Ok(Value::NodeSet(result))
            }
            "local-name" | "namespace-uri" | "name" => {
                let node = if args.is_empty() {
                    Some(ctx.node)
                } else {
                    let value = self.eval(ctx, &args[0])?;
                    match value.as_node_set() {
                        Some(nodes) => nodes.first().copied(),
                        None => {
                            return Err(Error::xpath_eval(format!(
                                "{name}() requires a node-set, found {}",
                                value.type_name()
                            )))
                        }
                    }
                };
                let result = node.map_or_else(String::new, |n| match name {
                    "local-name" => self.node_local_name(n),
                    "namespace-uri" => self.node_namespace_uri(n),
                    _ => self.node_qname(n),
                });
                Ok(Value::String(result))
            }

            // --- String functions (§4.2) ---
            "string" => {
                if args.is_empty() {
                    Ok(Value::String(ctx.node.string_value(self.doc)))
                } else {
                    let value = self.eval(ctx, &args[0])?;
                    Ok(Value::String(value.to_xpath_string(self.doc)))
                }
            }
            "concat" => {
                let mut result = String::new();
                for arg in args {
                    result.push_str(&self.eval(ctx, arg)?.to_xpath_string(self.doc));
                }
                Ok(Value::String(result))
            }
            "starts-with" => {
                let s = self.eval(ctx, &args[0])?.to_xpath_string(self.doc);
                let prefix = self.eval(ctx, &args[1])?.to_xpath_string(self.doc);
                Ok(Value::Boolean(s.starts_with(&prefix)))
            }
            "contains" => {
                let s = self.eval(ctx, &args[0])?.to_xpath_string(self.doc);
                let needle = self.eval(ctx, &args[1])?.to_xpath_string(self.doc);
                Ok(Value::Boolean(s.contains(&needle)))
            }
            "substring-before" => {
                let s = self.eval(ctx, &args[0])?.to_xpath_string(self.doc);
                let sep = self.eval(ctx, &args[1])?.to_xpath_string(self.doc);
                let result = s.find(&sep).map_or("", |pos| &s[..pos]);
                Ok(Value::String(result.to_string()))
            }
            "substring-after" => {
                let s = self.eval(ctx, &args[0])?.to_xpath_string(self.doc);
                let sep = self.eval(ctx, &args[1])?.to_xpath_string(self.doc);
                let result = s
                    .find(&sep)
                    .map_or("", |pos| &s[pos + sep.len()..]);
                Ok(Value::String(result.to_string()))
            }
            "substring" => self.fn_substring(ctx, args),
            "string-length" => {
                let s = if args.is_empty() {
                    ctx.node.string_value(self.doc)
                } else {
                    self.eval(ctx, &args[0])?.to_xpath_string(self.doc)
                };
                Ok(Value::Number(s.chars().count() as f64))
            }
            "normalize-space" => {
                let s = if args.is_empty() {
                    ctx.node.string_value(self.doc)
                } else {
                    self.eval(ctx, &args[0])?.to_xpath_string(self.doc)
                };
                let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
                Ok(Value::String(normalized))
            }
            "translate" => {
                let s = self.eval(ctx, &args[0])?.to_xpath_string(self.doc);
                let from = self.eval(ctx, &args[1])?.to_xpath_string(self.doc);
                let to = self.eval(ctx, &args[2])?.to_xpath_string(self.doc);
                let from_chars: Vec<char> = from.chars().collect();
                let to_chars: Vec<char> = to.chars().collect();
                let result: String = s
                    .chars()
                    .filter_map(|c| match from_chars.iter().position(|&f| f == c) {
                        Some(pos) => to_chars.get(pos).copied(),
                        None => Some(c),
                    })
                    .collect();
                Ok(Value::String(result))
            }

            // --- Boolean functions (§4.3) ---
            "boolean" => Ok(Value::Boolean(self.eval(ctx, &args[0])?.to_boolean())),
            "not" => Ok(Value::Boolean(!self.eval(ctx, &args[0])?.to_boolean())),
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            "lang" => {
                let target = self.eval(ctx, &args[0])?.to_xpath_string(self.doc);
                let lang = self.doc.lang(ctx.node.anchor());
                Ok(Value::Boolean(lang.is_some_and(|l| {
                    let l = l.to_ascii_lowercase();
                    let target = target.to_ascii_lowercase();
                    l == target || l.starts_with(&format!("{target}-"))
                })))
            }

            // --- Number functions (§4.4) ---
            "number" => {
                if args.is_empty() {
                    Ok(Value::Number(parse_xpath_number(
                        &ctx.node.string_value(self.doc),
                    )))
                } else {
                    Ok(Value::Number(self.eval(ctx, &args[0])?.to_number(self.doc)))
                }
            }
            "sum" => {
                let value = self.eval(ctx, &args[0])?;
                match value.as_node_set() {
                    Some(nodes) => {
                        let total: f64 = nodes
                            .iter()
                            .map(|n| parse_xpath_number(&n.string_value(self.doc)))
                            .sum();
                        Ok(Value::Number(total))
                    }
                    None => Err(Error::xpath_eval(format!(
                        "sum() requires a node-set, found {}",
                        value.type_name()
                    ))),
                }
            }
            "floor" => Ok(Value::Number(
                self.eval(ctx, &args[0])?.to_number(self.doc).floor(),
            )),
            "ceiling" => Ok(Value::Number(
                self.eval(ctx, &args[0])?.to_number(self.doc).ceil(),
            )),
            "round" => Ok(Value::Number(xpath_round(
                self.eval(ctx, &args[0])?.to_number(self.doc),
            ))),

            other => Err(Error::xpath_eval(format!("unknown function '{other}()'"))),
        }
    }

    /// `substring(string, start, length?)` with XPath 1.0 rounding and
    /// 1-based, clamped indexing (§4.2).
    fn fn_substring(&self, ctx: EvalCtx, args: &[Expr]) -> Result<Value> {
        let s = self.eval(ctx, &args[0])?.to_xpath_string(self.doc);
        let start = self.eval(ctx, &args[1])?.to_number(self.doc);
        let length = if args.len() == 3 {
            Some(self.eval(ctx, &args[2])?.to_number(self.doc))
        } else {
            None
        };

        let chars: Vec<char> = s.chars().collect();
        #[allow(clippy::cast_precision_loss)]
        let str_len = chars.len() as f64;

        let begin = xpath_round(start);
        let end = match length {
            Some(l) => begin + xpath_round(l),
            None => str_len + 1.0,
        };
        if begin.is_nan() || end.is_nan() {
            return Ok(Value::String(String::new()));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let from = (begin - 1.0).max(0.0) as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let to = (end - 1.0).clamp(0.0, str_len) as usize;

        if from >= to || from >= chars.len() {
            return Ok(Value::String(String::new()));
        }
        Ok(Value::String(chars[from..to].iter().collect()))
    }
}

/// Sorts a node-set into document order and is stable for attribute nodes
/// (element id major, attribute rank minor).
fn sort_document_order(nodes: &mut [XNode]) {
    nodes.sort_unstable_by_key(|n| n.order_key());
}

/// XPath rounding: round half toward positive infinity (§4.4).
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    (n + 0.5).floor()
}
