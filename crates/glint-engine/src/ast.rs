// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

/// Byte offsets into the original template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Node types produced by the hierarchy builder.
///
/// `E` is the representation of an expression field: the raw source text
/// (`String`) straight out of the builder, or a [`crate::Binding`] once the
/// resolver has run. Every other field keeps the same shape across passes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<E> {
    Element(ElementNode<E>),
    Text(TextNode<E>),
    Map(MapNode<E>),
    Condition(ConditionNode<E>),
    Logical(LogicalNode<E>),
    Meta(MetaNode<E>),
}

impl<E> Node<E> {
    pub fn span(&self) -> Span {
        match self {
            Node::Element(node) => node.span,
            Node::Text(node) => node.span,
            Node::Map(node) => node.span,
            Node::Condition(node) => node.span,
            Node::Logical(node) => node.span,
            Node::Meta(node) => node.span,
        }
    }

    /// Direct children in document order. Conditions yield both branches,
    /// true branch first.
    pub fn children(&self) -> Vec<&Node<E>> {
        match self {
            Node::Element(node) => node.children.iter().collect(),
            Node::Meta(node) => node.children.iter().collect(),
            Node::Map(node) => node.children.iter().collect(),
            Node::Condition(node) => vec![&*node.true_branch, &*node.false_branch],
            Node::Logical(node) => vec![&*node.child],
            Node::Text(_) => Vec::new(),
        }
    }

    /// Visits this node and all descendants in pre-order.
    pub fn visit<'n>(&'n self, f: &mut impl FnMut(&'n Node<E>)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Expression fields owned by this node itself, not its descendants.
    pub fn expressions(&self) -> Vec<&E> {
        match self {
            Node::Element(node) => node.attributes.expressions(),
            Node::Meta(node) => {
                let mut found = vec![&node.tag];
                found.extend(node.attributes.expressions());
                found
            }
            Node::Text(node) => vec![&node.content],
            Node::Map(node) => vec![&node.source],
            Node::Condition(node) => vec![&node.guard],
            Node::Logical(node) => vec![&node.guard],
        }
    }
}

/// Plain element with a literal tag name.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode<E> {
    pub span: Span,
    pub tag: String,
    /// Source text of the open tag, from `<` to `>` inclusive.
    pub raw_attributes: String,
    pub attributes: Attributes<E>,
    pub children: Vec<Node<E>>,
}

impl<E> ElementNode<E> {
    pub fn new(span: Span, tag: impl Into<String>, raw_attributes: impl Into<String>) -> Self {
        Self {
            span,
            tag: tag.into(),
            raw_attributes: raw_attributes.into(),
            attributes: Attributes::default(),
            children: Vec::new(),
        }
    }
}

/// Text run, possibly interleaved with `${...}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode<E> {
    pub span: Span,
    pub content: E,
}

impl<E> TextNode<E> {
    pub fn new(span: Span, content: E) -> Self {
        Self { span, content }
    }
}

/// Iteration: `children` form the body rendered once per item of `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapNode<E> {
    pub span: Span,
    pub source: E,
    pub item: String,
    pub index: Option<String>,
    pub children: Vec<Node<E>>,
}

impl<E> MapNode<E> {
    pub fn new(span: Span, source: E, item: impl Into<String>, index: Option<String>) -> Self {
        Self {
            span,
            source,
            item: item.into(),
            index,
            children: Vec::new(),
        }
    }
}

/// Ternary conditional. Else-if chains nest through `false_branch`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode<E> {
    pub span: Span,
    pub guard: E,
    pub true_branch: Box<Node<E>>,
    pub false_branch: Box<Node<E>>,
}

impl<E> ConditionNode<E> {
    pub fn new(span: Span, guard: E, true_branch: Node<E>, false_branch: Node<E>) -> Self {
        Self {
            span,
            guard,
            true_branch: Box::new(true_branch),
            false_branch: Box::new(false_branch),
        }
    }
}

/// `guard && content`: renders `child` only when the guard is truthy.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalNode<E> {
    pub span: Span,
    pub guard: E,
    pub child: Box<Node<E>>,
}

impl<E> LogicalNode<E> {
    pub fn new(span: Span, guard: E, child: Node<E>) -> Self {
        Self {
            span,
            guard,
            child: Box::new(child),
        }
    }
}

/// Element whose tag name embeds an expression (`<meta-${kind}>`).
#[derive(Debug, Clone, PartialEq)]
pub struct MetaNode<E> {
    pub span: Span,
    pub tag: E,
    pub raw_attributes: String,
    pub attributes: Attributes<E>,
    pub children: Vec<Node<E>>,
}

impl<E> MetaNode<E> {
    pub fn new(span: Span, tag: E, raw_attributes: impl Into<String>) -> Self {
        Self {
            span,
            tag,
            raw_attributes: raw_attributes.into(),
            attributes: Attributes::default(),
            children: Vec::new(),
        }
    }
}

/// Ordered attribute list. Names are unique; inserting an existing name
/// replaces its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes<E> {
    entries: Vec<Attribute<E>>,
}

impl<E> Default for Attributes<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E> Attributes<E> {
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue<E>) {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|attr| attr.name == name) {
            existing.value = value;
        } else {
            self.entries.push(Attribute { name, value });
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue<E>> {
        self.entries
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute<E>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expressions(&self) -> Vec<&E> {
        self.entries
            .iter()
            .flat_map(|attr| attr.value.expressions())
            .collect()
    }
}

impl<E> FromIterator<Attribute<E>> for Attributes<E> {
    fn from_iter<T: IntoIterator<Item = Attribute<E>>>(iter: T) -> Self {
        let mut attributes = Attributes::default();
        for attr in iter {
            attributes.insert(attr.name, attr.value);
        }
        attributes
    }
}

impl<E> IntoIterator for Attributes<E> {
    type Item = Attribute<E>;
    type IntoIter = std::vec::IntoIter<Attribute<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a Attributes<E> {
    type Item = &'a Attribute<E>;
    type IntoIter = std::slice::Iter<'a, Attribute<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A single named attribute. Namespaced names (`xlink:href`) are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<E> {
    pub name: String,
    pub value: AttributeValue<E>,
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue<E> {
    Static(String),
    Dynamic(E),
    Boolean(BooleanValue<E>),
    Event { handler: E, update_keys: Vec<String> },
    Object(Vec<(String, Member<E>)>),
    List(Vec<Member<E>>),
}

impl<E> AttributeValue<E> {
    /// Expression fields carried by this value, in member order.
    pub fn expressions(&self) -> Vec<&E> {
        match self {
            AttributeValue::Static(_) | AttributeValue::Boolean(BooleanValue::Always) => Vec::new(),
            AttributeValue::Dynamic(expr)
            | AttributeValue::Boolean(BooleanValue::When { guard: expr, .. })
            | AttributeValue::Event { handler: expr, .. } => vec![expr],
            AttributeValue::Object(members) => {
                members.iter().filter_map(|(_, value)| value.expression()).collect()
            }
            AttributeValue::List(members) => members.iter().filter_map(Member::expression).collect(),
        }
    }
}

/// Boolean attribute state.
#[derive(Debug, Clone, PartialEq)]
pub enum BooleanValue<E> {
    /// Present without a value (`<input disabled>`).
    Always,
    /// Present while `guard` is truthy, or falsy when `negated`.
    When { guard: E, negated: bool },
}

/// Entry of an object or list attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Member<E> {
    Static(String),
    Dynamic(E),
}

impl<E> Member<E> {
    pub fn expression(&self) -> Option<&E> {
        match self {
            Member::Dynamic(expr) => Some(expr),
            Member::Static(_) => None,
        }
    }
}

impl<E> fmt::Display for Node<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Element(node) => write!(f, "Element({:?})", node.tag),
            Node::Text(_) => write!(f, "Text"),
            Node::Map(node) => write!(f, "Map({:?})", node.item),
            Node::Condition(_) => write!(f, "Condition"),
            Node::Logical(_) => write!(f, "Logical"),
            Node::Meta(_) => write!(f, "Meta"),
        }
    }
}
