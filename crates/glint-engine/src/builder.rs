// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Hierarchy builder: merged token stream to a typed node tree.
//!
//! Nodes are first allocated in an arena and addressed by index. A single
//! frame stack tracks the open element, map, conditional and logical
//! constructs; whatever is on top receives the next node. Once the stream is
//! exhausted the arena is folded into owned [`Node`] values, turning the arms
//! of each conditional into nested true/false branches.

use crate::ast::{
    ConditionNode, ElementNode, LogicalNode, MapNode, MetaNode, Node, Span, TextNode,
};
use crate::control::{StreamKind, StreamToken};
use crate::error::Error;
use crate::scanner::{TagKind, TagToken};

type NodeId = usize;

#[derive(Debug)]
enum Slot {
    Element {
        span: Span,
        tag: String,
        raw: String,
        children: Vec<NodeId>,
    },
    Text {
        span: Span,
        raw: String,
    },
    Map {
        span: Span,
        source: String,
        item: String,
        index: Option<String>,
        children: Vec<NodeId>,
    },
    Condition {
        span: Span,
        arms: Vec<Arm>,
    },
    Logical {
        span: Span,
        guard: String,
        children: Vec<NodeId>,
    },
}

/// One branch of a conditional; `guard` is `None` for the final else.
#[derive(Debug)]
struct Arm {
    guard: Option<String>,
    span: Span,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
enum Frame {
    Element { id: NodeId, name: String },
    Map(NodeId),
    Condition(NodeId),
    Logical(NodeId),
}

impl Frame {
    fn describe(&self) -> String {
        match self {
            Frame::Element { name, .. } => format!("element <{name}>"),
            Frame::Map(_) => "map".to_string(),
            Frame::Condition(_) => "conditional".to_string(),
            Frame::Logical(_) => "logical expression".to_string(),
        }
    }

    fn id(&self) -> NodeId {
        match self {
            Frame::Element { id, .. } | Frame::Map(id) | Frame::Condition(id) | Frame::Logical(id) => {
                *id
            }
        }
    }
}

/// Builds the node tree for a merged stream.
///
/// Fails with [`Error::Structural`] on unbalanced tags, control constructs
/// that are never closed, closers without an opener, and conditional or
/// logical branches with more than one root node. No partial tree is returned.
pub fn build(stream: &[StreamToken]) -> Result<Vec<Node<String>>, Error> {
    let mut builder = Builder::default();
    for token in stream {
        builder.accept(token)?;
    }
    builder.finish()
}

#[derive(Debug, Default)]
struct Builder {
    arena: Vec<Option<Slot>>,
    roots: Vec<NodeId>,
    frames: Vec<Frame>,
}

impl Builder {
    fn accept(&mut self, token: &StreamToken) -> Result<(), Error> {
        match &token.kind {
            StreamKind::Tag(tag) => self.accept_tag(tag),
            StreamKind::MapOpen {
                source, item, index, ..
            } => {
                let id = self.alloc(Slot::Map {
                    span: token.span,
                    source: source.clone(),
                    item: item.clone(),
                    index: index.clone(),
                    children: Vec::new(),
                });
                self.attach(id)?;
                self.frames.push(Frame::Map(id));
                Ok(())
            }
            StreamKind::MapClose => {
                let id = match self.frames.last() {
                    Some(Frame::Map(id)) => *id,
                    _ => return Err(self.unexpected("map close", token.span)),
                };
                self.frames.pop();
                self.extend_span(id, token.span);
                Ok(())
            }
            StreamKind::CondOpen { guard } => {
                let id = self.alloc(Slot::Condition {
                    span: token.span,
                    arms: vec![Arm {
                        guard: Some(guard.clone()),
                        span: token.span,
                        children: Vec::new(),
                    }],
                });
                self.attach(id)?;
                self.frames.push(Frame::Condition(id));
                Ok(())
            }
            StreamKind::CondElseIf { guard } => self.add_arm(Some(guard.clone()), token.span),
            StreamKind::CondElse => self.add_arm(None, token.span),
            StreamKind::CondClose => {
                let id = match self.frames.last() {
                    Some(Frame::Condition(id)) => *id,
                    _ => return Err(self.unexpected("conditional close", token.span)),
                };
                self.frames.pop();
                self.extend_span(id, token.span);
                Ok(())
            }
            StreamKind::LogicalOpen { guard } => {
                let id = self.alloc(Slot::Logical {
                    span: token.span,
                    guard: guard.clone(),
                    children: Vec::new(),
                });
                self.attach(id)?;
                self.frames.push(Frame::Logical(id));
                Ok(())
            }
            StreamKind::LogicalClose => {
                let id = match self.frames.last() {
                    Some(Frame::Logical(id)) => *id,
                    _ => return Err(self.unexpected("logical close", token.span)),
                };
                self.frames.pop();
                self.extend_span(id, token.span);
                Ok(())
            }
        }
    }

    fn accept_tag(&mut self, tag: &TagToken) -> Result<(), Error> {
        match tag.kind {
            TagKind::Open | TagKind::SelfClosing => {
                let id = self.alloc(Slot::Element {
                    span: tag.span,
                    tag: tag.name.clone(),
                    raw: tag.raw.clone(),
                    children: Vec::new(),
                });
                self.attach(id)?;
                if tag.kind == TagKind::Open {
                    self.frames.push(Frame::Element {
                        id,
                        name: tag.name.clone(),
                    });
                }
                Ok(())
            }
            TagKind::Close => match self.frames.last().cloned() {
                Some(Frame::Element { id, name }) if name == tag.name => {
                    self.frames.pop();
                    self.extend_span(id, tag.span);
                    Ok(())
                }
                Some(Frame::Element { name, .. }) => Err(Error::structural_with_span(
                    format!("closing tag </{}> does not match open <{}>", tag.name, name),
                    tag.span,
                )),
                Some(frame) => Err(Error::structural_with_span(
                    format!(
                        "closing tag </{}> crosses an unclosed {}",
                        tag.name,
                        frame.describe()
                    ),
                    tag.span,
                )),
                None => Err(Error::structural_with_span(
                    format!("closing tag </{}> without matching open tag", tag.name),
                    tag.span,
                )),
            },
            TagKind::Text => {
                if tag.raw.trim().is_empty() {
                    return Ok(());
                }
                let id = self.alloc(Slot::Text {
                    span: tag.span,
                    raw: tag.raw.clone(),
                });
                self.attach(id)
            }
        }
    }

    fn add_arm(&mut self, guard: Option<String>, span: Span) -> Result<(), Error> {
        let Some(Frame::Condition(id)) = self.frames.last() else {
            return Err(self.unexpected("else branch", span));
        };
        let id = *id;
        let Some(Slot::Condition { arms, .. }) = self.arena[id].as_mut() else {
            return Err(Error::structural_with_span("corrupt conditional slot", span));
        };
        if arms.last().is_some_and(|arm| arm.guard.is_none()) {
            return Err(Error::structural_with_span(
                "conditional already has an else branch",
                span,
            ));
        }
        arms.push(Arm {
            guard,
            span,
            children: Vec::new(),
        });
        Ok(())
    }

    fn alloc(&mut self, slot: Slot) -> NodeId {
        self.arena.push(Some(slot));
        self.arena.len() - 1
    }

    /// Appends `id` to whatever container is currently open.
    fn attach(&mut self, id: NodeId) -> Result<(), Error> {
        let Some(parent) = self.frames.last().map(Frame::id) else {
            self.roots.push(id);
            return Ok(());
        };
        let children = match self.arena[parent].as_mut() {
            Some(
                Slot::Element { children, .. }
                | Slot::Map { children, .. }
                | Slot::Logical { children, .. },
            ) => children,
            Some(Slot::Condition { arms, span }) => match arms.last_mut() {
                Some(arm) => &mut arm.children,
                None => return Err(Error::structural_with_span("conditional without arms", *span)),
            },
            Some(Slot::Text { span, .. }) => {
                return Err(Error::structural_with_span("text cannot contain nodes", *span))
            }
            None => return Err(Error::structural("node attached to consumed slot", None)),
        };
        children.push(id);
        Ok(())
    }

    fn extend_span(&mut self, id: NodeId, end: Span) {
        if let Some(
            Slot::Element { span, .. }
            | Slot::Map { span, .. }
            | Slot::Condition { span, .. }
            | Slot::Logical { span, .. }
            | Slot::Text { span, .. },
        ) = self.arena[id].as_mut()
        {
            *span = span.join(end);
        }
    }

    fn span_of(&self, id: NodeId) -> Span {
        match self.arena[id].as_ref() {
            Some(
                Slot::Element { span, .. }
                | Slot::Map { span, .. }
                | Slot::Condition { span, .. }
                | Slot::Logical { span, .. }
                | Slot::Text { span, .. },
            ) => *span,
            None => Span::default(),
        }
    }

    fn unexpected(&self, what: &str, span: Span) -> Error {
        match self.frames.last() {
            Some(frame) => Error::structural_with_span(
                format!("unexpected {what} inside unclosed {}", frame.describe()),
                span,
            ),
            None => Error::structural_with_span(format!("unexpected {what} at top level"), span),
        }
    }

    fn finish(mut self) -> Result<Vec<Node<String>>, Error> {
        if let Some(frame) = self.frames.last() {
            let span = self.span_of(frame.id());
            return Err(Error::structural_with_span(
                format!("unclosed {}", frame.describe()),
                span,
            ));
        }
        let roots = std::mem::take(&mut self.roots);
        roots.into_iter().map(|id| self.fold(id)).collect()
    }

    fn fold_all(&mut self, ids: Vec<NodeId>) -> Result<Vec<Node<String>>, Error> {
        ids.into_iter().map(|id| self.fold(id)).collect()
    }

    fn fold(&mut self, id: NodeId) -> Result<Node<String>, Error> {
        let slot = self.arena[id]
            .take()
            .ok_or_else(|| Error::structural("node referenced twice", None))?;
        match slot {
            Slot::Element {
                span,
                tag,
                raw,
                children,
            } => {
                let children = self.fold_all(children)?;
                if tag.contains("${") {
                    let mut meta = MetaNode::new(span, tag, raw);
                    meta.children = children;
                    Ok(Node::Meta(meta))
                } else {
                    let mut element = ElementNode::new(span, tag, raw);
                    element.children = children;
                    Ok(Node::Element(element))
                }
            }
            Slot::Text { span, raw } => Ok(Node::Text(TextNode::new(span, raw))),
            Slot::Map {
                span,
                source,
                item,
                index,
                children,
            } => {
                let mut map = MapNode::new(span, source, item, index);
                map.children = self.fold_all(children)?;
                Ok(Node::Map(map))
            }
            Slot::Logical {
                span,
                guard,
                children,
            } => {
                let child = self.single(children, span, "logical content")?;
                Ok(Node::Logical(LogicalNode::new(span, guard, child)))
            }
            Slot::Condition { span, arms } => self.fold_condition(span, arms),
        }
    }

    /// Folds `if / else if / else` arms into nested conditions, innermost
    /// (last) first. A missing else yields an empty text branch.
    fn fold_condition(&mut self, span: Span, arms: Vec<Arm>) -> Result<Node<String>, Error> {
        let mut arms = arms.into_iter().rev().peekable();
        let false_branch = match arms.next_if(|arm| arm.guard.is_none()) {
            Some(arm) => self.single(arm.children, arm.span, "else branch")?,
            None => empty_text(Span::new(span.end, span.end)),
        };

        let mut node = false_branch;
        let mut guarded = false;
        for arm in arms {
            let Some(guard) = arm.guard else {
                return Err(Error::structural_with_span(
                    "else branch must be the last branch",
                    arm.span,
                ));
            };
            let arm_span = Span::new(arm.span.start, span.end);
            let true_branch = self.single(arm.children, arm.span, "conditional branch")?;
            node = Node::Condition(ConditionNode::new(arm_span, guard, true_branch, node));
            guarded = true;
        }
        if !guarded {
            return Err(Error::structural_with_span("conditional without a guard", span));
        }
        Ok(node)
    }

    fn single(
        &mut self,
        children: Vec<NodeId>,
        span: Span,
        what: &str,
    ) -> Result<Node<String>, Error> {
        if children.len() > 1 {
            let second = self.span_of(children[1]);
            return Err(Error::structural_with_span(
                format!("{what} must have a single root node"),
                second,
            ));
        }
        match children.into_iter().next() {
            Some(id) => self.fold(id),
            None => Ok(empty_text(Span::new(span.end, span.end))),
        }
    }
}

fn empty_text(span: Span) -> Node<String> {
    Node::Text(TextNode::new(span, String::new()))
}
