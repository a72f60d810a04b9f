#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Serialises compiled glint templates.
//!
//! [`to_document`] produces the structured JSON document consumed by
//! renderers; [`outline`] produces a compact indented dump used by fixtures
//! and debugging tools. Both are stateless functions over a resolved tree.

pub use glint_engine::{
    AttributeValue, Attributes, Binding, BindingExpression, BooleanValue, CompileOptions, Error,
    Member, Node, ResolvedPath, Root, Template, UnresolvedReason,
};

use serde_json::{json, Map, Value};

/// Compiles `source` and returns its JSON document in one step.
pub fn compile_document(name: &str, source: &str, options: CompileOptions) -> Result<Value, Error> {
    let template = Template::compile_with_options(name, source, options)?;
    Ok(to_document(template.nodes()))
}

/// JSON document for a resolved tree: an array with one object per root.
pub fn to_document(nodes: &[Node<Binding>]) -> Value {
    Value::Array(nodes.iter().map(node_value).collect())
}

pub fn to_json_string(nodes: &[Node<Binding>]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&to_document(nodes))
}

fn node_value(node: &Node<Binding>) -> Value {
    let mut object = Map::new();
    match node {
        Node::Element(element) => {
            object.insert("type".into(), json!("element"));
            object.insert("tag".into(), json!(element.tag));
            object.insert("attributes".into(), attributes_value(&element.attributes));
            object.insert("children".into(), children_value(&element.children));
        }
        Node::Text(text) => {
            object.insert("type".into(), json!("text"));
            merge_binding(&mut object, &text.content, "value");
        }
        Node::Map(map) => {
            object.insert("type".into(), json!("map"));
            merge_binding(&mut object, &map.source, "data");
            object.insert("children".into(), children_value(&map.children));
        }
        Node::Condition(condition) => {
            object.insert("type".into(), json!("condition"));
            merge_binding(&mut object, &condition.guard, "data");
            object.insert("true".into(), node_value(&condition.true_branch));
            object.insert("false".into(), node_value(&condition.false_branch));
        }
        Node::Logical(logical) => {
            object.insert("type".into(), json!("logical"));
            merge_binding(&mut object, &logical.guard, "data");
            object.insert("child".into(), node_value(&logical.child));
        }
        Node::Meta(meta) => {
            object.insert("type".into(), json!("meta"));
            object.insert("tag".into(), binding_value(&meta.tag));
            object.insert("attributes".into(), attributes_value(&meta.attributes));
            object.insert("children".into(), children_value(&meta.children));
        }
    }
    Value::Object(object)
}

fn children_value(children: &[Node<Binding>]) -> Value {
    Value::Array(children.iter().map(node_value).collect())
}

/// Copies the fields of a binding object into `object`; a literal binding is
/// stored under `literal_key` instead.
fn merge_binding(object: &mut Map<String, Value>, binding: &Binding, literal_key: &str) {
    match binding_value(binding) {
        Value::Object(fields) => object.extend(fields),
        other => {
            object.insert(literal_key.to_string(), other);
        }
    }
}

/// Binding in its wire form.
///
/// * literal: a plain string
/// * one reference, no surrounding text: `{"data": path}`
/// * one reference with text: `{"data": path, "expr": template}`
/// * otherwise: `{"data": [paths], "expr": template}`
/// * unresolved: `{"raw": text}`
pub fn binding_value(binding: &Binding) -> Value {
    match binding {
        Binding::Literal(text) => json!(text),
        Binding::Expr(expr) if expr.is_bare() => json!({ "data": expr.paths[0].to_string() }),
        Binding::Expr(expr) if expr.paths.len() == 1 => json!({
            "data": expr.paths[0].to_string(),
            "expr": expr.template,
        }),
        Binding::Expr(expr) => json!({
            "data": expr.paths.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "expr": expr.template,
        }),
        Binding::Unresolved { raw, .. } => json!({ "raw": raw }),
    }
}

fn attributes_value(attributes: &Attributes<Binding>) -> Value {
    let mut object = Map::new();
    for attr in attributes {
        object.insert(attr.name.clone(), attribute_value(&attr.value));
    }
    Value::Object(object)
}

fn attribute_value(value: &AttributeValue<Binding>) -> Value {
    match value {
        AttributeValue::Static(text) => json!(text),
        AttributeValue::Dynamic(binding) => binding_value(binding),
        AttributeValue::Boolean(BooleanValue::Always) => Value::Bool(true),
        AttributeValue::Boolean(BooleanValue::When { guard, negated }) => {
            let mut guard = binding_value(guard);
            if *negated {
                if let Value::Object(fields) = &mut guard {
                    fields.insert("negated".into(), Value::Bool(true));
                }
            }
            guard
        }
        AttributeValue::Event {
            handler,
            update_keys,
        } => {
            let mut event = Map::new();
            event.insert("event".into(), binding_value(handler));
            if !update_keys.is_empty() {
                event.insert("updates".into(), json!(update_keys));
            }
            Value::Object(event)
        }
        AttributeValue::Object(members) => Value::Object(
            members
                .iter()
                .map(|(name, member)| (name.clone(), member_value(member)))
                .collect(),
        ),
        AttributeValue::List(members) => Value::Array(members.iter().map(member_value).collect()),
    }
}

fn member_value(member: &Member<Binding>) -> Value {
    match member {
        Member::Static(text) => json!(text),
        Member::Dynamic(binding) => binding_value(binding),
    }
}

/// Indented one-line-per-node dump of a resolved tree.
///
/// ```text
/// element ul
///   map /context/list as name
///     element li
///       text [item]
/// ```
pub fn outline(nodes: &[Node<Binding>]) -> String {
    let mut out = String::new();
    for node in nodes {
        outline_node(&mut out, node, 0);
    }
    out
}

fn outline_node(out: &mut String, node: &Node<Binding>, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Element(element) => {
            out.push_str(&format!("{indent}element {}\n", element.tag));
            outline_attributes(out, &element.attributes, depth + 1);
            for child in &element.children {
                outline_node(out, child, depth + 1);
            }
        }
        Node::Text(text) => {
            out.push_str(&format!("{indent}text {}\n", describe(&text.content)));
        }
        Node::Map(map) => {
            let aliases = match &map.index {
                Some(index) => format!("{}, {index}", map.item),
                None => map.item.clone(),
            };
            out.push_str(&format!("{indent}map {} as {aliases}\n", describe(&map.source)));
            for child in &map.children {
                outline_node(out, child, depth + 1);
            }
        }
        Node::Condition(condition) => {
            out.push_str(&format!("{indent}condition {}\n", describe(&condition.guard)));
            out.push_str(&format!("{indent}  then\n"));
            outline_node(out, &condition.true_branch, depth + 2);
            out.push_str(&format!("{indent}  else\n"));
            outline_node(out, &condition.false_branch, depth + 2);
        }
        Node::Logical(logical) => {
            out.push_str(&format!("{indent}logical {}\n", describe(&logical.guard)));
            outline_node(out, &logical.child, depth + 1);
        }
        Node::Meta(meta) => {
            out.push_str(&format!("{indent}meta {}\n", describe(&meta.tag)));
            outline_attributes(out, &meta.attributes, depth + 1);
            for child in &meta.children {
                outline_node(out, child, depth + 1);
            }
        }
    }
}

fn outline_attributes(out: &mut String, attributes: &Attributes<Binding>, depth: usize) {
    let indent = "  ".repeat(depth);
    for attr in attributes {
        out.push_str(&format!(
            "{indent}@{} {}\n",
            attr.name,
            describe_attribute(&attr.value)
        ));
    }
}

fn describe_attribute(value: &AttributeValue<Binding>) -> String {
    match value {
        AttributeValue::Static(text) => format!("{text:?}"),
        AttributeValue::Dynamic(binding) => describe(binding),
        AttributeValue::Boolean(BooleanValue::Always) => "true".to_string(),
        AttributeValue::Boolean(BooleanValue::When { guard, negated }) => {
            let keyword = if *negated { "unless" } else { "when" };
            format!("{keyword} {}", describe(guard))
        }
        AttributeValue::Event {
            handler,
            update_keys,
        } => {
            if update_keys.is_empty() {
                format!("event {}", describe(handler))
            } else {
                format!("event {} updates {}", describe(handler), update_keys.join(","))
            }
        }
        AttributeValue::Object(members) => {
            let members: Vec<String> = members
                .iter()
                .map(|(name, member)| format!("{name}: {}", describe_member(member)))
                .collect();
            format!("{{{}}}", members.join(", "))
        }
        AttributeValue::List(members) => {
            let members: Vec<String> = members.iter().map(describe_member).collect();
            format!("[{}]", members.join(", "))
        }
    }
}

fn describe_member(member: &Member<Binding>) -> String {
    match member {
        Member::Static(text) => format!("{text:?}"),
        Member::Dynamic(binding) => describe(binding),
    }
}

/// Short form of a binding: a bare path, or the quoted template followed by
/// its paths.
fn describe(binding: &Binding) -> String {
    match binding {
        Binding::Literal(text) => format!("{text:?}"),
        Binding::Expr(expr) if expr.is_bare() => expr.paths[0].to_string(),
        Binding::Expr(expr) if expr.paths.is_empty() => format!("{:?}", expr.template),
        Binding::Expr(expr) => {
            let paths: Vec<String> = expr.paths.iter().map(ToString::to_string).collect();
            format!("{:?} <- {}", expr.template, paths.join(", "))
        }
        Binding::Unresolved { raw, reason } => format!("unresolved {raw:?} ({reason})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Vec<Node<Binding>> {
        Template::compile("test", source).unwrap().into_nodes()
    }

    #[test]
    fn bare_bindings_serialize_as_paths() {
        let nodes = compile("<ul>${context.list.map(name => html`<li>${name}</li>`)}</ul>");
        assert_eq!(
            to_document(&nodes),
            json!([{
                "type": "element",
                "tag": "ul",
                "attributes": {},
                "children": [{
                    "type": "map",
                    "data": "/context/list",
                    "children": [{
                        "type": "element",
                        "tag": "li",
                        "attributes": {},
                        "children": [{ "type": "text", "data": "[item]" }]
                    }]
                }]
            }])
        );
    }

    #[test]
    fn multi_reference_bindings_carry_expr() {
        let nodes = compile("<p>${state.a} of ${state.b}</p>");
        let doc = to_document(&nodes);
        assert_eq!(
            doc[0]["children"][0],
            json!({
                "type": "text",
                "data": ["/state/a", "/state/b"],
                "expr": "${[0]} of ${[1]}"
            })
        );
    }

    #[test]
    fn single_reference_with_text_keeps_expr() {
        let nodes = compile("<p>Hi ${context.name}</p>");
        let doc = to_document(&nodes);
        assert_eq!(
            doc[0]["children"][0],
            json!({ "type": "text", "data": "/context/name", "expr": "Hi ${[0]}" })
        );
    }

    #[test]
    fn attributes_serialize_by_kind() {
        let nodes = compile(
            "<a href=\"/x\" hidden ${state.on ? \"on\" : \"off\"} onclick=${() => state.n++} class=\"a ${state.k}\" style=${{ color: state.c }}></a>",
        );
        let attrs = &to_document(&nodes)[0]["attributes"];
        assert_eq!(attrs["href"], json!("/x"));
        assert_eq!(attrs["hidden"], json!(true));
        assert_eq!(attrs["on"], json!({ "data": "/state/on" }));
        assert_eq!(attrs["off"], json!({ "data": "/state/on", "negated": true }));
        assert_eq!(
            attrs["onclick"],
            json!({ "event": "() => state.n++", "updates": ["n"] })
        );
        assert_eq!(attrs["class"], json!(["a", { "data": "/state/k" }]));
        assert_eq!(attrs["style"], json!({ "color": { "data": "/state/c" } }));
    }

    #[test]
    fn conditions_and_unresolved_bindings() {
        let nodes = compile("${state.a ? html`<b>${who}</b>` : \"none\"}");
        let doc = to_document(&nodes);
        assert_eq!(doc[0]["type"], json!("condition"));
        assert_eq!(doc[0]["data"], json!("/state/a"));
        assert_eq!(doc[0]["true"]["children"][0], json!({ "type": "text", "raw": "${who}" }));
        assert_eq!(doc[0]["false"], json!({ "type": "text", "value": "none" }));
    }

    #[test]
    fn outline_lists_nested_structure() {
        let nodes = compile(
            "<nav>${state.open ? html`<ul>${core.links.map((link, i) => html`<li data-i=\"${i}\">${link.label}</li>`)}</ul>` : null}</nav>",
        );
        let expected = "\
element nav
  condition /state/open
    then
      element ul
        map /core/links as link, i
          element li
            @data-i [index]
            text [item]/label
    else
      text \"\"
";
        assert_eq!(outline(&nodes), expected);
    }

    #[test]
    fn json_string_is_pretty() {
        let nodes = compile("<br>");
        let text = to_json_string(&nodes).unwrap();
        assert!(text.contains("\"type\": \"element\""));
    }
}
