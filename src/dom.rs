use std::collections::HashMap;

use crate::html::{escape_html_attr, escape_html_text, is_void_tag};
use crate::options::SelectOption;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    /// Slot released by an option rebuild, waiting on the free list.
    Vacant,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: Vec<(String, String)>,
    /// Current value of a select; options keep theirs in `attrs`.
    pub(crate) value: String,
    /// Selectedness of an `<option>`; the `selected` attribute only seeds it.
    pub(crate) selected: bool,
    pub(crate) disabled: bool,
}

impl Element {
    fn new(tag_name: String, attrs: Vec<(String, String)>) -> Self {
        let mut element = Self {
            tag_name,
            attrs,
            value: String::new(),
            selected: false,
            disabled: false,
        };
        element.selected = element.attr("selected").is_some();
        element.disabled = element.attr("disabled").is_some();
        element.value = element.attr("value").unwrap_or_default().to_string();
        element
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value.as_str()))
    }
}

/// Node arena for one page. Slots freed by
/// [`replace_select_options`](Dom::replace_select_options) are reused by
/// later allocations, so rebuilding a field over and over does not grow
/// the arena.
#[derive(Debug, Clone)]
pub(crate) struct Dom {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            free: Vec::new(),
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn alloc(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let node = Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot.0] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        let element = Element::new(tag_name, attrs);
        let id_attr = element.attr("id").map(ToOwned::to_owned);
        let id = self.alloc(parent, NodeKind::Element(element));
        if let Some(id_attr) = id_attr {
            // Document order wins for duplicate ids.
            self.id_index.entry(id_attr).or_insert(id);
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.alloc(parent, NodeKind::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|element| element.tag_name.as_str())
    }

    pub(crate) fn is_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id)?.attr(name)
    }

    pub(crate) fn disabled(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some_and(|element| element.disabled)
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0)?.parent
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    /// Elements below `from` in document order, `from` excluded.
    pub(crate) fn elements_under(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(from).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    fn elements_tagged(&self, from: NodeId, tag: &str) -> Vec<NodeId> {
        self.elements_under(from)
            .into_iter()
            .filter(|node| self.is_tag(*node, tag))
            .collect()
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.push_text(node_id, &mut out);
        out
    }

    fn push_text(&self, node_id: NodeId, out: &mut String) {
        match self.nodes.get(node_id.0).map(|node| &node.kind) {
            Some(NodeKind::Text(text)) => out.push_str(text),
            Some(NodeKind::Document | NodeKind::Element(_)) => {
                for child in self.children(node_id) {
                    self.push_text(*child, out);
                }
            }
            Some(NodeKind::Vacant) | None => {}
        }
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> Result<String> {
        if self.element(node_id).is_none() {
            return Err(Error::TypeMismatch {
                selector: format!("node {}", node_id.0),
                expected: "element".into(),
                actual: "non-element".into(),
            });
        }
        let mut out = String::new();
        for child in self.children(node_id) {
            self.write_node(*child, &mut out);
        }
        Ok(out)
    }

    /// Serializes the node itself, or the whole document for the root.
    pub(crate) fn outer_html(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node_id, &mut out);
        out
    }

    fn write_node(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(node_id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Vacant => {}
            NodeKind::Text(text) => out.push_str(&escape_html_text(text)),
            NodeKind::Document => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (name, value) in &element.attrs {
                    out.push_str(&format!(" {name}=\"{}\"", escape_html_attr(value)));
                }
                out.push('>');
                if !is_void_tag(&element.tag_name) {
                    for child in &node.children {
                        self.write_node(*child, out);
                    }
                    out.push_str(&format!("</{}>", element.tag_name));
                }
            }
        }
    }

    pub(crate) fn initialize_form_control_values(&mut self) -> Result<()> {
        for select in self.elements_tagged(self.root, "select") {
            self.sync_select_value(select)?;
        }
        Ok(())
    }

    pub(crate) fn value(&self, node_id: NodeId) -> Result<String> {
        self.element(node_id)
            .map(|element| element.value.clone())
            .ok_or_else(|| Error::TypeMismatch {
                selector: format!("node {}", node_id.0),
                expected: "element".into(),
                actual: "non-element".into(),
            })
    }

    fn option_label(&self, option: NodeId) -> String {
        collapse_whitespace(&self.text_content(option))
    }

    /// The `value` attribute, or the collapsed label when it is absent.
    fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map_or_else(|| self.option_label(option), ToOwned::to_owned)
    }

    pub(crate) fn select_options(&self, select: NodeId) -> Vec<SelectOption> {
        self.elements_tagged(select, "option")
            .into_iter()
            .map(|option| SelectOption::new(self.option_value(option), self.option_label(option)))
            .collect()
    }

    fn store_select_value(&mut self, select: NodeId, value: String) -> Result<()> {
        let element = self.element_mut(select).ok_or_else(|| Error::TypeMismatch {
            selector: format!("node {}", select.0),
            expected: "select".into(),
            actual: "non-element".into(),
        })?;
        element.value = value;
        Ok(())
    }

    /// Marks the first option whose value equals `requested` as selected.
    /// Returns `false` and leaves the selection untouched when none matches.
    pub(crate) fn set_select_value(&mut self, select: NodeId, requested: &str) -> Result<bool> {
        self.expect_select(select)?;
        let options = self.elements_tagged(select, "option");
        let Some(chosen) = options
            .iter()
            .copied()
            .find(|option| self.option_value(*option) == requested)
        else {
            return Ok(false);
        };

        for option in options {
            if let Some(element) = self.element_mut(option) {
                element.selected = option == chosen;
            }
        }
        self.store_select_value(select, requested.to_string())?;
        Ok(true)
    }

    /// Recomputes the select value: the selected option, else the first,
    /// else empty.
    pub(crate) fn sync_select_value(&mut self, select: NodeId) -> Result<()> {
        self.expect_select(select)?;
        let options = self.elements_tagged(select, "option");
        let value = options
            .iter()
            .copied()
            .find(|option| self.element(*option).is_some_and(|element| element.selected))
            .or_else(|| options.first().copied())
            .map(|option| self.option_value(option))
            .unwrap_or_default();
        self.store_select_value(select, value)
    }

    /// Drops every child of the select and rebuilds it from `options`.
    /// Labels become text nodes, so nothing in them is interpreted as markup.
    pub(crate) fn replace_select_options(
        &mut self,
        select: NodeId,
        options: &[SelectOption],
    ) -> Result<()> {
        self.expect_select(select)?;

        let old = std::mem::take(&mut self.nodes[select.0].children);
        let dropped_ids = self.release(old);

        for option in options {
            let node = self.create_element(
                select,
                "option".into(),
                vec![("value".to_string(), option.value.clone())],
            );
            if !option.label.is_empty() {
                self.create_text(node, option.label.clone());
            }
        }

        if dropped_ids {
            self.rebuild_id_index();
        }
        self.sync_select_value(select)
    }

    /// Puts the given subtrees on the free list. Returns whether any of the
    /// released elements carried an `id`.
    fn release(&mut self, roots: Vec<NodeId>) -> bool {
        let mut had_id = false;
        let mut stack = roots;
        while let Some(node) = stack.pop() {
            let slot = &mut self.nodes[node.0];
            stack.append(&mut slot.children);
            if let NodeKind::Element(element) = &slot.kind {
                had_id |= element.attr("id").is_some();
            }
            slot.parent = None;
            slot.kind = NodeKind::Vacant;
            self.free.push(node);
        }
        had_id
    }

    fn rebuild_id_index(&mut self) {
        let mut index = HashMap::new();
        for node in self.elements_under(self.root) {
            if let Some(id) = self.attr(node, "id") {
                index.entry(id.to_string()).or_insert(node);
            }
        }
        self.id_index = index;
    }

    fn expect_select(&self, node_id: NodeId) -> Result<()> {
        if self.is_tag(node_id, "select") {
            return Ok(());
        }
        Err(Error::TypeMismatch {
            selector: format!("node {}", node_id.0),
            expected: "select".into(),
            actual: self.tag_name(node_id).unwrap_or("non-element").to_string(),
        })
    }
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `value` after `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &value[..cut]),
        None => value.to_string(),
    }
}
