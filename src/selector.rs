use crate::dom::{Dom, NodeId};
use crate::{Error, Result};

/// The selector subset the page understands: `#id`, `tag` and `tag#id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
}

impl SimpleSelector {
    pub(crate) fn parse(selector: &str) -> Result<Self> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(Error::UnsupportedSelector(selector.to_string()));
        }

        let (tag, id) = match trimmed.split_once('#') {
            Some((tag, id)) => (tag, Some(id)),
            None => (trimmed, None),
        };

        let valid_id = id.is_none_or(|id| !id.is_empty() && id.chars().all(is_ident_char));
        if !tag.chars().all(is_ident_char) || !valid_id {
            return Err(Error::UnsupportedSelector(selector.to_string()));
        }

        Ok(Self {
            tag: (!tag.is_empty()).then(|| tag.to_ascii_lowercase()),
            id: id.map(ToOwned::to_owned),
        })
    }

    fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let tag_ok = self
            .tag
            .as_deref()
            .is_none_or(|tag| dom.is_tag(node, tag));
        let id_ok = self
            .id
            .as_deref()
            .is_none_or(|id| dom.attr(node, "id") == Some(id));
        tag_ok && id_ok
    }

    pub(crate) fn query_first(&self, dom: &Dom) -> Option<NodeId> {
        if let Some(id) = self.id.as_deref() {
            return dom.by_id(id).filter(|node| self.matches(dom, *node));
        }

        dom.elements_under(dom.root)
            .into_iter()
            .find(|node| self.matches(dom, *node))
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

pub(crate) fn query_selector(dom: &Dom, selector: &str) -> Result<Option<NodeId>> {
    Ok(SimpleSelector::parse(selector)?.query_first(dom))
}
