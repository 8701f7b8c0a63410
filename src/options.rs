use crate::dom::collapse_whitespace;
use crate::html::{escape_html_attr, escape_html_text, parse_html};
use crate::{Error, Result};

/// Label of the empty-valued option that stands for "no selection".
pub const PLACEHOLDER_LABEL: &str = "---------";

/// One entry of a select field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    pub fn placeholder() -> Self {
        Self::new("", PLACEHOLDER_LABEL)
    }

    pub fn is_placeholder(&self) -> bool {
        self.value.is_empty()
    }
}

/// Renders options as `<option value="...">label</option>` markup.
pub fn render_options(options: &[SelectOption]) -> String {
    let mut out = String::new();
    for option in options {
        out.push_str("<option value=\"");
        out.push_str(&escape_html_attr(&option.value));
        out.push_str("\">");
        out.push_str(&escape_html_text(&option.label));
        out.push_str("</option>");
    }
    out
}

/// Parses an `<option>` markup fragment into typed options.
///
/// Only `<option>` elements are accepted at the top level, and options may
/// hold text only. Whitespace between options is ignored; any other text or
/// element makes the fragment invalid. Options without a `value` attribute
/// take their label as value, matching how browsers read them.
pub fn parse_options(fragment: &str) -> Result<Vec<SelectOption>> {
    let dom = parse_html(fragment)?;
    let mut options = Vec::new();

    for child in dom.children(dom.root) {
        let Some(element) = dom.element(*child) else {
            let text = dom.text_content(*child);
            if text.trim().is_empty() {
                continue;
            }
            return Err(Error::InvalidMarkup(format!(
                "unexpected text outside <option>: {:?}",
                text.trim()
            )));
        };

        if element.tag_name != "option" {
            return Err(Error::InvalidMarkup(format!(
                "unexpected <{}> element",
                element.tag_name
            )));
        }
        if let Some(nested) = dom
            .children(*child)
            .iter()
            .find_map(|node| dom.tag_name(*node))
        {
            return Err(Error::InvalidMarkup(format!(
                "unexpected <{nested}> inside <option>"
            )));
        }

        let label = collapse_whitespace(&dom.text_content(*child));
        let value = element
            .attr("value")
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| label.clone());
        options.push(SelectOption { value, label });
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_renders_as_empty_valued_dashes() {
        assert_eq!(
            render_options(&[SelectOption::placeholder()]),
            r#"<option value="">---------</option>"#
        );
        assert!(SelectOption::placeholder().is_placeholder());
    }

    #[test]
    fn render_escapes_values_and_labels() {
        let rendered = render_options(&[SelectOption::new("a\"b", "x < y & z")]);
        assert_eq!(rendered, r#"<option value="a&quot;b">x &lt; y &amp; z</option>"#);
    }

    #[test]
    fn parse_reads_django_style_fragment() -> Result<()> {
        let fragment = r#"
            <option value="">---------</option>
            <option value="3">Инфраструктура</option>
            <option value="7">
                Маркетинг
            </option>
        "#;
        assert_eq!(
            parse_options(fragment)?,
            vec![
                SelectOption::placeholder(),
                SelectOption::new("3", "Инфраструктура"),
                SelectOption::new("7", "Маркетинг"),
            ]
        );
        Ok(())
    }

    #[test]
    fn parse_of_empty_body_is_an_empty_list() -> Result<()> {
        assert!(parse_options("")?.is_empty());
        assert!(parse_options("  \n ")?.is_empty());
        Ok(())
    }

    #[test]
    fn parse_rejects_foreign_elements() {
        match parse_options(r#"<option value="1">One</option><img src=x onerror=alert(1)>"#) {
            Err(Error::InvalidMarkup(msg)) => assert!(msg.contains("<img>")),
            other => panic!("expected invalid markup, got: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_markup_nested_in_options() {
        match parse_options(r#"<option value="1"><script>x()</script>One</option>"#) {
            Err(Error::InvalidMarkup(msg)) => assert!(msg.contains("<script>")),
            other => panic!("expected invalid markup, got: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_stray_text() {
        assert!(matches!(
            parse_options("<h1>Server Error (500)</h1>"),
            Err(Error::InvalidMarkup(_))
        ));
        assert!(matches!(
            parse_options("Not Found"),
            Err(Error::InvalidMarkup(_))
        ));
    }

    #[test]
    fn render_then_parse_preserves_awkward_labels() -> Result<()> {
        let options = vec![SelectOption::new("1", "R&D <core>"), SelectOption::new("", "—")];
        assert_eq!(parse_options(&render_options(&options))?, options);
        Ok(())
    }
}
