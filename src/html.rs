//! A small HTML reader for form pages and `<option>` fragments.
//!
//! Elements, attributes, text and comments are understood. Doctype-like
//! `<!...>` and `<?...>` blocks are skipped. Void elements never take
//! children, an `<option>` start tag closes the option still open before
//! it, and an end tag with no matching open element is dropped. Script and
//! style bodies get no special treatment.

use crate::dom::{Dom, NodeId};
use crate::{Error, Result};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void_tag(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Parses a page or a fragment into a fresh [`Dom`]. Top-level nodes of a
/// fragment become children of the document root.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut dom = Dom::new();
    let mut open: Vec<NodeId> = vec![dom.root];
    let mut lexer = Lexer::new(html);

    while let Some(token) = lexer.next_token()? {
        match token {
            Token::Text(raw) => {
                let text = decode_html_character_references(raw);
                if !text.is_empty() {
                    let parent = open.last().copied().unwrap_or(dom.root);
                    dom.create_text(parent, text);
                }
            }
            Token::Open {
                name,
                attrs,
                self_closing,
            } => {
                if name == "option" && open.last().is_some_and(|top| dom.is_tag(*top, "option")) {
                    open.pop();
                }
                let parent = open.last().copied().unwrap_or(dom.root);
                let void = self_closing || is_void_tag(&name);
                let node = dom.create_element(parent, name, attrs);
                if !void {
                    open.push(node);
                }
            }
            Token::Close(name) => {
                if let Some(depth) = open.iter().rposition(|node| dom.is_tag(*node, &name)) {
                    open.truncate(depth);
                }
            }
        }
    }

    dom.initialize_form_control_values()?;
    Ok(dom)
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(&'a str),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.src.len());
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|ch: char| !keep(ch)).unwrap_or(rest.len());
        self.advance(len);
        &rest[..len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok(None);
            }

            if let Some(body) = rest.strip_prefix("<!--") {
                let end = body
                    .find("-->")
                    .ok_or_else(|| Error::HtmlParse("unclosed HTML comment".into()))?;
                self.advance("<!--".len() + end + "-->".len());
                continue;
            }

            if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = rest
                    .find('>')
                    .ok_or_else(|| Error::HtmlParse("unclosed declaration".into()))?;
                self.advance(end + 1);
                continue;
            }

            if rest.starts_with("</") {
                return self.close_tag().map(Some);
            }

            if rest.starts_with('<') && rest[1..].starts_with(|ch: char| ch.is_ascii_alphabetic()) {
                return self.open_tag().map(Some);
            }

            // Text runs to the next '<'. A '<' that starts no markup is text.
            let len = rest
                .char_indices()
                .skip(1)
                .find(|(_, ch)| *ch == '<')
                .map(|(index, _)| index)
                .unwrap_or(rest.len());
            self.advance(len);
            return Ok(Some(Token::Text(&rest[..len])));
        }
    }

    fn close_tag(&mut self) -> Result<Token<'a>> {
        self.advance("</".len());
        let name = self.take_while(is_name_char).to_ascii_lowercase();
        let end = self
            .rest()
            .find('>')
            .ok_or_else(|| Error::HtmlParse(format!("unclosed </{name}> tag")))?;
        self.advance(end + 1);
        Ok(Token::Close(name))
    }

    fn open_tag(&mut self) -> Result<Token<'a>> {
        self.advance("<".len());
        let name = self.take_while(is_name_char).to_ascii_lowercase();
        let mut attrs: Vec<(String, String)> = Vec::new();

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(Error::HtmlParse(format!("unclosed <{name}> tag")));
            }
            if rest.starts_with("/>") {
                self.advance(2);
                return Ok(Token::Open {
                    name,
                    attrs,
                    self_closing: true,
                });
            }
            if rest.starts_with('>') {
                self.advance(1);
                return Ok(Token::Open {
                    name,
                    attrs,
                    self_closing: false,
                });
            }

            let attr = self
                .take_while(|ch| !ch.is_whitespace() && !matches!(ch, '=' | '>' | '/'))
                .to_ascii_lowercase();
            if attr.is_empty() {
                // A lone '=' or '/' inside the tag carries nothing.
                self.advance(self.peek().map_or(1, char::len_utf8));
                continue;
            }

            self.skip_whitespace();
            let value = if self.peek() == Some('=') {
                self.advance(1);
                self.skip_whitespace();
                self.attr_value(&name)?
            } else {
                String::new()
            };

            if !attrs.iter().any(|(existing, _)| *existing == attr) {
                attrs.push((attr, value));
            }
        }
    }

    fn attr_value(&mut self, tag: &str) -> Result<String> {
        let raw = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.advance(1);
                let rest = self.rest();
                let end = rest.find(quote).ok_or_else(|| {
                    Error::HtmlParse(format!("unclosed attribute value in <{tag}>"))
                })?;
                self.advance(end + 1);
                &rest[..end]
            }
            _ => self.take_while(|ch| !ch.is_whitespace() && ch != '>'),
        };
        Ok(decode_html_character_references(raw))
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == ':'
}

fn named_reference(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "laquo" => '«',
        "raquo" => '»',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '…',
        "euro" => '€',
        _ => return None,
    })
}

fn numeric_reference(digits: &str) -> Option<char> {
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

/// Decodes `&name;`, `&#NN;` and `&#xNN;`. Unknown references stay as
/// written.
pub(crate) fn decode_html_character_references(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut pieces = src.split('&');
    if let Some(head) = pieces.next() {
        out.push_str(head);
    }
    for piece in pieces {
        let decoded = piece.split_once(';').and_then(|(reference, tail)| {
            let ch = match reference.strip_prefix('#') {
                Some(digits) => numeric_reference(digits),
                None => named_reference(reference),
            }?;
            Some((ch, tail))
        });
        match decoded {
            Some((ch, tail)) => {
                out.push(ch);
                out.push_str(tail);
            }
            None => {
                out.push('&');
                out.push_str(piece);
            }
        }
    }
    out
}

fn escape_into(out: &mut String, value: &str, in_attr: bool) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn escape_html_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(&mut out, value, false);
    out
}

pub(crate) fn escape_html_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(&mut out, value, true);
    out
}
