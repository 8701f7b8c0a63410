//! Cascading select fields for reference-driven transaction forms.
//!
//! A [`Page`] holds a small deterministic DOM parsed from HTML. Binding a
//! [`CascadeBinder`] to it wires the operation type, category and
//! subcategory selects together: changing a parent field issues a request,
//! and resolving that request rebuilds the dependent field's options.
//!
//! Requests never resolve on their own. Tests (or an embedding runtime)
//! answer them through [`Page::respond`], [`Page::flush`] or
//! [`Page::flush_with`], which makes response ordering explicit.
//!
//! ```
//! use cascade_form::{Page, Response, Result};
//!
//! fn main() -> Result<()> {
//!     let mut page = Page::from_html(
//!         r#"
//!         <select id="id_operation_type">
//!           <option value="">---------</option>
//!           <option value="sales">Sales</option>
//!         </select>
//!         <select id="id_category"></select>
//!         <select id="id_subcategory"></select>
//!         "#,
//!     )?;
//!     page.bind_reference_form()?;
//!     page.select("#id_operation_type", "sales")?;
//!
//!     let pending = page.pending_requests();
//!     assert_eq!(
//!         pending[0].url(),
//!         "/reference/ajax/load-categories/?operation_type=sales"
//!     );
//!     page.respond(pending[0].id, Response::ok(r#"<option value="1">Revenue</option>"#))?;
//!     page.assert_inner_html("#id_category", r#"<option value="1">Revenue</option>"#)?;
//!     Ok(())
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;

mod cascade;
mod catalog;
mod dom;
mod endpoints;
mod html;
mod options;
mod page;
mod request;
mod selector;
mod trace;

pub use cascade::{CascadeBinder, CascadeConfig, CascadeFields, FieldHandle};
pub use catalog::{
    Category, FormSelection, OperationType, RecordId, RecordKind, ReferenceCatalog, Status,
    SubCategory,
};
pub use endpoints::{
    LOAD_CATEGORIES_PATH, LOAD_SUBCATEGORIES_PATH, ReferenceEndpoints, render_cascade_fields,
};
pub use options::{PLACEHOLDER_LABEL, SelectOption, parse_options, render_options};
pub use page::{Page, PendingRequest, ResponseOutcome};
pub use request::{Backend, FetchMocks, Request, Response};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
    OptionNotFound {
        selector: String,
        value: String,
    },
    InvalidConfig(String),
    AlreadyBound,
    UnknownRequest(u64),
    InvalidMarkup(String),
    InvalidQuery(String),
    RecordNotFound {
        kind: RecordKind,
        id: RecordId,
    },
    DuplicateRecord {
        kind: RecordKind,
        name: String,
    },
    InvalidName {
        kind: RecordKind,
        reason: String,
    },
    MissingSelection(RecordKind),
    SelectionMismatch {
        kind: RecordKind,
        id: RecordId,
        parent: RecordKind,
        parent_id: RecordId,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
            Self::OptionNotFound { selector, value } => {
                write!(f, "no option with value {value:?} in {selector}")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid cascade config: {msg}"),
            Self::AlreadyBound => write!(f, "cascade binder is already attached to this page"),
            Self::UnknownRequest(id) => write!(f, "no pending request with id {id}"),
            Self::InvalidMarkup(msg) => write!(f, "invalid option markup: {msg}"),
            Self::InvalidQuery(msg) => write!(f, "invalid query string: {msg}"),
            Self::RecordNotFound { kind, id } => write!(f, "{kind} {id} does not exist"),
            Self::DuplicateRecord { kind, name } => {
                write!(f, "{kind} named {name:?} already exists")
            }
            Self::InvalidName { kind, reason } => write!(f, "invalid {kind} name: {reason}"),
            Self::MissingSelection(kind) => write!(f, "{kind} is required"),
            Self::SelectionMismatch {
                kind,
                id,
                parent,
                parent_id,
            } => write!(f, "{kind} {id} does not belong to {parent} {parent_id}"),
        }
    }
}

impl StdError for Error {}
