//! Server side of the cascade: the two AJAX endpoints and the initial
//! rendering of the three select fields.

use crate::catalog::{FormSelection, RecordId, ReferenceCatalog};
use crate::html::{escape_html_attr, escape_html_text};
use crate::options::{PLACEHOLDER_LABEL, SelectOption, render_options};
use crate::request::{Backend, Request, Response};

pub const LOAD_CATEGORIES_PATH: &str = "/reference/ajax/load-categories/";
pub const LOAD_SUBCATEGORIES_PATH: &str = "/reference/ajax/load-subcategories/";

/// Serves `load-categories` and `load-subcategories` from a catalog.
///
/// A missing or empty parameter yields an empty option list, a parameter
/// that is not an id yields 400, and any other path yields 404.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceEndpoints<'a> {
    catalog: &'a ReferenceCatalog,
}

impl<'a> ReferenceEndpoints<'a> {
    pub fn new(catalog: &'a ReferenceCatalog) -> Self {
        Self { catalog }
    }

    pub fn load_categories(&self, operation_type: Option<&str>) -> Response {
        match parse_id("operation_type", operation_type) {
            Ok(None) => Response::ok(""),
            Ok(Some(id)) => Response::ok(render_options(
                &self
                    .catalog
                    .categories_for(id)
                    .into_iter()
                    .map(|category| SelectOption::new(category.id.to_string(), &category.name))
                    .collect::<Vec<_>>(),
            )),
            Err(response) => response,
        }
    }

    pub fn load_subcategories(&self, category: Option<&str>) -> Response {
        match parse_id("category", category) {
            Ok(None) => Response::ok(""),
            Ok(Some(id)) => Response::ok(render_options(
                &self
                    .catalog
                    .subcategories_for(id)
                    .into_iter()
                    .map(|sub| SelectOption::new(sub.id.to_string(), &sub.name))
                    .collect::<Vec<_>>(),
            )),
            Err(response) => response,
        }
    }
}

impl Backend for ReferenceEndpoints<'_> {
    fn handle(&self, request: &Request) -> Response {
        match request.path.as_str() {
            LOAD_CATEGORIES_PATH => self.load_categories(request.param("operation_type")),
            LOAD_SUBCATEGORIES_PATH => self.load_subcategories(request.param("category")),
            _ => Response::not_found(),
        }
    }
}

fn parse_id(name: &str, raw: Option<&str>) -> Result<Option<RecordId>, Response> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<RecordId>()
        .map(Some)
        .map_err(|_| Response::with_status(400, format!("{name} expects a number, got {raw:?}")))
}

/// Renders the operation type, category and subcategory selects for a
/// page, each led by the placeholder. Categories are limited to the
/// selected operation type and subcategories to the selected category; a
/// field whose parent is unselected holds only the placeholder.
pub fn render_cascade_fields(catalog: &ReferenceCatalog, selection: &FormSelection) -> String {
    let operation_types: Vec<(RecordId, &str)> = catalog
        .operation_types()
        .into_iter()
        .map(|row| (row.id, row.name.as_str()))
        .collect();

    let categories: Vec<(RecordId, &str)> = selection
        .operation_type
        .map(|id| {
            catalog
                .categories_for(id)
                .into_iter()
                .map(|row| (row.id, row.name.as_str()))
                .collect()
        })
        .unwrap_or_default();

    // A category from another operation type does not select anything.
    let category = selection
        .category
        .filter(|id| categories.iter().any(|(candidate, _)| candidate == id));
    let subcategories: Vec<(RecordId, &str)> = category
        .map(|id| {
            catalog
                .subcategories_for(id)
                .into_iter()
                .map(|row| (row.id, row.name.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let mut out = String::new();
    render_select(
        &mut out,
        "operation_type",
        &operation_types,
        selection.operation_type,
    );
    render_select(&mut out, "category", &categories, category);
    render_select(&mut out, "subcategory", &subcategories, selection.subcategory);
    out
}

fn render_select(
    out: &mut String,
    name: &str,
    rows: &[(RecordId, &str)],
    selected: Option<RecordId>,
) {
    out.push_str(&format!(
        "<select id=\"id_{name}\" name=\"{name}\" class=\"form-control\">"
    ));
    out.push_str(&format!(
        "<option value=\"\">{}</option>",
        escape_html_text(PLACEHOLDER_LABEL)
    ));
    for (id, label) in rows {
        let value = escape_html_attr(&id.to_string());
        let label = escape_html_text(label);
        if selected == Some(*id) {
            out.push_str(&format!("<option value=\"{value}\" selected>{label}</option>"));
        } else {
            out.push_str(&format!("<option value=\"{value}\">{label}</option>"));
        }
    }
    out.push_str("</select>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::parse_options;
    use crate::{Page, Result};

    #[test]
    fn categories_endpoint_lists_options_ordered_by_name() -> Result<()> {
        let catalog = ReferenceCatalog::with_defaults();
        let expense = catalog
            .find_operation_type("Списание")
            .map(|row| row.id)
            .expect("expense seeded");
        let endpoints = ReferenceEndpoints::new(&catalog);
        let response = endpoints.handle(
            &Request::get(LOAD_CATEGORIES_PATH).with_param("operation_type", expense.to_string()),
        );
        assert_eq!(response.status, 200);
        let labels: Vec<String> = parse_options(&response.body)?
            .into_iter()
            .map(|option| option.label)
            .collect();
        assert_eq!(labels, ["Зарплата", "Инфраструктура", "Маркетинг"]);
        Ok(())
    }

    #[test]
    fn missing_or_unknown_parameters_yield_empty_lists() {
        let catalog = ReferenceCatalog::with_defaults();
        let endpoints = ReferenceEndpoints::new(&catalog);
        for request in [
            Request::get(LOAD_CATEGORIES_PATH),
            Request::get(LOAD_CATEGORIES_PATH).with_param("operation_type", ""),
            Request::get(LOAD_CATEGORIES_PATH).with_param("operation_type", "999"),
            Request::get(LOAD_SUBCATEGORIES_PATH).with_param("category", "999"),
        ] {
            assert_eq!(endpoints.handle(&request), Response::ok(""), "{request:?}");
        }
    }

    #[test]
    fn non_numeric_parameter_is_a_bad_request() {
        let catalog = ReferenceCatalog::with_defaults();
        let response = ReferenceEndpoints::new(&catalog)
            .handle(&Request::get(LOAD_SUBCATEGORIES_PATH).with_param("category", "sales"));
        assert_eq!(response.status, 400);
        assert!(response.body.contains("category"));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        let catalog = ReferenceCatalog::new();
        let response =
            ReferenceEndpoints::new(&catalog).handle(&Request::get("/reference/ajax/load-statuses/"));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn labels_are_escaped_in_responses() -> Result<()> {
        let mut catalog = ReferenceCatalog::new();
        let kind = catalog.create_operation_type("Expense")?;
        catalog.create_category("R&D <lab>", kind)?;
        let response = ReferenceEndpoints::new(&catalog).load_categories(Some(kind.to_string().as_str()));
        assert_eq!(response.body, r#"<option value="1">R&amp;D &lt;lab&gt;</option>"#);
        Ok(())
    }

    #[test]
    fn rendered_fields_follow_the_selection() -> Result<()> {
        let catalog = ReferenceCatalog::with_defaults();
        let expense = catalog.find_operation_type("Списание").map(|r| r.id);
        let marketing = expense
            .and_then(|id| catalog.find_category("Маркетинг", id))
            .map(|r| r.id);
        let html = render_cascade_fields(
            &catalog,
            &FormSelection {
                operation_type: expense,
                category: marketing,
                subcategory: None,
            },
        );

        let page = Page::from_html(&html)?;
        page.assert_value("#id_operation_type", &expense.unwrap_or_default().to_string())?;
        page.assert_value("#id_category", &marketing.unwrap_or_default().to_string())?;
        page.assert_value("#id_subcategory", "")?;
        let subcategories: Vec<String> = page
            .options("#id_subcategory")?
            .into_iter()
            .map(|option| option.label)
            .collect();
        assert_eq!(subcategories, [PLACEHOLDER_LABEL, "Avito", "Farpost"]);
        Ok(())
    }

    #[test]
    fn rendered_fields_without_selection_offer_only_operation_types() -> Result<()> {
        let catalog = ReferenceCatalog::with_defaults();
        let page = Page::from_html(&render_cascade_fields(&catalog, &FormSelection::default()))?;
        assert_eq!(page.options("#id_operation_type")?.len(), 3);
        page.assert_options("#id_category", &[SelectOption::placeholder()])?;
        page.assert_options("#id_subcategory", &[SelectOption::placeholder()])?;
        Ok(())
    }

    #[test]
    fn category_outside_the_selected_operation_type_is_ignored() -> Result<()> {
        let catalog = ReferenceCatalog::with_defaults();
        let income = catalog.find_operation_type("Пополнение").map(|r| r.id);
        let expense = catalog.find_operation_type("Списание").map(|r| r.id);
        let marketing = expense
            .and_then(|id| catalog.find_category("Маркетинг", id))
            .map(|r| r.id);
        let page = Page::from_html(&render_cascade_fields(
            &catalog,
            &FormSelection {
                operation_type: income,
                category: marketing,
                subcategory: None,
            },
        ))?;
        page.assert_value("#id_category", "")?;
        page.assert_options("#id_subcategory", &[SelectOption::placeholder()])?;
        Ok(())
    }
}
