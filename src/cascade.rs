//! The cascading select binder.
//!
//! Changing the operation type reloads the categories and clears the
//! subcategories; changing the category to a non-empty value reloads the
//! subcategories. Each dependent field carries a generation counter. A
//! request remembers the generation it was issued under, and its response
//! is only applied while that generation is still current, so a slow
//! response can never overwrite the options of a newer selection.

use crate::dom::NodeId;
use crate::options::{PLACEHOLDER_LABEL, SelectOption};
use crate::request::Request;
use crate::{Error, Result};

/// A select element resolved on a [`Page`](crate::Page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle(pub(crate) NodeId);

/// The three selects taking part in the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeFields {
    pub operation_type: FieldHandle,
    pub category: FieldHandle,
    pub subcategory: FieldHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeConfig {
    operation_type_selector: String,
    category_selector: String,
    subcategory_selector: String,
    categories_endpoint: String,
    subcategories_endpoint: String,
    operation_type_param: String,
    category_param: String,
    placeholder_label: String,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            operation_type_selector: "#id_operation_type".into(),
            category_selector: "#id_category".into(),
            subcategory_selector: "#id_subcategory".into(),
            categories_endpoint: "/reference/ajax/load-categories/".into(),
            subcategories_endpoint: "/reference/ajax/load-subcategories/".into(),
            operation_type_param: "operation_type".into(),
            category_param: "category".into(),
            placeholder_label: PLACEHOLDER_LABEL.into(),
        }
    }
}

impl CascadeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(
        mut self,
        operation_type: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        self.operation_type_selector = operation_type.into();
        self.category_selector = category.into();
        self.subcategory_selector = subcategory.into();
        self
    }

    pub fn with_endpoints(
        mut self,
        categories: impl Into<String>,
        subcategories: impl Into<String>,
    ) -> Self {
        self.categories_endpoint = categories.into();
        self.subcategories_endpoint = subcategories.into();
        self
    }

    pub fn with_params(
        mut self,
        operation_type: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        self.operation_type_param = operation_type.into();
        self.category_param = category.into();
        self
    }

    pub fn with_placeholder_label(mut self, label: impl Into<String>) -> Self {
        self.placeholder_label = label.into();
        self
    }

    pub fn operation_type_selector(&self) -> &str {
        &self.operation_type_selector
    }

    pub fn category_selector(&self) -> &str {
        &self.category_selector
    }

    pub fn subcategory_selector(&self) -> &str {
        &self.subcategory_selector
    }

    pub fn categories_endpoint(&self) -> &str {
        &self.categories_endpoint
    }

    pub fn subcategories_endpoint(&self) -> &str {
        &self.subcategories_endpoint
    }

    pub fn operation_type_param(&self) -> &str {
        &self.operation_type_param
    }

    pub fn category_param(&self) -> &str {
        &self.category_param
    }

    pub fn placeholder_label(&self) -> &str {
        &self.placeholder_label
    }

    pub fn validate(&self) -> Result<()> {
        for (what, selector) in [
            ("operation type selector", &self.operation_type_selector),
            ("category selector", &self.category_selector),
            ("subcategory selector", &self.subcategory_selector),
        ] {
            if selector.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{what} is empty")));
            }
        }
        for (what, endpoint) in [
            ("categories endpoint", &self.categories_endpoint),
            ("subcategories endpoint", &self.subcategories_endpoint),
        ] {
            if !endpoint.starts_with('/') || endpoint.contains('?') {
                return Err(Error::InvalidConfig(format!(
                    "{what} must be an absolute path without query, got {endpoint:?}"
                )));
            }
        }
        for (what, param) in [
            ("operation type parameter", &self.operation_type_param),
            ("category parameter", &self.category_param),
        ] {
            if param.is_empty() {
                return Err(Error::InvalidConfig(format!("{what} is empty")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DependentField {
    Category,
    Subcategory,
}

/// Identifies which dependent field a request feeds and under which
/// generation it was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) target: DependentField,
    pub(crate) generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChangeAction {
    /// The event target is not a cascade parent field.
    Ignored,
    /// A cascade parent changed but no request is due.
    Skipped(&'static str),
    Fetch(Request, Ticket),
}

#[derive(Debug, Clone)]
pub struct CascadeBinder {
    fields: CascadeFields,
    config: CascadeConfig,
    category_generation: u64,
    subcategory_generation: u64,
}

impl CascadeBinder {
    pub fn new(fields: CascadeFields, config: CascadeConfig) -> Result<Self> {
        config.validate()?;
        let CascadeFields {
            operation_type,
            category,
            subcategory,
        } = fields;
        if operation_type == category || operation_type == subcategory || category == subcategory {
            return Err(Error::InvalidConfig(
                "cascade fields must be three distinct selects".into(),
            ));
        }
        Ok(Self {
            fields,
            config,
            category_generation: 0,
            subcategory_generation: 0,
        })
    }

    pub fn fields(&self) -> CascadeFields {
        self.fields
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub(crate) fn on_change(&mut self, target: NodeId, value: &str) -> ChangeAction {
        if target == self.fields.operation_type.0 {
            self.category_generation += 1;
            // Applying the categories clears the subcategories, so nothing
            // requested for the old category may land afterwards.
            self.subcategory_generation += 1;
            let request = Request::get(&self.config.categories_endpoint)
                .with_param(&self.config.operation_type_param, value);
            return ChangeAction::Fetch(
                request,
                Ticket {
                    target: DependentField::Category,
                    generation: self.category_generation,
                },
            );
        }

        if target == self.fields.category.0 {
            if value.is_empty() {
                return ChangeAction::Skipped("category cleared");
            }
            self.subcategory_generation += 1;
            let request = Request::get(&self.config.subcategories_endpoint)
                .with_param(&self.config.category_param, value);
            return ChangeAction::Fetch(
                request,
                Ticket {
                    target: DependentField::Subcategory,
                    generation: self.subcategory_generation,
                },
            );
        }

        ChangeAction::Ignored
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        let latest = match ticket.target {
            DependentField::Category => self.category_generation,
            DependentField::Subcategory => self.subcategory_generation,
        };
        ticket.generation == latest
    }

    /// Accepts the options answered for `ticket` and returns the field
    /// rewrites they amount to. New categories clear the subcategory field,
    /// so any subcategory load still in flight is retired here as well.
    pub(crate) fn accept_options(
        &mut self,
        ticket: Ticket,
        options: Vec<SelectOption>,
    ) -> Vec<(NodeId, Vec<SelectOption>)> {
        match ticket.target {
            DependentField::Category => {
                self.subcategory_generation += 1;
                vec![
                    (self.fields.category.0, options),
                    (
                        self.fields.subcategory.0,
                        vec![SelectOption::new("", self.config.placeholder_label.clone())],
                    ),
                ]
            }
            DependentField::Subcategory => vec![(self.fields.subcategory.0, options)],
        }
    }
}
