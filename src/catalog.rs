//! In-memory reference data behind the cascade: statuses, operation types,
//! categories and subcategories.

use std::collections::BTreeMap;
use std::fmt;

use unicode_normalization::UnicodeNormalization;

use crate::{Error, Result};

pub type RecordId = u64;

const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Status,
    OperationType,
    Category,
    SubCategory,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Status => "status",
            Self::OperationType => "operation type",
            Self::Category => "category",
            Self::SubCategory => "subcategory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationType {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
    pub operation_type: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCategory {
    pub id: RecordId,
    pub name: String,
    pub category: RecordId,
}

/// Current selection of the three cascade fields, by record id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormSelection {
    pub operation_type: Option<RecordId>,
    pub category: Option<RecordId>,
    pub subcategory: Option<RecordId>,
}

/// Rows of one table plus its id sequence. Ids are never reused.
#[derive(Debug, Clone)]
struct Table<T> {
    rows: BTreeMap<RecordId, T>,
    next_id: RecordId,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(RecordId) -> T) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.insert(id, build(id));
        id
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    statuses: Table<Status>,
    operation_types: Table<OperationType>,
    categories: Table<Category>,
    subcategories: Table<SubCategory>,
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog seeded with the stock bookkeeping references.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.seed_defaults();
        catalog
    }

    /// Creates the stock references that are missing. Running it twice
    /// leaves the catalog unchanged.
    pub fn seed_defaults(&mut self) {
        for name in ["Бизнес", "Личное", "Налог"] {
            self.get_or_create_status(name);
        }

        let income = self.get_or_create_operation_type("Пополнение");
        let expense = self.get_or_create_operation_type("Списание");

        let infrastructure = self.get_or_create_category("Инфраструктура", expense);
        let marketing = self.get_or_create_category("Маркетинг", expense);
        self.get_or_create_category("Зарплата", expense);
        self.get_or_create_category("Продажи", income);

        for (name, category) in [
            ("VPS", infrastructure),
            ("Proxy", infrastructure),
            ("Farpost", marketing),
            ("Avito", marketing),
            ("Офис", infrastructure),
        ] {
            self.get_or_create_subcategory(name, category);
        }
    }

    fn get_or_create_status(&mut self, name: &str) -> RecordId {
        match self.find_status(name) {
            Some(status) => status.id,
            None => self.statuses.insert_with(|id| Status {
                id,
                name: name.to_string(),
            }),
        }
    }

    fn get_or_create_operation_type(&mut self, name: &str) -> RecordId {
        match self.find_operation_type(name) {
            Some(kind) => kind.id,
            None => self.operation_types.insert_with(|id| OperationType {
                id,
                name: name.to_string(),
            }),
        }
    }

    fn get_or_create_category(&mut self, name: &str, operation_type: RecordId) -> RecordId {
        match self.find_category(name, operation_type) {
            Some(category) => category.id,
            None => self.categories.insert_with(|id| Category {
                id,
                name: name.to_string(),
                operation_type,
            }),
        }
    }

    fn get_or_create_subcategory(&mut self, name: &str, category: RecordId) -> RecordId {
        match self.find_subcategory(name, category) {
            Some(subcategory) => subcategory.id,
            None => self.subcategories.insert_with(|id| SubCategory {
                id,
                name: name.to_string(),
                category,
            }),
        }
    }

    pub fn status(&self, id: RecordId) -> Option<&Status> {
        self.statuses.rows.get(&id)
    }

    pub fn operation_type(&self, id: RecordId) -> Option<&OperationType> {
        self.operation_types.rows.get(&id)
    }

    pub fn category(&self, id: RecordId) -> Option<&Category> {
        self.categories.rows.get(&id)
    }

    pub fn subcategory(&self, id: RecordId) -> Option<&SubCategory> {
        self.subcategories.rows.get(&id)
    }

    pub fn find_status(&self, name: &str) -> Option<&Status> {
        let name = normalize_name(name);
        self.statuses.rows.values().find(|row| row.name == name)
    }

    pub fn find_operation_type(&self, name: &str) -> Option<&OperationType> {
        let name = normalize_name(name);
        self.operation_types.rows.values().find(|row| row.name == name)
    }

    pub fn find_category(&self, name: &str, operation_type: RecordId) -> Option<&Category> {
        let name = normalize_name(name);
        self.categories
            .rows
            .values()
            .find(|row| row.operation_type == operation_type && row.name == name)
    }

    pub fn find_subcategory(&self, name: &str, category: RecordId) -> Option<&SubCategory> {
        let name = normalize_name(name);
        self.subcategories
            .rows
            .values()
            .find(|row| row.category == category && row.name == name)
    }

    pub fn statuses(&self) -> Vec<&Status> {
        sorted_by_name(self.statuses.rows.values(), |row| (&row.name, row.id))
    }

    pub fn operation_types(&self) -> Vec<&OperationType> {
        sorted_by_name(self.operation_types.rows.values(), |row| (&row.name, row.id))
    }

    pub fn categories(&self) -> Vec<&Category> {
        sorted_by_name(self.categories.rows.values(), |row| (&row.name, row.id))
    }

    pub fn subcategories(&self) -> Vec<&SubCategory> {
        sorted_by_name(self.subcategories.rows.values(), |row| (&row.name, row.id))
    }

    /// Categories offered for an operation type, ordered by name.
    pub fn categories_for(&self, operation_type: RecordId) -> Vec<&Category> {
        sorted_by_name(
            self.categories
                .rows
                .values()
                .filter(|row| row.operation_type == operation_type),
            |row| (&row.name, row.id),
        )
    }

    /// Subcategories offered for a category, ordered by name.
    pub fn subcategories_for(&self, category: RecordId) -> Vec<&SubCategory> {
        sorted_by_name(
            self.subcategories
                .rows
                .values()
                .filter(|row| row.category == category),
            |row| (&row.name, row.id),
        )
    }

    /// Display label of a category, `"name (operation type)"`.
    pub fn category_label(&self, id: RecordId) -> Option<String> {
        let category = self.category(id)?;
        let kind = self.operation_type(category.operation_type)?;
        Some(format!("{} ({})", category.name, kind.name))
    }

    /// Display label of a subcategory, `"name (category label)"`.
    pub fn subcategory_label(&self, id: RecordId) -> Option<String> {
        let subcategory = self.subcategory(id)?;
        let parent = self.category_label(subcategory.category)?;
        Some(format!("{} ({parent})", subcategory.name))
    }

    pub fn create_status(&mut self, name: &str) -> Result<RecordId> {
        let name = validated_name(RecordKind::Status, name)?;
        if self.find_status(&name).is_some() {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::Status,
                name,
            });
        }
        Ok(self.statuses.insert_with(|id| Status { id, name }))
    }

    pub fn rename_status(&mut self, id: RecordId, name: &str) -> Result<()> {
        let name = validated_name(RecordKind::Status, name)?;
        if self.find_status(&name).is_some_and(|other| other.id != id) {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::Status,
                name,
            });
        }
        let row = self
            .statuses
            .rows
            .get_mut(&id)
            .ok_or(Error::RecordNotFound {
                kind: RecordKind::Status,
                id,
            })?;
        row.name = name;
        Ok(())
    }

    pub fn delete_status(&mut self, id: RecordId) -> Result<Status> {
        self.statuses.rows.remove(&id).ok_or(Error::RecordNotFound {
            kind: RecordKind::Status,
            id,
        })
    }

    pub fn create_operation_type(&mut self, name: &str) -> Result<RecordId> {
        let name = validated_name(RecordKind::OperationType, name)?;
        if self.find_operation_type(&name).is_some() {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::OperationType,
                name,
            });
        }
        Ok(self
            .operation_types
            .insert_with(|id| OperationType { id, name }))
    }

    pub fn rename_operation_type(&mut self, id: RecordId, name: &str) -> Result<()> {
        let name = validated_name(RecordKind::OperationType, name)?;
        if self
            .find_operation_type(&name)
            .is_some_and(|other| other.id != id)
        {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::OperationType,
                name,
            });
        }
        let row = self
            .operation_types
            .rows
            .get_mut(&id)
            .ok_or(Error::RecordNotFound {
                kind: RecordKind::OperationType,
                id,
            })?;
        row.name = name;
        Ok(())
    }

    /// Deletes an operation type together with its categories and their
    /// subcategories.
    pub fn delete_operation_type(&mut self, id: RecordId) -> Result<OperationType> {
        let removed = self
            .operation_types
            .rows
            .remove(&id)
            .ok_or(Error::RecordNotFound {
                kind: RecordKind::OperationType,
                id,
            })?;
        let orphaned: Vec<RecordId> = self
            .categories
            .rows
            .values()
            .filter(|row| row.operation_type == id)
            .map(|row| row.id)
            .collect();
        for category in orphaned {
            self.remove_category_cascade(category);
        }
        Ok(removed)
    }

    pub fn create_category(&mut self, name: &str, operation_type: RecordId) -> Result<RecordId> {
        let name = validated_name(RecordKind::Category, name)?;
        self.require_operation_type(operation_type)?;
        if self.find_category(&name, operation_type).is_some() {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::Category,
                name,
            });
        }
        Ok(self.categories.insert_with(|id| Category {
            id,
            name,
            operation_type,
        }))
    }

    /// Renames a category and/or moves it to another operation type.
    pub fn update_category(
        &mut self,
        id: RecordId,
        name: &str,
        operation_type: RecordId,
    ) -> Result<()> {
        let name = validated_name(RecordKind::Category, name)?;
        self.require_operation_type(operation_type)?;
        if self
            .find_category(&name, operation_type)
            .is_some_and(|other| other.id != id)
        {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::Category,
                name,
            });
        }
        let row = self
            .categories
            .rows
            .get_mut(&id)
            .ok_or(Error::RecordNotFound {
                kind: RecordKind::Category,
                id,
            })?;
        row.name = name;
        row.operation_type = operation_type;
        Ok(())
    }

    /// Deletes a category together with its subcategories.
    pub fn delete_category(&mut self, id: RecordId) -> Result<Category> {
        self.remove_category_cascade(id).ok_or(Error::RecordNotFound {
            kind: RecordKind::Category,
            id,
        })
    }

    fn remove_category_cascade(&mut self, id: RecordId) -> Option<Category> {
        let removed = self.categories.rows.remove(&id)?;
        self.subcategories.rows.retain(|_, row| row.category != id);
        Some(removed)
    }

    pub fn create_subcategory(&mut self, name: &str, category: RecordId) -> Result<RecordId> {
        let name = validated_name(RecordKind::SubCategory, name)?;
        self.require_category(category)?;
        if self.find_subcategory(&name, category).is_some() {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::SubCategory,
                name,
            });
        }
        Ok(self.subcategories.insert_with(|id| SubCategory {
            id,
            name,
            category,
        }))
    }

    pub fn update_subcategory(&mut self, id: RecordId, name: &str, category: RecordId) -> Result<()> {
        let name = validated_name(RecordKind::SubCategory, name)?;
        self.require_category(category)?;
        if self
            .find_subcategory(&name, category)
            .is_some_and(|other| other.id != id)
        {
            return Err(Error::DuplicateRecord {
                kind: RecordKind::SubCategory,
                name,
            });
        }
        let row = self
            .subcategories
            .rows
            .get_mut(&id)
            .ok_or(Error::RecordNotFound {
                kind: RecordKind::SubCategory,
                id,
            })?;
        row.name = name;
        row.category = category;
        Ok(())
    }

    pub fn delete_subcategory(&mut self, id: RecordId) -> Result<SubCategory> {
        self.subcategories
            .rows
            .remove(&id)
            .ok_or(Error::RecordNotFound {
                kind: RecordKind::SubCategory,
                id,
            })
    }

    /// Checks a submitted selection the way a saved transaction must look:
    /// operation type and category are required, the category belongs to the
    /// operation type, and a subcategory, when given, belongs to the category.
    pub fn validate_selection(&self, selection: &FormSelection) -> Result<()> {
        let operation_type = selection
            .operation_type
            .ok_or(Error::MissingSelection(RecordKind::OperationType))?;
        self.require_operation_type(operation_type)?;

        let category_id = selection
            .category
            .ok_or(Error::MissingSelection(RecordKind::Category))?;
        let category = self.category(category_id).ok_or(Error::RecordNotFound {
            kind: RecordKind::Category,
            id: category_id,
        })?;
        if category.operation_type != operation_type {
            return Err(Error::SelectionMismatch {
                kind: RecordKind::Category,
                id: category_id,
                parent: RecordKind::OperationType,
                parent_id: operation_type,
            });
        }

        let Some(subcategory_id) = selection.subcategory else {
            return Ok(());
        };
        let subcategory = self.subcategory(subcategory_id).ok_or(Error::RecordNotFound {
            kind: RecordKind::SubCategory,
            id: subcategory_id,
        })?;
        if subcategory.category != category_id {
            return Err(Error::SelectionMismatch {
                kind: RecordKind::SubCategory,
                id: subcategory_id,
                parent: RecordKind::Category,
                parent_id: category_id,
            });
        }
        Ok(())
    }

    fn require_operation_type(&self, id: RecordId) -> Result<()> {
        if self.operation_type(id).is_none() {
            return Err(Error::RecordNotFound {
                kind: RecordKind::OperationType,
                id,
            });
        }
        Ok(())
    }

    fn require_category(&self, id: RecordId) -> Result<()> {
        if self.category(id).is_none() {
            return Err(Error::RecordNotFound {
                kind: RecordKind::Category,
                id,
            });
        }
        Ok(())
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().nfc().collect()
}

fn validated_name(kind: RecordKind, name: &str) -> Result<String> {
    let name = normalize_name(name);
    if name.is_empty() {
        return Err(Error::InvalidName {
            kind,
            reason: "name is required".into(),
        });
    }
    let len = name.chars().count();
    if len > MAX_NAME_CHARS {
        return Err(Error::InvalidName {
            kind,
            reason: format!("name has {len} characters, at most {MAX_NAME_CHARS} allowed"),
        });
    }
    Ok(name)
}

fn sorted_by_name<'a, T: 'a>(
    rows: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> (&String, RecordId),
) -> Vec<&'a T> {
    let mut rows: Vec<&T> = rows.collect();
    rows.sort_by(|a, b| key(a).cmp(&key(b)));
    rows
}
