use std::collections::HashMap;

use tracing::debug;

use crate::error::FormStoreError;

use super::schema::{Form, FormSchema};

/// Maps `data_type` identifiers to the schema of the record they denote.
///
/// Submissions point at their data through a `{kind, id}` pair; the kind is
/// only meaningful if a form registered it here.
#[derive(Debug, Clone, Default)]
pub struct RecordRegistry {
    kinds: HashMap<String, FormSchema>,
}

impl RecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a form's own record kind and the kinds of its relation targets
    pub fn register_form(&mut self, form: &Form) {
        self.register(form.schema.clone());
        for relation in form.rels() {
            self.register(relation.target.clone());
        }
    }

    pub fn register(&mut self, schema: FormSchema) {
        debug!(kind = %schema.kind, "Registering record kind");
        self.kinds.insert(schema.kind.clone(), schema);
    }

    pub fn resolve(&self, kind: &str) -> Result<&FormSchema, FormStoreError> {
        self.kinds
            .get(kind)
            .ok_or_else(|| FormStoreError::UnknownRecordKind {
                kind: kind.to_string(),
            })
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl<'a> FromIterator<&'a Form> for RecordRegistry {
    fn from_iter<T: IntoIterator<Item = &'a Form>>(iter: T) -> Self {
        let mut registry = RecordRegistry::new();
        for form in iter {
            registry.register_form(form);
        }
        registry
    }
}
