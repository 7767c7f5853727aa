// Form definitions: field schema, relation definitions and the pure
// validation function that checks a data map against a schema.

pub mod registry;
pub mod schema;
pub mod validation;

pub use registry::RecordRegistry;
pub use schema::{FieldDef, FieldRule, FieldType, Form, FormSchema, RelationDef, RuleSet};
pub use validation::{is_valid_email, validate};
