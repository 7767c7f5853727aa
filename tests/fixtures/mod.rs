//! Shared forms and seeding helpers for submission tests

#![allow(dead_code)]

use std::sync::Arc;

use formstore::forms::{FieldDef, FieldType, Form, FormSchema, RelationDef};
use formstore::storage::{NewSubmitter, SubmissionStore};
use formstore::submissions::{EventBus, RecordingListener, Submission, SubmissionService, Submitter};
use serde_json::{json, Map, Value};

/// Camp registration: the parent's own fields plus children (at least two)
/// and optional guardians
pub fn camp_form() -> Form {
    let schema = FormSchema::new("camp_registration", "Camp registration")
        .with_field(FieldDef::new("name").with_rules("required|min:3").unwrap())
        .with_field(
            FieldDef::new("email")
                .with_type(FieldType::Email)
                .with_rules("required|email")
                .unwrap(),
        )
        .with_field(FieldDef::new("newsletter").with_type(FieldType::Checkbox));

    let child = FormSchema::new("camp_child", "Child")
        .with_field(FieldDef::new("name").with_rules("required").unwrap())
        .with_field(FieldDef::new("age").with_rules("integer").unwrap());

    let guardian = FormSchema::new("camp_guardian", "Guardian")
        .with_field(FieldDef::new("phone").with_rules("required").unwrap());

    Form::new(0, "Summer camp", schema)
        .with_relation(RelationDef {
            field: "children".to_string(),
            title: "Children".to_string(),
            target: child,
            required_min: 2,
        })
        .with_relation(RelationDef {
            field: "guardians".to_string(),
            title: "Guardians".to_string(),
            target: guardian,
            required_min: 0,
        })
}

pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn valid_parent() -> Map<String, Value> {
    fields(json!({ "name": "Ada Lovelace", "email": "ada@example.org", "newsletter": true }))
}

pub fn child(name: &str) -> Map<String, Value> {
    fields(json!({ "name": name, "age": 9 }))
}

pub struct Seeded {
    pub form: Form,
    pub submitter: Submitter,
    pub submission: Submission,
}

pub fn service_with_outbox<S: SubmissionStore>(store: S) -> (SubmissionService<S>, Arc<RecordingListener>) {
    let outbox = Arc::new(RecordingListener::new());
    let events = EventBus::new().with_listener(outbox.clone());
    (SubmissionService::new(store, events), outbox)
}

/// Registers `form`, a submitter, and a fresh draft for them
pub async fn seed_with_form<S: SubmissionStore>(service: &mut SubmissionService<S>, form: Form) -> Seeded {
    let form = service.register_form(form).await.unwrap();
    let submitter = service
        .store()
        .insert_submitter(NewSubmitter {
            email: "ada@example.org".to_string(),
            name: Some("Ada".to_string()),
        })
        .await
        .unwrap();
    let submission = service
        .store()
        .create_submission(form.id, submitter.id)
        .await
        .unwrap();

    Seeded {
        form,
        submitter,
        submission,
    }
}

pub async fn seed<S: SubmissionStore>(service: &mut SubmissionService<S>) -> Seeded {
    seed_with_form(service, camp_form()).await
}

/// Draft with valid data and the two required children
pub async fn seed_ready<S: SubmissionStore>(service: &mut SubmissionService<S>) -> Seeded {
    let mut seeded = seed(service).await;
    service
        .attach_data(&mut seeded.submission, valid_parent())
        .await
        .unwrap();
    for name in ["Grace", "Alan"] {
        service
            .add_relation_row(&seeded.submission, "children", child(name))
            .await
            .unwrap();
    }
    seeded
}
