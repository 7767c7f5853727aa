//! Lifecycle, validation aggregation and derived views over the in-memory store

use chrono::{Duration, Utc};
use formstore::error::FormStoreError;
use formstore::storage::{MemoryStore, SubmissionStore};
use formstore::submissions::{SubmissionEvent, SubmissionQuery, SubmissionState};
use pretty_assertions::assert_eq;
use serde_json::json;

mod fixtures;

use fixtures::{child, fields, seed, seed_ready, seed_with_form, service_with_outbox, valid_parent};

#[tokio::test]
async fn test_draft_without_data_has_no_errors() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let seeded = seed(&mut service).await;

    assert!(service.get_errors(&seeded.submission, true).await.unwrap().is_empty());
    assert!(service.get_errors(&seeded.submission, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_final_submissions_are_not_revalidated() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed(&mut service).await;
    service
        .attach_data(&mut seeded.submission, fields(json!({ "name": "" })))
        .await
        .unwrap();
    assert!(!service.get_errors(&seeded.submission, false).await.unwrap().is_empty());

    assert!(service.withdraw(&mut seeded.submission).await.unwrap());

    let reloaded = service.submission(seeded.submission.id).await.unwrap();
    assert!(service.get_errors(&reloaded, true).await.unwrap().is_empty());
    assert!(service.get_errors(&reloaded, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_own_errors_precede_relation_summaries() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed(&mut service).await;
    service
        .attach_data(&mut seeded.submission, fields(json!({ "name": "Ada", "email": "nope" })))
        .await
        .unwrap();
    service
        .add_relation_row(&seeded.submission, "children", child("Grace"))
        .await
        .unwrap();

    let errors = service.get_errors(&seeded.submission, true).await.unwrap();

    assert_eq!(
        errors,
        vec![
            "The email must be a valid email address.".to_string(),
            "You have to add more Child (2 required)".to_string(),
        ]
    );

    let shallow = service.get_errors(&seeded.submission, false).await.unwrap();
    assert_eq!(shallow.len(), 1);
}

#[tokio::test]
async fn test_failing_rows_are_summarised_not_listed() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed(&mut service).await;
    service
        .attach_data(&mut seeded.submission, valid_parent())
        .await
        .unwrap();
    service
        .add_relation_row(&seeded.submission, "children", child("Grace"))
        .await
        .unwrap();
    service
        .add_relation_row(&seeded.submission, "children", child("Alan"))
        .await
        .unwrap();
    service
        .add_relation_row(&seeded.submission, "children", fields(json!({ "age": "nine" })))
        .await
        .unwrap();

    let errors = service.get_errors(&seeded.submission, true).await.unwrap();

    // missing name and non-integer age on the same row
    assert_eq!(errors, vec!["Child is not ready (2 issues, see below)".to_string()]);
}

#[tokio::test]
async fn test_single_row_issue_is_counted_once() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let seeded = seed_ready(&mut service).await;
    service
        .add_relation_row(&seeded.submission, "children", fields(json!({ "age": 4 })))
        .await
        .unwrap();

    let errors = service.get_errors(&seeded.submission, true).await.unwrap();
    assert_eq!(errors, vec!["Child is not ready (1 issues, see below)".to_string()]);
}

#[tokio::test]
async fn test_submit_succeeds_once() {
    let (mut service, outbox) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed_ready(&mut service).await;

    assert!(service.submit(&mut seeded.submission).await.unwrap());
    assert_eq!(seeded.submission.status, SubmissionState::Submitted);
    let treated = seeded.submission.treated.expect("treated is set on submit");

    // second call hits the status guard and changes nothing
    assert!(!service.submit(&mut seeded.submission).await.unwrap());
    assert!(!service.withdraw(&mut seeded.submission).await.unwrap());

    let stored = service.submission(seeded.submission.id).await.unwrap();
    assert_eq!(stored.status, SubmissionState::Submitted);
    assert_eq!(stored.treated, Some(treated));
    assert!(stored.data.is_some());

    let events = outbox.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "formstore.submit");
}

#[tokio::test]
async fn test_submit_refused_while_issues_remain() {
    let (mut service, outbox) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed(&mut service).await;
    service
        .attach_data(&mut seeded.submission, valid_parent())
        .await
        .unwrap();

    assert!(!service.submit(&mut seeded.submission).await.unwrap());

    let stored = service.submission(seeded.submission.id).await.unwrap();
    assert_eq!(stored.status, SubmissionState::Draft);
    assert!(stored.treated.is_none());
    assert!(outbox.events().is_empty());
}

#[tokio::test]
async fn test_withdraw_purges_rows_across_relations() {
    let (mut service, outbox) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed_ready(&mut service).await;
    let data = seeded.submission.data.clone().unwrap();
    assert_eq!(service.store().relation_row_count().await, 2);

    assert!(service.withdraw(&mut seeded.submission).await.unwrap());

    assert_eq!(service.store().relation_row_count().await, 0);
    assert!(service.store().data_record(&data).await.unwrap().is_none());

    let stored = service.submission(seeded.submission.id).await.unwrap();
    assert_eq!(stored.status, SubmissionState::Cancelled);
    assert!(stored.treated.is_some());
    assert!(stored.data.is_none());

    // listeners still see the record as it was before the purge
    let events = outbox.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SubmissionEvent::Withdraw);
    assert_eq!(events[0].submission.status, SubmissionState::Draft);
    let record = events[0].data.as_ref().expect("event carries the data record");
    assert_eq!(record.get("name"), Some(&json!("Ada Lovelace")));

    assert!(!service.withdraw(&mut seeded.submission).await.unwrap());
    assert_eq!(outbox.events().len(), 1);
}

#[tokio::test]
async fn test_withdraw_rolls_back_when_a_row_cannot_be_deleted() {
    let (mut service, outbox) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed_ready(&mut service).await;
    let data = seeded.submission.data.clone().unwrap();
    let rows = service.relation_rows(&seeded.submission, "children").await.unwrap();
    service.store().fail_row_deletion(rows[1].id).await;

    assert!(service.withdraw(&mut seeded.submission).await.is_err());

    assert_eq!(seeded.submission.status, SubmissionState::Draft);
    assert_eq!(service.store().relation_row_count().await, 2);
    assert!(service.store().data_record(&data).await.unwrap().is_some());

    let stored = service.submission(seeded.submission.id).await.unwrap();
    assert_eq!(stored.status, SubmissionState::Draft);
    assert!(stored.treated.is_none());
    assert!(outbox.events().is_empty());
}

#[tokio::test]
async fn test_stale_copy_loses_the_race() {
    let (mut service, outbox) = service_with_outbox(MemoryStore::new());
    let seeded = seed_ready(&mut service).await;

    let mut first = seeded.submission.clone();
    let mut stale = seeded.submission.clone();

    assert!(service.withdraw(&mut first).await.unwrap());
    assert!(!service.submit(&mut stale).await.unwrap());

    let stored = service.submission(seeded.submission.id).await.unwrap();
    assert_eq!(stored.status, SubmissionState::Cancelled);
    assert_eq!(outbox.events().len(), 1);
}

#[tokio::test]
async fn test_withdraw_purges_data_attached_after_copy_was_taken() {
    let (mut service, outbox) = service_with_outbox(MemoryStore::new());
    let seeded = seed(&mut service).await;
    let mut early = seeded.submission.clone();

    let mut fresh = seeded.submission.clone();
    service.attach_data(&mut fresh, valid_parent()).await.unwrap();
    service
        .add_relation_row(&fresh, "children", child("Grace"))
        .await
        .unwrap();
    let data = fresh.data.clone().unwrap();
    assert!(early.data.is_none());

    assert!(service.withdraw(&mut early).await.unwrap());

    assert_eq!(service.store().relation_row_count().await, 0);
    assert!(service.store().data_record(&data).await.unwrap().is_none());
    let stored = service.submission(seeded.submission.id).await.unwrap();
    assert_eq!(stored.status, SubmissionState::Cancelled);
    assert!(stored.data.is_none());
    assert_eq!(service.title(&stored, "").await.unwrap(), "[Removed]");

    // listeners get the record that was purged, not the caller's empty copy
    let events = outbox.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].submission.data, Some(data));
    assert!(events[0].data.is_some());
}

#[tokio::test]
async fn test_second_attach_replaces_values_in_place() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed_ready(&mut service).await;
    let data = seeded.submission.data.clone().unwrap();

    let record = service
        .attach_data(&mut seeded.submission, fields(json!({ "name": "Ada King", "email": "ada@example.org" })))
        .await
        .unwrap();

    assert_eq!(record.id, data.id);
    assert_eq!(seeded.submission.data, Some(data.clone()));
    assert_eq!(service.store().relation_row_count().await, 2);
    assert_eq!(service.title(&seeded.submission, "").await.unwrap(), "Ada King");

    assert!(service.withdraw(&mut seeded.submission).await.unwrap());
    assert_eq!(service.store().relation_row_count().await, 0);
    assert!(service.store().data_record(&data).await.unwrap().is_none());
}

#[tokio::test]
async fn test_attach_refused_once_final() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed_ready(&mut service).await;
    let mut stale = seeded.submission.clone();
    assert!(service.submit(&mut seeded.submission).await.unwrap());

    let err = service.attach_data(&mut stale, valid_parent()).await.unwrap_err();
    assert!(matches!(err, FormStoreError::Locked { .. }));

    let store = service.store();
    let other = store
        .insert_data_record("camp_registration", valid_parent())
        .await
        .unwrap();
    let err = store
        .attach_data(seeded.submission.id, &other.data_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, FormStoreError::Locked { .. }));
}

#[tokio::test]
async fn test_writability_follows_status_and_closing_time() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());

    let open = seed_with_form(&mut service, fixtures::camp_form()).await;
    assert!(service.is_writable(&open.submission).await.unwrap());

    let later = fixtures::camp_form().closing_at(Utc::now() + Duration::days(2));
    let future = seed_with_form(&mut service, later).await;
    assert!(service.is_writable(&future.submission).await.unwrap());

    let earlier = fixtures::camp_form().closing_at(Utc::now() - Duration::hours(1));
    let closed = seed_with_form(&mut service, earlier).await;
    assert!(!service.is_writable(&closed.submission).await.unwrap());

    let mut withdrawn = open.submission.clone();
    assert!(service.withdraw(&mut withdrawn).await.unwrap());
    assert!(!service.is_writable(&withdrawn).await.unwrap());
}

#[tokio::test]
async fn test_title_prefers_name_then_falls_back() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed(&mut service).await;

    service
        .attach_data(&mut seeded.submission, fields(json!({ "name": "Bob", "title": "Camp 2024" })))
        .await
        .unwrap();
    assert_eq!(service.title(&seeded.submission, " (draft)").await.unwrap(), "Camp 2024 (draft)");

    assert!(service.withdraw(&mut seeded.submission).await.unwrap());
    assert_eq!(service.title(&seeded.submission, "").await.unwrap(), "[Removed]");
}

#[tokio::test]
async fn test_notification_vars_alias_sender() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let seeded = seed(&mut service).await;

    let vars = service.notification_vars(&seeded.submission).await.unwrap();
    let value = serde_json::to_value(&vars).unwrap();

    assert_eq!(value["status"], json!("Draft"));
    assert_eq!(value["submitter"], value["sender"]);
    assert_eq!(value["submitter"]["email"], json!("ada@example.org"));
    assert_eq!(value["form"]["title"], json!("Summer camp"));
}

#[tokio::test]
async fn test_scopes_and_email_export() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let first = seed_ready(&mut service).await;
    let second = seed(&mut service).await;

    let other = service
        .store()
        .insert_submitter(formstore::storage::NewSubmitter {
            email: "b@y.com".to_string(),
            name: None,
        })
        .await
        .unwrap();
    let bad = service
        .store()
        .insert_submitter(formstore::storage::NewSubmitter {
            email: "bad".to_string(),
            name: None,
        })
        .await
        .unwrap();
    service.store().create_submission(first.form.id, other.id).await.unwrap();
    service.store().create_submission(first.form.id, bad.id).await.unwrap();

    let mut withdrawn = second.submission.clone();
    assert!(service.withdraw(&mut withdrawn).await.unwrap());

    let by_form = SubmissionQuery::new().by_form(&first.form);
    assert_eq!(service.list(&by_form).await.unwrap().len(), 3);

    let active = SubmissionQuery::new().active();
    assert_eq!(service.list(&active).await.unwrap().len(), 3);

    let export = service
        .export_emails(&SubmissionQuery::new(), "emails.txt")
        .await
        .unwrap();
    assert_eq!(export.body, "ada@example.org,b@y.com");
    assert_eq!(export.count, 2);
}

#[tokio::test]
async fn test_preview_renders_data_and_every_relation() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let mut seeded = seed_ready(&mut service).await;

    let preview = service.preview(&seeded.submission).await.unwrap();
    let data = preview.data.as_ref().expect("data block present");
    assert_eq!(data.fields[0].value, "Ada Lovelace");
    assert_eq!(data.fields[2].value, "Yes");
    assert_eq!(preview.relations.len(), 2);
    assert_eq!(preview.relations[0].rows.len(), 2);
    assert!(preview.relations[1].rows.is_empty());

    assert!(service.withdraw(&mut seeded.submission).await.unwrap());
    let purged = service.preview(&seeded.submission).await.unwrap();
    assert!(purged.data.is_none());
    assert!(purged.relations.is_empty());
    assert!(purged.to_html().contains("No data available"));
}

#[tokio::test]
async fn test_relation_rows_require_known_relation() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    let seeded = seed_ready(&mut service).await;

    assert!(service
        .add_relation_row(&seeded.submission, "pets", child("Rex"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_registry_reloads_from_store() {
    let (mut service, _) = service_with_outbox(MemoryStore::new());
    seed(&mut service).await;
    assert!(service.registry().contains("camp_child"));

    let form_options = service.form_options().await.unwrap();
    assert_eq!(form_options.len(), 1);
    assert_eq!(form_options[0].1, "Summer camp");
    assert_eq!(service.submitter_options().await.unwrap()[0].1, "ada@example.org");
}
