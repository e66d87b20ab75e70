//! The file and SQL backends must answer every query identically when they
//! hold the same data.

use chrono::{Duration, Utc};
use tempfile::TempDir;
use tinyform::{
    FileSubmissionStore, SqlSubmissionStore, Submission, SubmissionQuery, SubmissionStore,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn dataset() -> Vec<Submission> {
    let now = Utc::now();
    let rows = [
        ("Contact", r#"{"email":"test@email.com","message":"Inquiry 1"}"#, 2),
        ("Order", r#"{"product":"Laptop","quantity":1}"#, 1),
        ("Contact", r#"{"email":"other@test.com","message":"Support Request"}"#, 0),
        ("Feedback", r#"{"rating":5,"comment":"Great service"}"#, 3),
        ("contact", r#"{"note":"lowercase type"}"#, 4),
        ("ORDER", r#"{"product":"Mouse","Note":"CONTACT me"}"#, 5),
        ("École", r#"{"nom":"Élodie"}"#, 6),
        ("Survey", r#"{"answers":[1,2,3],"text":"50% off"}"#, 7),
    ];

    let mut data: Vec<Submission> = rows
        .into_iter()
        .map(|(form_type, payload, hours_ago)| {
            Submission::new(form_type, payload).with_submitted_at(now - Duration::hours(hours_ago))
        })
        .collect();

    // Two records sharing a timestamp exercise the id tie-break.
    let tie = now - Duration::minutes(30);
    data.push(
        Submission::new("Tie", "{}")
            .with_id(Uuid::from_u128(0xB))
            .with_submitted_at(tie),
    );
    data.push(
        Submission::new("Tie", "{}")
            .with_id(Uuid::from_u128(0xA))
            .with_submitted_at(tie),
    );
    data
}

fn queries() -> Vec<SubmissionQuery> {
    let mut queries = vec![
        SubmissionQuery::new(),
        SubmissionQuery::new().form_type("contact"),
        SubmissionQuery::new().form_type("CONTACT"),
        SubmissionQuery::new().form_type("order"),
        SubmissionQuery::new().form_type("école"),
        SubmissionQuery::new().form_type("  "),
        SubmissionQuery::new().form_type("Cont"),
        SubmissionQuery::new().search("contact"),
        SubmissionQuery::new().search("LAPTOP"),
        SubmissionQuery::new().search("élodie"),
        SubmissionQuery::new().search("50%"),
        SubmissionQuery::new().search("_"),
        SubmissionQuery::new().search("\"product\""),
        SubmissionQuery::new().search(""),
        SubmissionQuery::new().form_type("order").search("mouse"),
        SubmissionQuery::new().form_type("contact").search("zebra"),
    ];
    for (skip, take) in [(0, 1), (1, 2), (3, 3), (9, 5), (20, 5), (0, 0)] {
        queries.push(SubmissionQuery::new().skip(skip).take(take));
        queries.push(SubmissionQuery::new().search("o").skip(skip).take(take));
    }
    queries
}

#[tokio::test]
async fn file_and_sql_backends_agree() {
    let temp_dir = TempDir::new().unwrap();
    let file = FileSubmissionStore::new(temp_dir.path().join("submissions.json"));
    let sql = SqlSubmissionStore::in_memory().await.unwrap();

    for submission in dataset() {
        file.add(submission.clone()).await.unwrap();
        sql.add(submission).await.unwrap();
    }

    let cancel = CancellationToken::new();
    for query in queries() {
        let from_file = file.query(&query, &cancel).await.unwrap();
        let from_sql = sql.query(&query, &cancel).await.unwrap();
        assert_eq!(from_file, from_sql, "backends disagree on {query:?}");

        // Both must also agree with the reference pipeline.
        assert_eq!(from_file, query.apply(dataset_from(&file).await));
    }
}

#[tokio::test]
async fn unicode_form_types_fold_the_same_way() {
    let temp_dir = TempDir::new().unwrap();
    let file = FileSubmissionStore::new(temp_dir.path().join("submissions.json"));
    let sql = SqlSubmissionStore::in_memory().await.unwrap();

    let school = Submission::new("ÉCOLE", r#"{"ville":"Zürich"}"#);
    file.add(school.clone()).await.unwrap();
    sql.add(school.clone()).await.unwrap();

    let cancel = CancellationToken::new();
    for query in [
        SubmissionQuery::new().form_type("école"),
        SubmissionQuery::new().search("ZÜRICH"),
    ] {
        assert_eq!(file.query(&query, &cancel).await.unwrap(), vec![school.clone()]);
        assert_eq!(sql.query(&query, &cancel).await.unwrap(), vec![school.clone()]);
    }
}

async fn dataset_from(store: &FileSubmissionStore) -> Vec<Submission> {
    store.get_all().await.unwrap()
}
