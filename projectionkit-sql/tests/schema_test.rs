mod common;

use common::{repository, sqlite_pool};
use projectionkit::{Operation, ResourceRepository, Version};
use projectionkit_sql::{create_schema, driver, drop_schema, Options};

#[tokio::test]
async fn create_and_drop_are_idempotent() {
    let pool = sqlite_pool().await;
    let options = Options::default();

    create_schema(&pool, &options).await.expect("first create");
    create_schema(&pool, &options).await.expect("second create");
    drop_schema(&pool, &options).await.expect("first drop");
    drop_schema(&pool, &options).await.expect("second drop");
}

#[tokio::test]
async fn schema_created_on_first_use_survives_concurrent_callers() {
    let repository = repository(sqlite_pool().await);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let repository = repository.clone();
            tokio::spawn(async move {
                repository
                    .store_resource_version(format!("R{i}").as_bytes(), &Version::from("V1"))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("task should not panic").expect("store");
    }
}

#[tokio::test]
async fn repository_without_schema_reports_the_failing_operation() {
    let pool = sqlite_pool().await;
    let repository = projectionkit_sql::SqlRepository::new(
        pool,
        common::unique_key(),
        &Options::default(),
    );

    let error = repository
        .resource_version(b"R")
        .await
        .expect_err("table does not exist");

    assert_eq!(error.operation(), Operation::ResourceVersion);
}

#[tokio::test]
async fn database_matching_no_candidate_is_named_in_the_error() {
    let pool = sqlite_pool().await;
    let options = Options::default().with_candidate_drivers(vec![driver::postgres()]);

    let error = create_schema(&pool, &options)
        .await
        .expect_err("sqlite is not postgres");

    assert_eq!(error.operation(), Operation::Probe);
    let diagnostic = error.backend_error().to_string();
    assert!(diagnostic.contains("sqlite"), "{diagnostic}");
    assert!(diagnostic.contains("postgres rejected it"), "{diagnostic}");
}

#[tokio::test]
async fn default_candidates_select_sqlite() {
    let repository = repository(sqlite_pool().await);

    let driver = repository.driver().await.expect("resolves");

    assert_eq!(projectionkit::Candidate::name(driver.as_ref()), "sqlite");
}
