//! Converging a desired set of logins.

use pgadmin_provisioner::pgadmin::SyncReport;

use crate::common::fixtures::DesiredUserBuilder;
use crate::{SETUP_EMAIL, SqliteExecutor, runner};

#[tokio::test]
async fn test_sync_creates_users_and_servers() {
    let mut runner = runner(SqliteExecutor::new());
    let users = vec![
        DesiredUserBuilder::new("rhino")
            .server("hippo", "hippo-primary")
            .build(),
        DesiredUserBuilder::new("zebra").build(),
    ];

    let report = runner.sync_users(&users, false).await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            ensured: vec!["rhino".to_string(), "zebra".to_string()],
            deleted: Vec::new(),
        }
    );
    let executor = runner.executor();
    assert_eq!(executor.scalar("SELECT count(*) FROM user"), "3");
    assert_eq!(executor.scalar("SELECT count(*) FROM server"), "1");
}

#[tokio::test]
async fn test_sync_prune_removes_stale_users() {
    let mut runner = runner(SqliteExecutor::new());
    runner.ensure_login("stale", "pw").await.unwrap();

    let users = vec![DesiredUserBuilder::new("rhino").build()];
    let report = runner.sync_users(&users, true).await.unwrap();

    assert_eq!(report.deleted, vec!["stale".to_string()]);
    let mut emails: Vec<String> = runner
        .executor()
        .rows("SELECT email FROM user ORDER BY email")
        .into_iter()
        .map(|row| row[0].clone())
        .collect();
    emails.sort();
    assert_eq!(emails, vec![SETUP_EMAIL.to_string(), "rhino".to_string()]);
}

#[tokio::test]
async fn test_sync_prune_never_removes_setup_user() {
    let mut runner = runner(SqliteExecutor::new());
    let report = runner.sync_users(&[], true).await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(
        runner.executor().scalar("SELECT email FROM user WHERE id = 1"),
        SETUP_EMAIL
    );
}

#[tokio::test]
async fn test_sync_without_prune_keeps_stale_users() {
    let mut runner = runner(SqliteExecutor::new());
    runner.ensure_login("stale", "pw").await.unwrap();

    let report = runner
        .sync_users(&[DesiredUserBuilder::new("rhino").build()], false)
        .await
        .unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(
        runner
            .executor()
            .scalar("SELECT count(*) FROM user WHERE email = 'stale'"),
        "1"
    );
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let mut runner = runner(SqliteExecutor::new());
    let users = vec![
        DesiredUserBuilder::new("rhino")
            .password("hunter2")
            .server("hippo", "hippo-primary")
            .build(),
    ];

    runner.sync_users(&users, true).await.unwrap();
    let report = runner.sync_users(&users, true).await.unwrap();

    assert!(report.deleted.is_empty());
    let executor = runner.executor();
    assert_eq!(executor.scalar("SELECT count(*) FROM user"), "2");
    assert_eq!(executor.scalar("SELECT count(*) FROM server"), "1");
    assert_eq!(executor.scalar("SELECT count(*) FROM roles_users"), "2");
}

#[tokio::test]
async fn test_sync_failure_is_retryable() {
    let mut runner = runner(SqliteExecutor::never_initialized());
    let err = runner
        .sync_users(&[DesiredUserBuilder::new("rhino").build()], false)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.requeue_after(), std::time::Duration::from_secs(30));
}

#[tokio::test]
async fn test_sync_prune_keeps_administrators() {
    let executor = SqliteExecutor::new();
    executor.execute(
        "INSERT INTO user (id, username, email, password, active, fs_uniquifier) \
         VALUES (7, 'ops@example.com', 'ops@example.com', 'x', 1, 'u7'); \
         INSERT INTO roles_users (user_id, role_id) VALUES (7, 1);",
    );
    let mut runner = runner(executor);
    runner.ensure_login("stale", "pw").await.unwrap();

    let report = runner.sync_users(&[], true).await.unwrap();

    assert_eq!(report.deleted, vec!["stale".to_string()]);
    assert_eq!(
        runner
            .executor()
            .scalar("SELECT count(*) FROM user WHERE email = 'ops@example.com'"),
        "1"
    );
    assert!(
        runner
            .list_active_users()
            .await
            .unwrap()
            .contains(&"ops@example.com".to_string())
    );
}
