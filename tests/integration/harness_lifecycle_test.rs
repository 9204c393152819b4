//! Container lifecycle against a real Docker daemon.

mod common;

use std::time::Duration;

use anyhow::Result;
use sqlx::{Connection, PgConnection};
use todo_api::harness::{HarnessConfig, HarnessError, LifecycleState, acquire};

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_acquire_then_release_leaves_nothing_behind() -> Result<()> {
    common::init_tracing();
    let config = HarnessConfig::from_env()?;

    let mut handle = acquire(&config).await?;
    let options = handle.descriptor().connect_options();

    // Ready means ready: the first connection must succeed.
    let mut conn = PgConnection::connect_with(&options).await?;
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&mut conn).await?;
    assert_eq!(one, 1);
    conn.close().await?;

    handle.release().await?;
    handle.release().await?;
    assert!(handle.is_released());

    let after =
        tokio::time::timeout(Duration::from_secs(5), PgConnection::connect_with(&options)).await;
    assert!(!matches!(after, Ok(Ok(_))), "database still reachable after release");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_connection_string_reaches_database() -> Result<()> {
    common::init_tracing();
    let config = HarnessConfig::from_env()?.with_credentials("app_user", "p@ss:w%rd/1");

    let mut handle = acquire(&config).await?;
    let url = handle.descriptor().connection_string()?;
    let result = PgConnection::connect(&url).await;
    handle.release().await?;

    result?.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_unknown_image_fails_provisioning() -> Result<()> {
    let mut harness = common::harness();
    let mut harness_with_bad_image = todo_api::harness::Harness::new(
        harness.config().clone().with_image("postgres", "no-such-tag-for-tests"),
    );

    let err = harness_with_bad_image
        .run(|_env| async { Ok(()) })
        .await
        .unwrap_err();

    assert!(matches!(err.primary, HarnessError::Provisioning(_)));
    assert_eq!(harness_with_bad_image.state(), LifecycleState::Disposed);
    assert_eq!(harness_with_bad_image.teardown_count(), 1);

    // The untouched harness is still usable.
    assert_eq!(harness.state(), LifecycleState::Idle);
    harness.run(|_env| async { Ok(()) }).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_cancelled_lifecycle_removes_container() -> Result<()> {
    let mut harness = common::harness();
    let (tx, rx) = tokio::sync::oneshot::channel();

    let cancelled = tokio::time::timeout(
        Duration::from_secs(120),
        harness.run(|env| async move {
            let _ = tx.send(env.descriptor().connect_options());
            futures::future::pending::<todo_api::harness::Result<()>>().await
        }),
    );
    // Give up on the lifecycle as soon as the scenario has started.
    let options = tokio::select! {
        _ = cancelled => anyhow::bail!("lifecycle ended on its own"),
        options = rx => options?,
    };

    assert_eq!(harness.state(), LifecycleState::Disposed);
    assert_eq!(harness.teardown_count(), 1);

    let gone = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match PgConnection::connect_with(&options).await {
                Ok(conn) => {
                    let _ = conn.close().await;
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(_) => break,
            }
        }
    })
    .await;
    assert!(gone.is_ok(), "database still reachable after cancellation");
    Ok(())
}
