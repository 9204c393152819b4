//! To-do item round trips against a real PostgreSQL container.
//!
//! Run with `cargo test -- --ignored` on a machine with a Docker daemon.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use todo_api::harness::{HarnessError, Scenario};
use todo_api::models::TodoItem;

use common::{TODO_ITEMS, harness, item_path};

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_posted_item_is_retrievable_by_id() -> Result<()> {
    let mut harness = harness();

    let item = harness
        .run(|env| async move {
            env.run_scenario(
                &Scenario::post(
                    TODO_ITEMS,
                    json!({"id": 1, "name": "TestName", "isComplete": false}),
                )
                .expect(StatusCode::CREATED),
            )
            .await?;

            env.get_json::<TodoItem>(&item_path(1)).await
        })
        .await?;

    assert_eq!(item.id, 1);
    assert_eq!(item.name.as_deref(), Some("TestName"));
    assert!(!item.is_complete);
    assert_eq!(harness.teardown_count(), 1);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_create_returns_location_of_new_item() -> Result<()> {
    let mut harness = harness();

    harness
        .run(|env| async move {
            let created = env
                .run_scenario(
                    &Scenario::post(TODO_ITEMS, json!({"name": "walk dog", "isComplete": true}))
                        .expect(StatusCode::CREATED),
                )
                .await?;
            let item: TodoItem = created.json()?;

            assert!(item.id > 0);
            assert_eq!(created.location(), Some(item_path(item.id).as_str()));
            Ok(())
        })
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_generated_ids_do_not_collide_with_explicit_ids() -> Result<()> {
    let mut harness = harness();

    let items = harness
        .run(|env| async move {
            env.run_scenario(
                &Scenario::post(TODO_ITEMS, json!({"id": 5, "name": "explicit"}))
                    .expect(StatusCode::CREATED),
            )
            .await?;
            let generated: TodoItem = env
                .run_scenario(
                    &Scenario::post(TODO_ITEMS, json!({"name": "generated"}))
                        .expect(StatusCode::CREATED),
                )
                .await?
                .json()?;
            assert!(generated.id > 5, "generated id {} collides", generated.id);

            env.get_json::<Vec<TodoItem>>(TODO_ITEMS).await
        })
        .await?;

    assert_eq!(items.len(), 2);
    assert!(items.windows(2).all(|pair| pair[0].id < pair[1].id));
    Ok(())
}

fn direct(e: sqlx::Error) -> HarnessError {
    HarnessError::Request(format!("direct query failed: {}", e))
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_smaller_explicit_id_does_not_rewind_sequence() -> Result<()> {
    let mut harness = harness();

    let generated = harness
        .run(|env| async move {
            // Another writer holds an uncommitted row with a larger id and
            // has already advanced the sequence past it.
            let mut other = env.app().pool().begin().await.map_err(direct)?;
            sqlx::query("INSERT INTO todo_items (id, name) VALUES (100, 'pending')")
                .execute(&mut *other)
                .await
                .map_err(direct)?;
            sqlx::query("SELECT setval(pg_get_serial_sequence('todo_items', 'id'), 100)")
                .execute(&mut *other)
                .await
                .map_err(direct)?;

            env.run_scenario(
                &Scenario::post(TODO_ITEMS, json!({"id": 50, "name": "smaller"}))
                    .expect(StatusCode::CREATED),
            )
            .await?;
            other.commit().await.map_err(direct)?;

            env.run_scenario(
                &Scenario::post(TODO_ITEMS, json!({"name": "generated"}))
                    .expect(StatusCode::CREATED),
            )
            .await?
            .json::<TodoItem>()
        })
        .await?;

    assert_eq!(generated.id, 101);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_concurrent_explicit_ids_leave_room_for_generated_ones() -> Result<()> {
    let mut harness = harness();

    let items = harness
        .run(|env| async move {
            let explicit = |id: i64| {
                Scenario::post(TODO_ITEMS, json!({"id": id, "name": format!("explicit {id}")}))
                    .expect(StatusCode::CREATED)
            };
            let (high, low) = (explicit(40), explicit(20));
            let (a, b) = tokio::join!(env.run_scenario(&high), env.run_scenario(&low));
            a?;
            b?;

            for n in 0..45 {
                env.run_scenario(
                    &Scenario::post(TODO_ITEMS, json!({"name": format!("generated {n}")}))
                        .expect(StatusCode::CREATED),
                )
                .await?;
            }
            env.get_json::<Vec<TodoItem>>(TODO_ITEMS).await
        })
        .await?;

    assert_eq!(items.len(), 47);
    assert_eq!(items.iter().filter(|item| item.id <= 40).count(), 2);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_unknown_and_duplicate_ids() -> Result<()> {
    let mut harness = harness();

    harness
        .run(|env| async move {
            env.run_scenario(&Scenario::get(item_path(42)).expect(StatusCode::NOT_FOUND))
                .await?;

            let body = json!({"id": 7, "name": "first"});
            env.run_scenario(
                &Scenario::post(TODO_ITEMS, body.clone()).expect(StatusCode::CREATED),
            )
            .await?;
            let conflict = env
                .run_scenario(&Scenario::post(TODO_ITEMS, body).expect(StatusCode::CONFLICT))
                .await?;
            assert_eq!(conflict.body["error"]["code"], "RES_4002");

            let stored: TodoItem = env.get_json(&item_path(7)).await?;
            assert_eq!(stored.name.as_deref(), Some("first"));
            Ok(())
        })
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_update_and_delete() -> Result<()> {
    let mut harness = harness();

    harness
        .run(|env| async move {
            env.run_scenario(
                &Scenario::post(TODO_ITEMS, json!({"id": 3, "name": "draft"}))
                    .expect(StatusCode::CREATED),
            )
            .await?;

            env.run_scenario(
                &Scenario::put(item_path(3), json!({"id": 4, "name": "wrong"}))
                    .expect(StatusCode::BAD_REQUEST),
            )
            .await?;
            env.run_scenario(
                &Scenario::put(item_path(99), json!({"name": "ghost"}))
                    .expect(StatusCode::NOT_FOUND),
            )
            .await?;
            env.run_scenario(
                &Scenario::put(item_path(3), json!({"id": 3, "name": "final", "isComplete": true}))
                    .expect(StatusCode::NO_CONTENT),
            )
            .await?;

            let updated: TodoItem = env.get_json(&item_path(3)).await?;
            assert_eq!(updated.name.as_deref(), Some("final"));
            assert!(updated.is_complete);

            env.run_scenario(&Scenario::delete(item_path(3)).expect(StatusCode::NO_CONTENT))
                .await?;
            env.run_scenario(&Scenario::delete(item_path(3)).expect(StatusCode::NOT_FOUND))
                .await?;
            env.run_scenario(&Scenario::get(item_path(3)).expect(StatusCode::NOT_FOUND))
                .await?;
            Ok(())
        })
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_concurrent_lifecycles_are_isolated() -> Result<()> {
    let mut first = harness();
    let mut second = harness();

    let lifecycle = |name: &'static str| {
        move |env: todo_api::harness::TestEnvironment| async move {
            env.run_scenario(
                &Scenario::post(TODO_ITEMS, json!({"id": 1, "name": name}))
                    .expect(StatusCode::CREATED),
            )
            .await?;
            let items: Vec<TodoItem> = env.get_json(TODO_ITEMS).await?;
            Ok((env.descriptor().port, items))
        }
    };

    let (a, b) = tokio::join!(first.run(lifecycle("first")), second.run(lifecycle("second")));
    let ((port_a, items_a), (port_b, items_b)) = (a?, b?);

    assert_ne!(port_a, port_b);
    assert_eq!(items_a.len(), 1);
    assert_eq!(items_b.len(), 1);
    assert_eq!(items_a[0].name.as_deref(), Some("first"));
    assert_eq!(items_b[0].name.as_deref(), Some("second"));
    Ok(())
}
