//! Integration tests for the adaptation REST API.
//!
//! Each test spins up an Axum server on a random port over an in-memory
//! libSQL database and a pinned calendar, then drives it with reqwest.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use adapt_planner::adaptation::{
    AdaptationRouteState, AdaptationService, FixedClock, adaptation_routes,
};
use adapt_planner::program::ProgramDefinition;
use adapt_planner::store::{AdaptationStore, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const PROGRAM: &str = r#"{
    "days": [
        {
            "day": 1,
            "tasks": ["Meet your buddy"],
            "planner": [{"time": "10:00", "task": "Welcome meeting", "contact": "HR"}]
        },
        {
            "day": 2,
            "tasks": ["Set up accounts"],
            "planner": [
                {"time_slot": "09:30", "description": "Security briefing"},
                {"time_slot": "14:00", "description": "Team lunch"}
            ]
        },
        {
            "day": 3,
            "tasks": ["Read the handbook", "Pick a starter ticket"],
            "planner": [
                {"time_slot": "09:00", "description": "Stand-up"},
                {"time_slot": "11:00", "description": "Codebase tour", "contact": "@lead"},
                {"time_slot": "16:00", "description": "Retro with mentor"}
            ]
        }
    ]
}"#;

/// Monday 2 September 2024.
fn start_date() -> &'static str {
    "02.09.2024"
}

/// Wednesday of the first week: adaptation day 3 without skips.
fn wednesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 4).unwrap()
}

/// Start an Axum server on a random port with "today" pinned, return the base URL.
async fn start_server(today: NaiveDate) -> String {
    let store: Arc<dyn AdaptationStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    ProgramDefinition::from_json(PROGRAM)
        .unwrap()
        .import(store.as_ref())
        .await
        .unwrap();

    let service = AdaptationService::new(store, Arc::new(FixedClock(today)));
    let app = adaptation_routes(AdaptationRouteState {
        service: Arc::new(service),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn provision(base: &str, user: &str, body: Value) {
    let resp = reqwest::Client::new()
        .put(format!("{base}/api/users/{user}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

async fn get_json(url: String) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn post_json(url: String) -> (u16, Value) {
    let resp = reqwest::Client::new().post(url).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

fn indices(entries: &Value) -> Vec<u64> {
    entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["display_index"].as_u64().unwrap())
        .collect()
}

fn statuses(entries: &Value) -> Vec<String> {
    entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["status"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;

        let (status, body) = get_json(format!("{base}/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_user_gets_404_everywhere() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;

        for path in ["day", "tasks", "planner"] {
            let (status, body) = get_json(format!("{base}/api/users/ghost/{path}")).await;
            assert_eq!(status, 404, "GET {path}");
            assert_eq!(body["error"], "user_not_found");
        }

        let (status, _) = post_json(format!("{base}/api/users/ghost/skip")).await;
        assert_eq!(status, 404);
        let (status, _) =
            post_json(format!("{base}/api/users/ghost/planner/3/items/1/complete")).await;
        assert_eq!(status, 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn resolves_day_and_main_tasks() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "42", json!({"name": "Anna", "start_date": start_date()})).await;

        let (status, body) = get_json(format!("{base}/api/users/42/day")).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "day", "day": 3}));

        let (status, body) = get_json(format!("{base}/api/users/42/tasks")).await;
        assert_eq!(status, 200);
        assert_eq!(body["day"], 3);
        assert_eq!(
            body["content"],
            json!(["Read the handbook", "Pick a starter ticket"])
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn weekend_is_not_applicable() {
    timeout(TEST_TIMEOUT, async {
        let sunday = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let base = start_server(sunday).await;
        provision(&base, "42", json!({"start_date": start_date()})).await;

        let (status, body) = get_json(format!("{base}/api/users/42/day")).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "not_applicable", "reason": "weekend_today"}));

        let (_, body) = get_json(format!("{base}/api/users/42/planner")).await;
        assert_eq!(body["reason"], "weekend_today");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_start_date_blocks_resolution_and_skips() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "42", json!({"name": "Boris"})).await;

        let (status, body) = get_json(format!("{base}/api/users/42/day")).await;
        assert_eq!(status, 200);
        assert_eq!(body["reason"], "no_start_date");

        let (status, body) = post_json(format!("{base}/api/users/42/skip")).await;
        assert_eq!(status, 409);
        assert_eq!(body["error"], "no_start_date");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn postpone_then_complete_moves_item_between_sections() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "42", json!({"start_date": start_date()})).await;

        let (status, body) = get_json(format!("{base}/api/users/42/planner")).await;
        assert_eq!(status, 200);
        let view = &body["content"];
        assert_eq!(indices(&view["entries"]), vec![1, 2, 3]);
        assert_eq!(statuses(&view["entries"]), vec!["pending"; 3]);
        assert!(view["postponed"].as_array().unwrap().is_empty());

        let (status, view) =
            post_json(format!("{base}/api/users/42/planner/3/items/2/postpone")).await;
        assert_eq!(status, 200);
        assert_eq!(indices(&view["entries"]), vec![1, 3]);
        assert_eq!(indices(&view["postponed"]), vec![2]);
        assert_eq!(view["postponed"][0]["actions"], json!(["complete"]));

        let (status, view) =
            post_json(format!("{base}/api/users/42/planner/3/items/2/complete")).await;
        assert_eq!(status, 200);
        assert_eq!(indices(&view["entries"]), vec![1, 2, 3]);
        assert_eq!(statuses(&view["entries"]), vec!["pending", "completed", "pending"]);
        assert!(view["postponed"].as_array().unwrap().is_empty());

        // Toggling again returns it to pending, not to the postponed section.
        let (_, view) =
            post_json(format!("{base}/api/users/42/planner/3/items/2/complete")).await;
        assert_eq!(statuses(&view["entries"]), vec!["pending"; 3]);
        assert!(view["postponed"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn postponing_completed_item_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "42", json!({"start_date": start_date()})).await;

        post_json(format!("{base}/api/users/42/planner/3/items/1/complete")).await;
        let (status, body) =
            post_json(format!("{base}/api/users/42/planner/3/items/1/postpone")).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "already_completed");

        let (_, body) = get_json(format!("{base}/api/users/42/planner")).await;
        assert_eq!(body["content"]["entries"][0]["status"], "completed");
        assert!(body["content"]["postponed"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn out_of_range_index_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "42", json!({"start_date": start_date()})).await;

        for index in [0, 4] {
            let (status, body) = post_json(format!(
                "{base}/api/users/42/planner/3/items/{index}/complete"
            ))
            .await;
            assert_eq!(status, 500, "index {index}");
            assert_eq!(body["error"], "invalid_item_index");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn concurrent_toggles_on_one_day_are_not_lost() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "42", json!({"start_date": start_date()})).await;

        let handles: Vec<_> = (1..=3)
            .map(|index| {
                let url = format!("{base}/api/users/42/planner/3/items/{index}/complete");
                tokio::spawn(async move { post_json(url).await.0 })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 200);
        }

        let (_, body) = get_json(format!("{base}/api/users/42/planner")).await;
        assert_eq!(statuses(&body["content"]["entries"]), vec!["completed"; 3]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn skip_and_return_shift_the_day() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "42", json!({"start_date": start_date()})).await;

        let (status, body) = post_json(format!("{base}/api/users/42/skip")).await;
        assert_eq!(status, 200);
        assert_eq!(body["skipped_days"], 1);

        let (_, body) = get_json(format!("{base}/api/users/42/day")).await;
        assert_eq!(body["day"], 2);
        let (_, body) = get_json(format!("{base}/api/users/42/planner")).await;
        assert_eq!(body["content"]["entries"].as_array().unwrap().len(), 2);

        // Three working days elapsed: at most three skips.
        post_json(format!("{base}/api/users/42/skip")).await;
        post_json(format!("{base}/api/users/42/skip")).await;
        let (status, body) = post_json(format!("{base}/api/users/42/skip")).await;
        assert_eq!(status, 409);
        assert_eq!(body["error"], "skip_limit_exceeded");

        let (status, body) = post_json(format!("{base}/api/users/42/return")).await;
        assert_eq!(status, 200);
        assert_eq!(body["skipped_days"], 2);

        // Re-provisioning keeps the skip counter.
        provision(&base, "42", json!({"name": "Anna", "start_date": start_date()})).await;
        let (_, body) = get_json(format!("{base}/api/users/42/day")).await;
        assert_eq!(body["day"], 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn progress_overview_lists_each_working_day() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(wednesday()).await;
        provision(&base, "a", json!({"name": "Anna", "start_date": start_date()})).await;
        provision(&base, "b", json!({"name": "Boris", "start_date": "04.09.2024"})).await;
        provision(&base, "c", json!({"name": "No date"})).await;

        post_json(format!("{base}/api/users/a/planner/3/items/1/complete")).await;
        post_json(format!("{base}/api/users/a/planner/3/items/3/complete")).await;
        post_json(format!("{base}/api/users/b/planner/1/items/1/complete")).await;

        let (status, body) = get_json(format!("{base}/api/progress")).await;
        assert_eq!(status, 200);
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);

        assert_eq!(users[0]["label"], "Employee 1");
        assert_eq!(users[0]["user_id"], "a");
        assert_eq!(
            users[0]["points"],
            json!([
                {"day": 1, "completed": 0},
                {"day": 2, "completed": 0},
                {"day": 3, "completed": 2}
            ])
        );

        assert_eq!(users[1]["label"], "Employee 2");
        assert_eq!(users[1]["points"], json!([{"day": 1, "completed": 1}]));
    })
    .await
    .expect("test timed out");
}
