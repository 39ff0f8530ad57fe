use chrono::NaiveDate;
use habit_sync::prelude::*;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
const HABIT: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

fn owner() -> Uuid {
    Uuid::parse_str(OWNER).unwrap()
}

fn session() -> Session {
    Session::new("user-jwt", owner(), 3600)
}

fn tracker(server: &MockServer) -> Tracker {
    let config = TrackerConfig::new(&server.uri(), "anon-key").unwrap();
    Tracker::new(config).unwrap()
}

fn filter_owner() -> String {
    format!("eq.{}", OWNER)
}

fn completion_row(date: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "habit_id": HABIT,
        "user_id": OWNER,
        "date": date,
        "created_at": format!("{}T20:00:00+00:00", date)
    })
}

async fn mount_table(server: &MockServer, table: &str, order: &str, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("user_id", filter_owner()))
        .and(query_param("order", order))
        .and(header("Authorization", "Bearer user-jwt"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_load_joins_completions_onto_habits() {
    let server = MockServer::start().await;

    mount_table(
        &server,
        "habits",
        "created_at.asc",
        json!([{
            "id": HABIT,
            "user_id": OWNER,
            "name": "Read",
            "color": "#3b82f6",
            "created_at": "2024-05-01T07:00:00+00:00"
        }]),
    )
    .await;
    mount_table(
        &server,
        "habit_completions",
        "date.asc",
        json!([completion_row("2024-05-02"), completion_row("2024-05-03")]),
    )
    .await;
    mount_table(
        &server,
        "sleep_entries",
        "date.asc",
        json!([{
            "id": Uuid::new_v4(),
            "user_id": OWNER,
            "date": "2024-05-03",
            "hours": 7.5,
            "created_at": "2024-05-03T08:00:00+00:00"
        }]),
    )
    .await;
    mount_table(&server, "tasks", "date.asc", json!([])).await;
    mount_table(&server, "notes", "created_at.desc", json!([])).await;

    let tracker = tracker(&server);
    let mut sync = tracker.sync(Some(session()));
    sync.load().await.unwrap();

    assert_eq!(sync.habits().len(), 1);
    let habit = &sync.habits()[0];
    assert_eq!(habit.name, "Read");
    assert_eq!(habit.completed_days.len(), 2);
    assert!(habit.is_completed_on(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()));
    assert_eq!(sync.sleep_entries()[0].hours, 7.5);
}

#[tokio::test]
async fn test_load_without_owner_makes_no_requests() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let mut sync = tracker.sync(None);
    sync.load().await.unwrap();
    sync.add_habit("Read", "#000").await.unwrap();

    assert!(sync.state().is_empty());
}

#[tokio::test]
async fn test_load_failure_surfaces_notice() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "PGRST301",
            "message": "JWT expired",
            "details": null,
            "hint": null
        })))
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let mut sync = tracker.sync(Some(session()));
    let err = sync.load().await.unwrap_err();

    assert_eq!(err.code(), Some("PGRST301"));
    assert!(sync.state().is_empty());
    assert!(sync.take_notices()[0].is_error());
}

#[tokio::test]
async fn test_insert_habit_sends_owner() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/habits"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(json!({ "user_id": OWNER, "name": "Run", "color": "#10b981" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": HABIT,
            "user_id": OWNER,
            "name": "Run",
            "color": "#10b981",
            "created_at": "2024-05-01T07:00:00+00:00"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let store = tracker(&server).store();
    let row = store
        .insert_habit(
            &session(),
            &NewHabit {
                user_id: owner(),
                name: "Run".into(),
                color: "#10b981".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(row.id.to_string(), HABIT);
}

#[tokio::test]
async fn test_update_is_scoped_to_id_and_owner() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/habits"))
        .and(query_param("id", format!("eq.{}", HABIT)))
        .and(query_param("user_id", filter_owner()))
        .and(body_json(json!({ "name": "Read more" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = tracker(&server).store();
    let patch = HabitPatch {
        name: Some("Read more".into()),
        color: None,
    };
    let result = store
        .update_habit(&session(), Uuid::parse_str(HABIT).unwrap(), &patch)
        .await;

    // an empty representation means no row matched (id, owner)
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_delete_completion_filters_pair() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/habit_completions"))
        .and(query_param("habit_id", format!("eq.{}", HABIT)))
        .and(query_param("date", "eq.2024-05-02"))
        .and(query_param("user_id", filter_owner()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = tracker(&server).store();
    store
        .delete_completion(
            &session(),
            Uuid::parse_str(HABIT).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sleep_upsert_merges_on_owner_and_date() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sleep_entries"))
        .and(query_param("on_conflict", "user_id,date"))
        .and(body_json(json!({ "user_id": OWNER, "date": "2024-05-04", "hours": 6.5 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "user_id": OWNER,
            "date": "2024-05-04",
            "hours": 6.5,
            "created_at": "2024-05-04T08:00:00+00:00"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let mut sync = tracker.sync(Some(session()));
    sync.add_sleep_entry(NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(), 6.5)
        .await
        .unwrap();
    assert_eq!(sync.sleep_entries().len(), 1);
}

#[tokio::test]
async fn test_rejected_write_leaves_mirror_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notes"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy for table \"notes\"",
            "details": null,
            "hint": null
        })))
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let mut sync = tracker.sync(Some(session()));
    let err = sync
        .add_note("hello", NaiveDate::from_ymd_opt(2024, 5, 4).unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some("42501"));
    assert!(sync.notes().is_empty());
    let notices = sync.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}
