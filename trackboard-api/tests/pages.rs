mod common;

use axum::http::{StatusCode, header};
use common::{TRACK_FORM, TestApp, body_json, body_string, location};
use serde_json::{Map, Value, json};
use trackboard_common::model::{
    Id,
    event::{CreateEvent, PostKind},
    user::UserMarker,
};
use trackboard_db::repository::Repository;

#[tokio::test]
async fn open_page_on_an_empty_board() {
    let app = TestApp::new().await;

    let response = app.get("/open", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["error"], Value::Null);
    assert_eq!(json["user"], Value::Null);
    assert_eq!(json["page"]["tracks"], 0);
    assert_eq!(json["page"]["total_duration_ms"], 0);
    assert_eq!(json["page"]["uploads_by_weekday"], json!([0, 0, 0, 0, 0, 0, 0]));
    assert_eq!(json["page"]["track_drafts"], 0);
    assert_eq!(json["page"]["users"], 3);
    assert_eq!(json["page"]["last_activities"], json!([]));

    let events = app.store.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, PostKind::ViewOpen);
}

#[tokio::test]
async fn open_page_feed_skips_views_and_anonymous_events() {
    let app = TestApp::new().await;
    let cookie = app.cookie(app.owner.id);
    let created = app.post_form("/new", Some(&cookie), TRACK_FORM).await;
    app.get(location(&created), None).await;
    app.get("/", None).await;
    for actor_id in [Some(app.owner.id), None] {
        app.store
            .create_event(&CreateEvent {
                kind: PostKind::Login,
                actor_id,
                target_user_id: None,
                target_post_id: None,
            })
            .await
            .unwrap();
    }

    let json = body_json(app.get("/open", Some(&cookie)).await).await;

    assert_eq!(json["page"]["tracks"], 1);
    assert_eq!(json["page"]["total_duration_ms"], 180_000);
    // 2025-05-29 was a Thursday.
    assert_eq!(json["page"]["uploads_by_weekday"], json!([0, 0, 0, 0, 1, 0, 0]));
    let activities = json["page"]["last_activities"].as_array().unwrap();
    assert_eq!(activities.len(), 2);
    assert!(activities.iter().any(|activity| activity["type"] == "track"
        && activity["title"] == "Foo"));
    assert!(activities.iter().any(|activity| activity["type"] == "event"
        && activity["kind"] == "login"
        && activity["actor_id"] == json!(app.owner.id)
        && activity["actor"]["slug"] == "owner"
        && activity["target_user"].is_null()));
    assert!(activities.iter().all(|activity| {
        !activity["kind"].as_str().is_some_and(|kind| kind.starts_with("view_"))
    }));
}

#[tokio::test]
async fn drafts_stay_off_the_home_page() {
    let app = TestApp::new().await;
    let cookie = app.cookie(app.owner.id);
    app.post_form("/new", Some(&cookie), TRACK_FORM).await;
    app.post_form("/new", Some(&cookie), &format!("{TRACK_FORM}&submit=draft"))
        .await;

    let json = body_json(app.get("/", None).await).await;
    assert_eq!(json["page"]["last_tracks"].as_array().unwrap().len(), 1);
    assert_eq!(json["page"]["last_users"].as_array().unwrap().len(), 3);

    let json = body_json(app.get("/open", None).await).await;
    assert_eq!(json["page"]["tracks"], 1);
    assert_eq!(json["page"]["track_drafts"], 1);
}

#[tokio::test]
async fn rss_lists_public_tracks_as_xml() {
    let app = TestApp::new().await;
    app.post_form("/new", Some(&app.cookie(app.owner.id)), TRACK_FORM)
        .await;

    let response = app.get("/rss", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.contains("xml"));
    let feed = body_string(response).await;
    assert!(feed.contains("<rss version=\"2.0\">"));
    assert!(feed.contains("<title>Foo</title>"));
    assert!(app.store.events().await.is_empty());
}

#[tokio::test]
async fn session_identity() {
    let app = TestApp::new().await;

    let json = body_json(app.get("/", Some(&app.cookie(app.admin.id))).await).await;
    assert_eq!(json["user"]["slug"], "admin");
    assert_eq!(json["user_id"], json!(app.admin.id));
    assert_eq!(json["is_admin"], true);

    let json = body_json(app.get("/", Some(&app.cookie(app.owner.id))).await).await;
    assert_eq!(json["user"]["slug"], "owner");
    assert_eq!(json["is_admin"], false);

    let response = app.get("/", Some("session_token=not-a-token")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["status"], 422);
}

#[tokio::test]
async fn unknown_session_user_is_degraded_not_rejected() {
    let app = TestApp::new().await;
    let missing: Id<UserMarker> = Id::from(123_456_789_u64);

    let response = app.get("/", Some(&app.cookie(missing))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"], Value::Null);
    assert_eq!(json["user_id"], json!(missing));
}

#[tokio::test]
async fn unknown_profiles_are_not_found_and_not_recorded() {
    let app = TestApp::new().await;

    let response = app.get("/u/nobody", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        "User nobody was not found."
    );
    assert!(app.store.events().await.is_empty());
}

#[tokio::test]
async fn profile_counts_public_tracks() {
    let app = TestApp::new().await;
    let cookie = app.cookie(app.owner.id);
    app.post_form("/new", Some(&cookie), TRACK_FORM).await;
    app.post_form("/new", Some(&cookie), TRACK_FORM).await;
    app.post_form("/new", Some(&cookie), &format!("{TRACK_FORM}&submit=draft"))
        .await;

    let response = app.get("/u/owner", Some(&app.cookie(app.stranger.id))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["page"]["user"]["slug"], "owner");
    assert_eq!(json["page"]["tracks"], 2);
    assert_eq!(json["page"]["last_tracks"].as_array().unwrap().len(), 2);
    let day = time::macros::utc_datetime!(2025-05-29 00:00).unix_timestamp();
    let mut heatmap = Map::new();
    heatmap.insert(day.to_string(), json!(2));
    assert_eq!(json["page"]["calendar_heatmap"], Value::Object(heatmap));

    let events = app.store.events().await;
    let view = events
        .iter()
        .find(|event| event.kind == PostKind::ViewProfile)
        .unwrap();
    assert_eq!(view.actor_id, Some(app.stranger.id));
    assert_eq!(view.target_user_id, Some(app.owner.id));
}

#[tokio::test]
async fn empty_profile_has_no_heatmap() {
    let app = TestApp::new().await;

    let json = body_json(app.get("/u/stranger", None).await).await;

    assert_eq!(json["page"]["tracks"], 0);
    assert_eq!(json["page"]["last_tracks"], json!([]));
    assert_eq!(json["page"]["calendar_heatmap"], json!({}));
}

#[tokio::test]
async fn settings_update_own_names() {
    let app = TestApp::new().await;
    let cookie = app.cookie(app.owner.id);

    let response = app
        .post_form("/settings", Some(&cookie), "firstname=+Ada+&lastname=Lovelace")
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/settings");
    let user = app.store.fetch_user(app.owner.id).await.unwrap().unwrap();
    assert_eq!(user.firstname, "Ada");
    assert_eq!(user.lastname, "Lovelace");

    let json = body_json(app.get("/settings", Some(&cookie)).await).await;
    assert_eq!(json["page"]["names"]["firstname"], "Ada");
}

#[tokio::test]
async fn settings_require_a_session() {
    let app = TestApp::new().await;

    let response = app.get("/settings", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let response = app
        .post_form("/settings", None, "firstname=Eve&lastname=Mallory")
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let user = app.store.fetch_user(app.owner.id).await.unwrap().unwrap();
    assert_eq!(user.firstname, "");
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let app = TestApp::new().await;

    assert_eq!(app.get("/ping", None).await.status(), StatusCode::OK);

    let response = app.get("/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["uptime_seconds"].is_u64());

    let response = app.get("/nope", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["status"], 404);
}
