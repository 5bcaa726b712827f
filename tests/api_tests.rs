use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use tunedrop::api::AppState;
use tunedrop::config::Config;

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

async fn spawn_app() -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // A single pooled connection keeps the in-memory database shared.
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.uploads.upload_path = std::env::temp_dir()
        .join(format!("tunedrop-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    let state = tunedrop::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    let app = tunedrop::api::router(state.clone()).await;
    (app, state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Log in and return the session cookie to send back on later requests.
async fn login(app: &Router, username: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(form_request(
            "/login",
            &format!("username={username}&password={password}"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login should set a session cookie")
        .to_str()
        .unwrap();

    set_cookie.split(';').next().unwrap().to_string()
}

fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, data) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(files: &[(&str, &[u8])], cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/upload").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(multipart_body(files))).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(form_request("/login", "username=admin&password=wrong"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(form_request("/login", "username=nobody&password=whatever"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(form_request("/login", "username=&password="))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_session_lifecycle() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/login", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["authenticated"], false);

    let cookie = login(&app, "admin", "admin123").await;

    let response = app
        .clone()
        .oneshot(get_request("/login", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["authenticated"], true);
    assert_eq!(json["data"]["user"]["username"], "admin");
    assert_eq!(json["data"]["user"]["is_admin"], true);

    let response = app
        .clone()
        .oneshot(get_request("/logout", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The flushed session no longer authenticates.
    let response = app
        .clone()
        .oneshot(get_request("/login", Some(&cookie)))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"]["authenticated"], false);

    let response = app
        .clone()
        .oneshot(get_request("/logout", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_panel_requires_admin() {
    let (app, state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/admin/panel", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The /admin signpost is gated exactly like the panel behind it.
    let response = app.clone().oneshot(get_request("/admin", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    state
        .store()
        .create_user("bob", "secret", false)
        .await
        .unwrap();

    let bob_cookie = login(&app, "bob", "secret").await;
    let response = app
        .clone()
        .oneshot(get_request("/admin/panel", Some(&bob_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(get_request("/admin", Some(&bob_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(post_request("/admin", Some(&bob_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin_cookie = login(&app, "admin", "admin123").await;
    let response = app
        .clone()
        .oneshot(get_request("/admin/panel", Some(&admin_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let usernames: Vec<&str> = json["data"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert!(usernames.contains(&"admin"));
    assert!(usernames.contains(&"bob"));
    assert!(json["data"]["link_prefix"].is_string());

    // /admin is just a signpost to the panel.
    let response = app
        .clone()
        .oneshot(get_request("/admin", Some(&admin_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_upload_batch_accepts_and_rejects_per_file() {
    let (app, state) = spawn_app().await;
    let cookie = login(&app, "admin", "admin123").await;

    let response = app
        .clone()
        .oneshot(upload_request(
            &[
                ("Song One.mp3", b"fake mp3 bytes".as_slice()),
                ("notes.txt", b"not audio".as_slice()),
            ],
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let accepted = json["data"]["accepted"].as_array().unwrap();
    let rejected = json["data"]["rejected"].as_array().unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(rejected.len(), 1);

    assert_eq!(accepted[0]["original_name"], "Song One.mp3");
    let stored_name = accepted[0]["stored_name"].as_str().unwrap();
    assert!(stored_name.ends_with(".mp3"));
    assert_eq!(stored_name.len(), 36);

    assert_eq!(rejected[0]["filename"], "notes.txt");

    let upload_path = state.config().read().await.uploads.upload_path.clone();
    assert!(std::path::Path::new(&upload_path).join(stored_name).exists());
}

#[tokio::test]
async fn test_anonymous_upload_has_no_owner() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(upload_request(&[("drive by.mp3", b"x".as_slice())], None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request("/music", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    let tracks = json["data"]["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 1);
    assert!(tracks[0]["user_id"].is_null());
}

#[tokio::test]
async fn test_upload_batch_with_only_rejected_files() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(upload_request(
            &[
                ("notes.txt", b"not audio".as_slice()),
                ("cover.png", b"image".as_slice()),
            ],
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["data"]["accepted"].as_array().unwrap().is_empty());
    assert_eq!(json["data"]["rejected"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get_request("/music", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert!(json["data"]["tracks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(upload_request(&[], None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_music_listing_and_search() {
    let (app, _state) = spawn_app().await;

    for name in ["Alpha.mp3", "Beta.mp3", "Gamma.mp3"] {
        let response = app
            .clone()
            .oneshot(upload_request(&[(name, b"x".as_slice())], None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(get_request("/music", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let tracks = json["data"]["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 3);
    // Newest upload first.
    assert_eq!(tracks[0]["original_name"], "Gamma.mp3");
    assert!(
        tracks[0]["play_url"]
            .as_str()
            .unwrap()
            .contains("/play/")
    );

    let response = app
        .clone()
        .oneshot(get_request("/music?q=beta", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    let tracks = json["data"]["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0]["original_name"], "Beta.mp3");

    let response = app
        .clone()
        .oneshot(get_request("/music?q=zzz", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert!(json["data"]["tracks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_same_name_uploads_get_distinct_stored_names() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(upload_request(
            &[
                ("dupe.mp3", b"one".as_slice()),
                ("dupe.mp3", b"two".as_slice()),
            ],
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let accepted = json["data"]["accepted"].as_array().unwrap();
    assert_eq!(accepted.len(), 2);
    assert_ne!(accepted[0]["stored_name"], accepted[1]["stored_name"]);
}

#[tokio::test]
async fn test_play_streams_file_contents() {
    let (app, _state) = spawn_app().await;

    let payload = b"ID3 pretend-audio-bytes";
    let response = app
        .clone()
        .oneshot(upload_request(&[("tune.mp3", payload.as_slice())], None))
        .await
        .unwrap();
    let json = body_json(response).await;
    let stored_name = json["data"]["accepted"][0]["stored_name"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(get_request(&format!("/play/{stored_name}"), None))
        .await
        .unwrap();
    // Responses are always ranged so browsers can seek.
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], payload.as_slice());

    let response = app
        .clone()
        .oneshot(get_request("/play/doesnotexist.mp3", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_track_authorization() {
    let (app, state) = spawn_app().await;

    state
        .store()
        .create_user("bob", "secret", false)
        .await
        .unwrap();
    let bob_cookie = login(&app, "bob", "secret").await;
    let admin_cookie = login(&app, "admin", "admin123").await;

    // Admin owns this track.
    let response = app
        .clone()
        .oneshot(upload_request(
            &[("admins.mp3", b"x".as_slice())],
            Some(&admin_cookie),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    let admin_track_id = json["data"]["accepted"][0]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(post_request(&format!("/delete/{admin_track_id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(post_request(
            &format!("/delete/{admin_track_id}"),
            Some(&bob_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Bob may delete his own upload.
    let response = app
        .clone()
        .oneshot(upload_request(
            &[("bobs.mp3", b"y".as_slice())],
            Some(&bob_cookie),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    let bob_track_id = json["data"]["accepted"][0]["id"].as_i64().unwrap();
    let bob_stored = json["data"]["accepted"][0]["stored_name"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post_request(
            &format!("/delete/{bob_track_id}"),
            Some(&bob_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/play/{bob_stored}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Admin may delete anything.
    let response = app
        .clone()
        .oneshot(post_request(
            &format!("/delete/{admin_track_id}"),
            Some(&admin_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_request("/delete/9999", Some(&admin_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_user_removes_their_tracks() {
    let (app, state) = spawn_app().await;

    let bob = state
        .store()
        .create_user("bob", "secret", false)
        .await
        .unwrap();
    let bob_cookie = login(&app, "bob", "secret").await;
    let admin_cookie = login(&app, "admin", "admin123").await;

    let response = app
        .clone()
        .oneshot(upload_request(
            &[
                ("one.mp3", b"1".as_slice()),
                ("two.mp3", b"2".as_slice()),
            ],
            Some(&bob_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_request(
            &format!("/admin/delete-user/{}", bob.id),
            Some(&bob_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(post_request(
            &format!("/admin/delete-user/{}", bob.id),
            Some(&admin_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request("/music", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert!(json["data"]["tracks"].as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(post_request(
            &format!("/admin/delete-user/{}", bob.id),
            Some(&admin_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_link_prefix_changes_play_urls() {
    let (app, _state) = spawn_app().await;
    let admin_cookie = login(&app, "admin", "admin123").await;

    let response = app
        .clone()
        .oneshot(upload_request(&[("tune.mp3", b"x".as_slice())], None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut request = form_request(
        "/admin/set-link-prefix",
        "link_prefix=https%3A%2F%2Fcdn.example.com%2F",
    );
    request
        .headers_mut()
        .insert(header::COOKIE, admin_cookie.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["link_prefix"], "https://cdn.example.com");

    let response = app
        .clone()
        .oneshot(get_request("/music", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    let play_url = json["data"]["tracks"][0]["play_url"].as_str().unwrap();
    assert!(play_url.starts_with("https://cdn.example.com/play/"));

    // Empty prefix is invalid, non-admins are locked out entirely.
    let mut request = form_request("/admin/set-link-prefix", "link_prefix=");
    request
        .headers_mut()
        .insert(header::COOKIE, admin_cookie.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(form_request(
            "/admin/set-link-prefix",
            "link_prefix=https%3A%2F%2Fother.example.com",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metrics_requires_admin() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/metrics", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let admin_cookie = login(&app, "admin", "admin123").await;
    let response = app
        .clone()
        .oneshot(get_request("/metrics", Some(&admin_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_index_reports_session_and_tracks() {
    let (app, _state) = spawn_app().await;

    let response = app.clone().oneshot(get_request("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["session"]["authenticated"], false);
    assert!(json["data"]["tracks"].as_array().unwrap().is_empty());

    let cookie = login(&app, "admin", "admin123").await;
    let response = app
        .clone()
        .oneshot(get_request("/", Some(&cookie)))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"]["session"]["authenticated"], true);
}
