use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use db::{
    DBService,
    models::{
        armor::{Armor, UpsertArmor},
        artefact::{Artefact, UpsertArtefact},
        container::{Container, UpsertContainer},
        item::LocalizedName,
        user::{User, UserRole},
    },
};
use deployment::Deployment;
use http_body_util::BodyExt;
use local_deployment::LocalDeployment;
use serde_json::{Value, json};
use services::services::{
    config::Config,
    item_parser::ItemDocument,
    item_source::{ItemCategory, ItemRef, ItemSource, ItemSourceError},
};
use tower::ServiceExt;
use uuid::Uuid;

/// A repository with nothing in it.
struct EmptySource;

#[async_trait]
impl ItemSource for EmptySource {
    async fn list_items(&self, _category: ItemCategory) -> Result<Vec<ItemRef>, ItemSourceError> {
        Ok(Vec::new())
    }

    async fn fetch_item(&self, item: &ItemRef) -> Result<ItemDocument, ItemSourceError> {
        Err(ItemSourceError::Http {
            url: item.path.clone(),
            status: 404,
        })
    }

    fn icon_url(&self, item: &ItemRef) -> String {
        format!("https://icons.test/{}.png", item.path)
    }
}

async fn setup() -> (Router, LocalDeployment) {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("JWT_SECRET", "integration-test-secret"),
        ("CORS_ORIGINS", "http://localhost:3001"),
        ("CORS_ORIGIN_SUFFIXES", ".tunnel4.com"),
        ("SYNC_ENABLED", "false"),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
    let db = DBService::new_in_memory().await.unwrap();
    let deployment = LocalDeployment::from_parts(config, db, Arc::new(EmptySource));
    (server::app(deployment.clone()), deployment)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Register a user and return `(id, token)`.
async fn register(app: &Router, username: &str) -> (Uuid, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": format!("{username}@example.com"),
            "username": username,
            "password": "secret-password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["user"]["id"].as_str().unwrap().parse().unwrap();
    let token = body["data"]["token"].as_str().unwrap().to_string();
    (id, token)
}

fn ru(name: &str) -> Vec<LocalizedName> {
    vec![LocalizedName {
        lang: "ru".into(),
        name: name.into(),
    }]
}

async fn seed_catalog(deployment: &LocalDeployment) {
    let mut conn = deployment.db().pool.acquire().await.unwrap();
    Armor::upsert(
        &mut conn,
        &UpsertArmor {
            id: "armor1".into(),
            category: "armor/combat".into(),
            rank: Some("veteran".into()),
            names: ru("Броня"),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    Container::upsert(
        &mut conn,
        &UpsertContainer {
            id: "cont1".into(),
            category: "containers".into(),
            capacity: Some(2),
            names: ru("Контейнер"),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    for id in ["art1", "art2", "art3"] {
        Artefact::upsert(
            &mut conn,
            &UpsertArtefact {
                id: id.into(),
                category: "artefact/biochemical".into(),
                names: ru(id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn health_reports_ok_with_security_headers() {
    let (app, _) = setup().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["referrer-policy"], "no-referrer");
}

#[tokio::test]
async fn cors_allows_exact_and_suffix_origins() {
    let (app, _) = setup().await;
    let preflight = |origin: &'static str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/armor")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    };

    for origin in ["http://localhost:3001", "https://abc.tunnel4.com"] {
        let response = app.clone().oneshot(preflight(origin)).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            origin
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    let response = app.oneshot(preflight("https://evil.test")).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn auth_flow() {
    let (app, _) = setup().await;
    let (_, token) = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "alice@example.com", "username": "alice2", "password": "secret-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "secret-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh_token = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/auth/me",
        Some(&token),
        Some(json!({"username": "alicia"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "alicia");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({"token": refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["access_token"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/logout",
        Some(&token),
        Some(json!({"refresh_token": refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({"token": refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow() {
    let (app, _) = setup().await;
    register(&app, "carol").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/forgot",
        None,
        Some(json!({"email": "nobody@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/forgot",
        None,
        Some(json!({"email": "carol@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset",
        None,
        Some(json!({"token": "garbage", "new_password": "another-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset",
        None,
        Some(json!({"token": reset_token, "new_password": "another-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset",
        None,
        Some(json!({"token": reset_token, "new_password": "third-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "carol@example.com", "password": "another-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let (app, _) = setup().await;

    let (status, body) = send(&app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/builds",
        None,
        Some(json!({"armor_id": "a", "container_id": "c", "artefact_ids": []})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_listing_is_admin_only() {
    let (app, deployment) = setup().await;
    let (id, token) = register(&app, "dave").await;

    let (status, _) = send(&app, Method::GET, "/api/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    User::set_role(&deployment.db().pool, id, UserRole::Admin)
        .await
        .unwrap();
    let (status, body) = send(&app, Method::GET, "/api/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["username"], "dave");
    assert_eq!(body["data"][0]["role"], "admin");
}

#[tokio::test]
async fn catalog_rejects_unknown_sort() {
    let (app, deployment) = setup().await;
    seed_catalog(&deployment).await;

    let (status, body) = send(&app, Method::GET, "/api/containers", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], "cont1");
    assert_eq!(body["data"][0]["slots"], 2);

    let (status, body) = send(&app, Method::GET, "/api/armor", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["names"][0]["name"], "Броня");

    let (status, _) = send(&app, Method::GET, "/api/artefacts?sort=bogus", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/builds?sort=password", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn build_lifecycle() {
    let (app, deployment) = setup().await;
    seed_catalog(&deployment).await;
    let (_, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/builds",
        Some(&alice),
        Some(json!({
            "armor_id": "armor1",
            "container_id": "cont1",
            "artefact_ids": ["art1", "art2", "art3"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/builds",
        Some(&alice),
        Some(json!({
            "armor_id": "armor1",
            "container_id": "cont1",
            "artefact_ids": ["art1", "art2"],
            "tags": ["pvp"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["name"], "New build");
    assert_eq!(body["data"]["is_public"], false);
    assert_eq!(body["data"]["artefacts"][1]["id"], "art2");
    assert_eq!(body["data"]["armor"]["name"], "Броня");
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/builds/{id}");

    for invalid in [
        json!({"armor_id": "ghost"}),
        json!({"artefact_ids": ["art1", "art2", "art3"]}),
    ] {
        let (status, body) = send(&app, Method::PUT, &uri, Some(&alice), Some(invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["views_count"], 1);

    let (status, body) = send(&app, Method::GET, "/api/builds", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (_, body) = send(&app, Method::GET, "/api/builds", None, None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&bob),
        Some(json!({"name": "stolen"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&alice),
        Some(json!({"is_public": true, "name": "Tank"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Tank");
    assert_eq!(body["data"]["tags"], json!(["pvp"]));

    let (status, body) = send(&app, Method::GET, "/api/builds/tags/pvp", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], id.as_str());

    let (status, body) = send(&app, Method::GET, "/api/builds/tags/popular", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "pvp");
    assert_eq!(body["data"][0]["build_count"], 1);

    let like = format!("{uri}/like");
    let (status, body) = send(&app, Method::POST, &like, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["liked"], true);

    let (status, body) = send(&app, Method::GET, "/api/builds/popular", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["likes_count"], 1);

    let favorite = format!("{uri}/favorite");
    let (_, body) = send(&app, Method::POST, &favorite, Some(&bob), None).await;
    assert_eq!(body["data"]["favorited"], true);
    let (status, body) = send(&app, Method::GET, "/api/builds/favorites", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], id.as_str());

    let (status, body) =
        send(&app, Method::POST, &format!("{uri}/clone?lang=en"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Clone of Tank");
    assert_eq!(body["data"]["armor"]["name"], Value::Null);
    assert_eq!(body["data"]["is_public"], false);
    assert_eq!(body["data"]["author"]["username"], "bob");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    let (status, _) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_run_requires_admin() {
    let (app, deployment) = setup().await;
    let (id, token) = register(&app, "erin").await;

    let (status, body) = send(&app, Method::GET, "/api/sync/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["last_report"].is_null());

    let (status, _) = send(&app, Method::POST, "/api/sync/run", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::POST, "/api/sync/run", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    User::set_role(&deployment.db().pool, id, UserRole::Admin)
        .await
        .unwrap();
    let (status, body) = send(&app, Method::POST, "/api/sync/run", Some(&token), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);
}
