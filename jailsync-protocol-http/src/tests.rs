use std::path::PathBuf;

use jailsync_common::protocol::API_KEY_HEADER;
use jailsync_common::{ApiKey, JailsyncConfig, JailsyncConfigStore};
use jailsync_core::Services;
use jailsync_db_entities::{BannedIp, Jail, Server};
use jailsync_db_migrations::migrate_database;
use poem::http::StatusCode;
use poem::test::TestClient;
use sea_orm::{ConnectOptions, Database, EntityTrait, PaginatorTrait};
use serde_json::json;
use uuid::Uuid;

use crate::{make_app, MAX_BODY_SIZE};

async fn services() -> Services {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    migrate_database(&db).await.unwrap();
    Services::from_connection(
        db,
        JailsyncConfig {
            store: JailsyncConfigStore::default(),
            paths_relative_to: PathBuf::from("/tmp"),
        },
    )
}

async fn register(services: &Services, name: &str) -> (Uuid, ApiKey) {
    let id = services.store.upsert_server(name, "10.0.0.1").await.unwrap();
    let key = ApiKey::generate();
    assert!(services.store.set_server_api_key(id, &key).await);
    (id, key)
}

async fn counts(services: &Services) -> (u64, u64, u64) {
    (
        Server::Entity::find().count(&services.db).await.unwrap(),
        Jail::Entity::find().count(&services.db).await.unwrap(),
        BannedIp::Entity::find().count(&services.db).await.unwrap(),
    )
}

fn sync_body(server_name: &str) -> serde_json::Value {
    json!({
        "action": "sync",
        "server_name": server_name,
        "server_ip": "10.0.0.7",
        "jails": [
            {
                "name": "sshd",
                "info": {"findtime": 300, "bantime": 7200, "maxretry": 3},
                "banned_ips": ["203.0.113.5", "198.51.100.7"]
            },
            {"name": "nginx", "banned_ips": ["bogus"]}
        ]
    })
}

#[tokio::test]
async fn test_health() {
    let services = services().await;
    let cli = TestClient::new(make_app(&services));
    let resp = cli.get("/health").send().await;
    resp.assert_status_is_ok();
}

#[tokio::test]
async fn test_missing_key() {
    let services = services().await;
    let cli = TestClient::new(make_app(&services));
    let resp = cli.post("/sync").body_json(&sync_body("web-1")).send().await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let json = resp.json().await;
    json.value().object().get("error").assert_string("Unauthorized");
}

#[tokio::test]
async fn test_malformed_key_writes_nothing() {
    let services = services().await;
    register(&services, "web-1").await;
    let before = counts(&services).await;

    let cli = TestClient::new(make_app(&services));
    let bad_keys = ["abc".to_owned(), "z".repeat(64), "a".repeat(63)];
    for key in &bad_keys {
        let resp = cli
            .post("/sync")
            .header(API_KEY_HEADER, key.as_str())
            .body_json(&sync_body("web-1"))
            .send()
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
    }

    assert_eq!(counts(&services).await, before);
}

#[tokio::test]
async fn test_unknown_key() {
    let services = services().await;
    register(&services, "web-1").await;
    let cli = TestClient::new(make_app(&services));
    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, ApiKey::generate().expose_secret())
        .body_json(&json!({"action": "ping"}))
        .send()
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_store_failure_is_opaque() {
    let services = services().await;
    let (_, key) = register(&services, "web-1").await;
    services.db.clone().close().await.unwrap();

    let cli = TestClient::new(make_app(&services));
    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .body_json(&json!({"action": "ping"}))
        .send()
        .await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json = resp.json().await;
    json.value().object().get("error").assert_string("ServerError");
    json.value()
        .object()
        .get("message")
        .assert_string("Internal server error");
}

#[tokio::test]
async fn test_inactive_server_writes_nothing() {
    let services = services().await;
    let (id, key) = register(&services, "web-1").await;
    assert!(services.store.set_server_active(id, false).await);
    let before = counts(&services).await;
    let last_sync = services
        .store
        .find_server_by_name("web-1")
        .await
        .unwrap()
        .unwrap()
        .last_sync;

    let cli = TestClient::new(make_app(&services));
    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .body_json(&sync_body("web-1"))
        .send()
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
    let json = resp.json().await;
    json.value().object().get("error").assert_string("Forbidden");
    json.value()
        .object()
        .get("message")
        .assert_string("Server is not active");

    assert_eq!(counts(&services).await, before);
    let server = services.store.find_server_by_name("web-1").await.unwrap().unwrap();
    assert_eq!(server.last_sync, last_sync);
    assert_eq!(server.server_ip, "10.0.0.1");
}

#[tokio::test]
async fn test_ping() {
    let services = services().await;
    let (id, key) = register(&services, "web-1").await;
    let cli = TestClient::new(make_app(&services));
    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret().to_uppercase())
        .body_json(&json!({"action": "ping"}))
        .send()
        .await;
    resp.assert_status_is_ok();
    let json = resp.json().await;
    let object = json.value().object();
    object.get("status").assert_string("ok");
    object.get("message").assert_string("pong");
    object.get("server_id").assert_string(&id.to_string());
    object.get("server_name").assert_string("web-1");
}

#[tokio::test]
async fn test_bad_requests() {
    let services = services().await;
    let (_, key) = register(&services, "web-1").await;
    let cli = TestClient::new(make_app(&services));

    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .content_type("application/json")
        .body("{not json")
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    resp.json()
        .await
        .value()
        .object()
        .get("error")
        .assert_string("ValidationError");

    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .body_json(&json!({"action": "sync", "server_name": "web-1"}))
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .body_json(&json!({"action": "purge"}))
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .content_type("application/json")
        .body(vec![b' '; MAX_BODY_SIZE + 1])
        .send()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(counts(&services).await, (1, 0, 0));
}

#[tokio::test]
async fn test_sync() {
    let services = services().await;
    let (id, key) = register(&services, "web-1").await;
    let cli = TestClient::new(make_app(&services));

    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .body_json(&sync_body("web-1"))
        .send()
        .await;
    resp.assert_status_is_ok();
    let json = resp.json().await;
    let object = json.value().object();
    object.get("status").assert_string("success");
    object.get("server_id").assert_string(&id.to_string());
    object.get("jails_processed").assert_i64(2);
    object.get("ips_synced").assert_i64(2);
    object.get("warnings").array().assert_len(1);

    assert_eq!(counts(&services).await, (1, 2, 2));
    let server = services.store.find_server_by_name("web-1").await.unwrap().unwrap();
    assert_eq!(server.server_ip, "10.0.0.7");
    let sshd = services.store.find_jail(id, "sshd").await.unwrap().unwrap();
    assert_eq!((sshd.findtime, sshd.bantime, sshd.maxretry), (300, 7200, 3));

    // a repeat sync increments instead of duplicating
    let resp = cli
        .post("/sync")
        .header(API_KEY_HEADER, key.expose_secret())
        .body_json(&sync_body("web-1"))
        .send()
        .await;
    resp.assert_status_is_ok();
    assert_eq!(counts(&services).await, (1, 2, 2));
    let bans = BannedIp::Entity::find().all(&services.db).await.unwrap();
    assert!(bans.iter().all(|b| b.ban_count == 2));
}
