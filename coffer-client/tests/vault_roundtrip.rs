//! End-to-end tests: the client against a live coffer-server router.
//!
//! The router is served over plain HTTP on an ephemeral port; TLS is the
//! only layer skipped.

use std::sync::Arc;

use coffer_client::{Cipher, ClientError, KdfParams, VaultClient};
use coffer_server::auth::TokenAuthority;
use coffer_server::config::Config;
use coffer_server::http::build_router;
use coffer_server::storage::SqliteStorage;
use coffer_server::VaultServer;
use coffer_types::api::AUTH_HEADER;
use coffer_types::{
    BinaryData, CreditCard, Credentials, ItemData, ItemKind, LoginPassword, Payload, TextData,
    WireError,
};
use reqwest::StatusCode;
use tokio::net::TcpListener;

async fn spawn_server() -> String {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let tokens = TokenAuthority::new(b"integration-test-secret", None);
    let server = Arc::new(VaultServer::new(Config::default(), Arc::new(storage), tokens));
    let app = build_router(server);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn cipher_for(user: &str, password: &str) -> Cipher {
    Cipher::from_passphrase_with_params(user, password, KdfParams::new(64, 1)).unwrap()
}

async fn registered(base: &str, user: &str, password: &str) -> (VaultClient, Cipher) {
    let mut client = VaultClient::new(base).unwrap();
    client
        .register(&Credentials::new(user, password))
        .await
        .unwrap();
    (client, cipher_for(user, password))
}

#[tokio::test]
async fn login_password_lifecycle() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "alice", "hunter2").await;

    let lp = LoginPassword {
        login: "alice@mail.example".into(),
        password: "correct horse".into(),
    };
    client
        .create_item(&cipher, "mail", "work account", lp.clone().into_payload())
        .await
        .unwrap();

    let fetched = client.get_item(&cipher, "mail").await.unwrap();
    assert_eq!(fetched.item.key, "mail");
    assert_eq!(fetched.item.note, "work account");
    assert_eq!(fetched.item.kind, ItemKind::LoginPassword);
    assert_eq!(fetched.data, Some(lp.into_payload()));

    let changed = LoginPassword {
        login: "alice@mail.example".into(),
        password: "battery staple".into(),
    };
    client
        .update_item(&cipher, "mail", "rotated", changed.clone().into_payload())
        .await
        .unwrap();
    let fetched = client.get_item(&cipher, "mail").await.unwrap();
    assert_eq!(fetched.item.note, "rotated");
    assert_eq!(fetched.data, Some(changed.into_payload()));

    client.delete_item("mail").await.unwrap();
    let err = client.get_item(&cipher, "mail").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn server_only_sees_ciphertext() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "bob", "pw").await;

    client
        .create_item(&cipher, "diary", "", TextData("dear diary".into()).into_payload())
        .await
        .unwrap();

    let raw: serde_json::Value = reqwest::Client::new()
        .get(format!("{base}/api/item/diary"))
        .header(AUTH_HEADER, client.token().unwrap())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let stored = raw["data"].as_str().unwrap();
    assert_ne!(stored, "dear diary");
    assert!(!stored.contains("diary"));
}

#[tokio::test]
async fn card_and_text_roundtrip() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "carol", "pw").await;

    let card = CreditCard {
        number: "4111 1111 1111 1111".into(),
        owner_name: "CAROL EXAMPLE".into(),
        cvc: "987".into(),
        valid_month: 4,
        valid_year: 2031,
    };
    client
        .create_item(&cipher, "visa", "", card.clone().into_payload())
        .await
        .unwrap();
    client
        .create_item(&cipher, "wifi", "home", TextData("p4ss".into()).into_payload())
        .await
        .unwrap();

    let fetched = client.get_item(&cipher, "visa").await.unwrap();
    assert_eq!(fetched.data, Some(Payload::CreditCard(card)));

    let fetched = client.get_item(&cipher, "wifi").await.unwrap();
    assert_eq!(fetched.data, Some(Payload::Text(TextData("p4ss".into()))));

    let bad = CreditCard {
        valid_month: 13,
        ..CreditCard::default()
    };
    let err = client
        .create_item(&cipher, "bad", "", bad.into_payload())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn binary_upload_and_download() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "dave", "pw").await;

    let blob: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    client
        .create_item(&cipher, "photo", "jpeg", BinaryData(blob.clone()).into_payload())
        .await
        .unwrap();

    let fetched = client.get_item(&cipher, "photo").await.unwrap();
    assert_eq!(fetched.item.kind, ItemKind::Binary);
    assert_eq!(fetched.item.note, "jpeg");
    assert!(fetched.data.is_none());

    assert_eq!(client.download_binary(&cipher, "photo").await.unwrap(), blob);

    client
        .update_item(&cipher, "photo", "png", BinaryData(vec![1, 2, 3]).into_payload())
        .await
        .unwrap();
    assert_eq!(
        client.download_binary(&cipher, "photo").await.unwrap(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn typed_fetch_narrows_to_the_stored_kind() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "trent", "pw").await;

    let lp = LoginPassword {
        login: "trent@mail".into(),
        password: "s3cret".into(),
    };
    client
        .create_item(&cipher, "mail", "work", lp.clone().into_payload())
        .await
        .unwrap();
    client
        .create_item(&cipher, "scan", "", BinaryData(vec![4, 5, 6]).into_payload())
        .await
        .unwrap();

    let (meta, fetched) = client
        .get_typed::<LoginPassword>(&cipher, "mail")
        .await
        .unwrap();
    assert_eq!(meta.note, "work");
    assert_eq!(fetched, lp);

    let (_, blob) = client.get_typed::<BinaryData>(&cipher, "scan").await.unwrap();
    assert_eq!(blob.0, vec![4, 5, 6]);

    let err = client
        .get_typed::<TextData>(&cipher, "mail")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Wire(WireError::KindMismatch { .. })
    ));
}

#[tokio::test]
async fn keys_with_reserved_characters() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "erin", "pw").await;

    let key = "bank / main?acct#1";
    client
        .create_item(&cipher, key, "", TextData("x".into()).into_payload())
        .await
        .unwrap();

    let fetched = client.get_item(&cipher, key).await.unwrap();
    assert_eq!(fetched.item.key, key);
    client.delete_item(key).await.unwrap();
}

#[tokio::test]
async fn listing_pages_through_items() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "frank", "pw").await;

    for i in 0..5 {
        client
            .create_item(&cipher, &format!("k{i}"), "", TextData(i.to_string()).into_payload())
            .await
            .unwrap();
    }

    let first = client.list_items(1, 2).await.unwrap();
    let third = client.list_items(3, 2).await.unwrap();
    let past_end = client.list_items(4, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(third.len(), 1);
    assert!(past_end.is_empty());

    let err = client.list_items(0, 2).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn auth_failures_surface_as_status() {
    let base = spawn_server().await;
    let (_client, _cipher) = registered(&base, "grace", "right").await;

    let mut other = VaultClient::new(&base).unwrap();
    let err = other
        .register(&Credentials::new("grace", "again"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    let err = other
        .login(&Credentials::new("grace", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(other.token().is_none());

    other
        .login(&Credentials::new("grace", "right"))
        .await
        .unwrap();
    assert!(other.token().is_some());

    other.set_token("forged.token.value");
    let err = other.list_items(1, 10).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn wrong_cipher_cannot_read_items() {
    let base = spawn_server().await;
    let (client, cipher) = registered(&base, "heidi", "pw").await;

    client
        .create_item(&cipher, "secret", "", TextData("s".into()).into_payload())
        .await
        .unwrap();

    let wrong = cipher_for("heidi", "not-pw");
    let err = client.get_item(&wrong, "secret").await.unwrap_err();
    assert!(matches!(err, ClientError::Crypto(_)));
}

#[tokio::test]
async fn users_cannot_see_each_other() {
    let base = spawn_server().await;
    let (alice, alice_cipher) = registered(&base, "ivan", "pw").await;
    let (mallory, mallory_cipher) = registered(&base, "judy", "pw").await;

    alice
        .create_item(&alice_cipher, "shared-name", "", TextData("a".into()).into_payload())
        .await
        .unwrap();

    let err = mallory
        .get_item(&mallory_cipher, "shared-name")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert!(mallory.list_items(1, 10).await.unwrap().is_empty());

    mallory
        .create_item(&mallory_cipher, "shared-name", "", TextData("m".into()).into_payload())
        .await
        .unwrap();
}
