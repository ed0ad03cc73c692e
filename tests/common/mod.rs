#![allow(dead_code)]

use std::net::SocketAddr;

use reqwest::{header, redirect, Client, RequestBuilder, Response};
use tempfile::TempDir;

use shopsite::access::Permission;
use shopsite::api::create_app;
use shopsite::config::Config;
use shopsite::core::users::{self, UserFlags};
use shopsite::entities::setup_schema;
use shopsite::middleware::auth::generate_token;
use shopsite::AppState;

pub const PASSWORD: &str = "password123";

/// A running server over its own SQLite file and media directory.
pub struct TestApp {
    pub address: String,
    pub state: AppState,
    pub client: Client,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.sqlite").display());

    let config = Config {
        database_url: database_url.clone(),
        secret: "test-secret".to_owned(),
        bind_addr: "127.0.0.1:0".parse().expect("Failed to parse address"),
        media_root: dir.path().join("media"),
        admin: None,
    };
    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    setup_schema(&db).await.expect("Failed to create tables");
    let state = AppState::new(db, config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!("http://{}", listener.local_addr().expect("No local address"));
    let app = create_app(state.clone());
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });

    let client = Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to build client");

    TestApp {
        address,
        state,
        client,
        _dir: dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.client.patch(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    pub async fn create_user(&self, username: &str) -> i32 {
        self.create_user_with(username, UserFlags::default()).await
    }

    pub async fn create_staff(&self, username: &str) -> i32 {
        self.create_user_with(
            username,
            UserFlags {
                is_staff: true,
                is_superuser: false,
            },
        )
        .await
    }

    pub async fn create_superuser(&self, username: &str) -> i32 {
        self.create_user_with(
            username,
            UserFlags {
                is_staff: true,
                is_superuser: true,
            },
        )
        .await
    }

    async fn create_user_with(&self, username: &str, flags: UserFlags) -> i32 {
        let (created, _) = users::create_user(self.state.db.as_ref(), username, PASSWORD, flags)
            .await
            .expect("Failed to create user");
        created.id
    }

    pub async fn grant(&self, user_id: i32, perm: Permission) {
        users::grant(self.state.db.as_ref(), user_id, perm)
            .await
            .expect("Failed to grant permission");
    }

    pub fn token_for(&self, user_id: i32) -> String {
        generate_token(&self.state.config.secret, user_id).expect("Failed to generate token")
    }

    /// Adds a bearer token for `user_id`.
    pub fn authed(&self, request: RequestBuilder, user_id: i32) -> RequestBuilder {
        request.bearer_auth(self.token_for(user_id))
    }
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("Response has no Location header")
}

/// The `name=value` pair of a cookie the response sets.
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
        .map(str::to_owned)
}

pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or_default()
}
