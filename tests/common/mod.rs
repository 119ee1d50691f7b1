#![allow(dead_code)]

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use notes_api::config;
use notes_api::database::{ensure_schema, DatabaseManager};
use notes_api::{app, AppState};

/// Router served in-process on an ephemeral port for the life of one test.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

/// A registered user holding a fresh access token.
pub struct Session {
    pub id: i64,
    pub username: String,
    pub token: String,
}

/// True when DATABASE_URL points at a Postgres instance tests may write to.
pub fn has_database() -> bool {
    std::env::var("DATABASE_URL").is_ok()
}

/// Start a server for tests that need storage; `None` when no database is configured.
pub async fn database_server() -> Result<Option<TestServer>> {
    if !has_database() {
        eprintln!("DATABASE_URL not set; skipping database-backed test");
        return Ok(None);
    }
    Ok(Some(TestServer::start().await?))
}

pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..12])
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let pool = DatabaseManager::connect_lazy(&config::config().database)?;
        if has_database() {
            ensure_schema(&pool).await.context("failed to apply schema")?;
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind ephemeral port")?;
        let addr = listener.local_addr()?;
        let router = app(AppState::new(pool));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url("/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?)
    }

    /// Register a uniquely named user and log in.
    pub async fn session(&self, prefix: &str) -> Result<Session> {
        let username = unique(prefix);
        let res = self.register(&username, "secret-pw").await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());
        let user: Value = res.json().await?;

        let res = self.login(&username, "secret-pw").await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let token: Value = res.json().await?;

        Ok(Session {
            id: user["id"].as_i64().context("user id")?,
            username,
            token: token["access_token"].as_str().context("access_token")?.to_string(),
        })
    }

    pub async fn create_note(&self, session: &Session, body: Value) -> Result<Value> {
        let res = self
            .client
            .post(self.url("/notes"))
            .bearer_auth(&session.token)
            .json(&body)
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "create failed: {}", res.status());
        Ok(res.json().await?)
    }
}

/// Tag names of a serialized note, in response order.
pub fn tag_names(note: &Value) -> Vec<String> {
    note["tags"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
