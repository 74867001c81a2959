use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::services::JwtKeys,
    state::AppState,
    store::{Category, Item, NewItem, NewUser, User},
};

/// Router over an in-memory store, driven with `oneshot`.
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::fake();
        let router = build_app(state.clone());
        Self { state, router }
    }

    pub fn keys(&self) -> JwtKeys {
        JwtKeys::from_ref(&self.state)
    }

    pub fn token(&self, user: &User) -> String {
        self.keys().sign_access(user.id).unwrap()
    }

    pub async fn user(&self, username: &str, is_superuser: bool) -> User {
        self.state
            .store
            .create_user(NewUser {
                username: username.into(),
                email: format!("{username}@example.com"),
                password_hash: "unused".into(),
                is_superuser,
            })
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn category(&self, name: &str) -> Category {
        self.state.store.create_category(name).await.unwrap().unwrap()
    }

    pub async fn item(&self, owner: &User, name: &str, description: &str, category: &Category) -> Item {
        self.state
            .store
            .create_item(
                owner.id,
                NewItem {
                    name: name.into(),
                    description: description.into(),
                    category_id: category.id,
                },
            )
            .await
            .unwrap()
    }

    pub async fn send(&self, req: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// Sends a JSON request; returns the status and the parsed body (`Null` if empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = self.send(req).await;
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}
