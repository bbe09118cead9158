//! HTTP API for the user service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::EventDispatcher;
use emporium_core::patch::Patch;
use emporium_core::uow::UnitOfWork;
use emporium_web::{health_check, readiness_check, ApiError};

use crate::app::{NewUser, UserAppService};
use crate::domain::{UserRepository, UserStatus, UserUpdate};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub login: String,
    pub email: Option<String>,
    pub telegram: Option<String>,
    pub status: Option<i32>,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub status: Option<i32>,
    /// Absent = keep, empty string = clear, value = set.
    pub email: Option<String>,
    /// Absent = keep, empty string = clear, value = set.
    pub telegram: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub login: String,
    pub status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

fn parse_status(code: Option<i32>) -> Result<Option<UserStatus>, DomainError> {
    code.map(|code| {
        UserStatus::from_code(code)
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown user status {code}")))
    })
    .transpose()
}

/// Build the user API router.
pub fn router<U>(service: Arc<UserAppService<U>>) -> Router
where
    U: UnitOfWork + 'static,
    U::Provider: UserRepository + EventDispatcher,
{
    Router::new()
        .route("/users", post(create_user::<U>))
        .route(
            "/users/:user_id",
            get(find_user::<U>)
                .patch(update_user::<U>)
                .delete(delete_user::<U>),
        )
        .route("/users/:user_id/block", post(block_user::<U>))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(service)
}

async fn create_user<U>(
    State(service): State<Arc<UserAppService<U>>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: UserRepository + EventDispatcher,
{
    let status = parse_status(request.status)?;
    let user_id = service
        .create_user(NewUser {
            login: request.login,
            email: request.email.filter(|e| !e.is_empty()),
            telegram: request.telegram.filter(|t| !t.is_empty()),
            status,
        })
        .await?;
    Ok(Json(CreateUserResponse { user_id }))
}

async fn update_user<U>(
    State(service): State<Arc<UserAppService<U>>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<()>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: UserRepository + EventDispatcher,
{
    let status = parse_status(request.status)?;
    service
        .update_user(
            user_id,
            UserUpdate {
                status,
                email: Patch::from_field(request.email),
                telegram: Patch::from_field(request.telegram),
            },
        )
        .await?;
    Ok(Json(()))
}

async fn block_user<U>(
    State(service): State<Arc<UserAppService<U>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<()>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: UserRepository + EventDispatcher,
{
    service.block_user(user_id).await?;
    Ok(Json(()))
}

async fn delete_user<U>(
    State(service): State<Arc<UserAppService<U>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<()>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: UserRepository + EventDispatcher,
{
    service.delete_user(user_id).await?;
    Ok(Json(()))
}

async fn find_user<U>(
    State(service): State<Arc<UserAppService<U>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: UserRepository + EventDispatcher,
{
    let user = service.find_user(user_id).await?;
    Ok(Json(UserResponse {
        user_id: user.user_id,
        login: user.login,
        status: user.status.code(),
        email: user.email,
        telegram: user.telegram,
        created_at: user.created_at.to_rfc3339(),
        updated_at: user.updated_at.to_rfc3339(),
        deleted_at: user.deleted_at.map(|t| t.to_rfc3339()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_service;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn create_and_fetch_over_http() {
        let (service, _uow) = memory_service();
        let app = router(Arc::new(service));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/users",
                serde_json::json!({"login": "bob", "email": "bob@example.com"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let created: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        let user_id = created["user_id"].as_str().expect("user_id").to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/users/{user_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let user: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(user["login"], "bob");
        assert_eq!(user["status"], 0);
    }

    #[tokio::test]
    async fn duplicate_login_maps_to_conflict() {
        let (service, _uow) = memory_service();
        let app = router(Arc::new(service));

        let first = app
            .clone()
            .oneshot(json_request("POST", "/users", serde_json::json!({"login": "bob"})))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(json_request("POST", "/users", serde_json::json!({"login": "bob"})))
            .await
            .expect("response");
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn missing_user_maps_to_not_found() {
        let (service, _uow) = memory_service();
        let app = router(Arc::new(service));

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/users/{}", Uuid::now_v7()))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
