use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::admin::{AuditReport, RepairOptions, RepairSummary};
use crate::auth::{self, Principal};
use crate::form::FieldErrors;
use crate::server::{blocking, AppState};
use crate::{Company, CompanyForm, Error, Student, StudentForm};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// Maps a roster [`Error`] onto an HTTP status with a JSON body
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::StorageInconsistency(_) => StatusCode::CONFLICT,
            Error::Storage(_) | Error::Io(_) | Error::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let body = ErrorResponse {
            code: self.0.code(),
            error: self.0.to_string(),
            fields: match self.0 {
                Error::Validation(fields) => Some(fields),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::invalid("body", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(Error::NotFound(rejection.body_text()))
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// JSON request body whose rejections render as [`ApiError`]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path parameters; an unparsable id is NotFound
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<Principal>> {
    let principal = blocking(&state, move |state| {
        auth::authorize_superuser(state.identity.as_ref(), &request.username, &request.password)
    })
    .await?;
    tracing::info!("{} logged in", principal.username);
    Ok(Json(principal))
}

// ========== Companies ==========

pub async fn list_companies(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Company>>> {
    blocking(&state, |state| state.admin.companies().list()).await.map(Json)
}

pub async fn create_company(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(form): ApiJson<CompanyForm>,
) -> ApiResult<(StatusCode, Json<Company>)> {
    let company = blocking(&state, move |state| state.admin.companies().create(&form)).await?;
    tracing::info!("{} created company {}", principal.username, company.id);
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn get_company(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Company>> {
    blocking(&state, move |state| state.admin.companies().get(id)).await.map(Json)
}

pub async fn rename_company(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(form): ApiJson<CompanyForm>,
) -> ApiResult<Json<Company>> {
    let company = blocking(&state, move |state| state.admin.companies().rename(id, &form)).await?;
    tracing::info!("{} renamed company {}", principal.username, id);
    Ok(Json(company))
}

pub async fn delete_company(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Company>> {
    let company = blocking(&state, move |state| state.admin.companies().delete(id)).await?;
    tracing::info!("{} deleted company {}", principal.username, id);
    Ok(Json(company))
}

// ========== Students ==========

pub async fn list_students(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Student>>> {
    blocking(&state, move |state| state.admin.students().list(id)).await.map(Json)
}

pub async fn add_student(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(form): ApiJson<StudentForm>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    let student = blocking(&state, move |state| state.admin.students().add(id, &form)).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn get_student(
    State(state): State<Arc<AppState>>,
    ApiPath((id, student_id)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<Student>> {
    blocking(&state, move |state| state.admin.students().get(id, student_id)).await.map(Json)
}

pub async fn update_student(
    State(state): State<Arc<AppState>>,
    ApiPath((id, student_id)): ApiPath<(i64, i64)>,
    ApiJson(form): ApiJson<StudentForm>,
) -> ApiResult<Json<Student>> {
    blocking(&state, move |state| state.admin.students().update(id, student_id, &form))
        .await
        .map(Json)
}

pub async fn delete_student(
    State(state): State<Arc<AppState>>,
    ApiPath((id, student_id)): ApiPath<(i64, i64)>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |state| state.admin.students().delete(id, student_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== Audit ==========

pub async fn audit(State(state): State<Arc<AppState>>) -> ApiResult<Json<AuditReport>> {
    blocking(&state, |state| state.admin.auditor().audit()).await.map(Json)
}

pub async fn repair(
    State(state): State<Arc<AppState>>,
    ApiJson(options): ApiJson<RepairOptions>,
) -> ApiResult<Json<RepairSummary>> {
    blocking(&state, move |state| state.admin.auditor().repair(options)).await.map(Json)
}
