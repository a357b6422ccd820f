//! Route handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::integrations::places::{Place, PlacesError};
use crate::nosql::Document;
use crate::usecases::{ServiceStatus, UseCaseError, UseCases};

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn status(State(usecases): State<UseCases>) -> Json<ServiceStatus> {
    Json(usecases.service_status())
}

#[derive(Debug, Deserialize)]
pub struct HotelsQuery {
    pub name: Option<String>,
}

pub async fn hotels(
    State(usecases): State<UseCases>,
    Query(params): Query<HotelsQuery>,
) -> Result<Json<Vec<Document>>, UseCaseError> {
    Ok(Json(usecases.list_hotels(params.name.as_deref()).await?))
}

#[derive(Debug, Deserialize)]
pub struct PlacesQuery {
    pub query: String,
    pub radius: Option<u32>,
}

pub async fn places(
    State(usecases): State<UseCases>,
    Query(params): Query<PlacesQuery>,
) -> Result<Json<Vec<Place>>, UseCaseError> {
    Ok(Json(
        usecases
            .find_lodging(&params.query, params.radius)
            .await?,
    ))
}

impl UseCaseError {
    fn status_code(&self) -> StatusCode {
        match self {
            UseCaseError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            UseCaseError::Places(PlacesError::Disabled) => StatusCode::SERVICE_UNAVAILABLE,
            UseCaseError::Places(_) => StatusCode::BAD_GATEWAY,
            UseCaseError::Datastore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UseCaseError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
