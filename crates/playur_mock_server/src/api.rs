use crate::state::{MockGame, MockState, UploadedBuild};

use axum::extract::multipart::MultipartError;
use axum::{
    Form, Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use playur_core::prelude::*;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{info, warn};

type Fields = HashMap<String, String>;

pub enum ApiError {
    /// Wrong `gameID` or `clientSecret`. The platform answers these with a
    /// normal status and a structured failure.
    BadSecret,
    Rejected(String),
    BadRequest(String),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadSecret => (StatusCode::OK, "bad secret".to_string()),
            ApiError::Rejected(message) => (StatusCode::OK, message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

fn authorize(game: &MockGame, fields: &Fields) -> Result<(), ApiError> {
    let game_id = fields.get("gameID").map(String::as_str);
    let secret = fields.get("clientSecret").map(String::as_str);
    if game.authorize(game_id, secret) {
        Ok(())
    } else {
        warn!(?game_id, "rejected request with bad credentials");
        Err(ApiError::BadSecret)
    }
}

fn records_of(game: &MockGame, resource: ResourceType) -> Value {
    match resource {
        ResourceType::Action => json!(game.actions),
        ResourceType::Element => json!(game.elements),
        ResourceType::Experiment => json!(game.experiments),
        ResourceType::ExperimentGroup => json!(game.experiment_groups),
        ResourceType::AnalyticsColumn => json!(game.analytics_columns),
        ResourceType::Parameter => json!(game.parameter_keys),
    }
}

/// GET /api/<Resource>/listForGame.php
pub async fn list_records(
    State(state): State<MockState>,
    Query(query): Query<Fields>,
    resource: ResourceType,
) -> Result<Json<Value>, ApiError> {
    state.with(|game| {
        authorize(game, &query)?;
        Ok(Json(json!({
            "success": true,
            "records": records_of(game, resource),
        })))
    })
}

/// GET /api/Build/latestBuildID.php
pub async fn latest_build_id(
    State(state): State<MockState>,
    Query(query): Query<Fields>,
) -> Result<Json<Value>, ApiError> {
    state.with(|game| {
        authorize(game, &query)?;
        let branch = query.get("branch").map(String::as_str);
        Ok(Json(json!({
            "success": true,
            "latestBuildID": game.latest_build(branch),
        })))
    })
}

/// POST /api/Build/
/// Multipart form with the credentials, the archive as `file` and the
/// build descriptor as JSON in `request`.
pub async fn upload_build(
    State(state): State<MockState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut fields = Fields::new();
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            file = Some((file_name, field.bytes().await?));
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    let (file_name, body) =
        file.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    let descriptor: BuildDescriptor = fields
        .get("request")
        .ok_or_else(|| ApiError::BadRequest("missing request field".into()))
        .and_then(|raw| {
            serde_json::from_str(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
        })?;

    let sha256 = hex::encode(Sha256::digest(&body));

    state.with(|game| {
        authorize(game, &fields)?;
        if let Some(message) = &game.upload_rejection {
            return Err(ApiError::Rejected(message.clone()));
        }

        info!(
            branch = %descriptor.branch,
            build_id = descriptor.build_id,
            bytes = body.len(),
            "build uploaded"
        );
        let build_id = descriptor.build_id;
        game.record_upload(UploadedBuild {
            descriptor,
            file_name,
            bytes: body.len(),
            sha256: sha256.clone(),
        });

        Ok(Json(json!({
            "success": true,
            "buildID": build_id,
            "sha256": sha256,
        })))
    })
}

/// POST /api/User/login.php
pub async fn login(
    State(state): State<MockState>,
    Form(form): Form<Fields>,
) -> Result<Json<Value>, ApiError> {
    state.with(|game| {
        authorize(game, &form)?;
        let username = form.get("username").map(String::as_str).unwrap_or_default();
        let password = form.get("password").map(String::as_str).unwrap_or_default();

        match game.find_user(username, password) {
            Some(user) => Ok(Json(json!({
                "success": true,
                "user": { "id": user.id, "username": user.username },
            }))),
            None => Err(ApiError::Rejected("Invalid username or password".into())),
        }
    })
}

/// POST /api/User/register.php
pub async fn register(
    State(state): State<MockState>,
    Form(form): Form<Fields>,
) -> Result<Json<Value>, ApiError> {
    state.with(|game| {
        authorize(game, &form)?;
        let field = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();

        let user = game
            .add_user(field("username"), field("password"), field("email"))
            .map_err(ApiError::Rejected)?;
        Ok(Json(json!({
            "success": true,
            "user": { "id": user.id, "username": user.username },
        })))
    })
}
