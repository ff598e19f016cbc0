//! Design CRUD and save endpoints.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::application::designs::SaveDesignCommand;
use crate::domain::designs::SaveManifest;
use crate::domain::ids::DesignId;

use super::{HttpState, error::ApiError};

const SOURCE_BASE: &str = "infra::http::designs";
const META_PART: &str = "meta";
const LAYER_PART_PREFIX: &str = "layer_";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateDesignRequest {
    name: Option<String>,
}

fn parse_id(source: &'static str, raw: &str) -> Result<DesignId, ApiError> {
    DesignId::parse(raw).map_err(|err| ApiError::from_domain(source, err))
}

fn ok_response() -> Response {
    Json(json!({ "ok": true })).into_response()
}

pub(super) async fn list_designs(State(state): State<HttpState>) -> Response {
    const SOURCE: &str = "infra::http::designs::list";
    match state.designs.list().await {
        Ok(designs) => Json(designs).into_response(),
        Err(err) => ApiError::from_design(SOURCE, err).into_response(),
    }
}

/// The body is optional; an absent or blank name creates an untitled design.
pub(super) async fn create_design(State(state): State<HttpState>, body: Bytes) -> Response {
    const SOURCE: &str = "infra::http::designs::create";
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateDesignRequest::default()
    } else {
        match serde_json::from_slice::<CreateDesignRequest>(&body) {
            Ok(request) => request,
            Err(err) => {
                return ApiError::bad_request(SOURCE, "invalid json body")
                    .with_details(err.to_string())
                    .into_response();
            }
        }
    };

    match state.designs.create(request.name.as_deref()).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => ApiError::from_design(SOURCE, err).into_response(),
    }
}

pub(super) async fn load_design(
    State(state): State<HttpState>,
    Path(design_id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::designs::load";
    let id = match parse_id(SOURCE, &design_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match state.designs.load(&id).await {
        Ok(view) => Json(view).into_response(),
        Err(err) => ApiError::from_design(SOURCE, err).into_response(),
    }
}

pub(super) async fn delete_design(
    State(state): State<HttpState>,
    Path(design_id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::designs::delete";
    let id = match parse_id(SOURCE, &design_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match state.designs.delete(&id).await {
        Ok(()) => ok_response(),
        Err(err) => ApiError::from_design(SOURCE, err).into_response(),
    }
}

pub(super) async fn save_design(
    State(state): State<HttpState>,
    Path(design_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::designs::save";
    let id = match parse_id(SOURCE, &design_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    let command = match read_save_payload(&mut multipart).await {
        Ok(command) => command,
        Err(err) => return err.into_response(),
    };
    match state.designs.save(&id, command).await {
        Ok(()) => ok_response(),
        Err(err) => ApiError::from_design(SOURCE, err).into_response(),
    }
}

async fn read_save_payload(multipart: &mut Multipart) -> Result<SaveDesignCommand, ApiError> {
    let mut manifest = SaveManifest::default();
    let mut uploads = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == META_PART {
            let text = field.text().await.map_err(multipart_error)?;
            manifest = parse_manifest(&text)?;
        } else if let Some(index) = layer_part_index(&name) {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            uploads.insert(index, bytes);
        }
    }

    Ok(SaveDesignCommand { manifest, uploads })
}

fn parse_manifest(text: &str) -> Result<SaveManifest, ApiError> {
    if text.trim().is_empty() {
        return Ok(SaveManifest::default());
    }
    serde_json::from_str(text).map_err(|err| {
        ApiError::bad_request(SOURCE_BASE, "invalid meta json").with_details(err.to_string())
    })
}

fn layer_part_index(name: &str) -> Option<u32> {
    let index = name.strip_prefix(LAYER_PART_PREFIX)?;
    if index.is_empty() || !index.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    index.parse().ok()
}

fn multipart_error(err: MultipartError) -> ApiError {
    let status = err.status();
    let status = if status.is_client_error() {
        status
    } else {
        StatusCode::BAD_REQUEST
    };
    ApiError::new(SOURCE_BASE, status, "invalid multipart body").with_details(err.body_text())
}
