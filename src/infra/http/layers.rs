use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
};

use crate::application::layers::LayerDelivery;
use crate::cache::LayerKey;
use crate::domain::ids::DesignId;

use super::{HttpState, error::ApiError};

const SOURCE: &str = "infra::http::layers";
const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// `GET /api/designs/{design_id}/layers/{layer_index}.png`
///
/// The `v` query token only versions the URL and is ignored here.
pub(super) async fn serve_layer(
    State(state): State<HttpState>,
    Path((design_id, layer_file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let design_id = match DesignId::parse(&design_id) {
        Ok(id) => id,
        Err(err) => return ApiError::from_domain(SOURCE, err).into_response(),
    };
    let Some(layer_index) = parse_layer_file(&layer_file) else {
        return ApiError::not_found(SOURCE, "layer not found")
            .with_details(format!("`{layer_file}` is not a layer image"))
            .into_response();
    };

    let key = LayerKey::new(design_id, layer_index);
    let if_none_match = headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());

    match state.layers.deliver(&key, if_none_match).await {
        Ok(delivery) => delivery_response(delivery),
        Err(err) => ApiError::from_layer_fetch(SOURCE, err).into_response(),
    }
}

fn parse_layer_file(file: &str) -> Option<u32> {
    let index = file.strip_suffix(".png")?;
    if index.is_empty() || !index.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    index.parse().ok()
}

fn delivery_response(delivery: LayerDelivery) -> Response {
    let etag = HeaderValue::from_str(delivery.validator()).ok();

    let mut response = match delivery {
        LayerDelivery::NotModified { .. } => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NOT_MODIFIED;
            response
        }
        LayerDelivery::Content(entry) => {
            let bytes = entry.bytes().clone();
            let length = bytes.len();
            let mut response = Response::new(Body::from(bytes));
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
            if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
                headers.insert(CONTENT_LENGTH, value);
            }
            response
        }
    };

    let headers = response.headers_mut();
    if let Some(etag) = etag {
        headers.insert(ETAG, etag);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE));
    response
}
