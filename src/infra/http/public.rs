//! Glue routes: browser configuration script and liveness probe.

use axum::{
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::config::RemoteSettings;

use super::{HttpState, error::ApiError};

/// Browser-safe subset of the remote settings. The service key never
/// appears here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BrowserConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_bucket: String,
}

impl BrowserConfig {
    pub fn from_settings(remote: &RemoteSettings) -> Self {
        Self {
            supabase_url: remote.url.clone().unwrap_or_default(),
            supabase_anon_key: remote.anon_key.clone(),
            supabase_bucket: remote.bucket.clone(),
        }
    }

    pub fn render_script(&self) -> Result<String, serde_json::Error> {
        let object = serde_json::to_string(self)?;
        Ok(format!("window.__APP_CONFIG__ = {object};\n"))
    }
}

pub(super) async fn config_js(State(state): State<HttpState>) -> Response {
    match state.browser_config.render_script() {
        Ok(script) => {
            let mut response = script.into_response();
            let headers = response.headers_mut();
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/javascript; charset=utf-8"),
            );
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Err(err) => ApiError::new(
            "infra::http::public::config_js",
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to render config",
        )
        .with_details(err.to_string())
        .into_response(),
    }
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_exposes_browser_safe_values() {
        let config = BrowserConfig {
            supabase_url: "https://project.example.co".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_bucket: "ShieldBucket".to_string(),
        };

        let script = config.render_script().expect("script");
        insta::assert_snapshot!(
            script.trim_end(),
            @r#"window.__APP_CONFIG__ = {"SUPABASE_URL":"https://project.example.co","SUPABASE_ANON_KEY":"anon","SUPABASE_BUCKET":"ShieldBucket"};"#
        );
    }
}
