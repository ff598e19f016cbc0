//! `designs` and `layers` tables over the PostgREST dialect.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::application::repos::{DesignsRepo, RepoError};
use crate::domain::designs::{DesignRecord, DesignSummaryRecord, LayerRecord};
use crate::domain::ids::DesignId;

use super::RemoteClient;

const SOURCE: &str = "infra::remote::rest";
const DESIGNS: &str = "designs";
const LAYERS: &str = "layers";
const PREFER: &str = "Prefer";
const RETURN_MINIMAL: &str = "return=minimal";

const DESIGN_SUMMARY_COLUMNS: &str = "id,name,updated_at";
const DESIGN_COLUMNS: &str = "id,name,updated_at,stamps_json";
const LAYER_COLUMNS: &str = "design_id,layer_index,name,visible,png_path";

#[derive(Clone)]
pub struct RestTableStore {
    client: RemoteClient,
}

impl RestTableStore {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url, RepoError> {
        let mut url = self
            .client
            .endpoint(["rest", "v1", table])
            .ok_or_else(|| RepoError::transport("remote url cannot carry a path"))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<RequestBuilder, RepoError> {
        let url = self.table_url(table, query)?;
        debug!(target = SOURCE, method = %method, url = %url, "table request");
        Ok(self.client.request(method, url))
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, RepoError> {
    let response = builder.send().await.map_err(RepoError::transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RepoError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RepoError> {
    let bytes = response.bytes().await.map_err(RepoError::transport)?;
    serde_json::from_slice(&bytes).map_err(RepoError::decode)
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl DesignsRepo for RestTableStore {
    async fn list_designs(&self) -> Result<Vec<DesignSummaryRecord>, RepoError> {
        let request = self.request(
            Method::GET,
            DESIGNS,
            &[
                ("select", DESIGN_SUMMARY_COLUMNS),
                ("order", "updated_at.desc"),
            ],
        )?;
        decode(send(request).await?).await
    }

    async fn create_design(
        &self,
        name: &str,
        updated_at: &str,
    ) -> Result<DesignSummaryRecord, RepoError> {
        let request = self
            .request(Method::POST, DESIGNS, &[("select", DESIGN_SUMMARY_COLUMNS)])?
            .header(PREFER, "return=representation")
            .json(&json!({
                "name": name,
                "stamps_json": [],
                "updated_at": updated_at,
            }));
        let rows: Vec<DesignSummaryRecord> = decode(send(request).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepoError::decode("insert returned no rows"))
    }

    async fn find_design(&self, id: &DesignId) -> Result<Option<DesignRecord>, RepoError> {
        let filter = eq(id.as_str());
        let request = self.request(
            Method::GET,
            DESIGNS,
            &[("select", DESIGN_COLUMNS), ("id", filter.as_str())],
        )?;
        let rows: Vec<DesignRecord> = decode(send(request).await?).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_layers(&self, design_id: &DesignId) -> Result<Vec<LayerRecord>, RepoError> {
        let filter = eq(design_id.as_str());
        let request = self.request(
            Method::GET,
            LAYERS,
            &[
                ("select", LAYER_COLUMNS),
                ("design_id", filter.as_str()),
                ("order", "layer_index.asc"),
            ],
        )?;
        decode(send(request).await?).await
    }

    async fn upsert_layers(&self, rows: &[LayerRecord]) -> Result<(), RepoError> {
        let request = self
            .request(
                Method::POST,
                LAYERS,
                &[("on_conflict", "design_id,layer_index")],
            )?
            .header(PREFER, "resolution=merge-duplicates,return=minimal")
            .json(rows);
        send(request).await?;
        Ok(())
    }

    async fn touch_design(
        &self,
        id: &DesignId,
        stamps: &Value,
        updated_at: &str,
    ) -> Result<(), RepoError> {
        let filter = eq(id.as_str());
        let request = self
            .request(Method::PATCH, DESIGNS, &[("id", filter.as_str())])?
            .header(PREFER, RETURN_MINIMAL)
            .json(&json!({
                "stamps_json": stamps,
                "updated_at": updated_at,
            }));
        send(request).await?;
        Ok(())
    }

    async fn delete_layers(&self, design_id: &DesignId) -> Result<(), RepoError> {
        let filter = eq(design_id.as_str());
        let request = self
            .request(Method::DELETE, LAYERS, &[("design_id", filter.as_str())])?
            .header(PREFER, RETURN_MINIMAL);
        send(request).await?;
        Ok(())
    }

    async fn delete_design(&self, id: &DesignId) -> Result<(), RepoError> {
        let filter = eq(id.as_str());
        let request = self
            .request(Method::DELETE, DESIGNS, &[("id", filter.as_str())])?
            .header(PREFER, RETURN_MINIMAL);
        send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn store() -> RestTableStore {
        let client = RemoteClient::new(
            "https://project.example.co",
            "service",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .expect("client");
        RestTableStore::new(client)
    }

    #[test]
    fn table_urls_carry_filters() {
        let filter = eq("d1");
        let url = store()
            .table_url(
                LAYERS,
                &[
                    ("select", "design_id,layer_index"),
                    ("design_id", filter.as_str()),
                ],
            )
            .expect("url");

        assert_eq!(url.path(), "/rest/v1/layers");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "design_id,layer_index".to_string()),
                ("design_id".to_string(), "eq.d1".to_string()),
            ]
        );
    }

    #[test]
    fn table_urls_without_query_have_none() {
        let url = store().table_url(DESIGNS, &[]).expect("url");
        assert_eq!(url.as_str(), "https://project.example.co/rest/v1/designs");
    }
}
