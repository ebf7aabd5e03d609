//! HTTP transport for PostgREST table APIs

use async_trait::async_trait;
use pgrest::{Filter, FilterOp, Query};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};

use super::{Row, Tables};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};

/// Table API over HTTPS, authenticated with the project key
#[derive(Debug, Clone)]
pub struct HttpTables {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTables {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::Config {
                message: format!("remote url '{}' is not an http(s) URL", config.url),
            });
        }

        let key = HeaderValue::from_str(&config.api_key).map_err(|_| Error::Config {
            message: "remote api key contains invalid header characters".to_string(),
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|_| {
            Error::Config {
                message: "remote api key contains invalid header characters".to_string(),
            }
        })?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, endpoint })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.endpoint, table))
    }

    async fn check(table: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!(table, status = status.as_u16(), body = %body, "Remote request failed");
        Err(Error::RemoteStatus {
            table: table.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

#[async_trait]
impl Tables for HttpTables {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let response = self
            .request(Method::GET, &query.table)
            .query(&query.to_params())
            .send()
            .await?;
        let response = Self::check(&query.table, response).await?;
        Ok(response.json().await?)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(filter_params(filters));

        let response = self
            .request(Method::HEAD, table)
            .query(&params)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check(table, response).await?;

        let header = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::integrity(format!("{}: count response without Content-Range", table)))?;
        pgrest::parse_content_range(header)?
            .total
            .ok_or_else(|| Error::integrity(format!("{}: server did not return a count", table)))
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        let response = Self::check(table, response).await?;
        Ok(response.json().await?)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>> {
        let response = self
            .request(Method::PATCH, table)
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let response = Self::check(table, response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        // The API refuses unfiltered deletes
        let filters = if filters.is_empty() {
            vec![Filter::new("id", FilterOp::Neq, 0)]
        } else {
            filters.to_vec()
        };

        let response = self
            .request(Method::DELETE, table)
            .query(&filter_params(&filters))
            .send()
            .await?;
        Self::check(table, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgrest::OrderDirection;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "anon-key";

    async fn setup() -> (MockServer, HttpTables) {
        let server = MockServer::start().await;
        let tables = HttpTables::new(&RemoteConfig::new(server.uri(), KEY)).unwrap();
        (server, tables)
    }

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(row) => row,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = HttpTables::new(&RemoteConfig::new("ftp://example.com", "k")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_rejects_bad_key() {
        let err = HttpTables::new(&RemoteConfig::new("https://demo.supabase.co", "bad\nkey"))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_builds_endpoint() {
        let tables = HttpTables::new(&RemoteConfig::new("https://demo.supabase.co/", "k")).unwrap();
        assert_eq!(tables.endpoint, "https://demo.supabase.co/rest/v1");
    }

    // =========================================================================
    // Wire contract
    // =========================================================================

    #[tokio::test]
    async fn test_select_request_shape() {
        let (server, tables) = setup().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/incidents"))
            .and(header("apikey", KEY))
            .and(header("authorization", format!("Bearer {}", KEY).as_str()))
            .and(query_param("select", "*"))
            .and(query_param("code", "eq.001"))
            .and(query_param("order", "id.asc"))
            .and(query_param("limit", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"id": 1, "code": "001", "description": "Calidad"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let query = Query::table("incidents")
            .eq("code", "001")
            .order("id", OrderDirection::Asc)
            .limit(1);
        let rows = tables.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["code"], "001");
    }

    #[tokio::test]
    async fn test_count_reads_content_range() {
        let (server, tables) = setup().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/incidents"))
            .and(header("apikey", KEY))
            .and(header("prefer", "count=exact"))
            .and(query_param("select", "id"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-2/3"))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(tables.count("incidents", &[]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_count_without_total() {
        let (server, tables) = setup().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/verifiers"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/*"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/warehouses"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = tables.count("verifiers", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));

        let err = tables.count("warehouses", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Integrity { ref message } if message.contains("Content-Range")));
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let (server, tables) = setup().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/coordinators"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let err = tables.select(&Query::table("coordinators")).await.unwrap_err();
        match err {
            Error::RemoteStatus { table, status, body } => {
                assert_eq!(table, "coordinators");
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API key");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_insert_and_update_return_representation() {
        let (server, tables) = setup().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/coordinators"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!([{"name": "Ana", "surnames": "Ruiz"}])))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!([{"id": 7, "name": "Ana", "surnames": "Ruiz"}])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/incident_records"))
            .and(header("prefer", "return=representation"))
            .and(query_param("id", "eq.7"))
            .and(body_json(json!({"status": "Solucionado"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
            .expect(1)
            .mount(&server)
            .await;

        let inserted = tables
            .insert("coordinators", vec![row(json!({"name": "Ana", "surnames": "Ruiz"}))])
            .await
            .unwrap();
        assert_eq!(inserted[0]["id"], 7);

        let updated = tables
            .update(
                "incident_records",
                &[Filter::new("id", FilterOp::Eq, 7)],
                row(json!({"status": "Solucionado"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_guarded() {
        let (server, tables) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/incident_actions"))
            .and(query_param("id", "neq.0"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        tables.delete("incident_actions", &[]).await.unwrap();
    }
}
