//! HTTP transactional endpoint driver
//!
//! Every `run` is one auto-commit request:
//!
//! ```text
//! POST <base>/db/<database>/tx/commit
//! {"statements": [{"statement": "...", "parameters": {...}, "resultDataContents": ["row"]}]}
//! ```
//!
//! The `reqwest::Client` holds the connection pool and is shared by every
//! session the driver opens. A session is a cheap handle around it.

use std::sync::Arc;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DatabaseConfig;

use super::{
    BoxFuture, DriverError, DriverResult, GraphDriver, GraphSession, Parameters, Record,
};

/// Port the bolt protocol listens on by default
const BOLT_PORT: u16 = 7687;
/// Port the HTTP endpoint listens on by default
const HTTP_PORT: u16 = 7474;
/// Port the HTTPS endpoint listens on by default
const HTTPS_PORT: u16 = 7473;

/// Connection details shared by all sessions
struct Endpoint {
    commit_url: Url,
    username: String,
    password: String,
}

/// Driver for the graph database's HTTP API
pub struct HttpGraphDriver {
    client: Client,
    endpoint: Arc<Endpoint>,
}

impl HttpGraphDriver {
    /// Create the driver from database settings.
    ///
    /// Fails with [`DriverError::Unavailable`] if a setting is missing or
    /// the URI cannot be mapped to an HTTP endpoint. No network traffic
    /// happens here.
    pub fn new(config: &DatabaseConfig) -> DriverResult<Self> {
        let uri = required(&config.uri, "database URI")?;
        let username = required(&config.username, "database username")?;
        let password = required(&config.password, "database password")?;

        let base = http_base_url(uri)?;
        let commit_url = base
            .join(&format!("db/{}/tx/commit", config.database))
            .map_err(|e| DriverError::Unavailable(format!("invalid database name: {}", e)))?;

        let client = Client::builder()
            .build()
            .map_err(|e| DriverError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: Arc::new(Endpoint {
                commit_url,
                username: username.to_string(),
                password: password.to_string(),
            }),
        })
    }

    /// The endpoint statements are posted to
    pub fn commit_url(&self) -> &Url {
        &self.endpoint.commit_url
    }
}

impl GraphDriver for HttpGraphDriver {
    fn open_session(&self) -> DriverResult<Box<dyn GraphSession>> {
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            endpoint: Arc::clone(&self.endpoint),
            closed: false,
        }))
    }
}

struct HttpSession {
    client: Client,
    endpoint: Arc<Endpoint>,
    closed: bool,
}

impl HttpSession {
    async fn execute(&self, statement: &str, parameters: &Parameters) -> DriverResult<Vec<Record>> {
        let body = CommitRequest {
            statements: [StatementRequest {
                statement,
                parameters,
                result_data_contents: ["row"],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.commit_url.clone())
            .basic_auth(&self.endpoint.username, Some(&self.endpoint.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))?;

        decode_response(status, &text)
    }
}

impl GraphSession for HttpSession {
    fn run<'a>(
        &'a mut self,
        statement: &'a str,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, DriverResult<Vec<Record>>> {
        Box::pin(async move {
            if self.closed {
                return Err(DriverError::SessionClosed);
            }
            self.execute(statement, parameters).await
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        // Auto-commit requests leave no server-side transaction to release.
        self.closed = true;
        Box::pin(async {})
    }
}

// ==================
// Wire Types
// ==================

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: [StatementRequest<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatementRequest<'a> {
    statement: &'a str,
    parameters: &'a Parameters,
    result_data_contents: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

// ==================
// Helper Functions
// ==================

fn required<'a>(value: &'a Option<String>, name: &str) -> DriverResult<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DriverError::Unavailable(format!("{} is not configured", name))),
    }
}

/// Map a driver URI onto the HTTP base URL of the same server.
///
/// `neo4j+s`/`bolt+s` (and their `+ssc` forms) become `https`, plain
/// `neo4j`/`bolt` become `http`. An explicit default bolt port becomes the
/// default HTTP(S) port of the server. A plain `neo4j`/`bolt` URI without
/// a port targets 7474; a secure one without a port keeps the https
/// default, as hosted servers expose it there. `http`/`https` URIs are
/// used unchanged.
pub(crate) fn http_base_url(uri: &str) -> DriverResult<Url> {
    let invalid = |reason: String| DriverError::Unavailable(format!("invalid database URI: {}", reason));

    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme".to_string()))?;

    // (http scheme, bolt URI)
    let (http_scheme, bolt) = match scheme {
        "http" => ("http", false),
        "https" => ("https", false),
        "neo4j" | "bolt" => ("http", true),
        "neo4j+s" | "neo4j+ssc" | "bolt+s" | "bolt+ssc" => ("https", true),
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };

    let mut url = Url::parse(&format!("{}://{}", http_scheme, rest))
        .map_err(|e| invalid(e.to_string()))?;

    if bolt {
        let port = match (http_scheme, url.port()) {
            ("http", None) | ("http", Some(BOLT_PORT)) => Some(HTTP_PORT),
            ("https", Some(BOLT_PORT)) => Some(HTTPS_PORT),
            _ => None,
        };
        if let Some(port) = port {
            url.set_port(Some(port))
                .map_err(|_| invalid("cannot set port".to_string()))?;
        }
    }

    // `join` replaces the last path segment unless the path ends in '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Turn a commit response into records, or the first reported error.
fn decode_response(status: StatusCode, body: &str) -> DriverResult<Vec<Record>> {
    let parsed: CommitResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if status.is_success() => {
            return Err(DriverError::Protocol(format!("undecodable response: {}", e)))
        }
        Err(_) => {
            return Err(DriverError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )))
        }
    };

    if let Some(error) = parsed.errors.into_iter().next() {
        return Err(DriverError::Query {
            code: error.code,
            message: error.message,
        });
    }

    if !status.is_success() {
        return Err(DriverError::Transport(format!("HTTP {}", status.as_u16())));
    }

    let result = parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| DriverError::Protocol("response carried no result".to_string()))?;

    flatten_rows(result)
}

/// Zip the column names with each row into a record.
///
/// A row whose width differs from the column list is a protocol error;
/// no value is dropped or left unnamed.
fn flatten_rows(result: StatementResult) -> DriverResult<Vec<Record>> {
    let StatementResult { columns, data } = result;
    data.into_iter()
        .enumerate()
        .map(|(index, row)| {
            if row.row.len() != columns.len() {
                return Err(DriverError::Protocol(format!(
                    "row {} has {} values for {} columns",
                    index,
                    row.row.len(),
                    columns.len()
                )));
            }
            Ok(columns.iter().cloned().zip(row.row).collect::<Record>())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(uri: &str) -> DatabaseConfig {
        DatabaseConfig {
            uri: Some(uri.to_string()),
            username: Some("neo4j".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_secure_scheme_maps_to_https() {
        let url = http_base_url("neo4j+s://abc123.databases.neo4j.io").unwrap();
        assert_eq!(url.as_str(), "https://abc123.databases.neo4j.io/");
    }

    #[test]
    fn test_bolt_port_maps_to_http_port() {
        let url = http_base_url("bolt://localhost:7687").unwrap();
        assert_eq!(url.as_str(), "http://localhost:7474/");
    }

    #[test]
    fn test_missing_port_maps_to_http_port() {
        let url = http_base_url("neo4j://localhost").unwrap();
        assert_eq!(url.as_str(), "http://localhost:7474/");

        let url = http_base_url("bolt://db.internal").unwrap();
        assert_eq!(url.as_str(), "http://db.internal:7474/");
    }

    #[test]
    fn test_secure_bolt_port_maps_to_https_port() {
        let url = http_base_url("bolt+s://db.internal:7687").unwrap();
        assert_eq!(url.as_str(), "https://db.internal:7473/");

        let url = http_base_url("neo4j+ssc://db.internal:9000").unwrap();
        assert_eq!(url.as_str(), "https://db.internal:9000/");
    }

    #[test]
    fn test_http_uri_kept() {
        let url = http_base_url("http://db.internal:8080/graph").unwrap();
        assert_eq!(url.as_str(), "http://db.internal:8080/graph/");
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        assert!(matches!(
            http_base_url("ftp://localhost"),
            Err(DriverError::Unavailable(_))
        ));
        assert!(matches!(
            http_base_url("localhost:7687"),
            Err(DriverError::Unavailable(_))
        ));
    }

    #[test]
    fn test_commit_url_includes_database() {
        let driver = HttpGraphDriver::new(&config("neo4j://localhost:7687")).unwrap();
        assert_eq!(
            driver.commit_url().as_str(),
            "http://localhost:7474/db/neo4j/tx/commit"
        );
    }

    #[test]
    fn test_missing_credentials_make_driver_unavailable() {
        let mut incomplete = config("neo4j://localhost");
        incomplete.password = None;

        let err = HttpGraphDriver::new(&incomplete).err().unwrap();
        assert_eq!(
            err,
            DriverError::Unavailable("database password is not configured".to_string())
        );
    }

    #[test]
    fn test_request_body_shape() {
        let mut params = Parameters::new();
        params.insert("name".to_string(), json!("Ada"));
        let body = CommitRequest {
            statements: [StatementRequest {
                statement: "MATCH (p {name: $name}) RETURN p",
                parameters: &params,
                result_data_contents: ["row"],
            }],
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "statements": [{
                    "statement": "MATCH (p {name: $name}) RETURN p",
                    "parameters": {"name": "Ada"},
                    "resultDataContents": ["row"]
                }]
            })
        );
    }

    #[test]
    fn test_rows_flattened_in_column_order() {
        let body = r#"{
            "results": [{
                "columns": ["name", "age"],
                "data": [
                    {"row": ["Ada", 36], "meta": [null, null]},
                    {"row": ["Alan", 41], "meta": [null, null]}
                ]
            }],
            "errors": []
        }"#;

        let records = decode_response(StatusCode::OK, body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(Value::Object(records[0].clone()), json!({"name": "Ada", "age": 36}));
        let keys: Vec<_> = records[1].keys().cloned().collect();
        assert_eq!(keys, vec!["name", "age"]);
    }

    #[test]
    fn test_row_width_mismatch_is_protocol_error() {
        let body = r#"{
            "results": [{
                "columns": ["name", "age"],
                "data": [
                    {"row": ["Ada", 36]},
                    {"row": ["Alan"]}
                ]
            }],
            "errors": []
        }"#;

        let err = decode_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(
            err,
            DriverError::Protocol("row 1 has 1 values for 2 columns".to_string())
        );
    }

    #[test]
    fn test_server_error_becomes_query_error() {
        let body = r#"{
            "results": [],
            "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "Invalid input 'I'"}]
        }"#;

        let err = decode_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(
            err,
            DriverError::Query {
                code: "Neo.ClientError.Statement.SyntaxError".to_string(),
                message: "Invalid input 'I'".to_string(),
            }
        );
        assert_eq!(err.to_string(), "Invalid input 'I'");
    }

    #[test]
    fn test_http_failure_becomes_transport_error() {
        let err = decode_response(StatusCode::UNAUTHORIZED, "Unauthorized").unwrap_err();
        assert_eq!(err, DriverError::Transport("HTTP 401: Unauthorized".to_string()));
    }

    #[tokio::test]
    async fn test_closed_session_refuses_to_run() {
        let driver = HttpGraphDriver::new(&config("neo4j://localhost")).unwrap();
        assert_eq!(
            driver.commit_url().as_str(),
            "http://localhost:7474/db/neo4j/tx/commit"
        );
        let mut session = driver.open_session().unwrap();
        session.close().await;
        session.close().await;

        let params = Parameters::new();
        let result = session.run("RETURN 1", &params).await;
        assert_eq!(result, Err(DriverError::SessionClosed));
    }
}
