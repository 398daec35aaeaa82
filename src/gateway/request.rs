//! Request normalization
//!
//! The body accepts loosely typed fields:
//!
//! ```json
//! {"statement": "...", "statements": ["...", "..."] | "a; b", "parameters": {...} | "{...}"}
//! ```
//!
//! [`normalize`] resolves them into one [`ExecutionPlan`] before anything
//! touches the database, so the dispatcher never inspects raw input.

use serde::Deserialize;
use serde_json::Value;

use crate::config::ExecutionLimits;
use crate::driver::Parameters;

use super::errors::{GatewayError, GatewayResult};

/// Raw request body
#[derive(Debug, Default, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub statement: Option<String>,

    #[serde(default)]
    pub statements: Option<StatementsInput>,

    #[serde(default)]
    pub parameters: Option<ParametersInput>,
}

/// `statements` as sent by the caller
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StatementsInput {
    /// Already split, used as-is
    List(Vec<String>),
    /// Several statements separated by `;`
    Delimited(String),
}

/// `parameters` as sent by the caller
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParametersInput {
    Structured(Parameters),
    /// A JSON object encoded as a string
    Encoded(String),
}

/// What the dispatcher will run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionPlan {
    /// Run every statement in order, without parameters
    Batch(Vec<String>),
    /// Run one statement with bound parameters and return its records
    Single {
        statement: String,
        parameters: Parameters,
    },
}

impl ExecutionPlan {
    /// Short name used in logs
    pub fn mode(&self) -> &'static str {
        match self {
            ExecutionPlan::Batch(_) => "batch",
            ExecutionPlan::Single { .. } => "single",
        }
    }

    /// Number of statements the plan will run
    pub fn statement_count(&self) -> usize {
        match self {
            ExecutionPlan::Batch(statements) => statements.len(),
            ExecutionPlan::Single { .. } => 1,
        }
    }
}

impl RequestEnvelope {
    /// Decode a request body.
    ///
    /// An empty body decodes to an empty envelope, which [`normalize`]
    /// then rejects for carrying no statement.
    pub fn from_slice(body: &[u8]) -> GatewayResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| GatewayError::InvalidBody(e.to_string()))
    }
}

/// Resolve an envelope into an execution plan.
///
/// Parameters are resolved first, so an undecodable parameter string is
/// rejected even when the request turns out to be a batch. A batch wins
/// over a single statement when both are present.
pub fn normalize(envelope: RequestEnvelope, limits: &ExecutionLimits) -> GatewayResult<ExecutionPlan> {
    let parameters = resolve_parameters(envelope.parameters)?;

    let batch = envelope
        .statements
        .map(split_statements)
        .filter(|statements| !statements.is_empty());

    if let Some(statements) = batch {
        if statements.len() > limits.max_batch_statements {
            return Err(GatewayError::BatchTooLarge {
                count: statements.len(),
                max: limits.max_batch_statements,
            });
        }
        return Ok(ExecutionPlan::Batch(statements));
    }

    match envelope.statement {
        Some(statement) if !statement.is_empty() => Ok(ExecutionPlan::Single {
            statement,
            parameters: parameters.unwrap_or_default(),
        }),
        _ => Err(GatewayError::MissingStatement),
    }
}

/// Turn `statements` into an ordered list.
///
/// A list is taken as-is. A delimited string is split on `;`, each
/// fragment trimmed, and blank fragments dropped.
pub fn split_statements(input: StatementsInput) -> Vec<String> {
    match input {
        StatementsInput::List(statements) => statements,
        StatementsInput::Delimited(text) => text
            .split(';')
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Turn `parameters` into a map, or `None` when there are none.
///
/// A blank string means no parameters; `"null"` likewise. Any other
/// string must decode to a JSON object.
pub fn resolve_parameters(input: Option<ParametersInput>) -> GatewayResult<Option<Parameters>> {
    let encoded = match input {
        None => return Ok(None),
        Some(ParametersInput::Structured(parameters)) => return Ok(Some(parameters)),
        Some(ParametersInput::Encoded(encoded)) => encoded,
    };

    if encoded.trim().is_empty() {
        return Ok(None);
    }

    let invalid = |details: String| GatewayError::InvalidParameters {
        details,
        received: encoded.clone(),
    };

    match serde_json::from_str::<Value>(&encoded) {
        Ok(Value::Object(parameters)) => Ok(Some(parameters)),
        Ok(Value::Null) => Ok(None),
        Ok(other) => Err(invalid(format!(
            "parameters must decode to a JSON object, got {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(invalid(e.to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(body: Value) -> RequestEnvelope {
        serde_json::from_value(body).unwrap()
    }

    fn plan(body: Value) -> GatewayResult<ExecutionPlan> {
        normalize(envelope(body), &ExecutionLimits::default())
    }

    #[test]
    fn test_single_statement_without_parameters() {
        assert_eq!(
            plan(json!({"statement": "RETURN 1 AS x"})).unwrap(),
            ExecutionPlan::Single {
                statement: "RETURN 1 AS x".to_string(),
                parameters: Parameters::new(),
            }
        );
    }

    #[test]
    fn test_structured_parameters() {
        let result = plan(json!({
            "statement": "MATCH (p {name: $name}) RETURN p",
            "parameters": {"name": "Ada", "limit": 3}
        }))
        .unwrap();

        match result {
            ExecutionPlan::Single { parameters, .. } => {
                assert_eq!(parameters["name"], "Ada");
                assert_eq!(parameters["limit"], 3);
            }
            other => panic!("expected single plan, got {:?}", other),
        }
    }

    #[test]
    fn test_encoded_parameters_decoded() {
        let result = plan(json!({
            "statement": "RETURN $n",
            "parameters": "{\"n\": [1, 2]}"
        }))
        .unwrap();

        match result {
            ExecutionPlan::Single { parameters, .. } => assert_eq!(parameters["n"], json!([1, 2])),
            other => panic!("expected single plan, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_encoded_parameters_mean_none() {
        assert_eq!(resolve_parameters(Some(ParametersInput::Encoded("  ".to_string()))), Ok(None));
        assert_eq!(resolve_parameters(Some(ParametersInput::Encoded("null".to_string()))), Ok(None));
    }

    #[test]
    fn test_invalid_encoded_parameters_rejected_with_original() {
        let err = plan(json!({"statement": "RETURN 1", "parameters": "{name: 'Ada'}"})).unwrap_err();

        match err {
            GatewayError::InvalidParameters { details, received } => {
                assert!(!details.is_empty());
                assert_eq!(received, "{name: 'Ada'}");
            }
            other => panic!("expected invalid parameters, got {:?}", other),
        }
    }

    #[test]
    fn test_encoded_parameters_must_be_object() {
        let err = resolve_parameters(Some(ParametersInput::Encoded("[1, 2]".to_string()))).unwrap_err();
        assert_eq!(
            err,
            GatewayError::InvalidParameters {
                details: "parameters must decode to a JSON object, got an array".to_string(),
                received: "[1, 2]".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_parameters_rejected_on_batch_path() {
        let err = plan(json!({"statements": ["CREATE (a)"], "parameters": "{"})).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidParameters { .. }));
    }

    #[test]
    fn test_delimited_statements_split_and_trimmed() {
        assert_eq!(
            plan(json!({"statements": "CREATE (a) ;CREATE (b)"})).unwrap(),
            ExecutionPlan::Batch(vec!["CREATE (a)".to_string(), "CREATE (b)".to_string()])
        );
        assert_eq!(
            split_statements(StatementsInput::Delimited(" ; CREATE (a);\n;  ".to_string())),
            vec!["CREATE (a)"]
        );
    }

    #[test]
    fn test_statement_list_used_as_is() {
        assert_eq!(
            plan(json!({"statements": ["MATCH (n) RETURN n", " CREATE (b) "]})).unwrap(),
            ExecutionPlan::Batch(vec!["MATCH (n) RETURN n".to_string(), " CREATE (b) ".to_string()])
        );
    }

    #[test]
    fn test_batch_wins_over_single() {
        let result = plan(json!({"statement": "RETURN 1", "statements": ["CREATE (a)"]})).unwrap();
        assert_eq!(result.mode(), "batch");
        assert_eq!(result.statement_count(), 1);
    }

    #[test]
    fn test_empty_batch_falls_through_to_single() {
        let result = plan(json!({"statement": "RETURN 1", "statements": " ; ;"})).unwrap();
        assert_eq!(result.mode(), "single");

        let result = plan(json!({"statement": "RETURN 1", "statements": []})).unwrap();
        assert_eq!(result.mode(), "single");
    }

    #[test]
    fn test_missing_statement_rejected() {
        assert_eq!(plan(json!({})).unwrap_err(), GatewayError::MissingStatement);
        assert_eq!(plan(json!({"statement": ""})).unwrap_err(), GatewayError::MissingStatement);
        assert_eq!(
            plan(json!({"statements": ";;", "parameters": {"a": 1}})).unwrap_err(),
            GatewayError::MissingStatement
        );
        assert_eq!(
            plan(json!({"statement": null, "statements": null})).unwrap_err(),
            GatewayError::MissingStatement
        );
    }

    #[test]
    fn test_batch_limit_enforced() {
        let limits = ExecutionLimits {
            max_batch_statements: 2,
            ..Default::default()
        };
        let err = normalize(envelope(json!({"statements": "A; B; C"})), &limits).unwrap_err();
        assert_eq!(err, GatewayError::BatchTooLarge { count: 3, max: 2 });
    }

    #[test]
    fn test_body_decoding() {
        assert!(RequestEnvelope::from_slice(b"").unwrap().statement.is_none());
        assert!(matches!(
            RequestEnvelope::from_slice(b"not json"),
            Err(GatewayError::InvalidBody(_))
        ));
        assert!(matches!(
            RequestEnvelope::from_slice(br#"{"statement": 5}"#),
            Err(GatewayError::InvalidBody(_))
        ));
        assert!(matches!(
            RequestEnvelope::from_slice(br#"{"parameters": 5, "statement": "RETURN 1"}"#),
            Err(GatewayError::InvalidBody(_))
        ));
    }
}
