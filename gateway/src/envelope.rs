//! Invocation envelopes.
//!
//! The same function can be invoked by an agent action group, through API
//! Gateway, or directly with a flat JSON object. Each known shape is decoded
//! into one flat [`Params`] map at the boundary; the reply goes back in the
//! shape the caller used.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{Error, Result};

/// One `{name, value}` entry of an action group parameter list. The declared `type` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// The recognised invocation shapes.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// `requestBody.content["application/json"].properties[]`
    RequestBody(Vec<Parameter>),
    /// Top-level `parameters[]`
    ParameterList(Vec<Parameter>),
    /// `actionGroup.parameters[]`
    NestedParameterList(Vec<Parameter>),
    /// API Gateway proxy event with a JSON string `body`
    HttpBody(String),
    /// The event itself is the parameter object
    Direct(Map<String, Value>),
}

impl Envelope {
    /// Recognise the envelope shape of a raw event. First match wins.
    pub fn detect(event: &Value) -> Result<Self> {
        if let Some(properties) = event
            .pointer("/requestBody/content/application~1json/properties")
        {
            return Ok(Self::RequestBody(parameter_list(properties)?));
        }
        if let Some(parameters) = event.get("parameters").filter(|p| p.is_array()) {
            return Ok(Self::ParameterList(parameter_list(parameters)?));
        }
        if let Some(parameters) = event.pointer("/actionGroup/parameters") {
            return Ok(Self::NestedParameterList(parameter_list(parameters)?));
        }
        if let Some(body) = event.get("body").and_then(Value::as_str) {
            return Ok(Self::HttpBody(body.to_string()));
        }
        match event {
            Value::Object(map) => Ok(Self::Direct(map.clone())),
            Value::Null => Ok(Self::Direct(Map::new())),
            _ => Err(Error::Validation(
                "Invocation event must be a JSON object".to_string(),
            )),
        }
    }

    /// Whether the reply must use the action group response shape.
    pub fn is_action_group(&self) -> bool {
        matches!(
            self,
            Self::RequestBody(_) | Self::ParameterList(_) | Self::NestedParameterList(_)
        )
    }

    /// Flatten into a parameter map.
    pub fn into_params(self) -> Result<Params> {
        let map = match self {
            Self::RequestBody(list) | Self::ParameterList(list) | Self::NestedParameterList(list) => list
                .into_iter()
                .map(|p| (p.name, p.value))
                .collect(),
            Self::HttpBody(body) => match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(Error::Validation(
                        "Request body must be a JSON object".to_string(),
                    ))
                }
                Err(e) => {
                    return Err(Error::Validation(format!(
                        "Invalid JSON in request body: {}",
                        e
                    )))
                }
            },
            Self::Direct(map) => map,
        };
        Ok(Params(map))
    }
}

fn parameter_list(value: &Value) -> Result<Vec<Parameter>> {
    Vec::<Parameter>::deserialize(value)
        .map_err(|e| Error::Validation(format!("Malformed parameter list: {}", e)))
}

/// Flat, name-addressed invocation parameters.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Map<String, Value>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Trimmed text of a parameter; numbers and booleans are rendered as text.
    /// Blank strings count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        let text = match self.get(name)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// First present, non-blank text among several aliases.
    pub fn text_any(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.text(name))
    }
}

/// Echoed routing fields of an action group invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
}

impl Route {
    /// Take the caller's routing fields, falling back to the function's defaults.
    pub fn from_event(event: &Value, default_group: &str, default_path: &str) -> Self {
        let field = |name: &str, default: &str| {
            event
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        Self {
            action_group: field("actionGroup", default_group),
            api_path: field("apiPath", default_path),
            http_method: field("httpMethod", "POST"),
        }
    }
}

/// Reply shape chosen from the request shape.
#[derive(Debug, Clone)]
pub enum Reply {
    ActionGroup(Route),
    Http,
}

impl Reply {
    /// Wrap a JSON body with a status code in the matching envelope.
    pub fn render<T: Serialize>(&self, status: u16, body: &T) -> Value {
        let body = serde_json::to_string(body).unwrap_or_else(|e| {
            let err = Error::Internal(Error::from(e).to_string());
            tracing::error!("Failed to render reply: {}", err);
            json!({ "success": false, "error": err.to_string() }).to_string()
        });
        match self {
            Reply::ActionGroup(route) => json!({
                "messageVersion": "1.0",
                "response": {
                    "actionGroup": route.action_group,
                    "apiPath": route.api_path,
                    "httpMethod": route.http_method,
                    "httpStatusCode": status,
                    "responseBody": {
                        "application/json": {
                            "body": body
                        }
                    }
                }
            }),
            Reply::Http => json!({
                "statusCode": status,
                "body": body
            }),
        }
    }
}

/// A decoded invocation: parameters plus the reply shape to answer with.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub params: Params,
    pub reply: Reply,
}

impl Invocation {
    /// Decode a raw event. On failure the reply shape is still returned so the
    /// error can be rendered the way the caller expects.
    pub fn decode(
        event: &Value,
        default_group: &str,
        default_path: &str,
    ) -> std::result::Result<Self, (Reply, Error)> {
        let envelope = match Envelope::detect(event) {
            Ok(envelope) => envelope,
            Err(e) => return Err((Reply::Http, e)),
        };
        let reply = if envelope.is_action_group() {
            Reply::ActionGroup(Route::from_event(event, default_group, default_path))
        } else {
            Reply::Http
        };
        match envelope.into_params() {
            Ok(params) => Ok(Self { params, reply }),
            Err(e) => Err((reply, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let event = json!({
            "actionGroup": "ExecuteSqlQueryActionGroup",
            "apiPath": "/execute_sql_query",
            "requestBody": {"content": {"application/json": {"properties": [
                {"name": "sql_query", "type": "string", "value": "SELECT 1"},
                {"name": "org_id", "type": "string", "value": "default"}
            ]}}}
        });
        let envelope = Envelope::detect(&event).unwrap();
        assert!(matches!(envelope, Envelope::RequestBody(_)));
        assert!(envelope.is_action_group());
        let params = envelope.into_params().unwrap();
        assert_eq!(params.text_any(&["sql_query", "query"]).as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_parameter_list_shapes() {
        let top = json!({"parameters": [{"name": "customer", "value": "Customer A"}]});
        assert!(matches!(Envelope::detect(&top).unwrap(), Envelope::ParameterList(_)));

        let nested = json!({"actionGroup": {"parameters": [{"name": "customer", "value": "all"}]}});
        let envelope = Envelope::detect(&nested).unwrap();
        assert!(matches!(envelope, Envelope::NestedParameterList(_)));
        assert_eq!(envelope.into_params().unwrap().text("customer").as_deref(), Some("all"));
    }

    #[test]
    fn test_http_body_shape() {
        let event = json!({"body": "{\"query\": \"SELECT 1\", \"org_id\": \"o\"}"});
        let envelope = Envelope::detect(&event).unwrap();
        assert!(!envelope.is_action_group());
        let params = envelope.into_params().unwrap();
        assert_eq!(params.text("org_id").as_deref(), Some("o"));
    }

    #[test]
    fn test_http_body_invalid_json() {
        let event = json!({"body": "{not json"});
        let err = Envelope::detect(&event).unwrap().into_params().unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().starts_with("Invalid JSON in request body"));
    }

    #[test]
    fn test_direct_shape_and_text_rendering() {
        let event = json!({"query": "  SELECT 1  ", "timeout": 45, "org_id": "   "});
        let params = Envelope::detect(&event).unwrap().into_params().unwrap();
        assert_eq!(params.text("query").as_deref(), Some("SELECT 1"));
        assert_eq!(params.text("timeout").as_deref(), Some("45"));
        assert_eq!(params.text("org_id"), None);
        assert_eq!(params.text("missing"), None);
    }

    #[test]
    fn test_reply_shapes() {
        let route = Route::from_event(&json!({"apiPath": "/get_kpi_data"}), "GetKpiDataActionGroup", "/x");
        assert_eq!(route.action_group, "GetKpiDataActionGroup");
        assert_eq!(route.api_path, "/get_kpi_data");
        assert_eq!(route.http_method, "POST");

        let agent = Reply::ActionGroup(route).render(403, &json!({"success": false}));
        assert_eq!(agent["messageVersion"], "1.0");
        assert_eq!(agent["response"]["httpStatusCode"], 403);
        let body = agent["response"]["responseBody"]["application/json"]["body"]
            .as_str()
            .unwrap();
        assert_eq!(body, r#"{"success":false}"#);

        let http = Reply::Http.render(200, &json!({"success": true}));
        assert_eq!(http["statusCode"], 200);
        assert_eq!(http["body"], r#"{"success":true}"#);
    }

    #[test]
    fn test_decode_keeps_reply_shape_on_error() {
        let (reply, err) = Invocation::decode(&json!({"body": "[1]"}), "G", "/p").unwrap_err();
        assert!(matches!(reply, Reply::Http));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_non_object_event_replies_in_http_shape() {
        let (reply, e) = Invocation::decode(&json!([1, 2]), "Group", "/path").unwrap_err();
        assert_eq!(e.status_code(), 400);
        let rendered = reply.render(e.status_code(), &json!({"success": false}));
        assert_eq!(rendered["statusCode"], 400);
        assert!(rendered.get("messageVersion").is_none());
    }
}
