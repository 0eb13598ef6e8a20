//! Intrinsic function helpers.
//!
//! Each helper returns the JSON form the deployment engine resolves at deploy
//! time. None of them evaluate anything locally.

use serde_json::{json, Value};

/// `{ "Ref": id }`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Sub": template }`
pub fn sub(template: impl Into<String>) -> Value {
    json!({ "Fn::Sub": template.into() })
}

/// `{ "Fn::Sub": [template, variables] }`
pub fn sub_with(template: impl Into<String>, variables: Value) -> Value {
    json!({ "Fn::Sub": [template.into(), variables] })
}

/// `{ "Fn::Join": [delimiter, parts] }`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{ "Fn::Select": [index, list] }`
pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index.to_string(), list] })
}

/// `{ "Fn::Split": [delimiter, source] }`
pub fn split(delimiter: &str, source: Value) -> Value {
    json!({ "Fn::Split": [delimiter, source] })
}

/// Host part of a URL-valued attribute, e.g. a function URL
/// `https://abc.lambda-url.us-east-1.on.aws/` → `abc.lambda-url.us-east-1.on.aws`.
pub fn url_host(url: Value) -> Value {
    select(2, split("/", url))
}

/// URL on the default endpoint of an API Gateway API.
///
/// `path` is appended verbatim and should start with `/` when not empty.
pub fn execute_api_url(scheme: &str, api_logical_id: &str, path: &str) -> Value {
    sub(format!(
        "{scheme}://${{{api_logical_id}}}.execute-api.${{AWS::Region}}.${{AWS::URLSuffix}}{path}"
    ))
}
