//! Translation of request meta into a Zyte API payload
//!
//! Starts from the fixed base `{url, browserHtml: true}`, merges the
//! caller's allowed parameters without letting them override the base,
//! then tags the payload with the crawl's job id.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::error::ParamsError;
use crate::types::json_type_name;

/// Parameters callers may pass through request meta
pub const ALLOWED_PARAMS: [&str; 3] = ["javascript", "geolocation", "echoData"];

/// Payload field holding the target URL
pub const URL_FIELD: &str = "url";

/// Payload field requesting rendered HTML
pub const BROWSER_HTML_FIELD: &str = "browserHtml";

/// Payload field tagging calls with the crawl's job id
pub const JOB_ID_FIELD: &str = "jobId";

/// JSON body sent to Zyte API
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ApiPayload(Map<String, Value>);

impl ApiPayload {
    /// Base payload for a URL: `{url, browserHtml: true}`
    pub fn new(url: &Url) -> Self {
        let mut fields = Map::new();
        fields.insert(URL_FIELD.to_string(), Value::String(url.to_string()));
        fields.insert(BROWSER_HTML_FIELD.to_string(), Value::Bool(true));
        Self(fields)
    }

    /// Look up a payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the payload contains a field
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Borrow the payload as a JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn insert(&mut self, key: String, value: Value) {
        self.0.insert(key, value);
    }
}

/// Why a caller-supplied parameter was left out of the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Key is not in [`ALLOWED_PARAMS`]
    NotAllowed,
    /// Key would overwrite a field already in the payload
    Reserved,
}

/// A caller-supplied parameter that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedParam {
    pub key: String,
    pub reason: SkipReason,
}

/// Result of translating request meta into a payload
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadBuild {
    /// Payload ready to send
    pub payload: ApiPayload,

    /// Parameters that were dropped, each already logged as a warning
    pub skipped: Vec<SkippedParam>,
}

/// Whether a key may be passed through to Zyte API
pub fn is_allowed_param(key: &str) -> bool {
    ALLOWED_PARAMS.contains(&key)
}

/// Build the Zyte API payload for a request
///
/// # Arguments
/// * `url` - Target URL of the request
/// * `params` - Raw parameters from request meta
/// * `job_id` - Job id of the running crawl, if configured
///
/// # Returns
/// The payload plus the list of skipped parameters. Every skipped
/// parameter is also logged as a warning.
///
/// # Errors
/// - `NotAMapping` if `params` is not a JSON object
///
/// # Example
/// ```
/// use serde_json::json;
/// use zyte_render_core::build_api_payload;
/// let url = "https://example.com".parse().unwrap();
/// let build = build_api_payload(&url, &json!({"geolocation": "DE", "foo": 1}), None).unwrap();
/// assert_eq!(build.payload.get("geolocation"), Some(&json!("DE")));
/// assert!(!build.payload.contains_key("foo"));
/// assert_eq!(build.skipped.len(), 1);
/// ```
pub fn build_api_payload(
    url: &Url,
    params: &Value,
    job_id: Option<&str>,
) -> Result<PayloadBuild, ParamsError> {
    build_with_allowed(url, params, job_id, &ALLOWED_PARAMS)
}

fn build_with_allowed(
    url: &Url,
    params: &Value,
    job_id: Option<&str>,
    allowed: &[&str],
) -> Result<PayloadBuild, ParamsError> {
    let params = params
        .as_object()
        .ok_or_else(|| ParamsError::NotAMapping(json_type_name(params)))?;

    let mut payload = ApiPayload::new(url);
    let mut skipped = Vec::new();

    for (key, value) in params {
        if !allowed.contains(&key.as_str()) {
            warn!("Key `{key}` isn't allowed in Zyte API parameters, skipping ({url}).");
            skipped.push(SkippedParam {
                key: key.clone(),
                reason: SkipReason::NotAllowed,
            });
            continue;
        }
        if let Some(existing) = payload.get(key) {
            warn!(
                "Key `{key}` is already in Zyte API parameters ({existing}) and can't be overwritten, skipping ({url})."
            );
            skipped.push(SkippedParam {
                key: key.clone(),
                reason: SkipReason::Reserved,
            });
            continue;
        }
        payload.insert(key.clone(), value.clone());
    }

    if let Some(job_id) = job_id {
        payload.insert(JOB_ID_FIELD.to_string(), Value::String(job_id.to_string()));
    }

    Ok(PayloadBuild { payload, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_base_payload() {
        let build = build_api_payload(&url(), &json!({}), None).unwrap();
        assert_eq!(
            serde_json::to_value(&build.payload).unwrap(),
            json!({"url": "https://example.com/page", "browserHtml": true})
        );
        assert!(build.skipped.is_empty());
    }

    #[test]
    fn test_allowed_params_merged() {
        let params = json!({
            "javascript": false,
            "geolocation": "US",
            "echoData": {"page": 3},
        });
        let build = build_api_payload(&url(), &params, None).unwrap();
        assert_eq!(build.payload.get("javascript"), Some(&json!(false)));
        assert_eq!(build.payload.get("geolocation"), Some(&json!("US")));
        assert_eq!(build.payload.get("echoData"), Some(&json!({"page": 3})));
    }

    #[test]
    fn test_reserved_keys_not_overwritten() {
        let params = json!({"url": "https://evil.example", "browserHtml": false});
        let build = build_api_payload(&url(), &params, None).unwrap();
        assert_eq!(
            build.payload.get("url"),
            Some(&json!("https://example.com/page"))
        );
        assert_eq!(build.payload.get("browserHtml"), Some(&json!(true)));
        assert_eq!(build.skipped.len(), 2);
    }

    #[test]
    fn test_allowed_key_cannot_overwrite_base() {
        let params = json!({"url": "https://evil.example", "javascript": true});
        let build =
            build_with_allowed(&url(), &params, None, &["url", "javascript"]).unwrap();
        assert_eq!(
            build.payload.get("url"),
            Some(&json!("https://example.com/page"))
        );
        assert_eq!(build.payload.get("javascript"), Some(&json!(true)));
        assert_eq!(
            build.skipped,
            vec![SkippedParam {
                key: "url".to_string(),
                reason: SkipReason::Reserved,
            }]
        );
    }

    #[test]
    fn test_unknown_key_skipped() {
        let build = build_api_payload(&url(), &json!({"httpResponseBody": true}), None).unwrap();
        assert!(!build.payload.contains_key("httpResponseBody"));
        assert_eq!(
            build.skipped,
            vec![SkippedParam {
                key: "httpResponseBody".to_string(),
                reason: SkipReason::NotAllowed,
            }]
        );
    }

    #[test]
    fn test_non_mapping_params_rejected() {
        for (value, name) in [
            (json!(true), "boolean"),
            (json!(["javascript"]), "array"),
            (json!("javascript"), "string"),
            (json!(1), "number"),
        ] {
            let result = build_api_payload(&url(), &value, None);
            assert_eq!(result, Err(ParamsError::NotAMapping(name)));
        }
    }

    #[test]
    fn test_job_id_attached() {
        let build = build_api_payload(&url(), &json!({"javascript": true}), Some("1/2/3")).unwrap();
        assert_eq!(build.payload.get("jobId"), Some(&json!("1/2/3")));
    }

    #[test]
    fn test_job_id_absent_when_unset() {
        let build = build_api_payload(&url(), &json!({"javascript": true}), None).unwrap();
        assert!(!build.payload.contains_key("jobId"));
    }

    #[test]
    fn test_job_id_not_settable_from_meta() {
        let build = build_api_payload(&url(), &json!({"jobId": "fake"}), None).unwrap();
        assert!(!build.payload.contains_key("jobId"));
        assert_eq!(build.skipped[0].reason, SkipReason::NotAllowed);
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn prop_allowed_keys_pass_through_unchanged(
            key in prop::sample::select(ALLOWED_PARAMS.to_vec()),
            value in json_leaf(),
        ) {
            let mut params = Map::new();
            params.insert(key.to_string(), value.clone());
            let build = build_api_payload(&url(), &Value::Object(params), None).unwrap();
            prop_assert_eq!(build.payload.get(key), Some(&value));
            prop_assert!(build.skipped.is_empty());
        }

        #[test]
        fn prop_disallowed_keys_are_dropped_with_warning(
            key in "[a-zA-Z_]{1,16}",
            value in json_leaf(),
        ) {
            prop_assume!(!is_allowed_param(&key));
            prop_assume!(key != URL_FIELD && key != BROWSER_HTML_FIELD);
            let mut params = Map::new();
            params.insert(key.clone(), value);
            let build = build_api_payload(&url(), &Value::Object(params), None).unwrap();
            prop_assert!(!build.payload.contains_key(&key));
            prop_assert_eq!(build.skipped.len(), 1);
            prop_assert_eq!(build.skipped[0].reason, SkipReason::NotAllowed);
        }

        #[test]
        fn prop_non_mapping_params_never_panic(value in json_leaf()) {
            let result = build_api_payload(&url(), &value, None);
            prop_assert!(result.is_err());
        }

        #[test]
        fn prop_job_id_presence_follows_config(
            job_id in proptest::option::of("[0-9]{1,4}/[0-9]{1,4}/[0-9]{1,4}"),
            javascript in any::<bool>(),
        ) {
            let params = json!({"javascript": javascript});
            let build = build_api_payload(&url(), &params, job_id.as_deref()).unwrap();
            match job_id {
                Some(id) => {
                    prop_assert_eq!(build.payload.get("jobId"), Some(&json!(id)));
                }
                None => {
                    prop_assert!(!build.payload.contains_key("jobId"));
                }
            }
        }
    }
}
