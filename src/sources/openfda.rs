//! OpenFDA FAERS client: remote adverse-event lookup for drugs with no
//! locally stored reports.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::Deserialize;

use crate::error::SafeWatchError;

const OPENFDA_BASE: &str = "https://api.fda.gov";
const OPENFDA_API: &str = "openfda";
const OPENFDA_BASE_ENV: &str = "SAFEWATCH_OPENFDA_BASE";

const REACTIONS_PER_SUMMARY: usize = 3;

pub struct OpenFdaClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
    api_key: Option<String>,
}

impl OpenFdaClient {
    pub fn new() -> Result<Self, SafeWatchError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(OPENFDA_BASE, OPENFDA_BASE_ENV),
            api_key: std::env::var("OPENFDA_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    #[cfg(test)]
    fn new_for_test(base: String, api_key: Option<String>) -> Result<Self, SafeWatchError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base),
            api_key: api_key
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Searches FAERS for reports where `drug` appears as a suspect
    /// medication. A 404 from OpenFDA means no matching reports.
    pub async fn faers_search(
        &self,
        drug: &str,
        limit: usize,
    ) -> Result<Option<OpenFdaResponse<FaersEventResult>>, SafeWatchError> {
        let drug = drug.trim();
        if drug.is_empty() {
            return Err(SafeWatchError::InvalidArgument(
                "Drug name is required for a FAERS lookup.".into(),
            ));
        }
        if drug.len() > 256 {
            return Err(SafeWatchError::InvalidArgument(
                "Drug name is too long.".into(),
            ));
        }
        if limit == 0 || limit > 50 {
            return Err(SafeWatchError::InvalidArgument(
                "FAERS limit must be between 1 and 50".into(),
            ));
        }

        let escaped = escape_query_value(drug);
        let query = format!(
            "(patient.drug.openfda.generic_name:\"{escaped}\" OR patient.drug.openfda.brand_name:\"{escaped}\" OR patient.drug.medicinalproduct:\"{escaped}\")"
        );

        let url = self.endpoint("drug/event.json");
        let mut req = self
            .client
            .get(&url)
            .query(&[("search", query.as_str()), ("limit", &limit.to_string())]);
        if let Some(key) = self.api_key.as_deref() {
            req = req.query(&[("api_key", key)]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, OPENFDA_API).await?;

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(SafeWatchError::Api {
                api: OPENFDA_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SafeWatchError::ApiJson {
                api: OPENFDA_API.to_string(),
                source,
            })
    }

    /// One-line summaries of recent FAERS reports for a drug, shaped
    /// `Report <id>: <reactions>`.
    pub async fn recent_summaries(
        &self,
        drug: &str,
        limit: usize,
    ) -> Result<Vec<String>, SafeWatchError> {
        let Some(resp) = self.faers_search(drug, limit).await? else {
            return Ok(Vec::new());
        };
        Ok(resp.results.iter().map(faers_summary).collect())
    }
}

fn faers_summary(result: &FaersEventResult) -> String {
    let reactions = reactions_from_patient(result.patient.as_ref(), REACTIONS_PER_SUMMARY);
    if reactions.is_empty() {
        format!("Report {}: Unknown", result.safetyreportid)
    } else {
        format!("Report {}: {}", result.safetyreportid, reactions.join(", "))
    }
}

fn reactions_from_patient(patient: Option<&FaersPatient>, limit: usize) -> Vec<String> {
    let Some(patient) = patient else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for rx in &patient.reaction {
        let Some(term) = rx
            .reactionmeddrapt
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            continue;
        };
        let key = term.to_ascii_lowercase();
        if !seen.insert(key) {
            continue;
        }
        out.push(term.to_string());
        if out.len() >= limit {
            break;
        }
    }

    out
}

/// Escapes a user-provided value for OpenFDA's Lucene-like query syntax.
/// Conservative on purpose: user input must not change query semantics.
fn escape_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '+' | '-' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~' | '*'
            | '?' | ':' | '/' | '&' | '|' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Debug, Deserialize)]
pub struct OpenFdaResponse<T> {
    #[allow(dead_code)]
    pub meta: serde_json::Value,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaersEventResult {
    pub safetyreportid: String,
    #[serde(default)]
    pub patient: Option<FaersPatient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaersPatient {
    #[serde(default)]
    pub reaction: Vec<FaersReaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaersReaction {
    #[serde(default)]
    pub reactionmeddrapt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn escape_query_value_escapes_lucene_special_chars() {
        assert_eq!(
            escape_query_value(r#"PD-1 "checkpoint"\test"#),
            r#"PD\-1 \"checkpoint\"\\test"#
        );
    }

    #[test]
    fn faers_summary_joins_deduplicated_reactions() {
        let result = FaersEventResult {
            safetyreportid: "12345".into(),
            patient: Some(FaersPatient {
                reaction: vec![
                    FaersReaction {
                        reactionmeddrapt: Some("Nausea".into()),
                    },
                    FaersReaction {
                        reactionmeddrapt: Some("nausea".into()),
                    },
                    FaersReaction {
                        reactionmeddrapt: Some("Headache".into()),
                    },
                ],
            }),
        };

        assert_eq!(faers_summary(&result), "Report 12345: Nausea, Headache");
    }

    #[test]
    fn faers_summary_without_reactions_reads_unknown() {
        let result = FaersEventResult {
            safetyreportid: "9".into(),
            patient: None,
        };
        assert_eq!(faers_summary(&result), "Report 9: Unknown");
    }

    #[tokio::test]
    async fn faers_search_validates_limit_bounds() {
        let client = OpenFdaClient::new_for_test("http://127.0.0.1".into(), None).unwrap();
        let err = client.faers_search("aspirin", 0).await.unwrap_err();
        assert!(matches!(err, SafeWatchError::InvalidArgument(_)));

        let err = client.faers_search("aspirin", 51).await.unwrap_err();
        assert!(matches!(err, SafeWatchError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn faers_search_rejects_empty_drug() {
        let client = OpenFdaClient::new_for_test("http://127.0.0.1".into(), None).unwrap();
        let err = client.faers_search("   ", 5).await.unwrap_err();
        assert!(matches!(err, SafeWatchError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn recent_summaries_hits_event_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drug/event.json"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {"results": {"skip": 0, "limit": 5, "total": 1}},
                "results": [{
                    "safetyreportid": "777",
                    "patient": {"reaction": [{"reactionmeddrapt": "Rash"}]}
                }]
            })))
            .mount(&server)
            .await;

        let client = OpenFdaClient::new_for_test(server.uri(), None).unwrap();
        let summaries = client.recent_summaries("aspirin", 5).await.unwrap();
        assert_eq!(summaries, vec!["Report 777: Rash"]);
    }

    #[tokio::test]
    async fn faers_search_treats_404_as_no_reports() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drug/event.json"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": "NOT_FOUND", "message": "No matches found!"}
            })))
            .mount(&server)
            .await;

        let client = OpenFdaClient::new_for_test(server.uri(), None).unwrap();
        let resp = client.faers_search("nonexistentdrug", 5).await.unwrap();
        assert!(resp.is_none());
        let summaries = client.recent_summaries("nonexistentdrug", 5).await.unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn faers_search_includes_api_key_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drug/event.json"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {},
                "results": [{"safetyreportid": "1"}]
            })))
            .mount(&server)
            .await;

        let client = OpenFdaClient::new_for_test(server.uri(), Some("test-key".into())).unwrap();
        let resp = client.faers_search("aspirin", 5).await.unwrap();
        assert!(resp.is_some());
    }
}
