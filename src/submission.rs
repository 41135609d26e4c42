//! Form submissions attached to navigations and fetches.
//!
//! A caller describes a submission with [`SubmitOptions`] (method, encoding,
//! body). Before anything runs, the router normalizes it into a
//! [`Submission`]: the body is converted to the representation its encoding
//! implies, the form action is fixed to the target path, and GET submissions
//! are folded into the URL's query string.

use crate::error::InternalError;
use crate::params::{has_naked_index_query, FormData, SearchParams};
use crate::path::{parse_path, strip_hash, Path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// HTTP-like method of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FormMethod {
    /// Whether submissions with this method run an action.
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Get)
    }

    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for FormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormMethod {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            _ => Err(InternalError::InvalidMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// Encoding of a submission body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormEncType {
    #[default]
    UrlEncoded,
    Multipart,
    Json,
    Text,
}

impl FormEncType {
    /// MIME type string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
            Self::Json => "application/json",
            Self::Text => "text/plain",
        }
    }
}

impl fmt::Display for FormEncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmissionBody {
    FormData(FormData),
    Json(Value),
    Text(String),
}

/// What a caller asks to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOptions {
    pub method: FormMethod,
    /// Defaults to url-encoded form data.
    pub enc_type: Option<FormEncType>,
    pub body: SubmissionBody,
}

impl SubmitOptions {
    /// Submit form fields with `method`.
    pub fn form(method: FormMethod, data: FormData) -> Self {
        Self {
            method,
            enc_type: None,
            body: SubmissionBody::FormData(data),
        }
    }

    /// Submit a JSON value with `method`.
    pub fn json(method: FormMethod, value: Value) -> Self {
        Self {
            method,
            enc_type: Some(FormEncType::Json),
            body: SubmissionBody::Json(value),
        }
    }

    /// Submit plain text with `method`.
    pub fn text(method: FormMethod, text: impl Into<String>) -> Self {
        Self {
            method,
            enc_type: Some(FormEncType::Text),
            body: SubmissionBody::Text(text.into()),
        }
    }
}

/// A normalized submission, as carried by navigations and fetchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub form_method: FormMethod,
    /// Target path without its hash.
    pub form_action: String,
    pub form_enc_type: FormEncType,
    pub body: SubmissionBody,
}

impl Submission {
    /// Form fields, for form-encoded submissions.
    pub fn form_data(&self) -> Option<&FormData> {
        match &self.body {
            SubmissionBody::FormData(data) => Some(data),
            _ => None,
        }
    }

    /// JSON payload, for JSON submissions.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            SubmissionBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text payload, for plain-text submissions.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            SubmissionBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Result of [`normalize_submission`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalizedTarget {
    pub path: String,
    pub submission: Option<Submission>,
    pub error: Option<InternalError>,
}

/// Normalize a submission aimed at `path`.
///
/// GET submissions replace the query string with the form fields. A fetcher's
/// naked `?index` survives so the index route stays targeted.
pub(crate) fn normalize_submission(
    is_fetcher: bool,
    path: String,
    submit: Option<SubmitOptions>,
) -> NormalizedTarget {
    let Some(submit) = submit else {
        return NormalizedTarget {
            path,
            submission: None,
            error: None,
        };
    };

    let enc_type = submit.enc_type.unwrap_or_default();
    let body = match convert_body(enc_type, submit.body) {
        Ok(body) => body,
        Err(error) => {
            return NormalizedTarget {
                path,
                submission: None,
                error: Some(error),
            }
        }
    };

    let submission = Submission {
        form_method: submit.method,
        form_action: strip_hash(&path).to_string(),
        form_enc_type: enc_type,
        body,
    };

    if submit.method.is_mutation() {
        return NormalizedTarget {
            path,
            submission: Some(submission),
            error: None,
        };
    }

    let mut search = match &submission.body {
        SubmissionBody::FormData(data) => data.clone(),
        SubmissionBody::Text(text) => SearchParams::parse(text),
        SubmissionBody::Json(_) => {
            return NormalizedTarget {
                path,
                submission: None,
                error: Some(InternalError::InvalidBody),
            }
        }
    };
    let parsed = parse_path(&path);
    if is_fetcher
        && parsed
            .search
            .as_deref()
            .is_some_and(has_naked_index_query)
    {
        search.append("index", "");
    }
    let rebuilt = Path {
        pathname: parsed.pathname.unwrap_or_default(),
        search: format!("?{}", search),
        hash: parsed.hash.unwrap_or_default(),
    };
    NormalizedTarget {
        path: rebuilt.to_string(),
        submission: Some(submission),
        error: None,
    }
}

fn convert_body(enc_type: FormEncType, body: SubmissionBody) -> Result<SubmissionBody, InternalError> {
    match enc_type {
        FormEncType::Text => Ok(SubmissionBody::Text(match body {
            SubmissionBody::Text(text) => text,
            SubmissionBody::FormData(data) => data
                .iter()
                .map(|(k, v)| format!("{}={}\n", k, v))
                .collect(),
            SubmissionBody::Json(value) => value.to_string(),
        })),
        FormEncType::Json => match body {
            SubmissionBody::Json(value) => Ok(SubmissionBody::Json(value)),
            SubmissionBody::Text(text) => serde_json::from_str(&text)
                .map(SubmissionBody::Json)
                .map_err(|_| InternalError::InvalidBody),
            SubmissionBody::FormData(data) => {
                let map: Map<String, Value> = data
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect();
                Ok(SubmissionBody::Json(Value::Object(map)))
            }
        },
        FormEncType::UrlEncoded | FormEncType::Multipart => match body {
            SubmissionBody::FormData(data) => Ok(SubmissionBody::FormData(data)),
            SubmissionBody::Text(text) => Ok(SubmissionBody::FormData(SearchParams::parse(&text))),
            SubmissionBody::Json(Value::Object(map)) => Ok(SubmissionBody::FormData(
                SearchParams::from_pairs(map.into_iter().map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, v)
                })),
            )),
            SubmissionBody::Json(_) => Err(InternalError::InvalidBody),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing() {
        assert_eq!("post".parse::<FormMethod>(), Ok(FormMethod::Post));
        assert_eq!("DELETE".parse::<FormMethod>(), Ok(FormMethod::Delete));
        let err = "options".parse::<FormMethod>().unwrap_err();
        assert_eq!(err.status(), 405);
        assert!(!FormMethod::Get.is_mutation());
        assert!(FormMethod::Patch.is_mutation());
    }

    #[test]
    fn test_mutation_keeps_path_and_strips_hash_from_action() {
        let out = normalize_submission(
            false,
            "/todos?x=1#top".into(),
            Some(SubmitOptions::form(
                FormMethod::Post,
                SearchParams::from_pairs([("title", "milk")]),
            )),
        );
        assert_eq!(out.path, "/todos?x=1#top");
        let submission = out.submission.unwrap();
        assert_eq!(submission.form_action, "/todos?x=1");
        assert_eq!(submission.form_data().unwrap().get("title"), Some("milk"));
    }

    #[test]
    fn test_get_submission_moves_fields_into_search() {
        let out = normalize_submission(
            false,
            "/search?old=1".into(),
            Some(SubmitOptions::form(
                FormMethod::Get,
                SearchParams::from_pairs([("q", "rust")]),
            )),
        );
        assert_eq!(out.path, "/search?q=rust");
    }

    #[test]
    fn test_fetcher_get_keeps_naked_index() {
        let out = normalize_submission(
            true,
            "/items?index".into(),
            Some(SubmitOptions::form(
                FormMethod::Get,
                SearchParams::from_pairs([("q", "x")]),
            )),
        );
        assert_eq!(out.path, "/items?q=x&index=");
    }

    #[test]
    fn test_json_text_body_must_parse() {
        let mut submit = SubmitOptions::text(FormMethod::Post, "{not json");
        submit.enc_type = Some(FormEncType::Json);
        let out = normalize_submission(false, "/a".into(), Some(submit));
        assert_eq!(out.error, Some(InternalError::InvalidBody));

        let out = normalize_submission(
            false,
            "/a".into(),
            Some(SubmitOptions::json(FormMethod::Put, json!({"n": 1}))),
        );
        assert_eq!(out.submission.unwrap().json(), Some(&json!({"n": 1})));
    }

    #[test]
    fn test_text_encoding_of_form_data() {
        let mut submit =
            SubmitOptions::form(FormMethod::Post, SearchParams::from_pairs([("a", "1"), ("b", "2")]));
        submit.enc_type = Some(FormEncType::Text);
        let out = normalize_submission(false, "/a".into(), Some(submit));
        assert_eq!(out.submission.unwrap().text(), Some("a=1\nb=2\n"));
    }
}
