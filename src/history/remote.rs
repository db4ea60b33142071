use std::future::Future;

use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Map, Number, Value};

use super::QuizScoreEntry;
use crate::config::FirebaseConfig;
use crate::error::FetchError;

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: &str = "300";

pub const QUIZ_HISTORY_COLLECTION: &str = "quiz_history";
pub const CHAT_HISTORY_COLLECTION: &str = "chat_history";
pub const FEEDBACK_COLLECTION: &str = "feedback";

/// The cloud side of a user's data. Every call may fail; callers pick the
/// fallback (degrade to local data, or queue the write for later).
pub trait RemoteStore {
    fn fetch_quiz_scores(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<QuizScoreEntry>, FetchError>> + Send;

    fn push_quiz_score(
        &self,
        user_id: &str,
        entry: &QuizScoreEntry,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    fn push_chat_message(
        &self,
        user_id: &str,
        message: &Value,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    fn push_feedback(
        &self,
        user_id: &str,
        feedback: &Value,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;
}

/// Firestore over its REST API. Documents live under `users/{user_id}/...`.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    http: reqwest::Client,
    documents_url: String,
    api_key: Option<String>,
    auth_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreClient {
    pub fn new(config: &FirebaseConfig) -> Self {
        Self::with_base_url(config, FIRESTORE_URL)
    }

    pub fn with_base_url(config: &FirebaseConfig, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                config.project_id
            ),
            api_key: config.api_key.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn collection_url(&self, user_id: &str, collection: &str) -> String {
        format!("{}/users/{}/{}", self.documents_url, user_id, collection)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn list_documents(
        &self,
        user_id: &str,
        collection: &str,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.collection_url(user_id, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &url)
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListDocumentsResponse = check_status(request.send().await?)
                .await?
                .json()
                .await?;
            for document in page.documents {
                match from_firestore_fields(&document.fields) {
                    Ok(value) => documents.push(value),
                    Err(e) => log::warn!("Skipping document in {}: {}", collection, e),
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn create_document(
        &self,
        user_id: &str,
        collection: &str,
        data: &Value,
    ) -> Result<(), FetchError> {
        let fields = match data {
            Value::Object(map) => to_firestore_fields(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                to_firestore_fields(&map)
            }
        };
        let url = self.collection_url(user_id, collection);
        let request = self
            .request(Method::POST, &url)
            .json(&json!({ "fields": fields }));
        check_status(request.send().await?).await?;
        Ok(())
    }
}

impl RemoteStore for FirestoreClient {
    async fn fetch_quiz_scores(&self, user_id: &str) -> Result<Vec<QuizScoreEntry>, FetchError> {
        let documents = self.list_documents(user_id, QUIZ_HISTORY_COLLECTION).await?;
        Ok(decode_quiz_scores(documents))
    }

    async fn push_quiz_score(
        &self,
        user_id: &str,
        entry: &QuizScoreEntry,
    ) -> Result<(), FetchError> {
        let mut data =
            serde_json::to_value(entry).map_err(|e| FetchError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut data {
            map.insert("user_id".to_string(), Value::String(user_id.to_string()));
        }
        self.create_document(user_id, QUIZ_HISTORY_COLLECTION, &data)
            .await
    }

    async fn push_chat_message(&self, user_id: &str, message: &Value) -> Result<(), FetchError> {
        self.create_document(user_id, CHAT_HISTORY_COLLECTION, message)
            .await
    }

    async fn push_feedback(&self, user_id: &str, feedback: &Value) -> Result<(), FetchError> {
        self.create_document(user_id, FEEDBACK_COLLECTION, feedback)
            .await
    }
}

async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Documents that are not a valid score entry are skipped, not fatal.
fn decode_quiz_scores(documents: Vec<Value>) -> Vec<QuizScoreEntry> {
    documents
        .into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping cloud quiz entry: {}", e);
                None
            }
        })
        .collect()
}

pub fn to_firestore_fields(map: &Map<String, Value>) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), to_firestore_value(value)))
            .collect(),
    )
}

/// Plain JSON to a Firestore typed value (`{"stringValue": ...}` and friends).
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore carries 64-bit integers as strings.
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": to_firestore_fields(map) } }),
    }
}

pub fn from_firestore_fields(fields: &Map<String, Value>) -> Result<Value, FetchError> {
    let mut out = Map::new();
    for (key, value) in fields {
        out.insert(key.clone(), from_firestore_value(value)?);
    }
    Ok(Value::Object(out))
}

pub fn from_firestore_value(value: &Value) -> Result<Value, FetchError> {
    let bad = || FetchError::Decode(value.to_string());
    let (kind, inner) = value
        .as_object()
        .and_then(|obj| obj.iter().next())
        .ok_or_else(bad)?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner.as_bool().map(Value::Bool).ok_or_else(bad),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(|i| Value::Number(i.into()))
            .ok_or_else(bad),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(bad),
        "stringValue" | "timestampValue" | "referenceValue" => {
            inner.as_str().map(|s| Value::String(s.to_string())).ok_or_else(bad)
        }
        "arrayValue" => {
            let values = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values,
                None => return Ok(Value::Array(Vec::new())),
            };
            values
                .iter()
                .map(from_firestore_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => from_firestore_fields(fields),
            None => Ok(Value::Object(Map::new())),
        },
        _ => Err(bad()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Difficulty;

    #[test]
    fn quiz_entry_document_decodes_integer_and_double_scores() {
        let doc = json!({
            "timestamp": { "stringValue": "2024-05-01T10:00:00Z" },
            "score": { "integerValue": "80" },
            "difficulty": { "stringValue": "Hard" },
            "topic": { "stringValue": "Map Reading" },
            "user_id": { "stringValue": "42" }
        });
        let value = from_firestore_fields(doc.as_object().unwrap()).unwrap();
        let entry: QuizScoreEntry = serde_json::from_value(value).unwrap();
        assert_eq!(entry.score, 80.0);
        assert_eq!(entry.difficulty, Difficulty::Hard);

        let double = from_firestore_value(&json!({ "doubleValue": 66.5 })).unwrap();
        assert_eq!(double, json!(66.5));
    }

    #[test]
    fn one_bad_cloud_entry_does_not_hide_the_others() {
        let docs = vec![
            json!({ "timestamp": "2024-05-01T10:00:00Z", "score": 80, "difficulty": "Hard", "topic": "Drill" }),
            json!({ "timestamp": "2024-05-02T10:00:00Z", "score": 40, "difficulty": "easy", "topic": "Drill" }),
            json!("not a document"),
            json!({ "timestamp": "2024-05-03T10:00:00Z", "score": 65.5, "difficulty": "Medium", "topic": "Drill" }),
        ];
        let scores: Vec<f64> = decode_quiz_scores(docs).iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![80.0, 65.5]);
    }

    #[test]
    fn nested_payloads_survive_encoding() {
        let payload = json!({
            "prompt": "What is the NCC motto?",
            "tags": ["ncc", 1, true, null],
            "meta": { "attempt": 2, "ratio": 0.5 }
        });
        let encoded = to_firestore_fields(payload.as_object().unwrap());
        assert_eq!(encoded["meta"]["mapValue"]["fields"]["attempt"], json!({ "integerValue": "2" }));
        assert_eq!(encoded["tags"]["arrayValue"]["values"][0], json!({ "stringValue": "ncc" }));

        let decoded = from_firestore_fields(encoded.as_object().unwrap()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn unknown_value_kinds_are_decode_errors() {
        assert!(matches!(
            from_firestore_value(&json!({ "geoPointValue": {} })),
            Err(FetchError::Decode(_))
        ));
        assert!(from_firestore_value(&json!("plain")).is_err());
    }

    #[test]
    fn collection_urls_are_nested_under_the_user() {
        let client = FirestoreClient::with_base_url(
            &FirebaseConfig {
                project_id: "ncc-abyas".to_string(),
                api_key: None,
                auth_token: None,
            },
            "http://localhost:8080/v1/",
        );
        assert_eq!(
            client.collection_url("42", QUIZ_HISTORY_COLLECTION),
            "http://localhost:8080/v1/projects/ncc-abyas/databases/(default)/documents/users/42/quiz_history"
        );
    }
}
