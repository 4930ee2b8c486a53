//! Firestore REST client
//!
//! Talks to the Cloud Firestore v1 REST API. Documents are converted
//! between plain JSON and Firestore's typed value encoding
//! (`{"stringValue": ...}`, `{"mapValue": {"fields": ...}}`, ...).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use crate::error::{AppError, Result};
use crate::store::{Document, DocumentStore};

const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";

/// Page size for collection listing
const PAGE_SIZE: &str = "300";

/// Supplies the bearer token for database requests
#[async_trait]
pub trait IdTokenSource: Send + Sync {
    /// Current ID token, refreshed if needed; `None` when nobody is signed in
    async fn id_token(&self) -> Result<Option<SecretString>>;
}

pub struct FirestoreStore {
    client: Client,
    documents_root: String,
    tokens: Arc<dyn IdTokenSource>,
}

impl FirestoreStore {
    pub fn new(project_id: &str, tokens: Arc<dyn IdTokenSource>) -> Self {
        Self {
            client: Client::new(),
            documents_root: format!(
                "{}/projects/{}/databases/(default)/documents",
                FIRESTORE_API_BASE, project_id
            ),
            tokens,
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.documents_root, path))
            .map_err(|e| AppError::Store(format!("invalid document path '{}': {}", path, e)))
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.tokens.id_token().await? {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Request failed: {}", e)))?;
        Ok(response)
    }

    async fn fail(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => AppError::NotAuthenticated,
            _ => AppError::Store(format!("{} {}", status, firestore_error_message(&body))),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.url(&format!("{collection}/{id}"))?;
        let response = self.send(self.client.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let raw: RawDocument = response.json().await?;
        Ok(Some(raw.into_document()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(collection)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.send(self.client.get(url)).await?;
            if !response.status().is_success() {
                return Err(Self::fail(response).await);
            }

            let page: ListResponse = response.json().await?;
            documents.extend(page.documents.into_iter().map(RawDocument::into_document));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn create(&self, collection: &str, data: Value) -> Result<String> {
        let url = self.url(collection)?;
        let body = json!({ "fields": encode_fields(&data)? });
        let response = self.send(self.client.post(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let raw: RawDocument = response.json().await?;
        Ok(raw.into_document().id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let url = self.url(&format!("{collection}/{id}"))?;
        let body = json!({ "fields": encode_fields(&data)? });
        let response = self.send(self.client.patch(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        let mut url = self.url(&format!("{collection}/{id}"))?;
        {
            let mut query = url.query_pairs_mut();
            if let Value::Object(map) = &fields {
                for key in map.keys() {
                    query.append_pair("updateMask.fieldPaths", key);
                }
            }
            query.append_pair("currentDocument.exists", "true");
        }

        let body = json!({ "fields": encode_fields(&fields)? });
        let response = self.send(self.client.patch(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let url = self.url(&format!("{collection}/{id}"))?;
        let response = self.send(self.client.delete(url)).await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        let (parent, collection_id) = match collection.rsplit_once('/') {
            Some((parent, id)) => (format!("{}/{}", self.documents_root, parent), id),
            None => (self.documents_root.clone(), collection),
        };
        let url = Url::parse(&format!("{parent}:runQuery"))
            .map_err(|e| AppError::Store(format!("invalid query path: {}", e)))?;

        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection_id }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });

        let response = self.send(self.client.post(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let rows: Vec<QueryRow> = response.json().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.document)
            .map(RawDocument::into_document)
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawDocument {
    fn into_document(self) -> Document {
        let id = self.name.rsplit('/').next().unwrap_or_default().to_string();
        Document::new(id, decode_fields(&self.fields))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn firestore_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed value codec
// ─────────────────────────────────────────────────────────────────────────────

/// Encode a JSON object as a Firestore `fields` map
pub fn encode_fields(data: &Value) -> Result<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect()),
        other => Err(AppError::Store(format!(
            "documents must be JSON objects, got {}",
            other
        ))),
    }
}

/// Encode one JSON value as a Firestore typed value
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(_) => {
            let fields = encode_fields(value).unwrap_or_default();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Decode a Firestore `fields` map into a JSON object
pub fn decode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), decode_value(value)))
            .collect(),
    )
}

/// Decode one Firestore typed value
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|map| map.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue"
        | "bytesValue" | "geoPointValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(inner.clone()),
            other => other.clone(),
        },
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .unwrap_or_else(|| Value::Object(Map::new())),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_nested_document() {
        let doc = json!({
            "name": "Unit 1",
            "createdAt": 1700000000000i64,
            "score": 7.5,
            "modules": [{ "id": "module_1", "words": [] }],
            "avatar": null,
            "isAIGenerated": true,
        });
        let fields = encode_fields(&doc).unwrap();
        assert_eq!(fields["name"], json!({ "stringValue": "Unit 1" }));
        assert_eq!(fields["createdAt"], json!({ "integerValue": "1700000000000" }));
        assert_eq!(fields["score"], json!({ "doubleValue": 7.5 }));
        assert_eq!(fields["avatar"], json!({ "nullValue": null }));
        assert_eq!(
            fields["modules"]["arrayValue"]["values"][0]["mapValue"]["fields"]["id"],
            json!({ "stringValue": "module_1" })
        );
    }

    #[test]
    fn test_decode_handles_sparse_containers() {
        // Firestore omits `values` for empty arrays and `fields` for empty maps
        let fields: Map<String, Value> = serde_json::from_value(json!({
            "words": { "arrayValue": {} },
            "extra": { "mapValue": {} },
            "count": { "integerValue": "42" },
            "when": { "timestampValue": "2024-01-01T00:00:00Z" },
        }))
        .unwrap();
        let decoded = decode_fields(&fields);
        assert_eq!(decoded["words"], json!([]));
        assert_eq!(decoded["extra"], json!({}));
        assert_eq!(decoded["count"], json!(42));
        assert_eq!(decoded["when"], json!("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_codec_preserves_documents() {
        let doc = json!({
            "uid": "u1",
            "lessons": [{ "title": "Passive", "examples": ["a", "b"], "difficulty": "advanced" }],
            "updatedAt": 12,
            "unreadCount": 0,
        });
        let fields = encode_fields(&doc).unwrap();
        assert_eq!(decode_fields(&fields), doc);
    }

    #[test]
    fn test_document_id_from_resource_name() {
        let raw = RawDocument {
            name: "projects/p/databases/(default)/documents/users/u1/customVocabUnits/abc123"
                .into(),
            fields: Map::new(),
        };
        assert_eq!(raw.into_document().id, "abc123");
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            firestore_error_message(body),
            "Missing or insufficient permissions."
        );
        assert_eq!(firestore_error_message("plain"), "plain");
    }
}
