//! Cloud Firestore client over the public REST API.
//!
//! Identity comes from the Identity Toolkit anonymous sign-up endpoint and
//! is refreshed through the Secure Token endpoint shortly before expiry.
//! Writes go through `documents:commit` so the server stamps `createdAt` and
//! `updatedAt`. The REST surface has no push channel, so each live feed is a
//! background task that re-runs the ordered query and pushes a snapshot
//! whenever the result changes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::{feed_channel, FeedEvent, FeedSender, Identity, RemoteCollection, Subscription};
use crate::config::FirestoreConfig;
use crate::error::{Error, RemoteFault, Result};
use crate::models::{Grievance, GrievanceId, GrievanceStatus, NewGrievance, PortalCode};
use crate::util::compact_text;

const HTTP_TIMEOUT_SECS: u64 = 15;
const EXPIRY_SKEW_SECONDS: i64 = 60;
const AUTO_ID_LENGTH: usize = 20;
const AUTO_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const PORTALS_COLLECTION: &str = "portals";
const GRIEVANCES_COLLECTION: &str = "grievances";

#[derive(Clone, PartialEq, Eq)]
struct AnonymousSession {
    uid: String,
    id_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl AnonymousSession {
    fn is_expired(&self) -> bool {
        self.expires_at <= chrono::Utc::now().timestamp() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AnonymousSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AnonymousSession")
            .field("uid", &self.uid)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug)]
struct FirestoreInner {
    config: FirestoreConfig,
    http: Client,
    session: Mutex<Option<AnonymousSession>>,
}

/// Firestore-backed [`RemoteCollection`]. Clones share one identity.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreInner>,
}

impl FirestoreClient {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        let config = config.normalized()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            inner: Arc::new(FirestoreInner {
                config,
                http,
                session: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.inner.config
    }
}

impl FirestoreInner {
    async fn sign_up(&self) -> Result<AnonymousSession> {
        let url = format!("{}/accounts:signUp", self.config.identity_url);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|error| Error::Auth(format!("sign-in request failed: {error}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(parse_api_error(status, &body)));
        }

        let payload = response
            .json::<SignUpResponse>()
            .await
            .map_err(|error| Error::Auth(format!("invalid sign-in response: {error}")))?;
        payload.try_into()
    }

    /// Exchange the refresh token for a new session.
    ///
    /// A refresh only happens inside feed and write calls, so its failures
    /// are classified as remote faults rather than identity failures.
    async fn refresh(&self, refresh_token: &str) -> Result<AnonymousSession> {
        let url = format!("{}/token", self.config.secure_token_url);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body).into());
        }

        let payload = response
            .json::<RefreshResponse>()
            .await
            .map_err(classify_transport)?;
        AnonymousSession::try_from(payload)
            .map_err(|error| RemoteFault::Connection(error.to_string()).into())
    }

    /// Current ID token, refreshed when it is about to expire.
    async fn id_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        let Some(current) = session.as_ref() else {
            return Err(Error::Auth("anonymous identity not established".to_string()));
        };

        if current.is_expired() {
            tracing::info!("Refreshing anonymous identity for {}", current.uid);
            let refreshed = self.refresh(&current.refresh_token).await?;
            let token = refreshed.id_token.clone();
            *session = Some(refreshed);
            return Ok(token);
        }
        Ok(current.id_token.clone())
    }

    async fn run_query(&self, portal: &PortalCode) -> Result<Vec<Grievance>> {
        let token = self.id_token().await?;
        let url = format!(
            "{}/{PORTALS_COLLECTION}/{}:runQuery",
            self.config.documents_url(),
            portal
        );
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": GRIEVANCES_COLLECTION }],
                "orderBy": [{
                    "field": { "fieldPath": "createdAt" },
                    "direction": "DESCENDING"
                }]
            }
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body).into());
        }

        let rows = response
            .json::<Vec<RunQueryRow>>()
            .await
            .map_err(classify_transport)?;
        Ok(decode_rows(rows))
    }

    async fn commit(&self, write: Value) -> Result<()> {
        let token = self.id_token().await.map_err(|error| match error {
            Error::Remote(fault) => Error::Write(fault),
            other => other,
        })?;
        let url = format!("{}:commit", self.config.documents_url());
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "writes": [write] }))
            .send()
            .await
            .map_err(|error| Error::Write(transport_fault(&error)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Write(classify_status(status, &body)));
        }
        Ok(())
    }

    fn document_name(&self, portal: &PortalCode, id: &GrievanceId) -> String {
        format!(
            "{}/{PORTALS_COLLECTION}/{portal}/{GRIEVANCES_COLLECTION}/{id}",
            self.config.documents_path()
        )
    }
}

impl RemoteCollection for FirestoreClient {
    async fn bootstrap_identity(&self) -> Result<Identity> {
        let mut session = self.inner.session.lock().await;
        if let Some(existing) = session.as_ref().filter(|session| !session.is_expired()) {
            return Ok(Identity {
                uid: existing.uid.clone(),
            });
        }

        let created = self.inner.sign_up().await?;
        tracing::info!("Signed in anonymously: {}", created.uid);
        let identity = Identity {
            uid: created.uid.clone(),
        };
        *session = Some(created);
        Ok(identity)
    }

    async fn subscribe(&self, portal: &PortalCode) -> Result<Subscription> {
        tracing::info!("Setting up live feed for portal {}", portal);
        let initial = self.inner.run_query(portal).await?;

        let (sender, subscription) = feed_channel(portal.clone());
        sender.send(FeedEvent::Snapshot(initial.clone()));
        tokio::spawn(poll_feed(
            Arc::clone(&self.inner),
            portal.clone(),
            sender,
            initial,
        ));
        Ok(subscription)
    }

    async fn create_item(&self, portal: &PortalCode, item: NewGrievance) -> Result<GrievanceId> {
        let id = GrievanceId::from(generate_auto_id());
        let write = json!({
            "update": {
                "name": self.inner.document_name(portal, &id),
                "fields": {
                    "title": { "stringValue": item.title },
                    "description": { "stringValue": item.description },
                    "status": { "stringValue": GrievanceStatus::Pending.as_str() }
                }
            },
            "currentDocument": { "exists": false },
            "updateTransforms": [
                { "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" },
                { "fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME" }
            ]
        });

        self.inner.commit(write).await?;
        tracing::info!("Grievance added to portal {} with id {}", portal, id);
        Ok(id)
    }

    async fn update_status(
        &self,
        portal: &PortalCode,
        id: &GrievanceId,
        status: GrievanceStatus,
    ) -> Result<()> {
        let write = json!({
            "update": {
                "name": self.inner.document_name(portal, id),
                "fields": {
                    "status": { "stringValue": status.as_str() }
                }
            },
            "updateMask": { "fieldPaths": ["status"] },
            "currentDocument": { "exists": true },
            "updateTransforms": [
                { "fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME" }
            ]
        });

        self.inner.commit(write).await
    }
}

async fn poll_feed(
    inner: Arc<FirestoreInner>,
    portal: PortalCode,
    sender: FeedSender,
    mut last: Vec<Grievance>,
) {
    let interval = Duration::from_millis(inner.config.poll_interval_ms);

    loop {
        tokio::select! {
            () = sender.closed() => break,
            () = tokio::time::sleep(interval) => {}
        }
        if sender.is_cancelled() {
            break;
        }

        match inner.run_query(&portal).await {
            Ok(items) => {
                if items == last {
                    continue;
                }
                tracing::debug!("Received snapshot with {} documents", items.len());
                if !sender.send(FeedEvent::Snapshot(items.clone())) {
                    break;
                }
                last = items;
            }
            Err(error) => {
                let fault = feed_fault(error);
                tracing::warn!("Live feed for portal {} failed: {}", portal, fault);
                sender.send(FeedEvent::Failed(fault));
                break;
            }
        }
    }

    tracing::debug!("Live feed {} for portal {} stopped", sender.id(), portal);
}

fn feed_fault(error: Error) -> RemoteFault {
    match error {
        Error::Remote(fault) | Error::Write(fault) => fault,
        Error::Auth(message) => RemoteFault::PermissionDenied(message),
        other => RemoteFault::Connection(other.to_string()),
    }
}

fn classify_transport(error: reqwest::Error) -> Error {
    Error::Remote(transport_fault(&error))
}

fn transport_fault(error: &reqwest::Error) -> RemoteFault {
    RemoteFault::Connection(error.to_string())
}

fn classify_status(status: StatusCode, body: &str) -> RemoteFault {
    let message = parse_api_error(status, body);
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || body.contains("PERMISSION_DENIED")
    {
        RemoteFault::PermissionDenied(message)
    } else {
        RemoteFault::Connection(message)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: Option<GoogleError>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: Option<String>,
    status: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(GoogleErrorBody {
        error: Some(payload),
    }) = serde_json::from_str::<GoogleErrorBody>(body)
    {
        if let Some(message) = payload.message.or(payload.status) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    local_id: Option<String>,
}

impl TryFrom<SignUpResponse> for AnonymousSession {
    type Error = Error;

    fn try_from(value: SignUpResponse) -> Result<Self> {
        build_session(
            value.local_id,
            value.id_token,
            value.refresh_token,
            value.expires_in,
        )
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    user_id: Option<String>,
}

impl TryFrom<RefreshResponse> for AnonymousSession {
    type Error = Error;

    fn try_from(value: RefreshResponse) -> Result<Self> {
        build_session(
            value.user_id,
            value.id_token,
            value.refresh_token,
            value.expires_in,
        )
    }
}

fn build_session(
    uid: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
) -> Result<AnonymousSession> {
    let non_empty = |value: Option<String>, field: &str| {
        value
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::Auth(format!("identity response did not include {field}")))
    };

    let expires_in = non_empty(expires_in, "expiresIn")?
        .parse::<i64>()
        .map_err(|error| Error::Auth(format!("invalid expiresIn: {error}")))?;

    Ok(AnonymousSession {
        uid: non_empty(uid, "localId")?,
        id_token: non_empty(id_token, "idToken")?,
        refresh_token: non_empty(refresh_token, "refreshToken")?,
        expires_at: chrono::Utc::now().timestamp().saturating_add(expires_in),
    })
}

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    document: Option<FirestoreDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
    create_time: Option<String>,
    update_time: Option<String>,
}

fn decode_rows(rows: Vec<RunQueryRow>) -> Vec<Grievance> {
    rows.into_iter()
        .filter_map(|row| row.document)
        .filter_map(|document| match decode_document(&document) {
            Some(grievance) => Some(grievance),
            None => {
                tracing::warn!("Skipping malformed grievance document {}", document.name);
                None
            }
        })
        .collect()
}

fn decode_document(document: &FirestoreDocument) -> Option<Grievance> {
    let id = document.name.rsplit('/').next()?.to_string();
    let status = string_field(&document.fields, "status")?
        .parse::<GrievanceStatus>()
        .ok()?;
    let created_at = timestamp_field(&document.fields, "createdAt")
        .or_else(|| document.create_time.as_deref().and_then(parse_timestamp))?;
    let updated_at = timestamp_field(&document.fields, "updatedAt")
        .or_else(|| document.update_time.as_deref().and_then(parse_timestamp))
        .unwrap_or(created_at);

    Some(Grievance {
        id: GrievanceId::from(id),
        title: string_field(&document.fields, "title").unwrap_or_default(),
        description: string_field(&document.fields, "description").unwrap_or_default(),
        status,
        created_at,
        updated_at,
    })
}

fn string_field(fields: &HashMap<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)?
        .get("stringValue")?
        .as_str()
        .map(ToString::to_string)
}

fn timestamp_field(fields: &HashMap<String, Value>, key: &str) -> Option<i64> {
    parse_timestamp(fields.get(key)?.get("timestampValue")?.as_str()?)
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.timestamp_millis())
}

/// Client-generated document id, matching the shape Firestore SDKs use.
fn generate_auto_id() -> String {
    let mut rng = rand::rng();
    (0..AUTO_ID_LENGTH)
        .map(|_| char::from(AUTO_ID_ALPHABET[rng.random_range(0..AUTO_ID_ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    fn document(payload: Value) -> FirestoreDocument {
        serde_json::from_value(payload).unwrap()
    }

    #[test]
    fn decodes_query_rows_and_skips_empty_results() {
        let payload = json!([
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/portals/ABC123/grievances/doc2",
                    "fields": {
                        "title": { "stringValue": "Dishes" },
                        "description": { "stringValue": "Left in the sink" },
                        "status": { "stringValue": "in-progress" },
                        "createdAt": { "timestampValue": "2025-01-02T00:00:00Z" },
                        "updatedAt": { "timestampValue": "2025-01-03T00:00:00.500Z" }
                    },
                    "createTime": "2025-01-02T00:00:00Z",
                    "updateTime": "2025-01-03T00:00:00Z"
                },
                "readTime": "2025-01-04T00:00:00Z"
            },
            { "readTime": "2025-01-04T00:00:00Z" }
        ]);
        let rows: Vec<RunQueryRow> = serde_json::from_value(payload).unwrap();
        let items = decode_rows(rows);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "doc2");
        assert_eq!(items[0].status, GrievanceStatus::InProgress);
        assert_eq!(items[0].created_at, 1_735_776_000_000);
        assert_eq!(items[0].updated_at, 1_735_862_400_500);
    }

    #[test]
    fn falls_back_to_document_metadata_timestamps() {
        let grievance = decode_document(&document(json!({
            "name": "a/b/grievances/doc1",
            "fields": {
                "title": { "stringValue": "t" },
                "description": { "stringValue": "d" },
                "status": { "stringValue": "pending" }
            },
            "createTime": "1970-01-01T00:00:01Z"
        })))
        .unwrap();
        assert_eq!(grievance.created_at, 1_000);
        assert_eq!(grievance.updated_at, 1_000);
    }

    #[test]
    fn rejects_documents_with_unknown_status() {
        let decoded = decode_document(&document(json!({
            "name": "a/b/grievances/doc1",
            "fields": { "status": { "stringValue": "archived" } },
            "createTime": "1970-01-01T00:00:01Z"
        })));
        assert!(decoded.is_none());
    }

    #[test]
    fn classifies_permission_errors() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, body),
            RemoteFault::PermissionDenied("Missing or insufficient permissions. (403)".to_string())
        );
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            RemoteFault::Connection(message) if message == "HTTP 503"
        ));
    }

    #[test]
    fn sign_up_response_requires_all_fields() {
        let complete = SignUpResponse {
            id_token: Some("token".to_string()),
            refresh_token: Some("refresh".to_string()),
            expires_in: Some("3600".to_string()),
            local_id: Some("uid-1".to_string()),
        };
        let session = AnonymousSession::try_from(complete).unwrap();
        assert_eq!(session.uid, "uid-1");
        assert!(!session.is_expired());

        let missing = SignUpResponse {
            id_token: None,
            refresh_token: Some("refresh".to_string()),
            expires_in: Some("3600".to_string()),
            local_id: Some("uid-1".to_string()),
        };
        assert!(matches!(
            AnonymousSession::try_from(missing),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let session = AnonymousSession {
            uid: "uid-1".to_string(),
            id_token: "secret-id-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_700_000_000,
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-id-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn auto_ids_have_firestore_shape() {
        let id = generate_auto_id();
        assert_eq!(id.len(), AUTO_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn operations_before_bootstrap_are_auth_failures() {
        let client = FirestoreClient::new(FirestoreConfig::new("key", "project")).unwrap();
        let portal = PortalCode::parse("ABC123", 6).unwrap();
        let error = client.subscribe(&portal).await.unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::AuthFailure);
    }

    #[test]
    fn document_names_follow_portal_hierarchy() {
        let client = FirestoreClient::new(FirestoreConfig::new("key", "project")).unwrap();
        let name = client.inner.document_name(
            &PortalCode::parse("ABC123", 6).unwrap(),
            &GrievanceId::from("doc1"),
        );
        assert_eq!(
            name,
            "projects/project/databases/(default)/documents/portals/ABC123/grievances/doc1"
        );
    }

    const QUERY_PATH: &str = r"/portals/ABC123:runQuery$";
    const PERMISSION_DENIED_BODY: &str = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;

    fn signed_in_session(expires_at: i64) -> AnonymousSession {
        AnonymousSession {
            uid: "uid-1".to_string(),
            id_token: "id-token-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at,
        }
    }

    /// Client pointed at `url` for every endpoint, skipping the poll
    /// interval floor so feed tests stay fast.
    fn client_at(url: &str, session: AnonymousSession) -> FirestoreClient {
        let config = FirestoreConfig {
            api_key: "key".to_string(),
            project_id: "project".to_string(),
            poll_interval_ms: 20,
            identity_url: url.to_string(),
            secure_token_url: url.to_string(),
            firestore_url: url.to_string(),
        };
        FirestoreClient {
            inner: Arc::new(FirestoreInner {
                config,
                http: Client::new(),
                session: Mutex::new(Some(session)),
            }),
        }
    }

    fn portal() -> PortalCode {
        PortalCode::parse("ABC123", 6).unwrap()
    }

    fn query_row(id: &str) -> Value {
        json!({
            "document": {
                "name": format!("projects/project/databases/(default)/documents/portals/ABC123/grievances/{id}"),
                "fields": {
                    "title": { "stringValue": "Dishes" },
                    "description": { "stringValue": "Left in the sink" },
                    "status": { "stringValue": "pending" },
                    "createdAt": { "timestampValue": "2025-01-02T00:00:00Z" }
                }
            }
        })
    }

    async fn next_event(feed: &mut Subscription) -> Option<FeedEvent> {
        tokio::time::timeout(Duration::from_secs(5), feed.next())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn poll_feed_pushes_changed_snapshots_and_stops_after_cancel() {
        let mut server = mockito::Server::new_async().await;
        let body = Arc::new(std::sync::Mutex::new("[]".to_string()));
        let served = Arc::clone(&body);
        let _query = server
            .mock("POST", Matcher::Regex(QUERY_PATH.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| served.lock().unwrap().clone().into_bytes())
            .create_async()
            .await;

        let client = client_at(&server.url(), signed_in_session(i64::MAX));
        let (sender, mut feed) = feed_channel(portal());
        let task = tokio::spawn(poll_feed(
            Arc::clone(&client.inner),
            portal(),
            sender,
            Vec::new(),
        ));

        // unchanged results are not re-delivered
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(feed.try_next(), None);

        *body.lock().unwrap() = json!([query_row("doc1")]).to_string();
        match next_event(&mut feed).await {
            Some(FeedEvent::Snapshot(items)) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].id.as_str(), "doc1");
            }
            other => panic!("expected snapshot, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(feed.try_next(), None);

        feed.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn poll_feed_reports_one_failure_then_closes() {
        let mut server = mockito::Server::new_async().await;
        let _query = server
            .mock("POST", Matcher::Regex(QUERY_PATH.to_string()))
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(PERMISSION_DENIED_BODY)
            .create_async()
            .await;

        let client = client_at(&server.url(), signed_in_session(i64::MAX));
        let (sender, mut feed) = feed_channel(portal());
        let task = tokio::spawn(poll_feed(
            Arc::clone(&client.inner),
            portal(),
            sender,
            Vec::new(),
        ));

        assert!(matches!(
            next_event(&mut feed).await,
            Some(FeedEvent::Failed(RemoteFault::PermissionDenied(_)))
        ));
        assert_eq!(next_event(&mut feed).await, None);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn subscribe_delivers_the_initial_query() {
        let mut server = mockito::Server::new_async().await;
        let _query = server
            .mock("POST", Matcher::Regex(QUERY_PATH.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!([query_row("doc2"), query_row("doc1")]).to_string())
            .create_async()
            .await;

        let client = client_at(&server.url(), signed_in_session(i64::MAX));
        let mut feed = client.subscribe(&portal()).await.unwrap();

        match next_event(&mut feed).await {
            Some(FeedEvent::Snapshot(items)) => {
                let ids = items.iter().map(|item| item.id.as_str()).collect::<Vec<_>>();
                assert_eq!(ids, vec!["doc2", "doc1"]);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
        feed.cancel();
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_querying() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", Matcher::Regex(r"^/token".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id_token": "fresh-token",
                    "refresh_token": "refresh-2",
                    "expires_in": "3600",
                    "user_id": "uid-1"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let query = server
            .mock("POST", Matcher::Regex(QUERY_PATH.to_string()))
            .match_header("authorization", "Bearer fresh-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .expect(2)
            .create_async()
            .await;

        let client = client_at(&server.url(), signed_in_session(0));
        assert!(client.inner.run_query(&portal()).await.unwrap().is_empty());
        assert!(client.inner.run_query(&portal()).await.unwrap().is_empty());

        refresh.assert_async().await;
        query.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_transport_failures_keep_operation_error_kinds() {
        let client = client_at("http://127.0.0.1:1", signed_in_session(0));

        let write_error = client
            .create_item(&portal(), NewGrievance::new("t", "d"))
            .await
            .unwrap_err();
        assert_eq!(write_error.kind(), crate::ErrorKind::WriteFailure);
        assert!(matches!(write_error, Error::Write(RemoteFault::Connection(_))));

        let feed_error = client.subscribe(&portal()).await.unwrap_err();
        assert_eq!(feed_error.kind(), crate::ErrorKind::ConnectionError);
    }

    #[tokio::test]
    async fn commit_failures_are_write_failures() {
        let mut server = mockito::Server::new_async().await;
        let _commit = server
            .mock("POST", Matcher::Regex(r":commit$".to_string()))
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(PERMISSION_DENIED_BODY)
            .create_async()
            .await;

        let client = client_at(&server.url(), signed_in_session(i64::MAX));
        let error = client
            .update_status(&portal(), &GrievanceId::from("doc1"), GrievanceStatus::Resolved)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Write(RemoteFault::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn create_item_commits_with_server_timestamps() {
        let mut server = mockito::Server::new_async().await;
        let commit = server
            .mock("POST", Matcher::Regex(r":commit$".to_string()))
            .match_header("authorization", "Bearer id-token-1")
            .match_body(Matcher::Regex("REQUEST_TIME".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let client = client_at(&server.url(), signed_in_session(i64::MAX));
        let id = client
            .create_item(&portal(), NewGrievance::new("Dishes", "Left in the sink"))
            .await
            .unwrap();

        assert_eq!(id.as_str().len(), AUTO_ID_LENGTH);
        commit.assert_async().await;
    }
}
