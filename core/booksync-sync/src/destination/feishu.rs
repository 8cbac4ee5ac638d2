//! Feishu bitable implementation of the destination collaborators.
//!
//! Uses the bitable v1 open API. Records are written keyed by field name,
//! which is how the API addresses cells; field ids are only used locally.

use super::{
    CorrelationKey, DestinationError, DestinationResult, FieldWrite, RowWriter, SchemaSource,
    UpsertResponse,
};
use async_trait::async_trait;
use booksync_types::{DestinationField, FieldId, FieldType, RowId, UpsertOperation};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Longest text value a text cell accepts.
pub const MAX_TEXT_CHARS: usize = 100_000;

/// Tokens are refreshed this long before the service expires them.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 300;

/// Response codes meaning the tenant token is invalid or expired.
const TOKEN_INVALID_CODES: [i64; 4] = [99991661, 99991663, 99991664, 99991668];

/// Feishu app credentials and table coordinates.
///
/// The upper-case keys of older config files (`FEISHU_APP_ID`, ...) are
/// accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeishuConfig {
    #[serde(alias = "FEISHU_APP_ID")]
    pub app_id: String,
    #[serde(alias = "FEISHU_APP_SECRET")]
    pub app_secret: String,
    /// Token of the bitable app that owns the table.
    #[serde(alias = "FEISHU_APP_TOKEN")]
    pub app_token: String,
    #[serde(alias = "FEISHU_TABLE_ID")]
    pub table_id: String,
    /// Optional view that row lookups are restricted to.
    #[serde(alias = "FEISHU_VIEW_ID")]
    pub view_id: Option<String>,
    /// Base URL of the open API (e.g. `https://open.feishu.cn/open-apis`).
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            app_token: String::new(),
            table_id: String::new(),
            view_id: None,
            api_base_url: "https://open.feishu.cn/open-apis".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl FeishuConfig {
    /// Names the settings that are still empty.
    #[must_use]
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.app_id.is_empty() {
            missing.push("app_id");
        }
        if self.app_secret.is_empty() {
            missing.push("app_secret");
        }
        if self.app_token.is_empty() {
            missing.push("app_token");
        }
        if self.table_id.is_empty() {
            missing.push("table_id");
        }
        missing
    }

    fn view_id(&self) -> Option<&str> {
        self.view_id.as_deref().filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone)]
struct TenantToken {
    value: String,
    expires_at: Option<SystemTime>,
}

impl TenantToken {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| SystemTime::now() >= exp)
    }
}

/// Standard response wrapper: `{"code": 0, "msg": "success", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    expire: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FieldPage {
    #[serde(default)]
    items: Vec<ApiField>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiField {
    field_id: String,
    field_name: String,
    #[serde(rename = "type")]
    field_type: u32,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    items: Option<Vec<ApiRecord>>,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    record_id: String,
}

#[derive(Debug, Deserialize)]
struct RecordData {
    record: ApiRecord,
}

/// A bitable table reached through the Feishu open API.
pub struct FeishuTable {
    config: FeishuConfig,
    client: Client,
    token: Arc<RwLock<Option<TenantToken>>>,
}

impl FeishuTable {
    /// Creates a client for the configured table.
    pub fn new(config: FeishuConfig) -> DestinationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DestinationError::Transport(format!("failed to create HTTP client: {e}")))?;

        let missing = config.missing_settings();
        if !missing.is_empty() {
            warn!("Feishu settings missing: {}", missing.join(", "));
        }

        Ok(Self {
            config,
            client,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &FeishuConfig {
        &self.config
    }

    /// Installs a tenant token that never expires locally (e.g. one loaded
    /// from elsewhere).
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(TenantToken {
            value: token.into(),
            expires_at: None,
        });
    }

    /// Returns true if a usable token is cached.
    pub async fn has_valid_token(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_expired())
    }

    /// Gets the cached tenant token, requesting a new one if needed.
    async fn tenant_token(&self) -> DestinationResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.value.clone());
            }
        } // read lock dropped here

        self.request_token().await
    }

    async fn request_token(&self) -> DestinationResult<String> {
        if self.config.app_id.is_empty() || self.config.app_secret.is_empty() {
            return Err(DestinationError::Auth(
                "app_id or app_secret is not configured".to_string(),
            ));
        }

        debug!("Requesting Feishu tenant access token");

        let response = self
            .client
            .post(format!(
                "{}/auth/v3/tenant_access_token/internal",
                self.config.api_base_url
            ))
            .json(&serde_json::json!({
                "app_id": self.config.app_id,
                "app_secret": self.config.app_secret,
            }))
            .send()
            .await
            .map_err(|e| DestinationError::Transport(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(DestinationError::Transport(format!(
                "token request failed ({status}): {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| DestinationError::Auth(format!("failed to parse token response: {e}")))?;

        if token_response.code != 0 {
            return Err(DestinationError::Auth(format!(
                "token request rejected ({}): {}",
                token_response.code, token_response.msg
            )));
        }

        let value = token_response
            .tenant_access_token
            .ok_or_else(|| DestinationError::Auth("token response carried no token".to_string()))?;

        let expires_at = token_response.expire.map(|secs| {
            SystemTime::now() + Duration::from_secs(secs.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS))
        });

        *self.token.write().await = Some(TenantToken {
            value: value.clone(),
            expires_at,
        });
        info!("Acquired Feishu tenant access token");

        Ok(value)
    }

    fn table_url(&self) -> DestinationResult<String> {
        if self.config.app_token.is_empty() || self.config.table_id.is_empty() {
            return Err(DestinationError::NotConfigured(
                "app_token or table_id is not configured".to_string(),
            ));
        }
        Ok(format!(
            "{}/bitable/v1/apps/{}/tables/{}",
            self.config.api_base_url, self.config.app_token, self.config.table_id
        ))
    }

    /// Sends an authorized request and unwraps the response envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> DestinationResult<T> {
        let token = self.tenant_token().await?;

        let response = request
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DestinationError::Transport(format!("{what} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DestinationError::Transport(format!("{what}: failed to read body: {e}")))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.token.write().await.take();
            return Err(DestinationError::Auth(format!("{what} rejected ({status}): {body}")));
        }
        if status.is_server_error() {
            return Err(DestinationError::Transport(format!("{what} failed ({status}): {body}")));
        }

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(DestinationError::Api {
                    code: i64::from(status.as_u16()),
                    msg: body,
                });
            }
            Err(e) => {
                return Err(DestinationError::Transport(format!(
                    "{what}: unexpected response body: {e}"
                )));
            }
        };

        if envelope.code != 0 {
            if TOKEN_INVALID_CODES.contains(&envelope.code) {
                self.token.write().await.take();
                return Err(DestinationError::Auth(format!(
                    "{what}: token invalid ({}): {}",
                    envelope.code, envelope.msg
                )));
            }
            return Err(DestinationError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }

        envelope.data.ok_or_else(|| DestinationError::Api {
            code: 0,
            msg: format!("{what}: response carried no data"),
        })
    }

    /// Finds the first row whose correlation field equals the value.
    async fn find_row(&self, correlation: &CorrelationKey) -> DestinationResult<Option<RowId>> {
        let url = format!("{}/records", self.table_url()?);
        let filter = correlation_filter(correlation)?;

        let mut request = self
            .client
            .get(url)
            .query(&[("filter", filter.as_str()), ("page_size", "1")]);
        if let Some(view_id) = self.config.view_id() {
            request = request.query(&[("view_id", view_id)]);
        }

        debug!("Looking up row where {} = {}", correlation.field.name, correlation.value);
        let page: RecordPage = self.send(request, "record search").await?;

        Ok(page
            .items
            .and_then(|items| items.into_iter().next())
            .map(|r| RowId::new(r.record_id)))
    }

    async fn create_row(
        &self,
        cells: serde_json::Map<String, serde_json::Value>,
    ) -> DestinationResult<RowId> {
        let url = format!("{}/records", self.table_url()?);
        let client_token = uuid::Uuid::new_v4().to_string();

        let request = self
            .client
            .post(url)
            .query(&[("client_token", client_token.as_str())])
            .json(&serde_json::json!({ "fields": cells }));

        let data: RecordData = self.send(request, "record create").await?;
        info!("Created row {}", data.record.record_id);
        Ok(RowId::new(data.record.record_id))
    }

    async fn update_row(
        &self,
        row_id: &RowId,
        cells: serde_json::Map<String, serde_json::Value>,
    ) -> DestinationResult<RowId> {
        let url = format!("{}/records/{}", self.table_url()?, row_id);

        let request = self
            .client
            .put(url)
            .json(&serde_json::json!({ "fields": cells }));

        let data: RecordData = self.send(request, "record update").await?;
        info!("Updated row {}", data.record.record_id);
        Ok(RowId::new(data.record.record_id))
    }
}

/// Builds the record search filter `CurrentValue.[name] = "value"`.
///
/// Field references cannot be escaped, so a name containing `]` is refused.
fn correlation_filter(correlation: &CorrelationKey) -> DestinationResult<String> {
    let name = &correlation.field.name;
    if name.contains(']') {
        return Err(DestinationError::MalformedPayload(format!(
            "field name {name:?} cannot be used to look up rows"
        )));
    }
    let value = correlation.value.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(format!("CurrentValue.[{name}] = \"{value}\""))
}

/// Checks one cell against the column's constraints before it is sent.
fn check_cell(write: &FieldWrite) -> Result<(), String> {
    use serde_json::Value;

    match (write.field.field_type, &write.value) {
        (FieldType::Text | FieldType::SingleSelect, Value::String(s)) => {
            let len = s.chars().count();
            if len > MAX_TEXT_CHARS {
                return Err(format!("text is {len} characters, limit is {MAX_TEXT_CHARS}"));
            }
            Ok(())
        }
        (FieldType::MultiSelect, Value::Array(options)) if !options.is_empty() => Ok(()),
        (FieldType::Number | FieldType::DateTime, Value::Number(_)) => Ok(()),
        (FieldType::Number, _) => Err("value is not a finite number".to_string()),
        (FieldType::Url, Value::Object(link)) => match link.get("link").and_then(Value::as_str) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
            _ => Err("link must be an http(s) URL".to_string()),
        },
        (ty, _) => Err(format!("cannot write this value to a {ty} field")),
    }
}

#[async_trait]
impl SchemaSource for FeishuTable {
    async fn list_fields(&self) -> DestinationResult<Vec<DestinationField>> {
        let url = format!("{}/fields", self.table_url()?);
        let mut fields = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("page_size", "100")]);
            if let Some(token) = &page_token {
                request = request.query(&[("page_token", token.as_str())]);
            }

            let page: FieldPage = self.send(request, "field list").await?;
            fields.extend(page.items.into_iter().map(|f| {
                DestinationField::new(f.field_id, f.field_name, FieldType::from(f.field_type))
            }));

            page_token = page.page_token.filter(|_| page.has_more);
            if page_token.is_none() {
                break;
            }
        }

        info!("Listed {} table fields", fields.len());
        Ok(fields)
    }
}

#[async_trait]
impl RowWriter for FeishuTable {
    async fn upsert(
        &self,
        correlation: Option<&CorrelationKey>,
        fields: &BTreeMap<FieldId, FieldWrite>,
    ) -> DestinationResult<UpsertResponse> {
        let mut cells = serde_json::Map::new();
        let mut rejected = BTreeMap::new();

        for (field_id, write) in fields {
            match check_cell(write) {
                Ok(()) => {
                    cells.insert(write.field.name.clone(), write.value.clone());
                }
                Err(reason) => {
                    warn!("Rejecting field {} ({}): {}", write.field.name, field_id, reason);
                    rejected.insert(field_id.clone(), reason);
                }
            }
        }

        if cells.is_empty() {
            return Err(DestinationError::MalformedPayload(
                "no field in the payload can be written".to_string(),
            ));
        }

        let existing = match correlation {
            Some(key) => self.find_row(key).await?,
            None => None,
        };

        let (row_id, operation) = match existing {
            Some(row_id) => (self.update_row(&row_id, cells).await?, UpsertOperation::Updated),
            None => (self.create_row(cells).await?, UpsertOperation::Created),
        };

        Ok(UpsertResponse {
            row_id,
            operation,
            rejected,
        })
    }
}
