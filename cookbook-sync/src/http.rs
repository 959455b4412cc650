//! HTTP adapters for the query gateway and object storage
//!
//! [`HttpGateway`] speaks the gateway's JSON query protocol: every call posts
//! one `{ query, variables }` document and reads one `{ data, errors }`
//! answer. It implements both [`RecipeGateway`] and [`CredentialIssuer`].
//!
//! [`HttpObjectStore`] performs the direct storage write with a
//! `multipart/form-data` body built from a [`WriteCapability`].

use std::time::Duration;

use async_trait::async_trait;
use cookbook_common::api::{QueryRequest, QueryResponse, SESSION_COOKIE};
use reqwest::{header, multipart, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::gateway::RecipeGateway;
use crate::record::Recipe;
use crate::upload::{CredentialIssuer, ObjectStore, UploadFile, WriteCapability};

/// Default timeout for gateway requests
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Storage writes carry image bytes and get longer
const STORAGE_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("cookbook-sync/", env!("CARGO_PKG_VERSION"));

pub const LOAD_RECIPES: &str =
    "query { recipe { list { id name difficulty created creator image content } } }";

pub const SAVE_RECIPES: &str =
    "mutation SaveRecipes($recipes: [RecipeInput!]!) { recipe { save(recipes: $recipes) } }";

pub const REQUEST_UPLOAD: &str =
    "mutation RequestUpload($name: String!) { recipe { upload(name: $name) { upload { url fields } link } } }";

// ========================================
// Response shapes
// ========================================

#[derive(Debug, Deserialize)]
struct RecipeListData {
    recipe: RecipeList,
}

#[derive(Debug, Deserialize)]
struct RecipeList {
    #[serde(default)]
    list: Vec<Recipe>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    recipe: UploadField,
}

#[derive(Debug, Deserialize)]
struct UploadField {
    upload: Option<UploadGrant>,
}

#[derive(Debug, Deserialize)]
struct UploadGrant {
    upload: PresignedPost,
    link: String,
}

#[derive(Debug, Deserialize)]
struct PresignedPost {
    url: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl UploadGrant {
    fn into_capability(self) -> WriteCapability {
        let fields = self
            .upload
            .fields
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        WriteCapability::new(self.upload.url, fields, self.link)
    }
}

// ========================================
// Gateway client
// ========================================

/// Query gateway client
pub struct HttpGateway {
    client: Client,
    endpoint: String,
    /// Value of the `Cookie` header sent with every request
    cookie: Option<String>,
}

impl HttpGateway {
    /// # Arguments
    /// * `endpoint` - Gateway URL accepting query documents
    /// * `session` - Session cookie value; a bare value is sent as the
    ///   `session` cookie, a value containing `=` is sent verbatim
    pub fn new(endpoint: impl Into<String>, session: Option<String>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));

        let client = Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let cookie = session.filter(|s| !s.is_empty()).map(|s| {
            if s.contains('=') {
                s
            } else {
                format!("{}={}", SESSION_COOKIE, s)
            }
        });

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            cookie,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post one query document and decode its data
    ///
    /// `operation` only labels errors and logs.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: &QueryRequest,
    ) -> Result<T> {
        debug!(operation, endpoint = %self.endpoint, "Gateway request");

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::GatewayStatus {
                status: status.as_u16(),
            });
        }

        let body: QueryResponse<T> = response.json().await?;
        body.into_result()
            .map_err(SyncError::Query)?
            .ok_or(SyncError::EmptyResponse(operation))
    }
}

#[async_trait]
impl RecipeGateway for HttpGateway {
    async fn load_recipes(&self) -> Result<Vec<Recipe>> {
        let data: RecipeListData = self
            .execute("recipe.list", &QueryRequest::new(LOAD_RECIPES))
            .await?;
        debug!(records = data.recipe.list.len(), "Recipes loaded");
        Ok(data.recipe.list)
    }

    async fn save_recipes(&self, recipes: &[Recipe]) -> Result<()> {
        let request = QueryRequest::new(SAVE_RECIPES).with_variables(json!({ "recipes": recipes }));
        // The mutation's own result carries nothing beyond success.
        let _: Value = self.execute("recipe.save", &request).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialIssuer for HttpGateway {
    async fn issue(&self, asset_name: &str) -> Result<Option<WriteCapability>> {
        let request = QueryRequest::new(REQUEST_UPLOAD).with_variables(json!({ "name": asset_name }));
        let data: UploadData = self.execute("recipe.upload", &request).await?;
        Ok(data.recipe.upload.map(UploadGrant::into_capability))
    }
}

// ========================================
// Object storage
// ========================================

/// Direct-to-storage writer
pub struct HttpObjectStore {
    client: Client,
}

impl HttpObjectStore {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(STORAGE_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn write(&self, capability: WriteCapability, file: &UploadFile) -> Result<String> {
        let mut form = multipart::Form::new();
        for (key, value) in capability.fields() {
            form = form.text(key.clone(), value.clone());
        }

        // Storage expects the file after every credential field.
        let mut part = multipart::Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }
        form = form.part("file", part);

        let response = self.client.post(capability.url()).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::StorageRejected {
                status: status.as_u16(),
            });
        }

        debug!(url = %capability.url(), bytes = file.bytes.len(), "Object written");
        Ok(capability.link().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_session_value_becomes_cookie() {
        let gateway = HttpGateway::new("http://localhost/graphql", Some("abc".to_string())).unwrap();
        assert_eq!(gateway.cookie.as_deref(), Some("session=abc"));

        let gateway =
            HttpGateway::new("http://localhost/graphql", Some("session=abc; session.sig=x".to_string()))
                .unwrap();
        assert_eq!(gateway.cookie.as_deref(), Some("session=abc; session.sig=x"));

        let gateway = HttpGateway::new("http://localhost/graphql", Some(String::new())).unwrap();
        assert_eq!(gateway.cookie, None);
    }

    #[test]
    fn test_upload_grant_fields_become_strings() {
        let grant: UploadField = serde_json::from_value(json!({
            "upload": {
                "upload": {
                    "url": "https://bucket.example",
                    "fields": { "key": "pie.jpg", "Policy": "p0l1cy", "x-amz-expires": 300 }
                },
                "link": "https://cdn.example/pie.jpg"
            }
        }))
        .unwrap();

        let capability = grant.upload.unwrap().into_capability();
        assert_eq!(capability.url(), "https://bucket.example");
        assert_eq!(capability.link(), "https://cdn.example/pie.jpg");
        assert!(capability
            .fields()
            .contains(&("x-amz-expires".to_string(), "300".to_string())));
        assert_eq!(capability.fields().len(), 3);
    }

    #[test]
    fn test_null_upload_means_no_credential() {
        let field: UploadField = serde_json::from_value(json!({ "upload": null })).unwrap();
        assert!(field.upload.is_none());
    }
}
