//! HTTP client for the extraction backend. The backend accepts document
//! uploads, runs AI extraction asynchronously and hands back structured
//! field data for human review; this module only speaks its REST contract.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

fn load_env() {
    let _ = dotenvy::dotenv();
}

/// Document record as the backend returns it after upload. Backend ids are
/// opaque strings, unrelated to local store row ids.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Extraction awaiting review for one uploaded document.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteExtraction {
    pub id: String,
    pub doc_type: String,
    pub extracted_data: Value,
    #[serde(default)]
    pub status: Option<String>,
}

/// Model credentials entry on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub selected_model: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProvider {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub selected_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
}

pub struct ExtractionClient {
    base_url: String,
    client: Client,
}

impl ExtractionClient {
    /// Build a client from `FINSIGHT_API_URL` (a `.env` file is honored).
    pub fn from_env() -> Result<Self> {
        load_env();
        let base_url = std::env::var("FINSIGHT_API_URL")
            .map_err(|_| Error::Config("FINSIGHT_API_URL not set in .env".to_string()))?;
        Self::new(&base_url)
    }

    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Service(e.to_string()))?;
        Ok(ExtractionClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_error(e: reqwest::Error) -> Error {
        if e.is_connect() || e.is_timeout() {
            Error::Service("Check your internet connection and try again.".to_string())
        } else {
            Error::Service("Network error.".to_string())
        }
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(Error::Service(format!(
            "Request failed ({}): {}",
            status,
            if body.is_empty() { "no details" } else { body.as_str() }
        )))
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(Self::send_error)?;
        Self::check(response)?
            .json()
            .map_err(|e| Error::Service(format!("Invalid JSON: {}", e)))
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(Self::send_error)?;
        Self::check(response)?
            .json()
            .map_err(|e| Error::Service(format!("Invalid JSON: {}", e)))
    }

    /// Upload one document for a company. Returns the backend's document
    /// record; extraction has not started yet at this point.
    pub fn upload_document(&self, file_path: &Path, company_id: &str) -> Result<RemoteDocument> {
        if !file_path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "File not found. Browse to select again.",
            )));
        }
        let form = multipart::Form::new()
            .text("company_id", company_id.to_string())
            .file("file", file_path)
            .map_err(|e| Error::Service(format!("Could not attach file: {}", e)))?;
        let response = self
            .client
            .post(self.url("/documents/upload"))
            .multipart(form)
            .send()
            .map_err(Self::send_error)?;
        let body: Value = Self::check(response)?
            .json()
            .map_err(|e| Error::Service(format!("Invalid JSON: {}", e)))?;
        let document = body
            .get("document")
            .cloned()
            .ok_or_else(|| Error::Service("No document in upload response".to_string()))?;
        serde_json::from_value(document).map_err(|e| Error::Service(e.to_string()))
    }

    /// Trigger async extraction for an uploaded document. The backend runs
    /// it in the background; poll `get_extraction` afterwards.
    pub fn start_parse(&self, document_id: &str) -> Result<()> {
        self.post_json(&format!("/documents/{}/parse", document_id), &Value::Null)?;
        Ok(())
    }

    /// Fetch the pending extraction for a document, once available.
    pub fn get_extraction(&self, document_id: &str) -> Result<RemoteExtraction> {
        let body = self.get_json(&format!("/documents/{}/extraction", document_id))?;
        let extraction = body
            .get("extraction")
            .cloned()
            .ok_or_else(|| Error::Service("No pending extraction for this document".to_string()))?;
        serde_json::from_value(extraction).map_err(|e| Error::Service(e.to_string()))
    }

    /// Approve a reviewed extraction, optionally with user corrections;
    /// the backend commits the data into the relevant business table.
    pub fn approve_extraction(
        &self,
        extraction_id: &str,
        user_corrections: Option<Value>,
    ) -> Result<()> {
        let body = serde_json::json!({
            "extraction_id": extraction_id,
            "user_corrections": user_corrections,
        });
        self.post_json("/extractions/approve", &body)?;
        Ok(())
    }

    // -- LLM provider configuration ---------------------------------------

    pub fn list_providers(&self) -> Result<Vec<Provider>> {
        let body = self.get_json("/llm/providers")?;
        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| Error::Service("No data in provider response".to_string()))?;
        serde_json::from_value(data).map_err(|e| Error::Service(e.to_string()))
    }

    pub fn create_provider(&self, provider: &NewProvider) -> Result<Provider> {
        let body = self.post_json(
            "/llm/providers",
            &serde_json::to_value(provider).map_err(|e| Error::Service(e.to_string()))?,
        )?;
        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| Error::Service("No data in provider response".to_string()))?;
        serde_json::from_value(data).map_err(|e| Error::Service(e.to_string()))
    }

    pub fn update_provider(&self, provider_id: &str, patch: &ProviderPatch) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("/llm/providers/{}", provider_id)))
            .json(patch)
            .send()
            .map_err(Self::send_error)?;
        Self::check(response)?;
        Ok(())
    }

    pub fn delete_provider(&self, provider_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/llm/providers/{}", provider_id)))
            .send()
            .map_err(Self::send_error)?;
        Self::check(response)?;
        Ok(())
    }

    /// Make one provider active; the backend deactivates the rest.
    pub fn activate_provider(&self, provider_id: &str) -> Result<()> {
        self.post_json(
            &format!("/llm/providers/{}/activate", provider_id),
            &Value::Null,
        )?;
        Ok(())
    }
}
