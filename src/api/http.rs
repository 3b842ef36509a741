use super::CaptureApi;
use crate::config::Config;
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use capture_common::{
    AddImagesRequest, AddImagesResponse, Capture, CaptureUpdate, NewCapture, RemoveImagesRequest,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// reqwestによるAPIクライアント
#[derive(Debug, Clone)]
pub struct HttpCaptureApi {
    client: Client,
    base_url: String,
}

impl HttpCaptureApi {
    pub fn new(base_url: &str, api_key: &str, api_key_header: &str, timeout: Duration) -> Result<Self> {
        let name = HeaderName::from_bytes(api_key_header.as_bytes()).map_err(|e| {
            CaptureError::Config(format!("APIキーのヘッダ名が不正: {} ({})", api_key_header, e))
        })?;
        let mut value = HeaderValue::from_str(api_key)
            .map_err(|e| CaptureError::Config(format!("APIキーが不正: {}", e)))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(name, value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `base_url` はコマンドラインでの上書き指定
    pub fn from_config(config: &Config, base_url: Option<&str>) -> Result<Self> {
        let base_url = config.get_base_url(base_url)?;
        let api_key = config.get_api_key()?;
        Self::new(
            &base_url,
            &api_key,
            &config.api_key_header,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(CaptureError::from_status(status.as_u16(), text));
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let text = Self::send(request).await?;
        serde_json::from_str(&text).map_err(|e| CaptureError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CaptureApi for HttpCaptureApi {
    async fn list_captures(&self) -> Result<Vec<Capture>> {
        Self::send_json(self.client.get(self.url("/captures"))).await
    }

    async fn create_capture(&self, body: &NewCapture) -> Result<Capture> {
        Self::send_json(self.client.post(self.url("/capture")).json(body)).await
    }

    async fn get_capture(&self, id: i64) -> Result<Capture> {
        Self::send_json(self.client.get(self.url(&format!("/captures/{}", id)))).await
    }

    async fn update_capture(&self, id: i64, body: &CaptureUpdate) -> Result<Capture> {
        let url = self.url(&format!("/captures/{}", id));
        Self::send_json(self.client.patch(url).json(body)).await
    }

    async fn delete_capture(&self, id: i64) -> Result<()> {
        let url = self.url(&format!("/captures/{}", id));
        Self::send(self.client.delete(url)).await.map(|_| ())
    }

    async fn add_images(&self, id: i64, body: &AddImagesRequest) -> Result<AddImagesResponse> {
        let url = self.url(&format!("/captures/{}/add_images", id));
        Self::send_json(self.client.post(url).json(body)).await
    }

    async fn remove_images(&self, id: i64, body: &RemoveImagesRequest) -> Result<()> {
        let url = self.url(&format!("/captures/{}/remove_images", id));
        Self::send(self.client.delete(url).json(body)).await.map(|_| ())
    }
}
