//! キャプチャREST APIクライアント
//!
//! `CaptureApi` を境界にして、同期処理は具体的なHTTP実装に依存しない。
//! 本番は `HttpCaptureApi`（reqwest）を組み立てて注入する。

mod http;
pub mod retry;

pub use http::HttpCaptureApi;
pub use retry::{with_retry, RetryPolicy};

use crate::error::Result;
use async_trait::async_trait;
use capture_common::{
    AddImagesRequest, AddImagesResponse, Capture, CaptureUpdate, NewCapture, RemoveImagesRequest,
};

#[async_trait]
pub trait CaptureApi: Send + Sync {
    /// GET /captures
    async fn list_captures(&self) -> Result<Vec<Capture>>;

    /// POST /capture
    async fn create_capture(&self, body: &NewCapture) -> Result<Capture>;

    /// GET /captures/{id}
    async fn get_capture(&self, id: i64) -> Result<Capture>;

    /// PATCH /captures/{id}
    async fn update_capture(&self, id: i64, body: &CaptureUpdate) -> Result<Capture>;

    /// DELETE /captures/{id}
    async fn delete_capture(&self, id: i64) -> Result<()>;

    /// POST /captures/{id}/add_images
    async fn add_images(&self, id: i64, body: &AddImagesRequest) -> Result<AddImagesResponse>;

    /// DELETE /captures/{id}/remove_images
    async fn remove_images(&self, id: i64, body: &RemoveImagesRequest) -> Result<()>;
}
