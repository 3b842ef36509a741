//! キャプチャ関連の型定義
//!
//! - Capture: サーバー上のキャプチャ（写真・注記・座標のまとまり）
//! - Image: サーバーが確定した写真
//! - StagedImage: 撮影済み・未アップロードの写真
//! - リクエスト/レスポンスのボディ型

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// サーバー上のキャプチャ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub id: i64,

    /// 注記（空文字は「注記なし」）
    #[serde(default)]
    pub annotation: String,

    /// "lat,lon" 形式。作成時に一度だけ設定される
    #[serde(default)]
    pub coordinates: String,

    #[serde(default)]
    pub date_created: String,

    #[serde(default)]
    pub date_updated: Option<String>,

    /// サーバー確定済みの写真のみ（作成直後は null で返る）
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<Image>,
}

impl Capture {
    pub fn image_ids(&self) -> Vec<i64> {
        self.images.iter().map(|img| img.image_id).collect()
    }

    pub fn contains_image(&self, image_id: i64) -> bool {
        self.images.iter().any(|img| img.image_id == image_id)
    }
}

/// サーバー確定済みの写真
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(alias = "id")]
    pub image_id: i64,

    /// Base64エンコードされたJPEG
    #[serde(default)]
    pub encoded: String,

    #[serde(default)]
    pub date_created: String,
}

/// ステージング写真のローカルID
///
/// サーバーIDとは別の型にして取り違えを防ぐ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagedId(pub u64);

impl fmt::Display for StagedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// 未アップロードの写真
#[derive(Debug, Clone, PartialEq)]
pub struct StagedImage {
    pub local_id: StagedId,
    pub encoded: String,
    pub date_created: String,
    /// 元ファイル名（表示用）
    pub source: Option<String>,
}

impl StagedImage {
    pub fn to_new_image(&self) -> NewImage {
        NewImage {
            encoded: self.encoded.clone(),
            date_created: self.date_created.clone(),
        }
    }
}

/// POST /capture のボディ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCapture {
    pub annotation: String,
    pub coordinates: String,
    pub date_created: String,
}

/// PATCH /captures/{id} のボディ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureUpdate {
    pub annotation: String,
}

/// アップロードする写真1枚
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewImage {
    pub encoded: String,
    pub date_created: String,
}

/// POST /captures/{id}/add_images のボディ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddImagesRequest {
    pub images: Vec<NewImage>,
}

/// POST /captures/{id}/add_images のレスポンス
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddImagesResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<Image>,
}

/// DELETE /captures/{id}/remove_images のボディ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveImagesRequest {
    pub image_ids: Vec<i64>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
