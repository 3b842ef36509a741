use serde::Deserialize;
use thiserror::Error;

/// 4xxで返るバリデーションエラーの1項目
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ValidationDetail {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    #[serde(default)]
    pub msg: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// バリデーションエラーのレスポンスボディ
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationBody {
    pub detail: Vec<ValidationDetail>,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。`capture config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("接続先URLが設定されていません。`capture config --set-base-url URL` で設定してください")]
    MissingBaseUrl,

    #[error("通信エラー: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("APIエラー (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("入力検証エラー (HTTP {status}): {}", summarize(.detail))]
    Validation {
        status: u16,
        detail: Vec<ValidationDetail>,
    },

    #[error("APIレスポンスのパースに失敗: {0}")]
    Decode(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("位置情報(GPS)がありません: {0}")]
    NoGpsData(String),

    #[error("入力エラー: {0}")]
    Prompt(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] capture_common::Error),
}

impl CaptureError {
    /// 非2xxレスポンスからエラーを組み立てる
    ///
    /// 4xxでバリデーション形式のボディなら Validation にする。
    pub fn from_status(status: u16, body: String) -> Self {
        if (400..500).contains(&status) {
            if let Ok(parsed) = serde_json::from_str::<ValidationBody>(&body) {
                return CaptureError::Validation {
                    status,
                    detail: parsed.detail,
                };
            }
        }
        CaptureError::Status { status, body }
    }

    /// 再試行で回復しうるエラーか（通信エラーと5xx）
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::Transport(_) => true,
            CaptureError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

fn summarize(detail: &[ValidationDetail]) -> String {
    detail
        .iter()
        .map(|d| {
            let loc = d
                .loc
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".");
            if loc.is_empty() {
                d.msg.clone()
            } else {
                format!("{}: {}", loc, d.msg)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, CaptureError>;
