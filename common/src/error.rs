//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Unknown image id: {0}")]
    UnknownImage(i64),

    #[error("Unknown staged image: {0}")]
    UnknownStagedImage(u64),

    #[error("Not in edit mode")]
    NotEditing,
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
