//! Capture Common Library
//!
//! キャプチャのデータモデルとローカル状態の突き合わせロジック（I/Oなし）

pub mod types;
pub mod annotation;
pub mod coords;
pub mod error;
pub mod store;
pub mod staging;
pub mod session;

pub use types::{
    AddImagesRequest, AddImagesResponse, Capture, CaptureUpdate, Image, NewCapture, NewImage,
    RemoveImagesRequest, StagedId, StagedImage,
};
pub use annotation::{display_annotation, normalize_annotation, ANNOTATION_PLACEHOLDER};
pub use coords::{format_coordinates, parse_coordinates};
pub use error::{Error, Result};
pub use store::CaptureStore;
pub use staging::StagingBuffer;
pub use session::{CommitRequest, EditMode, EditSession};
