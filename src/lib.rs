//! field-capture
//!
//! 現場写真（写真・注記・座標）をREST APIへ同期するクライアント

pub mod api;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod scanner;
pub mod sync;
pub mod timestamp;
