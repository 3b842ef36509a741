//! 写真ファイルの読み込みとステージング用エンコード
//!
//! JPEG/PNGを読み込み、長辺を縮小して固定品質のJPEGに再エンコードし、
//! Base64文字列にする。

mod exif;

use crate::error::{CaptureError, Result};
use crate::timestamp::{exif_to_iso8601, now_iso8601};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use capture_common::format_coordinates;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub path: PathBuf,
    pub file_name: String,
    /// 撮影日時（EXIF）
    pub date: Option<String>,
}

/// エンコード済みの写真（ステージング前）
#[derive(Debug, Clone)]
pub struct EncodedPhoto {
    pub encoded: String,
    pub date_created: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub jpeg_quality: u8,
    pub max_image_size: u32,
    pub show_progress: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 70,
            max_image_size: 1600,
            show_progress: false,
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "JPG", "JPEG", "PNG"];

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|&e| e == ext.to_string_lossy()))
        .unwrap_or(false)
}

fn photo_file(path: &Path) -> PhotoFile {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let date = exif::extract_date(path).ok();

    PhotoFile {
        path: path.to_path_buf(),
        file_name,
        date,
    }
}

/// ファイル/フォルダ指定から写真を集める
///
/// フォルダは直下のみ（ファイル名順）。ファイル指定は指定順。
pub fn collect_photos(paths: &[PathBuf]) -> Result<Vec<PhotoFile>> {
    let mut photos = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(CaptureError::FileNotFound(path.display().to_string()));
        }

        if path.is_dir() {
            let mut in_folder: Vec<PhotoFile> = WalkDir::new(path)
                .max_depth(1)  // 直下のみ（再帰しない）
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file() && is_image_path(e.path()))
                .map(|e| photo_file(e.path()))
                .collect();

            // ファイル名でソート
            in_folder.sort_by(|a, b| a.file_name.cmp(&b.file_name));
            photos.extend(in_folder);
        } else if is_image_path(path) {
            photos.push(photo_file(path));
        } else {
            log::warn!("skipping non-image file: {}", path.display());
        }
    }

    Ok(photos)
}

/// 1枚をJPEG化してBase64にする
pub fn encode_photo(path: &Path, options: &EncodeOptions) -> Result<String> {
    let img = image::open(path)
        .map_err(|e| CaptureError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    let max = options.max_image_size;
    let img = if img.width() > max || img.height() > max {
        img.resize(max, max, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, options.jpeg_quality)
        .encode_image(&rgb)
        .map_err(|e| CaptureError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    Ok(BASE64_STANDARD.encode(buffer))
}

/// 写真をまとめてエンコード（並列）
///
/// 入力の順序を保つ。1枚でも失敗したらエラー。
pub fn encode_photos(photos: &[PhotoFile], options: &EncodeOptions) -> Result<Vec<EncodedPhoto>> {
    let progress = if options.show_progress {
        let pb = ProgressBar::new(photos.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
            pb.set_style(style);
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let encoded = photos
        .par_iter()
        .map(|photo| {
            let encoded = encode_photo(&photo.path, options)?;
            progress.inc(1);
            let date_created = photo
                .date
                .as_deref()
                .and_then(exif_to_iso8601)
                .unwrap_or_else(now_iso8601);
            Ok(EncodedPhoto {
                encoded,
                date_created,
                source: photo.file_name.clone(),
            })
        })
        .collect::<Result<Vec<_>>>();

    progress.finish_and_clear();
    encoded
}

/// 写真のEXIFから "lat,lon" を作る
pub fn coordinates_from_photo(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CaptureError::FileNotFound(path.display().to_string()));
    }
    let (lat, lon) = exif::extract_gps(path)
        .map_err(|e| CaptureError::NoGpsData(format!("{}: {}", path.display(), e)))?;
    Ok(format_coordinates(lat, lon))
}
