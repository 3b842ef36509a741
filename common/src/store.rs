//! キャプチャストア（ローカル状態とサーバー確定状態の突き合わせ）
//!
//! 確定済み写真リストを変更できるのは次の2経路だけ:
//! - アップロード成功時、サーバーが返した順に末尾へ追加
//! - 一括削除成功時、削除したIDを除去

use crate::types::{Capture, Image};
use std::collections::BTreeSet;

/// 編集中の1件のキャプチャ
#[derive(Debug, Clone)]
pub struct CaptureStore {
    capture: Capture,
}

impl CaptureStore {
    pub fn new(capture: Capture) -> Self {
        Self { capture }
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn id(&self) -> i64 {
        self.capture.id
    }

    pub fn annotation(&self) -> &str {
        &self.capture.annotation
    }

    pub fn images(&self) -> &[Image] {
        &self.capture.images
    }

    /// アップロード結果を反映
    ///
    /// 既に存在するIDは追加しない。追加した件数を返す。
    pub fn apply_uploaded(&mut self, images: Vec<Image>) -> usize {
        let mut added = 0;
        for image in images {
            if self.capture.contains_image(image.image_id) {
                log::warn!(
                    "capture {}: duplicate image id {} in upload response, ignored",
                    self.capture.id,
                    image.image_id
                );
                continue;
            }
            self.capture.images.push(image);
            added += 1;
        }
        added
    }

    /// 一括削除結果を反映。除去した件数を返す
    pub fn apply_removed(&mut self, image_ids: &BTreeSet<i64>) -> usize {
        let before = self.capture.images.len();
        self.capture
            .images
            .retain(|img| !image_ids.contains(&img.image_id));
        before - self.capture.images.len()
    }

    /// サーバーが返した注記を反映
    ///
    /// 写真リストはこの経路では変更しない。
    pub fn apply_annotation(&mut self, echoed: &Capture) {
        self.capture.annotation = echoed.annotation.clone();
        if echoed.date_updated.is_some() {
            self.capture.date_updated = echoed.date_updated.clone();
        }
    }
}
