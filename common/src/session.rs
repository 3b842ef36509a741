//! 編集セッションの状態遷移
//!
//! Viewing → Editing → Viewing。Editing を抜けるときにコミット要求を返す。

use crate::error::{Error, Result};
use crate::staging::StagingBuffer;
use crate::types::{Capture, StagedId, StagedImage};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Viewing,
    Editing,
}

/// 編集モード終了時にまとめて送る変更
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    /// 削除するサーバー確定済み写真のID
    pub pending_delete: BTreeSet<i64>,
    /// アップロードするステージング写真
    pub pending_upload: Vec<StagedImage>,
}

impl CommitRequest {
    pub fn is_empty(&self) -> bool {
        self.pending_delete.is_empty() && self.pending_upload.is_empty()
    }
}

/// キャプチャ詳細画面1つ分の編集状態
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    mode: EditMode,
    staging: StagingBuffer,
    pending_delete: BTreeSet<i64>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.mode == EditMode::Editing
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn pending_delete(&self) -> &BTreeSet<i64> {
        &self.pending_delete
    }

    /// 編集モードの切り替え
    ///
    /// Editing から抜けるときだけコミット要求を返す。
    pub fn toggle(&mut self) -> Option<CommitRequest> {
        match self.mode {
            EditMode::Viewing => {
                self.enter_edit();
                None
            }
            EditMode::Editing => Some(self.leave_edit()),
        }
    }

    /// 前回セッションの残りは破棄して編集開始
    pub fn enter_edit(&mut self) {
        if !self.pending_delete.is_empty() || !self.staging.is_empty() {
            log::debug!(
                "discarding leftover edit state: {} pending deletes, {} staged",
                self.pending_delete.len(),
                self.staging.len()
            );
        }
        self.pending_delete.clear();
        self.staging.clear();
        self.mode = EditMode::Editing;
    }

    fn leave_edit(&mut self) -> CommitRequest {
        self.mode = EditMode::Viewing;
        CommitRequest {
            pending_delete: std::mem::take(&mut self.pending_delete),
            pending_upload: self.staging.take_all(),
        }
    }

    /// アップロードに失敗した写真を編集モードに戻す
    ///
    /// 次のコミットで再送できるよう、新しいステージングIDで積み直す。
    pub fn restore_unsent(&mut self, unsent: Vec<StagedImage>) -> usize {
        if unsent.is_empty() {
            return 0;
        }
        if !self.is_editing() {
            self.enter_edit();
        }
        let count = unsent.len();
        for image in unsent {
            self.staging.stage(image.encoded, image.date_created, image.source);
        }
        count
    }

    /// 確定済み写真の削除選択を切り替え。選択状態になったら true
    pub fn toggle_delete(&mut self, capture: &Capture, image_id: i64) -> Result<bool> {
        self.ensure_editing()?;
        if !capture.contains_image(image_id) {
            return Err(Error::UnknownImage(image_id));
        }
        if self.pending_delete.remove(&image_id) {
            Ok(false)
        } else {
            self.pending_delete.insert(image_id);
            Ok(true)
        }
    }

    /// 撮影した写真をステージング
    pub fn stage(
        &mut self,
        encoded: String,
        date_created: String,
        source: Option<String>,
    ) -> Result<StagedId> {
        self.ensure_editing()?;
        Ok(self.staging.stage(encoded, date_created, source))
    }

    pub fn toggle_discard(&mut self, local_id: StagedId) -> Result<bool> {
        self.ensure_editing()?;
        self.staging.toggle_discard(local_id)
    }

    pub fn discard_selected(&mut self) -> Result<Vec<StagedImage>> {
        self.ensure_editing()?;
        Ok(self.staging.discard_selected())
    }

    fn ensure_editing(&self) -> Result<()> {
        if self.is_editing() {
            Ok(())
        } else {
            Err(Error::NotEditing)
        }
    }
}
