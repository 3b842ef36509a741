//! ステージングバッファ（撮影済み・未アップロードの写真）

use crate::error::{Error, Result};
use crate::types::{StagedId, StagedImage};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct StagingBuffer {
    next_id: u64,
    staged: Vec<StagedImage>,
    /// 破棄候補として選択中のステージング写真
    selected: BTreeSet<StagedId>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写真を追加してローカルIDを払い出す
    pub fn stage(
        &mut self,
        encoded: String,
        date_created: String,
        source: Option<String>,
    ) -> StagedId {
        self.next_id += 1;
        let local_id = StagedId(self.next_id);
        self.staged.push(StagedImage {
            local_id,
            encoded,
            date_created,
            source,
        });
        local_id
    }

    pub fn staged(&self) -> &[StagedImage] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn selected(&self) -> &BTreeSet<StagedId> {
        &self.selected
    }

    /// 破棄候補の選択を切り替え。選択状態になったら true
    pub fn toggle_discard(&mut self, local_id: StagedId) -> Result<bool> {
        if !self.staged.iter().any(|s| s.local_id == local_id) {
            return Err(Error::UnknownStagedImage(local_id.0));
        }
        if self.selected.remove(&local_id) {
            Ok(false)
        } else {
            self.selected.insert(local_id);
            Ok(true)
        }
    }

    /// 選択中の写真をアップロード前に破棄
    pub fn discard_selected(&mut self) -> Vec<StagedImage> {
        let selected = std::mem::take(&mut self.selected);
        let (discarded, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.staged)
            .into_iter()
            .partition(|s| selected.contains(&s.local_id));
        self.staged = kept;
        discarded
    }

    /// アップロード用に全件取り出す（バッファは空になる）
    pub fn take_all(&mut self) -> Vec<StagedImage> {
        self.selected.clear();
        std::mem::take(&mut self.staged)
    }

    pub fn clear(&mut self) {
        self.staged.clear();
        self.selected.clear();
    }
}
