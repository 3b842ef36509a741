use crate::error::CaptureError;
use capture_common::{Capture, StagedImage};

/// 同期処理の通知（画面側はチャネルで受け取る）
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    CaptureCreated(Capture),
    CaptureDeleted { capture: Capture, success: bool },
    ImagesUploaded { capture_id: i64, image_ids: Vec<i64> },
    ImagesRemoved { capture_id: i64, image_ids: Vec<i64> },
    AnnotationUpdated { capture_id: i64, annotation: String },
}

/// コミット内の1リクエスト分の結果
#[derive(Debug)]
pub enum StepOutcome {
    /// 対象なし（リクエストを送っていない）
    Skipped,
    /// 成功してローカルに反映した件数
    Applied(usize),
    /// サーバーでは成功したが、反映先のセッションが既に閉じていた
    Detached,
    Failed(CaptureError),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    /// サーバー側で反映された
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Applied(_) | StepOutcome::Detached)
    }
}

/// 編集モード終了時のコミット結果
///
/// 削除とアップロードは独立に成否が決まる。
#[derive(Debug)]
pub struct CommitOutcome {
    pub removed: StepOutcome,
    pub uploaded: StepOutcome,
    /// アップロードに失敗して送れなかった写真（再ステージング用）
    pub unsent: Vec<StagedImage>,
}

impl CommitOutcome {
    pub fn is_success(&self) -> bool {
        !self.removed.is_failed() && !self.uploaded.is_failed()
    }

    /// 片方は反映され、もう片方は失敗した状態
    pub fn is_partial(&self) -> bool {
        (self.removed.is_failed() && self.uploaded.is_done())
            || (self.uploaded.is_failed() && self.removed.is_done())
    }
}

/// 注記更新の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationOutcome {
    /// 現在の注記と同じなので送信しなかった
    Unchanged,
    /// 一括編集中なので送信しなかった
    Deferred,
    /// サーバーが返した注記
    Updated(String),
}
