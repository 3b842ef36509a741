//! 同期コーディネータ
//!
//! リモートのキャプチャに対するCRUDを発行し、成功したものだけを
//! ローカルのキャプチャストアへ反映する。
//!
//! - 読み取り（一覧・詳細）は再試行あり。失敗時は手元のデータのまま
//! - 変更系は1回だけ送信。成功したら反映、失敗したらローカルは変更しない
//! - コミット時の一括削除と一括アップロードは並行に送り、それぞれ独立に反映

mod outcome;

pub use outcome::{AnnotationOutcome, CommitOutcome, StepOutcome, SyncEvent};

use crate::api::{with_retry, CaptureApi, RetryPolicy};
use crate::error::Result;
use crate::timestamp::now_iso8601;
use capture_common::{
    format_coordinates, normalize_annotation, parse_coordinates, AddImagesRequest, Capture, CaptureStore,
    CaptureUpdate, CommitRequest, NewCapture, RemoveImagesRequest,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// 詳細画面が保持するキャプチャストア
pub type SharedStore = Arc<Mutex<CaptureStore>>;

pub fn shared_store(capture: Capture) -> SharedStore {
    Arc::new(Mutex::new(CaptureStore::new(capture)))
}

/// ストアをロック（ポイズン時も中身を使う）
pub fn lock_store(store: &Mutex<CaptureStore>) -> MutexGuard<'_, CaptureStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// セッションが生きていれば反映、閉じていれば何もしない
fn reconcile<R>(
    store: &Weak<Mutex<CaptureStore>>,
    apply: impl FnOnce(&mut CaptureStore) -> R,
) -> Option<R> {
    let store = store.upgrade()?;
    let mut guard = lock_store(&store);
    Some(apply(&mut guard))
}

#[derive(Clone)]
pub struct SyncCoordinator {
    api: Arc<dyn CaptureApi>,
    retry: RetryPolicy,
    events: Option<UnboundedSender<SyncEvent>>,
}

impl SyncCoordinator {
    pub fn new(api: Arc<dyn CaptureApi>) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
            events: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 同期イベントの受信側を作る（以前の購読は置き換え）
    pub fn subscribe(&mut self) -> UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                log::debug!("sync event dropped: receiver closed");
            }
        }
    }

    /// 新規キャプチャを作成（注記なし・写真なし）
    ///
    /// 成功するまでローカルにはキャプチャが存在しない扱い。
    pub async fn create_capture(&self, coordinates: &str) -> Result<Capture> {
        // 座標は作成後に変更できないので "lat,lon" に正規化して送る
        let (lat, lon) = parse_coordinates(coordinates)?;

        let body = NewCapture {
            annotation: String::new(),
            coordinates: format_coordinates(lat, lon),
            date_created: now_iso8601(),
        };
        let capture = self.api.create_capture(&body).await?;
        log::info!("capture {} created at {}", capture.id, capture.coordinates);

        self.emit(SyncEvent::CaptureCreated(capture.clone()));
        Ok(capture)
    }

    /// キャプチャ1件を取得
    pub async fn fetch_capture(&self, id: i64) -> Result<Capture> {
        with_retry(&self.retry, "get capture", || self.api.get_capture(id)).await
    }

    /// 詳細画面用に最新を取得。失敗時は渡されたキャプチャをそのまま返す
    pub async fn hydrate_capture(&self, fallback: &Capture) -> Capture {
        match self.fetch_capture(fallback.id).await {
            Ok(capture) => capture,
            Err(e) => {
                log::warn!("capture {}: refresh failed, using cached copy: {}", fallback.id, e);
                fallback.clone()
            }
        }
    }

    /// キャプチャ一覧を取得
    pub async fn fetch_captures(&self) -> Result<Vec<Capture>> {
        with_retry(&self.retry, "list captures", || self.api.list_captures()).await
    }

    /// 一覧を更新。失敗時は既存の一覧を残して false
    pub async fn refresh_captures(&self, captures: &mut Vec<Capture>) -> bool {
        match self.fetch_captures().await {
            Ok(latest) => {
                *captures = latest;
                true
            }
            Err(e) => {
                log::warn!("capture list refresh failed: {}", e);
                false
            }
        }
    }

    /// 編集モード終了時の変更をまとめて送信
    pub async fn commit_edits(&self, store: &SharedStore, request: CommitRequest) -> CommitOutcome {
        let capture_id = lock_store(store).id();
        self.commit_to(capture_id, Arc::downgrade(store), request).await
    }

    /// `commit_edits` をバックグラウンドで実行
    ///
    /// ストアは弱参照で保持するため、完了前に画面が閉じられても問題ない。
    pub fn spawn_commit(&self, store: &SharedStore, request: CommitRequest) -> JoinHandle<CommitOutcome> {
        let capture_id = lock_store(store).id();
        let weak = Arc::downgrade(store);
        let this = self.clone();
        tokio::spawn(async move { this.commit_to(capture_id, weak, request).await })
    }

    async fn commit_to(
        &self,
        capture_id: i64,
        store: Weak<Mutex<CaptureStore>>,
        request: CommitRequest,
    ) -> CommitOutcome {
        let CommitRequest {
            pending_delete,
            pending_upload,
        } = request;

        let remove = self.remove_images(capture_id, &store, pending_delete);
        let upload = async {
            if pending_upload.is_empty() {
                return (StepOutcome::Skipped, Vec::new());
            }
            let body = AddImagesRequest {
                images: pending_upload.iter().map(|s| s.to_new_image()).collect(),
            };
            let step = self.add_images(capture_id, &store, body).await;
            // 失敗した分は呼び出し側で再ステージングできるよう返す
            let unsent = if step.is_failed() { pending_upload } else { Vec::new() };
            (step, unsent)
        };

        let (removed, (uploaded, unsent)) = tokio::join!(remove, upload);
        let outcome = CommitOutcome {
            removed,
            uploaded,
            unsent,
        };

        if outcome.is_partial() {
            log::warn!(
                "capture {}: commit partially applied (remove: {:?}, upload: {:?})",
                capture_id,
                outcome.removed,
                outcome.uploaded
            );
        }
        outcome
    }

    async fn remove_images(
        &self,
        capture_id: i64,
        store: &Weak<Mutex<CaptureStore>>,
        image_ids: BTreeSet<i64>,
    ) -> StepOutcome {
        if image_ids.is_empty() {
            return StepOutcome::Skipped;
        }

        // 削除は再試行しない（重複削除を避ける）
        let body = RemoveImagesRequest {
            image_ids: image_ids.iter().copied().collect(),
        };
        if let Err(e) = self.api.remove_images(capture_id, &body).await {
            log::error!("capture {}: remove images {:?} failed: {}", capture_id, body.image_ids, e);
            return StepOutcome::Failed(e);
        }

        self.emit(SyncEvent::ImagesRemoved {
            capture_id,
            image_ids: body.image_ids,
        });
        match reconcile(store, |s| s.apply_removed(&image_ids)) {
            Some(count) => StepOutcome::Applied(count),
            None => {
                log::debug!("capture {}: session closed before remove completed", capture_id);
                StepOutcome::Detached
            }
        }
    }

    async fn add_images(
        &self,
        capture_id: i64,
        store: &Weak<Mutex<CaptureStore>>,
        body: AddImagesRequest,
    ) -> StepOutcome {
        let sent = body.images.len();
        let response = match self.api.add_images(capture_id, &body).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("capture {}: upload of {} images failed: {}", capture_id, sent, e);
                return StepOutcome::Failed(e);
            }
        };

        if response.images.len() != sent {
            log::warn!(
                "capture {}: sent {} images, server returned {}",
                capture_id,
                sent,
                response.images.len()
            );
        }

        self.emit(SyncEvent::ImagesUploaded {
            capture_id,
            image_ids: response.images.iter().map(|img| img.image_id).collect(),
        });
        match reconcile(store, |s| s.apply_uploaded(response.images)) {
            Some(count) => StepOutcome::Applied(count),
            None => {
                log::debug!("capture {}: session closed before upload completed", capture_id);
                StepOutcome::Detached
            }
        }
    }

    /// 注記の確定（入力欄からフォーカスが外れたとき）
    ///
    /// 一括編集中、または現在の注記と同じなら送信しない。
    /// 成功時はサーバーが返した値をローカルに設定する。
    pub async fn update_annotation(
        &self,
        store: &SharedStore,
        text: &str,
        editing: bool,
    ) -> Result<AnnotationOutcome> {
        if editing {
            return Ok(AnnotationOutcome::Deferred);
        }

        let annotation = normalize_annotation(text);
        let capture_id = {
            let guard = lock_store(store);
            if guard.annotation() == annotation {
                return Ok(AnnotationOutcome::Unchanged);
            }
            guard.id()
        };

        let weak = Arc::downgrade(store);
        let echoed = self
            .api
            .update_capture(capture_id, &CaptureUpdate { annotation })
            .await?;

        if reconcile(&weak, |s| s.apply_annotation(&echoed)).is_none() {
            log::debug!("capture {}: session closed before annotation update completed", capture_id);
        }
        self.emit(SyncEvent::AnnotationUpdated {
            capture_id,
            annotation: echoed.annotation.clone(),
        });
        Ok(AnnotationOutcome::Updated(echoed.annotation))
    }

    /// キャプチャを削除（写真もサーバー側で削除される）
    ///
    /// 成功後に `CaptureDeleted` を通知し、一覧側は再取得せずに行を消せる。
    pub async fn delete_capture(&self, capture: Capture) -> Result<()> {
        self.api.delete_capture(capture.id).await?;
        log::info!("capture {} deleted", capture.id);

        self.emit(SyncEvent::CaptureDeleted {
            capture,
            success: true,
        });
        Ok(())
    }
}
