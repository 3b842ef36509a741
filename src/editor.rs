//! 対話式の編集セッション
//!
//! 閲覧モードと編集モードを切り替え、編集モード終了時に
//! 削除・アップロードをまとめてコミットする。

use crate::error::{CaptureError, Result};
use crate::scanner::{self, EncodeOptions};
use crate::sync::{lock_store, shared_store, AnnotationOutcome, CommitOutcome, SharedStore, StepOutcome, SyncCoordinator};
use capture_common::{display_annotation, Capture, EditMode, EditSession, Image, StagedImage};
use dialoguer::{Confirm, Input, MultiSelect, Select};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// メニュー項目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    /// 編集モードの開始/終了
    ToggleEdit,
    /// 写真を追加（ステージング）
    AddPhotos,
    /// 削除する写真を選ぶ
    SelectDeletions,
    /// ステージング写真を破棄
    DiscardStaged,
    /// 注記を編集
    EditAnnotation,
    /// 終了
    Quit,
}

impl EditorAction {
    pub fn label(&self, mode: EditMode) -> &'static str {
        match (self, mode) {
            (EditorAction::ToggleEdit, EditMode::Viewing) => "編集モードに入る",
            (EditorAction::ToggleEdit, EditMode::Editing) => "編集モードを終了して保存",
            (EditorAction::AddPhotos, _) => "写真を追加",
            (EditorAction::SelectDeletions, _) => "削除する写真を選択",
            (EditorAction::DiscardStaged, _) => "追加予定の写真を取り消す",
            (EditorAction::EditAnnotation, _) => "注記を編集",
            (EditorAction::Quit, _) => "終了",
        }
    }
}

/// モードごとのメニュー
pub fn menu_actions(mode: EditMode) -> Vec<EditorAction> {
    match mode {
        EditMode::Viewing => vec![
            EditorAction::ToggleEdit,
            EditorAction::EditAnnotation,
            EditorAction::Quit,
        ],
        EditMode::Editing => vec![
            EditorAction::AddPhotos,
            EditorAction::SelectDeletions,
            EditorAction::DiscardStaged,
            EditorAction::EditAnnotation,
            EditorAction::ToggleEdit,
            EditorAction::Quit,
        ],
    }
}

/// 選択の切り替えが必要なID（現在の選択と新しい選択の差分）
pub fn selection_changes<T: Ord + Copy>(current: &BTreeSet<T>, chosen: &BTreeSet<T>) -> Vec<T> {
    current.symmetric_difference(chosen).copied().collect()
}

/// Base64文字列からおおよそのバイト数
fn approx_bytes(encoded: &str) -> usize {
    encoded.len() / 4 * 3
}

pub fn format_image_line(image: &Image) -> String {
    format!(
        "#{} {} ({} KB)",
        image.image_id,
        image.date_created,
        approx_bytes(&image.encoded) / 1024
    )
}

fn format_staged_line(staged: &StagedImage) -> String {
    format!(
        "{} {} ({} KB)",
        staged.local_id,
        staged.source.as_deref().unwrap_or("-"),
        approx_bytes(&staged.encoded) / 1024
    )
}

pub fn print_capture(capture: &Capture) {
    println!("📍 キャプチャ #{}", capture.id);
    println!("  座標: {}", capture.coordinates);
    println!("  注記: {}", display_annotation(&capture.annotation));
    println!("  作成: {}", capture.date_created);
    if let Some(updated) = &capture.date_updated {
        println!("  更新: {}", updated);
    }
    println!("  写真: {}枚", capture.images.len());
    for image in &capture.images {
        println!("    {}", format_image_line(image));
    }
}

fn print_session(session: &EditSession) {
    if !session.is_editing() {
        return;
    }
    println!("✏ 編集中");
    if !session.pending_delete().is_empty() {
        let ids: Vec<String> = session.pending_delete().iter().map(|id| format!("#{}", id)).collect();
        println!("  削除予定: {}", ids.join(", "));
    }
    for staged in session.staging().staged() {
        println!("  追加予定: {}", format_staged_line(staged));
    }
}

pub fn print_commit_outcome(outcome: &CommitOutcome) {
    match &outcome.removed {
        StepOutcome::Applied(n) => println!("✔ {}枚の写真を削除しました", n),
        StepOutcome::Detached => println!("✔ 写真を削除しました"),
        StepOutcome::Failed(e) => println!("⚠ 写真の削除に失敗: {}", e),
        StepOutcome::Skipped => {}
    }
    match &outcome.uploaded {
        StepOutcome::Applied(n) => println!("✔ {}枚の写真をアップロードしました", n),
        StepOutcome::Detached => println!("✔ 写真をアップロードしました"),
        StepOutcome::Failed(e) => println!("⚠ 写真のアップロードに失敗: {}", e),
        StepOutcome::Skipped => {}
    }
}

fn prompt_error(e: dialoguer::Error) -> CaptureError {
    CaptureError::Prompt(e.to_string())
}

/// 対話式で1件のキャプチャを編集
pub async fn run_edit_session(
    coordinator: &SyncCoordinator,
    capture: Capture,
    options: &EncodeOptions,
) -> Result<Capture> {
    let capture = coordinator.hydrate_capture(&capture).await;
    let store = shared_store(capture);
    let mut session = EditSession::new();
    // 編集モード中に入力された注記（終了時に送る）
    let mut draft: Option<String> = None;

    loop {
        println!();
        print_capture(lock_store(&store).capture());
        print_session(&session);

        let actions = menu_actions(session.mode());
        let labels: Vec<&str> = actions.iter().map(|a| a.label(session.mode())).collect();
        let choice = Select::new()
            .with_prompt("操作")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(prompt_error)?;

        match actions[choice] {
            EditorAction::ToggleEdit => match session.toggle() {
                None => println!("→ 編集モード"),
                Some(request) => {
                    if request.is_empty() {
                        println!("→ 変更なし");
                    } else {
                        let outcome = coordinator.commit_edits(&store, request).await;
                        print_commit_outcome(&outcome);
                        let restored = session.restore_unsent(outcome.unsent);
                        if restored > 0 {
                            println!("→ 送れなかった{}枚を編集モードに戻しました", restored);
                        }
                    }
                    if let Some(text) = draft.take() {
                        save_annotation(coordinator, &store, &text, false).await;
                    }
                }
            },
            EditorAction::AddPhotos => add_photos(&mut session, options)?,
            EditorAction::SelectDeletions => {
                let capture = lock_store(&store).capture().clone();
                select_deletions(&mut session, &capture)?;
            }
            EditorAction::DiscardStaged => discard_staged(&mut session)?,
            EditorAction::EditAnnotation => {
                let current = draft
                    .clone()
                    .unwrap_or_else(|| lock_store(&store).annotation().to_string());
                let text: String = Input::new()
                    .with_prompt("注記")
                    .with_initial_text(current)
                    .allow_empty(true)
                    .interact_text()
                    .map_err(prompt_error)?;
                if save_annotation(coordinator, &store, &text, session.is_editing()).await
                    == Some(AnnotationOutcome::Deferred)
                {
                    draft = Some(text);
                }
            }
            EditorAction::Quit => {
                let has_changes = session.is_editing()
                    && (!session.pending_delete().is_empty() || !session.staging().is_empty() || draft.is_some());
                if has_changes {
                    let discard = Confirm::new()
                        .with_prompt("未保存の変更を破棄して終了しますか？")
                        .default(false)
                        .interact()
                        .map_err(prompt_error)?;
                    if !discard {
                        continue;
                    }
                }
                break;
            }
        }
    }

    let capture = lock_store(&store).capture().clone();
    Ok(capture)
}

/// 注記を送信。失敗はログと表示のみ
async fn save_annotation(
    coordinator: &SyncCoordinator,
    store: &SharedStore,
    text: &str,
    editing: bool,
) -> Option<AnnotationOutcome> {
    match coordinator.update_annotation(store, text, editing).await {
        Ok(outcome) => {
            match &outcome {
                AnnotationOutcome::Updated(_) => println!("✔ 注記を保存しました"),
                AnnotationOutcome::Deferred => println!("→ 編集モード終了時に保存します"),
                AnnotationOutcome::Unchanged => {}
            }
            Some(outcome)
        }
        Err(e) => {
            log::error!("annotation update failed: {}", e);
            None
        }
    }
}

fn add_photos(session: &mut EditSession, options: &EncodeOptions) -> Result<()> {
    let input: String = Input::new()
        .with_prompt("写真ファイル/フォルダ（空白区切り）")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_error)?;

    let paths: Vec<PathBuf> = input.split_whitespace().map(PathBuf::from).collect();
    if paths.is_empty() {
        return Ok(());
    }

    let photos = match scanner::collect_photos(&paths) {
        Ok(photos) => photos,
        Err(e) => {
            println!("⚠ {}", e);
            return Ok(());
        }
    };
    let encoded = match scanner::encode_photos(&photos, options) {
        Ok(encoded) => encoded,
        Err(e) => {
            println!("⚠ {}", e);
            return Ok(());
        }
    };

    for photo in encoded {
        session.stage(photo.encoded, photo.date_created, Some(photo.source))?;
    }
    println!("✔ {}枚を追加予定にしました", photos.len());
    Ok(())
}

fn select_deletions(session: &mut EditSession, capture: &Capture) -> Result<()> {
    if capture.images.is_empty() {
        println!("写真がありません");
        return Ok(());
    }

    let labels: Vec<String> = capture.images.iter().map(format_image_line).collect();
    let defaults: Vec<bool> = capture
        .images
        .iter()
        .map(|img| session.pending_delete().contains(&img.image_id))
        .collect();

    let chosen = MultiSelect::new()
        .with_prompt("削除する写真（Spaceで選択）")
        .items(&labels)
        .defaults(&defaults)
        .interact()
        .map_err(prompt_error)?;

    let chosen: BTreeSet<i64> = chosen.into_iter().map(|i| capture.images[i].image_id).collect();
    for image_id in selection_changes(session.pending_delete(), &chosen) {
        session.toggle_delete(capture, image_id)?;
    }
    Ok(())
}

fn discard_staged(session: &mut EditSession) -> Result<()> {
    let staged = session.staging().staged().to_vec();
    if staged.is_empty() {
        println!("追加予定の写真がありません");
        return Ok(());
    }

    let labels: Vec<String> = staged.iter().map(format_staged_line).collect();
    let chosen = MultiSelect::new()
        .with_prompt("取り消す写真（Spaceで選択）")
        .items(&labels)
        .interact()
        .map_err(prompt_error)?;

    let chosen: BTreeSet<_> = chosen.into_iter().map(|i| staged[i].local_id).collect();
    for local_id in selection_changes(session.staging().selected(), &chosen) {
        session.toggle_discard(local_id)?;
    }
    let discarded = session.discard_selected()?;
    println!("✔ {}枚を取り消しました", discarded.len());
    Ok(())
}
