//! 同期コーディネータの統合テスト
//!
//! インメモリのAPIサーバーに対して、作成・取得・コミット・注記更新・削除の
//! 反映ルールを検証

mod support;

use capture_common::{CommitRequest, EditSession, ANNOTATION_PLACEHOLDER};
use field_capture::api::RetryPolicy;
use field_capture::error::CaptureError;
use field_capture::sync::{
    lock_store, shared_store, AnnotationOutcome, StepOutcome, SyncCoordinator, SyncEvent,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use support::{Call, Endpoint, FakeCaptureApi};

fn coordinator(api: &Arc<FakeCaptureApi>) -> SyncCoordinator {
    SyncCoordinator::new(api.clone()).with_retry_policy(RetryPolicy::new(2, Duration::ZERO))
}

/// 編集セッションで写真をステージングしてコミット要求を作る
fn upload_request(payloads: &[&str]) -> CommitRequest {
    let mut session = EditSession::new();
    session.enter_edit();
    for payload in payloads {
        session
            .stage(payload.to_string(), "2024-05-01T10:00:00Z".into(), None)
            .unwrap();
    }
    session.toggle().expect("commit request")
}

fn delete_request(ids: &[i64]) -> CommitRequest {
    CommitRequest {
        pending_delete: ids.iter().copied().collect(),
        ..Default::default()
    }
}

/// 前後の空白を含む座標は "lat,lon" に正規化して送る
#[tokio::test]
async fn test_create_normalizes_coordinates() {
    let api = FakeCaptureApi::new();
    let sync = coordinator(&api);

    let created = sync.create_capture(" 40.712 , -74.006 ").await.unwrap();
    assert_eq!(created.coordinates, "40.712,-74.006");

    match &api.calls()[..] {
        [Call::Create(body)] => assert_eq!(body.coordinates, "40.712,-74.006"),
        other => panic!("unexpected calls: {:?}", other),
    }
}

/// 作成→取得で座標がそのまま返り、写真は空
#[tokio::test]
async fn test_create_then_fetch_roundtrip() {
    let api = FakeCaptureApi::new();
    let sync = coordinator(&api);

    let created = sync.create_capture("40.712,-74.006").await.unwrap();
    assert!(created.images.is_empty());
    assert_eq!(created.annotation, "");

    let fetched = sync.fetch_capture(created.id).await.unwrap();
    assert_eq!(fetched.coordinates, "40.712,-74.006");
    assert!(fetched.images.is_empty());

    match &api.calls()[0] {
        Call::Create(body) => {
            assert_eq!(body.annotation, "");
            assert_eq!(body.coordinates, "40.712,-74.006");
            assert!(!body.date_created.is_empty());
        }
        other => panic!("unexpected call: {:?}", other),
    }
}

/// 座標が不正なら送信しない
#[tokio::test]
async fn test_create_invalid_coordinates() {
    let api = FakeCaptureApi::new();
    let sync = coordinator(&api);

    let result = sync.create_capture("somewhere").await;
    assert!(matches!(result, Err(CaptureError::Common(_))));
    assert!(api.calls().is_empty());
}

/// 作成の失敗は呼び出し元に返り、再試行しない
#[tokio::test]
async fn test_create_failure_surfaced() {
    let api = FakeCaptureApi::new();
    api.fail_next(Endpoint::Create, 500);
    let sync = coordinator(&api);

    let result = sync.create_capture("1,2").await;
    assert!(matches!(result, Err(CaptureError::Status { status: 500, .. })));
    assert_eq!(api.count(Endpoint::Create), 1);
}

/// アップロード成功で確定済みリストがちょうど枚数分、サーバー順に増える
#[tokio::test]
async fn test_commit_upload_appends_in_server_order() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 2);
    let sync = coordinator(&api);
    let store = shared_store(seeded.clone());

    let outcome = sync.commit_edits(&store, upload_request(&["a", "b", "c"])).await;
    assert!(outcome.is_success());
    assert!(matches!(outcome.uploaded, StepOutcome::Applied(3)));
    assert!(matches!(outcome.removed, StepOutcome::Skipped));

    let local = lock_store(&store).capture().clone();
    assert_eq!(local.images.len(), seeded.images.len() + 3);
    let server = api.server_capture(seeded.id).unwrap();
    assert_eq!(local.image_ids(), server.image_ids());
    let payloads: Vec<_> = local.images[2..].iter().map(|i| i.encoded.as_str()).collect();
    assert_eq!(payloads, vec!["a", "b", "c"]);

    // 1回のリクエストで全件送る
    assert_eq!(api.calls(), vec![Call::AddImages(seeded.id, 3)]);
}

/// 一括削除は1回のリクエストで、対象外の写真は残る
#[tokio::test]
async fn test_commit_delete_removes_exact_set() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 4);
    let ids = seeded.image_ids();
    let sync = coordinator(&api);
    let store = shared_store(seeded.clone());

    let outcome = sync.commit_edits(&store, delete_request(&[ids[0], ids[2]])).await;
    assert!(matches!(outcome.removed, StepOutcome::Applied(2)));

    let local = lock_store(&store).capture().clone();
    assert_eq!(local.image_ids(), vec![ids[1], ids[3]]);
    assert_eq!(local.images[0], seeded.images[1]);
    assert_eq!(api.calls(), vec![Call::RemoveImages(seeded.id, vec![ids[0], ids[2]])]);
}

/// 作成→2枚アップロード→1枚削除で1枚残る
#[tokio::test]
async fn test_create_upload_delete_scenario() {
    let api = FakeCaptureApi::new();
    let sync = coordinator(&api);

    let capture = sync.create_capture("35.68,139.76").await.unwrap();
    let store = shared_store(capture);

    let outcome = sync.commit_edits(&store, upload_request(&["first", "second"])).await;
    assert!(outcome.is_success());
    let uploaded = lock_store(&store).capture().image_ids();
    assert_eq!(uploaded.len(), 2);

    let outcome = sync.commit_edits(&store, delete_request(&[uploaded[0]])).await;
    assert!(outcome.is_success());

    let local = lock_store(&store).capture().clone();
    assert_eq!(local.image_ids(), vec![uploaded[1]]);
    assert_eq!(local.images[0].encoded, "second");

    let fetched = sync.fetch_capture(local.id).await.unwrap();
    assert_eq!(fetched.image_ids(), vec![uploaded[1]]);
}

/// 空のコミットはリクエストを送らない
#[tokio::test]
async fn test_empty_commit_sends_nothing() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 1);
    let sync = coordinator(&api);
    let store = shared_store(seeded);

    let outcome = sync.commit_edits(&store, CommitRequest::default()).await;
    assert!(matches!(outcome.removed, StepOutcome::Skipped));
    assert!(matches!(outcome.uploaded, StepOutcome::Skipped));
    assert!(api.calls().is_empty());
}

/// 削除だけ失敗した場合、アップロード分だけ反映される
#[tokio::test]
async fn test_partial_commit_is_not_rolled_back() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 2);
    let ids = seeded.image_ids();
    api.fail_next(Endpoint::RemoveImages, 503);
    let sync = coordinator(&api);
    let store = shared_store(seeded);

    let mut request = upload_request(&["new"]);
    request.pending_delete = [ids[0]].into_iter().collect();

    let outcome = sync.commit_edits(&store, request).await;
    assert!(outcome.is_partial());
    assert!(matches!(
        outcome.removed,
        StepOutcome::Failed(CaptureError::Status { status: 503, .. })
    ));
    assert!(matches!(outcome.uploaded, StepOutcome::Applied(1)));

    let local = lock_store(&store).capture().clone();
    assert_eq!(local.images.len(), 3);
    assert!(local.contains_image(ids[0]));

    // 削除は再試行しない
    assert_eq!(api.count(Endpoint::RemoveImages), 1);
}

/// アップロード失敗時は確定済みリストを変更しない
#[tokio::test]
async fn test_failed_upload_leaves_store_untouched() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 1);
    api.fail_next(Endpoint::AddImages, 500);
    let sync = coordinator(&api);
    let store = shared_store(seeded.clone());

    let outcome = sync.commit_edits(&store, upload_request(&["a", "b"])).await;
    assert!(!outcome.is_success());
    assert!(!outcome.is_partial());
    assert_eq!(lock_store(&store).capture(), &seeded);

    // 送れなかった写真は再ステージング用に返る
    let unsent: Vec<&str> = outcome.unsent.iter().map(|s| s.encoded.as_str()).collect();
    assert_eq!(unsent, vec!["a", "b"]);

    let mut session = EditSession::new();
    assert_eq!(session.restore_unsent(outcome.unsent), 2);
    let retry = session.toggle().expect("commit request");
    let outcome = sync.commit_edits(&store, retry).await;
    assert!(matches!(outcome.uploaded, StepOutcome::Applied(2)));
    assert!(outcome.unsent.is_empty());
    assert_eq!(lock_store(&store).images().len(), 3);
}

/// 削除だけのコミットが失敗しても部分反映とは扱わない
#[tokio::test]
async fn test_failed_delete_only_commit_is_not_partial() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 2);
    let ids = seeded.image_ids();
    api.fail_next(Endpoint::RemoveImages, 500);
    let sync = coordinator(&api);
    let store = shared_store(seeded.clone());

    let outcome = sync.commit_edits(&store, delete_request(&[ids[0]])).await;
    assert!(outcome.removed.is_failed());
    assert!(matches!(outcome.uploaded, StepOutcome::Skipped));
    assert!(!outcome.is_partial());
    assert!(outcome.unsent.is_empty());
    assert_eq!(lock_store(&store).capture(), &seeded);
}

/// 画面が閉じた後に応答が来ても何もしない
#[tokio::test]
async fn test_commit_after_session_closed() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 0);
    let gate = api.gate_uploads();
    let sync = coordinator(&api);

    let store = shared_store(seeded.clone());
    let handle = sync.spawn_commit(&store, upload_request(&["late"]));
    drop(store);
    gate.notify_one();

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome.uploaded, StepOutcome::Detached));
    assert_eq!(api.server_capture(seeded.id).unwrap().images.len(), 1);
}

/// 現在と同じ注記なら送信しない
#[tokio::test]
async fn test_update_annotation_noop_when_unchanged() {
    let api = FakeCaptureApi::new();
    let sync = coordinator(&api);
    let capture = sync.create_capture("1,2").await.unwrap();
    let store = shared_store(capture);

    let outcome = sync.update_annotation(&store, "", false).await.unwrap();
    assert_eq!(outcome, AnnotationOutcome::Unchanged);
    assert_eq!(api.count(Endpoint::Update), 0);

    sync.update_annotation(&store, "pipe leak", false).await.unwrap();
    let outcome = sync.update_annotation(&store, "pipe leak", false).await.unwrap();
    assert_eq!(outcome, AnnotationOutcome::Unchanged);
    assert_eq!(api.count(Endpoint::Update), 1);
}

/// 一括編集中は送信しない
#[tokio::test]
async fn test_update_annotation_deferred_while_editing() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 0);
    let sync = coordinator(&api);
    let store = shared_store(seeded);

    let outcome = sync.update_annotation(&store, "draft", true).await.unwrap();
    assert_eq!(outcome, AnnotationOutcome::Deferred);
    assert_eq!(lock_store(&store).annotation(), "");
    assert!(api.calls().is_empty());
}

/// ローカルの注記はサーバーが返した値になる
#[tokio::test]
async fn test_annotation_follows_server_echo() {
    let api = FakeCaptureApi::new();
    api.trim_annotations();
    let seeded = api.seed_capture("1,2", 0);
    let sync = coordinator(&api);
    let store = shared_store(seeded);

    let outcome = sync.update_annotation(&store, "  cracked beam  ", false).await.unwrap();
    assert_eq!(outcome, AnnotationOutcome::Updated("cracked beam".into()));
    assert_eq!(lock_store(&store).annotation(), "cracked beam");
}

/// 空の注記を確定してもプレースホルダは送らない
#[tokio::test]
async fn test_placeholder_never_transmitted() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 0);
    let sync = coordinator(&api);
    let store = shared_store(seeded.clone());

    sync.update_annotation(&store, "old note", false).await.unwrap();
    let outcome = sync
        .update_annotation(&store, ANNOTATION_PLACEHOLDER, false)
        .await
        .unwrap();
    assert_eq!(outcome, AnnotationOutcome::Updated(String::new()));

    let sent: Vec<_> = api
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Update(_, text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(sent, vec!["old note".to_string(), String::new()]);
    assert_eq!(api.server_capture(seeded.id).unwrap().annotation, "");
}

/// 注記更新の失敗ではローカルを変更しない
#[tokio::test]
async fn test_update_annotation_failure() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 0);
    api.fail_next(Endpoint::Update, 422);
    let sync = coordinator(&api);
    let store = shared_store(seeded);

    let result = sync.update_annotation(&store, "text", false).await;
    assert!(result.is_err());
    assert_eq!(lock_store(&store).annotation(), "");
}

/// 変更なしで2回取得すると同じ内容
#[tokio::test]
async fn test_fetch_capture_idempotent() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 3);
    let sync = coordinator(&api);

    let first = sync.fetch_capture(seeded.id).await.unwrap();
    let second = sync.fetch_capture(seeded.id).await.unwrap();
    assert_eq!(first.images, second.images);
    assert_eq!(first, second);
}

/// 一時的なエラーは再試行する
#[tokio::test]
async fn test_fetch_retries_transient_error() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 1);
    api.fail_next(Endpoint::Get, 503);
    let sync = coordinator(&api);

    let fetched = sync.fetch_capture(seeded.id).await.unwrap();
    assert_eq!(fetched.id, seeded.id);
    assert_eq!(api.count(Endpoint::Get), 2);
}

/// 取得に失敗したら手元のキャプチャで表示を続ける
#[tokio::test]
async fn test_hydrate_falls_back_to_cached_copy() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 1);
    api.fail_next(Endpoint::Get, 500);
    api.fail_next(Endpoint::Get, 500);
    let sync = coordinator(&api);

    let mut cached = seeded.clone();
    cached.annotation = "cached".into();
    let shown = sync.hydrate_capture(&cached).await;
    assert_eq!(shown, cached);

    let refreshed = sync.hydrate_capture(&cached).await;
    assert_eq!(refreshed, seeded);
}

/// 一覧の更新に失敗したら既存の一覧を残す
#[tokio::test]
async fn test_refresh_captures_keeps_stale_list() {
    let api = FakeCaptureApi::new();
    api.seed_capture("1,2", 0);
    api.seed_capture("3,4", 0);
    let sync = coordinator(&api);

    let mut list = Vec::new();
    assert!(sync.refresh_captures(&mut list).await);
    assert_eq!(list.len(), 2);

    api.seed_capture("5,6", 0);
    api.fail_next(Endpoint::List, 500);
    api.fail_next(Endpoint::List, 500);
    assert!(!sync.refresh_captures(&mut list).await);
    assert_eq!(list.len(), 2);
}

/// 削除成功で通知が届き、一覧から行を消せる
#[tokio::test]
async fn test_delete_capture_emits_event() {
    let api = FakeCaptureApi::new();
    let keep = api.seed_capture("1,2", 0);
    let target = api.seed_capture("3,4", 2);
    let mut sync = coordinator(&api);
    let mut events = sync.subscribe();

    let mut list = sync.fetch_captures().await.unwrap();
    sync.delete_capture(target.clone()).await.unwrap();

    match events.recv().await {
        Some(SyncEvent::CaptureDeleted { capture, success }) => {
            assert!(success);
            list.retain(|c| c.id != capture.id);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(list, vec![keep]);
    assert!(api.server_capture(target.id).is_none());
}

/// 削除の失敗は再試行せず、通知もしない
#[tokio::test]
async fn test_delete_capture_not_retried() {
    let api = FakeCaptureApi::new();
    let target = api.seed_capture("1,2", 0);
    api.fail_next(Endpoint::Delete, 503);
    let mut sync = coordinator(&api);
    let mut events = sync.subscribe();

    let result = sync.delete_capture(target.clone()).await;
    assert!(result.is_err());
    assert_eq!(api.count(Endpoint::Delete), 1);
    assert!(events.try_recv().is_err());
    assert!(api.server_capture(target.id).is_some());
}

/// コミットの成功は画像イベントとして通知される
#[tokio::test]
async fn test_commit_emits_image_events() {
    let api = FakeCaptureApi::new();
    let seeded = api.seed_capture("1,2", 1);
    let removed_id = seeded.images[0].image_id;
    let mut sync = coordinator(&api);
    let mut events = sync.subscribe();
    let store = shared_store(seeded.clone());

    let mut request = upload_request(&["x"]);
    request.pending_delete = BTreeSet::from([removed_id]);
    sync.commit_edits(&store, request).await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.len(), 2);
    assert!(received.contains(&SyncEvent::ImagesRemoved {
        capture_id: seeded.id,
        image_ids: vec![removed_id],
    }));
    let uploaded_ids = lock_store(&store).capture().image_ids();
    assert!(received.contains(&SyncEvent::ImagesUploaded {
        capture_id: seeded.id,
        image_ids: uploaded_ids,
    }));
}
