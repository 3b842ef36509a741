use anyhow::Context;
use clap::Parser;
use field_capture::{cli, config, editor, error, scanner, sync};
use capture_common::{display_annotation, Capture, CommitRequest, EditSession, StagingBuffer};
use cli::{Cli, Commands};
use config::Config;
use error::CaptureError;
use field_capture::api::{HttpCaptureApi, RetryPolicy};
use scanner::EncodeOptions;
use std::path::PathBuf;
use std::sync::Arc;
use sync::{shared_store, AnnotationOutcome, SyncCoordinator, SyncEvent};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn build_coordinator(config: &Config, base_url: Option<&str>) -> error::Result<SyncCoordinator> {
    let api = HttpCaptureApi::from_config(config, base_url)?;
    Ok(SyncCoordinator::new(Arc::new(api)).with_retry_policy(RetryPolicy::from_config(config)))
}

fn encode_options(config: &Config) -> EncodeOptions {
    EncodeOptions {
        jpeg_quality: config.jpeg_quality,
        max_image_size: config.max_image_size,
        show_progress: true,
    }
}

/// 写真を読み込んでアップロード用のコミット要求にする
fn stage_photos(paths: &[PathBuf], options: &EncodeOptions) -> error::Result<CommitRequest> {
    let photos = scanner::collect_photos(paths)?;
    if photos.is_empty() {
        return Err(CaptureError::FileNotFound(
            paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "),
        ));
    }

    let mut staging = StagingBuffer::new();
    for photo in scanner::encode_photos(&photos, options)? {
        staging.stage(photo.encoded, photo.date_created, Some(photo.source));
    }
    Ok(CommitRequest {
        pending_upload: staging.take_all(),
        ..Default::default()
    })
}

fn print_capture_row(capture: &Capture) {
    println!(
        "#{:<5} {:<24} 写真{:>3}枚  {}",
        capture.id,
        capture.coordinates,
        capture.images.len(),
        display_annotation(&capture.annotation)
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Config { set_api_key, set_base_url, show } => {
            run_config(config, set_api_key, set_base_url, show)?
        }
        command => run(command, &config, cli.base_url.as_deref()).await?,
    }

    Ok(())
}

fn run_config(
    mut config: Config,
    set_api_key: Option<String>,
    set_base_url: Option<String>,
    show: bool,
) -> error::Result<()> {
    if let Some(key) = set_api_key {
        config.set_api_key(key)?;
        println!("✔ APIキーを設定しました");
    }

    if let Some(url) = set_base_url {
        config.set_base_url(url)?;
        println!("✔ 接続先URLを設定しました");
    }

    if show {
        println!("設定:");
        println!("  接続先URL: {}", config.base_url.as_deref().unwrap_or("未設定"));
        println!("  APIキー: {}", if config.api_key.is_some() { "設定済み" } else { "未設定" });
        println!("  APIキーヘッダ: {}", config.api_key_header);
        println!("  タイムアウト: {}秒", config.timeout_seconds);
        println!("  JPEG品質: {}", config.jpeg_quality);
        println!("  最大画像サイズ: {}px", config.max_image_size);
        println!("  再試行: {}回 / {}ms", config.retry_attempts, config.retry_delay_ms);
    }
    Ok(())
}

async fn run(command: Commands, config: &Config, base_url: Option<&str>) -> anyhow::Result<()> {
    let mut coordinator = build_coordinator(config, base_url)?;
    let options = encode_options(config);

    match command {
        Commands::List => {
            let mut captures = Vec::new();
            if !coordinator.refresh_captures(&mut captures).await {
                println!("⚠ 一覧を取得できませんでした");
                return Ok(());
            }
            if captures.is_empty() {
                println!("キャプチャはありません");
            }
            for capture in &captures {
                print_capture_row(capture);
            }
        }

        Commands::Show { id, json } => {
            let capture = coordinator
                .fetch_capture(id)
                .await
                .with_context(|| format!("キャプチャ #{} を取得できません", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&capture)?);
            } else {
                editor::print_capture(&capture);
            }
        }

        Commands::Create { coords, from_photo, annotation, photos } => {
            println!("📸 キャプチャ作成\n");

            let coordinates = match (coords, from_photo) {
                (Some(coords), _) => coords,
                (None, Some(photo)) => scanner::coordinates_from_photo(&photo)?,
                (None, None) => anyhow::bail!("--coords か --from-photo を指定してください"),
            };

            // 写真は作成前に読み込んでおく（読み込み失敗で空のキャプチャを作らない）
            let upload = if photos.is_empty() {
                None
            } else {
                Some(stage_photos(&photos, &options)?)
            };

            let capture = coordinator.create_capture(&coordinates).await?;
            println!("✔ キャプチャ #{} を作成しました ({})", capture.id, capture.coordinates);

            let store = shared_store(capture);
            if let Some(text) = annotation {
                match coordinator.update_annotation(&store, &text, false).await {
                    Ok(AnnotationOutcome::Updated(_)) => println!("✔ 注記を保存しました"),
                    Ok(_) => {}
                    Err(e) => log::error!("annotation update failed: {}", e),
                }
            }
            if let Some(request) = upload {
                let outcome = coordinator.commit_edits(&store, request).await;
                editor::print_commit_outcome(&outcome);
            }

            println!();
            editor::print_capture(sync::lock_store(&store).capture());
        }

        Commands::Add { id, photos } => {
            let capture = coordinator.fetch_capture(id).await?;
            let request = stage_photos(&photos, &options)?;
            println!("- {}枚をアップロード中...", request.pending_upload.len());

            let store = shared_store(capture);
            let outcome = coordinator.commit_edits(&store, request).await;
            editor::print_commit_outcome(&outcome);
        }

        Commands::Remove { id, image_ids } => {
            let capture = coordinator.fetch_capture(id).await?;

            let mut session = EditSession::new();
            session.enter_edit();
            for image_id in image_ids {
                session.toggle_delete(&capture, image_id)?;
            }
            let request = session.toggle().unwrap_or_default();

            let store = shared_store(capture);
            let outcome = coordinator.commit_edits(&store, request).await;
            editor::print_commit_outcome(&outcome);
        }

        Commands::Annotate { id, text } => {
            let capture = coordinator.fetch_capture(id).await?;
            let store = shared_store(capture);
            match coordinator.update_annotation(&store, &text, false).await? {
                AnnotationOutcome::Updated(annotation) => {
                    println!("✔ 注記を保存しました: {}", display_annotation(&annotation))
                }
                AnnotationOutcome::Unchanged => println!("注記に変更はありません"),
                AnnotationOutcome::Deferred => {}
            }
        }

        Commands::Delete { id, yes } => {
            let fallback = Capture { id, ..Default::default() };
            let capture = coordinator.hydrate_capture(&fallback).await;

            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "キャプチャ #{}（写真{}枚）を削除しますか？",
                        capture.id,
                        capture.images.len()
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| CaptureError::Prompt(e.to_string()))?;
                if !confirmed {
                    println!("中止しました");
                    return Ok(());
                }
            }

            let mut events = coordinator.subscribe();
            coordinator.delete_capture(capture).await?;
            if let Ok(SyncEvent::CaptureDeleted { capture, success: true }) = events.try_recv() {
                println!("✔ キャプチャ #{} を削除しました", capture.id);
            }
        }

        Commands::Edit { id } => {
            let fallback = Capture { id, ..Default::default() };
            editor::run_edit_session(&coordinator, fallback, &options).await?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}
