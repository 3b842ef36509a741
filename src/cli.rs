use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "capture")]
#[command(about = "現場写真キャプチャ同期ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 接続先URL（設定ファイルより優先）
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// キャプチャ一覧を表示
    List,

    /// キャプチャを1件表示
    Show {
        /// キャプチャID
        id: i64,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// キャプチャを新規作成
    #[command(group(ArgGroup::new("location").required(true).args(["coords", "from_photo"])))]
    Create {
        /// 座標 "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        coords: Option<String>,

        /// EXIFのGPS情報から座標を取得する写真
        #[arg(long)]
        from_photo: Option<PathBuf>,

        /// 注記
        #[arg(short, long)]
        annotation: Option<String>,

        /// 一緒にアップロードする写真ファイル/フォルダ
        photos: Vec<PathBuf>,
    },

    /// 写真を追加アップロード
    Add {
        /// キャプチャID
        id: i64,

        /// 写真ファイル/フォルダ
        #[arg(required = true)]
        photos: Vec<PathBuf>,
    },

    /// 写真を削除
    Remove {
        /// キャプチャID
        id: i64,

        /// 削除する写真ID
        #[arg(required = true)]
        image_ids: Vec<i64>,
    },

    /// 注記を更新
    Annotate {
        /// キャプチャID
        id: i64,

        /// 注記（空文字で注記なし）
        text: String,
    },

    /// キャプチャを削除（写真も削除される）
    Delete {
        /// キャプチャID
        id: i64,

        /// 確認なしで削除
        #[arg(short, long)]
        yes: bool,
    },

    /// 対話的にキャプチャを編集
    Edit {
        /// キャプチャID
        id: i64,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 接続先URLを設定
        #[arg(long)]
        set_base_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
