//! アプリケーションのエントリポイントとランタイム初期化。

use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tracing_appender::non_blocking::WorkerGuard;

mod app;
mod audio;
mod config;
mod diagnosis;
mod events;
mod input;
mod journey;
mod layout;
mod service;
mod shortcuts;
mod ui;
mod worker;

use crate::{
    audio::CommandAudio,
    config::Config,
    service::{auth::AuthContext, client::ApiClient, device_store::DeviceStore},
    shortcuts::Shortcuts,
};

/// ファイルロギングを初期化し、非同期ガードを生存させる。
fn init_logging() -> Result<WorkerGuard> {
    // ログ出力先ファイル名を決める。
    let log_file = "autodiag_tui.log";
    // TUIの標準出力を汚さないよう、ファイルへ直接書き込む。
    let file_appender = tracing_appender::rolling::never(".", log_file);
    // 非同期書き込み用のラッパーとガードを用意する。
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // フォーマッタと出力先を設定して初期化する。
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    // ログの保存先を通知しておく。
    tracing::info!("logging to {}", log_file);
    Ok(guard)
}

#[tokio::main]
/// エントリポイント：ログ初期化→設定読込→UI開始→端末復元。
async fn main() -> Result<()> {
    // ロガーを初期化し、ガードを保持して書き込みを継続させる。
    let _log_guard = init_logging()?;
    // 起動ログを出力する。
    tracing::info!("app starting");

    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg = Config::load_or_default(&PathBuf::from("config.toml"))?;
    // ショートカット設定を読み込む（不正なキーはここで失敗する）。
    let shortcuts = Shortcuts::load_or_default("shortcut.toml")?;

    // ゲスト用の端末IDを用意し、認証状態を決める。
    let device_id = DeviceStore::new("device.json").load_or_create().await?;
    let auth = AuthContext::from_config(&cfg.account, device_id);
    tracing::info!("caller: {:?} (guest={})", auth, cfg.is_guest());

    // バックエンドと音声デバイスを用意する。
    let client = Arc::new(ApiClient::new(&cfg.service, auth)?);
    let audio = Arc::new(CommandAudio::new(cfg.audio.clone()));

    // TUI用の端末状態へ切り替える（ガードのDropで必ず元に戻る）。
    let res = {
        let mut guard = ui::TerminalGuard::enter()?;
        // メインアプリを実行する。
        app::run_app(&mut guard.terminal, cfg, shortcuts, client, audio).await
    };
    // エラーがあればログに残す。
    if let Err(ref e) = res {
        tracing::error!("app error: {e}");
    }
    // 終了ログを出力する。
    tracing::info!("app exiting");
    res
}
