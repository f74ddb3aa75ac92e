//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::Config,
    diagnosis::{
        model::Category,
        orchestrator::StageTiming,
        recorder::{AudioBackend, Recorder, RecorderState},
        session::{Navigation, SessionManager},
    },
    events::UiState,
    input::InputBoxState,
    journey::{JourneyState, JourneyStep},
    service::client::ApiClient,
    shortcuts::Shortcuts,
    ui::Tui,
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// 選択位置やステータスなどUI固有の状態。
    pub ui: UiState,
    /// 現在のジャーニーステップ。
    pub journey: JourneyState,
    /// 診断セッションと送信処理。
    pub sessions: SessionManager,
    /// 音声メモの録音・再生。
    pub recorder: Recorder,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,
    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,
    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
    /// 保存済み車両を要求済みのセッションID。
    pub vehicles_requested_for: Option<Uuid>,
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(
    terminal: &mut Tui,
    cfg: Config,
    shortcuts: Shortcuts,
    client: Arc<ApiClient>,
    audio: Arc<dyn AudioBackend>,
) -> Result<()> {
    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 残数確認と車両一覧はWorkerに任せる。
    tokio::spawn(worker::run(rx_cmd, tx_ev, client.clone(), client.clone()));

    // 認証状態とタイマー設定でセッション管理を用意する。
    let auth = client.auth().clone();
    let badge = auth.badge();
    let timing = StageTiming::from(&cfg.loading);
    let mut sessions = SessionManager::new(client, auth, timing);
    // 最初のステップに入った時点でセッションを作る。
    sessions.begin();

    // アプリ状態を初期化する。
    let mut app = App {
        cfg,
        ui: UiState {
            status: format!("Ready ({badge})"),
            ..UiState::default()
        },
        journey: JourneyState::new(),
        sessions,
        recorder: Recorder::new(audio),
        worker_tx: tx_cmd,
        worker_rx: rx_ev,
        input_box: None,
        shortcuts,
        vehicles_requested_for: None,
    };
    tracing::info!("service endpoint: {}", app.cfg.service.base_url);

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev);
        }

        // 送信処理のタイマー・結果を反映する。
        if let Some(nav) = app.sessions.poll() {
            handle_navigation(&mut app, nav);
        }
        // 最後まで再生したら録音済み状態へ戻す。
        app.recorder.poll_playback();

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どのフェーズでもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }

    // 終了時は録音・再生を止め、送信中の処理も破棄する。
    app.recorder.release().await;
    app.sessions.abort();
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) {
    match ev {
        WorkerEvent::QuotaChecked { visit, outcome } => {
            // 古い確認結果はトラッカー側で捨てられる。
            let Some(session) = app.sessions.session_mut() else {
                return;
            };
            if session.quota.finish_check(visit, outcome) {
                app.ui.status = match session.quota.state().remaining {
                    Some(n) => format!("{n} free diagnoses left"),
                    None => "Could not check free diagnoses (press r to retry)".into(),
                };
            }
        }
        WorkerEvent::VehiclesLoaded(list) => {
            // 車両一覧を更新し選択を先頭に戻す。
            if let Some(session) = app.sessions.session_mut() {
                session.vehicle.set_saved(list);
                app.ui.vehicle_idx = 0;
            }
        }
        WorkerEvent::Log(s) => {
            // ログを追加する。
            app.ui.push_log(s);
        }
        WorkerEvent::Error(s) => {
            // ステータスにエラーを表示する。
            app.ui.status = format!("Error: {s}");
            app.ui.push_log(s);
        }
    }
}

/// 送信結果などの遷移指示を画面へ反映する。
pub fn handle_navigation(app: &mut App, nav: Navigation) {
    match nav {
        Navigation::ToResult => {
            app.journey.go_to(JourneyStep::Result);
            app.ui.status = "Diagnosis ready".into();
        }
        Navigation::ToSignUp => {
            // サーバー側で残数切れと判定された場合は下書きに戻しておく。
            let failed = app
                .sessions
                .session()
                .and_then(|s| s.error())
                .map(|e| e.user_message());
            if let Some(message) = failed {
                app.ui.push_log(format!("sign up required: {message}"));
                app.sessions.clear_error();
            }
            app.journey.go_to(JourneyStep::SignUp);
            app.ui.status = "Sign up required".into();
        }
        Navigation::ToInputWithError(err) => {
            // 失敗したセッションを入れ替え、最初の入力ステップへ戻す。
            tracing::warn!("diagnosis failed: {err}");
            app.ui.push_log(format!("failed: {err}"));
            app.sessions.clear_error();
            app.journey.restart();
            app.ui.category_idx = current_category_idx(app);
            app.ui.error = Some(err.user_message());
        }
    }
}

/// ジャーニーを終え、新しいセッションで最初から始める。
pub async fn start_over(app: &mut App, status: &str) {
    // 録音済みの音声ファイルはこのジャーニーと一緒に破棄する。
    if app.recorder.state() != RecorderState::Idle
        && let Err(e) = app.recorder.delete().await
    {
        tracing::warn!("voice cleanup failed: {e}");
    }
    app.sessions.abort();
    app.sessions.begin();
    app.journey.restart();
    app.input_box = None;
    app.ui.category_idx = 0;
    app.ui.vehicle_idx = 0;
    app.ui.error = None;
    app.ui.status = status.into();
}

/// 確認ステップへ入るたびに残数を確認し直す。
pub async fn enter_review(app: &mut App) -> Result<()> {
    app.journey.go_to(JourneyStep::Review);
    let Some(session) = app.sessions.session_mut() else {
        return Ok(());
    };
    // 認証済みなら確認不要。
    if let Some(visit) = session.quota.begin_check() {
        app.worker_tx.send(WorkerCmd::CheckQuota { visit }).await?;
        app.ui.status = "Checking free diagnoses...".into();
    }
    Ok(())
}

/// 車両ステップへ入る。保存済み車両はセッションごとに1回だけ読み込む。
pub async fn enter_vehicle(app: &mut App) -> Result<()> {
    app.journey.go_to(JourneyStep::Vehicle);
    let Some(session) = app.sessions.session() else {
        return Ok(());
    };
    if session.quota.is_guest()
        || session.vehicle.saved().is_some()
        || app.vehicles_requested_for == Some(session.id)
    {
        return Ok(());
    }
    app.vehicles_requested_for = Some(session.id);
    app.worker_tx.send(WorkerCmd::LoadVehicles).await?;
    app.ui.status = "Loading saved vehicles...".into();
    Ok(())
}

/// セッションのカテゴリに対応する一覧位置。
fn current_category_idx(app: &App) -> usize {
    let category = app
        .sessions
        .session()
        .map(|s| s.input.category())
        .unwrap_or_default();
    Category::ALL
        .iter()
        .position(|c| *c == category)
        .unwrap_or(0)
}
