//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::Path;

use crate::{
    diagnosis::{
        aggregator::{MAX_DESCRIPTION_CHARS, MAX_PHOTOS, MIN_DESCRIPTION_CHARS},
        model::{Category, ManualVehicle, PhotoRef},
        quota::QuotaCheck,
        recorder::RecorderState,
        session::SessionStatus,
    },
    input::{InputBoxState, InputCallbackId},
    journey::JourneyStep,
};

use super::{App, enter_review, enter_vehicle, handle_navigation, start_over};

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        handle_input_box_key(app, k).await;
        return Ok(false);
    }

    if app.shortcuts.global.quit.matches(&k) {
        return Ok(true);
    }

    // ステップごとのハンドラへ委譲する。
    match app.journey.current_step {
        JourneyStep::Category => handle_category_key(app, k).await,
        JourneyStep::Describe => handle_describe_key(app, k).await?,
        JourneyStep::Vehicle => handle_vehicle_key(app, k).await?,
        JourneyStep::Review => handle_review_key(app, k).await?,
        JourneyStep::Loading => handle_loading_key(app, k).await,
        JourneyStep::Result => handle_result_key(app, k).await,
        JourneyStep::SignUp => handle_sign_up_key(app, k).await?,
    }
    Ok(false)
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// カテゴリ選択画面のキー処理。
async fn handle_category_key(app: &mut App, k: KeyEvent) {
    let sc = &app.shortcuts.category;

    if sc.up.matches(&k) {
        // 前の行へ移動する。
        app.ui.category_idx = app.ui.category_idx.saturating_sub(1);
    } else if sc.down.matches(&k) {
        // 次の行へ移動する。
        if app.ui.category_idx + 1 < Category::ALL.len() {
            app.ui.category_idx += 1;
        }
    } else if sc.select.matches(&k) {
        // カテゴリを確定して入力画面へ進む。
        let category = Category::ALL[app.ui.category_idx];
        let session = app.sessions.begin();
        session.input.set_category(category);
        app.ui.error = None;
        app.journey.next_step();
    } else if sc.abort.matches(&k) {
        // セッションを破棄して最初からやり直す。
        start_over(app, "Started over").await;
    }
}

/// 入力画面のキー処理。
async fn handle_describe_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = &app.shortcuts.describe;

    if sc.edit_text.matches(&k) {
        // 説明文の入力ボックスを開く（上限500文字）。
        let current = app
            .sessions
            .session()
            .map(|s| s.input.description().to_string())
            .unwrap_or_default();
        app.input_box = Some(
            InputBoxState::new("Describe the problem:", &current, InputCallbackId::Description)
                .with_limit(MAX_DESCRIPTION_CHARS)
                .with_hint(format!("{MIN_DESCRIPTION_CHARS} characters minimum")),
        );
    } else if sc.record.matches(&k) {
        toggle_recording(app).await;
    } else if sc.play.matches(&k) {
        // 再生・一時停止を切り替える。
        if let Err(e) = app.recorder.toggle_playback().await {
            app.ui.error = Some(e.to_string());
        }
    } else if sc.delete_voice.matches(&k) {
        // 音声メモを削除して入力からも外す。
        match app.recorder.delete().await {
            Ok(()) => {
                sync_voice(app);
                app.ui.status = "Voice note deleted".into();
            }
            Err(e) => app.ui.error = Some(e.to_string()),
        }
    } else if sc.add_photo.matches(&k) {
        // 写真パスの入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "Photo file path:",
            "",
            InputCallbackId::PhotoPath,
        ));
    } else if sc.remove_photo.matches(&k) {
        // 最後に追加した写真を外す。
        if let Some(session) = app.sessions.session_mut() {
            let last = session.input.photos().len().checked_sub(1);
            if let Some(removed) = last.and_then(|i| session.input.remove_photo(i)) {
                app.ui.status = format!("Removed {}", removed.file_name());
            }
        }
    } else if sc.clear_all.matches(&k) {
        // 説明文・音声・写真・車両をまとめて消す。
        if app.recorder.state() != RecorderState::Idle
            && let Err(e) = app.recorder.delete().await
        {
            tracing::warn!("voice cleanup failed: {e}");
        }
        app.sessions.clear_input();
        app.ui.status = "Input cleared".into();
    } else if sc.next.matches(&k) {
        // 録音中なら確定させてから次へ進む。
        leave_describe(app).await;
        app.ui.error = None;
        enter_vehicle(app).await?;
    } else if sc.back.matches(&k) {
        leave_describe(app).await;
        app.journey.previous_step();
    }
    Ok(())
}

/// 録音の開始・停止を切り替える。
async fn toggle_recording(app: &mut App) {
    let result = if app.recorder.state() == RecorderState::Recording {
        app.recorder.stop().await.map(|v| {
            app.ui.status = format!("Voice note recorded ({}s)", v.duration_secs);
        })
    } else {
        app.recorder.start().await.map(|()| {
            app.ui.status = "Recording... press again to stop".into();
        })
    };
    match result {
        Ok(()) => app.ui.error = None,
        Err(e) => app.ui.error = Some(e.to_string()),
    }
    sync_voice(app);
}

/// 入力画面を離れる前に録音・再生を止める。
async fn leave_describe(app: &mut App) {
    if app.recorder.state() == RecorderState::Recording
        && let Err(e) = app.recorder.stop().await
    {
        app.ui.error = Some(e.to_string());
    }
    app.recorder.release().await;
    sync_voice(app);
}

/// 録音済みの音声をセッションの入力へ反映する。
fn sync_voice(app: &mut App) {
    let voice = app.recorder.recording();
    if let Some(session) = app.sessions.session_mut() {
        session.input.set_voice(voice);
    }
}

/// 車両画面のキー処理。
async fn handle_vehicle_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = &app.shortcuts.vehicle;
    let saved_len = app
        .sessions
        .session()
        .and_then(|s| s.vehicle.saved())
        .map_or(0, |v| v.len());

    if sc.up.matches(&k) {
        app.ui.vehicle_idx = app.ui.vehicle_idx.saturating_sub(1);
    } else if sc.down.matches(&k) {
        if app.ui.vehicle_idx + 1 < saved_len {
            app.ui.vehicle_idx += 1;
        }
    } else if sc.pick.matches(&k) {
        // 選択行の保存済み車両を紐付ける。
        let idx = app.ui.vehicle_idx;
        if let Some(session) = app.sessions.session_mut()
            && let Some(id) = session
                .vehicle
                .saved()
                .and_then(|list| list.get(idx))
                .map(|v| v.id.clone())
        {
            match session.vehicle.select_saved(&id) {
                Ok(()) => app.ui.error = None,
                Err(e) => app.ui.error = Some(e.to_string()),
            }
        }
    } else if sc.year.matches(&k) {
        open_manual_box(app, "Year:", InputCallbackId::ManualYear);
    } else if sc.make.matches(&k) {
        open_manual_box(app, "Make:", InputCallbackId::ManualMake);
    } else if sc.model.matches(&k) {
        open_manual_box(app, "Model:", InputCallbackId::ManualModel);
    } else if sc.mileage.matches(&k) {
        open_manual_box(app, "Mileage (km):", InputCallbackId::ManualMileage);
    } else if sc.clear.matches(&k) {
        // 車両情報なしに戻す。
        if let Some(session) = app.sessions.session_mut() {
            session.vehicle.clear();
        }
        app.ui.status = "Vehicle cleared".into();
    } else if sc.next.matches(&k) {
        app.ui.error = None;
        enter_review(app).await?;
    } else if sc.back.matches(&k) {
        app.journey.previous_step();
    }
    Ok(())
}

/// 手入力の車両フィールド用に入力ボックスを開く。
fn open_manual_box(app: &mut App, prompt: &str, id: InputCallbackId) {
    let current = app
        .sessions
        .session()
        .and_then(|s| {
            let m = s.vehicle.manual();
            match id {
                InputCallbackId::ManualYear => m.year.map(|y| y.to_string()),
                InputCallbackId::ManualMake => m.make.clone(),
                InputCallbackId::ManualModel => m.model.clone(),
                InputCallbackId::ManualMileage => m.mileage_km.map(|km| km.to_string()),
                _ => None,
            }
        })
        .unwrap_or_default();
    app.input_box = Some(InputBoxState::new(prompt, &current, id));
}

/// 確認画面のキー処理。
async fn handle_review_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = &app.shortcuts.review;

    if sc.submit.matches(&k) {
        // 残数確認中・確認失敗の間は送信ボタンを無効にする。
        let quota = app.sessions.session().map(|s| s.quota.status().clone());
        match quota {
            Some(QuotaCheck::Checking) => {
                app.ui.status = "Still checking free diagnoses...".into();
                return Ok(());
            }
            Some(QuotaCheck::Indeterminate { .. }) => {
                app.ui.status = "Could not verify free diagnoses; press r to retry".into();
                return Ok(());
            }
            _ => {}
        }
        // 送信を試み、拒否されたら遷移指示に従う。
        match app.sessions.submit() {
            Some(nav) => handle_navigation(app, nav),
            None => {
                if app
                    .sessions
                    .session()
                    .is_some_and(|s| s.status() == SessionStatus::Submitting)
                {
                    app.journey.go_to(JourneyStep::Loading);
                    app.ui.status = "Diagnosing...".into();
                }
            }
        }
    } else if sc.retry_quota.matches(&k) {
        // 残数確認をやり直す。
        enter_review(app).await?;
    } else if sc.back.matches(&k) {
        app.journey.previous_step();
    }
    Ok(())
}

/// ローディング画面のキー処理。
async fn handle_loading_key(app: &mut App, k: KeyEvent) {
    if app.shortcuts.loading.cancel.matches(&k) {
        // 送信中の処理ごとセッションを破棄する。
        start_over(app, "Diagnosis cancelled").await;
    }
}

/// 結果画面のキー処理。
async fn handle_result_key(app: &mut App, k: KeyEvent) {
    if app.shortcuts.result.done.matches(&k) {
        // 結果画面を離れたらセッションは終わり。
        app.sessions.clear_result();
        start_over(app, "Ready").await;
    }
}

/// サインアップ案内画面のキー処理。
async fn handle_sign_up_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = &app.shortcuts.sign_up;

    if sc.start_over.matches(&k) {
        start_over(app, "Sign up to continue diagnosing").await;
    } else if sc.back.matches(&k) {
        // 確認画面へ戻ると残数を確認し直す。
        enter_review(app).await?;
    }
    Ok(())
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) {
    // 入力ボックスが無ければ何もしない。
    let Some(input_state) = &mut app.input_box else {
        return;
    };

    // 入力ボックス用ショートカットを参照する。
    let sc = &app.shortcuts.input_box;

    if sc.confirm.matches(&k) {
        // 入力ボックスを閉じる前に値とコールバック種別を保存する。
        let value = input_state.value();
        let callback_id = input_state.callback_id;
        app.input_box = None;

        // コールバック種別に応じて値を反映する。
        apply_input_callback(app, callback_id, value);
    } else if sc.cancel.matches(&k) {
        // 入力を破棄して入力ボックスを閉じる。
        app.input_box = None;
    } else if sc.backspace.matches(&k) {
        input_state.backspace();
    } else if sc.delete.matches(&k) {
        input_state.delete();
    } else if sc.left.matches(&k) {
        input_state.move_left();
    } else if sc.right.matches(&k) {
        input_state.move_right();
    } else if sc.home.matches(&k) {
        input_state.move_home();
    } else if sc.end.matches(&k) {
        input_state.move_end();
    } else if sc.clear_line.matches(&k) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code
        && !k.modifiers.contains(KeyModifiers::CONTROL)
    {
        // コントロールキーでない場合のみ挿入する。
        input_state.insert_char(c);
    }
}

/// 入力ボックスのコールバックを適用する。
fn apply_input_callback(app: &mut App, callback_id: InputCallbackId, value: String) {
    let Some(session) = app.sessions.session_mut() else {
        return;
    };
    let outcome: Result<(), String> = match callback_id {
        InputCallbackId::Description => {
            session.input.set_description(value);
            Ok(())
        }
        InputCallbackId::PhotoPath => {
            // 存在するファイルだけ受け付ける。
            let path = value.trim();
            if path.is_empty() {
                Ok(())
            } else if !Path::new(path).is_file() {
                Err(format!("photo not found: {path}"))
            } else if session.input.add_photos([PhotoRef::from(path)]) == 0 {
                Err(format!("at most {MAX_PHOTOS} photos can be attached"))
            } else {
                app.ui.status = format!("{} photos attached", session.input.photos().len());
                Ok(())
            }
        }
        InputCallbackId::ManualYear => value
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("year must be a number, got `{}`", value.trim()))
            .and_then(|year| {
                session
                    .vehicle
                    .set_manual(ManualVehicle {
                        year: Some(year),
                        ..ManualVehicle::default()
                    })
                    .map_err(|e| e.to_string())
            }),
        InputCallbackId::ManualMake => session
            .vehicle
            .set_manual(ManualVehicle {
                make: Some(value),
                ..ManualVehicle::default()
            })
            .map_err(|e| e.to_string()),
        InputCallbackId::ManualModel => session
            .vehicle
            .set_manual(ManualVehicle {
                model: Some(value),
                ..ManualVehicle::default()
            })
            .map_err(|e| e.to_string()),
        InputCallbackId::ManualMileage => value
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("mileage must be a whole number of km, got `{}`", value.trim()))
            .and_then(|km| {
                session
                    .vehicle
                    .set_manual(ManualVehicle {
                        mileage_km: Some(km),
                        ..ManualVehicle::default()
                    })
                    .map_err(|e| e.to_string())
            }),
    };
    app.ui.error = outcome.err();
}
