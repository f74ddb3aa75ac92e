//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::{
    diagnosis::{
        aggregator::{MAX_DESCRIPTION_CHARS, MAX_PHOTOS, MIN_DESCRIPTION_CHARS},
        model::{ActionPriority, Category, DiagnosisResult, Urgency},
        quota::QuotaCheck,
        recorder::RecorderState,
        session::DiagnosisSession,
    },
    input, layout,
    journey::JourneyStep,
    shortcuts::Shortcuts,
};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // メインレイアウト（Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());
    let body_layout = layout::create_body_layout(main_layout.body);
    let session = app.sessions.session();

    // ステップ本文を描画する。
    let step_area = body_layout.step_panel;
    match app.journey.current_step {
        JourneyStep::Category => draw_category(f, app, step_area),
        JourneyStep::Describe => draw_describe(f, app, session, step_area),
        JourneyStep::Vehicle => draw_vehicle(f, app, session, step_area),
        JourneyStep::Review => draw_review(f, app, session, step_area),
        JourneyStep::Loading => draw_loading(f, app, step_area),
        JourneyStep::Result => draw_result(f, session.and_then(|s| s.result()), step_area),
        JourneyStep::SignUp => draw_sign_up(f, app, step_area),
    }

    // 右パネル：入力内容の要約とログ。
    let session_panel = Paragraph::new(build_session_text(app, session))
        .block(Block::default().borders(Borders::ALL).title("SESSION"))
        .wrap(Wrap { trim: true });
    f.render_widget(session_panel, body_layout.session_panel);

    // HELPバー（ステップごとのショートカット）を描画する。
    let help_text = get_help_text(app.journey.current_step, &app.shortcuts);
    let help_bar = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバー（ステップ・認証状態・残数・エラー）を描画する。
    f.render_widget(build_status_bar(app, session), main_layout.status_bar);

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

/// ステップ見出し付きの枠を作る。
fn step_block(app: &App) -> Block<'static> {
    let title = format!(
        "Step {}/{}",
        app.journey.get_step_number(),
        app.journey.total_steps
    );
    Block::default().borders(Borders::ALL).title(title)
}

/// カテゴリ選択を描画する。
fn draw_category(f: &mut Frame, app: &App, area: Rect) {
    let block = step_block(app);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(inner);
    f.render_widget(Paragraph::new(app.journey.get_prompt()).bold(), chunks[0]);

    let items: Vec<ListItem> = Category::ALL
        .iter()
        .map(|c| ListItem::new(c.label()))
        .collect();
    let list = List::new(items).highlight_symbol("→ ").highlight_style(
        Style::default()
            .bg(Color::Rgb(255, 140, 0)) // オレンジ色の背景
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    );
    let mut state = ListState::default();
    state.select(Some(app.ui.category_idx));
    f.render_stateful_widget(list, chunks[1], &mut state);
}

/// 説明文・音声・写真の入力状況を描画する。
fn draw_describe(f: &mut Frame, app: &App, session: Option<&DiagnosisSession>, area: Rect) {
    let Some(s) = session else {
        return;
    };
    let len = s.input.description_len();
    let description = if s.input.description().is_empty() {
        "(press e to write a description)".to_string()
    } else {
        s.input.description().to_string()
    };
    let counter_style = if len >= MIN_DESCRIPTION_CHARS {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow)
    };

    // 録音状態を文言にする。
    let recorder = &app.recorder;
    let voice = match recorder.state() {
        RecorderState::Idle => "No voice note".to_string(),
        RecorderState::Recording => format!("● Recording {}", mmss(recorder.elapsed_secs())),
        RecorderState::Recorded => format!("Voice note {}", mmss(recorder.elapsed_secs())),
        RecorderState::Playing => format!(
            "▶ {} / {}",
            mmss(recorder.position_secs()),
            mmss(recorder.elapsed_secs())
        ),
        RecorderState::Paused => format!("Paused at {}", mmss(recorder.position_secs())),
    };

    let mut lines = vec![
        Line::from(app.journey.get_prompt()).bold(),
        Line::from(""),
        Line::from(description),
        Line::from(Span::styled(
            format!("{len}/{MAX_DESCRIPTION_CHARS}  ({MIN_DESCRIPTION_CHARS} characters minimum)"),
            counter_style,
        )),
        Line::from(""),
        Line::from(voice),
        Line::from(""),
        Line::from(format!("Photos ({}/{MAX_PHOTOS}):", s.input.photos().len())),
    ];
    // 先頭の写真はメイン画像として印を付ける。
    let primary = s.input.primary_photo();
    for p in s.input.photos() {
        let marker = if Some(p) == primary { "★" } else { " " };
        lines.push(Line::from(format!("{marker} {}", p.file_name())));
    }

    let body = Paragraph::new(lines)
        .block(step_block(app))
        .wrap(Wrap { trim: false });
    f.render_widget(body, area);
}

/// 車両選択・手入力を描画する。
fn draw_vehicle(f: &mut Frame, app: &App, session: Option<&DiagnosisSession>, area: Rect) {
    let Some(s) = session else {
        return;
    };
    let block = step_block(app);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(6),
        ])
        .split(inner);
    f.render_widget(Paragraph::new(app.journey.get_prompt()).bold(), chunks[0]);

    // 保存済み車両の一覧（ゲストや未読込なら案内文）。
    let selected_id = s.vehicle.selected().map(|v| v.id.clone());
    match s.vehicle.saved() {
        Some(list) if !list.is_empty() => {
            let items: Vec<ListItem> = list
                .iter()
                .map(|v| {
                    let mark = if Some(&v.id) == selected_id.as_ref() {
                        "[x]"
                    } else {
                        "[ ]"
                    };
                    ListItem::new(format!("{mark} {}", v.label()))
                })
                .collect();
            let list = List::new(items)
                .block(Block::default().title("Saved vehicles"))
                .highlight_symbol("→ ")
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
            let mut state = ListState::default();
            state.select(Some(app.ui.vehicle_idx));
            f.render_stateful_widget(list, chunks[1], &mut state);
        }
        Some(_) => {
            f.render_widget(Paragraph::new("No saved vehicles."), chunks[1]);
        }
        None if s.quota.is_guest() => {
            f.render_widget(
                Paragraph::new("Sign in to pick from your saved vehicles."),
                chunks[1],
            );
        }
        None => {
            f.render_widget(Paragraph::new("Loading saved vehicles..."), chunks[1]);
        }
    }

    // 手入力フィールド。
    let m = s.vehicle.manual();
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".into());
    let manual = format!(
        "Manual entry\n  Year: {}\n  Make: {}\n  Model: {}\n  Mileage: {}",
        or_dash(m.year.map(|y| y.to_string())),
        or_dash(m.make.clone()),
        or_dash(m.model.clone()),
        or_dash(m.mileage_km.map(|km| format!("{km} km"))),
    );
    f.render_widget(Paragraph::new(manual), chunks[2]);
}

/// 送信前の確認画面を描画する。
fn draw_review(f: &mut Frame, app: &App, session: Option<&DiagnosisSession>, area: Rect) {
    let Some(s) = session else {
        return;
    };
    let mut lines = vec![
        Line::from(app.journey.get_prompt()).bold(),
        Line::from(""),
        Line::from(format!("Category: {}", s.input.category())),
        Line::from(format!(
            "Description: {} characters",
            s.input.description_len()
        )),
        Line::from(format!(
            "Voice note: {}",
            s.input
                .voice()
                .map_or("none".to_string(), |v| format!("{}s", v.duration_secs))
        )),
        Line::from(format!("Photos: {}", s.input.photos().len())),
        Line::from(format!("Vehicle: {}", vehicle_summary(s))),
        Line::from(""),
    ];

    // ゲストは残数確認の状況を出す。
    if s.quota.is_guest() {
        let (text, color) = match s.quota.status() {
            QuotaCheck::NotChecked | QuotaCheck::Checking => {
                ("Checking free diagnoses...".to_string(), Color::Gray)
            }
            QuotaCheck::Checked { remaining } if *remaining > 0 => {
                (format!("{remaining} free diagnoses left"), Color::Green)
            }
            QuotaCheck::Checked { .. } => ("No free diagnoses left".to_string(), Color::Red),
            QuotaCheck::Indeterminate { reason } => (
                format!("Could not check free diagnoses: {reason}"),
                Color::Yellow,
            ),
        };
        lines.push(Line::from(Span::styled(text, Style::default().fg(color))));
    }
    if !s.input.is_valid() {
        lines.push(Line::from(Span::styled(
            "Add a longer description, a voice note or a photo before submitting.",
            Style::default().fg(Color::Yellow),
        )));
    }

    let body = Paragraph::new(lines)
        .block(step_block(app))
        .wrap(Wrap { trim: true });
    f.render_widget(body, area);
}

/// ローディング画面（ゲージ・状態文・豆知識）を描画する。
fn draw_loading(f: &mut Frame, app: &App, area: Rect) {
    let block = step_block(app);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let view = app.sessions.loading_view();
    let [title, gauge_area, message, fact] = layout::create_loading_layout(inner);

    f.render_widget(Paragraph::new(app.journey.get_prompt()).bold(), title);

    let pct = view.progress.clamp(0.0, 100.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(f64::from(pct) / 100.0)
        .label(format!("{pct:.0}%"));
    f.render_widget(gauge, gauge_area);

    f.render_widget(
        Paragraph::new(view.status_message()).style(Style::default().fg(Color::Cyan)),
        message,
    );
    f.render_widget(
        Paragraph::new(format!("Did you know?\n{}", view.fact()))
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: true }),
        fact,
    );
}

/// 診断結果を描画する。
fn draw_result(f: &mut Frame, result: Option<&DiagnosisResult>, area: Rect) {
    let Some(r) = result else {
        return;
    };
    let urgency_color = match r.urgency {
        Urgency::Low => Color::Green,
        Urgency::Medium => Color::Yellow,
        Urgency::High => Color::LightRed,
        Urgency::Critical => Color::Red,
    };

    let mut lines = vec![
        Line::from(vec![
            Span::raw("Urgency: "),
            Span::styled(
                r.urgency.label(),
                Style::default()
                    .fg(urgency_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("   Confidence: {}%", r.confidence_pct())),
        ]),
        Line::from(""),
        Line::from(r.summary.clone()),
    ];

    // 部分的な失敗があれば目立たせる。
    if let Some(msg) = &r.error_message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Note: {msg}"),
            Style::default().fg(Color::Yellow),
        )));
    }

    if !r.possible_causes.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from("Possible causes:").bold());
        for cause in &r.possible_causes {
            lines.push(Line::from(format!("  • {cause}")));
        }
    }

    if !r.recommended_actions.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from("Recommended actions:").bold());
        for (i, a) in r.recommended_actions.iter().enumerate() {
            let tag = match a.priority {
                Some(ActionPriority::High) => Span::styled(" [high]", Style::default().fg(Color::Red)),
                Some(ActionPriority::Medium) => {
                    Span::styled(" [medium]", Style::default().fg(Color::Yellow))
                }
                Some(ActionPriority::Low) => Span::styled(" [low]", Style::default().fg(Color::Gray)),
                None => Span::raw(""),
            };
            lines.push(Line::from(vec![
                Span::raw(format!("  {}. {}", i + 1, a.action)),
                tag,
            ]));
        }
    }

    lines.push(Line::from(""));
    lines.push(
        Line::from(format!("Received {}", r.received_at.format("%Y-%m-%d %H:%M")))
            .style(Style::default().fg(Color::Gray)),
    );

    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Diagnosis"))
        .wrap(Wrap { trim: true });
    f.render_widget(body, area);
}

/// サインアップ案内をポップアップで描画する。
fn draw_sign_up(f: &mut Frame, app: &App, area: Rect) {
    let popup = input::centered_popup(area, 80, 7);
    f.render_widget(Clear, popup);
    let body = Paragraph::new(app.journey.get_prompt())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Sign up")
                .style(Style::default().fg(Color::Yellow)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(body, popup);
}

/// SESSIONパネルのテキストを構築する。
fn build_session_text(app: &App, session: Option<&DiagnosisSession>) -> String {
    let summary = match session {
        Some(s) => format!(
            "Session: {}\nStatus: {:?}\nCategory: {}\nText: {}/{}\nVoice: {}\nPhotos: {}/{}\nVehicle: {}",
            &s.id.to_string()[..8],
            s.status(),
            s.input.category(),
            s.input.description_len(),
            MAX_DESCRIPTION_CHARS,
            if s.input.voice().is_some() { "yes" } else { "no" },
            s.input.photos().len(),
            MAX_PHOTOS,
            vehicle_summary(s),
        ),
        None => "No active session".into(),
    };
    format!(
        "{}\n\nLog:\n{}",
        summary,
        app.ui
            .log
            .iter()
            .rev()
            .take(8)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// 紐付け中の車両を1行で表す。
fn vehicle_summary(s: &DiagnosisSession) -> String {
    if let Some(v) = s.vehicle.selected() {
        return v.label();
    }
    let m = s.vehicle.manual();
    if m.is_empty() {
        return "none".into();
    }
    let parts: Vec<String> = [
        m.year.map(|y| y.to_string()),
        m.make.clone(),
        m.model.clone(),
        m.mileage_km.map(|km| format!("{km} km")),
    ]
    .into_iter()
    .flatten()
    .collect();
    parts.join(" ")
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App, session: Option<&DiagnosisSession>) -> Paragraph<'static> {
    let step_name = match app.journey.current_step {
        JourneyStep::Category => "Category",
        JourneyStep::Describe => "Describe",
        JourneyStep::Vehicle => "Vehicle",
        JourneyStep::Review => "Review",
        JourneyStep::Loading => "Loading",
        JourneyStep::Result => "Result",
        JourneyStep::SignUp => "SignUp",
    };

    // ゲストは確認済みの残数を添える。
    let mut badge = app.sessions.auth().badge();
    if let Some(remaining) = session.and_then(|s| s.quota.state().remaining) {
        badge = format!("{badge} ({remaining} free left)");
    }

    // エラーの有無でステータス文字列を切り替える。
    let status_text = if let Some(err) = &app.ui.error {
        format!("[{step_name}] {badge} | ERROR: {err}")
    } else {
        format!("[{step_name}] {badge} | {}", app.ui.status)
    };

    // ステータスバーのウィジェットを生成する。
    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は赤色で強調表示する。
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }

    status_bar
}

/// 現在ステップに応じたヘルプ文字列を返す。
fn get_help_text(step: JourneyStep, sc: &Shortcuts) -> String {
    let quit = &sc.global.quit;
    match step {
        JourneyStep::Category => format!(
            "{}/{}: navigate | {}: select | {}: start over | {quit}: quit",
            sc.category.up, sc.category.down, sc.category.select, sc.category.abort
        ),
        JourneyStep::Describe => format!(
            "{}: edit text | {}: record/stop | {}: play/pause | {}: delete voice | {}: add photo | {}: remove photo | {}: clear all | {}: next | {}: back",
            sc.describe.edit_text,
            sc.describe.record,
            sc.describe.play,
            sc.describe.delete_voice,
            sc.describe.add_photo,
            sc.describe.remove_photo,
            sc.describe.clear_all,
            sc.describe.next,
            sc.describe.back
        ),
        JourneyStep::Vehicle => format!(
            "{}/{}: navigate | {}: pick | {}: year | {}: make | {}: model | {}: mileage | {}: clear | {}: next | {}: back",
            sc.vehicle.up,
            sc.vehicle.down,
            sc.vehicle.pick,
            sc.vehicle.year,
            sc.vehicle.make,
            sc.vehicle.model,
            sc.vehicle.mileage,
            sc.vehicle.clear,
            sc.vehicle.next,
            sc.vehicle.back
        ),
        JourneyStep::Review => format!(
            "{}: diagnose | {}: retry quota check | {}: back | {quit}: quit",
            sc.review.submit, sc.review.retry_quota, sc.review.back
        ),
        JourneyStep::Loading => format!("{}: cancel", sc.loading.cancel),
        JourneyStep::Result => format!("{}: done", sc.result.done),
        JourneyStep::SignUp => format!(
            "{}: start over | {}: back to review",
            sc.sign_up.start_over, sc.sign_up.back
        ),
    }
}

/// 秒数を m:ss 表記にする。
fn mmss(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
