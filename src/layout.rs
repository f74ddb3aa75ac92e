//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// メインレイアウトの領域
pub struct MainLayout {
    /// ステップ本文 + SESSIONパネルの領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の2つの領域
pub struct BodyLayout {
    /// 現在ステップの本文
    pub step_panel: Rect,
    /// 入力内容の要約とログ
    pub session_panel: Rect,
}

/// 画面を3つの領域に分割（Body + HELP + STATUS）
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Body
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        body: chunks[0],
        help_bar: chunks[1],
        status_bar: chunks[2],
    }
}

/// Body領域を2つに分割（ステップ 65% + SESSION 35%）
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(65), // ステップ本文
            Constraint::Percentage(35), // SESSIONパネル
        ])
        .split(area);

    BodyLayout {
        step_panel: chunks[0],
        session_panel: chunks[1],
    }
}

/// ローディング画面の縦分割（見出し + ゲージ + 状態文 + 豆知識）
pub fn create_loading_layout(area: Rect) -> [Rect; 4] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2), // 見出し
            Constraint::Length(3), // ゲージ
            Constraint::Length(2), // 状態メッセージ
            Constraint::Min(3),    // 豆知識
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2], chunks[3]]
}
