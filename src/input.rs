//! TUI内での文字列入力コンポーネント（InputBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

/// InputBox入力状態
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値（文字単位で編集する）
    chars: Vec<char>,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 最大文字数（Noneなら無制限）
    pub max_chars: Option<usize>,
    /// カウンター下に出す補足（例: 最低文字数）
    pub hint: Option<String>,
    /// 入力完了時のコールバック識別子
    pub callback_id: InputCallbackId,
}

/// 入力完了時のコールバック識別子
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputCallbackId {
    /// 症状の説明文
    Description,
    /// 追加する写真のパス
    PhotoPath,
    // 手入力の車両情報
    ManualYear,
    ManualMake,
    ManualModel,
    ManualMileage,
}

impl InputBoxState {
    /// 初期値付きで作成し、カーソルを末尾に置く
    pub fn new(prompt: impl Into<String>, value: &str, callback_id: InputCallbackId) -> Self {
        let chars: Vec<char> = value.chars().collect();
        Self {
            prompt: prompt.into(),
            cursor: chars.len(),
            chars,
            max_chars: None,
            hint: None,
            callback_id,
        }
    }

    /// 最大文字数を設定する（初期値もはみ出した分を切り捨てる）
    pub fn with_limit(mut self, max_chars: usize) -> Self {
        self.chars.truncate(max_chars);
        self.cursor = self.cursor.min(self.chars.len());
        self.max_chars = Some(max_chars);
        self
    }

    /// 補足表示を設定する
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// 現在の入力値
    pub fn value(&self) -> String {
        self.chars.iter().collect()
    }

    /// 現在の文字数
    pub fn char_count(&self) -> usize {
        self.chars.len()
    }

    /// 文字を挿入（上限に達していれば無視）
    pub fn insert_char(&mut self, c: char) {
        if self.max_chars.is_some_and(|m| self.chars.len() >= m) {
            return;
        }
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    /// Backspace（カーソル前の文字を削除）
    pub fn backspace(&mut self) {
        // カーソルが先頭なら何もしない。
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    /// Delete（カーソル位置の文字を削除）
    pub fn delete(&mut self) {
        // カーソルが末尾なら何もしない。
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    /// カーソルを左に移動
    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// カーソルを右に移動
    pub fn move_right(&mut self) {
        if self.cursor < self.chars.len() {
            self.cursor += 1;
        }
    }

    /// カーソルを先頭に移動
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// カーソルを末尾に移動
    pub fn move_end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// 行全体をクリア
    pub fn clear_line(&mut self) {
        self.chars.clear();
        self.cursor = 0;
    }

    /// カウンター表示（例: "42/500"）
    pub fn counter(&self) -> Option<String> {
        self.max_chars.map(|m| format!("{}/{}", self.chars.len(), m))
    }
}

/// InputBoxをポップアップとして描画
pub fn render_input_box(f: &mut Frame, state: &InputBoxState) {
    // 中央に配置されたポップアップ領域を計算する。
    let popup_area = centered_popup(f.area(), 70, 8);

    // 既存の描画を消してポップアップ用の背景にする。
    f.render_widget(Clear, popup_area);

    // ポップアップの外枠とスタイルを描画する。
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    // 内部レイアウト（プロンプト + 入力フィールド + カウンター + ヘルプ）を定義する。
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // プロンプト
            Constraint::Length(1), // 入力フィールド
            Constraint::Length(1), // カウンターと補足
            Constraint::Length(1), // 空行
            Constraint::Length(1), // ヘルプ
        ])
        .split(popup_area);

    // プロンプトメッセージを描画する。
    let prompt_widget = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt_widget, inner_layout[0]);

    // 入力欄を描画する（横スクロール対応）。
    let input_widget = Paragraph::new(visible_with_cursor(state, inner_layout[1].width as usize))
        .style(Style::default().fg(Color::Green));
    f.render_widget(input_widget, inner_layout[1]);

    // カウンターと補足を描画する。
    let counter_line = match (state.counter(), &state.hint) {
        (Some(c), Some(h)) => format!("{c}  {h}"),
        (Some(c), None) => c,
        (None, Some(h)) => h.clone(),
        (None, None) => String::new(),
    };
    let at_limit = state.max_chars.is_some_and(|m| state.char_count() >= m);
    let counter_widget = Paragraph::new(counter_line)
        .style(Style::default().fg(if at_limit { Color::Yellow } else { Color::Gray }))
        .alignment(Alignment::Right);
    f.render_widget(counter_widget, inner_layout[2]);

    // ヘルプテキストを描画する。
    let help = Paragraph::new("Enter=OK | ESC=Cancel | Ctrl+U=Clear")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, inner_layout[4]);
}

/// 表示幅に収まる範囲を切り出し、カーソル位置に | を挿入する
fn visible_with_cursor(state: &InputBoxState, display_width: usize) -> String {
    // カーソル位置が表示幅を超えた場合のスクロール量を算出する。
    let scroll_offset = state.cursor.saturating_sub(display_width.saturating_sub(2));
    let end = (scroll_offset + display_width).min(state.chars.len());
    let visible = &state.chars[scroll_offset.min(end)..end];
    let at = (state.cursor - scroll_offset).min(visible.len());
    let before: String = visible[..at].iter().collect();
    let after: String = visible[at..].iter().collect();
    format!("{before}|{after}")
}

/// 中央配置のポップアップ領域を計算
pub fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    // 縦方向の余白を作り、中央行を取り出す。
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    // 横方向も中央に寄せてポップアップ領域を返す。
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_editing_in_the_middle() {
        // 途中挿入と削除を検証する。
        let mut s = InputBoxState::new("p", "brke", InputCallbackId::Description);
        s.move_left();
        s.move_left();
        s.insert_char('a');
        assert_eq!(s.value(), "brake");
        s.move_home();
        s.delete();
        assert_eq!(s.value(), "rake");
        s.move_end();
        s.backspace();
        assert_eq!(s.value(), "rak");
    }

    #[test]
    fn test_limit_blocks_insert() {
        // 上限到達後は入力されないことを検証する。
        let mut s = InputBoxState::new("p", "abcdef", InputCallbackId::Description).with_limit(5);
        assert_eq!(s.value(), "abcde");
        s.insert_char('z');
        assert_eq!(s.value(), "abcde");
        assert_eq!(s.counter().as_deref(), Some("5/5"));
        s.backspace();
        s.insert_char('ü');
        assert_eq!(s.value(), "abcdü");
    }

    #[test]
    fn test_visible_window_follows_cursor() {
        // カーソルが表示幅を超えたら横スクロールすることを検証する。
        let s = InputBoxState::new("p", "abcdefghij", InputCallbackId::PhotoPath);
        assert_eq!(visible_with_cursor(&s, 6), "ghij|");
        let short = InputBoxState::new("p", "ab", InputCallbackId::PhotoPath);
        assert_eq!(visible_with_cursor(&short, 6), "ab|");
    }
}
