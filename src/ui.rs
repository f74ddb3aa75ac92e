//! TUI用端末の初期化と復元。

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};

/// アプリ全体で使う端末型。
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// 生存中は代替画面とrawモードを保持し、Dropで必ず元に戻すガード。
pub struct TerminalGuard {
    pub terminal: Tui,
}

impl TerminalGuard {
    /// 代替画面へ切り替え、rawモードを有効化する。
    pub fn enter() -> Result<Self> {
        // キー入力を即時に受け取れるようrawモードへ切り替える。
        enable_raw_mode()?;
        // 標準出力を取得して代替画面へ入る。
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            // 途中で失敗したらrawモードだけでも戻す。
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        // CrosstermバックエンドでTerminalを構築する。
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // エラー終了やパニック時も端末を元に戻す。
        if let Err(e) = disable_raw_mode() {
            tracing::warn!("disable_raw_mode failed: {e}");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen) {
            tracing::warn!("leave alternate screen failed: {e}");
        }
        let _ = self.terminal.show_cursor();
    }
}
