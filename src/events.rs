//! 描画側と共有するUI状態。

/// 描画側と共有するUI状態。
#[derive(Clone, Debug, Default)]
pub struct UiState {
    /// カテゴリ一覧の選択行。
    pub category_idx: usize,
    /// 保存済み車両一覧の選択行。
    pub vehicle_idx: usize,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
}

impl UiState {
    /// ログを追加する（古いものから捨てる）。
    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
        if self.log.len() > 50 {
            self.log.remove(0);
        }
    }
}
