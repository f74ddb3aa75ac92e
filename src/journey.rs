//! 診断ジャーニーのステップ管理。

/// ジャーニーの各ステップ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JourneyStep {
    /// 症状カテゴリの選択
    Category,
    /// 説明文・音声メモ・写真の入力
    Describe,
    /// 車両情報（任意）
    Vehicle,
    /// 送信前の確認とゲスト残数チェック
    Review,
    /// 診断中のローディング画面
    Loading,
    /// 診断結果
    Result,
    /// ゲストの無料枠切れ（サインアップ案内）
    SignUp,
}

/// ジャーニーの状態管理
#[derive(Clone, Debug)]
pub struct JourneyState {
    /// 現在のステップ
    pub current_step: JourneyStep,
    /// 番号付きステップ数
    pub total_steps: usize,
}

impl JourneyState {
    /// 新しいジャーニー状態を作成
    pub fn new() -> Self {
        // 最初はカテゴリ選択から開始する。
        Self {
            current_step: JourneyStep::Category,
            total_steps: 6,
        }
    }

    /// 次のステップへ進む
    pub fn next_step(&mut self) {
        // 入力系ステップのみ順送りする。以降は結果で遷移する。
        self.current_step = match self.current_step {
            JourneyStep::Category => JourneyStep::Describe,
            JourneyStep::Describe => JourneyStep::Vehicle,
            JourneyStep::Vehicle => JourneyStep::Review,
            JourneyStep::Review => JourneyStep::Loading,
            other => other,
        };
    }

    /// 前のステップへ戻る
    pub fn previous_step(&mut self) {
        // ローディングや結果からは戻れない。
        self.current_step = match self.current_step {
            JourneyStep::Describe => JourneyStep::Category,
            JourneyStep::Vehicle => JourneyStep::Describe,
            JourneyStep::Review => JourneyStep::Vehicle,
            JourneyStep::SignUp => JourneyStep::Review,
            other => other,
        };
    }

    /// 最初の入力ステップへ直接戻る（履歴を辿らない）
    pub fn restart(&mut self) {
        self.current_step = JourneyStep::Category;
    }

    /// 指定ステップへ移動する
    pub fn go_to(&mut self, step: JourneyStep) {
        self.current_step = step;
    }

    /// 現在のステップのプロンプトメッセージを取得
    pub fn get_prompt(&self) -> &'static str {
        // ステップごとの説明文を返す。
        match self.current_step {
            JourneyStep::Category => "What kind of problem are you having?",
            JourneyStep::Describe => {
                "Describe the problem. Add a voice note or photos if typing is hard."
            }
            JourneyStep::Vehicle => "Which vehicle is it? This step is optional.",
            JourneyStep::Review => "Check the details and send them for diagnosis.",
            JourneyStep::Loading => "Analysing your vehicle...",
            JourneyStep::Result => "Diagnosis",
            JourneyStep::SignUp => {
                "You have used all free diagnoses.\nSign up to keep diagnosing your vehicle."
            }
        }
    }

    /// 現在のステップ番号を取得（1始まり）
    pub fn get_step_number(&self) -> usize {
        // ステップを番号へ対応付ける。
        match self.current_step {
            JourneyStep::Category => 1,
            JourneyStep::Describe => 2,
            JourneyStep::Vehicle => 3,
            JourneyStep::Review | JourneyStep::SignUp => 4,
            JourneyStep::Loading => 5,
            JourneyStep::Result => 6,
        }
    }
}

impl Default for JourneyState {
    fn default() -> Self {
        Self::new()
    }
}
