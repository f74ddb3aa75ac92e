//! ショートカット設定の管理。
//!
//! `shortcut.toml` のキー文字列（例: "Ctrl+u", "Enter", "r"）は読み込み時に
//! 一度だけ [`KeyBinding`] へ変換する。解釈できない文字列は起動時エラーになる。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};
use thiserror::Error;

/// キー文字列の解釈エラー。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyBindingError {
    #[error("empty key binding")]
    Empty,
    #[error("unknown modifier `{modifier}` in `{binding}`")]
    UnknownModifier { modifier: String, binding: String },
    #[error("unknown key `{key}` in `{binding}`")]
    UnknownKey { key: String, binding: String },
}

/// 解釈済みのキー1つ。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    /// キー文字列を解釈する。
    pub fn parse(s: &str) -> Result<Self, KeyBindingError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyBindingError::Empty);
        }
        // "+" 単体もキーとして扱えるよう、末尾の区切りだけで分割する。
        let (mods, key) = match s.rsplit_once('+') {
            Some((m, k)) if !m.is_empty() && !k.is_empty() => (Some(m), k),
            _ => (None, s),
        };

        // 修飾キーを解析して期待値を作る。
        let mut modifiers = KeyModifiers::empty();
        for m in mods.into_iter().flat_map(|m| m.split('+')) {
            modifiers |= match m.to_ascii_lowercase().as_str() {
                "ctrl" => KeyModifiers::CONTROL,
                "alt" => KeyModifiers::ALT,
                "shift" => KeyModifiers::SHIFT,
                _ => {
                    return Err(KeyBindingError::UnknownModifier {
                        modifier: m.into(),
                        binding: s.into(),
                    });
                }
            };
        }

        // キーコードの種別ごとに変換する。
        let code = match key.to_ascii_lowercase().as_str() {
            "enter" => KeyCode::Enter,
            "esc" => KeyCode::Esc,
            "tab" => KeyCode::Tab,
            "backspace" => KeyCode::Backspace,
            "delete" => KeyCode::Delete,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "space" => KeyCode::Char(' '),
            // 単一文字は Char として扱う。
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => {
                        return Err(KeyBindingError::UnknownKey {
                            key: key.into(),
                            binding: s.into(),
                        });
                    }
                }
            }
        };
        Ok(Self { code, modifiers })
    }

    /// KeyEventがこのキーと一致するか判定する。
    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.modifiers
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            f.write_str("Alt+")?;
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            f.write_str("Shift+")?;
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("Space"),
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Esc => f.write_str("Esc"),
            KeyCode::Tab => f.write_str("Tab"),
            KeyCode::Backspace => f.write_str("Backspace"),
            KeyCode::Delete => f.write_str("Delete"),
            KeyCode::Up => f.write_str("Up"),
            KeyCode::Down => f.write_str("Down"),
            KeyCode::Left => f.write_str("Left"),
            KeyCode::Right => f.write_str("Right"),
            KeyCode::Home => f.write_str("Home"),
            KeyCode::End => f.write_str("End"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// 1つの操作に割り当てたキー群。TOML上は文字列の配列。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Keys(Vec<KeyBinding>);

impl Keys {
    /// いずれかのキーと一致するか判定する。
    pub fn matches(&self, key: &KeyEvent) -> bool {
        self.0.iter().any(|b| b.matches(key))
    }
}

impl TryFrom<Vec<String>> for Keys {
    type Error = KeyBindingError;

    fn try_from(v: Vec<String>) -> Result<Self, Self::Error> {
        v.iter()
            .map(|s| KeyBinding::parse(s))
            .collect::<Result<Vec<_>, _>>()
            .map(Keys)
    }
}

impl From<Keys> for Vec<String> {
    fn from(k: Keys) -> Self {
        k.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 表示用に "/" 区切りで連結する。
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{b}")?;
        }
        Ok(())
    }
}

/// 既定値用のヘルパー。既定のキー文字列は常に解釈できる前提。
fn keys(list: &[&str]) -> Keys {
    Keys(
        list.iter()
            .filter_map(|s| KeyBinding::parse(s).ok())
            .collect(),
    )
}

/// ショートカット設定の全体。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortcuts {
    pub global: GlobalShortcuts,
    pub category: CategoryShortcuts,
    pub describe: DescribeShortcuts,
    pub vehicle: VehicleShortcuts,
    pub review: ReviewShortcuts,
    pub loading: LoadingShortcuts,
    pub result: ResultShortcuts,
    pub sign_up: SignUpShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// どの画面でも有効なショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalShortcuts {
    pub quit: Keys,
}

/// カテゴリ選択画面のショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShortcuts {
    pub up: Keys,
    pub down: Keys,
    pub select: Keys,
    pub abort: Keys,
}

/// 入力画面のショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeShortcuts {
    pub edit_text: Keys,
    pub record: Keys,
    pub play: Keys,
    pub delete_voice: Keys,
    pub add_photo: Keys,
    pub remove_photo: Keys,
    pub clear_all: Keys,
    pub next: Keys,
    pub back: Keys,
}

/// 車両画面のショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleShortcuts {
    pub up: Keys,
    pub down: Keys,
    pub pick: Keys,
    pub year: Keys,
    pub make: Keys,
    pub model: Keys,
    pub mileage: Keys,
    pub clear: Keys,
    pub next: Keys,
    pub back: Keys,
}

/// 確認画面のショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewShortcuts {
    pub submit: Keys,
    pub retry_quota: Keys,
    pub back: Keys,
}

/// ローディング画面のショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingShortcuts {
    pub cancel: Keys,
}

/// 結果画面のショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultShortcuts {
    pub done: Keys,
}

/// サインアップ案内画面のショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpShortcuts {
    pub start_over: Keys,
    pub back: Keys,
}

/// InputBoxのショートカット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputBoxShortcuts {
    pub confirm: Keys,
    pub cancel: Keys,
    pub backspace: Keys,
    pub delete: Keys,
    pub left: Keys,
    pub right: Keys,
    pub home: Keys,
    pub end: Keys,
    pub clear_line: Keys,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            // 既存ファイルを読み込んでパースする（キー文字列もここで検証される）。
            let content = std::fs::read_to_string(path)?;
            let shortcuts: Shortcuts = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("invalid {}: {e}", path.display()))?;
            Ok(shortcuts)
        } else {
            // 未作成の場合は既定値を利用する。
            Ok(Self::default())
        }
    }
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            global: GlobalShortcuts { quit: keys(&["q"]) },
            category: CategoryShortcuts {
                up: keys(&["Up", "k"]),
                down: keys(&["Down", "j"]),
                select: keys(&["Enter"]),
                abort: keys(&["Esc"]),
            },
            describe: DescribeShortcuts {
                edit_text: keys(&["e"]),
                record: keys(&["r"]),
                play: keys(&["p"]),
                delete_voice: keys(&["x"]),
                add_photo: keys(&["a"]),
                remove_photo: keys(&["d"]),
                clear_all: keys(&["c"]),
                next: keys(&["Enter"]),
                back: keys(&["Esc"]),
            },
            vehicle: VehicleShortcuts {
                up: keys(&["Up"]),
                down: keys(&["Down"]),
                pick: keys(&["Space"]),
                year: keys(&["y"]),
                make: keys(&["m"]),
                model: keys(&["o"]),
                mileage: keys(&["g"]),
                clear: keys(&["c"]),
                next: keys(&["Enter"]),
                back: keys(&["Esc"]),
            },
            review: ReviewShortcuts {
                submit: keys(&["Enter"]),
                retry_quota: keys(&["r"]),
                back: keys(&["Esc"]),
            },
            loading: LoadingShortcuts {
                cancel: keys(&["Esc"]),
            },
            result: ResultShortcuts {
                done: keys(&["Enter", "Esc"]),
            },
            sign_up: SignUpShortcuts {
                start_over: keys(&["Enter"]),
                back: keys(&["Esc"]),
            },
            input_box: InputBoxShortcuts {
                confirm: keys(&["Enter"]),
                cancel: keys(&["Esc"]),
                backspace: keys(&["Backspace"]),
                delete: keys(&["Delete"]),
                left: keys(&["Left"]),
                right: keys(&["Right"]),
                home: keys(&["Home"]),
                end: keys(&["End"]),
                clear_line: keys(&["Ctrl+u"]),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_matches_simple_char() {
        // 単一文字の一致判定を検証する。
        let k = key(KeyCode::Char('q'), KeyModifiers::empty());
        assert!(keys(&["q"]).matches(&k));
        assert!(!keys(&["w"]).matches(&k));
    }

    #[test]
    fn test_matches_special_key() {
        // 特殊キーの一致判定を検証する。
        let k = key(KeyCode::Enter, KeyModifiers::empty());
        assert!(keys(&["Enter"]).matches(&k));
        assert!(!keys(&["Esc"]).matches(&k));
        assert!(keys(&["Space"]).matches(&key(KeyCode::Char(' '), KeyModifiers::empty())));
    }

    #[test]
    fn test_matches_with_modifier() {
        // 修飾キー付きの一致判定を検証する。
        let k = key(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert!(keys(&["Ctrl+u"]).matches(&k));
        assert!(!keys(&["u"]).matches(&k));
    }

    #[test]
    fn test_matches_multiple_keys() {
        // 複数キーバインドの一致判定を検証する。
        let bindings = keys(&["Up", "k"]);
        assert!(bindings.matches(&key(KeyCode::Up, KeyModifiers::empty())));
        assert!(bindings.matches(&key(KeyCode::Char('k'), KeyModifiers::empty())));
        assert!(!bindings.matches(&key(KeyCode::Char('j'), KeyModifiers::empty())));
        assert_eq!(bindings.to_string(), "Up/k");
    }

    #[test]
    fn test_parse_errors() {
        // 解釈できない文字列がエラーになることを検証する。
        assert_eq!(KeyBinding::parse(""), Err(KeyBindingError::Empty));
        assert!(matches!(
            KeyBinding::parse("Hyper+x"),
            Err(KeyBindingError::UnknownModifier { .. })
        ));
        assert!(matches!(
            KeyBinding::parse("PageDown"),
            Err(KeyBindingError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_bad_binding_rejected_at_load() {
        // 不正なキーを含む設定ファイルは読み込み時に失敗する。
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shortcut.toml");
        let mut text = toml::to_string_pretty(&Shortcuts::default()).unwrap();
        text = text.replacen("\"q\"", "\"Ctrl+Nope\"", 1);
        std::fs::write(&path, text).unwrap();
        let err = Shortcuts::load_or_default(&path).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_defaults_survive_toml() {
        // 既定値がTOML経由で同じ値に戻ることを検証する。
        let text = toml::to_string_pretty(&Shortcuts::default()).unwrap();
        let parsed: Shortcuts = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Shortcuts::default());
    }
}
