//! Text, voice and photo input merged into one submittable unit.

use super::model::{Category, PhotoRef, VoiceRecording};

/// Longest description the service accepts.
pub const MAX_DESCRIPTION_CHARS: usize = 500;
/// Shortest description that counts as usable on its own.
pub const MIN_DESCRIPTION_CHARS: usize = 20;
/// Photos attached to a single request.
pub const MAX_PHOTOS: usize = 5;

/// Input collected across the describe steps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputAggregator {
    category: Option<Category>,
    description: String,
    voice: Option<VoiceRecording>,
    photos: Vec<PhotoRef>,
}

impl InputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = Some(category);
    }

    /// Picked category, or `Other` when the step was skipped.
    pub fn category(&self) -> Category {
        self.category.unwrap_or_default()
    }

    /// Replace the description, keeping at most 500 characters.
    pub fn set_description(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.description = match text.char_indices().nth(MAX_DESCRIPTION_CHARS) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text,
        };
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Length in characters, not bytes.
    pub fn description_len(&self) -> usize {
        self.description.chars().count()
    }

    pub fn set_voice(&mut self, recording: Option<VoiceRecording>) {
        self.voice = recording;
    }

    pub fn voice(&self) -> Option<&VoiceRecording> {
        self.voice.as_ref()
    }

    /// Append photos in order; anything past the fifth photo is dropped.
    /// Returns how many were actually kept.
    pub fn add_photos(&mut self, refs: impl IntoIterator<Item = PhotoRef>) -> usize {
        let room = MAX_PHOTOS.saturating_sub(self.photos.len());
        let before = self.photos.len();
        self.photos.extend(refs.into_iter().take(room));
        let kept = self.photos.len() - before;
        tracing::debug!("photos added: {kept}, total {}", self.photos.len());
        kept
    }

    /// Remove the photo at `index`; out-of-range indices are ignored.
    pub fn remove_photo(&mut self, index: usize) -> Option<PhotoRef> {
        (index < self.photos.len()).then(|| self.photos.remove(index))
    }

    pub fn photos(&self) -> &[PhotoRef] {
        &self.photos
    }

    /// The first photo doubles as the primary image.
    pub fn primary_photo(&self) -> Option<&PhotoRef> {
        self.photos.first()
    }

    /// Submittable iff the description is long enough, or a voice note or photo exists.
    pub fn is_valid(&self) -> bool {
        self.description_len() >= MIN_DESCRIPTION_CHARS
            || self.voice.is_some()
            || !self.photos.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn photos(names: &[&str]) -> Vec<PhotoRef> {
        names.iter().map(|n| PhotoRef::from(*n)).collect()
    }

    #[test]
    fn test_short_description_alone_is_invalid() {
        let mut input = InputAggregator::new();
        input.set_description("short");
        assert!(!input.is_valid());
    }

    #[test]
    fn test_twenty_chars_is_the_threshold() {
        let mut input = InputAggregator::new();
        input.set_description("a".repeat(19));
        assert!(!input.is_valid());
        input.set_description("a".repeat(20));
        assert!(input.is_valid());
    }

    #[test]
    fn test_threshold_counts_characters_not_bytes() {
        let mut input = InputAggregator::new();
        // 10 two-byte characters: 20 bytes but only 10 chars.
        input.set_description("é".repeat(10));
        assert!(!input.is_valid());
    }

    #[test]
    fn test_single_photo_is_enough() {
        let mut input = InputAggregator::new();
        input.set_description("");
        input.add_photos(photos(&["a.jpg"]));
        assert!(input.is_valid());
    }

    #[test]
    fn test_voice_recording_is_enough() {
        let mut input = InputAggregator::new();
        input.set_voice(Some(VoiceRecording {
            asset: PathBuf::from("voice.wav"),
            duration_secs: 4,
        }));
        assert!(input.is_valid());
        input.set_voice(None);
        assert!(!input.is_valid());
    }

    #[test]
    fn test_add_photos_caps_at_five_and_keeps_order() {
        let mut input = InputAggregator::new();
        input.add_photos(photos(&["1", "2", "3", "4"]));
        let kept = input.add_photos(photos(&["5", "6", "7"]));
        assert_eq!(kept, 1);
        assert_eq!(input.photos(), photos(&["1", "2", "3", "4", "5"]).as_slice());
        assert_eq!(input.primary_photo(), Some(&PhotoRef::from("1")));
        assert_eq!(input.add_photos(photos(&["8"])), 0);
    }

    #[test]
    fn test_remove_photo_shifts_primary() {
        let mut input = InputAggregator::new();
        input.add_photos(photos(&["1", "2"]));
        assert_eq!(input.remove_photo(0), Some(PhotoRef::from("1")));
        assert_eq!(input.remove_photo(7), None);
        assert_eq!(input.primary_photo(), Some(&PhotoRef::from("2")));
    }

    #[test]
    fn test_description_truncated_to_limit() {
        let mut input = InputAggregator::new();
        input.set_description("x".repeat(MAX_DESCRIPTION_CHARS + 40));
        assert_eq!(input.description_len(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_skipped_category_is_other() {
        let mut input = InputAggregator::new();
        assert_eq!(input.category(), Category::Other);
        input.set_category(Category::Brakes);
        assert_eq!(input.category(), Category::Brakes);
        input.clear();
        assert_eq!(input, InputAggregator::default());
    }
}
