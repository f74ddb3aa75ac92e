//! Cosmetic loading feedback: asymptotic progress, phase text and tips.

use rand::Rng;

/// Simulated progress never passes this on its own.
pub const SIMULATED_CEILING: f32 = 99.0;
/// Displayed progress required before leaving the loading screen.
pub const NAVIGATION_THRESHOLD: f32 = 95.0;

/// Phase descriptions, cycled every status rotation.
pub const STATUS_MESSAGES: &[&str] = &[
    "Reading your description...",
    "Looking at your photos...",
    "Listening to your voice note...",
    "Checking common causes...",
    "Matching symptoms to known issues...",
    "Preparing recommendations...",
];

/// Tips shown while waiting, cycled every fact rotation.
pub const FACTS: &[&str] = &[
    "Checking tire pressure monthly can improve fuel economy by up to 3%.",
    "A squealing noise when braking often means the pads are nearly worn out.",
    "Most check-engine lights are triggered by something as simple as a loose fuel cap.",
    "Batteries typically last three to five years; cold weather shortens that.",
    "Transmission fluid that smells burnt is a sign to get it checked soon.",
    "Rotating your tires every 8,000-10,000 km helps them wear evenly.",
];

/// Next displayed value: big random steps early, tiny steps near the end.
pub fn advance<R: Rng>(current: f32, rng: &mut R) -> f32 {
    let step = if current < 70.0 {
        rng.random_range(1.0..=4.0)
    } else if current < 90.0 {
        0.5
    } else {
        0.2
    };
    (current + step).min(SIMULATED_CEILING)
}

/// What the loading screen shows.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadingView {
    pub progress: f32,
    message_idx: usize,
    fact_idx: usize,
}

impl Default for LoadingView {
    fn default() -> Self {
        Self {
            progress: 0.0,
            message_idx: 0,
            fact_idx: 0,
        }
    }
}

impl LoadingView {
    pub fn status_message(&self) -> &'static str {
        STATUS_MESSAGES[self.message_idx]
    }

    pub fn fact(&self) -> &'static str {
        FACTS[self.fact_idx]
    }

    pub(crate) fn rotate_message(&mut self) {
        self.message_idx = (self.message_idx + 1) % STATUS_MESSAGES.len();
    }

    pub(crate) fn rotate_fact(&mut self) {
        self.fact_idx = (self.fact_idx + 1) % FACTS.len();
    }
}
