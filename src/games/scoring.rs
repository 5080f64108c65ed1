use crate::games::session::IdentityMode;

/// Bonus applied to points won in story mode.
pub const STORY_MULTIPLIER: f64 = 1.25;

/// Factor applied to raw scores when they are shown in chat.
pub const DISPLAY_MULTIPLIER: f64 = 25.0;

/// Points awarded for a correct identity guess.
///
/// `attempt_index` is the number of wrong guesses made before the correct one.
/// Points halve with each wrong guess and drop to zero after the third.
pub fn identity_points(attempt_index: u32, mode: IdentityMode) -> f64 {
    let base = match attempt_index {
        0 => 1.0,
        1 => 0.5,
        2 => 0.25,
        _ => 0.0,
    };

    match mode {
        IdentityMode::Normal => base,
        IdentityMode::Story => base * STORY_MULTIPLIER,
    }
}

/// Converts a raw leaderboard score to the integer shown to users.
pub fn display_score(score: f64) -> u64 {
    (score * DISPLAY_MULTIPLIER).floor() as u64
}
