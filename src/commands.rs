pub mod captcha;
pub mod practice;
pub mod queue;

use coursedrill_registration::CaptchaChallenge;

/// Digits spaced out with their rotation, the closest a terminal gets to the drawn image.
pub fn render_challenge(challenge: &CaptchaChallenge) -> String {
    challenge
        .digits()
        .iter()
        .zip(challenge.styles().iter())
        .map(|(digit, style)| format!("{} ({:+}°)", digit, style.rotation_deg))
        .collect::<Vec<_>>()
        .join("   ")
}
