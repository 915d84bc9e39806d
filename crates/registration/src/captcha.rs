use serde::Serialize;

use crate::random::{BoxedRandom, RandomSource};

/// Glyph colours. Purely cosmetic.
pub const PALETTE: [&str; 5] = ["#1f3a93", "#c0392b", "#27ae60", "#8e44ad", "#d35400"];

/// Rendering hints for one digit. Carries no meaning for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlyphStyle {
    pub rotation_deg: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub color: &'static str,
    pub font_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptchaChallenge {
    digits: [char; 2],
    styles: [GlyphStyle; 2],
}

impl CaptchaChallenge {
    pub fn from_digits(first: u8, second: u8) -> Self {
        let plain = GlyphStyle {
            rotation_deg: 0,
            offset_x: 0,
            offset_y: 0,
            color: PALETTE[0],
            font_size: 26,
        };
        Self {
            digits: [digit_char(first), digit_char(second)],
            styles: [plain, plain],
        }
    }

    pub fn digits(&self) -> [char; 2] {
        self.digits
    }

    pub fn styles(&self) -> &[GlyphStyle; 2] {
        &self.styles
    }

    /// The string a user has to type.
    pub fn canonical(&self) -> String {
        self.digits.iter().collect()
    }

    /// Exact match only, no trimming or normalization.
    pub fn validate(&self, input: &str) -> bool {
        let mut chars = input.chars();
        chars.next() == Some(self.digits[0]) && chars.next() == Some(self.digits[1]) && chars.next().is_none()
    }
}

pub fn generate(rng: &mut dyn RandomSource) -> CaptchaChallenge {
    let first = rng.next_in_range(0, 9) as u8;
    let second = rng.next_in_range(0, 9) as u8;
    CaptchaChallenge {
        digits: [digit_char(first), digit_char(second)],
        styles: [glyph_style(rng), glyph_style(rng)],
    }
}

fn glyph_style(rng: &mut dyn RandomSource) -> GlyphStyle {
    GlyphStyle {
        rotation_deg: rng.next_in_range(-15, 15) as i32,
        offset_x: rng.next_in_range(-3, 3) as i32,
        offset_y: rng.next_in_range(-3, 3) as i32,
        color: PALETTE[rng.next_in_range(0, PALETTE.len() as i64 - 1) as usize],
        font_size: rng.next_in_range(24, 28) as u32,
    }
}

fn digit_char(d: u8) -> char {
    char::from(b'0' + d.min(9))
}

/// Current challenge plus whatever the user has typed so far.
pub struct CaptchaPad {
    rng: BoxedRandom,
    challenge: CaptchaChallenge,
    input: String,
}

impl CaptchaPad {
    pub fn new(mut rng: BoxedRandom) -> Self {
        let challenge = generate(rng.as_mut());
        Self {
            rng,
            challenge,
            input: String::new(),
        }
    }

    pub fn challenge(&self) -> &CaptchaChallenge {
        &self.challenge
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Keeps at most two characters, like the input field does.
    pub fn set_input(&mut self, input: &str) {
        self.input = input.chars().take(2).collect();
    }

    pub fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input)
    }

    pub fn is_valid(&self) -> bool {
        self.challenge.validate(&self.input)
    }

    /// New challenge, typed input kept.
    pub fn refresh(&mut self) {
        self.challenge = generate(self.rng.as_mut());
    }

    /// New challenge, typed input cleared.
    pub fn reset(&mut self) {
        self.refresh();
        self.input.clear();
    }
}
