use std::collections::HashSet;

use rand::Rng;
use uuid::Uuid;

use thiep_types::models::{BackgroundStyle, FontFamily, Glyph, MAX_STICKERS, StickerPlacement};

use crate::error::AppError;

/// The card being decorated, before it is sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardDraft {
    pub message: String,
    pub background: BackgroundStyle,
    pub font_family: FontFamily,
    stickers: Vec<StickerPlacement>,
}

impl CardDraft {
    pub fn stickers(&self) -> &[StickerPlacement] {
        &self.stickers
    }

    /// Drop `glyph` somewhere on the card away from the edges.
    pub fn add_sticker(&mut self, glyph: Glyph) -> Result<&StickerPlacement, AppError> {
        if self.stickers.len() >= MAX_STICKERS {
            return Err(AppError::Validation(format!(
                "Tối đa {MAX_STICKERS} hình dán mỗi thiệp."
            )));
        }

        let mut rng = rand::rng();
        self.stickers.push(StickerPlacement {
            id: Uuid::new_v4().to_string(),
            glyph,
            x: rng.random_range(10.0..=90.0),
            y: rng.random_range(10.0..=90.0),
        });
        Ok(&self.stickers[self.stickers.len() - 1])
    }

    /// Move a sticker, clamping to the card. Returns false for unknown ids.
    pub fn move_sticker(&mut self, id: &str, x: f32, y: f32) -> bool {
        match self.stickers.iter_mut().find(|s| s.id == id) {
            Some(sticker) => {
                sticker.x = clamp_percent(x);
                sticker.y = clamp_percent(y);
                true
            }
            None => false,
        }
    }

    pub fn remove_sticker(&mut self, id: &str) -> bool {
        let before = self.stickers.len();
        self.stickers.retain(|s| s.id != id);
        self.stickers.len() != before
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn clamp_percent(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

/// Clamp externally supplied placements and enforce the sticker cap.
/// Blank or repeated ids get a fresh one so ids stay unique per card.
pub fn sanitize_stickers(stickers: Vec<StickerPlacement>) -> Result<Vec<StickerPlacement>, AppError> {
    if stickers.len() > MAX_STICKERS {
        return Err(AppError::Validation(format!(
            "Tối đa {MAX_STICKERS} hình dán mỗi thiệp."
        )));
    }

    let mut seen = HashSet::new();
    Ok(stickers
        .into_iter()
        .map(|s| {
            let id = if s.id.trim().is_empty() || seen.contains(&s.id) {
                Uuid::new_v4().to_string()
            } else {
                s.id
            };
            seen.insert(id.clone());
            StickerPlacement {
                id,
                glyph: s.glyph,
                x: clamp_percent(s.x),
                y: clamp_percent(s.y),
            }
        })
        .collect())
}
