use serde::Serialize;
use std::fmt;

use super::key::{KeyLabel, Mode};
use super::pitch::{Note, PitchClass};

/// Hue spacing between neighbouring pitch classes (C = 0°)
const HUE_STEP: f32 = 30.0;

/// Shown whenever there is no note or key to color.
pub const NEUTRAL: Color = Color::new(0.60, 0.15, 200.0);

const NOTE_LIGHTNESS: f32 = 0.74;
const NOTE_CHROMA: f32 = 0.42;
const MAJOR_LIGHTNESS: f32 = 0.76;
const MAJOR_CHROMA: f32 = 0.44;
const MINOR_LIGHTNESS: f32 = 0.59;
const MINOR_CHROMA: f32 = 0.32;

/// Perceptual OKLCH triple: lightness [0, 1], chroma ~[0, 0.5], hue degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Color {
    pub lightness: f32,
    pub chroma: f32,
    pub hue: f32,
}

impl Color {
    pub const fn new(lightness: f32, chroma: f32, hue: f32) -> Self {
        Self {
            lightness,
            chroma,
            hue,
        }
    }
}

/// CSS `oklch()` notation.
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oklch({:.2} {:.2} {:.0})", self.lightness, self.chroma, self.hue)
    }
}

pub fn base_hue(pitch_class: PitchClass) -> f32 {
    pitch_class.index() as f32 * HUE_STEP
}

pub fn note_color(note: Note) -> Color {
    match note {
        Note::NoPitch => NEUTRAL,
        Note::Pitch(pc) => Color::new(NOTE_LIGHTNESS, NOTE_CHROMA, base_hue(pc)),
    }
}

/// Note color nudged by the frame's dynamics. Hue moves a few degrees at
/// most and lightness/chroma stay in tight bands, so different notes never
/// blend into each other.
pub fn dynamic_note_color(
    note: Note,
    loudness_delta: f32,
    spectral_centroid_delta: f32,
    spectral_flux: f32,
) -> Color {
    let Note::Pitch(pc) = note else {
        return NEUTRAL;
    };

    let loudness = ((loudness_delta + 20.0) / 40.0).clamp(0.0, 1.0);
    let centroid = ((spectral_centroid_delta + 2000.0) / 4000.0).clamp(0.0, 1.0);
    let flux = ((spectral_flux + 50.0) / 100.0).clamp(0.0, 1.0);

    let hue_shift = (loudness - 0.5) * 8.0 + (centroid - 0.5) * 5.0;
    let hue = (base_hue(pc) + hue_shift).rem_euclid(360.0);

    let lightness =
        (NOTE_LIGHTNESS + loudness * 0.04 + flux * 0.02 - 0.03).clamp(0.70, 0.78);
    let chroma = (NOTE_CHROMA + centroid * 0.04 + flux * 0.02 - 0.03).clamp(0.38, 0.46);

    Color::new(lightness, chroma, hue)
}

/// Majors bright and rich, minors darker and softer, same hue per tonic.
pub fn key_color(label: KeyLabel) -> Color {
    match label {
        KeyLabel::Undetermined | KeyLabel::Detecting => NEUTRAL,
        KeyLabel::Key(key) => mode_color(key.mode, base_hue(key.tonic)),
    }
}

/// Same as [`key_color`] but straight from a display label. Unknown note
/// names get hue 0 and any mode word other than `major` colors as minor.
pub fn key_color_for_label(label: &str) -> Color {
    if label == "Detecting..." || label == "N/A" {
        return NEUTRAL;
    }
    let mut parts = label.split(' ');
    let hue = parts
        .next()
        .and_then(PitchClass::from_name)
        .map_or(0.0, base_hue);
    let mode = match parts.next() {
        Some("major") => Mode::Major,
        _ => Mode::Minor,
    };
    mode_color(mode, hue)
}

/// Note color from a display label. Notes are always spelled with sharps,
/// so flat spellings and unknown names get hue 0.
pub fn note_color_for_label(label: &str) -> Color {
    if label == "N/A" {
        return NEUTRAL;
    }
    let hue = PitchClass::all()
        .find(|pc| pc.sharp_name() == label)
        .map_or(0.0, base_hue);
    Color::new(NOTE_LIGHTNESS, NOTE_CHROMA, hue)
}

fn mode_color(mode: Mode, hue: f32) -> Color {
    match mode {
        Mode::Major => Color::new(MAJOR_LIGHTNESS, MAJOR_CHROMA, hue),
        Mode::Minor => Color::new(MINOR_LIGHTNESS, MINOR_CHROMA, hue),
    }
}
