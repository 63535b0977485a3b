use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::io::Cursor;

use crate::config::ReportConfig;
use crate::models::SessionData;
use crate::utils::text::shorten_label;

pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 630;

const BACKGROUND: Rgb<u8> = Rgb([18, 18, 18]);
const CARD: Rgb<u8> = Rgb([28, 28, 28]);
const ACCENT: Rgb<u8> = Rgb([0, 224, 198]);
const TEXT_PRIMARY: Rgb<u8> = Rgb([245, 245, 245]);
const TEXT_MUTED: Rgb<u8> = Rgb([180, 180, 180]);

const CARD_MARGIN: i32 = 60;
const CARD_RADIUS: i32 = 28;
const OUTLINE_WIDTH: i32 = 4;
const TEXT_LEFT: i32 = CARD_MARGIN + 40;

/// TrueType faces for the scorecard, loaded once at startup. Either face
/// stands in for the other; with neither the card is drawn without text.
pub struct ScorecardFonts {
    regular: Option<FontVec>,
    bold: Option<FontVec>,
}

impl ScorecardFonts {
    pub fn load(regular_path: &str, bold_path: &str) -> Self {
        let fonts = Self {
            regular: load_font(regular_path),
            bold: load_font(bold_path),
        };
        if fonts.regular.is_none() && fonts.bold.is_none() {
            tracing::warn!("No scorecard font could be loaded; scorecards will have no text");
        }
        fonts
    }

    pub fn none() -> Self {
        Self {
            regular: None,
            bold: None,
        }
    }

    fn regular(&self) -> Option<&FontVec> {
        self.regular.as_ref().or(self.bold.as_ref())
    }

    fn bold(&self) -> Option<&FontVec> {
        self.bold.as_ref().or(self.regular.as_ref())
    }
}

fn load_font(path: &str) -> Option<FontVec> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("Font {} unavailable: {}", path, e);
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            tracing::warn!("Font {} could not be parsed: {}", path, e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scorecard {
    pub topic: String,
    pub difficulty: String,
    pub score: u32,
    pub total: usize,
}

impl Scorecard {
    pub fn from_session(session: &SessionData) -> Self {
        Self {
            topic: session.topic_label().to_string(),
            difficulty: session.difficulty_title().to_string(),
            score: session.score,
            total: session.display_total(),
        }
    }
}

pub fn render_scorecard(
    card: &Scorecard,
    fonts: &ScorecardFonts,
    report: &ReportConfig,
) -> Result<Vec<u8>, image::ImageError> {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    // outlined card: accent shape with the card colour inset by the outline width
    let card_width = WIDTH as i32 - 2 * CARD_MARGIN;
    let card_height = HEIGHT as i32 - 2 * CARD_MARGIN;
    fill_rounded_rect(
        &mut img,
        CARD_MARGIN,
        CARD_MARGIN,
        card_width,
        card_height,
        CARD_RADIUS,
        ACCENT,
    );
    fill_rounded_rect(
        &mut img,
        CARD_MARGIN + OUTLINE_WIDTH,
        CARD_MARGIN + OUTLINE_WIDTH,
        card_width - 2 * OUTLINE_WIDTH,
        card_height - 2 * OUTLINE_WIDTH,
        CARD_RADIUS - OUTLINE_WIDTH,
        CARD,
    );

    if let Some(bold) = fonts.bold() {
        draw_text_mut(
            &mut img,
            TEXT_PRIMARY,
            TEXT_LEFT,
            CARD_MARGIN + 30,
            PxScale::from(60.0),
            bold,
            &report.brand_text,
        );
        draw_text_mut(
            &mut img,
            TEXT_PRIMARY,
            TEXT_LEFT,
            CARD_MARGIN + 130,
            PxScale::from(40.0),
            bold,
            &format!("{} Quiz", shorten_label(&card.topic, 40)),
        );

        let score_text = format!("{} / {}", card.score, card.total);
        let big = PxScale::from(100.0);
        let (text_width, _) = text_size(big, bold, &score_text);
        draw_text_mut(
            &mut img,
            ACCENT,
            (WIDTH as i32 - text_width as i32) / 2,
            CARD_MARGIN + 340,
            big,
            bold,
            &score_text,
        );
    }

    if let Some(regular) = fonts.regular() {
        let label = PxScale::from(36.0);
        draw_text_mut(
            &mut img,
            TEXT_MUTED,
            TEXT_LEFT,
            CARD_MARGIN + 190,
            label,
            regular,
            &format!("Difficulty: {}", card.difficulty),
        );
        draw_text_mut(
            &mut img,
            TEXT_MUTED,
            TEXT_LEFT,
            CARD_MARGIN + 290,
            label,
            regular,
            "Score",
        );
        draw_text_mut(
            &mut img,
            TEXT_PRIMARY,
            TEXT_LEFT,
            HEIGHT as i32 - CARD_MARGIN - 60,
            PxScale::from(30.0),
            regular,
            &report.footer_text,
        );
    }

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn fill_rounded_rect(
    img: &mut RgbImage,
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    radius: i32,
    color: Rgb<u8>,
) {
    if width <= 0 || height <= 0 {
        return;
    }
    let radius = radius.clamp(0, width.min(height) / 2);

    let inner_width = width - 2 * radius;
    let inner_height = height - 2 * radius;
    if inner_width > 0 {
        draw_filled_rect_mut(
            img,
            Rect::at(left + radius, top).of_size(inner_width as u32, height as u32),
            color,
        );
    }
    if inner_height > 0 {
        draw_filled_rect_mut(
            img,
            Rect::at(left, top + radius).of_size(width as u32, inner_height as u32),
            color,
        );
    }
    if radius > 0 {
        let right = left + width - radius - 1;
        let bottom = top + height - radius - 1;
        for center in [
            (left + radius, top + radius),
            (right, top + radius),
            (left + radius, bottom),
            (right, bottom),
        ] {
            draw_filled_circle_mut(img, center, radius, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn decode(bytes: &[u8]) -> RgbImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .unwrap()
            .to_rgb8()
    }

    #[test]
    fn test_placeholder_card_renders_without_fonts() {
        let card = Scorecard::from_session(&SessionData::default());
        assert_eq!(card.topic, "Unknown");
        assert_eq!(card.difficulty, "Unknown");
        assert_eq!(card.total, 0);

        let bytes =
            render_scorecard(&card, &ScorecardFonts::none(), &Config::default().report).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let img = decode(&bytes);
        assert_eq!(img.dimensions(), (WIDTH, HEIGHT));
        assert_eq!(*img.get_pixel(5, 5), BACKGROUND);
        // top edge of the card outline, then the card body
        assert_eq!(*img.get_pixel(600, CARD_MARGIN as u32 + 1), ACCENT);
        assert_eq!(*img.get_pixel(600, 300), CARD);
    }

    #[test]
    fn test_rounded_corners_leave_background_visible() {
        let card = Scorecard::from_session(&SessionData::default());
        let bytes =
            render_scorecard(&card, &ScorecardFonts::none(), &Config::default().report).unwrap();
        let img = decode(&bytes);
        assert_eq!(
            *img.get_pixel(CARD_MARGIN as u32, CARD_MARGIN as u32),
            BACKGROUND
        );
    }

    #[test]
    fn test_missing_font_files_are_tolerated() {
        let fonts = ScorecardFonts::load("/nonexistent/regular.ttf", "/nonexistent/bold.ttf");
        assert!(fonts.regular().is_none());
        assert!(fonts.bold().is_none());
    }

    #[test]
    fn test_total_falls_back_to_requested_count() {
        let session = SessionData {
            num_questions: Some(12),
            score: 3,
            ..Default::default()
        };
        let card = Scorecard::from_session(&session);
        assert_eq!(card.total, 12);
        assert_eq!(card.score, 3);
    }
}
