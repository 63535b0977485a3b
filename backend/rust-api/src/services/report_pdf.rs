use printpdf::{
    BuiltinFont, Color, CurTransMat, FontId, Greyscale, Mm, Op, ParsedFont, PdfDocument, PdfPage,
    PdfSaveOptions, Point, Pt, Rgb, TextItem,
};
use std::rc::Rc;

use crate::models::{Question, SessionData};
use crate::utils::text::wrap_to_width;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_LEFT_MM: f32 = 20.0;
const MARGIN_TOP_MM: f32 = 277.0;
const MARGIN_BOTTOM_MM: f32 = 20.0;
const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_LEFT_MM;
const PT_TO_MM: f32 = 25.4 / 72.0;

const WATERMARK_FONT_SIZE: f32 = 60.0;

/// Helvetica advance widths (1/1000 em) for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica-Bold advance widths (1/1000 em) for U+0020..=U+007E.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// ASCII stand-ins for U+00C0..=U+00FF when no TrueType face is available.
const LATIN1_FALLBACK: &[u8; 64] =
    b"AAAAAAACEEEEIIIIDNOOOOOxOUUUUYTsaaaaaaaceeeeiiiidnooooo/ouuuuyty";

/// TrueType faces embedded in the results PDF. The files are read once at
/// startup and parsed per render, since a parsed face cannot cross threads.
pub struct PdfFonts {
    regular: Option<Vec<u8>>,
    bold: Option<Vec<u8>>,
}

impl PdfFonts {
    pub fn load(regular_path: &str, bold_path: &str) -> Self {
        let fonts = Self {
            regular: read_font(regular_path),
            bold: read_font(bold_path),
        };
        if fonts.regular.is_none() && fonts.bold.is_none() {
            tracing::warn!(
                "No PDF font could be loaded; reports fall back to Helvetica with ASCII text"
            );
        }
        fonts
    }

    pub fn none() -> Self {
        Self {
            regular: None,
            bold: None,
        }
    }
}

fn read_font(path: &str) -> Option<Vec<u8>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("Font {} unavailable: {}", path, e);
            return None;
        }
    };
    let mut warnings = Vec::new();
    if ParsedFont::from_bytes(&bytes, 0, &mut warnings).is_none() {
        tracing::warn!("Font {} could not be parsed for PDF embedding", path);
        return None;
    }
    Some(bytes)
}

/// A face text is written with: an embedded TrueType font, or a builtin
/// Type1 font limited to ASCII.
#[derive(Clone)]
enum Face {
    Embedded { id: FontId, font: Rc<ParsedFont> },
    Builtin(BuiltinFont),
}

impl Face {
    /// Text as it will be written. Builtin faces only get ASCII.
    fn prepare(&self, text: &str) -> String {
        match self {
            Face::Embedded { .. } => text.to_string(),
            Face::Builtin(_) => ascii_fallback(text),
        }
    }

    fn text_width_mm(&self, text: &str, size: f32) -> f32 {
        let em = match self {
            Face::Embedded { font, .. } => {
                let units_per_em = f32::from(font.font_metrics.units_per_em.max(1));
                text.chars().map(|c| embedded_advance(font, c)).sum::<f32>() / units_per_em
            }
            Face::Builtin(builtin) => {
                let widths = if *builtin == BuiltinFont::HelveticaBold {
                    &HELVETICA_BOLD_WIDTHS
                } else {
                    &HELVETICA_WIDTHS
                };
                text.chars()
                    .map(|c| {
                        let idx = (c as usize).wrapping_sub(0x20);
                        f32::from(widths.get(idx).copied().unwrap_or(1000))
                    })
                    .sum::<f32>()
                    / 1000.0
            }
        };
        em * size * PT_TO_MM
    }
}

fn embedded_advance(font: &ParsedFont, c: char) -> f32 {
    let units_per_em = f32::from(font.font_metrics.units_per_em.max(1));
    let advance = font
        .lookup_glyph_index(c as u32)
        .map(|gid| font.get_horizontal_advance(gid))
        .unwrap_or(0);
    if advance > 0 {
        f32::from(advance)
    } else if c == ' ' {
        font.get_space_width()
            .map(|w| w as f32)
            .unwrap_or(units_per_em / 3.0)
    } else {
        units_per_em
    }
}

fn ascii_fallback(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\u{a0}' => out.push(' '),
            '\u{c0}'..='\u{ff}' => out.push(char::from(LATIN1_FALLBACK[c as usize - 0xc0])),
            '‘' | '’' | '‚' | '′' => out.push('\''),
            '“' | '”' | '„' | '″' => out.push('"'),
            '‐' | '–' | '—' | '−' => out.push('-'),
            '…' => out.push_str("..."),
            _ => out.push('?'),
        }
    }
    out
}

struct Faces {
    regular: Face,
    bold: Face,
}

impl Faces {
    fn builtin() -> Self {
        Self {
            regular: Face::Builtin(BuiltinFont::Helvetica),
            bold: Face::Builtin(BuiltinFont::HelveticaBold),
        }
    }

    /// Adds the available TrueType faces to the document. Either face stands
    /// in for the other; with neither, the builtin Helvetica pair is used.
    fn register(fonts: &PdfFonts, document: &mut PdfDocument) -> Self {
        let mut embed = |bytes: Option<&[u8]>| -> Option<Face> {
            let mut warnings = Vec::new();
            let font = ParsedFont::from_bytes(bytes?, 0, &mut warnings)?;
            let id = document.add_font(&font);
            Some(Face::Embedded {
                id,
                font: Rc::new(font),
            })
        };
        let regular = embed(fonts.regular.as_deref());
        let bold = embed(fonts.bold.as_deref());

        match (regular, bold) {
            (Some(regular), Some(bold)) => Self { regular, bold },
            (Some(face), None) | (None, Some(face)) => Self {
                regular: face.clone(),
                bold: face,
            },
            (None, None) => Self::builtin(),
        }
    }

    fn get(&self, bold: bool) -> &Face {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }
}

/// Read-only view of the session data that goes into the results PDF.
#[derive(Debug, Clone)]
pub struct QuizReport<'a> {
    pub topic: &'a str,
    pub difficulty: &'a str,
    pub score: u32,
    pub quiz: &'a [Question],
    pub user_answers: &'a [String],
}

impl<'a> QuizReport<'a> {
    pub fn from_session(session: &'a SessionData) -> Self {
        Self {
            topic: session.topic_label(),
            difficulty: session.difficulty_label(),
            score: session.score,
            quiz: &session.quiz,
            user_answers: &session.user_answers,
        }
    }
}

/// Text style: weight, size in points and vertical advance in millimetres.
#[derive(Clone, Copy)]
struct Style {
    bold: bool,
    size: f32,
    advance: f32,
}

const TITLE: Style = Style {
    bold: true,
    size: 20.0,
    advance: 10.0,
};
const HEADING: Style = Style {
    bold: true,
    size: 12.0,
    advance: 6.0,
};
const NORMAL: Style = Style {
    bold: false,
    size: 10.0,
    advance: 5.0,
};

/// Flows lines top to bottom, starting a new page (with its own watermark)
/// whenever the bottom margin is reached.
struct PageWriter<'w> {
    watermark: &'w str,
    faces: &'w Faces,
    pages: Vec<Vec<Op>>,
    ops: Vec<Op>,
    y: f32,
    text_color: Color,
    accent_color: Color,
}

impl<'w> PageWriter<'w> {
    fn new(watermark: &'w str, faces: &'w Faces) -> Self {
        let mut writer = Self {
            watermark,
            faces,
            pages: Vec::new(),
            ops: Vec::new(),
            y: MARGIN_TOP_MM,
            text_color: Color::Greyscale(Greyscale::new(0.08, None)),
            accent_color: Color::Rgb(Rgb {
                r: 0.16,
                g: 0.4,
                b: 0.69,
                icc_profile: None,
            }),
        };
        push_watermark(&mut writer.ops, &faces.regular, watermark);
        writer
    }

    fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.ops);
        self.pages.push(finished);
        push_watermark(&mut self.ops, &self.faces.regular, self.watermark);
        self.y = MARGIN_TOP_MM;
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN_BOTTOM_MM {
            self.new_page();
        }
    }

    fn paragraph(&mut self, text: &str, style: Style, accent: bool) {
        let color = if accent {
            self.accent_color.clone()
        } else {
            self.text_color.clone()
        };
        let faces = self.faces;
        let face = faces.get(style.bold);
        let text = face.prepare(text);
        let lines = wrap_to_width(&text, CONTENT_WIDTH_MM, |line| {
            face.text_width_mm(line, style.size)
        });
        for line in lines {
            self.ensure_room(style.advance);
            self.y -= style.advance;
            push_pdf_text(
                &mut self.ops,
                Point::new(Mm(MARGIN_LEFT_MM), Mm(self.y)),
                face,
                style.size,
                style.size * 1.2,
                line,
                &color,
            );
        }
    }

    fn spacer(&mut self, height: f32) {
        self.y -= height;
    }

    fn finish(mut self) -> Vec<Vec<Op>> {
        self.pages.push(self.ops);
        self.pages
    }
}

/// Lays out the report as one op list per A4 page.
fn layout_pages(report: &QuizReport<'_>, watermark: &str, faces: &Faces) -> Vec<Vec<Op>> {
    let mut writer = PageWriter::new(watermark, faces);

    writer.paragraph("Quiz Results", TITLE, true);
    writer.spacer(4.0);
    writer.paragraph(&format!("Topic: {}", report.topic), NORMAL, false);
    writer.paragraph(&format!("Difficulty: {}", report.difficulty), NORMAL, false);
    writer.paragraph(
        &format!("Score: {}/{}", report.score, report.quiz.len()),
        NORMAL,
        false,
    );
    writer.spacer(8.0);

    for (idx, question) in report.quiz.iter().enumerate() {
        // keep a question heading together with at least its first option
        writer.ensure_room(HEADING.advance + NORMAL.advance);
        writer.paragraph(
            &format!("Q{}. {}", idx + 1, question.question),
            HEADING,
            false,
        );
        for option in &question.options {
            writer.paragraph(option, NORMAL, false);
        }
        let answer = report
            .user_answers
            .get(idx)
            .map(String::as_str)
            .filter(|a| !a.is_empty())
            .unwrap_or("Not answered");
        writer.paragraph(&format!("Your Answer: {}", answer), NORMAL, true);
        writer.spacer(4.0);
    }

    writer.finish()
}

pub fn render_pdf(report: &QuizReport<'_>, watermark: &str, fonts: &PdfFonts) -> Vec<u8> {
    let mut document = PdfDocument::new("Quiz Results");
    let faces = Faces::register(fonts, &mut document);
    let pages = layout_pages(report, watermark, &faces)
        .into_iter()
        .map(|ops| PdfPage::new(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), ops))
        .collect();

    let mut warnings = Vec::new();
    let bytes = document
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        tracing::debug!("PDF rendered with {} warnings", warnings.len());
    }
    bytes
}

/// Light grey text rotated 45° about the page centre.
fn push_watermark(ops: &mut Vec<Op>, face: &Face, text: &str) {
    if text.is_empty() {
        return;
    }
    let text = face.prepare(text);
    let (sin, cos) = std::f32::consts::FRAC_PI_4.sin_cos();
    let center_x = PAGE_WIDTH_MM / 2.0 / PT_TO_MM;
    let center_y = PAGE_HEIGHT_MM / 2.0 / PT_TO_MM;
    let text_width_mm = face.text_width_mm(&text, WATERMARK_FONT_SIZE);

    ops.push(Op::SaveGraphicsState);
    ops.push(Op::SetTransformationMatrix {
        matrix: CurTransMat::Raw([cos, sin, -sin, cos, center_x, center_y]),
    });
    push_pdf_text(
        ops,
        Point::new(Mm(-text_width_mm / 2.0), Mm(0.0)),
        face,
        WATERMARK_FONT_SIZE,
        WATERMARK_FONT_SIZE,
        text,
        &Color::Greyscale(Greyscale::new(0.8, None)),
    );
    ops.push(Op::RestoreGraphicsState);
}

fn push_pdf_text(
    ops: &mut Vec<Op>,
    pos: Point,
    face: &Face,
    font_size: f32,
    line_height: f32,
    text: String,
    color: &Color,
) {
    let items = vec![TextItem::Text(text)];
    let (set_font, write) = match face {
        Face::Embedded { id, .. } => (
            Op::SetFontSize {
                size: Pt(font_size),
                font: id.clone(),
            },
            Op::WriteText {
                items,
                font: id.clone(),
            },
        ),
        Face::Builtin(font) => (
            Op::SetFontSizeBuiltinFont {
                size: Pt(font_size),
                font: *font,
            },
            Op::WriteTextBuiltinFont { items, font: *font },
        ),
    };
    ops.extend([
        Op::StartTextSection,
        Op::SetTextCursor { pos },
        set_font,
        Op::SetLineHeight {
            lh: Pt(line_height),
        },
        Op::SetFillColor { col: color.clone() },
        write,
        Op::EndTextSection,
    ]);
}
