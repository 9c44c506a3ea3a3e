//! PDF output with fixed x/y text placement.
//!
//! Layout coordinates run top-down from the top edge of an A4 page, in PDF
//! points. The cursor moves down as lines are added; text that would start
//! below the page-break line goes to a fresh page instead. Pages are only
//! opened when something is placed on them. Serialization goes through
//! printpdf: Latin text uses the built-in Helvetica faces, and a TrueType
//! font file can be embedded for other scripts.

use anyhow::{anyhow, Context};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocumentReference};
use std::path::{Path, PathBuf};

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN_LEFT: f32 = 40.0;
pub const MARGIN_TOP: f32 = 50.0;
pub const DEFAULT_PAGE_BREAK_Y: f32 = 750.0;

const BODY_SIZE: f32 = 10.0;
const LINE_HEIGHT: f32 = 15.0;
const VALUE_X: f32 = 210.0;
const LAYER: &str = "Layer 1";

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct PdfDocument {
    title: String,
    pages: Vec<Vec<TextItem>>,
    cursor_y: f32,
    page_break_y: f32,
    font_file: Option<PathBuf>,
}

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

impl PdfDocument {
    pub fn new(page_break_y: f32) -> Self {
        PdfDocument {
            title: String::new(),
            pages: vec![Vec::new()],
            cursor_y: MARGIN_TOP,
            page_break_y,
            font_file: None,
        }
    }

    /// Embeds `path` (TrueType/OpenType) for all text instead of Helvetica.
    pub fn with_font_file(mut self, path: Option<PathBuf>) -> Self {
        self.font_file = path;
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[cfg(test)]
    pub fn pages(&self) -> &[Vec<TextItem>] {
        &self.pages
    }

    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor_y = MARGIN_TOP;
    }

    /// True once the cursor has passed the page-break line; the next placed
    /// text opens a new page.
    pub fn at_break(&self) -> bool {
        self.cursor_y > self.page_break_y
    }

    fn ensure_room(&mut self) {
        if self.at_break() {
            self.new_page();
        }
    }

    /// Places text on the current page without moving the cursor.
    pub fn text_at(&mut self, x: f32, y: f32, size: f32, bold: bool, text: &str) {
        if let Some(page) = self.pages.last_mut() {
            page.push(TextItem {
                x,
                y,
                size,
                bold,
                text: text.to_string(),
            });
        }
    }

    pub fn advance(&mut self, dy: f32) {
        self.cursor_y += dy;
    }

    pub fn heading(&mut self, text: &str) {
        if self.title.is_empty() {
            self.title = text.to_string();
        }
        self.ensure_room();
        let y = self.cursor_y;
        self.text_at(MARGIN_LEFT, y, 16.0, true, text);
        self.advance(26.0);
    }

    pub fn section(&mut self, text: &str) {
        self.advance(6.0);
        self.ensure_room();
        let y = self.cursor_y;
        self.text_at(MARGIN_LEFT, y, 12.0, true, text);
        self.advance(LINE_HEIGHT + 3.0);
    }

    pub fn line(&mut self, text: &str) {
        for chunk in wrap(text, chars_per_line(MARGIN_LEFT, BODY_SIZE)) {
            self.ensure_room();
            let y = self.cursor_y;
            self.text_at(MARGIN_LEFT, y, BODY_SIZE, false, &chunk);
            self.advance(LINE_HEIGHT);
        }
    }

    /// `label: value` with the value wrapped in its own column.
    pub fn field(&mut self, label: &str, value: &str) {
        let value = if value.trim().is_empty() { "N/A" } else { value };
        let chunks = wrap(value, chars_per_line(VALUE_X, BODY_SIZE));
        for (i, chunk) in chunks.iter().enumerate() {
            self.ensure_room();
            let y = self.cursor_y;
            if i == 0 {
                self.text_at(MARGIN_LEFT, y, BODY_SIZE, true, label);
            }
            self.text_at(VALUE_X, y, BODY_SIZE, false, chunk);
            self.advance(LINE_HEIGHT);
        }
    }

    /// One table row; cells are placed at their fixed x and clipped to the
    /// next column.
    pub fn row(&mut self, cells: &[(f32, &str)], bold: bool) {
        self.ensure_room();
        let y = self.cursor_y;
        for (i, (x, text)) in cells.iter().enumerate() {
            let right = cells
                .get(i + 1)
                .map(|(nx, _)| *nx)
                .unwrap_or(PAGE_WIDTH - MARGIN_LEFT);
            let max = (((right - x) / (BODY_SIZE * 0.5)) as usize).saturating_sub(1).max(1);
            let clipped: String = text.chars().take(max).collect();
            self.text_at(*x, y, BODY_SIZE, bold, &clipped);
        }
        self.advance(LINE_HEIGHT);
    }

    fn fonts(
        &self,
        doc: &PdfDocumentReference,
    ) -> anyhow::Result<(IndirectFontRef, IndirectFontRef)> {
        match &self.font_file {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read font {}", path.display()))?;
                let font = doc
                    .add_external_font(bytes.as_slice())
                    .map_err(|e| anyhow!("font {} is not usable: {}", path.display(), e))?;
                Ok((font.clone(), font))
            }
            None => {
                let regular = doc
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|e| anyhow!("failed to add Helvetica: {}", e))?;
                let bold = doc
                    .add_builtin_font(BuiltinFont::HelveticaBold)
                    .map_err(|e| anyhow!("failed to add Helvetica-Bold: {}", e))?;
                Ok((regular, bold))
            }
        }
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let (doc, first_page, first_layer) = printpdf::PdfDocument::new(
            self.title.clone(),
            mm(PAGE_WIDTH),
            mm(PAGE_HEIGHT),
            LAYER,
        );
        let (regular, bold) = self.fonts(&doc)?;

        for (i, items) in self.pages.iter().enumerate() {
            let (page, layer) = if i == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), LAYER)
            };
            let layer = doc.get_page(page).get_layer(layer);
            for item in items {
                let font = if item.bold { &bold } else { &regular };
                layer.use_text(
                    item.text.as_str(),
                    item.size,
                    mm(item.x),
                    mm(PAGE_HEIGHT - item.y),
                    font,
                );
            }
        }

        doc.save_to_bytes()
            .map_err(|e| anyhow!("failed to serialize pdf: {}", e))
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write pdf {}", path.display()))
    }
}

fn chars_per_line(x: f32, size: f32) -> usize {
    (((PAGE_WIDTH - MARGIN_LEFT - x) / (size * 0.5)) as usize).max(10)
}

/// Greedy word wrap on character count. Words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for para in text.lines() {
        let mut current = String::new();
        for word in para.split_whitespace() {
            let mut word: String = word.to_string();
            while word.chars().count() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(width).collect();
                word = word.chars().skip(width).collect();
                lines.push(head);
            }
            let needed = current.chars().count()
                + word.chars().count()
                + usize::from(!current.is_empty());
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
