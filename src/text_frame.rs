/// A `cols x rows` glyph matrix without color, as written by the text exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFrame {
    cols: usize,
    rows: usize,
    glyphs: Vec<char>,
}

impl TextFrame {
    pub fn blank(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            glyphs: vec![' '; cols * rows],
        }
    }

    /// Row-major glyphs; missing trailing cells are padded with spaces.
    pub fn from_glyphs<I>(glyphs: I, cols: usize, rows: usize) -> Self
    where
        I: IntoIterator<Item = char>,
    {
        let mut frame = Self::blank(cols, rows);
        for (slot, glyph) in frame.glyphs.iter_mut().zip(glyphs) {
            *slot = glyph;
        }
        frame
    }

    /// Parses exported text back into a frame. Line endings are normalized,
    /// short lines padded and long lines truncated to `cols`.
    pub fn from_text(text: &str, cols: usize, rows: usize) -> Self {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let mut frame = Self::blank(cols, rows);
        for (row, line) in normalized.lines().take(rows).enumerate() {
            for (col, glyph) in line.chars().take(cols).enumerate() {
                frame.glyphs[row * cols + col] = glyph;
            }
        }
        frame
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn glyph(&self, col: usize, row: usize) -> Option<char> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.glyphs.get(row * self.cols + col).copied()
    }

    pub fn glyphs(&self) -> &[char] {
        &self.glyphs
    }

    pub fn lines(&self) -> Vec<String> {
        if self.cols == 0 {
            return vec![String::new(); self.rows];
        }
        self.glyphs
            .chunks(self.cols)
            .map(|row| row.iter().collect())
            .collect()
    }

    /// One `\n`-terminated line per row.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity((self.cols + 1) * self.rows);
        for line in self.lines() {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }
}
