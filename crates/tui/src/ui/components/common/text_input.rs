//! UTF-8 safe text buffer with a byte cursor.
//!
//! Shared by the palette search line, the free-form AI task prompt and the
//! text fields of wizard forms. Long-text fields insert newlines; everything
//! else treats the buffer as a single line.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextInputState {
    input: String,
    /// Byte index into `input`, always on a char boundary.
    cursor: usize,
}

impl TextInputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding `text` with the cursor at the end.
    pub fn with_text(text: impl Into<String>) -> Self {
        let input = text.into();
        let cursor = input.len();
        Self { input, cursor }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    pub fn move_left(&mut self) {
        if let Some(previous) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= previous.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.input[self.cursor..].chars().next() {
            self.cursor += next.len_utf8();
        }
    }

    /// Start of the current line.
    pub fn move_home(&mut self) {
        self.cursor = self.input[..self.cursor].rfind('\n').map_or(0, |newline| newline + 1);
    }

    /// End of the current line.
    pub fn move_end(&mut self) {
        self.cursor = self.input[self.cursor..]
            .find('\n')
            .map_or(self.input.len(), |offset| self.cursor + offset);
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some(previous) = self.input[..self.cursor].chars().next_back() {
            let start = self.cursor - previous.len_utf8();
            self.input.drain(start..self.cursor);
            self.cursor = start;
        }
    }

    /// Delete the char under the cursor.
    pub fn delete(&mut self) {
        if let Some(next) = self.input[self.cursor..].chars().next() {
            let end = self.cursor + next.len_utf8();
            self.input.drain(self.cursor..end);
        }
    }

    /// Delete back to the previous word boundary (Ctrl+W).
    pub fn delete_word(&mut self) {
        let before = &self.input[..self.cursor];
        let trimmed = before.trim_end();
        let start = trimmed.rfind(char::is_whitespace).map_or(0, |index| index + 1);
        self.input.drain(start..self.cursor);
        self.cursor = start;
    }

    /// Line and display column of the cursor, for placing the terminal cursor.
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = &self.input[..self.cursor];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map_or(0, |newline| newline + 1);
        let column = unicode_width::UnicodeWidthStr::width(&before[line_start..]);
        (line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_respects_char_boundaries() {
        let mut input = TextInputState::with_text("h🙂llo");
        input.move_home();
        input.move_right();
        input.insert_char('e');
        assert_eq!(input.input(), "he🙂llo");
        input.move_right();
        input.backspace();
        assert_eq!(input.input(), "hello");
        input.move_left();
        input.delete();
        assert_eq!(input.input(), "hllo");
    }

    #[test]
    fn home_and_end_stay_on_the_current_line() {
        let mut input = TextInputState::with_text("first\nsecond");
        input.move_home();
        assert_eq!(input.cursor_position(), (1, 0));
        input.move_left();
        input.move_home();
        assert_eq!(input.cursor_position(), (0, 0));
        input.move_end();
        assert_eq!(input.cursor_position(), (0, 5));
    }

    #[test]
    fn delete_word_removes_the_previous_word() {
        let mut input = TextInputState::with_text("review my code  ");
        input.delete_word();
        assert_eq!(input.input(), "review my ");
        input.delete_word();
        assert_eq!(input.input(), "review ");
    }
}
