use std::io::{self, BufRead, Write};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, ClearType},
    tty::IsTty,
};

/// RAII guard that holds the terminal in raw mode. Dropping it restores the
/// cooked state, on panic included. Raw mode lasts only while a line is
/// being read; pipelines always run against a cooked terminal.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// What the read loop should do after a key event has been applied.
#[derive(Debug, PartialEq)]
enum KeyAction {
    /// Buffer or cursor changed; redraw and keep reading.
    Continue,
    /// The line was submitted.
    Submit,
    /// Ctrl-C: discard the line in progress.
    Cancel,
    /// Ctrl-D on an empty buffer.
    EndOfFile,
    /// Nothing to do (release events, unhandled chords).
    Ignored,
}

/// A minimal line editor: cursor movement and kill chords, nothing more.
pub struct LineEditor {
    /// Current line content, stored as `char`s for cursor indexing.
    buffer: Vec<char>,
    /// Cursor position within `buffer` (0 = before the first char).
    cursor: usize,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub fn new() -> Self {
        LineEditor {
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    /// Read one line of input, drawing `prompt` to the left.
    ///
    /// `Ok(Some(line))` is a submitted line (possibly empty), `Ok(None)` is
    /// EOF: Ctrl-D on an empty buffer, or a closed stdin.
    ///
    /// Interactive editing requires a keyboard on the input side; when stdin
    /// is not a tty (piped input, scripted sessions) this falls back to a
    /// plain `read_line`.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !io::stdin().is_tty() {
            return read_line_fallback(prompt);
        }

        self.buffer.clear();
        self.cursor = 0;
        let _guard = RawModeGuard::enter()?;

        // Raw mode disables echo; the prompt is ours to draw.
        print!("{prompt}");
        io::stdout().flush()?;

        loop {
            let ev = match event::read() {
                Ok(ev) => ev,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            let Event::Key(key) = ev else { continue };

            match self.handle_key(key) {
                KeyAction::Ignored => continue,
                KeyAction::Continue => self.redraw(prompt)?,
                KeyAction::Submit => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(Some(self.line()));
                }
                KeyAction::Cancel => {
                    print!("^C\r\n");
                    io::stdout().flush()?;
                    return Ok(Some(String::new()));
                }
                KeyAction::EndOfFile => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(None);
                }
            }
        }
    }

    /// Apply one key event to the buffer and cursor. No terminal I/O
    /// happens here; the caller draws according to the returned action.
    fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind != KeyEventKind::Press {
            return KeyAction::Ignored;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => KeyAction::Submit,
            KeyCode::Char('c') if ctrl => KeyAction::Cancel,
            KeyCode::Char('d') if ctrl => {
                if self.buffer.is_empty() {
                    return KeyAction::EndOfFile;
                }
                if self.cursor < self.buffer.len() {
                    self.buffer.remove(self.cursor);
                }
                KeyAction::Continue
            }
            KeyCode::Char('a') if ctrl => {
                self.cursor = 0;
                KeyAction::Continue
            }
            KeyCode::Char('e') if ctrl => {
                self.cursor = self.buffer.len();
                KeyAction::Continue
            }
            KeyCode::Char('u') if ctrl => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                KeyAction::Continue
            }
            KeyCode::Char('k') if ctrl => {
                self.buffer.truncate(self.cursor);
                KeyAction::Continue
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                }
                KeyAction::Continue
            }
            KeyCode::Delete => {
                if self.cursor < self.buffer.len() {
                    self.buffer.remove(self.cursor);
                }
                KeyAction::Continue
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                KeyAction::Continue
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.buffer.len());
                KeyAction::Continue
            }
            KeyCode::Home => {
                self.cursor = 0;
                KeyAction::Continue
            }
            KeyCode::End => {
                self.cursor = self.buffer.len();
                KeyAction::Continue
            }
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
                KeyAction::Continue
            }
            _ => KeyAction::Ignored,
        }
    }

    fn line(&self) -> String {
        self.buffer.iter().collect()
    }

    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine)
        )?;
        print!("{prompt}{}", self.line());
        let column = (prompt.chars().count() + self.cursor) as u16;
        execute!(stdout, cursor::MoveToColumn(column))?;
        stdout.flush()
    }
}

fn read_line_fallback(prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_chars(editor: &mut LineEditor, text: &str) {
        for c in text.chars() {
            assert_eq!(editor.handle_key(press(KeyCode::Char(c))), KeyAction::Continue);
        }
    }

    #[test]
    fn typing_inserts_at_the_cursor() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "abc");
        assert_eq!(editor.line(), "abc");
        assert_eq!(editor.cursor, 3);
    }

    #[test]
    fn enter_submits() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "ls");
        assert_eq!(editor.handle_key(press(KeyCode::Enter)), KeyAction::Submit);
        assert_eq!(editor.line(), "ls");
    }

    #[test]
    fn backspace_removes_before_the_cursor() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "abc");
        editor.handle_key(press(KeyCode::Backspace));
        assert_eq!(editor.line(), "ab");
        assert_eq!(editor.cursor, 2);
    }

    #[test]
    fn backspace_at_the_start_does_nothing() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "ab");
        editor.handle_key(press(KeyCode::Home));
        editor.handle_key(press(KeyCode::Backspace));
        assert_eq!(editor.line(), "ab");
        assert_eq!(editor.cursor, 0);
    }

    #[test]
    fn delete_removes_at_the_cursor() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "abc");
        editor.handle_key(press(KeyCode::Home));
        editor.handle_key(press(KeyCode::Delete));
        assert_eq!(editor.line(), "bc");
        assert_eq!(editor.cursor, 0);
    }

    #[test]
    fn arrows_move_and_insertion_lands_mid_line() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "ac");
        editor.handle_key(press(KeyCode::Left));
        type_chars(&mut editor, "b");
        assert_eq!(editor.line(), "abc");
        assert_eq!(editor.cursor, 2);
    }

    #[test]
    fn cursor_stays_inside_the_buffer() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "a");
        editor.handle_key(press(KeyCode::Right));
        editor.handle_key(press(KeyCode::Right));
        assert_eq!(editor.cursor, 1);

        editor.handle_key(press(KeyCode::Left));
        editor.handle_key(press(KeyCode::Left));
        assert_eq!(editor.cursor, 0);
    }

    #[test]
    fn ctrl_a_and_ctrl_e_jump_to_the_ends() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "abcd");
        editor.handle_key(ctrl('a'));
        assert_eq!(editor.cursor, 0);
        editor.handle_key(ctrl('e'));
        assert_eq!(editor.cursor, 4);
    }

    #[test]
    fn ctrl_u_kills_to_the_start() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "abcd");
        editor.handle_key(press(KeyCode::Left));
        editor.handle_key(ctrl('u'));
        assert_eq!(editor.line(), "d");
        assert_eq!(editor.cursor, 0);
    }

    #[test]
    fn ctrl_k_kills_to_the_end() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "abcd");
        editor.handle_key(press(KeyCode::Left));
        editor.handle_key(press(KeyCode::Left));
        editor.handle_key(ctrl('k'));
        assert_eq!(editor.line(), "ab");
        assert_eq!(editor.cursor, 2);
    }

    #[test]
    fn ctrl_c_cancels_the_line() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "half a comm");
        assert_eq!(editor.handle_key(ctrl('c')), KeyAction::Cancel);
    }

    #[test]
    fn ctrl_d_on_an_empty_buffer_is_eof() {
        let mut editor = LineEditor::new();
        assert_eq!(editor.handle_key(ctrl('d')), KeyAction::EndOfFile);
    }

    #[test]
    fn ctrl_d_with_content_deletes_at_the_cursor() {
        let mut editor = LineEditor::new();
        type_chars(&mut editor, "abc");
        editor.handle_key(press(KeyCode::Home));
        assert_eq!(editor.handle_key(ctrl('d')), KeyAction::Continue);
        assert_eq!(editor.line(), "bc");
    }

    #[test]
    fn release_events_are_ignored() {
        let mut editor = LineEditor::new();
        let release = KeyEvent::new_with_kind(
            KeyCode::Char('x'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        );
        assert_eq!(editor.handle_key(release), KeyAction::Ignored);
        assert_eq!(editor.line(), "");
    }

    #[test]
    fn alt_chords_are_ignored() {
        let mut editor = LineEditor::new();
        let alt_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(editor.handle_key(alt_x), KeyAction::Ignored);
        assert_eq!(editor.line(), "");
    }

    #[test]
    fn shifted_characters_are_typed() {
        let mut editor = LineEditor::new();
        let shift_a = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(editor.handle_key(shift_a), KeyAction::Continue);
        assert_eq!(editor.line(), "A");
    }
}
