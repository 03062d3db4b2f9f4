use crate::alu::Nibble;
use std::io;
use std::time::Duration;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::text::{Span, Spans};
use tui::widgets::{Block, Borders, Paragraph};
use tui::Terminal;

/// panel geometry: a 2x16 character module
pub const PANEL_ROWS: usize = 2;
pub const PANEL_COLS: usize = 16;

/// command byte layout, HD44780 style: row 1 starts at DDRAM 0x40
pub const CMD_CLEAR: u8 = 0x01;
pub const CMD_SET_CURSOR: u8 = 0x80;
const ROW_STRIDE: u8 = 0x40;

/// hex character for one nibble: 0-9 map to '0'..'9', 10-15 to 'A'..'F'
pub fn hex_char(d: Nibble) -> u8 {
    match d.value() {
        v @ 0..=9 => b'0' + v,
        v => b'A' + (v - 10),
    }
}

/// Panel is the character display the firmware renders into. Implementations
/// own their settle timing: after write_command or write_data returns, the
/// next call is valid.
pub trait Panel {
    /// raw command strobe (clear, cursor positioning)
    fn write_command(&mut self, byte: u8) -> Result<(), io::Error>;

    /// put one character at the cursor and advance it
    fn write_data(&mut self, byte: u8) -> Result<(), io::Error>;

    /// render up to four nibbles as hex characters at (row, col)
    fn render_digits(&mut self, digits: &[Nibble], row: u8, col: u8) -> Result<(), io::Error> {
        assert!(
            digits.len() <= 4,
            "render_digits takes at most four nibbles"
        );
        assert!(
            (row as usize) < PANEL_ROWS && col as usize + digits.len() <= PANEL_COLS,
            "digits must fit on the panel"
        );
        self.write_command(CMD_SET_CURSOR | (row * ROW_STRIDE + col))?;
        for d in digits {
            self.write_data(hex_char(*d))?;
        }
        Ok(())
    }
}

/// character cells plus cursor, shared by the real and dummy panels
struct Ddram {
    cells: [[u8; PANEL_COLS]; PANEL_ROWS],
    row: usize,
    col: usize,
}

impl Ddram {
    fn new() -> Self {
        Ddram {
            cells: [[b' '; PANEL_COLS]; PANEL_ROWS],
            row: 0,
            col: 0,
        }
    }

    fn clear(&mut self) {
        self.cells = [[b' '; PANEL_COLS]; PANEL_ROWS];
        self.row = 0;
        self.col = 0;
    }

    /// interpret a command byte; unknown commands are settle-only no-ops
    fn command(&mut self, byte: u8) {
        if byte == CMD_CLEAR {
            self.clear();
        } else if byte & CMD_SET_CURSOR != 0 {
            let addr = byte & !CMD_SET_CURSOR;
            self.row = (addr / ROW_STRIDE) as usize;
            self.col = (addr % ROW_STRIDE) as usize;
        }
    }

    fn write(&mut self, byte: u8) {
        // writes past the visible window land in unmapped DDRAM
        if self.row < PANEL_ROWS && self.col < PANEL_COLS {
            self.cells[self.row][self.col] = byte;
        }
        self.col += 1;
    }

    fn line(&self, row: usize) -> String {
        String::from_utf8_lossy(&self.cells[row]).into_owned()
    }
}

/// settle time after each command or data strobe
const TERM_PANEL_SETTLE: Duration = Duration::from_micros(40);

/// character panel in a terminal, rendered using TUI over crossterm
pub struct TermPanel {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    ddram: Ddram,
}

impl TermPanel {
    pub fn new() -> Result<TermPanel, io::Error> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(TermPanel {
            terminal,
            ddram: Ddram::new(),
        })
    }

    fn redraw(&mut self) -> Result<(), io::Error> {
        let lines = vec![
            Spans::from(Span::raw(self.ddram.line(0))),
            Spans::from(Span::raw(self.ddram.line(1))),
        ];
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + PANEL_COLS as u16, 2 + PANEL_ROWS as u16);
            let widget = Paragraph::new(lines).block(
                Block::default()
                    .title("TALLY-16")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Green).bg(Color::Black)),
            );
            f.render_widget(widget, size);
        })?;
        Ok(())
    }
}

impl Panel for TermPanel {
    fn write_command(&mut self, byte: u8) -> Result<(), io::Error> {
        self.ddram.command(byte);
        if byte == CMD_CLEAR {
            self.redraw()?;
        }
        spin_sleep::sleep(TERM_PANEL_SETTLE);
        Ok(())
    }

    fn write_data(&mut self, byte: u8) -> Result<(), io::Error> {
        self.ddram.write(byte);
        self.redraw()?;
        spin_sleep::sleep(TERM_PANEL_SETTLE);
        Ok(())
    }
}

/// dummy Panel implementation for testing: records every strobe and keeps
/// the character cells inspectable
pub struct DummyPanel {
    pub commands: Vec<u8>,
    pub data: Vec<u8>,
    ddram: Ddram,
}

impl DummyPanel {
    pub fn new() -> Self {
        DummyPanel {
            commands: Vec::new(),
            data: Vec::new(),
            ddram: Ddram::new(),
        }
    }

    /// visible text of one row
    pub fn row_text(&self, row: usize) -> String {
        self.ddram.line(row)
    }
}

impl Default for DummyPanel {
    fn default() -> Self {
        DummyPanel::new()
    }
}

impl Panel for DummyPanel {
    fn write_command(&mut self, byte: u8) -> Result<(), io::Error> {
        self.commands.push(byte);
        self.ddram.command(byte);
        Ok(())
    }

    fn write_data(&mut self, byte: u8) -> Result<(), io::Error> {
        self.data.push(byte);
        self.ddram.write(byte);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_char_mapping() {
        let expect = b"0123456789ABCDEF";
        for v in 0..=15u8 {
            assert_eq!(hex_char(Nibble::new(v)), expect[v as usize]);
        }
    }

    #[test]
    fn test_render_digits_strobes() -> Result<(), io::Error> {
        let mut p = DummyPanel::new();
        let digits = [
            Nibble::new(1),
            Nibble::new(2),
            Nibble::new(10),
            Nibble::new(15),
        ];
        p.render_digits(&digits, 0, 0)?;
        assert_eq!(p.commands, vec![CMD_SET_CURSOR]);
        assert_eq!(p.data, b"12AF".to_vec());
        assert_eq!(p.row_text(0), "12AF            ");
        Ok(())
    }

    #[test]
    fn test_render_digits_row_one_addressing() -> Result<(), io::Error> {
        let mut p = DummyPanel::new();
        p.render_digits(&[Nibble::ONE], 1, 4)?;
        assert_eq!(p.commands, vec![CMD_SET_CURSOR | (ROW_STRIDE + 4)]);
        assert_eq!(p.row_text(1), "    1           ");
        Ok(())
    }

    #[test]
    #[should_panic]
    fn test_render_digits_rejects_more_than_four() {
        let mut p = DummyPanel::new();
        let _ = p.render_digits(&[Nibble::ZERO; 5], 0, 0);
    }

    #[test]
    fn test_clear_resets_cells_and_cursor() -> Result<(), io::Error> {
        let mut p = DummyPanel::new();
        p.render_digits(&[Nibble::MAX], 1, 7)?;
        p.write_command(CMD_CLEAR)?;
        assert_eq!(p.row_text(0), " ".repeat(PANEL_COLS));
        assert_eq!(p.row_text(1), " ".repeat(PANEL_COLS));
        p.write_data(b'X')?;
        assert_eq!(p.row_text(0), "X               ");
        Ok(())
    }
}
