use crossterm::event::{poll, read, Event, KeyCode};
use crossterm::terminal;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// the four button lines are active-low: a pressed button pulls its bit to 0
pub const NO_BUTTON: u8 = 0b1111;

/// countdown reload for each of the three nested debounce levels, so a press
/// is confirmed only after 15 * 15 * 15 consecutive released samples
const DEBOUNCE_RELOAD: u32 = 15;

/// the four momentary buttons and the line each one pulls low
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    /// the raw mask observed while exactly this button is held
    pub fn mask(self) -> u8 {
        match self {
            Button::Up => 0b1110,
            Button::Down => 0b1101,
            Button::Left => 0b1011,
            Button::Right => 0b0111,
        }
    }

    /// recognise a single-button mask; chords and the released state map to
    /// no button
    pub fn from_mask(raw: u8) -> Option<Button> {
        match raw {
            0b1110 => Some(Button::Up),
            0b1101 => Some(Button::Down),
            0b1011 => Some(Button::Left),
            0b0111 => Some(Button::Right),
            _ => None,
        }
    }
}

/// samples the raw button lines; no debouncing happens at this seam
pub trait ButtonLines {
    /// read the 4-bit line state right now, active-low, undebounced
    fn read_raw(&mut self) -> Result<u8, io::Error>;
}

/// Debounces a 4-line momentary button input. A detected press blocks until
/// the lines read all-released for the full settle period; the caller gets
/// the mask that was originally observed, not the released state.
pub struct Debouncer<'a> {
    lines: &'a mut dyn ButtonLines,
}

impl<'a> Debouncer<'a> {
    pub fn new(lines: &'a mut dyn ButtonLines) -> Self {
        Debouncer { lines }
    }

    /// immediate sample; returns NO_BUTTON at once if nothing is pressed,
    /// otherwise blocks until release has been stable for the settle period
    pub fn poll(&mut self) -> Result<u8, io::Error> {
        let raw = self.lines.read_raw()?;
        if raw == NO_BUTTON {
            return Ok(NO_BUTTON);
        }
        let pressed = raw;

        // three nested countdowns; any sample that is not all-released
        // reloads every level and the settle starts over
        'settle: loop {
            for _ in 0..DEBOUNCE_RELOAD {
                for _ in 0..DEBOUNCE_RELOAD {
                    for _ in 0..DEBOUNCE_RELOAD {
                        if self.lines.read_raw()? != NO_BUTTON {
                            continue 'settle;
                        }
                    }
                }
            }
            return Ok(pressed);
        }
    }
}

/// how long one raw sample takes on the terminal implementation, so the
/// 15^3-sample settle spans real bounce timescales
const TERM_SAMPLE_SETTLE: Duration = Duration::from_micros(50);

/// how many consecutive samples a key event registers as "held", since
/// terminals deliver presses but no release events
const TERM_HOLD_SAMPLES: u8 = 8;

/// simple implementation of ButtonLines on a terminal keyboard, mapping the
/// arrow keys to the four lines
pub struct TermButtons {
    held: Option<(u8, u8)>,
}

impl TermButtons {
    pub fn new() -> Self {
        terminal::enable_raw_mode().unwrap();
        TermButtons { held: None }
    }

    fn drain_events(&mut self) -> Result<(), io::Error> {
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Up => self.held = Some((Button::Up.mask(), TERM_HOLD_SAMPLES)),
                    KeyCode::Down => self.held = Some((Button::Down.mask(), TERM_HOLD_SAMPLES)),
                    KeyCode::Left => self.held = Some((Button::Left.mask(), TERM_HOLD_SAMPLES)),
                    KeyCode::Right => self.held = Some((Button::Right.mask(), TERM_HOLD_SAMPLES)),
                    KeyCode::Esc => {
                        panic!("TODO: clean shutdown path instead of panicking out of raw mode")
                    }
                    _ => {
                        eprintln!("Warning: key has no button line mapped");
                    }
                },
                _ => {
                    eprintln!("Warning: unknown event received");
                }
            }
        }
        Ok(())
    }
}

impl Drop for TermButtons {
    fn drop(&mut self) {
        terminal::disable_raw_mode().unwrap();
    }
}

impl ButtonLines for TermButtons {
    fn read_raw(&mut self) -> Result<u8, io::Error> {
        self.drain_events()?;
        spin_sleep::sleep(TERM_SAMPLE_SETTLE);
        match self.held {
            Some((mask, reads_left)) => {
                // synthesise the release after a few held samples
                self.held = if reads_left > 1 {
                    Some((mask, reads_left - 1))
                } else {
                    None
                };
                Ok(mask)
            }
            None => Ok(NO_BUTTON),
        }
    }
}

/// dummy ButtonLines implementation for testing: replays a scripted sequence
/// of raw samples, then reads all-released forever
pub struct ScriptedLines {
    samples: VecDeque<u8>,
    reads: u32,
}

impl ScriptedLines {
    pub fn new(samples: &[u8]) -> Self {
        ScriptedLines {
            samples: VecDeque::from(Vec::from(samples)),
            reads: 0,
        }
    }

    /// how many raw samples have been consumed so far
    pub fn reads(&self) -> u32 {
        self.reads
    }
}

impl ButtonLines for ScriptedLines {
    fn read_raw(&mut self) -> Result<u8, io::Error> {
        self.reads += 1;
        Ok(self.samples.pop_front().unwrap_or(NO_BUTTON))
    }
}
