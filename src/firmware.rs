/// # firmware
///
/// The cooperative scheduler tying the pieces together. One full cycle:
///
/// ```text
/// AddStep -> Render -> IndicatorOn -> DelayWithPoll -> HandleButton
///         -> IndicatorOff -> DelayWithPoll -> HandleButton -> AddStep ...
/// ```
///
/// preceded once by `Init -> WaitForFirstKey`. There is no terminal state;
/// the only way the machine stops is the dispatch trap, which parks it in
/// `Halted` with no diagnostics (the original fell off an unmatched return
/// chain into a self-loop).
///
/// The two shared routines here, frame rendering and the polled delay, are
/// entered from several call sites each and return through their
/// continuation slots. Input is sampled only at delay checkpoints: a press
/// shorter than one checkpoint interval is missed, which is an accepted
/// latency bound of the design, not a bug to fix with interrupts.
use crate::alu::{Alu, Nibble, Word16};
use crate::dispatch::{DispatchFault, Slot};
use crate::indicator::Indicator;
use crate::input::{Button, ButtonLines, Debouncer, NO_BUTTON};
use crate::panel::{Panel, CMD_CLEAR};
use std::error::Error;
use std::io;
use std::time::Duration;

/// both the counter and the step operand power up as 0x0002
pub const DEFAULT_SEED: u16 = 0x0002;

// fixed panel layout: counter left of row 0, step right of row 0, low byte
// of the counter in binary centred on row 1
const COUNTER_COL: u8 = 0;
const STEP_COL: u8 = 12;
const BINARY_COL: u8 = 4;

/// Trip counts for the polled busy-wait. Timing is calibration, not a
/// correctness invariant; the defaults approximate half a second per phase,
/// two phases per cycle.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    /// checkpoints per delay phase; input is sampled once per checkpoint
    pub outer: u32,
    /// pacing ticks between checkpoints
    pub inner: u32,
    pub tick: Duration,
}

impl Default for Calibration {
    fn default() -> Self {
        // 25 checkpoints x 20 ticks x 1ms ~ 0.5s per phase
        Calibration {
            outer: 25,
            inner: 20,
            tick: Duration::from_millis(1),
        }
    }
}

impl Calibration {
    /// trip counts with no wall time attached
    pub fn instant(outer: u32) -> Self {
        Calibration {
            outer,
            inner: 1,
            tick: Duration::ZERO,
        }
    }
}

/// call sites of the shared frame-render routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawReturn {
    PowerOn,
    CycleUpdate,
    StepAdjust,
}

/// call sites of the shared polled-delay routine: the indicator-on half of
/// the cycle and the indicator-off half
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelayReturn {
    Glow,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    WaitForFirstKey,
    AddStep,
    Render,
    IndicatorOn,
    IndicatorOff,
    DelayWithPoll,
    HandleButton(u8, DelayReturn),
    Halted,
}

/// one scheduler step's error plumbing; dispatch faults are kept apart from
/// I/O errors because they park the machine instead of surfacing
#[derive(Debug)]
enum StepError {
    Io(io::Error),
    Indicator(Box<dyn Error>),
    Fault(DispatchFault),
}

impl From<io::Error> for StepError {
    fn from(e: io::Error) -> Self {
        StepError::Io(e)
    }
}

impl From<Box<dyn Error>> for StepError {
    fn from(e: Box<dyn Error>) -> Self {
        StepError::Indicator(e)
    }
}

impl From<DispatchFault> for StepError {
    fn from(e: DispatchFault) -> Self {
        StepError::Fault(e)
    }
}

pub struct Firmware<'a> {
    alu: Alu,
    /// the displayed rolling counter (accumulator a)
    counter: Word16,
    /// the per-cycle increment (operand b); UP/DOWN move only its least
    /// significant digit
    step: Word16,
    display: &'a mut dyn Panel,
    buttons: Debouncer<'a>,
    indicator: &'a mut dyn Indicator,
    cal: Calibration,
    state: State,
    draw_slot: Slot<DrawReturn>,
    delay_slot: Slot<DelayReturn>,
}

impl<'a> Firmware<'a> {
    pub fn new(
        display: &'a mut dyn Panel,
        lines: &'a mut dyn ButtonLines,
        indicator: &'a mut dyn Indicator,
    ) -> Self {
        Firmware::with_config(
            display,
            lines,
            indicator,
            DEFAULT_SEED,
            DEFAULT_SEED,
            Calibration::default(),
        )
    }

    pub fn with_config(
        display: &'a mut dyn Panel,
        lines: &'a mut dyn ButtonLines,
        indicator: &'a mut dyn Indicator,
        counter: u16,
        step: u16,
        cal: Calibration,
    ) -> Self {
        Firmware {
            alu: Alu::new(),
            counter: Word16::from_u16(counter),
            step: Word16::from_u16(step),
            display,
            buttons: Debouncer::new(lines),
            indicator,
            cal,
            state: State::Init,
            draw_slot: Slot::new(),
            delay_slot: Slot::new(),
        }
    }

    pub fn counter(&self) -> Word16 {
        self.counter
    }

    pub fn step_operand(&self) -> Word16 {
        self.step
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    /// run forever; only I/O errors come back out
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            self.advance()?;
            if self.is_halted() {
                // the dead self-loop, minus the spinning
                spin_sleep::sleep(self.cal.tick);
            }
        }
    }

    /// take the machine through exactly one state transition
    pub fn advance(&mut self) -> Result<(), Box<dyn Error>> {
        match self.transition() {
            Ok(()) => Ok(()),
            // fatal and silent: the machine stops responding
            Err(StepError::Fault(_)) => {
                self.state = State::Halted;
                Ok(())
            }
            Err(StepError::Io(e)) => Err(Box::new(e)),
            Err(StepError::Indicator(e)) => Err(e),
        }
    }

    fn transition(&mut self) -> Result<(), StepError> {
        match self.state {
            State::Init => {
                self.display.write_command(CMD_CLEAR)?;
                self.draw_slot.arm(DrawReturn::PowerOn);
                match self.render_frame()? {
                    DrawReturn::PowerOn => self.state = State::WaitForFirstKey,
                    _ => return Err(DispatchFault.into()),
                }
            }
            State::WaitForFirstKey => {
                // the first press only starts the cycle, it is not an
                // adjustment
                spin_sleep::sleep(self.cal.tick);
                if self.buttons.poll()? != NO_BUTTON {
                    self.state = State::AddStep;
                }
            }
            State::AddStep => {
                self.counter = self.alu.add16(self.counter, self.step)?;
                self.state = State::Render;
            }
            State::Render => {
                self.draw_slot.arm(DrawReturn::CycleUpdate);
                match self.render_frame()? {
                    DrawReturn::CycleUpdate => self.state = State::IndicatorOn,
                    _ => return Err(DispatchFault.into()),
                }
            }
            State::IndicatorOn => {
                self.indicator.set(true)?;
                self.delay_slot.arm(DelayReturn::Glow);
                self.state = State::DelayWithPoll;
            }
            State::IndicatorOff => {
                self.indicator.set(false)?;
                self.delay_slot.arm(DelayReturn::Dark);
                self.state = State::DelayWithPoll;
            }
            State::DelayWithPoll => {
                let (mask, k) = self.delay_with_poll()?;
                self.state = State::HandleButton(mask, k);
            }
            State::HandleButton(mask, k) => {
                self.handle_button(mask)?;
                self.state = match k {
                    DelayReturn::Glow => State::IndicatorOff,
                    DelayReturn::Dark => State::AddStep,
                };
            }
            State::Halted => {}
        }
        Ok(())
    }

    /// shared render routine: counter and step in hex on row 0, counter low
    /// byte in binary on row 1, then dispatch through the draw slot
    fn render_frame(&mut self) -> Result<DrawReturn, StepError> {
        let c = self.counter;
        let s = self.step;
        // most significant digit leftmost
        self.display.render_digits(
            &[c.digit(3), c.digit(2), c.digit(1), c.digit(0)],
            0,
            COUNTER_COL,
        )?;
        self.display.render_digits(
            &[s.digit(3), s.digit(2), s.digit(1), s.digit(0)],
            0,
            STEP_COL,
        )?;
        self.display
            .render_digits(&bits_of(c.digit(1)), 1, BINARY_COL)?;
        self.display
            .render_digits(&bits_of(c.digit(0)), 1, BINARY_COL + 4)?;
        Ok(self.draw_slot.resume()?)
    }

    /// shared busy-wait routine: `outer` checkpoints, one debounced input
    /// sample per checkpoint; a press cancels the remainder of the delay.
    /// Exits through the delay slot so the caller knows which phase of the
    /// cycle to resume.
    fn delay_with_poll(&mut self) -> Result<(u8, DelayReturn), StepError> {
        let mut result = NO_BUTTON;
        for _ in 0..self.cal.outer {
            for _ in 0..self.cal.inner {
                spin_sleep::sleep(self.cal.tick);
            }
            let mask = self.buttons.poll()?;
            if mask != NO_BUTTON {
                result = mask;
                break;
            }
        }
        let k = self.delay_slot.resume()?;
        Ok((result, k))
    }

    fn handle_button(&mut self, mask: u8) -> Result<(), StepError> {
        match Button::from_mask(mask) {
            Some(Button::Up) => self.bump_step(Nibble::ONE),
            // adding 15 is subtracting 1 mod 16
            Some(Button::Down) => self.bump_step(Nibble::MAX),
            // LEFT and RIGHT pause the machine for as long as they are
            // held; the debouncer blocks until release, so by the time the
            // mask arrives here the pause has already happened
            Some(Button::Left) | Some(Button::Right) | None => Ok(()),
        }
    }

    /// adjust the step operand's least significant digit only; carries do
    /// not propagate into the higher digits
    fn bump_step(&mut self, delta: Nibble) -> Result<(), StepError> {
        let (d, _) = self.step.digit(0).add(delta);
        self.step.set_digit(0, d);
        // show the new step right away rather than at the next cycle. The
        // draw slot is free here: the delay routine already resumed, so no
        // outer token is in flight to save.
        self.draw_slot.arm(DrawReturn::StepAdjust);
        match self.render_frame()? {
            DrawReturn::StepAdjust => Ok(()),
            _ => Err(DispatchFault.into()),
        }
    }
}

/// one nibble as four binary digits, most significant bit first
fn bits_of(d: Nibble) -> [Nibble; 4] {
    let v = d.value();
    [
        Nibble::new((v >> 3) & 1),
        Nibble::new((v >> 2) & 1),
        Nibble::new((v >> 1) & 1),
        Nibble::new(v & 1),
    ]
}
