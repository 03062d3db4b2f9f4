//! # tally16
//!
//! ## Design
//!
//! Control logic of a one-accumulator counter board, rebuilt as a crate:
//! a rolling 16-bit counter gets a user-adjustable step added once per
//! second, shows up in hex and (low byte) in binary on a 2x16 character
//! panel, blinks an indicator in sync, and answers four momentary buttons.
//! The source machine had sixteen opcodes, no call stack, no index register
//! and a plain add with no carry-in, so the interesting parts are the
//! disciplines that worked around that, kept here on purpose:
//!
//! * stackless returns: a shared routine is entered with a caller-armed
//!   continuation token and exits by dispatching on it (`dispatch`)
//! * 16-bit arithmetic as four 4-bit adds with the carry walked forward by
//!   hand, two overflow checks per digit (`alu`)
//! * debounce as three nested countdowns that restart on any bounce, fused
//!   into a polled busy-wait so a half-second delay stays responsive to
//!   buttons without interrupts (`input`, `firmware`)
//!
//! Model
//!
//! Firmware
//!  |-- panel, button lines, indicator (trait objects; terminal
//!  |   implementations via tui/crossterm/beep, dummies for tests)
//!  |-- alu (owns the scratch carry and its continuation slot)
//!  `-- main loop
//!       |-- counter = add16(counter, step)
//!       |-- render hex + binary rows
//!       |-- indicator on; polled delay; handle button
//!       `-- indicator off; polled delay; handle button
//!
//! Timing is calibration, not correctness: trip counts and tick lengths are
//! parameters, and input is only observed at delay checkpoints, exactly as
//! on the original hardware.

pub mod alu;
pub mod dispatch;
pub mod firmware;
pub mod indicator;
pub mod input;
pub mod panel;
