use beep::beep;
use std::error::Error;

/// Binary indicator the firmware blinks once per cycle. Deliberately a
/// separate collaborator from the panel: implementations must not touch
/// display state, and a caller that interleaves the two never needs to
/// re-assert the indicator after a panel write.
pub trait Indicator {
    fn set(&mut self, on: bool) -> Result<(), Box<dyn Error>>;
}

const BEEP_PITCH: u16 = 2093; // C

/// audible indicator for hosts without anything LED-like
pub struct BeepIndicator {
    is_on: bool,
}

impl BeepIndicator {
    pub fn new() -> Self {
        BeepIndicator { is_on: false }
    }
}

impl Default for BeepIndicator {
    fn default() -> Self {
        BeepIndicator::new()
    }
}

impl Indicator for BeepIndicator {
    fn set(&mut self, on: bool) -> Result<(), Box<dyn Error>> {
        beep(if on { BEEP_PITCH } else { 0 })?;
        self.is_on = on;
        Ok(())
    }
}

pub struct SilentIndicator {}
impl SilentIndicator {
    pub fn new() -> Self {
        SilentIndicator {}
    }
}
impl Indicator for SilentIndicator {
    fn set(&mut self, _on: bool) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// dummy Indicator for testing: records every transition
pub struct DummyIndicator {
    pub history: Vec<bool>,
}

impl DummyIndicator {
    pub fn new() -> Self {
        DummyIndicator {
            history: Vec::new(),
        }
    }
}

impl Indicator for DummyIndicator {
    fn set(&mut self, on: bool) -> Result<(), Box<dyn Error>> {
        self.history.push(on);
        Ok(())
    }
}
