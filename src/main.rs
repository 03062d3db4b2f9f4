use std::error::Error;

use tally16::firmware::Firmware;
use tally16::indicator::SilentIndicator;
use tally16::input::TermButtons;
use tally16::panel::TermPanel;

fn main() -> Result<(), Box<dyn Error>> {
    // initialise: arrow keys are the four buttons, any of them starts the
    // counter. Swap SilentIndicator for BeepIndicator on hosts where a
    // once-a-second beep is welcome.
    let mut panel = TermPanel::new()?;
    let mut buttons = TermButtons::new();
    let mut indicator = SilentIndicator::new();

    let mut firmware = Firmware::new(&mut panel, &mut buttons, &mut indicator);
    firmware.run()?;

    // push the shell prompt below the last rendered frame
    for _ in 0..6 {
        println!();
    }
    Ok(())
}
