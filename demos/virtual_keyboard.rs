use std::thread::sleep;
use std::time::Duration;

use haamu::{Keyboard, VirtualDevice, key_code_from_name};

/// Creates a virtual keyboard and types a short greeting.
fn main() -> anyhow::Result<()> {
    let mut keyboard = Keyboard::create_default()?;
    println!("Created keyboard, nodes: {:?}", keyboard.nodes());

    // Give the desktop a moment to pick the new device up
    sleep(Duration::from_millis(500));

    for name in ["h", "e", "l", "l", "o"] {
        let code = key_code_from_name(name)?;
        keyboard.press(code)?;
        sleep(Duration::from_millis(30));
        keyboard.release(code)?;
        sleep(Duration::from_millis(30));
    }

    println!("Done, releasing the device..");
    Ok(())
}
