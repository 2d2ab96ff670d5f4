use std::thread::sleep;
use std::time::Duration;

use haamu::{Joypad, Stick, VirtualDevice, button};

/// Creates an Xbox One pad, wiggles it, and reports rumble requests from
/// whatever opens the device (try `fftest` against the event node).
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let pad = Joypad::xbox_one()?;
    println!("Created pad, nodes: {:?}", pad.nodes());

    pad.set_on_rumble(|low, high| {
        println!("rumble: low={} high={}", low, high);
    })?;

    println!("Pressing A + DPAD_UP, then releasing..");
    pad.set_pressed_buttons(button::A | button::DPAD_UP)?;
    sleep(Duration::from_millis(200));
    pad.set_pressed_buttons(0)?;

    pad.set_stick(Stick::Left, 12000, -8000)?;
    pad.set_triggers(0, u16::MAX)?;

    println!("Listening for rumble for 30 seconds, Ctrl+C to quit..");
    sleep(Duration::from_secs(30));

    Ok(())
}
