use std::thread::sleep;
use std::time::Duration;

use haamu::{TouchScreen, VirtualDevice};

/// Creates a virtual touchscreen and swipes one finger across it.
fn main() -> anyhow::Result<()> {
    let mut screen = TouchScreen::create_default()?;
    println!("Created touchscreen, nodes: {:?}", screen.nodes());

    sleep(Duration::from_millis(500));

    for step in 0..=20 {
        let t = step as f64 / 20.0;
        screen.place_finger(0, 0.1 + 0.8 * t, 0.5, 0.6, 0)?;
        sleep(Duration::from_millis(15));
    }
    screen.release_finger(0)?;

    println!("Swipe sent");
    Ok(())
}
