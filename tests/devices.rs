//! End-to-end device tests. These create real kernel devices and therefore
//! need write access to /dev/uinput; they are ignored by default and run
//! with `cargo test -- --ignored` on a box where that access exists.

use haamu::{
    InputError, Joypad, Keyboard, Mouse, MouseButton, PS5Joypad, PenTablet, PenTool, Stick,
    TouchScreen, Trackpad, VirtualDevice, button, vk,
};

#[test]
#[ignore = "requires /dev/uinput access"]
fn every_class_creates_with_its_declared_node_count() {
    let keyboard = Keyboard::create_default().unwrap();
    assert_eq!(keyboard.nodes().len(), 1);

    let mouse = Mouse::create_default().unwrap();
    assert_eq!(mouse.nodes().len(), 2); // relative + absolute

    let screen = TouchScreen::create_default().unwrap();
    assert_eq!(screen.nodes().len(), 1);

    let trackpad = Trackpad::create_default().unwrap();
    assert_eq!(trackpad.nodes().len(), 1);

    let tablet = PenTablet::create_default().unwrap();
    assert_eq!(tablet.nodes().len(), 1);

    let pad = Joypad::xbox_one().unwrap();
    // event node, plus a js node once joydev claims the device
    assert!(!pad.nodes().is_empty());

    let ps5 = PS5Joypad::create_default().unwrap();
    assert!(ps5.nodes().len() >= 3); // gamepad + motion + touchpad
    assert_eq!(ps5.get_sys_nodes().len(), 3);
}

#[test]
#[ignore = "requires /dev/uinput access"]
fn keyboard_types_and_closes_cleanly() {
    let mut keyboard = Keyboard::create_default().unwrap();
    keyboard.press(vk::A).unwrap();
    keyboard.release(vk::A).unwrap();

    keyboard.close();
    keyboard.close(); // idempotent
    assert!(matches!(
        keyboard.press(vk::A),
        Err(InputError::ClosedDevice)
    ));
}

#[test]
#[ignore = "requires /dev/uinput access"]
fn mouse_moves_clicks_and_scrolls() {
    let mut mouse = Mouse::create_default().unwrap();
    mouse.move_rel(15, -3).unwrap();
    mouse.move_abs(960, 540, 1920, 1080).unwrap();
    mouse.press(MouseButton::Left).unwrap();
    mouse.release(MouseButton::Left).unwrap();
    mouse.vertical_scroll(120).unwrap();
    mouse.horizontal_scroll(-60).unwrap();

    assert!(matches!(
        mouse.move_abs(2000, 0, 1920, 1080),
        Err(InputError::OutOfRange { .. })
    ));
}

#[test]
#[ignore = "requires /dev/uinput access"]
fn touchscreen_rejects_out_of_range_and_tolerates_double_release() {
    let mut screen = TouchScreen::create_default().unwrap();
    screen.place_finger(0, 0.75, 0.25, 0.8, 45).unwrap();

    assert!(matches!(
        screen.place_finger(1, 1.5, 0.5, 0.5, 0),
        Err(InputError::OutOfRange { .. })
    ));
    assert!(matches!(
        screen.place_finger(16, 0.5, 0.5, 0.5, 0),
        Err(InputError::InvalidSlot { .. })
    ));

    screen.release_finger(0).unwrap();
    screen.release_finger(0).unwrap(); // no-op, not an error
}

#[test]
#[ignore = "requires /dev/uinput access"]
fn pen_tablet_reports_tools_and_buttons() {
    let mut tablet = PenTablet::create_default().unwrap();
    tablet
        .place_tool(PenTool::Pen, 0.5, 0.5, 0.7, -1.0, 10.0, -5.0)
        .unwrap();
    tablet
        .place_tool(PenTool::SameAsBefore, 0.6, 0.5, 0.7, -1.0, 10.0, -5.0)
        .unwrap();
    tablet
        .place_tool(PenTool::Eraser, 0.6, 0.5, -1.0, 0.2, 0.0, 0.0)
        .unwrap();
    tablet
        .set_btn(haamu::PenButton::Primary, true)
        .unwrap();
    tablet
        .set_btn(haamu::PenButton::Primary, false)
        .unwrap();
}

#[test]
#[ignore = "requires /dev/uinput access"]
fn joypad_surface_accepts_full_ranges() {
    let pad = Joypad::xbox_one().unwrap();
    pad.set_pressed_buttons(button::A | button::B | button::DPAD_UP)
        .unwrap();
    pad.set_pressed_buttons(0).unwrap();
    pad.set_stick(Stick::Left, i16::MIN, i16::MAX).unwrap();
    pad.set_triggers(0, u16::MAX).unwrap();

    let switch = Joypad::switch_pro().unwrap();
    switch.set_triggers(u16::MAX, 0).unwrap();

    let generic = Joypad::generic().unwrap();
    assert!(matches!(
        generic.set_on_rumble(|_, _| {}),
        Err(InputError::UnsupportedCapability { .. })
    ));
}

#[test]
#[ignore = "requires /dev/uinput access"]
fn ps5_composite_exposes_the_vendor_surface() {
    let ps5 = PS5Joypad::create_default().unwrap();

    let mac = ps5.get_mac_address().to_string();
    assert_eq!(mac.split(':').count(), 6);

    ps5.place_finger(0, 1400, 200).unwrap();
    ps5.place_finger(1, 100, 900).unwrap();
    ps5.release_finger(0).unwrap();
    ps5.release_finger(0).unwrap(); // no-op
    assert!(matches!(
        ps5.place_finger(2, 0, 0),
        Err(InputError::InvalidSlot { .. })
    ));
    assert!(matches!(
        ps5.place_finger(0, 5000, 0),
        Err(InputError::OutOfRange { .. })
    ));

    ps5.set_motion(haamu::MotionType::Gyroscope, 1.0, 0.0, -1.0)
        .unwrap();
    ps5.set_battery(haamu::BatteryState::Full, 100).unwrap();
    assert_eq!(ps5.battery(), (haamu::BatteryState::Full, 100));
    assert!(matches!(
        ps5.set_battery(haamu::BatteryState::Charging, 101),
        Err(InputError::OutOfRange { .. })
    ));

    // Battery reporting never fires feedback callbacks.
    ps5.set_on_led(|_, _, _| panic!("led callback fired without a driver event"));
    ps5.set_battery(haamu::BatteryState::Discharging, 50).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(600));
}

#[test]
#[ignore = "requires /dev/uinput access"]
fn dropping_a_device_releases_its_nodes() {
    let pad = Joypad::xbox_one().unwrap();
    let nodes = pad.nodes();
    assert!(!nodes.is_empty());
    drop(pad);
    std::thread::sleep(std::time::Duration::from_millis(200));
    for node in nodes {
        assert!(!std::path::Path::new(&node).exists(), "{} still exists", node);
    }
}
