//! Win32 Virtual-Key code space for the keyboard class.
//!
//! The keyboard surface speaks VK codes (the code space remote callers
//! usually already have), translated here to the evdev key codes the kernel
//! device declares. A case-insensitive name lookup is provided for
//! human-readable configuration.

use crate::error::{InputError, Result};

/// Win32 Virtual-Key codes, as documented at
/// <https://learn.microsoft.com/en-us/windows/win32/inputdev/virtual-key-codes>
pub mod vk {
    pub const BACKSPACE: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const CLEAR: u16 = 0x0C;
    pub const ENTER: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CTRL: u16 = 0x11;
    pub const ALT: u16 = 0x12;
    pub const PAUSE: u16 = 0x13;
    pub const CAPS_LOCK: u16 = 0x14;
    pub const ESC: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PAGE_UP: u16 = 0x21;
    pub const PAGE_DOWN: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const PRINTSCREEN: u16 = 0x2C;
    pub const INSERT: u16 = 0x2D;
    pub const DELETE: u16 = 0x2E;
    pub const KEY_0: u16 = 0x30;
    pub const KEY_1: u16 = 0x31;
    pub const KEY_2: u16 = 0x32;
    pub const KEY_3: u16 = 0x33;
    pub const KEY_4: u16 = 0x34;
    pub const KEY_5: u16 = 0x35;
    pub const KEY_6: u16 = 0x36;
    pub const KEY_7: u16 = 0x37;
    pub const KEY_8: u16 = 0x38;
    pub const KEY_9: u16 = 0x39;
    pub const A: u16 = 0x41;
    pub const B: u16 = 0x42;
    pub const C: u16 = 0x43;
    pub const D: u16 = 0x44;
    pub const E: u16 = 0x45;
    pub const F: u16 = 0x46;
    pub const G: u16 = 0x47;
    pub const H: u16 = 0x48;
    pub const I: u16 = 0x49;
    pub const J: u16 = 0x4A;
    pub const K: u16 = 0x4B;
    pub const L: u16 = 0x4C;
    pub const M: u16 = 0x4D;
    pub const N: u16 = 0x4E;
    pub const O: u16 = 0x4F;
    pub const P: u16 = 0x50;
    pub const Q: u16 = 0x51;
    pub const R: u16 = 0x52;
    pub const S: u16 = 0x53;
    pub const T: u16 = 0x54;
    pub const U: u16 = 0x55;
    pub const V: u16 = 0x56;
    pub const W: u16 = 0x57;
    pub const X: u16 = 0x58;
    pub const Y: u16 = 0x59;
    pub const Z: u16 = 0x5A;
    pub const LEFT_WIN: u16 = 0x5B;
    pub const RIGHT_WIN: u16 = 0x5C;
    pub const APP: u16 = 0x5D;
    pub const NUMPAD_0: u16 = 0x60;
    pub const NUMPAD_1: u16 = 0x61;
    pub const NUMPAD_2: u16 = 0x62;
    pub const NUMPAD_3: u16 = 0x63;
    pub const NUMPAD_4: u16 = 0x64;
    pub const NUMPAD_5: u16 = 0x65;
    pub const NUMPAD_6: u16 = 0x66;
    pub const NUMPAD_7: u16 = 0x67;
    pub const NUMPAD_8: u16 = 0x68;
    pub const NUMPAD_9: u16 = 0x69;
    pub const MULTIPLY: u16 = 0x6A;
    pub const ADD: u16 = 0x6B;
    pub const SUBTRACT: u16 = 0x6D;
    pub const DECIMAL: u16 = 0x6E;
    pub const DIVIDE: u16 = 0x6F;
    pub const F1: u16 = 0x70;
    pub const F2: u16 = 0x71;
    pub const F3: u16 = 0x72;
    pub const F4: u16 = 0x73;
    pub const F5: u16 = 0x74;
    pub const F6: u16 = 0x75;
    pub const F7: u16 = 0x76;
    pub const F8: u16 = 0x77;
    pub const F9: u16 = 0x78;
    pub const F10: u16 = 0x79;
    pub const F11: u16 = 0x7A;
    pub const F12: u16 = 0x7B;
    pub const F13: u16 = 0x7C;
    pub const F14: u16 = 0x7D;
    pub const F15: u16 = 0x7E;
    pub const F16: u16 = 0x7F;
    pub const F17: u16 = 0x80;
    pub const F18: u16 = 0x81;
    pub const F19: u16 = 0x82;
    pub const F20: u16 = 0x83;
    pub const F21: u16 = 0x84;
    pub const F22: u16 = 0x85;
    pub const F23: u16 = 0x86;
    pub const F24: u16 = 0x87;
    pub const NUM_LOCK: u16 = 0x90;
    pub const SCROLL_LOCK: u16 = 0x91;
    pub const LEFT_SHIFT: u16 = 0xA0;
    pub const RIGHT_SHIFT: u16 = 0xA1;
    pub const LEFT_CONTROL: u16 = 0xA2;
    pub const RIGHT_CONTROL: u16 = 0xA3;
    pub const LEFT_ALT: u16 = 0xA4;
    pub const RIGHT_ALT: u16 = 0xA5;
    pub const VOLUME_MUTE: u16 = 0xAD;
    pub const VOLUME_DOWN: u16 = 0xAE;
    pub const VOLUME_UP: u16 = 0xAF;
    pub const MEDIA_NEXT: u16 = 0xB0;
    pub const MEDIA_PREV: u16 = 0xB1;
    pub const MEDIA_STOP: u16 = 0xB2;
    pub const MEDIA_PLAY_PAUSE: u16 = 0xB3;
    pub const SEMICOLON: u16 = 0xBA;
    pub const PLUS: u16 = 0xBB;
    pub const COMMA: u16 = 0xBC;
    pub const MINUS: u16 = 0xBD;
    pub const PERIOD: u16 = 0xBE;
    pub const SLASH: u16 = 0xBF;
    pub const TILDE: u16 = 0xC0;
    pub const OPEN_BRACKET: u16 = 0xDB;
    pub const BACKSLASH: u16 = 0xDC;
    pub const CLOSE_BRACKET: u16 = 0xDD;
    pub const QUOTE: u16 = 0xDE;
}

/// (name, VK code, evdev key code). The evdev column uses the decimal values
/// from `<linux/input-event-codes.h>`.
static KEY_TABLE: &[(&str, u16, u16)] = &[
    ("backspace", vk::BACKSPACE, 14),
    ("tab", vk::TAB, 15),
    ("clear", vk::CLEAR, 76), // numpad 5 without numlock
    ("enter", vk::ENTER, 28),
    ("shift", vk::SHIFT, 42),
    ("ctrl", vk::CTRL, 29),
    ("alt", vk::ALT, 56),
    ("pause", vk::PAUSE, 119),
    ("caps_lock", vk::CAPS_LOCK, 58),
    ("esc", vk::ESC, 1),
    ("space", vk::SPACE, 57),
    ("page_up", vk::PAGE_UP, 104),
    ("page_down", vk::PAGE_DOWN, 109),
    ("end", vk::END, 107),
    ("home", vk::HOME, 102),
    ("left", vk::LEFT, 105),
    ("up", vk::UP, 103),
    ("right", vk::RIGHT, 106),
    ("down", vk::DOWN, 108),
    ("printscreen", vk::PRINTSCREEN, 99),
    ("insert", vk::INSERT, 110),
    ("delete", vk::DELETE, 111),
    ("key_0", vk::KEY_0, 11),
    ("key_1", vk::KEY_1, 2),
    ("key_2", vk::KEY_2, 3),
    ("key_3", vk::KEY_3, 4),
    ("key_4", vk::KEY_4, 5),
    ("key_5", vk::KEY_5, 6),
    ("key_6", vk::KEY_6, 7),
    ("key_7", vk::KEY_7, 8),
    ("key_8", vk::KEY_8, 9),
    ("key_9", vk::KEY_9, 10),
    ("a", vk::A, 30),
    ("b", vk::B, 48),
    ("c", vk::C, 46),
    ("d", vk::D, 32),
    ("e", vk::E, 18),
    ("f", vk::F, 33),
    ("g", vk::G, 34),
    ("h", vk::H, 35),
    ("i", vk::I, 23),
    ("j", vk::J, 36),
    ("k", vk::K, 37),
    ("l", vk::L, 38),
    ("m", vk::M, 50),
    ("n", vk::N, 49),
    ("o", vk::O, 24),
    ("p", vk::P, 25),
    ("q", vk::Q, 16),
    ("r", vk::R, 19),
    ("s", vk::S, 31),
    ("t", vk::T, 20),
    ("u", vk::U, 22),
    ("v", vk::V, 47),
    ("w", vk::W, 17),
    ("x", vk::X, 45),
    ("y", vk::Y, 21),
    ("z", vk::Z, 44),
    ("left_win", vk::LEFT_WIN, 125),
    ("right_win", vk::RIGHT_WIN, 126),
    ("app", vk::APP, 127),
    ("numpad_0", vk::NUMPAD_0, 82),
    ("numpad_1", vk::NUMPAD_1, 79),
    ("numpad_2", vk::NUMPAD_2, 80),
    ("numpad_3", vk::NUMPAD_3, 81),
    ("numpad_4", vk::NUMPAD_4, 75),
    ("numpad_5", vk::NUMPAD_5, 76),
    ("numpad_6", vk::NUMPAD_6, 77),
    ("numpad_7", vk::NUMPAD_7, 71),
    ("numpad_8", vk::NUMPAD_8, 72),
    ("numpad_9", vk::NUMPAD_9, 73),
    ("multiply", vk::MULTIPLY, 55),
    ("add", vk::ADD, 78),
    ("subtract", vk::SUBTRACT, 74),
    ("decimal", vk::DECIMAL, 83),
    ("divide", vk::DIVIDE, 98),
    ("f1", vk::F1, 59),
    ("f2", vk::F2, 60),
    ("f3", vk::F3, 61),
    ("f4", vk::F4, 62),
    ("f5", vk::F5, 63),
    ("f6", vk::F6, 64),
    ("f7", vk::F7, 65),
    ("f8", vk::F8, 66),
    ("f9", vk::F9, 67),
    ("f10", vk::F10, 68),
    ("f11", vk::F11, 87),
    ("f12", vk::F12, 88),
    ("f13", vk::F13, 183),
    ("f14", vk::F14, 184),
    ("f15", vk::F15, 185),
    ("f16", vk::F16, 186),
    ("f17", vk::F17, 187),
    ("f18", vk::F18, 188),
    ("f19", vk::F19, 189),
    ("f20", vk::F20, 190),
    ("f21", vk::F21, 191),
    ("f22", vk::F22, 192),
    ("f23", vk::F23, 193),
    ("f24", vk::F24, 194),
    ("num_lock", vk::NUM_LOCK, 69),
    ("scroll_lock", vk::SCROLL_LOCK, 70),
    ("left_shift", vk::LEFT_SHIFT, 42),
    ("right_shift", vk::RIGHT_SHIFT, 54),
    ("left_control", vk::LEFT_CONTROL, 29),
    ("right_control", vk::RIGHT_CONTROL, 97),
    ("left_alt", vk::LEFT_ALT, 56),
    ("right_alt", vk::RIGHT_ALT, 100),
    ("volume_mute", vk::VOLUME_MUTE, 113),
    ("volume_down", vk::VOLUME_DOWN, 114),
    ("volume_up", vk::VOLUME_UP, 115),
    ("media_next", vk::MEDIA_NEXT, 163),
    ("media_prev", vk::MEDIA_PREV, 165),
    ("media_stop", vk::MEDIA_STOP, 166),
    ("media_play_pause", vk::MEDIA_PLAY_PAUSE, 164),
    ("semicolon", vk::SEMICOLON, 39),
    ("plus", vk::PLUS, 13),
    ("comma", vk::COMMA, 51),
    ("minus", vk::MINUS, 12),
    ("period", vk::PERIOD, 52),
    ("slash", vk::SLASH, 53),
    ("tilde", vk::TILDE, 41),
    ("open_bracket", vk::OPEN_BRACKET, 26),
    ("backslash", vk::BACKSLASH, 43),
    ("close_bracket", vk::CLOSE_BRACKET, 27),
    ("quote", vk::QUOTE, 40),
];

/// Look up a Virtual-Key code by key name, case-insensitively.
pub fn key_code_from_name(name: &str) -> Result<u16> {
    KEY_TABLE
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, vk, _)| vk)
        .ok_or_else(|| InputError::UnknownKeyName(name.to_string()))
}

/// Translate a Virtual-Key code to the evdev key code the device emits.
pub(crate) fn vk_to_key(vk: u16) -> Option<u16> {
    KEY_TABLE
        .iter()
        .find(|&&(_, v, _)| v == vk)
        .map(|&(_, _, ev)| ev)
}

/// Every evdev key code the keyboard class declares, deduplicated.
pub(crate) fn keyboard_key_codes() -> Vec<u16> {
    let mut codes: Vec<u16> = KEY_TABLE.iter().map(|&(_, _, ev)| ev).collect();
    codes.sort_unstable();
    codes.dedup();
    codes
}
