//! Key-name resolution for configuration strings

use std::str::FromStr;

use evdev::Key;

/// Parse a key name string to an evdev Key.
///
/// Accepts the friendly names used in panel configurations plus raw kernel
/// `KEY_*` names as an escape hatch. Returns `None` for unknown names; the
/// dispatcher turns that into a startup error so a typo in the mapping
/// table can never reach the sampling loop.
pub fn parse_key(name: &str) -> Option<Key> {
    let upper = name.to_uppercase();

    match upper.as_str() {
        "ESCAPE" | "ESC" => Some(Key::KEY_ESC),
        "ENTER" | "RETURN" => Some(Key::KEY_ENTER),
        "TAB" => Some(Key::KEY_TAB),
        "SPACE" => Some(Key::KEY_SPACE),
        "BACKSPACE" => Some(Key::KEY_BACKSPACE),

        // Letters
        "A" => Some(Key::KEY_A),
        "B" => Some(Key::KEY_B),
        "C" => Some(Key::KEY_C),
        "D" => Some(Key::KEY_D),
        "E" => Some(Key::KEY_E),
        "F" => Some(Key::KEY_F),
        "G" => Some(Key::KEY_G),
        "H" => Some(Key::KEY_H),
        "I" => Some(Key::KEY_I),
        "J" => Some(Key::KEY_J),
        "K" => Some(Key::KEY_K),
        "L" => Some(Key::KEY_L),
        "M" => Some(Key::KEY_M),
        "N" => Some(Key::KEY_N),
        "O" => Some(Key::KEY_O),
        "P" => Some(Key::KEY_P),
        "Q" => Some(Key::KEY_Q),
        "R" => Some(Key::KEY_R),
        "S" => Some(Key::KEY_S),
        "T" => Some(Key::KEY_T),
        "U" => Some(Key::KEY_U),
        "V" => Some(Key::KEY_V),
        "W" => Some(Key::KEY_W),
        "X" => Some(Key::KEY_X),
        "Y" => Some(Key::KEY_Y),
        "Z" => Some(Key::KEY_Z),

        // Number row (classic coin/start mappings live here)
        "0" => Some(Key::KEY_0),
        "1" => Some(Key::KEY_1),
        "2" => Some(Key::KEY_2),
        "3" => Some(Key::KEY_3),
        "4" => Some(Key::KEY_4),
        "5" => Some(Key::KEY_5),
        "6" => Some(Key::KEY_6),
        "7" => Some(Key::KEY_7),
        "8" => Some(Key::KEY_8),
        "9" => Some(Key::KEY_9),

        // Modifiers (fire buttons are often mapped to these)
        "LEFTCTRL" | "LCTRL" | "CTRL" => Some(Key::KEY_LEFTCTRL),
        "RIGHTCTRL" | "RCTRL" => Some(Key::KEY_RIGHTCTRL),
        "LEFTSHIFT" | "LSHIFT" | "SHIFT" => Some(Key::KEY_LEFTSHIFT),
        "RIGHTSHIFT" | "RSHIFT" => Some(Key::KEY_RIGHTSHIFT),
        "LEFTALT" | "LALT" | "ALT" => Some(Key::KEY_LEFTALT),
        "RIGHTALT" | "RALT" => Some(Key::KEY_RIGHTALT),

        // Joystick directions
        "UP" | "UPARROW" => Some(Key::KEY_UP),
        "DOWN" | "DOWNARROW" => Some(Key::KEY_DOWN),
        "LEFT" | "LEFTARROW" => Some(Key::KEY_LEFT),
        "RIGHT" | "RIGHTARROW" => Some(Key::KEY_RIGHT),

        // Function keys
        "F1" => Some(Key::KEY_F1),
        "F2" => Some(Key::KEY_F2),
        "F3" => Some(Key::KEY_F3),
        "F4" => Some(Key::KEY_F4),
        "F5" => Some(Key::KEY_F5),
        "F6" => Some(Key::KEY_F6),
        "F7" => Some(Key::KEY_F7),
        "F8" => Some(Key::KEY_F8),
        "F9" => Some(Key::KEY_F9),
        "F10" => Some(Key::KEY_F10),
        "F11" => Some(Key::KEY_F11),
        "F12" => Some(Key::KEY_F12),

        _ => {
            // Fallback: raw kernel key names via evdev's FromStr.
            if upper.starts_with("KEY_") {
                return Key::from_str(&upper).ok();
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_friendly_names() {
        assert_eq!(parse_key("Esc"), Some(Key::KEY_ESC));
        assert_eq!(parse_key("LeftCtrl"), Some(Key::KEY_LEFTCTRL));
        assert_eq!(parse_key("5"), Some(Key::KEY_5));
        assert_eq!(parse_key("up"), Some(Key::KEY_UP));
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(parse_key("escape"), parse_key("ESCAPE"));
        assert_eq!(parse_key("c"), Some(Key::KEY_C));
    }

    #[test]
    fn accepts_raw_kernel_names() {
        assert_eq!(parse_key("KEY_COFFEE"), Some(Key::KEY_COFFEE));
        assert_eq!(parse_key("key_esc"), Some(Key::KEY_ESC));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(parse_key("NotAKey"), None);
        assert_eq!(parse_key("KEY_DEFINITELY_NOT_REAL"), None);
        assert_eq!(parse_key(""), None);
    }
}
