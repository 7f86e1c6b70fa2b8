//! Russian, as reported by Windows

use crate::{KeyMapping, KeyProduction, KeyboardLayoutInfo, LayoutId};

const fn key(
    value: &'static str,
    with_shift: &'static str,
    with_alt_gr: &'static str,
    with_shift_alt_gr: &'static str,
    with_dead_keys_mask: u8,
    vkey: &'static str,
) -> Option<KeyProduction> {
    Some(KeyProduction {
        value,
        with_shift,
        with_alt_gr,
        with_shift_alt_gr,
        with_dead_keys_mask,
        vkey,
    })
}

pub const LAYOUT: LayoutId = LayoutId {
    name: "00000419",
    id: "",
    text: "Russian",
};

#[rustfmt::skip]
static MAPPING: &[(&str, Option<KeyProduction>)] = &[
    ("Sleep", None),
    ("WakeUp", None),
    ("KeyA", key("ф", "Ф", "", "", 0, "VK_A")),
    ("KeyB", key("и", "И", "", "", 0, "VK_B")),
    ("KeyC", key("с", "С", "", "", 0, "VK_C")),
    ("KeyD", key("в", "В", "", "", 0, "VK_D")),
    ("KeyE", key("у", "У", "", "", 0, "VK_E")),
    ("KeyF", key("а", "А", "", "", 0, "VK_F")),
    ("KeyG", key("п", "П", "", "", 0, "VK_G")),
    ("KeyH", key("р", "Р", "", "", 0, "VK_H")),
    ("KeyI", key("ш", "Ш", "", "", 0, "VK_I")),
    ("KeyJ", key("о", "О", "", "", 0, "VK_J")),
    ("KeyK", key("л", "Л", "", "", 0, "VK_K")),
    ("KeyL", key("д", "Д", "", "", 0, "VK_L")),
    ("KeyM", key("ь", "Ь", "", "", 0, "VK_M")),
    ("KeyN", key("т", "Т", "", "", 0, "VK_N")),
    ("KeyO", key("щ", "Щ", "", "", 0, "VK_O")),
    ("KeyP", key("з", "З", "", "", 0, "VK_P")),
    ("KeyQ", key("й", "Й", "", "", 0, "VK_Q")),
    ("KeyR", key("к", "К", "", "", 0, "VK_R")),
    ("KeyS", key("ы", "Ы", "", "", 0, "VK_S")),
    ("KeyT", key("е", "Е", "", "", 0, "VK_T")),
    ("KeyU", key("г", "Г", "", "", 0, "VK_U")),
    ("KeyV", key("м", "М", "", "", 0, "VK_V")),
    ("KeyW", key("ц", "Ц", "", "", 0, "VK_W")),
    ("KeyX", key("ч", "Ч", "", "", 0, "VK_X")),
    ("KeyY", key("н", "Н", "", "", 0, "VK_Y")),
    ("KeyZ", key("я", "Я", "", "", 0, "VK_Z")),
    ("Digit1", key("1", "!", "", "", 0, "VK_1")),
    ("Digit2", key("2", "\"", "", "", 0, "VK_2")),
    ("Digit3", key("3", "№", "", "", 0, "VK_3")),
    ("Digit4", key("4", ";", "", "", 0, "VK_4")),
    ("Digit5", key("5", "%", "", "", 0, "VK_5")),
    ("Digit6", key("6", ":", "", "", 0, "VK_6")),
    ("Digit7", key("7", "?", "", "", 0, "VK_7")),
    ("Digit8", key("8", "*", "₽", "", 0, "VK_8")),
    ("Digit9", key("9", "(", "", "", 0, "VK_9")),
    ("Digit0", key("0", ")", "", "", 0, "VK_0")),
    ("Enter", None),
    ("Escape", None),
    ("Backspace", None),
    ("Tab", None),
    ("Space", key(" ", " ", "", "", 0, "VK_SPACE")),
    ("Minus", key("-", "_", "", "", 0, "VK_OEM_MINUS")),
    ("Equal", key("=", "+", "", "", 0, "VK_OEM_PLUS")),
    ("BracketLeft", key("х", "Х", "", "", 0, "VK_OEM_4")),
    ("BracketRight", key("ъ", "Ъ", "", "", 0, "VK_OEM_6")),
    ("Backslash", key("\\", "/", "", "", 0, "VK_OEM_5")),
    ("Semicolon", key("ж", "Ж", "", "", 0, "VK_OEM_1")),
    ("Quote", key("э", "Э", "", "", 0, "VK_OEM_7")),
    ("Backquote", key("ё", "Ё", "", "", 0, "VK_OEM_3")),
    ("Comma", key("б", "Б", "", "", 0, "VK_OEM_COMMA")),
    ("Period", key("ю", "Ю", "", "", 0, "VK_OEM_PERIOD")),
    ("Slash", key(".", ",", "", "", 0, "VK_OEM_2")),
    ("CapsLock", None),
    ("F1", None),
    ("F2", None),
    ("F3", None),
    ("F4", None),
    ("F5", None),
    ("F6", None),
    ("F7", None),
    ("F8", None),
    ("F9", None),
    ("F10", None),
    ("F11", None),
    ("F12", None),
    ("PrintScreen", None),
    ("ScrollLock", None),
    ("Pause", None),
    ("Insert", None),
    ("Home", None),
    ("PageUp", None),
    ("Delete", None),
    ("End", None),
    ("PageDown", None),
    ("ArrowRight", None),
    ("ArrowLeft", None),
    ("ArrowDown", None),
    ("ArrowUp", None),
    ("NumLock", None),
    ("NumpadDivide", key("/", "/", "", "", 0, "VK_DIVIDE")),
    ("NumpadMultiply", key("*", "*", "", "", 0, "VK_MULTIPLY")),
    ("NumpadSubtract", key("-", "-", "", "", 0, "VK_SUBTRACT")),
    ("NumpadAdd", key("+", "+", "", "", 0, "VK_ADD")),
    ("NumpadEnter", None),
    ("Numpad1", None),
    ("Numpad2", None),
    ("Numpad3", None),
    ("Numpad4", None),
    ("Numpad5", None),
    ("Numpad6", None),
    ("Numpad7", None),
    ("Numpad8", None),
    ("Numpad9", None),
    ("Numpad0", None),
    ("NumpadDecimal", None),
    ("IntlBackslash", key("\\", "/", "", "", 0, "VK_OEM_102")),
    ("ContextMenu", None),
    ("Power", None),
    ("NumpadEqual", None),
    ("F13", None),
    ("F14", None),
    ("F15", None),
    ("F16", None),
    ("F17", None),
    ("F18", None),
    ("F19", None),
    ("F20", None),
    ("F21", None),
    ("F22", None),
    ("F23", None),
    ("F24", None),
    ("Help", None),
    ("Undo", None),
    ("Cut", None),
    ("Copy", None),
    ("Paste", None),
    ("AudioVolumeMute", None),
    ("AudioVolumeUp", None),
    ("AudioVolumeDown", None),
    ("NumpadComma", None),
    ("IntlRo", None),
    ("KanaMode", None),
    ("IntlYen", None),
    ("Convert", None),
    ("NonConvert", None),
    ("Lang1", None),
    ("Lang2", None),
    ("Lang3", None),
    ("Lang4", None),
    ("ControlLeft", None),
    ("ShiftLeft", None),
    ("AltLeft", None),
    ("MetaLeft", None),
    ("ControlRight", None),
    ("ShiftRight", None),
    ("AltRight", None),
    ("MetaRight", None),
    ("MediaTrackNext", None),
    ("MediaTrackPrevious", None),
    ("MediaStop", None),
    ("Eject", None),
    ("MediaPlayPause", None),
    ("MediaSelect", None),
    ("LaunchMail", None),
    ("LaunchApp2", None),
    ("LaunchApp1", None),
    ("BrowserSearch", None),
    ("BrowserHome", None),
    ("BrowserBack", None),
    ("BrowserForward", None),
    ("BrowserStop", None),
    ("BrowserRefresh", None),
    ("BrowserFavorites", None),
];

pub fn layout() -> KeyboardLayoutInfo {
    KeyboardLayoutInfo {
        layout: LAYOUT,
        secondary: Vec::new(),
        mapping: KeyMapping(MAPPING),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_are_cyrillic() {
        let mapping = layout().mapping;
        let a = mapping.get("KeyA").unwrap();
        assert_eq!((a.value, a.with_shift, a.vkey), ("ф", "Ф", "VK_A"));

        let z = mapping.get("KeyZ").unwrap();
        assert_eq!((z.value, z.with_shift), ("я", "Я"));
        assert_eq!(mapping.get("Backquote").unwrap().value, "ё");
    }

    #[test]
    fn test_ruble_sign_on_alt_gr_eight() {
        let mapping = layout().mapping;
        let eight = mapping.get("Digit8").unwrap();
        assert_eq!(eight.with_alt_gr, "₽");
        assert!(eight.has_alt_gr());

        let only_alt_gr: Vec<_> = mapping
            .producing()
            .filter(|(_, production)| production.has_alt_gr())
            .map(|(code, _)| code)
            .collect();
        assert_eq!(only_alt_gr, vec!["Digit8"]);
    }

    #[test]
    fn test_shifted_punctuation() {
        let mapping = layout().mapping;
        assert_eq!(mapping.get("Digit3").unwrap().with_shift, "№");
        assert_eq!(mapping.get("Slash").unwrap().value, ".");
        assert_eq!(mapping.get("Slash").unwrap().with_shift, ",");
        assert_eq!(mapping.get("Backslash").unwrap().value, "\\");
        assert_eq!(mapping.get("IntlBackslash").unwrap().vkey, "VK_OEM_102");
    }

    #[test]
    fn test_keys_without_output() {
        let mapping = layout().mapping;
        for code in ["Sleep", "Enter", "F1", "Numpad5", "BrowserFavorites"] {
            assert!(mapping.contains(code), "{} missing", code);
            assert!(mapping.get(code).is_none(), "{} should type nothing", code);
        }
        assert_eq!(mapping.get("Space").unwrap().vkey, "VK_SPACE");
        assert_eq!(mapping.get("NumpadAdd").unwrap().value, "+");
    }

    #[test]
    fn test_no_dead_keys() {
        assert!(layout()
            .mapping
            .producing()
            .all(|(_, production)| production.with_dead_keys_mask == 0));
    }
}
