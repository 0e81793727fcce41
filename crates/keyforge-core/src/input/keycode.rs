// Keyforge Key Codes
// Bidirectional mapping between key names and Linux input-event codes

use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical key names and their `KEY_*` codes from linux/input-event-codes.h.
/// A code appears once; its entry here is the name reported for it.
const KEY_CODES: &[(&str, u16)] = &[
    ("esc", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("-", 12),
    ("=", 13),
    ("backspace", 14),
    ("tab", 15),
    ("q", 16),
    ("w", 17),
    ("e", 18),
    ("r", 19),
    ("t", 20),
    ("y", 21),
    ("u", 22),
    ("i", 23),
    ("o", 24),
    ("p", 25),
    ("[", 26),
    ("]", 27),
    ("enter", 28),
    ("ctrl", 29),
    ("a", 30),
    ("s", 31),
    ("d", 32),
    ("f", 33),
    ("g", 34),
    ("h", 35),
    ("j", 36),
    ("k", 37),
    ("l", 38),
    (";", 39),
    ("'", 40),
    ("`", 41),
    ("shift", 42),
    ("\\", 43),
    ("z", 44),
    ("x", 45),
    ("c", 46),
    ("v", 47),
    ("b", 48),
    ("n", 49),
    ("m", 50),
    (",", 51),
    (".", 52),
    ("/", 53),
    ("right shift", 54),
    ("num *", 55),
    ("alt", 56),
    ("space", 57),
    ("caps lock", 58),
    ("f1", 59),
    ("f2", 60),
    ("f3", 61),
    ("f4", 62),
    ("f5", 63),
    ("f6", 64),
    ("f7", 65),
    ("f8", 66),
    ("f9", 67),
    ("f10", 68),
    ("num lock", 69),
    ("scroll lock", 70),
    ("num 7", 71),
    ("num 8", 72),
    ("num 9", 73),
    ("num -", 74),
    ("num 4", 75),
    ("num 5", 76),
    ("num 6", 77),
    ("num +", 78),
    ("num 1", 79),
    ("num 2", 80),
    ("num 3", 81),
    ("num 0", 82),
    ("num .", 83),
    ("f11", 87),
    ("f12", 88),
    ("num enter", 96),
    ("right ctrl", 97),
    ("num /", 98),
    ("print screen", 99),
    ("right alt", 100),
    ("home", 102),
    ("up", 103),
    ("page up", 104),
    ("left", 105),
    ("right", 106),
    ("end", 107),
    ("down", 108),
    ("page down", 109),
    ("insert", 110),
    ("delete", 111),
    ("pause", 119),
    ("windows", 125),
    ("right windows", 126),
    ("menu", 127),
];

/// Alternative spellings and the canonical name they stand for
const ALIASES: &[(&str, &str)] = &[
    ("escape", "esc"),
    ("return", "enter"),
    ("control", "ctrl"),
    ("left ctrl", "ctrl"),
    ("left control", "ctrl"),
    ("right control", "right ctrl"),
    ("left shift", "shift"),
    ("left alt", "alt"),
    ("alt gr", "right alt"),
    ("altgr", "right alt"),
    ("win", "windows"),
    ("left windows", "windows"),
    ("super", "windows"),
    ("meta", "windows"),
    ("capslock", "caps lock"),
    ("numlock", "num lock"),
    ("pgup", "page up"),
    ("pgdn", "page down"),
    ("del", "delete"),
    ("ins", "insert"),
    ("spacebar", "space"),
    ("minus", "-"),
    ("equal", "="),
    ("comma", ","),
    ("period", "."),
    ("slash", "/"),
    ("backslash", "\\"),
    ("semicolon", ";"),
    ("apostrophe", "'"),
    ("grave", "`"),
    ("prtsc", "print screen"),
];

fn name_to_code() -> &'static HashMap<&'static str, u16> {
    static NAME_TO_CODE: OnceLock<HashMap<&'static str, u16>> = OnceLock::new();
    NAME_TO_CODE.get_or_init(|| {
        let mut map: HashMap<&'static str, u16> = KEY_CODES.iter().copied().collect();
        for &(alias, canonical) in ALIASES {
            if let Some(code) = map.get(canonical).copied() {
                map.insert(alias, code);
            }
        }
        map
    })
}

fn code_to_name() -> &'static HashMap<u16, &'static str> {
    static CODE_TO_NAME: OnceLock<HashMap<u16, &'static str>> = OnceLock::new();
    CODE_TO_NAME.get_or_init(|| KEY_CODES.iter().map(|&(name, code)| (code, name)).collect())
}

/// Code for a normalized key name (see [`crate::KeyName`])
pub fn code_for(name: &str) -> Option<u16> {
    name_to_code().get(name).copied()
}

/// Canonical name for a code, or `None` for keys with no name
pub fn name_for(code: u16) -> Option<&'static str> {
    code_to_name().get(&code).copied()
}

/// Every canonical name, in code order
pub fn known_names() -> impl Iterator<Item = &'static str> {
    KEY_CODES.iter().map(|(name, _)| *name)
}
