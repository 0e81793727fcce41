// Keyforge Key Names
// Platform-neutral key identifiers, compared case-insensitively

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

/// A platform-neutral key identifier such as `"alt"`, `"f5"` or `"num 1"`.
///
/// The name is normalized on construction (trimmed, lowercased, runs of
/// whitespace collapsed to a single space), so two names are equal exactly
/// when they refer to the same token regardless of how the user typed them.
/// The string is shared, so clones are a reference-count bump and the
/// dispatch path never allocates.
#[derive(Clone)]
pub struct KeyName(Arc<str>);

impl KeyName {
    /// Create a key name, normalizing the input
    pub fn new(name: &str) -> Self {
        Self(Arc::from(Self::normalize(name)))
    }

    /// Normalize a raw key token
    pub fn normalize(name: &str) -> String {
        name.split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalized form of a lookup key, borrowing when it already is one
    ///
    /// The hook reports lowercase names, so the dispatch path normally
    /// takes the borrowed branch and never allocates.
    pub fn normalized(name: &str) -> Cow<'_, str> {
        if Self::is_normalized(name) {
            Cow::Borrowed(name)
        } else {
            Cow::Owned(Self::normalize(name))
        }
    }

    fn is_normalized(name: &str) -> bool {
        let mut after_space = true;
        for c in name.chars() {
            if c.is_whitespace() {
                if c != ' ' || after_space {
                    return false;
                }
                after_space = true;
            } else {
                let unchanged = if c.is_ascii() {
                    !c.is_ascii_uppercase()
                } else {
                    let mut lower = c.to_lowercase();
                    lower.len() == 1 && lower.next() == Some(c)
                };
                if !unchanged {
                    return false;
                }
                after_space = false;
            }
        }
        !after_space || name.is_empty()
    }

    /// The normalized token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for a name that normalized to nothing
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for KeyName {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for KeyName {}

impl Hash for KeyName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with `str`'s Hash for the Borrow<str> lookups
        self.as_str().hash(state);
    }
}

impl PartialOrd for KeyName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Borrow<str> for KeyName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for KeyName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyName({:?})", self.as_str())
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for KeyName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for KeyName {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl FromStr for KeyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = Self::new(s);
        if name.is_empty() {
            Err("Key name must not be empty".to_string())
        } else {
            Ok(name)
        }
    }
}

/// A group of well-known key names, for help output and key pickers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGroup {
    pub title: &'static str,
    pub keys: &'static [&'static str],
}

/// Key names users most often remap, grouped by category
pub const COMMON_KEYS: &[KeyGroup] = &[
    KeyGroup {
        title: "Letters",
        keys: &[
            "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q",
            "r", "s", "t", "u", "v", "w", "x", "y", "z",
        ],
    },
    KeyGroup {
        title: "Digits",
        keys: &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"],
    },
    KeyGroup {
        title: "Function keys",
        keys: &[
            "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
        ],
    },
    KeyGroup {
        title: "Modifiers",
        keys: &["shift", "ctrl", "alt", "caps lock", "tab", "esc"],
    },
    KeyGroup {
        title: "Navigation",
        keys: &["up", "down", "left", "right", "home", "end", "page up", "page down"],
    },
    KeyGroup {
        title: "Special",
        keys: &["space", "enter", "backspace", "delete", "insert"],
    },
    KeyGroup {
        title: "Numeric keypad",
        keys: &[
            "num 0", "num 1", "num 2", "num 3", "num 4", "num 5", "num 6", "num 7", "num 8",
            "num 9", "num lock", "num /", "num *", "num -", "num +", "num enter", "num .",
        ],
    },
    KeyGroup {
        title: "Punctuation",
        keys: &[".", ",", ";", "'", "[", "]", "\\", "-", "=", "`"],
    },
];
