//! Remote-control key names understood by the device's keypress endpoint.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::error::Error;

/// A single remote-control key.
///
/// Named keys cover the physical remote (directional, playback, navigation,
/// and editing keys). [`Key::Literal`] presses an arbitrary character and is
/// what text entry is built from; it is sent as `Lit_<percent-encoded char>`
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Home,
    Rev,
    Fwd,
    Play,
    Select,
    Left,
    Right,
    Down,
    Up,
    Back,
    InstantReplay,
    Info,
    Backspace,
    Search,
    Enter,
    /// An arbitrary character press (text entry)
    Literal(char),
}

/// All named keys, in remote layout order. Used by the CLI for help output.
pub const NAMED_KEYS: &[Key] = &[
    Key::Home,
    Key::Rev,
    Key::Fwd,
    Key::Play,
    Key::Select,
    Key::Left,
    Key::Right,
    Key::Down,
    Key::Up,
    Key::Back,
    Key::InstantReplay,
    Key::Info,
    Key::Backspace,
    Key::Search,
    Key::Enter,
];

impl Key {
    /// The name of a named key as the device expects it, or `None` for a
    /// literal character press.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Key::Home => Some("Home"),
            Key::Rev => Some("Rev"),
            Key::Fwd => Some("Fwd"),
            Key::Play => Some("Play"),
            Key::Select => Some("Select"),
            Key::Left => Some("Left"),
            Key::Right => Some("Right"),
            Key::Down => Some("Down"),
            Key::Up => Some("Up"),
            Key::Back => Some("Back"),
            Key::InstantReplay => Some("InstantReplay"),
            Key::Info => Some("Info"),
            Key::Backspace => Some("Backspace"),
            Key::Search => Some("Search"),
            Key::Enter => Some("Enter"),
            Key::Literal(_) => None,
        }
    }

    /// Render the path segment for the keypress endpoint.
    ///
    /// Named keys use their name verbatim; literal characters become
    /// `Lit_<percent-encoded char>` so that spaces and punctuation survive
    /// the URL path.
    pub fn request_segment(&self) -> String {
        match self {
            Key::Literal(c) => {
                let mut buf = [0u8; 4];
                let encoded = utf8_percent_encode(c.encode_utf8(&mut buf), NON_ALPHANUMERIC);
                format!("Lit_{}", encoded)
            }
            named => named.name().expect("named key").to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request_segment())
    }
}

impl FromStr for Key {
    type Err = Error;

    /// Parse a key from user input. Named keys match case-insensitively;
    /// any single character parses as a literal press.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for key in NAMED_KEYS {
            if key.name().is_some_and(|n| n.eq_ignore_ascii_case(s)) {
                return Ok(*key);
            }
        }

        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Key::Literal(c)),
            _ => Err(Error::unknown_key(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_key_segments() {
        assert_eq!(Key::Home.request_segment(), "Home");
        assert_eq!(Key::InstantReplay.request_segment(), "InstantReplay");
        assert_eq!(Key::Enter.request_segment(), "Enter");
    }

    #[test]
    fn test_literal_key_segments() {
        assert_eq!(Key::Literal('A').request_segment(), "Lit_A");
        assert_eq!(Key::Literal(' ').request_segment(), "Lit_%20");
        assert_eq!(Key::Literal('&').request_segment(), "Lit_%26");
    }

    #[test]
    fn test_literal_key_multibyte() {
        // Non-ASCII characters must be fully percent-encoded
        let segment = Key::Literal('é').request_segment();
        assert_eq!(segment, "Lit_%C3%A9");
    }

    #[test]
    fn test_parse_named_keys() {
        assert_eq!("Home".parse::<Key>().unwrap(), Key::Home);
        assert_eq!("home".parse::<Key>().unwrap(), Key::Home);
        assert_eq!("INSTANTREPLAY".parse::<Key>().unwrap(), Key::InstantReplay);
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!("x".parse::<Key>().unwrap(), Key::Literal('x'));
        assert_eq!("7".parse::<Key>().unwrap(), Key::Literal('7'));
    }

    #[test]
    fn test_parse_unknown_key() {
        let err = "NoSuchKey".parse::<Key>().unwrap_err();
        assert!(matches!(err, Error::UnknownKey { .. }));
    }

    #[test]
    fn test_all_named_keys_have_names() {
        for key in NAMED_KEYS {
            assert!(key.name().is_some(), "{:?} missing a name", key);
        }
    }
}
