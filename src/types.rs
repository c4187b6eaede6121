//! Common types shared across the element API
//!
//! The driver speaks lowercase keyword strings over its attribute files and
//! small integers inside the packed setup descriptor. Every enum here knows
//! both forms.
use crate::error::ElementError;
use std::{fmt, str::FromStr};

/// What kind of hardware resource an element claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// No element type. Only ever read back, never requested.
    None,
    Encoder,
    AnalogInput,
    Gpio,
    Activity,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::None => "none",
            ElementType::Encoder => "encoder",
            ElementType::AnalogInput => "analog_in",
            ElementType::Gpio => "gpio",
            ElementType::Activity => "activity",
        }
    }

    pub(crate) fn raw(self) -> u32 {
        match self {
            ElementType::None => 0,
            ElementType::Encoder => 1,
            ElementType::AnalogInput => 2,
            ElementType::Gpio => 3,
            ElementType::Activity => 4,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ElementType::None),
            1 => Some(ElementType::Encoder),
            2 => Some(ElementType::AnalogInput),
            3 => Some(ElementType::Gpio),
            4 => Some(ElementType::Activity),
            _ => None,
        }
    }
}

/// Pull resistor configuration of an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinPull {
    None,
    Up,
    Down,
}

impl PinPull {
    pub fn as_str(self) -> &'static str {
        match self {
            PinPull::None => "pull_none",
            PinPull::Up => "pull_up",
            PinPull::Down => "pull_down",
        }
    }

    pub(crate) fn raw(self) -> u32 {
        match self {
            PinPull::None => 0,
            PinPull::Up => 1,
            PinPull::Down => 2,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PinPull::None),
            1 => Some(PinPull::Up),
            2 => Some(PinPull::Down),
            _ => None,
        }
    }
}

/// I/O direction of a GPIO element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

impl PinDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PinDirection::Input => "in",
            PinDirection::Output => "out",
        }
    }

    pub(crate) fn raw(self) -> u32 {
        match self {
            PinDirection::Input => 0,
            PinDirection::Output => 1,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PinDirection::Input),
            1 => Some(PinDirection::Output),
            _ => None,
        }
    }
}

/// What an activity element indicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    MidiInput,
    MidiOutput,
}

impl Activity {
    pub fn as_str(self) -> &'static str {
        match self {
            Activity::MidiInput => "midi_in",
            Activity::MidiOutput => "midi_out",
        }
    }

    pub(crate) fn raw(self) -> u32 {
        match self {
            Activity::MidiInput => 0,
            Activity::MidiOutput => 1,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Activity::MidiInput),
            1 => Some(Activity::MidiOutput),
            _ => None,
        }
    }
}

/// How encoder and analog input values behave at the value range boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// The value is clamped to the range.
    Clamp,

    /// The value wraps over to the other boundary of the range.
    Wrap,
}

impl ValueMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueMode::Clamp => "clamp",
            ValueMode::Wrap => "wrap",
        }
    }
}

macro_rules! keyword_from_str {
    ($ty:ident, $($variant:ident),+) => {
        impl FromStr for $ty {
            type Err = ElementError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(ElementError::Parse(s.into()))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_from_str!(ElementType, None, Encoder, AnalogInput, Gpio, Activity);
keyword_from_str!(PinPull, None, Up, Down);
keyword_from_str!(PinDirection, Input, Output);
keyword_from_str!(Activity, MidiInput, MidiOutput);
keyword_from_str!(ValueMode, Clamp, Wrap);

/// Number of physical header pins the expander exposes.
pub const PIN_COUNT: usize = 37;

/// One of the 37 physical header pins.
///
/// The pins come in four contiguous sub-ranges: A27-A32, B03-B18, B23-B34
/// and B37-B39. Internally a pin is the index of its slot in that sequence,
/// which is also what the driver reports in the `pin` and `pin_b`
/// attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pin(u8);

static PIN_NAMES: [&str; PIN_COUNT] = [
    "A27", "A28", "A29", "A30", "A31", "A32", "B03", "B04", "B05", "B06",
    "B07", "B08", "B09", "B10", "B11", "B12", "B13", "B14", "B15", "B16",
    "B17", "B18", "B23", "B24", "B25", "B26", "B27", "B28", "B29", "B30",
    "B31", "B32", "B33", "B34", "B37", "B38", "B39",
];

macro_rules! pin_consts {
    ($($name:ident = $index:expr),+ $(,)?) => {
        impl Pin {
            $(pub const $name: Pin = Pin($index);)+
        }
    };
}

pin_consts! {
    A27 = 0, A28 = 1, A29 = 2, A30 = 3, A31 = 4, A32 = 5,
    B03 = 6, B04 = 7, B05 = 8, B06 = 9, B07 = 10, B08 = 11,
    B09 = 12, B10 = 13, B11 = 14, B12 = 15, B13 = 16, B14 = 17,
    B15 = 18, B16 = 19, B17 = 20, B18 = 21, B23 = 22, B24 = 23,
    B25 = 24, B26 = 25, B27 = 26, B28 = 27, B29 = 28, B30 = 29,
    B31 = 30, B32 = 31, B33 = 32, B34 = 33, B37 = 34, B38 = 35,
    B39 = 36,
}

impl Pin {
    /// Looks up a pin by its index in the driver's pin sequence.
    pub fn from_index(index: u8) -> Option<Pin> {
        if (index as usize) < PIN_COUNT {
            Some(Pin(index))
        } else {
            None
        }
    }

    /// The pin's index in the driver's pin sequence.
    pub fn index(self) -> u8 {
        self.0
    }

    /// Canonical two-letter/two-digit code, e.g. `"B03"`.
    pub fn as_str(self) -> &'static str {
        PIN_NAMES[self.0 as usize]
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pin {
    type Err = ElementError;

    /// Parses a pin code. The letter may be lowercase, the digits must
    /// match the canonical form exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.as_bytes();
        if b.len() != 3 || !b[1].is_ascii_digit() || !b[2].is_ascii_digit() {
            return Err(ElementError::Parse(s.into()));
        }
        let letter = b[0].to_ascii_uppercase();
        if letter != b'A' && letter != b'B' {
            return Err(ElementError::Parse(s.into()));
        }
        let canonical = [letter, b[1], b[2]];
        PIN_NAMES
            .iter()
            .position(|n| n.as_bytes() == canonical.as_slice())
            .map(|i| Pin(i as u8))
            .ok_or_else(|| ElementError::Parse(s.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_round_trip() {
        for i in 0..PIN_COUNT as u8 {
            let pin = Pin::from_index(i).unwrap();
            assert_eq!(pin.as_str().parse::<Pin>().unwrap(), pin);
        }
    }

    #[test]
    fn pin_lowercase_letter() {
        assert_eq!("b03".parse::<Pin>().unwrap(), Pin::B03);
        assert_eq!("a27".parse::<Pin>().unwrap(), Pin::A27);
    }

    #[test]
    fn pin_rejects_bad_codes() {
        for bad in ["", "B3", "B003", "C03", "B99", "B19", "A26", "Bxy"] {
            assert!(bad.parse::<Pin>().is_err(), "{bad:?} should not parse");
        }
        assert_eq!(Pin::from_index(PIN_COUNT as u8), None);
    }

    #[test]
    fn keyword_round_trip() {
        assert_eq!("pull_up".parse::<PinPull>().unwrap(), PinPull::Up);
        assert_eq!("in".parse::<PinDirection>().unwrap(), PinDirection::Input);
        assert_eq!("midi_out".parse::<Activity>().unwrap(), Activity::MidiOutput);
        assert_eq!("wrap".parse::<ValueMode>().unwrap(), ValueMode::Wrap);
        assert_eq!(
            "analog_in".parse::<ElementType>().unwrap(),
            ElementType::AnalogInput
        );
        assert!("pullup".parse::<PinPull>().is_err());
    }

    #[test]
    fn keyword_display() {
        assert_eq!(ElementType::Gpio.to_string(), "gpio");
        assert_eq!(PinPull::Down.to_string(), "pull_down");
        assert_eq!(Pin::B39.to_string(), "B39");
    }
}
