//! Error handling stuff
use displaydoc::Display;
use std::io;
use thiserror::Error;

/// Error type for element registry and protocol operations
#[derive(Debug, Display, Error)]
pub enum ElementError {
    /// IO Failed
    Io(#[from] io::Error),

    /// Invalid element name: `{0}`
    InvalidName(String),

    /// Invalid control root: `{0}`
    InvalidRoot(String),

    /// Invalid pin
    InvalidPin,

    /// Field does not apply to the element type being set up
    InvalidField,

    /// Unrecognized keyword from the driver: `{0}`
    Parse(String),

    /// Timed out waiting for the `{attr}` attribute to become accessible
    Timeout {
        attr: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = ElementError> = std::result::Result<T, E>;
