//! Utility constants

/// The control root the pisound-micro kernel driver mounts its textual
/// interface under.
///
/// The driver always uses this path, but the registry accepts an explicit
/// root so tests and maintenance tooling can bind somewhere else.
pub(crate) const DEFAULT_ROOT: &str = "/sys/pisound-micro";

/// Maximum length of a control root path, in bytes.
///
/// Inherited from the driver's request parser, which sizes its buffers
/// around this.
pub(crate) const MAX_ROOT_LEN: usize = 64;

/// Maximum length of an element name, in bytes.
pub(crate) const MAX_NAME_LEN: usize = 63;
