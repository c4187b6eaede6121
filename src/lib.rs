//! High level bindings to the Pisound Micro I/O expander sysfs interface
//!
//! # Implementation details
//!
//! The pisound-micro kernel driver exposes its I/O capabilities (GPIO
//! lines, analog inputs, rotary encoders and activity indicators) through
//! a textual control interface under `/sys/pisound-micro`. Resources are
//! claimed by writing a request to the `setup` file, released through the
//! `unsetup` file, and configured/read through per-element attribute files.
//!
//! This crate wraps that interface in a refcounted registry: bind a
//! [`context::Context`] against the control root, set up named elements
//! under it, and let the handles' drops release everything again. The
//! driver side owns the hardware; this library owns the userspace resource
//! lifecycle in front of it.
//!
//! ```rust,no_run
//! use upisnd::{context::Context, types::{Pin, PinPull}};
//!
//! let ctx = Context::bind()?;
//! let gpio = ctx.setup_gpio_input("b03in", Pin::B03, PinPull::Up)?;
//! println!("{} = {}", gpio.name(), gpio.value()?);
//! // Dropping `gpio` (and any clones) releases the line.
//! # Ok::<(), upisnd::error::ElementError>(())
//! ```
#![doc(html_root_url = "https://docs.rs/upisnd/0.1.0")]

pub mod context;
pub mod element;
pub mod error;
pub mod name;
pub mod setup;
pub mod types;

mod sysfs;
mod util;
