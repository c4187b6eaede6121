//! Element handles and attribute access
//!
//! An [`Element`] is a refcounted handle to one named resource claimed on
//! the driver side. Handles are cheap to clone; when the last one for a
//! registration is dropped, the element is removed from its context's set
//! and an unsetup request is issued. A failed unsetup is logged; the
//! in-process record is dropped either way, and the leftover driver-side
//! state can be cleaned up later with
//! [`Context::unsetup`](crate::context::Context::unsetup).
//!
//! All accessors read the live attribute files, not cached state, so they
//! reflect what the driver currently reports.
use crate::{
    context::ContextInner,
    error::{ElementError, Result},
    sysfs::{self, attr},
    types::{Activity, ElementType, Pin, PinDirection, PinPull, ValueMode},
};
use std::{
    fs::{File, OpenOptions},
    os::unix::io::{AsRawFd, RawFd},
    sync::Arc,
};

pub(crate) struct ElementInner {
    name: String,
    ctx: Arc<ContextInner>,
}

impl ElementInner {
    pub(crate) fn new(name: String, ctx: Arc<ContextInner>) -> Self {
        Self { name, ctx }
    }
}

impl Drop for ElementInner {
    fn drop(&mut self) {
        let ptr = self as *const ElementInner;
        self.ctx.release_element(&self.name, ptr);
    }
}

/// A refcounted handle to a named element.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.inner.name)
            .finish()
    }
}

/// An inclusive low/high pair used by the input and value ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub low: i32,
    pub high: i32,
}

/// Extended encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOpts {
    pub input_range: Range,
    pub value_range: Range,
    pub value_mode: ValueMode,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            input_range: Range { low: 0, high: 23 },
            value_range: Range { low: 0, high: 23 },
            value_mode: ValueMode::Clamp,
        }
    }
}

/// Extended analog input options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogInputOpts {
    pub input_range: Range,
    pub value_range: Range,
}

impl Default for AnalogInputOpts {
    fn default() -> Self {
        Self {
            input_range: Range { low: 0, high: 1023 },
            value_range: Range { low: 0, high: 1023 },
        }
    }
}

impl Element {
    pub(crate) fn from_inner(inner: Arc<ElementInner>) -> Self {
        Self { inner }
    }

    /// The element's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether two handles refer to the same registration.
    pub fn same_element(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn attr_str(&self, attr: &'static str) -> Result<String> {
        sysfs::read_attr_str(self.inner.ctx.root(), &self.inner.name, attr)
    }

    fn attr_int(&self, attr: &'static str) -> Result<i32> {
        sysfs::read_attr_int(self.inner.ctx.root(), &self.inner.name, attr)
    }

    fn attr_write_int(&self, attr: &'static str, value: i32) -> Result<()> {
        sysfs::write_attr_int(self.inner.ctx.root(), &self.inner.name, attr, value)
    }

    fn attr_pin(&self, attr: &'static str) -> Result<Pin> {
        let index = self.attr_int(attr)?;
        u8::try_from(index)
            .ok()
            .and_then(Pin::from_index)
            .ok_or(ElementError::InvalidPin)
    }

    /// The element type the driver reports.
    pub fn element_type(&self) -> Result<ElementType> {
        self.attr_str(attr::TYPE)?.parse()
    }

    /// The element's primary pin. For encoders this is pin A.
    pub fn pin(&self) -> Result<Pin> {
        self.attr_pin(attr::PIN)
    }

    /// The primary pin's code as the driver reports it, e.g. `"B03"`.
    pub fn pin_name(&self) -> Result<String> {
        self.attr_str(attr::PIN_NAME)
    }

    /// Direction of a GPIO element.
    pub fn gpio_direction(&self) -> Result<PinDirection> {
        self.attr_str(attr::DIRECTION)?.parse()
    }

    /// Pull of the primary pin, for encoders and input GPIOs.
    pub fn gpio_pull(&self) -> Result<PinPull> {
        self.attr_str(attr::PIN_PULL)?.parse()
    }

    /// Subtype of an activity element.
    pub fn activity_type(&self) -> Result<Activity> {
        self.attr_str(attr::ACTIVITY_TYPE)?.parse()
    }

    /// Pin B of an encoder element.
    pub fn encoder_pin_b(&self) -> Result<Pin> {
        self.attr_pin(attr::PIN_B)
    }

    /// Pin B's code as the driver reports it.
    pub fn encoder_pin_b_name(&self) -> Result<String> {
        self.attr_str(attr::PIN_B_NAME)
    }

    /// Pull of an encoder element's pin B.
    pub fn encoder_pin_b_pull(&self) -> Result<PinPull> {
        self.attr_str(attr::PIN_B_PULL)?.parse()
    }

    /// Reads the extended encoder options.
    pub fn encoder_opts(&self) -> Result<EncoderOpts> {
        Ok(EncoderOpts {
            input_range: Range {
                low: self.attr_int(attr::INPUT_MIN)?,
                high: self.attr_int(attr::INPUT_MAX)?,
            },
            value_range: Range {
                low: self.attr_int(attr::VALUE_LOW)?,
                high: self.attr_int(attr::VALUE_HIGH)?,
            },
            value_mode: self.attr_str(attr::VALUE_MODE)?.parse()?,
        })
    }

    /// Writes the extended encoder options.
    pub fn set_encoder_opts(&self, opts: &EncoderOpts) -> Result<()> {
        self.attr_write_int(attr::INPUT_MIN, opts.input_range.low)?;
        self.attr_write_int(attr::INPUT_MAX, opts.input_range.high)?;
        self.attr_write_int(attr::VALUE_LOW, opts.value_range.low)?;
        self.attr_write_int(attr::VALUE_HIGH, opts.value_range.high)?;
        sysfs::write_attr_str(
            self.inner.ctx.root(),
            &self.inner.name,
            attr::VALUE_MODE,
            opts.value_mode.as_str(),
        )
    }

    /// Reads the extended analog input options.
    pub fn analog_input_opts(&self) -> Result<AnalogInputOpts> {
        Ok(AnalogInputOpts {
            input_range: Range {
                low: self.attr_int(attr::INPUT_MIN)?,
                high: self.attr_int(attr::INPUT_MAX)?,
            },
            value_range: Range {
                low: self.attr_int(attr::VALUE_LOW)?,
                high: self.attr_int(attr::VALUE_HIGH)?,
            },
        })
    }

    /// Writes the extended analog input options.
    pub fn set_analog_input_opts(&self, opts: &AnalogInputOpts) -> Result<()> {
        self.attr_write_int(attr::INPUT_MIN, opts.input_range.low)?;
        self.attr_write_int(attr::INPUT_MAX, opts.input_range.high)?;
        self.attr_write_int(attr::VALUE_LOW, opts.value_range.low)?;
        self.attr_write_int(attr::VALUE_HIGH, opts.value_range.high)
    }

    /// One-shot read of the element's current value.
    pub fn value(&self) -> Result<i32> {
        self.attr_int(attr::VALUE)
    }

    /// One-shot write of the element's value.
    pub fn set_value(&self, value: i32) -> Result<()> {
        self.attr_write_int(attr::VALUE, value)
    }

    /// Opens a long-lived descriptor for the element's `value` attribute,
    /// for low-overhead repeated reads/writes or caller-side polling.
    pub fn open_value_fd(&self, opts: &OpenOptions) -> Result<ValueFd> {
        let file = sysfs::open_attr(self.inner.ctx.root(), &self.inner.name, attr::VALUE, opts)?;
        Ok(ValueFd { file })
    }
}

/// A long-lived descriptor for an element's `value` attribute.
///
/// Reads and writes behave exactly like the one-shot
/// [`Element::value`]/[`Element::set_value`] helpers; the raw descriptor is
/// exposed so callers can `poll(2)` it for value-change notification.
#[derive(Debug)]
pub struct ValueFd {
    file: File,
}

impl ValueFd {
    pub fn read(&self) -> Result<i32> {
        sysfs::read_value(&self.file)
    }

    pub fn write(&self, value: i32) -> Result<()> {
        sysfs::write_value(&self.file, value)
    }
}

impl AsRawFd for ValueFd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
