//! The packed setup descriptor and its typed counterpart
//!
//! The driver's setup channel understands a 32-bit configuration value with
//! non-overlapping bit ranges per field. [`Setup`] manipulates that value
//! directly, enforcing the driver's field-validity rules; [`SetupConfig`] is
//! the tagged representation meant for construction, serialized to and from
//! the packed form only at the protocol boundary.
use crate::{
    error::{ElementError, Result},
    types::{Activity, ElementType, Pin, PinDirection, PinPull},
};

// Field layout, as the driver decodes it. GPIO and encoder/activity fields
// overlap above bit 10; which interpretation applies depends on the element
// type in bits 0..3.
const TYPE_SHIFT: u32 = 0;
const TYPE_BITS: u32 = 3;
const PIN_SHIFT: u32 = 3;
const PIN_BITS: u32 = 8;
const GPIO_PULL_SHIFT: u32 = 11;
const GPIO_PULL_BITS: u32 = 2;
const GPIO_OUTPUT_SHIFT: u32 = 12;
const GPIO_OUTPUT_BITS: u32 = 1;
const GPIO_DIR_SHIFT: u32 = 13;
const GPIO_DIR_BITS: u32 = 1;
const ENCODER_PIN_B_SHIFT: u32 = 13;
const ENCODER_PIN_B_BITS: u32 = 8;
const ENCODER_PIN_B_PULL_SHIFT: u32 = 21;
const ENCODER_PIN_B_PULL_BITS: u32 = 2;
const ACTIVITY_SHIFT: u32 = 11;
const ACTIVITY_BITS: u32 = 2;

/// The packed 32-bit element configuration exchanged with the driver.
///
/// The element type must be set before any other field; setting it zeroes
/// the rest of the value. Every other setter is rejected when the current
/// type (or, for GPIO fields, the current direction) does not admit the
/// field, and the matching getter returns [`None`] in the same situations
/// rather than a default. Check the type before trusting a getter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Setup(u32);

impl Setup {
    /// Starts a descriptor of the given element type with all other fields
    /// zeroed.
    pub fn new(element_type: ElementType) -> Setup {
        let mut setup = Setup(0);
        setup.put(TYPE_SHIFT, TYPE_BITS, element_type.raw());
        setup
    }

    /// Reconstructs a descriptor from its raw wire value.
    pub fn from_raw(raw: u32) -> Setup {
        Setup(raw)
    }

    /// The raw wire value.
    pub fn raw(self) -> u32 {
        self.0
    }

    fn field(self, shift: u32, bits: u32) -> u32 {
        (self.0 >> shift) & ((1 << bits) - 1)
    }

    fn put(&mut self, shift: u32, bits: u32, value: u32) {
        let mask = ((1 << bits) - 1) << shift;
        self.0 = (self.0 & !mask) | ((value << shift) & mask);
    }

    /// Resets the descriptor to the given element type, zeroing all other
    /// fields.
    pub fn set_element_type(&mut self, element_type: ElementType) {
        *self = Setup::new(element_type);
    }

    pub fn element_type(self) -> Option<ElementType> {
        ElementType::from_raw(self.field(TYPE_SHIFT, TYPE_BITS))
    }

    fn has_pin(self) -> bool {
        matches!(
            self.element_type(),
            Some(ElementType::Encoder)
                | Some(ElementType::AnalogInput)
                | Some(ElementType::Gpio)
                | Some(ElementType::Activity)
        )
    }

    fn pull_applies(self) -> bool {
        match self.element_type() {
            Some(ElementType::Encoder) => true,
            Some(ElementType::Gpio) => {
                self.field(GPIO_DIR_SHIFT, GPIO_DIR_BITS) == PinDirection::Input.raw()
            }
            _ => false,
        }
    }

    /// The primary pin. For encoders this is pin A.
    pub fn pin(self) -> Option<Pin> {
        if self.has_pin() {
            Pin::from_index(self.field(PIN_SHIFT, PIN_BITS) as u8)
        } else {
            None
        }
    }

    pub fn set_pin(&mut self, pin: Pin) -> Result<()> {
        if !self.has_pin() {
            return Err(ElementError::InvalidField);
        }
        self.put(PIN_SHIFT, PIN_BITS, pin.index() as u32);
        Ok(())
    }

    /// Pull of the primary pin. Applies to encoders and input GPIOs.
    pub fn gpio_pull(self) -> Option<PinPull> {
        if self.pull_applies() {
            PinPull::from_raw(self.field(GPIO_PULL_SHIFT, GPIO_PULL_BITS))
        } else {
            None
        }
    }

    pub fn set_gpio_pull(&mut self, pull: PinPull) -> Result<()> {
        if !self.pull_applies() {
            return Err(ElementError::InvalidField);
        }
        self.put(GPIO_PULL_SHIFT, GPIO_PULL_BITS, pull.raw());
        Ok(())
    }

    pub fn gpio_dir(self) -> Option<PinDirection> {
        if self.element_type() == Some(ElementType::Gpio) {
            PinDirection::from_raw(self.field(GPIO_DIR_SHIFT, GPIO_DIR_BITS))
        } else {
            None
        }
    }

    pub fn set_gpio_dir(&mut self, dir: PinDirection) -> Result<()> {
        if self.element_type() != Some(ElementType::Gpio) {
            return Err(ElementError::InvalidField);
        }
        self.put(GPIO_DIR_SHIFT, GPIO_DIR_BITS, dir.raw());
        Ok(())
    }

    /// Initial level of an output GPIO.
    pub fn gpio_output(self) -> Option<bool> {
        if self.gpio_dir() == Some(PinDirection::Output) {
            Some(self.field(GPIO_OUTPUT_SHIFT, GPIO_OUTPUT_BITS) != 0)
        } else {
            None
        }
    }

    pub fn set_gpio_output(&mut self, high: bool) -> Result<()> {
        if self.gpio_dir() != Some(PinDirection::Output) {
            return Err(ElementError::InvalidField);
        }
        self.put(GPIO_OUTPUT_SHIFT, GPIO_OUTPUT_BITS, high as u32);
        Ok(())
    }

    pub fn encoder_pin_b(self) -> Option<Pin> {
        if self.element_type() == Some(ElementType::Encoder) {
            Pin::from_index(self.field(ENCODER_PIN_B_SHIFT, ENCODER_PIN_B_BITS) as u8)
        } else {
            None
        }
    }

    pub fn set_encoder_pin_b(&mut self, pin: Pin) -> Result<()> {
        if self.element_type() != Some(ElementType::Encoder) {
            return Err(ElementError::InvalidField);
        }
        self.put(ENCODER_PIN_B_SHIFT, ENCODER_PIN_B_BITS, pin.index() as u32);
        Ok(())
    }

    pub fn encoder_pin_b_pull(self) -> Option<PinPull> {
        if self.element_type() == Some(ElementType::Encoder) {
            PinPull::from_raw(self.field(ENCODER_PIN_B_PULL_SHIFT, ENCODER_PIN_B_PULL_BITS))
        } else {
            None
        }
    }

    pub fn set_encoder_pin_b_pull(&mut self, pull: PinPull) -> Result<()> {
        if self.element_type() != Some(ElementType::Encoder) {
            return Err(ElementError::InvalidField);
        }
        self.put(ENCODER_PIN_B_PULL_SHIFT, ENCODER_PIN_B_PULL_BITS, pull.raw());
        Ok(())
    }

    pub fn activity_type(self) -> Option<Activity> {
        if self.element_type() == Some(ElementType::Activity) {
            Activity::from_raw(self.field(ACTIVITY_SHIFT, ACTIVITY_BITS))
        } else {
            None
        }
    }

    pub fn set_activity_type(&mut self, activity: Activity) -> Result<()> {
        if self.element_type() != Some(ElementType::Activity) {
            return Err(ElementError::InvalidField);
        }
        self.put(ACTIVITY_SHIFT, ACTIVITY_BITS, activity.raw());
        Ok(())
    }
}

/// Direction-specific configuration of a GPIO element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioDir {
    /// Input with the given pull resistor configuration.
    Input(PinPull),

    /// Output with the given initial level.
    Output(bool),
}

/// Typed element configuration.
///
/// Construct one of these and hand it to
/// [`Context::setup`](crate::context::Context::setup); the packed
/// [`Setup`] form only matters when a raw wire value needs to be stored or
/// exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupConfig {
    Encoder {
        pin_a: Pin,
        pull_a: PinPull,
        pin_b: Pin,
        pull_b: PinPull,
    },
    AnalogInput {
        pin: Pin,
    },
    Gpio {
        pin: Pin,
        dir: GpioDir,
    },
    Activity {
        pin: Pin,
        kind: Activity,
    },
}

impl SetupConfig {
    pub fn element_type(&self) -> ElementType {
        match self {
            SetupConfig::Encoder { .. } => ElementType::Encoder,
            SetupConfig::AnalogInput { .. } => ElementType::AnalogInput,
            SetupConfig::Gpio { .. } => ElementType::Gpio,
            SetupConfig::Activity { .. } => ElementType::Activity,
        }
    }

    /// Serializes into the packed wire descriptor.
    pub fn encode(&self) -> Setup {
        let mut s = Setup::new(self.element_type());
        match *self {
            SetupConfig::Encoder {
                pin_a,
                pull_a,
                pin_b,
                pull_b,
            } => {
                s.put(PIN_SHIFT, PIN_BITS, pin_a.index() as u32);
                s.put(GPIO_PULL_SHIFT, GPIO_PULL_BITS, pull_a.raw());
                s.put(ENCODER_PIN_B_SHIFT, ENCODER_PIN_B_BITS, pin_b.index() as u32);
                s.put(ENCODER_PIN_B_PULL_SHIFT, ENCODER_PIN_B_PULL_BITS, pull_b.raw());
            }
            SetupConfig::AnalogInput { pin } => {
                s.put(PIN_SHIFT, PIN_BITS, pin.index() as u32);
            }
            SetupConfig::Gpio { pin, dir } => {
                s.put(PIN_SHIFT, PIN_BITS, pin.index() as u32);
                match dir {
                    GpioDir::Input(pull) => {
                        s.put(GPIO_DIR_SHIFT, GPIO_DIR_BITS, PinDirection::Input.raw());
                        s.put(GPIO_PULL_SHIFT, GPIO_PULL_BITS, pull.raw());
                    }
                    GpioDir::Output(high) => {
                        s.put(GPIO_DIR_SHIFT, GPIO_DIR_BITS, PinDirection::Output.raw());
                        s.put(GPIO_OUTPUT_SHIFT, GPIO_OUTPUT_BITS, high as u32);
                    }
                }
            }
            SetupConfig::Activity { pin, kind } => {
                s.put(PIN_SHIFT, PIN_BITS, pin.index() as u32);
                s.put(ACTIVITY_SHIFT, ACTIVITY_BITS, kind.raw());
            }
        }
        s
    }

    /// Renders the kind-command written to the setup control file, without
    /// the leading element name.
    pub fn command(&self) -> String {
        match *self {
            SetupConfig::Encoder {
                pin_a,
                pull_a,
                pin_b,
                pull_b,
            } => format!(
                "encoder {} {} {} {}",
                pin_a,
                pull_a.as_str(),
                pin_b,
                pull_b.as_str()
            ),
            // The trailing space is part of the accepted request form.
            SetupConfig::AnalogInput { pin } => format!("analog_in {} ", pin),
            SetupConfig::Gpio {
                pin,
                dir: GpioDir::Input(pull),
            } => format!("gpio {} input {}", pin, pull.as_str()),
            SetupConfig::Gpio {
                pin,
                dir: GpioDir::Output(high),
            } => format!("gpio {} output {}", pin, u8::from(high)),
            SetupConfig::Activity { pin, kind } => {
                format!("activity_{} {}", kind.as_str(), pin)
            }
        }
    }
}

impl TryFrom<Setup> for SetupConfig {
    type Error = ElementError;

    fn try_from(setup: Setup) -> Result<Self> {
        let pin = setup.pin().ok_or(ElementError::InvalidPin)?;
        match setup.element_type() {
            Some(ElementType::Encoder) => Ok(SetupConfig::Encoder {
                pin_a: pin,
                pull_a: setup.gpio_pull().ok_or(ElementError::InvalidField)?,
                pin_b: setup.encoder_pin_b().ok_or(ElementError::InvalidPin)?,
                pull_b: setup.encoder_pin_b_pull().ok_or(ElementError::InvalidField)?,
            }),
            Some(ElementType::AnalogInput) => Ok(SetupConfig::AnalogInput { pin }),
            Some(ElementType::Gpio) => {
                let dir = match setup.gpio_dir().ok_or(ElementError::InvalidField)? {
                    PinDirection::Input => GpioDir::Input(
                        setup.gpio_pull().ok_or(ElementError::InvalidField)?,
                    ),
                    PinDirection::Output => GpioDir::Output(
                        setup.gpio_output().ok_or(ElementError::InvalidField)?,
                    ),
                };
                Ok(SetupConfig::Gpio { pin, dir })
            }
            Some(ElementType::Activity) => Ok(SetupConfig::Activity {
                pin,
                kind: setup.activity_type().ok_or(ElementError::InvalidField)?,
            }),
            _ => Err(ElementError::InvalidField),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_rejected_before_type() {
        let mut s = Setup::default();
        assert!(s.set_pin(Pin::B03).is_err());
        assert!(s.set_gpio_pull(PinPull::Up).is_err());
        assert!(s.set_activity_type(Activity::MidiInput).is_err());
    }

    #[test]
    fn setting_type_zeroes_fields() {
        let mut s = Setup::new(ElementType::Gpio);
        s.set_pin(Pin::B39).unwrap();
        s.set_gpio_dir(PinDirection::Output).unwrap();
        s.set_gpio_output(true).unwrap();
        s.set_element_type(ElementType::Encoder);
        assert_eq!(s.raw(), ElementType::Encoder.raw());
    }

    #[test]
    fn gpio_field_validity() {
        let mut s = Setup::new(ElementType::Gpio);
        s.set_pin(Pin::B03).unwrap();
        s.set_gpio_dir(PinDirection::Input).unwrap();
        s.set_gpio_pull(PinPull::Up).unwrap();
        assert_eq!(s.gpio_pull(), Some(PinPull::Up));
        assert_eq!(s.gpio_output(), None);
        assert!(s.set_gpio_output(true).is_err());

        s.set_gpio_dir(PinDirection::Output).unwrap();
        assert_eq!(s.gpio_pull(), None);
        assert!(s.set_gpio_pull(PinPull::Down).is_err());
        s.set_gpio_output(true).unwrap();
        assert_eq!(s.gpio_output(), Some(true));

        assert_eq!(s.encoder_pin_b(), None);
        assert!(s.set_encoder_pin_b(Pin::B04).is_err());
        assert_eq!(s.activity_type(), None);
    }

    #[test]
    fn encoder_round_trip() {
        let mut s = Setup::new(ElementType::Encoder);
        s.set_pin(Pin::B03).unwrap();
        s.set_gpio_pull(PinPull::Up).unwrap();
        s.set_encoder_pin_b(Pin::B04).unwrap();
        s.set_encoder_pin_b_pull(PinPull::Down).unwrap();

        assert_eq!(s.pin(), Some(Pin::B03));
        assert_eq!(s.gpio_pull(), Some(PinPull::Up));
        assert_eq!(s.encoder_pin_b(), Some(Pin::B04));
        assert_eq!(s.encoder_pin_b_pull(), Some(PinPull::Down));
        assert_eq!(s.gpio_dir(), None);
        assert_eq!(s.gpio_output(), None);
    }

    #[test]
    fn config_round_trip() {
        let configs = [
            SetupConfig::Encoder {
                pin_a: Pin::B03,
                pull_a: PinPull::Up,
                pin_b: Pin::B04,
                pull_b: PinPull::Down,
            },
            SetupConfig::AnalogInput { pin: Pin::A27 },
            SetupConfig::Gpio {
                pin: Pin::B18,
                dir: GpioDir::Input(PinPull::None),
            },
            SetupConfig::Gpio {
                pin: Pin::B23,
                dir: GpioDir::Output(true),
            },
            SetupConfig::Activity {
                pin: Pin::B39,
                kind: Activity::MidiOutput,
            },
        ];
        for config in configs {
            let decoded = SetupConfig::try_from(config.encode()).unwrap();
            assert_eq!(decoded, config);
        }
    }

    #[test]
    fn decode_rejects_unconfigured() {
        assert!(SetupConfig::try_from(Setup::default()).is_err());
        assert!(SetupConfig::try_from(Setup::new(ElementType::None)).is_err());
    }

    #[test]
    fn commands() {
        let enc = SetupConfig::Encoder {
            pin_a: Pin::B03,
            pull_a: PinPull::Up,
            pin_b: Pin::B04,
            pull_b: PinPull::Down,
        };
        assert_eq!(enc.command(), "encoder B03 pull_up B04 pull_down");
        assert_eq!(
            SetupConfig::AnalogInput { pin: Pin::A27 }.command(),
            "analog_in A27 "
        );
        assert_eq!(
            SetupConfig::Gpio {
                pin: Pin::B03,
                dir: GpioDir::Input(PinPull::Up),
            }
            .command(),
            "gpio B03 input pull_up"
        );
        assert_eq!(
            SetupConfig::Gpio {
                pin: Pin::B05,
                dir: GpioDir::Output(false),
            }
            .command(),
            "gpio B05 output 0"
        );
        assert_eq!(
            SetupConfig::Activity {
                pin: Pin::B39,
                kind: Activity::MidiInput,
            }
            .command(),
            "activity_midi_in B39"
        );
    }
}
