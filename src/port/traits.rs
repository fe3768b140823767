//! Core traits and line-settings types for serial port abstraction.
//!
//! Defines the platform-neutral `PortConfiguration` and the `SerialPortAdapter`
//! trait implemented once per platform (and by the in-memory mock), so callers
//! see one interface regardless of OS.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! baud_rates {
    ($($variant:ident = $rate:literal),+ $(,)?) => {
        /// Line speed in bits per second.
        ///
        /// The named variants cover the rates most drivers tabulate. Anything else
        /// is carried as `Custom` and goes through the platform's arbitrary-rate path.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "u32", into = "u32")]
        pub enum BaudRate {
            $($variant,)+
            Custom(u32),
        }

        impl BaudRate {
            /// Every named rate, slowest first.
            pub const STANDARD: &'static [BaudRate] = &[$(BaudRate::$variant),+];

            /// The rate as an integer.
            pub const fn as_u32(self) -> u32 {
                match self {
                    $(BaudRate::$variant => $rate,)+
                    BaudRate::Custom(rate) => rate,
                }
            }
        }

        impl From<u32> for BaudRate {
            fn from(rate: u32) -> Self {
                match rate {
                    $($rate => BaudRate::$variant,)+
                    other => BaudRate::Custom(other),
                }
            }
        }
    };
}

baud_rates! {
    B50 = 50,
    B75 = 75,
    B110 = 110,
    B134 = 134,
    B150 = 150,
    B200 = 200,
    B300 = 300,
    B600 = 600,
    B1200 = 1200,
    B1800 = 1800,
    B2400 = 2400,
    B4800 = 4800,
    B9600 = 9600,
    B19200 = 19200,
    B38400 = 38400,
    B57600 = 57600,
    B115200 = 115200,
    B230400 = 230400,
    B460800 = 460800,
    B500000 = 500000,
    B576000 = 576000,
    B921600 = 921600,
    B1000000 = 1000000,
    B1152000 = 1152000,
    B1500000 = 1500000,
    B2000000 = 2000000,
    B2500000 = 2500000,
    B3000000 = 3000000,
    B3500000 = 3500000,
    B4000000 = 4000000,
}

impl BaudRate {
    /// Whether the rate falls outside the named table.
    ///
    /// `Custom(9600)` is normalised by `From<u32>` but may still be built by
    /// hand, so the check is on the value rather than the variant.
    pub fn is_custom(self) -> bool {
        matches!(BaudRate::from(self.as_u32()), BaudRate::Custom(_))
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.as_u32()
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Line settings for a serial port.
///
/// Nothing is validated at construction. Whether a combination is representable
/// depends on the platform and is decided by `SerialPortAdapter::configure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfiguration {
    /// Output (and, unless overridden, input) speed.
    pub baud_rate: BaudRate,

    /// Input speed when it differs from `baud_rate`.
    pub input_baud_rate: Option<BaudRate>,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::B9600,
            input_baud_rate: None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
        }
    }
}

impl PortConfiguration {
    /// Default 8N1 settings at the given rate.
    pub fn new(baud_rate: impl Into<BaudRate>) -> Self {
        Self {
            baud_rate: baud_rate.into(),
            ..Self::default()
        }
    }

    pub fn with_input_baud_rate(mut self, rate: impl Into<BaudRate>) -> Self {
        self.input_baud_rate = Some(rate.into());
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    /// The input speed actually applied: `input_baud_rate`, else `baud_rate`.
    pub fn effective_input_baud(&self) -> BaudRate {
        self.input_baud_rate.unwrap_or(self.baud_rate)
    }
}

impl fmt::Display for PortConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate,
            self.data_bits.bits(),
            parity,
            self.stop_bits.bits()
        )?;
        if let Some(input) = self.input_baud_rate {
            write!(f, " (in {input})")?;
        }
        match self.flow_control {
            FlowControl::None => Ok(()),
            FlowControl::Software => write!(f, " xon/xoff"),
            FlowControl::Hardware => write!(f, " rts/cts"),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    pub const fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = PortError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid data bits: {bits}"),
            ))),
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    /// XON/XOFF in both directions.
    Software,
    /// RTS/CTS line pacing.
    Hardware,
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
    /// Parity bit always 1.
    Mark,
    /// Parity bit always 0.
    Space,
}

impl Parity {
    /// Whether this is one of the stick parity modes.
    pub const fn is_stick(self) -> bool {
        matches!(self, Parity::Mark | Parity::Space)
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    pub const fn bits(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Which driver queues `flush_queues` discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlushSelection {
    /// Received but unread data.
    pub input: bool,
    /// Written but untransmitted data.
    pub output: bool,
}

impl FlushSelection {
    pub const NONE: Self = Self {
        input: false,
        output: false,
    };
    pub const INPUT: Self = Self {
        input: true,
        output: false,
    };
    pub const OUTPUT: Self = Self {
        input: false,
        output: true,
    };
    pub const BOTH: Self = Self {
        input: true,
        output: true,
    };

    pub const fn is_empty(self) -> bool {
        !self.input && !self.output
    }
}

/// Requested state of the modem output lines. `None` leaves a line untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlLines {
    /// Data Terminal Ready.
    pub dtr: Option<bool>,
    /// Request To Send.
    pub rts: Option<bool>,
}

/// Trait for serial port I/O operations.
///
/// Implemented by the native handle of each platform and by `MockSerialPort`.
/// Handles are exclusively owned; every operation takes `&mut self`.
pub trait SerialPortAdapter: Send + fmt::Debug {
    /// Open the device at `path` for reading and writing.
    fn open(path: &str) -> Result<Self, PortError>
    where
        Self: Sized;

    /// Apply line settings.
    ///
    /// The device's register state as read by the first call is
    /// kept and restored on close; later calls never replace it.
    fn configure(&mut self, config: &PortConfiguration) -> Result<(), PortError>;

    /// Discard queued data in the selected directions (`tcflush`/`PurgeComm`).
    ///
    /// No-op for `FlushSelection::NONE`.
    fn flush_queues(&mut self, selection: FlushSelection) -> Result<(), PortError>;

    /// Whether at least one byte can be read without blocking.
    fn poll(&mut self) -> Result<bool, PortError>;

    /// Read bytes into the provided buffer.
    ///
    /// Returns the number of bytes actually read, never zero for a non-empty
    /// buffer. With nothing queued every backend reports a `WouldBlock` I/O
    /// error rather than waiting.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Write bytes to the port, returning how many were accepted.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Number of bytes in the receive queue.
    fn bytes_to_read(&mut self) -> Result<usize, PortError>;

    /// Assert or clear DTR/RTS.
    fn set_control_lines(&mut self, lines: ControlLines) -> Result<(), PortError>;

    /// The path this port was opened from.
    fn name(&self) -> &str;

    /// Restore the saved register state (best effort) and release the handle.
    fn close(self)
    where
        Self: Sized,
    {
        drop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, BaudRate::B9600);
        assert_eq!(config.input_baud_rate, None);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
    }

    #[test]
    fn test_baud_rate_normalisation() {
        assert_eq!(BaudRate::from(115_200), BaudRate::B115200);
        assert_eq!(BaudRate::from(7667), BaudRate::Custom(7667));
        assert_eq!(BaudRate::Custom(7667).as_u32(), 7667);
        assert!(BaudRate::Custom(7667).is_custom());
        assert!(!BaudRate::Custom(9600).is_custom());
        assert!(!BaudRate::B4000000.is_custom());
    }

    #[test]
    fn test_standard_table_is_sorted() {
        let rates: Vec<u32> = BaudRate::STANDARD.iter().map(|b| b.as_u32()).collect();
        let mut sorted = rates.clone();
        sorted.sort_unstable();
        assert_eq!(rates, sorted);
        assert_eq!(rates.len(), 30);
    }

    #[test]
    fn test_effective_input_baud() {
        let config = PortConfiguration::new(57_600u32);
        assert_eq!(config.effective_input_baud(), BaudRate::B57600);

        let config = config.with_input_baud_rate(1200u32);
        assert_eq!(config.effective_input_baud(), BaudRate::B1200);
        assert_eq!(config.baud_rate, BaudRate::B57600);
    }

    #[test]
    fn test_display() {
        let config = PortConfiguration::new(115_200u32)
            .with_parity(Parity::Even)
            .with_data_bits(DataBits::Seven)
            .with_stop_bits(StopBits::Two)
            .with_flow_control(FlowControl::Hardware);
        assert_eq!(config.to_string(), "115200 7E2 rts/cts");
    }

    #[test]
    fn test_serde_baud_as_integer() {
        let config = PortConfiguration::new(7667u32).with_parity(Parity::Mark);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"baud_rate\":7667"));
        assert!(json.contains("\"parity\":\"mark\""));

        let back: PortConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: PortConfiguration = serde_json::from_str(r#"{"baud_rate": 19200}"#).unwrap();
        assert_eq!(config.baud_rate, BaudRate::B19200);
        assert_eq!(config.parity, Parity::None);
    }

    #[test]
    fn test_flush_selection() {
        assert!(FlushSelection::NONE.is_empty());
        assert!(!FlushSelection::INPUT.is_empty());
        assert_eq!(FlushSelection::default(), FlushSelection::NONE);
    }

    #[test]
    fn test_data_bits_conversion() {
        assert_eq!(DataBits::try_from(7).unwrap(), DataBits::Seven);
        assert!(DataBits::try_from(9).is_err());
        assert_eq!(DataBits::Five.bits(), 5);
    }
}
