use std::fmt;
use std::str::FromStr;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tokio_serial::SerialPortBuilderExt;
pub use tokio_serial::{DataBits, FlowControl, Parity, SerialStream, StopBits};

use crate::error::{Result, SerialAssistantError};

/// serial port baud rate
pub const COMMON_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 500000, 576000, 921600,
    1000000, 1500000, 2000000,
];

/// stop bits as offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBitsSetting {
    #[default]
    One,
    /// not supported by the serial backend, opened as two stop bits
    OnePointFive,
    Two,
}

impl StopBitsSetting {
    /// backend stop bits
    pub fn to_stop_bits(self) -> StopBits {
        match self {
            StopBitsSetting::One => StopBits::One,
            StopBitsSetting::OnePointFive | StopBitsSetting::Two => StopBits::Two,
        }
    }
}

impl fmt::Display for StopBitsSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBitsSetting::One => write!(f, "1"),
            StopBitsSetting::OnePointFive => write!(f, "1.5"),
            StopBitsSetting::Two => write!(f, "2"),
        }
    }
}

impl FromStr for StopBitsSetting {
    type Err = SerialAssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(StopBitsSetting::One),
            "1.5" => Ok(StopBitsSetting::OnePointFive),
            "2" => Ok(StopBitsSetting::Two),
            other => Err(SerialAssistantError::invalid_config(format!(
                "stop bits must be 1, 1.5 or 2, got '{other}'"
            ))),
        }
    }
}

/// parity as offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParitySetting {
    #[default]
    None,
    Odd,
    Even,
}

impl ParitySetting {
    /// backend parity
    pub fn to_parity(self) -> Parity {
        match self {
            ParitySetting::None => Parity::None,
            ParitySetting::Odd => Parity::Odd,
            ParitySetting::Even => Parity::Even,
        }
    }
}

impl fmt::Display for ParitySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParitySetting::None => write!(f, "None"),
            ParitySetting::Odd => write!(f, "Odd"),
            ParitySetting::Even => write!(f, "Even"),
        }
    }
}

impl FromStr for ParitySetting {
    type Err = SerialAssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(ParitySetting::None),
            "o" | "odd" => Ok(ParitySetting::Odd),
            "e" | "even" => Ok(ParitySetting::Even),
            other => Err(SerialAssistantError::invalid_config(format!(
                "parity must be none, odd or even, got '{other}'"
            ))),
        }
    }
}

/// serial port settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: StopBitsSetting,
    pub parity: ParitySetting,
    pub timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// serial port settings implementation
impl PortSettings {
    /// serial port settings initialization
    pub fn new() -> Self {
        PortSettings {
            port_name: String::new(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: StopBitsSetting::One,
            parity: ParitySetting::None,
            timeout: Duration::from_millis(100),
        }
    }

    /// settings for a named port, everything else default
    pub fn with_port(port_name: impl Into<String>) -> Self {
        PortSettings {
            port_name: port_name.into(),
            ..Self::new()
        }
    }

    /// backend data bits
    pub fn to_data_bits(&self) -> Result<DataBits> {
        match self.data_bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(SerialAssistantError::invalid_config(format!(
                "data bits must be 5, 6, 7 or 8, got {other}"
            ))),
        }
    }

    /// check the settings before handing them to the backend
    pub fn validate(&self) -> Result<()> {
        if self.port_name.trim().is_empty() {
            return Err(SerialAssistantError::invalid_config("no serial port selected"));
        }
        if self.baud_rate == 0 {
            return Err(SerialAssistantError::invalid_config("baud rate must be non-zero"));
        }
        self.to_data_bits()?;
        Ok(())
    }

    /// one-line summary, e.g. `COM3 9600 8-N-1`
    pub fn summary(&self) -> String {
        let parity = match self.parity {
            ParitySetting::None => 'N',
            ParitySetting::Odd => 'O',
            ParitySetting::Even => 'E',
        };
        format!(
            "{} {} {}-{}-{}",
            self.port_name, self.baud_rate, self.data_bits, parity, self.stop_bits
        )
    }
}

/// list the names of all serial devices currently present
pub fn list_ports() -> Result<Vec<String>> {
    match tokio_serial::available_ports() {
        Ok(ports) => Ok(ports.into_iter().map(|p| p.port_name).collect()),
        Err(e) => {
            error!("Error listing ports: {e}");
            Err(SerialAssistantError::serial_port(e.to_string()))
        }
    }
}

/// open serial port
pub fn open_port(settings: &PortSettings) -> Result<SerialStream> {
    settings.validate()?;
    if settings.stop_bits == StopBitsSetting::OnePointFive {
        warn!(
            "1.5 stop bits is not supported on {}, using 2",
            settings.port_name
        );
    }

    match tokio_serial::new(settings.port_name.as_str(), settings.baud_rate)
        .data_bits(settings.to_data_bits()?)
        .parity(settings.parity.to_parity())
        .stop_bits(settings.stop_bits.to_stop_bits())
        .flow_control(FlowControl::None)
        .timeout(settings.timeout)
        .open_native_async()
    {
        Ok(stream) => {
            info!("Opened serial port: {}", settings.summary());
            Ok(stream)
        }
        Err(e) => {
            error!("Failed to open serial port {}: {e}", settings.port_name);
            Err(SerialAssistantError::port_open(
                settings.port_name.as_str(),
                e.to_string(),
            ))
        }
    }
}
