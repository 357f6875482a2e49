//! Configuration data model

/// Number of 8-bit GPIO ports on the expander.
pub const PORT_COUNT: u8 = 2;

/// Highest valid global pin number (two 8-bit ports).
pub const MAX_PIN: u8 = PORT_COUNT * 8 - 1;

/// Root configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub buttons: Vec<ButtonConfig>,
    pub combos: Vec<ComboConfig>,
}

/// Global settings
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// I2C bus number (`/dev/i2c-N`)
    pub i2c_bus: u8,
    /// 7-bit I2C address of the expander
    pub i2c_address: u16,
    pub sampling: SamplingMode,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            i2c_bus: 1,
            i2c_address: 0x20,
            sampling: SamplingMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by tracing's `EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// How sampling passes are triggered.
///
/// Exactly one source drives the sampler; mixing a poll loop with the
/// interrupt callback on shared state is not representable here on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Read both ports on a fixed timer.
    Poll { interval_ms: u64 },
    /// Read both ports when the expander's INT line falls. The named GPIO
    /// pin is the Pi pin the INT output is wired to.
    Interrupt { gpio_pin: u8 },
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::Poll { interval_ms: 20 }
    }
}

/// One physical button: a global expander pin (0-15) and the key it emits.
///
/// The key is carried as a name string ("LeftCtrl", "5", "KEY_COIN", ...)
/// and resolved to a key code by the daemon at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonConfig {
    pub pin: u8,
    pub key: String,
}

/// A timed two-button gesture that synthesizes a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboConfig {
    /// Name used in diagnostics ("coin", "quit", ...)
    pub name: String,
    /// The two global pins that must be held together.
    pub pins: (u8, u8),
    /// Minimum hold duration before the gesture fires. Zero fires as soon
    /// as both pins are active.
    pub hold_seconds: u64,
    /// Key name emitted when the gesture fires.
    pub key: String,
}
