//! Command bytes understood by K+K measuring cards
//!
//! Commands are passed verbatim to `Multi_SendCommand`. The textual form
//! `group:name` (e.g. `rate:100ms`, `mode:phase diff`) is used in config files.

use super::error::KkError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Version,
    Reset,
    SyncEnable,
}

/// Report rate; the byte selects the gate time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    Ms1,
    Ms2,
    Ms5,
    Ms10,
    Ms20,
    Ms50,
    Ms100,
    Ms200,
    Ms500,
    S1,
    S2,
    S5,
    S10,
    S20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    All,
    One,
    Two,
    Three,
    Four,
}

impl Channel {
    /// Single channel by number 1..=4
    pub fn single(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    /// Channel number, `None` for all channels
    pub fn number(self) -> Option<u8> {
        match self {
            Self::All => None,
            Self::One => Some(1),
            Self::Two => Some(2),
            Self::Three => Some(3),
            Self::Four => Some(4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Phase,
    PhaseAvg,
    Frequency,
    FrequencyAvg,
    PhaseDiff,
    PhaseDiffAvg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scrambler {
    Off,
    Auto,
    Trim,
}

/// A single-byte card command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Control(Control),
    Rate(Rate),
    Channel(Channel),
    Mode(Mode),
    Scrambler(Scrambler),
}

static RATES: [(Rate, &str, u8, f64); 14] = [
    (Rate::Ms1, "1ms", 0x20, 1e-3),
    (Rate::Ms2, "2ms", 0x21, 2e-3),
    (Rate::Ms5, "5ms", 0x22, 5e-3),
    (Rate::Ms10, "10ms", 0x23, 1e-2),
    (Rate::Ms20, "20ms", 0x24, 2e-2),
    (Rate::Ms50, "50ms", 0x25, 5e-2),
    (Rate::Ms100, "100ms", 0x26, 1e-1),
    (Rate::Ms200, "200ms", 0x27, 2e-1),
    (Rate::Ms500, "500ms", 0x28, 5e-1),
    (Rate::S1, "1s", 0x29, 1.0),
    (Rate::S2, "2s", 0x2A, 2.0),
    (Rate::S5, "5s", 0x2B, 5.0),
    (Rate::S10, "10s", 0x2C, 10.0),
    (Rate::S20, "20s", 0x2D, 20.0),
];

static MODES: [(Mode, &str, u8); 6] = [
    (Mode::Phase, "phase", 0x40),
    (Mode::PhaseAvg, "phase avg", 0x41),
    (Mode::Frequency, "frequency", 0x42),
    (Mode::FrequencyAvg, "frequency avg", 0x43),
    (Mode::PhaseDiff, "phase diff", 0x44),
    (Mode::PhaseDiffAvg, "phase diff avg", 0x45),
];

impl Rate {
    fn entry(self) -> &'static (Rate, &'static str, u8, f64) {
        // every variant is listed in RATES
        RATES.iter().find(|e| e.0 == self).unwrap_or(&RATES[0])
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    /// Gate time in seconds
    pub fn seconds(self) -> f64 {
        self.entry().3
    }
}

impl Mode {
    fn entry(self) -> &'static (Mode, &'static str, u8) {
        MODES.iter().find(|e| e.0 == self).unwrap_or(&MODES[0])
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }
}

impl Command {
    pub fn byte(self) -> u8 {
        match self {
            Self::Control(Control::Version) => 0x01,
            Self::Control(Control::Reset) => 0x0A,
            Self::Control(Control::SyncEnable) => 0x0F,
            Self::Rate(rate) => rate.entry().2,
            Self::Channel(channel) => 0x30 + channel.number().unwrap_or(0),
            Self::Mode(mode) => mode.entry().2,
            Self::Scrambler(Scrambler::Off) => 0x50,
            Self::Scrambler(Scrambler::Auto) => 0x5E,
            Self::Scrambler(Scrambler::Trim) => 0x5F,
        }
    }

    pub fn to_bytes(self) -> [u8; 1] {
        [self.byte()]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(Control::Version) => f.write_str("control:version"),
            Self::Control(Control::Reset) => f.write_str("control:reset"),
            Self::Control(Control::SyncEnable) => f.write_str("control:sync enable"),
            Self::Rate(rate) => write!(f, "rate:{}", rate.name()),
            Self::Channel(channel) => match channel.number() {
                Some(n) => write!(f, "channel:{}", n),
                None => f.write_str("channel:all"),
            },
            Self::Mode(mode) => write!(f, "mode:{}", mode.name()),
            Self::Scrambler(Scrambler::Off) => f.write_str("scrambler:off"),
            Self::Scrambler(Scrambler::Auto) => f.write_str("scrambler:auto"),
            Self::Scrambler(Scrambler::Trim) => f.write_str("scrambler:trim"),
        }
    }
}

impl FromStr for Command {
    type Err = KkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || KkError::invalid_argument(format!("unknown command '{}'", s));
        let (group, name) = s.split_once(':').ok_or_else(unknown)?;
        let name = name.trim().to_ascii_lowercase();

        let command = match group.trim().to_ascii_lowercase().as_str() {
            "control" => match name.as_str() {
                "version" => Self::Control(Control::Version),
                "reset" => Self::Control(Control::Reset),
                "sync enable" => Self::Control(Control::SyncEnable),
                _ => return Err(unknown()),
            },
            "rate" => RATES
                .iter()
                .find(|e| e.1 == name)
                .map(|e| Self::Rate(e.0))
                .ok_or_else(unknown)?,
            "channel" => match name.as_str() {
                "all" => Self::Channel(Channel::All),
                n => n
                    .parse::<u8>()
                    .ok()
                    .and_then(Channel::single)
                    .map(Self::Channel)
                    .ok_or_else(unknown)?,
            },
            "mode" => MODES
                .iter()
                .find(|e| e.1 == name)
                .map(|e| Self::Mode(e.0))
                .ok_or_else(unknown)?,
            "scrambler" => match name.as_str() {
                "off" => Self::Scrambler(Scrambler::Off),
                "auto" => Self::Scrambler(Scrambler::Auto),
                "trim" => Self::Scrambler(Scrambler::Trim),
                _ => return Err(unknown()),
            },
            _ => return Err(unknown()),
        };
        Ok(command)
    }
}
