//! FHR settings text format
//!
//! One channel is `NominalFreq;LOFreq;Enabled` (enabled is `0` or `1`),
//! channels are joined with `/`. Frequencies are kept as text because the
//! library formats them with the current decimal separator.

use super::error::KkError;
use std::fmt;
use std::str::FromStr;

/// Maximum channel count of a K+K measuring card
pub const MAX_CHANNELS: usize = 24;

/// FHR setting for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FhrData {
    pub nominal_freq: String,
    pub lo_freq: String,
    pub enabled: bool,
}

impl Default for FhrData {
    fn default() -> Self {
        Self {
            nominal_freq: "0".to_string(),
            lo_freq: "0".to_string(),
            enabled: false,
        }
    }
}

impl FromStr for FhrData {
    type Err = KkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        let fields: Vec<&str> = s.split(';').collect();
        if fields.len() < 3 {
            return Err(KkError::param(format!(
                "Invalid string representation of FHRData: {}",
                s
            )));
        }
        Ok(Self {
            nominal_freq: fields[0].to_string(),
            lo_freq: fields[1].to_string(),
            enabled: fields[2] != "0",
        })
    }
}

impl fmt::Display for FhrData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{}",
            self.nominal_freq,
            self.lo_freq,
            if self.enabled { '1' } else { '0' }
        )
    }
}

/// FHR settings for all channels of a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FhrSettings {
    channels: Vec<FhrData>,
}

impl Default for FhrSettings {
    fn default() -> Self {
        Self {
            channels: vec![FhrData::default(); MAX_CHANNELS],
        }
    }
}

impl FhrSettings {
    pub fn channel(&self, index: usize) -> Option<&FhrData> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut FhrData> {
        self.channels.get_mut(index)
    }

    pub fn channels(&self) -> &[FhrData] {
        &self.channels
    }

    pub fn clear(&mut self) {
        self.channels.iter_mut().for_each(|c| *c = FhrData::default());
    }
}

impl FromStr for FhrSettings {
    type Err = KkError;

    /// Channels beyond [`MAX_CHANNELS`] are ignored; missing ones stay cleared
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut settings = Self::default();
        if s.is_empty() {
            return Ok(settings);
        }
        for (slot, part) in settings.channels.iter_mut().zip(s.split('/')) {
            *slot = part.parse()?;
        }
        Ok(settings)
    }
}

impl fmt::Display for FhrSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, channel) in self.channels.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", channel)?;
        }
        Ok(())
    }
}
