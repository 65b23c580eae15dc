//! Confluence flags: ten independent boolean conditions per signal.
//!
//! `Flag` is the single list every flag-indexed structure matches on. Adding or
//! removing a flag means touching this enum, and every exhaustive `match` in
//! [`ConfluenceFlags`] and [`WeightVector`](super::WeightVector) breaks until
//! the new flag is wired through detection, scoring and optimization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of confluence flags.
pub const FLAG_COUNT: usize = 10;

/// Identifier of one confluence condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Volume,
    Session,
    Pullback,
    Momentum,
    KeyLevel,
    HtfConfirm,
    EmaAlign,
    BandSignal,
    Regime,
    Pattern,
}

impl Flag {
    /// All flags in canonical order. Scoring sums in this order.
    pub const ALL: [Flag; FLAG_COUNT] = [
        Flag::Volume,
        Flag::Session,
        Flag::Pullback,
        Flag::Momentum,
        Flag::KeyLevel,
        Flag::HtfConfirm,
        Flag::EmaAlign,
        Flag::BandSignal,
        Flag::Regime,
        Flag::Pattern,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Flag::Volume => "volume",
            Flag::Session => "session",
            Flag::Pullback => "pullback",
            Flag::Momentum => "momentum",
            Flag::KeyLevel => "key_level",
            Flag::HtfConfirm => "htf_confirm",
            Flag::EmaAlign => "ema_align",
            Flag::BandSignal => "band_signal",
            Flag::Regime => "regime",
            Flag::Pattern => "pattern",
        }
    }

    /// The two strongest flags get a wider, higher weight box.
    pub fn is_strong(self) -> bool {
        matches!(self, Flag::EmaAlign | Flag::HtfConfirm)
    }

    /// Position of this flag in [`Flag::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The ten confluence conditions evaluated for one candidate signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfluenceFlags {
    pub volume: bool,
    pub session: bool,
    pub pullback: bool,
    pub momentum: bool,
    pub key_level: bool,
    pub htf_confirm: bool,
    pub ema_align: bool,
    pub band_signal: bool,
    pub regime: bool,
    pub pattern: bool,
}

impl ConfluenceFlags {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Volume => self.volume,
            Flag::Session => self.session,
            Flag::Pullback => self.pullback,
            Flag::Momentum => self.momentum,
            Flag::KeyLevel => self.key_level,
            Flag::HtfConfirm => self.htf_confirm,
            Flag::EmaAlign => self.ema_align,
            Flag::BandSignal => self.band_signal,
            Flag::Regime => self.regime,
            Flag::Pattern => self.pattern,
        }
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        let slot = match flag {
            Flag::Volume => &mut self.volume,
            Flag::Session => &mut self.session,
            Flag::Pullback => &mut self.pullback,
            Flag::Momentum => &mut self.momentum,
            Flag::KeyLevel => &mut self.key_level,
            Flag::HtfConfirm => &mut self.htf_confirm,
            Flag::EmaAlign => &mut self.ema_align,
            Flag::BandSignal => &mut self.band_signal,
            Flag::Regime => &mut self.regime,
            Flag::Pattern => &mut self.pattern,
        };
        *slot = value;
    }

    /// Builder-style setter.
    pub fn with(mut self, flag: Flag, value: bool) -> Self {
        self.set(flag, value);
        self
    }

    /// Flags that are set, in canonical order.
    pub fn active(&self) -> impl Iterator<Item = Flag> + '_ {
        Flag::ALL.into_iter().filter(move |f| self.get(*f))
    }

    pub fn count(&self) -> usize {
        self.active().count()
    }
}
