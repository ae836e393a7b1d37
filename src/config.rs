//! Runtime configuration (spec §6, "Configuration").

use std::time::Duration;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// `doCostCentres = 0`: no `.prof` report is written at all.
    None,
    /// `doCostCentres = 1`: default report, system CCs/CCSs hidden, subtrees
    /// below 1% of a total are omitted from the flat table.
    Summary,
    /// `doCostCentres >= 2`: every cost centre is printed in the flat table
    /// regardless of share, system CCs/CCSs still hidden, pruning disabled.
    All,
    /// `doCostCentres >= 3`: as `All`, plus raw tick/byte columns.
    Verbose,
}

impl Verbosity {
    pub(crate) fn shows_all_flat_rows(self) -> bool {
        self >= Verbosity::All
    }

    pub(crate) fn shows_raw_columns(self) -> bool {
        self >= Verbosity::Verbose
    }

    pub(crate) fn disables_pruning(self) -> bool {
        self >= Verbosity::All
    }

    pub(crate) fn reports_at_all(self) -> bool {
        self != Verbosity::None
    }
}

/// Optional glob selectors consulted by the selection predicate (spec §4.6).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    pub module: Option<String>,
    pub cost_centre: Option<String>,
    pub ancestor_cost_centre: Option<String>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerConfig {
    pub verbosity: Verbosity,
    pub heap_profile: bool,
    pub selectors: Selectors,
    #[cfg_attr(feature = "serde", serde(with = "duration_micros"))]
    pub tick_interval: Duration,
    pub n_capabilities: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        ProfilerConfig {
            verbosity: Verbosity::None,
            heap_profile: false,
            selectors: Selectors::default(),
            tick_interval: Duration::from_millis(20),
            n_capabilities: 1,
        }
    }
}

#[cfg(feature = "serde")]
mod duration_micros {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_micros() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_micros(u64::deserialize(d)?))
    }
}
