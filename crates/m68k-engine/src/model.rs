//! Processor model and per-model capability table.
//!
//! The engine executes one instruction set, but several behaviors differ by
//! chip: data alignment faults, exception frame layout, which control
//! registers exist, and a handful of instructions added by later parts.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Selected Motorola 68k processor model.
///
/// Ordered by generation so that `model >= Model::M68020` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Model {
    /// Motorola MC68000.
    #[default]
    M68000,
    /// Motorola MC68010.
    M68010,
    /// Motorola MC68020.
    M68020,
    /// Motorola MC68030.
    M68030,
    /// Motorola MC68040.
    M68040,
}

/// Capability flags for a specific model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `MOVEC` family is available.
    pub movec: bool,
    /// Vector Base Register is present.
    pub vbr: bool,
    /// Exception frames carry a format/vector word.
    pub format_word: bool,
    /// `MOVE from CCR` exists.
    pub move_from_ccr: bool,
    /// `RTD` exists.
    pub rtd: bool,
    /// Word and long data accesses may be odd.
    pub unaligned_data: bool,
    /// Cache control register (`CACR`) is present.
    pub cacr: bool,
    /// 32-bit branch displacements, `EXTB.L`, `LINK.L`, and scaled indexes.
    pub ext_020: bool,
}

const BASE: Capabilities = Capabilities {
    movec: false,
    vbr: false,
    format_word: false,
    move_from_ccr: false,
    rtd: false,
    unaligned_data: false,
    cacr: false,
    ext_020: false,
};

const GEN_010: Capabilities = Capabilities {
    movec: true,
    vbr: true,
    format_word: true,
    move_from_ccr: true,
    rtd: true,
    ..BASE
};

const GEN_020: Capabilities = Capabilities {
    unaligned_data: true,
    cacr: true,
    ext_020: true,
    ..GEN_010
};

impl Model {
    /// Static capability set for this model.
    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::M68000 => BASE,
            Self::M68010 => GEN_010,
            Self::M68020 | Self::M68030 | Self::M68040 => GEN_020,
        }
    }

    /// Whether odd word/long data addresses raise an address error.
    #[must_use]
    pub const fn faults_unaligned_data(self) -> bool {
        !self.capabilities().unaligned_data
    }

    /// Writable bits of the status register.
    ///
    /// The 68020 and later add T0 and M next to T1.
    #[must_use]
    pub const fn sr_mask(self) -> u16 {
        if self.capabilities().ext_020 {
            0xF71F
        } else {
            0xA71F
        }
    }

    /// Numeric part number, e.g. `68010`.
    #[must_use]
    pub const fn part_number(self) -> u32 {
        match self {
            Self::M68000 => 68000,
            Self::M68010 => 68010,
            Self::M68020 => 68020,
            Self::M68030 => 68030,
            Self::M68040 => 68040,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MC{}", self.part_number())
    }
}

/// Unrecognised model name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown processor model `{0}` (expected 68000, 68010, 68020, 68030 or 68040)")]
pub struct ModelParseError(pub String);

impl FromStr for Model {
    type Err = ModelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower
            .strip_prefix("mc")
            .or_else(|| lower.strip_prefix('m'))
            .unwrap_or(&lower);
        match digits {
            "68000" | "68k" => Ok(Self::M68000),
            "68010" => Ok(Self::M68010),
            "68020" => Ok(Self::M68020),
            "68030" => Ok(Self::M68030),
            "68040" => Ok(Self::M68040),
            _ => Err(ModelParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_follow_generations() {
        assert_eq!(Model::M68000.capabilities(), BASE);
        assert!(Model::M68010.capabilities().vbr);
        assert!(Model::M68010.capabilities().rtd);
        assert!(!Model::M68000.capabilities().rtd);
        assert!(!Model::M68010.capabilities().cacr);
        assert_eq!(Model::M68030.capabilities(), Model::M68020.capabilities());
        assert!(Model::M68040.capabilities().unaligned_data);
    }

    #[test]
    fn alignment_faults_stop_at_68020() {
        assert!(Model::M68000.faults_unaligned_data());
        assert!(Model::M68010.faults_unaligned_data());
        assert!(!Model::M68020.faults_unaligned_data());
    }

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!("68000".parse::<Model>(), Ok(Model::M68000));
        assert_eq!("MC68010".parse::<Model>(), Ok(Model::M68010));
        assert_eq!(" mc68040 ".parse::<Model>(), Ok(Model::M68040));
        assert!("68060".parse::<Model>().is_err());
    }

    #[test]
    fn models_are_ordered() {
        assert!(Model::M68000 < Model::M68010);
        assert!(Model::M68040 > Model::M68020);
        assert_eq!(Model::M68020.to_string(), "MC68020");
    }
}
