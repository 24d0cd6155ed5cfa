//! The seven disease/control states a unit can be in, and which moves between them are legal.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum UnitState {
    Susceptible,
    Latent,
    InfectiousSubclinical,
    InfectiousClinical,
    NaturallyImmune,
    VaccineImmune,
    Destroyed,
}

/// `VALID_TRANSITIONS[from][to]`, indexed by `UnitState::index()`.
const VALID_TRANSITIONS: [[bool; UnitState::COUNT]; UnitState::COUNT] = [
    // S      L      B      C      N      V      D
    [false, true, true, true, false, true, true], // Susceptible
    [false, false, true, true, false, false, true], // Latent
    [false, false, false, true, false, false, true], // InfectiousSubclinical
    [false, false, false, false, true, false, true], // InfectiousClinical
    [true, false, false, false, false, false, true], // NaturallyImmune
    [true, false, false, false, false, false, true], // VaccineImmune
    [false, false, false, false, false, false, false], // Destroyed
];

impl UnitState {
    pub const COUNT: usize = 7;

    pub const ALL: [UnitState; UnitState::COUNT] = [
        UnitState::Susceptible,
        UnitState::Latent,
        UnitState::InfectiousSubclinical,
        UnitState::InfectiousClinical,
        UnitState::NaturallyImmune,
        UnitState::VaccineImmune,
        UnitState::Destroyed,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used in output variable names, e.g. `tsdUSusc`.
    #[must_use]
    pub fn abbreviation(self) -> &'static str {
        match self {
            UnitState::Susceptible => "Susc",
            UnitState::Latent => "Lat",
            UnitState::InfectiousSubclinical => "Subc",
            UnitState::InfectiousClinical => "Clin",
            UnitState::NaturallyImmune => "NImm",
            UnitState::VaccineImmune => "VImm",
            UnitState::Destroyed => "Dest",
        }
    }

    #[must_use]
    pub fn letter(self) -> char {
        match self {
            UnitState::Susceptible => 'S',
            UnitState::Latent => 'L',
            UnitState::InfectiousSubclinical => 'B',
            UnitState::InfectiousClinical => 'C',
            UnitState::NaturallyImmune => 'N',
            UnitState::VaccineImmune => 'V',
            UnitState::Destroyed => 'D',
        }
    }

    /// Latent and both infectious states: the units spread models iterate over.
    #[must_use]
    pub fn is_infected(self) -> bool {
        matches!(
            self,
            UnitState::Latent | UnitState::InfectiousSubclinical | UnitState::InfectiousClinical
        )
    }

    #[must_use]
    pub fn can_transition_to(self, next: UnitState) -> bool {
        VALID_TRANSITIONS[self.index()][next.index()]
    }
}

impl Display for UnitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

impl FromStr for UnitState {
    type Err = SimError;

    /// Accepts a single-letter code (`"L"`), an abbreviation (`"Lat"`), a full variant name
    /// (`"Latent"`), or the numeric code `0`-`6`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        for state in UnitState::ALL {
            let full = format!("{state:?}");
            if s.eq_ignore_ascii_case(state.abbreviation())
                || s.eq_ignore_ascii_case(&full)
                || (s.len() == 1 && s.eq_ignore_ascii_case(&state.letter().to_string()))
            {
                return Ok(state);
            }
        }
        if let Ok(code) = s.parse::<usize>() {
            if let Some(state) = UnitState::ALL.get(code) {
                return Ok(*state);
            }
        }
        Err(SimError::SimError(format!("unknown unit state \"{s}\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_self_loops() {
        for state in UnitState::ALL {
            assert!(!state.can_transition_to(state), "{state} -> {state}");
        }
    }

    #[test]
    fn destroyed_is_terminal() {
        for state in UnitState::ALL {
            assert!(!UnitState::Destroyed.can_transition_to(state));
        }
    }

    #[test]
    fn every_live_state_can_be_destroyed() {
        for state in &UnitState::ALL[..6] {
            assert!(state.can_transition_to(UnitState::Destroyed));
        }
    }

    #[test]
    fn disease_progression_edges() {
        use UnitState::*;
        assert!(Susceptible.can_transition_to(Latent));
        assert!(Susceptible.can_transition_to(VaccineImmune));
        assert!(Latent.can_transition_to(InfectiousClinical));
        assert!(InfectiousClinical.can_transition_to(NaturallyImmune));
        assert!(NaturallyImmune.can_transition_to(Susceptible));
        assert!(!InfectiousClinical.can_transition_to(InfectiousSubclinical));
        assert!(!Latent.can_transition_to(Susceptible));
        assert!(!VaccineImmune.can_transition_to(Latent));
    }

    #[test]
    fn parse_codes() {
        assert_eq!("S".parse::<UnitState>().unwrap(), UnitState::Susceptible);
        assert_eq!("b".parse::<UnitState>().unwrap(), UnitState::InfectiousSubclinical);
        assert_eq!("NImm".parse::<UnitState>().unwrap(), UnitState::NaturallyImmune);
        assert_eq!("destroyed".parse::<UnitState>().unwrap(), UnitState::Destroyed);
        assert_eq!("5".parse::<UnitState>().unwrap(), UnitState::VaccineImmune);
        assert!("Q".parse::<UnitState>().is_err());
    }
}
