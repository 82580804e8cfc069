//! Points awarded for a discretization and its convergence verdict.
use crate::analysis::ConvergenceVerdict;
use crate::config::{Discretization, Extra, MeshFamily, PressureElement, VelocityElement};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Points of a selectable card.
///
/// Harder choices earn more points, while stabilizations cost points.
pub trait CardPoints {
    fn points(&self) -> i32;
}

impl CardPoints for MeshFamily {
    fn points(&self) -> i32 {
        match self {
            MeshFamily::TypeOne => 1,
            MeshFamily::Unstructured => 2,
            MeshFamily::SingularVertex => 3,
            MeshFamily::Curved => 4,
        }
    }
}

impl CardPoints for VelocityElement {
    fn points(&self) -> i32 {
        use VelocityElement::*;
        match self {
            P1 | P1Star | Bdm1 | CrouzeixRaviart => 4,
            P2 | P2Star | Bdm2 => 3,
            P3 | P3Star | Bdm3 => 2,
            P4 | P4Star | Bdm4 => 1,
        }
    }
}

impl CardPoints for PressureElement {
    fn points(&self) -> i32 {
        self.order() as i32 + 1
    }
}

impl CardPoints for Extra {
    fn points(&self) -> i32 {
        match self {
            Extra::InteriorPenalty | Extra::GradDiv => 0,
            Extra::PressureJump | Extra::PowellSabinSplit | Extra::AlfeldSplit | Extra::P3Bubble => -1,
            Extra::BrezziPitkaranta => -2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Sum of the card points.
    pub basic: i32,
    /// Points for optimal convergence.
    pub convergence: u32,
    pub is_stable: bool,
}

impl ScoreBreakdown {
    /// The total score, which is zero for unstable pairings.
    pub fn total(&self) -> i32 {
        if self.is_stable {
            self.basic + self.convergence as i32
        } else {
            0
        }
    }
}

impl fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_stable {
            write!(f, "{}", self.total())
        } else {
            write!(f, "Unstable 0 !")
        }
    }
}

pub fn basic_points(discretization: &Discretization) -> i32 {
    discretization.mesh_family.points()
        + discretization.velocity.points()
        + discretization.pressure.points()
        + discretization
            .extras
            .iter()
            .map(|extra| extra.points())
            .sum::<i32>()
}

pub fn score(discretization: &Discretization, verdict: &ConvergenceVerdict) -> ScoreBreakdown {
    ScoreBreakdown {
        basic: basic_points(discretization),
        convergence: verdict.points,
        is_stable: verdict.is_stable,
    }
}
