//! User-facing configuration of a calculation.
//!
//! Every selectable card (mesh family, velocity element, pressure element, extra) is a closed
//! enum. Card names as shown to the user are parsed with [`FromStr`] and printed with
//! [`Display`](fmt::Display), and configurations serialize using the same names.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// The card name that stands for "nothing selected".
pub const NONE_CARD: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCard {
    kind: &'static str,
    name: String,
}

impl UnknownCard {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for UnknownCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} card \"{}\"", self.kind, self.name)
    }
}

impl Error for UnknownCard {}

macro_rules! card_names {
    ($type:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $type {
            pub const ALL: &'static [$type] = &[$($type::$variant),+];

            pub fn card_name(&self) -> &'static str {
                match self {
                    $($type::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.card_name())
            }
        }

        impl FromStr for $type {
            type Err = UnknownCard;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok($type::$variant),)+
                    other => Err(UnknownCard { kind: $kind, name: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $type {
            type Error = UnknownCard;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$type> for String {
            fn from(card: $type) -> String {
                card.card_name().to_string()
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MeshFamily {
    Unstructured,
    Curved,
    TypeOne,
    SingularVertex,
}

card_names!(MeshFamily, "mesh", {
    Unstructured => "Unstructured Mesh",
    Curved => "Curved Mesh",
    TypeOne => "Type One Mesh",
    SingularVertex => "Singular Vertex Mesh",
});

/// Velocity elements. A trailing `Star` denotes the discontinuous variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VelocityElement {
    P1,
    P1Star,
    P2,
    P2Star,
    P3,
    P3Star,
    P4,
    P4Star,
    Bdm1,
    Bdm2,
    Bdm3,
    Bdm4,
    CrouzeixRaviart,
}

card_names!(VelocityElement, "velocity", {
    P1 => "P1",
    P1Star => "P1*",
    P2 => "P2",
    P2Star => "P2*",
    P3 => "P3",
    P3Star => "P3*",
    P4 => "P4",
    P4Star => "P4*",
    Bdm1 => "BDM1",
    Bdm2 => "BDM2",
    Bdm3 => "BDM3",
    Bdm4 => "BDM4",
    CrouzeixRaviart => "Crouzeix-Raviart",
});

impl VelocityElement {
    /// Polynomial order of the velocity element.
    pub fn order(&self) -> usize {
        use VelocityElement::*;
        match self {
            P1 | P1Star | Bdm1 | CrouzeixRaviart => 1,
            P2 | P2Star | Bdm2 => 2,
            P3 | P3Star | Bdm3 => 3,
            P4 | P4Star | Bdm4 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PressureElement {
    P0,
    P1,
    P1Star,
    P2,
    P2Star,
    P3,
    P3Star,
}

card_names!(PressureElement, "pressure", {
    P0 => "P0",
    P1 => "P1",
    P1Star => "P1*",
    P2 => "P2",
    P2Star => "P2*",
    P3 => "P3",
    P3Star => "P3*",
});

impl PressureElement {
    pub fn order(&self) -> usize {
        use PressureElement::*;
        match self {
            P0 => 0,
            P1 | P1Star => 1,
            P2 | P2Star => 2,
            P3 | P3Star => 3,
        }
    }

    /// Whether the pressure is discontinuous across elements. `P0` always is.
    pub fn is_discontinuous(&self) -> bool {
        use PressureElement::*;
        matches!(self, P0 | P1Star | P2Star | P3Star)
    }
}

/// Optional stabilizations and mesh modifications.
///
/// The declaration order is also the order in which extras are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Extra {
    InteriorPenalty,
    PressureJump,
    PowellSabinSplit,
    AlfeldSplit,
    BrezziPitkaranta,
    P3Bubble,
    GradDiv,
}

card_names!(Extra, "extra", {
    InteriorPenalty => "Interior Penalty",
    PressureJump => "Pressure-Jump",
    PowellSabinSplit => "Powell-Sabin Split",
    AlfeldSplit => "Alfeld Split",
    BrezziPitkaranta => "Brezzi-Pitkäranta",
    P3Bubble => "P3 Bubble",
    GradDiv => "graddiv",
});

/// An ordered set of extras.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extras(BTreeSet<Extra>);

impl Extras {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the extra was not already present.
    pub fn insert(&mut self, extra: Extra) -> bool {
        self.0.insert(extra)
    }

    pub fn contains(&self, extra: Extra) -> bool {
        self.0.contains(&extra)
    }

    pub fn iter(&self) -> impl Iterator<Item = Extra> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the velocity space needs jump and average operators across element faces.
    pub fn requires_dg_jumps(&self) -> bool {
        self.contains(Extra::InteriorPenalty) || self.contains(Extra::PressureJump) || self.contains(Extra::GradDiv)
    }

    /// Parses card names, skipping the "None" card.
    pub fn from_card_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, UnknownCard> {
        let mut extras = Self::new();
        for name in names {
            if let Some(extra) = parse_card::<Extra>(name)? {
                extras.insert(extra);
            }
        }
        Ok(extras)
    }
}

impl FromIterator<Extra> for Extras {
    fn from_iter<I: IntoIterator<Item = Extra>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Extra; N]> for Extras {
    fn from(extras: [Extra; N]) -> Self {
        extras.into_iter().collect()
    }
}

/// Parses a card name where "None" means that nothing is selected.
pub fn parse_card<T>(name: &str) -> Result<Option<T>, UnknownCard>
where
    T: FromStr<Err = UnknownCard>,
{
    if name.trim() == NONE_CARD {
        Ok(None)
    } else {
        name.parse().map(Some)
    }
}

/// The selections made by the user before a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub mesh_family: Option<MeshFamily>,
    pub velocity: Option<VelocityElement>,
    pub pressure: Option<PressureElement>,
    pub extras: Extras,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSelection {
    MeshFamily,
    Velocity,
    Pressure,
}

impl fmt::Display for MissingSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeshFamily => write!(f, "no mesh family selected"),
            Self::Velocity => write!(f, "no velocity element selected"),
            Self::Pressure => write!(f, "no pressure element selected"),
        }
    }
}

impl Error for MissingSelection {}

impl Configuration {
    pub fn new(
        mesh_family: MeshFamily,
        velocity: VelocityElement,
        pressure: PressureElement,
        extras: impl Into<Extras>,
    ) -> Self {
        Self {
            mesh_family: Some(mesh_family),
            velocity: Some(velocity),
            pressure: Some(pressure),
            extras: extras.into(),
        }
    }

    /// Returns the complete discretization, or the first selection that is missing.
    pub fn discretization(&self) -> Result<Discretization, MissingSelection> {
        Ok(Discretization {
            mesh_family: self.mesh_family.ok_or(MissingSelection::MeshFamily)?,
            velocity: self.velocity.ok_or(MissingSelection::Velocity)?,
            pressure: self.pressure.ok_or(MissingSelection::Pressure)?,
            extras: self.extras.clone(),
        })
    }
}

/// A configuration in which every required selection has been made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discretization {
    pub mesh_family: MeshFamily,
    pub velocity: VelocityElement,
    pub pressure: PressureElement,
    pub extras: Extras,
}

impl Discretization {
    pub fn new(
        mesh_family: MeshFamily,
        velocity: VelocityElement,
        pressure: PressureElement,
        extras: impl Into<Extras>,
    ) -> Self {
        Self {
            mesh_family,
            velocity,
            pressure,
            extras: extras.into(),
        }
    }

    pub fn has(&self, extra: Extra) -> bool {
        self.extras.contains(extra)
    }
}

impl From<Discretization> for Configuration {
    fn from(discretization: Discretization) -> Self {
        Self {
            mesh_family: Some(discretization.mesh_family),
            velocity: Some(discretization.velocity),
            pressure: Some(discretization.pressure),
            extras: discretization.extras,
        }
    }
}
