use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Piglet,
    Pregnant,
    Grower,
    Adult,
    Quarantine,
}

impl Group {
    pub const ALL: [Group; 5] = [
        Group::Piglet,
        Group::Pregnant,
        Group::Grower,
        Group::Adult,
        Group::Quarantine,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Piglet => "piglet",
            Self::Pregnant => "pregnant",
            Self::Grower => "grower",
            Self::Adult => "adult",
            Self::Quarantine => "quarantine",
        }
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Piglet => "Piglet",
            Self::Pregnant => "Pregnant",
            Self::Grower => "Grower",
            Self::Adult => "Adult",
            Self::Quarantine => "Sick/Quarantine",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown group: {0}")]
pub struct GroupParseError(pub String);

impl FromStr for Group {
    type Err = GroupParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '/', ' '], "_");
        match normalized.as_str() {
            "piglet" | "piglets" => Ok(Self::Piglet),
            "pregnant" | "gestating" => Ok(Self::Pregnant),
            "grower" | "growers" => Ok(Self::Grower),
            "adult" | "adults" => Ok(Self::Adult),
            "quarantine" | "sick" | "sick_quarantine" => Ok(Self::Quarantine),
            _ => Err(GroupParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl Display for Sex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown sex: {0}")]
pub struct SexParseError(pub String);

impl FromStr for Sex {
    type Err = SexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "boar" => Ok(Self::Male),
            "female" | "f" | "sow" | "gilt" => Ok(Self::Female),
            _ => Err(SexParseError(s.to_string())),
        }
    }
}

/// Feeding outcome of an animal. `Pending` is only ever the state of an
/// animal that has not been part of any feeding event yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Ok,
    Underfed,
    Missed,
    #[default]
    Pending,
}

impl FeedStatus {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Underfed => "underfed",
            Self::Missed => "missed",
            Self::Pending => "pending",
        }
    }

    /// Underfed and Missed both count towards shortfall notifications.
    pub fn needs_attention(self) -> bool {
        matches!(self, Self::Underfed | Self::Missed)
    }
}

impl Display for FeedStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Ok => "OK",
            Self::Underfed => "Underfed",
            Self::Missed => "Missed",
            Self::Pending => "Pending",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown feed status: {0}")]
pub struct FeedStatusParseError(pub String);

impl FromStr for FeedStatus {
    type Err = FeedStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "underfed" => Ok(Self::Underfed),
            "missed" => Ok(Self::Missed),
            "pending" => Ok(Self::Pending),
            _ => Err(FeedStatusParseError(s.to_string())),
        }
    }
}
