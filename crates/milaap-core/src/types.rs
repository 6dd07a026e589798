//! Stored person records and the case status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::descriptor::FaceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "unknown" => Ok(Gender::Unknown),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// Case status for a lost-and-found subject.
///
/// Transitions are monotonic: `Missing -> Found`, `Found -> Reunited`, and the
/// direct `Missing -> Reunited` (a person can be confirmed reunited without an
/// intermediate found report). `Reunited` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonStatus {
    Missing,
    Found,
    Reunited,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: PersonStatus,
    pub to: PersonStatus,
}

impl PersonStatus {
    pub fn can_transition_to(self, target: PersonStatus) -> bool {
        use PersonStatus::*;
        matches!(
            (self, target),
            (Missing, Found) | (Missing, Reunited) | (Found, Reunited)
        )
    }

    pub fn ensure_transition(self, target: PersonStatus) -> Result<(), InvalidTransition> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PersonStatus::Missing => "missing",
            PersonStatus::Found => "found",
            PersonStatus::Reunited => "reunited",
        }
    }
}

impl fmt::Display for PersonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing" => Ok(PersonStatus::Missing),
            "found" => Ok(PersonStatus::Found),
            "reunited" => Ok(PersonStatus::Reunited),
            other => Err(format!("unknown person status: {other}")),
        }
    }
}

/// Family or reporter contact details attached to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relationship: Option<String>,
}

/// A stored lost-and-found subject with their face descriptor.
///
/// The descriptor is immutable once stored; `status` and `current_location`
/// change only through the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Gender,
    pub photo_url: String,
    pub face_descriptor: FaceDescriptor,
    pub status: PersonStatus,
    #[serde(default)]
    pub contact_info: Option<ContactInfo>,
    #[serde(default)]
    pub last_seen_location: Option<String>,
    #[serde(default)]
    pub current_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonRecord {
    /// Display name; lost-and-found entries are often reported nameless.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        use PersonStatus::*;
        assert!(Missing.ensure_transition(Found).is_ok());
        assert!(Found.ensure_transition(Reunited).is_ok());
        assert!(Missing.ensure_transition(Reunited).is_ok());
    }

    #[test]
    fn reunited_is_terminal() {
        use PersonStatus::*;
        for target in [Missing, Found, Reunited] {
            let err = Reunited.ensure_transition(target).unwrap_err();
            assert_eq!(err.from, Reunited);
            assert_eq!(err.to, target);
        }
    }

    #[test]
    fn no_backward_or_self_transitions() {
        use PersonStatus::*;
        assert!(Found.ensure_transition(Missing).is_err());
        assert!(Missing.ensure_transition(Missing).is_err());
        assert!(Found.ensure_transition(Found).is_err());
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            PersonStatus::Missing,
            PersonStatus::Found,
            PersonStatus::Reunited,
        ] {
            assert_eq!(status.as_str().parse::<PersonStatus>().unwrap(), status);
        }
        assert!("vanished".parse::<PersonStatus>().is_err());
    }

    #[test]
    fn status_serde_uses_lowercase() {
        let json = serde_json::to_string(&PersonStatus::Reunited).unwrap();
        assert_eq!(json, "\"reunited\"");
    }

    #[test]
    fn display_name_falls_back_to_unknown() {
        let descriptor =
            crate::descriptor::FaceDescriptor::new(vec![0.0; crate::DESCRIPTOR_LEN]).unwrap();
        let now = Utc::now();
        let record = PersonRecord {
            id: Uuid::new_v4(),
            name: None,
            age: None,
            gender: Gender::default(),
            photo_url: "https://photos.example/p/1.jpg".into(),
            face_descriptor: descriptor,
            status: PersonStatus::Missing,
            contact_info: None,
            last_seen_location: None,
            current_location: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(record.display_name(), "Unknown");
    }
}
