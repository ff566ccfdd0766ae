//! Who triggered a state change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    User,
    System,
    Scheduler,
    Webhook,
}

impl ActorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::System => "SYSTEM",
            Self::Scheduler => "SCHEDULER",
            Self::Webhook => "WEBHOOK",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown actor type {0:?}")]
pub struct UnknownActorType(pub String);

impl FromStr for ActorType {
    type Err = UnknownActorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "SYSTEM" => Ok(Self::System),
            "SCHEDULER" => Ok(Self::Scheduler),
            "WEBHOOK" => Ok(Self::Webhook),
            other => Err(UnknownActorType(other.to_owned())),
        }
    }
}

/// Actor recorded on audit entries and manual operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorType,
    pub id: Option<Uuid>,
}

impl Actor {
    pub fn user(id: Option<Uuid>) -> Self {
        Self {
            kind: ActorType::User,
            id,
        }
    }

    pub fn system() -> Self {
        Self {
            kind: ActorType::System,
            id: None,
        }
    }

    pub fn scheduler() -> Self {
        Self {
            kind: ActorType::Scheduler,
            id: None,
        }
    }

    pub fn webhook() -> Self {
        Self {
            kind: ActorType::Webhook,
            id: None,
        }
    }

    /// Printable identity, e.g. `USER:0190..` or `SCHEDULER`.
    pub fn label(&self) -> String {
        match self.id {
            Some(id) => format!("{}:{id}", self.kind),
            None => self.kind.to_string(),
        }
    }
}
