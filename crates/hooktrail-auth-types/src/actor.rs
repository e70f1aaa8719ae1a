use serde::Serialize;
use uuid::Uuid;

/// Who initiated an action.
///
/// `System` covers work that is not attributable to a person: initial
/// processing of provider callbacks and the local admin bypass used in
/// development. Audit trails record `Human` actors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Human { id: Uuid, email: Option<String> },
    System,
}

impl Actor {
    pub fn human(id: Uuid, email: impl Into<String>) -> Self {
        Self::Human {
            id,
            email: Some(email.into()),
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human { .. })
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Human { id, .. } => Some(*id),
            Self::System => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Human { email, .. } => email.as_deref(),
            Self::System => None,
        }
    }
}
