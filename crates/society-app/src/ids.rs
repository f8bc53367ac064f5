// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }

            pub const fn is_unsaved(self) -> bool {
                self.0 <= 0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(SocietyId);
entity_id!(ApartmentId);
entity_id!(FlatId);
entity_id!(ApartmentGroupId);
entity_id!(ComponentId);
entity_id!(GroupComponentId);
entity_id!(MeterReadingId);
entity_id!(UnitChargeId);

/// Opaque identity of whoever performs a create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub const ANONYMOUS: &'static str = "0";

    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            return Self::anonymous();
        }
        Self(value)
    }

    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::ANONYMOUS
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only source of the current actor. `None` means nobody is signed in;
/// calls still go out under [`ActorId::ANONYMOUS`].
pub trait ActorProvider {
    fn current_actor(&self) -> Option<ActorId>;

    fn actor_or_anonymous(&self) -> ActorId {
        self.current_actor().unwrap_or_else(ActorId::anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::{ActorId, ActorProvider, FlatId};

    struct NoActor;

    impl ActorProvider for NoActor {
        fn current_actor(&self) -> Option<ActorId> {
            None
        }
    }

    #[test]
    fn missing_actor_falls_back_to_zero() {
        assert_eq!(NoActor.actor_or_anonymous().as_str(), "0");
        assert!(ActorId::new("  ").is_anonymous());
        assert!(!ActorId::new("42").is_anonymous());
    }

    #[test]
    fn default_ids_are_unsaved() {
        assert!(FlatId::default().is_unsaved());
        assert!(!FlatId::new(7).is_unsaved());
        assert_eq!(FlatId::new(7).to_string(), "7");
    }
}
