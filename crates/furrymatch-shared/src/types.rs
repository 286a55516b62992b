use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Every backend record is keyed by a numeric database id. Each kind gets its
// own newtype so a pet id can never be passed where an owner id is expected.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

entity_id!(
    /// A listed animal.
    PetId
);
entity_id!(
    /// An owner profile. Chat parties and contract creators are owners.
    OwnerId
);
entity_id!(
    /// A directional like/dislike edge.
    LikeId
);
entity_id!(
    /// A mutual match between two pets.
    MatchId
);
entity_id!(MessageId);
entity_id!(ContractId);
entity_id!(PhotoId);

/// Reference to another record by id only, as the backend nests relations
/// (`"firstPet": { "id": 5 }`). Extra fields in the nested object are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef<Id> {
    pub id: Id,
}

impl<Id> EntityRef<Id> {
    pub fn new(id: Id) -> Self {
        Self { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parse_trims() {
        assert_eq!(" 42 ".parse::<OwnerId>().unwrap(), OwnerId(42));
        assert!("abc".parse::<OwnerId>().is_err());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&PetId(9)).unwrap();
        assert_eq!(json, "9");
        let r: EntityRef<PetId> = serde_json::from_str(r#"{"id":5,"name":"Rex"}"#).unwrap();
        assert_eq!(r.id, PetId(5));
    }
}
