use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of anyone who can act on an engagement: a hiring owner, a sender,
/// or a performer profile. Both sides share one id space so negotiation log
/// entries can be attributed without knowing which table the actor lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

impl PartyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
