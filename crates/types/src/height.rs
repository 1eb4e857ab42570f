use core::fmt;

use serde::{Deserialize, Serialize};

/// A blockchain height
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Height(u64);

impl Height {
    pub const ZERO: Self = Self(0);

    pub const fn new(height: u64) -> Self {
        Self(height)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn increment(&self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn decrement(&self) -> Option<Self> {
        match self.0.checked_sub(1) {
            Some(h) => Some(Self(h)),
            None => None,
        }
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for Height {
    fn from(height: u64) -> Self {
        Self(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_and_decrement() {
        let h = Height::new(7);
        assert_eq!(h.increment(), Height::new(8));
        assert_eq!(h.decrement(), Some(Height::new(6)));
        assert_eq!(Height::ZERO.decrement(), None);
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&Height::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
