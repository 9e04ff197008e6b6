//! Producer roles and the role-keyed map used for every per-producer collection

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::Error;

/// Identity of an analyst producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Price action, indicators, volume and chart patterns
    Technical,
    /// Headlines, announcements and sentiment shifts
    News,
    /// Valuation, financial health and business quality
    Fundamental,
}

impl Role {
    /// Every role, in default declaration order
    pub const ALL: [Role; 3] = [Role::Technical, Role::News, Role::Fundamental];

    /// Lowercase identifier used on the wire and in rationale lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::News => "news",
            Self::Fundamental => "fundamental",
        }
    }

    /// Human-readable title
    pub fn title(&self) -> &'static str {
        match self {
            Self::Technical => "Technical Analyst",
            Self::News => "News & Sentiment Analyst",
            Self::Fundamental => "Fundamental Analyst",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" | "tech" => Ok(Self::Technical),
            "news" | "sentiment" => Ok(Self::News),
            "fundamental" | "fund" => Ok(Self::Fundamental),
            other => Err(Error::Configuration(format!("unknown role '{other}'"))),
        }
    }
}

/// An insertion-ordered map keyed by [`Role`]
///
/// Each role occupies at most one slot. Inserting an existing role replaces
/// its value in place, so iteration order always follows first insertion.
/// Serializes as a JSON object in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleMap<T> {
    entries: Vec<(Role, T)>,
}

impl<T> Default for RoleMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> RoleMap<T> {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for that role
    pub fn insert(&mut self, role: Role, value: T) -> Option<T> {
        if let Some((_, slot)) = self.entries.iter_mut().find(|(r, _)| *r == role) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((role, value));
        None
    }

    /// Get the value for a role
    pub fn get(&self, role: Role) -> Option<&T> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, v)| v)
    }

    /// Check if a role is present
    pub fn contains(&self, role: Role) -> bool {
        self.get(role).is_some()
    }

    /// Roles in insertion order
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.entries.iter().map(|(r, _)| *r)
    }

    /// Values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        self.entries.iter().map(|(r, v)| (*r, v))
    }

    /// Number of roles present
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> FromIterator<(Role, T)> for RoleMap<T> {
    fn from_iter<I: IntoIterator<Item = (Role, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (role, value) in iter {
            map.insert(role, value);
        }
        map
    }
}

impl<T> IntoIterator for RoleMap<T> {
    type Item = (Role, T);
    type IntoIter = std::vec::IntoIter<(Role, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T: Serialize> Serialize for RoleMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(r, v)| (r, v)))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for RoleMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoleMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for RoleMapVisitor<T> {
            type Value = RoleMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by producer role")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = RoleMap::new();
                while let Some((role, value)) = access.next_entry::<Role, T>()? {
                    map.insert(role, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(RoleMapVisitor(PhantomData))
    }
}
