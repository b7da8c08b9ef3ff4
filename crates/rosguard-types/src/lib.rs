// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! rosguard-types: RouterOS Wireguard resource records.
//!
//! This crate contains the records exchanged with the RouterOS REST API
//! (interfaces, peers, IP addresses) and the [`Field`] type used to tell
//! "left to the device" apart from "explicitly set" on every attribute.

#![warn(missing_docs)]

pub mod resources;

pub use resources::{Interface, IpAddress, KeyPair, Peer, Resource};

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// A record attribute that is either unset or carries an explicit value.
///
/// Unset attributes are omitted from request bodies, so the device keeps its
/// current value on update and applies its default on create. A set attribute is
/// always sent, including falsy values such as `false`, `0` or `""`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field<T> {
    /// Not specified by the caller.
    Unset,
    /// Explicitly specified.
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Field<T> {
    /// True when no value has been specified.
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// True when a value has been specified.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Borrow the value, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Unset => None,
        }
    }

    /// Build a field from an `Option`, treating `None` as unset.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Unset,
        }
    }

    /// Convert into an `Option`, dropping the field wrapper.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Unset => None,
        }
    }

    /// Map the contained value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Set(v) => Field::Set(f(v)),
            Self::Unset => Field::Unset,
        }
    }

    /// Borrow the value through `Deref`, e.g. `Field<String>` as `Option<&str>`.
    pub fn as_deref(&self) -> Option<&T::Target>
    where
        T: std::ops::Deref,
    {
        self.get().map(|v| &**v)
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::Set(value)
    }
}

impl<T: Display> Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(v) => v.fmt(f),
            Self::Unset => f.write_str("-"),
        }
    }
}

// RouterOS renders every scalar as a string, so set values go out as strings.
impl<T: Display> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(v) => serializer.collect_str(v),
            Self::Unset => serializer.serialize_none(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Unsigned(n) => n.to_string(),
            Self::Signed(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

impl<'de, T> Deserialize<'de> for Field<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<Scalar>::deserialize(deserializer)? {
            None => Ok(Self::Unset),
            Some(scalar) => {
                let text = scalar.into_text();
                text.parse::<T>()
                    .map(Self::Set)
                    .map_err(|e| de::Error::custom(format!("invalid value {text:?}: {e}")))
            }
        }
    }
}
