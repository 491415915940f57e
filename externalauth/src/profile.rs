//! Normalized profile produced by every driver.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider-agnostic key of a profile attribute.
///
/// The well-known keys are associated constants; providers may define their own
/// (e.g. an organizational department) with [`ProfileIndex::new`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileIndex(Cow<'static, str>);

impl ProfileIndex {
    pub const AVATAR: ProfileIndex = ProfileIndex::new("Avatar");
    pub const EMAIL: ProfileIndex = ProfileIndex::new("Email");
    pub const GENDER: ProfileIndex = ProfileIndex::new("Gender");
    pub const NAME: ProfileIndex = ProfileIndex::new("Name");
    pub const NICKNAME: ProfileIndex = ProfileIndex::new("Nickname");
    pub const FIRST_NAME: ProfileIndex = ProfileIndex::new("FirstName");
    pub const LAST_NAME: ProfileIndex = ProfileIndex::new("LastName");
    pub const LOCALE: ProfileIndex = ProfileIndex::new("Locale");
    pub const ACCESS_TOKEN: ProfileIndex = ProfileIndex::new("AccessToken");

    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical gender values. Provider codes that map to neither leave the attribute unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Repeatable named attributes. Values keep insertion order and are never deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(BTreeMap<ProfileIndex, Vec<String>>);

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `index` with `value`.
    pub fn set_value(&mut self, index: ProfileIndex, value: impl Into<String>) {
        self.0.insert(index, vec![value.into()]);
    }

    /// Append `value` to the values of `index`.
    pub fn add_value(&mut self, index: ProfileIndex, value: impl Into<String>) {
        self.0.entry(index).or_default().push(value.into());
    }

    /// First value of `index`, if any.
    pub fn value(&self, index: &ProfileIndex) -> Option<&str> {
        self.values(index).first().map(String::as_str)
    }

    pub fn values(&self, index: &ProfileIndex) -> &[String] {
        self.0.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, index: &ProfileIndex) -> bool {
        self.0.contains_key(index)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a successful external login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// Provider account identifier.
    pub account: String,
    pub profile: Profile,
}

impl AuthResult {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            profile: Profile::new(),
        }
    }
}
