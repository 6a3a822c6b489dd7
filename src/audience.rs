use serde::{Deserialize, Serialize};
use serde_with::{formats::PreferOne, serde_as, OneOrMany};
use std::{ops::Deref, slice};
use unicase::UniCase;

/// Whether two audiences are equal under Unicode case folding.
pub(crate) fn audience_eq(left: &str, right: &str) -> bool {
    UniCase::new(left) == UniCase::new(right)
}

/// An ordered list of audiences compared as a case-insensitive set.
///
/// A single audience is serialized as a plain string, anything else as an array.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Audiences(#[serde_as(as = "OneOrMany<_, PreferOne>")] Vec<String>);

impl Audiences {
    /// Construct a new audience list.
    pub fn new(audiences: Vec<String>) -> Self {
        Self(audiences)
    }

    /// Whether `audience` is in this list.
    pub fn has(&self, audience: &str) -> bool {
        self.0.iter().any(|aud| audience_eq(aud, audience))
    }

    /// Whether any of `audiences` is in this list.
    ///
    /// An empty `audiences` never matches.
    pub fn has_any<S: AsRef<str>>(&self, audiences: &[S]) -> bool {
        audiences.iter().any(|aud| self.has(aud.as_ref()))
    }

    /// Whether all of `audiences` are in this list.
    ///
    /// An empty `audiences` never matches.
    pub fn has_all<S: AsRef<str>>(&self, audiences: &[S]) -> bool {
        !audiences.is_empty() && audiences.iter().all(|aud| self.has(aud.as_ref()))
    }

    /// Whether `audiences` has the same length as this list and all of its elements are in it.
    ///
    /// An empty `audiences` never matches.
    pub fn has_only<S: AsRef<str>>(&self, audiences: &[S]) -> bool {
        audiences.len() == self.0.len() && self.has_all(audiences)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl Deref for Audiences {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Audiences {
    type Item = &'a String;
    type IntoIter = slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<String>> for Audiences {
    fn from(audiences: Vec<String>) -> Self {
        Self(audiences)
    }
}

impl From<&[&str]> for Audiences {
    fn from(audiences: &[&str]) -> Self {
        audiences.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Audiences {
    fn from(audiences: [&str; N]) -> Self {
        Self::from(audiences.as_slice())
    }
}

impl<S: Into<String>> FromIterator<S> for Audiences {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
