use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, time::Duration};

/// The IANA registered claim for the token issuer.
pub const ISSUER: &str = "iss";

/// The IANA registered claim for the token subject.
pub const SUBJECT: &str = "sub";

/// The IANA registered claim for the token audience.
pub const AUDIENCE: &str = "aud";

/// The IANA registered claim for the token expiry time.
pub const EXPIRES: &str = "exp";

/// The IANA registered claim for the first time the token is valid.
pub const NOT_BEFORE: &str = "nbf";

/// The IANA registered claim for the token issue time.
pub const ISSUED: &str = "iat";

/// The IANA registered claim for the token id.
pub const ID: &str = "jti";

/// The extension claim flagging whether the subject is online.
pub const ONLINE: &str = "onl";

/// The extension claim carrying the subject's fingerprint.
pub const FINGERPRINT: &str = "fpt";

/// One of the IANA registered JSON Web Token claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisteredClaim {
    Issuer,
    Subject,
    Audience,
    Expires,
    NotBefore,
    Issued,
    Id,
}

impl RegisteredClaim {
    const ALL: [Self; 7] =
        [Self::Issuer, Self::Subject, Self::Audience, Self::Expires, Self::NotBefore, Self::Issued, Self::Id];

    /// Find the registered claim a key refers to.
    ///
    /// Both the 3 letter code and the long name are accepted, ignoring case.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|claim| key.eq_ignore_ascii_case(claim.code()) || key.eq_ignore_ascii_case(claim.alias()))
    }

    /// The 3 letter code used in the token payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Issuer => ISSUER,
            Self::Subject => SUBJECT,
            Self::Audience => AUDIENCE,
            Self::Expires => EXPIRES,
            Self::NotBefore => NOT_BEFORE,
            Self::Issued => ISSUED,
            Self::Id => ID,
        }
    }

    /// The long name accepted as an alias for the code.
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Issuer => "issuer",
            Self::Subject => "subject",
            Self::Audience => "audience",
            Self::Expires => "expires",
            Self::NotBefore => "notbefore",
            Self::Issued => "issued",
            Self::Id => "id",
        }
    }
}

impl fmt::Display for RegisteredClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Allowed actions on a named and typed registry resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceActions {
    /// The resource type, e.g. `repository`.
    #[serde(rename = "type")]
    pub resource_type: String,

    /// The resource class.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,

    /// The resource name.
    pub name: String,

    /// The actions allowed on the resource.
    pub actions: Vec<String>,
}

/// The value carried by a claim.
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimValue {
    String(String),
    Strings(Vec<String>),
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
    ResourceActions(Vec<ResourceActions>),
    Float(f64),
    Unsigned(u64),
    Duration(Duration),
    Binary(Vec<u8>),
    Reflect(Value),
    Skip,
}

impl ClaimValue {
    /// The kind of this value.
    pub fn kind(&self) -> ClaimKind {
        match self {
            Self::String(_) => ClaimKind::String,
            Self::Strings(_) => ClaimKind::Strings,
            Self::Int(_) => ClaimKind::Int64,
            Self::Bool(_) => ClaimKind::Bool,
            Self::Time(_) => ClaimKind::Time,
            Self::ResourceActions(_) => ClaimKind::ResourceActions,
            Self::Float(_) => ClaimKind::Float64,
            Self::Unsigned(_) => ClaimKind::Uint64,
            Self::Duration(_) => ClaimKind::Duration,
            Self::Binary(_) => ClaimKind::Binary,
            Self::Reflect(_) => ClaimKind::Reflect,
            Self::Skip => ClaimKind::Skip,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A signed integer of any width, held by a claim as a 64 bit integer.
pub trait SignedInteger: Into<i64> + sealed::Sealed {}

macro_rules! impl_from_int {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for ClaimValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

macro_rules! impl_signed_integer {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl SignedInteger for $ty {}
        )*
    };
}

impl_from_int!(Int: i8, i16, i32, i64);
impl_from_int!(Unsigned: u8, u16, u32, u64);
impl_signed_integer!(i8, i16, i32, i64);

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(value: Vec<String>) -> Self {
        Self::Strings(value)
    }
}

impl From<DateTime<Utc>> for ClaimValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl From<Vec<ResourceActions>> for ClaimValue {
    fn from(value: Vec<ResourceActions>) -> Self {
        Self::ResourceActions(value)
    }
}

impl From<f64> for ClaimValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}


impl From<Duration> for ClaimValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

/// The kind of a claim value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClaimKind {
    String,
    Strings,
    Int64,
    Bool,
    Time,
    ResourceActions,
    Float64,
    Uint64,
    Duration,
    Binary,
    Reflect,
    Skip,
}

impl ClaimKind {
    /// The kinds that can be placed in a signed token.
    pub const SIGNABLE: &'static [Self] =
        &[Self::String, Self::Strings, Self::Int64, Self::Bool, Self::Time, Self::ResourceActions];

    /// The kinds that can be held in a claim, including those read back from a verified token.
    pub const DISPLAYABLE: &'static [Self] = &[
        Self::String,
        Self::Strings,
        Self::Int64,
        Self::Bool,
        Self::Time,
        Self::ResourceActions,
        Self::Float64,
        Self::Uint64,
        Self::Duration,
        Self::Binary,
        Self::Reflect,
        Self::Skip,
    ];

    /// Whether claims of this kind can be signed.
    pub fn is_signable(&self) -> bool {
        Self::SIGNABLE.contains(self)
    }
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::String => "string",
            Self::Strings => "strings",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::Time => "time",
            Self::ResourceActions => "resource actions",
            Self::Float64 => "float64",
            Self::Uint64 => "uint64",
            Self::Duration => "duration",
            Self::Binary => "binary",
            Self::Reflect => "reflect",
            Self::Skip => "skip",
        };
        write!(f, "{text}")
    }
}

/// An error related to a claim's type or format.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("invalid claim type: expected {expected}, found {found}")]
    InvalidClaimType { expected: ClaimKind, found: ClaimKind },

    #[error("invalid type for registered claim {field}: {kind}")]
    InvalidTypeForRegisteredClaim { field: RegisteredClaim, kind: ClaimKind },

    #[error("unsupported claim type: {0}")]
    UnsupportedClaimType(ClaimKind),

    #[error("claim format is invalid for {kind} claim type: {key}")]
    ClaimFormatInvalid { key: String, kind: ClaimKind },
}

/// A key and a typed value to be placed in a token.
#[derive(Clone, Debug, PartialEq)]
pub struct Claim {
    key: String,
    value: ClaimValue,
}

impl Claim {
    /// Construct a claim, choosing the value representation from the Rust type.
    pub fn new<K: Into<String>, V: Into<ClaimValue>>(key: K, value: V) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// Construct a string claim.
    pub fn string<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::new(key, ClaimValue::String(value.into()))
    }

    /// Construct a claim holding a list of strings.
    pub fn strings<K, I, S>(key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(key, ClaimValue::Strings(values.into_iter().map(Into::into).collect()))
    }

    /// Construct a time claim.
    pub fn time<K: Into<String>>(key: K, value: DateTime<Utc>) -> Self {
        Self::new(key, ClaimValue::Time(value))
    }

    /// Construct an integer claim. All signed widths share the same 64 bit representation.
    ///
    /// Unsigned values go through [`Claim::unsigned`] or [`Claim::new`] and cannot be signed.
    pub fn int<K: Into<String>, V: SignedInteger>(key: K, value: V) -> Self {
        Self::new(key, ClaimValue::Int(value.into()))
    }

    /// Construct a 64 bit integer claim.
    pub fn int64<K: Into<String>>(key: K, value: i64) -> Self {
        Self::new(key, ClaimValue::Int(value))
    }

    /// Construct a boolean claim.
    pub fn bool<K: Into<String>>(key: K, value: bool) -> Self {
        Self::new(key, ClaimValue::Bool(value))
    }

    /// Construct a claim granting actions on registry resources.
    pub fn resource_actions<K: Into<String>>(key: K, actions: Vec<ResourceActions>) -> Self {
        Self::new(key, ClaimValue::ResourceActions(actions))
    }

    /// Construct a claim holding an arbitrary JSON value.
    ///
    /// Such claims can be inspected but not signed.
    pub fn reflect<K: Into<String>>(key: K, value: Value) -> Self {
        Self::new(key, ClaimValue::Reflect(value))
    }

    /// Construct a floating point claim. It can be inspected but not signed.
    pub fn float<K: Into<String>>(key: K, value: f64) -> Self {
        Self::new(key, ClaimValue::Float(value))
    }

    /// Construct an unsigned integer claim. It can be inspected but not signed.
    pub fn unsigned<K: Into<String>>(key: K, value: u64) -> Self {
        Self::new(key, ClaimValue::Unsigned(value))
    }

    /// Construct a duration claim. It can be inspected but not signed.
    pub fn duration<K: Into<String>>(key: K, value: Duration) -> Self {
        Self::new(key, ClaimValue::Duration(value))
    }

    /// Construct a claim holding raw bytes. It can be inspected but not signed.
    pub fn binary<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Self {
        Self::new(key, ClaimValue::Binary(value.into()))
    }

    /// Construct a no-op claim.
    pub fn skip<K: Into<String>>(key: K) -> Self {
        Self::new(key, ClaimValue::Skip)
    }

    /// Construct a claim from a JSON value, picking the closest typed representation and falling
    /// back to [`ClaimValue::Reflect`].
    pub fn any<K: Into<String>>(key: K, value: Value) -> Self {
        let value = match value {
            Value::Bool(value) => ClaimValue::Bool(value),
            Value::String(value) => ClaimValue::String(value),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    ClaimValue::Int(value)
                } else if let Some(value) = number.as_u64() {
                    ClaimValue::Unsigned(value)
                } else if let Some(value) = number.as_f64() {
                    ClaimValue::Float(value)
                } else {
                    ClaimValue::Reflect(Value::Number(number))
                }
            }
            Value::Array(items) if items.iter().all(Value::is_string) => {
                let items = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(item) => Some(item),
                        _ => None,
                    })
                    .collect();
                ClaimValue::Strings(items)
            }
            other => ClaimValue::Reflect(other),
        };
        Self { key: key.into(), value }
    }

    /// The key as it was provided.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value held by this claim.
    pub fn value(&self) -> &ClaimValue {
        &self.value
    }

    /// The kind of value held by this claim.
    pub fn kind(&self) -> ClaimKind {
        self.value.kind()
    }

    pub(crate) fn into_parts(self) -> (String, ClaimValue) {
        (self.key, self.value)
    }

    /// The registered claim this claim's key refers to, if any.
    pub fn registered(&self) -> Option<RegisteredClaim> {
        RegisteredClaim::from_key(&self.key)
    }

    /// Whether the key is one of the IANA registered claims.
    pub fn is_registered(&self) -> bool {
        self.registered().is_some()
    }

    /// The key to use in the token: the 3 letter code for registered claims, the key itself otherwise.
    pub fn field(&self) -> &str {
        match self.registered() {
            Some(claim) => claim.code(),
            None => &self.key,
        }
    }

    /// The string held by this claim.
    pub fn as_str(&self) -> Result<&str, ClaimError> {
        match &self.value {
            ClaimValue::String(value) => Ok(value),
            other => Err(self.invalid_type(ClaimKind::String, other)),
        }
    }

    /// The list of strings held by this claim.
    pub fn as_strings(&self) -> Result<&[String], ClaimError> {
        match &self.value {
            ClaimValue::Strings(values) => Ok(values),
            other => Err(self.invalid_type(ClaimKind::Strings, other)),
        }
    }

    /// The integer held by this claim.
    pub fn as_int(&self) -> Result<i64, ClaimError> {
        match &self.value {
            ClaimValue::Int(value) => Ok(*value),
            other => Err(self.invalid_type(ClaimKind::Int64, other)),
        }
    }

    /// The boolean held by this claim.
    pub fn as_bool(&self) -> Result<bool, ClaimError> {
        match &self.value {
            ClaimValue::Bool(value) => Ok(*value),
            other => Err(self.invalid_type(ClaimKind::Bool, other)),
        }
    }

    /// The time held by this claim.
    pub fn time_value(&self) -> Result<DateTime<Utc>, ClaimError> {
        match &self.value {
            ClaimValue::Time(value) => Ok(*value),
            other => Err(self.invalid_type(ClaimKind::Time, other)),
        }
    }

    fn invalid_type(&self, expected: ClaimKind, found: &ClaimValue) -> ClaimError {
        ClaimError::InvalidClaimType { expected, found: found.kind() }
    }
}
