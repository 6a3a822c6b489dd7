use crate::{
    audience::Audiences,
    claim::{Claim, ClaimError, ClaimKind, ClaimValue, RegisteredClaim, AUDIENCE, EXPIRES, ID, ISSUED, ISSUER,
        NOT_BEFORE, SUBJECT},
};
use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// A JSON object.
pub type JsonObject = serde_json::Map<String, Value>;

/// A JWT NumericDate: seconds since the unix epoch, possibly fractional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NumericTime(DateTime<Utc>);

impl NumericTime {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self(time)
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.0
    }

    fn from_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * NANOS_PER_SECOND).round();
        // Rounding can carry the fraction over into the next second.
        let (whole, nanos) = if nanos >= NANOS_PER_SECOND { (whole + 1.0, 0.0) } else { (whole, nanos) };
        DateTime::from_timestamp(whole as i64, nanos as u32).map(Self)
    }
}

impl From<DateTime<Utc>> for NumericTime {
    fn from(time: DateTime<Utc>) -> Self {
        Self(time)
    }
}

impl Serialize for NumericTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let seconds = self.0.timestamp();
        match self.0.timestamp_subsec_nanos() {
            0 => serializer.serialize_i64(seconds),
            nanos => serializer.serialize_f64(seconds as f64 + f64::from(nanos) / NANOS_PER_SECOND),
        }
    }
}

impl<'de> Deserialize<'de> for NumericTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Self::from_seconds(seconds).ok_or_else(|| D::Error::custom(format!("numeric time out of range: {seconds}")))
    }
}

/// The IANA registered claims of a token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Registered {
    /// The token issuer.
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,

    /// The token subject.
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,

    /// The services the token is intended for.
    #[serde(rename = "aud", default, skip_serializing_if = "Audiences::is_empty")]
    pub audiences: Audiences,

    /// The timestamp at which this token becomes invalid.
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<NumericTime>,

    /// The first timestamp at which this token is valid.
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<NumericTime>,

    /// The timestamp at which this token was issued.
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<NumericTime>,

    /// The token id.
    #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

/// The full set of claims carried in a token payload.
///
/// Registered claims and extension claims are serialized side by side in the same JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// The registered claims.
    #[serde(flatten)]
    pub registered: Registered,

    /// Every claim that is not registered.
    #[serde(flatten)]
    pub extensions: JsonObject,
}

impl ClaimSet {
    /// Fold a sequence of claims into a claim set.
    ///
    /// Claims are applied in order so a repeated key keeps the last value. A random id is
    /// generated if none was provided.
    ///
    /// Registered claims must carry the expected kind: a time for `exp`, `nbf` and `iat`, a string
    /// for `iss`, `sub` and `jti`, and a string or list of strings for `aud`. Any other kind fails
    /// rather than being dropped.
    pub fn assemble<I>(claims: I) -> Result<Self, ClaimError>
    where
        I: IntoIterator<Item = Claim>,
    {
        let mut claim_set = Self::default();
        for claim in claims {
            match claim.registered() {
                Some(field) => claim_set.set_registered(field, claim)?,
                None => claim_set.set_extension(claim)?,
            }
        }
        if claim_set.registered.id.is_empty() {
            claim_set.registered.id = Uuid::new_v4().to_string();
        }
        Ok(claim_set)
    }

    fn set_registered(&mut self, field: RegisteredClaim, claim: Claim) -> Result<(), ClaimError> {
        use RegisteredClaim::*;

        let registered = &mut self.registered;
        let (key, value) = claim.into_parts();
        match (field, value) {
            (Issuer, ClaimValue::String(issuer)) => registered.issuer = issuer,
            (Subject, ClaimValue::String(subject)) => registered.subject = subject,
            (Id, ClaimValue::String(id)) => registered.id = id,
            (Audience, ClaimValue::String(audience)) => registered.audiences = Audiences::new(vec![audience]),
            (Audience, ClaimValue::Strings(audiences)) => registered.audiences = Audiences::new(audiences),
            (Expires, ClaimValue::Time(time)) => registered.expires = Some(time.into()),
            (NotBefore, ClaimValue::Time(time)) => registered.not_before = Some(time.into()),
            (Issued, ClaimValue::Time(time)) => registered.issued = Some(time.into()),
            (Expires | NotBefore | Issued, value) => {
                return Err(ClaimError::InvalidTypeForRegisteredClaim { field, kind: value.kind() });
            }
            (Issuer | Subject | Id | Audience, value) => {
                return Err(ClaimError::ClaimFormatInvalid { key, kind: value.kind() });
            }
        };
        Ok(())
    }

    fn set_extension(&mut self, claim: Claim) -> Result<(), ClaimError> {
        let (key, value) = claim.into_parts();
        let value = match value {
            ClaimValue::String(value) => Value::String(value),
            ClaimValue::Strings(values) => Value::from(values),
            ClaimValue::Int(value) => Value::from(value),
            ClaimValue::Bool(value) => Value::Bool(value),
            ClaimValue::Time(time) => serde_json::to_value(NumericTime::new(time))
                .map_err(|_| ClaimError::ClaimFormatInvalid { key: key.clone(), kind: ClaimKind::Time })?,
            ClaimValue::ResourceActions(actions) => serde_json::to_value(&actions)
                .map_err(|_| ClaimError::ClaimFormatInvalid { key: key.clone(), kind: ClaimKind::ResourceActions })?,
            other => return Err(ClaimError::UnsupportedClaimType(other.kind())),
        };
        self.extensions.insert(key, value);
        Ok(())
    }

    /// Whether `now` falls within the token's `not before` and expiry bounds.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let registered = &self.registered;
        registered.expires.map(|t| now < t.time()).unwrap_or(true)
            && registered.not_before.map(|t| now >= t.time()).unwrap_or(true)
    }

    /// Break this claim set back into individual claims indexed by key.
    pub fn into_claims(self) -> HashMap<String, Claim> {
        let Self { registered, extensions } = self;
        let mut claims = HashMap::new();

        let strings = [(ISSUER, registered.issuer), (SUBJECT, registered.subject), (ID, registered.id)];
        for (key, value) in strings.into_iter().filter(|(_, value)| !value.is_empty()) {
            claims.insert(key.to_string(), Claim::string(key, value));
        }
        if !registered.audiences.is_empty() {
            claims.insert(AUDIENCE.to_string(), Claim::strings(AUDIENCE, registered.audiences.into_vec()));
        }
        let times = [(NOT_BEFORE, registered.not_before), (EXPIRES, registered.expires), (ISSUED, registered.issued)];
        for (key, time) in times.into_iter().filter_map(|(key, time)| time.map(|time| (key, time))) {
            claims.insert(key.to_string(), Claim::time(key, time.time()));
        }
        for (key, value) in extensions {
            claims.insert(key.clone(), Claim::any(key, value));
        }
        claims
    }
}
