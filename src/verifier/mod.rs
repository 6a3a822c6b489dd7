pub mod error;

#[cfg(test)]
mod tests;

use crate::{
    audience::{audience_eq, Audiences},
    claim::{Claim, FINGERPRINT, ONLINE},
    claim_set::ClaimSet,
    envelope::TokenDecoder,
    keys::{self, KeyError},
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rsa::RsaPublicKey;
use serde_json::Value;
use std::{collections::HashMap, path::Path};
use tracing::debug;

pub use error::VerifyError;

/// A token verifier.
pub trait Verifier {
    /// Verify a token, returning the claims it carries.
    fn verify(&self, token: &[u8]) -> Result<VerifyResult, VerifyError>;
}

/// The outcome of a successful verification.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VerifyResult {
    /// The token id.
    pub id: String,

    /// Whether the token was issued for online use.
    pub is_online: bool,

    /// The token subject.
    pub subject: String,

    /// The token audiences accepted by the verifier, in the verifier's order.
    pub audience: Audiences,

    /// The audiences as they appear in the token.
    pub claim_audiences: Audiences,

    /// The token fingerprint, if any.
    pub fingerprint: String,

    /// The time before which the token is not valid.
    pub not_before: Option<DateTime<Utc>>,

    /// The time at which the token expires.
    pub expires: Option<DateTime<Utc>>,

    /// Every claim in the token, indexed by key.
    pub claims: HashMap<String, Claim>,
}

/// A verifier that checks tokens signed with an RSA key.
pub struct RsaVerifier {
    public_key: RsaPublicKey,
    audiences: Vec<String>,
    decoder: TokenDecoder,
    time_provider: Box<dyn TimeProvider>,
}

impl RsaVerifier {
    /// Construct a new verifier accepting tokens for any of `audiences`.
    pub fn new(public_key: RsaPublicKey, audiences: Vec<String>) -> Self {
        let time_provider = Box::new(SystemClockTimeProvider);
        Self { public_key, audiences, decoder: TokenDecoder::default(), time_provider }
    }

    /// Construct a new verifier using the public key in a PEM encoded certificate file.
    pub fn from_file<P: AsRef<Path>>(audiences: Vec<String>, path: P) -> Result<Self, KeyError> {
        let public_key = keys::parse_certificate_public_key_file(path)?;
        Ok(Self::new(public_key, audiences))
    }

    /// Construct a new verifier using the public key in PEM encoded certificate data.
    pub fn from_pem(audiences: Vec<String>, data: &[u8]) -> Result<Self, KeyError> {
        let public_key = keys::parse_certificate_public_key(data)?;
        Ok(Self::new(public_key, audiences))
    }

    /// Use a custom token decoder.
    pub fn with_decoder(mut self, decoder: TokenDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// The audiences this verifier accepts.
    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    fn validate_condition(condition: bool, error: VerifyError) -> Result<(), VerifyError> {
        if condition { Ok(()) } else { Err(error) }
    }

    // The token audiences this verifier accepts, following the verifier's own ordering.
    fn accepted_audiences(&self, claim_audiences: &Audiences) -> Audiences {
        self.audiences
            .iter()
            .cartesian_product(claim_audiences)
            .filter(|(accepted, audience)| audience_eq(accepted, audience))
            .map(|(_, audience)| audience.clone())
            .collect()
    }

    fn build_result(&self, claims: ClaimSet) -> VerifyResult {
        let registered = &claims.registered;
        let is_online = claims.extensions.get(ONLINE).and_then(Value::as_bool).unwrap_or_default();
        let fingerprint = claims.extensions.get(FINGERPRINT).and_then(Value::as_str).unwrap_or_default().to_string();
        let result = VerifyResult {
            id: registered.id.clone(),
            is_online,
            subject: registered.subject.clone(),
            audience: self.accepted_audiences(&registered.audiences),
            claim_audiences: registered.audiences.clone(),
            fingerprint,
            not_before: registered.not_before.map(|t| t.time()),
            expires: registered.expires.map(|t| t.time()),
            claims: HashMap::new(),
        };
        VerifyResult { claims: claims.into_claims(), ..result }
    }
}

impl Verifier for RsaVerifier {
    fn verify(&self, token: &[u8]) -> Result<VerifyResult, VerifyError> {
        // Sample the clock once so both time bounds are checked against the same instant.
        let now = self.time_provider.current_time();
        let claims = self.decoder.check(token, &self.public_key).map_err(|e| {
            debug!("token failed check: {e}");
            VerifyError::Check(e)
        })?;
        let audiences = &claims.registered.audiences;
        Self::validate_condition(audiences.has_any(self.audiences.as_slice()), VerifyError::InvalidAudience)?;
        Self::validate_condition(claims.is_valid_at(now), VerifyError::TimeNotValid)?;

        let result = self.build_result(claims);
        debug!(id = %result.id, subject = %result.subject, "token verified");
        Ok(result)
    }
}

pub(crate) trait TimeProvider: Send + Sync + 'static {
    fn current_time(&self) -> DateTime<Utc>;
}

struct SystemClockTimeProvider;

impl TimeProvider for SystemClockTimeProvider {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
