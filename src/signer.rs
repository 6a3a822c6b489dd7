use crate::{
    claim::{Claim, ClaimError, ClaimValue, RegisteredClaim, AUDIENCE, EXPIRES, ISSUER, NOT_BEFORE, ONLINE, SUBJECT},
    claim_set::ClaimSet,
    envelope::{self, Algorithm, SignError},
    keys::{self, KeyError},
};
use chrono::{DateTime, Utc};
use rsa::RsaPrivateKey;
use std::{iter, path::Path};
use tracing::debug;

/// A token signer.
pub trait Signer {
    /// Sign a list of claims, producing a token.
    fn sign_claims(&self, claims: Vec<Claim>) -> Result<Vec<u8>, SigningError>;
}

/// An error that can occur when signing a token.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error(transparent)]
    Claims(#[from] ClaimError),

    #[error("unable to sign claims: {0}")]
    Sign(#[source] SignError),
}

/// A signer that uses an RSA private key.
///
/// The configured issuer is placed before the caller's claims. Since later claims win, an `iss`
/// claim passed to [`Signer::sign_claims`] replaces the configured issuer.
#[derive(Clone, Debug)]
pub struct RsaSigner {
    private_key: RsaPrivateKey,
    issuer: String,
    algorithm: Algorithm,
}

impl RsaSigner {
    /// Construct a new signer using RS256 and no issuer.
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key, issuer: String::new(), algorithm: Algorithm::default() }
    }

    /// Construct a new signer using a PKCS1 private key in a PEM file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyError> {
        keys::parse_pkcs1_private_key_file(path).map(Self::new)
    }

    /// Construct a new signer using PEM encoded PKCS1 private key data.
    pub fn from_pem(data: &[u8]) -> Result<Self, KeyError> {
        keys::parse_pkcs1_private_key(data).map(Self::new)
    }

    /// Set the issuer placed in every token.
    pub fn issuer<S: Into<String>>(mut self, issuer: S) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the signature algorithm.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    fn sign_claim_set<I>(&self, claims: I) -> Result<Vec<u8>, SigningError>
    where
        I: IntoIterator<Item = Claim>,
    {
        let claims = iter::once(Claim::string(ISSUER, &self.issuer)).chain(claims);
        let claim_set = ClaimSet::assemble(claims)?;
        if claim_set.registered.issuer != self.issuer {
            debug!(configured = %self.issuer, issuer = %claim_set.registered.issuer, "issuer overridden by claim");
        }
        let token = envelope::sign(&claim_set, self.algorithm, &self.private_key).map_err(SigningError::Sign)?;
        debug!(id = %claim_set.registered.id, algorithm = %self.algorithm, "signed token");
        Ok(token)
    }
}

impl Signer for RsaSigner {
    fn sign_claims(&self, claims: Vec<Claim>) -> Result<Vec<u8>, SigningError> {
        self.sign_claim_set(claims)
    }
}

/// A signer producing tokens for container registry distribution.
///
/// Registries expect a single audience, so a multi valued `aud` claim is reduced to its first
/// element before signing.
#[derive(Clone, Debug)]
pub struct DistributionRsaSigner {
    inner: RsaSigner,
}

impl DistributionRsaSigner {
    pub fn new(signer: RsaSigner) -> Self {
        Self { inner: signer }
    }

    /// Construct a new signer using a PKCS1 private key in a PEM file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyError> {
        RsaSigner::from_file(path).map(Self::new)
    }

    fn scalar_audience(claim: Claim) -> Claim {
        if claim.registered() != Some(RegisteredClaim::Audience) {
            return claim;
        }
        let first = match claim.value() {
            ClaimValue::Strings(audiences) => audiences.first().cloned(),
            _ => None,
        };
        match first {
            Some(audience) => Claim::string(claim.key(), audience),
            None => claim,
        }
    }
}

impl Signer for DistributionRsaSigner {
    fn sign_claims(&self, claims: Vec<Claim>) -> Result<Vec<u8>, SigningError> {
        self.inner.sign_claim_set(claims.into_iter().map(Self::scalar_audience))
    }
}

/// Sign a token for `subject` valid for `audiences` between `not_before` and `expires`.
pub fn sign<S, A>(
    signer: &S,
    audiences: &[A],
    subject: &str,
    online: bool,
    not_before: DateTime<Utc>,
    expires: DateTime<Utc>,
) -> Result<Vec<u8>, SigningError>
where
    S: Signer + ?Sized,
    A: AsRef<str>,
{
    signer.sign_claims(vec![
        Claim::string(SUBJECT, subject),
        Claim::strings(AUDIENCE, audiences.iter().map(|aud| aud.as_ref().to_string())),
        Claim::bool(ONLINE, online),
        Claim::time(NOT_BEFORE, not_before),
        Claim::time(EXPIRES, expires),
    ])
}
