use crate::claim_set::ClaimSet;
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use rsa::{traits::PublicKeyParts, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::{fmt, str::FromStr};

const TOKEN_TYPE: &str = "JWT";

/// The signature algorithm used on a token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[default]
    RS256,

    /// RSASSA-PKCS1-v1_5 with SHA-384.
    RS384,

    /// RSASSA-PKCS1-v1_5 with SHA-512.
    RS512,
}

impl Algorithm {
    // The PKCS1 v1.5 padding scheme for this algorithm along with the digest of `message`.
    fn prehash(&self, message: &[u8]) -> (Pkcs1v15Sign, Vec<u8>) {
        match self {
            Self::RS256 => (Pkcs1v15Sign::new::<Sha256>(), Sha256::digest(message).to_vec()),
            Self::RS384 => (Pkcs1v15Sign::new::<Sha384>(), Sha384::digest(message).to_vec()),
            Self::RS512 => (Pkcs1v15Sign::new::<Sha512>(), Sha512::digest(message).to_vec()),
        }
    }

    fn sign(&self, key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, rsa::Error> {
        let (scheme, digest) = self.prehash(message);
        key.sign(scheme, &digest)
    }

    fn verify(&self, key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<(), InvalidSignature> {
        if signature.len() != key.size() {
            return Err(InvalidSignature::Malformed);
        }
        let (scheme, digest) = self.prehash(message);
        key.verify(scheme, &digest, signature).map_err(|_| InvalidSignature::Mismatch)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Algorithm {
    type Err = UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            _ => Err(UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// An algorithm that is not one of the supported RSA signature algorithms.
#[derive(Debug, thiserror::Error)]
#[error("algorithm {0:?} not in use")]
pub struct UnsupportedAlgorithm(pub String);

#[derive(Serialize, Deserialize)]
struct JwtHeader {
    alg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Sign a claim set, producing a token in JWS compact form.
pub fn sign(claims: &ClaimSet, algorithm: Algorithm, key: &RsaPrivateKey) -> Result<Vec<u8>, SignError> {
    let header = JwtHeader { alg: algorithm.to_string(), typ: Some(TOKEN_TYPE.to_string()) };
    let header = to_base64_json(&header).map_err(|e| SignError::Encoding("header", e))?;
    let payload = to_base64_json(claims).map_err(|e| SignError::Encoding("payload", e))?;

    let message = format!("{header}.{payload}");
    let signature = algorithm.sign(key, message.as_bytes()).map_err(SignError::Signing)?;
    let signature = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{message}.{signature}").into_bytes())
}

/// Decode a token and check its signature using the default [`TokenDecoder`].
pub fn check(token: &[u8], key: &RsaPublicKey) -> Result<ClaimSet, CheckError> {
    TokenDecoder::default().check(token, key)
}

/// A token decoder.
///
/// The default decoder accepts tokens of any size, matching what [`sign`] produces.
#[derive(Clone, Debug)]
pub struct TokenDecoder {
    /// The maximum raw token size, in bytes.
    pub max_raw_token_size: usize,
}

impl Default for TokenDecoder {
    fn default() -> Self {
        Self { max_raw_token_size: usize::MAX }
    }
}

impl TokenDecoder {
    /// Decode a token, check its signature against `key` and return the claims it carries.
    ///
    /// The payload is only parsed once the signature is known to be valid.
    pub fn check(&self, token: &[u8], key: &RsaPublicKey) -> Result<ClaimSet, CheckError> {
        let raw = RawToken::parse(token, self.max_raw_token_size)?;
        let header: JwtHeader = from_json(&raw.header, "header")?;
        let algorithm: Algorithm = header.alg.parse()?;
        algorithm.verify(key, raw.signing_input.as_bytes(), &raw.signature)?;
        Ok(from_json(&raw.payload, "payload")?)
    }
}

struct RawToken<'a> {
    signing_input: &'a str,
    header: Vec<u8>,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

impl<'a> RawToken<'a> {
    fn parse(token: &'a [u8], max_size: usize) -> Result<Self, TokenParseError> {
        if token.len() > max_size {
            return Err(TokenParseError::TooLarge(max_size));
        }
        let token = std::str::from_utf8(token).map_err(|_| TokenParseError::NotUtf8)?;
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenParseError::MissingComponent("signature"))?;
        let (header, payload) = signing_input.split_once('.').ok_or(TokenParseError::MissingComponent("payload"))?;
        if payload.contains('.') {
            return Err(TokenParseError::TooManyComponents);
        }
        Ok(Self {
            signing_input,
            header: from_base64(header, "header")?,
            payload: from_base64(payload, "payload")?,
            signature: from_base64(signature, "signature")?,
        })
    }
}

fn from_base64(input: &str, component: &'static str) -> Result<Vec<u8>, TokenParseError> {
    BASE64_URL_SAFE_NO_PAD.decode(input).map_err(|e| TokenParseError::Base64(component, e))
}

fn from_json<T: for<'de> Deserialize<'de>>(input: &[u8], component: &'static str) -> Result<T, TokenParseError> {
    serde_json::from_slice(input).map_err(|e| TokenParseError::Json(component, e))
}

fn to_base64_json<T: Serialize>(input: &T) -> Result<String, serde_json::Error> {
    let input = serde_json::to_vec(input)?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(input))
}

/// An error when signing a claim set.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("encoding {0}: {1}")]
    Encoding(&'static str, serde_json::Error),

    #[error("signing failed: {0}")]
    Signing(rsa::Error),
}

/// An error when checking a token.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("malformed token: {0}")]
    Parse(#[from] TokenParseError),

    #[error(transparent)]
    Algorithm(#[from] UnsupportedAlgorithm),

    #[error("invalid signature: {0}")]
    Signature(#[from] InvalidSignature),
}

/// An error when parsing a token in JWS compact form.
#[derive(Debug, thiserror::Error)]
pub enum TokenParseError {
    #[error("token is larger than max allowed: {0} bytes")]
    TooLarge(usize),

    #[error("token is not valid UTF-8")]
    NotUtf8,

    #[error("no {0} component in token")]
    MissingComponent(&'static str),

    #[error("too many components in token")]
    TooManyComponents,

    #[error("invalid base64 found on {0}: {1}")]
    Base64(&'static str, base64::DecodeError),

    #[error("invalid JSON on {0}: {1}")]
    Json(&'static str, serde_json::Error),
}

/// An error during the verification of a token signature.
#[derive(Debug, thiserror::Error)]
pub enum InvalidSignature {
    #[error("malformed signature")]
    Malformed,

    #[error("signature does not match")]
    Mismatch,
}
