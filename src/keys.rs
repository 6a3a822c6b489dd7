//! Loading of RSA keys from PEM encoded files.
//!
//! Private keys are expected in PKCS1 form while public keys are taken from an X.509 certificate.

use der::{asn1::ObjectIdentifier, Decode, Encode};
use rsa::{pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePublicKey, RsaPrivateKey, RsaPublicKey};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;
use x509_cert::Certificate;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Parse a PKCS1 RSA private key from a PEM file.
pub fn parse_pkcs1_private_key_file<P: AsRef<Path>>(path: P) -> Result<RsaPrivateKey, KeyError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading private key");
    let data = read(path, "private key")?;
    parse_pkcs1_private_key(&data)
}

/// Parse a PKCS1 RSA private key from PEM data.
pub fn parse_pkcs1_private_key(data: &[u8]) -> Result<RsaPrivateKey, KeyError> {
    let block = pem::parse(data)?;
    RsaPrivateKey::from_pkcs1_der(block.contents()).map_err(KeyError::ParsePrivateKey)
}

/// Parse the RSA public key in an X.509 certificate from a PEM file.
pub fn parse_certificate_public_key_file<P: AsRef<Path>>(path: P) -> Result<RsaPublicKey, KeyError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading certificate");
    let data = read(path, "certificate")?;
    parse_certificate_public_key(&data)
}

/// Parse the RSA public key in an X.509 certificate from PEM data.
pub fn parse_certificate_public_key(data: &[u8]) -> Result<RsaPublicKey, KeyError> {
    let block = pem::parse(data)?;
    let certificate = Certificate::from_der(block.contents()).map_err(KeyError::ParseCertificate)?;
    let public_key_info = certificate.tbs_certificate.subject_public_key_info;
    if public_key_info.algorithm.oid != RSA_ENCRYPTION {
        return Err(KeyError::ExtractPublicKey);
    }
    let public_key_der = public_key_info.to_der().map_err(KeyError::ParseCertificate)?;
    RsaPublicKey::from_public_key_der(&public_key_der).map_err(KeyError::ParsePublicKey)
}

fn read(path: &Path, kind: &'static str) -> Result<Vec<u8>, KeyError> {
    fs::read(path).map_err(|source| KeyError::Read { kind, path: path.to_path_buf(), source })
}

/// An error when loading a key.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unable to read {kind} {path:?}: {source}")]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid PEM encoding: {0}")]
    Pem(#[from] pem::PemError),

    #[error("unable to parse private key: {0}")]
    ParsePrivateKey(#[source] rsa::pkcs1::Error),

    #[error("unable to parse certificate: {0}")]
    ParseCertificate(#[source] der::Error),

    #[error("unable to parse public key: {0}")]
    ParsePublicKey(#[source] rsa::pkcs8::spki::Error),

    #[error("unable to extract public key")]
    ExtractPublicKey,
}
