pub mod audience;
pub mod claim;
pub mod claim_set;
pub mod envelope;
pub mod keys;
pub mod signer;
pub mod verifier;

pub use rsa;
