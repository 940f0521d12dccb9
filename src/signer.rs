//! Generic "sign bytes with this key" primitive.
//!
//! Key material is an external collaborator behind a single seam: given
//! a PEM-encoded private key and a digest that has already been
//! computed, produce a signature. This module is that seam, supporting
//! RSA and ECDSA over P-256/P-384/P-521.

use ecdsa::signature::hazmat::PrehashSigner;
use pkcs8::DecodePrivateKey;
use rsa::{pkcs1v15::Pkcs1v15Sign, RsaPrivateKey};

use crate::error::{PdfSignError, Result};
use crate::oid::{Curve, DigestAlgorithm};

/// The signing key loaded from a caller-supplied PEM document.
pub enum SigningKey {
    Rsa(Box<RsaPrivateKey>),
    EcdsaP256(Box<p256::ecdsa::SigningKey>),
    EcdsaP384(Box<p384::ecdsa::SigningKey>),
    EcdsaP521(Box<p521::ecdsa::SigningKey>),
}

/// The key family, used to pick the CMS `signatureAlgorithm` OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    Ecdsa(Curve),
}

impl SigningKey {
    /// Load a private key from PEM, trying RSA first, then each supported
    /// named curve in turn. Unknown key material fails fast.
    pub fn from_pem(pem: &str) -> Result<Self> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(SigningKey::Rsa(Box::new(key)));
        }
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(SigningKey::EcdsaP256(Box::new(key)));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(SigningKey::EcdsaP384(Box::new(key)));
        }
        if let Ok(key) = p521::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(SigningKey::EcdsaP521(Box::new(key)));
        }
        Err(PdfSignError::UnsupportedAlgorithm(
            "private key is neither RSA nor a supported EC curve (P-256/P-384/P-521)".into(),
        ))
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            SigningKey::Rsa(_) => KeyAlgorithm::Rsa,
            SigningKey::EcdsaP256(_) => KeyAlgorithm::Ecdsa(Curve::P256),
            SigningKey::EcdsaP384(_) => KeyAlgorithm::Ecdsa(Curve::P384),
            SigningKey::EcdsaP521(_) => KeyAlgorithm::Ecdsa(Curve::P521),
        }
    }

    /// The hash this key recommends when the caller didn't pin one down.
    pub fn recommended_digest(&self) -> DigestAlgorithm {
        match self.algorithm() {
            KeyAlgorithm::Rsa => DigestAlgorithm::Sha256,
            KeyAlgorithm::Ecdsa(curve) => curve.recommended_digest(),
        }
    }

    /// Sign an already-computed digest, producing a raw PKCS#1 v1.5
    /// signature (RSA) or a DER-encoded `(r, s)` signature (ECDSA).
    pub fn sign_prehashed(&self, digest: DigestAlgorithm, hashed: &[u8]) -> Result<Vec<u8>> {
        match self {
            SigningKey::Rsa(key) => sign_rsa(key, digest, hashed),
            SigningKey::EcdsaP256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .sign_prehash(hashed)
                    .map_err(|e| PdfSignError::Signing(e.to_string()))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            SigningKey::EcdsaP384(key) => {
                let sig: p384::ecdsa::Signature = key
                    .sign_prehash(hashed)
                    .map_err(|e| PdfSignError::Signing(e.to_string()))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            SigningKey::EcdsaP521(key) => {
                let sig: p521::ecdsa::Signature = key
                    .sign_prehash(hashed)
                    .map_err(|e| PdfSignError::Signing(e.to_string()))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
        }
    }
}

fn sign_rsa(key: &RsaPrivateKey, digest: DigestAlgorithm, hashed: &[u8]) -> Result<Vec<u8>> {
    let padding = match digest {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
    };
    key.sign(padding, hashed)
        .map_err(|e| PdfSignError::Signing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_pem_fails_fast() {
        let err = SigningKey::from_pem("-----BEGIN NONSENSE-----\nAA==\n-----END NONSENSE-----\n");
        assert!(err.is_err());
    }
}
