//! Canonical object identifiers and algorithm lookup tables.

use const_oid::ObjectIdentifier;

use crate::error::{PdfSignError, Result};

// CMS content types
pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const ID_CT_TST_INFO: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");

// CMS attribute types
pub const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub const ID_SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");
pub const ID_AA_SIGNATURE_TIME_STAMP_TOKEN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");

// Digest algorithms
pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

// RSA signature OIDs (PKCS#1 v1.5)
pub const RSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const RSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub const RSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

// EC public key + ECDSA-with-SHA* signature OIDs
pub const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

// Named curve OIDs
pub const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
pub const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
pub const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

// RSA public key algorithm
pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// TSA Extended Key Usage (id-kp-timeStamping).
pub const ID_KP_TIME_STAMPING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8");

/// Recognized digest algorithm names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha384" => Ok(DigestAlgorithm::Sha384),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            other => Err(PdfSignError::UnsupportedAlgorithm(format!(
                "unknown digest algorithm: {other}"
            ))),
        }
    }

    /// OID lookup by name.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => SHA256,
            DigestAlgorithm::Sha384 => SHA384,
            DigestAlgorithm::Sha512 => SHA512,
        }
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Result<Self> {
        if oid == SHA256 {
            Ok(DigestAlgorithm::Sha256)
        } else if oid == SHA384 {
            Ok(DigestAlgorithm::Sha384)
        } else if oid == SHA512 {
            Ok(DigestAlgorithm::Sha512)
        } else {
            Err(PdfSignError::UnsupportedAlgorithm(format!(
                "unknown digest OID: {oid}"
            )))
        }
    }
}

/// The RSA signature (PKCS#1 v1.5) OID for a given digest name.
pub fn rsa_signature_oid(digest: DigestAlgorithm) -> ObjectIdentifier {
    match digest {
        DigestAlgorithm::Sha256 => RSA_WITH_SHA256,
        DigestAlgorithm::Sha384 => RSA_WITH_SHA384,
        DigestAlgorithm::Sha512 => RSA_WITH_SHA512,
    }
}

/// The ECDSA-with-SHA* signature OID for a given digest name.
pub fn ecdsa_signature_oid(digest: DigestAlgorithm) -> ObjectIdentifier {
    match digest {
        DigestAlgorithm::Sha256 => ECDSA_WITH_SHA256,
        DigestAlgorithm::Sha384 => ECDSA_WITH_SHA384,
        DigestAlgorithm::Sha512 => ECDSA_WITH_SHA512,
    }
}

/// Named elliptic curves supported by the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    pub fn from_oid(oid: ObjectIdentifier) -> Result<Self> {
        if oid == SECP256R1 {
            Ok(Curve::P256)
        } else if oid == SECP384R1 {
            Ok(Curve::P384)
        } else if oid == SECP521R1 {
            Ok(Curve::P521)
        } else {
            Err(PdfSignError::UnsupportedAlgorithm(format!(
                "unsupported curve OID: {oid}"
            )))
        }
    }

    /// The digest the curve is conventionally paired with:
    /// P-256 -> sha256, P-384 -> sha384, P-521 -> sha512.
    pub fn recommended_digest(self) -> DigestAlgorithm {
        match self {
            Curve::P256 => DigestAlgorithm::Sha256,
            Curve::P384 => DigestAlgorithm::Sha384,
            Curve::P521 => DigestAlgorithm::Sha512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_round_trips_by_name_and_oid() {
        for d in [
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(DigestAlgorithm::from_name(d.name()).unwrap(), d);
            assert_eq!(DigestAlgorithm::from_oid(d.oid()).unwrap(), d);
        }
    }

    #[test]
    fn unknown_digest_name_fails_fast() {
        assert!(DigestAlgorithm::from_name("md5").is_err());
    }

    #[test]
    fn curve_recommends_matching_hash() {
        assert_eq!(Curve::P256.recommended_digest(), DigestAlgorithm::Sha256);
        assert_eq!(Curve::P384.recommended_digest(), DigestAlgorithm::Sha384);
        assert_eq!(Curve::P521.recommended_digest(), DigestAlgorithm::Sha512);
    }

    #[test]
    fn signature_oid_selection() {
        assert_eq!(
            rsa_signature_oid(DigestAlgorithm::Sha256),
            RSA_WITH_SHA256
        );
        assert_eq!(
            ecdsa_signature_oid(DigestAlgorithm::Sha384),
            ECDSA_WITH_SHA384
        );
    }
}
