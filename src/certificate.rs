//! X.509 extractor: subject DN, SubjectPublicKeyInfo algorithm/curve,
//! KeyUsage, ExtendedKeyUsage, and the `can_sign` gate.

use const_oid::ObjectIdentifier;
use der_parser::asn1_rs::FromDer;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::X509Certificate;

use crate::error::{PdfSignError, Result};
use crate::oid::{Curve, ID_KP_TIME_STAMPING};

pub struct Certificate {
    der_bytes: Vec<u8>,
    parsed: X509Certificate<'static>,
}

impl Clone for Certificate {
    /// Re-parses from a fresh copy of `der_bytes` rather than deriving the
    /// clone field-by-field: `parsed` borrows from `der_bytes`, so a
    /// shallow derive would leave the clone's `parsed` pointing at the
    /// original's buffer instead of its own.
    fn clone(&self) -> Self {
        Certificate::from_der(self.der_bytes.clone())
            .expect("re-parsing already-valid certificate DER cannot fail")
    }
}

/// What the public key tells us about how this certificate signs.
#[derive(Debug, Clone, Copy)]
pub enum PublicKeyAlgorithm {
    Rsa,
    Ecdsa(Curve),
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let der_bytes = der;
        // Parse from `der_bytes` itself (not a temporary clone) so the
        // borrow transmuted below points into the heap buffer this struct
        // actually owns. Moving a `Vec<u8>` relocates the triple, not its
        // heap allocation, so the borrow stays valid for as long as
        // `der_bytes` is never mutated or dropped ahead of `parsed`.
        let parsed = X509Certificate::from_der(&der_bytes)
            .map_err(|e| PdfSignError::CertInvalid(format!("failed to parse certificate: {e:?}")))?
            .1;

        Ok(Self {
            // SAFETY: extends the borrow from `der_bytes` to `'static`. Sound
            // because `der_bytes` is a field of this same struct and is
            // never reallocated or exposed mutably after this point, so the
            // borrow outlives nothing it doesn't also own.
            parsed: unsafe { std::mem::transmute(parsed) },
            der_bytes,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der_bytes
    }

    fn parsed(&self) -> &X509Certificate<'_> {
        &self.parsed
    }

    /// Raw DER bytes of the Issuer `Name`, for `IssuerAndSerialNumber`/`IssuerSerial`.
    pub fn issuer_raw(&self) -> &[u8] {
        self.parsed().issuer().as_raw()
    }

    pub fn serial_number_bytes(&self) -> Vec<u8> {
        self.parsed().raw_serial().to_vec()
    }

    pub fn subject_cn(&self) -> Option<String> {
        self.parsed()
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(|s| s.to_string())
    }

    pub fn subject_org(&self) -> Option<String> {
        self.parsed()
            .subject()
            .iter_organization()
            .next()
            .and_then(|o| o.as_str().ok())
            .map(|s| s.to_string())
    }

    pub fn not_before(&self) -> String {
        self.parsed().validity().not_before.to_string()
    }

    pub fn not_after(&self) -> String {
        self.parsed().validity().not_after.to_string()
    }

    pub fn serial_number(&self) -> String {
        hex::encode(self.serial_number_bytes())
    }

    /// The SubjectPublicKeyInfo algorithm: RSA, or ECDSA with its curve.
    pub fn public_key_algorithm(&self) -> Result<PublicKeyAlgorithm> {
        let spki = &self.parsed().tbs_certificate.subject_pki;
        let alg_oid = oid_from_der_parser(&spki.algorithm.algorithm)?;

        if alg_oid == crate::oid::RSA_ENCRYPTION {
            return Ok(PublicKeyAlgorithm::Rsa);
        }
        if alg_oid == crate::oid::ID_EC_PUBLIC_KEY {
            let curve_oid = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or_else(|| PdfSignError::CertInvalid("EC key missing named curve".into()))?
                .as_oid()
                .map_err(|_| PdfSignError::CertInvalid("EC key parameters not an OID".into()))?;
            let curve_oid = ObjectIdentifier::new(&curve_oid.to_id_string())
                .map_err(|e| PdfSignError::CertInvalid(format!("bad curve OID: {e}")))?;
            return Ok(PublicKeyAlgorithm::Ecdsa(Curve::from_oid(curve_oid)?));
        }
        Err(PdfSignError::UnsupportedAlgorithm(format!(
            "unsupported SubjectPublicKeyInfo algorithm: {alg_oid}"
        )))
    }

    /// `true` unless KeyUsage is present with neither `digitalSignature` nor
    /// `contentCommitment` set, or EKU is present and consists solely of
    /// `id-kp-timeStamping`.
    pub fn can_sign(&self) -> bool {
        let mut key_usage_blocks = false;
        let mut eku_is_timestamp_only = false;

        for ext in self.parsed().extensions() {
            match ext.parsed_extension() {
                ParsedExtension::KeyUsage(ku) => {
                    if !ku.digital_signature() && !ku.non_repudiation() {
                        key_usage_blocks = true;
                    }
                }
                ParsedExtension::ExtendedKeyUsage(eku) => {
                    let only_timestamping = eku.time_stamping
                        && !eku.any
                        && !eku.server_auth
                        && !eku.client_auth
                        && !eku.code_signing
                        && !eku.email_protection
                        && !eku.ocsp_signing
                        && eku.other.is_empty();
                    if only_timestamping {
                        eku_is_timestamp_only = true;
                    }
                }
                _ => {}
            }
        }

        !key_usage_blocks && !eku_is_timestamp_only
    }

    /// Whether the ExtendedKeyUsage, if present, grants `id-kp-timeStamping`.
    pub fn has_timestamping_eku(&self) -> bool {
        for ext in self.parsed().extensions() {
            if let ParsedExtension::ExtendedKeyUsage(eku) = ext.parsed_extension() {
                if eku.time_stamping {
                    return true;
                }
                for oid in &eku.other {
                    if let Ok(s) = ObjectIdentifier::new(&oid.to_id_string()) {
                        if s == ID_KP_TIME_STAMPING {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

fn oid_from_der_parser(oid: &der_parser::oid::Oid) -> Result<ObjectIdentifier> {
    ObjectIdentifier::new(&oid.to_id_string())
        .map_err(|e| PdfSignError::CertInvalid(format!("bad OID: {e}")))
}

#[cfg(test)]
mod tests {
    // Certificate parsing is exercised end-to-end in `orchestrator`'s tests
    // using locally-generated test certificates; constructing a minimal
    // valid DER certificate by hand here would just re-implement an X.509
    // encoder for no benefit.
}
