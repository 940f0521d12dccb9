//! CAdES-BES `SignedData` builder: mandatory signed attributes, the
//! detached `SignerInfo`/`SignedData`/`ContentInfo` triple, and the
//! unsigned signature-time-stamp attribute attached once a TSA token
//! is available.

use der::asn1::{Any, Int, OctetString, SetOfVec};
use der::{Decode, Encode};
use spki::AlgorithmIdentifierOwned;

use crate::asn1::cms_types::{
    Attribute, ContentInfo, EncapsulatedContentInfo, IssuerAndSerialNumber, SignedData, SignerInfo,
};
use crate::asn1::ess::{EssCertIdV2, GeneralName, IssuerSerial, SigningCertificateV2};
use crate::asn1::UnsortedSet;
use crate::certificate::Certificate;
use crate::error::{PdfSignError, Result};
use crate::oid::{self, DigestAlgorithm};
use crate::signer::{KeyAlgorithm, SigningKey};
use crate::utils;

/// Everything needed to assemble a detached CAdES-BES `SignedData` over a
/// digest the caller already computed (the PDF's `/ByteRange` hash).
pub struct CadesBuilder<'a> {
    pub leaf: &'a Certificate,
    pub chain: &'a [Certificate],
    pub key: &'a SigningKey,
    pub digest: DigestAlgorithm,
}

impl<'a> CadesBuilder<'a> {
    /// Build the detached `SignedData`, DER-encode it inside a `ContentInfo`,
    /// and return the bytes ready for hex-embedding into `/Contents`.
    pub fn build(&self, pre_image_digest: &[u8]) -> Result<Vec<u8>> {
        let signed_attrs = self.build_signed_attrs(pre_image_digest)?;
        let attrs_der = signed_attrs.to_der()?;
        let prehash = utils::digest(self.digest, &attrs_der);
        let signature = self.key.sign_prehashed(self.digest, &prehash)?;

        let signer_info = SignerInfo {
            version: 1,
            sid: IssuerAndSerialNumber {
                issuer: any_from_der(self.leaf.issuer_raw())?,
                serial_number: Int::new(&self.leaf.serial_number_bytes())?,
            },
            digest_algorithm: digest_algorithm_identifier(self.digest)?,
            signed_attrs: Some(signed_attrs),
            signature_algorithm: signature_algorithm_identifier(self.key.algorithm(), self.digest)?,
            signature: OctetString::new(signature)?,
            unsigned_attrs: None,
        };

        let signed_data = self.assemble_signed_data(signer_info)?;
        wrap_content_info(&signed_data)
    }

    /// Rebuild `ContentInfo` with an `id-aa-signatureTimeStampToken` unsigned
    /// attribute holding `token_der` (the TSA's `TimeStampToken`, already a
    /// full `ContentInfo`).
    pub fn attach_timestamp(&self, cades_der: &[u8], token_der: &[u8]) -> Result<Vec<u8>> {
        let content_info = ContentInfo::from_der(cades_der)?;
        let signed_data_der = content_info.content.to_der()?;
        let mut signed_data = SignedData::from_der(&signed_data_der)?;

        let mut signer_infos = signed_data.signer_infos.into_inner();
        let mut signer_info = signer_infos
            .pop()
            .ok_or_else(|| PdfSignError::Signing("SignedData has no SignerInfo to timestamp".into()))?;

        let ts_attr = Attribute::single(
            oid::ID_AA_SIGNATURE_TIME_STAMP_TOKEN,
            Any::from_der(token_der)?,
        )?;
        let mut unsigned = SetOfVec::new();
        unsigned.insert(ts_attr)?;
        signer_info.unsigned_attrs = Some(unsigned);

        signer_infos.push(signer_info);
        signed_data.signer_infos = UnsortedSet::new(signer_infos);

        wrap_content_info(&signed_data)
    }

    fn build_signed_attrs(&self, pre_image_digest: &[u8]) -> Result<SetOfVec<Attribute>> {
        let content_type = Attribute::single(oid::ID_CONTENT_TYPE, any_from(&oid::ID_DATA)?)?;
        let message_digest = Attribute::single(
            oid::ID_MESSAGE_DIGEST,
            any_from(&OctetString::new(pre_image_digest.to_vec())?)?,
        )?;
        let signing_certificate_v2 = Attribute::single(
            oid::ID_SIGNING_CERTIFICATE_V2,
            any_from(&self.build_signing_certificate_v2()?)?,
        )?;

        let mut attrs = SetOfVec::new();
        attrs.insert(content_type)?;
        attrs.insert(message_digest)?;
        attrs.insert(signing_certificate_v2)?;
        Ok(attrs)
    }

    /// `ESSCertIDv2` hashes the leaf cert's DER with the chosen digest, and
    /// per RFC 5035 §3 omits `hashAlgorithm` only when it is SHA-256 (the
    /// CHOICE default).
    fn build_signing_certificate_v2(&self) -> Result<SigningCertificateV2> {
        let cert_hash = utils::digest(self.digest, self.leaf.der());
        let hash_algorithm = match self.digest {
            DigestAlgorithm::Sha256 => None,
            other => Some(digest_algorithm_identifier(other)?),
        };

        let issuer_serial = IssuerSerial {
            issuer: vec![GeneralName::DirectoryName(any_from_der(self.leaf.issuer_raw())?)],
            serial_number: Int::new(&self.leaf.serial_number_bytes())?,
        };

        Ok(SigningCertificateV2 {
            certs: vec![EssCertIdV2 {
                hash_algorithm,
                cert_hash: OctetString::new(cert_hash)?,
                issuer_serial: Some(issuer_serial),
            }],
            policies: None,
        })
    }

    fn assemble_signed_data(&self, signer_info: SignerInfo) -> Result<SignedData> {
        let mut certs = vec![any_from_der(self.leaf.der())?];
        for cert in self.chain {
            certs.push(any_from_der(cert.der())?);
        }

        Ok(SignedData {
            version: 1,
            digest_algorithms: UnsortedSet::new(vec![digest_algorithm_identifier(self.digest)?]),
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: oid::ID_DATA,
                econtent: None,
            },
            certificates: Some(UnsortedSet::new(certs)),
            signer_infos: UnsortedSet::new(vec![signer_info]),
        })
    }
}

/// Pulls the raw `SignerInfo.signature` bytes back out of a `ContentInfo`
/// produced by `CadesBuilder::build`. The signature-time-stamp imprint is
/// computed over this value (RFC 3161's `messageImprint`, not over the whole
/// CMS structure), so the orchestrator needs it without re-deriving the
/// signature itself.
pub fn extract_signature_value(cades_der: &[u8]) -> Result<Vec<u8>> {
    let content_info = ContentInfo::from_der(cades_der)?;
    let signed_data_der = content_info.content.to_der()?;
    let signed_data = SignedData::from_der(&signed_data_der)?;
    let signer_info = signed_data
        .signer_infos
        .into_inner()
        .into_iter()
        .next_back()
        .ok_or_else(|| PdfSignError::Signing("SignedData has no SignerInfo".into()))?;
    Ok(signer_info.signature.as_bytes().to_vec())
}

fn wrap_content_info(signed_data: &SignedData) -> Result<Vec<u8>> {
    let content_info = ContentInfo {
        content_type: oid::ID_SIGNED_DATA,
        content: any_from(signed_data)?,
    };
    Ok(content_info.to_der()?)
}

/// Round-trip `value` through DER to obtain an owned `Any` wrapping it,
/// without needing a blanket `T -> Any` conversion from the `der` crate.
fn any_from<T: der::Encode>(value: &T) -> Result<Any> {
    let bytes = value.to_der()?;
    Ok(Any::from_der(&bytes)?)
}

/// Wrap already-DER-encoded bytes (e.g. a certificate's raw Issuer `Name`)
/// as an `Any` without re-encoding them.
fn any_from_der(der_bytes: &[u8]) -> Result<Any> {
    Ok(Any::from_der(der_bytes)?)
}

fn digest_algorithm_identifier(digest: DigestAlgorithm) -> Result<AlgorithmIdentifierOwned> {
    Ok(AlgorithmIdentifierOwned {
        oid: digest.oid(),
        parameters: Some(Any::new(der::Tag::Null, Vec::new())?),
    })
}

/// RSA signature algorithm identifiers conventionally carry a NULL
/// parameter; ECDSA ones conventionally omit parameters entirely.
fn signature_algorithm_identifier(
    key_algorithm: KeyAlgorithm,
    digest: DigestAlgorithm,
) -> Result<AlgorithmIdentifierOwned> {
    match key_algorithm {
        KeyAlgorithm::Rsa => Ok(AlgorithmIdentifierOwned {
            oid: oid::rsa_signature_oid(digest),
            parameters: Some(Any::new(der::Tag::Null, Vec::new())?),
        }),
        KeyAlgorithm::Ecdsa(_) => Ok(AlgorithmIdentifierOwned {
            oid: oid::ecdsa_signature_oid(digest),
            parameters: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_signature_algorithm_carries_null_params() {
        let id = signature_algorithm_identifier(KeyAlgorithm::Rsa, DigestAlgorithm::Sha256).unwrap();
        assert!(id.parameters.is_some());
    }

    #[test]
    fn ecdsa_signature_algorithm_omits_params() {
        let id = signature_algorithm_identifier(
            KeyAlgorithm::Ecdsa(crate::oid::Curve::P256),
            DigestAlgorithm::Sha256,
        )
        .unwrap();
        assert!(id.parameters.is_none());
    }
}
