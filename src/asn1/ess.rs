//! ESS signing-certificate attributes (RFC 5035) used by the CAdES-BES
//! mandatory `signingCertificateV2` signed attribute.

use der::asn1::{Any, Int, OctetString};
use der::{Choice, Sequence};
use spki::AlgorithmIdentifierOwned;

/// `GeneralName ::= CHOICE { ..., directoryName [4] EXPLICIT Name, ... }`
///
/// Only the `directoryName` arm is modeled: `IssuerSerial.issuer` is always
/// built from the leaf certificate's own Issuer name, never another kind of
/// `GeneralName`.
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum GeneralName {
    #[asn1(context_specific = "4", tag_mode = "EXPLICIT", constructed = "true")]
    DirectoryName(Any),
}

/// `IssuerSerial ::= SEQUENCE { issuer GeneralNames, serialNumber CertificateSerialNumber }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct IssuerSerial {
    pub issuer: Vec<GeneralName>,
    pub serial_number: Int,
}

/// `ESSCertIDv2 ::= SEQUENCE { hashAlgorithm AlgorithmIdentifier DEFAULT {sha256},
///   certHash OCTET STRING, issuerSerial IssuerSerial OPTIONAL }`
///
/// Per the default-sha256 rule, `hash_algorithm` is `None` when the digest
/// is SHA-256 (the DEFAULT value, omitted for size) and `Some` otherwise.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EssCertIdV2 {
    #[asn1(optional = "true")]
    pub hash_algorithm: Option<AlgorithmIdentifierOwned>,
    pub cert_hash: OctetString,
    #[asn1(optional = "true")]
    pub issuer_serial: Option<IssuerSerial>,
}

/// `SigningCertificateV2 ::= SEQUENCE { certs SEQUENCE OF ESSCertIDv2, policies SEQUENCE OF PolicyInformation OPTIONAL }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SigningCertificateV2 {
    pub certs: Vec<EssCertIdV2>,
    #[asn1(optional = "true")]
    pub policies: Option<Vec<Any>>,
}
