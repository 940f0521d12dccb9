//! Signature metadata defaults.
//!
//! PAdES-T has no notion of a signature policy level or revocation
//! evidence to configure — that's PAdES-B-LT/LTA territory, out of scope
//! here. What's left to default is the handful of human-readable fields a
//! caller may or may not supply: `/Reason`, `/Location`, `/ContactInfo`.

/// Default values for the signature dictionary's optional descriptive
/// fields. `SignRequest` takes these as plain `Option<String>`; this is a
/// convenience for callers who want a starting point rather than `None`s.
#[derive(Debug, Clone)]
pub struct SignatureMetadata {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
}

impl Default for SignatureMetadata {
    fn default() -> Self {
        Self { reason: None, location: None, contact_info: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_absent() {
        let meta = SignatureMetadata::default();
        assert!(meta.reason.is_none());
        assert!(meta.location.is_none());
        assert!(meta.contact_info.is_none());
    }
}
