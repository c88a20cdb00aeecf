use uuid::{Builder, Uuid};

use crate::error::IdentifierError;

pub const IMAGE_SET_LABEL: &str = "imageset";
pub const STORY_PACKAGE_LABEL: &str = "storypackage";

/// Name-based identifier of `bytes`: MD5 digest with the version 3 and
/// RFC 4122 variant bits set, no namespace prefix.
pub fn name_uuid_from_bytes(bytes: &[u8]) -> Uuid {
    Builder::from_md5_bytes(md5::compute(bytes).0).into_uuid()
}

/// Derivation namespace. Derived identifiers keep the high 64 bits of their
/// source and XOR the low 64 bits with the low half of the namespace's
/// name-based identifier, so applying the same namespace twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    mask: u64,
}

impl Namespace {
    pub fn from_label(label: &str) -> Self {
        let (_, lsb) = name_uuid_from_bytes(label.as_bytes()).as_u64_pair();
        Namespace { mask: lsb }
    }

    pub fn apply(&self, source: Uuid) -> Uuid {
        let (msb, lsb) = source.as_u64_pair();
        Uuid::from_u64_pair(msb, lsb ^ self.mask)
    }

    /// Parses `source` and returns the derived identifier, formatted as a
    /// lowercase hyphenated string.
    pub fn derive(&self, source: &str) -> Result<String, IdentifierError> {
        let parsed = Uuid::parse_str(source).map_err(|error| IdentifierError::InvalidIdentifier {
            value: source.to_owned(),
            error,
        })?;
        Ok(self.apply(parsed).hyphenated().to_string())
    }
}

/// The namespaces used when mapping video content, computed once and handed
/// to the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierDeriver {
    pub image_set: Namespace,
    pub story_package: Namespace,
}

impl IdentifierDeriver {
    pub fn new() -> Self {
        IdentifierDeriver {
            image_set: Namespace::from_label(IMAGE_SET_LABEL),
            story_package: Namespace::from_label(STORY_PACKAGE_LABEL),
        }
    }

    pub fn image_set(&self, image_id: &str) -> Result<String, IdentifierError> {
        self.image_set.derive(image_id)
    }

    pub fn story_package(&self, content_id: &str) -> Result<String, IdentifierError> {
        self.story_package.derive(content_id)
    }
}

impl Default for IdentifierDeriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_based_namespace_identifiers() {
        assert_eq!(
            name_uuid_from_bytes(b"storypackage").to_string(),
            "f1d80fc0-999f-376a-bec4-7e13d11193ef"
        );
        assert_eq!(
            name_uuid_from_bytes(b"imageset").to_string(),
            "2b588635-d83d-3d6f-9e66-979ada74ab49"
        );
    }

    #[test]
    fn story_package_known_vector() {
        let deriver = IdentifierDeriver::new();
        assert_eq!(
            deriver
                .story_package("a40808ac-1417-4c48-9781-1dd2d8c8c6dc")
                .unwrap(),
            "a40808ac-1417-4c48-2945-63c109d95533"
        );
    }

    #[test]
    fn image_set_known_vector() {
        let deriver = IdentifierDeriver::new();
        assert_eq!(
            deriver
                .image_set("5c02f5b2-1b8e-11e7-8ae7-a3a1bd47f6d0")
                .unwrap(),
            "5c02f5b2-1b8e-11e7-1481-343b67335d99"
        );
    }

    #[test]
    fn derivation_keeps_high_bits_and_is_self_inverse() {
        let deriver = IdentifierDeriver::new();
        let source = "bad50c54-76d9-30e9-8734-b999c708aa4c";

        let once = deriver.story_package(source).unwrap();
        assert!(once.starts_with("bad50c54-76d9-30e9-"));
        assert_ne!(once, source);
        assert_eq!(deriver.story_package(&once).unwrap(), source);
    }

    #[test]
    fn namespaces_differ_per_label() {
        let deriver = IdentifierDeriver::new();
        assert_ne!(deriver.image_set, deriver.story_package);

        let source = "a40808ac-1417-4c48-9781-1dd2d8c8c6dc";
        assert_ne!(
            deriver.image_set(source).unwrap(),
            deriver.story_package(source).unwrap()
        );
    }

    #[test]
    fn uppercase_input_yields_lowercase_output() {
        let deriver = IdentifierDeriver::new();
        assert_eq!(
            deriver
                .story_package("A40808AC-1417-4C48-9781-1DD2D8C8C6DC")
                .unwrap(),
            "a40808ac-1417-4c48-2945-63c109d95533"
        );
    }

    #[test]
    fn invalid_identifier_is_rejected() {
        let deriver = IdentifierDeriver::new();
        match deriver.story_package("not-a-uuid") {
            Err(IdentifierError::InvalidIdentifier { value, .. }) => {
                assert_eq!(value, "not-a-uuid")
            }
            other => panic!("expected an invalid identifier error, got {:?}", other),
        }
    }
}
