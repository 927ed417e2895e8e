use std::fmt;

/// Opaque resource version token.
///
/// A `Version` identifies how far a projection handler has advanced on a
/// resource. Versions are produced by the delivery engine and stored
/// verbatim; they are never parsed or ordered, only compared byte-for-byte
/// and tested for emptiness.
///
/// The empty version is the distinguished *absent* value. An absent version
/// and "no record stored" mean the same thing everywhere in this crate, so
/// a nil value coming out of a backend (`None`) and a zero-length value are
/// interchangeable.
///
/// # Examples
///
/// ```
/// use projectionkit::Version;
///
/// let v1 = Version::from("V1");
/// assert!(!v1.is_absent());
/// assert_eq!(v1.as_bytes(), b"V1");
///
/// assert!(Version::absent().is_absent());
/// assert_eq!(Version::from(None::<Vec<u8>>), Version::from(Vec::new()));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Version(Vec<u8>);

impl Version {
    /// The absent version, meaning "no record".
    pub const fn absent() -> Self {
        Self(Vec::new())
    }

    /// Wrap raw version bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Report whether this is the absent version.
    pub fn is_absent(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw bytes. Empty for the absent version.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the version, returning its raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Convert to the optional form used by backends that store "no value"
    /// as a missing attribute rather than an empty one.
    pub fn into_option(self) -> Option<Vec<u8>> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl AsRef<[u8]> for Version {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Version {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Version {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Version {
    fn from(bytes: &[u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<Option<Vec<u8>>> for Version {
    fn from(bytes: Option<Vec<u8>>) -> Self {
        bytes.map_or_else(Self::absent, Self)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absent() {
            return f.write_str("Version(<absent>)");
        }
        write!(f, "Version({})", self)
    }
}

/// Renders printable ASCII as-is and everything else as `\xNN` escapes.
impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            if byte.is_ascii_graphic() || *byte == b' ' {
                write!(f, "{}", char::from(*byte))?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_and_empty_versions_are_both_absent() {
        assert_eq!(Version::from(None), Version::absent());
        assert_eq!(Version::from(Vec::new()), Version::absent());
        assert_eq!(Version::default(), Version::absent());
    }

    #[test]
    fn equality_is_byte_level() {
        assert_ne!(Version::from("v1"), Version::from("V1"));
        assert_ne!(Version::from("v1"), Version::from("v1 "));
        assert_eq!(Version::from(&[0x00, 0xff]), Version::new(vec![0x00, 0xff]));
    }

    #[test]
    fn into_option_maps_absent_to_none() {
        assert_eq!(Version::absent().into_option(), None);
        assert_eq!(Version::from("x").into_option(), Some(b"x".to_vec()));
    }

    proptest::proptest! {
        #[test]
        fn absent_iff_empty(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..8)) {
            let version = Version::from(Some(bytes.clone()));
            proptest::prop_assert_eq!(version.is_absent(), bytes.is_empty());
            proptest::prop_assert_eq!(version.into_option().unwrap_or_default(), bytes);
        }
    }

    #[test]
    fn display_escapes_binary_bytes() {
        assert_eq!(Version::new(vec![b'a', 0x00, b'b']).to_string(), "a\\x00b");
        assert_eq!(format!("{:?}", Version::absent()), "Version(<absent>)");
    }
}
