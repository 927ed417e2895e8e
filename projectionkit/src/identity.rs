//! Derivation of a handler's [`HandlerKey`] from its own configuration.

use uuid::Uuid;

use crate::errors::IdentityError;
use crate::handler::{Configurable, ProjectionConfigurer};
use crate::key::HandlerKey;

/// Configurer that records only the identity declaration.
#[derive(Debug, Default)]
struct IdentityCapture {
    identity: Option<(String, String)>,
}

impl ProjectionConfigurer for IdentityCapture {
    fn identity(&mut self, name: &str, key: &str) {
        self.identity = Some((name.to_owned(), key.to_owned()));
    }

    fn handles_event_type(&mut self, _event_type: &str) {}
}

/// The handler name and key declared by `handler`.
pub fn declared<H>(handler: &H) -> Result<(String, HandlerKey), IdentityError>
where
    H: Configurable + ?Sized,
{
    let mut capture = IdentityCapture::default();
    handler.configure(&mut capture);

    let (name, key) = capture.identity.ok_or(IdentityError::Missing)?;
    let uuid = Uuid::parse_str(key.trim()).map_err(|source| IdentityError::InvalidKey {
        name: name.clone(),
        key,
        source,
    })?;

    Ok((name, HandlerKey::new(uuid)))
}

/// The 16-byte key declared by `handler`.
///
/// Runs the handler's `configure` against a configurer that ignores
/// everything but the identity. Calling it repeatedly on the same handler
/// yields the same key.
///
/// # Examples
///
/// ```
/// use projectionkit::{identity, Configurable, ProjectionConfigurer};
///
/// struct Balances;
///
/// impl Configurable for Balances {
///     fn configure(&self, c: &mut dyn ProjectionConfigurer) {
///         c.identity("balances", "2f4c3a3e-9d57-4f0e-8c1e-66a7f0b1c0de");
///         c.handles_event_type("Deposited");
///     }
/// }
///
/// let key = identity::key(&Balances).unwrap();
/// assert_eq!(key.to_string(), "2f4c3a3e-9d57-4f0e-8c1e-66a7f0b1c0de");
/// ```
pub fn key<H>(handler: &H) -> Result<HandlerKey, IdentityError>
where
    H: Configurable + ?Sized,
{
    declared(handler).map(|(_, key)| key)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Declares(&'static str);

    impl Configurable for Declares {
        fn configure(&self, c: &mut dyn ProjectionConfigurer) {
            c.handles_event_type("Deposited");
            c.identity("accounts", self.0);
            c.handles_event_type("Withdrawn");
        }
    }

    struct Silent;

    impl Configurable for Silent {
        fn configure(&self, c: &mut dyn ProjectionConfigurer) {
            c.handles_event_type("Deposited");
        }
    }

    #[test]
    fn key_is_stable_across_repeated_configuration() {
        let handler = Declares("0f4b3a8e-6a4c-4d7e-9a25-3c1c2a7f0e11");

        let first = key(&handler).expect("valid identity");
        let second = key(&handler).expect("valid identity");

        assert_eq!(first, second);
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn declared_reports_name_and_key() {
        let handler = Declares("0f4b3a8e-6a4c-4d7e-9a25-3c1c2a7f0e11");

        let (name, key) = declared(&handler).expect("valid identity");

        assert_eq!(name, "accounts");
        assert_eq!(key.to_string(), "0f4b3a8e-6a4c-4d7e-9a25-3c1c2a7f0e11");
    }

    #[test]
    fn missing_identity_is_an_error() {
        assert!(matches!(key(&Silent), Err(IdentityError::Missing)));
    }

    #[test]
    fn malformed_key_is_an_error() {
        let error = key(&Declares("not-a-uuid")).expect_err("invalid key");

        assert!(matches!(
            error,
            IdentityError::InvalidKey { ref key, .. } if key == "not-a-uuid"
        ));
    }
}
