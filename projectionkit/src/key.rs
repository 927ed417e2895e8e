use nutype::nutype;
use uuid::Uuid;

/// Stable 16-byte identity of a projection handler.
///
/// The key is derived once, from the UUID the handler declares through
/// [`ProjectionConfigurer::identity`](crate::ProjectionConfigurer::identity),
/// and partitions every OCC record the handler owns. Changing a handler's
/// key orphans its stored versions, causing every resource to be treated as
/// unseen.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRef,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct HandlerKey(Uuid);

impl HandlerKey {
    /// The raw 16 bytes of the key, as stored by binary-keyed backends.
    pub fn to_bytes(&self) -> [u8; 16] {
        *self.as_ref().as_bytes()
    }
}
