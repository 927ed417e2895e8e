//! Request construction for OCC records.
//!
//! Records are items keyed by the binary partition key
//! `handler-key ‖ ':' ‖ resource` (attribute `ID`), with the version in the
//! binary attribute `V`.

use aws_sdk_dynamodb::error::{BuildError, SdkError};
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, ConditionCheck, Delete, Put, TransactWriteItem};
use projectionkit::{HandlerKey, Version};

pub(crate) const PARTITION_KEY: &str = "ID";
pub(crate) const VERSION: &str = "V";

const VERSION_NAME: &str = "#v";
const CURRENT_VALUE: &str = ":c";
const RECORD_ABSENT: &str = "attribute_not_exists(ID)";
const RECORD_AT_CURRENT: &str = "#v = :c";

pub(crate) fn partition_key(key: HandlerKey, resource: &[u8]) -> AttributeValue {
    let mut id = Vec::with_capacity(16 + 1 + resource.len());
    id.extend_from_slice(&key.to_bytes());
    id.push(b':');
    id.extend_from_slice(resource);
    AttributeValue::B(Blob::new(id))
}

pub(crate) fn version_value(version: &Version) -> AttributeValue {
    AttributeValue::B(Blob::new(version.as_bytes()))
}

/// Reads the version attribute of a stored item; missing or empty means
/// absent.
pub(crate) fn version_of(
    item: Option<&std::collections::HashMap<String, AttributeValue>>,
) -> Version {
    item.and_then(|item| item.get(VERSION))
        .and_then(|value| value.as_b().ok())
        .map_or_else(Version::absent, |blob| Version::from(blob.as_ref()))
}

/// The transaction item that performs `update(current, next)`.
///
/// It must be the first item of the transaction: a cancellation whose
/// first reason is a failed condition is how a version mismatch is
/// recognised.
pub(crate) fn update_item(
    table: &str,
    key: HandlerKey,
    resource: &[u8],
    current: &Version,
    next: &Version,
) -> Result<TransactWriteItem, BuildError> {
    let id = partition_key(key, resource);

    let item = match (current.is_absent(), next.is_absent()) {
        (true, true) => TransactWriteItem::builder().condition_check(
            ConditionCheck::builder()
                .table_name(table)
                .key(PARTITION_KEY, id)
                .condition_expression(RECORD_ABSENT)
                .build()?,
        ),
        (true, false) => TransactWriteItem::builder().put(
            Put::builder()
                .table_name(table)
                .item(PARTITION_KEY, id)
                .item(VERSION, version_value(next))
                .condition_expression(RECORD_ABSENT)
                .build()?,
        ),
        (false, true) => TransactWriteItem::builder().delete(
            Delete::builder()
                .table_name(table)
                .key(PARTITION_KEY, id)
                .condition_expression(RECORD_AT_CURRENT)
                .expression_attribute_names(VERSION_NAME, VERSION)
                .expression_attribute_values(CURRENT_VALUE, version_value(current))
                .build()?,
        ),
        (false, false) => TransactWriteItem::builder().put(
            Put::builder()
                .table_name(table)
                .item(PARTITION_KEY, id)
                .item(VERSION, version_value(next))
                .condition_expression(RECORD_AT_CURRENT)
                .expression_attribute_names(VERSION_NAME, VERSION)
                .expression_attribute_values(CURRENT_VALUE, version_value(current))
                .build()?,
        ),
    };

    Ok(item.build())
}

/// Whether a failed transaction was cancelled because the OCC condition
/// (the first item) did not hold.
pub(crate) fn is_version_conflict<R>(error: &SdkError<TransactWriteItemsError, R>) -> bool {
    match error.as_service_error() {
        Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) => cancelled
            .cancellation_reasons()
            .first()
            .and_then(|reason| reason.code())
            .is_some_and(|code| code == "ConditionalCheckFailed"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projectionkit::{identity, Configurable, ProjectionConfigurer};

    struct Fixed;

    impl Configurable for Fixed {
        fn configure(&self, c: &mut dyn ProjectionConfigurer) {
            c.identity("fixed", "00112233-4455-6677-8899-aabbccddeeff");
        }
    }

    fn fixed() -> HandlerKey {
        identity::key(&Fixed).expect("valid identity")
    }

    fn bytes(value: Option<&AttributeValue>) -> Option<Vec<u8>> {
        value
            .and_then(|v| v.as_b().ok())
            .map(|blob| blob.as_ref().to_vec())
    }

    #[test]
    fn partition_key_joins_handler_and_resource() {
        let id = partition_key(fixed(), b"R");

        let id = bytes(Some(&id)).expect("binary key");
        assert_eq!(id.len(), 18);
        assert_eq!(&id[..16], &fixed().to_bytes());
        assert_eq!(&id[16..], b":R");
    }

    #[test]
    fn first_write_is_a_put_guarded_by_absence() {
        let item = update_item("T", fixed(), b"R", &Version::absent(), &Version::from("V1"))
            .expect("valid request");

        let put = item.put().expect("put");
        assert_eq!(put.condition_expression(), Some(RECORD_ABSENT));
        assert_eq!(bytes(put.item().get(VERSION)), Some(b"V1".to_vec()));
    }

    #[test]
    fn advance_is_a_put_guarded_by_current() {
        let item = update_item("T", fixed(), b"R", &Version::from("V1"), &Version::from("V2"))
            .expect("valid request");

        let put = item.put().expect("put");
        assert_eq!(put.condition_expression(), Some(RECORD_AT_CURRENT));
        let values = put.expression_attribute_values().expect("condition values");
        assert_eq!(bytes(values.get(CURRENT_VALUE)), Some(b"V1".to_vec()));
    }

    #[test]
    fn advance_to_absent_is_a_guarded_delete() {
        let item = update_item("T", fixed(), b"R", &Version::from("V1"), &Version::absent())
            .expect("valid request");

        let delete = item.delete().expect("delete");
        assert_eq!(delete.condition_expression(), Some(RECORD_AT_CURRENT));
    }

    #[test]
    fn absent_to_absent_only_checks_the_condition() {
        let item = update_item("T", fixed(), b"R", &Version::absent(), &Version::absent())
            .expect("valid request");

        assert!(item.put().is_none());
        assert!(item.delete().is_none());
        assert_eq!(
            item.condition_check().map(ConditionCheck::condition_expression),
            Some(RECORD_ABSENT)
        );
    }

    #[test]
    fn missing_or_empty_version_attribute_is_absent() {
        let mut item = std::collections::HashMap::new();
        assert!(version_of(None).is_absent());
        assert!(version_of(Some(&item)).is_absent());

        let _ = item.insert(VERSION.to_owned(), AttributeValue::B(Blob::new(Vec::new())));
        assert!(version_of(Some(&item)).is_absent());

        let _ = item.insert(VERSION.to_owned(), version_value(&Version::from("V1")));
        assert_eq!(version_of(Some(&item)), Version::from("V1"));
    }
}
