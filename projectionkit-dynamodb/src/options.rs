use nutype::nutype;

fn is_dynamodb_table_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Name of the DynamoDB table holding OCC records.
///
/// DynamoDB accepts 3 to 255 characters drawn from `[A-Za-z0-9_.-]`.
///
/// # Examples
///
/// ```
/// use projectionkit_dynamodb::TableName;
///
/// let table = TableName::try_new("  ProjectionOCC ").expect("valid table name");
/// assert_eq!(table.as_ref(), "ProjectionOCC");
///
/// assert!(TableName::try_new("").is_err());
/// assert!(TableName::try_new("no spaces allowed").is_err());
/// ```
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_min = 3,
        len_char_max = 255,
        predicate = is_dynamodb_table_name
    ),
    derive(Debug, Clone, PartialEq, Eq, Hash, AsRef, Display)
)]
pub struct TableName(String);

/// Configuration for binding a handler to DynamoDB.
#[derive(Debug, Clone)]
pub struct Options {
    table: TableName,
    create_table: bool,
}

impl Options {
    /// Store OCC records in `table`.
    pub const fn new(table: TableName) -> Self {
        Self {
            table,
            create_table: false,
        }
    }

    /// Create the table, once per repository, before the first operation
    /// that touches it.
    pub const fn create_table_on_first_use(mut self, enabled: bool) -> Self {
        self.create_table = enabled;
        self
    }

    /// The OCC table.
    pub const fn table(&self) -> &TableName {
        &self.table
    }

    pub(crate) const fn creates_table_on_first_use(&self) -> bool {
        self.create_table
    }
}
