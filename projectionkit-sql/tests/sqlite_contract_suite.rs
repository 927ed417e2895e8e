//! ResourceRepository contract suite against in-memory SQLite.

mod common;

use projectionkit_testing::contract::resource_repository_contract_tests;

resource_repository_contract_tests! {
    suite = sqlite,
    make_repository = || async { crate::common::repository(crate::common::sqlite_pool().await) },
}
