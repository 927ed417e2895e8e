//! ResourceRepository contract suite against the in-memory repository.

use projectionkit_testing::contract::resource_repository_contract_tests;

resource_repository_contract_tests! {
    suite = in_memory,
    make_repository = || async { projectionkit_memory::MemoryRepository::new() },
}
