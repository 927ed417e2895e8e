#![cfg(feature = "mysql")]

mod common;

mod mysql_contract_suite {
    use std::sync::OnceLock;

    use projectionkit_sql::{Options, SqlRepository};
    use projectionkit_testing::contract::resource_repository_contract_tests;
    use testcontainers::{runners::SyncRunner, Container, ImageExt};
    use testcontainers_modules::mysql::Mysql;

    use crate::common::{connect_with_retry, mysql_version, unique_key};

    static SHARED_CONTAINER: OnceLock<SharedMysql> = OnceLock::new();

    struct SharedMysql {
        connection_string: String,
        #[allow(dead_code)]
        container: Container<Mysql>,
    }

    fn get_shared_mysql() -> &'static SharedMysql {
        SHARED_CONTAINER.get_or_init(|| {
            std::thread::spawn(|| {
                let container = Mysql::default()
                    .with_tag(mysql_version())
                    .start()
                    .expect("should start mysql container");

                let host_port = container
                    .get_host_port_ipv4(3306)
                    .expect("should get mysql port");

                SharedMysql {
                    connection_string: format!("mysql://root@127.0.0.1:{host_port}/test"),
                    container,
                }
            })
            .join()
            .expect("container setup thread should complete")
        })
    }

    /// Probes every candidate, so this also proves MySQL is told apart
    /// from PostgreSQL and SQLite.
    pub(crate) async fn make_repository() -> SqlRepository {
        let shared = get_shared_mysql();
        let pool = connect_with_retry(&shared.connection_string).await;
        SqlRepository::new(
            pool,
            unique_key(),
            &Options::default().create_schema_on_first_use(true),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires Docker"]
    async fn mysql_is_detected_by_probing() {
        let repository = make_repository().await;

        let selected = repository.driver().await.expect("resolves");

        assert_eq!(projectionkit::Candidate::name(selected.as_ref()), "mysql");
    }

    resource_repository_contract_tests! {
        suite = mysql_contract,
        make_repository = crate::mysql_contract_suite::make_repository,
        attributes = [#[ignore = "requires Docker"]],
    }
}
