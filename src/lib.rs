#[macro_use]
extern crate rocket;

pub mod auth;
pub mod db;
pub mod mailer;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod sanitize;
pub mod store;
pub mod telemetry;
pub mod validation;

use std::sync::Arc;

use crate::auth::{AuthConfig, AuthState};
use crate::db::EstateDb;
use crate::mailer::MailerConfig;
use crate::request_logger::RequestLogger;
use crate::store::{CredentialStore, MemoryCredentialStore, PgCredentialStore, StoreBackend};
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};

pub fn rocket() -> Rocket<Build> {
    telemetry::install();

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    let rocket = rocket::build().attach(RequestLogger).attach(cors);

    let rocket = match StoreBackend::from_env() {
        StoreBackend::Postgres => rocket.attach(EstateDb::init()).attach(AdHoc::try_on_ignite(
            "Credential Store",
            |rocket| async move {
                let Some(db) = EstateDb::fetch(&rocket) else {
                    log::error!("database pool not available for the credential store");
                    return Err(rocket);
                };
                let store = PgCredentialStore::new((**db).clone());
                match store.run_migrations().await {
                    Ok(()) => {
                        log::info!("database migrations successful");
                        let store: Arc<dyn CredentialStore> = Arc::new(store);
                        Ok(rocket.manage(store))
                    }
                    Err(e) => {
                        log::error!("database migrations failed: {}", e);
                        Err(rocket)
                    }
                }
            },
        )),
        StoreBackend::Memory => {
            log::warn!("ESTATE_STORE=memory: accounts are not persisted across restarts");
            let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
            rocket.manage(store)
        }
    };

    let rocket = rocket.attach(AdHoc::try_on_ignite("Auth State", |rocket| async move {
        let Some(store) = rocket.state::<Arc<dyn CredentialStore>>().cloned() else {
            log::error!("credential store not available for auth state");
            return Err(rocket);
        };
        let config = match AuthConfig::from_env() {
            Ok(config) => config,
            Err(err) => {
                log::error!("invalid auth configuration: {}", err);
                return Err(rocket);
            }
        };
        let mail_config = MailerConfig::from_env();
        let mailer = mail_config.build();

        match AuthState::new(config, store, mailer) {
            Ok(state) => Ok(rocket.manage(state).manage(mail_config)),
            Err(err) => {
                log::error!("failed to initialize auth state: {}", err);
                Err(rocket)
            }
        }
    }));

    mount_api(rocket)
}

/// Mount every API route, the OpenAPI viewers and the envelope catchers.
pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Auth routes
                auth::routes::register,
                auth::routes::login,
                auth::routes::refresh,
                auth::routes::logout,
                auth::routes::me,
                auth::routes::update_me,
                auth::routes::list_sessions,
                auth::routes::revoke_session,
                // Password reset routes
                auth::routes::forgot_password,
                auth::routes::validate_reset_token,
                auth::routes::reset_password,
                // Admin routes
                routes::admin::create_admin,
                routes::admin::list_users,
                routes::admin::get_user,
                routes::admin::update_user_role,
                routes::admin::delete_user,
                routes::admin::user_stats,
                // Contact routes
                routes::contact::submit_contact,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Estate Auth API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
        .register(
            "/",
            catchers![
                routes::catchers::bad_request,
                routes::catchers::unauthorized,
                routes::catchers::forbidden,
                routes::catchers::not_found,
                routes::catchers::unprocessable,
                routes::catchers::internal_error,
                routes::catchers::fallback,
            ],
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::sync::Arc;

    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket};

    use crate::auth::{AuthConfig, AuthState};
    use crate::mailer::{MailerConfig, RecordingMailer};
    use crate::request_logger::RequestLogger;
    use crate::store::{CredentialStore, MemoryCredentialStore};

    pub use database::{TestDatabase, TestDatabaseError};

    pub const TEST_CONTACT_INBOX: &str = "inbox@estate.test";

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        use crate::store::postgres::MIGRATOR;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database backed by a disposable Postgres container.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            /// Launch a container, create a uniquely named database and migrate it.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let image = GenericImage::new("postgres", "16-alpine")
                    .with_wait_for(WaitFor::message_on_stdout(
                        "database system is ready to accept connections",
                    ))
                    .with_wait_for(WaitFor::message_on_stderr(
                        "database system is ready to accept connections",
                    ));

                let request = image
                    .with_env_var("POSTGRES_DB", "postgres")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres");

                let container = request.start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let new_db_name = format!("estate_{}", Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container: Some(container),
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ =
                                drop_database_with_fallback(admin_options.clone(), &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(
                                        admin_options.clone(),
                                        &db_name,
                                    )
                                    .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests:
    /// memory store, recording mailer and fixed auth settings unless overridden.
    pub struct TestRocketBuilder {
        figment: Figment,
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        mailer: RecordingMailer,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                config: AuthConfig::for_tests(),
                store: Arc::new(MemoryCredentialStore::new()),
                mailer: RecordingMailer::new(),
            }
        }

        pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
            self.store = store;
            self
        }

        pub fn with_mailer(mut self, mailer: RecordingMailer) -> Self {
            self.mailer = mailer;
            self
        }

        pub fn with_config(mut self, config: AuthConfig) -> Self {
            self.config = config;
            self
        }

        /// Finish building the Rocket instance with every API route mounted.
        pub fn build(self) -> Rocket<Build> {
            let mail_config = MailerConfig {
                webhook_url: None,
                contact_inbox: TEST_CONTACT_INBOX.to_string(),
            };
            let state = AuthState::new(self.config, self.store.clone(), Arc::new(self.mailer))
                .expect("auth state for tests");

            let rocket = rocket::custom(self.figment)
                .attach(RequestLogger)
                .manage(self.store)
                .manage(state)
                .manage(mail_config);
            crate::mount_api(rocket)
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
