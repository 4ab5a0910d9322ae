use rocket_db_pools::{Database, sqlx};

/// Postgres pool configured under `databases.estate_db` in Rocket's figment.
#[derive(Database)]
#[database("estate_db")]
pub struct EstateDb(sqlx::PgPool);
