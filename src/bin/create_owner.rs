use std::io::{self, Write};

use chrono::Utc;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use estate_auth::auth::passwords::PasswordService;
use estate_auth::models::{Account, Role, normalize_email};
use estate_auth::store::{CredentialStore, PgCredentialStore, StoreError};
use estate_auth::validation::{password_strength, username_charset};

#[derive(Parser, Debug)]
#[command(
    name = "create_owner",
    about = "Bootstrap the first owner account directly in the database"
)]
struct Args {
    /// Email address for the account (stored lowercase).
    #[arg(long)]
    email: String,

    /// Display name, 3-30 letters, digits, underscores or spaces.
    #[arg(long)]
    username: String,

    /// Plaintext password to hash and store for this account.
    #[arg(long)]
    password: String,

    /// Postgres connection string; falls back to `DATABASE_URL`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

fn fail(message: impl std::fmt::Display) -> Result<(), Box<dyn std::error::Error>> {
    writeln!(io::stderr(), "error: {message}")?;
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = normalize_email(&args.email);
    let username = args.username.trim().to_string();

    if !email.contains('@') {
        return fail("email must contain '@'");
    }
    let username_len = username.chars().count();
    if !(3..=30).contains(&username_len) || username_charset(&username).is_err() {
        return fail("username must be 3-30 letters, digits, underscores or spaces");
    }
    if let Err(err) = password_strength(&args.password) {
        let reason = err.message.map(|m| m.to_string()).unwrap_or_default();
        return fail(format!("password {reason}"));
    }

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&args.database_url)
        .await?;
    let store = PgCredentialStore::new(pool);
    store.run_migrations().await?;

    let password_service = PasswordService::new()?;
    let password_hash = password_service.hash_password(&args.password)?;

    let account = Account::new(username, &email, Some(password_hash), Role::Owner, Utc::now());
    match store.insert(&account).await {
        Ok(()) => {
            println!("Created owner '{}' with id {}", account.email, account.id);
            Ok(())
        }
        Err(StoreError::Conflict(_)) => fail(format!("an account with email '{email}' already exists")),
        Err(err) => Err(err.into()),
    }
}
