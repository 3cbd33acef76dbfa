use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use rocket::fairing::AdHoc;

use crate::models::{Payment, User};

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                rocket.manage(database)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(doc! {"ping": 1}, None)
        .await?;

    let database = client.database(&crate::config::Config::database_name());
    ensure_indexes(&database).await?;

    Ok(database)
}

/// Uniqueness the data model depends on: one payment per booking, one
/// account per email/phone. Duplicate-key violations surface as 409s at
/// the route layer instead of double inserts.
async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let unique = IndexOptions::builder().unique(true).build();

    db.collection::<Payment>("payments")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "booking_id": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    db.collection::<User>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    db.collection::<User>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "phone_number": 1 })
                .options(unique)
                .build(),
            None,
        )
        .await?;

    Ok(())
}

pub type DbConn = Database;

/// True when a write failed on a unique-index violation (Mongo error 11000).
pub fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
        ErrorKind::BulkWrite(bwe) => bwe
            .write_errors
            .as_ref()
            .map(|errs| errs.iter().any(|we| we.code == 11000))
            .unwrap_or(false),
        _ => false,
    }
}
