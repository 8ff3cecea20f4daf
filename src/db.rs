// Database connection and schema bootstrap

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Schema, Set,
    sea_query::{Index, IndexCreateStatement},
};
use tracing::info;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::{emails, orders, products, promocodes, reviews, unverified_users, uploads, users};
use crate::utils::password;

pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    Database::connect(&config.database_url).await
}

/// Creates every table that does not exist yet.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Order matters: reviews references users and products
    let statements = vec![
        schema.create_table_from_entity(users::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(unverified_users::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(products::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(reviews::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(orders::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(promocodes::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(emails::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(uploads::Entity).if_not_exists().to_owned(),
    ];

    for statement in statements {
        db.execute(backend.build(&statement)).await?;
    }
    db.execute(backend.build(&review_uniqueness_index())).await?;

    info!("Database schema is up to date");
    Ok(())
}

/// One review per customer and product; review writes upsert against it.
fn review_uniqueness_index() -> IndexCreateStatement {
    Index::create()
        .name("idx_reviews_product_user")
        .table(reviews::Entity)
        .col(reviews::Column::ProductId)
        .col(reviews::Column::UserId)
        .unique()
        .if_not_exists()
        .to_owned()
}

/// Makes sure the configured admin account exists.
pub async fn ensure_admin(db: &DatabaseConnection, config: &AppConfig) -> Result<()> {
    let (Some(email), Some(plain_password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = email.trim().to_lowercase();

    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(&email))
        .one(db)
        .await?;

    match existing {
        Some(user) if user.role == users::Role::Admin => Ok(()),
        Some(user) => {
            let mut active: users::ActiveModel = user.into();
            active.role = Set(users::Role::Admin);
            active.update(db).await?;
            info!(%email, "Promoted existing account to admin");
            Ok(())
        }
        None => {
            let password_hash = password::hash_password(plain_password)
                .map_err(AppError::Internal)?;
            users::ActiveModel {
                email: Set(email.clone()),
                name: Set("Administrator".to_string()),
                password_hash: Set(password_hash),
                role: Set(users::Role::Admin),
                is_verified: Set(true),
                created_at: Set(Utc::now().naive_utc()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            info!(%email, "Created admin account");
            Ok(())
        }
    }
}
