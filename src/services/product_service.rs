use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LikeExpr, OnConflict};
use sea_orm::*;
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::dto::{Page, ProductWithReviews};
use crate::models::{products, reviews};

pub struct ProductService;

pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// newest (default), price_asc, price_desc, rating
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub stock: i32,
}

impl ProductInput {
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.price <= Decimal::ZERO {
            return Err(AppError::Validation("Price must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
}

/// Mean rating rounded to one decimal, 0 for no reviews.
pub fn average_rating(ratings: &[i16]) -> Decimal {
    if ratings.is_empty() {
        return Decimal::ZERO;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    (Decimal::from(sum) / Decimal::from(ratings.len() as u64))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// `%term%` for LIKE, with `%`, `_` and `\` in the term matched literally.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive substring match on name or description.
fn search_condition(term: &str) -> Condition {
    let pattern = contains_pattern(term);
    Condition::any()
        .add(
            Expr::col((products::Entity, products::Column::Name))
                .ilike(LikeExpr::new(pattern.as_str()).escape('\\')),
        )
        .add(
            Expr::col((products::Entity, products::Column::Description))
                .ilike(LikeExpr::new(pattern).escape('\\')),
        )
}

/// (page, limit) after defaults and clamping; pages start at 1.
pub fn page_params(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

impl ProductService {
    pub async fn list(db: &DatabaseConnection, query: &ProductQuery) -> Result<Page<products::Model>> {
        let mut select = products::Entity::find();

        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(products::Column::Category.eq(category));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(search_condition(search));
        }
        if let Some(min) = query.min_price {
            select = select.filter(products::Column::Price.gte(min));
        }
        if let Some(max) = query.max_price {
            select = select.filter(products::Column::Price.lte(max));
        }

        select = match query.sort.as_deref() {
            Some("price_asc") => select.order_by_asc(products::Column::Price),
            Some("price_desc") => select.order_by_desc(products::Column::Price),
            Some("rating") => select.order_by_desc(products::Column::Rating),
            Some("newest") | None => select.order_by_desc(products::Column::CreatedAt),
            Some(other) => {
                return Err(AppError::Validation(format!("Invalid sort '{}'", other)));
            }
        };
        select = select.order_by_desc(products::Column::Id);

        let (page, limit) = page_params(query.page, query.limit);
        let paginator = select.paginate(db, limit);
        let counts = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(Page {
            items,
            page,
            limit,
            total: counts.number_of_items,
            total_pages: counts.number_of_pages,
        })
    }

    pub async fn get_with_reviews(db: &DatabaseConnection, id: i32) -> Result<ProductWithReviews> {
        let product = products::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        let reviews = product
            .find_related(reviews::Entity)
            .order_by_desc(reviews::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(ProductWithReviews { product, reviews })
    }

    #[instrument(skip(db, input), fields(name = %input.name))]
    pub async fn create(db: &DatabaseConnection, input: ProductInput) -> Result<products::Model> {
        input.check()?;
        let now = Utc::now().naive_utc();

        let product = products::ActiveModel {
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            images: Set(input.images),
            colors: Set(input.colors),
            sizes: Set(input.sizes),
            category: Set(input.category),
            stock: Set(input.stock),
            rating: Set(Decimal::ZERO),
            review_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(product_id = product.id, "Product created");
        Ok(product)
    }

    pub async fn update(db: &DatabaseConnection, id: i32, input: ProductInput) -> Result<products::Model> {
        input.check()?;

        let existing = products::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        let mut active: products::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.description = Set(input.description);
        active.price = Set(input.price);
        active.images = Set(input.images);
        active.colors = Set(input.colors);
        active.sizes = Set(input.sizes);
        active.category = Set(input.category);
        active.stock = Set(input.stock);
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<()> {
        let result = products::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        info!(product_id = id, "Product deleted");
        Ok(())
    }

    /// Writes the caller's review (replacing a previous one) and refreshes
    /// the product's rating and review count in the same transaction.
    #[instrument(skip(db, user, input), fields(user_id = user.user_id))]
    pub async fn upsert_review(
        db: &DatabaseConnection,
        product_id: i32,
        user: &AuthUser,
        input: ReviewInput,
    ) -> Result<reviews::Model> {
        input.validate()?;
        let txn = db.begin().await?;

        // Row lock: concurrent reviews of one product recompute its rating in turn
        let product = products::Entity::find_by_id(product_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        // (product_id, user_id) is unique, so a second review replaces the first
        let review = reviews::Entity::insert(reviews::ActiveModel {
            product_id: Set(product_id),
            user_id: Set(user.user_id),
            user_name: Set(user.name.clone()),
            rating: Set(input.rating),
            comment: Set(input.comment),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([reviews::Column::ProductId, reviews::Column::UserId])
                .update_columns([
                    reviews::Column::UserName,
                    reviews::Column::Rating,
                    reviews::Column::Comment,
                    reviews::Column::CreatedAt,
                ])
                .to_owned(),
        )
        .exec_with_returning(&txn)
        .await?;

        let ratings = reviews::Entity::find()
            .select_only()
            .column(reviews::Column::Rating)
            .filter(reviews::Column::ProductId.eq(product_id))
            .into_tuple::<i16>()
            .all(&txn)
            .await?;

        let mut active: products::ActiveModel = product.into();
        active.rating = Set(average_rating(&ratings));
        active.review_count = Set(ratings.len() as i32);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_no_reviews_is_zero() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        // 14 / 3 = 4.666..
        assert_eq!(average_rating(&[5, 5, 4]), Decimal::new(47, 1));
        assert_eq!(average_rating(&[4, 5]), Decimal::new(45, 1));
        assert_eq!(average_rating(&[1]), Decimal::ONE);
    }

    #[test]
    fn search_wildcards_are_literal() {
        assert_eq!(contains_pattern("tee"), "%tee%");
        assert_eq!(contains_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn search_ignores_case() {
        let sql = products::Entity::find()
            .filter(search_condition("Tee"))
            .into_query()
            .to_string(sea_orm::sea_query::PostgresQueryBuilder);
        assert!(sql.contains(r#""products"."name" ILIKE"#));
        assert!(sql.contains(r#""products"."description" ILIKE"#));
        assert!(sql.contains("ESCAPE"));
    }

    #[test]
    fn page_params_are_clamped() {
        assert_eq!(page_params(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(page_params(Some(0), Some(0)), (1, 1));
        assert_eq!(page_params(Some(3), Some(1000)), (3, MAX_PAGE_SIZE));
    }

    #[test]
    fn product_input_requires_positive_price() {
        let input = ProductInput {
            name: "Classic Tee".to_string(),
            description: String::new(),
            price: Decimal::ZERO,
            images: vec![],
            colors: vec!["white".to_string()],
            sizes: vec!["M".to_string()],
            category: None,
            stock: 10,
        };
        assert!(input.check().is_err());

        let input = ProductInput { price: Decimal::new(1999, 2), ..input };
        assert!(input.check().is_ok());

        let input = ProductInput { stock: -1, ..input };
        assert!(input.check().is_err());

        let input = ProductInput { stock: 1, name: String::new(), ..input };
        assert!(input.check().is_err());
    }

    #[test]
    fn review_rating_is_bounded() {
        assert!(ReviewInput { rating: 0, comment: String::new() }.validate().is_err());
        assert!(ReviewInput { rating: 6, comment: String::new() }.validate().is_err());
        assert!(ReviewInput { rating: 5, comment: "great".into() }.validate().is_ok());
    }

    #[tokio::test]
    async fn review_write_recomputes_rating_and_count() {
        let product = crate::test_support::sample_product(3, Decimal::new(2500, 2));
        let review = reviews::Model {
            id: 11,
            product_id: 3,
            user_id: 7,
            user_name: "Sam".to_string(),
            rating: 4,
            comment: "Soft fabric".to_string(),
            created_at: Utc::now().naive_utc(),
        };
        let rating_rows = vec![
            std::collections::BTreeMap::from([("rating", Value::SmallInt(Some(5)))]),
            std::collections::BTreeMap::from([("rating", Value::SmallInt(Some(4)))]),
        ];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product.clone()]])
            .append_query_results([vec![review]])
            .append_query_results([rating_rows])
            .append_query_results([vec![product]])
            .into_connection();
        let user = AuthUser {
            user_id: 7,
            email: "sam@example.com".to_string(),
            name: "Sam".to_string(),
            role: crate::models::users::Role::Customer,
        };

        let saved = ProductService::upsert_review(
            &db,
            3,
            &user,
            ReviewInput { rating: 4, comment: "Soft fabric".to_string() },
        )
        .await
        .unwrap();
        assert_eq!(saved.rating, 4);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("ON CONFLICT"));
        assert!(log.contains("FOR UPDATE"));
        // mean of 5 and 4, two reviews
        assert!(log.contains("4.5"));
        assert!(log.contains("Int(Some(2))"));
    }

    #[tokio::test]
    async fn get_missing_product_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<products::Model>::new()])
            .into_connection();

        let err = ProductService::get_with_reviews(&db, 42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
