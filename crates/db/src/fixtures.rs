use sqlx::Executor;

use crate::connection::DbPool;

/// Canonical row counts for the demo sales dataset.
const SEED_TABLE_COUNTS: &[(&str, i64)] = &[
    ("customers", 10),
    ("products", 15),
    ("orders", 12),
    ("order_items", 26),
];

/// Deterministic demo dataset for the four sales tables.
///
/// The fixture replaces any previously loaded rows, so loading is repeatable
/// and `verify` checks hold after every load.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// SQL fixture content for the demo dataset.
    pub const SQL: &str = include_str!("../../../config/fixtures/sales_seed_data.sql");

    /// Load the demo dataset in a single transaction.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let tables_seeded = SEED_TABLE_COUNTS
            .iter()
            .copied()
            .map(|(table, rows)| TableSeedInfo { table, rows })
            .collect::<Vec<_>>();

        Ok(SeedResult { tables_seeded })
    }

    /// Verify that seeded rows exist and the dataset is internally consistent.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, sqlx::Error> {
        let mut checks = Vec::new();

        for (table, expected) in SEED_TABLE_COUNTS {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table}"))
                .fetch_one(pool)
                .await?;
            checks.push((*table, count == *expected));
        }

        let orphaned_orders: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM orders o \
             WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.id = o.customer_id)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("orders-have-customers", orphaned_orders == 0));

        let orphaned_item_orders: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM order_items i \
             WHERE NOT EXISTS (SELECT 1 FROM orders o WHERE o.id = i.order_id)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("order-items-have-orders", orphaned_item_orders == 0));

        let orphaned_item_products: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM order_items i \
             WHERE NOT EXISTS (SELECT 1 FROM products p WHERE p.id = i.product_id)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("order-items-have-products", orphaned_item_products == 0));

        let mismatched_amounts: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM orders o \
             WHERE ABS(o.amount_sum - (SELECT COALESCE(SUM(i.subsum), 0) \
                                       FROM order_items i WHERE i.order_id = o.id)) > 0.005",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("order-amounts-consistent", mismatched_amounts == 0));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove all rows from the seeded tables.
    pub async fn clean(pool: &DbPool) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for table in ["order_items", "orders", "products", "customers"] {
            sqlx::query(&format!("DELETE FROM {table}")).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub tables_seeded: Vec<TableSeedInfo>,
}

#[derive(Debug)]
pub struct TableSeedInfo {
    pub table: &'static str,
    pub rows: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoSeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification =
            DemoSeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present);
        assert_eq!(first.tables_seeded.len(), 4);

        let second = DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification =
            DemoSeedDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert!(second_verification.all_present);
        assert_eq!(second.tables_seeded.len(), 4);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn verify_seed_dataset_specific_values() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");

        let first_product: (String, f64) =
            sqlx::query_as("SELECT name, price FROM products WHERE id = 1")
                .fetch_one(&pool)
                .await
                .expect("query first product");
        assert_eq!(first_product.0, "Laptop Pro 15\"");
        assert!((first_product.1 - 1299.99).abs() < 0.001);

        let first_order_amount: f64 =
            sqlx::query_scalar("SELECT amount_sum FROM orders WHERE id = 1")
                .fetch_one(&pool)
                .await
                .expect("query first order amount");
        assert!((first_order_amount - 2689.95).abs() < 0.001);

        let completed_orders: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM orders WHERE status = 'completed'")
                .fetch_one(&pool)
                .await
                .expect("count completed orders");
        assert_eq!(completed_orders, 8);
    }

    #[tokio::test]
    async fn clean_removes_all_seeded_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        DemoSeedDataset::clean(&pool).await.expect("clean seed fixtures");

        for (table, _) in SEED_TABLE_COUNTS {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table}"))
                .fetch_one(&pool)
                .await
                .expect("count remaining rows");
            assert_eq!(count, 0, "{table} should be empty after clean");
        }
    }
}
