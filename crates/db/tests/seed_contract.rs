use std::collections::{BTreeMap, BTreeSet};

type SeedFixtureTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!($($arg)*));
        }
    };
}

const FIXTURE_SQL: &str = include_str!("../../../config/fixtures/sales_seed_data.sql");

const EXPECTED_ROW_COUNTS: &[(&str, usize)] =
    &[("customers (", 10), ("products (", 15), ("orders (", 12), ("order_items (", 26)];

fn insert_section(prefix: &str) -> SeedFixtureTestResult<&'static str> {
    FIXTURE_SQL
        .split("INSERT INTO ")
        .find(|chunk| chunk.starts_with(prefix))
        .ok_or_else(|| format!("fixture should have an INSERT section for {prefix}"))
}

fn tuple_lines(section: &str) -> Vec<&str> {
    section.lines().map(str::trim).filter(|line| line.starts_with('(')).collect()
}

fn tuple_fields(line: &str) -> Vec<&str> {
    line.trim_start_matches('(').trim_end_matches([',', ';']).trim_end_matches(')').split(", ").collect()
}

fn parse_i64(raw: &str, label: &str) -> SeedFixtureTestResult<i64> {
    raw.parse::<i64>().map_err(|_| format!("{label} should be an integer, got `{raw}`"))
}

fn parse_f64(raw: &str, label: &str) -> SeedFixtureTestResult<f64> {
    raw.parse::<f64>().map_err(|_| format!("{label} should be numeric, got `{raw}`"))
}

fn unquote(raw: &str) -> &str {
    raw.trim_matches('\'')
}

#[test]
fn seed_sections_have_expected_row_counts() -> SeedFixtureTestResult {
    for (prefix, expected) in EXPECTED_ROW_COUNTS {
        let section = insert_section(prefix)?;
        require_eq!(
            tuple_lines(section).len(),
            *expected,
            "section {} should contain {} rows",
            prefix,
            expected
        );
    }
    Ok(())
}

#[test]
fn fixture_clears_tables_before_inserting() -> SeedFixtureTestResult {
    let first_insert = FIXTURE_SQL
        .find("INSERT INTO ")
        .ok_or_else(|| "fixture should contain INSERT statements".to_string())?;
    let preamble = &FIXTURE_SQL[..first_insert];

    for table in ["order_items", "orders", "products", "customers"] {
        require!(
            preamble.contains(&format!("DELETE FROM {table};")),
            "fixture should clear {} before inserting",
            table
        );
    }

    let items_delete = preamble
        .find("DELETE FROM order_items;")
        .ok_or_else(|| "missing order_items delete".to_string())?;
    let orders_delete = preamble
        .find("DELETE FROM orders;")
        .ok_or_else(|| "missing orders delete".to_string())?;
    require!(
        items_delete < orders_delete,
        "child tables must be cleared before their parents for foreign keys to hold"
    );
    Ok(())
}

#[test]
fn order_item_arithmetic_is_consistent() -> SeedFixtureTestResult {
    let mut catalog_prices: BTreeMap<i64, f64> = BTreeMap::new();
    for line in tuple_lines(insert_section("products (")?) {
        let fields = tuple_fields(line);
        require_eq!(fields.len(), 6, "product row should have 6 fields: {}", line);
        let id = parse_i64(fields[0], "product id")?;
        let price = parse_f64(fields[3], "product price")?;
        catalog_prices.insert(id, price);
    }

    let mut item_totals: BTreeMap<i64, f64> = BTreeMap::new();
    for line in tuple_lines(insert_section("order_items (")?) {
        let fields = tuple_fields(line);
        require_eq!(fields.len(), 6, "order item row should have 6 fields: {}", line);
        let order_id = parse_i64(fields[1], "order id")?;
        let product_id = parse_i64(fields[2], "product id")?;
        let quantity = parse_i64(fields[3], "quantity")?;
        let unit_price = parse_f64(fields[4], "unit price")?;
        let subsum = parse_f64(fields[5], "subsum")?;

        let catalog_price = catalog_prices
            .get(&product_id)
            .ok_or_else(|| format!("order item references unknown product {product_id}"))?;
        require!(
            (unit_price - catalog_price).abs() < 0.005,
            "unit price for product {} should match the catalog price",
            product_id
        );
        require!(
            (subsum - unit_price * quantity as f64).abs() < 0.005,
            "subsum should equal quantity * unit_price for order {}",
            order_id
        );
        *item_totals.entry(order_id).or_insert(0.0) += subsum;
    }

    for line in tuple_lines(insert_section("orders (")?) {
        let fields = tuple_fields(line);
        require_eq!(fields.len(), 5, "order row should have 5 fields: {}", line);
        let id = parse_i64(fields[0], "order id")?;
        let amount_sum = parse_f64(fields[4], "amount_sum")?;
        let item_total = item_totals
            .get(&id)
            .ok_or_else(|| format!("order {id} should have at least one order item"))?;
        require!(
            (amount_sum - item_total).abs() < 0.005,
            "order {} amount_sum {} should equal the sum of its item subsums {}",
            id,
            amount_sum,
            item_total
        );
    }
    Ok(())
}

#[test]
fn seed_references_and_statuses_are_valid() -> SeedFixtureTestResult {
    let customer_ids: BTreeSet<i64> = tuple_lines(insert_section("customers (")?)
        .iter()
        .map(|line| parse_i64(tuple_fields(line)[0], "customer id"))
        .collect::<SeedFixtureTestResult<_>>()?;
    require_eq!(customer_ids.len(), 10);

    let mut statuses_seen: BTreeSet<String> = BTreeSet::new();
    for line in tuple_lines(insert_section("orders (")?) {
        let fields = tuple_fields(line);
        let customer_id = parse_i64(fields[1], "customer id")?;
        require!(
            customer_ids.contains(&customer_id),
            "order references unknown customer {}",
            customer_id
        );

        let status = unquote(fields[3]);
        require!(
            matches!(status, "completed" | "processing" | "shipped"),
            "unexpected order status `{}`",
            status
        );
        statuses_seen.insert(status.to_string());
    }

    require_eq!(
        statuses_seen.into_iter().collect::<Vec<_>>(),
        vec!["completed", "processing", "shipped"],
        "dataset should cover every order status"
    );
    Ok(())
}
