use anyhow::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};

use super::filter::{DashboardFilter, WhereClause};

/// Per-outlet rollups shared by the performance and watchlist queries.
///
/// The filter is applied on the outlet master in the outer query, so these
/// CTEs carry only the fixed fiscal-year conditions.
const OUTLET_ROLLUP_CTES: &str = r#"
    WITH outlet_sales AS (
        SELECT st.outlet_id, COALESCE(SUM(st.net_sales), 0)::float8 AS sales
        FROM sales_transactions st
        WHERE st.fiscal_year = 2024 AND st.return_flag = 0
        GROUP BY st.outlet_id
    ), outlet_prior_sales AS (
        SELECT st.outlet_id, COALESCE(SUM(st.net_sales), 0)::float8 AS sales
        FROM sales_transactions st
        WHERE st.fiscal_year = 2023 AND st.return_flag = 0
        GROUP BY st.outlet_id
    ), outlet_returns AS (
        SELECT st.outlet_id,
            COALESCE(SUM(CASE WHEN st.return_flag = 1 THEN st.net_sales ELSE 0 END), 0)::float8 AS returned_sales,
            COALESCE(SUM(st.net_sales), 0)::float8 AS gross_sales
        FROM sales_transactions st
        WHERE st.fiscal_year = 2024
        GROUP BY st.outlet_id
    ), outlet_visits AS (
        SELECT vsc.outlet_id,
            COUNT(vsc.visit_id) AS visits,
            COALESCE(SUM(vsc.oos_flag), 0) AS oos_hits,
            MAX(vsc.visit_date)::text AS last_visit_date
        FROM visit_stock_capture vsc
        WHERE EXTRACT(YEAR FROM vsc.visit_date) = 2024
        GROUP BY vsc.outlet_id
    ), outlet_targets AS (
        SELECT t.outlet_id, COALESCE(SUM(t.target_amount), 0)::float8 AS target
        FROM targets t
        WHERE EXTRACT(YEAR FROM t.period_start) = 2024
        GROUP BY t.outlet_id
    )"#;

fn statement(db: &DatabaseConnection, sql: &str, filter: &DashboardFilter) -> Statement {
    Statement::from_sql_and_values(db.get_database_backend(), sql, filter.params())
}

fn statement_bare(db: &DatabaseConnection, sql: &str) -> Statement {
    Statement::from_sql_and_values(db.get_database_backend(), sql, [])
}

#[derive(Debug, FromQueryResult)]
struct ScalarF64 {
    value: f64,
}

#[derive(Debug, FromQueryResult)]
struct ScalarI64 {
    value: i64,
}

async fn scalar_f64(db: &DatabaseConnection, sql: &str, filter: &DashboardFilter) -> Result<f64> {
    let row = ScalarF64::find_by_statement(statement(db, sql, filter))
        .one(db)
        .await?;
    Ok(row.map(|r| r.value).unwrap_or(0.0))
}

fn ytd_sales_sql(filter: &DashboardFilter) -> String {
    let clause = WhereClause::new(&["fiscal_year = 2024", "return_flag = 0"])
        .with_filter(filter, "region", "channel");
    format!(
        "SELECT COALESCE(SUM(net_sales), 0)::float8 AS value FROM sales_transactions {}",
        clause.to_where_sql()
    )
}

/// Year-to-date net sales, returns excluded
pub async fn ytd_sales(db: &DatabaseConnection, filter: &DashboardFilter) -> Result<f64> {
    scalar_f64(db, &ytd_sales_sql(filter), filter).await
}

fn prior_year_sales_sql(filter: &DashboardFilter) -> String {
    let clause = WhereClause::new(&["fiscal_year = 2023", "return_flag = 0"])
        .with_filter(filter, "region", "channel");
    format!(
        "SELECT COALESCE(SUM(net_sales), 0)::float8 AS value FROM sales_transactions {}",
        clause.to_where_sql()
    )
}

/// Prior-year net sales, returns excluded. Growth % is derived from this and
/// the YTD figure in the service layer.
pub async fn prior_year_sales(db: &DatabaseConnection, filter: &DashboardFilter) -> Result<f64> {
    scalar_f64(db, &prior_year_sales_sql(filter), filter).await
}

fn return_rate_sql(filter: &DashboardFilter) -> String {
    let clause =
        WhereClause::new(&["fiscal_year = 2024"]).with_filter(filter, "region", "channel");
    format!(
        r#"SELECT
            CASE
                WHEN SUM(net_sales) = 0 OR SUM(net_sales) IS NULL THEN 0
                ELSE (COALESCE(SUM(CASE WHEN return_flag = 1 THEN net_sales ELSE 0 END), 0) / SUM(net_sales)) * 100
            END::float8 AS value
        FROM sales_transactions {}"#,
        clause.to_where_sql()
    )
}

/// Returned net sales over total net sales, as a percentage
pub async fn return_rate(db: &DatabaseConnection, filter: &DashboardFilter) -> Result<f64> {
    scalar_f64(db, &return_rate_sql(filter), filter).await
}

#[derive(Debug, FromQueryResult)]
pub struct ChannelSalesRow {
    pub channel: String,
    pub sales: f64,
}

fn sales_by_channel_sql(filter: &DashboardFilter) -> String {
    let clause = WhereClause::new(&["fiscal_year = 2024", "return_flag = 0"])
        .with_filter(filter, "region", "channel");
    format!(
        r#"SELECT channel, SUM(net_sales)::float8 AS sales
        FROM sales_transactions {}
        GROUP BY channel
        ORDER BY sales DESC"#,
        clause.to_where_sql()
    )
}

pub async fn sales_by_channel(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<Vec<ChannelSalesRow>> {
    let rows = ChannelSalesRow::find_by_statement(statement(db, &sales_by_channel_sql(filter), filter))
        .all(db)
        .await?;
    Ok(rows)
}

#[derive(Debug, FromQueryResult)]
pub struct ForecastPointRow {
    pub week: String,
    pub model: String,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub is_forecast: bool,
}

/// Precomputed actual/forecast weekly series for the main chart. Unfiltered.
pub async fn forecast_series(db: &DatabaseConnection) -> Result<Vec<ForecastPointRow>> {
    let sql = r#"SELECT week::text AS week, series AS model, value::float8 AS value,
            lower::float8 AS lower, upper::float8 AS upper, isfuture AS is_forecast
        FROM timeseries_for_tableau"#;
    let rows = ForecastPointRow::find_by_statement(statement_bare(db, sql))
        .all(db)
        .await?;
    Ok(rows)
}

fn oos_rate_sql(filter: &DashboardFilter) -> String {
    let clause = WhereClause::new(&["EXTRACT(YEAR FROM vsc.visit_date) = 2024"])
        .with_filter(filter, "om.region", "om.channel");
    format!(
        r#"SELECT
            CASE
                WHEN COUNT(vsc.visit_id) = 0 THEN 0
                ELSE (COALESCE(SUM(vsc.oos_flag), 0) * 1.0 / COUNT(vsc.visit_id)) * 100
            END::float8 AS value
        FROM visit_stock_capture vsc
        LEFT JOIN outlet_master om ON vsc.outlet_id = om.outlet_id
        {}"#,
        clause.to_where_sql()
    )
}

/// Share of stock-capture visits with the out-of-stock flag set
pub async fn oos_rate(db: &DatabaseConnection, filter: &DashboardFilter) -> Result<f64> {
    scalar_f64(db, &oos_rate_sql(filter), filter).await
}

fn active_outlet_count_sql(filter: &DashboardFilter) -> String {
    let clause =
        WhereClause::new(&["status = 'Active'"]).with_filter(filter, "region", "channel");
    format!(
        "SELECT COUNT(DISTINCT outlet_id) AS value FROM outlet_master {}",
        clause.to_where_sql()
    )
}

pub async fn active_outlet_count(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<i64> {
    let row = ScalarI64::find_by_statement(statement(db, &active_outlet_count_sql(filter), filter))
        .one(db)
        .await?;
    Ok(row.map(|r| r.value).unwrap_or(0))
}

/// Active SKU count. Not affected by the region/channel filters.
pub async fn active_sku_count(db: &DatabaseConnection) -> Result<i64> {
    let sql = "SELECT COUNT(DISTINCT sku_id) AS value FROM sku_master WHERE active_flag = 1";
    let row = ScalarI64::find_by_statement(statement_bare(db, sql))
        .one(db)
        .await?;
    Ok(row.map(|r| r.value).unwrap_or(0))
}

/// Distinct regions for the filter dropdown
pub async fn region_list(db: &DatabaseConnection) -> Result<Vec<String>> {
    #[derive(Debug, FromQueryResult)]
    struct RegionRow {
        region: String,
    }

    let sql = "SELECT DISTINCT region FROM outlet_master ORDER BY region";
    let rows = RegionRow::find_by_statement(statement_bare(db, sql))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| r.region).collect())
}

/// Distinct channels for the filter dropdown
pub async fn channel_list(db: &DatabaseConnection) -> Result<Vec<String>> {
    #[derive(Debug, FromQueryResult)]
    struct ChannelRow {
        channel: String,
    }

    let sql = "SELECT DISTINCT channel FROM outlet_master ORDER BY channel";
    let rows = ChannelRow::find_by_statement(statement_bare(db, sql))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| r.channel).collect())
}

/// Promotion uplift aggregates: promo-window vs. baseline daily averages for
/// promoted SKUs.
#[derive(Debug, Default, FromQueryResult)]
pub struct PromoUpliftRow {
    pub total_promo_sales: f64,
    pub total_baseline_sales: f64,
    pub promo_days: i64,
    pub baseline_days: i64,
    pub uplift_percent: f64,
}

fn promo_uplift_sql(filter: &DashboardFilter) -> String {
    let clause = WhereClause::new(&["st.fiscal_year = 2024", "st.return_flag = 0"])
        .with_filter(filter, "st.region", "st.channel");
    format!(
        r#"WITH promo_sales AS (
            SELECT DISTINCT st.transaction_id, st.net_sales, st.transaction_date
            FROM sales_transactions st
            JOIN promotions p ON st.sku_id = p.sku_id_or_group
                AND st.transaction_date BETWEEN p.start_date AND p.end_date
            {promo_where}
        ), baseline_sales AS (
            SELECT st.net_sales, st.transaction_date
            FROM sales_transactions st
            JOIN promotions p ON st.sku_id = p.sku_id_or_group
            LEFT JOIN promo_sales ps ON st.transaction_id = ps.transaction_id
            WHERE ps.transaction_id IS NULL
            {promo_and}
        ), promo_agg AS (
            SELECT COALESCE(SUM(net_sales), 0)::float8 AS total_promo_sales,
                COUNT(DISTINCT transaction_date) AS promo_days
            FROM promo_sales
        ), baseline_agg AS (
            SELECT COALESCE(SUM(net_sales), 0)::float8 AS total_baseline_sales,
                COUNT(DISTINCT transaction_date) AS baseline_days
            FROM baseline_sales
        )
        SELECT
            pa.total_promo_sales, ba.total_baseline_sales, pa.promo_days, ba.baseline_days,
            CASE
                WHEN ba.baseline_days = 0 OR ba.total_baseline_sales = 0 THEN 0
                WHEN pa.promo_days = 0 THEN -100
                ELSE ((pa.total_promo_sales / pa.promo_days) - (ba.total_baseline_sales / ba.baseline_days))
                    / (ba.total_baseline_sales / ba.baseline_days) * 100
            END::float8 AS uplift_percent
        FROM promo_agg pa, baseline_agg ba"#,
        promo_where = clause.to_where_sql(),
        promo_and = clause.to_and_sql(),
    )
}

/// Promo uplift %. Yields exactly -100 when there were no promo-period days
/// against a nonzero baseline (promotion had no measurable activity), and 0
/// when the baseline itself is empty.
pub async fn promo_uplift(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<PromoUpliftRow> {
    let row = PromoUpliftRow::find_by_statement(statement(db, &promo_uplift_sql(filter), filter))
        .one(db)
        .await?;
    Ok(row.unwrap_or_default())
}

#[derive(Debug, FromQueryResult)]
pub struct ForecastTableRowRaw {
    pub week: String,
    pub prophet: f64,
    pub naive_seasonal: f64,
    pub sarima: f64,
    pub sarimax_promo: f64,
}

/// Precomputed 8-week model comparison. Unfiltered.
pub async fn forecast_table(db: &DatabaseConnection) -> Result<Vec<ForecastTableRowRaw>> {
    let sql = r#"SELECT week::text AS week, prophet::float8 AS prophet,
            naive_seasonal::float8 AS naive_seasonal, sarima::float8 AS sarima,
            sarimax_promo::float8 AS sarimax_promo
        FROM forecast_table_8w ORDER BY week ASC LIMIT 8"#;
    let rows = ForecastTableRowRaw::find_by_statement(statement_bare(db, sql))
        .all(db)
        .await?;
    Ok(rows)
}

#[derive(Debug, FromQueryResult)]
pub struct RegionAchievementRow {
    pub name: String,
    pub total_sales: f64,
    pub total_target: f64,
    pub achievement: f64,
}

fn achievement_by_region_sql(filter: &DashboardFilter) -> String {
    let sales_clause = WhereClause::new(&["fiscal_year = 2024", "return_flag = 0"])
        .with_filter(filter, "region", "channel");
    let target_clause = WhereClause::new(&["EXTRACT(YEAR FROM t.period_start) = 2024"])
        .with_filter(filter, "om.region", "om.channel");
    format!(
        r#"WITH sales_by_region AS (
            SELECT region, COALESCE(SUM(net_sales), 0)::float8 AS total_sales
            FROM sales_transactions
            {sales_where}
            GROUP BY region
        ), targets_by_region AS (
            SELECT om.region, COALESCE(SUM(t.target_amount), 0)::float8 AS total_target
            FROM targets t
            JOIN outlet_master om ON t.outlet_id = om.outlet_id
            {target_where}
            GROUP BY om.region
        )
        SELECT
            COALESCE(s.region, t.region) AS name,
            COALESCE(s.total_sales, 0)::float8 AS total_sales,
            COALESCE(t.total_target, 0)::float8 AS total_target,
            CASE
                WHEN t.total_target = 0 OR t.total_target IS NULL THEN 0
                ELSE (COALESCE(s.total_sales, 0) / t.total_target) * 100
            END::float8 AS achievement
        FROM sales_by_region s
        FULL OUTER JOIN targets_by_region t ON s.region = t.region
        ORDER BY achievement DESC"#,
        sales_where = sales_clause.to_where_sql(),
        target_where = target_clause.to_where_sql(),
    )
}

/// Sales vs. target achievement rollup per region
pub async fn achievement_by_region(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<Vec<RegionAchievementRow>> {
    let rows = RegionAchievementRow::find_by_statement(statement(
        db,
        &achievement_by_region_sql(filter),
        filter,
    ))
    .all(db)
    .await?;
    Ok(rows)
}

#[derive(Debug, FromQueryResult)]
pub struct ReturnMatrixRow {
    pub portfolio: String,
    pub reason: String,
    pub return_value: f64,
}

fn return_matrix_sql(filter: &DashboardFilter) -> String {
    let clause = WhereClause::new(&["EXTRACT(YEAR FROM r.return_date) = 2024"])
        .with_filter(filter, "om.region", "om.channel");
    format!(
        r#"WITH return_totals AS (
            SELECT sm.portfolio, r.reason, COALESCE(SUM(r.returned_qty), 0)::float8 AS return_qty
            FROM returns r
            JOIN sku_master sm ON r.sku_id = sm.sku_id
            JOIN outlet_master om ON r.outlet_id = om.outlet_id
            {where_sql}
            GROUP BY sm.portfolio, r.reason
        ), portfolio_totals AS (
            SELECT portfolio, SUM(return_qty) AS total_portfolio_returns
            FROM return_totals
            GROUP BY portfolio
        )
        SELECT rt.portfolio, rt.reason,
            CASE
                WHEN pt.total_portfolio_returns = 0 THEN 0
                ELSE rt.return_qty * 100.0 / pt.total_portfolio_returns
            END::float8 AS return_value
        FROM return_totals rt
        JOIN portfolio_totals pt ON rt.portfolio = pt.portfolio
        ORDER BY rt.portfolio, rt.reason"#,
        where_sql = clause.to_where_sql(),
    )
}

/// Share of each portfolio's returned quantity by return reason
pub async fn return_matrix(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<Vec<ReturnMatrixRow>> {
    let rows =
        ReturnMatrixRow::find_by_statement(statement(db, &return_matrix_sql(filter), filter))
            .all(db)
            .await?;
    Ok(rows)
}

#[derive(Debug, FromQueryResult)]
pub struct OutletPerformanceRow {
    pub outlet: String,
    pub region: String,
    pub territory: String,
    pub sales: f64,
    pub target: f64,
    pub achievement: f64,
    pub oos_percent: f64,
    pub return_percent: f64,
    pub prior_sales: f64,
    pub growth_percent: f64,
    pub last_visit_date: Option<String>,
}

fn outlet_performance_sql(filter: &DashboardFilter) -> String {
    let clause =
        WhereClause::new(&["om.status = 'Active'"]).with_filter(filter, "om.region", "om.channel");
    format!(
        r#"{ctes}
        SELECT
            om.outlet_name AS outlet,
            om.region,
            om.territory,
            COALESCE(s.sales, 0)::float8 AS sales,
            COALESCE(tg.target, 0)::float8 AS target,
            CASE
                WHEN COALESCE(tg.target, 0) = 0 THEN 0
                ELSE COALESCE(s.sales, 0) / tg.target * 100
            END::float8 AS achievement,
            CASE
                WHEN COALESCE(v.visits, 0) = 0 THEN 0
                ELSE COALESCE(v.oos_hits, 0) * 100.0 / v.visits
            END::float8 AS oos_percent,
            CASE
                WHEN COALESCE(r.gross_sales, 0) = 0 THEN 0
                ELSE COALESCE(r.returned_sales, 0) / r.gross_sales * 100
            END::float8 AS return_percent,
            COALESCE(p.sales, 0)::float8 AS prior_sales,
            CASE
                WHEN COALESCE(p.sales, 0) = 0 THEN 0
                ELSE (COALESCE(s.sales, 0) - p.sales) / p.sales * 100
            END::float8 AS growth_percent,
            v.last_visit_date
        FROM outlet_master om
        LEFT JOIN outlet_sales s ON om.outlet_id = s.outlet_id
        LEFT JOIN outlet_prior_sales p ON om.outlet_id = p.outlet_id
        LEFT JOIN outlet_returns r ON om.outlet_id = r.outlet_id
        LEFT JOIN outlet_visits v ON om.outlet_id = v.outlet_id
        LEFT JOIN outlet_targets tg ON om.outlet_id = tg.outlet_id
        {where_sql}
        ORDER BY sales DESC"#,
        ctes = OUTLET_ROLLUP_CTES,
        where_sql = clause.to_where_sql(),
    )
}

/// Full per-outlet scorecard for every active outlet matching the filters.
/// The top-5/bottom-5 split happens in the service layer.
pub async fn outlet_performance(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<Vec<OutletPerformanceRow>> {
    let rows = OutletPerformanceRow::find_by_statement(statement(
        db,
        &outlet_performance_sql(filter),
        filter,
    ))
    .all(db)
    .await?;
    Ok(rows)
}

#[derive(Debug, FromQueryResult)]
pub struct SkuPerformanceRow {
    pub sku: String,
    pub sales: f64,
    pub promo_uplift_percent: f64,
    pub return_percent: f64,
    pub oos_percent: f64,
}

fn sku_performance_sql(filter: &DashboardFilter) -> String {
    let sales_clause = WhereClause::new(&["st.fiscal_year = 2024", "st.return_flag = 0"])
        .with_filter(filter, "st.region", "st.channel");
    let gross_clause =
        WhereClause::new(&["st.fiscal_year = 2024"]).with_filter(filter, "st.region", "st.channel");
    let oos_clause = WhereClause::new(&["EXTRACT(YEAR FROM vsc.visit_date) = 2024"])
        .with_filter(filter, "om.region", "om.channel");
    format!(
        r#"WITH sku_sales AS (
            SELECT st.sku_id, COALESCE(SUM(st.net_sales), 0)::float8 AS sales
            FROM sales_transactions st
            {sales_where}
            GROUP BY st.sku_id
        ), sku_returns AS (
            SELECT st.sku_id,
                COALESCE(SUM(CASE WHEN st.return_flag = 1 THEN st.net_sales ELSE 0 END), 0)::float8 AS returned_sales,
                COALESCE(SUM(st.net_sales), 0)::float8 AS gross_sales
            FROM sales_transactions st
            {gross_where}
            GROUP BY st.sku_id
        ), sku_visits AS (
            SELECT vsc.sku_id,
                COUNT(vsc.visit_id) AS captures,
                COALESCE(SUM(vsc.oos_flag), 0) AS oos_hits
            FROM visit_stock_capture vsc
            LEFT JOIN outlet_master om ON vsc.outlet_id = om.outlet_id
            {oos_where}
            GROUP BY vsc.sku_id
        ), sku_promo AS (
            SELECT st.sku_id,
                COALESCE(SUM(st.net_sales) FILTER (WHERE p.sku_id_or_group IS NOT NULL), 0)::float8 AS promo_sales,
                COUNT(DISTINCT st.transaction_date) FILTER (WHERE p.sku_id_or_group IS NOT NULL) AS promo_days,
                COALESCE(SUM(st.net_sales) FILTER (WHERE p.sku_id_or_group IS NULL), 0)::float8 AS baseline_sales,
                COUNT(DISTINCT st.transaction_date) FILTER (WHERE p.sku_id_or_group IS NULL) AS baseline_days
            FROM sales_transactions st
            LEFT JOIN promotions p ON st.sku_id = p.sku_id_or_group
                AND st.transaction_date BETWEEN p.start_date AND p.end_date
            {sales_where}
            GROUP BY st.sku_id
        )
        SELECT
            sm.sku_name AS sku,
            COALESCE(ss.sales, 0)::float8 AS sales,
            CASE
                WHEN COALESCE(pr.baseline_days, 0) = 0 OR COALESCE(pr.baseline_sales, 0) = 0 THEN 0
                WHEN pr.promo_days = 0 THEN -100
                ELSE ((pr.promo_sales / pr.promo_days) - (pr.baseline_sales / pr.baseline_days))
                    / (pr.baseline_sales / pr.baseline_days) * 100
            END::float8 AS promo_uplift_percent,
            CASE
                WHEN COALESCE(r.gross_sales, 0) = 0 THEN 0
                ELSE COALESCE(r.returned_sales, 0) / r.gross_sales * 100
            END::float8 AS return_percent,
            CASE
                WHEN COALESCE(v.captures, 0) = 0 THEN 0
                ELSE COALESCE(v.oos_hits, 0) * 100.0 / v.captures
            END::float8 AS oos_percent
        FROM sku_master sm
        JOIN sku_sales ss ON sm.sku_id = ss.sku_id
        LEFT JOIN sku_returns r ON sm.sku_id = r.sku_id
        LEFT JOIN sku_visits v ON sm.sku_id = v.sku_id
        LEFT JOIN sku_promo pr ON sm.sku_id = pr.sku_id
        WHERE sm.active_flag = 1
        ORDER BY ss.sales DESC
        LIMIT 20"#,
        sales_where = sales_clause.to_where_sql(),
        gross_where = gross_clause.to_where_sql(),
        oos_where = oos_clause.to_where_sql(),
    )
}

/// Per-SKU scorecard, top 20 active SKUs by sales
pub async fn sku_performance(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<Vec<SkuPerformanceRow>> {
    let rows =
        SkuPerformanceRow::find_by_statement(statement(db, &sku_performance_sql(filter), filter))
            .all(db)
            .await?;
    Ok(rows)
}

#[derive(Debug, FromQueryResult)]
pub struct WatchlistRow {
    pub outlet: String,
    pub region: String,
    pub territory: String,
    pub oos_percent: f64,
    pub growth_percent: f64,
    pub return_percent: f64,
}

fn watchlist_sql(filter: &DashboardFilter) -> String {
    let clause =
        WhereClause::new(&["om.status = 'Active'"]).with_filter(filter, "om.region", "om.channel");
    format!(
        r#"{ctes}
        SELECT outlet, region, territory, oos_percent, growth_percent, return_percent
        FROM (
            SELECT
                om.outlet_name AS outlet,
                om.region,
                om.territory,
                CASE
                    WHEN COALESCE(v.visits, 0) = 0 THEN 0
                    ELSE COALESCE(v.oos_hits, 0) * 100.0 / v.visits
                END::float8 AS oos_percent,
                CASE
                    WHEN COALESCE(p.sales, 0) = 0 THEN 0
                    ELSE (COALESCE(s.sales, 0) - p.sales) / p.sales * 100
                END::float8 AS growth_percent,
                CASE
                    WHEN COALESCE(r.gross_sales, 0) = 0 THEN 0
                    ELSE COALESCE(r.returned_sales, 0) / r.gross_sales * 100
                END::float8 AS return_percent
            FROM outlet_master om
            LEFT JOIN outlet_sales s ON om.outlet_id = s.outlet_id
            LEFT JOIN outlet_prior_sales p ON om.outlet_id = p.outlet_id
            LEFT JOIN outlet_returns r ON om.outlet_id = r.outlet_id
            LEFT JOIN outlet_visits v ON om.outlet_id = v.outlet_id
            {where_sql}
        ) perf
        WHERE perf.oos_percent > 10 AND (perf.growth_percent < 0 OR perf.return_percent > 2.5)
        ORDER BY perf.oos_percent DESC, perf.growth_percent ASC"#,
        ctes = OUTLET_ROLLUP_CTES,
        where_sql = clause.to_where_sql(),
    )
}

/// Outlets meeting the execution-risk rule, most at-risk first
pub async fn watchlist(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<Vec<WatchlistRow>> {
    let rows = WatchlistRow::find_by_statement(statement(db, &watchlist_sql(filter), filter))
        .all(db)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn both_filters() -> DashboardFilter {
        DashboardFilter::new(Some("Western".to_string()), Some("Supermarket".to_string()))
    }

    #[test]
    fn test_ytd_sales_sql_without_filters_has_no_placeholders() {
        let sql = ytd_sales_sql(&DashboardFilter::new(None, None));
        assert!(sql.contains("WHERE fiscal_year = 2024 AND return_flag = 0"));
        assert!(!sql.contains('$'));
    }

    #[test]
    fn test_ytd_sales_sql_with_both_filters() {
        let sql = ytd_sales_sql(&both_filters());
        assert!(sql.contains("region = $1"));
        assert!(sql.contains("channel = $2"));
    }

    #[test]
    fn test_oos_rate_sql_filters_via_outlet_alias() {
        let sql = oos_rate_sql(&both_filters());
        assert!(sql.contains("om.region = $1"));
        assert!(sql.contains("om.channel = $2"));
        assert!(sql.contains("LEFT JOIN outlet_master om"));
    }

    #[test]
    fn test_promo_uplift_sql_reuses_clause_as_and_form_in_baseline() {
        let sql = promo_uplift_sql(&both_filters());
        // WHERE-form in the promo CTE, AND-form after the NULL anti-join
        assert!(sql.contains("WHERE st.fiscal_year = 2024 AND st.return_flag = 0 AND st.region = $1 AND st.channel = $2"));
        assert!(sql.contains("WHERE ps.transaction_id IS NULL"));
        assert!(sql.contains("AND st.fiscal_year = 2024 AND st.return_flag = 0 AND st.region = $1"));
        assert!(sql.contains("WHEN pa.promo_days = 0 THEN -100"));
    }

    #[test]
    fn test_promo_uplift_sql_without_filters_keeps_fixed_conditions() {
        let sql = promo_uplift_sql(&DashboardFilter::new(None, None));
        assert!(sql.contains("WHERE st.fiscal_year = 2024 AND st.return_flag = 0"));
        assert!(!sql.contains('$'));
    }

    #[test]
    fn test_watchlist_sql_encodes_risk_rule_and_ordering() {
        let sql = watchlist_sql(&DashboardFilter::new(None, None));
        assert!(sql.contains(
            "WHERE perf.oos_percent > 10 AND (perf.growth_percent < 0 OR perf.return_percent > 2.5)"
        ));
        assert!(sql.contains("ORDER BY perf.oos_percent DESC, perf.growth_percent ASC"));
        assert!(sql.contains("om.status = 'Active'"));
    }

    #[test]
    fn test_sku_performance_sql_limits_to_top_20_by_sales() {
        let sql = sku_performance_sql(&both_filters());
        assert!(sql.contains("ORDER BY ss.sales DESC"));
        assert!(sql.contains("LIMIT 20"));
        assert!(sql.contains("st.region = $1"));
        assert!(sql.contains("om.region = $1"));
    }

    #[test]
    fn test_achievement_sql_binds_target_family_via_outlet_alias() {
        assert!(!achievement_by_region_sql(&DashboardFilter::new(None, None)).contains('$'));

        let sql = achievement_by_region_sql(&both_filters());
        assert!(sql.contains("region = $1"));
        assert!(sql.contains("om.region = $1"));
        assert!(sql.contains("FULL OUTER JOIN"));
        assert!(sql.contains("ORDER BY achievement DESC"));
    }

    #[tokio::test]
    async fn test_ytd_sales_decodes_single_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([("value", Value::Double(Some(1250.5)))])]])
            .into_connection();

        let value = ytd_sales(&db, &DashboardFilter::new(None, None))
            .await
            .unwrap();
        assert_eq!(value, 1250.5);
    }

    #[tokio::test]
    async fn test_ytd_sales_defaults_to_zero_without_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<BTreeMap<&str, Value>>::new()])
            .into_connection();

        let value = ytd_sales(&db, &DashboardFilter::new(None, None))
            .await
            .unwrap();
        assert_eq!(value, 0.0);
    }

    #[tokio::test]
    async fn test_promo_uplift_decodes_aggregate_row() {
        let row = BTreeMap::from([
            ("total_promo_sales", Value::Double(Some(500.0))),
            ("total_baseline_sales", Value::Double(Some(400.0))),
            ("promo_days", Value::BigInt(Some(5))),
            ("baseline_days", Value::BigInt(Some(20))),
            ("uplift_percent", Value::Double(Some(400.0))),
        ]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row]])
            .into_connection();

        let uplift = promo_uplift(&db, &DashboardFilter::new(None, None))
            .await
            .unwrap();
        assert_eq!(uplift.promo_days, 5);
        assert_eq!(uplift.uplift_percent, 400.0);
    }

    #[tokio::test]
    async fn test_outlet_performance_decodes_nullable_visit_date() {
        let row = BTreeMap::from([
            ("outlet", Value::String(Some(Box::new("Keells Nugegoda".to_string())))),
            ("region", Value::String(Some(Box::new("Western".to_string())))),
            ("territory", Value::String(Some(Box::new("Colombo South".to_string())))),
            ("sales", Value::Double(Some(1000.0))),
            ("target", Value::Double(Some(800.0))),
            ("achievement", Value::Double(Some(125.0))),
            ("oos_percent", Value::Double(Some(4.0))),
            ("return_percent", Value::Double(Some(0.5))),
            ("prior_sales", Value::Double(Some(900.0))),
            ("growth_percent", Value::Double(Some(11.1))),
            ("last_visit_date", Value::String(None)),
        ]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row]])
            .into_connection();

        let rows = outlet_performance(&db, &DashboardFilter::new(None, None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outlet, "Keells Nugegoda");
        assert!(rows[0].last_visit_date.is_none());
    }
}
