use anyhow::Result;
use chrono::Utc;
use contracts::dashboards::d100_sales_overview::{
    ChannelSales, DashboardResponse, ForecastPoint, ForecastTableRow, Kpis, OutletPerformance,
    RegionAchievement, ReturnMatrixCell, SkuPerformance, WatchlistOutlet,
};
use sea_orm::DatabaseConnection;

use super::filter::{DashboardFilter, ALL_CHANNELS, ALL_REGIONS};
use super::repository;

/// Run the full query battery and assemble the dashboard payload.
///
/// All queries are dispatched concurrently against the injected connection
/// and the request completes only once every one of them has returned; a
/// single failure aborts the whole batch. No query holds a transaction, so
/// cross-query consistency under concurrent writes to the store is not
/// guaranteed.
pub async fn get_dashboard(
    db: &DatabaseConnection,
    filter: &DashboardFilter,
) -> Result<DashboardResponse> {
    let (
        ytd_sales,
        return_rate,
        channels,
        sales_forecast,
        prior_sales,
        oos_rate,
        outlet_count,
        sku_count,
        regions,
        channel_names,
        promo,
        forecast_table,
        achievement_data,
        return_matrix_data,
        outlet_rows,
        sku_rows,
        watchlist_rows,
    ) = tokio::try_join!(
        repository::ytd_sales(db, filter),
        repository::return_rate(db, filter),
        repository::sales_by_channel(db, filter),
        repository::forecast_series(db),
        repository::prior_year_sales(db, filter),
        repository::oos_rate(db, filter),
        repository::active_outlet_count(db, filter),
        repository::active_sku_count(db),
        repository::region_list(db),
        repository::channel_list(db),
        repository::promo_uplift(db, filter),
        repository::forecast_table(db),
        repository::achievement_by_region(db, filter),
        repository::return_matrix(db, filter),
        repository::outlet_performance(db, filter),
        repository::sku_performance(db, filter),
        repository::watchlist(db, filter),
    )?;

    tracing::debug!(
        "promo uplift inputs: {} over {} promo days vs {} over {} baseline days",
        promo.total_promo_sales,
        promo.promo_days,
        promo.total_baseline_sales,
        promo.baseline_days
    );

    let outlets: Vec<OutletPerformance> = outlet_rows.into_iter().map(map_outlet).collect();
    let (top_outlets, bottom_outlets) = split_top_bottom(outlets, 5);

    Ok(DashboardResponse {
        kpis: Kpis {
            ytd_sales,
            return_rate,
            growth_percent: growth_percent(ytd_sales, prior_sales),
            oos_rate,
            promo_uplift: promo.uplift_percent,
        },
        channels: channels
            .into_iter()
            .map(|r| ChannelSales {
                channel: r.channel,
                sales: r.sales,
            })
            .collect(),
        sales_forecast: sales_forecast
            .into_iter()
            .map(|r| ForecastPoint {
                week: r.week,
                model: r.model,
                value: r.value,
                lower: r.lower,
                upper: r.upper,
                is_forecast: r.is_forecast,
            })
            .collect(),
        outlet_count,
        sku_count,
        region_list: with_sentinel(ALL_REGIONS, regions),
        channel_list: with_sentinel(ALL_CHANNELS, channel_names),
        forecast_table: forecast_table
            .into_iter()
            .map(|r| ForecastTableRow {
                week: r.week,
                prophet: r.prophet,
                naive_seasonal: r.naive_seasonal,
                sarima: r.sarima,
                sarimax_promo: r.sarimax_promo,
            })
            .collect(),
        achievement_data: achievement_data
            .into_iter()
            .map(|r| RegionAchievement {
                name: r.name,
                total_sales: r.total_sales,
                total_target: r.total_target,
                achievement: r.achievement,
            })
            .collect(),
        return_matrix_data: return_matrix_data
            .into_iter()
            .map(|r| ReturnMatrixCell {
                portfolio: r.portfolio,
                reason: r.reason,
                return_value: r.return_value,
            })
            .collect(),
        top_outlets,
        bottom_outlets,
        top_skus: sku_rows
            .into_iter()
            .map(|r| SkuPerformance {
                sku: r.sku,
                sales: r.sales,
                promo_uplift_percent: r.promo_uplift_percent,
                return_percent: r.return_percent,
                oos_percent: r.oos_percent,
            })
            .collect(),
        watchlist_outlets: watchlist_rows
            .into_iter()
            .map(|r| WatchlistOutlet {
                outlet: r.outlet,
                region: r.region,
                territory: r.territory,
                oos_percent: r.oos_percent,
                growth_percent: r.growth_percent,
                return_percent: r.return_percent,
            })
            .collect(),
        last_updated: Utc::now().to_rfc3339(),
    })
}

fn map_outlet(row: repository::OutletPerformanceRow) -> OutletPerformance {
    OutletPerformance {
        outlet: row.outlet,
        region: row.region,
        territory: row.territory,
        sales: row.sales,
        target: row.target,
        achievement: row.achievement,
        oos_percent: row.oos_percent,
        return_percent: row.return_percent,
        prior_sales: row.prior_sales,
        growth_percent: row.growth_percent,
        last_visit_date: row.last_visit_date,
    }
}

/// YTD growth over the prior year, 0 when there were no prior-year sales
fn growth_percent(ytd_sales: f64, prior_sales: f64) -> f64 {
    if prior_sales > 0.0 {
        (ytd_sales - prior_sales) / prior_sales * 100.0
    } else {
        0.0
    }
}

/// Top/bottom `count` outlets by achievement %. Two independent sorts, not
/// one sort reversed; with fewer than 2 x count outlets the lists overlap.
fn split_top_bottom(
    outlets: Vec<OutletPerformance>,
    count: usize,
) -> (Vec<OutletPerformance>, Vec<OutletPerformance>) {
    let mut top = outlets.clone();
    top.sort_by(|a, b| b.achievement.total_cmp(&a.achievement));
    top.truncate(count);

    let mut bottom = outlets;
    bottom.sort_by(|a, b| a.achievement.total_cmp(&b.achievement));
    bottom.truncate(count);

    (top, bottom)
}

fn with_sentinel(sentinel: &str, values: Vec<String>) -> Vec<String> {
    let mut list = Vec::with_capacity(values.len() + 1);
    list.push(sentinel.to_string());
    list.extend(values);
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outlet(name: &str, achievement: f64) -> OutletPerformance {
        OutletPerformance {
            outlet: name.to_string(),
            region: "Western".to_string(),
            territory: "Colombo".to_string(),
            sales: 0.0,
            target: 0.0,
            achievement,
            oos_percent: 0.0,
            return_percent: 0.0,
            prior_sales: 0.0,
            growth_percent: 0.0,
            last_visit_date: None,
        }
    }

    #[test]
    fn test_growth_percent_is_zero_without_prior_sales() {
        assert_eq!(growth_percent(500.0, 0.0), 0.0);
        assert_eq!(growth_percent(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_growth_percent_computes_relative_change() {
        assert_eq!(growth_percent(110.0, 100.0), 10.0);
        assert_eq!(growth_percent(90.0, 100.0), -10.0);
    }

    #[test]
    fn test_split_top_bottom_sorts_independently() {
        let outlets = vec![
            outlet("a", 80.0),
            outlet("b", 120.0),
            outlet("c", 95.0),
            outlet("d", 140.0),
            outlet("e", 60.0),
            outlet("f", 101.0),
            outlet("g", 99.0),
            outlet("h", 130.0),
            outlet("i", 70.0),
            outlet("j", 110.0),
            outlet("k", 105.0),
        ];

        let (top, bottom) = split_top_bottom(outlets, 5);

        let top_names: Vec<&str> = top.iter().map(|o| o.outlet.as_str()).collect();
        let bottom_names: Vec<&str> = bottom.iter().map(|o| o.outlet.as_str()).collect();
        assert_eq!(top_names, ["d", "h", "b", "j", "k"]);
        assert_eq!(bottom_names, ["e", "i", "a", "c", "g"]);
    }

    #[test]
    fn test_split_top_bottom_overlaps_below_ten_outlets() {
        let outlets = vec![outlet("a", 80.0), outlet("b", 120.0), outlet("c", 95.0)];

        let (top, bottom) = split_top_bottom(outlets, 5);

        // Both lists carry all three outlets, just in opposite orders
        assert_eq!(top.len(), 3);
        assert_eq!(bottom.len(), 3);
        assert_eq!(top[0].outlet, "b");
        assert_eq!(bottom[0].outlet, "a");
    }

    #[test]
    fn test_filter_lists_start_with_sentinel() {
        let regions = with_sentinel(ALL_REGIONS, vec!["Central".to_string(), "Western".to_string()]);
        assert_eq!(regions[0], ALL_REGIONS);
        assert_eq!(regions.len(), 3);

        let channels = with_sentinel(ALL_CHANNELS, Vec::new());
        assert_eq!(channels, [ALL_CHANNELS]);
    }
}
