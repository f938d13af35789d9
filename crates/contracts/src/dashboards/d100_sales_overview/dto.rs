use serde::{Deserialize, Serialize};

/// Request for the sales overview dashboard.
///
/// Both filters are optional; the sentinel values "All Regions" /
/// "All Channels" (or an empty string) mean "no filter".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardRequest {
    pub region: Option<String>,
    pub channel: Option<String>,
}

/// Full response for the sales overview dashboard.
///
/// This is the wire contract consumed verbatim by the presentation layer;
/// key names are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub kpis: Kpis,
    /// Sales by channel, ordered by sales descending
    pub channels: Vec<ChannelSales>,
    /// Actual + forecast weekly series for the main chart
    pub sales_forecast: Vec<ForecastPoint>,
    pub outlet_count: i64,
    pub sku_count: i64,
    /// Distinct regions, prefixed with the "All Regions" sentinel
    pub region_list: Vec<String>,
    /// Distinct channels, prefixed with the "All Channels" sentinel
    pub channel_list: Vec<String>,
    pub forecast_table: Vec<ForecastTableRow>,
    pub achievement_data: Vec<RegionAchievement>,
    pub return_matrix_data: Vec<ReturnMatrixCell>,
    /// Top 5 outlets by achievement %, descending
    pub top_outlets: Vec<OutletPerformance>,
    /// Bottom 5 outlets by achievement %, ascending
    pub bottom_outlets: Vec<OutletPerformance>,
    /// Top 20 SKUs by sales
    pub top_skus: Vec<SkuPerformance>,
    pub watchlist_outlets: Vec<WatchlistOutlet>,
    /// Wall-clock time the response was assembled (RFC 3339), not a
    /// data-freshness timestamp
    pub last_updated: String,
}

/// Headline KPI card values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub ytd_sales: f64,
    pub return_rate: f64,
    pub growth_percent: f64,
    pub oos_rate: f64,
    pub promo_uplift: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSales {
    pub channel: String,
    pub sales: f64,
}

/// One point of the weekly actual/forecast series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub week: String,
    pub model: String,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    #[serde(rename = "isForecast")]
    pub is_forecast: bool,
}

/// One row of the 8-week model-comparison table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastTableRow {
    pub week: String,
    pub prophet: f64,
    pub naive_seasonal: f64,
    pub sarima: f64,
    pub sarimax_promo: f64,
}

/// Sales vs. target rollup for one region
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionAchievement {
    pub name: String,
    pub total_sales: f64,
    pub total_target: f64,
    pub achievement: f64,
}

/// Share of a portfolio's returned quantity attributed to one reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnMatrixCell {
    pub portfolio: String,
    pub reason: String,
    pub return_value: f64,
}

/// Per-outlet scorecard row (top/bottom tables)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletPerformance {
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

/// Per-SKU scorecard row (top SKUs table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuPerformance {
    pub sku: String,
    pub sales: f64,
    pub promo_uplift_percent: f64,
    pub return_percent: f64,
    pub oos_percent: f64,
}

/// Outlet flagged by the execution-risk rule:
/// OOS% > 10 AND (growth% < 0 OR return% > 2.5)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistOutlet {
    pub outlet: String,
    pub region: String,
    pub territory: String,
    pub oos_percent: f64,
    pub growth_percent: f64,
    pub return_percent: f64,
}

/// Body of every 500 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_keys_are_camel_case() {
        let response = DashboardResponse {
            kpis: Kpis {
                ytd_sales: 100.0,
                return_rate: 1.5,
                growth_percent: 10.0,
                oos_rate: 4.2,
                promo_uplift: 12.0,
            },
            channels: vec![],
            sales_forecast: vec![ForecastPoint {
                week: "2024-01-07".to_string(),
                model: "Actual".to_string(),
                value: 1.0,
                lower: None,
                upper: None,
                is_forecast: false,
            }],
            outlet_count: 3,
            sku_count: 7,
            region_list: vec!["All Regions".to_string()],
            channel_list: vec!["All Channels".to_string()],
            forecast_table: vec![],
            achievement_data: vec![],
            return_matrix_data: vec![],
            top_outlets: vec![],
            bottom_outlets: vec![],
            top_skus: vec![],
            watchlist_outlets: vec![],
            last_updated: "2024-06-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        for key in [
            "kpis",
            "channels",
            "salesForecast",
            "outletCount",
            "skuCount",
            "regionList",
            "channelList",
            "forecastTable",
            "achievementData",
            "returnMatrixData",
            "topOutlets",
            "bottomOutlets",
            "topSkus",
            "watchlistOutlets",
            "lastUpdated",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["kpis"]["ytdSales"], 100.0);
        assert_eq!(json["salesForecast"][0]["isForecast"], false);
    }

    #[test]
    fn test_outlet_row_keeps_snake_case_fields() {
        let row = OutletPerformance {
            outlet: "Keells Nugegoda".to_string(),
            region: "Western".to_string(),
            territory: "Colombo South".to_string(),
            sales: 125_000.0,
            target: 100_000.0,
            achievement: 125.0,
            oos_percent: 6.0,
            return_percent: 1.2,
            prior_sales: 110_000.0,
            growth_percent: 13.6,
            last_visit_date: Some("2024-06-12".to_string()),
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["oos_percent"], 6.0);
        assert_eq!(json["return_percent"], 1.2);
        assert_eq!(json["last_visit_date"], "2024-06-12");
    }

    #[test]
    fn test_request_accepts_missing_filters() {
        let request: DashboardRequest = serde_json::from_str("{}").unwrap();
        assert!(request.region.is_none());
        assert!(request.channel.is_none());
    }
}
