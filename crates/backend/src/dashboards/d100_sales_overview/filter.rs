use sea_orm::Value;

pub const ALL_REGIONS: &str = "All Regions";
pub const ALL_CHANNELS: &str = "All Channels";

/// Normalized region/channel filters for the sales overview dashboard.
///
/// A value equal to its "All ..." sentinel, an empty string, or an absent
/// parameter all collapse to `None` and contribute neither a WHERE predicate
/// nor a bind parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardFilter {
    region: Option<String>,
    channel: Option<String>,
}

impl DashboardFilter {
    pub fn new(region: Option<String>, channel: Option<String>) -> Self {
        Self {
            region: normalize(region, ALL_REGIONS),
            channel: normalize(channel, ALL_CHANNELS),
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Positional bind parameters in the fixed order [region?, channel?].
    ///
    /// Every query of the battery is executed with this same flat array, so
    /// the parameter indexes handed out by [`WhereClause::with_filter`] stay
    /// valid across all query families.
    pub fn params(&self) -> Vec<Value> {
        let mut params = Vec::new();
        if let Some(region) = &self.region {
            params.push(region.clone().into());
        }
        if let Some(channel) = &self.channel {
            params.push(channel.clone().into());
        }
        params
    }

    fn region_index(&self) -> Option<usize> {
        self.region.as_ref().map(|_| 1)
    }

    fn channel_index(&self) -> Option<usize> {
        self.channel
            .as_ref()
            .map(|_| if self.region.is_some() { 2 } else { 1 })
    }
}

fn normalize(value: Option<String>, sentinel: &str) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != sentinel)
}

/// One WHERE predicate of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Condition baked into the query text, e.g. `fiscal_year = 2024`.
    Fixed(&'static str),
    /// Equality against a positional bind parameter, rendered `column = $n`.
    Bound { column: String, index: usize },
}

impl Predicate {
    fn render(&self) -> String {
        match self {
            Predicate::Fixed(condition) => (*condition).to_string(),
            Predicate::Bound { column, index } => format!("{column} = ${index}"),
        }
    }
}

/// WHERE clause of one query family: its fixed conditions plus the optional
/// region/channel predicates bound to the shared parameter array.
///
/// Each family references the filter columns under its own alias (bare
/// `region` on the sales table, `om.region` for outlet-joined queries,
/// `st.region` inside promotion CTEs), so the aliases are supplied per call.
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    predicates: Vec<Predicate>,
}

impl WhereClause {
    pub fn new(fixed: &[&'static str]) -> Self {
        Self {
            predicates: fixed.iter().map(|c| Predicate::Fixed(*c)).collect(),
        }
    }

    pub fn with_filter(
        mut self,
        filter: &DashboardFilter,
        region_col: &str,
        channel_col: &str,
    ) -> Self {
        if let Some(index) = filter.region_index() {
            self.predicates.push(Predicate::Bound {
                column: region_col.to_string(),
                index,
            });
        }
        if let Some(index) = filter.channel_index() {
            self.predicates.push(Predicate::Bound {
                column: channel_col.to_string(),
                index,
            });
        }
        self
    }

    /// Renders `WHERE a AND b`, or an empty string without predicates.
    pub fn to_where_sql(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.join())
        }
    }

    /// Renders `AND a AND b` for splicing into a clause that already carries
    /// a WHERE of its own.
    pub fn to_and_sql(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!("AND {}", self.join())
        }
    }

    fn join(&self) -> String {
        self.predicates
            .iter()
            .map(Predicate::render)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filters_produce_no_params_and_no_clauses() {
        let filter = DashboardFilter::new(None, None);
        assert!(filter.params().is_empty());

        let clause = WhereClause::new(&[]).with_filter(&filter, "region", "channel");
        assert_eq!(clause.to_where_sql(), "");
        assert_eq!(clause.to_and_sql(), "");
    }

    #[test]
    fn test_sentinel_and_empty_values_mean_no_filter() {
        let filter = DashboardFilter::new(
            Some(ALL_REGIONS.to_string()),
            Some(String::new()),
        );
        assert_eq!(filter, DashboardFilter::new(None, None));
        assert!(filter.params().is_empty());

        let filter = DashboardFilter::new(None, Some(ALL_CHANNELS.to_string()));
        assert!(filter.channel().is_none());
    }

    #[test]
    fn test_region_only_binds_one_param_at_index_one() {
        let filter = DashboardFilter::new(Some("Western".to_string()), None);
        assert_eq!(filter.params().len(), 1);

        let clause = WhereClause::new(&["fiscal_year = 2024"])
            .with_filter(&filter, "region", "channel");
        assert_eq!(
            clause.to_where_sql(),
            "WHERE fiscal_year = 2024 AND region = $1"
        );

        // Outlet-joined families reuse the same index under their alias
        let clause = WhereClause::new(&[]).with_filter(&filter, "om.region", "om.channel");
        assert_eq!(clause.to_where_sql(), "WHERE om.region = $1");
    }

    #[test]
    fn test_channel_only_binds_index_one() {
        let filter = DashboardFilter::new(None, Some("Supermarket".to_string()));
        assert_eq!(filter.params().len(), 1);

        let clause = WhereClause::new(&[]).with_filter(&filter, "region", "channel");
        assert_eq!(clause.to_where_sql(), "WHERE channel = $1");
    }

    #[test]
    fn test_both_filters_bind_region_then_channel() {
        let filter = DashboardFilter::new(
            Some("Western".to_string()),
            Some("Supermarket".to_string()),
        );
        assert_eq!(filter.params().len(), 2);

        let clause = WhereClause::new(&["st.fiscal_year = 2024", "st.return_flag = 0"])
            .with_filter(&filter, "st.region", "st.channel");
        assert_eq!(
            clause.to_where_sql(),
            "WHERE st.fiscal_year = 2024 AND st.return_flag = 0 AND st.region = $1 AND st.channel = $2"
        );
        assert_eq!(
            clause.to_and_sql(),
            "AND st.fiscal_year = 2024 AND st.return_flag = 0 AND st.region = $1 AND st.channel = $2"
        );
    }

    #[test]
    fn test_fixed_only_clause_renders_without_params() {
        let filter = DashboardFilter::new(None, None);
        let clause = WhereClause::new(&["status = 'Active'"])
            .with_filter(&filter, "region", "channel");
        assert_eq!(clause.to_where_sql(), "WHERE status = 'Active'");
    }
}
