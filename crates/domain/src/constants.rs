//! Graph API constants and default field selections

/// Graph API version every request is pinned to.
pub const META_API_VERSION: &str = "v23.0";

/// Default Graph API base URL (overridable through configuration for tests).
pub fn default_graph_url() -> String {
    format!("https://graph.facebook.com/{META_API_VERSION}")
}

/// OAuth dialog host (the token exchange itself goes through the Graph URL).
pub const FACEBOOK_OAUTH_HOST: &str = "https://www.facebook.com";

/// OAuth scopes requested when none are specified.
pub const DEFAULT_OAUTH_SCOPES: &[&str] = &["ads_management", "ads_read", "business_management"];

/// Default fields when fetching campaigns.
pub const DEFAULT_CAMPAIGN_FIELDS: &[&str] = &[
    "id",
    "name",
    "objective",
    "status",
    "effective_status",
    "daily_budget",
    "lifetime_budget",
    "budget_remaining",
    "start_time",
    "stop_time",
    "created_time",
    "updated_time",
    "bid_strategy",
    "special_ad_categories",
];

/// Default fields for ad sets.
pub const DEFAULT_ADSET_FIELDS: &[&str] = &[
    "id",
    "name",
    "campaign_id",
    "status",
    "effective_status",
    "daily_budget",
    "lifetime_budget",
    "budget_remaining",
    "optimization_goal",
    "billing_event",
    "bid_amount",
    "start_time",
    "end_time",
    "targeting",
    "created_time",
];

/// Default fields for ads.
pub const DEFAULT_AD_FIELDS: &[&str] = &[
    "id",
    "name",
    "adset_id",
    "campaign_id",
    "status",
    "effective_status",
    "created_time",
    "updated_time",
    "creative",
];

/// Default fields for creatives.
pub const DEFAULT_CREATIVE_FIELDS: &[&str] = &[
    "id",
    "name",
    "title",
    "body",
    "image_url",
    "video_id",
    "call_to_action_type",
    "object_story_spec",
    "thumbnail_url",
    "status",
];

/// Default fields for custom audiences.
pub const DEFAULT_AUDIENCE_FIELDS: &[&str] = &[
    "id",
    "name",
    "subtype",
    "description",
    "approximate_count",
    "operation_status",
    "delivery_status",
    "retention_days",
    "time_created",
    "time_updated",
];

/// Default metrics for insights queries.
pub const DEFAULT_INSIGHTS_FIELDS: &[&str] = &[
    "impressions",
    "clicks",
    "spend",
    "ctr",
    "cpc",
    "cpm",
    "reach",
    "frequency",
    "actions",
    "cost_per_action_type",
    "conversions",
    "cost_per_conversion",
];

/// Default fields when listing ad accounts.
pub const DEFAULT_ACCOUNT_FIELDS: &[&str] =
    &["id", "name", "account_status", "currency", "timezone_name", "business"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_url_carries_the_pinned_version() {
        assert_eq!(default_graph_url(), "https://graph.facebook.com/v23.0");
    }
}
