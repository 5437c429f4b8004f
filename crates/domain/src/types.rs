//! Shared Graph API enums
//!
//! String-typed values the Graph API accepts for campaign, ad set, ad,
//! audience and insights parameters. Handlers deserialize user input into
//! these enums to reject invalid values before a request is ever issued.

use serde::{Deserialize, Serialize};

/// Meta campaign objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignObjective {
    OutcomeAwareness,
    OutcomeEngagement,
    OutcomeLeads,
    OutcomeSales,
    OutcomeTraffic,
    OutcomeAppPromotion,
}

/// Campaign / ad set / ad status (writable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Paused,
    Deleted,
    Archived,
}

/// Effective status (read-only, computed by Meta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectiveStatus {
    Active,
    Paused,
    Deleted,
    Archived,
    InProcess,
    WithIssues,
    PendingReview,
    Disapproved,
    Preapproved,
    PendingBillingInfo,
    CampaignPaused,
    AdsetPaused,
}

/// Campaign bid strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStrategy {
    LowestCostWithoutCap,
    LowestCostWithBidCap,
    CostCap,
    LowestCostWithMinRoas,
}

/// Ad set optimization goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationGoal {
    None,
    AppInstalls,
    AdRecallLift,
    EngagedUsers,
    EventResponses,
    Impressions,
    LeadGeneration,
    QualityLead,
    LinkClicks,
    OffsiteConversions,
    PageLikes,
    PostEngagement,
    QualityCall,
    Reach,
    LandingPageViews,
    VisitInstagramProfile,
    Value,
    Thruplay,
    DerivedEvents,
    Conversations,
}

/// Ad set billing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingEvent {
    AppInstalls,
    Clicks,
    Impressions,
    LinkClicks,
    None,
    OfferClaims,
    PageLikes,
    PostEngagement,
    Thruplay,
    ListingInteraction,
}

/// Insights date presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePreset {
    Today,
    Yesterday,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    LastQuarter,
    ThisWeekSunToday,
    ThisWeekMonToday,
    LastWeekSunSat,
    LastWeekMonSun,
    ThisYear,
    LastYear,
    #[serde(rename = "last_3d")]
    Last3d,
    #[serde(rename = "last_7d")]
    Last7d,
    #[serde(rename = "last_14d")]
    Last14d,
    #[serde(rename = "last_28d")]
    Last28d,
    #[serde(rename = "last_30d")]
    Last30d,
    #[serde(rename = "last_90d")]
    Last90d,
    Lifetime,
    Maximum,
}

/// Insights aggregation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightsLevel {
    Account,
    Campaign,
    Adset,
    Ad,
}

/// Custom audience subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudienceSubtype {
    Custom,
    Website,
    App,
    Offline,
    Claim,
    Partner,
    Managed,
    Video,
    Lookalike,
    Engagement,
}

/// Available breakdowns for insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightsBreakdown {
    Age,
    Gender,
    Country,
    Region,
    #[serde(rename = "publisher_platform")]
    Placement,
    #[serde(rename = "device_platform")]
    Device,
    ImpressionDevice,
}
