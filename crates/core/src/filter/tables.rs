//! Built-in field exclusion tables.
//!
//! Names are matched lowercase. Core fields are always written when the
//! destination declares them, even though the vendor defines them.

pub(crate) const CONTACT_CORE_FIELDS: &[&str] = &[
    "email", "firstname", "lastname", "phone", "mobilephone", "company", "jobtitle", "website",
    "address", "city", "state", "zip", "country", "lifecyclestage",
];

pub(crate) const COMPANY_CORE_FIELDS: &[&str] = &[
    "name", "domain", "phone", "website", "address", "city", "state", "zip", "country",
    "industry", "description", "numberofemployees", "annualrevenue", "lifecyclestage",
];

pub(crate) const DEAL_CORE_FIELDS: &[&str] =
    &["dealname", "amount", "closedate", "dealtype", "dealstage", "pipeline", "description"];

pub(crate) const TICKET_CORE_FIELDS: &[&str] = &[
    "subject", "content", "hs_pipeline", "hs_pipeline_stage", "hs_ticket_priority",
    "hs_ticket_category",
];

pub(crate) const READONLY_EXACT_FIELDS: &[&str] = &[
    "createdate", "lastmodifieddate", "hs_lastmodifieddate", "hs_object_id",
    "first_deal_created_date", "recent_conversion_date", "first_conversion_date",
    "recent_conversion_event_name", "first_conversion_event_name", "num_conversion_events",
    "num_unique_conversion_events", "days_to_close",
];

pub(crate) const DEAL_READONLY_EXACT_FIELDS: &[&str] = &[
    "hs_deal_id", "num_contacted_notes", "num_notes", "dealid", "deal_id", "closed_won_count",
    "closed_lost_count", "recent_deal_close_date",
];

/// Identifiers that only make sense inside the portal that issued them.
pub(crate) const PRODUCTION_IDENTIFIERS: &[&str] = &[
    "associatedcompanyid", "associatedcompanyids", "associatedvids", "hubspot_owner_id",
    "hubspot_team_id", "hubspot_owner_assigneddate", "hs_all_owner_ids", "hs_all_team_ids",
    "hs_created_by_user_id", "hs_updated_by_user_id", "hs_object_source_user_id",
    "hs_contact_creation_legal_basis_source_instance_id", "hs_facebook_click_id",
    "hs_google_click_id", "hs_first_closed_order_id", "hs_first_engagement_object_id",
    "hs_marketable_reason_id", "hs_object_source_id", "hs_source_object_id",
    "hs_source_portal_id", "hs_pinned_engagement_id",
];

pub(crate) const ANALYTICS_FIELDS: &[&str] = &[
    "ip_city", "ip_country", "ip_country_code", "ip_state", "ip_state_code", "ip_zipcode",
    "ip_latlon", "hs_analytics_source", "hs_analytics_source_data_1",
    "hs_analytics_source_data_2",
];

pub(crate) const SYSTEM_PREFIXES: &[&str] = &[
    "hs_additional_", "hs_all_", "hs_analytics_", "hs_associated_", "hs_avatar_", "hs_buying_",
    "hs_calculated_", "hs_clicked_", "hs_closed_", "hs_contact_", "hs_content_",
    "hs_conversations_", "hs_count_", "hs_created_", "hs_createdate_", "hs_cross_",
    "hs_currently_", "hs_customer_", "hs_data_", "hs_deal_", "hs_document_", "hs_email_",
    "hs_enriched_", "hs_first_", "hs_forecast_", "hs_full_", "hs_has_", "hs_inferred_",
    "hs_intent_", "hs_ip_", "hs_is_", "hs_last_", "hs_lastmodifieddate_", "hs_latest_",
    "hs_lead_", "hs_likelihood_", "hs_merged_", "hs_next_", "hs_notes_", "hs_object_",
    "hs_owning_", "hs_pinned_", "hs_pipeline_", "hs_predictive_", "hs_predictivecontactscore_",
    "hs_projected_", "hs_read_", "hs_recent_", "hs_sa_", "hs_sales_", "hs_searchable_",
    "hs_sequences_", "hs_shared_", "hs_social_", "hs_source_", "hs_time_", "hs_timezone_",
    "hs_unique_", "hs_updated_", "hs_user_", "hs_v2_", "hs_was_",
];

pub(crate) const READONLY_PREFIXES: &[&str] = &["num_", "first_", "recent_", "last_", "total_"];

pub(crate) const DEAL_READONLY_PREFIXES: &[&str] =
    &["count_", "days_", "closed_", "hs_closed_", "hs_days_"];
