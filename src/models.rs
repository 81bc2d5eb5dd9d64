// Core data structures for the lead dashboard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string does not name a known enum variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// Lead Source
// ============================================================================

/// Channel a lead was (nominally) discovered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LeadSource {
    Facebook,
    Instagram,
    LinkedIn,
    Google,
    #[default]
    Website,
}

impl LeadSource {
    /// All sources in declaration order
    pub fn all() -> [Self; 5] {
        [
            Self::Facebook,
            Self::Instagram,
            Self::LinkedIn,
            Self::Google,
            Self::Website,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
            Self::LinkedIn => "LinkedIn",
            Self::Google => "Google",
            Self::Website => "Website",
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            "linkedin" => Ok(Self::LinkedIn),
            "google" => Ok(Self::Google),
            "website" => Ok(Self::Website),
            _ => Err(UnknownVariant::new("source", s)),
        }
    }
}

// ============================================================================
// Lead Status
// ============================================================================

/// Pipeline status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Lost,
    Converted,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::Qualified => "Qualified",
            Self::Lost => "Lost",
            Self::Converted => "Converted",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "lost" => Ok(Self::Lost),
            "converted" => Ok(Self::Converted),
            _ => Err(UnknownVariant::new("status", s)),
        }
    }
}

// ============================================================================
// Priority
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(UnknownVariant::new("priority", s)),
        }
    }
}

// ============================================================================
// Property Type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PropertyType {
    #[default]
    Apartment,
    Villa,
    Plot,
    #[serde(rename = "Independent House")]
    IndependentHouse,
    Commercial,
}

impl PropertyType {
    pub fn all() -> [Self; 5] {
        [
            Self::Apartment,
            Self::Villa,
            Self::Plot,
            Self::IndependentHouse,
            Self::Commercial,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apartment => "Apartment",
            Self::Villa => "Villa",
            Self::Plot => "Plot",
            Self::IndependentHouse => "Independent House",
            Self::Commercial => "Commercial",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apartment" => Ok(Self::Apartment),
            "villa" => Ok(Self::Villa),
            "plot" => Ok(Self::Plot),
            "independent house" | "independenthouse" => Ok(Self::IndependentHouse),
            "commercial" => Ok(Self::Commercial),
            _ => Err(UnknownVariant::new("property type", s)),
        }
    }
}

// ============================================================================
// Lead
// ============================================================================

pub const DEFAULT_CITY: &str = "Indore";
pub const DEFAULT_LOCALITY: &str = "Vijay Nagar";

/// A prospective customer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub address: String,
    pub city: String,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub priority: Priority,
    pub price: f64,
    pub property_type: PropertyType,
    pub locality: String,
    pub timestamp: DateTime<Utc>,
}

impl Lead {
    /// Create a lead with a fresh id, the current timestamp and default attributes
    pub fn new(name: impl Into<String>, mobile: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            mobile: mobile.into(),
            address: String::new(),
            city: DEFAULT_CITY.to_string(),
            source: LeadSource::default(),
            status: LeadStatus::default(),
            priority: Priority::default(),
            price: 0.0,
            property_type: PropertyType::default(),
            locality: DEFAULT_LOCALITY.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Copy of this lead carrying a different source; the original is untouched
    pub fn with_source(&self, source: LeadSource) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }
}

/// Payload for creating a lead; missing fields take the model defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub name: String,
    pub mobile: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub source: Option<LeadSource>,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub locality: Option<String>,
}

impl NewLead {
    /// Build the full record, validating required fields
    pub fn into_lead(self) -> Result<Lead, String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.mobile.trim().is_empty() {
            return Err("mobile is required".to_string());
        }
        let price = self.price.unwrap_or(0.0);
        validate_price(price)?;

        let mut lead = Lead::new(self.name.trim(), self.mobile.trim());
        if let Some(address) = self.address {
            lead.address = address;
        }
        if let Some(city) = self.city {
            lead.city = city;
        }
        if let Some(locality) = self.locality {
            lead.locality = locality;
        }
        lead.source = self.source.unwrap_or_default();
        lead.status = self.status.unwrap_or_default();
        lead.priority = self.priority.unwrap_or_default();
        lead.property_type = self.property_type.unwrap_or_default();
        lead.price = price;
        Ok(lead)
    }
}

/// Partial update; only present fields are applied
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdate {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    pub priority: Option<Priority>,
    pub price: Option<f64>,
    pub property_type: Option<PropertyType>,
    pub locality: Option<String>,
}

impl LeadUpdate {
    /// Apply onto an existing record; `timestamp` and `id` never change
    pub fn apply(self, lead: &mut Lead) -> Result<(), String> {
        if let Some(price) = self.price {
            validate_price(price)?;
            lead.price = price;
        }
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err("name cannot be empty".to_string());
            }
            lead.name = name;
        }
        if let Some(mobile) = self.mobile {
            if mobile.trim().is_empty() {
                return Err("mobile cannot be empty".to_string());
            }
            lead.mobile = mobile;
        }
        if let Some(address) = self.address {
            lead.address = address;
        }
        if let Some(city) = self.city {
            lead.city = city;
        }
        if let Some(locality) = self.locality {
            lead.locality = locality;
        }
        if let Some(source) = self.source {
            lead.source = source;
        }
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(priority) = self.priority {
            lead.priority = priority;
        }
        if let Some(property_type) = self.property_type {
            lead.property_type = property_type;
        }
        Ok(())
    }
}

fn validate_price(price: f64) -> Result<(), String> {
    if !price.is_finite() || price < 0.0 {
        return Err(format!("price must be a non-negative number, got {price}"));
    }
    Ok(())
}

// ============================================================================
// Listing
// ============================================================================

/// Filter and pagination parameters for lead listings
#[derive(Debug, Clone, Deserialize)]
pub struct LeadQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub source: Option<LeadSource>,
}

/// Query strings send `priority=` for "any"; treat blank values as absent
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
            priority: None,
            source: None,
        }
    }
}

impl LeadQuery {
    pub const MAX_LIMIT: u32 = 100;

    /// Page clamped to at least 1
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Limit clamped to [1, MAX_LIMIT]
    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    /// Non-empty, trimmed search term
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether a lead satisfies the filters (used by in-memory stores)
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(priority) = self.priority {
            if lead.priority != priority {
                return false;
            }
        }
        if let Some(source) = self.source {
            if lead.source != source {
                return false;
            }
        }
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            return [&lead.name, &lead.mobile, &lead.address]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
        }
        true
    }
}

/// One page of a lead listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPage {
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
    pub leads: Vec<Lead>,
}

impl LeadPage {
    pub fn new(total: u64, query: &LeadQuery, leads: Vec<Lead>) -> Self {
        Self {
            total,
            page: query.page(),
            total_pages: total.div_ceil(u64::from(query.limit())),
            leads,
        }
    }
}
