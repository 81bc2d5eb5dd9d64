//! Bulk lead ingestion from CSV exports and store-to-store copies

use std::collections::HashSet;
use std::io::Read;

use rand::seq::SliceRandom;
use rand::Rng;

use super::{LeadRepository, StorageError, StorageResult};
use crate::models::{Lead, LeadSource, PropertyType, DEFAULT_CITY, DEFAULT_LOCALITY};

/// Localities assigned to imported leads
pub const LOCALITIES: [&str; 10] = [
    "Vijay Nagar",
    "Palasia",
    "Bypass Road",
    "Rau",
    "LIG Colony",
    "Scheme 54",
    "Scheme 78",
    "MR 10",
    "AB Road",
    "Nipania",
];

/// Inclusive price bands in rupees, one picked uniformly per lead
pub const PRICE_BANDS: [(u64, u64); 5] = [
    (2_000_000, 5_000_000),
    (5_000_000, 10_000_000),
    (10_000_000, 20_000_000),
    (20_000_000, 50_000_000),
    (50_000_000, 100_000_000),
];

/// Outcome of parsing a CSV export
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub leads: Vec<Lead>,
    /// Rows missing a name or mobile
    pub skipped_incomplete: usize,
    /// Rows whose name was already seen
    pub skipped_duplicate: usize,
}

/// Parse `name,mobile,address,city` rows; the first row is a header
///
/// Each accepted row gets a random source, price, property type and
/// locality. Zero accepted rows is an error.
pub fn parse_leads_csv<R: Read, G: Rng>(reader: R, rng: &mut G) -> StorageResult<ImportReport> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut report = ImportReport::default();
    let mut seen_names = HashSet::new();

    for (index, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| {
            StorageError::validation(format!("row {}: {}", index + 2, e))
        })?;

        let name = record.get(0).unwrap_or_default();
        let mobile = record.get(1).unwrap_or_default();
        if name.is_empty() || mobile.is_empty() {
            report.skipped_incomplete += 1;
            continue;
        }
        if !seen_names.insert(name.to_string()) {
            report.skipped_duplicate += 1;
            continue;
        }

        let mut lead = Lead::new(name, mobile);
        lead.address = record.get(2).unwrap_or_default().to_string();
        lead.city = record
            .get(3)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CITY)
            .to_string();
        randomize_listing(&mut lead, rng);
        report.leads.push(lead);
    }

    if report.leads.is_empty() {
        return Err(StorageError::validation("no valid leads found in CSV input"));
    }

    Ok(report)
}

/// Assign source, price band, property type and locality at random
pub fn randomize_listing<G: Rng>(lead: &mut Lead, rng: &mut G) {
    lead.source = *LeadSource::all()
        .choose(rng)
        .unwrap_or(&LeadSource::Website);
    let (low, high) = *PRICE_BANDS.choose(rng).unwrap_or(&PRICE_BANDS[0]);
    lead.price = rng.gen_range(low..=high) as f64;
    lead.property_type = *PropertyType::all()
        .choose(rng)
        .unwrap_or(&PropertyType::Apartment);
    lead.locality = LOCALITIES
        .choose(rng)
        .copied()
        .unwrap_or(DEFAULT_LOCALITY)
        .to_string();
}

/// Replace every lead in `target` with the leads of `source`
pub async fn sync_stores(
    source: &dyn LeadRepository,
    target: &dyn LeadRepository,
) -> StorageResult<usize> {
    let leads = source.fetch_all().await?;
    tracing::info!(count = leads.len(), "found leads in source store");
    let written = target.replace_all(&leads).await?;
    tracing::info!(count = written, "target store replaced");
    Ok(written)
}
