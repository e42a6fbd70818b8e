mod config;
pub mod label;

use log::{debug, info, warn};

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

pub use crate::config::*;
pub use crate::label::LabelRules;

// ********* Input data structures ***********

/// The vote totals of the two tracked candidates in one province.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExtractedRecord {
    pub province: String,
    pub votes_a: u64,
    pub votes_b: u64,
}

impl ExtractedRecord {
    pub fn total_votes(&self) -> u64 {
        self.votes_a.saturating_add(self.votes_b)
    }
}

/// The records collected from a batch of documents, at most one per province.
///
/// Iteration follows the alphabetical order of the province labels, which
/// keeps the downstream table independent of the directory listing order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ProvinceRecords {
    records: BTreeMap<String, ExtractedRecord>,
}

impl ProvinceRecords {
    pub fn new() -> ProvinceRecords {
        ProvinceRecords {
            records: BTreeMap::new(),
        }
    }

    /// Adds a record. A record already present for the same province is
    /// replaced and returned.
    pub fn insert(&mut self, record: ExtractedRecord) -> Option<ExtractedRecord> {
        self.records.insert(record.province.clone(), record)
    }

    pub fn get(&self, province: &str) -> Option<&ExtractedRecord> {
        self.records.get(province)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedRecord> {
        self.records.values()
    }
}

impl FromIterator<ExtractedRecord> for ProvinceRecords {
    fn from_iter<I: IntoIterator<Item = ExtractedRecord>>(iter: I) -> Self {
        let mut res = ProvinceRecords::new();
        for r in iter {
            res.insert(r);
        }
        res
    }
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone)]
pub struct SummaryRow {
    pub province: String,
    pub votes_a: u64,
    pub votes_b: u64,
    pub reference_count: u64,
    /// The reference count as a percentage of the votes of both candidates,
    /// rounded to two decimals.
    pub derived_percent: f64,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SummaryRow> {
        self.rows.iter()
    }

    /// The row with the highest derived percent. On ties, the first such row wins.
    pub fn max_row(&self) -> Option<&SummaryRow> {
        let mut best: Option<&SummaryRow> = None;
        for row in self.rows.iter() {
            match best {
                Some(b) if b.derived_percent >= row.derived_percent => {}
                _ => best = Some(row),
            }
        }
        best
    }
}

/// Errors that prevent the aggregation from completing successfully.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyErrors {
    /// No province survived matching and filtering.
    EmptyResult,
}

impl Error for TallyErrors {}

impl Display for TallyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyErrors::EmptyResult => write!(
                f,
                "no province had both candidates matched: the summary table is empty"
            ),
        }
    }
}

/// Rounds to two decimal places.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `reference_count / total_votes * 100`, rounded to two decimals.
/// Defined as 0 when there are no votes.
pub fn derived_percent(reference_count: u64, total_votes: u64) -> f64 {
    if total_votes == 0 {
        return 0.0;
    }
    round2(reference_count as f64 / total_votes as f64 * 100.0)
}

/// Joins the extracted records against the reference table.
///
/// Arguments:
/// * `records` the vote totals, one per province
/// * `reference` the population counts. Provinces missing from it get a count of 0.
///
/// Provinces whose label still contains a year are dropped: they come from
/// file names that did not match the expected pattern.
pub fn aggregate(
    records: &ProvinceRecords,
    reference: &ReferenceTable,
) -> Result<SummaryTable, TallyErrors> {
    info!(
        "aggregate: processing {:?} records against {:?} reference entries",
        records.len(),
        reference.len()
    );
    let mut rows: Vec<SummaryRow> = Vec::new();
    for record in records.iter() {
        if label::has_year_token(&record.province) {
            debug!("aggregate: dropping malformed label {:?}", record.province);
            continue;
        }
        let province = label::title_case(&record.province);
        let reference_count = match reference.lookup(&province) {
            Some(c) => c,
            None => {
                warn!("aggregate: no reference count for {}, using 0", province);
                0
            }
        };
        let row = SummaryRow {
            derived_percent: derived_percent(reference_count, record.total_votes()),
            province,
            votes_a: record.votes_a,
            votes_b: record.votes_b,
            reference_count,
        };
        debug!("aggregate: row {:?}", row);
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(TallyErrors::EmptyResult);
    }
    info!("aggregate: {} rows in the summary table", rows.len());
    Ok(SummaryTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn record(province: &str, votes_a: u64, votes_b: u64) -> ExtractedRecord {
        ExtractedRecord {
            province: province.to_string(),
            votes_a,
            votes_b,
        }
    }

    fn reference(entries: &[(&str, u64)]) -> ReferenceTable {
        entries
            .iter()
            .map(|(n, c)| (n.to_string(), *c))
            .collect()
    }

    #[test]
    fn percent_of_total_votes() {
        init();
        let records: ProvinceRecords = vec![record("Azuay", 1234567, 1500000)]
            .into_iter()
            .collect();
        let table = aggregate(&records, &reference(&[("Azuay", 10000)])).unwrap();
        assert_eq!(table.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.votes_a, 1234567);
        assert_eq!(row.votes_b, 1500000);
        assert_eq!(row.reference_count, 10000);
        assert_eq!(row.derived_percent, 0.37);
    }

    #[test]
    fn percent_matches_rounded_ratio() {
        let cases: &[(u64, u64, u64)] = &[(92210, 300000, 250000), (1, 3, 0), (437488, 1, 1)];
        for (count, a, b) in cases {
            let expected = round2(*count as f64 / (a + b) as f64 * 100.0);
            assert_eq!(derived_percent(*count, a + b), expected);
        }
    }

    #[test]
    fn zero_votes_is_zero_percent() {
        init();
        let records: ProvinceRecords = vec![record("Guayas", 0, 0)].into_iter().collect();
        let table = aggregate(&records, &reference(&[("Guayas", 437488)])).unwrap();
        assert_eq!(table.rows[0].derived_percent, 0.0);
    }

    #[test]
    fn missing_reference_defaults_to_zero() {
        init();
        let records: ProvinceRecords = vec![record("Loja", 100, 200)].into_iter().collect();
        let table = aggregate(&records, &ReferenceTable::elderly_population_2025()).unwrap();
        assert_eq!(table.rows[0].reference_count, 0);
        assert_eq!(table.rows[0].derived_percent, 0.0);
    }

    #[test]
    fn join_is_title_cased() {
        init();
        let records: ProvinceRecords = vec![record("LOS RIOS", 50000, 50000)].into_iter().collect();
        let table = aggregate(&records, &ReferenceTable::elderly_population_2025()).unwrap();
        assert_eq!(table.rows[0].province, "Los Rios");
        assert_eq!(table.rows[0].reference_count, 88121);
        assert_eq!(table.rows[0].derived_percent, 88.12);
    }

    #[test]
    fn labels_with_years_are_dropped() {
        init();
        let records: ProvinceRecords = vec![
            record("Azuay", 10, 10),
            record("Resultados 2025 Guayas", 10, 10),
        ]
        .into_iter()
        .collect();
        let table = aggregate(&records, &ReferenceTable::elderly_population_2025()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.iter().all(|r| !label::has_year_token(&r.province)));
    }

    #[test]
    fn empty_result() {
        init();
        let empty = ProvinceRecords::new();
        assert_eq!(
            aggregate(&empty, &ReferenceTable::new()),
            Err(TallyErrors::EmptyResult)
        );
        let only_years: ProvinceRecords = vec![record("2025", 1, 1)].into_iter().collect();
        assert_eq!(
            aggregate(&only_years, &ReferenceTable::new()),
            Err(TallyErrors::EmptyResult)
        );
    }

    #[test]
    fn rows_follow_province_order() {
        init();
        let records: ProvinceRecords = vec![
            record("Pichincha", 1, 1),
            record("Azuay", 1, 1),
            record("Manabi", 1, 1),
        ]
        .into_iter()
        .collect();
        let table = aggregate(&records, &ReferenceTable::new()).unwrap();
        let names: Vec<&str> = table.iter().map(|r| r.province.as_str()).collect();
        assert_eq!(names, vec!["Azuay", "Manabi", "Pichincha"]);
    }

    #[test]
    fn later_record_replaces_earlier() {
        let mut records = ProvinceRecords::new();
        assert_eq!(records.insert(record("Azuay", 1, 1)), None);
        let previous = records.insert(record("Azuay", 2, 2));
        assert_eq!(previous, Some(record("Azuay", 1, 1)));
        assert_eq!(records.len(), 1);
        assert_eq!(records.get("Azuay"), Some(&record("Azuay", 2, 2)));
    }

    #[test]
    fn max_row_picks_highest_percent() {
        init();
        let records: ProvinceRecords = vec![record("Azuay", 100, 100), record("Guayas", 100, 100)]
            .into_iter()
            .collect();
        // 10 / 200 = 5%, 25 / 200 = 12.5%
        let table = aggregate(&records, &reference(&[("Azuay", 10), ("Guayas", 25)])).unwrap();
        let best = table.max_row().unwrap();
        assert_eq!(best.province, "Guayas");
        assert_eq!(best.derived_percent, 12.5);
        assert_eq!(SummaryTable::default().max_row(), None);
    }

    #[test]
    fn max_row_ties_keep_first() {
        let row = |p: &str| SummaryRow {
            province: p.to_string(),
            votes_a: 1,
            votes_b: 1,
            reference_count: 1,
            derived_percent: 50.0,
        };
        let table = SummaryTable {
            rows: vec![row("Azuay"), row("Guayas")],
        };
        assert_eq!(table.max_row().unwrap().province, "Azuay");
    }
}
