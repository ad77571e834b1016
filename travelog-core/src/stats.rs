//! Derived statistics over the entry list.
//!
//! Everything here is a pure function of its arguments and is recomputed on
//! every call.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::dates::{parse_day, year_month_label};
use crate::entry::{Entry, RatingSort, Residence, TimelineSort};

/// Aggregates for one city.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats<'a> {
    pub visit_count: usize,
    pub total_days: i64,
    /// Second-most-recent visit by start date
    pub previous_visit: Option<&'a Entry>,
    pub longest_stay: i64,
    pub max_rating: Option<u8>,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryStats {
    pub total_days: i64,
    pub city_count: usize,
}

/// Display bundle for one entry's detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityHistory {
    pub visit_count: usize,
    pub previous_visit_label: Option<String>,
    pub country_days: i64,
    pub overseas_days: i64,
    pub overseas_percentage: i64,
}

/// One badge in the per-country collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    pub country_code: String,
    pub country_label: String,
    pub visit_count: usize,
    pub total_days: i64,
    pub city_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub trips: usize,
    pub countries: usize,
    pub cities: usize,
    pub total_days: i64,
    pub overseas_days: i64,
}

/// Start dates compared by calendar day; unparseable dates sort first.
fn by_start_day(a: &Entry, b: &Entry) -> Ordering {
    parse_day(&a.start_date).cmp(&parse_day(&b.start_date))
}

#[must_use]
pub fn visit_stats<'a>(city: &str, country_code: &str, entries: &'a [Entry]) -> VisitStats<'a> {
    let mut visits: Vec<&Entry> = entries
        .iter()
        .filter(|e| e.city == city && e.country_code == country_code)
        .collect();
    visits.sort_by(|a, b| by_start_day(b, a));

    let total_days = visits.iter().map(|e| e.days()).sum();
    let longest_stay = visits.iter().map(|e| e.days()).max().unwrap_or(0);

    let ratings: Vec<u8> = visits.iter().filter_map(|e| e.effective_rating()).collect();
    let max_rating = ratings.iter().copied().max();
    let average_rating = if ratings.is_empty() {
        None
    } else {
        let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
        #[allow(clippy::cast_precision_loss)]
        let avg = f64::from(sum) / ratings.len() as f64;
        Some(avg)
    };

    VisitStats {
        visit_count: visits.len(),
        total_days,
        previous_visit: visits.get(1).copied(),
        longest_stay,
        max_rating,
        average_rating,
    }
}

#[must_use]
pub fn country_stats(country_code: &str, entries: &[Entry]) -> CountryStats {
    let mut cities = BTreeSet::new();
    let mut total_days = 0;
    for entry in entries.iter().filter(|e| e.country_code == country_code) {
        total_days += entry.days();
        cities.insert(entry.city.as_str());
    }
    CountryStats {
        total_days,
        city_count: cities.len(),
    }
}

/// Days spent outside the residence country. Entries in the home country are
/// skipped whole; without a residence every entry counts.
#[must_use]
pub fn total_overseas_days(entries: &[Entry], residence: Option<&Residence>) -> i64 {
    let home = residence.and_then(Residence::home_country_code);
    entries
        .iter()
        .filter(|e| home != Some(e.country_code.as_str()))
        .map(Entry::days)
        .sum()
}

/// Share of `part` in `whole`, rounded half away from zero; zero when
/// `whole` is zero.
#[must_use]
pub fn percentage(part: i64, whole: i64) -> i64 {
    if whole == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let pct = (part as f64 / whole as f64 * 100.0).round() as i64;
    pct
}

#[must_use]
pub fn city_history(
    entry: &Entry,
    entries: &[Entry],
    residence: Option<&Residence>,
) -> CityHistory {
    let visits = visit_stats(&entry.city, &entry.country_code, entries);
    let country = country_stats(&entry.country_code, entries);
    let overseas_days = total_overseas_days(entries, residence);
    CityHistory {
        visit_count: visits.visit_count,
        previous_visit_label: visits
            .previous_visit
            .and_then(|prev| parse_day(&prev.start_date))
            .map(year_month_label),
        country_days: country.total_days,
        overseas_days,
        overseas_percentage: percentage(country.total_days, overseas_days),
    }
}

/// Badge data per visited country, most days first.
#[must_use]
pub fn country_summaries(entries: &[Entry]) -> Vec<CountrySummary> {
    let mut grouped: BTreeMap<&str, Vec<&Entry>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| !e.country_code.is_empty()) {
        grouped.entry(entry.country_code.as_str()).or_default().push(entry);
    }
    let mut summaries: Vec<CountrySummary> = grouped
        .into_iter()
        .map(|(code, visits)| {
            let cities: BTreeSet<&str> = visits.iter().map(|e| e.city.as_str()).collect();
            let label = visits
                .iter()
                .map(|e| e.country_label.as_str())
                .find(|label| !label.is_empty())
                .unwrap_or(code);
            CountrySummary {
                country_code: code.to_string(),
                country_label: label.to_string(),
                visit_count: visits.len(),
                total_days: visits.iter().map(|e| e.days()).sum(),
                city_count: cities.len(),
            }
        })
        .collect();
    summaries.sort_by(|a, b| {
        b.total_days
            .cmp(&a.total_days)
            .then_with(|| a.country_code.cmp(&b.country_code))
    });
    summaries
}

#[must_use]
pub fn overview(entries: &[Entry], residence: Option<&Residence>) -> Overview {
    let countries: BTreeSet<&str> = entries.iter().map(|e| e.country_code.as_str()).collect();
    let cities: BTreeSet<(&str, &str)> = entries
        .iter()
        .map(|e| (e.country_code.as_str(), e.city.as_str()))
        .collect();
    Overview {
        trips: entries.len(),
        countries: countries.len(),
        cities: cities.len(),
        total_days: entries.iter().map(Entry::days).sum(),
        overseas_days: total_overseas_days(entries, residence),
    }
}

/// Timeline order by start day. Same-day entries keep their list order.
#[must_use]
pub fn sorted_for_timeline(entries: &[Entry], order: TimelineSort) -> Vec<&Entry> {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    match order {
        TimelineSort::Newest => sorted.sort_by(|a, b| by_start_day(b, a)),
        TimelineSort::Oldest => sorted.sort_by(|a, b| by_start_day(a, b)),
    }
    sorted
}

/// Rated entries only, by rating; ties go to the more recent trip.
#[must_use]
pub fn sorted_by_rating(entries: &[Entry], order: RatingSort) -> Vec<&Entry> {
    let mut rated: Vec<&Entry> = entries
        .iter()
        .filter(|e| e.effective_rating().is_some())
        .collect();
    rated.sort_by(|a, b| {
        let by_rating = match order {
            RatingSort::Highest => b.rating.cmp(&a.rating),
            RatingSort::Lowest => a.rating.cmp(&b.rating),
        };
        by_rating.then_with(|| by_start_day(b, a))
    });
    rated
}
