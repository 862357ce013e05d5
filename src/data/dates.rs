//! Month-label normalisation for chart tables.
//!
//! Chart exports label rows either `Jan-16` (month plus two-digit year) or a
//! bare month that inherits the running year. A bare `Dec` rolls the running
//! year forward for the rows after it.

use chrono::NaiveDate;

pub struct DateNormalizer {
    running_year: Option<i32>,
    default_year: i32,
}

impl DateNormalizer {
    /// `default_year` applies to bare months seen before any explicit year.
    pub fn new(default_year: i32) -> Self {
        Self {
            running_year: None,
            default_year,
        }
    }

    /// First day of the labelled month, or `None` when it cannot be parsed.
    pub fn normalize(&mut self, raw: &str) -> Option<NaiveDate> {
        // "Dec (est.)" -> "Dec"
        let label = raw.split('(').next().unwrap_or(raw).trim();

        let (month, year) = match label.split_once('-') {
            Some((month, suffix)) => {
                let digits: String = suffix.chars().filter(|c| c.is_ascii_digit()).collect();
                let year: i32 = digits.parse().ok()?;
                let year = if digits.len() == 2 { 2000 + year } else { year };
                self.running_year = Some(year);
                (month.trim(), year)
            }
            None => {
                let year = *self.running_year.get_or_insert(self.default_year);
                if label.eq_ignore_ascii_case("dec") {
                    self.running_year = Some(year + 1);
                }
                (label, year)
            }
        };

        NaiveDate::parse_from_str(&format!("1 {month} {year}"), "%d %b %Y").ok()
    }
}

/// Normalise a whole column in row order.
pub fn normalize_labels<'a, I>(labels: I, default_year: i32) -> Vec<Option<NaiveDate>>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut normalizer = DateNormalizer::new(default_year);
    labels
        .into_iter()
        .map(|label| label.and_then(|l| normalizer.normalize(l)))
        .collect()
}
