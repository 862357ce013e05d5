//! Report Renamer
//! Normalises downloaded report filenames to `<MM>_<YYYY>.pdf`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// "04.2019_Commercial Truck Guidelines_1.pdf"
static NUMERIC_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d{4})_.*\.pdf").expect("valid pattern"));

// "August_2022_Guidelines.pdf"
static NAMED_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)_(\d{4})_.*\.pdf").expect("valid pattern"));

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed { from: PathBuf, to: PathBuf },
    /// Target already exists; source left untouched
    TargetExists { from: PathBuf, to: PathBuf },
    Unmatched(PathBuf),
    Failed { from: PathBuf, message: String },
}

/// Two-digit month number for a full month name, `"00"` when unknown.
pub fn month_number(name: &str) -> String {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| format!("{:02}", i + 1))
        .unwrap_or_else(|| "00".to_string())
}

/// New filename for a report, or `None` if it matches neither layout.
pub fn target_name(file_name: &str) -> Option<String> {
    if let Some(caps) = NUMERIC_MONTH.captures(file_name) {
        return Some(format!("{}_{}.pdf", &caps[1], &caps[2]));
    }
    NAMED_MONTH
        .captures(file_name)
        .map(|caps| format!("{}_{}.pdf", month_number(&caps[1]), &caps[2]))
}

/// Rename every PDF in `dir`. Existing targets are never overwritten.
pub fn rename_pdfs(dir: &Path) -> io::Result<Vec<RenameOutcome>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|e| e.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();

    let outcomes: Vec<RenameOutcome> = files.into_iter().map(rename_one).collect();
    info!("Renaming completed.");
    Ok(outcomes)
}

fn rename_one(from: PathBuf) -> RenameOutcome {
    let file_name = from
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let Some(new_name) = target_name(&file_name) else {
        info!("Skipping {} - doesn't match any expected pattern", file_name);
        return RenameOutcome::Unmatched(from);
    };

    let to = from.with_file_name(&new_name);
    if to == from {
        return RenameOutcome::Unmatched(from);
    }
    if to.exists() {
        warn!("Skipping {} - target file {} already exists", file_name, new_name);
        return RenameOutcome::TargetExists { from, to };
    }

    match fs::rename(&from, &to) {
        Ok(()) => {
            info!("Renamed: {} -> {}", file_name, new_name);
            RenameOutcome::Renamed { from, to }
        }
        Err(e) => {
            warn!("Error renaming {}: {}", file_name, e);
            RenameOutcome::Failed {
                from,
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_month_keeps_digits_verbatim() {
        assert_eq!(
            target_name("04.2019_Commercial Truck Guidelines_1.pdf").as_deref(),
            Some("04_2019.pdf")
        );
        assert_eq!(target_name("4.2019_x.pdf").as_deref(), Some("4_2019.pdf"));
    }

    #[test]
    fn named_month_maps_to_number() {
        assert_eq!(
            target_name("August_2022_Guidelines.pdf").as_deref(),
            Some("08_2022.pdf")
        );
        assert_eq!(target_name("MARCH_2020_a.pdf").as_deref(), Some("03_2020.pdf"));
        assert_eq!(target_name("Sept_2021_a.pdf").as_deref(), Some("00_2021.pdf"));
    }

    #[test]
    fn other_names_do_not_match() {
        assert_eq!(target_name("05_2019.pdf"), None);
        assert_eq!(target_name("Guidelines 2019.pdf"), None);
        assert_eq!(target_name("August_22_Guidelines.pdf"), None);
    }

    #[test]
    fn month_lookup() {
        assert_eq!(month_number("january"), "01");
        assert_eq!(month_number("December"), "12");
        assert_eq!(month_number("Foo"), "00");
    }

    #[test]
    fn renames_in_place_without_overwriting() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "04.2019_Guidelines.pdf",
            "April_2019_Guidelines.pdf",
            "May_2019_Guidelines.pdf",
            "readme.pdf",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), name).expect("write");
        }

        let outcomes = rename_pdfs(dir.path()).expect("rename");
        assert_eq!(outcomes.len(), 4);

        let renamed = outcomes
            .iter()
            .filter(|o| matches!(o, RenameOutcome::Renamed { .. }))
            .count();
        let blocked = outcomes
            .iter()
            .filter(|o| matches!(o, RenameOutcome::TargetExists { .. }))
            .count();
        assert_eq!((renamed, blocked), (2, 1));

        // Sorted order renames "04.2019_" first, so "April_" finds the target taken
        assert_eq!(
            fs::read_to_string(dir.path().join("04_2019.pdf")).expect("read"),
            "04.2019_Guidelines.pdf"
        );
        assert!(dir.path().join("April_2019_Guidelines.pdf").exists());
        assert!(dir.path().join("05_2019.pdf").exists());
        assert!(dir.path().join("readme.pdf").exists());
    }
}
