//! Verification report model and the JSON files a run leaves behind.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use finale_core::models::BidRecord;
use finale_sdk::token_metadata::WETH;
use serde::{Deserialize, Serialize};

use crate::verify::VerificationResult;

pub const VERIFICATION_METHOD: &str = "bidForTokenBidder";

/// Sums are kept at 18 decimals so tokens of one symbol with differing
/// decimals still add up correctly.
const SUM_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub currency_breakdown: BTreeMap<String, CurrencyTotals>,
    pub weth_summary: WethSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub created_at: String,
    pub source_file: String,
    pub verification_method: String,
    pub contract_address: Address,
    pub total_bids_checked: usize,
    pub processing_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_bids: usize,
    pub active_bids: usize,
    pub inactive_bids: usize,
    pub error_bids: usize,
    pub duplicates_found: usize,
    pub duplicates_removed: usize,
    pub final_active_bids: usize,
    pub currency_symbols_updated: usize,
    /// Share of bids verified without an RPC error, e.g. "98.50%".
    pub success_rate: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyTotals {
    pub total: usize,
    pub active: usize,
    pub total_amount: String,
    pub active_amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WethSummary {
    pub total_weth_bids: usize,
    pub active_weth_bids: usize,
    pub total_weth_amount: String,
    pub active_weth_amount: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    count: usize,
    amount: U256,
}

impl Tally {
    fn add(&mut self, bid: &BidRecord) {
        self.count += 1;
        self.amount = self
            .amount
            .saturating_add(scale_to_sum_decimals(bid.amount, bid.currency_decimals));
    }
}

fn scale_to_sum_decimals(amount: U256, decimals: u8) -> U256 {
    if decimals <= SUM_DECIMALS {
        let factor = U256::from(10).pow(U256::from(SUM_DECIMALS - decimals));
        amount.saturating_mul(factor)
    } else {
        let divisor = U256::from(10).pow(U256::from(decimals - SUM_DECIMALS));
        amount / divisor
    }
}

/// "1.500000000000000000" -> "1.5", "2.000000000000000000" -> "2"
pub fn format_amount(amount: U256) -> String {
    let formatted = format_units(amount, SUM_DECIMALS).unwrap_or_else(|_| amount.to_string());
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

pub fn summarize(
    results: &[VerificationResult],
    duplicates_found: usize,
    duplicates_removed: usize,
    final_active_bids: usize,
    currency_symbols_updated: usize,
) -> ReportSummary {
    let total_bids = results.len();
    let error_bids = results.iter().filter(|r| r.error.is_some()).count();
    let active_bids = results.iter().filter(|r| r.is_active).count();
    let inactive_bids = total_bids - active_bids - error_bids;

    let success_rate = if total_bids == 0 {
        0.0
    } else {
        (total_bids - error_bids) as f64 / total_bids as f64 * 100.0
    };

    ReportSummary {
        total_bids,
        active_bids,
        inactive_bids,
        error_bids,
        duplicates_found,
        duplicates_removed,
        final_active_bids,
        currency_symbols_updated,
        success_rate: format!("{:.2}%", success_rate),
    }
}

/// `all_bids` pairs each snapshot bid with the symbol it should be reported under.
pub fn currency_breakdown<'a>(
    all_bids: impl IntoIterator<Item = (String, &'a BidRecord)>,
    active_bids: &[BidRecord],
) -> BTreeMap<String, CurrencyTotals> {
    let mut totals: BTreeMap<String, (Tally, Tally)> = BTreeMap::new();
    for (symbol, bid) in all_bids {
        totals.entry(symbol).or_default().0.add(bid);
    }
    for bid in active_bids {
        totals
            .entry(bid.currency_symbol.clone())
            .or_default()
            .1
            .add(bid);
    }

    totals
        .into_iter()
        .map(|(symbol, (total, active))| {
            (
                symbol,
                CurrencyTotals {
                    total: total.count,
                    active: active.count,
                    total_amount: format_amount(total.amount),
                    active_amount: format_amount(active.amount),
                },
            )
        })
        .collect()
}

pub fn weth_summary<'a>(
    all_bids: impl IntoIterator<Item = &'a BidRecord>,
    active_bids: &[BidRecord],
) -> WethSummary {
    let mut total = Tally::default();
    let mut active = Tally::default();
    all_bids
        .into_iter()
        .filter(|bid| bid.currency == WETH)
        .for_each(|bid| total.add(bid));
    active_bids
        .iter()
        .filter(|bid| bid.currency == WETH)
        .for_each(|bid| active.add(bid));

    WethSummary {
        total_weth_bids: total.count,
        active_weth_bids: active.count,
        total_weth_amount: format_amount(total.amount),
        active_weth_amount: format_amount(active.amount),
    }
}

/// ISO-8601 with ':' and '.' swapped for '-', safe in file names on every OS.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutputPaths {
    pub active_bids: PathBuf,
    pub report: PathBuf,
}

/// Writes the verified active bid list and the report next to each other. Prior
/// runs are never overwritten because the file names carry the run timestamp.
pub fn write_run_outputs(
    output_dir: &Path,
    at: DateTime<Utc>,
    active_bids: &[BidRecord],
    report: &VerificationReport,
) -> Result<RunOutputPaths> {
    std::fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let stamp = file_stamp(at);
    let paths = RunOutputPaths {
        active_bids: output_dir.join(format!("verified-active-bids-{stamp}.json")),
        report: output_dir.join(format!("bid-verification-report-{stamp}.json")),
    };

    write_json(&paths.active_bids, active_bids)?;
    write_json(&paths.report, report)?;
    Ok(paths)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .wrap_err_with(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_amount_trims_trailing_zeros() {
        assert_eq!(format_amount(U256::ZERO), "0");
        assert_eq!(
            format_amount(U256::from(1_500_000_000_000_000_000u128)),
            "1.5"
        );
        assert_eq!(
            format_amount(U256::from(2_000_000_000_000_000_000u128)),
            "2"
        );
    }

    #[test]
    fn test_scaling_mixes_decimals() {
        // 1 USDC (6 decimals) + 1 DAI (18 decimals)
        let sum = scale_to_sum_decimals(U256::from(1_000_000u64), 6)
            + scale_to_sum_decimals(U256::from(1_000_000_000_000_000_000u128), 18);
        assert_eq!(format_amount(sum), "2");
    }

    #[test]
    fn test_file_stamp_has_no_colons_or_dots() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let stamp = file_stamp(at);
        assert_eq!(stamp, "2024-03-09T14-05-07-000Z");
        assert!(!stamp.contains(':') && !stamp.contains('.'));
    }

    #[test]
    fn test_write_run_outputs_creates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let report = VerificationReport {
            metadata: ReportMetadata {
                created_at: at.to_rfc3339(),
                source_file: "bids.json".to_string(),
                verification_method: VERIFICATION_METHOD.to_string(),
                contract_address: Address::repeat_byte(0xe5),
                total_bids_checked: 0,
                processing_time: "0.00s".to_string(),
            },
            summary: summarize(&[], 0, 0, 0, 0),
            currency_breakdown: BTreeMap::new(),
            weth_summary: weth_summary(std::iter::empty(), &[]),
        };

        let paths = write_run_outputs(dir.path(), at, &[], &report).unwrap();
        assert!(paths
            .report
            .ends_with("bid-verification-report-2024-03-09T14-05-07-000Z.json"));

        let written: VerificationReport =
            serde_json::from_reader(File::open(&paths.report).unwrap()).unwrap();
        assert_eq!(written, report);
        assert_eq!(written.summary.success_rate, "0.00%");

        let active: serde_json::Value =
            serde_json::from_reader(File::open(&paths.active_bids).unwrap()).unwrap();
        assert_eq!(active, serde_json::json!([]));
    }
}
