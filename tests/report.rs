//! E2E tests driving the CLI against fixture data

use std::process::Command;

const TRANSACTIONS: &str = "tests/data/transactions.csv";
const OVERSELL: &str = "tests/data/oversell.csv";
const CACHE: &str = "tests/data/instruments.json";

fn run(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--"].iter().copied().chain(args.iter().copied()))
        .output()
        .expect("Failed to execute command")
}

/// Full report over mixed stock, fund and dividend activity.
#[test]
fn report_text_output() {
    let output = run(&[
        "report",
        TRANSACTIONS,
        "--cache",
        CACHE,
        "--as-of",
        "2024-01-15",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    // 2021: a 100 EUR loss carries forward.
    assert!(stdout.contains("=== 2021 ==="));
    assert!(stdout.contains("Losses carried forward: €100.00"));

    // 2022: 2000 gain - 1270 exemption - 100 carried loss = 630 at 33%.
    assert!(stdout.contains("=== 2022 ==="));
    assert!(stdout.contains("CGT due: €207.90"));

    // 2022 dividends: 400 domestic + 60 foreign at 40%, less credits.
    assert!(stdout.contains("domestic €400.00"));
    assert!(stdout.contains("foreign €60.00"));
    assert!(stdout.contains("Net due: €75.00"));

    // The 2014 fund purchase crossed its 8-year anniversary.
    assert!(stdout.contains("DEEMED DISPOSALS"));
    assert!(stdout.contains("VWCE"));
    assert!(stdout.contains("Exit tax due: €82.00"));
}

#[test]
fn report_json_output() {
    let output = run(&[
        "report",
        TRANSACTIONS,
        "--cache",
        CACHE,
        "--as-of",
        "2024-01-15",
        "--json",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    let report: serde_json::Value =
        serde_json::from_str(&stdout).expect("invalid JSON output");
    let years = report["years"].as_array().unwrap();
    let y2022 = years
        .iter()
        .find(|y| y["year"] == 2022)
        .expect("2022 missing");
    assert_eq!(y2022["cgt"]["liability"], "207.90");
    assert_eq!(y2022["dividends"]["net_due"], "75.00");
    assert_eq!(report["deemed_disposals"][0]["ticker"], "VWCE");
    assert!(report["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn instrument_detail_view() {
    let output = run(&[
        "instrument",
        "CRH",
        TRANSACTIONS,
        "--cache",
        CACHE,
        "--as-of",
        "2024-01-15",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("CRH (stock)"));
    assert!(stdout.contains("BUY"));
    assert!(stdout.contains("SELL"));
    assert!(stdout.contains("DIVIDEND"));
    assert!(stdout.contains("2021 realized: -€100.00"));
    assert!(stdout.contains("2022 realized: €2000.00"));
}

#[test]
fn validate_clean_input() {
    let output = run(&[
        "validate",
        TRANSACTIONS,
        "--cache",
        CACHE,
        "--as-of",
        "2024-01-15",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("No issues found."));
}

#[test]
fn validate_flags_oversell() {
    let output = run(&[
        "validate",
        OVERSELL,
        "--cache",
        CACHE,
        "--as-of",
        "2024-01-15",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "Expected nonzero exit: {:?}", output);
    assert!(stdout.contains("exceeds recorded lots"));
    assert!(stdout.contains("1 issue(s) found"));
}

#[test]
fn export_writes_csv_files() {
    let prefix = std::env::temp_dir().join("taxirl_e2e");
    let prefix = prefix.to_str().unwrap();
    let output = run(&[
        "export",
        TRANSACTIONS,
        "--cache",
        CACHE,
        "--as-of",
        "2024-01-15",
        "--prefix",
        prefix,
    ]);

    assert!(output.status.success(), "Command failed: {:?}", output);

    let summary =
        std::fs::read_to_string(format!("{prefix}_tax_summary.csv")).expect("summary missing");
    assert!(summary.contains("stocks_cgt"));
    assert!(summary.contains("funds_exit_tax"));
    assert!(summary.contains("207.90"));

    let by_ticker =
        std::fs::read_to_string(format!("{prefix}_by_ticker.csv")).expect("by_ticker missing");
    assert!(by_ticker.contains("CRH"));

    let deemed = std::fs::read_to_string(format!("{prefix}_deemed_disposal.csv"))
        .expect("deemed missing");
    assert!(deemed.contains("VWCE"));
}

#[test]
fn missing_columns_rejected() {
    let output = run(&["report", "tests/data/instruments.json", "--cache", CACHE]);
    assert!(!output.status.success());
}
