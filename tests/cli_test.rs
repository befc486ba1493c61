mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use uuid::Uuid;

#[test]
fn test_seed_reports_loaded_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    common::write_seed_files(dir.path(), Uuid::new_v4(), Uuid::new_v4())?;

    let mut cmd = Command::new(cargo_bin!("shortlet"));
    cmd.arg("seed")
        .arg("--users")
        .arg(dir.path().join("users.csv"))
        .arg("--listings")
        .arg(dir.path().join("listings.csv"))
        .arg("--availability")
        .arg(dir.path().join("availability.csv"));

    cmd.assert().success().stdout(predicate::str::contains(
        r#"{"users":1,"listings":1,"windows":1,"skipped":0}"#,
    ));
    Ok(())
}

#[test]
fn test_seed_skips_malformed_rows() {
    let mut windows = tempfile::NamedTempFile::new().unwrap();
    writeln!(windows, "id,listing_id,start_date,end_date,price_per_night,is_blocked").unwrap();
    writeln!(windows, "not-a-uuid,also-not,2024-04-01T00:00:00Z,2024-04-30T00:00:00Z,100,false").unwrap();
    // Valid row, but the listing does not exist.
    writeln!(
        windows,
        "{},{},2024-04-01T00:00:00Z,2024-04-30T00:00:00Z,100,false",
        Uuid::new_v4(),
        Uuid::new_v4()
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("shortlet"));
    cmd.arg("seed").arg("--availability").arg(windows.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Skipping seed row"))
        .stdout(predicate::str::contains(r#""windows":0,"skipped":2"#));
}

#[test]
fn test_sweep_on_empty_store() {
    let mut cmd = Command::new(cargo_bin!("shortlet"));
    cmd.arg("sweep").env_remove("PAYMENT_PROVIDER");

    cmd.assert().success().stdout(predicate::str::contains(
        r#"{"released":0,"cleared":0,"failed":0}"#,
    ));
}

#[test]
fn test_unknown_provider_is_a_config_error() {
    let mut cmd = Command::new(cargo_bin!("shortlet"));
    cmd.arg("sweep").env("PAYMENT_PROVIDER", "stripe");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown PAYMENT_PROVIDER"));
}
