use super::*;
use crate::record::MeasurementRecord;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use tempfile::tempdir;
use uuid::Uuid;

fn ts(second: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .unwrap()
        .and_hms_micro_opt(10, 0, second, micro)
        .unwrap()
}

fn sample_records() -> Vec<MeasurementRecord> {
    vec![
        MeasurementRecord::new(900.0, Some(-12.5), ts(0, 250_000), 5),
        MeasurementRecord::new(900.2, None, ts(1, 0), 5),
        MeasurementRecord::new(900.4, Some(-11.75), ts(2, 123_456), 5),
    ]
}

#[test]
fn test_csv_layout() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.csv");
    write_csv(&sample_records(), &path)?;

    let text = fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "frequency_mhz,power_dbm,timestamp,lo_power_setting");
    assert_eq!(lines[1], "900.0,-12.5,2026-03-14T10:00:00.250000,5");
    assert_eq!(lines[2], "900.2,,2026-03-14T10:00:01.000000,5");
    assert_eq!(lines.len(), 4);
    Ok(())
}

#[test]
fn test_csv_roundtrip() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.csv");
    let records = sample_records();
    write_csv(&records, &path)?;

    assert_eq!(read_csv(&path)?, records);
    Ok(())
}

#[test]
fn test_csv_creates_directory_and_leaves_no_temp_files() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join("results").join("sweep.csv");
    write_csv(&sample_records(), &path)?;

    assert!(path.exists());
    let entries = fs::read_dir(path.parent().unwrap())?.count();
    assert_eq!(entries, 1);
    Ok(())
}

#[test]
fn test_empty_csv_has_header() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("empty.csv");
    write_csv(&[], &path)?;

    assert_eq!(
        fs::read_to_string(&path)?.trim_end(),
        "frequency_mhz,power_dbm,timestamp,lo_power_setting"
    );
    assert!(read_csv(&path)?.is_empty());
    Ok(())
}

#[test]
fn test_read_csv_rejects_foreign_header() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("other.csv");
    fs::write(&path, "a,b\n1,2\n")?;

    assert!(matches!(read_csv(&path), Err(OutputError::InvalidData(_))));
    Ok(())
}

#[test]
fn test_parquet_roundtrip_with_metadata() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.parquet");
    let records = sample_records();
    let run_id = Uuid::new_v4();
    let metadata = TableMetadata::new(run_id, 5).with_sweep_plan("{\"power_levels\":[5]}");

    let info = write_parquet(&records, &path, &TableConfig::default(), &metadata)?;
    assert_eq!(info.rows, 3);
    assert_eq!(info.row_groups, 1);

    assert_eq!(read_parquet(&path)?, records);

    let kv = read_parquet_metadata(&path)?;
    assert_eq!(kv[schema::keys::RUN_ID], run_id.to_string());
    assert_eq!(kv[schema::keys::LO_POWER_SETTING], "5");
    assert_eq!(kv[schema::keys::FORMAT_VERSION], schema::FORMAT_VERSION);
    assert_eq!(kv[schema::keys::SWEEP_PLAN], "{\"power_levels\":[5]}");
    assert!(kv.contains_key(schema::keys::CREATED));
    Ok(())
}

#[test]
fn test_parquet_compression_options() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let records = sample_records();
    for compression in [
        CompressionType::Zstd(9),
        CompressionType::Snappy,
        CompressionType::Uncompressed,
    ] {
        let path = dir.path().join(format!("{}.parquet", compression).replace(':', "_"));
        let config = TableConfig {
            compression,
            ..TableConfig::default()
        };
        write_parquet(&records, &path, &config, &TableMetadata::new(Uuid::nil(), 5))?;
        assert_eq!(read_parquet(&path)?.len(), 3);
    }
    Ok(())
}

#[test]
fn test_compression_parsing() {
    assert_eq!("zstd".parse::<CompressionType>().unwrap(), CompressionType::Zstd(3));
    assert_eq!("ZSTD:19".parse::<CompressionType>().unwrap(), CompressionType::Zstd(19));
    assert_eq!("snappy".parse::<CompressionType>().unwrap(), CompressionType::Snappy);
    assert_eq!("none".parse::<CompressionType>().unwrap(), CompressionType::Uncompressed);
    assert!("zstd:99".parse::<CompressionType>().is_err());
    assert!("lz4".parse::<CompressionType>().is_err());
}

#[test]
fn test_read_table_dispatches_on_extension() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let records = sample_records();
    let csv = dir.path().join("a.csv");
    let parquet = dir.path().join("a.parquet");
    write_csv(&records, &csv)?;
    write_parquet(&records, &parquet, &TableConfig::default(), &TableMetadata::new(Uuid::nil(), 5))?;

    assert_eq!(read_table(&csv)?, read_table(&parquet)?);
    Ok(())
}

#[test]
fn test_statistics() {
    let stats = SweepStatistics::from_records(&sample_records());
    assert_eq!(stats.total, 3);
    assert_eq!(stats.valid, 2);
    assert_eq!(stats.missing(), 1);
    assert_eq!(stats.min, Some((-12.5, 900.0)));
    assert_eq!(stats.max, Some((-11.75, 900.4)));
    assert_eq!(stats.mean_dbm, Some(-12.125));
    assert_eq!(stats.peak_to_peak_db(), Some(0.75));
    // sample std of {-12.5, -11.75}
    let std = stats.std_dbm.unwrap();
    assert!((std - 0.530_330_085_889_910_6).abs() < 1e-12);
}

#[test]
fn test_statistics_without_readings() {
    let records = vec![MeasurementRecord::new(900.0, None, ts(0, 0), 5)];
    let stats = SweepStatistics::from_records(&records);
    assert_eq!(stats.valid, 0);
    assert_eq!(stats.mean_dbm, None);
    assert_eq!(stats.peak_to_peak_db(), None);
    assert!(stats.to_string().contains("No valid readings"));

    let single = vec![MeasurementRecord::new(900.0, Some(-3.0), ts(0, 0), 5)];
    let stats = SweepStatistics::from_records(&single);
    assert_eq!(stats.std_dbm, None);
    assert_eq!(stats.peak_to_peak_db(), Some(0.0));
}

#[test]
fn test_layout_explicit_single_power() {
    let layout = OutputLayout::new(Some("out/run.csv".into()), DEFAULT_OUTPUT_DIR);
    assert_eq!(layout.csv_path(5, false), std::path::PathBuf::from("out/run.csv"));
}

#[test]
fn test_layout_explicit_multi_power() {
    let layout = OutputLayout::new(Some("out/run.csv".into()), DEFAULT_OUTPUT_DIR);
    assert_eq!(
        layout.csv_path(5, true),
        std::path::PathBuf::from("out/run_+5dBm.csv")
    );
    assert_eq!(
        layout.csv_path(-10, true),
        std::path::PathBuf::from("out/run_-10dBm.csv")
    );
}

#[test]
fn test_layout_explicit_parquet_path() {
    let layout = OutputLayout::new(Some("out/sweep.parquet".into()), DEFAULT_OUTPUT_DIR);
    assert!(layout.wants_parquet());
    let csv = layout.csv_path(5, false);
    assert_eq!(csv, std::path::PathBuf::from("out/sweep.csv"));
    assert_eq!(
        OutputLayout::parquet_path(&csv),
        std::path::PathBuf::from("out/sweep.parquet")
    );
    assert_eq!(
        layout.csv_path(-10, true),
        std::path::PathBuf::from("out/sweep_-10dBm.csv")
    );

    let plain = OutputLayout::new(Some("out/sweep.csv".into()), DEFAULT_OUTPUT_DIR);
    assert!(!plain.wants_parquet());
    assert!(!OutputLayout::default().wants_parquet());
}

#[test]
fn test_layout_generated_name() {
    let layout = OutputLayout::new(None, "results").with_start_time(ts(7, 0));
    assert_eq!(
        layout.csv_path(5, false),
        std::path::PathBuf::from("results/lo_power_sweep_20260314_100007_+5dBm.csv")
    );
    assert_eq!(
        OutputLayout::parquet_path(&layout.csv_path(-4, true)),
        std::path::PathBuf::from("results/lo_power_sweep_20260314_100007_-4dBm.parquet")
    );
}

#[test]
fn test_layout_rejects_bad_timestamp_format() {
    assert!(OutputLayout::default().with_timestamp_format("%Q").is_err());
    assert!(OutputLayout::default().with_timestamp_format("%Y-%m-%d").is_ok());
}

#[test]
fn test_result_writer_flushes_incrementally() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.csv");
    let mut writer = ResultWriter::new(&path)
        .with_parquet(TableConfig::default(), TableMetadata::new(Uuid::nil(), 5))
        .with_flush_every(2);

    let records = sample_records();
    writer.append(records[0].clone())?;
    assert!(!path.exists());
    writer.append(records[1].clone())?;
    assert_eq!(read_csv(&path)?.len(), 2);

    writer.append(records[2].clone())?;
    let stats = writer.finish()?;
    assert_eq!(stats.records_written, 3);
    assert_eq!(stats.missing, 1);
    assert_eq!(read_csv(&path)?, records);
    assert_eq!(read_parquet(&dir.path().join("sweep.parquet"))?, records);
    Ok(())
}

#[test]
fn test_csv_refuses_parquet_extension() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.PARQUET");
    let err = write_csv(&sample_records(), &path).unwrap_err();
    assert!(matches!(err, OutputError::InvalidData(_)));
    assert!(!path.exists());

    let mut writer = ResultWriter::new(dir.path().join("sweep.parquet"));
    writer.append(sample_records()[0].clone())?;
    assert!(writer.finish().is_err());
    Ok(())
}

#[test]
fn test_explicit_parquet_target_reads_back() -> Result<(), OutputError> {
    let dir = tempdir()?;
    let layout = OutputLayout::new(Some(dir.path().join("sweep.parquet")), DEFAULT_OUTPUT_DIR);
    let csv_path = layout.csv_path(5, false);
    let mut writer = ResultWriter::new(&csv_path)
        .with_parquet(TableConfig::default(), TableMetadata::new(Uuid::nil(), 5));
    for record in sample_records() {
        writer.append(record)?;
    }
    let stats = writer.finish()?;

    let parquet_path = dir.path().join("sweep.parquet");
    assert_eq!(stats.parquet_path.as_deref(), Some(parquet_path.as_path()));
    assert_ne!(stats.csv_path, parquet_path);
    assert_eq!(read_table(&parquet_path)?, sample_records());
    assert_eq!(read_table(&csv_path)?, sample_records());
    Ok(())
}
