//! Parquet artifact reader/writer
use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, ListArray, ListBuilder, StringArray,
    UInt8Array, UInt32Array,
};
use arrow::record_batch::RecordBatch;
use ndarray::Array1;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use crate::artifact::{Mode, ObservationArtifact, ObservationMetadata};
use crate::errors::PersistenceError;
use crate::stats::{radial_velocity_km_s, SpectrumStatistics};

/// Writes one artifact to `path` as a single-row compressed Parquet file.
///
/// The bytes go to a `.tmp` sibling first and are renamed into place, so
/// the final name only ever refers to a complete artifact.
pub fn write_artifact(path: &Path, artifact: &ObservationArtifact) -> Result<(), PersistenceError> {
    let batch = artifact_batch(artifact)?;

    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads an artifact back. Fails with `CorruptArtifact` if any required
/// field is absent.
pub fn read_artifact(path: &Path) -> Result<ObservationArtifact, PersistenceError> {
    let file = File::open(path)?;
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batch = reader
        .next()
        .ok_or_else(|| PersistenceError::CorruptArtifact {
            field: "spectrum".into(),
        })??;

    let mode_str = str_field(&batch, "mode")?;
    let mode: Mode = mode_str
        .parse()
        .map_err(|_| PersistenceError::CorruptArtifact {
            field: "mode".into(),
        })?;

    let hydrogen_offset_khz = f64_field(&batch, "hydrogen_offset_khz")?;
    let stats = SpectrumStatistics {
        peak_power_db: f64_field(&batch, "peak_power_db")?,
        noise_floor_db: f64_field(&batch, "noise_floor_db")?,
        median_power_db: f64_field(&batch, "median_power_db")?,
        snr_db: f64_field(&batch, "snr_db")?,
        peak_frequency_hz: f64_field(&batch, "peak_frequency_hz")?,
        hydrogen_offset_khz,
        radial_velocity_km_s: radial_velocity_km_s(hydrogen_offset_khz),
        rfi_percentage: f64_field(&batch, "rfi_percentage")?,
    };

    Ok(ObservationArtifact {
        metadata: ObservationMetadata {
            timestamp: str_field(&batch, "timestamp")?,
            mode,
            freq_mhz: f64_field(&batch, "freq_mhz")?,
            sample_rate: u32_field(&batch, "sample_rate")?,
            fft_size: u32_field(&batch, "fft_size")?,
            averaging_windows: u32_field(&batch, "averaging_windows")?,
            lna_gain: u8_field(&batch, "lna_gain")?,
            mix_gain: u8_field(&batch, "mix_gain")?,
            vga_gain: u8_field(&batch, "vga_gain")?,
        },
        spectrum: list_f64_field(&batch, "spectrum")?,
        freq_axis: list_f64_field(&batch, "freq_axis")?,
        stats,
    })
}

fn artifact_batch(artifact: &ObservationArtifact) -> Result<RecordBatch, PersistenceError> {
    let meta = &artifact.metadata;
    let stats = &artifact.stats;

    let columns: Vec<(&str, ArrayRef)> = vec![
        ("spectrum", list_f64_array(&artifact.spectrum)),
        ("freq_axis", list_f64_array(&artifact.freq_axis)),
        ("timestamp", Arc::new(StringArray::from(vec![meta.timestamp.as_str()]))),
        ("mode", Arc::new(StringArray::from(vec![meta.mode.as_str()]))),
        ("freq_mhz", f64_array(meta.freq_mhz)),
        ("sample_rate", Arc::new(UInt32Array::from(vec![meta.sample_rate]))),
        ("fft_size", Arc::new(UInt32Array::from(vec![meta.fft_size]))),
        (
            "averaging_windows",
            Arc::new(UInt32Array::from(vec![meta.averaging_windows])),
        ),
        ("peak_power_db", f64_array(stats.peak_power_db)),
        ("noise_floor_db", f64_array(stats.noise_floor_db)),
        ("median_power_db", f64_array(stats.median_power_db)),
        ("snr_db", f64_array(stats.snr_db)),
        ("peak_frequency_hz", f64_array(stats.peak_frequency_hz)),
        ("hydrogen_offset_khz", f64_array(stats.hydrogen_offset_khz)),
        ("rfi_percentage", f64_array(stats.rfi_percentage)),
        ("lna_gain", Arc::new(UInt8Array::from(vec![meta.lna_gain]))),
        ("mix_gain", Arc::new(UInt8Array::from(vec![meta.mix_gain]))),
        ("vga_gain", Arc::new(UInt8Array::from(vec![meta.vga_gain]))),
    ];

    Ok(RecordBatch::try_from_iter(columns)?)
}

fn f64_array(value: f64) -> ArrayRef {
    Arc::new(Float64Array::from(vec![value]))
}

fn list_f64_array(values: &Array1<f64>) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for &v in values {
        builder.values().append_value(v);
    }
    builder.append(true);
    Arc::new(builder.finish())
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, PersistenceError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PersistenceError::CorruptArtifact { field: name.into() })
}

fn f64_field(batch: &RecordBatch, name: &str) -> Result<f64, PersistenceError> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Float64Array>()
        .filter(|a| !a.is_empty())
        .map(|a| a.value(0))
        .ok_or_else(|| PersistenceError::CorruptArtifact { field: name.into() })
}

fn u32_field(batch: &RecordBatch, name: &str) -> Result<u32, PersistenceError> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .filter(|a| !a.is_empty())
        .map(|a| a.value(0))
        .ok_or_else(|| PersistenceError::CorruptArtifact { field: name.into() })
}

fn u8_field(batch: &RecordBatch, name: &str) -> Result<u8, PersistenceError> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<UInt8Array>()
        .filter(|a| !a.is_empty())
        .map(|a| a.value(0))
        .ok_or_else(|| PersistenceError::CorruptArtifact { field: name.into() })
}

fn str_field(batch: &RecordBatch, name: &str) -> Result<String, PersistenceError> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<StringArray>()
        .filter(|a| !a.is_empty())
        .map(|a| a.value(0).to_owned())
        .ok_or_else(|| PersistenceError::CorruptArtifact { field: name.into() })
}

fn list_f64_field(batch: &RecordBatch, name: &str) -> Result<Array1<f64>, PersistenceError> {
    let list = column(batch, name)?
        .as_any()
        .downcast_ref::<ListArray>()
        .filter(|a| !a.is_empty())
        .map(|a| a.value(0))
        .ok_or_else(|| PersistenceError::CorruptArtifact { field: name.into() })?;
    let values = list
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| PersistenceError::CorruptArtifact { field: name.into() })?;
    Ok(Array1::from_iter(values.values().iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::artifact_filename;
    use ndarray::array;

    fn test_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("hydroline_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_artifact() -> ObservationArtifact {
        let spectrum = array![0.5, 2.0, 8.25, 1.0];
        let freq_axis = array![-2000.0, -1000.0, 0.0, 1000.0];
        let stats = SpectrumStatistics::compute(&spectrum, &freq_axis, 1_420_405_751.0);
        ObservationArtifact {
            metadata: ObservationMetadata {
                timestamp: "20260829_101500".into(),
                mode: Mode::On,
                freq_mhz: 1420.405751,
                sample_rate: 3_000_000,
                fft_size: 4,
                averaging_windows: 12,
                lna_gain: 0,
                mix_gain: 5,
                vga_gain: 6,
            },
            spectrum,
            freq_axis,
            stats,
        }
    }

    #[test]
    fn artifact_round_trips_exactly() {
        let dir = test_dir("roundtrip");
        let path = dir.join(artifact_filename("20260829_101500"));

        let artifact = sample_artifact();
        write_artifact(&path, &artifact).unwrap();
        let read = read_artifact(&path).unwrap();

        assert_eq!(read, artifact);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn temp_file_is_not_left_behind() {
        let dir = test_dir("tmpfile");
        let path = dir.join(artifact_filename("20260829_101501"));

        write_artifact(&path, &sample_artifact()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_field_is_corrupt() {
        let dir = test_dir("corrupt");
        let path = dir.join("partial.parquet");

        // A parquet file with only a spectrum column.
        let batch = RecordBatch::try_from_iter(vec![(
            "spectrum",
            list_f64_array(&array![1.0, 2.0]),
        )])
        .unwrap();
        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = read_artifact(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::CorruptArtifact { .. }));
        let _ = fs::remove_dir_all(&dir);
    }
}
