//! AcquisitionReader / AcquisitionWriter behaviour around missing inputs and
//! failed updates.

use c3d::prelude::*;
use std::fs;

fn small_trial() -> Acquisition {
    let mut acq = Acquisition::new();
    acq.init(1, 3, 0, 1);
    acq.set_point_frequency(100.0);
    acq.point_mut(0).unwrap().set_label("HEAD");
    acq
}

#[test]
fn test_reader_requires_filename() {
    let mut reader = AcquisitionReader::new();
    let err = reader.update().unwrap_err();
    assert!(matches!(err, Error::FilenameNotSpecified));
    assert_eq!(err.to_string(), "Filename must be specified.");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_writer_requires_filename_and_input() {
    let mut writer = AcquisitionWriter::new();
    assert!(matches!(writer.update(), Err(Error::FilenameNotSpecified)));

    writer.set_filename("unused.c3d");
    assert!(matches!(writer.update(), Err(Error::NoInput)));
}

#[test]
fn test_writer_unknown_extension() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trial.trc");
    let mut writer = AcquisitionWriter::new();
    writer.set_input(share(small_trial()));
    writer.set_filename(&path);
    assert!(matches!(writer.update(), Err(Error::UnsupportedFormat(_))));
    assert!(!path.exists());

    // an explicit codec does not need the extension
    writer.set_codec(shared(C3dCodec::new()));
    writer.update()?;
    assert!(path.exists());
    Ok(())
}

#[test]
fn test_failed_encode_creates_no_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("never.c3d");
    let mut codec = C3dCodec::new();
    codec.set_byte_order(ByteOrder::NotApplicable);

    let mut writer = AcquisitionWriter::new();
    writer.set_input(share(small_trial()));
    writer.set_codec(shared(codec));
    writer.set_filename(&path);
    let err = writer.update().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_missing_file() {
    let mut reader = AcquisitionReader::new();
    reader.set_filename("/nonexistent/dir/trial.c3d");
    let err = reader.update().unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_failed_read_keeps_previous_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("good.c3d");
    let bad = dir.path().join("bad.c3d");

    let mut writer = AcquisitionWriter::new();
    writer.set_input(share(small_trial()));
    writer.set_filename(&good);
    writer.update()?;
    fs::write(&bad, vec![0u8; 2048])?;

    let mut reader = AcquisitionReader::new();
    reader.set_filename(&good);
    reader.update()?;
    let output = reader.output();
    assert_eq!(output.read().point(0).unwrap().label(), "HEAD");

    reader.set_filename(&bad);
    assert!(reader.update().is_err());
    assert_eq!(output.read().point_number(), 1);
    assert_eq!(output.read().point(0).unwrap().label(), "HEAD");
    assert_eq!(output.read().point_frequency(), 100.0);
    Ok(())
}

#[test]
fn test_truncated_data_keeps_previous_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("good.c3d");
    let long = dir.path().join("long.c3d");
    let cut = dir.path().join("cut.c3d");

    let mut writer = AcquisitionWriter::new();
    writer.set_input(share(small_trial()));
    writer.set_filename(&good);
    writer.update()?;

    // 200 frames of two points: the data section spans several blocks
    let mut trial = Acquisition::new();
    trial.init(2, 200, 0, 1);
    trial.set_point_frequency(100.0);
    writer.set_input(share(trial));
    writer.set_filename(&long);
    writer.update()?;
    let bytes = fs::read(&long)?;
    fs::write(&cut, &bytes[..bytes.len() - 1024])?;

    let mut reader = AcquisitionReader::new();
    reader.set_filename(&good);
    reader.update()?;
    let output = reader.output();
    let stamp = output.read().timestamp();

    reader.set_filename(&cut);
    let err = reader.update().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    let acq = output.read();
    assert_eq!(acq.point_number(), 1);
    assert_eq!(acq.point_frame_number(), 3);
    assert_eq!(acq.point(0).unwrap().label(), "HEAD");
    assert_eq!(acq.timestamp(), stamp);
    drop(acq);

    // the complete file still reads
    reader.set_filename(&long);
    reader.update()?;
    assert_eq!(reader.output().read().point_frame_number(), 200);
    Ok(())
}

#[test]
fn test_reader_update_is_idempotent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("once.c3d");
    let mut writer = AcquisitionWriter::new();
    writer.set_input(share(small_trial()));
    writer.set_filename(&path);
    writer.update()?;

    let mut reader = AcquisitionReader::new();
    reader.set_filename(&path);
    reader.update()?;
    let stamp = reader.output().read().timestamp();

    // unchanged filename: nothing is decoded again
    fs::remove_file(&path)?;
    reader.update()?;
    assert_eq!(reader.output().read().timestamp(), stamp);
    Ok(())
}

#[test]
fn test_buffered_and_mapped_reads_agree() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("same.c3d");
    let mut writer = AcquisitionWriter::new();
    writer.set_input(share(small_trial()));
    writer.set_filename(&path);
    writer.update()?;

    let mut mapped = AcquisitionReader::new();
    mapped.set_filename(&path);
    mapped.update()?;

    let mut buffered = AcquisitionReader::new();
    buffered.set_use_mmap(false);
    buffered.set_filename(&path);
    buffered.update()?;

    let a = mapped.output();
    let b = buffered.output();
    let (a, b) = (a.read(), b.read());
    assert_eq!(a.point_number(), b.point_number());
    for (p, q) in a.points().iter().zip(b.points()) {
        assert_eq!(p.label(), q.label());
        assert_eq!(p.values(), q.values());
        assert_eq!(p.residuals(), q.residuals());
    }
    assert_eq!(a.metadata(), b.metadata());
    Ok(())
}
