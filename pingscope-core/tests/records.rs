use pingscope_core::record::{read_records, record_count, tail_records, Record, RecordFile, RecordWriter};
use pingscope_core::{Error, Timestamp};
use proptest::prelude::*;
use std::path::Path;

fn write(path: &Path, records: &[Record]) {
	let mut w = RecordWriter::append(path).unwrap();
	for r in records { w.write(r).unwrap(); }
	assert_eq!(w.finish().unwrap(), records.len() as u64);
}

fn three() -> Vec<Record> {
	vec![
		Record { timestamp: 1_600_000_000.0, latency: 10.0 },
		Record { timestamp: 1_600_000_001.0, latency: f32::INFINITY },
		Record { timestamp: 1_600_000_002.5, latency: 12.25 },
	]
}

#[test]
fn tail_of_two_from_three() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("ping.bin");
	write(&path, &three());
	assert_eq!(std::fs::metadata(&path).unwrap().len(), 36);
	let tail = tail_records(&path, 2).unwrap();
	assert_eq!(tail, three()[1..].to_vec());
}

#[test]
fn tail_of_everything_and_beyond() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("ping.bin");
	write(&path, &three());
	assert_eq!(record_count(&path).unwrap(), 3);
	assert_eq!(tail_records(&path, 3).unwrap(), three());
	assert_eq!(read_records(&path).unwrap(), three());
	assert!(tail_records(&path, 0).unwrap().is_empty());
	let err = tail_records(&path, 4).unwrap_err();
	assert!(matches!(err, Error::OutOfRange { requested: 4, available: 3 }));
}

#[test]
fn appending_continues_the_archive() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("ping.bin");
	let all = three();
	write(&path, &all[..1]);
	write(&path, &all[1..]);
	assert_eq!(read_records(&path).unwrap(), all);
}

#[test]
fn partial_trailing_record_is_corrupt() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("ping.bin");
	let mut bytes = Vec::new();
	for r in three() { bytes.extend_from_slice(&r.encode()); }
	bytes.push(0);
	std::fs::write(&path, &bytes).unwrap();
	assert!(matches!(tail_records(&path, 1), Err(Error::CorruptFile { len: 37 })));
	assert!(matches!(RecordWriter::append(&path), Err(Error::CorruptFile { .. })));
}

#[test]
fn since_finds_first_record_at_cutoff() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("ping.bin");
	let records: Vec<Record> = (0..100).map(|i| Record { timestamp: 1000.0 + i as f64, latency: i as f32 }).collect();
	write(&path, &records);
	let mut f = RecordFile::open(&path).unwrap();
	let got = f.since(Timestamp::from_secs_f64(1090.0)).unwrap();
	assert_eq!(got, records[90..].to_vec());
	assert_eq!(f.since(Timestamp::from_secs_f64(0.0)).unwrap().len(), 100);
	assert!(f.since(Timestamp::from_secs_f64(5000.0)).unwrap().is_empty());
}

proptest! {
	#[test]
	fn codec_roundtrip(
		timestamp in 0.0f64..4.0e9,
		latency in prop_oneof![(0.0f32..1.0e6), Just(f32::INFINITY)],
	) {
		let r = Record { timestamp, latency };
		let back = Record::decode(&r.encode()).unwrap();
		prop_assert_eq!(back, r);
	}
}
