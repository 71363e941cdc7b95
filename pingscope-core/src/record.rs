//! Binary record archive.
//!
//! On-disk format (stable): a file is a bare sequence of 12-byte records with
//! no header, footer or count. Each record is little-endian
//! `f64` timestamp (seconds since the Unix epoch) followed by `f32` latency
//! (milliseconds, `+inf` for a loss). The record count is `file_size / 12`.

use crate::error::{Error, Result};
use crate::types::{LatencyMs, Timestamp};
use bytes::{Buf, BufMut};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

pub const RECORD_WIDTH: usize = 12;
const WIDTH: u64 = RECORD_WIDTH as u64;

/// One persisted sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Record {
	pub timestamp: f64,
	pub latency: f32,
}

impl Record {
	pub fn new(timestamp: Timestamp, latency: LatencyMs) -> Self {
		Self { timestamp: timestamp.as_secs_f64(), latency: latency as f32 }
	}

	pub fn timestamp(&self) -> Timestamp { Timestamp::from_secs_f64(self.timestamp) }
	pub fn latency(&self) -> LatencyMs { f64::from(self.latency) }

	pub fn encode(&self) -> [u8; RECORD_WIDTH] {
		let mut out = [0u8; RECORD_WIDTH];
		let mut buf = &mut out[..];
		buf.put_f64_le(self.timestamp);
		buf.put_f32_le(self.latency);
		out
	}

	/// Decode the first record of `buf`. Extra trailing bytes are ignored.
	pub fn decode(mut buf: &[u8]) -> Result<Self> {
		if buf.len() < RECORD_WIDTH {
			return Err(Error::CorruptRecord { len: buf.len() });
		}
		let timestamp = buf.get_f64_le();
		let latency = buf.get_f32_le();
		Ok(Self { timestamp, latency })
	}
}

/// Append-only writer of records.
pub struct RecordWriter {
	out: BufWriter<File>,
	written: u64,
}

impl RecordWriter {
	/// Open `path` for appending, creating it if needed. An existing file
	/// must already be a whole number of records.
	pub fn append(path: impl AsRef<Path>) -> Result<Self> {
		let file = OpenOptions::new().create(true).append(true).open(path)?;
		let len = file.metadata()?.len();
		if len % WIDTH != 0 {
			return Err(Error::CorruptFile { len });
		}
		Ok(Self { out: BufWriter::new(file), written: 0 })
	}

	pub fn write(&mut self, record: &Record) -> Result<()> {
		self.out.write_all(&record.encode())?;
		self.written += 1;
		Ok(())
	}

	pub fn written(&self) -> u64 { self.written }

	/// Flush buffered records to disk.
	pub fn finish(mut self) -> Result<u64> {
		self.out.flush()?;
		Ok(self.written)
	}
}

/// Read-only handle on a record file, sized once at open.
///
/// Appends made by another process after `open` are not seen.
pub struct RecordFile {
	file: File,
	count: u64,
}

impl RecordFile {
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let file = File::open(path)?;
		let len = file.metadata()?.len();
		if len % WIDTH != 0 {
			return Err(Error::CorruptFile { len });
		}
		Ok(Self { file, count: len / WIDTH })
	}

	pub fn len(&self) -> u64 { self.count }
	pub fn is_empty(&self) -> bool { self.count == 0 }

	/// Read `count` records starting at record `index`.
	fn read_range(&mut self, index: u64, count: u64) -> Result<Vec<Record>> {
		self.file.seek(SeekFrom::Start(index * WIDTH))?;
		let mut reader = BufReader::new((&self.file).take(count * WIDTH));
		let mut out = Vec::with_capacity(count as usize);
		let mut buf = [0u8; RECORD_WIDTH];
		for _ in 0..count {
			reader.read_exact(&mut buf)?;
			out.push(Record::decode(&buf)?);
		}
		Ok(out)
	}

	pub fn get(&mut self, index: u64) -> Result<Record> {
		if index >= self.count {
			return Err(Error::OutOfRange { requested: index + 1, available: self.count });
		}
		let mut buf = [0u8; RECORD_WIDTH];
		self.file.seek(SeekFrom::Start(index * WIDTH))?;
		self.file.read_exact(&mut buf)?;
		Record::decode(&buf)
	}

	/// The last `k` records, oldest first. Records before the tail are never read.
	pub fn tail(&mut self, k: u64) -> Result<Vec<Record>> {
		if k > self.count {
			return Err(Error::OutOfRange { requested: k, available: self.count });
		}
		self.read_range(self.count - k, k)
	}

	pub fn read_all(&mut self) -> Result<Vec<Record>> { self.read_range(0, self.count) }

	/// Every record with a timestamp at or after `cutoff`.
	///
	/// Records are assumed to be appended in time order; the first match is
	/// located by binary search, so only O(log n) records precede the read.
	pub fn since(&mut self, cutoff: Timestamp) -> Result<Vec<Record>> {
		let cutoff = cutoff.as_secs_f64();
		let (mut lo, mut hi) = (0, self.count);
		while lo < hi {
			let mid = lo + (hi - lo) / 2;
			if self.get(mid)?.timestamp < cutoff { lo = mid + 1 } else { hi = mid }
		}
		debug!(first = lo, total = self.count, "record cutoff located");
		self.read_range(lo, self.count - lo)
	}
}

/// Number of records in the file at `path`.
pub fn record_count(path: impl AsRef<Path>) -> Result<u64> { Ok(RecordFile::open(path)?.len()) }

/// The last `k` records of the file at `path`, oldest first.
pub fn tail_records(path: impl AsRef<Path>, k: u64) -> Result<Vec<Record>> { RecordFile::open(path)?.tail(k) }

/// Every record of the file at `path`.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> { RecordFile::open(path)?.read_all() }
