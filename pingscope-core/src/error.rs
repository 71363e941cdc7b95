use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	#[error("config: {0}")]
	Config(String),
	/// A text line that looked like a reply or timeout but could not be decoded.
	#[error("malformed line {line}: {reason}")]
	MalformedLine { line: usize, reason: String },
	/// Binary buffer shorter than one record.
	#[error("corrupt record: got {len} bytes, need {}", crate::record::RECORD_WIDTH)]
	CorruptRecord { len: usize },
	/// Record file whose size is not a whole number of records.
	#[error("corrupt record file: {len} bytes is not a multiple of {}", crate::record::RECORD_WIDTH)]
	CorruptFile { len: u64 },
	#[error("requested {requested} records but only {available} exist")]
	OutOfRange { requested: u64, available: u64 },
	/// Series input went backwards in time at `index`.
	#[error("timestamp at index {index} precedes its predecessor")]
	Unordered { index: usize },
}

impl Error {
	pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }
	pub fn malformed(line: usize, reason: impl Into<String>) -> Self { Self::MalformedLine { line, reason: reason.into() } }

	/// True for errors that a lenient reader may skip and count.
	pub fn is_line_error(&self) -> bool { matches!(self, Self::MalformedLine { .. }) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_name_the_problem() {
		let e = Error::malformed(7, "missing timestamp");
		assert_eq!(e.to_string(), "malformed line 7: missing timestamp");
		assert!(e.is_line_error());
		let e = Error::CorruptFile { len: 13 };
		assert!(e.to_string().contains("multiple of 12"));
		assert!(!e.is_line_error());
	}
}
