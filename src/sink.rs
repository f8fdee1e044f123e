//! destinations for finished [LogRecord]s

use std::{
	io::{self, Write},
	sync::Mutex,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::record::{LogRecord, RecordFormat};

/// a record couldn't be handed to the sink
#[derive(Error, Debug)]
pub enum EmitError {
	/// encoding the record failed
	#[error("failed to encode log record: {0}")]
	Encode(#[from] serde_json::Error),
	/// the underlying writer returned an error
	#[error("failed to write log record: {0}")]
	Write(#[from] io::Error),
	/// a previous writer panicked while holding the lock
	#[error("log writer is poisoned")]
	Poisoned,
}

/// Accepts structured records, one at a time.
///
/// Implementations must write each record atomically: records written from
/// different threads never interleave.
pub trait RecordSink: Send + Sync {
	/// point in time stamped onto the next record
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}

	fn write_record(&self, record: &LogRecord) -> Result<(), EmitError>;
}

/// Writes every record as one line into `W`
#[derive(Debug)]
pub struct WriterSink<W> {
	format: RecordFormat,
	writer: Mutex<W>,
}

impl<W: Write> WriterSink<W> {
	pub fn new(format: RecordFormat, writer: W) -> Self {
		Self { format, writer: Mutex::new(writer) }
	}

	/// Returns the wrapped writer
	#[cfg(test)]
	pub fn into_inner(self) -> Result<W, EmitError> {
		self.writer.into_inner().map_err(|_| EmitError::Poisoned)
	}
}

impl WriterSink<io::Stdout> {
	/// the sink used by the receiver
	pub fn stdout(format: RecordFormat) -> Self {
		Self::new(format, io::stdout())
	}
}

impl<W: Write + Send> RecordSink for WriterSink<W> {
	fn write_record(&self, record: &LogRecord) -> Result<(), EmitError> {
		// encode outside of the lock, the write itself is a single call
		let mut line = Vec::with_capacity(256);
		self.format.encode(record, &mut line)?;

		let mut writer = self.writer.lock().map_err(|_| EmitError::Poisoned)?;
		writer.write_all(&line)?;
		writer.flush()?;

		Ok(())
	}
}
