//! Scan command implementation.

use super::{CliError, CliResult, Codec, Format, PairOutput};
use locket_db::{Db, DbIterator};
use std::io::Write;

/// Options for the scan command.
#[derive(Debug, Default)]
pub struct ScanOptions<'a> {
    /// Inclusive lower bound.
    pub start: Option<&'a str>,
    /// Exclusive upper bound.
    pub end: Option<&'a str>,
    /// Iterate in descending order.
    pub reverse: bool,
    /// Stop after this many pairs.
    pub limit: Option<usize>,
}

/// Runs the scan command.
pub fn run(
    db: &dyn Db,
    codec: Codec,
    options: &ScanOptions<'_>,
    format: Format,
    out: &mut dyn Write,
) -> CliResult<()> {
    let start = options.start.map(|s| codec.decode(s)).transpose()?;
    let end = options.end.map(|e| codec.decode(e)).transpose()?;

    let mut iter = if options.reverse {
        db.reverse_iterator(start.as_deref(), end.as_deref())?
    } else {
        db.iterator(start.as_deref(), end.as_deref())?
    };

    let pairs = drain(&mut *iter, codec, options.limit)?;

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&pairs)?)?,
        Format::Text => {
            for pair in &pairs {
                writeln!(out, "{}\t{}", pair.key, pair.value.as_deref().unwrap_or_default())?;
            }
        }
    }
    Ok(())
}

/// Reads up to `limit` pairs and closes the iterator.
///
/// Fails without returning any pairs if the engine stopped the scan early.
fn drain(iter: &mut dyn DbIterator, codec: Codec, limit: Option<usize>) -> CliResult<Vec<PairOutput>> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut pairs = Vec::new();
    while iter.valid() && pairs.len() < limit {
        pairs.push(PairOutput {
            key: codec.encode(&iter.key()),
            value: Some(codec.encode(&iter.value())),
        });
        iter.next();
    }
    let failed = iter.error().map(ToString::to_string);
    iter.close()?;
    match failed {
        Some(message) => Err(CliError::ScanFailed(message)),
        None => Ok(pairs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locket_db::{DbError, MemDb};
    use std::io;

    /// Yields `good` pairs, then fails as an engine would.
    struct FailingIter {
        good: usize,
        pos: usize,
        err: Option<DbError>,
    }

    impl DbIterator for FailingIter {
        fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
            (None, None)
        }

        fn valid(&self) -> bool {
            self.err.is_none() && self.pos < self.good
        }

        fn next(&mut self) {
            assert!(self.valid(), "next on invalid iterator");
            self.pos += 1;
            if self.pos == self.good {
                self.err = Some(DbError::Io(io::Error::other("disk gone")));
            }
        }

        fn key(&self) -> Vec<u8> {
            vec![b'a' + self.pos as u8]
        }

        fn value(&self) -> Vec<u8> {
            b"v".to_vec()
        }

        fn error(&self) -> Option<&DbError> {
            self.err.as_ref()
        }

        fn close(&mut self) -> Result<(), DbError> {
            Ok(())
        }
    }

    fn seeded() -> MemDb {
        let db = MemDb::new();
        for key in ["A", "B", "C", "D", "E"] {
            db.set(key.as_bytes(), key.to_lowercase().as_bytes()).unwrap();
        }
        db
    }

    fn run_text(db: &dyn Db, options: &ScanOptions<'_>) -> String {
        let mut out = Vec::new();
        run(db, Codec { hex: false }, options, Format::Text, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_scan_range() {
        let db = seeded();
        let options = ScanOptions {
            start: Some("A"),
            end: Some("D"),
            ..ScanOptions::default()
        };
        assert_eq!(run_text(&db, &options), "A\ta\nB\tb\nC\tc\n");
    }

    #[test]
    fn test_scan_reverse_with_limit() {
        let db = seeded();
        let options = ScanOptions {
            reverse: true,
            limit: Some(2),
            ..ScanOptions::default()
        };
        assert_eq!(run_text(&db, &options), "E\te\nD\td\n");
    }

    #[test]
    fn test_scan_json() {
        let db = seeded();
        let options = ScanOptions {
            start: Some("D"),
            ..ScanOptions::default()
        };
        let mut out = Vec::new();
        run(&db, Codec { hex: true }, &options, Format::Json, &mut out).unwrap_err();

        let mut out = Vec::new();
        let options = ScanOptions {
            start: Some("44"),
            ..ScanOptions::default()
        };
        run(&db, Codec { hex: true }, &options, Format::Json, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["key"], "44");
        assert_eq!(json[1]["value"], "65");
    }

    #[test]
    fn test_scan_engine_error_fails() {
        let mut iter = FailingIter {
            good: 2,
            pos: 0,
            err: None,
        };
        let err = drain(&mut iter, Codec { hex: false }, None).err().unwrap();
        assert!(matches!(&err, CliError::ScanFailed(message) if message.contains("disk gone")));
    }

    #[test]
    fn test_scan_limit_stops_before_engine_error() {
        let mut iter = FailingIter {
            good: 2,
            pos: 0,
            err: None,
        };
        let pairs = drain(&mut iter, Codec { hex: false }, Some(1)).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key, "a");
    }
}
