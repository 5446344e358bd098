//! Iterator contract and the shared range cursor.
//!
//! Every engine adapter hands [`RangeIter`] a native scan over the requested
//! range, already in the requested direction. `RangeIter` owns the parts of
//! the contract that must not vary between engines: boundary checks,
//! permanent invalidation, error capture and owned key/value copies.

use crate::error::DbError;
use std::ops::Bound;
use tracing::warn;

/// An owned key/value pair.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// A native scan handed to [`RangeIter`] by an engine adapter.
///
/// Dropping the source must release whatever the engine holds for it
/// (read transaction, snapshot, cursor).
pub(crate) type Source = Box<dyn Iterator<Item = Result<KvPair, DbError>>>;

/// A cursor over a half-open key range `[start, end)`.
///
/// # Contract
///
/// - A forward iterator yields keys in ascending byte order, a reverse
///   iterator in descending order, over the same set of keys.
/// - Once [`valid`](Self::valid) returns false it never returns true again.
/// - [`next`](Self::next), [`key`](Self::key) and [`value`](Self::value) panic
///   on an invalid iterator. Calling them there is a programming error.
/// - Returned keys and values are owned copies; advancing never changes
///   bytes handed out earlier.
/// - Engine errors are captured in [`error`](Self::error) and invalidate the
///   iterator instead of being raised per step.
///
/// # Concurrency caveats
///
/// Whether writes made after the iterator was opened are visible depends on
/// the engine. See the adapter types for details.
pub trait DbIterator {
    /// Returns the range this iterator was created with.
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>);

    /// Returns true while the iterator is positioned on an in-range key.
    fn valid(&self) -> bool;

    /// Moves to the next key in the iteration direction.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is invalid.
    fn next(&mut self);

    /// Returns a copy of the current key.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is invalid.
    fn key(&self) -> Vec<u8>;

    /// Returns a copy of the current value.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is invalid.
    fn value(&self) -> Vec<u8>;

    /// Returns the engine error that ended iteration, if any.
    fn error(&self) -> Option<&DbError>;

    /// Releases the engine resources held by the iterator.
    ///
    /// The iterator is invalid afterwards. Closing twice is a no-op, and
    /// dropping an unclosed iterator releases the same resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to release its resources.
    fn close(&mut self) -> Result<(), DbError>;

    /// Drains the remaining pairs into a vector.
    ///
    /// The iterator is left invalid but not closed.
    fn collect_pairs(&mut self) -> Vec<KvPair> {
        let mut pairs = Vec::new();
        while self.valid() {
            pairs.push((self.key(), self.value()));
            self.next();
        }
        pairs
    }
}

/// The range cursor shared by all engine adapters.
pub struct RangeIter {
    engine: &'static str,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    reverse: bool,
    source: Option<Source>,
    current: Option<KvPair>,
    error: Option<DbError>,
}

impl RangeIter {
    /// Wraps `source` and positions on its first in-range element.
    pub(crate) fn new(
        engine: &'static str,
        source: Source,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Self {
        let mut iter = Self {
            engine,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            reverse,
            source: Some(source),
            current: None,
            error: None,
        };
        iter.advance();
        iter
    }

    /// Returns true for a reverse iterator.
    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    fn in_bounds(&self, key: &[u8]) -> bool {
        if self.reverse {
            self.start.as_deref().map_or(true, |start| key >= start)
        } else {
            self.end.as_deref().map_or(true, |end| key < end)
        }
    }

    /// Pulls the next pair from the source. Any reason to stop (exhaustion,
    /// an engine error, crossing the boundary) drops the source, which both
    /// latches the invalid state and releases the engine resources early.
    fn advance(&mut self) {
        self.current = None;
        let Some(source) = self.source.as_mut() else {
            return;
        };
        match source.next() {
            Some(Ok((key, value))) => {
                if self.in_bounds(&key) {
                    self.current = Some((key, value));
                }
            }
            Some(Err(err)) => {
                warn!(engine = self.engine, error = %err, "iterator stopped on engine error");
                self.error = Some(err);
            }
            None => {}
        }
        if self.current.is_none() {
            self.source = None;
        }
    }

    fn current(&self) -> &KvPair {
        match &self.current {
            Some(pair) => pair,
            None => panic!("iterator is invalid"),
        }
    }
}

impl DbIterator for RangeIter {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) {
        assert!(self.valid(), "iterator is invalid");
        self.advance();
    }

    fn key(&self) -> Vec<u8> {
        self.current().0.clone()
    }

    fn value(&self) -> Vec<u8> {
        self.current().1.clone()
    }

    fn error(&self) -> Option<&DbError> {
        self.error.as_ref()
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.current = None;
        self.source = None;
        Ok(())
    }
}

impl std::fmt::Debug for RangeIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIter")
            .field("engine", &self.engine)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("reverse", &self.reverse)
            .field("valid", &self.valid())
            .finish_non_exhaustive()
    }
}

/// Converts optional bounds into the half-open range engines understand.
///
/// Returns `None` when the range is empty (`start >= end`), since some
/// engines panic when asked for an inverted range.
pub(crate) fn range_bounds<'a>(
    start: Option<&'a [u8]>,
    end: Option<&'a [u8]>,
) -> Option<(Bound<&'a [u8]>, Bound<&'a [u8]>)> {
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return None;
        }
    }
    let lower = start.map_or(Bound::Unbounded, Bound::Included);
    let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
    Some((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(keys: &[&str]) -> Vec<Result<KvPair, DbError>> {
        keys.iter()
            .map(|k| Ok((k.as_bytes().to_vec(), format!("v-{k}").into_bytes())))
            .collect()
    }

    fn keys_of(iter: &mut RangeIter) -> Vec<String> {
        iter.collect_pairs()
            .into_iter()
            .map(|(k, _)| String::from_utf8(k).unwrap())
            .collect()
    }

    #[test]
    fn range_iter_forward_stops_at_end() {
        let source = Box::new(pairs(&["a", "b", "c", "d"]).into_iter());
        let mut iter = RangeIter::new("test", source, Some(b"a"), Some(b"c"), false);
        assert_eq!(keys_of(&mut iter), vec!["a", "b"]);
        assert!(!iter.valid());
    }

    #[test]
    fn range_iter_reverse_stops_below_start() {
        let source = Box::new(pairs(&["d", "c", "b", "a"]).into_iter());
        let mut iter = RangeIter::new("test", source, Some(b"b"), None, true);
        assert_eq!(keys_of(&mut iter), vec!["d", "c", "b"]);
    }

    #[test]
    fn range_iter_invalid_is_permanent() {
        let source = Box::new(pairs(&["a", "z", "b"]).into_iter());
        let mut iter = RangeIter::new("test", source, None, Some(b"m"), false);
        assert!(iter.valid());
        iter.next();
        // "z" crosses the end bound; "b" behind it must never surface.
        assert!(!iter.valid());
        assert!(!iter.valid());
    }

    #[test]
    fn range_iter_captures_engine_error() {
        let items: Vec<Result<KvPair, DbError>> = vec![
            Ok((b"a".to_vec(), b"1".to_vec())),
            Err(DbError::Io(std::io::Error::other("disk gone"))),
            Ok((b"b".to_vec(), b"2".to_vec())),
        ];
        let mut iter = RangeIter::new("test", Box::new(items.into_iter()), None, None, false);
        assert!(iter.valid());
        assert!(iter.error().is_none());
        iter.next();
        assert!(!iter.valid());
        assert!(matches!(iter.error(), Some(DbError::Io(_))));
    }

    #[test]
    fn range_iter_returns_independent_copies() {
        let source = Box::new(pairs(&["a", "b"]).into_iter());
        let mut iter = RangeIter::new("test", source, None, None, false);
        let first_key = iter.key();
        let first_value = iter.value();
        iter.next();
        assert_eq!(first_key, b"a");
        assert_eq!(first_value, b"v-a");
        assert_eq!(iter.key(), b"b");
    }

    #[test]
    fn range_iter_close_is_idempotent() {
        let source = Box::new(pairs(&["a"]).into_iter());
        let mut iter = RangeIter::new("test", source, None, None, false);
        iter.close().unwrap();
        assert!(!iter.valid());
        iter.close().unwrap();
    }

    #[test]
    fn range_iter_domain() {
        let iter = RangeIter::new("test", Box::new(std::iter::empty()), Some(b"a"), None, true);
        assert_eq!(iter.domain(), (Some(&b"a"[..]), None));
        assert!(iter.is_reverse());
    }

    #[test]
    #[should_panic(expected = "iterator is invalid")]
    fn range_iter_next_on_invalid_panics() {
        let mut iter = RangeIter::new("test", Box::new(std::iter::empty()), None, None, false);
        iter.next();
    }

    #[test]
    #[should_panic(expected = "iterator is invalid")]
    fn range_iter_key_on_invalid_panics() {
        let iter = RangeIter::new("test", Box::new(std::iter::empty()), None, None, false);
        let _ = iter.key();
    }

    #[test]
    fn range_bounds_rejects_inverted_range() {
        assert!(range_bounds(Some(b"b"), Some(b"a")).is_none());
        assert!(range_bounds(Some(b"a"), Some(b"a")).is_none());
        assert_eq!(
            range_bounds(Some(b"a"), None),
            Some((Bound::Included(&b"a"[..]), Bound::Unbounded))
        );
    }
}
