//! # Frame Scanner Module
//!
//! Splits the raw link text into `;`-terminated frames. The link delivers
//! chunks with arbitrary boundaries, so whatever follows the last delimiter of
//! a chunk is handed back as a trailing fragment and the decoder decides
//! whether to hold it in the [`FrameCache`] for the next call.
//!
//! ## Key Types
//! - `FrameCache`: Per-link leftover text between decode calls
//! - `Frames`: One scan result, borrowing frames out of the combined text

/// Terminates every frame of the device protocol.
pub const FRAME_DELIMITER: char = ';';

/// Unterminated text carried from one decode call to the next.
///
/// One cache per physical link. It never holds a delimiter-terminated frame:
/// every scan drains it into the combined text first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCache {
    pending: String,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Store an incomplete fragment for the next scan.
    pub fn hold(&mut self, fragment: &str) {
        debug_assert!(!fragment.contains(FRAME_DELIMITER));
        self.pending.clear();
        self.pending.push_str(fragment);
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

/// Result of scanning one chunk: the cached prefix plus the chunk, split at
/// the last delimiter.
#[derive(Debug)]
pub struct Frames {
    text: String,
    terminated_len: usize,
}

impl Frames {
    /// Non-empty, delimiter-terminated frames in arrival order.
    pub fn complete(&self) -> impl Iterator<Item = &str> {
        self.text[..self.terminated_len]
            .split(FRAME_DELIMITER)
            .filter(|frame| !frame.is_empty())
    }

    /// Text after the last delimiter, if any.
    pub fn trailing(&self) -> Option<&str> {
        let rest = &self.text[self.terminated_len..];
        (!rest.is_empty()).then_some(rest)
    }
}

/// Prepend the cached fragment to `chunk` and split on [`FRAME_DELIMITER`].
///
/// The cache is always left empty; holding the trailing fragment again is the
/// caller's decision.
pub fn scan(chunk: &str, cache: &mut FrameCache) -> Frames {
    let mut text = cache.take();
    text.push_str(chunk);

    let terminated_len = text
        .rfind(FRAME_DELIMITER)
        .map(|idx| idx + FRAME_DELIMITER.len_utf8())
        .unwrap_or(0);

    Frames {
        text,
        terminated_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_complete_frames() {
        let mut cache = FrameCache::new();
        let frames = scan("t1p1;t2p2;", &mut cache);

        assert_eq!(frames.complete().collect::<Vec<_>>(), vec!["t1p1", "t2p2"]);
        assert_eq!(frames.trailing(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_scan_returns_trailing_fragment() {
        let mut cache = FrameCache::new();
        let frames = scan("t1p1;t2", &mut cache);

        assert_eq!(frames.complete().collect::<Vec<_>>(), vec!["t1p1"]);
        assert_eq!(frames.trailing(), Some("t2"));
    }

    #[test]
    fn test_scan_prepends_cache() {
        let mut cache = FrameCache::new();
        cache.hold("t28");
        let frames = scan("31p10.2;", &mut cache);

        assert_eq!(frames.complete().collect::<Vec<_>>(), vec!["t2831p10.2"]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_scan_skips_empty_frames() {
        let mut cache = FrameCache::new();
        let frames = scan(";;;", &mut cache);

        assert_eq!(frames.complete().count(), 0);
        assert_eq!(frames.trailing(), None);
    }

    #[test]
    fn test_scan_empty_chunk_with_empty_cache() {
        let mut cache = FrameCache::new();
        let frames = scan("", &mut cache);

        assert_eq!(frames.complete().count(), 0);
        assert_eq!(frames.trailing(), None);
    }

    #[test]
    fn test_scan_without_delimiter_is_all_trailing() {
        let mut cache = FrameCache::new();
        cache.hold("t1");
        let frames = scan("00p", &mut cache);

        assert_eq!(frames.complete().count(), 0);
        assert_eq!(frames.trailing(), Some("t100p"));
    }
}
