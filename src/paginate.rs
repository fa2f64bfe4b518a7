// Delivery policy for text that may not fit in one chat message.

/// Discord rejects messages over 2000 characters; stay safely below that.
pub const SINGLE_MESSAGE_LIMIT: usize = 1900;

/// Beyond this many chunks the text is uploaded as a file instead.
pub const MAX_PAGES: usize = 5;

/// How a block of text should be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paged {
    /// Fits in one message.
    Single(String),
    /// Contiguous slices of at most `limit` characters each, in order.
    Chunks(Vec<String>),
    /// Too long to page inline; send the whole text as an attachment.
    File(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    limit: usize,
    max_pages: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            limit: SINGLE_MESSAGE_LIMIT,
            max_pages: MAX_PAGES,
        }
    }
}

impl Paginator {
    /// Returns `None` for a zero `limit`.
    pub fn new(limit: usize, max_pages: usize) -> Option<Self> {
        if limit == 0 {
            return None;
        }
        Some(Self { limit, max_pages })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Number of `limit`-sized pages needed for a text of `len` characters.
    pub fn page_count(&self, len: usize) -> usize {
        len.div_ceil(self.limit)
    }

    /// Pick single message, chunked messages, or file upload for `text`.
    ///
    /// Lengths are measured in characters, and chunks are cut at character
    /// boundaries without regard for line breaks.
    pub fn plan(&self, text: String) -> Paged {
        let len = text.chars().count();
        if len <= self.limit {
            return Paged::Single(text);
        }
        if self.page_count(len) <= self.max_pages {
            return Paged::Chunks(chunk_chars(&text, self.limit));
        }
        Paged::File(text)
    }
}

/// Split `text` into consecutive slices of at most `limit` characters.
fn chunk_chars(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == limit {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    chunks
}
