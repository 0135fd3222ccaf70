//! Size-bounded message segmentation for chat transports.
//!
//! Text is packed line by line into segments whose payload stays within the
//! transport limit. Payloads concatenate back to the exact input; the prefix of
//! the first segment and the continuation marker of the others are added on
//! top of the payload.

/// Payload ceiling for a single chat message, in bytes.
pub const CHAT_SEGMENT_LIMIT: usize = 3000;

/// Prefix of every segment after the first.
pub const CONTINUED_MARKER: &str = "continued long message...";

/// How a segment is turned into transport text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentStyle {
    /// `prefix\npayload`, or the payload alone when there is no prefix.
    #[default]
    Plain,
    /// `prefix\n```payload```` ; an empty payload renders the prefix alone.
    CodeBlock,
}

/// One transport-sized piece of a longer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub prefix: &'a str,
    pub payload: &'a str,
}

impl Segment<'_> {
    pub fn render(&self, style: SegmentStyle) -> String {
        match style {
            SegmentStyle::Plain if self.prefix.is_empty() => self.payload.to_string(),
            SegmentStyle::Plain if self.payload.is_empty() => self.prefix.to_string(),
            SegmentStyle::Plain => format!("{}\n{}", self.prefix, self.payload),
            SegmentStyle::CodeBlock if self.payload.is_empty() => self.prefix.to_string(),
            SegmentStyle::CodeBlock => format!("{}\n```{}```", self.prefix, self.payload),
        }
    }
}

/// Greedy line packer with a fixed payload limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageFormatter {
    limit: usize,
    style: SegmentStyle,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new(CHAT_SEGMENT_LIMIT)
    }
}

impl MessageFormatter {
    /// A formatter producing payloads of at most `limit` bytes (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            style: SegmentStyle::Plain,
        }
    }

    pub fn with_style(mut self, style: SegmentStyle) -> Self {
        self.style = style;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Split `text` into payloads of at most `limit` bytes.
    ///
    /// Lines keep their trailing newline and are never divided, unless a single
    /// line is longer than the limit; such a line is cut at character boundaries.
    /// Always returns at least one (possibly empty) payload.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.len() <= self.limit {
            return vec![text];
        }

        let mut segments = Vec::new();
        let mut start = 0;
        let mut end = 0;

        for line in text.split_inclusive('\n') {
            if end - start + line.len() > self.limit && end > start {
                segments.push(&text[start..end]);
                start = end;
            }

            if line.len() > self.limit {
                let line_end = end + line.len();
                while line_end - start > self.limit {
                    let cut = floor_char_boundary(text, start + self.limit).max(
                        // a limit smaller than one character still makes progress
                        ceil_char_boundary(text, start + 1),
                    );
                    segments.push(&text[start..cut]);
                    start = cut;
                }
                end = line_end;
            } else {
                end += line.len();
            }
        }

        if end > start || segments.is_empty() {
            segments.push(&text[start..end]);
        }
        segments
    }

    /// Split `text` and attach `prefix` to the first segment and
    /// [`CONTINUED_MARKER`] to the rest.
    pub fn segments<'a>(&self, prefix: &'a str, text: &'a str) -> Vec<Segment<'a>> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(idx, payload)| Segment {
                prefix: if idx == 0 { prefix } else { CONTINUED_MARKER },
                payload,
            })
            .collect()
    }

    /// Rendered transport texts for `text`.
    pub fn format(&self, prefix: &str, text: &str) -> Vec<String> {
        self.segments(prefix, text)
            .iter()
            .map(|segment| segment.render(self.style))
            .collect()
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
