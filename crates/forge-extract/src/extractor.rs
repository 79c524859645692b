//! Candidate parsing, sentinel filtering and selection

use crate::scan::scan_spans;
use serde_json::{Map, Value};
use std::ops::Range;

/// Generic structured map recovered from model output
pub type Record = Map<String, Value>;

/// One parsed candidate and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub value: Record,
    /// Byte range in the raw response
    pub source_span: Range<usize>,
}

impl ExtractedRecord {
    /// Value at a dot-separated path
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.value.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Trimmed, non-empty string field
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn into_value(self) -> Record {
        self.value
    }
}

/// Why no record could be selected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("no balanced structured span found")]
    NoCandidateFound,

    #[error("{spans} structured span(s) found, none parsed")]
    MalformedOnly { spans: usize },

    #[error("{parsed} candidate(s) parsed ({sentinels} template echo), none valid")]
    NoValidCandidate { parsed: usize, sentinels: usize },
}

/// Configurable extractor
///
/// With no sentinel fields configured every parsed candidate reaches the
/// validity predicate.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    sentinel_fields: Vec<String>,
    placeholders: Vec<String>,
}

impl Extractor {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserved field whose blank value marks a schema-template echo
    #[inline]
    #[must_use]
    pub fn with_sentinel_field(mut self, field: impl Into<String>) -> Self {
        self.sentinel_fields.push(field.into());
        self
    }

    /// Value of a sentinel field that also marks an echo (case-insensitive)
    #[inline]
    #[must_use]
    pub fn with_placeholder(mut self, value: impl Into<String>) -> Self {
        self.placeholders.push(value.into());
        self
    }

    #[must_use]
    pub fn with_placeholders<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values.into_iter().fold(self, Self::with_placeholder)
    }

    /// Every candidate span that parses as an object, in source order
    #[must_use]
    pub fn candidates(&self, raw: &str) -> Vec<ExtractedRecord> {
        scan_spans(raw)
            .into_iter()
            .filter_map(|span| parse_span(raw, span))
            .collect()
    }

    /// True when a candidate is a template echo and must never be selected
    #[must_use]
    pub fn is_sentinel(&self, record: &Record) -> bool {
        self.sentinel_fields.iter().any(|field| match record.get(field) {
            None => false,
            Some(Value::Null) => true,
            Some(Value::String(s)) => {
                let s = s.trim();
                s.is_empty() || self.placeholders.iter().any(|p| s.eq_ignore_ascii_case(p))
            }
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        })
    }

    /// Select the first non-sentinel candidate accepted by `is_valid`
    ///
    /// # Errors
    /// - [`ExtractionFailure::NoCandidateFound`] when the text holds no closed span
    /// - [`ExtractionFailure::MalformedOnly`] when every span fails to parse
    /// - [`ExtractionFailure::NoValidCandidate`] when candidates parsed but none qualified
    pub fn extract<F>(&self, raw: &str, is_valid: F) -> Result<ExtractedRecord, ExtractionFailure>
    where
        F: Fn(&Record) -> bool,
    {
        self.extract_decoded(raw, |record| is_valid(record).then_some(()))
            .map(|(record, ())| record)
    }

    /// Like [`extract`](Self::extract), but the predicate also decodes
    ///
    /// `decode` returning `Some` marks the candidate valid; the decoded value
    /// is returned alongside the record so callers never decode twice.
    ///
    /// # Errors
    /// Same as [`extract`](Self::extract).
    pub fn extract_decoded<T, F>(
        &self,
        raw: &str,
        decode: F,
    ) -> Result<(ExtractedRecord, T), ExtractionFailure>
    where
        F: Fn(&Record) -> Option<T>,
    {
        let spans = scan_spans(raw);
        if spans.is_empty() {
            return Err(ExtractionFailure::NoCandidateFound);
        }

        let span_count = spans.len();
        let mut parsed = 0;
        let mut sentinels = 0;
        for span in spans {
            let Some(candidate) = parse_span(raw, span) else {
                continue;
            };
            parsed += 1;
            if self.is_sentinel(&candidate.value) {
                sentinels += 1;
                tracing::debug!(span = ?candidate.source_span, "skipping template echo");
                continue;
            }
            if let Some(decoded) = decode(&candidate.value) {
                return Ok((candidate, decoded));
            }
        }

        tracing::debug!(span_count, parsed, sentinels, "no valid structured candidate");
        if parsed == 0 {
            Err(ExtractionFailure::MalformedOnly { spans: span_count })
        } else {
            Err(ExtractionFailure::NoValidCandidate { parsed, sentinels })
        }
    }
}

fn parse_span(raw: &str, span: Range<usize>) -> Option<ExtractedRecord> {
    serde_json::from_str::<Record>(&raw[span.clone()])
        .ok()
        .map(|value| ExtractedRecord {
            value,
            source_span: span,
        })
}

/// [`Extractor::extract`] without sentinel filtering
///
/// # Errors
/// See [`Extractor::extract`].
pub fn extract<F>(raw: &str, is_valid: F) -> Result<ExtractedRecord, ExtractionFailure>
where
    F: Fn(&Record) -> bool,
{
    Extractor::new().extract(raw, is_valid)
}
