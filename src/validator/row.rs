use crate::errors::RuleError;
use crate::utils::trim_if_needed;

/// One input line split into trimmed columns.
///
/// The raw line is stored once; columns are byte spans into it, so splitting
/// and trimming never allocate per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    raw: String,
    spans: Vec<(usize, usize)>,
}

impl Row {
    /// Split `raw` on `delimiter` and trim each column. An empty line yields
    /// a single empty column; an empty delimiter leaves the line unsplit.
    pub fn split(raw: &str, delimiter: &str) -> Self {
        let mut spans = Vec::new();
        let mut start = 0;

        if !delimiter.is_empty() {
            for (index, _) in raw.match_indices(delimiter) {
                spans.push(trimmed_span(raw, start, index));
                start = index + delimiter.len();
            }
        }
        spans.push(trimmed_span(raw, start, raw.len()));

        Self {
            raw: raw.to_string(),
            spans,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The row id: the first column
    pub fn id(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.spans
            .get(index)
            .map(|&(start, end)| &self.raw[start..end])
    }

    /// Checked column access for rules; a short row becomes a rule failure
    pub fn column(&self, index: usize) -> Result<&str, RuleError> {
        self.get(index).ok_or(RuleError::MissingColumn {
            index,
            len: self.len(),
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans.iter().map(|&(start, end)| &self.raw[start..end])
    }
}

fn trimmed_span(raw: &str, start: usize, end: usize) -> (usize, usize) {
    let column = &raw[start..end];
    let trimmed = trim_if_needed(column);
    let offset = trimmed.as_ptr() as usize - column.as_ptr() as usize;
    (start + offset, start + offset + trimmed.len())
}
