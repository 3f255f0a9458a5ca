//! Inline fuzzy filter over one pane's items.
//!
//! A [`FilterSession`] snapshots `(original_index, text)` pairs when it is
//! activated and never looks at the live pane again. Confirming hands back
//! the original index of the highlighted match; the caller applies it as if
//! the user had navigated there directly.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    pub index: usize,
    pub text: String,
    pub score: i64,
}

#[derive(Debug, Clone)]
pub struct FilterSession {
    query: String,
    items: Vec<(usize, String)>,
    matches: Vec<FilterMatch>,
    highlighted: usize,
}

impl FilterSession {
    pub fn activate(items: Vec<(usize, String)>) -> Self {
        let mut session = Self {
            query: String::new(),
            items,
            matches: Vec::new(),
            highlighted: 0,
        };
        session.recompute();
        session
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[FilterMatch] {
        &self.matches
    }

    /// Position of the highlight within [`Self::matches`].
    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn on_type(&mut self, query: &str) {
        query.clone_into(&mut self.query);
        self.recompute();
    }

    pub fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.recompute();
    }

    pub fn pop_char(&mut self) {
        self.query.pop();
        self.recompute();
    }

    pub fn move_highlight(&mut self, delta: isize) {
        let len = self.matches.len();
        if len == 0 {
            self.highlighted = 0;
            return;
        }
        let step = delta.unsigned_abs() % len;
        self.highlighted = if delta >= 0 {
            (self.highlighted + step) % len
        } else {
            (self.highlighted + len - step) % len
        };
    }

    /// Original index of the highlighted match, or `None` when nothing matches.
    pub fn on_confirm(self) -> Option<usize> {
        self.matches.get(self.highlighted).map(|m| m.index)
    }

    pub fn on_cancel(self) {}

    fn recompute(&mut self) {
        let terms: Vec<&str> = self.query.split_whitespace().collect();
        let mut matches: Vec<FilterMatch> = self
            .items
            .iter()
            .filter_map(|(index, text)| {
                let score = if terms.is_empty() {
                    0
                } else {
                    terms
                        .iter()
                        .map(|term| fuzzy_score(term, text))
                        .sum::<Option<i64>>()?
                };
                Some(FilterMatch {
                    index: *index,
                    text: text.clone(),
                    score,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.cmp(&a.score).then(a.index.cmp(&b.index)));
        self.matches = matches;
        self.highlighted = 0;
    }
}

/// Case-insensitive score: exact > prefix > substring > subsequence.
/// `None` when `query` is not a subsequence of `text`.
pub fn fuzzy_score(query: &str, text: &str) -> Option<i64> {
    let q = query.to_lowercase();
    let t = text.to_lowercase();
    if q.is_empty() {
        return Some(0);
    }
    if t == q {
        return Some(420);
    }
    if t.starts_with(&q) {
        return Some(360 - (t.len().saturating_sub(q.len()) as i64).min(59));
    }
    if let Some(idx) = t.find(&q) {
        return Some(300 - (idx as i64 * 4).min(99));
    }

    let mut first: Option<usize> = None;
    let mut qchars = q.chars();
    let mut current = qchars.next()?;
    for (idx, ch) in t.chars().enumerate() {
        if ch != current {
            continue;
        }
        if first.is_none() {
            first = Some(idx);
        }
        if let Some(next) = qchars.next() {
            current = next;
        } else {
            let span = idx.saturating_sub(first.unwrap_or(idx)).saturating_add(1);
            let gaps = span.saturating_sub(q.chars().count());
            return Some((180 - span as i64 - (gaps as i64 * 2)).max(1));
        }
    }
    None
}
