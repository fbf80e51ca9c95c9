//! Span-based source editor.
//!
//! Edits are recorded against byte offsets of the original source and applied
//! in one pass, so spans produced by the markup parser stay valid no matter how
//! many edits were recorded before.

#[derive(Debug, Clone)]
enum Edit {
    Overwrite { start: usize, end: usize, content: String },
    Insert { at: usize, content: String },
}

impl Edit {
    fn position(&self) -> (usize, u8) {
        match self {
            Edit::Insert { at, .. } => (*at, 0),
            Edit::Overwrite { start, .. } => (*start, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceEditor<'a> {
    source: &'a str,
    edits: Vec<Edit>,
    trim_end: bool,
    appended: String,
}

impl<'a> SourceEditor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            edits: Vec::new(),
            trim_end: false,
            appended: String::new(),
        }
    }

    /// Replace `start..end` with `content`. Overlapping overwrites after the
    /// first are dropped.
    pub fn overwrite(&mut self, start: usize, end: usize, content: impl Into<String>) -> &mut Self {
        self.edits.push(Edit::Overwrite {
            start,
            end: end.max(start),
            content: content.into(),
        });
        self
    }

    pub fn remove(&mut self, start: usize, end: usize) -> &mut Self {
        self.overwrite(start, end, "")
    }

    /// Insert `content` before the original character at `at`
    pub fn prepend_left(&mut self, at: usize, content: impl Into<String>) -> &mut Self {
        self.edits.push(Edit::Insert {
            at,
            content: content.into(),
        });
        self
    }

    /// Drop trailing whitespace of the edited source before appended content
    pub fn trim_end(&mut self) -> &mut Self {
        self.trim_end = true;
        self
    }

    pub fn append(&mut self, content: &str) -> &mut Self {
        self.appended.push_str(content);
        self
    }

    pub fn has_changes(&self) -> bool {
        !self.edits.is_empty() || !self.appended.is_empty() || self.trim_end
    }

    /// Apply all edits
    pub fn finish(&self) -> String {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|edit| edit.position());

        let mut out = String::with_capacity(self.source.len() + self.appended.len());
        let mut cursor = 0;
        for edit in edits {
            match edit {
                Edit::Insert { at, content } => {
                    let at = (*at).min(self.source.len());
                    if at >= cursor {
                        out.push_str(&self.source[cursor..at]);
                        cursor = at;
                    }
                    out.push_str(content);
                }
                Edit::Overwrite { start, end, content } => {
                    if *start < cursor {
                        continue;
                    }
                    let end = (*end).min(self.source.len());
                    out.push_str(&self.source[cursor..*start]);
                    out.push_str(content);
                    cursor = end;
                }
            }
        }
        out.push_str(&self.source[cursor..]);

        if self.trim_end {
            out.truncate(out.trim_end().len());
        }
        out.push_str(&self.appended);
        out
    }
}
