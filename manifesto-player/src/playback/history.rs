//! History log: script texts of every segment consumed into playback, in
//! play order. Passed as context to each generation call.

/// Append-only log of consumed scripts
#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    entries: Vec<String>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, script_text: impl Into<String>) {
        self.entries.push(script_text.into());
    }

    /// Owned copy for a generation request
    ///
    /// Requests hold their own copy so later appends never change the
    /// history a call was issued with.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.clone()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
