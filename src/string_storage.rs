use std::collections::HashMap;

/// Unique identifier for an interned lexeme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(usize);

/// Interned lexemes of identifier, number and string-literal tokens.
/// Identical lexemes share one id, so name identity is a plain id comparison.
#[derive(Debug, Clone, Default)]
pub struct StringStorage {
    strings: Vec<String>,
    index: HashMap<String, StringId>,
}

impl StringStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a lexeme, returning the id of an existing copy when present
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.index.get(s) {
            return *id;
        }

        let id = StringId(self.strings.len());
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), id);
        id
    }

    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.0]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
