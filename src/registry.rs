//! Session-lifetime state shared across files.
//!
//! A [`Session`] remembers which file first declared each tag name, every file
//! seen so far with its last stylesheet, and every token the compiler could not
//! resolve. It lives as long as the owning preprocessor and is cleared by
//! [`Session::reset`].

use crate::composer::compose;
use crate::selector::{element_names, is_document_wide};
use crate::stylesheet::{StyleGroup, StyleSheet};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Identity of a base rule: at-rule chain, selector and group
type RuleKey = (String, String, StyleGroup);

/// Per-file registry entry
#[derive(Debug, Clone, Default)]
pub struct FileRegistryEntry {
    /// Tag names first declared by this file
    pub tags: IndexSet<String>,
    /// Every tag name used by the file in its last pass
    pub elements: IndexSet<String>,
    /// Whether base rules were emitted for this file
    pub preflight_emitted: bool,
    /// Base rules emitted for this file so far
    pub preflight: StyleSheet,
    /// Last composed stylesheet, kept for bundling
    pub stylesheet: StyleSheet,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    tag_owners: IndexMap<String, String>,
    files: IndexMap<String, FileRegistryEntry>,
    base_rules: IndexMap<RuleKey, String>,
    ignored: IndexSet<String>,
    variants: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn set_variants(&mut self, variants: Vec<String>) {
        self.variants = variants;
    }

    /// Record the tag names `file` uses and claim the unowned ones; returns
    /// the names claimed now. Ownership is first-writer-wins and never moves
    /// to a later file while the owner is in the session.
    pub fn register_tags<'a, I>(&mut self, file: &str, tags: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let elements: IndexSet<String> = tags.into_iter().map(str::to_string).collect();
        let mut claimed = Vec::new();
        for tag in &elements {
            if !self.tag_owners.contains_key(tag) {
                self.tag_owners.insert(tag.clone(), file.to_string());
                claimed.push(tag.clone());
            }
        }
        let entry = self.files.entry(file.to_string()).or_default();
        entry.tags.extend(claimed.iter().cloned());
        entry.elements = elements;
        claimed
    }

    /// Every tag name owned by `file`
    pub fn owned_tags(&self, file: &str) -> IndexSet<String> {
        self.tag_owners
            .iter()
            .filter(|(_, owner)| owner.as_str() == file)
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    pub fn tag_owner(&self, tag: &str) -> Option<&str> {
        self.tag_owners.get(tag).map(String::as_str)
    }

    pub fn tag_owners(&self) -> &IndexMap<String, String> {
        &self.tag_owners
    }

    /// Whether `file` has been processed before
    pub fn contains(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    /// True when no file has been processed yet, or `file` was the first one
    pub fn is_first_file(&self, file: &str) -> bool {
        self.files.first().map_or(true, |(first, _)| first == file)
    }

    pub fn mark_seen(&mut self, file: &str) {
        self.files.entry(file.to_string()).or_default();
    }

    /// Keep the base rules of `sheet` that were not already emitted for
    /// another file. In dev mode every rule is kept.
    pub fn claim_base_rules(&mut self, file: &str, sheet: StyleSheet, dev: bool) -> StyleSheet {
        let mut kept = StyleSheet::new();
        for style in sheet.children {
            let owner = self
                .base_rules
                .entry(style.merge_key())
                .or_insert_with(|| file.to_string());
            if dev || owner.as_str() == file {
                kept.add(style);
            }
        }
        kept
    }

    /// Add newly emitted base rules to those `file` already had; returns the
    /// file's full set of base rules.
    pub fn record_preflight(&mut self, file: &str, sheet: StyleSheet) -> StyleSheet {
        let entry = self.files.entry(file.to_string()).or_default();
        entry.preflight = compose([std::mem::take(&mut entry.preflight), sheet]);
        entry.preflight_emitted = !entry.preflight.is_empty();
        entry.preflight.clone()
    }

    /// Replace the stylesheet kept for `file`
    pub fn set_stylesheet(&mut self, file: &str, stylesheet: StyleSheet) {
        self.files.entry(file.to_string()).or_default().stylesheet = stylesheet;
    }

    pub fn files(&self) -> &IndexMap<String, FileRegistryEntry> {
        &self.files
    }

    pub fn record_ignored<I: IntoIterator<Item = String>>(&mut self, tokens: I) {
        self.ignored.extend(tokens);
    }

    pub fn ignored(&self) -> &IndexSet<String> {
        &self.ignored
    }

    /// Union of every file's stylesheet, composed
    pub fn bundle_union(&self) -> StyleSheet {
        compose(self.files.values().map(|entry| entry.stylesheet.clone()))
    }

    /// Forget a file and release its tags to the remaining files, in
    /// processing order. Its base rules move with them: document-wide rules
    /// go to the new first file and element rules to the new owner of the
    /// element. Rules nobody inherits are released.
    pub fn drop_file(&mut self, file: &str) -> bool {
        let Some(dropped) = self.files.shift_remove(file) else {
            return false;
        };
        self.tag_owners.retain(|_, owner| owner != file);
        self.base_rules.retain(|_, owner| owner != file);

        let remaining: Vec<(String, Vec<String>)> = self
            .files
            .iter()
            .map(|(name, entry)| (name.clone(), entry.elements.iter().cloned().collect()))
            .collect();
        for (name, elements) in &remaining {
            self.register_tags(name, elements.iter().map(String::as_str));
        }

        let mut inherited: IndexMap<String, StyleSheet> = IndexMap::new();
        for style in dropped.preflight.children {
            let heir = if is_document_wide(&style.selector) {
                self.files.first().map(|(name, _)| name.clone())
            } else {
                element_names(&style.selector)
                    .iter()
                    .find_map(|element| self.tag_owner(element))
                    .map(str::to_string)
            };
            if let Some(heir) = heir {
                self.base_rules.insert(style.merge_key(), heir.clone());
                inherited.entry(heir).or_default().add(style);
            }
        }
        for (heir, sheet) in inherited {
            debug!(from = file, to = heir.as_str(), rules = sheet.len(), "base rules handed over");
            if let Some(entry) = self.files.get_mut(&heir) {
                entry.preflight = compose([std::mem::take(&mut entry.preflight), sheet.clone()]);
                entry.stylesheet = compose([std::mem::take(&mut entry.stylesheet), sheet]);
                entry.preflight_emitted = true;
            }
        }
        debug!(file, "dropped file from session");
        true
    }

    /// Clear all state
    pub fn reset(&mut self) {
        self.tag_owners.clear();
        self.files.clear();
        self.base_rules.clear();
        self.ignored.clear();
        self.variants.clear();
    }
}
