//! Browser-style folder history owned by one UI session.

use crate::paths::{self, Breadcrumb, ROOT};
use serde::{Deserialize, Serialize};

/// Current folder plus a linear back-history.
///
/// Navigating while not at the tip drops everything after the current
/// index before appending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    current: String,
    history: Vec<String>,
    index: usize,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current: ROOT.to_string(),
            history: vec![ROOT.to_string()],
            index: 0,
        }
    }
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Move to `path`, returning the normalized current folder.
    pub fn navigate(&mut self, path: &str) -> &str {
        let path = paths::normalize_folder_path(path);
        if self.history.get(self.index) != Some(&path) {
            self.history.truncate(self.index + 1);
            self.history.push(path.clone());
            self.index = self.history.len() - 1;
        }
        self.current = path;
        &self.current
    }

    /// Step back one entry. Returns false when already at the start.
    pub fn go_back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        self.current = self.history[self.index].clone();
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        paths::breadcrumbs(&self.current)
    }
}
