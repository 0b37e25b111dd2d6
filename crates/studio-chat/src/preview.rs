use serde::{Deserialize, Serialize};

/// URL the deployed site for a workflow is served at.
pub fn preview_url(base: &str, workflow_id: &str) -> String {
    format!("{}/preview/{}", base.trim_end_matches('/'), workflow_id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewTab {
    #[default]
    Preview,
    Phone,
}

/// State of the web-creator preview pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewState {
    pub tab: PreviewTab,
    /// A build/refine stream is in flight.
    pub pending: bool,
    pub url: String,
    pub title: String,
    /// Bumped whenever the frame must reload.
    pub reload_index: u64,
}

impl PreviewState {
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn reload(&mut self) {
        self.reload_index += 1;
    }

    /// Record a fresh deployment: point at it and force a reload.
    pub fn deployed(&mut self, url: impl Into<String>) {
        self.set_url(url);
        self.reload();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Navigation history inside the preview frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewHistory {
    index: usize,
    count: usize,
}

impl PreviewHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new page was visited: anything forward of the current page is lost.
    pub fn add(&mut self) {
        self.index += 1;
        self.count = self.index;
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.count);
    }

    pub fn back(&mut self) -> bool {
        if !self.can_back() {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if !self.can_forward() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn can_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_forward(&self) -> bool {
        self.index < self.count
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_url_joins_base() {
        assert_eq!(preview_url("http://host/", "g1"), "http://host/preview/g1");
        assert_eq!(preview_url("http://host", "g1"), "http://host/preview/g1");
    }

    #[test]
    fn deployed_bumps_reload() {
        let mut state = PreviewState::default();
        state.deployed("http://host/preview/g1");
        state.deployed("http://host/preview/g1");
        assert_eq!(state.reload_index, 2);
        assert_eq!(state.url, "http://host/preview/g1");
        state.reset();
        assert_eq!(state, PreviewState::default());
    }

    #[test]
    fn history_navigation() {
        let mut history = PreviewHistory::new();
        assert!(!history.can_back());
        assert!(!history.can_forward());

        history.add();
        history.add();
        assert!(history.can_back());
        assert!(!history.can_forward());

        assert!(history.back());
        assert!(history.can_forward());
        assert!(history.forward());
        assert!(!history.forward());
    }

    #[test]
    fn add_after_back_drops_forward_entries() {
        let mut history = PreviewHistory::new();
        history.add();
        history.add();
        history.add();
        history.set_index(1);
        history.add();
        assert_eq!(history.index(), 2);
        assert!(!history.can_forward());
    }

    #[test]
    fn set_index_is_clamped() {
        let mut history = PreviewHistory::new();
        history.add();
        history.set_index(10);
        assert_eq!(history.index(), 1);
        history.reset();
        assert_eq!(history.index(), 0);
    }
}
