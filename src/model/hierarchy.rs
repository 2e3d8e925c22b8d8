//! Whole-project views of the hierarchy and the project template.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Asset type folder → asset names, as listed locally or by the server.
pub type AssetListing = BTreeMap<String, BTreeSet<String>>;

/// The project phase holding every asset type folder.
pub const PRODUCTION_FOLDER: &str = "02_Production";

/// Shot folders live beside asset types but are not assets.
pub const SHOT_FOLDER: &str = "00_Shot";

/// A recursive name tree: folders → assets → departments → tasks → files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProjectHierarchy {
    children: BTreeMap<String, ProjectHierarchy>,
}

impl ProjectHierarchy {
    /// Record a node, creating every missing ancestor along the way.
    pub fn insert<S: AsRef<str>>(&mut self, path: &[S]) {
        let mut node = self;
        for segment in path {
            node = node
                .children
                .entry(segment.as_ref().to_string())
                .or_default();
        }
    }

    /// Names directly below the node at `path`; empty if there is no such node.
    pub fn names_at<S: AsRef<str>>(&self, path: &[S]) -> BTreeSet<String> {
        self.node(path)
            .map(|n| n.children.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.node(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ProjectHierarchy)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn node<S: AsRef<str>>(&self, path: &[S]) -> Option<&ProjectHierarchy> {
        path.iter()
            .try_fold(self, |node, segment| node.children.get(segment.as_ref()))
    }
}

/// Phase folders and their subfolders, created for every new project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTemplate {
    pub phases: Vec<(String, Vec<String>)>,
}

impl Default for ProjectTemplate {
    fn default() -> Self {
        let phase = |name: &str, subfolders: &[&str]| {
            (
                name.to_string(),
                subfolders.iter().map(|s| (*s).to_string()).collect(),
            )
        };
        Self {
            phases: vec![
                phase(
                    "01_PreProduction",
                    &["concept_art", "references", "storyboard"],
                ),
                phase(
                    PRODUCTION_FOLDER,
                    &["Chara", "Env", "Props", "Items", "Modules", "FX", SHOT_FOLDER],
                ),
                phase("03_PostProduction", &["Grading", "Editing", "DCP"]),
            ],
        }
    }
}

impl ProjectTemplate {
    /// Every directory the template creates, relative to the project folder.
    pub fn directories(&self) -> impl Iterator<Item = (&str, &str)> {
        self.phases.iter().flat_map(|(phase, subfolders)| {
            subfolders
                .iter()
                .map(move |sub| (phase.as_str(), sub.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_creates_ancestors() {
        let mut tree = ProjectHierarchy::default();
        tree.insert(&["Chara", "Hero", "Modeling"]);
        tree.insert(&["Chara", "Villain"]);

        assert_eq!(
            tree.names_at(&["Chara"]),
            BTreeSet::from(["Hero".to_string(), "Villain".to_string()])
        );
        assert!(tree.contains(&["Chara", "Hero", "Modeling"]));
        assert!(!tree.contains(&["Props"]));
        assert!(tree.names_at(&["Props", "Chair"]).is_empty());
    }

    #[test]
    fn serializes_as_nested_maps() {
        let mut tree = ProjectHierarchy::default();
        tree.insert(&["Chara", "Hero"]);

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json, serde_json::json!({ "Chara": { "Hero": {} } }));
    }

    #[test]
    fn default_template_includes_production_folders() {
        let template = ProjectTemplate::default();
        let dirs: Vec<_> = template.directories().collect();

        assert!(dirs.contains(&(PRODUCTION_FOLDER, "Chara")));
        assert!(dirs.contains(&(PRODUCTION_FOLDER, SHOT_FOLDER)));
        assert!(dirs.contains(&("03_PostProduction", "DCP")));
        assert_eq!(dirs.len(), 13);
    }
}
