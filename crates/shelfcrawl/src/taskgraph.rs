//! Category tree loading and flattening into crawl tasks.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{CrawlError, CrawlResult, Task, GENERIC_SUBCATEGORY};

/// A top-level category in the structure file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub subcategories: Vec<SubcategoryNode>,
}

/// A leaf `{name, url}` under a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcategoryNode {
    pub name: String,
    pub url: String,
}

/// Whether a category's own page becomes a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlattenPolicy {
    /// Emit the category page before its subcategories, always.
    #[default]
    AlwaysIncludeCategoryPage,
    /// Emit the category page only when it has no subcategories.
    CategoryPageWhenLeaf,
}

/// Read the category structure file.
///
/// A missing or unparsable file is an `Input` error and must abort the run.
pub fn load_categories(path: &Path) -> CrawlResult<Vec<CategoryNode>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CrawlError::Input(format!("cannot read task graph {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        CrawlError::Input(format!("cannot parse task graph {}: {e}", path.display()))
    })
}

/// Flatten a category tree into tasks, preserving structure order.
pub fn flatten(categories: &[CategoryNode], policy: FlattenPolicy) -> Vec<Task> {
    let mut tasks = Vec::new();
    for category in categories {
        let has_subs = !category.subcategories.is_empty();
        let include_page = match policy {
            FlattenPolicy::AlwaysIncludeCategoryPage => true,
            FlattenPolicy::CategoryPageWhenLeaf => !has_subs,
        };

        if include_page {
            tasks.push(Task::new(&category.name, GENERIC_SUBCATEGORY, &category.url));
        }

        for sub in &category.subcategories {
            tasks.push(Task::new(&category.name, &sub.name, &sub.url));
        }
    }
    tasks
}

/// Load and flatten in one step.
pub fn load_tasks(path: &Path, policy: FlattenPolicy) -> CrawlResult<Vec<Task>> {
    let categories = load_categories(path)?;
    Ok(flatten(&categories, policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<CategoryNode> {
        serde_json::from_str(
            r#"[
                {"name": "Bebidas", "url": "https://shop.test/bebidas",
                 "subcategories": [
                    {"name": "Gaseosas", "url": "https://shop.test/bebidas/gaseosas"},
                    {"name": "Aguas", "url": "https://shop.test/bebidas/aguas"}
                 ]},
                {"name": "Panadería", "url": "https://shop.test/panaderia"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_always_include_category_page() {
        let tasks = flatten(&tree(), FlattenPolicy::AlwaysIncludeCategoryPage);
        let labels: Vec<_> = tasks
            .iter()
            .map(|t| (t.category.as_str(), t.subcategory.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Bebidas", "General"),
                ("Bebidas", "Gaseosas"),
                ("Bebidas", "Aguas"),
                ("Panadería", "General"),
            ]
        );
        assert_eq!(tasks[0].url, "https://shop.test/bebidas");
    }

    #[test]
    fn test_category_page_only_when_leaf() {
        let tasks = flatten(&tree(), FlattenPolicy::CategoryPageWhenLeaf);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].subcategory, "Gaseosas");
        assert_eq!(tasks[2].subcategory, "General");
        assert_eq!(tasks[2].category, "Panadería");
    }

    #[test]
    fn test_empty_subcategory_array_emits_general_once() {
        let cats = vec![CategoryNode {
            name: "Limpieza".into(),
            url: "https://shop.test/limpieza".into(),
            subcategories: Vec::new(),
        }];
        for policy in [
            FlattenPolicy::AlwaysIncludeCategoryPage,
            FlattenPolicy::CategoryPageWhenLeaf,
        ] {
            let tasks = flatten(&cats, policy);
            assert_eq!(tasks.len(), 1);
            assert!(tasks[0].is_generic());
        }
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_categories(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CrawlError::Input(_)));
    }

    #[test]
    fn test_malformed_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("structure.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_tasks(&path, FlattenPolicy::default()).unwrap_err();
        assert!(matches!(err, CrawlError::Input(_)));
    }
}
