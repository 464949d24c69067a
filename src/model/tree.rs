//! Decision trees stored as flat node arrays

use serde::{Deserialize, Serialize};

/// A node of a decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, otherwise to `right`.
    Split {
        /// Feature column index
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Node index for `x <= threshold`
        left: usize,
        /// Node index for `x > threshold`
        right: usize,
    },
    /// Terminal node predicting a class index.
    Leaf {
        /// Index into the model's class list
        class: usize,
    },
}

/// Binary decision tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Create a tree from its node array.
    #[must_use]
    pub const fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Node array.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Largest feature index used by any split.
    #[must_use]
    pub fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .max()
    }

    /// Check that every child index exists, points forward and every leaf
    /// class is in range. Forward-only children rule out cycles.
    pub(crate) fn validate(&self, num_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    left,
                    right,
                    threshold,
                    ..
                } => {
                    if threshold.is_nan() {
                        return Err(format!("node {index}: NaN threshold"));
                    }
                    for child in [left, right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(format!("node {index}: invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { class } => {
                    if class >= num_classes {
                        return Err(format!(
                            "node {index}: class {class} out of range ({num_classes} classes)"
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk the tree for one row. Assumes a validated tree and a row wide
    /// enough for every split feature.
    pub(crate) fn predict_row(&self, row: &[f64]) -> usize {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[feature] <= threshold { left } else { right };
                }
                TreeNode::Leaf { class } => return class,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level() -> DecisionTree {
        DecisionTree::new(vec![
            TreeNode::Split {
                feature: 0,
                threshold: 10.0,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { class: 0 },
            TreeNode::Split {
                feature: 1,
                threshold: 0.5,
                left: 3,
                right: 4,
            },
            TreeNode::Leaf { class: 1 },
            TreeNode::Leaf { class: 2 },
        ])
    }

    #[test]
    fn test_predict_row_walks_branches() {
        let tree = two_level();
        assert_eq!(tree.predict_row(&[5.0, 9.0]), 0);
        assert_eq!(tree.predict_row(&[10.0, 9.0]), 0);
        assert_eq!(tree.predict_row(&[11.0, 0.0]), 1);
        assert_eq!(tree.predict_row(&[11.0, 1.0]), 2);
    }

    #[test]
    fn test_max_feature_index() {
        assert_eq!(two_level().max_feature_index(), Some(1));
        let leaf_only = DecisionTree::new(vec![TreeNode::Leaf { class: 0 }]);
        assert_eq!(leaf_only.max_feature_index(), None);
    }

    #[test]
    fn test_validate_rejects_cycles_and_bad_classes() {
        assert!(two_level().validate(3).is_ok());
        assert!(two_level().validate(2).is_err());

        let cyclic = DecisionTree::new(vec![
            TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 1,
            },
            TreeNode::Leaf { class: 0 },
        ]);
        assert!(cyclic.validate(1).unwrap_err().contains("invalid child 0"));

        assert!(DecisionTree::new(vec![]).validate(1).is_err());
    }
}
