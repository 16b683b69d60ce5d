use crate::error::{AppError, Result};
use ndarray::{Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Node of a fitted tree, stored in pre-order in a flat array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go to `left`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Normalized class distribution of the training rows that reached here
    Leaf { distribution: Vec<f64> },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (all when `None`)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// CART classification tree using the Gini criterion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,

    /// Unnormalized impurity decrease per feature, only present after fitting
    #[serde(skip)]
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `samples` (duplicates allowed).
    ///
    /// `y` holds class indices below `n_classes`.
    pub fn fit<R: Rng + ?Sized>(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        mut samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let n_features = x.ncols();
        let max_features = params
            .max_features
            .unwrap_or(n_features)
            .clamp(1, n_features.max(1));

        let mut builder = Builder {
            x,
            y,
            n_classes,
            params,
            max_features,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.grow(&mut samples, 0);

        Self {
            nodes: builder.nodes,
            n_features,
            n_classes,
            importances: builder.importances,
        }
    }

    /// Build from an explicit node list, checked with [`DecisionTree::validate`]
    pub fn from_nodes(nodes: Vec<Node>, n_features: usize, n_classes: usize) -> Result<Self> {
        let tree = Self {
            nodes,
            n_features,
            n_classes,
            importances: vec![0.0; n_features],
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Class distribution of the leaf `row` falls into
    pub fn predict_row(&self, row: ArrayView1<f64>) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    /// Structural checks: children point forward and in range, features
    /// are in range, leaves carry `n_classes` probabilities.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(AppError::ArtifactLoad("decision tree has no nodes".to_string()));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= self.n_features {
                        return Err(AppError::ArtifactLoad(format!(
                            "node {} splits on feature {} but tree has {} features",
                            index, feature, self.n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(AppError::ArtifactLoad(format!(
                            "node {} has a non-finite threshold",
                            index
                        )));
                    }
                    for child in [left, right] {
                        if *child <= index || *child >= self.nodes.len() {
                            return Err(AppError::ArtifactLoad(format!(
                                "node {} has invalid child reference {}",
                                index, child
                            )));
                        }
                    }
                }
                Node::Leaf { distribution } => {
                    if distribution.len() != self.n_classes {
                        return Err(AppError::ArtifactLoad(format!(
                            "leaf {} has {} probabilities, expected {}",
                            index,
                            distribution.len(),
                            self.n_classes
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

struct Builder<'a, R: Rng + ?Sized> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    params: &'a TreeParams,
    max_features: usize,
    rng: &'a mut R,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

struct Split {
    feature: usize,
    threshold: f64,
    weighted_impurity: f64,
}

impl<'a, R: Rng + ?Sized> Builder<'a, R> {
    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(samples);
        let n = samples.len();
        let impurity = gini(&counts, n);
        let index = self.nodes.len();

        let splittable = n >= self.params.min_samples_split
            && n >= 2 * self.params.min_samples_leaf
            && impurity > 0.0
            && self.params.max_depth.map_or(true, |max| depth < max);

        if splittable {
            if let Some(split) = self.best_split(samples) {
                // Reserve the slot so children land after their parent
                self.nodes.push(Node::Leaf {
                    distribution: Vec::new(),
                });

                self.importances[split.feature] +=
                    n as f64 * (impurity - split.weighted_impurity);

                let x = self.x;
                let mid = partition(samples, |row| x[[row, split.feature]] <= split.threshold);
                let (left_rows, right_rows) = samples.split_at_mut(mid);
                let left = self.grow(left_rows, depth + 1);
                let right = self.grow(right_rows, depth + 1);

                self.nodes[index] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
                return index;
            }
        }

        let distribution = counts.iter().map(|&c| c as f64 / n as f64).collect();
        self.nodes.push(Node::Leaf { distribution });
        index
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &row in samples {
            counts[self.y[row]] += 1;
        }
        counts
    }

    fn best_split(&mut self, samples: &[usize]) -> Option<Split> {
        let n = samples.len();
        let n_features = self.x.ncols();
        let min_leaf = self.params.min_samples_leaf.max(1);
        if n_features == 0 || n < 2 {
            return None;
        }

        let mut features =
            rand::seq::index::sample(&mut *self.rng, n_features, self.max_features).into_vec();
        features.sort_unstable();

        let mut best: Option<Split> = None;
        let mut column: Vec<(f64, usize)> = Vec::with_capacity(n);

        for feature in features {
            column.clear();
            column.extend(samples.iter().map(|&row| (self.x[[row, feature]], self.y[row])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            let mut right = vec![0usize; self.n_classes];
            for &(_, class) in &column {
                right[class] += 1;
            }

            for i in 0..n - 1 {
                let class = column[i].1;
                left[class] += 1;
                right[class] -= 1;

                let (lower, upper) = (column[i].0, column[i + 1].0);
                let n_left = i + 1;
                let n_right = n - n_left;
                if lower >= upper || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let weighted = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;

                if best.as_ref().map_or(true, |b| weighted < b.weighted_impurity) {
                    let mut threshold = lower + (upper - lower) / 2.0;
                    if threshold >= upper {
                        threshold = lower;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        weighted_impurity: weighted,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Move rows matching `goes_left` to the front, returning how many there are
fn partition(samples: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut store = 0;
    for i in 0..samples.len() {
        if goes_left(samples[i]) {
            samples.swap(store, i);
            store += 1;
        }
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fit_all(x: &Array2<f64>, y: &[usize], n_classes: usize, params: &TreeParams) -> DecisionTree {
        let mut rng = StdRng::seed_from_u64(7);
        DecisionTree::fit(x, y, n_classes, (0..y.len()).collect(), params, &mut rng)
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[], 0), 0.0);
    }

    #[test]
    fn test_partition() {
        let mut rows = vec![5, 1, 4, 2, 3];
        let mid = partition(&mut rows, |r| r <= 2);
        assert_eq!(mid, 2);
        let mut left = rows[..mid].to_vec();
        left.sort();
        assert_eq!(left, vec![1, 2]);
    }

    #[test]
    fn test_fits_separable_data() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0]];
        let y = vec![0, 0, 1, 1];
        let tree = fit_all(&x, &y, 2, &TreeParams::default());

        tree.validate().unwrap();
        for (row, &class) in y.iter().enumerate() {
            let dist = tree.predict_row(x.row(row));
            assert_eq!(dist[class], 1.0);
        }
        assert_eq!(tree.depth(), 1);
        assert!(tree.importances().iter().sum::<f64>() > 0.0);
    }

    #[test]
    fn test_threshold_is_midpoint() {
        let x = array![[1.0], [3.0]];
        let tree = fit_all(&x, &[0, 1], 2, &TreeParams::default());
        match &tree.nodes()[0] {
            Node::Split { threshold, .. } => assert_eq!(*threshold, 2.0),
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_max_depth_zero_gives_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let params = TreeParams {
            max_depth: Some(0),
            ..TreeParams::default()
        };
        let tree = fit_all(&x, &[0, 1, 1], 2, &params);
        assert_eq!(tree.nodes().len(), 1);
        let dist = tree.predict_row(x.row(0));
        assert!((dist[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_features_give_leaf() {
        let x = array![[1.0], [1.0]];
        let tree = fit_all(&x, &[0, 1], 2, &TreeParams::default());
        assert_eq!(tree.nodes().len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_structure() {
        let backward = vec![
            Node::Split {
                feature: 0,
                threshold: 0.5,
                left: 0,
                right: 1,
            },
            Node::Leaf {
                distribution: vec![1.0, 0.0],
            },
        ];
        assert!(DecisionTree::from_nodes(backward, 1, 2).is_err());

        let narrow_leaf = vec![Node::Leaf {
            distribution: vec![1.0],
        }];
        assert!(DecisionTree::from_nodes(narrow_leaf, 1, 2).is_err());

        let bad_feature = vec![
            Node::Split {
                feature: 3,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            Node::Leaf {
                distribution: vec![1.0, 0.0],
            },
            Node::Leaf {
                distribution: vec![0.0, 1.0],
            },
        ];
        assert!(DecisionTree::from_nodes(bad_feature, 1, 2).is_err());
    }
}
