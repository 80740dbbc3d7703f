//! Plain-text layout reconstruction from positioned fragments.
//!
//! Fragments are grouped into rows by vertical center, ordered left to right
//! inside each row, and padded with spaces proportional to the horizontal gap
//! between neighbours. No engine provides this itself.

use super::geometry::{center_y, height, left_x, right_x};
use crate::models::config::LayoutConfig;
use crate::models::fragment::Fragment;

/// Upper bound on the padding inserted for a single gap
const MAX_GAP_SPACES: usize = 4096;

/// Rebuilds a readable text block from an unordered set of fragments
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutReconstructor {
    config: LayoutConfig,
}

impl LayoutReconstructor {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Compose fragments into newline-separated rows.
    ///
    /// Never fails; an empty slice yields an empty string.
    pub fn reconstruct(&self, fragments: &[Fragment]) -> String {
        self.group_rows(fragments)
            .into_iter()
            .map(|row| self.render_row(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sort by vertical center and split into rows.
    ///
    /// Each fragment is compared against the row member just before it, not a
    /// row average, so a row may drift downwards across many small steps.
    fn group_rows<'a>(&self, fragments: &'a [Fragment]) -> Vec<Vec<&'a Fragment>> {
        let mut sorted: Vec<&Fragment> = fragments.iter().collect();
        // Vec::sort_by is stable: equal centers keep their input order
        sorted.sort_by(|a, b| center_y(&a.bbox).total_cmp(&center_y(&b.bbox)));

        let mut rows: Vec<Vec<&Fragment>> = Vec::new();
        let mut current: Vec<&Fragment> = Vec::new();

        for fragment in sorted {
            let joins_row = match current.last() {
                Some(prev) => {
                    let y_diff = (center_y(&fragment.bbox) - center_y(&prev.bbox)).abs();
                    y_diff < height(&prev.bbox) * self.config.row_threshold
                }
                None => true,
            };

            if !joins_row {
                rows.push(std::mem::take(&mut current));
            }
            current.push(fragment);
        }

        if !current.is_empty() {
            rows.push(current);
        }

        rows
    }

    /// Order a row left to right and insert gap-proportional spacing
    fn render_row(&self, mut row: Vec<&Fragment>) -> String {
        row.sort_by(|a, b| left_x(&a.bbox).total_cmp(&left_x(&b.bbox)));

        let mut line = String::new();
        let mut last_x_end = 0.0_f64;

        for fragment in row {
            if last_x_end > 0.0 {
                let gap = (left_x(&fragment.bbox) - last_x_end).max(0.0);
                let spaces = self.spaces_for_gap(gap);
                line.extend(std::iter::repeat(' ').take(spaces));
            }

            line.push_str(&fragment.text);
            last_x_end = right_x(&fragment.bbox);
        }

        line
    }

    fn spaces_for_gap(&self, gap: f64) -> usize {
        if self.config.pixels_per_space <= 0.0 || !gap.is_finite() {
            return 0;
        }
        let spaces = (gap / self.config.pixels_per_space).floor();
        if spaces >= MAX_GAP_SPACES as f64 {
            MAX_GAP_SPACES
        } else {
            spaces as usize
        }
    }
}

/// Reconstruct with the default heuristics (0.5 × height rows, 10 px per space)
pub fn reconstruct_layout(fragments: &[Fragment]) -> String {
    LayoutReconstructor::default().reconstruct(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fragment::BoundingBox;

    fn rect(text: &str, x: f64, y: f64, w: f64, h: f64) -> Fragment {
        Fragment::new(text, 0.9, BoundingBox::rect(x, y, w, h))
    }

    fn quad(text: &str, x: f64, y: f64, w: f64, h: f64) -> Fragment {
        Fragment::new(
            text,
            0.9,
            BoundingBox::quad([(x, y), (x + w, y), (x + w, y + h), (x, y + h)]),
        )
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(reconstruct_layout(&[]), "");
    }

    #[test]
    fn test_single_fragment() {
        assert_eq!(reconstruct_layout(&[rect("hello", 5.0, 5.0, 40.0, 10.0)]), "hello");
    }

    #[test]
    fn test_close_centers_share_a_row() {
        // centers 10 and 18, half height 10
        let a = rect("A", 0.0, 0.0, 50.0, 20.0);
        let b = rect("B", 60.0, 8.0, 50.0, 20.0);

        assert_eq!(reconstruct_layout(&[b, a]), "A B");
    }

    #[test]
    fn test_threshold_boundary_starts_new_row() {
        // diff exactly 0.5 * height is not enough
        let a = rect("top", 0.0, 0.0, 50.0, 20.0);
        let b = rect("bottom", 0.0, 10.0, 50.0, 20.0);

        assert_eq!(reconstruct_layout(&[a, b]), "top\nbottom");
    }

    #[test]
    fn test_gap_becomes_spaces() {
        // 25px gap -> floor(25 / 10) = 2 spaces
        let a = rect("left", 0.0, 0.0, 50.0, 20.0);
        let b = rect("right", 75.0, 0.0, 50.0, 20.0);

        assert_eq!(reconstruct_layout(&[a, b]), "left  right");
    }

    #[test]
    fn test_overlapping_fragments_get_no_spaces() {
        let a = rect("ab", 0.0, 0.0, 50.0, 20.0);
        let b = rect("cd", 40.0, 0.0, 50.0, 20.0);

        assert_eq!(reconstruct_layout(&[a, b]), "abcd");
    }

    #[test]
    fn test_first_fragment_has_no_leading_spaces() {
        let a = rect("indented", 300.0, 0.0, 80.0, 20.0);
        assert_eq!(reconstruct_layout(&[a]), "indented");
    }

    #[test]
    fn test_rows_are_top_to_bottom() {
        let fragments = vec![
            quad("third", 0.0, 100.0, 60.0, 20.0),
            quad("first", 0.0, 0.0, 60.0, 20.0),
            quad("second", 0.0, 50.0, 60.0, 20.0),
        ];

        assert_eq!(reconstruct_layout(&fragments), "first\nsecond\nthird");
    }

    #[test]
    fn test_mixed_box_shapes() {
        let fragments = vec![
            quad("World", 80.0, 2.0, 50.0, 20.0),
            rect("Hello", 0.0, 0.0, 50.0, 20.0),
            rect("Bye", 0.0, 40.0, 30.0, 20.0),
        ];

        assert_eq!(reconstruct_layout(&fragments), "Hello   World\nBye");
    }

    #[test]
    fn test_order_independent() {
        let fragments = vec![
            rect("a", 0.0, 0.0, 20.0, 20.0),
            rect("b", 45.0, 2.0, 20.0, 20.0),
            rect("c", 100.0, 1.0, 20.0, 20.0),
            rect("d", 0.0, 40.0, 20.0, 20.0),
            rect("e", 70.0, 42.0, 20.0, 20.0),
            rect("f", 10.0, 90.0, 20.0, 20.0),
        ];
        let expected = reconstruct_layout(&fragments);
        assert_eq!(expected, "a  b   c\nd     e\nf");

        let mut reversed = fragments.clone();
        reversed.reverse();
        assert_eq!(reconstruct_layout(&reversed), expected);

        let mut rotated = fragments.clone();
        rotated.rotate_left(2);
        assert_eq!(reconstruct_layout(&rotated), expected);

        let shuffled = vec![
            fragments[4].clone(),
            fragments[0].clone(),
            fragments[5].clone(),
            fragments[2].clone(),
            fragments[1].clone(),
            fragments[3].clone(),
        ];
        assert_eq!(reconstruct_layout(&shuffled), expected);
    }

    #[test]
    fn test_chain_comparison_lets_rows_drift() {
        // each step is below half the height, the total drift is not
        let fragments = vec![
            rect("a", 0.0, 0.0, 10.0, 20.0),
            rect("b", 20.0, 8.0, 10.0, 20.0),
            rect("c", 40.0, 16.0, 10.0, 20.0),
            rect("d", 60.0, 24.0, 10.0, 20.0),
        ];

        assert_eq!(reconstruct_layout(&fragments), "a b c d");
    }

    #[test]
    fn test_zero_height_predecessor() {
        // a zero-height row member admits nothing after it
        let flat = rect("flat", 0.0, 10.0, 30.0, 0.0);
        let same_center = rect("same", 50.0, 0.0, 30.0, 20.0);
        assert_eq!(
            reconstruct_layout(&[flat.clone(), same_center.clone()]),
            "flat\nsame"
        );

        // but can still follow a taller fragment with the same center
        assert_eq!(reconstruct_layout(&[same_center, flat.clone()]), "flat  same");

        let nearby = rect("near", 50.0, 1.0, 30.0, 20.0);
        assert_eq!(reconstruct_layout(&[flat, nearby]), "flat\nnear");
    }

    #[test]
    fn test_huge_gap_is_capped() {
        let a = rect("a", 0.0, 0.0, 10.0, 20.0);
        let b = rect("b", 1e12, 0.0, 10.0, 20.0);

        let line = reconstruct_layout(&[a, b]);
        assert_eq!(line.len(), MAX_GAP_SPACES + 2);
        assert!(line.starts_with("a ") && line.ends_with(" b"));
    }

    #[test]
    fn test_nan_coordinates_sort_deterministically() {
        let fragments = vec![
            rect("a", 0.0, 0.0, 10.0, 20.0),
            rect("n", 0.0, f64::NAN, 10.0, 20.0),
            rect("b", 0.0, 40.0, 10.0, 20.0),
            rect("m", f64::NAN, 41.0, 10.0, 20.0),
        ];
        let expected = reconstruct_layout(&fragments);

        let mut reversed = fragments.clone();
        reversed.reverse();
        assert_eq!(reconstruct_layout(&reversed), expected);

        let mut rotated = fragments.clone();
        rotated.rotate_left(1);
        assert_eq!(reconstruct_layout(&rotated), expected);

        assert!(expected.starts_with("a\n"), "{:?}", expected);
    }

    #[test]
    fn test_custom_heuristics() {
        let reconstructor = LayoutReconstructor::new(LayoutConfig {
            row_threshold: 1.0,
            pixels_per_space: 5.0,
        });
        let a = rect("A", 0.0, 0.0, 50.0, 20.0);
        let b = rect("B", 75.0, 15.0, 50.0, 20.0);

        assert_eq!(reconstructor.reconstruct(&[a, b]), "A     B");
    }
}
