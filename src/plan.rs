//! Page deletion planning.
//!
//! Removing a page shifts every subsequent page's index down by one. Applying
//! removals from the highest index downward keeps every index in the plan
//! valid against the document's current state at the moment it is consumed,
//! with no re-mapping between removals.

/// Order a set of zero-based page indices for safe removal: deduplicated,
/// highest first.
///
/// Indices that turn out to exceed the document's page count are left in the
/// plan; the consumer skips them at application time.
///
/// # Examples
///
/// ```
/// use pdf_overlay::plan::deletion_plan;
///
/// assert_eq!(deletion_plan(&[0, 2]), vec![2, 0]);
/// assert_eq!(deletion_plan(&[1, 1, 3]), vec![3, 1]);
/// ```
pub fn deletion_plan(indices: &[usize]) -> Vec<usize> {
    let mut plan: Vec<usize> = indices.to_vec();
    plan.sort_unstable_by(|a, b| b.cmp(a));
    plan.dedup();
    plan
}
