/// Records that carry an integer id unique within their collection.
pub trait Identified {
    fn id(&self) -> i64;
}

/// Next id for a new record: one past the largest id in use, starting at 1.
/// Ids stay unique within one collection only.
pub fn next_id<T: Identified>(items: &[T]) -> Result<i64, String> {
    let max = items.iter().map(Identified::id).max().unwrap_or(0).max(0);
    max.checked_add(1)
        .ok_or_else(|| format!("No id left to allocate after {}", max))
}

pub fn find_index<T: Identified>(items: &[T], id: i64) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}
