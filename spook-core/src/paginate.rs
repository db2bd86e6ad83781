use std::num::NonZeroUsize;

/// Number of pages needed for `len` items, `ceil(len / size)`.
pub fn page_count(len: usize, size: NonZeroUsize) -> usize {
    len.div_ceil(size.get())
}

/// Items on the 1-indexed `page`. Page numbers below 1 are treated as 1.
/// `None` means there are no more pages.
pub fn paginate<T>(items: &[T], page: usize, size: NonZeroUsize) -> Option<&[T]> {
    let page = page.max(1);
    let size = size.get();

    let start = (page - 1).checked_mul(size)?;
    if start >= items.len() {
        return None;
    }

    let end = start.saturating_add(size).min(items.len());
    Some(&items[start..end])
}
