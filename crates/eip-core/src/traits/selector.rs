// # Selector Trait
//
// The only policy in a rotation is "pick one uniformly at random": once for
// the interface, once for the association on it. Both choices go through a
// `Selector` so tests can script them and operators can seed them.

/// Source of index choices
pub trait Selector: Send + Sync {
    /// Choose an index in `0..len`
    ///
    /// Callers never pass `len == 0`.
    fn choose_index(&self, len: usize) -> usize;
}

/// Pick one element of `items` using `selector`
///
/// Returns `None` for an empty slice without consulting the selector.
pub fn pick<'a, T>(selector: &dyn Selector, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let index = selector.choose_index(items.len());
    items.get(index)
}
