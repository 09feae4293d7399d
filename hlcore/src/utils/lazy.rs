/// A lazily computed value tied to the generation of the data it was derived
/// from.
///
/// The value is (re)computed on first access and whenever the caller presents
/// a generation stamp different from the one it was computed at. Callers that
/// mutate the source data themselves can either [`dirtify`](Self::dirtify) the
/// container or patch the value in place through
/// [`get_mut_if_clean`](Self::get_mut_if_clean) and then
/// [`restamp`](Self::restamp) it.
#[derive(Debug)]
pub struct LazyContainer<T> {
    elem: Option<T>,
    stamp: u64,
}

impl<T> Default for LazyContainer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LazyContainer<T> {
    pub const fn new() -> Self {
        Self {
            elem: None,
            stamp: 0,
        }
    }

    /// Whether a value computed at `stamp` is present.
    pub fn is_clean(&self, stamp: u64) -> bool {
        self.elem.is_some() && self.stamp == stamp
    }

    /// Drop the cached value, returning it.
    pub fn dirtify(&mut self) -> Option<T> {
        self.elem.take()
    }

    /// Return the value for `stamp`, computing it if the container is dirty or
    /// stale. `compute` receives the previous value (if any) for reuse.
    pub fn get(&mut self, stamp: u64, compute: impl FnOnce(Option<T>) -> T) -> &T {
        let elem = match self.elem.take() {
            Some(elem) if self.stamp == stamp => elem,
            previous => {
                self.stamp = stamp;
                compute(previous)
            }
        };
        self.elem.insert(elem)
    }

    /// Mutable access to the value, only if it is up to date for `stamp`.
    pub fn get_mut_if_clean(&mut self, stamp: u64) -> Option<&mut T> {
        if self.is_clean(stamp) {
            self.elem.as_mut()
        } else {
            None
        }
    }

    /// Declare the cached value valid for `stamp`. Used after the caller both
    /// mutated the source and patched the cached value accordingly.
    pub fn restamp(&mut self, stamp: u64) {
        if self.elem.is_some() {
            self.stamp = stamp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recomputes_only_when_stale() {
        let mut lazy = LazyContainer::new();
        let mut computed = 0;

        assert_eq!(
            *lazy.get(1, |_| {
                computed += 1;
                10
            }),
            10
        );
        assert_eq!(*lazy.get(1, |_| unreachable!()), 10);
        assert_eq!(
            *lazy.get(2, |prev| {
                computed += 1;
                prev.unwrap_or(0) + 1
            }),
            11
        );
        assert_eq!(computed, 2);
    }

    #[test]
    fn dirtify_forces_recompute_and_restamp_keeps_patches() {
        let mut lazy = LazyContainer::new();
        lazy.get(1, |_| vec![1]);

        lazy.get_mut_if_clean(1).expect("clean at stamp 1").push(2);
        lazy.restamp(2);
        assert_eq!(lazy.get(2, |_| unreachable!()), &vec![1, 2]);
        assert!(lazy.get_mut_if_clean(3).is_none());

        assert_eq!(lazy.dirtify(), Some(vec![1, 2]));
        assert!(!lazy.is_clean(2));
    }
}
