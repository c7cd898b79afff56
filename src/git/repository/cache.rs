/// A lazily loaded, invalidatable slot.
///
/// `None` means unloaded, which is distinct from a loaded value that happens
/// to be empty.
#[derive(Debug, Clone)]
pub(crate) struct Cache<T> {
    value: Option<T>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

/// Observable state of a repository cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Unloaded,
    LoadedEmpty,
    Loaded,
}

/// Something whose emptiness distinguishes [`CacheState::LoadedEmpty`].
pub(crate) trait CacheValue {
    fn is_empty_value(&self) -> bool;
}

impl<K, V> CacheValue for std::collections::BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Cache<T> {
    pub(crate) fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Return the loaded value, running `load` first if needed.
    ///
    /// A failed load leaves the slot unloaded.
    pub(crate) fn get_or_load<E>(
        &mut self,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        let value = match self.value.take() {
            Some(value) => value,
            None => load()?,
        };
        Ok(self.value.insert(value))
    }

    pub(crate) fn invalidate(&mut self) {
        self.value = None;
    }
}

impl<T: CacheValue> Cache<T> {
    pub(crate) fn state(&self) -> CacheState {
        match &self.value {
            None => CacheState::Unloaded,
            Some(value) if value.is_empty_value() => CacheState::LoadedEmpty,
            Some(_) => CacheState::Loaded,
        }
    }
}
