use std::sync::Arc;

/// Optional, cheaply cloneable callback handle.
///
/// Generic over the (unsized) function signature, e.g.
/// `SharedFn<dyn Fn(Event) + Send + Sync>`.
pub struct SharedFn<F: ?Sized + Send + Sync + 'static> {
    inner: Option<Arc<F>>,
}

impl<F: ?Sized + Send + Sync + 'static> SharedFn<F> {
    pub fn new(f: Arc<F>) -> Self {
        Self { inner: Some(f) }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn is_some(&self) -> bool {
        self.inner.is_some()
    }

    pub fn as_ref(&self) -> Option<&Arc<F>> {
        self.inner.as_ref()
    }
}

impl<F: ?Sized + Send + Sync + 'static> Clone for SharedFn<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> Default for SharedFn<F> {
    fn default() -> Self {
        Self::none()
    }
}

impl<F: ?Sized + Send + Sync + 'static> From<Arc<F>> for SharedFn<F> {
    fn from(f: Arc<F>) -> Self {
        Self::new(f)
    }
}

impl<F: ?Sized + Send + Sync + 'static> std::fmt::Debug for SharedFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_some() {
            write!(f, "SharedFn(set)")
        } else {
            write!(f, "SharedFn(unset)")
        }
    }
}
