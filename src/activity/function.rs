//! Closure-backed activities.

use std::future::Future;
use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;

use super::Activity;

/// Activity backed by an async closure
pub struct ActivityFn<F, A, T> {
    name: String,
    f: F,
    _signature: PhantomData<fn(A) -> T>,
}

impl<F, A, T> ActivityFn<F, A, T> {
    /// Wrap a closure as a named activity
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _signature: PhantomData,
        }
    }
}

/// Wrap an async closure as a named activity.
///
/// ```
/// use signalflow::activity::{activity_fn, Activity};
///
/// let search = activity_fn("start_search", |query: String| async move {
///     Ok(format!("job for {query}"))
/// });
/// assert_eq!(search.name(), "start_search");
/// ```
pub fn activity_fn<F, Fut, A, T>(name: impl Into<String>, f: F) -> ActivityFn<F, A, T>
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    ActivityFn::new(name, f)
}

#[async_trait]
impl<F, Fut, A, T> Activity for ActivityFn<F, A, T>
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    type Args = A;
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, args: A) -> Result<T> {
        (self.f)(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_activity_executes() {
        let double = activity_fn("double", |n: u32| async move { Ok(n * 2) });

        assert_eq!(double.name(), "double");
        assert_eq!(double.execute(21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_closure_activity_error_passes_through() {
        let failing = activity_fn("failing", |_: ()| async move {
            Err::<(), _>(anyhow::anyhow!("listing service unavailable"))
        });

        let err = failing.execute(()).await.unwrap_err();
        assert_eq!(err.to_string(), "listing service unavailable");
    }
}
