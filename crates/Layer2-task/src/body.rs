//! Task body trait and the closure-backed implementation

use crate::progress::ProgressPublisher;
use handoff_foundation::Error;

/// The user-supplied phases of a task.
///
/// `on_pre_execute`, `on_progress_update`, `on_post_execute` and `on_failure`
/// run on the owning context. `do_in_background` runs on the task's worker
/// thread. Implement with interior mutability for any state shared between
/// phases.
pub trait BackgroundTask: Sized + Send + Sync + 'static {
    /// Parameter element handed to the body
    type Params: Send + Sync + 'static;

    /// Progress element published from the body
    type Progress: Send + 'static;

    /// Value produced by a successful body
    type Output: Send + 'static;

    /// Runs before the body starts
    fn on_pre_execute(&self);

    /// The background body. Check `progress.is_cancelled()` to stop early.
    fn do_in_background(
        &self,
        params: Option<&[Self::Params]>,
        progress: &ProgressPublisher<Self>,
    ) -> anyhow::Result<Self::Output>;

    /// Runs only when the body returned `Ok`
    fn on_post_execute(&self, result: Self::Output);

    /// Receives each batch passed to `publish_progress` while not cancelled
    fn on_progress_update(&self, _values: Vec<Self::Progress>) {}

    /// Runs when the body returned `Err` or panicked
    fn on_failure(&self, _error: &Error) {}
}

type PhaseFn = Box<dyn Fn() + Send + Sync>;
type BodyFn<P, G, O> =
    Box<dyn Fn(Option<&[P]>, &ProgressPublisher<FnTask<P, G, O>>) -> anyhow::Result<O> + Send + Sync>;
type ProgressFn<G> = Box<dyn Fn(Vec<G>) + Send + Sync>;
type PostFn<O> = Box<dyn Fn(O) + Send + Sync>;
type FailureFn = Box<dyn Fn(&Error) + Send + Sync>;

/// [`BackgroundTask`] assembled from closures.
///
/// ```ignore
/// let body = FnTask::new(|params: Option<&[u32]>, _progress| {
///     Ok(params.map(|p| p.iter().sum::<u32>()).unwrap_or_default())
/// })
/// .on_post(|sum| println!("sum = {sum}"));
/// ```
pub struct FnTask<P, G, O>
where
    P: Send + Sync + 'static,
    G: Send + 'static,
    O: Send + 'static,
{
    pre: Option<PhaseFn>,
    body: BodyFn<P, G, O>,
    progress: Option<ProgressFn<G>>,
    post: Option<PostFn<O>>,
    failure: Option<FailureFn>,
}

impl<P, G, O> FnTask<P, G, O>
where
    P: Send + Sync + 'static,
    G: Send + 'static,
    O: Send + 'static,
{
    /// Create from the background body
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(Option<&[P]>, &ProgressPublisher<Self>) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        Self {
            pre: None,
            body: Box::new(body),
            progress: None,
            post: None,
            failure: None,
        }
    }

    /// Set the pre-execute phase
    pub fn on_pre(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.pre = Some(Box::new(f));
        self
    }

    /// Set the progress handler
    pub fn on_progress(mut self, f: impl Fn(Vec<G>) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Set the post-execute phase
    pub fn on_post(mut self, f: impl Fn(O) + Send + Sync + 'static) -> Self {
        self.post = Some(Box::new(f));
        self
    }

    /// Set the failure hook
    pub fn on_failure(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.failure = Some(Box::new(f));
        self
    }
}

impl<P, G, O> BackgroundTask for FnTask<P, G, O>
where
    P: Send + Sync + 'static,
    G: Send + 'static,
    O: Send + 'static,
{
    type Params = P;
    type Progress = G;
    type Output = O;

    fn on_pre_execute(&self) {
        if let Some(pre) = &self.pre {
            pre();
        }
    }

    fn do_in_background(
        &self,
        params: Option<&[P]>,
        progress: &ProgressPublisher<Self>,
    ) -> anyhow::Result<O> {
        (self.body)(params, progress)
    }

    fn on_post_execute(&self, result: O) {
        if let Some(post) = &self.post {
            post(result);
        }
    }

    fn on_progress_update(&self, values: Vec<G>) {
        if let Some(progress) = &self.progress {
            progress(values);
        }
    }

    fn on_failure(&self, error: &Error) {
        if let Some(failure) = &self.failure {
            failure(error);
        }
    }
}

impl<P, G, O> std::fmt::Debug for FnTask<P, G, O>
where
    P: Send + Sync + 'static,
    G: Send + 'static,
    O: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("pre", &self.pre.is_some())
            .field("progress", &self.progress.is_some())
            .field("post", &self.post.is_some())
            .field("failure", &self.failure.is_some())
            .finish()
    }
}
