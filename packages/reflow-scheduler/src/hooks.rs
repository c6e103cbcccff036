use crate::error::JobError;
use crate::job::Component;
use std::rc::Rc;

/// Sink for failures the scheduler catches on behalf of the host: an
/// after-flush callback erroring, or a deferred flush failing with no
/// caller left to hand the error to. Job failures never come through here.
pub trait ErrorReporter {
    fn report(&self, error: JobError, context: Option<&dyn Component>, description: &str);
}

/// Receives the per-cycle lifecycle notifications dispatched after a flush.
pub trait LifecycleNotifier {
    /// A component's active job ran this cycle and the component is still
    /// live. Fired in reverse run order, children before parents.
    fn notify_updated(&self, component: &Rc<dyn Component>);

    /// A kept-alive component was re-activated this cycle. `direct` marks
    /// the activation root as opposed to a descendant woken transitively.
    fn notify_activated(&self, component: &Rc<dyn Component>, direct: bool);
}

/// Optional instrumentation observer, absent by default.
pub trait FlushObserver {
    fn on_flush_complete(&self);
}
