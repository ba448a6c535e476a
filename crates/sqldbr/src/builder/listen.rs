//! Event listeners run on a SELECT right before it is serialized.
//!
//! Listeners run in registration order. A listener returning
//! [`ControlFlow::Break`] stops the remaining listeners of that dispatch
//! round; they stay registered and run again on the next build. One-shot
//! listeners are removed after they ran once.

use super::select::Select;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Callback signature of a [`Listener`].
pub type ListenerFn = Arc<dyn Fn(&mut Select) -> ControlFlow<()> + Send + Sync>;

/// A named callback which may modify a SELECT before it is serialized.
#[derive(Clone)]
pub struct Listener {
    name: String,
    once: bool,
    func: ListenerFn,
}

impl Listener {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Select) -> ControlFlow<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            once: false,
            func: Arc::new(func),
        }
    }

    /// Run only on the first dispatch, then unregister.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

/// Run `listeners` against `select`. Returns the listeners which stay
/// registered.
pub(crate) fn dispatch(listeners: Vec<Listener>, select: &mut Select) -> Vec<Listener> {
    let mut kept = Vec::with_capacity(listeners.len());
    let mut stopped = false;
    for listener in listeners {
        if stopped {
            kept.push(listener);
            continue;
        }
        let flow = (listener.func)(select);
        if !listener.once {
            kept.push(listener);
        }
        stopped = flow.is_break();
    }
    kept
}
