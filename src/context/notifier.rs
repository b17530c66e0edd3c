use crossbeam::channel::{self, Receiver, Sender};

use crate::finalize::FinalizeHook;
use crate::object::ObjectId;

pub(crate) enum Message {
    /// The target with this identity has been reclaimed
    Reclaimed(ObjectId),
}

/// Carries deaths from wherever the memory manager notices them to the context's owner.
///
/// Finalization hooks may run on any thread, at any time; all they do is post a message here. The
/// owner picks messages up in `WeakContext::run_finalizers`, so every death is delivered from one
/// place, one at a time.
pub(crate) struct Notifier {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self { sender, receiver }
    }

    /// The finalization hook to register for `target`
    pub(crate) fn hook_for(&self, target: ObjectId) -> FinalizeHook {
        let sender = self.sender.clone();
        Box::new(move || {
            // An Err value means the context is gone, and so is everyone who cared
            if let Err(e) = sender.send(Message::Reclaimed(target)) {
                debug!("Dropping death of {}, its context no longer exists: {}", target, e);
            }
        })
    }

    pub(crate) fn try_next(&self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }

    pub(crate) fn pending(&self) -> usize {
        self.receiver.len()
    }
}
