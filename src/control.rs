use crate::error::ControlError;
use crossbeam_channel::{bounded, Sender};

pub(crate) enum ControlMessage {
    Fire(String, Sender<Result<usize, ControlError>>),
    Shutdown,
}

/// Handle for driving the scheduler from outside.
///
/// Controllers are cloneable and can be handed to whatever decides when on-demand triggers fire.
#[derive(Clone)]
pub struct Controller {
    control_tx: Sender<ControlMessage>,
}

impl Controller {
    pub(crate) fn new(control_tx: Sender<ControlMessage>) -> Controller { Controller { control_tx } }

    /// Fires `trigger` and waits for its report to finish.
    ///
    /// Returns how many metrics were delivered.  Any declared trigger can be fired, including
    /// interval triggers.
    pub fn fire(&self, trigger: &str) -> Result<usize, ControlError> {
        let (tx, rx) = bounded(1);
        let msg = ControlMessage::Fire(trigger.to_owned(), tx);

        match self.control_tx.send(msg) {
            Ok(()) => match rx.recv() {
                Ok(result) => result,
                Err(_) => Err(ControlError::Stopped),
            },
            Err(_) => Err(ControlError::Stopped),
        }
    }

    pub(crate) fn shutdown(&self) { let _ = self.control_tx.send(ControlMessage::Shutdown); }
}
