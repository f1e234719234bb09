// Channel-backed action presenter
//
// Hosts that render dialogs in another task receive `PendingDialog`s from a queue and answer
// each one exactly once. Answering consumes the dialog.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::remote::ActionPresenter;

/// A dialog waiting for the user
#[derive(Debug)]
pub struct PendingDialog {
    action: Value,
    responder: oneshot::Sender<Option<Value>>,
}

impl PendingDialog {
    pub fn action(&self) -> &Value {
        &self.action
    }

    /// Close with the save result of the form
    pub fn save(self, result: Value) {
        self.close(Some(result));
    }

    /// Close through the cancel button
    pub fn cancel(self) {
        self.close(Some(json!({"special": true})));
    }

    /// Close without any result
    pub fn dismiss(self) {
        self.close(None);
    }

    fn close(self, result: Option<Value>) {
        if self.responder.send(result).is_err() {
            debug!("Dialog answered after its requester went away");
        }
    }
}

/// Presenter half, handed to the confirmation gateway
#[derive(Debug, Clone)]
pub struct DialogChannel {
    sender: mpsc::Sender<PendingDialog>,
}

/// Host half, yields dialogs in the order they were opened
#[derive(Debug)]
pub struct DialogReceiver {
    receiver: mpsc::Receiver<PendingDialog>,
}

impl DialogReceiver {
    pub async fn next(&mut self) -> Option<PendingDialog> {
        self.receiver.recv().await
    }

    pub fn try_next(&mut self) -> Option<PendingDialog> {
        self.receiver.try_recv().ok()
    }
}

pub fn dialog_channel(capacity: usize) -> (DialogChannel, DialogReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (DialogChannel { sender }, DialogReceiver { receiver })
}

#[async_trait]
impl ActionPresenter for DialogChannel {
    async fn do_action(&self, action: Value) -> Result<Option<Value>> {
        let (responder, response) = oneshot::channel();
        self.sender
            .send(PendingDialog { action, responder })
            .await
            .map_err(|_| anyhow!("Dialog host is no longer listening"))?;

        match response.await {
            Ok(result) => Ok(result),
            Err(_) => {
                debug!("Dialog dropped without an answer, treating it as closed");
                Ok(None)
            }
        }
    }
}
