use super::AccountState;
use crate::{proto::Any, retry::Submitted, Error};
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};

/// Messages that can be sent to a [Mailbox].
pub enum Message {
    /// Sign and broadcast `msgs` at the current sequence.
    Submit {
        msgs: Vec<Any>,
        wait: bool,
        responder: oneshot::Sender<Result<Submitted, Error>>,
    },
    /// Snapshot of the current state.
    State {
        responder: oneshot::Sender<AccountState>,
    },
}

/// A mailbox that can be used to send [Message]s to an [super::Engine].
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    /// Creates a new [Mailbox] with the given [mpsc::Sender].
    pub(super) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    /// Submit `msgs` and wait for the outcome.
    ///
    /// If `wait` is set, the outcome also includes block inclusion.
    pub async fn submit(&mut self, msgs: Vec<Any>, wait: bool) -> Result<Submitted, Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Submit {
                msgs,
                wait,
                responder,
            })
            .await
            .map_err(|_| Error::Closed)?;
        receiver.await.map_err(|_| Error::Closed)?
    }

    /// Current account state.
    pub async fn state(&mut self) -> Result<AccountState, Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::State { responder })
            .await
            .map_err(|_| Error::Closed)?;
        receiver.await.map_err(|_| Error::Closed)
    }
}
