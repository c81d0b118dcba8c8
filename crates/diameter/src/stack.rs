use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::message::Message;
use crate::transport::DiameterTransport;
use crate::{DiameterError, Result};

/// Handles HSS-initiated requests (push-profile, registration-termination).
/// Returning an answer sends it back to the peer.
#[async_trait]
pub trait IncomingRequestHandler: Send + Sync {
    async fn handle_request(&self, request: Message) -> Option<Message>;
}

type Pending = Arc<DashMap<String, oneshot::Sender<Message>>>;
type Handler = Arc<RwLock<Option<Arc<dyn IncomingRequestHandler>>>>;

/// The Cx transaction layer.
///
/// Outbound requests are matched to answers by session id under a
/// per-transaction timer; a late answer finds no pending entry and is
/// discarded. Inbound requests are dispatched to the registered handler on
/// their own task so user code never blocks the dispatch loop.
pub struct DiameterStack {
    transport: Arc<dyn DiameterTransport>,
    pending: Pending,
    handler: Handler,
    request_timeout: Duration,
}

impl DiameterStack {
    pub fn new(
        transport: Arc<dyn DiameterTransport>,
        incoming: mpsc::Receiver<Message>,
        request_timeout: Duration,
    ) -> Arc<Self> {
        let stack = Arc::new(Self {
            transport,
            pending: Arc::new(DashMap::new()),
            handler: Arc::new(RwLock::new(None)),
            request_timeout,
        });
        stack.spawn_dispatch(incoming);
        stack
    }

    pub async fn set_request_handler(&self, handler: Arc<dyn IncomingRequestHandler>) {
        *self.handler.write().await = Some(handler);
    }

    fn spawn_dispatch(&self, mut incoming: mpsc::Receiver<Message>) {
        let pending = Arc::clone(&self.pending);
        let handler = Arc::clone(&self.handler);
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            while let Some(message) = incoming.recv().await {
                if message.is_request() {
                    let registered = handler.read().await.clone();
                    match registered {
                        Some(request_handler) => {
                            let transport = Arc::clone(&transport);
                            tokio::spawn(async move {
                                if let Some(answer) =
                                    request_handler.handle_request(message).await
                                {
                                    if let Err(e) = transport.send(answer.encode()).await {
                                        tracing::warn!(error = %e, "Failed to send answer");
                                    }
                                }
                            });
                        }
                        None => {
                            tracing::warn!(code = message.code, "No handler for incoming request")
                        }
                    }
                    continue;
                }

                match message.session_id() {
                    Some(session_id) => match pending.remove(&session_id) {
                        Some((_, tx)) => {
                            let _ = tx.send(message);
                        }
                        None => {
                            tracing::debug!(%session_id, "Discarding late or unmatched answer")
                        }
                    },
                    None => tracing::warn!(code = message.code, "Answer without session id"),
                }
            }
            tracing::info!("Diameter dispatch loop ended");
        });
    }

    /// Send a request and wait for its answer or the transaction timer.
    pub async fn send_request(&self, request: Message) -> Result<Message> {
        let session_id = request
            .session_id()
            .ok_or_else(|| DiameterError::InvalidRequest("request without session id".into()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(session_id.clone(), tx);

        if let Err(e) = self.transport.send(request.encode()).await {
            self.pending.remove(&session_id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => {
                self.pending.remove(&session_id);
                Err(DiameterError::Closed)
            }
            Err(_) => {
                // Timer fired: drop the pending entry so a late answer is
                // discarded rather than delivered.
                self.pending.remove(&session_id);
                tracing::warn!(%session_id, "Diameter transaction timed out");
                Err(DiameterError::Timeout)
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::cx::{answer_for, AnswerResult};
    use crate::dictionary::*;
    use crate::message::new_session_id;
    use crate::transport::ChannelTransport;
    use crate::Avp;

    struct Peer {
        stack: Arc<DiameterStack>,
        wire: UnboundedReceiver<Message>,
        inject: mpsc::Sender<Message>,
    }

    fn peer(timeout: Duration) -> Peer {
        let (transport, wire) = ChannelTransport::new();
        let (inject, incoming) = mpsc::channel(8);
        let stack = DiameterStack::new(transport, incoming, timeout);
        Peer { stack, wire, inject }
    }

    fn request() -> Message {
        Message::request(CMD_LOCATION_INFO, CX_APPLICATION_ID).with_avp(Avp::utf8(
            AVP_SESSION_ID,
            None,
            &new_session_id("hs1.example.com"),
        ))
    }

    #[tokio::test]
    async fn answer_is_matched_by_session_id() {
        let mut peer = peer(Duration::from_secs(1));
        let stack = Arc::clone(&peer.stack);

        let request = request();
        let send = tokio::spawn(async move { stack.send_request(request).await });

        let seen = peer.wire.recv().await.unwrap();
        let answer = answer_for(&seen, AnswerResult::Code(DIAMETER_SUCCESS));
        peer.inject.send(answer).await.unwrap();

        let answer = send.await.unwrap().unwrap();
        assert_eq!(answer.result_code().unwrap(), DIAMETER_SUCCESS);
        assert_eq!(peer.stack.pending_count(), 0);
    }

    #[tokio::test]
    async fn transaction_times_out_and_late_answer_is_discarded() {
        let mut peer = peer(Duration::from_millis(20));

        let first_request = request();
        let err = peer.stack.send_request(first_request).await.unwrap_err();
        assert!(matches!(err, DiameterError::Timeout));
        assert_eq!(peer.stack.pending_count(), 0);

        // The answer arrives after the timer fired; it must be dropped and
        // must not break the next transaction.
        let seen = peer.wire.recv().await.unwrap();
        let late = answer_for(&seen, AnswerResult::Code(DIAMETER_SUCCESS));
        peer.inject.send(late).await.unwrap();

        let stack = Arc::clone(&peer.stack);
        let second = request();
        let send = tokio::spawn(async move { stack.send_request(second).await });
        let seen = peer.wire.recv().await.unwrap();
        peer.inject
            .send(answer_for(&seen, AnswerResult::Code(DIAMETER_SUCCESS)))
            .await
            .unwrap();
        assert!(send.await.unwrap().is_ok());
    }

    struct CountingHandler {
        handled: AtomicUsize,
    }

    #[async_trait]
    impl IncomingRequestHandler for CountingHandler {
        async fn handle_request(&self, request: Message) -> Option<Message> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            Some(answer_for(&request, AnswerResult::Code(DIAMETER_SUCCESS)))
        }
    }

    #[tokio::test]
    async fn unsolicited_request_reaches_handler_and_is_answered() {
        let mut peer = peer(Duration::from_secs(1));
        let handler = Arc::new(CountingHandler { handled: AtomicUsize::new(0) });
        peer.stack.set_request_handler(handler.clone()).await;

        let push = Message::request(CMD_PUSH_PROFILE, CX_APPLICATION_ID).with_avp(Avp::utf8(
            AVP_SESSION_ID,
            None,
            "hss;5;5",
        ));
        peer.inject.send(push).await.unwrap();

        // The handler's answer comes back out over the transport.
        let answer = peer.wire.recv().await.unwrap();
        assert!(!answer.is_request());
        assert_eq!(answer.code, CMD_PUSH_PROFILE);
        assert_eq!(answer.session_id().unwrap(), "hss;5;5");
        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
    }
}
