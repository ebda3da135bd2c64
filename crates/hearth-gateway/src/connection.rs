use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use hearth_types::events::{GatewayCommand, GatewayEvent, LiveQuery};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Events queued for one client before it counts as too slow and is dropped.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Handle a pre-authenticated WebSocket connection. The JWT was validated at
/// the HTTP upgrade layer, so the client is bound to `user_id` from the start.
///
/// A client that lets `outbox_capacity` events pile up is disconnected. It
/// reconnects and reopens its live queries, which starts from a fresh
/// snapshot instead of a feed with holes in it.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    user_id: Uuid,
    display_name: String,
    outbox_capacity: usize,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", display_name, user_id);

    let (out_tx, mut out_rx) = mpsc::channel::<GatewayEvent>(outbox_capacity.max(1));
    let overflow = Arc::new(Notify::new());
    if out_tx
        .try_send(GatewayEvent::Ready {
            user_id,
            display_name: display_name.clone(),
        })
        .is_err()
    {
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = out_rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client. Live queries are owned by this task and are
    // torn down with it.
    let recv_name = display_name.clone();
    let recv_overflow = overflow.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut live = LiveQueries::new(dispatcher, user_id, out_tx, recv_overflow);

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => live.handle(cmd),
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            recv_name,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        live.close_all();
    });

    // Wait for either task to finish, or for the outbox to overflow
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        _ = overflow.notified() => {
            warn!("{} ({}) is not keeping up, dropping connection", display_name, user_id);
            send_task.abort();
            recv_task.abort();
        }
    }

    info!("{} ({}) disconnected from gateway", display_name, user_id);
}

/// Queue `event` for the client. Returns false when the connection is gone,
/// or when the outbox is full, in which case `overflow` is signalled.
fn enqueue(
    tx: &mpsc::Sender<GatewayEvent>,
    overflow: &Notify,
    user_id: Uuid,
    event: GatewayEvent,
) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Gateway outbox full for {}", user_id);
            overflow.notify_one();
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// The set of live queries opened by one connection. Each runs as a
/// forwarding task from its `Subscription` into the connection's outbox.
struct LiveQueries {
    dispatcher: Dispatcher,
    user_id: Uuid,
    out_tx: mpsc::Sender<GatewayEvent>,
    overflow: Arc<Notify>,
    active: HashMap<LiveQuery, JoinHandle<()>>,
}

impl LiveQueries {
    fn new(
        dispatcher: Dispatcher,
        user_id: Uuid,
        out_tx: mpsc::Sender<GatewayEvent>,
        overflow: Arc<Notify>,
    ) -> Self {
        Self {
            dispatcher,
            user_id,
            out_tx,
            overflow,
            active: HashMap::new(),
        }
    }

    fn handle(&mut self, cmd: GatewayCommand) {
        match cmd {
            GatewayCommand::Subscribe { query } => self.open(query),
            GatewayCommand::Unsubscribe { query } => self.close(query),
        }
    }

    fn open(&mut self, query: LiveQuery) {
        if self.active.contains_key(&query) {
            return;
        }

        let mut sub = self.dispatcher.subscribe(query.bind(self.user_id));
        let tx = self.out_tx.clone();
        let overflow = self.overflow.clone();
        let user_id = self.user_id;
        let handle = tokio::spawn(async move {
            while let Some(event) = sub.next().await {
                if !enqueue(&tx, &overflow, user_id, GatewayEvent::Change { query, event }) {
                    break;
                }
            }
            sub.unsubscribe();
        });

        self.active.insert(query, handle);
        enqueue(&self.out_tx, &self.overflow, self.user_id, GatewayEvent::Subscribed { query });
        info!("{} opened live query {:?}", self.user_id, query);
    }

    fn close(&mut self, query: LiveQuery) {
        if let Some(handle) = self.active.remove(&query) {
            handle.abort();
            enqueue(
                &self.out_tx,
                &self.overflow,
                self.user_id,
                GatewayEvent::Unsubscribed { query },
            );
        }
    }

    fn close_all(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}

impl Drop for LiveQueries {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use hearth_types::events::ChangeEvent;
    use hearth_types::models::{BookingRequest, BookingStatus};

    use super::*;

    const WAIT: Duration = Duration::from_secs(1);

    fn booking(requester_id: Uuid, recipient_id: Uuid) -> BookingRequest {
        BookingRequest {
            id: Uuid::new_v4(),
            requester_id,
            recipient_id,
            listing_id: None,
            message: "Two months from June".into(),
            status: BookingStatus::Pending,
            payment_proofs: vec![],
            legit_proofs: None,
            created_at: chrono::Utc::now(),
        }
    }

    fn fixture(
        capacity: usize,
    ) -> (LiveQueries, mpsc::Receiver<GatewayEvent>, Dispatcher, Arc<Notify>, Uuid) {
        let dispatcher = Dispatcher::new();
        let user_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity);
        let overflow = Arc::new(Notify::new());
        let live = LiveQueries::new(dispatcher.clone(), user_id, tx, overflow.clone());
        (live, rx, dispatcher, overflow, user_id)
    }

    async fn recv(rx: &mut mpsc::Receiver<GatewayEvent>) -> GatewayEvent {
        tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_a_no_op() {
        let (mut live, mut rx, dispatcher, _, _) = fixture(8);
        let subscribe = || GatewayCommand::Subscribe {
            query: LiveQuery::BookingsForRecipient,
        };
        live.handle(subscribe());
        live.handle(subscribe());

        assert!(matches!(
            recv(&mut rx).await,
            GatewayEvent::Subscribed { query: LiveQuery::BookingsForRecipient }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(live.active.len(), 1);
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_confirms_once() {
        let (mut live, mut rx, _, _, _) = fixture(8);
        live.handle(GatewayCommand::Subscribe {
            query: LiveQuery::ReviewsForMe,
        });
        live.handle(GatewayCommand::Unsubscribe {
            query: LiveQuery::ReviewsForMe,
        });
        live.handle(GatewayCommand::Unsubscribe {
            query: LiveQuery::ReviewsForMe,
        });

        assert!(matches!(recv(&mut rx).await, GatewayEvent::Subscribed { .. }));
        assert!(matches!(
            recv(&mut rx).await,
            GatewayEvent::Unsubscribed { query: LiveQuery::ReviewsForMe }
        ));
        assert!(rx.try_recv().is_err());
        assert!(live.active.is_empty());
    }

    #[tokio::test]
    async fn queries_are_bound_to_the_connection_user() {
        let (mut live, mut rx, dispatcher, _, me) = fixture(8);
        live.handle(GatewayCommand::Subscribe {
            query: LiveQuery::BookingsForRecipient,
        });
        assert!(matches!(recv(&mut rx).await, GatewayEvent::Subscribed { .. }));

        dispatcher.publish(ChangeEvent::BookingRequestAdded(booking(me, Uuid::new_v4())));
        let mine = booking(Uuid::new_v4(), me);
        dispatcher.publish(ChangeEvent::BookingRequestAdded(mine.clone()));

        match recv(&mut rx).await {
            GatewayEvent::Change { query, event } => {
                assert_eq!(query, LiveQuery::BookingsForRecipient);
                assert_eq!(event.booking().map(|b| b.id), Some(mine.id));
            }
            other => panic!("expected change, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn a_full_outbox_signals_overflow() {
        let (mut live, mut rx, dispatcher, overflow, me) = fixture(2);
        live.handle(GatewayCommand::Subscribe {
            query: LiveQuery::BookingsForRecipient,
        });
        for _ in 0..5 {
            dispatcher.publish(ChangeEvent::BookingRequestAdded(booking(Uuid::new_v4(), me)));
        }

        tokio::time::timeout(WAIT, overflow.notified()).await.unwrap();

        // Nothing beyond the capacity was queued.
        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 2);
    }
}
