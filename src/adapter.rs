//! Transport adapter: owns the MQTT connection and the delivery loop.
//!
//! Two tasks run per adapter. The *pump* owns the rumqttc event loop and
//! handles the connection lifecycle: it subscribes to the request topic on
//! every ConnAck (broker-side subscription state may not survive a reconnect,
//! and a missing subscription silently stops all request delivery) and turns
//! inbound publishes into [`InboundEnvelope`]s on a bounded channel. The
//! *consumer* reads that channel one envelope at a time, invokes the
//! processor, and publishes the response to the reply topic named in the
//! envelope, if any.
//!
//! At most one request is in flight per adapter; the bounded channel gives
//! implicit backpressure. Shutdown is cooperative: [`MessageAdapter::close`]
//! unsubscribes, the pump disconnects after the UnsubAck and exits, channel
//! closure then stops the consumer once the in-flight request has finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::Outgoing;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, Publish, UnsubAckReason};
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AdapterConfig;
use crate::processor::MessageProcessor;

/// One inbound request as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    pub payload: Bytes,
    /// Reply address from the MQTT v5 response-topic property. Absent for
    /// fire-and-forget requests, whose responses are discarded.
    pub reply_topic: Option<String>,
}

impl From<Publish> for InboundEnvelope {
    fn from(publish: Publish) -> Self {
        Self {
            payload: publish.payload,
            reply_topic: publish
                .properties
                .and_then(|properties| properties.response_topic),
        }
    }
}

type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Where dispatched responses go. Seam for tests; the production
/// implementation is the MQTT client itself.
#[async_trait]
trait ResponsePublisher: Send + Sync {
    async fn publish_response(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

#[async_trait]
impl ResponsePublisher for AsyncClient {
    async fn publish_response(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        // At-least-once: the caller asked for a response, so it must not be
        // lost to a dropped packet.
        self.publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

/// Bridges the broker to a [`MessageProcessor`].
pub struct MessageAdapter {
    client: AsyncClient,
    request_topic: String,
    closing: Arc<AtomicBool>,
    pump: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl MessageAdapter {
    /// Start the adapter. The connection itself is established by the pump's
    /// first poll; connect failures are logged and retried forever, never
    /// escalated.
    pub fn connect(config: AdapterConfig, processor: Arc<dyn MessageProcessor>) -> Self {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(config.keep_alive);

        let (client, event_loop) = AsyncClient::new(options, 16);
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity);
        let closing = Arc::new(AtomicBool::new(false));

        let pump = tokio::spawn(pump_loop(
            event_loop,
            client.clone(),
            config.request_topic.clone(),
            config.reconnect_delay,
            Arc::clone(&closing),
            inbox_tx,
        ));
        let consumer = tokio::spawn(consumer_loop(inbox_rx, processor, client.clone()));

        Self {
            client,
            request_topic: config.request_topic,
            closing,
            pump,
            consumer,
        }
    }

    /// Shut the adapter down: unsubscribe, wait for the UnsubAck, disconnect,
    /// and block until both loops have exited. An in-flight `process` call is
    /// never cancelled; the consumer finishes it before stopping.
    pub async fn close(self) {
        self.closing.store(true, Ordering::SeqCst);

        if let Err(reason) = self.client.unsubscribe(self.request_topic.as_str()).await {
            warn!(reason = %reason, "Unsubscribe request failed, disconnecting directly");
            let _ = self.client.disconnect().await;
        }

        if let Err(reason) = self.pump.await {
            error!(reason = %reason, "Transport pump task failed");
        }
        if let Err(reason) = self.consumer.await {
            error!(reason = %reason, "Dispatch task failed");
        }

        info!("Message adapter closed");
    }
}

async fn pump_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    request_topic: String,
    reconnect_delay: Duration,
    closing: Arc<AtomicBool>,
    inbox: mpsc::Sender<InboundEnvelope>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    error!(code = ?ack.code, "Broker refused connection");
                    continue;
                }
                // Always subscribe from the ConnAck arm, never only at
                // startup: the subscription must be re-established after
                // every reconnect.
                match client
                    .subscribe(request_topic.as_str(), QoS::AtLeastOnce)
                    .await
                {
                    Ok(_) => info!(topic = %request_topic, "Subscribed to request topic"),
                    Err(reason) => {
                        error!(topic = %request_topic, reason = %reason, "Subscribe request failed");
                    }
                }
            }

            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(
                    topic = %String::from_utf8_lossy(&publish.topic),
                    bytes = publish.payload.len(),
                    "Request received"
                );
                if inbox.send(InboundEnvelope::from(publish)).await.is_err() {
                    // Consumer is gone; nothing left to dispatch to.
                    break;
                }
            }

            Ok(Event::Incoming(Packet::UnsubAck(ack))) => {
                if let Some(reason) = ack
                    .reasons
                    .iter()
                    .find(|reason| **reason != UnsubAckReason::Success)
                {
                    error!(reason = ?reason, "Failed to unsubscribe");
                }
                if let Err(reason) = client.disconnect().await {
                    warn!(reason = %reason, "Disconnect request failed");
                    break;
                }
            }

            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("Disconnected from broker");
                break;
            }

            Ok(_) => {}

            Err(reason) => {
                if closing.load(Ordering::SeqCst) {
                    debug!("Connection closed during shutdown");
                    break;
                }
                // rumqttc reconnects on the next poll; keep the loop alive.
                error!(reason = %reason, "Connection lost, retrying");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

async fn consumer_loop(
    mut inbox: mpsc::Receiver<InboundEnvelope>,
    processor: Arc<dyn MessageProcessor>,
    publisher: impl ResponsePublisher,
) {
    while let Some(envelope) = inbox.recv().await {
        dispatch(envelope, processor.as_ref(), &publisher).await;
    }
    debug!("Inbox closed, dispatch loop stopping");
}

async fn dispatch(
    envelope: InboundEnvelope,
    processor: &dyn MessageProcessor,
    publisher: &impl ResponsePublisher,
) {
    let response = processor.process(&envelope.payload).await;

    match envelope.reply_topic {
        Some(topic) => {
            if let Err(reason) = publisher.publish_response(&topic, response).await {
                error!(topic = %topic, reason = %reason, "Failed to publish response");
            }
        }
        None => debug!("Request carries no response topic, discarding response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedProcessor {
        responses: Mutex<VecDeque<Vec<u8>>>,
        calls: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedProcessor {
        fn new(responses: &[&[u8]]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_vec()).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageProcessor for ScriptedProcessor {
        async fn process(&self, request: &[u8]) -> Vec<u8> {
            self.calls.lock().unwrap().push(request.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("processor called more times than scripted")
        }
    }

    #[derive(Clone, Default)]
    struct RecordingPublisher {
        published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    #[async_trait]
    impl ResponsePublisher for RecordingPublisher {
        async fn publish_response(
            &self,
            topic: &str,
            payload: Vec<u8>,
        ) -> Result<(), PublishError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }
    }

    fn envelope(payload: &[u8], reply_topic: Option<&str>) -> InboundEnvelope {
        InboundEnvelope {
            payload: Bytes::copy_from_slice(payload),
            reply_topic: reply_topic.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn publishes_processor_output_to_the_reply_topic() {
        let (tx, rx) = mpsc::channel(4);
        let processor = ScriptedProcessor::new(&[b"my-response"]);
        let publisher = RecordingPublisher::default();
        let loop_handle = tokio::spawn(consumer_loop(rx, processor.clone(), publisher.clone()));

        tx.send(envelope(b"my-request", Some("rfc/resp/1")))
            .await
            .unwrap();
        drop(tx);
        loop_handle.await.unwrap();

        assert_eq!(
            *processor.calls.lock().unwrap(),
            vec![b"my-request".to_vec()]
        );
        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec![("rfc/resp/1".to_string(), b"my-response".to_vec())]
        );
    }

    #[tokio::test]
    async fn discards_response_when_no_reply_topic_is_present() {
        let (tx, rx) = mpsc::channel(4);
        let processor = ScriptedProcessor::new(&[b"my-response"]);
        let publisher = RecordingPublisher::default();
        let loop_handle = tokio::spawn(consumer_loop(rx, processor.clone(), publisher.clone()));

        tx.send(envelope(b"my-request", None)).await.unwrap();
        drop(tx);
        loop_handle.await.unwrap();

        // The processor still ran; only the publish was skipped.
        assert_eq!(processor.calls.lock().unwrap().len(), 1);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sequential_requests_never_cross_deliver_responses() {
        let (tx, rx) = mpsc::channel(4);
        let processor = ScriptedProcessor::new(&[b"first-response", b"second-response"]);
        let publisher = RecordingPublisher::default();
        let loop_handle = tokio::spawn(consumer_loop(rx, processor.clone(), publisher.clone()));

        tx.send(envelope(b"first-request", Some("rfc/resp/a")))
            .await
            .unwrap();
        tx.send(envelope(b"second-request", Some("rfc/resp/b")))
            .await
            .unwrap();
        drop(tx);
        loop_handle.await.unwrap();

        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec![
                ("rfc/resp/a".to_string(), b"first-response".to_vec()),
                ("rfc/resp/b".to_string(), b"second-response".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn loop_stops_once_the_inbox_closes() {
        let (tx, rx) = mpsc::channel::<InboundEnvelope>(4);
        let processor = ScriptedProcessor::new(&[]);
        let loop_handle = tokio::spawn(consumer_loop(
            rx,
            processor.clone(),
            RecordingPublisher::default(),
        ));

        drop(tx);
        loop_handle.await.unwrap();

        assert!(processor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_contained() {
        struct FailingPublisher;

        #[async_trait]
        impl ResponsePublisher for FailingPublisher {
            async fn publish_response(
                &self,
                _topic: &str,
                _payload: Vec<u8>,
            ) -> Result<(), PublishError> {
                Err("broker unreachable".into())
            }
        }

        let (tx, rx) = mpsc::channel(4);
        let processor = ScriptedProcessor::new(&[b"a", b"b"]);
        let loop_handle = tokio::spawn(consumer_loop(rx, processor.clone(), FailingPublisher));

        tx.send(envelope(b"one", Some("rfc/resp/1"))).await.unwrap();
        tx.send(envelope(b"two", Some("rfc/resp/2"))).await.unwrap();
        drop(tx);
        loop_handle.await.unwrap();

        // A failed publish is logged, not escalated; delivery continues.
        assert_eq!(processor.calls.lock().unwrap().len(), 2);
    }
}
