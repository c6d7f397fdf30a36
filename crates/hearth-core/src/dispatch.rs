//! Multi-channel dispatch
//!
//! Fans one outbound message out to every channel the contact supports,
//! collecting per-channel outcomes without letting one failure abort or mask
//! another. One unified record is persisted per successful channel; the full
//! per-channel result list goes back to the caller either way.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

use crate::channel::{ChannelError, ChannelKind, ChannelSendResult, ChannelSender};
use crate::contacts::Contact;
use crate::store::{Direction, MessageStore, NewUnifiedMessage};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("contact '{0}' is not approved for outbound messages")]
    NotApproved(String),
    #[error("contact '{0}' has no channel with a configured sender and address")]
    NoUsableChannel(String),
}

pub struct Dispatcher {
    senders: Vec<Arc<dyn ChannelSender>>,
    store: Arc<dyn MessageStore>,
    channel_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        senders: Vec<Arc<dyn ChannelSender>>,
        store: Arc<dyn MessageStore>,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            senders,
            store,
            channel_timeout,
        }
    }

    fn sender_for(&self, kind: ChannelKind) -> Option<&Arc<dyn ChannelSender>> {
        self.senders.iter().find(|s| s.kind() == kind)
    }

    /// Attempt delivery on every eligible channel and return all outcomes.
    /// Eligibility is checked before any network call; an unapproved contact
    /// or one with no usable channel is rejected outright.
    pub async fn dispatch(
        &self,
        contact: &Contact,
        body: &str,
        sender_label: &str,
    ) -> Result<Vec<ChannelSendResult>, DispatchError> {
        if !contact.approved {
            return Err(DispatchError::NotApproved(contact.name.clone()));
        }

        // A channel is usable when the contact lists it, has an address for
        // it, and an adapter is configured.
        let mut attempts = Vec::new();
        for &kind in &contact.channels {
            if let (Some(sender), Some(to)) =
                (self.sender_for(kind), contact.address_for(kind))
            {
                attempts.push((kind, Arc::clone(sender), to.to_string()));
            }
        }
        if attempts.is_empty() {
            return Err(DispatchError::NoUsableChannel(contact.name.clone()));
        }

        // The same labeled body goes over the wire on every channel
        let wire_body = format!("[{}] {}", sender_label, body);

        // Launch every channel, then settle all of them. Each branch runs in
        // its own task with its own timeout; a slow or failing branch never
        // cancels the others.
        let mut handles = Vec::with_capacity(attempts.len());
        for (kind, sender, to) in attempts {
            let from = sender.from_address().to_string();
            let body = wire_body.clone();
            let channel_timeout = self.channel_timeout;
            let destination = to.clone();
            let handle = tokio::spawn(async move {
                match timeout(channel_timeout, sender.send(&destination, &body)).await {
                    Ok(Ok(provider_id)) => ChannelSendResult::ok(kind, provider_id),
                    Ok(Err(e)) => ChannelSendResult::failed(kind, e.to_string()),
                    Err(_) => ChannelSendResult::failed(
                        kind,
                        ChannelError::Timeout(channel_timeout).to_string(),
                    ),
                }
            });
            handles.push((kind, from, to, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (kind, from, to, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("{} send task panicked: {}", kind.as_str(), e);
                    ChannelSendResult::failed(kind, format!("send task failed: {}", e))
                }
            };

            if result.success {
                info!(
                    "Sent {} message to {} ({})",
                    kind.as_str(),
                    contact.name,
                    to
                );
                // The message already left the system; a store failure here
                // is logged, never surfaced as a send failure.
                let record = NewUnifiedMessage {
                    content: wire_body.clone(),
                    direction: Direction::Outgoing,
                    channel: kind,
                    from_address: from,
                    to_address: to,
                    contact_name: contact.name.clone(),
                };
                if let Err(e) = self.store.append(record).await {
                    error!(
                        "Failed to record outgoing {} message to {}: {}",
                        kind.as_str(),
                        contact.name,
                        e
                    );
                }
            }
            results.push(result);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSender {
        kind: ChannelKind,
        from: String,
        calls: AtomicUsize,
        last_body: Mutex<Option<String>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl FakeSender {
        fn new(kind: ChannelKind, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                from: match kind {
                    ChannelKind::Sms => "+15550001111".to_string(),
                    ChannelKind::Email => "relay@family.example".to_string(),
                },
                calls: AtomicUsize::new(0),
                last_body: Mutex::new(None),
                fail,
                delay: None,
            })
        }

        fn slow(kind: ChannelKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                from: "slow@family.example".to_string(),
                calls: AtomicUsize::new(0),
                last_body: Mutex::new(None),
                fail: false,
                delay: Some(delay),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChannelSender for FakeSender {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, _to: &str, body: &str) -> Result<String, ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_body.lock().unwrap() = Some(body.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                Err(ChannelError::Provider("provider down".to_string()))
            } else {
                Ok(format!("{}-id-1", self.kind.as_str()))
            }
        }

        fn from_address(&self) -> &str {
            &self.from
        }
    }

    fn contact(approved: bool, channels: Vec<ChannelKind>) -> Contact {
        Contact {
            id: "mom".to_string(),
            name: "Mom".to_string(),
            phone: Some("+15551234567".to_string()),
            email: Some("mom@family.example".to_string()),
            emoji: None,
            approved,
            channels,
        }
    }

    fn dispatcher(
        senders: Vec<Arc<dyn ChannelSender>>,
        store: Arc<MemoryStore>,
        timeout: Duration,
    ) -> Dispatcher {
        Dispatcher::new(senders, store, timeout)
    }

    #[tokio::test]
    async fn test_one_channel_failure_does_not_mask_the_other() {
        let sms = FakeSender::new(ChannelKind::Sms, true);
        let email = FakeSender::new(ChannelKind::Email, false);
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(
            vec![sms.clone(), email.clone()],
            store.clone(),
            Duration::from_secs(5),
        );

        let results = dispatcher
            .dispatch(
                &contact(true, vec![ChannelKind::Sms, ChannelKind::Email]),
                "dinner at 6",
                "Dad",
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(sms.call_count(), 1);
        assert_eq!(email.call_count(), 1);

        let sms_result = results.iter().find(|r| r.channel == ChannelKind::Sms).unwrap();
        let email_result = results.iter().find(|r| r.channel == ChannelKind::Email).unwrap();
        assert!(!sms_result.success);
        assert!(sms_result.error.as_deref().unwrap().contains("provider down"));
        assert!(email_result.success);
        assert_eq!(email_result.provider_message_id.as_deref(), Some("email-id-1"));

        // Only the successful channel is persisted
        let persisted = store.list_recent(10).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].channel, ChannelKind::Email);
        assert_eq!(persisted[0].direction, Direction::Outgoing);
        assert_eq!(persisted[0].to_address, "mom@family.example");
    }

    #[tokio::test]
    async fn test_partial_success_persists_only_the_successful_channel() {
        let sms = FakeSender::new(ChannelKind::Sms, false);
        let email = FakeSender::new(ChannelKind::Email, true);
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(
            vec![sms.clone(), email.clone()],
            store.clone(),
            Duration::from_secs(5),
        );

        let results = dispatcher
            .dispatch(
                &contact(true, vec![ChannelKind::Sms, ChannelKind::Email]),
                "movie night?",
                "Dad",
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.channel == ChannelKind::Sms && r.success));
        assert!(results.iter().any(|r| r.channel == ChannelKind::Email && !r.success));

        let persisted = store.list_recent(10).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].channel, ChannelKind::Sms);
        assert_eq!(persisted[0].to_address, "+15551234567");
    }

    #[tokio::test]
    async fn test_channels_outside_the_contact_set_are_never_attempted() {
        let sms = FakeSender::new(ChannelKind::Sms, false);
        let email = FakeSender::new(ChannelKind::Email, false);
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(
            vec![sms.clone(), email.clone()],
            store.clone(),
            Duration::from_secs(5),
        );

        let results = dispatcher
            .dispatch(&contact(true, vec![ChannelKind::Email]), "hi", "Dad")
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].channel, ChannelKind::Email);
        assert_eq!(sms.call_count(), 0);
        assert_eq!(email.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unapproved_contact_makes_zero_network_calls() {
        let sms = FakeSender::new(ChannelKind::Sms, false);
        let email = FakeSender::new(ChannelKind::Email, false);
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(
            vec![sms.clone(), email.clone()],
            store.clone(),
            Duration::from_secs(5),
        );

        let result = dispatcher
            .dispatch(
                &contact(false, vec![ChannelKind::Sms, ChannelKind::Email]),
                "hi",
                "Dad",
            )
            .await;

        assert!(matches!(result, Err(DispatchError::NotApproved(_))));
        assert_eq!(sms.call_count(), 0);
        assert_eq!(email.call_count(), 0);
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_usable_channel_is_rejected() {
        // Contact only supports SMS but no SMS sender is configured
        let email = FakeSender::new(ChannelKind::Email, false);
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(vec![email.clone()], store, Duration::from_secs(5));

        let result = dispatcher
            .dispatch(&contact(true, vec![ChannelKind::Sms]), "hi", "Dad")
            .await;

        assert!(matches!(result, Err(DispatchError::NoUsableChannel(_))));
        assert_eq!(email.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sender_label_prefixes_every_channel() {
        let sms = FakeSender::new(ChannelKind::Sms, false);
        let email = FakeSender::new(ChannelKind::Email, false);
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(
            vec![sms.clone(), email.clone()],
            store.clone(),
            Duration::from_secs(5),
        );

        dispatcher
            .dispatch(
                &contact(true, vec![ChannelKind::Sms, ChannelKind::Email]),
                "see you soon",
                "Grandma",
            )
            .await
            .unwrap();

        assert_eq!(
            sms.last_body.lock().unwrap().as_deref(),
            Some("[Grandma] see you soon")
        );
        assert_eq!(
            email.last_body.lock().unwrap().as_deref(),
            Some("[Grandma] see you soon")
        );

        let persisted = store.list_recent(10).await.unwrap();
        assert_eq!(persisted.len(), 2);
        assert!(persisted.iter().all(|m| m.content == "[Grandma] see you soon"));
    }

    #[tokio::test]
    async fn test_slow_channel_times_out_without_blocking_the_other() {
        let sms = FakeSender::slow(ChannelKind::Sms, Duration::from_millis(500));
        let email = FakeSender::new(ChannelKind::Email, false);
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(
            vec![sms.clone(), email.clone()],
            store.clone(),
            Duration::from_millis(50),
        );

        let results = dispatcher
            .dispatch(
                &contact(true, vec![ChannelKind::Sms, ChannelKind::Email]),
                "hi",
                "Dad",
            )
            .await
            .unwrap();

        let sms_result = results.iter().find(|r| r.channel == ChannelKind::Sms).unwrap();
        let email_result = results.iter().find(|r| r.channel == ChannelKind::Email).unwrap();
        assert!(!sms_result.success);
        assert!(sms_result.error.as_deref().unwrap().contains("timed out"));
        assert!(email_result.success);

        let persisted = store.list_recent(10).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].channel, ChannelKind::Email);
    }
}
