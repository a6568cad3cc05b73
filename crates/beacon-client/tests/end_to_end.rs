//! Client store driven by a live server.

use std::sync::Arc;
use std::time::Duration;

use beacon_client::{
    ClientEvent, NativeNotification, NativeNotifier, NotificationClient, NotificationStore,
    PermissionState, ReconnectPolicy,
};
use beacon_core::{AlertDraft, NotificationDraft, ServerMessage};
use beacon_server::config::ServerConfig;
use beacon_server::server::BeaconServer;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingNotifier {
    shown: Mutex<Vec<NativeNotification>>,
}

impl NativeNotifier for RecordingNotifier {
    fn permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn show(&self, notification: &NativeNotification) {
        self.shown.lock().push(notification.clone());
    }
}

struct Dashboard {
    store: Arc<Mutex<NotificationStore>>,
    notifier: Arc<RecordingNotifier>,
    events: broadcast::Receiver<ClientEvent>,
    cancel: tokio_util::sync::CancellationToken,
    task: JoinHandle<()>,
}

impl Dashboard {
    fn start(url: &str, store: Arc<Mutex<NotificationStore>>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let client = NotificationClient::new(url, Arc::clone(&store), notifier.clone())
            .with_policy(ReconnectPolicy {
                base_delay_ms: 50,
                max_delay_ms: 200,
                jitter: 0.0,
            });
        let events = client.subscribe();
        let cancel = client.cancel_token();
        let task = tokio::spawn(async move { client.run().await });
        Self {
            store,
            notifier,
            events,
            cancel,
            task,
        }
    }

    fn with_identity(url: &str, identity: &str) -> Self {
        let mut store = NotificationStore::default();
        store.set_identity(Some(identity.into()));
        Self::start(url, Arc::new(Mutex::new(store)))
    }

    async fn wait_for(&mut self, pred: impl Fn(&ServerMessage) -> bool) {
        timeout(TIMEOUT, async {
            loop {
                if let Ok(ClientEvent::Received(msg)) = self.events.recv().await {
                    if pred(&msg) {
                        return;
                    }
                }
            }
        })
        .await
        .expect("timed out waiting for server frame");
    }

    async fn wait_joined(&mut self) {
        self.wait_for(|m| matches!(m, ServerMessage::Joined { .. }))
            .await;
    }

    async fn stop(self) -> Arc<Mutex<NotificationStore>> {
        self.cancel.cancel();
        timeout(TIMEOUT, self.task).await.unwrap().unwrap();
        self.store
    }
}

async fn boot() -> (String, Arc<BeaconServer>) {
    let server = Arc::new(BeaconServer::new(ServerConfig {
        port: 0,
        ..ServerConfig::default()
    }));
    let (addr, _handle) = server.listen().await.unwrap();
    (format!("ws://{addr}/ws"), server)
}

fn alert(severity: i64) -> AlertDraft {
    AlertDraft {
        kind: "falco".into(),
        severity,
        title: format!("falco severity {severity}"),
        description: "Terminal shell in container".into(),
        source: "falco".into(),
    }
}

async fn wait_for_connections(server: &BeaconServer, expected: usize) {
    timeout(TIMEOUT, async {
        while server.registry().connection_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never reached expected connection count");
}

#[tokio::test]
async fn targeted_and_broadcast_reach_the_right_stores() {
    let (url, server) = boot().await;
    let mut a = Dashboard::with_identity(&url, "a@x.com");
    let mut b = Dashboard::with_identity(&url, "b@x.com");
    a.wait_joined().await;
    b.wait_joined().await;

    let dispatcher = server.dispatcher().get().unwrap();
    let (note, _) = dispatcher
        .notify(
            "a@x.com",
            NotificationDraft {
                title: "Policy applied".into(),
                message: "deny-privileged".into(),
            },
        )
        .unwrap();
    a.wait_for(|m| matches!(m, ServerMessage::Notification(_)))
        .await;

    let (critical, report) = dispatcher.alert(alert(9)).unwrap();
    assert_eq!(report.recipients, 2);
    a.wait_for(|m| matches!(m, ServerMessage::GlobalAlert(_))).await;
    b.wait_for(|m| matches!(m, ServerMessage::GlobalAlert(_))).await;

    {
        let store = a.store.lock();
        assert_eq!(store.notifications().latest().unwrap().id, note.id);
        assert_eq!(store.alerts().latest().unwrap().id, critical.id);
    }
    {
        let store = b.store.lock();
        assert!(store.notifications().is_empty());
        assert_eq!(store.alerts().latest().unwrap().id, critical.id);
    }

    for dash in [&a, &b] {
        let shown = dash.notifier.shown.lock();
        let native = shown.iter().find(|n| n.tag == critical.id.as_str()).unwrap();
        assert!(native.require_interaction);
    }

    let _ = a.stop().await;
    let _ = b.stop().await;
}

#[tokio::test]
async fn reconnect_keeps_buffers_without_replay() {
    let (url, server) = boot().await;
    let mut dash = Dashboard::with_identity(&url, "a@x.com");
    dash.wait_joined().await;

    let dispatcher = server.dispatcher().get().unwrap();
    let mut held = Vec::new();
    for severity in [3, 6, 9] {
        let (event, _) = dispatcher.alert(alert(severity)).unwrap();
        dash.wait_for(|m| matches!(m, ServerMessage::GlobalAlert(a) if a.id == event.id))
            .await;
        held.push(event.id);
    }

    let store = dash.stop().await;
    assert!(!store.lock().is_connected());
    wait_for_connections(&server, 0).await;

    let (missed, report) = dispatcher.alert(alert(10)).unwrap();
    assert_eq!(report.recipients, 0);

    let mut again = Dashboard::start(&url, store);
    again.wait_joined().await;
    {
        let store = again.store.lock();
        assert!(store.is_connected());
        let ids: Vec<_> = store.alerts().iter().map(|a| a.id.clone()).collect();
        held.reverse();
        assert_eq!(ids, held);
        assert!(!store.alerts().contains(&missed.id));
    }
    let _ = again.stop().await;
}

#[tokio::test]
async fn deregistered_connection_is_not_a_target() {
    let (url, server) = boot().await;
    let mut dash = Dashboard::with_identity(&url, "a@x.com");
    dash.wait_joined().await;

    let dispatcher = server.dispatcher().get().unwrap();
    let (_, _) = dispatcher.alert(alert(5)).unwrap();
    dash.wait_for(|m| matches!(m, ServerMessage::GlobalAlert(_)))
        .await;

    let id = dash.store.lock().connection_id().cloned().unwrap();
    assert!(server.registry().leave(&id));
    let (_, report) = dispatcher.alert(alert(5)).unwrap();
    assert_eq!(report.recipients, 0);

    assert_eq!(dash.store.lock().alerts().len(), 1);
    let _ = dash.stop().await;
}
