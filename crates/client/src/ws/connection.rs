//! Session transport using tokio-tungstenite.
//!
//! One background task owns the socket, the keep-alive interval, the
//! reconnect timer and the dedup set. It is the only place any of them is
//! touched; everything else talks to it through [`WsHandle`].

use std::collections::VecDeque;
use std::future::pending;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::time::Duration;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use mfgdesk_shared::{ClientFrame, NotificationEvent, ServerFrame};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::dispatch::{Deduplicator, Dispatcher};
use super::supervisor::{Effect, Input, SessionPhase, Supervisor};
use crate::config::ClientConfig;
use crate::credentials::{Credential, Credentials};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingOpen = BoxFuture<'static, Result<WsStream, OpenError>>;

/// How long a discarded socket gets to finish its close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
enum OpenError {
    #[error(transparent)]
    Ws(#[from] tungstenite::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug)]
enum Command {
    Connect,
    Reset,
    Subscribe(UnboundedSender<NotificationEvent>),
    Shutdown,
}

/// Handle for controlling and observing a session transport.
#[derive(Clone)]
pub struct WsHandle {
    commands: UnboundedSender<Command>,
    phase: watch::Receiver<SessionPhase>,
    last_event: watch::Receiver<Option<NotificationEvent>>,
}

impl WsHandle {
    /// Connect if a credential is available; otherwise nothing happens.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Leave [`SessionPhase::GaveUp`] so that `connect` works again.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Tear the session down for good. No reconnect fires afterwards.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// Receive every first-seen notification, in arrival order.
    pub fn subscribe(&self) -> UnboundedReceiver<NotificationEvent> {
        let (tx, rx) = unbounded();
        self.send(Command::Subscribe(tx));
        rx
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.phase().is_connected()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.clone()
    }

    /// The most recent first-seen notification.
    pub fn last_event(&self) -> Option<NotificationEvent> {
        self.last_event.borrow().clone()
    }

    pub fn watch_last_event(&self) -> watch::Receiver<Option<NotificationEvent>> {
        self.last_event.clone()
    }

    fn send(&self, cmd: Command) {
        if let Err(e) = self.commands.unbounded_send(cmd) {
            crate::log_debug!("Notification session already stopped: {}", e);
        }
    }
}

/// A managed notification socket. Dropping it tears the session down.
pub struct WsConnection {
    handle: WsHandle,
    task: JoinHandle<()>,
}

impl WsConnection {
    /// Start the session task. Must be called from within a tokio runtime.
    ///
    /// Connects right away when `credentials` already holds a credential and
    /// follows every later login/logout through the same slot.
    pub fn spawn(config: ClientConfig, credentials: Credentials) -> Self {
        let (commands, receiver) = unbounded();
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);
        let (last_event_tx, last_event_rx) = watch::channel(None);

        let driver = SessionDriver::new(config, credentials, phase_tx, last_event_tx);
        let task = tokio::spawn(driver.run(receiver));

        Self {
            handle: WsHandle {
                commands,
                phase: phase_rx,
                last_event: last_event_rx,
            },
            task,
        }
    }

    /// Get a handle for controlling the session
    pub fn handle(&self) -> WsHandle {
        self.handle.clone()
    }

    /// Tear down and wait for the session task to finish.
    pub async fn shutdown(mut self) {
        self.handle.shutdown();
        if let Err(e) = (&mut self.task).await {
            crate::log_error!("Notification session task failed: {}", e);
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        let _ = self.handle.commands.unbounded_send(Command::Shutdown);
    }
}

struct SessionDriver {
    config: ClientConfig,
    credentials: Credentials,
    credential_rx: watch::Receiver<Option<Credential>>,
    supervisor: Supervisor,
    opening: Option<PendingOpen>,
    socket: Option<WsStream>,
    keepalive: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,
    dedup: Deduplicator,
    dispatcher: Dispatcher,
    phase: watch::Sender<SessionPhase>,
    last_event: watch::Sender<Option<NotificationEvent>>,
}

impl SessionDriver {
    fn new(
        config: ClientConfig,
        credentials: Credentials,
        phase: watch::Sender<SessionPhase>,
        last_event: watch::Sender<Option<NotificationEvent>>,
    ) -> Self {
        let supervisor = Supervisor::new(config.reconnect.clone());
        let credential_rx = credentials.watch();
        Self {
            config,
            credentials,
            credential_rx,
            supervisor,
            opening: None,
            socket: None,
            keepalive: None,
            reconnect: None,
            dedup: Deduplicator::new(),
            dispatcher: Dispatcher::new(),
            phase,
            last_event,
        }
    }

    async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        let has_credential = self.credential_rx.borrow_and_update().is_some();
        self.apply(Input::Connect { has_credential }).await;

        loop {
            tokio::select! {
                command = commands.next() => {
                    let Some(command) = command else {
                        crate::log_debug!("All session handles dropped");
                        break;
                    };
                    if self.on_command(command).await.is_break() {
                        break;
                    }
                }
                changed = self.credential_rx.changed() => {
                    if changed.is_ok() {
                        let credential = self.credential_rx.borrow_and_update().clone();
                        self.on_credential(credential).await;
                    }
                }
                opened = wait_opened(&mut self.opening) => {
                    self.opening = None;
                    match opened {
                        Ok(ws) => {
                            crate::log_info!("Notification socket open to {}", self.config.ws_url);
                            self.socket = Some(ws);
                            self.apply(Input::Opened).await;
                        }
                        Err(e) => {
                            crate::log_warn!("Notification socket failed to open: {}", e);
                            self.apply(Input::TransportClosed).await;
                        }
                    }
                }
                message = next_message(&mut self.socket) => self.on_message(message).await,
                () = keepalive_due(&mut self.keepalive) => self.apply(Input::KeepAliveDue).await,
                () = reconnect_due(&mut self.reconnect) => {
                    self.reconnect = None;
                    let has_credential = self.credentials.is_present();
                    self.apply(Input::ReconnectDue { has_credential }).await;
                }
            }
        }

        self.apply(Input::Teardown).await;
        crate::log_info!("Notification session stopped");
    }

    async fn on_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Connect => {
                let has_credential = self.credentials.is_present();
                if !has_credential {
                    crate::log_debug!("connect() without credential, skipping");
                }
                self.apply(Input::Connect { has_credential }).await;
            }
            Command::Reset => self.apply(Input::Reset).await,
            Command::Subscribe(tx) => self.dispatcher.add(tx),
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_credential(&mut self, credential: Option<Credential>) {
        if credential.is_some() {
            if self.supervisor.phase() != SessionPhase::Idle {
                crate::log_info!("Credential replaced, restarting notification session");
                self.apply(Input::Teardown).await;
            }
            self.apply(Input::Connect {
                has_credential: true,
            })
            .await;
        } else {
            crate::log_info!("Credential cleared, closing notification session");
            self.apply(Input::Teardown).await;
        }
    }

    async fn on_message(&mut self, message: Option<Result<Message, tungstenite::Error>>) {
        match message {
            Some(Ok(Message::Text(text))) => self.on_text(text.as_str()).await,
            Some(Ok(Message::Close(frame))) => {
                crate::log_info!("Notification socket received close frame: {:?}", frame);
                self.discard_transport();
                self.apply(Input::TransportClosed).await;
            }
            Some(Ok(_)) => {
                // Binary and control frames; tungstenite answers pings itself.
            }
            Some(Err(e)) => {
                crate::log_warn!("Notification socket error: {}", e);
                self.discard_transport();
                self.apply(Input::TransportClosed).await;
            }
            None => {
                crate::log_info!("Notification socket closed");
                self.discard_transport();
                self.apply(Input::TransportClosed).await;
            }
        }
    }

    async fn on_text(&mut self, text: &str) {
        match ServerFrame::decode(text) {
            Ok(ServerFrame::AuthOk) => {
                crate::log_info!("Notification session authenticated");
                self.apply(Input::AuthAcknowledged).await;
            }
            Ok(ServerFrame::Pong) => crate::log_trace!("Keep-alive answered"),
            Ok(ServerFrame::Notification(event)) => self.on_event(event),
            Err(e) => crate::log_debug!("Discarding malformed frame: {}", e),
        }
    }

    fn on_event(&mut self, event: NotificationEvent) {
        if !self.dedup.admit(&event) {
            crate::log_debug!("Dropping redelivered notification {}", event.id);
            return;
        }
        crate::log_debug!("Notification {} ({:?})", event.id, event.category);
        self.dispatcher.dispatch(&event);
        self.last_event.send_replace(Some(event));
    }

    /// Feed `input` to the supervisor and run the resulting effects. An
    /// effect that fails (a send on a dead socket) yields a follow-up input
    /// and abandons the rest of its batch.
    async fn apply(&mut self, input: Input) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            let before = self.supervisor.phase();
            for effect in self.supervisor.handle(input) {
                if let Some(follow_up) = self.run_effect(effect).await {
                    queue.push_back(follow_up);
                    break;
                }
            }

            let phase = self.supervisor.phase();
            if phase == SessionPhase::GaveUp && before != SessionPhase::GaveUp {
                crate::log_warn!(
                    "Giving up on notifications after {} reconnect attempts",
                    self.supervisor.attempts()
                );
            }
            self.phase.send_if_modified(|current| {
                if *current == phase {
                    return false;
                }
                *current = phase;
                true
            });
        }
    }

    async fn run_effect(&mut self, effect: Effect) -> Option<Input> {
        match effect {
            Effect::CancelTimers => {
                self.keepalive = None;
                self.reconnect = None;
            }
            Effect::OpenTransport => {
                self.discard_transport();
                crate::log_info!("Connecting to {}", self.config.ws_url);
                self.opening = Some(open(
                    self.config.ws_url.clone(),
                    self.config.connect_timeout,
                ));
            }
            Effect::CloseTransport => self.discard_transport(),
            Effect::SendAuth => {
                let Some(credential) = self.credentials.current() else {
                    crate::log_warn!("Credential gone before authentication");
                    return Some(Input::TransportClosed);
                };
                return self
                    .send(ClientFrame::Auth {
                        token: credential.token().to_string(),
                    })
                    .await;
            }
            Effect::SendPing => return self.send(ClientFrame::Ping).await,
            Effect::StartKeepAlive => {
                let period = self.config.keepalive_interval;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.keepalive = Some(interval);
            }
            Effect::ScheduleReconnect(delay) => {
                crate::log_info!(
                    "Reconnecting in {:?} (attempt {}/{})",
                    delay,
                    self.supervisor.attempts(),
                    self.config.reconnect.max_attempts
                );
                self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
            }
            Effect::ForgetSeenEvents => self.dedup.clear(),
        }

        None
    }

    async fn send(&mut self, frame: ClientFrame) -> Option<Input> {
        let Some(socket) = self.socket.as_mut() else {
            crate::log_debug!("No socket for outbound frame");
            return None;
        };
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                crate::log_error!("{}", e);
                return None;
            }
        };
        match socket.send(Message::text(json)).await {
            Ok(()) => None,
            Err(e) => {
                crate::log_warn!("Notification socket send failed: {}", e);
                self.discard_transport();
                Some(Input::TransportClosed)
            }
        }
    }

    /// Forget the socket and any pending open. The old socket is closed off
    /// the driver task so that it cannot delay the next transition.
    fn discard_transport(&mut self) {
        self.opening = None;
        if let Some(mut socket) = self.socket.take() {
            tokio::spawn(async move {
                let _ = tokio::time::timeout(CLOSE_GRACE, socket.close(None)).await;
            });
        }
    }
}

fn open(url: String, timeout: Duration) -> PendingOpen {
    async move {
        match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(OpenError::Ws(e)),
            Err(_) => Err(OpenError::Timeout(timeout)),
        }
    }
    .boxed()
}

async fn wait_opened(opening: &mut Option<PendingOpen>) -> Result<WsStream, OpenError> {
    match opening {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

async fn next_message(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => pending().await,
    }
}

async fn keepalive_due(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_driver(config: ClientConfig) -> SessionDriver {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        let (last_event, _) = watch::channel(None);
        SessionDriver::new(config, Credentials::empty(), phase, last_event)
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_fires_once_per_default_period() {
        let mut driver = idle_driver(ClientConfig::default());
        assert!(driver.run_effect(Effect::StartKeepAlive).await.is_none());

        let start = Instant::now();
        let early = tokio::time::timeout(
            Duration::from_secs(29),
            keepalive_due(&mut driver.keepalive),
        )
        .await;
        assert!(early.is_err(), "ping due before one period elapsed");

        keepalive_due(&mut driver.keepalive).await;
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        keepalive_due(&mut driver.keepalive).await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_waits_the_default_delay() {
        let mut driver = idle_driver(ClientConfig::default());
        let delay = driver.config.reconnect.delay_for_attempt(1);
        driver.run_effect(Effect::ScheduleReconnect(delay)).await;

        let start = Instant::now();
        reconnect_due(&mut driver.reconnect).await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_timers_drops_both_timers() {
        let mut driver = idle_driver(ClientConfig::default());
        driver.run_effect(Effect::StartKeepAlive).await;
        driver
            .run_effect(Effect::ScheduleReconnect(Duration::from_secs(5)))
            .await;
        driver.run_effect(Effect::CancelTimers).await;

        assert!(driver.keepalive.is_none());
        assert!(driver.reconnect.is_none());
    }
}
