#![forbid(unsafe_code)]

//! The pane controller: lifecycle, routing, and I/O pumps for every pane.
//!
//! # Driving the controller
//!
//! The host owns all real resources. It calls the `on_*` methods when
//! transport, timer, animation-frame, or write-completion events happen, and
//! drains [`HostCommand`]s after each call:
//!
//! ```
//! use paneterm_client::{ClientConfig, ConnectOptions, HostCommand, ManualClock, PaneController};
//!
//! let clock = ManualClock::new(0);
//! let mut ctl = PaneController::with_clock(ClientConfig::default(), Box::new(clock));
//! let pane = ctl.registry().active().unwrap();
//! ctl.drain_commands();
//!
//! assert!(ctl.connect(pane, "build", ConnectOptions::default()));
//! let socket = ctl.pane(pane).and_then(|p| p.socket()).unwrap();
//! assert!(ctl
//!     .drain_commands()
//!     .iter()
//!     .any(|c| matches!(c, HostCommand::OpenTransport { .. })));
//!
//! ctl.on_transport_open(socket);
//! ```
//!
//! # Staleness
//!
//! Every id handed to the host is mapped back to the pane and the connect
//! sequence it was issued under. A callback whose pane is gone, whose pane has
//! reconnected since, or whose slot was re-armed is ignored.

use std::collections::HashMap;

use paneterm_core::control::{AuthRequest, ClientMessage, is_auth_ok};
use paneterm_core::frame::{self, FrameType, InboundMessage};
use paneterm_core::sanitize::EscapeFilter;
use paneterm_core::capabilities;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::host::{HostCommand, TransportParams};
use crate::lifecycle::ConnectionState;
use crate::offsets::SessionOffsetTable;
use crate::output_queue::OutputChunk;
use crate::pane::{FrameId, IdAllocator, Pane, PaneId, SocketId, TimerId, WriteId};
use crate::progress::ReconnectProgress;
use crate::registry::{PaneRegistry, RemoveOutcome};

/// Options for [`PaneController::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Clear the visible surface before attaching.
    pub clear_display: bool,
    /// Replay from this offset instead of the stored one.
    pub replay_offset: Option<u64>,
    /// Keep the current backoff multiplier.
    pub keep_backoff: bool,
    /// Advisory working-directory label.
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Reconnect,
    Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    InputFlush,
    OutputDrain,
}

/// A host callback slot captured with the connect sequence it belongs to.
#[derive(Debug, Clone, Copy)]
struct Pending<K> {
    pane: PaneId,
    seq: u64,
    kind: K,
}

/// Queued host commands plus the bookkeeping to validate their callbacks.
#[derive(Debug, Default)]
struct Outbox {
    ids: IdAllocator,
    commands: Vec<HostCommand>,
    timers: HashMap<TimerId, Pending<TimerKind>>,
    frames: HashMap<FrameId, Pending<FrameKind>>,
    writes: HashMap<WriteId, Pending<()>>,
}

impl Outbox {
    fn push(&mut self, command: HostCommand) {
        self.commands.push(command);
    }

    fn status(&mut self, pane: &Pane, text: impl Into<String>) {
        self.push(HostCommand::Status {
            pane: pane.id,
            level: pane.state.status_level(),
            text: text.into(),
        });
    }

    fn set_timer(&mut self, pane: &Pane, kind: TimerKind, delay_ms: u64) -> TimerId {
        let timer = self.ids.timer();
        self.timers.insert(
            timer,
            Pending {
                pane: pane.id,
                seq: pane.connect_seq,
                kind,
            },
        );
        self.push(HostCommand::SetTimer { timer, delay_ms });
        timer
    }

    fn cancel_timer(&mut self, slot: &mut Option<TimerId>) {
        if let Some(timer) = slot.take() {
            self.timers.remove(&timer);
            self.push(HostCommand::CancelTimer { timer });
        }
    }

    fn request_frame(&mut self, pane: &Pane, kind: FrameKind) -> FrameId {
        let frame = self.ids.frame();
        self.frames.insert(
            frame,
            Pending {
                pane: pane.id,
                seq: pane.connect_seq,
                kind,
            },
        );
        self.push(HostCommand::RequestFrame { frame });
        frame
    }

    fn cancel_frame(&mut self, slot: &mut Option<FrameId>) {
        if let Some(frame) = slot.take() {
            self.frames.remove(&frame);
            self.push(HostCommand::CancelFrame { frame });
        }
    }

    /// Cancel every timer and frame of `pane` and forget its pending write.
    fn cancel_pane_callbacks(&mut self, pane: &mut Pane) {
        self.cancel_timer(&mut pane.reconnect_timer);
        self.cancel_timer(&mut pane.progress_timer);
        self.cancel_frame(&mut pane.input_frame);
        self.cancel_frame(&mut pane.output_frame);
        if let Some(write) = pane.pending_write.take() {
            self.writes.remove(&write);
        }
    }

    fn close_socket(&mut self, pane: &mut Pane) {
        if let Some(socket) = pane.socket.take() {
            self.push(HostCommand::CloseTransport { socket });
        }
    }
}

/// Owns every pane and drives their transports.
pub struct PaneController {
    config: ClientConfig,
    clock: Box<dyn Clock>,
    rng: SmallRng,
    filter: EscapeFilter,
    registry: PaneRegistry,
    offsets: SessionOffsetTable,
    outbox: Outbox,
    auth_token: String,
    server_capabilities: Vec<String>,
    /// Last (cols, rows) sent per session.
    sent_sizes: HashMap<String, (u16, u16)>,
}

impl core::fmt::Debug for PaneController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PaneController")
            .field("panes", &self.registry.len())
            .field("active", &self.registry.active())
            .field("sessions_tracked", &self.offsets.len())
            .field("queued_commands", &self.outbox.commands.len())
            .finish_non_exhaustive()
    }
}

impl PaneController {
    /// Controller on the system clock.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    /// Controller on a host-supplied clock. Starts with one blank active pane.
    #[must_use]
    pub fn with_clock(config: ClientConfig, clock: Box<dyn Clock>) -> Self {
        let rng = match config.backoff.jitter_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let mut controller = Self {
            filter: EscapeFilter::new(config.attach.filter.clone()),
            registry: PaneRegistry::new(config.panes.max_panes),
            config,
            clock,
            rng,
            offsets: SessionOffsetTable::new(),
            outbox: Outbox::default(),
            auth_token: String::new(),
            server_capabilities: Vec::new(),
            sent_sizes: HashMap::new(),
        };
        controller.create_pane();
        controller
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &PaneRegistry {
        &self.registry
    }

    #[must_use]
    pub fn pane(&self, id: PaneId) -> Option<&Pane> {
        self.registry.get(id)
    }

    #[must_use]
    pub fn offsets(&self) -> &SessionOffsetTable {
        &self.offsets
    }

    /// Take every queued command, oldest first.
    pub fn drain_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.outbox.commands)
    }

    /// Current countdown of a pane waiting to reconnect.
    #[must_use]
    pub fn reconnect_progress(&self, id: PaneId) -> Option<ReconnectProgress> {
        let pane = self.registry.get(id)?;
        if pane.state != ConnectionState::ReconnectWait {
            return None;
        }
        let window = pane.backoff.window()?;
        Some(ReconnectProgress::at(window, self.clock.now_ms()))
    }

    // -----------------------------------------------------------------------
    // Session-level configuration
    // -----------------------------------------------------------------------

    /// Token sent in the auth payload of every subsequent connection.
    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        self.auth_token = token.into();
    }

    /// Capabilities the server advertised in its session list.
    pub fn set_server_capabilities<I, S>(&mut self, capabilities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server_capabilities = capabilities.into_iter().map(Into::into).collect();
    }

    /// Merge a persisted offset table. Offsets already advanced in this
    /// process are never lowered.
    pub fn restore_offsets(&mut self, table: SessionOffsetTable) {
        for (session, offset) in table.iter() {
            self.offsets.observe(session, offset);
        }
    }

    /// Forget offsets of sessions not in `live`.
    pub fn prune_offsets<S: AsRef<str>>(&mut self, live: &[S]) -> usize {
        let removed = self.offsets.prune(live);
        let live: Vec<&str> = live.iter().map(AsRef::as_ref).collect();
        self.sent_sizes.retain(|session, _| live.contains(&session.as_str()));
        removed
    }

    // -----------------------------------------------------------------------
    // Pane management
    // -----------------------------------------------------------------------

    /// Open a new blank pane and make it active.
    ///
    /// Returns `None` (and queues a notice) at the pane limit.
    pub fn create_pane(&mut self) -> Option<PaneId> {
        let Some(id) = self.registry.create(&mut self.outbox.ids, &self.config) else {
            self.outbox.push(HostCommand::Notice {
                text: format!("Pane limit reached ({} max)", self.registry.max_panes()),
            });
            return None;
        };
        self.outbox.push(HostCommand::PaneCreated { pane: id });
        self.registry.set_active(id);
        self.outbox
            .push(HostCommand::ActivePaneChanged { pane: Some(id) });
        Some(id)
    }

    /// Close a pane.
    ///
    /// The last pane is only closed with `allow_empty`, and a fresh blank pane
    /// then takes its place.
    pub fn close_pane(&mut self, id: PaneId, allow_empty: bool) -> bool {
        match self.registry.remove(id, allow_empty) {
            RemoveOutcome::Removed {
                mut pane,
                new_active,
                active_changed,
            } => {
                self.teardown_removed(&mut pane);
                if self.registry.is_empty() {
                    self.create_pane();
                } else if active_changed {
                    self.outbox
                        .push(HostCommand::ActivePaneChanged { pane: new_active });
                }
                true
            }
            RemoveOutcome::RefusedLastPane => {
                self.outbox.push(HostCommand::Notice {
                    text: "The last pane cannot be closed".to_string(),
                });
                false
            }
            RemoveOutcome::NotFound => false,
        }
    }

    pub fn set_active(&mut self, id: PaneId) -> bool {
        if self.registry.active() == Some(id) {
            return self.registry.get(id).is_some();
        }
        if !self.registry.set_active(id) {
            return false;
        }
        debug!(target: "paneterm::registry", pane = %id, "active pane changed");
        self.outbox
            .push(HostCommand::ActivePaneChanged { pane: Some(id) });
        true
    }

    pub fn focus_next(&mut self) -> Option<PaneId> {
        let before = self.registry.active();
        let after = self.registry.focus_next();
        if after != before {
            self.outbox.push(HostCommand::ActivePaneChanged { pane: after });
        }
        after
    }

    pub fn focus_prev(&mut self) -> Option<PaneId> {
        let before = self.registry.active();
        let after = self.registry.focus_prev();
        if after != before {
            self.outbox.push(HostCommand::ActivePaneChanged { pane: after });
        }
        after
    }

    /// A session ended server-side: sweep every pane bound to it.
    ///
    /// If that empties the registry, one blank pane is created in its place.
    pub fn session_exited(&mut self, session: &str) {
        let bound = self.registry.panes_bound_to(session);
        let active_before = self.registry.active();
        for id in &bound {
            if let RemoveOutcome::Removed { mut pane, .. } = self.registry.remove(*id, true) {
                self.teardown_removed(&mut pane);
            }
        }
        self.offsets.remove(session);
        self.sent_sizes.remove(session);
        info!(
            target: "paneterm::lifecycle",
            session,
            panes_removed = bound.len(),
            "session exited"
        );

        if self.registry.is_empty() {
            self.create_pane();
        } else if self.registry.active() != active_before {
            self.outbox.push(HostCommand::ActivePaneChanged {
                pane: self.registry.active(),
            });
        }
    }

    fn teardown_removed(&mut self, pane: &mut Pane) {
        self.outbox.close_socket(pane);
        self.outbox.cancel_pane_callbacks(pane);
        pane.input.clear();
        pane.output.clear();
        self.outbox.push(HostCommand::PaneRemoved { pane: pane.id });
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Attach `pane` to `session`, replacing any current connection.
    ///
    /// Returns `false` for an unknown pane or an empty session id.
    pub fn connect(&mut self, id: PaneId, session: &str, options: ConnectOptions) -> bool {
        if session.is_empty() {
            return false;
        }
        let now = self.clock.now_ms();
        let binary = capabilities::binary_frames_negotiated(&self.server_capabilities);
        let Some(pane) = self.registry.get_mut(id) else {
            return false;
        };
        let outbox = &mut self.outbox;

        pane.connect_seq += 1;
        outbox.close_socket(pane);
        outbox.cancel_pane_callbacks(pane);
        pane.input.clear();
        pane.output.clear();
        pane.clear_detector.take_carry();
        pane.filter_carry.take();
        if options.clear_display {
            outbox.push(HostCommand::ClearDisplay { pane: id });
        }
        if options.keep_backoff {
            pane.backoff.clear_window();
        } else {
            pane.backoff.reset();
        }

        // Baseline is fixed before the transport exists.
        let replay_from = options
            .replay_offset
            .unwrap_or_else(|| self.offsets.get(session).unwrap_or(0));
        pane.replay_baseline = replay_from;
        pane.log_offset = replay_from;
        self.offsets.ensure(session);

        if pane.session != session {
            pane.session = session.to_string();
            pane.cwd = None;
        }
        if options.cwd.is_some() {
            pane.cwd = options.cwd;
        }
        pane.binary_codec = binary;
        pane.sanitize_until_ms = now.saturating_add(self.config.attach.sanitize_window_ms);
        pane.state = ConnectionState::Connecting;

        let socket = outbox.ids.socket();
        pane.socket = Some(socket);
        let params = TransportParams::new(session, replay_from, pane.cols, pane.rows, binary);
        info!(
            target: "paneterm::lifecycle",
            pane = %id,
            %socket,
            session,
            seq = pane.connect_seq,
            replay_from,
            binary,
            "connecting"
        );
        outbox.push(HostCommand::OpenTransport {
            pane: id,
            socket,
            params,
        });
        outbox.status(pane, format!("Connecting to {session}"));
        true
    }

    /// Retry now, skipping any pending backoff wait. The multiplier is kept.
    pub fn reconnect_now(&mut self, id: PaneId) -> bool {
        let Some(pane) = self.registry.get(id) else {
            return false;
        };
        if !pane.has_session() {
            return false;
        }
        let session = pane.session.clone();
        self.connect(
            id,
            &session,
            ConnectOptions {
                keep_backoff: true,
                ..ConnectOptions::default()
            },
        )
    }

    /// Unbind the pane's session and return it to `Idle`.
    pub fn clear_session(&mut self, id: PaneId) -> bool {
        let Some(pane) = self.registry.get_mut(id) else {
            return false;
        };
        pane.connect_seq += 1;
        self.outbox.close_socket(pane);
        self.outbox.cancel_pane_callbacks(pane);
        pane.input.clear();
        pane.output.clear();
        pane.clear_detector.take_carry();
        pane.filter_carry.take();
        pane.backoff.reset();
        pane.session.clear();
        pane.cwd = None;
        pane.state = ConnectionState::Idle;
        debug!(target: "paneterm::lifecycle", pane = %id, "session cleared");
        self.outbox.status(pane, "No session");
        true
    }

    /// Record a new viewport size; sends a resize if the pane is online.
    pub fn resize_pane(&mut self, id: PaneId, cols: u16, rows: u16) -> bool {
        let Some(pane) = self.registry.get_mut(id) else {
            return false;
        };
        pane.cols = cols;
        pane.rows = rows;
        if pane.state == ConnectionState::Online {
            send_resize_if_changed(pane, &mut self.sent_sizes, &mut self.outbox);
        }
        true
    }

    // -----------------------------------------------------------------------
    // Transport callbacks
    // -----------------------------------------------------------------------

    pub fn on_transport_open(&mut self, socket: SocketId) {
        let Some(pane) = pane_for_socket(&mut self.registry, socket) else {
            trace!(target: "paneterm::lifecycle", %socket, "stale open ignored");
            return;
        };
        if pane.state != ConnectionState::Connecting {
            return;
        }
        pane.state = ConnectionState::Authenticating;
        let auth = ClientMessage::Auth(AuthRequest {
            token: self.auth_token.clone(),
            client: self.config.auth.client.clone(),
        });
        debug!(
            target: "paneterm::lifecycle",
            pane = %pane.id,
            %socket,
            "transport open, authenticating"
        );
        self.outbox.push(HostCommand::SendText {
            socket,
            text: auth.to_json(),
        });
        self.outbox.status(pane, "Authenticating");
    }

    pub fn on_transport_message(&mut self, socket: SocketId, message: InboundMessage) {
        let now = self.clock.now_ms();
        let Some(pane) = pane_for_socket(&mut self.registry, socket) else {
            trace!(
                target: "paneterm::lifecycle",
                %socket,
                bytes = message.len(),
                "stale message ignored"
            );
            return;
        };
        match pane.state {
            ConnectionState::Authenticating => {
                let accepted = matches!(&message, InboundMessage::Text(text) if is_auth_ok(text));
                if !accepted {
                    warn!(
                        target: "paneterm::lifecycle",
                        pane = %pane.id,
                        %socket,
                        "authentication rejected, closing transport"
                    );
                    self.outbox.close_socket(pane);
                    handle_disconnect(
                        pane,
                        None,
                        now,
                        &self.config,
                        &mut self.rng,
                        &mut self.outbox,
                    );
                    return;
                }
                pane.state = ConnectionState::Online;
                pane.backoff.reset();
                pane.sanitize_until_ms = now.saturating_add(self.config.attach.sanitize_window_ms);
                info!(
                    target: "paneterm::lifecycle",
                    pane = %pane.id,
                    session = %pane.session,
                    replay_from = pane.replay_baseline,
                    "online"
                );
                self.outbox.status(pane, "Connected");
                send_resize_if_changed(pane, &mut self.sent_sizes, &mut self.outbox);
            }
            ConnectionState::Online => {
                let Some((text, log_bytes)) = decode_output(pane, message) else {
                    return;
                };
                let scan = pane.clear_detector.feed(&text);
                let filtered = self.filter.sanitize(
                    &mut pane.filter_carry,
                    &scan.text,
                    pane.sanitize_until_ms,
                    now,
                );
                if filtered.is_empty() && log_bytes == 0 && !scan.should_clear {
                    return;
                }
                let raised = pane.output.enqueue(OutputChunk {
                    text: filtered.into_owned(),
                    session: pane.session.clone(),
                    log_bytes,
                    clear_scrollback: scan.should_clear,
                });
                if raised {
                    debug!(
                        target: "paneterm::output",
                        pane = %pane.id,
                        queued_bytes = pane.output.queued_bytes(),
                        "backpressure on"
                    );
                }
                drain_output(pane, &mut self.outbox);
            }
            _ => {}
        }
    }

    pub fn on_transport_close(&mut self, socket: SocketId, code: Option<u16>) {
        let now = self.clock.now_ms();
        let Some(pane) = pane_for_socket(&mut self.registry, socket) else {
            trace!(target: "paneterm::lifecycle", %socket, ?code, "stale close ignored");
            return;
        };
        pane.socket = None;
        info!(target: "paneterm::lifecycle", pane = %pane.id, %socket, ?code, "transport closed");
        handle_disconnect(pane, code, now, &self.config, &mut self.rng, &mut self.outbox);
    }

    pub fn on_transport_error(&mut self, socket: SocketId) {
        let now = self.clock.now_ms();
        let Some(pane) = pane_for_socket(&mut self.registry, socket) else {
            trace!(target: "paneterm::lifecycle", %socket, "stale error ignored");
            return;
        };
        warn!(target: "paneterm::lifecycle", pane = %pane.id, %socket, "transport error");
        self.outbox.close_socket(pane);
        handle_disconnect(pane, None, now, &self.config, &mut self.rng, &mut self.outbox);
    }

    // -----------------------------------------------------------------------
    // Scheduling callbacks
    // -----------------------------------------------------------------------

    pub fn on_timer(&mut self, timer: TimerId) {
        let Some(pending) = self.outbox.timers.remove(&timer) else {
            return;
        };
        let now = self.clock.now_ms();
        let Some(pane) = self.registry.get_mut(pending.pane) else {
            return;
        };
        if pane.connect_seq != pending.seq {
            return;
        }
        match pending.kind {
            TimerKind::Reconnect => {
                if pane.reconnect_timer != Some(timer) {
                    return;
                }
                pane.reconnect_timer = None;
                let session = pane.session.clone();
                debug!(
                    target: "paneterm::lifecycle",
                    pane = %pane.id,
                    session = %session,
                    "reconnect timer fired"
                );
                self.connect(
                    pending.pane,
                    &session,
                    ConnectOptions {
                        keep_backoff: true,
                        ..ConnectOptions::default()
                    },
                );
            }
            TimerKind::Progress => {
                if pane.progress_timer != Some(timer) {
                    return;
                }
                pane.progress_timer = None;
                if pane.state != ConnectionState::ReconnectWait {
                    return;
                }
                let Some(window) = pane.backoff.window() else {
                    return;
                };
                let progress = ReconnectProgress::at(window, now);
                report_progress(pane, progress, &mut self.outbox);
                if progress.remaining_ms > 0 {
                    let poll = self.config.progress.poll_interval_ms;
                    let timer = self.outbox.set_timer(pane, TimerKind::Progress, poll);
                    pane.progress_timer = Some(timer);
                }
            }
        }
    }

    pub fn on_animation_frame(&mut self, frame: FrameId) {
        let Some(pending) = self.outbox.frames.remove(&frame) else {
            return;
        };
        let Some(pane) = self.registry.get_mut(pending.pane) else {
            return;
        };
        if pane.connect_seq != pending.seq {
            return;
        }
        match pending.kind {
            FrameKind::InputFlush => {
                if pane.input_frame != Some(frame) {
                    return;
                }
                pane.input_frame = None;
                if let Some(data) = pane.input.flush() {
                    send_input_frame(pane, data, &mut self.outbox);
                }
            }
            FrameKind::OutputDrain => {
                if pane.output_frame != Some(frame) {
                    return;
                }
                pane.output_frame = None;
                drain_output(pane, &mut self.outbox);
            }
        }
    }

    /// The display finished a write issued with [`HostCommand::Write`].
    pub fn on_write_complete(&mut self, write: WriteId) {
        let Some(pending) = self.outbox.writes.remove(&write) else {
            return;
        };
        let Some(pane) = self.registry.get_mut(pending.pane) else {
            return;
        };
        if pane.connect_seq != pending.seq || pane.pending_write != Some(write) {
            return;
        }
        pane.pending_write = None;
        let Some(done) = pane.output.complete() else {
            return;
        };

        pane.log_offset = pane.log_offset.saturating_add(done.log_bytes);
        if !done.session.is_empty() && done.log_bytes > 0 {
            let offset = self.offsets.observe(&done.session, pane.log_offset);
            self.outbox.push(HostCommand::OffsetAdvanced {
                session: done.session,
                offset,
            });
        }
        if done.chunks > 1 {
            self.outbox.push(HostCommand::Refresh {
                pane: pane.id,
                from_row: 0,
                to_row: pane.rows.saturating_sub(1),
            });
        }
        if done.relieved {
            debug!(
                target: "paneterm::output",
                pane = %pane.id,
                queued_bytes = pane.output.queued_bytes(),
                "backpressure off"
            );
        }

        if pane.output.is_backpressured() {
            // Yield to rendering before the next batch.
            if pane.output_frame.is_none() && pane.output.pending_chunks() > 0 {
                pane.output_frame = Some(self.outbox.request_frame(pane, FrameKind::OutputDrain));
            }
        } else {
            drain_output(pane, &mut self.outbox);
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Send user input. Refused unless the pane is online with a session.
    pub fn send_input(&mut self, id: PaneId, data: &str) -> bool {
        let Some(pane) = self.registry.get_mut(id) else {
            return false;
        };
        if pane.state != ConnectionState::Online || !pane.has_session() || pane.socket.is_none() {
            debug!(
                target: "paneterm::input",
                pane = %id,
                state = %pane.state,
                "input refused"
            );
            return false;
        }
        for data in pane.input.push(data) {
            send_input_frame(pane, data, &mut self.outbox);
        }
        if pane.input.has_pending() {
            if pane.input_frame.is_none() {
                pane.input_frame = Some(self.outbox.request_frame(pane, FrameKind::InputFlush));
            }
        } else {
            self.outbox.cancel_frame(&mut pane.input_frame);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Pane-level helpers
// ---------------------------------------------------------------------------

fn pane_for_socket(registry: &mut PaneRegistry, socket: SocketId) -> Option<&mut Pane> {
    let id = registry
        .iter()
        .find(|p| p.socket == Some(socket) && p.state.has_transport())?
        .id;
    registry.get_mut(id)
}

/// Resolve an online message to (display text, log bytes).
fn decode_output(pane: &Pane, message: InboundMessage) -> Option<(String, u64)> {
    match message {
        InboundMessage::Text(text) => {
            let log_bytes = text.len() as u64;
            Some((text, log_bytes))
        }
        InboundMessage::Binary(bytes) => match frame::try_decode(&bytes, &pane.session) {
            Ok(decoded) if decoded.frame_type == FrameType::Output => {
                Some((decoded.text, decoded.payload_len as u64))
            }
            Ok(decoded) => {
                debug!(
                    target: "paneterm::codec",
                    pane = %pane.id,
                    frame_type = ?decoded.frame_type,
                    "unexpected frame type dropped"
                );
                None
            }
            Err(err) => {
                debug!(target: "paneterm::codec", pane = %pane.id, error = %err, "frame dropped");
                None
            }
        },
    }
}

/// Start the next display write if none is in flight.
fn drain_output(pane: &mut Pane, outbox: &mut Outbox) {
    if pane.pending_write.is_some() {
        return;
    }
    let Some(batch) = pane.output.take_batch() else {
        return;
    };
    if batch.clear_scrollback {
        outbox.push(HostCommand::ClearScrollback { pane: pane.id });
    }
    let write = outbox.ids.write();
    outbox.writes.insert(
        write,
        Pending {
            pane: pane.id,
            seq: pane.connect_seq,
            kind: (),
        },
    );
    pane.pending_write = Some(write);
    trace!(
        target: "paneterm::output",
        pane = %pane.id,
        %write,
        bytes = batch.bytes,
        chunks = batch.chunks,
        "display write"
    );
    outbox.push(HostCommand::Write {
        pane: pane.id,
        write,
        text: batch.text,
    });
}

fn send_input_frame(pane: &Pane, data: String, outbox: &mut Outbox) {
    let Some(socket) = pane.socket else {
        return;
    };
    if pane.binary_codec {
        outbox.push(HostCommand::SendBinary {
            socket,
            bytes: frame::encode(FrameType::Input, &pane.session, &data),
        });
    } else {
        outbox.push(HostCommand::SendText { socket, text: data });
    }
}

fn send_resize_if_changed(
    pane: &Pane,
    sent_sizes: &mut HashMap<String, (u16, u16)>,
    outbox: &mut Outbox,
) {
    let Some(socket) = pane.socket else {
        return;
    };
    if !pane.has_session() {
        return;
    }
    let size = (pane.cols, pane.rows);
    if sent_sizes.get(&pane.session) == Some(&size) {
        return;
    }
    sent_sizes.insert(pane.session.clone(), size);
    outbox.push(HostCommand::SendText {
        socket,
        text: ClientMessage::Resize {
            cols: pane.cols,
            rows: pane.rows,
        }
        .to_json(),
    });
}

fn report_progress(pane: &Pane, progress: ReconnectProgress, outbox: &mut Outbox) {
    outbox.push(HostCommand::ReconnectProgress {
        pane: pane.id,
        progress,
    });
    outbox.status(pane, progress.status_text());
}

/// Transport gone: go offline and, unless revoked, schedule a retry.
///
/// The socket must already be detached from the pane.
fn handle_disconnect(
    pane: &mut Pane,
    code: Option<u16>,
    now: u64,
    config: &ClientConfig,
    rng: &mut SmallRng,
    outbox: &mut Outbox,
) {
    outbox.cancel_frame(&mut pane.input_frame);
    pane.input.clear();
    pane.clear_detector.take_carry();
    pane.filter_carry.take();

    if !pane.has_session() {
        pane.state = ConnectionState::Idle;
        outbox.status(pane, "No session");
        return;
    }
    pane.state = ConnectionState::Offline;

    if code == Some(config.auth.revoked_close_code) {
        warn!(
            target: "paneterm::lifecycle",
            pane = %pane.id,
            session = %pane.session,
            "authentication revoked, not reconnecting"
        );
        outbox.status(pane, "Authentication revoked");
        outbox.push(HostCommand::AuthRevoked {
            pane: pane.id,
            session: pane.session.clone(),
        });
        return;
    }

    outbox.status(pane, "Disconnected");
    let window = pane.backoff.schedule(now, rng);
    pane.state = ConnectionState::ReconnectWait;
    outbox.cancel_timer(&mut pane.reconnect_timer);
    outbox.cancel_timer(&mut pane.progress_timer);
    pane.reconnect_timer = Some(outbox.set_timer(pane, TimerKind::Reconnect, window.delay_ms));
    pane.progress_timer = Some(outbox.set_timer(
        pane,
        TimerKind::Progress,
        config.progress.poll_interval_ms,
    ));
    info!(
        target: "paneterm::lifecycle",
        pane = %pane.id,
        session = %pane.session,
        delay_ms = window.delay_ms,
        failures = pane.backoff.failures(),
        "reconnect scheduled"
    );
    report_progress(pane, ReconnectProgress::at(window, now), outbox);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::lifecycle::StatusLevel;

    fn controller() -> (PaneController, ManualClock, PaneId) {
        let clock = ManualClock::new(1_000);
        let mut config = ClientConfig::default();
        config.backoff.jitter_seed = Some(42);
        let mut ctl = PaneController::with_clock(config, Box::new(clock.clone()));
        let pane = ctl.registry().active().unwrap();
        ctl.drain_commands();
        (ctl, clock, pane)
    }

    fn socket_of(ctl: &PaneController, pane: PaneId) -> SocketId {
        ctl.pane(pane).and_then(Pane::socket).unwrap()
    }

    fn online(ctl: &mut PaneController, pane: PaneId, session: &str) -> SocketId {
        assert!(ctl.connect(pane, session, ConnectOptions::default()));
        let socket = socket_of(ctl, pane);
        ctl.on_transport_open(socket);
        ctl.on_transport_message(socket, InboundMessage::Text(r#"{"type":"auth.ok"}"#.into()));
        ctl.drain_commands();
        socket
    }

    #[test]
    fn starts_with_one_active_pane() {
        let clock = ManualClock::new(0);
        let mut ctl = PaneController::with_clock(ClientConfig::default(), Box::new(clock));
        assert_eq!(ctl.registry().len(), 1);
        let commands = ctl.drain_commands();
        assert!(matches!(commands[0], HostCommand::PaneCreated { .. }));
    }

    #[test]
    fn connect_rejects_empty_session() {
        let (mut ctl, _, pane) = controller();
        assert!(!ctl.connect(pane, "", ConnectOptions::default()));
        assert!(ctl.drain_commands().is_empty());
    }

    #[test]
    fn open_sends_auth_payload() {
        let (mut ctl, _, pane) = controller();
        ctl.set_auth_token("secret");
        ctl.connect(pane, "s", ConnectOptions::default());
        let socket = socket_of(&ctl, pane);
        ctl.drain_commands();
        ctl.on_transport_open(socket);
        let commands = ctl.drain_commands();
        let HostCommand::SendText { text, .. } = &commands[0] else {
            panic!("expected auth send, got {commands:?}");
        };
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["type"], "auth");
        assert_eq!(value["token"], "secret");
        assert_eq!(ctl.pane(pane).unwrap().state(), ConnectionState::Authenticating);
    }

    #[test]
    fn auth_ok_goes_online_and_sends_resize() {
        let (mut ctl, _, pane) = controller();
        ctl.connect(pane, "s", ConnectOptions::default());
        let socket = socket_of(&ctl, pane);
        ctl.on_transport_open(socket);
        ctl.drain_commands();
        ctl.on_transport_message(socket, InboundMessage::Text(r#"{"type":"auth.ok"}"#.into()));
        assert_eq!(ctl.pane(pane).unwrap().state(), ConnectionState::Online);
        let commands = ctl.drain_commands();
        assert!(commands.contains(&HostCommand::SendText {
            socket,
            text: r#"{"type":"resize","cols":80,"rows":24}"#.into(),
        }));
        assert!(commands.iter().any(|c| matches!(
            c,
            HostCommand::Status { level: StatusLevel::Online, .. }
        )));
    }

    #[test]
    fn resize_only_sent_when_changed() {
        let (mut ctl, _, pane) = controller();
        online(&mut ctl, pane, "s");
        ctl.resize_pane(pane, 80, 24);
        assert!(ctl.drain_commands().is_empty());
        ctl.resize_pane(pane, 100, 30);
        assert_eq!(ctl.drain_commands().len(), 1);
    }

    #[test]
    fn binary_auth_reply_is_rejected() {
        let (mut ctl, _, pane) = controller();
        ctl.connect(pane, "s", ConnectOptions::default());
        let socket = socket_of(&ctl, pane);
        ctl.on_transport_open(socket);
        ctl.drain_commands();
        let reply = br#"{"type":"auth.ok"}"#.to_vec();
        ctl.on_transport_message(socket, InboundMessage::Binary(reply));
        let commands = ctl.drain_commands();
        assert!(commands.contains(&HostCommand::CloseTransport { socket }));
        assert_eq!(ctl.pane(pane).unwrap().state(), ConnectionState::ReconnectWait);
    }

    #[test]
    fn text_output_written_and_offset_advanced() {
        let (mut ctl, _, pane) = controller();
        let socket = online(&mut ctl, pane, "s");
        ctl.on_transport_message(socket, InboundMessage::Text("hello".into()));
        let commands = ctl.drain_commands();
        let Some(HostCommand::Write { write, text, .. }) = commands.last().cloned() else {
            panic!("expected write, got {commands:?}");
        };
        assert_eq!(text, "hello");
        ctl.on_write_complete(write);
        assert_eq!(ctl.offsets().get("s"), Some(5));
        assert!(ctl.drain_commands().contains(&HostCommand::OffsetAdvanced {
            session: "s".into(),
            offset: 5,
        }));
    }

    #[test]
    fn restoring_offsets_never_lowers_live_ones() {
        let (mut ctl, _, pane) = controller();
        let socket = online(&mut ctl, pane, "s");
        ctl.on_transport_message(socket, InboundMessage::Text("hello".into()));
        let Some(HostCommand::Write { write, .. }) = ctl.drain_commands().last().cloned() else {
            panic!("expected write");
        };
        ctl.on_write_complete(write);

        let mut persisted = SessionOffsetTable::new();
        persisted.observe("s", 2);
        persisted.observe("t", 7);
        ctl.restore_offsets(persisted);
        assert_eq!(ctl.offsets().get("s"), Some(5));
        assert_eq!(ctl.offsets().get("t"), Some(7));
    }

    #[test]
    fn disconnect_drops_held_partial_sequences() {
        let (mut ctl, _, pane) = controller();
        let socket = online(&mut ctl, pane, "s");
        ctl.on_transport_message(socket, InboundMessage::Text("a\x1b[?1".into()));
        ctl.on_transport_message(socket, InboundMessage::Text("\x1b[3".into()));
        {
            let p = ctl.pane(pane).unwrap();
            assert_eq!(p.clear_detector.carry(), "\x1b[3");
            assert_eq!(p.filter_carry.pending(), "\x1b[?1");
        }
        ctl.on_transport_close(socket, Some(1006));
        let p = ctl.pane(pane).unwrap();
        assert_eq!(p.state(), ConnectionState::ReconnectWait);
        assert_eq!(p.clear_detector.carry(), "");
        assert!(p.filter_carry.is_empty());
    }

    #[test]
    fn input_refused_when_offline() {
        let (mut ctl, _, pane) = controller();
        assert!(!ctl.send_input(pane, "a"));
        ctl.connect(pane, "s", ConnectOptions::default());
        assert!(!ctl.send_input(pane, "a"));
    }

    #[test]
    fn medium_input_waits_for_frame() {
        let (mut ctl, _, pane) = controller();
        let socket = online(&mut ctl, pane, "s");
        assert!(ctl.send_input(pane, "hello"));
        let commands = ctl.drain_commands();
        let [HostCommand::RequestFrame { frame }] = commands.as_slice() else {
            panic!("expected one frame request, got {commands:?}");
        };
        ctl.on_animation_frame(*frame);
        assert_eq!(
            ctl.drain_commands(),
            vec![HostCommand::SendText {
                socket,
                text: "hello".into()
            }]
        );
    }

    #[test]
    fn close_pane_refuses_last() {
        let (mut ctl, _, pane) = controller();
        assert!(!ctl.close_pane(pane, false));
        assert_eq!(ctl.registry().len(), 1);
    }

    #[test]
    fn forced_close_of_last_pane_synthesizes_blank() {
        let (mut ctl, _, pane) = controller();
        online(&mut ctl, pane, "s");
        assert!(ctl.close_pane(pane, true));
        assert_eq!(ctl.registry().len(), 1);
        let fresh = ctl.registry().active().unwrap();
        assert_ne!(fresh, pane);
        assert!(!ctl.pane(fresh).unwrap().has_session());
        let commands = ctl.drain_commands();
        assert!(commands.contains(&HostCommand::PaneRemoved { pane }));
        assert!(commands.contains(&HostCommand::PaneCreated { pane: fresh }));
    }

    #[test]
    fn reconnect_progress_reported_while_waiting() {
        let (mut ctl, clock, pane) = controller();
        let socket = online(&mut ctl, pane, "s");
        ctl.on_transport_close(socket, Some(1006));
        clock.advance(500);
        let progress = ctl.reconnect_progress(pane).unwrap();
        assert_eq!(progress.elapsed_ms, 500);
        assert!(progress.remaining_ms > 0);
    }
}
