//! Debounced layout actor. Owns a [`LayoutEngine`] and coalesces bursts of
//! resize and drag-move traffic into single layout passes.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, sleep_until};
use tracing::{trace, warn};

use crate::actor;
use crate::layout_engine::{ItemId, LayoutEngine, LayoutError};

pub enum Request {
    /// New container measurements. Only a bounded-axis change schedules a
    /// pass.
    SetContainerSize { width: f64, height: f64 },
    AddItem {
        width: f64,
        height: f64,
        reply: oneshot::Sender<Result<ItemId, LayoutError>>,
    },
    RemoveItem(ItemId),
    /// Run a pass now, cancelling any pending debounce.
    Layout,
    DragStart(ItemId),
    DragMove { id: ItemId, x: f64, y: f64 },
    DragEnd(ItemId),
    Fit {
        id: ItemId,
        x: Option<f64>,
        y: Option<f64>,
    },
    Shutdown,
}

pub type Sender = actor::Sender<Request>;
pub type Receiver = actor::Receiver<Request>;

pub struct LayoutActor {
    engine: LayoutEngine,
    rx: Receiver,
    resize_debounce: Duration,
    drag_debounce: Duration,
    /// Deadline of the scheduled trailing-edge pass, if any.
    pending: Option<Instant>,
}

impl LayoutActor {
    pub fn new(engine: LayoutEngine, rx: Receiver) -> Self {
        let settings = engine.settings();
        let resize_debounce = Duration::from_millis(settings.resize_debounce_ms);
        let drag_debounce = Duration::from_millis(settings.drag_debounce_ms);
        Self {
            engine,
            rx,
            resize_debounce,
            drag_debounce,
            pending: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            match self.pending {
                None => match self.rx.recv().await {
                    Some((span, request)) => {
                        let _guard = span.enter();
                        if !self.handle_request(request) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(deadline) => {
                    tokio::select! {
                        maybe_msg = self.rx.recv() => match maybe_msg {
                            Some((span, request)) => {
                                let _guard = span.enter();
                                if !self.handle_request(request) {
                                    break;
                                }
                            }
                            None => {
                                // flush the pending pass before shutting down
                                self.engine.layout();
                                break;
                            }
                        },
                        _ = sleep_until(deadline) => {
                            self.pending = None;
                            trace!("debounce elapsed, running layout");
                            self.engine.layout();
                        }
                    }
                }
            }
        }
    }

    fn schedule(&mut self, delay: Duration) { self.pending = Some(Instant::now() + delay); }

    fn handle_request(&mut self, request: Request) -> bool {
        match request {
            Request::SetContainerSize { width, height } => {
                if self.engine.resize(width, height) {
                    self.schedule(self.resize_debounce);
                }
            }
            Request::AddItem { width, height, reply } => {
                let result = self.engine.add_item(width, height);
                if result.is_ok() {
                    self.schedule(self.resize_debounce);
                }
                _ = reply.send(result);
            }
            Request::RemoveItem(id) => match self.engine.remove_item(id) {
                Ok(()) => self.schedule(self.resize_debounce),
                Err(error) => warn!(?id, %error, "remove_item failed"),
            },
            Request::Layout => {
                self.pending = None;
                self.engine.layout();
            }
            Request::DragStart(id) => {
                if let Err(error) = self.engine.item_drag_start(id) {
                    warn!(?id, %error, "drag_start failed");
                }
            }
            Request::DragMove { id, x, y } => match self.engine.item_drag_move(id, x, y) {
                Ok(()) => self.schedule(self.drag_debounce),
                Err(error) => warn!(?id, %error, "drag_move failed"),
            },
            Request::DragEnd(id) => {
                self.pending = None;
                if let Err(error) = self.engine.item_drag_end(id) {
                    warn!(?id, %error, "drag_end failed");
                }
            }
            Request::Fit { id, x, y } => {
                self.pending = None;
                if let Err(error) = self.engine.fit(id, x, y) {
                    warn!(?id, %error, "fit failed");
                }
            }
            Request::Shutdown => return false,
        }
        true
    }
}
