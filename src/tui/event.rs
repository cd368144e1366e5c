use anyhow::Result;
use crossterm::event::{Event as CrosstermEvent, KeyEvent, KeyEventKind};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::errors::GenerationError;
use crate::generation::GeneratedPair;

/// Everything the survey loop reacts to.
#[derive(Debug, Clone)]
pub enum Event {
    Key(KeyEvent),
    Paste(String),
    Tick,
    Resize,
    /// A background generation finished; applied as `FinishGeneration`.
    GenerationFinished {
        ticket: u64,
        result: Result<GeneratedPair, GenerationError>,
        elapsed: Duration,
    },
}

/// Key releases and repeats are dropped; Windows reports both.
fn translate(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        CrosstermEvent::Paste(text) => Some(Event::Paste(text)),
        CrosstermEvent::Resize(_, _) => Some(Event::Resize),
        _ => None,
    }
}

/// Merges terminal input, a steady tick and generation results into one
/// channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tx.clone();

        tokio::spawn(async move {
            let mut terminal_events = crossterm::event::EventStream::new();
            let mut ticks = tokio::time::interval(tick_rate);

            loop {
                let next = tokio::select! {
                    polled = terminal_events.next() => match polled {
                        Some(Ok(raw)) => translate(raw),
                        Some(Err(_)) | None => break,
                    },
                    _ = ticks.tick() => Some(Event::Tick),
                };
                if let Some(event) = next {
                    if pump.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Self { rx, tx }
    }

    /// Handle for background tasks that report back into the loop.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Event channel closed"))
    }
}
