//! The live progress line shown while machines converge.
//!
//! The line belongs to the run's span, drawn by the `tracing-indicatif` layer so
//! log lines never tear it. Unit completions arrive from every machine task at
//! once; a small narrator thread keeps only the newest one on screen and fills
//! quiet stretches with operator tips.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use colored::*;
use indicatif::ProgressStyle;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

const TIP_AFTER: Duration = Duration::from_secs(2);
const MIN_TIP_VISIBILITY: Duration = Duration::from_millis(750);
const TIPS: &[&str] = &[
    "Press 'q' to stop scheduling new units",
    "Units already running always finish",
];
const TICKS: &[&str] = &[
    "▁▁▁▁▁", "▁▂▂▂▁", "▁▄▂▄▁", "▂▄▆▄▂", "▄▆█▆▄", "▂▄▆▄▂", "▁▄▂▄▁", "▁▂▂▂▁",
];

enum Note {
    Done(String),
    Finish,
}

pub struct Progress {
    tx: Sender<Note>,
    narrator: Option<JoinHandle<()>>,
}

/// Cheap handle the engine's outcome callback reports through.
#[derive(Clone)]
pub struct Reporter(Sender<Note>);

impl Reporter {
    pub fn unit_done(&self, machine: &str, unit: &str) {
        let _ = self.0.send(Note::Done(format!("{machine}/{unit}")));
    }
}

impl Progress {
    /// Attaches a bar of `total` units to `span`. Must run before the span is entered.
    pub fn start(span: Span, total: usize) -> Self {
        if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} [{pos}/{len}] {msg}") {
            span.pb_set_style(&style.tick_strings(TICKS));
        }
        span.pb_set_length(total as u64);

        let (tx, rx) = mpsc::channel();
        let narrator = thread::spawn(move || narrate(span, rx));
        Self {
            tx,
            narrator: Some(narrator),
        }
    }

    pub fn reporter(&self) -> Reporter {
        Reporter(self.tx.clone())
    }

    /// Stops the narrator; the bar disappears once the span closes.
    pub fn finish(mut self) {
        let _ = self.tx.send(Note::Finish);
        if let Some(narrator) = self.narrator.take() {
            let _ = narrator.join();
        }
    }
}

fn narrate(span: Span, rx: Receiver<Note>) {
    let mut tips = TIPS.iter().cycle();
    let mut tip_shown_at: Option<Instant> = None;

    loop {
        match rx.recv_timeout(TIP_AFTER) {
            Ok(Note::Done(mut last)) => {
                let mut done = 1;
                // only the newest completion is worth showing
                while let Ok(note) = rx.try_recv() {
                    match note {
                        Note::Done(newer) => {
                            done += 1;
                            last = newer;
                        }
                        Note::Finish => return,
                    }
                }
                if let Some(shown) = tip_shown_at.take() {
                    thread::sleep(MIN_TIP_VISIBILITY.saturating_sub(shown.elapsed()));
                }
                span.pb_inc(done);
                span.pb_set_message(&last.bright_black().to_string());
            }
            Ok(Note::Finish) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(tip) = tips.next() {
                    span.pb_set_message(&tip.italic().white().to_string());
                    tip_shown_at = Some(Instant::now());
                }
            }
        }
    }
}
