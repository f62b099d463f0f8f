use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rampart_core::engine::CancelFlag;
use std::{thread, time::Duration};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Listens for 'q' or Ctrl-C while a run is in progress and raises the cancel flag.
///
/// Raw mode swallows the terminal's own Ctrl-C, so both keys are read here.
pub struct InputHandle {
    cancel: CancelFlag,
    listener: Option<thread::JoinHandle<()>>,
    done: CancelFlag,
}

impl InputHandle {
    pub fn new(cancel: CancelFlag) -> Self {
        Self {
            cancel,
            listener: None,
            done: CancelFlag::new(),
        }
    }

    pub fn start(&mut self) {
        if self.listener.is_some() {
            return;
        }
        if let Err(e) = enable_raw_mode() {
            debug!("keyboard abort unavailable: {e}");
            return;
        }

        let cancel = self.cancel.clone();
        let done = self.done.clone();
        self.listener = Some(thread::spawn(move || {
            while !done.is_cancelled() {
                if !event::poll(POLL_INTERVAL).unwrap_or(false) {
                    continue;
                }
                if let Ok(Event::Key(key_event)) = event::read() {
                    let is_q = key_event.code == KeyCode::Char('q');
                    let is_ctrl_c = key_event.code == KeyCode::Char('c')
                        && key_event.modifiers.contains(KeyModifiers::CONTROL);

                    if (is_q || is_ctrl_c) && key_event.kind == KeyEventKind::Press {
                        warn!("abort requested, finishing units in flight");
                        cancel.cancel();
                        break;
                    }
                }
            }
            let _ = disable_raw_mode();
        }));
    }

    pub fn stop(&mut self) {
        self.done.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        self.stop();
        let _ = disable_raw_mode();
    }
}
