//! Input handling for the judging screen.

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::debug;

use mistake_engine::{App, RankingSource};

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(25); // shutdown responsiveness
const INPUT_CHANNEL_CAPACITY: usize = 256; // bounded: no OOM
const MAX_EVENTS_PER_FRAME: usize = 64; // never starve rendering

const SECS_PER_HOUR: u64 = 3600;

/// The two buttons. Both submit a judgment; the engine does not grade the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Mistake,
    NotAMistake,
}

impl Verdict {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mistake => "Mistake",
            Self::NotAMistake => "Not a Mistake",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Judge(Verdict),
    LongerReorder,
    ShorterReorder,
    Quit,
}

/// Map a terminal event to a command. Releases and unbound keys map to `None`.
#[must_use]
pub fn command_for(ev: &Event) -> Option<Command> {
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind: KeyEventKind::Press,
        ..
    }) = ev
    else {
        return None;
    };

    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('m' | 'M') => Some(Command::Judge(Verdict::Mistake)),
        KeyCode::Char('n' | 'N') => Some(Command::Judge(Verdict::NotAMistake)),
        KeyCode::Char('+' | '=') => Some(Command::LongerReorder),
        KeyCode::Char('-' | '_') => Some(Command::ShorterReorder),
        _ => None,
    }
}

/// The next whole hour strictly above `period`.
#[must_use]
pub fn longer_reorder(period: Duration) -> Duration {
    let hours = period.as_secs() / SECS_PER_HOUR + 1;
    Duration::from_secs(hours.saturating_mul(SECS_PER_HOUR))
}

/// The previous whole hour strictly below `period`, never below one hour.
///
/// `None` when `period` is already an hour or less.
#[must_use]
pub fn shorter_reorder(period: Duration) -> Option<Duration> {
    if period <= Duration::from_secs(SECS_PER_HOUR) {
        return None;
    }
    let hours = (period.as_secs().div_ceil(SECS_PER_HOUR) - 1).max(1);
    Some(Duration::from_secs(hours * SECS_PER_HOUR))
}

/// Compact label for a reorder period: `24h`, `15m` or `30s`.
#[must_use]
pub fn format_period(period: Duration) -> String {
    let secs = period.as_secs();
    if secs >= SECS_PER_HOUR && secs % SECS_PER_HOUR == 0 {
        format!("{}h", secs / SECS_PER_HOUR)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Apply one command. Returns `true` when the shell should quit.
pub fn apply_command<S: RankingSource>(app: &mut App<S>, command: Command) -> bool {
    match command {
        Command::Quit => return true,
        Command::Judge(verdict) => {
            if app.decide().is_none() {
                debug!(verdict = verdict.label(), "Judgment ignored during feedback");
            }
        }
        Command::LongerReorder => {
            app.set_reorder_period(longer_reorder(app.reorder_period()));
        }
        Command::ShorterReorder => match shorter_reorder(app.reorder_period()) {
            Some(period) => {
                app.set_reorder_period(period);
            }
            None => debug!("Reorder period already at its shortest step"),
        },
    }
    false
}

enum InputMsg {
    Event(Event),
    Error(String),
}

/// Reads terminal events on a blocking thread and queues them for the frame loop.
pub struct InputPump {
    rx: mpsc::Receiver<InputMsg>,
    stop: Arc<AtomicBool>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl InputPump {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = stop.clone();

        let join = tokio::task::spawn_blocking(move || input_loop(stop2, tx));
        Self {
            rx,
            stop,
            join: Some(join),
        }
    }

    pub async fn shutdown(&mut self) {
        // Close the receiver first so a backpressured send unblocks the thread.
        self.rx.close();

        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
        }
    }
}

impl Default for InputPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        // Best-effort stop if caller exits early; do not block in Drop.
        self.rx.close();
        self.stop.store(true, Ordering::Release);
    }
}

fn input_loop(stop: Arc<AtomicBool>, tx: mpsc::Sender<InputMsg>) {
    while !stop.load(Ordering::Acquire) {
        match event::poll(INPUT_POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if tx.blocking_send(InputMsg::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                break;
            }
        }
    }
}

/// Drain queued input. Without a running session only quit keys do anything.
///
/// Returns `true` when the shell should quit.
pub fn handle_events<S: RankingSource>(
    mut app: Option<&mut App<S>>,
    input: &mut InputPump,
) -> Result<bool> {
    for _ in 0..MAX_EVENTS_PER_FRAME {
        let ev = match input.rx.try_recv() {
            Ok(InputMsg::Event(ev)) => ev,
            Ok(InputMsg::Error(msg)) => return Err(anyhow!("input error: {msg}")),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Err(anyhow!("input pump disconnected"));
            }
        };

        let Some(command) = command_for(&ev) else {
            continue;
        };
        let quit = match app.as_deref_mut() {
            Some(app) => apply_command(app, command),
            None => command == Command::Quit,
        };
        if quit {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn judgment_keys() {
        assert_eq!(
            command_for(&key(KeyCode::Char('m'))),
            Some(Command::Judge(Verdict::Mistake))
        );
        assert_eq!(
            command_for(&key(KeyCode::Char('N'))),
            Some(Command::Judge(Verdict::NotAMistake))
        );
    }

    #[test]
    fn quit_keys() {
        assert_eq!(command_for(&key(KeyCode::Char('q'))), Some(Command::Quit));
        assert_eq!(command_for(&key(KeyCode::Esc)), Some(Command::Quit));
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(command_for(&ctrl_c), Some(Command::Quit));
        assert_eq!(command_for(&key(KeyCode::Char('c'))), None);
    }

    #[test]
    fn reorder_keys() {
        assert_eq!(
            command_for(&key(KeyCode::Char('+'))),
            Some(Command::LongerReorder)
        );
        assert_eq!(
            command_for(&key(KeyCode::Char('-'))),
            Some(Command::ShorterReorder)
        );
    }

    #[test]
    fn releases_are_ignored() {
        let mut release = KeyEvent::new(KeyCode::Char('m'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(command_for(&Event::Key(release)), None);
        assert_eq!(command_for(&Event::FocusGained), None);
    }

    #[test]
    fn longer_reorder_steps_to_the_next_whole_hour() {
        assert_eq!(longer_reorder(Duration::from_secs(600)), Duration::from_secs(3600));
        assert_eq!(longer_reorder(Duration::from_secs(3600)), Duration::from_secs(7200));
        assert_eq!(longer_reorder(Duration::from_secs(5400)), Duration::from_secs(7200));
    }

    #[test]
    fn shorter_reorder_never_lengthens() {
        assert_eq!(shorter_reorder(Duration::from_secs(600)), None);
        assert_eq!(shorter_reorder(Duration::from_secs(3600)), None);
        assert_eq!(
            shorter_reorder(Duration::from_secs(3601)),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            shorter_reorder(Duration::from_secs(5400)),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            shorter_reorder(Duration::from_secs(24 * 3600)),
            Some(Duration::from_secs(23 * 3600))
        );
    }

    #[test]
    fn period_labels() {
        assert_eq!(format_period(Duration::from_secs(24 * 3600)), "24h");
        assert_eq!(format_period(Duration::from_secs(600)), "10m");
        assert_eq!(format_period(Duration::from_secs(5400)), "90m");
        assert_eq!(format_period(Duration::from_secs(30)), "30s");
    }
}
