// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::{broadcast, Notify},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, span, Level, Span};

use crate::grid::Pitch;
use crate::instrument::InstrumentType;

use super::{Callback, EngineError, Trigger};

const TRIGGER_CAPACITY: usize = 256;

struct ScheduledNote {
    instrument: InstrumentType,
    pitch: Pitch,
    start_beat: f64,
}

#[derive(Default)]
struct State {
    notes: Vec<ScheduledNote>,
    one_shots: Vec<(f64, Callback)>,
    /// When the transport was started. None while stopped.
    started_at: Option<Instant>,
    /// Bumped on every start and stop so a superseded run loop knows to exit.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// A real-time transport that runs on the tokio runtime. Notes are not rendered to audio
/// here; they're published as triggers for whatever voices are listening.
pub struct Engine {
    name: String,
    tempo_bpm: f64,
    runtime: Handle,
    state: Arc<Mutex<State>>,
    changed: Arc<Notify>,
    triggers: broadcast::Sender<Trigger>,
    span: Span,
}

impl Engine {
    /// Creates a new transport engine. Must be called from within a tokio runtime.
    pub fn new(name: &str, tempo_bpm: f64) -> Result<Engine, EngineError> {
        if !tempo_bpm.is_finite() || tempo_bpm <= 0.0 {
            return Err(EngineError::InvalidTempo(tempo_bpm));
        }

        let (triggers, _) = broadcast::channel(TRIGGER_CAPACITY);
        Ok(Engine {
            name: name.to_string(),
            tempo_bpm,
            runtime: Handle::try_current()?,
            state: Arc::new(Mutex::new(State::default())),
            changed: Arc::new(Notify::new()),
            triggers,
            span: span!(Level::INFO, "transport"),
        })
    }

    /// Subscribes to the notes the transport sounds.
    pub fn subscribe(&self) -> broadcast::Receiver<Trigger> {
        self.triggers.subscribe()
    }

    fn sound(triggers: &broadcast::Sender<Trigger>, trigger: Trigger) {
        info!(
            instrument = trigger.instrument.as_str(),
            pitch = trigger.pitch.to_string(),
            "Note triggered."
        );
        // Nobody listening is fine.
        let _ = triggers.send(trigger);
    }

    /// Drives the transport until it's stopped or superseded by another start.
    async fn run(
        state: Arc<Mutex<State>>,
        changed: Arc<Notify>,
        triggers: broadcast::Sender<Trigger>,
        generation: u64,
        started_at: Instant,
        seconds_per_beat: f64,
    ) {
        // Everything at or before this beat has been played.
        let mut played_through: Option<f64> = None;
        let unplayed = |beat: f64, played_through: Option<f64>| {
            played_through.map_or(true, |played| beat > played)
        };
        let playhead = |played_through: Option<f64>| {
            let position = started_at.elapsed().as_secs_f64() / seconds_per_beat;
            played_through.map_or(position, |played| played.max(position))
        };

        loop {
            // Register interest before reading the state so no change slips past.
            let notified = changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_beat = {
                let state = state.lock();
                if state.generation != generation {
                    return;
                }

                state
                    .notes
                    .iter()
                    .map(|note| note.start_beat)
                    .filter(|beat| unplayed(*beat, played_through))
                    .chain(state.one_shots.iter().map(|(beat, _)| *beat))
                    .min_by(f64::total_cmp)
            };

            // A changed schedule only plays from the playhead onwards, never catching up on
            // notes whose beat has already gone by.
            let Some(next_beat) = next_beat else {
                notified.await;
                played_through = Some(playhead(played_through));
                continue;
            };

            let deadline =
                started_at + Duration::from_secs_f64(next_beat.max(0.0) * seconds_per_beat);
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = &mut notified => {
                    played_through = Some(playhead(played_through));
                    continue;
                }
            }

            let (notes, callbacks) = {
                let mut state = state.lock();
                if state.generation != generation {
                    return;
                }

                let notes: Vec<Trigger> = state
                    .notes
                    .iter()
                    .filter(|note| unplayed(note.start_beat, played_through))
                    .filter(|note| note.start_beat <= next_beat)
                    .map(|note| Trigger {
                        instrument: note.instrument,
                        pitch: note.pitch,
                    })
                    .collect();
                let (callbacks, pending): (Vec<_>, Vec<_>) =
                    std::mem::take(&mut state.one_shots)
                        .into_iter()
                        .partition(|(beat, _)| *beat <= next_beat);
                state.one_shots = pending;
                (notes, callbacks)
            };
            played_through = Some(next_beat);

            for trigger in notes {
                Engine::sound(&triggers, trigger);
            }
            // Callbacks may stop this transport; the generation check above handles that.
            for (_, callback) in callbacks {
                callback();
            }
        }
    }
}

impl super::Engine for Engine {
    fn schedule_note(&self, instrument: InstrumentType, pitch: Pitch, start_beat: f64) {
        self.state.lock().notes.push(ScheduledNote {
            instrument,
            pitch,
            start_beat,
        });
        self.changed.notify_waiters();
    }

    fn clear_schedule(&self) {
        self.state.lock().notes.clear();
        self.changed.notify_waiters();
    }

    fn now(&self) -> f64 {
        self.state
            .lock()
            .started_at
            .map(|started_at| started_at.elapsed().as_secs_f64() * self.tempo_bpm / 60.0)
            .unwrap_or(0.0)
    }

    fn start(&self) {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        if state.started_at.is_some() {
            debug!(engine = self.name, "Transport already running.");
            return;
        }

        let started_at = Instant::now();
        state.generation += 1;
        state.started_at = Some(started_at);
        state.task = Some(self.runtime.spawn(Engine::run(
            self.state.clone(),
            self.changed.clone(),
            self.triggers.clone(),
            state.generation,
            started_at,
            60.0 / self.tempo_bpm,
        )));
        info!(engine = self.name, tempo = self.tempo_bpm, "Transport started.");
    }

    fn stop(&self) {
        let _enter = self.span.enter();

        let task = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.started_at = None;
            state.task.take()
        };

        if let Some(task) = task {
            task.abort();
            info!(engine = self.name, "Transport stopped.");
        }
    }

    fn cancel_pending_callbacks(&self) {
        self.state.lock().one_shots.clear();
        self.changed.notify_waiters();
    }

    fn schedule_one_shot(&self, at_beat: f64, callback: Callback) {
        self.state.lock().one_shots.push((at_beat, callback));
        self.changed.notify_waiters();
    }

    fn trigger_now(&self, instrument: InstrumentType, pitch: Pitch) {
        Engine::sound(&self.triggers, Trigger { instrument, pitch });
    }

    fn is_running(&self) -> bool {
        self.state.lock().started_at.is_some()
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bpm)", self.name, self.tempo_bpm)
    }
}

#[cfg(test)]
mod test {
    use std::{
        error::Error,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use crate::engine::{Engine as _, EngineError};
    use crate::grid::Note;
    use crate::instrument::InstrumentType;
    use crate::testutil::eventually;

    use super::Engine;

    #[test]
    fn test_requires_runtime() {
        assert!(matches!(
            Engine::new("transport", 120.0),
            Err(EngineError::NoRuntime(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_tempo() {
        assert!(Engine::new("transport", 0.0).is_err());
        assert!(Engine::new("transport", f64::NAN).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_plays_schedule_and_fires_callback() -> Result<(), Box<dyn Error>> {
        // Fast enough that a four beat pattern takes 40ms.
        let engine = Arc::new(Engine::new("transport", 6000.0)?);
        let mut triggers = engine.subscribe();

        engine.schedule_note(InstrumentType::Piano, Note::E.pitch(), 1.0);
        engine.schedule_note(InstrumentType::Piano, Note::C.pitch(), 0.0);

        let fired = Arc::new(AtomicBool::new(false));
        {
            let fired = fired.clone();
            let stopper = engine.clone();
            engine.schedule_one_shot(
                4.0,
                Box::new(move || {
                    fired.store(true, Ordering::Relaxed);
                    stopper.stop();
                }),
            );
        }

        engine.start();
        assert!(engine.is_running());

        let first = triggers.recv().await?;
        let second = triggers.recv().await?;
        assert_eq!("C3", first.pitch.to_string());
        assert_eq!("E3", second.pitch.to_string());

        eventually(|| fired.load(Ordering::Relaxed), "Callback never fired");
        eventually(|| !engine.is_running(), "Transport never stopped");
        assert_eq!(0.0, engine.now());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reschedule_mid_pattern_skips_passed_notes() -> Result<(), Box<dyn Error>> {
        // A beat every 100ms.
        let engine = Engine::new("transport", 600.0)?;
        let mut triggers = engine.subscribe();

        engine.schedule_note(InstrumentType::Guitar, Note::E.pitch(), 3.0);
        engine.start();
        tokio::time::sleep(Duration::from_millis(150)).await;

        // The playhead is past beat 1 when the schedule is replaced.
        engine.clear_schedule();
        engine.schedule_note(InstrumentType::Guitar, Note::C.pitch(), 0.0);
        engine.schedule_note(InstrumentType::Guitar, Note::E.pitch(), 3.0);

        let first = tokio::time::timeout(Duration::from_secs(2), triggers.recv()).await??;
        assert_eq!("E3", first.pitch.to_string());
        assert!(engine.now() >= 2.9);

        engine.stop();
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_callback_never_fires() -> Result<(), Box<dyn Error>> {
        let engine = Engine::new("transport", 6000.0)?;
        let fired = Arc::new(AtomicBool::new(false));
        {
            let fired = fired.clone();
            engine.schedule_one_shot(
                1.0,
                Box::new(move || fired.store(true, Ordering::Relaxed)),
            );
        }
        engine.cancel_pending_callbacks();
        engine.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.stop();

        assert!(!fired.load(Ordering::Relaxed));
        Ok(())
    }
}
