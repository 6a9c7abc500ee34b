//! Adapters turning raw host signals into playback requests.
//!
//! Every detector submits through [`SchedulerHandle::request_playback`], so
//! the single-session rule applies no matter which source fired.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::{AnimationCategory, DeathScreenError, Result, SchedulerHandle};

/// Row of the host's log message sheet holding the synthesis failure text.
pub const SYNTHESIS_FAILED_ROW: u32 = 1160;
/// Opcode of the actor control packet announcing a defeated enemy.
pub const ENEMY_DEFEATED_OPCODE: u16 = 559;
/// Actor control category for a defeated target.
pub const DEFEAT_CATEGORY: u16 = 0x6D;
/// Update type accompanying [`DEFEAT_CATEGORY`].
pub const DEFEAT_UPDATE_TYPE: u32 = 0x4000_0003;
/// Delay between the defeat packet and the overlay, letting the in-game
/// kill animation play first.
pub const ENEMY_DEFEATED_DELAY: Duration = Duration::from_secs(1);

const CATEGORY_OFFSET: usize = 0x00;
const UPDATE_TYPE_OFFSET: usize = 0x08;

/// Fires the player death overlay on the rising edge of the unconscious flag.
#[derive(Debug, Clone)]
pub struct DeathDetector {
    scheduler: SchedulerHandle,
    was_unconscious: bool,
}

impl DeathDetector {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self {
            scheduler,
            was_unconscious: false,
        }
    }

    pub fn was_unconscious(&self) -> bool {
        self.was_unconscious
    }

    /// Called once per host frame with the current condition flag.
    pub fn on_framework_update(&mut self, unconscious: bool, now: Instant) -> Result<()> {
        let rising = unconscious && !self.was_unconscious;
        self.was_unconscious = unconscious;

        if rising {
            tracing::trace!("player died");
            self.scheduler
                .request_playback(AnimationCategory::PlayerDeath, now)?;
        }
        Ok(())
    }
}

/// Localized string table provided by the host.
pub trait LogMessageSheet {
    fn text(&self, row: u32) -> Option<String>;
}

/// Fires the craft failure overlay when a chat line carries the localized
/// synthesis failure message.
#[derive(Debug, Clone)]
pub struct CraftFailureDetector {
    scheduler: SchedulerHandle,
    failure_text: String,
}

impl CraftFailureDetector {
    /// Resolves the failure text once. Fails when the row is missing or empty.
    pub fn new(sheet: &dyn LogMessageSheet, scheduler: SchedulerHandle) -> Result<Self> {
        let failure_text = sheet
            .text(SYNTHESIS_FAILED_ROW)
            .filter(|text| !text.is_empty())
            .ok_or(DeathScreenError::MissingLocalizedText {
                row: SYNTHESIS_FAILED_ROW,
            })?;
        Ok(Self {
            scheduler,
            failure_text,
        })
    }

    pub fn failure_text(&self) -> &str {
        &self.failure_text
    }

    pub fn on_chat_message(&self, text: &str, now: Instant) -> Result<()> {
        if text.contains(self.failure_text.as_str()) {
            tracing::trace!("craft failed");
            self.scheduler
                .request_playback(AnimationCategory::CraftFailure, now)?;
        }
        Ok(())
    }
}

/// Work handed to a [`Deferred`] executor. Receives the instant it fired at.
pub type DeferredTask = Box<dyn FnOnce(Instant) + Send + 'static>;

/// Runs a task once after a delay, without cancellation.
pub trait Deferred: Send + Sync {
    fn schedule(&self, delay: Duration, task: DeferredTask);
}

/// Runs each deferred task on its own detached thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDeferred;

impl Deferred for ThreadDeferred {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        let spawned = thread::Builder::new()
            .name("death-screen-deferred".into())
            .spawn(move || {
                thread::sleep(delay);
                task(Instant::now());
            });
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn deferred request");
        }
    }
}

/// Fires the enemy felled overlay one second after a matching actor
/// control packet. Safe to call from a host network thread.
#[derive(Clone)]
pub struct EnemyDefeatedDetector {
    scheduler: SchedulerHandle,
    deferred: Arc<dyn Deferred>,
    opcode: u16,
}

impl EnemyDefeatedDetector {
    pub fn new(scheduler: SchedulerHandle, deferred: Arc<dyn Deferred>) -> Self {
        Self {
            scheduler,
            deferred,
            opcode: ENEMY_DEFEATED_OPCODE,
        }
    }

    /// Overrides the opcode matched, for hosts running another game patch.
    pub fn with_opcode(mut self, opcode: u16) -> Self {
        self.opcode = opcode;
        self
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    /// Returns whether the packet matched and a request was scheduled.
    pub fn on_network_message(&self, opcode: u16, payload: &[u8]) -> bool {
        if opcode != self.opcode {
            return false;
        }
        let (Some(category), Some(update_type)) = (
            read_u16(payload, CATEGORY_OFFSET),
            read_u32(payload, UPDATE_TYPE_OFFSET),
        ) else {
            tracing::trace!(len = payload.len(), "actor control payload too short");
            return false;
        };
        if category != DEFEAT_CATEGORY || update_type != DEFEAT_UPDATE_TYPE {
            return false;
        }

        let scheduler = self.scheduler.clone();
        self.deferred.schedule(
            ENEMY_DEFEATED_DELAY,
            Box::new(move |now| {
                match scheduler.request_playback(AnimationCategory::EnemyDefeated, now) {
                    Ok(true) => {}
                    Ok(false) => tracing::trace!("enemy felled request dropped after delay"),
                    Err(err) => tracing::error!(error = %err, "enemy felled request failed"),
                }
            }),
        );
        true
    }
}

impl std::fmt::Debug for EnemyDefeatedDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnemyDefeatedDetector")
            .field("opcode", &self.opcode)
            .finish()
    }
}

fn read_u16(payload: &[u8], offset: usize) -> Option<u16> {
    let bytes = payload.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(payload: &[u8], offset: usize) -> Option<u32> {
    let bytes = payload.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Deferred executor driven by an external clock: tasks are due relative
/// to the last instant given to [`ManualDeferred::set_now`] and fire only
/// from [`ManualDeferred::run_due`].
pub struct ManualDeferred {
    state: Mutex<ManualQueue>,
}

struct ManualQueue {
    now: Instant,
    pending: Vec<(Instant, DeferredTask)>,
}

impl ManualDeferred {
    pub fn new(now: Instant) -> Self {
        Self {
            state: Mutex::new(ManualQueue {
                now,
                pending: Vec::new(),
            }),
        }
    }

    pub fn set_now(&self, now: Instant) {
        if let Ok(mut state) = self.state.lock() {
            state.now = now;
        }
    }

    pub fn pending(&self) -> usize {
        self.state.lock().map_or(0, |state| state.pending.len())
    }

    /// Earliest due instant among pending tasks.
    pub fn next_due(&self) -> Option<Instant> {
        let state = self.state.lock().ok()?;
        state.pending.iter().map(|(at, _)| *at).min()
    }

    /// Moves the clock to `now` and fires every task due by then, each at
    /// its own due instant, in due order. Returns how many ran.
    pub fn run_due(&self, now: Instant) -> usize {
        let mut due = {
            let Ok(mut state) = self.state.lock() else {
                return 0;
            };
            state.now = now;
            let (due, waiting): (Vec<_>, Vec<_>) =
                state.pending.drain(..).partition(|(at, _)| *at <= now);
            state.pending = waiting;
            due
        };
        due.sort_by_key(|(at, _)| *at);
        let count = due.len();
        for (at, task) in due {
            task(at);
        }
        count
    }
}

impl Deferred for ManualDeferred {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        match self.state.lock() {
            Ok(mut state) => {
                let at = state.now + delay;
                state.pending.push((at, task));
            }
            Err(_) => tracing::error!("deferred queue has been poisoned"),
        }
    }
}

impl std::fmt::Debug for ManualDeferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualDeferred")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::audio::testing::{unmuted, RecordingSink};
    use crate::{AnimationPhase, AudioGate, AudioOutput, PhaseTimings};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn scheduler() -> SchedulerHandle {
        let audio = AudioOutput::new(Arc::new(RecordingSink::default()), 1.0);
        SchedulerHandle::new(PhaseTimings::default(), AudioGate::new(unmuted()), audio)
    }

    fn category(handle: &SchedulerHandle) -> Option<AnimationCategory> {
        handle.frame_state().unwrap().map(|state| state.category)
    }

    fn defeat_payload(category: u16, update_type: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 32];
        payload[0..2].copy_from_slice(&category.to_le_bytes());
        payload[8..12].copy_from_slice(&update_type.to_le_bytes());
        payload
    }

    struct Sheet(HashMap<u32, String>);

    impl LogMessageSheet for Sheet {
        fn text(&self, row: u32) -> Option<String> {
            self.0.get(&row).cloned()
        }
    }

    fn sheet_with_failure() -> Sheet {
        Sheet(HashMap::from([(
            SYNTHESIS_FAILED_ROW,
            "Your synthesis fails!".to_string(),
        )]))
    }

    #[test]
    fn death_fires_only_on_rising_edge() {
        let handle = scheduler();
        let mut detector = DeathDetector::new(handle.clone());
        let t0 = Instant::now();

        detector.on_framework_update(false, t0).unwrap();
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);

        detector.on_framework_update(true, t0 + ms(16)).unwrap();
        assert_eq!(category(&handle), Some(AnimationCategory::PlayerDeath));
        assert!(detector.was_unconscious());

        // Level stays high well past the end of the first playback.
        for step in 1..400 {
            let now = t0 + ms(16 + step * 16);
            detector.on_framework_update(true, now).unwrap();
            handle.advance(now).unwrap();
        }
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);
    }

    #[test]
    fn death_edge_is_tracked_even_when_busy() {
        let handle = scheduler();
        let t0 = Instant::now();
        handle
            .request_playback(AnimationCategory::CraftFailure, t0)
            .unwrap();

        let mut detector = DeathDetector::new(handle.clone());
        detector.on_framework_update(true, t0).unwrap();
        assert!(detector.was_unconscious());
        assert_eq!(category(&handle), Some(AnimationCategory::CraftFailure));

        for step in [1001, 2601, 4601] {
            handle.advance(t0 + ms(step)).unwrap();
        }
        detector.on_framework_update(true, t0 + ms(4700)).unwrap();
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);

        detector.on_framework_update(false, t0 + ms(4716)).unwrap();
        detector.on_framework_update(true, t0 + ms(4732)).unwrap();
        assert_eq!(category(&handle), Some(AnimationCategory::PlayerDeath));
    }

    #[test]
    fn chat_substring_requests_craft_failure() {
        let handle = scheduler();
        let detector = CraftFailureDetector::new(&sheet_with_failure(), handle.clone()).unwrap();
        let now = Instant::now();

        detector
            .on_chat_message("Your synthesis succeeds!", now)
            .unwrap();
        detector
            .on_chat_message("your synthesis fails!", now)
            .unwrap();
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);

        detector
            .on_chat_message("[12:00] Your synthesis fails! The materials are lost.", now)
            .unwrap();
        assert_eq!(category(&handle), Some(AnimationCategory::CraftFailure));
    }

    #[test]
    fn craft_detector_needs_the_localized_row() {
        let empty = Sheet(HashMap::new());
        let err = CraftFailureDetector::new(&empty, scheduler()).unwrap_err();
        assert!(matches!(
            err,
            DeathScreenError::MissingLocalizedText {
                row: SYNTHESIS_FAILED_ROW
            }
        ));

        let blank = Sheet(HashMap::from([(SYNTHESIS_FAILED_ROW, String::new())]));
        assert!(CraftFailureDetector::new(&blank, scheduler()).is_err());
    }

    #[test]
    fn defeat_packet_requests_after_one_second() {
        let handle = scheduler();
        let t0 = Instant::now();
        let deferred = Arc::new(ManualDeferred::new(t0));
        let detector = EnemyDefeatedDetector::new(handle.clone(), deferred.clone());

        assert!(detector.on_network_message(
            ENEMY_DEFEATED_OPCODE,
            &defeat_payload(DEFEAT_CATEGORY, DEFEAT_UPDATE_TYPE)
        ));
        assert_eq!(deferred.pending(), 1);
        assert_eq!(deferred.next_due(), Some(t0 + ms(1000)));

        assert_eq!(deferred.run_due(t0 + ms(999)), 0);
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);

        assert_eq!(deferred.run_due(t0 + ms(1000)), 1);
        assert_eq!(category(&handle), Some(AnimationCategory::EnemyDefeated));
        let started = handle
            .with_scheduler(|s| s.session().map(|session| session.clock().started_at()))
            .unwrap();
        assert_eq!(started, Some(t0 + ms(1000)));
    }

    #[test]
    fn non_matching_packets_never_request() {
        let handle = scheduler();
        let t0 = Instant::now();
        let deferred = Arc::new(ManualDeferred::new(t0));
        let detector = EnemyDefeatedDetector::new(handle.clone(), deferred.clone());

        let cases = [
            (0x301, defeat_payload(DEFEAT_CATEGORY, DEFEAT_UPDATE_TYPE)),
            (ENEMY_DEFEATED_OPCODE, defeat_payload(0x6C, DEFEAT_UPDATE_TYPE)),
            (ENEMY_DEFEATED_OPCODE, defeat_payload(DEFEAT_CATEGORY, 0x4000_0001)),
            (ENEMY_DEFEATED_OPCODE, defeat_payload(DEFEAT_CATEGORY, DEFEAT_UPDATE_TYPE)[..10].to_vec()),
            (ENEMY_DEFEATED_OPCODE, Vec::new()),
        ];
        for (opcode, payload) in &cases {
            assert!(!detector.on_network_message(*opcode, payload));
        }

        assert_eq!(deferred.pending(), 0);
        deferred.run_due(t0 + ms(5000));
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);
    }

    #[test]
    fn custom_opcode_replaces_the_default() {
        let t0 = Instant::now();
        let deferred = Arc::new(ManualDeferred::new(t0));
        let detector = EnemyDefeatedDetector::new(scheduler(), deferred.clone()).with_opcode(0x301);
        let payload = defeat_payload(DEFEAT_CATEGORY, DEFEAT_UPDATE_TYPE);

        assert!(!detector.on_network_message(ENEMY_DEFEATED_OPCODE, &payload));
        assert!(detector.on_network_message(0x301, &payload));
        assert_eq!(deferred.pending(), 1);
    }

    #[test]
    fn delayed_request_is_dropped_when_busy() {
        let handle = scheduler();
        let t0 = Instant::now();
        let deferred = Arc::new(ManualDeferred::new(t0));
        let detector = EnemyDefeatedDetector::new(handle.clone(), deferred.clone());

        detector.on_network_message(
            ENEMY_DEFEATED_OPCODE,
            &defeat_payload(DEFEAT_CATEGORY, DEFEAT_UPDATE_TYPE),
        );
        handle
            .request_playback(AnimationCategory::PlayerDeath, t0 + ms(500))
            .unwrap();

        deferred.run_due(t0 + ms(1000));
        assert_eq!(deferred.pending(), 0);
        assert_eq!(category(&handle), Some(AnimationCategory::PlayerDeath));

        for step in [1600, 3200, 5200] {
            handle.advance(t0 + ms(step)).unwrap();
        }
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);
        deferred.run_due(t0 + ms(10_000));
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);
    }

    #[test]
    fn thread_deferred_fires_once_after_the_delay() {
        let handle = scheduler();
        let detector = EnemyDefeatedDetector::new(handle.clone(), Arc::new(ThreadDeferred));
        let sent = Instant::now();

        assert!(detector.on_network_message(
            ENEMY_DEFEATED_OPCODE,
            &defeat_payload(DEFEAT_CATEGORY, DEFEAT_UPDATE_TYPE)
        ));
        assert_eq!(handle.phase().unwrap(), AnimationPhase::Idle);

        let deadline = sent + Duration::from_secs(5);
        while handle.phase().unwrap() == AnimationPhase::Idle && Instant::now() < deadline {
            thread::sleep(ms(20));
        }

        let started = handle
            .with_scheduler(|s| s.session().map(|session| session.clock().started_at()))
            .unwrap()
            .expect("deferred request should have started a playback");
        assert!(started.duration_since(sent) >= ENEMY_DEFEATED_DELAY);
        assert_eq!(category(&handle), Some(AnimationCategory::EnemyDefeated));
    }
}
