//! Deferred transition queue and per-state timers

use crate::core::NodeId;
use std::collections::VecDeque;
use std::rc::Rc;

/// A transition waiting for the next tick
pub(crate) enum Command<S> {
    /// Switch to a specific state, `None` clears the current state
    SetState(Option<Rc<S>>),
    /// Switch to the state with this name
    TransitionTo(String),
}

pub(crate) struct Pending<S> {
    /// State that was current when the command was queued
    pub owner: Option<NodeId>,
    pub command: Command<S>,
}

struct Timer {
    owner: NodeId,
    remaining: f32,
    /// Tick during which the timer was started
    started: u64,
}

/// FIFO of deferred commands plus single-shot timers keyed by owning state
pub(crate) struct Scheduler<S> {
    queue: VecDeque<Pending<S>>,
    timers: Vec<Timer>,
    tick: u64,
}

impl<S> Scheduler<S> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            timers: Vec::new(),
            tick: 0,
        }
    }

    /// Mark the start of a new tick
    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn push(&mut self, owner: Option<NodeId>, command: Command<S>) {
        self.queue.push_back(Pending { owner, command });
    }

    /// Take up to `max` commands from the front of the queue
    ///
    /// Commands pushed while the returned batch executes stay queued for the
    /// following tick.
    pub fn take_due(&mut self, max: usize) -> Vec<Pending<S>> {
        let count = max.min(self.queue.len());
        self.queue.drain(..count).collect()
    }

    /// Drop every queued command and timer owned by `owner`
    pub fn cancel_owner(&mut self, owner: NodeId) -> usize {
        let before = self.queue.len() + self.timers.len();
        self.queue.retain(|pending| pending.owner != Some(owner));
        self.timers.retain(|timer| timer.owner != owner);
        before - self.queue.len() - self.timers.len()
    }

    /// Start a timer, replacing any timer the owner already has
    pub fn start_timer(&mut self, owner: NodeId, seconds: f32) {
        self.timers.retain(|timer| timer.owner != owner);
        self.timers.push(Timer {
            owner,
            remaining: seconds,
            started: self.tick,
        });
    }

    pub fn cancel_timer(&mut self, owner: NodeId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.owner != owner);
        before != self.timers.len()
    }

    /// Advance all timers and return the owners of the ones that expired
    ///
    /// Timers started during the current tick keep their full duration until
    /// the next one.
    pub fn advance(&mut self, delta_time: f32) -> Vec<NodeId> {
        let tick = self.tick;
        let mut expired = Vec::new();
        self.timers.retain_mut(|timer| {
            if timer.started == tick {
                return true;
            }
            timer.remaining -= delta_time;
            if timer.remaining <= 0.0 {
                expired.push(timer.owner);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn timer_remaining(&self, owner: NodeId) -> Option<f32> {
        self.timers
            .iter()
            .find(|timer| timer.owner == owner)
            .map(|timer| timer.remaining)
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(batch: Vec<Pending<()>>) -> Vec<String> {
        batch
            .into_iter()
            .map(|pending| match pending.command {
                Command::TransitionTo(name) => name,
                Command::SetState(_) => "<set>".to_string(),
            })
            .collect()
    }

    /// Begin the next tick and advance the timers by `delta_time`
    fn step(scheduler: &mut Scheduler<()>, delta_time: f32) -> Vec<NodeId> {
        scheduler.begin_tick(scheduler.tick + 1);
        scheduler.advance(delta_time)
    }

    #[test]
    fn test_take_due_is_fifo_and_bounded() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        for name in ["a", "b", "c"] {
            scheduler.push(None, Command::TransitionTo(name.to_string()));
        }

        assert_eq!(names(scheduler.take_due(2)), vec!["a", "b"]);
        assert_eq!(scheduler.pending_commands(), 1);
        assert_eq!(names(scheduler.take_due(8)), vec!["c"]);
        assert!(scheduler.take_due(8).is_empty());
    }

    #[test]
    fn test_cancel_owner_removes_commands_and_timers() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        let owner = NodeId::new();
        let other = NodeId::new();

        scheduler.push(Some(owner), Command::TransitionTo("x".to_string()));
        scheduler.push(Some(other), Command::TransitionTo("y".to_string()));
        scheduler.push(None, Command::SetState(None));
        scheduler.start_timer(owner, 1.0);

        assert_eq!(scheduler.cancel_owner(owner), 2);
        assert_eq!(scheduler.pending_commands(), 2);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn test_timer_expires_once() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        let owner = NodeId::new();
        scheduler.start_timer(owner, 1.0);

        assert!(step(&mut scheduler, 0.5).is_empty());
        assert_eq!(scheduler.timer_remaining(owner), Some(0.5));
        assert_eq!(step(&mut scheduler, 0.5), vec![owner]);
        assert!(step(&mut scheduler, 0.5).is_empty());
        assert_eq!(scheduler.timer_remaining(owner), None);
    }

    #[test]
    fn test_timer_started_this_tick_is_not_advanced() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        let owner = NodeId::new();

        scheduler.begin_tick(4);
        scheduler.start_timer(owner, 1.0);
        assert!(scheduler.advance(0.75).is_empty());
        assert_eq!(scheduler.timer_remaining(owner), Some(1.0));

        assert!(step(&mut scheduler, 0.75).is_empty());
        assert_eq!(scheduler.timer_remaining(owner), Some(0.25));
    }

    #[test]
    fn test_restart_replaces_timer() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        let owner = NodeId::new();
        scheduler.start_timer(owner, 1.0);
        step(&mut scheduler, 0.75);
        scheduler.start_timer(owner, 1.0);

        assert_eq!(scheduler.active_timers(), 1);
        assert_eq!(scheduler.timer_remaining(owner), Some(1.0));
        assert!(scheduler.cancel_timer(owner));
        assert!(!scheduler.cancel_timer(owner));
    }
}
