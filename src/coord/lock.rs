//! Lock discipline and barrier rounds over the shared mailbox
//!
//! The lock is a spin on the segment's owner slot. A process that fails to
//! take it must check for a pending barrier and park there first, otherwise
//! the holder waiting for the fleet to park would never make progress.
//!
//! A barrier round, led by the lock holder:
//!
//! 1. raise `suspend_all`
//! 2. wait until every other process has parked (`waiting == fleet - 1`)
//! 3. lower `suspend_all`, then publish the directive
//! 4. wait until every parked process has drained it (`waiting == 0`)
//! 5. empty the mailbox
//!
//! Step 3 lowers the flag first so a process that already drained cannot
//! park again and consume the same directive twice.

use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::coord::engine::ExecutionEngine;
use crate::coord::manager::StateManager;
use crate::core::errors::{CoordError, Result};
use crate::shared::directive::Directive;

impl<E: ExecutionEngine> StateManager<E> {
    /// Spin until this process holds the coordination lock.
    ///
    /// Parks at any barrier raised meanwhile; a kill directive received there
    /// may end the current state, in which case `StateTerminated` is returned
    /// and the lock is not held.
    pub fn acquire(&mut self) -> Result<()> {
        if self.holding_lock {
            return Err(CoordError::protocol(
                format!("re-acquire by holder {}", self.process_id),
                Duration::ZERO,
            ));
        }

        let mut started = Instant::now();
        loop {
            if self.segment.try_acquire(self.process_id) {
                self.holding_lock = true;
                return Ok(());
            }

            if self.segment.is_suspending() {
                let directive = self.listen_for_commands()?;
                debug!(
                    "Process {} retrying lock after {:?}",
                    self.process_id, directive
                );
                started = Instant::now();
                continue;
            }

            self.check_wait(started, "acquire coordination lock")?;
            thread::yield_now();
        }
    }

    /// Give the lock back if this process holds it
    pub fn release(&mut self) {
        if self.holding_lock {
            self.segment.release(self.process_id);
            self.holding_lock = false;
        }
    }

    /// Park at the barrier and consume exactly one directive
    pub(crate) fn listen_for_commands(&mut self) -> Result<Directive> {
        self.segment.announce_waiting();
        debug!("Process {} parked at barrier", self.process_id);

        let outcome = self.drain_one();

        self.segment.leave_waiting();
        outcome
    }

    fn drain_one(&mut self) -> Result<Directive> {
        let started = Instant::now();
        let empty = Directive::Empty.encode();
        let word = loop {
            let word = self.segment.read_command();
            if word != empty {
                break word;
            }
            self.check_wait(started, "wait for barrier directive")?;
            thread::yield_now();
        };
        self.stats.directives_consumed += 1;

        let directive = match Directive::decode(word) {
            Ok(directive) => directive,
            Err(e) => {
                warn!("Process {} ignoring mailbox content: {}", self.process_id, e);
                return Ok(Directive::Resume);
            }
        };
        debug!("Process {} received {:?}", self.process_id, directive);

        match directive {
            Directive::Kill { keeper } if keeper == Some(self.process_id) => {
                self.kill_all_but_one_successful_local()?;
            }
            Directive::Kill { .. } => {
                self.kill_all_except(&[])?;
            }
            Directive::Resume | Directive::Empty => {}
        }
        Ok(directive)
    }

    /// Raise the barrier and wait until every other process has parked
    pub(crate) fn suspend_all_processes(&mut self) -> Result<()> {
        self.require_lock("suspend fleet")?;
        self.segment.set_suspending(true);

        let others = self.segment.fleet_size() - 1;
        let started = Instant::now();
        while self.segment.waiting_count() < others {
            if let Err(e) = self.check_wait(started, "wait for fleet to park") {
                self.segment.set_suspending(false);
                return Err(e);
            }
            thread::yield_now();
        }
        Ok(())
    }

    /// Run one full barrier round delivering `directive` to every other process
    pub(crate) fn broadcast(&mut self, directive: Directive) -> Result<()> {
        self.suspend_all_processes()?;

        self.segment.set_suspending(false);
        self.segment.publish(directive)?;

        let started = Instant::now();
        while self.segment.waiting_count() > 0 {
            self.check_wait(started, "wait for fleet to drain")?;
            thread::yield_now();
        }
        self.segment.clear_mailbox();
        self.stats.barrier_rounds += 1;

        info!(
            "Process {} delivered {:?} to {} other process(es)",
            self.process_id,
            directive,
            self.segment.fleet_size() - 1
        );
        Ok(())
    }

    /// Release every parked process without pruning anything
    pub fn resume_fleet(&mut self) -> Result<()> {
        self.require_lock("resume fleet")?;
        self.broadcast(Directive::Resume)
    }

    pub(crate) fn require_lock(&self, operation: &str) -> Result<()> {
        if self.holding_lock {
            Ok(())
        } else {
            Err(CoordError::protocol(
                format!("{} without the coordination lock", operation),
                Duration::ZERO,
            ))
        }
    }

    fn check_wait(&self, started: Instant, operation: &str) -> Result<()> {
        if let Some(limit) = self.config.max_lock_wait {
            let waited = started.elapsed();
            if waited > limit {
                return Err(CoordError::protocol(
                    format!("{} on process {}", operation, self.process_id),
                    waited,
                ));
            }
        }
        Ok(())
    }
}
