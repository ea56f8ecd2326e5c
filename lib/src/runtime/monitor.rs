use super::{ThreadHandle, ThreadId, ThreadStatus};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

pub type MonitorRef = Rc<RefCell<Monitor>>;

/// Reentrant lock with wait/notify queues, attached to objects and classes
///
/// Nothing here ever suspends the host: blocking is expressed through the status of the thread,
/// and ownership is handed over directly when the monitor is released. A thread that was blocked
/// in `enter` or `wait` therefore resumes already owning the monitor, with its entry count
/// restored.
#[derive(Debug, Default)]
pub struct Monitor {
    owner: Option<ThreadHandle>,
    entry_count: usize,

    /// Threads blocked on acquiring the monitor (FIFO)
    acquire_queue: VecDeque<Waiter>,

    /// Threads in `wait` that haven't been notified yet
    wait_queue: VecDeque<Waiter>,
}

#[derive(Debug)]
struct Waiter {
    thread: ThreadHandle,

    /// Entry count to restore when the monitor is handed back
    entry_count: usize,
    deadline: Option<Instant>,
}

/// Result of trying to enter a monitor
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MonitorEnter {
    Acquired,

    /// The thread is now `Blocked` and queued
    Blocked,
}

/// The calling thread does not own the monitor
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct NotOwner;

impl Monitor {
    pub fn new() -> Monitor {
        Monitor::default()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.as_ref().map(|owner| owner.id())
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn is_owned_by(&self, thread: &ThreadHandle) -> bool {
        self.owner() == Some(thread.id())
    }

    pub fn enter(&mut self, thread: &ThreadHandle) -> MonitorEnter {
        match &self.owner {
            None => {
                self.owner = Some(thread.clone());
                self.entry_count = 1;
                MonitorEnter::Acquired
            }
            Some(owner) if owner.id() == thread.id() => {
                self.entry_count += 1;
                MonitorEnter::Acquired
            }
            Some(_) => {
                self.acquire_queue.push_back(Waiter {
                    thread: thread.clone(),
                    entry_count: 1,
                    deadline: None,
                });
                thread.set_status(ThreadStatus::Blocked);
                MonitorEnter::Blocked
            }
        }
    }

    pub fn exit(&mut self, thread: &ThreadHandle) -> Result<(), NotOwner> {
        if !self.is_owned_by(thread) {
            return Err(NotOwner);
        }
        self.entry_count -= 1;
        if self.entry_count == 0 {
            self.hand_off();
        }
        Ok(())
    }

    /// Fully release the monitor and park the thread until it is notified (or the deadline)
    ///
    /// On failure, the monitor is left untouched.
    pub fn wait(&mut self, thread: &ThreadHandle, deadline: Option<Instant>) -> Result<(), NotOwner> {
        if !self.is_owned_by(thread) {
            return Err(NotOwner);
        }
        self.wait_queue.push_back(Waiter {
            thread: thread.clone(),
            entry_count: self.entry_count,
            deadline,
        });
        thread.set_status(if deadline.is_some() {
            ThreadStatus::TimedWaiting
        } else {
            ThreadStatus::Waiting
        });
        self.hand_off();
        Ok(())
    }

    /// Move the longest waiting thread over to the acquire queue
    pub fn notify(&mut self, thread: &ThreadHandle) -> Result<(), NotOwner> {
        if !self.is_owned_by(thread) {
            return Err(NotOwner);
        }
        if let Some(waiter) = self.wait_queue.pop_front() {
            self.reacquire(waiter);
        }
        Ok(())
    }

    pub fn notify_all(&mut self, thread: &ThreadHandle) -> Result<(), NotOwner> {
        if !self.is_owned_by(thread) {
            return Err(NotOwner);
        }
        while let Some(waiter) = self.wait_queue.pop_front() {
            self.reacquire(waiter);
        }
        Ok(())
    }

    /// Wake up timed waiters whose deadline has passed, returning whether any were woken
    pub fn expire_waits(&mut self, now: Instant) -> bool {
        let mut expired = vec![];
        let mut still_waiting = VecDeque::new();
        for waiter in self.wait_queue.drain(..) {
            match waiter.deadline {
                Some(deadline) if deadline <= now => expired.push(waiter),
                _ => still_waiting.push_back(waiter),
            }
        }
        self.wait_queue = still_waiting;

        let woke_any = !expired.is_empty();
        for waiter in expired {
            self.reacquire(waiter);
        }
        if self.owner.is_none() {
            self.hand_off();
        }
        woke_any
    }

    /// Earliest deadline among timed waiters
    pub fn next_deadline(&self) -> Option<Instant> {
        self.wait_queue.iter().filter_map(|waiter| waiter.deadline).min()
    }

    fn reacquire(&mut self, waiter: Waiter) {
        waiter.thread.set_status(ThreadStatus::Blocked);
        self.acquire_queue.push_back(Waiter {
            deadline: None,
            ..waiter
        });
    }

    fn hand_off(&mut self) {
        self.owner = None;
        self.entry_count = 0;
        if let Some(next) = self.acquire_queue.pop_front() {
            next.thread.set_status(ThreadStatus::Runnable);
            self.owner = Some(next.thread);
            self.entry_count = next.entry_count;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::ThreadShared;
    use std::time::Duration;

    fn thread(id: u64) -> ThreadHandle {
        let handle = ThreadShared::new(ThreadId(id), format!("t{}", id));
        handle.set_status(ThreadStatus::Runnable);
        handle
    }

    #[test]
    fn reentrant_enter_and_exit() {
        let (a, b) = (thread(1), thread(2));
        let mut monitor = Monitor::new();

        assert_eq!(monitor.enter(&a), MonitorEnter::Acquired);
        assert_eq!(monitor.enter(&a), MonitorEnter::Acquired);
        assert_eq!(monitor.entry_count(), 2);

        assert_eq!(monitor.enter(&b), MonitorEnter::Blocked);
        assert_eq!(b.status(), ThreadStatus::Blocked);

        assert_eq!(monitor.exit(&b), Err(NotOwner));
        assert_eq!(monitor.exit(&a), Ok(()));
        assert_eq!(monitor.owner(), Some(a.id()));
        assert_eq!(monitor.exit(&a), Ok(()));

        // Handed straight to the blocked thread
        assert_eq!(monitor.owner(), Some(b.id()));
        assert_eq!(monitor.entry_count(), 1);
        assert_eq!(b.status(), ThreadStatus::Runnable);
    }

    #[test]
    fn wait_by_non_owner_changes_nothing() {
        let (a, b) = (thread(1), thread(2));
        let mut monitor = Monitor::new();
        monitor.enter(&a);
        monitor.enter(&a);

        assert_eq!(monitor.wait(&b, None), Err(NotOwner));
        assert_eq!(monitor.notify(&b), Err(NotOwner));
        assert_eq!(monitor.notify_all(&b), Err(NotOwner));
        assert_eq!(monitor.owner(), Some(a.id()));
        assert_eq!(monitor.entry_count(), 2);
        assert_eq!(b.status(), ThreadStatus::Runnable);

        let mut unowned = Monitor::new();
        assert_eq!(unowned.wait(&b, None), Err(NotOwner));
        assert_eq!(unowned.owner(), None);
    }

    #[test]
    fn wait_then_notify_all_restores_entry_counts() {
        let (a, b, c) = (thread(1), thread(2), thread(3));
        let mut monitor = Monitor::new();

        monitor.enter(&a);
        monitor.enter(&a);
        assert_eq!(monitor.wait(&a, None), Ok(()));
        assert_eq!(a.status(), ThreadStatus::Waiting);
        assert_eq!(monitor.owner(), None);

        monitor.enter(&b);
        assert_eq!(monitor.wait(&b, None), Ok(()));

        monitor.enter(&c);
        assert_eq!(monitor.notify_all(&c), Ok(()));
        assert_eq!(a.status(), ThreadStatus::Blocked);
        assert_eq!(b.status(), ThreadStatus::Blocked);

        monitor.exit(&c).unwrap();
        assert_eq!(monitor.owner(), Some(a.id()));
        assert_eq!(monitor.entry_count(), 2);
        assert_eq!(a.status(), ThreadStatus::Runnable);

        monitor.exit(&a).unwrap();
        monitor.exit(&a).unwrap();
        assert_eq!(monitor.owner(), Some(b.id()));
        assert_eq!(monitor.entry_count(), 1);
    }

    #[test]
    fn notify_wakes_longest_waiter_only() {
        let (a, b, c) = (thread(1), thread(2), thread(3));
        let mut monitor = Monitor::new();
        for waiter in [&a, &b] {
            monitor.enter(waiter);
            monitor.wait(waiter, None).unwrap();
        }

        monitor.enter(&c);
        monitor.notify(&c).unwrap();
        assert_eq!(a.status(), ThreadStatus::Blocked);
        assert_eq!(b.status(), ThreadStatus::Waiting);
    }

    #[test]
    fn timed_wait_expires() {
        let a = thread(1);
        let mut monitor = Monitor::new();
        let start = Instant::now();
        let deadline = start + Duration::from_millis(5);

        monitor.enter(&a);
        monitor.wait(&a, Some(deadline)).unwrap();
        assert_eq!(a.status(), ThreadStatus::TimedWaiting);
        assert_eq!(monitor.next_deadline(), Some(deadline));

        assert!(!monitor.expire_waits(start));
        assert!(monitor.expire_waits(deadline));
        assert_eq!(monitor.owner(), Some(a.id()));
        assert_eq!(a.status(), ThreadStatus::Runnable);
        assert_eq!(monitor.next_deadline(), None);
    }
}
