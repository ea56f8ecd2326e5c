use super::{Thread, ThreadId, ThreadStatus};
use std::cell::RefCell;
use std::collections::VecDeque;

/// Round-robin queue of threads
///
/// A thread is taken out of the queue while it runs and put back at the end afterwards, so no
/// borrow of the queue is held across the execution of an instruction.
pub struct Scheduler<'g> {
    run_queue: RefCell<VecDeque<Thread<'g>>>,

    /// Terminated threads, kept around until someone collects their outcome
    finished: RefCell<Vec<Thread<'g>>>,
}

impl<'g> Scheduler<'g> {
    pub fn new() -> Scheduler<'g> {
        Scheduler {
            run_queue: RefCell::new(VecDeque::new()),
            finished: RefCell::new(vec![]),
        }
    }

    pub fn push(&self, thread: Thread<'g>) {
        log::trace!("Queueing thread {:?}", thread.name());
        self.run_queue.borrow_mut().push_back(thread);
    }

    /// Take the first runnable thread out of the queue
    pub fn take_runnable(&self) -> Option<Thread<'g>> {
        let mut run_queue = self.run_queue.borrow_mut();
        let position = run_queue
            .iter()
            .position(|thread| thread.status() == ThreadStatus::Runnable)?;
        run_queue.remove(position)
    }

    /// Put a thread back after it ran (terminated threads move to the finished list)
    pub fn requeue(&self, thread: Thread<'g>) {
        if thread.status() == ThreadStatus::Terminated {
            log::debug!("Thread {:?} terminated", thread.name());
            self.finished.borrow_mut().push(thread);
        } else {
            self.run_queue.borrow_mut().push_back(thread);
        }
    }

    /// Are there no live threads left?
    pub fn is_empty(&self) -> bool {
        self.run_queue.borrow().is_empty()
    }

    pub fn has_runnable(&self) -> bool {
        self.run_queue
            .borrow()
            .iter()
            .any(|thread| thread.status() == ThreadStatus::Runnable)
    }

    /// Move threads to the back of the queue, in the order given
    ///
    /// Used when threads are woken up together so that they then run in wake-up order.
    pub fn move_to_back(&self, ids: &[ThreadId]) {
        let mut run_queue = self.run_queue.borrow_mut();
        for id in ids {
            if let Some(position) = run_queue.iter().position(|thread| thread.id() == *id) {
                if let Some(thread) = run_queue.remove(position) {
                    run_queue.push_back(thread);
                }
            }
        }
    }

    /// Names and statuses of every queued thread (for deadlock reports)
    pub fn stuck_thread_names(&self) -> Vec<String> {
        self.run_queue
            .borrow()
            .iter()
            .map(|thread| format!("{} ({:?})", thread.name(), thread.status()))
            .collect()
    }

    /// Collect a terminated thread
    pub fn take_finished(&self, id: ThreadId) -> Option<Thread<'g>> {
        let mut finished = self.finished.borrow_mut();
        let position = finished.iter().position(|thread| thread.id() == id)?;
        Some(finished.remove(position))
    }
}

impl<'g> Default for Scheduler<'g> {
    fn default() -> Self {
        Scheduler::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn thread(id: u64, status: ThreadStatus) -> Thread<'static> {
        let thread = Thread::new(ThreadId(id), format!("t{}", id));
        thread.set_status(status);
        thread
    }

    #[test]
    fn skips_threads_that_cannot_run() {
        let scheduler = Scheduler::new();
        scheduler.push(thread(1, ThreadStatus::Blocked));
        scheduler.push(thread(2, ThreadStatus::Runnable));
        scheduler.push(thread(3, ThreadStatus::Runnable));

        let next = scheduler.take_runnable().unwrap();
        assert_eq!(next.id(), ThreadId(2));
        scheduler.requeue(next);

        let next = scheduler.take_runnable().unwrap();
        assert_eq!(next.id(), ThreadId(3));
        next.set_status(ThreadStatus::Terminated);
        scheduler.requeue(next);

        assert_eq!(scheduler.take_runnable().unwrap().id(), ThreadId(2));
        assert!(scheduler.take_runnable().is_none());
        assert!(!scheduler.is_empty());
        assert_eq!(scheduler.take_finished(ThreadId(3)).unwrap().id(), ThreadId(3));
        assert!(scheduler.take_finished(ThreadId(3)).is_none());
    }

    #[test]
    fn woken_threads_run_in_wake_order() {
        let scheduler = Scheduler::new();
        for id in 1..=3 {
            scheduler.push(thread(id, ThreadStatus::Runnable));
        }
        scheduler.move_to_back(&[ThreadId(2), ThreadId(1)]);
        let order: Vec<u64> = std::iter::from_fn(|| scheduler.take_runnable())
            .map(|thread| thread.id().0)
            .collect();
        assert_eq!(order, vec![3, 2, 1]);
    }
}
