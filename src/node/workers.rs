//! A small fixed pool of worker threads inbound datagrams are dispatched to.
//!
//! Spec §4.6 / §9: hashing and writing a `BLOCK` payload is CPU-heavy while
//! `PING` must be answered with minimal latency, so independent datagrams
//! must not share a single-threaded receive loop. A bounded pool (rather
//! than a thread per datagram, which the reference source does) keeps that
//! property without unbounded thread growth during a large transfer.

use std::thread;

use crossbeam::channel::{unbounded, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Sender<Job>,
    _handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let handles = (0..workers.max(1))
            .map(|_| {
                let receiver = receiver.clone();
                thread::spawn(move || {
                    for job in receiver.iter() {
                        job();
                    }
                })
            })
            .collect();

        WorkerPool {
            sender,
            _handles: handles,
        }
    }

    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(job)).is_err() {
            log::error!("worker pool is gone; dropping dispatched job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn jobs_run_concurrently_across_workers() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            pool.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        thread::sleep(Duration::from_millis(200));
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
