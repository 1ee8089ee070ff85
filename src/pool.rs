//! The recommended host harness: a fixed pool of worker threads draining
//! a shared queue of datagrams through one [`Decoder`].
//!
//! Decoding a datagram is a bounded computation over an owned buffer, so
//! workers never block each other outside the brief template-cache lock.
//! Shutdown finishes in-flight decodes and drops whatever is still
//! queued.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};

use crate::{Decoder, Value};

/// One received UDP payload with its reception context.
pub struct Datagram {
    pub payload: Vec<u8>,
    pub peer: IpAddr,
    pub timestamp: DateTime<Utc>,
}

pub trait Sink: Send + Sync + 'static {
    fn emit(&self, event: Value);
}

impl<F> Sink for F
where
    F: Fn(Value) + Send + Sync + 'static,
{
    fn emit(&self, event: Value) {
        self(event)
    }
}

#[derive(Default)]
struct State {
    items: VecDeque<Datagram>,
    shutdown: bool,
}

#[derive(Default)]
struct Queue {
    state: Mutex<State>,
    ready: Condvar,
}

pub struct Pool {
    queue: Arc<Queue>,
    workers: Vec<JoinHandle<()>>,
}

impl Pool {
    pub fn spawn<S: Sink>(decoder: Decoder, workers: usize, sink: S) -> Self {
        let queue = Arc::new(Queue::default());
        let sink = Arc::new(sink);

        let workers = (0..workers.max(1))
            .map(|index| {
                let queue = Arc::clone(&queue);
                let decoder = decoder.clone();
                let sink = Arc::clone(&sink);

                std::thread::Builder::new()
                    .name(format!("flowtap-worker-{index}"))
                    .spawn(move || run_worker(queue, decoder, sink))
                    .expect("spawn decode worker")
            })
            .collect();

        Pool { queue, workers }
    }

    /// Enqueue one datagram for decoding.
    pub fn push(&self, datagram: Datagram) {
        self.queue.state.lock().items.push_back(datagram);
        self.queue.ready.notify_one();
    }

    pub fn queued(&self) -> usize {
        self.queue.state.lock().items.len()
    }

    /// Stop the pool. In-flight decodes complete; queued-but-unstarted
    /// datagrams are dropped.
    pub fn shutdown(mut self) {
        self.queue.state.lock().shutdown = true;
        self.queue.ready.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn run_worker(queue: Arc<Queue>, decoder: Decoder, sink: Arc<dyn Sink>) {
    loop {
        let datagram = {
            let mut state = queue.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                match state.items.pop_front() {
                    Some(datagram) => break datagram,
                    None => queue.ready.wait(&mut state),
                }
            }
        };

        match decoder.decode(&datagram.payload, datagram.peer, datagram.timestamp) {
            Ok(events) => {
                for event in events {
                    sink.emit(event);
                }
            }
            Err(err) => {
                warn!(
                    message = "decode failed",
                    peer = %datagram.peer,
                    %err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use chrono::TimeZone;

    fn wait_for(events: &Mutex<Vec<Value>>, count: usize) {
        for _ in 0..500 {
            if events.lock().len() >= count {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("timed out waiting for {count} events");
    }

    fn v5_datagram(count: u8) -> Datagram {
        let mut payload = vec![0x00, 0x05, 0x00, count];
        payload.extend_from_slice(&[0u8; 20]);
        for _ in 0..count {
            payload.extend_from_slice(&[0u8; 48]);
        }

        Datagram {
            payload,
            peer: "198.51.100.7".parse().unwrap(),
            timestamp: Utc.timestamp_opt(1_528_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn decodes_and_forwards() {
        let decoder = Decoder::new(Config::default());
        let events = Arc::new(Mutex::new(Vec::new()));

        let collected = Arc::clone(&events);
        let pool = Pool::spawn(decoder, 4, move |event: Value| {
            collected.lock().push(event);
        });

        for _ in 0..8 {
            pool.push(v5_datagram(2));
        }

        wait_for(&events, 16);
        pool.shutdown();

        let events = events.lock();
        assert_eq!(events.len(), 16);
        assert!(events.iter().all(|e| e.get("agent").is_some()));
    }

    #[test]
    fn malformed_datagrams_do_not_kill_workers() {
        let decoder = Decoder::new(Config::default());
        let events = Arc::new(Mutex::new(Vec::new()));

        let collected = Arc::clone(&events);
        let pool = Pool::spawn(decoder, 1, move |event: Value| {
            collected.lock().push(event);
        });

        pool.push(Datagram {
            payload: vec![0xde, 0xad],
            peer: "198.51.100.7".parse().unwrap(),
            timestamp: Utc::now(),
        });
        pool.push(v5_datagram(1));

        wait_for(&events, 1);
        pool.shutdown();

        assert_eq!(events.lock().len(), 1);
    }
}
