use crate::library;
use crate::model::TrackInfo;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Metadata(PathBuf, TrackInfo),
}

#[derive(Debug)]
enum WorkerCommand {
    Read { path: PathBuf, generation: u64 },
    Shutdown,
}

pub struct MetadataWorker {
    cmd_tx: Sender<WorkerCommand>,
    event_rx: Receiver<WorkerEvent>,
    generation: Arc<AtomicU64>,
    pending: HashSet<PathBuf>,
    handle: Option<JoinHandle<()>>,
}

impl MetadataWorker {
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let generation = Arc::new(AtomicU64::new(0));
        let worker_generation = Arc::clone(&generation);

        let handle = thread::Builder::new()
            .name(String::from("sasplayer-metadata"))
            .spawn(move || worker_loop(cmd_rx, event_tx, worker_generation))
            .map_err(|err| log::warn!("metadata worker unavailable: {err}"))
            .ok();

        Self {
            cmd_tx,
            event_rx,
            generation,
            pending: HashSet::new(),
            handle,
        }
    }

    pub fn enqueue(&mut self, path: PathBuf) -> bool {
        if self.handle.is_none() || self.pending.contains(&path) {
            return false;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let queued = self
            .cmd_tx
            .send(WorkerCommand::Read {
                path: path.clone(),
                generation,
            })
            .is_ok();
        if queued {
            self.pending.insert(path);
        }
        queued
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.pending.clear();
        while self.event_rx.try_recv().is_ok() {}
    }

    pub fn try_events(&mut self) -> Vec<WorkerEvent> {
        let incoming: Vec<WorkerEvent> = self.event_rx.try_iter().collect();
        incoming
            .into_iter()
            .filter(|WorkerEvent::Metadata(path, _)| self.pending.remove(path))
            .collect()
    }
}

impl Drop for MetadataWorker {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    cmd_rx: Receiver<WorkerCommand>,
    event_tx: Sender<WorkerEvent>,
    generation: Arc<AtomicU64>,
) {
    while let Ok(command) = cmd_rx.recv() {
        match command {
            WorkerCommand::Read {
                path,
                generation: queued_at,
            } => {
                if queued_at != generation.load(Ordering::SeqCst) {
                    continue;
                }
                let info = library::read_track_info(&path);
                if queued_at != generation.load(Ordering::SeqCst) {
                    continue;
                }
                if event_tx.send(WorkerEvent::Metadata(path, info)).is_err() {
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    log::debug!("metadata worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn drain_until(worker: &mut MetadataWorker, expected: usize) -> Vec<WorkerEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < expected && Instant::now() < deadline {
            events.extend(worker.try_events());
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn reads_are_reported_back() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("one.mp3");
        let second = dir.path().join("two.flac");
        fs::write(&first, b"x").expect("write");
        fs::write(&second, b"x").expect("write");

        let mut worker = MetadataWorker::spawn();
        assert!(worker.enqueue(first.clone()));
        assert!(worker.enqueue(second.clone()));

        let events = drain_until(&mut worker, 2);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            WorkerEvent::Metadata(first, TrackInfo::unknown())
        );
        assert_eq!(worker.pending(), 0);
    }

    #[test]
    fn duplicate_pending_paths_are_skipped() {
        let mut worker = MetadataWorker::spawn();
        let path = PathBuf::from("missing.mp3");
        assert!(worker.enqueue(path.clone()));
        assert!(!worker.enqueue(path));
        assert_eq!(worker.pending(), 1);
    }

    #[test]
    fn cancel_clears_pending() {
        let mut worker = MetadataWorker::spawn();
        for n in 0..20 {
            worker.enqueue(PathBuf::from(format!("missing_{n}.mp3")));
        }
        worker.cancel();
        assert_eq!(worker.pending(), 0);

        thread::sleep(Duration::from_millis(50));
        assert!(worker.try_events().is_empty());

        assert!(worker.enqueue(PathBuf::from("after_cancel.mp3")));
        assert_eq!(drain_until(&mut worker, 1).len(), 1);
    }
}
