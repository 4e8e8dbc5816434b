//! Background job lanes for terrain chunks: LOD meshing and undergrowth.
//!
//! Every job carries its own reply channel. The submitter keeps the matching
//! [`TaskHandle`] and polls it; dropping the handle abandons the job, and the
//! worker's reply is discarded when it finishes.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use horizon_chunk::{Corners, Neighborhood};
use horizon_geom::ChunkPos;
use horizon_mesh_cpu::{
    CombinedBatch, LodMesh, LodParams, ModelTemplate, Placement, PlacementParams, build_lod_mesh,
    combine_placements, place_undergrowth,
};
use rayon::{ThreadPool, ThreadPoolBuilder};

#[derive(Clone, Debug)]
pub struct LodBuildJob {
    pub pos: ChunkPos,
    pub lod: u8,
    pub base_height: i32,
    pub neighborhood: Neighborhood,
    pub params: LodParams,
}

#[derive(Clone, Debug)]
pub struct PlacementJob {
    pub pos: ChunkPos,
    pub base_height: i32,
    pub neighborhood: Neighborhood,
    pub params: Arc<PlacementParams>,
}

#[derive(Clone, Debug)]
pub struct CombineJob {
    pub pos: ChunkPos,
    pub placements: Arc<[Placement]>,
    pub templates: Vec<ModelTemplate>,
}

/// Result of polling a [`TaskHandle`].
#[derive(Debug)]
pub enum TaskPoll<T> {
    Pending,
    Done(T),
    /// The job can never finish: its worker went away without replying.
    Lost,
}

/// Receiving end of one submitted job.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// A handle for a result delivered through the returned sender rather
    /// than by a worker lane. It stays pending until a value is sent and is
    /// lost once the sender is dropped without one.
    pub fn channel() -> (Sender<T>, Self) {
        let (tx, rx) = bounded(1);
        (tx, Self { rx })
    }

    pub fn poll(&self) -> TaskPoll<T> {
        match self.rx.try_recv() {
            Ok(v) => TaskPoll::Done(v),
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => TaskPoll::Lost,
        }
    }
}

enum Work {
    Lod(LodBuildJob, Sender<LodMesh>),
    Place(PlacementJob, Sender<Vec<Placement>>),
    Combine(CombineJob, Sender<Vec<CombinedBatch>>),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Lane {
    Lod,
    Undergrowth,
}

impl Lane {
    fn name(self) -> &'static str {
        match self {
            Lane::Lod => "lod",
            Lane::Undergrowth => "undergrowth",
        }
    }
}

/// Runs one job. `window` is scratch space for the padded corner window and
/// is reused by whoever owns it.
fn process_work(work: Work, window: &mut Corners) {
    let t0 = Instant::now();
    let (pos, kind, delivered) = match work {
        Work::Lod(job, tx) => {
            job.neighborhood.fill_padded_window(window);
            let center = &job.neighborhood.center;
            let out = build_lod_mesh(
                window,
                job.lod,
                job.base_height,
                center.lowest_height(),
                center.dominant_terrain(),
                &job.params,
            );
            (job.pos, "lod", tx.send(out).is_ok())
        }
        Work::Place(job, tx) => {
            job.neighborhood.fill_padded_window(window);
            let out = place_undergrowth(job.pos, window, job.base_height, &job.params);
            (job.pos, "place", tx.send(out).is_ok())
        }
        Work::Combine(job, tx) => {
            let out = combine_placements(&job.placements, &job.templates);
            (job.pos, "combine", tx.send(out).is_ok())
        }
    };
    let ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
    if delivered {
        log::trace!(target: "runtime", "{} job for {} done in {}ms", kind, pos, ms);
    } else {
        log::debug!(target: "runtime", "{} job for {} finished after its owner left; result dropped", kind, pos);
    }
}

struct LaneQueue {
    tx: Option<Sender<Work>>,
    queued: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    _pool: Option<Arc<ThreadPool>>,
    workers: usize,
}

impl LaneQueue {
    fn spawn(lane: Lane, workers: usize) -> Self {
        let queued = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));
        if workers == 0 {
            return Self {
                tx: None,
                queued,
                inflight,
                _pool: None,
                workers,
            };
        }

        let (tx, rx) = unbounded::<Work>();
        let name = lane.name();
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(move |i| format!("horizon-{name}-{i}"))
                .build()
                .expect("lane pool"),
        );
        for _ in 0..workers {
            let rx = rx.clone();
            let queued = queued.clone();
            let inflight = inflight.clone();
            pool.spawn(move || {
                let mut window = Corners::new();
                while let Ok(work) = rx.recv() {
                    queued.fetch_sub(1, Ordering::Relaxed);
                    inflight.fetch_add(1, Ordering::Relaxed);
                    process_work(work, &mut window);
                    inflight.fetch_sub(1, Ordering::Relaxed);
                }
            });
        }
        Self {
            tx: Some(tx),
            queued,
            inflight,
            _pool: Some(pool),
            workers,
        }
    }

    fn submit(&self, work: Work) {
        match &self.tx {
            Some(tx) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = tx.send(work) {
                    self.queued.fetch_sub(1, Ordering::Relaxed);
                    // Workers are gone; finish on the caller's thread instead.
                    process_work(e.into_inner(), &mut Corners::new());
                }
            }
            None => process_work(work, &mut Corners::new()),
        }
    }
}

/// Worker pools for LOD meshing and undergrowth. A lane with zero workers
/// runs its jobs on the submitting thread, so results are ready immediately.
pub struct Runtime {
    lod: LaneQueue,
    undergrowth: LaneQueue,
}

impl Runtime {
    pub fn new(lod_workers: usize, undergrowth_workers: usize) -> Self {
        let lod = LaneQueue::spawn(Lane::Lod, lod_workers);
        let undergrowth = LaneQueue::spawn(Lane::Undergrowth, undergrowth_workers);
        log::info!(
            target: "runtime",
            "worker lanes: lod={} undergrowth={}",
            lod_workers,
            undergrowth_workers
        );
        Self { lod, undergrowth }
    }

    /// Worker split for this machine: one undergrowth worker when there are
    /// at least two cores, everything else meshes LODs.
    pub fn default_worker_counts() -> (usize, usize) {
        let worker_count: usize = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        let w_undergrowth = if worker_count >= 2 { 1 } else { 0 };
        let w_lod = worker_count.saturating_sub(w_undergrowth).max(1);
        (w_lod, w_undergrowth)
    }

    /// Runs every job inline on submit.
    pub fn inline() -> Self {
        Self::new(0, 0)
    }

    pub fn workers(&self) -> (usize, usize) {
        (self.lod.workers, self.undergrowth.workers)
    }

    pub fn submit_lod(&self, job: LodBuildJob) -> TaskHandle<LodMesh> {
        let (tx, handle) = TaskHandle::channel();
        self.lod.submit(Work::Lod(job, tx));
        handle
    }

    pub fn submit_placement(&self, job: PlacementJob) -> TaskHandle<Vec<Placement>> {
        let (tx, handle) = TaskHandle::channel();
        self.undergrowth.submit(Work::Place(job, tx));
        handle
    }

    pub fn submit_combine(&self, job: CombineJob) -> TaskHandle<Vec<CombinedBatch>> {
        let (tx, handle) = TaskHandle::channel();
        self.undergrowth.submit(Work::Combine(job, tx));
        handle
    }

    /// `(lod queued, lod in flight, undergrowth queued, undergrowth in flight)`
    pub fn queue_debug_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.lod.queued.load(Ordering::Relaxed),
            self.lod.inflight.load(Ordering::Relaxed),
            self.undergrowth.queued.load(Ordering::Relaxed),
            self.undergrowth.inflight.load(Ordering::Relaxed),
        )
    }
}
