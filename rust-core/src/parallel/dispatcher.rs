//! Worker pool farming band projections over STFT windows
//!
//! With one worker the projection runs in the caller's thread. With more, the
//! window axis is split between long-lived workers that share the input and
//! output arrays and synchronize through epoch counters:
//!
//! - `submit()` writes the inputs, bumps the input epoch `I`, then polls until
//!   every worker's completion counter `O[w]` has reached `I`;
//! - worker `w` polls until `I > O[w]`, projects its windows straight into its
//!   slice of the output, then bumps `O[w]`;
//! - teardown stores a negative `I`, which every worker treats as "exit".
//!
//! Only one submission is ever in flight (`submit` takes `&mut self`), so the
//! inputs are never written while a worker reads them.

use super::partition::partition;
use super::shared::SharedArray;
use crate::bank::projector::ProjectorInputs;
use crate::config::PollPolicy;
use crate::error::{FilterBankError, Result};
use crate::sample::BandSample;
use log::{debug, error, trace};
use ndarray::{Array4, ArrayView2, ArrayView3, ArrayView4, ArrayViewMut4, Axis, Ix2, Ix3, Ix4};
use num_complex::Complex64;
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Input epoch value telling workers to exit
const SHUTDOWN_SENTINEL: i64 = -1;

/// Projection run by every worker on its slice of windows
pub type ProjectFn<T> =
    dyn Fn(&ProjectorInputs<'_>, ArrayViewMut4<'_, T>) -> Result<()> + Send + Sync;

/// Fixed shapes of the four inputs and the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchShape {
    /// STFT bins `[channels, windows, bins]`
    pub spectra: (usize, usize, usize),

    /// Index arrays `[nfreqs, W]`
    pub indices: (usize, usize),

    /// Output `[channels, windows, nfreqs, len]`
    pub output: (usize, usize, usize, usize),
}

impl DispatchShape {
    fn validate(&self) -> Result<()> {
        let (nch, nwin, _) = self.spectra;
        let (out_ch, out_win, out_bands, _) = self.output;
        if out_ch != nch || out_win != nwin {
            return Err(FilterBankError::Configuration(format!(
                "output {:?} does not share channel/window axes with spectra {:?}",
                self.output, self.spectra
            )));
        }
        if out_bands != self.indices.0 {
            return Err(FilterBankError::Configuration(format!(
                "output has {} bands but index arrays have {}",
                out_bands, self.indices.0
            )));
        }
        Ok(())
    }
}

/// Per-worker completion counter and error channel
struct WorkerSlot {
    completed: AtomicI64,
    error: Mutex<Option<FilterBankError>>,
}

/// State shared by the caller and every worker
struct Shared<T: BandSample> {
    spectra: SharedArray<Complex64, Ix3>,
    idx1: SharedArray<usize, Ix2>,
    idx2: SharedArray<usize, Ix2>,
    fidx: SharedArray<usize, Ix2>,
    output: SharedArray<T, Ix4>,
    input_epoch: AtomicI64,
    slots: Vec<WorkerSlot>,
}

struct Worker {
    range: Range<usize>,
    handle: Option<JoinHandle<()>>,
}

struct Pool<T: BandSample> {
    shared: Arc<Shared<T>>,
    workers: Vec<Worker>,
    epoch: i64,
}

enum Mode<T: BandSample> {
    /// Single worker: run in the caller's thread
    Direct { output: Array4<T> },
    /// Worker threads over shared arrays
    Pool(Pool<T>),
}

/// Farms projections over a fixed pool of workers
pub struct WorkDispatcher<T: BandSample> {
    project: Arc<ProjectFn<T>>,
    shape: DispatchShape,
    poll: PollPolicy,
    mode: Mode<T>,
    stopped: bool,
}

impl<T: BandSample> WorkDispatcher<T> {
    /// Create the dispatcher and, for `workers > 1`, spawn the pool
    ///
    /// # Arguments
    /// * `project` - Projection applied to each worker's windows
    /// * `workers` - Worker count; `0` and `1` both run in the caller's thread
    /// * `shape` - Fixed input/output shapes
    /// * `poll` - Polling intervals and wait bound
    pub fn new<F>(project: F, workers: usize, shape: DispatchShape, poll: PollPolicy) -> Result<Self>
    where
        F: Fn(&ProjectorInputs<'_>, ArrayViewMut4<'_, T>) -> Result<()> + Send + Sync + 'static,
    {
        shape.validate()?;
        let project: Arc<ProjectFn<T>> = Arc::new(project);

        let mode = if workers <= 1 {
            debug!("dispatcher running in the calling thread");
            Mode::Direct {
                output: Array4::from_elem(shape.output, T::default()),
            }
        } else {
            Mode::Pool(Pool::spawn(&project, workers, shape, poll)?)
        };

        Ok(Self {
            project,
            shape,
            poll,
            mode,
            stopped: false,
        })
    }

    /// Number of workers (1 when running in the caller's thread)
    pub fn workers(&self) -> usize {
        match &self.mode {
            Mode::Direct { .. } => 1,
            Mode::Pool(pool) => pool.workers.len(),
        }
    }

    /// Window range owned by each worker
    pub fn ranges(&self) -> Vec<Range<usize>> {
        match &self.mode {
            Mode::Direct { .. } => vec![0..self.shape.output.1],
            Mode::Pool(pool) => pool.workers.iter().map(|w| w.range.clone()).collect(),
        }
    }

    /// Fixed shapes
    pub fn shape(&self) -> DispatchShape {
        self.shape
    }

    /// Worker threads still alive
    pub fn live_workers(&self) -> usize {
        match &self.mode {
            Mode::Direct { .. } => 0,
            Mode::Pool(pool) => pool
                .workers
                .iter()
                .filter(|w| w.handle.as_ref().map_or(false, |h| !h.is_finished()))
                .count(),
        }
    }

    /// True until teardown or a fatal worker error
    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    /// Submit one epoch and wait for its output
    ///
    /// The returned view stays valid until the next call that needs
    /// `&mut self`, so it can never observe a half-written epoch.
    pub fn submit<'v>(
        &mut self,
        spectra: ArrayView3<'v, Complex64>,
        idx1: ArrayView2<'v, usize>,
        idx2: ArrayView2<'v, usize>,
        fidx: ArrayView2<'v, usize>,
    ) -> Result<ArrayView4<'_, T>> {
        if self.stopped {
            return Err(FilterBankError::ShutDown);
        }
        let (nch, nwin, nbins) = self.shape.spectra;
        let (got_ch, got_win, got_bins) = spectra.dim();
        check_dim("spectra", &[got_ch, got_win, got_bins], &[nch, nwin, nbins])?;
        let (nf, w) = self.shape.indices;
        for (what, arr) in [("idx1", &idx1), ("idx2", &idx2), ("fidx", &fidx)] {
            check_dim(what, &[arr.dim().0, arr.dim().1], &[nf, w])?;
        }

        match &mut self.mode {
            Mode::Direct { output } => {
                let inputs = ProjectorInputs {
                    spectra,
                    idx1,
                    idx2,
                    fidx,
                };
                (*self.project)(&inputs, output.view_mut())?;
                Ok(output.view())
            }
            Mode::Pool(pool) => {
                match pool.run_epoch(spectra, idx1, idx2, fidx, &self.poll) {
                    Ok(()) => {}
                    Err(err) => {
                        if err.is_fatal() {
                            error!("worker pool failed, shutting down: {}", err);
                            self.stopped = true;
                            pool.stop(&self.poll);
                        }
                        return Err(err);
                    }
                }
                // SAFETY: every worker finished this epoch and stays idle until
                // the next submit, which needs `&mut self`.
                Ok(unsafe { pool.shared.output.view() })
            }
        }
    }

    /// Stop and join every worker; repeated calls are no-ops
    pub fn shutdown(&mut self) {
        if let Mode::Pool(pool) = &mut self.mode {
            pool.stop(&self.poll);
        }
        self.stopped = true;
    }
}

impl<T: BandSample> Drop for WorkDispatcher<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: BandSample> Pool<T> {
    fn spawn(
        project: &Arc<ProjectFn<T>>,
        workers: usize,
        shape: DispatchShape,
        poll: PollPolicy,
    ) -> Result<Self> {
        let (nch, nwin, nbins) = shape.spectra;
        let (nfreqs, w) = shape.indices;
        let (o0, o1, o2, o3) = shape.output;

        let shared = Arc::new(Shared {
            spectra: SharedArray::new(Ix3(nch, nwin, nbins)),
            idx1: SharedArray::new(Ix2(nfreqs, w)),
            idx2: SharedArray::new(Ix2(nfreqs, w)),
            fidx: SharedArray::new(Ix2(nfreqs, w)),
            output: SharedArray::new(Ix4(o0, o1, o2, o3)),
            input_epoch: AtomicI64::new(0),
            slots: (0..workers)
                .map(|_| WorkerSlot {
                    completed: AtomicI64::new(0),
                    error: Mutex::new(None),
                })
                .collect(),
        });

        let ranges = partition(nwin, workers);
        debug!("spawning {} workers over {} windows: {:?}", workers, nwin, ranges);

        let mut pool = Pool {
            shared,
            workers: Vec::with_capacity(workers),
            epoch: 0,
        };
        for (id, range) in ranges.into_iter().enumerate() {
            let shared = Arc::clone(&pool.shared);
            let project = Arc::clone(project);
            let worker_range = range.clone();
            let spawned = thread::Builder::new()
                .name(format!("tfbank-worker-{}", id))
                .spawn(move || worker_loop(id, shared, worker_range, project, poll));
            match spawned {
                Ok(handle) => pool.workers.push(Worker {
                    range,
                    handle: Some(handle),
                }),
                Err(e) => {
                    pool.stop(&poll);
                    return Err(FilterBankError::WorkerFailed {
                        worker: id,
                        message: format!("could not spawn thread: {}", e),
                    });
                }
            }
        }
        Ok(pool)
    }

    fn run_epoch(
        &mut self,
        spectra: ArrayView3<'_, Complex64>,
        idx1: ArrayView2<'_, usize>,
        idx2: ArrayView2<'_, usize>,
        fidx: ArrayView2<'_, usize>,
        poll: &PollPolicy,
    ) -> Result<()> {
        let shared = &self.shared;
        // SAFETY: all workers completed the previous epoch and are polling the
        // input counter, so nothing reads the inputs until it is bumped below.
        unsafe {
            shared.spectra.view_mut().assign(&spectra);
            shared.idx1.view_mut().assign(&idx1);
            shared.idx2.view_mut().assign(&idx2);
            shared.fidx.view_mut().assign(&fidx);
        }

        self.epoch += 1;
        let epoch = shared.input_epoch.fetch_add(1, Ordering::Release) + 1;
        debug_assert_eq!(epoch, self.epoch);
        trace!("submitted epoch {}", epoch);

        self.wait_for(epoch, poll)?;

        let mut first_error = None;
        for (id, slot) in shared.slots.iter().enumerate() {
            let mut guard = slot.error.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(err) = guard.take() {
                error!("worker {} failed in epoch {}: {}", id, epoch, err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Spin, then sleep-poll until every worker reached `epoch`
    fn wait_for(&self, epoch: i64, poll: &PollPolicy) -> Result<()> {
        let started = Instant::now();
        let mut spins = 0u32;

        for (id, slot) in self.shared.slots.iter().enumerate() {
            while slot.completed.load(Ordering::Acquire) < epoch {
                let alive = self.workers[id]
                    .handle
                    .as_ref()
                    .map_or(false, |h| !h.is_finished());
                // Re-check: the worker may have finished the epoch just before exiting
                if !alive && slot.completed.load(Ordering::Acquire) < epoch {
                    return Err(FilterBankError::WorkerDied { worker: id });
                }
                if let Some(limit) = poll.timeout {
                    let waited = started.elapsed();
                    if waited > limit {
                        return Err(FilterBankError::WorkerTimeout { worker: id, waited });
                    }
                }
                if spins < poll.spin_iterations {
                    spins += 1;
                    std::hint::spin_loop();
                } else {
                    thread::sleep(poll.submit_interval);
                }
            }
        }
        Ok(())
    }

    /// Post the sentinel and join workers, waiting at most `poll.timeout` for each
    fn stop(&mut self, poll: &PollPolicy) {
        self.shared
            .input_epoch
            .store(SHUTDOWN_SENTINEL, Ordering::Release);

        for (id, worker) in self.workers.iter_mut().enumerate() {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            let started = Instant::now();
            while !handle.is_finished() {
                if poll.timeout.map_or(false, |limit| started.elapsed() > limit) {
                    break;
                }
                thread::sleep(poll.worker_interval.max(Duration::from_micros(100)));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!("worker {} panicked", id);
                }
            } else {
                error!("worker {} did not exit; detaching it", id);
            }
        }
    }
}

fn worker_loop<T: BandSample>(
    id: usize,
    shared: Arc<Shared<T>>,
    range: Range<usize>,
    project: Arc<ProjectFn<T>>,
    poll: PollPolicy,
) {
    let slot = &shared.slots[id];
    let mut done = 0i64;
    debug!("worker {} started on windows {:?}", id, range);

    loop {
        let mut spins = 0u32;
        loop {
            let current = shared.input_epoch.load(Ordering::Acquire);
            if current < 0 {
                debug!("worker {} exiting after {} epochs", id, done);
                return;
            }
            if current > done {
                break;
            }
            if spins < poll.spin_iterations {
                spins += 1;
                std::hint::spin_loop();
            } else {
                thread::sleep(poll.worker_interval);
            }
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: inputs are not written while an epoch is pending, and
            // this worker is the only writer of its output range.
            let (inputs, out) = unsafe {
                (
                    ProjectorInputs {
                        spectra: shared.spectra.view(),
                        idx1: shared.idx1.view(),
                        idx2: shared.idx2.view(),
                        fidx: shared.fidx.view(),
                    },
                    shared.output.slice_mut(Axis(1), range.clone()),
                )
            };
            (*project)(&inputs.windows(range.clone()), out)
        }));

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(FilterBankError::WorkerFailed {
                worker: id,
                message: err.to_string(),
            }),
            Err(payload) => Some(FilterBankError::WorkerFailed {
                worker: id,
                message: panic_message(payload.as_ref()),
            }),
        };
        if let Some(err) = failure {
            *slot.error.lock().unwrap_or_else(|p| p.into_inner()) = Some(err);
        }

        done = slot.completed.fetch_add(1, Ordering::Release) + 1;
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

fn check_dim(what: &'static str, actual: &[usize], expected: &[usize]) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(FilterBankError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::projector::BandpassProjector;
    use crate::config::BinPlacement;
    use ndarray::{Array1, Array2, Array3};

    const NCH: usize = 2;
    const NWIN: usize = 9;
    const SEG: usize = 32;

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            submit_interval: Duration::from_micros(200),
            worker_interval: Duration::from_micros(200),
            spin_iterations: 64,
            timeout: Some(Duration::from_secs(20)),
        }
    }

    fn shape() -> DispatchShape {
        DispatchShape {
            spectra: (NCH, NWIN, SEG / 2 + 1),
            indices: (2, 3),
            output: (NCH, NWIN, 2, SEG),
        }
    }

    fn projector() -> Arc<BandpassProjector> {
        let filter = Array1::from_shape_fn(64, |k| Complex64::new(1.0 / (1.0 + k as f64), 0.1));
        Arc::new(BandpassProjector::new(filter, 2, SEG, BinPlacement::Spectral).unwrap())
    }

    fn real_dispatcher(workers: usize) -> WorkDispatcher<f64> {
        let projector = projector();
        WorkDispatcher::new(
            move |inputs: &ProjectorInputs<'_>, out: ArrayViewMut4<'_, f64>| {
                projector.project_real(inputs, out)
            },
            workers,
            shape(),
            fast_poll(),
        )
        .unwrap()
    }

    fn indices() -> (Array2<usize>, Array2<usize>, Array2<usize>) {
        let idx1 = Array2::from_shape_fn((2, 3), |(b, k)| 2 + 6 * b + k);
        let idx2 = Array2::from_shape_fn((2, 3), |(b, _)| b);
        let fidx = Array2::from_shape_fn((2, 3), |(_, k)| 31 + k);
        (idx1, idx2, fidx)
    }

    fn spectra(seed: usize) -> Array3<Complex64> {
        Array3::from_shape_fn(shape().spectra, |(c, t, k)| {
            let v = (seed * 31 + c * 17 + t * 7 + k) as f64;
            Complex64::new((v * 0.37).sin(), (v * 0.11).cos())
        })
    }

    #[test]
    fn test_single_and_multi_worker_agree() {
        let (idx1, idx2, fidx) = indices();
        let x = spectra(1);

        let mut single = real_dispatcher(1);
        let mut multi = real_dispatcher(4);
        assert_eq!(single.workers(), 1);
        assert_eq!(multi.workers(), 4);

        let a = single
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .unwrap()
            .to_owned();
        let b = multi
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .unwrap()
            .to_owned();
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-12);
        }
        assert!(a.iter().any(|v| v.abs() > 1e-6));
    }

    #[test]
    fn test_consecutive_epochs_do_not_leak() {
        let (idx1, idx2, fidx) = indices();
        let projector = projector();
        let mut multi = real_dispatcher(3);

        for seed in 0..6 {
            let x = spectra(seed);
            let got = multi
                .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
                .unwrap()
                .to_owned();

            let mut expected = Array4::zeros(shape().output);
            let inputs = ProjectorInputs {
                spectra: x.view(),
                idx1: idx1.view(),
                idx2: idx2.view(),
                fidx: fidx.view(),
            };
            projector.project_real(&inputs, expected.view_mut()).unwrap();
            assert_eq!(got, expected, "epoch {}", seed);
        }
    }

    #[test]
    fn test_more_workers_than_windows() {
        let (idx1, idx2, fidx) = indices();
        let x = spectra(3);
        let mut single = real_dispatcher(1);
        let mut wide = real_dispatcher(NWIN + 3);
        assert!(wide.ranges().iter().any(|r| r.is_empty()));

        let a = single
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .unwrap()
            .to_owned();
        let b = wide
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .unwrap()
            .to_owned();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut multi = real_dispatcher(4);
        assert_eq!(multi.live_workers(), 4);
        multi.shutdown();
        multi.shutdown();
        assert_eq!(multi.live_workers(), 0);
        assert!(!multi.is_running());

        let (idx1, idx2, fidx) = indices();
        let x = spectra(0);
        assert_eq!(
            multi
                .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
                .unwrap_err(),
            FilterBankError::ShutDown
        );

        let mut single = real_dispatcher(1);
        single.shutdown();
        single.shutdown();
        assert!(single
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .is_err());
    }

    #[test]
    fn test_worker_error_surfaces_and_pool_recovers() {
        let projector = projector();
        let mut multi = WorkDispatcher::new(
            move |inputs: &ProjectorInputs<'_>, out: ArrayViewMut4<'_, f64>| {
                if inputs.spectra.iter().any(|v| v.re.is_nan()) {
                    return Err(FilterBankError::Configuration("NaN input".into()));
                }
                projector.project_real(inputs, out)
            },
            3,
            shape(),
            fast_poll(),
        )
        .unwrap();
        let (idx1, idx2, fidx) = indices();

        // Window 8 belongs to the last worker (ranges 0..3, 3..6, 6..9)
        let mut bad = spectra(0);
        bad[[1, 8, 4]] = Complex64::new(f64::NAN, 0.0);
        match multi.submit(bad.view(), idx1.view(), idx2.view(), fidx.view()) {
            Err(FilterBankError::WorkerFailed { worker, message }) => {
                assert_eq!(worker, 2);
                assert!(message.contains("NaN input"));
            }
            other => panic!("expected worker failure, got {:?}", other.map(|v| v.dim())),
        }

        let good = spectra(1);
        assert!(multi
            .submit(good.view(), idx1.view(), idx2.view(), fidx.view())
            .is_ok());
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let mut multi = WorkDispatcher::new(
            |inputs: &ProjectorInputs<'_>, _out: ArrayViewMut4<'_, f64>| {
                if inputs.spectra.dim().1 > 0 && inputs.spectra[[0, 0, 0]].re > 100.0 {
                    panic!("projector blew up");
                }
                Ok(())
            },
            2,
            shape(),
            fast_poll(),
        )
        .unwrap();
        let (idx1, idx2, fidx) = indices();
        let mut x = spectra(0);
        x.fill(Complex64::new(1000.0, 0.0));

        let err = multi
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .unwrap_err();
        assert!(matches!(err, FilterBankError::WorkerFailed { .. }));
        assert!(err.to_string().contains("projector blew up"));
        // Workers survive a caught panic
        assert_eq!(multi.live_workers(), 2);
    }

    /// Panic payload whose destructor panics again, outside `catch_unwind`
    struct Bomb;

    impl Drop for Bomb {
        fn drop(&mut self) {
            panic!("payload dropped");
        }
    }

    #[test]
    fn test_dead_worker_is_fatal() {
        let mut multi = WorkDispatcher::new(
            |inputs: &ProjectorInputs<'_>, _out: ArrayViewMut4<'_, f64>| {
                if inputs.spectra.dim().1 > 0 {
                    std::panic::panic_any(Bomb);
                }
                Ok(())
            },
            2,
            shape(),
            fast_poll(),
        )
        .unwrap();
        let (idx1, idx2, fidx) = indices();
        let x = spectra(0);

        let err = multi
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .unwrap_err();
        assert!(matches!(err, FilterBankError::WorkerDied { .. }), "{:?}", err);
        assert!(err.is_fatal());
        assert!(!multi.is_running());
        assert_eq!(multi.live_workers(), 0);
        assert_eq!(
            multi
                .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
                .unwrap_err(),
            FilterBankError::ShutDown
        );
    }

    #[test]
    fn test_stuck_worker_times_out() {
        let mut poll = fast_poll();
        poll.timeout = Some(Duration::from_millis(50));
        let mut multi = WorkDispatcher::new(
            |_inputs: &ProjectorInputs<'_>, _out: ArrayViewMut4<'_, f64>| {
                thread::sleep(Duration::from_millis(400));
                Ok(())
            },
            2,
            shape(),
            poll,
        )
        .unwrap();
        let (idx1, idx2, fidx) = indices();
        let x = spectra(0);

        let err = multi
            .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
            .unwrap_err();
        assert!(matches!(err, FilterBankError::WorkerTimeout { .. }));
        assert!(!multi.is_running());
        assert_eq!(
            multi
                .submit(x.view(), idx1.view(), idx2.view(), fidx.view())
                .unwrap_err(),
            FilterBankError::ShutDown
        );
    }

    #[test]
    fn test_rejects_wrong_input_shape() {
        let mut single = real_dispatcher(1);
        let (idx1, idx2, fidx) = indices();
        let x = Array3::<Complex64>::zeros((NCH, NWIN + 1, SEG / 2 + 1));
        assert!(matches!(
            single.submit(x.view(), idx1.view(), idx2.view(), fidx.view()),
            Err(FilterBankError::ShapeMismatch { what: "spectra", .. })
        ));
    }

    #[test]
    fn test_rejects_inconsistent_shape() {
        let bad = DispatchShape {
            output: (NCH, NWIN + 1, 2, SEG),
            ..shape()
        };
        let result = WorkDispatcher::<f64>::new(
            |_: &ProjectorInputs<'_>, _: ArrayViewMut4<'_, f64>| Ok(()),
            4,
            bad,
            fast_poll(),
        );
        assert!(matches!(result, Err(FilterBankError::Configuration(_))));
    }
}
