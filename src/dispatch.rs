//! Interleaved-stride work dispatcher (spec §4.10). Each phase of the outer
//! loop hands this a `[start, stop)` range and a per-index worker closure;
//! `T` threads each process every `T`-th index, `start + k, start + k + T,
//! …`, and the dispatch blocks until all of them finish. This is not a
//! generic thread pool: there is no task queue or work stealing, only a
//! fixed striding computed once per dispatch.

use std::sync::atomic::{AtomicBool, Ordering};

/// Number of worker threads to use for one dispatch: the machine's
/// hardware thread count, or 1 when `single_threaded` forces serial
/// execution. Without the `cli` feature (which pulls in `num_cpus`) every
/// dispatch is serial, matching the non-parallel fallback the teacher
/// keeps alongside its rayon path.
pub fn thread_count(single_threaded: bool) -> usize {
    #[cfg(feature = "cli")]
    {
        if single_threaded { 1 } else { num_cpus::get().max(1) }
    }
    #[cfg(not(feature = "cli"))]
    {
        let _ = single_threaded;
        1
    }
}

/// Run `worker(index)` for every `index` in `[start, stop)`, striped across
/// `threads` threads. `worker` must be `Sync` since every thread holds a
/// shared reference to it; index-local state (e.g. a root's own pool) is
/// the caller's responsibility to keep disjoint across indices.
pub fn dispatch<F>(start: usize, stop: usize, threads: usize, worker: F)
where
    F: Fn(usize) + Sync,
{
    if start >= stop {
        return;
    }
    let flags: Vec<AtomicBool> = (start..stop).map(|_| AtomicBool::new(false)).collect();
    let threads = threads.max(1);
    std::thread::scope(|scope| {
        for k in 0..threads {
            let flags = &flags;
            let worker = &worker;
            scope.spawn(move || {
                let mut i = start + k;
                while i < stop {
                    worker(i);
                    flags[i - start].store(true, Ordering::Release);
                    i += threads;
                }
            });
        }
    });
    debug_assert!(flags.iter().all(|f| f.load(Ordering::Acquire)));
}

/// Like [`dispatch`], but hands each worker an exclusive `&mut T` into
/// `items[index]` instead of a bare index. Sound because the interleaved
/// striding guarantees every index is visited by exactly one thread, so
/// the `&mut T`s handed out across threads never alias — the same
/// disjointness argument `<[T]>::split_at_mut` relies on internally.
pub fn dispatch_mut<T, F>(items: &mut [T], start: usize, stop: usize, threads: usize, worker: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync,
{
    let stop = stop.min(items.len());
    if start >= stop {
        return;
    }
    struct RawSlice<T>(*mut T, usize);
    // SAFETY: see `dispatch_mut`'s doc comment — indices are partitioned
    // disjointly across threads, so concurrent `&mut T` access is sound.
    unsafe impl<T> Send for RawSlice<T> {}
    unsafe impl<T> Sync for RawSlice<T> {}
    let raw = RawSlice(items.as_mut_ptr(), items.len());
    let threads = threads.max(1);
    std::thread::scope(|scope| {
        for k in 0..threads {
            let worker = &worker;
            let raw = &raw;
            scope.spawn(move || {
                let mut i = start + k;
                while i < stop {
                    debug_assert!(i < raw.1);
                    let item = unsafe { &mut *raw.0.add(i) };
                    worker(i, item);
                    i += threads;
                }
            });
        }
    });
}
