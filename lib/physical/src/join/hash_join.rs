use crate::join::hash_table::JoinHashTable;
use async_trait::async_trait;
use fedra_common::error::StreamError;
use fedra_common::{BoxSolutionStream, SolutionStream};
use fedra_model::{Solution, Variable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Tuning knobs of a [HashJoinStream].
#[derive(Debug, Clone)]
pub struct HashJoinOptions {
    /// Capacity of the shared output queue. A full queue blocks the producing sides, which is
    /// what gives the join its backpressure.
    pub queue_capacity: usize,
    /// How long `close()` waits for each fetch task before giving up on it.
    pub close_timeout: Duration,
    /// Marks the left side: its unmatched solutions survive the join as standalone solutions.
    pub left_optional: bool,
    /// Marks the right side: its unmatched solutions survive the join as standalone solutions.
    pub right_optional: bool,
}

impl Default for HashJoinOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            close_timeout: Duration::from_secs(30),
            left_optional: false,
            right_optional: false,
        }
    }
}

struct JoinSide {
    table: JoinHashTable,
    optional: bool,
    done: bool,
}

/// Both hash tables plus the per-side completion flags, guarded by one coarse lock.
///
/// The insert + probe + emit sequence for a single incoming solution happens under this lock as
/// one atomic step: two concurrent inserts could otherwise each miss the other's freshly
/// inserted matching row. Join inputs are bounded in-memory sets, so the contention is paid for
/// correctness, not throughput.
struct JoinState {
    sides: [JoinSide; 2],
}

/// A symmetric hash join between two solution streams.
///
/// Both inputs are drained by two background tasks that insert into their own hash table and
/// probe the other side's, emitting merged solutions into a bounded queue the consumer drains
/// through the stream protocol. Sides marked optional realize outer-join semantics: their
/// stored solutions that were never matched are emitted standalone once both sides finished.
///
/// An empty join-variable set degenerates into an unrestricted cross product.
///
/// Within one side, solutions are probed and emitted in input order; the interleaving across
/// sides is unspecified.
pub struct HashJoinStream {
    variables: Arc<[Variable]>,
    receiver: Receiver<Solution>,
    peeked: Option<Solution>,
    stop: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
    handles: Vec<JoinHandle<()>>,
    close_timeout: Duration,
    closed: bool,
}

impl HashJoinStream {
    /// Starts a hash join over `left` and `right` with default options.
    ///
    /// Must be called from within a Tokio runtime; the two fetch tasks are spawned immediately.
    pub fn new(
        left: BoxSolutionStream,
        right: BoxSolutionStream,
        join_vars: Vec<Variable>,
    ) -> Self {
        Self::with_options(left, right, join_vars, HashJoinOptions::default())
    }

    /// Starts a hash join over `left` and `right`.
    pub fn with_options(
        left: BoxSolutionStream,
        right: BoxSolutionStream,
        join_vars: Vec<Variable>,
        options: HashJoinOptions,
    ) -> Self {
        let variables = output_variables(left.variables(), right.variables());
        let join_vars: Arc<[Variable]> = join_vars.into();

        // Fetch tracking is only needed where leftovers will be emitted.
        let state = Arc::new(Mutex::new(JoinState {
            sides: [
                JoinSide {
                    table: JoinHashTable::new(Arc::clone(&join_vars), options.left_optional),
                    optional: options.left_optional,
                    done: false,
                },
                JoinSide {
                    table: JoinHashTable::new(Arc::clone(&join_vars), options.right_optional),
                    optional: options.right_optional,
                    done: false,
                },
            ],
        }));

        let (sender, receiver) = mpsc::channel(options.queue_capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_notify = Arc::new(Notify::new());

        let handles = vec![
            tokio::spawn(fetch_side(
                0,
                left,
                Arc::clone(&state),
                sender.clone(),
                Arc::clone(&variables),
                Arc::clone(&stop),
                Arc::clone(&stop_notify),
            )),
            tokio::spawn(fetch_side(
                1,
                right,
                state,
                sender,
                Arc::clone(&variables),
                Arc::clone(&stop),
                Arc::clone(&stop_notify),
            )),
        ];

        Self {
            variables,
            receiver,
            peeked: None,
            stop,
            stop_notify,
            handles,
            close_timeout: options.close_timeout,
            closed: false,
        }
    }
}

#[async_trait]
impl SolutionStream for HashJoinStream {
    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        // Blocks until a producer enqueues a solution or both sides are done and the queue
        // drained (all senders dropped). Already-buffered solutions remain consumable even
        // after close() was requested.
        match self.receiver.recv().await {
            Some(solution) => {
                self.peeked = Some(solution);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        self.peeked.take().ok_or(StreamError::Exhausted)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Cooperative stop: fetch loops observe the flag between solutions, producers blocked
        // on the full queue observe the notification. In-flight probe/emit steps complete.
        self.stop.store(true, Ordering::Relaxed);
        self.stop_notify.notify_waiters();

        for handle in self.handles.drain(..) {
            match tokio::time::timeout(self.close_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_error)) => {
                    error!(error = %join_error, "join fetch task failed during close");
                }
                Err(_) => {
                    warn!(
                        timeout = ?self.close_timeout,
                        "join fetch task did not finish within the close timeout"
                    );
                }
            }
        }
        Ok(())
    }

    fn ready_count(&self) -> usize {
        usize::from(self.peeked.is_some()) + self.receiver.len()
    }

    fn is_async(&self) -> bool {
        true
    }
}

impl Drop for HashJoinStream {
    fn drop(&mut self) {
        // A dropped-but-unclosed stream must not leave producers blocked forever.
        self.stop.store(true, Ordering::Relaxed);
        self.stop_notify.notify_waiters();
    }
}

/// The fetch loop of one join side. `side` indexes [JoinState::sides]; `1 - side` is the
/// opposite side.
async fn fetch_side(
    side: usize,
    mut input: BoxSolutionStream,
    state: Arc<Mutex<JoinState>>,
    queue: Sender<Solution>,
    variables: Arc<[Variable]>,
    stop: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
) {
    let other = 1 - side;

    while !stop.load(Ordering::Relaxed) {
        let solution = match input.has_next().await {
            Ok(true) => match input.next().await {
                Ok(solution) => solution,
                Err(e) => {
                    error!(side, error = %e, "join input failed, finishing this side");
                    break;
                }
            },
            Ok(false) => break,
            Err(e) => {
                error!(side, error = %e, "join input failed, finishing this side");
                break;
            }
        };

        let mut guard = state.lock().await;
        let key = guard.sides[side].table.key_of(&solution);
        let matches = guard.sides[other].table.matches(&key);
        // Inserting is pointless once the other side cannot probe anymore, unless this
        // side's leftovers are needed for outer-join emission. A solution whose own probe
        // matched is not a leftover, whichever side arrived first.
        if !guard.sides[other].done || guard.sides[side].optional {
            guard.sides[side].table.insert(solution.clone(), !matches.is_empty());
        }
        let mut emitted_all = true;
        for matched in matches {
            let merged = if side == 0 {
                Solution::merge(Arc::clone(&variables), &solution, &matched)
            } else {
                Solution::merge(Arc::clone(&variables), &matched, &solution)
            };
            if !emit(&queue, &stop, &stop_notify, merged).await {
                emitted_all = false;
                break;
            }
        }
        drop(guard);
        if !emitted_all {
            break;
        }
    }

    finish_side(side, &state, &queue, &variables, &stop, &stop_notify).await;

    if let Err(e) = input.close().await {
        error!(side, error = %e, "failed to close join input stream");
    }
}

/// Transitions `side` to done. The second side to get here is the join-completion point: it
/// emits the unmatched leftovers of every optional side and clears both tables.
async fn finish_side(
    side: usize,
    state: &Mutex<JoinState>,
    queue: &Sender<Solution>,
    variables: &Arc<[Variable]>,
    stop: &AtomicBool,
    stop_notify: &Notify,
) {
    let other = 1 - side;
    let mut guard = state.lock().await;
    guard.sides[side].done = true;

    if guard.sides[other].done {
        for i in 0..2 {
            if !guard.sides[i].optional {
                continue;
            }
            for leftover in guard.sides[i].table.unfetched() {
                let standalone = leftover.map_onto(Arc::clone(variables));
                if !emit(queue, stop, stop_notify, standalone).await {
                    break;
                }
            }
        }
        guard.sides[side].table.clear();
        guard.sides[other].table.clear();
    } else if !guard.sides[other].optional {
        // No further solution of this side will probe the other table, and the other side
        // stops inserting now that this side is done; only optional leftovers are still needed.
        guard.sides[other].table.clear();
    }
}

/// Sends one solution into the bounded queue, blocking while it is full.
///
/// Returns false when the join is stopping or the consumer is gone; the caller abandons its
/// remaining work in that case.
async fn emit(
    queue: &Sender<Solution>,
    stop: &AtomicBool,
    stop_notify: &Notify,
    solution: Solution,
) -> bool {
    let notified = stop_notify.notified();
    tokio::pin!(notified);
    if stop.load(Ordering::Relaxed) {
        return false;
    }
    tokio::select! {
        result = queue.send(solution) => result.is_ok(),
        _ = &mut notified => false,
    }
}

fn output_variables(left: &[Variable], right: &[Variable]) -> Arc<[Variable]> {
    let mut variables: Vec<Variable> = left.to_vec();
    for variable in right {
        if !variables.contains(variable) {
            variables.push(variable.clone());
        }
    }
    variables.into()
}
