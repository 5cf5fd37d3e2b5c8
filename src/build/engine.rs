//! The bundle build engine.
//!
//! A producer walks branches, fields and files in order and spawns one task
//! per file, holding at most `concurrency` tasks in flight. A consumer awaits
//! the task handles in submission order, so the output stream keeps dispatch
//! order no matter how tasks interleave. The first failure stops dispatch,
//! aborts everything still queued and is the only error the stream reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::context::BuildContext;
use super::discovery::{FsGlob, GlobExpander};
use super::error::BuildError;
use super::extract::FieldExtractor;
use super::file::FileEntry;
use super::kind::{BundleKind, NameRegistry};
use super::middleware::{Middleware, Step};
use super::stream::{BuildStream, StreamSender};
use crate::tree::Branch;

type Task = JoinHandle<Result<Option<String>, BuildError>>;

/// Shared, read-only state every task sees.
#[derive(Debug)]
pub struct BuildEnv {
    pub context: BuildContext,
    pub extractor: FieldExtractor,
    pub middleware: Middleware,
}

/// Configures and runs one bundle build.
///
/// ```ignore
/// let mut builder = Builder::new(Scripts, branches, context);
/// builder.use_step("scripts", Arc::new(plugins::js()));
/// let js = builder.run().collect_string().await?;
/// ```
pub struct Builder<K: BundleKind> {
    kind: K,
    branches: Vec<Arc<Branch>>,
    context: BuildContext,
    glob: Arc<dyn GlobExpander>,
    middleware: Middleware,
}

impl<K: BundleKind> Builder<K> {
    /// Builder over `branches`, dispatched in the given order.
    pub fn new(kind: K, branches: Vec<Arc<Branch>>, context: BuildContext) -> Self {
        Self { kind, branches, context, glob: Arc::new(FsGlob), middleware: Middleware::new() }
    }

    /// Replace the filesystem glob expander.
    pub fn with_glob(mut self, glob: Arc<dyn GlobExpander>) -> Self {
        self.glob = glob;
        self
    }

    /// Append a step to `field`'s chain.
    pub fn use_step(&mut self, field: &str, step: Arc<dyn Step>) -> &mut Self {
        self.middleware.use_step(field, step);
        self
    }

    /// Append several steps to `field`'s chain.
    pub fn use_steps(
        &mut self,
        field: &str,
        steps: impl IntoIterator<Item = Arc<dyn Step>>,
    ) -> &mut Self {
        self.middleware.use_steps(field, steps);
        self
    }

    pub fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Start the build and return its output stream.
    ///
    /// Only fields with registered steps are extracted. Must be called from
    /// within a Tokio runtime; dropping the stream cancels the build.
    pub fn run(self) -> BuildStream {
        let (out, stream) = BuildStream::channel();
        let driver = tokio::spawn(drive(self, out));
        stream.with_driver(driver)
    }
}

/// First-failure latch shared by the producer, the tasks and the consumer.
struct Halt {
    halted: AtomicBool,
    failures: mpsc::Sender<BuildError>,
}

impl Halt {
    fn new() -> (Arc<Self>, mpsc::Receiver<BuildError>) {
        let (failures, rx) = mpsc::channel(1);
        (Arc::new(Self { halted: AtomicBool::new(false), failures }), rx)
    }

    /// Record `err` unless a failure was already recorded.
    fn trip(&self, err: BuildError) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            let _ = self.failures.try_send(err);
        }
    }

    /// Stop dispatch without reporting an error.
    fn stop(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

enum Stop {
    Failed(BuildError),
    Cancelled,
}

async fn drive<K: BundleKind>(builder: Builder<K>, out: StreamSender) {
    let Builder { kind, branches, context, glob, middleware } = builder;
    let started = Instant::now();
    let label = kind.label();
    let limit = context.concurrency().limit();
    info!(
        kind = label,
        branches = branches.len(),
        concurrency = %context.concurrency(),
        "build started"
    );

    let extractor = FieldExtractor::new(glob, middleware.fields(), context.is_development());
    let env = Arc::new(BuildEnv { context, extractor, middleware });
    let kind = Arc::new(kind);

    if let Some(preamble) = kind.preamble(&env.context) {
        if out.send(Ok(preamble)).await.is_err() {
            debug!(kind = label, "output dropped before the build started");
            return;
        }
    }

    let (halt, mut failures) = Halt::new();
    let limiter = limit.map(|n| Arc::new(Semaphore::new(n)));
    let (queue_tx, mut queue) = mpsc::channel(limit.unwrap_or(Semaphore::MAX_PERMITS));
    let producer = tokio::spawn(produce(kind, branches, env, Arc::clone(&halt), limiter, queue_tx));

    let mut outcome = consume(&mut queue, &mut failures, &halt, &out).await;
    if outcome.is_ok() {
        // a panicking producer closes the queue early
        if let Err(err) = producer.await {
            outcome = Err(Stop::Failed(BuildError::task(format!("dispatch failed: {}", err))));
        }
    } else {
        producer.abort();
    }

    match outcome {
        Ok(statements) => {
            info!(
                kind = label,
                statements,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "build finished"
            );
        }
        Err(Stop::Failed(err)) => {
            shutdown(&mut queue).await;
            warn!(kind = label, error = %err, "build failed");
            let _ = out.send(Err(err)).await;
        }
        Err(Stop::Cancelled) => {
            shutdown(&mut queue).await;
            debug!(kind = label, "output dropped, build cancelled");
        }
    }
}

/// Walk branches, fields and files in order, spawning one task per file.
async fn produce<K: BundleKind>(
    kind: Arc<K>,
    branches: Vec<Arc<Branch>>,
    env: Arc<BuildEnv>,
    halt: Arc<Halt>,
    limiter: Option<Arc<Semaphore>>,
    queue: mpsc::Sender<Task>,
) {
    let mut names = NameRegistry::seeded(&branches);

    for branch in &branches {
        if halt.is_halted() {
            return;
        }
        let manifest = match env.extractor.manifest(branch).await {
            Ok(manifest) => manifest,
            Err(err) => {
                halt.trip(err);
                return;
            }
        };
        if !kind.resolve_branch(&manifest) {
            debug!(branch = %manifest.name, "nothing to dispatch");
            continue;
        }

        let mut entries = manifest.entries();
        kind.prepare(&mut entries, &mut names, &env.context);

        for file in entries {
            let permit = match &limiter {
                Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };
            if halt.is_halted() {
                return;
            }
            let task = tokio::spawn(process(
                Arc::clone(&kind),
                Arc::clone(&env),
                Arc::clone(&halt),
                file,
                permit,
            ));
            if let Err(mpsc::error::SendError(task)) = queue.send(task).await {
                task.abort();
                return;
            }
        }
    }
}

/// Trips the halt when a task unwinds.
struct PanicTrip<'a> {
    halt: &'a Halt,
    file: String,
}

impl Drop for PanicTrip<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.halt.trip(BuildError::task(format!("task for \"{}\" panicked", self.file)));
        }
    }
}

/// Run one file through its field's chain and the terminal step.
async fn process<K: BundleKind>(
    kind: Arc<K>,
    env: Arc<BuildEnv>,
    halt: Arc<Halt>,
    mut file: FileEntry,
    _permit: Option<OwnedSemaphorePermit>,
) -> Result<Option<String>, BuildError> {
    let _trip = PanicTrip { halt: &halt, file: file.name.clone() };
    let result = match env.middleware.run(&mut file, &env.context).await {
        Ok(()) => kind.append(file, &env).await,
        Err(err) => Err(err),
    };
    if let Err(err) = &result {
        halt.trip(err.clone());
    }
    result
}

/// Forward task results in submission order; returns the statement count.
async fn consume(
    queue: &mut mpsc::Receiver<Task>,
    failures: &mut mpsc::Receiver<BuildError>,
    halt: &Halt,
    out: &StreamSender,
) -> Result<usize, Stop> {
    let mut statements = 0;
    loop {
        let next = tokio::select! {
            biased;
            Some(err) = failures.recv() => return Err(Stop::Failed(err)),
            next = queue.recv() => next,
        };
        let Some(mut task) = next else {
            return Ok(statements);
        };

        let joined = tokio::select! {
            biased;
            Some(err) = failures.recv() => {
                task.abort();
                return Err(Stop::Failed(err));
            }
            joined = &mut task => joined,
        };

        let text = match joined {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => continue,
            Ok(Err(err)) => {
                halt.trip(err);
                continue;
            }
            Err(err) => {
                halt.trip(BuildError::task(err.to_string()));
                continue;
            }
        };

        let sent = tokio::select! {
            biased;
            Some(err) = failures.recv() => return Err(Stop::Failed(err)),
            sent = out.send(Ok(text)) => sent,
        };
        if sent.is_err() {
            halt.stop();
            return Err(Stop::Cancelled);
        }
        statements += 1;
    }
}

/// Close the queue and abort every task still in it.
async fn shutdown(queue: &mut mpsc::Receiver<Task>) {
    queue.close();
    while let Some(task) = queue.recv().await {
        task.abort();
    }
}
