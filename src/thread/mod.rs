use std::fmt;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use crate::capability::{Body, Driver};
use crate::error::{Error, Result};
use crate::message::{Cancelled, Condition, Message};
use crate::registry;
use crate::slot::Slot;

mod sys;

pub const DEFAULT_STACK_SIZE: usize = 512 * 1024;

const DEFAULT_NAME: &str = "coroutine";

/// Process-unique identity of a coroutine, shared by its `Handle` and its `Coroutine`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineId(u64);

impl EngineId {
    fn next() -> EngineId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EngineId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `Phase` says which side has permission to run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    /// The body runs; the driver is blocked in `resume`, `throw_in` or `cancel`.
    BodyRuns,

    /// The driver runs; the body is blocked in `suspend`, or has not started yet.
    DriverRuns,

    /// The body has finished and must not be resumed again.
    BodyExited,
}

/// Everything the two threads share, guarded by one mutex.
struct State {
    phase: Phase,
    slot: Slot,
    name: String,
}

/// A coroutine whose body runs on a dedicated worker thread.
///
/// Implements both `Driver` and `Body`. Only ever reached through a `Handle` or a `Coroutine`.
pub(crate) struct Engine {
    id: EngineId,
    me: Weak<Engine>,
    state: Mutex<State>,
    cv: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Hand permission to run to the other side. Called with the guard held.
    fn notify_phase(&self, state: &mut State, new_phase: Phase) {
        assert!(
            state.phase != Phase::BodyExited,
            "coroutine `{}` left the exited phase",
            state.name
        );
        log::trace!(
            "coroutine {} `{}`: {:?} -> {:?}",
            self.id,
            state.name,
            state.phase,
            new_phase
        );
        state.phase = new_phase;
        self.cv.notify_all();
    }

    /// Block until the phase is one of `phases`. Spurious wakeups are absorbed by `wait_while`.
    fn wait_phases<'a>(
        &self,
        state: MutexGuard<'a, State>,
        phases: &[Phase],
    ) -> MutexGuard<'a, State> {
        self.cv
            .wait_while(state, |state| !phases.contains(&state.phase))
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver something into the body, let it run, and collect what it hands back.
    fn transfer<F>(&self, deliver: F) -> Result<Option<Message>>
    where
        F: FnOnce(&mut Slot),
    {
        let mut state = self.lock();
        match state.phase {
            Phase::DriverRuns => {}
            Phase::BodyExited => {
                return Err(Error::Exited {
                    name: state.name.clone(),
                })
            }
            Phase::BodyRuns => {
                panic!("coroutine `{}` resumed while its body is running", state.name)
            }
        }
        assert!(state.slot.is_empty(), "coroutine `{}` resumed with an occupied slot", state.name);

        deliver(&mut state.slot);
        self.notify_phase(&mut state, Phase::BodyRuns);
        let mut state = self.wait_phases(state, &[Phase::DriverRuns, Phase::BodyExited]);

        match state.slot.receive() {
            Ok(reply) => Ok(reply),
            Err(fault) => {
                log::debug!(
                    "coroutine {} `{}` faulted: {}",
                    self.id,
                    state.name,
                    fault.describe()
                );
                drop(state);
                panic::resume_unwind(fault.into_panic())
            }
        }
    }

    /// Wait for the first resume. Returns a condition if the driver threw one in instead.
    fn first_turn(&self) -> Option<Condition> {
        let state = self.lock();
        let mut state = self.wait_phases(state, &[Phase::BodyRuns]);
        registry::enter(self.me.clone());
        let first = state.slot.receive();
        let name = state.name.clone();
        drop(state);

        match first {
            Ok(None) => None,
            Ok(Some(message)) => {
                panic!("coroutine `{}` was started with a message: {}", name, message)
            }
            Err(condition) => Some(condition),
        }
    }

    /// Enter the terminal phase, passing a fault (if any) to the driver.
    fn exit(&self, fault: Option<Condition>) {
        let mut state = self.lock();
        state.slot.clear();
        if let Some(fault) = fault {
            state.slot.raise(fault);
        }
        registry::leave::<Engine>();
        log::debug!("coroutine {} `{}` exited", self.id, state.name);
        self.notify_phase(&mut state, Phase::BodyExited);
    }
}

impl Driver for Engine {
    fn resume(&self, message: Option<Message>) -> Result<Option<Message>> {
        self.transfer(|slot| slot.put(message))
    }

    fn throw_in(&self, condition: Condition) -> Result<Option<Message>> {
        self.transfer(|slot| slot.raise(condition))
    }

    fn cancel(&self) {
        if self.is_exited() {
            return;
        }
        log::debug!("coroutine {} `{}` cancelling", self.id, self.name());

        // the body must not suspend while unwinding from a cancellation
        let reply = match self.throw_in(Condition::cancellation()) {
            Ok(reply) => reply,
            Err(_) => return,
        };
        if let Some(reply) = reply {
            panic!("coroutine `{}` replied to a cancellation with {}", self.name(), reply);
        }
        assert!(
            self.is_exited(),
            "coroutine `{}` is still running after a cancellation",
            self.name()
        );
    }

    fn is_exited(&self) -> bool {
        self.lock().phase == Phase::BodyExited
    }

    fn set_name(&self, name: &str) {
        // held across the OS rename so it cannot interleave with the worker naming itself
        let mut state = self.lock();
        state.name = name.to_string();
        if let Some(thread) = lock(&self.thread).as_ref() {
            sys::set_thread_name(thread, name);
        }
    }

    fn name(&self) -> String {
        self.lock().name.clone()
    }

    fn id(&self) -> EngineId {
        self.id
    }
}

impl Body for Engine {
    fn suspend(&self, message: Option<Message>) -> Option<Message> {
        let mut state = self.lock();
        assert!(
            state.phase == Phase::BodyRuns,
            "coroutine `{}` suspended outside its body",
            state.name
        );
        state.slot.put(message);
        registry::leave::<Engine>();
        self.notify_phase(&mut state, Phase::DriverRuns);

        let mut state = self.wait_phases(state, &[Phase::BodyRuns]);
        registry::enter(self.me.clone());
        match state.slot.receive() {
            Ok(message) => message,
            Err(condition) => {
                log::trace!(
                    "coroutine {} `{}` raising {}",
                    self.id,
                    state.name,
                    condition.describe()
                );
                drop(state);
                panic::resume_unwind(condition.into_panic())
            }
        }
    }

    fn active(&self) -> Option<Coroutine> {
        active()
    }

    fn id(&self) -> EngineId {
        self.id
    }
}

/// Worker thread entry point.
fn run<F>(engine: Arc<Engine>, f: F)
where
    F: FnOnce(&mut Coroutine),
{
    // std names the thread on start-up, keeping the head of the name; replace it with ours
    sys::set_current_thread_name(&engine.lock().name);

    let mut coroutine = Coroutine {
        engine: engine.clone(),
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // a condition thrown in before the first resume means the body never starts
        if let Some(condition) = engine.first_turn() {
            panic::resume_unwind(condition.into_panic());
        }
        f(&mut coroutine);
    }));

    let fault = match outcome {
        Ok(()) => None,
        Err(payload) => {
            if payload.is::<Cancelled>() {
                None
            } else {
                Some(Condition::from_panic(payload))
            }
        }
    };
    drop(coroutine);
    engine.exit(fault);
}

/// The coroutine whose body is running on the calling thread, if any.
pub fn active() -> Option<Coroutine> {
    registry::active::<Engine>().map(|engine| Coroutine { engine })
}

/// The driver's side of a coroutine, created by `Coroutine::new` or `Builder::spawn`.
///
/// Dereferences to `dyn Driver`. The body must have exited (run to completion or been cancelled)
/// before the handle is dropped; dropping joins the worker thread.
pub struct Handle {
    engine: Arc<Engine>,
}

impl Deref for Handle {
    type Target = dyn Driver;

    fn deref(&self) -> &(dyn Driver + 'static) {
        &*self.engine
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.engine.id)
            .field("name", &Driver::name(&*self.engine))
            .finish()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !Driver::is_exited(&*self.engine) {
            let name = Driver::name(&*self.engine);
            if thread::panicking() {
                log::error!("coroutine `{}` dropped while unwinding; leaking its thread", name);
                return;
            }
            panic!("coroutine `{}` dropped before its body exited", name);
        }

        let thread = lock(&self.engine.thread).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                log::error!("coroutine {} worker thread panicked", self.engine.id);
            }
        }
    }
}

/// The body's side of a coroutine.
///
/// Dereferences to `dyn Body`. The body function receives one of these; more can be obtained from
/// inside the body with `active()`.
pub struct Coroutine {
    engine: Arc<Engine>,
}

impl Coroutine {
    /// Spawn a coroutine running `f` on a new thread named `name`.
    ///
    /// The body does not start until the first `resume`.
    pub fn new<F>(name: &str, f: F) -> Result<Handle>
    where
        F: FnOnce(&mut Coroutine) + Send + 'static,
    {
        Builder::new().name(name).spawn(f)
    }

    pub fn new_with_stack_size<F>(name: &str, stack_size: usize, f: F) -> Result<Handle>
    where
        F: FnOnce(&mut Coroutine) + Send + 'static,
    {
        Builder::new().name(name).stack_size(stack_size).spawn(f)
    }
}

impl Deref for Coroutine {
    type Target = dyn Body;

    fn deref(&self) -> &(dyn Body + 'static) {
        &*self.engine
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.engine.id)
            .field("name", &Driver::name(&*self.engine))
            .finish()
    }
}

/// Coroutine configuration, in the manner of `std::thread::Builder`.
#[derive(Debug, Clone)]
pub struct Builder {
    name: Option<String>,
    stack_size: usize,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            name: None,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Builder {
        self.name = Some(name.into());
        self
    }

    pub fn stack_size(mut self, stack_size: usize) -> Builder {
        self.stack_size = stack_size;
        self
    }

    /// Spawn the worker thread. It blocks until the first `resume`, `throw_in` or `cancel`.
    pub fn spawn<F>(self, f: F) -> Result<Handle>
    where
        F: FnOnce(&mut Coroutine) + Send + 'static,
    {
        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());
        let engine = Arc::new_cyclic(|me| Engine {
            id: EngineId::next(),
            me: me.clone(),
            state: Mutex::new(State {
                phase: Phase::DriverRuns,
                slot: Slot::new(),
                name: name.clone(),
            }),
            cv: Condvar::new(),
            thread: Mutex::new(None),
        });

        let worker = engine.clone();
        let thread = thread::Builder::new()
            .name(name.replace('\0', ""))
            .stack_size(self.stack_size)
            .spawn(move || run(worker, f))?;
        *lock(&engine.thread) = Some(thread);

        log::debug!("coroutine {} `{}` spawned", engine.id, name);
        Ok(Handle { engine })
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}
