//! Process lifecycle.
//!
//! [`LifecycleCoordinator`] runs the bootstrap sequence, owns the single
//! instance guard and the run's temp directory, and performs the ordered
//! cleanup exactly once no matter how the process ends: normal close,
//! `terminate`, a panic, or a termination signal.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use crate::core::error::{BootError, BootResult, FATAL_THRESHOLD};
use crate::core::instance::SingleInstanceGuard;
use crate::core::workspace::{WorkspaceLayout, WorkspaceManager};
use crate::native::{NativeLibraryProvisioner, NativeLoader};
use crate::resources::{ClasspathIndex, ResourceCatalog};
use crate::util::context::RuntimeContext;

/// Sink for user-visible progress messages during startup.
pub trait ProgressReporter: Send + Sync {
    /// A new top-level action.
    fn action(&self, msg: &str);

    /// A detail within the current action.
    fn step(&self, msg: &str);
}

/// Reporter that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn action(&self, _msg: &str) {}
    fn step(&self, _msg: &str) {}
}

/// When a subsystem is closed. Phases run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CleanupPhase {
    /// Transient UI state
    Overlays,
    /// Settings that must be persisted
    Settings,
    /// Open devices and connections
    Devices,
}

impl CleanupPhase {
    const ALL: [CleanupPhase; 3] = [
        CleanupPhase::Overlays,
        CleanupPhase::Settings,
        CleanupPhase::Devices,
    ];
}

/// A component with state to tear down at exit.
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;

    fn phase(&self) -> CleanupPhase;

    /// Errors are logged; cleanup of later subsystems continues.
    fn cleanup(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    NotStarted = 0,
    Initializing = 1,
    Ready = 2,
    CleaningUp = 3,
    Terminated = 4,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::NotStarted,
            1 => LifecycleState::Initializing,
            2 => LifecycleState::Ready,
            3 => LifecycleState::CleaningUp,
            _ => LifecycleState::Terminated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Headless run: skips the single-instance guard.
    pub batch: bool,
    /// Permit concurrent interactive instances.
    pub allow_multiple: bool,
}

pub struct LifecycleCoordinator {
    context: RuntimeContext,
    reporter: Arc<dyn ProgressReporter>,
    state: AtomicU8,
    closed: AtomicBool,
    workspace: Mutex<WorkspaceManager>,
    guard: Mutex<SingleInstanceGuard>,
    natives: NativeLibraryProvisioner,
    classpath: Mutex<ClasspathIndex>,
    subsystems: Mutex<Vec<Arc<dyn Subsystem>>>,
}

impl LifecycleCoordinator {
    /// Coordinator for `context`. Nothing touches the disk until [`start`](Self::start).
    pub fn new(
        context: RuntimeContext,
        reporter: Arc<dyn ProgressReporter>,
        loader: Box<dyn NativeLoader>,
    ) -> Arc<Self> {
        let bundle = context
            .bundle()
            .and_then(|path| match ResourceCatalog::open(path) {
                Ok(catalog) => Some(catalog),
                Err(e) => {
                    tracing::warn!("native bundle unusable: {}", e);
                    None
                }
            });
        let natives = NativeLibraryProvisioner::new(context.export_layout(), bundle, loader);

        Arc::new(LifecycleCoordinator {
            workspace: Mutex::new(WorkspaceManager::new(
                context.temp_root(),
                context.data_root(),
            )),
            guard: Mutex::new(SingleInstanceGuard::new(context.lock_path())),
            classpath: Mutex::new(context.classpath()),
            natives,
            reporter,
            context,
            state: AtomicU8::new(LifecycleState::NotStarted as u8),
            closed: AtomicBool::new(false),
            subsystems: Mutex::new(Vec::new()),
        })
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn natives(&self) -> &NativeLibraryProvisioner {
        &self.natives
    }

    /// Run `f` with exclusive access to the location index.
    pub fn with_classpath<R>(&self, f: impl FnOnce(&mut ClasspathIndex) -> R) -> R {
        f(&mut lock(&self.classpath))
    }

    /// Layout of the prepared workspace, once started.
    pub fn layout(&self) -> Option<WorkspaceLayout> {
        lock(&self.workspace).layout().cloned()
    }

    /// Bootstrap: prepare the workspace, sweep leftovers, then claim the
    /// single-instance lock unless the run is batch or multi-instance.
    ///
    /// On `AlreadyRunning` this run's own artifacts are cleaned up before
    /// the error is returned.
    pub fn start(&self, options: StartOptions) -> BootResult<WorkspaceLayout> {
        let started = self.state.compare_exchange(
            LifecycleState::NotStarted as u8,
            LifecycleState::Initializing as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if let Err(current) = started {
            let refused = |message: &str| BootError::Fatal {
                code: FATAL_THRESHOLD,
                message: message.to_string(),
            };
            return match LifecycleState::from_u8(current) {
                LifecycleState::Ready => self.layout().ok_or_else(|| refused("workspace missing")),
                LifecycleState::NotStarted | LifecycleState::Initializing => {
                    Err(refused("start already in progress"))
                }
                LifecycleState::CleaningUp | LifecycleState::Terminated => {
                    Err(refused("start called after close"))
                }
            };
        }

        self.reporter.action("Starting");
        tracing::info!(
            version = self.context.platform().app_version,
            os = %self.context.platform().describe(),
            "starting {}",
            self.context.run_type()
        );

        self.reporter.step("checking temp folder");
        let layout = {
            let mut workspace = lock(&self.workspace);
            let layout = workspace.prepare_temp_workspace()?;
            let max_age = Duration::from_secs(self.context.config().workspace.obsolete_after_secs);
            let swept = workspace.sweep_obsolete(max_age);
            if !swept.removed.is_empty() {
                tracing::info!(removed = swept.removed.len(), "removed obsolete temp folders");
            }
            layout
        };

        let single = !(options.batch
            || options.allow_multiple
            || self.context.config().instance.allow_multiple);
        if single {
            self.reporter.step("checking for another instance");
            let acquired = lock(&self.guard).acquire();
            if let Err(e) = acquired {
                self.close();
                return Err(e);
            }
        }

        let _ = self.state.compare_exchange(
            LifecycleState::Initializing as u8,
            LifecycleState::Ready as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        tracing::debug!(temp = %layout.process_temp_dir.display(), "ready");
        Ok(layout)
    }

    /// Add a subsystem to the cleanup sequence.
    pub fn register(&self, subsystem: Arc<dyn Subsystem>) {
        tracing::debug!(name = subsystem.name(), phase = ?subsystem.phase(), "registered");
        lock(&self.subsystems).push(subsystem);
    }

    /// Export and load a bundled native library.
    pub fn ensure_loaded(&self, name: &str) -> BootResult<bool> {
        self.reporter.step(&format!("loading {}", name));
        self.natives.ensure_loaded(name)
    }

    /// Close overlays and flush settings without tearing anything down.
    pub fn reset_transient(&self) {
        let subsystems = lock(&self.subsystems).clone();
        for phase in [CleanupPhase::Overlays, CleanupPhase::Settings] {
            run_phase(&subsystems, phase);
        }
    }

    /// Ordered cleanup. Only the first call does any work.
    pub fn close(&self) {
        self.cleanup(true);
    }

    fn cleanup(&self, blocking: bool) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.state
            .store(LifecycleState::CleaningUp as u8, Ordering::SeqCst);
        tracing::debug!("cleaning up");

        let subsystems = grab(&self.subsystems, blocking).map(|list| list.to_vec());
        if let Some(subsystems) = subsystems {
            for phase in CleanupPhase::ALL {
                run_phase(&subsystems, phase);
            }
        }
        if let Some(mut guard) = grab(&self.guard, blocking) {
            guard.release();
        }
        if let Some(mut workspace) = grab(&self.workspace, blocking) {
            workspace.remove_own();
            let max_age = Duration::from_secs(self.context.config().workspace.obsolete_after_secs);
            workspace.sweep_obsolete(max_age);
        }

        self.state
            .store(LifecycleState::Terminated as u8, Ordering::SeqCst);
        tracing::debug!("cleanup finished");
    }

    /// End the run. Codes below the fatal threshold clean up and exit the
    /// process; codes at or above it are returned as [`BootError::Fatal`]
    /// for the caller to handle.
    pub fn terminate(&self, code: i32, message: &str) -> BootResult<()> {
        if code >= FATAL_THRESHOLD {
            tracing::error!(code, "{}", message);
            return Err(BootError::Fatal {
                code,
                message: message.to_string(),
            });
        }
        if !message.is_empty() {
            tracing::info!(code, "{}", message);
        }
        self.close();
        std::process::exit(code);
    }

    /// Run cleanup when the calling thread panics and, on unix, on SIGTERM,
    /// SIGINT, SIGQUIT and SIGHUP.
    ///
    /// Call this from the thread that owns the run. Panics on other threads
    /// can be caught by `join` and leave the run alive.
    pub fn install_shutdown_hooks(self: &Arc<Self>) -> BootResult<()> {
        self.install_panic_hook();

        #[cfg(unix)]
        self.spawn_signal_listener(Arc::downgrade(self))?;
        Ok(())
    }

    fn install_panic_hook(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let owner = std::thread::current().id();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if std::thread::current().id() == owner {
                if let Some(coordinator) = weak.upgrade() {
                    // The panicking thread may hold one of our locks.
                    coordinator.cleanup(false);
                }
            }
            previous(info);
        }));
    }

    #[cfg(unix)]
    fn spawn_signal_listener(&self, weak: std::sync::Weak<Self>) -> BootResult<()> {
        use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP]).map_err(|e| {
            BootError::Fatal {
                code: FATAL_THRESHOLD,
                message: format!("failed to install signal handlers: {}", e),
            }
        })?;
        std::thread::Builder::new()
            .name("runway-signals".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    tracing::info!(signal, "shutdown signal received");
                    if let Some(coordinator) = weak.upgrade() {
                        coordinator.close();
                    }
                    std::process::exit(128 + signal);
                }
            })
            .map_err(|e| BootError::Fatal {
                code: FATAL_THRESHOLD,
                message: format!("failed to start signal listener: {}", e),
            })?;
        Ok(())
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_phase(subsystems: &[Arc<dyn Subsystem>], phase: CleanupPhase) {
    for subsystem in subsystems.iter().filter(|s| s.phase() == phase) {
        if let Err(e) = subsystem.cleanup() {
            tracing::warn!(name = subsystem.name(), "cleanup failed: {:#}", e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Lock, or give up immediately when `blocking` is false and the lock is busy.
fn grab<T>(mutex: &Mutex<T>, blocking: bool) -> Option<MutexGuard<'_, T>> {
    if blocking {
        return Some(lock(mutex));
    }
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::PlatformInfo;
    use crate::test_support::{
        natives_bundle, test_config, FakeLoader, RecordingReporter, RecordingSubsystem,
    };
    use std::thread;
    use tempfile::TempDir;

    fn coordinator(tmp: &TempDir) -> Arc<LifecycleCoordinator> {
        let ctx = RuntimeContext::from_parts(test_config(tmp.path()), PlatformInfo::detect());
        LifecycleCoordinator::new(ctx, Arc::new(NullReporter), Box::new(FakeLoader::new()))
    }

    #[test]
    fn test_start_claims_lock_and_temp_dir() {
        let tmp = TempDir::new().unwrap();
        let reporter = RecordingReporter::new();
        let ctx = RuntimeContext::from_parts(test_config(tmp.path()), PlatformInfo::detect());
        let lock_path = ctx.lock_path();
        let coord = LifecycleCoordinator::new(
            ctx,
            Arc::new(reporter.clone()),
            Box::new(FakeLoader::new()),
        );

        let layout = coord.start(StartOptions::default()).unwrap();
        assert_eq!(coord.state(), LifecycleState::Ready);
        assert!(layout.process_temp_dir.is_dir());
        assert!(lock_path.exists());
        assert_eq!(reporter.messages()[0], "action: Starting");

        coord.close();
        assert_eq!(coord.state(), LifecycleState::Terminated);
        assert!(!lock_path.exists());
        assert!(!layout.process_temp_dir.exists());
    }

    #[test]
    fn test_second_instance_rejected_and_cleaned() {
        let tmp = TempDir::new().unwrap();
        let first = coordinator(&tmp);
        first.start(StartOptions::default()).unwrap();

        let second = coordinator(&tmp);
        let err = second.start(StartOptions::default()).unwrap_err();
        assert!(matches!(err, BootError::AlreadyRunning { .. }));
        assert_eq!(err.exit_code(), crate::core::error::EXIT_ALREADY_RUNNING);
        assert_eq!(second.state(), LifecycleState::Terminated);

        // Only the first run's temp folder survives
        let temp_root = tmp.path().join("temp");
        let runs: Vec<_> = std::fs::read_dir(&temp_root)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("Runway_"))
            .collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].path(), first.layout().unwrap().process_temp_dir);
    }

    #[test]
    fn test_batch_skips_lock() {
        let tmp = TempDir::new().unwrap();
        let first = coordinator(&tmp);
        first.start(StartOptions::default()).unwrap();

        let batch = coordinator(&tmp);
        let options = StartOptions {
            batch: true,
            ..Default::default()
        };
        assert!(batch.start(options).is_ok());

        let multi = coordinator(&tmp);
        let options = StartOptions {
            allow_multiple: true,
            ..Default::default()
        };
        assert!(multi.start(options).is_ok());
    }

    #[test]
    fn test_cleanup_order_and_once() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        let journal = Arc::new(Mutex::new(Vec::new()));
        coord.register(Arc::new(RecordingSubsystem::new(
            "camera",
            CleanupPhase::Devices,
            &journal,
        )));
        coord.register(Arc::new(
            RecordingSubsystem::new("prefs", CleanupPhase::Settings, &journal).failing(),
        ));
        coord.register(Arc::new(RecordingSubsystem::new(
            "popup",
            CleanupPhase::Overlays,
            &journal,
        )));
        coord.start(StartOptions::default()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coord = Arc::clone(&coord);
                thread::spawn(move || coord.close())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        coord.close();

        assert_eq!(*journal.lock().unwrap(), vec!["popup", "prefs", "camera"]);
    }

    #[test]
    fn test_reset_transient_keeps_devices() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        let journal = Arc::new(Mutex::new(Vec::new()));
        for (name, phase) in [
            ("popup", CleanupPhase::Overlays),
            ("prefs", CleanupPhase::Settings),
            ("camera", CleanupPhase::Devices),
        ] {
            coord.register(Arc::new(RecordingSubsystem::new(name, phase, &journal)));
        }
        coord.start(StartOptions::default()).unwrap();

        coord.reset_transient();
        assert_eq!(*journal.lock().unwrap(), vec!["popup", "prefs"]);
        assert_eq!(coord.state(), LifecycleState::Ready);
    }

    #[test]
    fn test_fatal_terminate_returns_error() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        coord.start(StartOptions::default()).unwrap();

        let err = coord.terminate(FATAL_THRESHOLD, "out of memory").unwrap_err();
        assert!(matches!(err, BootError::Fatal { code: 999, .. }));
        // Nothing was cleaned up; the caller decides
        assert_eq!(coord.state(), LifecycleState::Ready);
    }

    #[test]
    fn test_drop_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        let layout = coord.start(StartOptions::default()).unwrap();
        drop(coord);
        assert!(!layout.process_temp_dir.exists());
        assert!(!tmp.path().join("temp/runway-instance.lock").exists());
    }

    #[test]
    fn test_ensure_loaded_through_coordinator() {
        let tmp = TempDir::new().unwrap();
        let loader = FakeLoader::new();
        let mut config = test_config(tmp.path());
        let subtree = PlatformInfo::detect().natives_subtree();
        let lib = PlatformInfo::detect().family.library_file_name("zbar");
        config.natives.bundle = Some(natives_bundle(tmp.path(), &subtree, &[lib.as_str()]));
        config.natives.version = Some("3.2".into());
        let ctx = RuntimeContext::from_parts(config, PlatformInfo::detect());
        let coord = LifecycleCoordinator::new(ctx, Arc::new(NullReporter), Box::new(loader.clone()));

        coord.start(StartOptions::default()).unwrap();
        assert!(coord.ensure_loaded("zbar").unwrap());
        assert!(!coord.ensure_loaded("zbar").unwrap());
        assert_eq!(loader.count(), 1);
    }

    #[test]
    fn test_classpath_append_persists() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        let jar = tmp.path().join("plugin.jar");
        std::fs::write(&jar, "").unwrap();

        let outcome = coord.with_classpath(|cp| cp.append(&jar.display().to_string()));
        assert!(matches!(outcome, Ok(crate::resources::AppendOutcome::Deferred)));

        // A fresh index from the same context sees the pending entry
        let next = coord.context().classpath();
        assert!(next.locate("plugin.jar", true).is_some());
    }

    #[test]
    fn test_start_twice_returns_same_layout() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        let first = coord.start(StartOptions::default()).unwrap();
        let second = coord.start(StartOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_start_after_close_is_refused() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        coord.start(StartOptions::default()).unwrap();
        coord.close();

        let err = coord.start(StartOptions::default()).unwrap_err();
        assert!(err.to_string().contains("after close"), "{}", err);
    }

    #[test]
    fn test_start_while_initializing_is_refused() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        coord
            .state
            .store(LifecycleState::Initializing as u8, Ordering::SeqCst);

        let err = coord.start(StartOptions::default()).unwrap_err();
        assert!(err.to_string().contains("already in progress"), "{}", err);
        assert!(coord.layout().is_none());
    }

    #[test]
    fn test_worker_panic_leaves_run_alive() {
        let tmp = TempDir::new().unwrap();
        let coord = coordinator(&tmp);
        let layout = coord.start(StartOptions::default()).unwrap();
        coord.install_panic_hook();

        let worker = thread::spawn(|| -> u32 { panic!("worker failed") });
        assert!(worker.join().is_err());

        assert_eq!(coord.state(), LifecycleState::Ready);
        assert!(layout.process_temp_dir.is_dir());
        assert!(coord.context().lock_path().exists());
    }
}
