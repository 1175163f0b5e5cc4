//! Model construction, run control and data extraction behind one handle.
//!
//! The [`Simulation`] owns a root [`ComponentSystem`] and the registry its
//! components are created from. A background run holds the system for its
//! whole duration; every other call made meanwhile fails with
//! [`AppError::Busy`] except progress, abort and message polling, which go
//! through shared handles.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};

use tl_core::Real;
use tl_kernel::{
    ComponentInfo, ComponentRegistry, ComponentSystem, Generation, KernelError, KernelResult,
    Message, MessageQueue, Progress, ProgressHandle, RunReport, SimConfig, StopHandle,
};
use tracing::info;

use crate::error::{AppError, AppResult};

/// Parameter values accepted by [`Simulation::set_parameter`].
///
/// Text may carry a unit suffix or name a system parameter; numbers are taken
/// in the parameter's SI unit.
pub trait ParameterInput {
    fn into_text(self) -> String;
}

impl ParameterInput for &str {
    fn into_text(self) -> String {
        self.to_string()
    }
}

impl ParameterInput for String {
    fn into_text(self) -> String {
        self
    }
}

impl ParameterInput for Real {
    fn into_text(self) -> String {
        format!("{self:?}")
    }
}

impl ParameterInput for i64 {
    fn into_text(self) -> String {
        self.to_string()
    }
}

impl ParameterInput for bool {
    fn into_text(self) -> String {
        self.to_string()
    }
}

pub struct Simulation {
    registry: Arc<ComponentRegistry>,
    system: Arc<Mutex<ComponentSystem>>,
    messages: MessageQueue,
    stop: StopHandle,
    progress: ProgressHandle,
}

impl Simulation {
    /// Empty model over the default component library.
    pub fn new(name: &str) -> AppResult<Self> {
        Ok(Self::with_registry(name, tl_components::default_registry()?))
    }

    pub fn with_registry(name: &str, registry: ComponentRegistry) -> Self {
        Self::from_system(ComponentSystem::new(name), registry)
    }

    /// Wrap an already built system.
    pub fn from_system(system: ComponentSystem, registry: ComponentRegistry) -> Self {
        let messages = system.messages().clone();
        let stop = system.stop_handle();
        let progress = system.progress_handle();
        Self {
            registry: Arc::new(registry),
            system: Arc::new(Mutex::new(system)),
            messages,
            stop,
            progress,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Build a detached subsystem from this registry, ready for `add_subsystem`.
    pub fn build_subsystem(
        &self,
        name: &str,
        build: impl FnOnce(&mut ComponentSystem, &ComponentRegistry) -> KernelResult<()>,
    ) -> AppResult<ComponentSystem> {
        let mut system = ComponentSystem::new(name);
        build(&mut system, &self.registry)?;
        Ok(system)
    }

    pub fn component_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.type_names().map(str::to_string).collect();
        names.sort();
        names
    }

    pub fn describe_type(&self, type_name: &str) -> AppResult<ComponentInfo> {
        Ok(self.registry.describe(type_name)?)
    }

    /// Ports and parameters of a placed component, by path.
    pub fn describe_component(&self, path: &str) -> AppResult<ComponentInfo> {
        let sys = self.lock()?;
        sys.find(path)
            .map(|c| c.describe())
            .ok_or_else(|| AppError::InvalidInput(format!("Component '{path}' not found")))
    }

    pub fn add_component(&mut self, type_name: &str, name: &str) -> AppResult<()> {
        let registry = self.registry.clone();
        self.lock()?.add_component(&registry, type_name, name)?;
        Ok(())
    }

    /// Add a component inside a nested subsystem given by path.
    pub fn add_component_in(
        &mut self,
        system: &str,
        type_name: &str,
        name: &str,
    ) -> AppResult<()> {
        let registry = self.registry.clone();
        let mut sys = self.lock()?;
        let sub = sys
            .subsystem_mut(system)
            .ok_or_else(|| AppError::InvalidInput(format!("'{system}' is not a subsystem")))?;
        sub.add_component(&registry, type_name, name)?;
        Ok(())
    }

    pub fn add_subsystem(&mut self, name: &str, system: ComponentSystem) -> AppResult<()> {
        self.lock()?.add_subsystem(name, system)?;
        Ok(())
    }

    pub fn remove_component(&mut self, name: &str) -> AppResult<()> {
        self.lock()?.remove_component(name)?;
        Ok(())
    }

    pub fn connect(
        &mut self,
        comp_a: &str,
        port_a: &str,
        comp_b: &str,
        port_b: &str,
    ) -> AppResult<()> {
        self.lock()?.connect(comp_a, port_a, comp_b, port_b)?;
        Ok(())
    }

    pub fn disconnect(&mut self, comp: &str, port: &str) -> AppResult<()> {
        self.lock()?.disconnect(comp, port)?;
        Ok(())
    }

    pub fn set_parameter(
        &mut self,
        component: &str,
        name: &str,
        value: impl ParameterInput,
    ) -> AppResult<()> {
        self.lock()?.set_parameter(component, name, &value.into_text())?;
        Ok(())
    }

    pub fn parameter(&self, component: &str, name: &str) -> AppResult<String> {
        Ok(self.lock()?.parameter(component, name)?)
    }

    pub fn set_system_parameter(
        &mut self,
        name: &str,
        value: impl ParameterInput,
    ) -> AppResult<()> {
        self.lock()?.set_system_parameter(name, &value.into_text())?;
        Ok(())
    }

    /// Apply `comp.param=value` assignments; the last `.` separates the parameter.
    pub fn apply_assignments<'a>(
        &mut self,
        assignments: impl IntoIterator<Item = &'a str>,
    ) -> AppResult<()> {
        for assignment in assignments {
            let (target, value) = assignment.split_once('=').ok_or_else(|| {
                AppError::InvalidInput(format!("expected comp.param=value, got '{assignment}'"))
            })?;
            let (component, name) = target.trim().rsplit_once('.').ok_or_else(|| {
                AppError::InvalidInput(format!("expected comp.param=value, got '{assignment}'"))
            })?;
            self.set_parameter(component, name, value.trim())?;
        }
        Ok(())
    }

    pub fn initialize(
        &mut self,
        start: Real,
        dt: Real,
        stop: Real,
        config: &SimConfig,
    ) -> AppResult<()> {
        self.lock()?.initialize(start, dt, stop, config)?;
        info!(start, dt, stop, multicore = config.multicore, "simulation initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().map(|s| s.is_initialized()).unwrap_or(true)
    }

    /// Run to the stop time on the calling thread.
    pub fn simulate(&mut self) -> AppResult<RunReport> {
        let report = self.lock()?.simulate()?;
        info!(%report.status, steps = report.steps_completed, "run finished");
        Ok(report)
    }

    pub fn simulate_one_timestep(&mut self) -> AppResult<bool> {
        Ok(self.lock()?.simulate_one_timestep()?)
    }

    /// Run on a worker thread. The system is held by the worker until it ends.
    pub fn simulate_in_background(&mut self) -> AppResult<RunHandle> {
        {
            let sys = self.lock()?;
            if !sys.is_initialized() {
                return Err(KernelError::Lifecycle {
                    what: format!("'{}' must be initialized before simulating", sys.name()),
                }
                .into());
            }
        }
        let system = Arc::clone(&self.system);
        let (locked_tx, locked_rx) = mpsc::channel();
        let thread = thread::spawn(move || -> KernelResult<RunReport> {
            let mut sys = system.lock().unwrap_or_else(|e| e.into_inner());
            let _ = locked_tx.send(());
            sys.simulate()
        });
        // The worker owns the system once this returns.
        locked_rx.recv().map_err(|_| AppError::WorkerPanicked)?;
        info!("background run started");
        Ok(RunHandle {
            thread,
            stop: self.stop.clone(),
            progress: self.progress.clone(),
        })
    }

    /// Cooperative stop of the current run.
    pub fn stop(&self) {
        self.stop.request_stop();
    }

    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    pub fn finalize(&mut self) -> AppResult<()> {
        self.lock()?.finalize();
        Ok(())
    }

    pub fn generations(&self) -> AppResult<Vec<usize>> {
        Ok(self.lock()?.log_data().generation_numbers())
    }

    /// Borrow a recorded generation; `None` selects the latest.
    pub fn with_generation<R>(
        &self,
        generation: Option<usize>,
        f: impl FnOnce(&Generation) -> R,
    ) -> AppResult<R> {
        let sys = self.lock()?;
        let log = sys.log_data();
        let g = match generation {
            Some(n) => log.generation(n),
            None => log.latest(),
        };
        g.map(f).ok_or(AppError::NoData { generation })
    }

    pub fn time(&self, generation: Option<usize>) -> AppResult<Vec<Real>> {
        self.with_generation(generation, |g| g.time().to_vec())
    }

    /// Latest recorded series of `variable` on `component.port`.
    pub fn series(&self, component: &str, port: &str, variable: &str) -> AppResult<Vec<Real>> {
        self.series_in(None, component, port, variable)
    }

    pub fn series_in(
        &self,
        generation: Option<usize>,
        component: &str,
        port: &str,
        variable: &str,
    ) -> AppResult<Vec<Real>> {
        self.with_generation(generation, |g| {
            g.series(component, port, variable).map(<[Real]>::to_vec)
        })?
        .map_err(AppError::from)
    }

    /// Drain queued messages.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.drain()
    }

    pub fn subscribe(&self) -> Receiver<Message> {
        self.messages.subscribe()
    }

    /// Direct access to the system for anything the facade does not cover.
    pub fn with_system<R>(&mut self, f: impl FnOnce(&mut ComponentSystem) -> R) -> AppResult<R> {
        Ok(f(&mut *self.lock()?))
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, ComponentSystem>> {
        match self.system.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(AppError::Busy),
            Err(TryLockError::Poisoned(e)) => Ok(e.into_inner()),
        }
    }
}

/// A run executing on a worker thread.
pub struct RunHandle {
    thread: JoinHandle<KernelResult<RunReport>>,
    stop: StopHandle,
    progress: ProgressHandle,
}

impl RunHandle {
    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    /// Request a stop; the run ends at the next step boundary.
    pub fn abort(&self) {
        self.stop.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the run ends and hand back its report.
    pub fn wait(self) -> AppResult<RunReport> {
        let report = self.thread.join().map_err(|_| AppError::WorkerPanicked)??;
        info!(%report.status, steps = report.steps_completed, "background run finished");
        Ok(report)
    }
}
