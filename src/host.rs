//! The real-time host: module graph, routing and the per-period cycle.

use crate::injector::PacketInjector;
use crate::Result;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::time::Duration;
use tjost_core::{
    pipe, Arc, Destination, Diagnostic, DiagnosticHub, DiagnosticSender, Event, EventHandle,
    EventInspector, EventQueue, FrameTimeline, MediaClock, Module, ModuleId, PayloadPool,
    PipeConsumer, PipeSignal, ProcessContext, QueueFull, SchedulerConfig, SharedTimeline,
    StatsSnapshot, Timestamper,
};
use tjost_osc::{Argument, UnrollMode};

/// Who receives an event.
///
/// [`Destination::Broadcast`] reaches every top-level module;
/// [`Destination::Module`] reaches every child connected under that module.
#[derive(Debug, Clone, Default)]
pub struct Routing {
    top_level: Vec<ModuleId>,
    children: HashMap<ModuleId, Vec<ModuleId>>,
}

impl Routing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_top_level(&mut self, id: ModuleId) {
        if !self.top_level.contains(&id) {
            self.top_level.push(id);
        }
    }

    pub fn connect(&mut self, parent: ModuleId, child: ModuleId) {
        let children = self.children.entry(parent).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    pub fn disconnect(&mut self, parent: ModuleId, child: ModuleId) -> bool {
        let Some(children) = self.children.get_mut(&parent) else {
            return false;
        };
        let before = children.len();
        children.retain(|&c| c != child);
        children.len() != before
    }

    /// Forget `id` as a top-level module, as a parent and as a child.
    pub fn remove(&mut self, id: ModuleId) {
        self.top_level.retain(|&m| m != id);
        self.children.remove(&id);
        for children in self.children.values_mut() {
            children.retain(|&c| c != id);
        }
    }

    #[inline]
    pub fn targets(&self, destination: Destination) -> &[ModuleId] {
        match destination {
            Destination::Broadcast => &self.top_level,
            Destination::Module(id) => self.children.get(&id).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn is_top_level(&self, id: ModuleId) -> bool {
        self.top_level.contains(&id)
    }
}

type ModuleSlots = Vec<Option<Box<dyn Module>>>;

/// Owns the modules, the event queue and the payload pool, and runs one cycle per
/// audio period.
///
/// [`process`](Self::process) is real-time safe once the pool is warm: it neither
/// blocks, logs nor allocates. Everything else is setup-time API.
pub struct Host {
    modules: ModuleSlots,
    routing: Routing,
    queue: EventQueue,
    pool: PayloadPool,
    inbound: Vec<PipeConsumer>,
    inbound_signal: Arc<PipeSignal>,
    timestamper: Timestamper,
    timeline: Arc<SharedTimeline>,
    media_clock: Arc<dyn MediaClock>,
    diagnostics: DiagnosticSender,
    hub: Arc<DiagnosticHub>,
    inspector: Option<Box<dyn EventInspector>>,
    config: SchedulerConfig,
    sample_rate: f64,
    period: usize,
    frame: u64,
}

pub(crate) struct HostParts {
    pub config: SchedulerConfig,
    pub sample_rate: f64,
    pub period: usize,
    pub pool: PayloadPool,
    pub timestamper: Timestamper,
    pub media_clock: Arc<dyn MediaClock>,
    pub hub: Arc<DiagnosticHub>,
    pub inspector: Option<Box<dyn EventInspector>>,
}

impl Host {
    pub(crate) fn from_parts(parts: HostParts) -> Self {
        let HostParts {
            config,
            sample_rate,
            period,
            pool,
            timestamper,
            media_clock,
            hub,
            inspector,
        } = parts;
        let timeline = Arc::clone(timestamper.timeline());
        Self {
            modules: Vec::new(),
            routing: Routing::new(),
            queue: EventQueue::with_capacity(config.queue_capacity),
            pool,
            inbound: Vec::new(),
            inbound_signal: Arc::new(PipeSignal::new()),
            timestamper,
            timeline,
            media_clock,
            diagnostics: hub.sender("host"),
            hub,
            inspector,
            config,
            sample_rate,
            period,
            frame: 0,
        }
    }

    /// Run one period of `frames` frames.
    ///
    /// Publishes the frame timeline, lets modules schedule input, moves inbound pipe
    /// records into the queue, drains the queue with fan-out, lets modules emit
    /// output, then advances the frame counter. Returns the number of events
    /// dispatched.
    pub fn process(&mut self, frames: usize) -> usize {
        let Self {
            modules,
            routing,
            queue,
            pool,
            inbound,
            timestamper,
            timeline,
            media_clock,
            diagnostics,
            inspector,
            sample_rate,
            frame,
            ..
        } = self;
        let current = *frame;
        timeline.store(FrameTimeline {
            frame: current,
            media_us: media_clock.now_micros(),
            sample_rate: *sample_rate,
        });

        {
            let mut ctx = ProcessContext::new(current, frames, queue, pool, diagnostics, timestamper);
            for_each_module(modules, |id, module| {
                ctx.set_module(Some(id));
                module.process_input(&mut ctx, frames);
            });
        }

        for consumer in inbound.iter_mut() {
            transfer(consumer, queue, pool, diagnostics);
        }

        let dispatched = queue.drain(current, frames as u64, diagnostics, |event| {
            if let Some(inspector) = inspector.as_mut() {
                inspector.inspect(&event);
            }
            fan_out(routing, modules, &event);
            pool.release(event.payload);
        });

        {
            let mut ctx = ProcessContext::new(current, frames, queue, pool, diagnostics, timestamper);
            for_each_module(modules, |id, module| {
                ctx.set_module(Some(id));
                module.process_output(&mut ctx, frames);
            });
        }

        *frame = current + frames as u64;
        dispatched
    }

    /// [`process`](Self::process) with the configured period size.
    pub fn process_period(&mut self) -> usize {
        self.process(self.period)
    }

    /// Add a module that receives broadcast events.
    pub fn add_module(&mut self, module: Box<dyn Module>) -> ModuleId {
        let id = self.insert(module);
        self.routing.add_top_level(id);
        id
    }

    /// Add a module that receives events addressed to `parent`.
    pub fn add_child(&mut self, parent: ModuleId, module: Box<dyn Module>) -> Result<ModuleId> {
        self.check(parent)?;
        let id = self.insert(module);
        self.routing.connect(parent, id);
        Ok(id)
    }

    pub fn connect(&mut self, parent: ModuleId, child: ModuleId) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;
        self.routing.connect(parent, child);
        Ok(())
    }

    pub fn disconnect(&mut self, parent: ModuleId, child: ModuleId) -> bool {
        self.routing.disconnect(parent, child)
    }

    /// Tear a module down. Its pending events are freed without dispatch; returns how
    /// many there were.
    pub fn remove_module(&mut self, id: ModuleId) -> Result<usize> {
        let mut module = self
            .modules
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(tjost_core::Error::UnknownModule(id))?;
        module.teardown();
        self.routing.remove(id);

        let pool = &mut self.pool;
        let freed = self
            .queue
            .remove_destination(Destination::Module(id), |event| pool.release(event.payload));
        tracing::info!(module = module.name(), id = id.0, freed, "module removed");
        Ok(freed)
    }

    pub fn module_name(&self, id: ModuleId) -> Option<&str> {
        self.modules
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .map(|m| m.name())
    }

    pub fn module_count(&self) -> usize {
        self.modules.iter().flatten().count()
    }

    /// Validate and unroll `packet` straight into the queue as a broadcast.
    pub fn inject(&mut self, packet: &[u8], mode: UnrollMode) -> Result<usize> {
        self.inject_to(Destination::Broadcast, packet, mode)
    }

    pub fn inject_to(
        &mut self,
        destination: Destination,
        packet: &[u8],
        mode: UnrollMode,
    ) -> Result<usize> {
        Ok(self.context().inject(destination, packet, mode)?)
    }

    pub fn schedule(
        &mut self,
        destination: Destination,
        time: u64,
        payload: &[u8],
    ) -> Result<EventHandle> {
        Ok(self.context().schedule(destination, time, payload)?)
    }

    pub fn schedule_message(
        &mut self,
        destination: Destination,
        time: u64,
        path: &str,
        args: &[Argument<'_>],
    ) -> Result<EventHandle> {
        Ok(self
            .context()
            .schedule_message(destination, time, path, args)?)
    }

    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.context().cancel(handle)
    }

    /// Open a pipe into this host for an auxiliary thread.
    ///
    /// Packets the injector accepts are addressed to `destination` and picked up at
    /// the start of the next period. Every injector wakes [`wait_inbound`](Self::wait_inbound).
    pub fn injector(&mut self, destination: Destination) -> PacketInjector {
        let (producer, consumer) = pipe(
            self.config.pipe_capacity,
            Arc::clone(&self.inbound_signal),
        );
        self.inbound.push(consumer);
        let source = format!("injector-{}", self.inbound.len());
        tracing::debug!(source, ?destination, "injector opened");
        PacketInjector::new(
            producer.with_max_payload(self.config.max_payload),
            self.timestamper.clone(),
            self.hub.sender(source),
            destination,
            self.config.max_frame_len,
        )
    }

    /// Block until any injector flushes or `timeout` elapses. Returns whether woken.
    ///
    /// For drivers that run periods on demand instead of from an audio callback.
    pub fn wait_inbound(&self, timeout: Duration) -> bool {
        self.inbound_signal.wait_timeout(timeout)
    }

    /// Free every pending event without dispatch.
    pub fn clear(&mut self) -> usize {
        let pool = &mut self.pool;
        self.queue.clear(|event| pool.release(event.payload))
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn period(&self) -> usize {
        self.period
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn timestamper(&self) -> &Timestamper {
        &self.timestamper
    }

    pub fn hub(&self) -> &Arc<DiagnosticHub> {
        &self.hub
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.hub.stats().snapshot()
    }

    fn context(&mut self) -> ProcessContext<'_> {
        ProcessContext::new(
            self.frame,
            0,
            &mut self.queue,
            &mut self.pool,
            &mut self.diagnostics,
            &self.timestamper,
        )
    }

    fn insert(&mut self, module: Box<dyn Module>) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        tracing::info!(module = module.name(), id = id.0, "module added");
        self.modules.push(Some(module));
        id
    }

    fn check(&self, id: ModuleId) -> Result<()> {
        match self.modules.get(id.0 as usize) {
            Some(Some(_)) => Ok(()),
            _ => Err(tjost_core::Error::UnknownModule(id).into()),
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        for mut module in self.modules.iter_mut().filter_map(Option::take) {
            module.teardown();
        }
        self.clear();
    }
}

fn for_each_module<F>(modules: &mut ModuleSlots, mut f: F)
where
    F: FnMut(ModuleId, &mut Box<dyn Module>),
{
    for (index, slot) in modules.iter_mut().enumerate() {
        if let Some(module) = slot {
            f(ModuleId(index as u32), module);
        }
    }
}

fn fan_out(routing: &Routing, modules: &mut ModuleSlots, event: &Event) {
    for id in routing.targets(event.destination) {
        if let Some(Some(module)) = modules.get_mut(id.0 as usize) {
            module.deliver(event.time, event.bytes());
        }
    }
}

/// Move complete pipe records into the queue.
///
/// Stops early when the pool has no buffer, leaving the record for the next period.
/// A record refused by a full queue is dropped and reported.
fn transfer(
    consumer: &mut PipeConsumer,
    queue: &mut EventQueue,
    pool: &mut PayloadPool,
    diagnostics: &mut DiagnosticSender,
) -> usize {
    let mut exhausted = None;
    let mut rejected = None;
    let moved = consumer.consume(
        |_, _, size| match pool.alloc(size) {
            Ok(buffer) => Some(buffer),
            Err(_) => {
                exhausted = Some(size);
                None
            }
        },
        |destination, time, buffer| match queue.schedule(Event::new(destination, time, buffer)) {
            Ok(_) => ControlFlow::Continue(()),
            Err(QueueFull(event)) => {
                rejected = Some(event);
                ControlFlow::Break(())
            }
        },
    );

    if let Some(size) = exhausted {
        diagnostics.send(Diagnostic::PoolExhausted { size });
    }
    match rejected {
        Some(event) => {
            diagnostics.send(Diagnostic::QueueFull {
                destination: event.destination,
                time: event.time,
            });
            pool.release(event.payload);
            moved - 1
        }
        None => moved,
    }
}
