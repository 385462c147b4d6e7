//! Frame scheduler: constructs every placed entity, then runs update/render
//! frames until the first fault or teardown.
//!
//! States: `Uninitialized -> Constructing -> Running -> (Faulted | Stopped)`.
//! Construction, start and every frame abort on the first fault; later
//! entities in that pass are not run and no further frame is scheduled.
//!
//! Frame requests are explicit tokens. While running there is exactly one
//! pending request; running any other token is a no-op, so a host that
//! double-fires or fires after `stop()` cannot run a frame twice.

use glam::Vec2;
use mlua::prelude::*;
use sbx_core::map::{Entity, EntityId};
use sbx_core::units::Units;
use sbx_render::{draw_error_overlay, render_frame, Canvas};
use thiserror::Error;

use crate::fault::{classify, summarize, FaultPhase, LogHost, RuntimeFault, RuntimeHost};
use crate::locator::{ChunkTraceLocator, ErrorLocator};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::world::{SoundPlay, World};
use crate::{api, loader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Constructing,
    Running,
    Faulted,
    Stopped,
}

impl SchedulerState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Constructing => "constructing",
            Self::Running => "running",
            Self::Faulted => "faulted",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Token for one scheduled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Every live entity updated and the frame was drawn.
    Rendered,
    /// An entity faulted; the run is over.
    Faulted,
    /// The request was not the pending one; nothing ran.
    Stale,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("scripting setup failed: {0}")]
    Lua(#[from] LuaError),
    #[error("runtime cannot start from state {0}")]
    AlreadyStarted(SchedulerState),
}

/// An entity as it was before its hook ran. Faults are attributed from this
/// so an entity that deletes itself and then errors is still reported.
#[derive(Debug, Clone, Copy)]
struct Subject {
    id: EntityId,
    object_index: usize,
    position: Vec2,
}

impl Subject {
    fn of(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            object_index: entity.placement.object_index,
            position: entity.placement.position(),
        }
    }
}

pub struct Runtime {
    lua: Lua,
    state: SchedulerState,
    pending: Option<FrameRequest>,
    next_request: u64,
    frames: u64,
    fault: Option<RuntimeFault>,
    reported: bool,
    host: Box<dyn RuntimeHost>,
    locator: Box<dyn ErrorLocator>,
}

impl Runtime {
    /// Validates `snapshot` and prepares a fresh scripting VM for it. No
    /// user code runs until [`Runtime::start`].
    pub fn new(snapshot: &Snapshot, units: Units) -> Result<Self, RuntimeError> {
        snapshot.validate(&units)?;
        let lua = Lua::new();
        lua.set_app_data(World::from_snapshot(snapshot, units));

        let env = lua.create_table()?;
        api::install_globals(&lua, &env)?;
        let primitives = api::create_primitives(&lua)?;
        loader::install(&lua, env, primitives)?;

        log::info!(
            "Runtime prepared: {} objects, {} placements, {} tile sprites",
            snapshot.object_sprites.len(),
            snapshot.objects.len(),
            snapshot.tile_sprites.len()
        );
        Ok(Self {
            lua,
            state: SchedulerState::Uninitialized,
            pending: None,
            next_request: 0,
            frames: 0,
            fault: None,
            reported: false,
            host: Box::new(LogHost),
            locator: Box::new(ChunkTraceLocator::for_behaviors()),
        })
    }

    pub fn with_host(mut self, host: impl RuntimeHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn with_locator(mut self, locator: impl ErrorLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn fault(&self) -> Option<&RuntimeFault> {
        self.fault.as_ref()
    }

    pub fn pending_request(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Read-only access to the world, e.g. for inspection or custom drawing.
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> Option<R> {
        self.lua.app_data_ref::<World>().map(|world| f(&world))
    }

    fn with_world_mut<R>(&self, f: impl FnOnce(&mut World) -> R) -> Option<R> {
        self.lua.app_data_mut::<World>().map(|mut world| f(&mut world))
    }

    pub fn key_down(&mut self, key: &str) {
        self.with_world_mut(|world| world.input.key_down(key));
    }

    pub fn key_up(&mut self, key: &str) {
        self.with_world_mut(|world| world.input.key_up(key));
    }

    pub fn release_all_keys(&mut self) {
        self.with_world_mut(|world| world.input.release_all());
    }

    /// Sound plays queued by scripts since the last call.
    pub fn take_played_sounds(&mut self) -> Vec<SoundPlay> {
        self.with_world_mut(|world| world.sounds.drain())
            .unwrap_or_default()
    }

    /// Constructs every placed entity in placement order, then runs each
    /// `start`. Returns the first frame request, or `None` if a fault stopped
    /// the run.
    pub fn start(&mut self, canvas: &mut dyn Canvas) -> Result<Option<FrameRequest>, RuntimeError> {
        if self.state != SchedulerState::Uninitialized {
            return Err(RuntimeError::AlreadyStarted(self.state));
        }
        self.state = SchedulerState::Constructing;

        let placed = self.subjects();
        for &subject in &placed {
            let class = match loader::class_for(&self.lua, subject.object_index) {
                Ok(class) => class,
                Err(err) => {
                    self.fail(&err, FaultPhase::Compile, subject, canvas);
                    return Ok(None);
                }
            };
            if let Err(err) = loader::construct(&self.lua, class, subject.id, subject.object_index)
            {
                self.fail(&err, FaultPhase::Construct, subject, canvas);
                return Ok(None);
            }
        }

        for &subject in &placed {
            if let Err(err) = self.call_entity_hook(subject.id, "start") {
                self.fail(&err, FaultPhase::Start, subject, canvas);
                return Ok(None);
            }
        }

        self.state = SchedulerState::Running;
        log::info!("Runtime started with {} entities", placed.len());
        Ok(Some(self.schedule()))
    }

    /// Runs one frame: `update` on every entity live at frame start, in
    /// placement order, then render and input rotation.
    pub fn run_frame(&mut self, request: FrameRequest, canvas: &mut dyn Canvas) -> FrameOutcome {
        if self.state != SchedulerState::Running || self.pending != Some(request) {
            log::debug!("Ignoring stale frame request {request:?} in state {}", self.state);
            return FrameOutcome::Stale;
        }
        self.pending = None;

        for subject in self.subjects() {
            if let Err(err) = self.call_entity_hook(subject.id, "update") {
                self.fail(&err, FaultPhase::Update, subject, canvas);
                return FrameOutcome::Faulted;
            }
        }

        self.render(canvas);
        self.with_world_mut(|world| world.input.rotate());
        self.frames += 1;
        log::trace!("Frame {} rendered", self.frames);
        self.schedule();
        FrameOutcome::Rendered
    }

    /// Cancels the pending frame. Terminal.
    pub fn stop(&mut self) {
        if self.pending.take().is_some() {
            log::info!("Runtime stopped after {} frames", self.frames);
        }
        if self.state != SchedulerState::Faulted {
            self.state = SchedulerState::Stopped;
        }
    }

    pub fn render(&self, canvas: &mut dyn Canvas) {
        self.with_world(|world| render_frame(canvas, world.frame_view()));
    }

    fn schedule(&mut self) -> FrameRequest {
        self.next_request += 1;
        let request = FrameRequest(self.next_request);
        self.pending = Some(request);
        request
    }

    /// Runs `hook` on entity `id` if it is still live. Entities deleted
    /// earlier in the pass are skipped.
    fn call_entity_hook(&self, id: EntityId, hook: &str) -> LuaResult<()> {
        match loader::instance(&self.lua, id)? {
            Some(instance) => loader::call_hook(&instance, hook),
            None => Ok(()),
        }
    }

    /// Live entities in placement order.
    fn subjects(&self) -> Vec<Subject> {
        self.with_world(|world| world.map.entities().iter().map(Subject::of).collect())
            .unwrap_or_default()
    }

    /// Records the fault for `subject`. The position is the entity's current
    /// one, or where it stood before the hook if it no longer exists.
    fn fail(&mut self, err: &LuaError, phase: FaultPhase, subject: Subject, canvas: &mut dyn Canvas) {
        let message = err.to_string();
        let object_index = subject.object_index;
        let position = self
            .with_world(|world| world.map.entity(subject.id).map(|e| e.placement.position()))
            .flatten()
            .unwrap_or(subject.position);
        let fault = RuntimeFault {
            kind: classify(err),
            phase,
            object_index,
            entity_id: Some(subject.id),
            position: Some(position),
            summary: summarize(err),
            location: self.locator.locate(&message),
            message,
        };

        log::error!("Object {object_index} faulted during {}: {}", phase.label(), fault.message);
        self.state = SchedulerState::Faulted;
        self.pending = None;
        draw_error_overlay(canvas, &fault.overlay_lines());
        if !self.reported {
            self.reported = true;
            self.host.on_error(&fault);
        }
        self.fault = Some(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{FaultKind, SourceLocation};
    use sbx_core::map::{Placement, TileMap, EMPTY_TILE};
    use sbx_core::sprite::{Palette, Sprite};
    use sbx_render::{DisplayList, DrawCommand};
    use std::sync::{Arc, Mutex};

    fn units() -> Units {
        Units {
            map_pixels: 64,
            map_sprites: 4,
            sprite_squares: 2,
        }
    }

    fn snapshot(codes: &[&str], objects: Vec<Placement>) -> Snapshot {
        Snapshot {
            colors: Palette::new(vec!["#000".into(), "#fff".into()]),
            codes: codes.iter().map(|c| c.to_string()).collect(),
            object_sprites: vec![Sprite::filled(2, 1); codes.len()],
            tile_sprites: vec![Sprite::filled(2, 0)],
            objects,
            tiles: TileMap::filled(4, EMPTY_TILE),
        }
    }

    fn canvas() -> DisplayList {
        DisplayList::new(64, 64)
    }

    type Faults = Arc<Mutex<Vec<RuntimeFault>>>;

    fn recording_runtime(snapshot: &Snapshot) -> (Runtime, Faults) {
        let faults: Faults = Arc::default();
        let sink = Arc::clone(&faults);
        let runtime = Runtime::new(snapshot, units())
            .expect("runtime")
            .with_host(move |fault: &RuntimeFault| sink.lock().expect("lock").push(fault.clone()));
        (runtime, faults)
    }

    /// Writes `name` into the `last` text overlay on every update.
    fn logging_code(name: &str) -> String {
        format!(
            "local C = GameObject:extend()\n\
             function C:update()\n\
             \x20 addText(\"{name}\", 0, 0, {{ id = \"last\" }})\n\
             end\n\
             return C"
        )
    }

    #[test]
    fn runs_frames_until_stopped() {
        let snap = snapshot(
            &["local C = GameObject:extend()\nfunction C:update() self:moveTiles(1, 0) end\nreturn C"],
            vec![Placement::new(0, 0.0, 0.0)],
        );
        let (mut runtime, faults) = recording_runtime(&snap);
        let mut canvas = canvas();
        assert_eq!(runtime.state(), SchedulerState::Uninitialized);

        let first = runtime.start(&mut canvas).expect("start").expect("first request");
        assert_eq!(runtime.state(), SchedulerState::Running);
        assert_eq!(runtime.run_frame(first, &mut canvas), FrameOutcome::Rendered);
        // Same token again is stale.
        assert_eq!(runtime.run_frame(first, &mut canvas), FrameOutcome::Stale);

        let second = runtime.pending_request().expect("next frame scheduled");
        assert_eq!(runtime.run_frame(second, &mut canvas), FrameOutcome::Rendered);
        let x = runtime
            .with_world(|world| world.map.placements()[0].x)
            .expect("world");
        assert_eq!(x, 4.0, "two frames of moveTiles(1, 0) with 2-square sprites");

        runtime.stop();
        assert_eq!(runtime.state(), SchedulerState::Stopped);
        let third = runtime.pending_request();
        assert!(third.is_none());
        assert_eq!(runtime.run_frame(second, &mut canvas), FrameOutcome::Stale);
        assert_eq!(runtime.frame_count(), 2);
        assert!(faults.lock().expect("lock").is_empty());
    }

    #[test]
    fn update_fault_stops_later_entities() {
        let faulty = "local C = GameObject:extend()\n\
                      function C:update()\n\
                      \x20 error(\"boom\")\n\
                      end\n\
                      return C";
        let snap = snapshot(
            &[&logging_code("a"), faulty, &logging_code("c")],
            vec![
                Placement::new(0, 0.0, 0.0),
                Placement::new(1, 2.0, 0.0),
                Placement::new(2, 4.0, 0.0),
            ],
        );
        let (mut runtime, faults) = recording_runtime(&snap);
        let mut canvas = canvas();
        let request = runtime.start(&mut canvas).expect("start").expect("request");

        assert_eq!(runtime.run_frame(request, &mut canvas), FrameOutcome::Faulted);
        assert_eq!(runtime.state(), SchedulerState::Faulted);
        assert!(runtime.pending_request().is_none(), "no frame after a fault");

        // A ran, C never did.
        let last = runtime
            .with_world(|world| world.texts.get("last").map(|t| t.text.clone()))
            .flatten();
        assert_eq!(last.as_deref(), Some("a"));

        let faults = faults.lock().expect("lock");
        assert_eq!(faults.len(), 1);
        let fault = &faults[0];
        assert_eq!(fault.kind, FaultKind::Lifecycle);
        assert_eq!(fault.phase, FaultPhase::Update);
        assert_eq!(fault.object_index, 1);
        assert_eq!(fault.entity_id, Some(EntityId(1)));
        assert_eq!(fault.summary, "boom");
        assert_eq!(fault.location, Some(SourceLocation { row: 3, col: None }));
        assert_eq!(fault.position, Some(glam::Vec2::new(2.0, 0.0)));

        // Overlay drawn over the canvas.
        let texts: Vec<&str> = canvas.texts().collect();
        assert_eq!(texts, vec!["Object 1 (line 3):", "boom"]);
    }

    #[test]
    fn fault_is_reported_once() {
        let snap = snapshot(
            &["local C = GameObject:extend()\nfunction C:update() error('x') end\nreturn C"],
            vec![Placement::new(0, 0.0, 0.0)],
        );
        let (mut runtime, faults) = recording_runtime(&snap);
        let mut canvas = canvas();
        let request = runtime.start(&mut canvas).expect("start").expect("request");
        assert_eq!(runtime.run_frame(request, &mut canvas), FrameOutcome::Faulted);
        assert_eq!(runtime.run_frame(request, &mut canvas), FrameOutcome::Stale);
        runtime.stop();
        assert_eq!(runtime.state(), SchedulerState::Faulted);
        assert_eq!(faults.lock().expect("lock").len(), 1);
    }

    #[test]
    fn compile_error_aborts_construction() {
        let snap = snapshot(
            &["return GameObject:extend()", "local C = \nreturn C +"],
            vec![Placement::new(0, 0.0, 0.0), Placement::new(1, 0.0, 0.0)],
        );
        let (mut runtime, faults) = recording_runtime(&snap);
        let mut canvas = canvas();
        assert!(runtime.start(&mut canvas).expect("start").is_none());
        assert_eq!(runtime.state(), SchedulerState::Faulted);
        let fault = runtime.fault().expect("fault recorded");
        assert_eq!(fault.kind, FaultKind::Compile);
        assert_eq!(fault.phase, FaultPhase::Compile);
        assert_eq!(fault.object_index, 1);
        assert!(fault.location.is_some(), "syntax errors carry a row: {}", fault.message);
        assert_eq!(faults.lock().expect("lock").len(), 1);
    }

    #[test]
    fn init_runs_for_all_before_any_start() {
        let code = "local C = GameObject:extend()\n\
                    function C:init() addText('phase', 0, 0, { id = 'init' .. self.id }) end\n\
                    function C:start()\n\
                    \x20 if getObject(1) == nil then error('entity 1 not constructed before start') end\n\
                    end\n\
                    return C";
        let snap = snapshot(
            &[code],
            vec![Placement::new(0, 0.0, 0.0), Placement::new(0, 2.0, 2.0)],
        );
        let (mut runtime, faults) = recording_runtime(&snap);
        let mut canvas = canvas();
        assert!(runtime.start(&mut canvas).expect("start").is_some());
        assert!(faults.lock().expect("lock").is_empty());
        let count = runtime.with_world(|world| world.texts.len()).expect("world");
        assert_eq!(count, 2);
    }

    #[test]
    fn start_fault_is_attributed_to_its_entity() {
        let snap = snapshot(
            &[
                "return GameObject:extend()",
                "local C = GameObject:extend()\nfunction C:start() playSound('missing') end\nreturn C",
            ],
            vec![Placement::new(0, 0.0, 0.0), Placement::new(1, 6.0, 6.0)],
        );
        let (mut runtime, _faults) = recording_runtime(&snap);
        let mut canvas = canvas();
        assert!(runtime.start(&mut canvas).expect("start").is_none());
        let fault = runtime.fault().expect("fault");
        assert_eq!(fault.kind, FaultKind::Resource);
        assert_eq!(fault.phase, FaultPhase::Start);
        assert_eq!(fault.entity_id, Some(EntityId(1)));
        assert_eq!(fault.summary, "missing is not a sound");
    }

    #[test]
    fn start_twice_is_an_error() {
        let snap = snapshot(&["return GameObject:extend()"], vec![]);
        let (mut runtime, _) = recording_runtime(&snap);
        let mut canvas = canvas();
        runtime.start(&mut canvas).expect("start");
        assert!(matches!(
            runtime.start(&mut canvas),
            Err(RuntimeError::AlreadyStarted(SchedulerState::Running))
        ));
    }

    #[test]
    fn invalid_snapshot_is_rejected_before_any_script_runs() {
        let mut snap = snapshot(&["return GameObject:extend()"], vec![]);
        snap.codes.clear();
        assert!(matches!(
            Runtime::new(&snap, units()),
            Err(RuntimeError::Snapshot(_))
        ));
    }

    #[test]
    fn frame_renders_world_after_updates() {
        let snap = snapshot(
            &["return GameObject:extend()"],
            vec![Placement::new(0, 2.0, 0.0)],
        );
        let (mut runtime, _) = recording_runtime(&snap);
        let mut canvas = canvas();
        let request = runtime.start(&mut canvas).expect("start").expect("request");
        runtime.run_frame(request, &mut canvas);
        assert_eq!(canvas.commands()[0], DrawCommand::Clear);
        // 2x2 sprite of 8px squares at square (2, 0).
        assert_eq!(canvas.rect_count(), 4);
        assert!(matches!(
            canvas.commands()[1],
            DrawCommand::FillRect { x, y, .. } if x == 16.0 && y == 0.0
        ));
    }

    #[test]
    fn two_runtimes_do_not_share_state() {
        let code = "local C = GameObject:extend()\nfunction C:update() self:move('right') end\nreturn C";
        let snap = snapshot(&[code], vec![Placement::new(0, 0.0, 0.0)]);
        let (mut a, _) = recording_runtime(&snap);
        let (mut b, _) = recording_runtime(&snap);
        let mut canvas = canvas();
        let ra = a.start(&mut canvas).expect("start a").expect("request a");
        b.start(&mut canvas).expect("start b");
        a.run_frame(ra, &mut canvas);

        let xa = a.with_world(|w| w.map.placements()[0].x).expect("a");
        let xb = b.with_world(|w| w.map.placements()[0].x).expect("b");
        assert_eq!((xa, xb), (2.0, 0.0));
    }

    #[test]
    fn self_deleting_entity_is_still_blamed_for_its_fault() {
        let quiet = "return GameObject:extend()";
        let doomed = "local C = GameObject:extend()\n\
                      function C:update() deleteObject(self.id); error('after delete') end\n\
                      return C";
        let snap = snapshot(
            &[quiet, doomed],
            vec![Placement::new(0, 0.0, 0.0), Placement::new(1, 2.0, 4.0)],
        );
        let (mut runtime, faults) = recording_runtime(&snap);
        let mut canvas = canvas();
        let request = runtime.start(&mut canvas).expect("start").expect("request");
        assert_eq!(runtime.run_frame(request, &mut canvas), FrameOutcome::Faulted);

        let faults = faults.lock().expect("lock");
        assert_eq!(faults.len(), 1);
        let fault = &faults[0];
        assert_eq!(fault.object_index, 1, "fault belongs to the entity that raised it");
        assert_eq!(fault.entity_id, Some(EntityId(1)));
        assert_eq!(fault.position, Some(glam::Vec2::new(2.0, 4.0)), "last known position");
        assert_eq!(fault.summary, "after delete");
        assert_eq!(fault.header(), "Object 1 (line 2):");
        let live = runtime.with_world(|world| world.map.ids()).expect("world");
        assert_eq!(live, vec![EntityId(0)]);
    }

    #[test]
    fn fault_rows_match_user_lines() {
        let cases = [
            ("error('early')\nreturn GameObject:extend()", 1),
            (
                "local C = GameObject:extend()\n\
                 function C:update()\n\
                 \x20 local ok = true\n\
                 \x20 error('late')\n\
                 end\n\
                 return C",
                4,
            ),
        ];
        for (code, row) in cases {
            let snap = snapshot(&[code], vec![Placement::new(0, 0.0, 0.0)]);
            let (mut runtime, faults) = recording_runtime(&snap);
            let mut canvas = canvas();
            if let Some(request) = runtime.start(&mut canvas).expect("start") {
                assert_eq!(runtime.run_frame(request, &mut canvas), FrameOutcome::Faulted);
            }
            let faults = faults.lock().expect("lock");
            assert_eq!(faults.len(), 1);
            assert_eq!(
                faults[0].location.map(|l| l.row),
                Some(row),
                "error on user line {row}: {}",
                faults[0].message
            );
        }
    }

    #[test]
    fn serialized_snapshot_reproduces_first_frame() {
        let code = "local C = GameObject:extend()\n\
                    function C:start() addText('hi', 1, 1, { id = 'greeting' }) end\n\
                    return C";
        let mut tiles = TileMap::filled(4, EMPTY_TILE);
        tiles.set(1, 1, 0);
        let snap = Snapshot {
            tiles,
            ..snapshot(&[code, code], vec![Placement::new(0, 1.0, 2.0), Placement::new(1, 3.0, 3.0)])
        };
        let restored = Snapshot::from_json(&snap.to_json().expect("serialize")).expect("parse");

        let first_frame = |snapshot: &Snapshot| {
            let mut runtime = Runtime::new(snapshot, units()).expect("runtime");
            let mut canvas = canvas();
            let request = runtime.start(&mut canvas).expect("start").expect("request");
            assert_eq!(runtime.run_frame(request, &mut canvas), FrameOutcome::Rendered);
            canvas.commands().to_vec()
        };
        let first = first_frame(&snap);
        assert!(first.len() > 3, "tiles, entities and text were drawn");
        assert_eq!(first, first_frame(&restored));
    }
}
