//! Engine API exposed to behaviour scripts.
//!
//! Globals (in the behaviour environment):
//!   isKeyDown(key) / isKey(key)          -- held / pressed this frame
//!   createObject(objectIndex, x, y)      -- spawn, init, start; returns instance
//!   deleteObject(id) -> bool
//!   getObject(id) -> instance | nil
//!   getTile(x, y) -> tile | nil          -- tile coordinates
//!   setTile(x, y, tile)
//!   addText(text, x, y, {id, color, size}?) -> id
//!   removeText(id)
//!   addSound(name, url) / playSound(name)
//!   print(...)                           -- routed to the log
//!
//! Primitives (used by the `GameObject` methods, keyed by entity id):
//!   move, moveTiles, movePixels, tilePos, pixelPos
//!
//! Every callback borrows the `World` only for the duration of its own Rust
//! code; nothing holds the borrow across a call back into Lua.

use glam::Vec2;
use mlua::prelude::*;
use sbx_core::map::{is_valid_tile, EntityId, Placement};
use sbx_core::text::{TextOverlay, DEFAULT_TEXT_COLOR, DEFAULT_TEXT_SIZE};

use crate::fault::ResourceError;
use crate::loader;
use crate::world::World;

fn with_world<R>(lua: &Lua, f: impl FnOnce(&mut World) -> LuaResult<R>) -> LuaResult<R> {
    let mut world = lua
        .app_data_mut::<World>()
        .ok_or_else(|| LuaError::runtime("world is not attached"))?;
    f(&mut *world)
}

fn key_name(key: LuaValue) -> LuaResult<String> {
    match key {
        LuaValue::String(text) => {
            let text = text.to_str()?.to_string();
            if text.is_empty() {
                return Err(LuaError::runtime("Invalid key ''"));
            }
            Ok(text)
        }
        other => Err(LuaError::runtime(format!("Invalid key {}", other.type_name()))),
    }
}

fn resource(err: ResourceError) -> LuaError {
    err.into_lua_err()
}

/// Position of a live entity, or a resource fault for a deleted one.
fn placement_mut(world: &mut World, id: u64) -> LuaResult<&mut Placement> {
    world
        .map
        .placement_mut(EntityId(id))
        .ok_or_else(|| resource(ResourceError::DeletedEntity(EntityId(id))))
}

fn point_table(lua: &Lua, point: Vec2) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    table.set("x", point.x)?;
    table.set("y", point.y)?;
    Ok(table)
}

/// Spawns, constructs and starts a new entity. A failed `init` removes the
/// half-spawned placement before the error propagates.
pub fn spawn_entity(lua: &Lua, object_index: i64, x: f32, y: f32) -> LuaResult<LuaTable> {
    let index = with_world(lua, |world| {
        usize::try_from(object_index)
            .ok()
            .filter(|index| *index < world.object_count())
            .ok_or_else(|| resource(ResourceError::UnknownObject(object_index)))
    })?;
    let class = loader::class_for(lua, index)?;
    let id = with_world(lua, |world| {
        Ok(world.map.spawn(Placement::new(index, x, y)))
    })?;

    let instance = match loader::construct(lua, class, id, index) {
        Ok(instance) => instance,
        Err(err) => {
            with_world(lua, |world| {
                world.map.remove(id);
                Ok(())
            })?;
            loader::forget(lua, id)?;
            return Err(err);
        }
    };
    log::debug!("Spawned entity {id} (object {index}) at ({x}, {y})");
    loader::call_hook(&instance, "start")?;
    Ok(instance)
}

/// Fills `env` with the script-facing globals.
pub fn install_globals(lua: &Lua, env: &LuaTable) -> LuaResult<()> {
    env.set(
        "isKeyDown",
        lua.create_function(|lua, key: LuaValue| {
            let key = key_name(key)?;
            with_world(lua, |world| Ok(world.input.is_down(&key)))
        })?,
    )?;

    env.set(
        "isKey",
        lua.create_function(|lua, key: LuaValue| {
            let key = key_name(key)?;
            with_world(lua, |world| Ok(world.input.is_pressed(&key)))
        })?,
    )?;

    env.set(
        "createObject",
        lua.create_function(|lua, (object_index, x, y): (i64, f32, f32)| {
            spawn_entity(lua, object_index, x, y)
        })?,
    )?;

    env.set(
        "deleteObject",
        lua.create_function(|lua, id: u64| {
            let removed = with_world(lua, |world| Ok(world.map.remove(EntityId(id)).is_some()))?;
            if removed {
                loader::forget(lua, EntityId(id))?;
                log::debug!("Deleted entity {}", EntityId(id));
            }
            Ok(removed)
        })?,
    )?;

    env.set(
        "getObject",
        lua.create_function(|lua, id: u64| loader::instance(lua, EntityId(id)))?,
    )?;

    env.set(
        "getTile",
        lua.create_function(|lua, (x, y): (f64, f64)| {
            with_world(lua, |world| {
                Ok(world.map.tiles.get(x.floor() as i64, y.floor() as i64))
            })
        })?,
    )?;

    env.set(
        "setTile",
        lua.create_function(|lua, (x, y, tile): (f64, f64, i64)| {
            with_world(lua, |world| {
                let tile_count = world.sprites.tile_sprites.len();
                let tile = i32::try_from(tile)
                    .ok()
                    .filter(|tile| is_valid_tile(*tile, tile_count))
                    .ok_or_else(|| {
                        LuaError::runtime(format!(
                            "{tile} is not a tile ({tile_count} tile sprites)"
                        ))
                    })?;
                world
                    .map
                    .tiles
                    .set(x.floor() as i64, y.floor() as i64, tile)
                    .map(|_| ())
                    .ok_or_else(|| LuaError::runtime(format!("tile ({x}, {y}) is off the map")))
            })
        })?,
    )?;

    env.set(
        "addText",
        lua.create_function(
            |lua, (text, x, y, options): (String, f32, f32, Option<LuaTable>)| {
                let mut id = None;
                let mut color = None;
                let mut size = None;
                if let Some(options) = options {
                    id = options.get::<Option<String>>("id")?;
                    color = options.get::<Option<String>>("color")?;
                    size = options.get::<Option<f32>>("size")?;
                }
                let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let overlay = TextOverlay {
                    id: id.clone(),
                    text,
                    x,
                    y,
                    color: color.unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
                    size: size.unwrap_or(DEFAULT_TEXT_SIZE),
                };
                with_world(lua, |world| {
                    world.texts.upsert(overlay);
                    Ok(())
                })?;
                Ok(id)
            },
        )?,
    )?;

    env.set(
        "removeText",
        lua.create_function(|lua, id: String| {
            with_world(lua, |world| match world.texts.remove(&id) {
                Some(_) => Ok(()),
                None => Err(resource(ResourceError::UnknownText(id))),
            })
        })?,
    )?;

    env.set(
        "addSound",
        lua.create_function(|lua, (name, url): (String, String)| {
            with_world(lua, |world| {
                world.sounds.add(&name, &url);
                Ok(())
            })
        })?,
    )?;

    env.set(
        "playSound",
        lua.create_function(|lua, name: String| {
            with_world(lua, |world| {
                if world.sounds.play(&name) {
                    Ok(())
                } else {
                    Err(resource(ResourceError::UnknownSound(name)))
                }
            })
        })?,
    )?;

    env.set(
        "print",
        lua.create_function(|_, args: LuaMultiValue| {
            let parts = args
                .iter()
                .map(|value| value.to_string())
                .collect::<LuaResult<Vec<_>>>()?;
            log::info!("[script] {}", parts.join("\t"));
            Ok(())
        })?,
    )?;

    Ok(())
}

/// Entity-addressed primitives behind the `GameObject` movement and position
/// methods.
pub fn create_primitives(lua: &Lua) -> LuaResult<LuaTable> {
    let primitives = lua.create_table()?;

    primitives.set(
        "move",
        lua.create_function(|lua, (id, direction): (u64, String)| {
            with_world(lua, |world| {
                let step = world.units.sprite_squares as f32;
                let delta = match direction.as_str() {
                    "up" => Vec2::new(0.0, -step),
                    "down" => Vec2::new(0.0, step),
                    "left" => Vec2::new(-step, 0.0),
                    "right" => Vec2::new(step, 0.0),
                    other => {
                        return Err(LuaError::runtime(format!("Invalid direction '{other}'")))
                    }
                };
                placement_mut(world, id)?.translate(delta);
                Ok(())
            })
        })?,
    )?;

    primitives.set(
        "moveTiles",
        lua.create_function(|lua, (id, x, y): (u64, f32, f32)| {
            with_world(lua, |world| {
                let delta = world.units.tiles_to_squares(Vec2::new(x, y));
                placement_mut(world, id)?.translate(delta);
                Ok(())
            })
        })?,
    )?;

    primitives.set(
        "movePixels",
        lua.create_function(|lua, (id, x, y): (u64, f32, f32)| {
            with_world(lua, |world| {
                let delta = world.units.pixels_to_squares(Vec2::new(x, y));
                placement_mut(world, id)?.translate(delta);
                Ok(())
            })
        })?,
    )?;

    primitives.set(
        "tilePos",
        lua.create_function(|lua, id: u64| {
            let point = with_world(lua, |world| {
                let position = placement_mut(world, id)?.position();
                Ok(world.units.squares_to_tiles(position))
            })?;
            point_table(lua, point)
        })?,
    )?;

    primitives.set(
        "pixelPos",
        lua.create_function(|lua, id: u64| {
            let point = with_world(lua, |world| {
                let position = placement_mut(world, id)?.position();
                Ok(world.units.squares_to_pixels(position))
            })?;
            point_table(lua, point)
        })?,
    )?;

    Ok(primitives)
}

#[cfg(test)]
mod tests {
    use crate::fault::{FaultKind, RuntimeFault};
    use crate::scheduler::{FrameOutcome, Runtime};
    use crate::snapshot::Snapshot;
    use glam::Vec2;
    use sbx_core::map::{EntityId, Placement, TileMap, EMPTY_TILE};
    use sbx_core::sprite::{Palette, Sprite};
    use sbx_core::units::Units;
    use sbx_render::DisplayList;

    // 64px map, 4 tiles of 2 squares, 8px squares.
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
            tile_sprites: vec![Sprite::filled(2, 0), Sprite::filled(2, 1)],
            objects,
            tiles: TileMap::filled(4, EMPTY_TILE),
        }
    }

    struct Harness {
        runtime: Runtime,
        canvas: DisplayList,
    }

    impl Harness {
        fn new(codes: &[&str], objects: Vec<Placement>) -> Self {
            let mut runtime = Runtime::new(&snapshot(codes, objects), units()).expect("runtime");
            let mut canvas = DisplayList::new(64, 64);
            runtime.start(&mut canvas).expect("start");
            Self { runtime, canvas }
        }

        fn single(code: &str) -> Self {
            Self::new(&[code], vec![Placement::new(0, 0.0, 0.0)])
        }

        fn frame(&mut self) -> FrameOutcome {
            let Some(request) = self.runtime.pending_request() else {
                return FrameOutcome::Stale;
            };
            self.runtime.run_frame(request, &mut self.canvas)
        }

        fn text(&self, id: &str) -> Option<String> {
            self.runtime
                .with_world(|world| world.texts.get(id).map(|t| t.text.clone()))
                .flatten()
        }

        fn fault(&self) -> &RuntimeFault {
            self.runtime.fault().expect("expected a fault")
        }

        fn position(&self, id: u64) -> Option<Vec2> {
            self.runtime
                .with_world(|world| world.map.entity(EntityId(id)).map(|e| e.placement.position()))
                .flatten()
        }
    }

    #[test]
    fn is_key_is_edge_triggered_and_is_key_down_is_level() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\n\
             function C:init() self.presses = 0; self.held = 0 end\n\
             function C:update()\n\
             \x20 if isKey('A') then self.presses = self.presses + 1 end\n\
             \x20 if isKeyDown('a') then self.held = self.held + 1 end\n\
             \x20 addText(self.presses .. '/' .. self.held, 0, 0, { id = 'keys' })\n\
             end\n\
             return C",
        );
        h.runtime.key_down("a");
        for _ in 0..3 {
            assert_eq!(h.frame(), FrameOutcome::Rendered);
        }
        assert_eq!(h.text("keys").as_deref(), Some("1/3"));

        h.runtime.key_up("a");
        h.frame();
        h.runtime.key_down("a");
        h.frame();
        assert_eq!(h.text("keys").as_deref(), Some("2/4"));
    }

    #[test]
    fn invalid_key_faults() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\nfunction C:update() isKeyDown(42) end\nreturn C",
        );
        assert_eq!(h.frame(), FrameOutcome::Faulted);
        assert!(h.fault().summary.starts_with("Invalid key"), "{}", h.fault().summary);
        assert_eq!(h.fault().kind, FaultKind::Lifecycle);
    }

    #[test]
    fn created_objects_start_now_and_update_next_frame() {
        let spawner = "local C = GameObject:extend()\n\
                       function C:update()\n\
                       \x20 if not self.spawned then\n\
                       \x20   self.spawned = true\n\
                       \x20   local child = createObject(1, 4, 6)\n\
                       \x20   addText(tostring(child.started) .. ',' .. tostring(child.ticks), 0, 0, { id = 'child' })\n\
                       \x20 end\n\
                       end\n\
                       return C";
        let child = "local C = GameObject:extend()\n\
                     function C:init() self.ticks = 0 end\n\
                     function C:start() self.started = true end\n\
                     function C:update() self.ticks = self.ticks + 1; addText(tostring(self.ticks), 0, 0, { id = 'ticks' }) end\n\
                     return C";
        let mut h = Harness::new(&[spawner, child], vec![Placement::new(0, 0.0, 0.0)]);
        assert_eq!(h.frame(), FrameOutcome::Rendered);
        assert_eq!(h.text("child").as_deref(), Some("true,0"));
        assert_eq!(h.text("ticks"), None, "spawned entity is not updated in its spawn frame");
        assert_eq!(h.position(1), Some(Vec2::new(4.0, 6.0)));

        h.frame();
        assert_eq!(h.text("ticks").as_deref(), Some("1"));
    }

    #[test]
    fn create_object_with_unknown_index_is_a_resource_fault() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\nfunction C:update() createObject(9, 0, 0) end\nreturn C",
        );
        assert_eq!(h.frame(), FrameOutcome::Faulted);
        assert_eq!(h.fault().kind, FaultKind::Resource);
        assert_eq!(h.fault().summary, "9 is not an object");
    }

    #[test]
    fn failed_init_removes_half_spawned_entity_and_faults_caller() {
        let spawner = "local C = GameObject:extend()\nfunction C:update() createObject(1, 0, 0) end\nreturn C";
        let broken = "local C = GameObject:extend()\nfunction C:init() error('bad init') end\nreturn C";
        let mut h = Harness::new(&[spawner, broken], vec![Placement::new(0, 0.0, 0.0)]);
        assert_eq!(h.frame(), FrameOutcome::Faulted);
        assert_eq!(h.fault().object_index, 0, "attributed to the calling entity");
        assert_eq!(h.fault().summary, "bad init");
        let ids = h.runtime.with_world(|world| world.map.ids()).expect("world");
        assert_eq!(ids, vec![EntityId(0)]);
    }

    #[test]
    fn deleted_entities_are_skipped_for_the_rest_of_the_frame() {
        let killer = "local C = GameObject:extend()\n\
                      function C:update()\n\
                      \x20 addText(tostring(deleteObject(1)) .. ',' .. tostring(deleteObject(1)), 0, 0, { id = 'deleted' })\n\
                      end\n\
                      return C";
        let victim = "local C = GameObject:extend()\nfunction C:update() addText('alive', 0, 0, { id = 'victim' }) end\nreturn C";
        let mut h = Harness::new(
            &[killer, victim],
            vec![Placement::new(0, 0.0, 0.0), Placement::new(1, 2.0, 2.0)],
        );
        assert_eq!(h.frame(), FrameOutcome::Rendered);
        assert_eq!(h.text("deleted").as_deref(), Some("true,false"));
        assert_eq!(h.text("victim"), None);
        assert_eq!(h.position(1), None);
    }

    #[test]
    fn acting_on_a_deleted_self_is_a_resource_fault() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\nfunction C:update() deleteObject(self.id); self:move('up') end\nreturn C",
        );
        assert_eq!(h.frame(), FrameOutcome::Faulted);
        assert_eq!(h.fault().kind, FaultKind::Resource);
        assert_eq!(h.fault().summary, "entity #0 has been deleted");
    }

    #[test]
    fn get_object_returns_instance_or_nil() {
        let mut h = Harness::new(
            &["local C = GameObject:extend()\n\
               function C:update()\n\
               \x20 local other = getObject(1)\n\
               \x20 addText(tostring(other.objectIndex) .. ',' .. tostring(getObject(99)), 0, 0, { id = 'lookup' })\n\
               end\n\
               return C"],
            vec![Placement::new(0, 0.0, 0.0), Placement::new(0, 2.0, 0.0)],
        );
        h.frame();
        assert_eq!(h.text("lookup").as_deref(), Some("0,nil"));
    }

    #[test]
    fn tiles_read_and_write_with_bounds() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\n\
             function C:update()\n\
             \x20 setTile(1, 2, 1)\n\
             \x20 addText(tostring(getTile(1, 2)) .. ',' .. tostring(getTile(0, 0)) .. ',' .. tostring(getTile(9, 0)), 0, 0, { id = 'tiles' })\n\
             end\n\
             return C",
        );
        h.frame();
        assert_eq!(h.text("tiles").as_deref(), Some("1,-1,nil"));
        let tile = h.runtime.with_world(|w| w.map.tiles.get(1, 2)).flatten();
        assert_eq!(tile, Some(1));
    }

    #[test]
    fn set_tile_rejects_bad_tiles_and_positions() {
        for call in ["setTile(0, 0, 7)", "setTile(4, 0, 0)", "setTile(0, 0, -2)"] {
            let code = format!(
                "local C = GameObject:extend()\nfunction C:update() {call} end\nreturn C"
            );
            let mut h = Harness::single(&code);
            assert_eq!(h.frame(), FrameOutcome::Faulted, "{call} must fault");
        }
    }

    #[test]
    fn texts_upsert_and_remove() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\n\
             function C:start()\n\
             \x20 self.generated = addText('hello', 1, 2)\n\
             \x20 addText('score', 0, 0, { id = 'score', color = 'red', size = 8 })\n\
             \x20 addText('score 2', 0, 0, { id = 'score' })\n\
             \x20 addText('gone', 0, 0, { id = 'gone' })\n\
             \x20 removeText('gone')\n\
             end\n\
             function C:update() removeText('never-added') end\n\
             return C",
        );
        let texts = h
            .runtime
            .with_world(|world| {
                world
                    .texts
                    .iter()
                    .map(|t| (t.id.clone(), t.text.clone(), t.color.clone(), t.size))
                    .collect::<Vec<_>>()
            })
            .expect("world");
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].1, "hello");
        assert_eq!(texts[0].2, "black");
        assert_eq!(texts[0].3, 16.0);
        assert!(uuid::Uuid::parse_str(&texts[0].0).is_ok(), "generated id is a uuid");
        assert_eq!(texts[1], ("score".into(), "score 2".into(), "black".into(), 16.0));

        assert_eq!(h.frame(), FrameOutcome::Faulted);
        assert_eq!(h.fault().kind, FaultKind::Resource);
        assert_eq!(h.fault().summary, "never-added is not a text");
    }

    #[test]
    fn sounds_queue_for_the_host() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\n\
             function C:start() addSound('jump', 'sfx/jump.wav') end\n\
             function C:update() playSound('jump') end\n\
             return C",
        );
        h.frame();
        h.frame();
        let played = h.runtime.take_played_sounds();
        assert_eq!(played.len(), 2);
        assert_eq!(played[0].url, "sfx/jump.wav");
        assert!(h.runtime.take_played_sounds().is_empty());
    }

    #[test]
    fn movement_helpers_use_each_unit() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\n\
             function C:update()\n\
             \x20 self:move('right')\n\
             \x20 self:move('down')\n\
             \x20 self:moveTiles(1, 0)\n\
             \x20 self:movePixels(8, 16)\n\
             \x20 local t = self:getTilePos()\n\
             \x20 local p = self:getPixelPos()\n\
             \x20 addText(t.x .. ',' .. t.y .. ';' .. p.x .. ',' .. p.y, 0, 0, { id = 'pos' })\n\
             end\n\
             return C",
        );
        h.frame();
        // right (2) + tiles (2) + 8px (1 square) = 5; down (2) + 16px (2) = 4.
        assert_eq!(h.position(0), Some(Vec2::new(5.0, 4.0)));
        assert_eq!(h.text("pos").as_deref(), Some("2.5,2.0;40.0,32.0"));
    }

    #[test]
    fn unknown_direction_faults() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\nfunction C:update() self:move('sideways') end\nreturn C",
        );
        assert_eq!(h.frame(), FrameOutcome::Faulted);
        assert_eq!(h.fault().summary, "Invalid direction 'sideways'");
        assert_eq!(h.fault().location.map(|l| l.row), Some(2));
    }

    #[test]
    fn print_goes_to_the_log_without_faulting() {
        let mut h = Harness::single(
            "local C = GameObject:extend()\nfunction C:update() print('hello', 1, nil, {}) end\nreturn C",
        );
        assert_eq!(h.frame(), FrameOutcome::Rendered);
    }
}
