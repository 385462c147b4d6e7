//! Behaviour loading: engine prelude, source wrapping, compilation and
//! construction of per-entity behaviour instances.
//!
//! Registry layout (per VM):
//!   sbx.env       -- capability table every behaviour chunk runs in
//!   sbx.base      -- the `GameObject` base class
//!   sbx.construct -- prelude function `(class, id, objectIndex) -> instance`
//!   sbx.classes   -- object index -> compiled class (compiled once)
//!   sbx.instances -- entity id -> live instance

use mlua::prelude::*;
use sbx_core::map::EntityId;

use crate::locator::{BEHAVIOR_CHUNK, ENGINE_CHUNK};
use crate::world::World;

/// Opens the function body the user's top-level `return` returns from.
pub const WRAPPER_PREFIX: &str = "local GameObject = ...\nreturn (function()\n";
pub const WRAPPER_SUFFIX: &str = "\nend)()\n";

const ENV_KEY: &str = "sbx.env";
const BASE_KEY: &str = "sbx.base";
const CONSTRUCT_KEY: &str = "sbx.construct";
const CLASSES_KEY: &str = "sbx.classes";
const INSTANCES_KEY: &str = "sbx.instances";

const PRELUDE: &str = r#"
local primitives = ...

local GameObject = {}
GameObject.__index = GameObject

function GameObject:extend()
  local class = setmetatable({}, { __index = self })
  class.__index = class
  return class
end

function GameObject:init() end
function GameObject:start() end
function GameObject:update() end

function GameObject:move(direction)
  primitives.move(self.id, direction)
end

function GameObject:moveTiles(x, y)
  primitives.moveTiles(self.id, x, y)
end

function GameObject:movePixels(x, y)
  primitives.movePixels(self.id, x, y)
end

function GameObject:getTilePos()
  return primitives.tilePos(self.id)
end

function GameObject:getPixelPos()
  return primitives.pixelPos(self.id)
end

local function construct(class, id, objectIndex)
  if class ~= GameObject and getmetatable(class) == nil then
    setmetatable(class, { __index = GameObject })
  end
  class.__index = class
  local instance = setmetatable({ id = id, objectIndex = objectIndex }, class)
  instance:init()
  return instance
end

return GameObject, construct
"#;

const SAFE_GLOBALS: &[&str] = &[
    "assert",
    "error",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "select",
    "tonumber",
    "tostring",
    "type",
    "setmetatable",
    "getmetatable",
    "rawequal",
    "rawget",
    "rawset",
    "rawlen",
    "math",
    "string",
    "table",
];

/// Number of wrapper lines before the user's first line. Derived from the
/// template so the two cannot drift apart.
pub fn prefix_lines() -> u32 {
    WRAPPER_PREFIX.matches('\n').count() as u32
}

pub fn wrap_source(source: &str) -> String {
    format!("{WRAPPER_PREFIX}{source}{WRAPPER_SUFFIX}")
}

/// Runs the prelude and sets up the capability environment and registry
/// tables. `env` must already hold the engine API functions.
pub fn install(lua: &Lua, env: LuaTable, primitives: LuaTable) -> LuaResult<()> {
    let globals = lua.globals();
    for name in SAFE_GLOBALS {
        let value: LuaValue = globals.get(*name)?;
        env.set(*name, value)?;
    }

    let (base, construct): (LuaTable, LuaFunction) = lua
        .load(PRELUDE)
        .set_name(format!("={ENGINE_CHUNK}"))
        .call(primitives)?;
    env.set("GameObject", base.clone())?;

    lua.set_named_registry_value(ENV_KEY, env)?;
    lua.set_named_registry_value(BASE_KEY, base)?;
    lua.set_named_registry_value(CONSTRUCT_KEY, construct)?;
    lua.set_named_registry_value(CLASSES_KEY, lua.create_table()?)?;
    lua.set_named_registry_value(INSTANCES_KEY, lua.create_table()?)?;
    Ok(())
}

/// Compiles `source` as a behaviour chunk and returns the class it returns.
pub fn compile_class(lua: &Lua, object_index: usize, source: &str) -> LuaResult<LuaTable> {
    let env: LuaTable = lua.named_registry_value(ENV_KEY)?;
    let base: LuaTable = lua.named_registry_value(BASE_KEY)?;
    let chunk = lua
        .load(wrap_source(source))
        .set_name(format!("={BEHAVIOR_CHUNK}"))
        .set_environment(env)
        .into_function()?;
    match chunk.call::<LuaValue>(base)? {
        LuaValue::Table(class) => Ok(class),
        other => Err(LuaError::runtime(format!(
            "object {object_index} script must return a class table, got {}",
            other.type_name()
        ))),
    }
}

/// Class for `object_index`, compiling its source on first use.
pub fn class_for(lua: &Lua, object_index: usize) -> LuaResult<LuaTable> {
    let classes: LuaTable = lua.named_registry_value(CLASSES_KEY)?;
    if let Some(class) = classes.get::<Option<LuaTable>>(object_index)? {
        return Ok(class);
    }

    let source = {
        let world = lua
            .app_data_ref::<World>()
            .ok_or_else(|| LuaError::runtime("world is not attached"))?;
        world.codes.get(object_index).cloned()
    };
    let source = source.ok_or_else(|| {
        LuaError::runtime(format!("object {object_index} has no behaviour source"))
    })?;

    let class = compile_class(lua, object_index, &source)?;
    log::debug!("Compiled behaviour for object {object_index}");
    classes.set(object_index, class.clone())?;
    Ok(class)
}

/// Builds the instance for entity `id` and runs its `init`. The instance is
/// only registered once `init` succeeds.
pub fn construct(
    lua: &Lua,
    class: LuaTable,
    id: EntityId,
    object_index: usize,
) -> LuaResult<LuaTable> {
    let construct: LuaFunction = lua.named_registry_value(CONSTRUCT_KEY)?;
    let instance: LuaTable = construct.call((class, id.0, object_index))?;
    let instances: LuaTable = lua.named_registry_value(INSTANCES_KEY)?;
    instances.set(id.0, instance.clone())?;
    Ok(instance)
}

pub fn instance(lua: &Lua, id: EntityId) -> LuaResult<Option<LuaTable>> {
    let instances: LuaTable = lua.named_registry_value(INSTANCES_KEY)?;
    instances.get(id.0)
}

pub fn forget(lua: &Lua, id: EntityId) -> LuaResult<()> {
    let instances: LuaTable = lua.named_registry_value(INSTANCES_KEY)?;
    instances.set(id.0, LuaValue::Nil)
}

/// Calls `instance:<hook>()`.
pub fn call_hook(instance: &LuaTable, hook: &str) -> LuaResult<()> {
    instance.call_method::<()>(hook, ())
}
