//! Scripted keyboard input for headless runs.
//!
//! ```json
//! { "frames": [
//!     { "press": ["arrowright"], "repeat": 30 },
//!     { "release": ["arrowright"], "press": [" "] },
//!     { "repeat": 10 }
//! ] }
//! ```
//!
//! A step's presses and releases are applied before its first frame; the
//! remaining `repeat - 1` frames carry no new events, so pressed keys stay
//! held.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use sbx_core::input::normalize_key;

#[derive(Debug, Deserialize, Clone)]
pub struct InputScript {
    pub frames: Vec<InputStep>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputStep {
    #[serde(default)]
    pub press: Vec<String>,
    #[serde(default)]
    pub release: Vec<String>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

/// Key events to deliver before one frame runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub press: Vec<String>,
    pub release: Vec<String>,
}

impl FrameInput {
    pub fn is_empty(&self) -> bool {
        self.press.is_empty() && self.release.is_empty()
    }
}

impl InputScript {
    pub fn expanded_inputs(&self) -> Vec<FrameInput> {
        let mut out = Vec::new();
        for step in &self.frames {
            out.push(FrameInput {
                press: step.press.clone(),
                release: step.release.clone(),
            });
            for _ in 1..step.repeat.max(1) {
                out.push(FrameInput::default());
            }
        }
        out
    }
}

pub fn load_input_script_from_path(path: &Path) -> Result<InputScript, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let script: InputScript = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse input script JSON {}: {e}", path.display()))?;
    validate_input_script(&script)?;
    Ok(script)
}

fn validate_input_script(script: &InputScript) -> Result<(), String> {
    if script.frames.is_empty() {
        return Err("Input script validation failed: frames list is empty".to_string());
    }
    for (index, step) in script.frames.iter().enumerate() {
        if step.press.iter().chain(&step.release).any(|key| key.is_empty()) {
            return Err(format!(
                "Input script validation failed: step {index} has an empty key name"
            ));
        }
        let pressed: Vec<String> = step.press.iter().map(|k| normalize_key(k)).collect();
        if let Some(key) = step
            .release
            .iter()
            .find(|key| pressed.contains(&normalize_key(key)))
        {
            return Err(format!(
                "Input script validation failed: step {index} both presses and releases '{key}'"
            ));
        }
    }
    Ok(())
}

const fn default_repeat() -> u32 {
    1
}
