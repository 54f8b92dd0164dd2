//! JSON persistence of label sequences.
//!
//! A sequence is stored as a flat object keyed by frame number, e.g.
//! `{"1": "f", "2": "ff", "num_frames": 3}`. Detector output usually
//! leaves `num_frames` out.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::label::{FrameLabel, LabelSequence};

pub const NUM_FRAMES_KEY: &str = "num_frames";

pub fn to_json(seq: &LabelSequence) -> Value {
    let mut map = Map::new();
    for (frame, label) in seq.iter() {
        if let Some(code) = label.code() {
            map.insert(frame.to_string(), Value::from(code));
        }
    }
    if let Some(total) = seq.total_frames() {
        map.insert(NUM_FRAMES_KEY.to_string(), Value::from(total));
    }
    Value::Object(map)
}

pub fn from_json(value: &Value) -> Result<LabelSequence> {
    let map = value
        .as_object()
        .ok_or_else(|| Error::invalid("label sequence must be a JSON object"))?;

    let mut seq = LabelSequence::new();
    for (key, value) in map {
        if key == NUM_FRAMES_KEY {
            seq.set_total_frames(parse_num_frames(value)?);
            continue;
        }
        let frame: u32 = key
            .parse()
            .map_err(|_| Error::invalid(format!("{key:?} is not a frame number")))?;
        let code = value
            .as_str()
            .ok_or_else(|| Error::invalid(format!("frame {frame}: label must be a string")))?;
        let label = FrameLabel::from_code(code)
            .map_err(|e| Error::invalid(format!("frame {frame}: {e}")))?;
        seq.set(frame, label)?;
    }
    Ok(seq)
}

// Converted hand codings carry the count as a string. Whole floats such
// as `612.0` are accepted too.
fn parse_num_frames(value: &Value) -> Result<u32> {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| whole_count(n.as_f64()?)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::invalid(format!("{NUM_FRAMES_KEY} {value} is not a frame count")))
}

fn whole_count(n: f64) -> Option<u32> {
    (n.is_finite() && n.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&n)).then(|| n as u32)
}

pub fn load_sequence(path: &Path) -> Result<LabelSequence> {
    let data = std::fs::read_to_string(path).map_err(|e| Error::not_found(path, e))?;
    let value: Value = serde_json::from_str(&data).map_err(|e| Error::not_found(path, e))?;
    from_json(&value)
}

pub fn save_sequence(path: &Path, seq: &LabelSequence) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let data = serde_json::to_string(&to_json(seq))?;
    std::fs::write(path, data)?;
    Ok(())
}
