//! Typed tag store
//!
//! The single mutable shared state of the system. Every variable name
//! lives in exactly one typed bucket, selected by its declared type;
//! FB instance records persist here across scans. Names are stored
//! under their upper-cased spelling so lookups are case-insensitive.

use crate::pou::{
    BistableInstance, BistableKind, CounterInstance, CounterKind, EdgeInstance, EdgeKind,
    TimerInstance,
};
use crate::value::{default_of, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bounds and element type of an array entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMeta {
    pub start: i64,
    pub end: i64,
    pub elem_kind: ValueKind,
}

/// One array entry: metadata plus element storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub meta: ArrayMeta,
    pub values: Vec<Value>,
}

/// One typed field of a user FB instance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCell {
    pub kind: ValueKind,
    pub value: Value,
}

/// Persistent record of a user-defined FUNCTION_BLOCK instance
///
/// Holds the instance's VAR_INPUT, VAR_OUTPUT and VAR cells; VAR_TEMP
/// never lands here, it is rebuilt fresh on every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FbInstance {
    /// Upper-cased FUNCTION_BLOCK type name
    pub type_name: String,
    /// Upper-cased field name -> typed cell
    pub fields: HashMap<String, FieldCell>,
}

/// The typed key-value store shared between host and interpreter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagStore {
    bools: HashMap<String, bool>,
    ints: HashMap<String, i64>,
    reals: HashMap<String, f64>,
    times: HashMap<String, u64>,
    strings: HashMap<String, String>,
    arrays: HashMap<String, ArrayEntry>,
    timers: HashMap<String, TimerInstance>,
    counters: HashMap<String, CounterInstance>,
    edges: HashMap<String, EdgeInstance>,
    bistables: HashMap<String, BistableInstance>,
    fb_instances: HashMap<String, FbInstance>,
}

fn key(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Scalar buckets

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.bools.get(&key(name)).copied()
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.bools.insert(key(name), value);
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.ints.get(&key(name)).copied()
    }

    pub fn set_int(&mut self, name: &str, value: i64) {
        self.ints.insert(key(name), value);
    }

    pub fn get_real(&self, name: &str) -> Option<f64> {
        self.reals.get(&key(name)).copied()
    }

    pub fn set_real(&mut self, name: &str, value: f64) {
        self.reals.insert(key(name), value);
    }

    pub fn get_time(&self, name: &str) -> Option<u64> {
        self.times.get(&key(name)).copied()
    }

    pub fn set_time(&mut self, name: &str, value_ms: u64) {
        self.times.insert(key(name), value_ms);
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.strings.get(&key(name)).map(|s| s.as_str())
    }

    pub fn set_string(&mut self, name: &str, value: impl Into<String>) {
        self.strings.insert(key(name), value.into());
    }

    /// Read a scalar from whichever bucket holds it
    pub fn read_scalar(&self, name: &str) -> Option<Value> {
        let k = key(name);
        if let Some(v) = self.bools.get(&k) {
            return Some(Value::Bool(*v));
        }
        if let Some(v) = self.ints.get(&k) {
            return Some(Value::Int(*v));
        }
        if let Some(v) = self.reals.get(&k) {
            return Some(Value::Real(*v));
        }
        if let Some(v) = self.times.get(&k) {
            return Some(Value::Time(*v));
        }
        if let Some(v) = self.strings.get(&k) {
            return Some(Value::Str(v.clone()));
        }
        None
    }

    /// The declared kind of a scalar entry, from the bucket holding it
    pub fn scalar_kind(&self, name: &str) -> Option<ValueKind> {
        let k = key(name);
        if self.bools.contains_key(&k) {
            Some(ValueKind::Bool)
        } else if self.ints.contains_key(&k) {
            Some(ValueKind::Int)
        } else if self.reals.contains_key(&k) {
            Some(ValueKind::Real)
        } else if self.times.contains_key(&k) {
            Some(ValueKind::Time)
        } else if self.strings.contains_key(&k) {
            Some(ValueKind::Str)
        } else {
            None
        }
    }

    /// Write a value already coerced to its bucket's kind
    pub fn write_scalar(&mut self, name: &str, value: Value) {
        match value {
            Value::Bool(v) => self.set_bool(name, v),
            Value::Int(v) => self.set_int(name, v),
            Value::Real(v) => self.set_real(name, v),
            Value::Time(v) => self.set_time(name, v),
            Value::Str(v) => self.set_string(name, v),
        }
    }

    // Arrays

    pub fn init_array(&mut self, name: &str, meta: ArrayMeta, initial: Vec<Value>) {
        let len = (meta.end - meta.start + 1).max(0) as usize;
        let mut values = initial;
        values.truncate(len);
        while values.len() < len {
            values.push(default_of(meta.elem_kind));
        }
        self.arrays.insert(key(name), ArrayEntry { meta, values });
    }

    pub fn array_elem_kind(&self, name: &str) -> Option<ValueKind> {
        self.arrays.get(&key(name)).map(|a| a.meta.elem_kind)
    }

    /// Indexed read; out-of-range indexes yield the element default
    /// rather than faulting
    pub fn get_array_element(&self, name: &str, index: i64) -> Option<Value> {
        let entry = self.arrays.get(&key(name))?;
        let offset = index - entry.meta.start;
        if offset < 0 || offset as usize >= entry.values.len() {
            return Some(default_of(entry.meta.elem_kind));
        }
        Some(entry.values[offset as usize].clone())
    }

    /// Indexed write; out-of-range indexes are silently dropped
    pub fn set_array_element(&mut self, name: &str, index: i64, value: Value) {
        if let Some(entry) = self.arrays.get_mut(&key(name)) {
            let offset = index - entry.meta.start;
            if offset >= 0 && (offset as usize) < entry.values.len() {
                entry.values[offset as usize] = value;
            }
        }
    }

    // Timer instances

    pub fn init_timer(&mut self, name: &str, preset_ms: u64) {
        self.timers.insert(key(name), TimerInstance::new(preset_ms));
    }

    pub fn get_timer(&self, name: &str) -> Option<&TimerInstance> {
        self.timers.get(&key(name))
    }

    pub fn set_timer_input(&mut self, name: &str, input: bool) {
        if let Some(t) = self.timers.get_mut(&key(name)) {
            t.input = input;
        }
    }

    pub fn set_timer_pt(&mut self, name: &str, preset_ms: u64) {
        if let Some(t) = self.timers.get_mut(&key(name)) {
            t.preset_ms = preset_ms;
        }
    }

    pub fn update_timer(&mut self, name: &str, delta_ms: u64) {
        if let Some(t) = self.timers.get_mut(&key(name)) {
            t.update(delta_ms);
        }
    }

    // Counter instances

    pub fn init_counter(&mut self, name: &str, kind: CounterKind) {
        self.counters.insert(key(name), CounterInstance::new(kind));
    }

    pub fn get_counter(&self, name: &str) -> Option<&CounterInstance> {
        self.counters.get(&key(name))
    }

    pub fn pulse_count_up(&mut self, name: &str, cu: bool, reset: bool, preset: i64) {
        if let Some(c) = self.counters.get_mut(&key(name)) {
            c.count_up_call(cu, reset, preset);
        }
    }

    pub fn pulse_count_down(&mut self, name: &str, cd: bool, load: bool, preset: i64) {
        if let Some(c) = self.counters.get_mut(&key(name)) {
            c.count_down_call(cd, load, preset);
        }
    }

    pub fn pulse_count_up_down(
        &mut self,
        name: &str,
        cu: bool,
        cd: bool,
        reset: bool,
        load: bool,
        preset: i64,
    ) {
        if let Some(c) = self.counters.get_mut(&key(name)) {
            c.count_up_down_call(cu, cd, reset, load, preset);
        }
    }

    /// Host-level counter reset; kind-independent, unlike the pulse
    /// operations, because it never fabricates an input edge
    pub fn reset_counter(&mut self, name: &str) {
        if let Some(c) = self.counters.get_mut(&key(name)) {
            c.reset();
        }
    }

    // Edge detector instances

    pub fn init_edge_detector(&mut self, name: &str, kind: EdgeKind) {
        self.edges.insert(key(name), EdgeInstance::new(kind));
    }

    pub fn get_edge_detector(&self, name: &str) -> Option<&EdgeInstance> {
        self.edges.get(&key(name))
    }

    pub fn update_rtrig(&mut self, name: &str, clk: bool) {
        if let Some(e) = self.edges.get_mut(&key(name)) {
            e.update(clk);
        }
    }

    pub fn update_ftrig(&mut self, name: &str, clk: bool) {
        if let Some(e) = self.edges.get_mut(&key(name)) {
            e.update(clk);
        }
    }

    // Bistable instances

    pub fn init_bistable(&mut self, name: &str, kind: BistableKind) {
        self.bistables
            .insert(key(name), BistableInstance::new(kind));
    }

    pub fn get_bistable(&self, name: &str) -> Option<&BistableInstance> {
        self.bistables.get(&key(name))
    }

    pub fn update_sr(&mut self, name: &str, set: bool, reset: bool) {
        if let Some(b) = self.bistables.get_mut(&key(name)) {
            b.update(set, reset);
        }
    }

    pub fn update_rs(&mut self, name: &str, set: bool, reset: bool) {
        if let Some(b) = self.bistables.get_mut(&key(name)) {
            b.update(set, reset);
        }
    }

    // User FB instances

    pub fn init_fb_instance(&mut self, name: &str, instance: FbInstance) {
        self.fb_instances.insert(key(name), instance);
    }

    pub fn fb_instance(&self, name: &str) -> Option<&FbInstance> {
        self.fb_instances.get(&key(name))
    }

    pub fn fb_instance_mut(&mut self, name: &str) -> Option<&mut FbInstance> {
        self.fb_instances.get_mut(&key(name))
    }

    /// Is `name` any kind of FB instance record?
    pub fn has_instance(&self, name: &str) -> bool {
        let k = key(name);
        self.timers.contains_key(&k)
            || self.counters.contains_key(&k)
            || self.edges.contains_key(&k)
            || self.bistables.contains_key(&k)
            || self.fb_instances.contains_key(&k)
    }

    /// Read a named field of any FB instance record
    pub fn instance_field(&self, name: &str, field: &str) -> Option<Value> {
        let k = key(name);
        let f = key(field);

        if let Some(t) = self.timers.get(&k) {
            return match f.as_str() {
                "Q" => Some(Value::Bool(t.q)),
                "ET" => Some(Value::Time(t.elapsed_ms)),
                "IN" => Some(Value::Bool(t.input)),
                "PT" => Some(Value::Time(t.preset_ms)),
                _ => None,
            };
        }
        if let Some(c) = self.counters.get(&k) {
            return match f.as_str() {
                "CV" => Some(Value::Int(c.current)),
                "PV" => Some(Value::Int(c.preset)),
                "QU" | "Q" => Some(Value::Bool(c.qu)),
                "QD" => Some(Value::Bool(c.qd)),
                "CU" => Some(Value::Bool(c.count_up)),
                "CD" => Some(Value::Bool(c.count_down)),
                _ => None,
            };
        }
        if let Some(e) = self.edges.get(&k) {
            return match f.as_str() {
                "Q" => Some(Value::Bool(e.q)),
                "CLK" => Some(Value::Bool(e.clk)),
                _ => None,
            };
        }
        if let Some(b) = self.bistables.get(&k) {
            return match f.as_str() {
                "Q1" | "Q" => Some(Value::Bool(b.q1)),
                _ => None,
            };
        }
        if let Some(fb) = self.fb_instances.get(&k) {
            return fb.fields.get(&f).map(|cell| cell.value.clone());
        }
        None
    }

    /// The declared kind of a named instance field, for write coercion
    pub fn instance_field_kind(&self, name: &str, field: &str) -> Option<ValueKind> {
        self.instance_field(name, field).map(|v| v.kind())
    }

    /// Write a named field of an FB instance record
    ///
    /// The value must already be coerced to the field's kind. Unknown
    /// fields are ignored, matching the array write discipline.
    pub fn set_instance_field(&mut self, name: &str, field: &str, value: Value) {
        let k = key(name);
        let f = key(field);

        if let Some(t) = self.timers.get_mut(&k) {
            match (f.as_str(), &value) {
                ("Q", Value::Bool(v)) => t.q = *v,
                ("ET", Value::Time(v)) => t.elapsed_ms = *v,
                ("IN", Value::Bool(v)) => t.input = *v,
                ("PT", Value::Time(v)) => t.preset_ms = *v,
                _ => {}
            }
            return;
        }
        if let Some(c) = self.counters.get_mut(&k) {
            match (f.as_str(), &value) {
                ("CV", Value::Int(v)) => c.current = *v,
                ("PV", Value::Int(v)) => c.preset = *v,
                ("QU", Value::Bool(v)) => c.qu = *v,
                ("QD", Value::Bool(v)) => c.qd = *v,
                _ => {}
            }
            return;
        }
        if let Some(b) = self.bistables.get_mut(&k) {
            if let ("Q1" | "Q", Value::Bool(v)) = (f.as_str(), &value) {
                b.q1 = *v;
            }
            return;
        }
        if let Some(fb) = self.fb_instances.get_mut(&k) {
            if let Some(cell) = fb.fields.get_mut(&f) {
                cell.value = value;
            }
        }
    }

    /// Remove every entry; the host uses this as a full reset
    pub fn clear_all(&mut self) {
        self.bools.clear();
        self.ints.clear();
        self.reals.clear();
        self.times.clear();
        self.strings.clear();
        self.arrays.clear();
        self.timers.clear();
        self.counters.clear();
        self.edges.clear();
        self.bistables.clear();
        self.fb_instances.clear();
    }
}
