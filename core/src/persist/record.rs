//! Field-by-field effect records.
//!
//! A record is an ordered list of named fields. Writers append in a fixed
//! order; readers walk forward in the same order, stepping over fields they do
//! not know. New fields can therefore be appended to a family without breaking
//! records saved by an older build, and older builds skip what they don't use.
//!
//! Absolute cycles never reach a record. `put_remaining` stores the distance
//! from the writer's cycle, and `remaining` adds it back onto the reader's.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tickfx_types::{EffectFamily, EntityId, GameCycle};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("field `{field}` is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("no codec registered for {0}")]
    UnknownFamily(EffectFamily),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Entity(EntityId),
    Flag(bool),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Int(_) => "an integer",
            FieldValue::Text(_) => "text",
            FieldValue::Entity(_) => "an entity id",
            FieldValue::Flag(_) => "a flag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub value: FieldValue,
}

/// One persisted effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub family: EffectFamily,
    pub fields: Vec<RecordField>,
}

impl EffectRecord {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

pub struct RecordWriter {
    family: EffectFamily,
    now: GameCycle,
    fields: Vec<RecordField>,
}

impl RecordWriter {
    pub fn new(family: EffectFamily, now: GameCycle) -> Self {
        Self {
            family,
            now,
            fields: Vec::new(),
        }
    }

    pub fn now(&self) -> GameCycle {
        self.now
    }

    fn push(&mut self, name: &str, value: FieldValue) {
        self.fields.push(RecordField {
            name: name.to_string(),
            value,
        });
    }

    pub fn put_int(&mut self, name: &str, value: i64) {
        self.push(name, FieldValue::Int(value));
    }

    pub fn put_i32(&mut self, name: &str, value: i32) {
        self.put_int(name, i64::from(value));
    }

    /// Store `cycle` as ticks left from now. Past cycles store zero.
    pub fn put_remaining(&mut self, name: &str, cycle: GameCycle) {
        let ticks = cycle.saturating_sub(self.now).min(i64::MAX as u64) as i64;
        self.put_int(name, ticks);
    }

    pub fn put_text(&mut self, name: &str, value: &str) {
        self.push(name, FieldValue::Text(value.to_string()));
    }

    pub fn put_flag(&mut self, name: &str, value: bool) {
        self.push(name, FieldValue::Flag(value));
    }

    pub fn put_entity(&mut self, name: &str, value: EntityId) {
        self.push(name, FieldValue::Entity(value));
    }

    pub fn finish(self) -> EffectRecord {
        EffectRecord {
            family: self.family,
            fields: self.fields,
        }
    }
}

pub struct RecordReader<'a> {
    record: &'a EffectRecord,
    now: GameCycle,
    cursor: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(record: &'a EffectRecord, now: GameCycle) -> Self {
        Self {
            record,
            now,
            cursor: 0,
        }
    }

    pub fn family(&self) -> EffectFamily {
        self.record.family
    }

    /// Cycle that remaining tick counts are measured from
    pub fn now(&self) -> GameCycle {
        self.now
    }

    /// Advance past the next field called `name`. A field that is not there
    /// leaves the cursor where it was.
    fn take(&mut self, name: &str) -> Option<&'a FieldValue> {
        let fields = &self.record.fields[self.cursor..];
        let offset = fields.iter().position(|f| f.name == name)?;
        self.cursor += offset + 1;
        Some(&fields[offset].value)
    }

    pub fn opt_int(&mut self, name: &'static str) -> Result<Option<i64>, CodecError> {
        match self.take(name) {
            None => Ok(None),
            Some(FieldValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(type_error(name, "an integer", other)),
        }
    }

    pub fn int(&mut self, name: &'static str) -> Result<i64, CodecError> {
        self.opt_int(name)?.ok_or(CodecError::MissingField(name))
    }

    pub fn i32(&mut self, name: &'static str) -> Result<i32, CodecError> {
        let value = self.int(name)?;
        i32::try_from(value).map_err(|_| CodecError::OutOfRange { field: name, value })
    }

    pub fn opt_remaining(&mut self, name: &'static str) -> Result<Option<GameCycle>, CodecError> {
        match self.opt_int(name)? {
            None => Ok(None),
            Some(value) if value < 0 => Err(CodecError::OutOfRange { field: name, value }),
            Some(value) => Ok(Some(self.now.saturating_add(value as u64))),
        }
    }

    /// Absolute cycle rebuilt from a stored tick count
    pub fn remaining(&mut self, name: &'static str) -> Result<GameCycle, CodecError> {
        self.opt_remaining(name)?
            .ok_or(CodecError::MissingField(name))
    }

    pub fn remaining_or(
        &mut self,
        name: &'static str,
        default_ticks: u64,
    ) -> Result<GameCycle, CodecError> {
        Ok(self
            .opt_remaining(name)?
            .unwrap_or_else(|| self.now.saturating_add(default_ticks)))
    }

    pub fn text(&mut self, name: &'static str) -> Result<&'a str, CodecError> {
        match self.take(name) {
            None => Err(CodecError::MissingField(name)),
            Some(FieldValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(type_error(name, "text", other)),
        }
    }

    pub fn flag_or(&mut self, name: &'static str, default: bool) -> Result<bool, CodecError> {
        match self.take(name) {
            None => Ok(default),
            Some(FieldValue::Flag(v)) => Ok(*v),
            Some(other) => Err(type_error(name, "a flag", other)),
        }
    }

    pub fn opt_entity(&mut self, name: &'static str) -> Result<Option<EntityId>, CodecError> {
        match self.take(name) {
            None => Ok(None),
            Some(FieldValue::Entity(v)) => Ok(Some(*v)),
            Some(other) => Err(type_error(name, "an entity id", other)),
        }
    }
}

fn type_error(field: &'static str, expected: &'static str, found: &FieldValue) -> CodecError {
    tracing::debug!(field, expected, found = found.kind(), "Field type mismatch");
    CodecError::FieldType { field, expected }
}
