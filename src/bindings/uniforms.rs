// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/*!
The introspected uniform table.

When a kernel links we walk its active uniforms once, classify each into one of the
eight settable forms (scalar/vector, float/int) or [UniformKind::Unsupported], and
allocate shadow storage for the settable ones. Sets mutate the shadow copy and mark it
dirty; nothing reaches the driver until the flush that precedes a dispatch, which
uploads each dirty record's whole value buffer in one call.

Array uniforms are addressed by base name. The driver reports them as `lights[0]`, so
we truncate at the subscript and resolve the storage location against the base name.
*/

use std::fmt::{Display, Formatter};

use crate::driver::{Driver, ProgramName, uniform_type};

/// Classified uniform type. Assigned once at introspection time; the raw driver type
/// code is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    /// Anything else a program can declare: samplers, matrices, unsigned forms.
    /// Carried in the table so lookups can name it, but never settable.
    Unsupported,
}

impl UniformKind {
    pub fn classify(type_code: u32) -> Self {
        match type_code {
            uniform_type::FLOAT => UniformKind::Float,
            uniform_type::FLOAT_VEC2 => UniformKind::FloatVec2,
            uniform_type::FLOAT_VEC3 => UniformKind::FloatVec3,
            uniform_type::FLOAT_VEC4 => UniformKind::FloatVec4,
            uniform_type::INT => UniformKind::Int,
            uniform_type::INT_VEC2 => UniformKind::IntVec2,
            uniform_type::INT_VEC3 => UniformKind::IntVec3,
            uniform_type::INT_VEC4 => UniformKind::IntVec4,
            _ => UniformKind::Unsupported,
        }
    }

    /// Components per element, 0 for unsupported kinds.
    pub fn arity(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int => 1,
            UniformKind::FloatVec2 | UniformKind::IntVec2 => 2,
            UniformKind::FloatVec3 | UniformKind::IntVec3 => 3,
            UniformKind::FloatVec4 | UniformKind::IntVec4 => 4,
            UniformKind::Unsupported => 0,
        }
    }

    fn is_float(self) -> bool {
        matches!(
            self,
            UniformKind::Float
                | UniformKind::FloatVec2
                | UniformKind::FloatVec3
                | UniformKind::FloatVec4
        )
    }
}

/// How a caller names a uniform: by the storage location the compiler assigned, or by
/// the declared name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformIdent<'a> {
    Location(u32),
    Name(&'a str),
}

impl Display for UniformIdent<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UniformIdent::Location(location) => write!(f, "at location {location}"),
            UniformIdent::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// Why a set was refused. Checks run in this order: sign, range, kind, family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    #[error("Negative indices are not permitted.")]
    NegativeIndex,

    #[error("Index {index} is out of range. The uniform only has {len} elements.")]
    OutOfRange { index: i32, len: u32 },

    #[error("Only float, vec, int and ivec uniforms are supported.")]
    UnsupportedKind,

    #[error("The uniform holds {holds} values.")]
    WrongFamily { holds: &'static str },
}

/// Shadow storage for one record. Empty iff the kind is unsupported.
#[derive(Debug, Clone, PartialEq)]
enum Store {
    Floats(Vec<f32>),
    Ints(Vec<i32>),
    Empty,
}

/// One active uniform: introspected metadata plus the shadow value buffer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Uniform {
    name: String,
    kind: UniformKind,
    /// Declared element count, 1 for non-arrays.
    len: u32,
    /// Compiler-assigned storage location, -1 when the driver reports none.
    location: i32,
    store: Store,
    dirty: bool,
}

impl Uniform {
    pub(crate) fn new(name: String, kind: UniformKind, len: u32, location: i32) -> Self {
        let components = len as usize * kind.arity();
        let store = if kind == UniformKind::Unsupported {
            Store::Empty
        } else if kind.is_float() {
            Store::Floats(vec![0.0; components])
        } else {
            Store::Ints(vec![0; components])
        };
        // supported records start dirty so the first flush uploads the zeroed state
        let dirty = kind != UniformKind::Unsupported;
        Uniform {
            name,
            kind,
            len,
            location,
            store,
            dirty,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Does `ident` address this record? A location of -1 is unaddressable by number.
    pub(crate) fn matches(&self, ident: UniformIdent<'_>) -> bool {
        match ident {
            UniformIdent::Location(location) => {
                self.location >= 0 && self.location as u32 == location
            }
            UniformIdent::Name(name) => self.name == name,
        }
    }

    /// Validate `index` and return the component offset of element `index`.
    fn checked_base(&self, index: i32) -> Result<usize, SetError> {
        if index < 0 {
            return Err(SetError::NegativeIndex);
        }
        if index as u32 >= self.len {
            return Err(SetError::OutOfRange {
                index,
                len: self.len,
            });
        }
        if self.kind.arity() == 0 {
            return Err(SetError::UnsupportedKind);
        }
        Ok(index as usize * self.kind.arity())
    }

    /// Write element `index`, taking the first `arity` components of `values`.
    pub(crate) fn set_floats(&mut self, index: i32, values: [f32; 4]) -> Result<(), SetError> {
        let base = self.checked_base(index)?;
        let Store::Floats(shadow) = &mut self.store else {
            return Err(SetError::WrongFamily { holds: "int" });
        };
        let arity = self.kind.arity();
        shadow[base..base + arity].copy_from_slice(&values[..arity]);
        self.dirty = true;
        Ok(())
    }

    pub(crate) fn set_ints(&mut self, index: i32, values: [i32; 4]) -> Result<(), SetError> {
        let base = self.checked_base(index)?;
        let Store::Ints(shadow) = &mut self.store else {
            return Err(SetError::WrongFamily { holds: "float" });
        };
        let arity = self.kind.arity();
        shadow[base..base + arity].copy_from_slice(&values[..arity]);
        self.dirty = true;
        Ok(())
    }

    /// Upload the whole value buffer and clear dirty. Callers check dirty first.
    fn apply(&mut self, driver: &mut impl Driver) {
        let arity = self.kind.arity();
        let count = self.len as usize;
        match &self.store {
            Store::Floats(shadow) => driver.upload_floats(self.location, arity, count, shadow),
            Store::Ints(shadow) => driver.upload_ints(self.location, arity, count, shadow),
            Store::Empty => {}
        }
        self.dirty = false;
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Every active uniform of one kernel, in introspection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct UniformTable {
    records: Vec<Uniform>,
}

impl UniformTable {
    /// Walk the linked program's active uniforms and build the table.
    pub(crate) fn introspect(driver: &mut impl Driver, program: ProgramName) -> Self {
        let count = driver.active_uniform_count(program);
        let mut records = Vec::with_capacity(count as usize);
        for index in 0..count {
            let raw = driver.active_uniform(program, index);
            let name = match raw.name.find('[') {
                Some(subscript) => raw.name[..subscript].to_string(),
                None => raw.name,
            };
            let location = driver.uniform_location(program, &name);
            let kind = UniformKind::classify(raw.type_code);
            records.push(Uniform::new(name, kind, raw.len.max(1), location));
        }
        UniformTable { records }
    }

    /// Linear scan; tables are small.
    pub(crate) fn find_mut(&mut self, ident: UniformIdent<'_>) -> Option<&mut Uniform> {
        self.records.iter_mut().find(|record| record.matches(ident))
    }

    /// Upload every dirty record.
    pub(crate) fn flush(&mut self, driver: &mut impl Driver) {
        for record in &mut self.records {
            if record.dirty {
                record.apply(driver);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ActiveUniform, Driver};
    use crate::testing::MockDriver;

    #[test]
    fn classification_covers_the_settable_forms() {
        assert_eq!(
            UniformKind::classify(uniform_type::FLOAT),
            UniformKind::Float
        );
        assert_eq!(
            UniformKind::classify(uniform_type::FLOAT_VEC3),
            UniformKind::FloatVec3
        );
        assert_eq!(UniformKind::classify(uniform_type::INT), UniformKind::Int);
        assert_eq!(
            UniformKind::classify(uniform_type::INT_VEC4),
            UniformKind::IntVec4
        );
        // sampler2D
        assert_eq!(UniformKind::classify(0x8B5E), UniformKind::Unsupported);
        assert_eq!(UniformKind::Unsupported.arity(), 0);
    }

    #[test]
    fn supported_records_start_dirty_and_zeroed() {
        let u = Uniform::new("scale".into(), UniformKind::FloatVec2, 3, 0);
        assert!(u.is_dirty());
        assert_eq!(u.store, Store::Floats(vec![0.0; 6]));

        let u = Uniform::new("tex".into(), UniformKind::Unsupported, 1, -1);
        assert!(!u.is_dirty());
        assert_eq!(u.store, Store::Empty);
    }

    #[test]
    fn set_checks_run_in_order() {
        let mut u = Uniform::new("tex".into(), UniformKind::Unsupported, 3, -1);
        // range problems win over the unsupported kind
        assert_eq!(
            u.set_floats(-1, [0.0; 4]),
            Err(SetError::NegativeIndex)
        );
        assert_eq!(
            u.set_floats(3, [0.0; 4]),
            Err(SetError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(u.set_floats(0, [0.0; 4]), Err(SetError::UnsupportedKind));
        assert!(!u.is_dirty());
    }

    #[test]
    fn family_mismatch_neither_writes_nor_dirties() {
        let mut u = Uniform::new("count".into(), UniformKind::Int, 1, 2);
        u.apply(&mut MockDriver::new());
        assert!(!u.is_dirty());

        assert_eq!(
            u.set_floats(0, [1.0, 0.0, 0.0, 0.0]),
            Err(SetError::WrongFamily { holds: "int" })
        );
        assert_eq!(u.store, Store::Ints(vec![0]));
        assert!(!u.is_dirty());
    }

    #[test]
    fn set_writes_only_the_kinds_arity() {
        let mut u = Uniform::new("offsets".into(), UniformKind::FloatVec2, 3, 1);
        u.set_floats(1, [5.0, 6.0, 7.0, 8.0]).unwrap();
        assert_eq!(u.store, Store::Floats(vec![0.0, 0.0, 5.0, 6.0, 0.0, 0.0]));
        assert!(u.is_dirty());
    }

    #[test]
    fn out_of_range_sets_leave_the_store_untouched() {
        let mut u = Uniform::new("offsets".into(), UniformKind::FloatVec2, 3, 1);
        u.apply(&mut MockDriver::new());

        assert!(u.set_floats(3, [9.0; 4]).is_err());
        assert!(u.set_floats(-1, [9.0; 4]).is_err());
        assert_eq!(u.store, Store::Floats(vec![0.0; 6]));
        assert!(!u.is_dirty());
    }

    #[test]
    fn apply_uploads_the_whole_buffer_and_clears_dirty() {
        let mut driver = MockDriver::new();
        let mut u = Uniform::new("offsets".into(), UniformKind::IntVec2, 2, 4);
        u.set_ints(1, [9, 10, 0, 0]).unwrap();
        u.apply(&mut driver);
        assert!(!u.is_dirty());

        use crate::testing::Call;
        assert_eq!(
            driver.calls(),
            vec![Call::UploadInts {
                location: 4,
                arity: 2,
                count: 2,
                values: vec![0, 0, 9, 10],
            }]
        );
    }

    #[test]
    fn lookup_by_location_and_by_name() {
        let mut table = UniformTable {
            records: vec![
                Uniform::new("scale".into(), UniformKind::Float, 1, 0),
                Uniform::new("tex".into(), UniformKind::Unsupported, 1, -1),
            ],
        };
        assert!(table.find_mut(UniformIdent::Name("scale")).is_some());
        assert!(table.find_mut(UniformIdent::Location(0)).is_some());
        assert!(table.find_mut(UniformIdent::Name("missing")).is_none());
        // a record the driver gave no location must not answer to an address
        assert!(
            table
                .find_mut(UniformIdent::Location(u32::MAX))
                .is_none()
        );
    }

    #[test]
    fn introspection_truncates_array_subscripts() {
        let mut driver = MockDriver::new();
        driver.stage_uniforms(vec![ActiveUniform {
            name: "lights[0]".into(),
            len: 4,
            type_code: uniform_type::FLOAT_VEC3,
        }]);
        let program = driver.compile_compute_program("void main() {}").unwrap();
        let mut table = UniformTable::introspect(&mut driver, program);

        let record = table.find_mut(UniformIdent::Name("lights")).unwrap();
        assert_eq!(record.name(), "lights");
        assert_eq!(record.kind, UniformKind::FloatVec3);
        assert_eq!(record.len, 4);
    }

    #[test]
    fn flush_skips_clean_records() {
        let mut driver = MockDriver::new();
        let mut table = UniformTable {
            records: vec![
                Uniform::new("a".into(), UniformKind::Float, 1, 0),
                Uniform::new("b".into(), UniformKind::Int, 1, 1),
            ],
        };
        table.flush(&mut driver);
        assert_eq!(driver.calls().len(), 2);

        driver.clear_calls();
        table.flush(&mut driver);
        assert!(driver.calls().is_empty());

        table
            .find_mut(UniformIdent::Name("b"))
            .unwrap()
            .set_ints(0, [3, 0, 0, 0])
            .unwrap();
        table.flush(&mut driver);
        assert_eq!(driver.calls().len(), 1);
    }
}
