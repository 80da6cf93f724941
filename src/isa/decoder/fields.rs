//! Canonical field table shared by every format of a description.
//!
//! Same-named fields across formats must agree on size, position and signedness; each distinct
//! name receives a dense id starting at 1.

use ahash::AHashMap;

use crate::isa::diagnostic::{BuildDiagnostic, DiagnosticPhase};
use crate::isa::error::DecoderError;
use crate::isa::model::{Field, FieldId, Format};

#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    fields: Vec<Field>,
    origins: Vec<String>,
    by_name: AHashMap<String, FieldId>,
}

impl FieldTable {
    /// Scans `formats` in order, assigning unified ids to every field (written back into the
    /// formats) and collecting every layout conflict before failing.
    pub fn unify(formats: &mut [Format]) -> Result<Self, DecoderError> {
        let mut table = FieldTable::default();
        let mut diagnostics = Vec::new();
        for format in formats.iter_mut() {
            for field in format.fields.iter_mut() {
                let id = match table.by_name.get(&field.name).copied() {
                    Some(id) => {
                        let canonical = &table.fields[id.index()];
                        let origin = &table.origins[id.index()];
                        diagnostics.extend(layout_conflicts(canonical, origin, field, &format.name));
                        id
                    }
                    None => table.insert(field, &format.name),
                };
                field.id = Some(id);
            }
        }
        if diagnostics.is_empty() {
            Ok(table)
        } else {
            Err(DecoderError::Diagnostics {
                phase: DiagnosticPhase::Unification,
                diagnostics,
            })
        }
    }

    fn insert(&mut self, field: &Field, origin: &str) -> FieldId {
        let id = FieldId::from_index(self.fields.len());
        let mut canonical = field.clone();
        canonical.id = Some(id);
        self.fields.push(canonical);
        self.origins.push(origin.to_string());
        self.by_name.insert(field.name.clone(), id);
        id
    }

    /// Number of canonical fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Size of a decode result: one slot per field plus the instruction slot.
    pub fn slot_count(&self) -> usize {
        self.fields.len() + 1
    }

    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.index())
    }

    pub fn lookup(&self, name: &str) -> Option<&Field> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn id_of(&self, name: &str) -> Option<FieldId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Assigns unified ids onto a caller-held projection of fields (for instance the fields
    /// common to every format), validating each against its canonical entry.
    pub fn backfill(&self, fields: &mut [Field]) -> Result<(), DecoderError> {
        let mut diagnostics = Vec::new();
        for field in fields.iter_mut() {
            let Some(id) = self.id_of(&field.name) else {
                diagnostics.push(BuildDiagnostic::error(
                    DiagnosticPhase::Unification,
                    "unify.unknown-field",
                    format!("field '{}' does not appear in any format", field.name),
                    field.name.clone(),
                ));
                continue;
            };
            let index = id.index();
            diagnostics.extend(layout_conflicts(
                &self.fields[index],
                &self.origins[index],
                field,
                "<projection>",
            ));
            field.id = Some(id);
        }
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(DecoderError::Diagnostics {
                phase: DiagnosticPhase::Unification,
                diagnostics,
            })
        }
    }
}

fn layout_conflicts(
    canonical: &Field,
    origin: &str,
    field: &Field,
    format: &str,
) -> Vec<BuildDiagnostic> {
    let mut found = Vec::new();
    let name = &field.name;
    if canonical.size != field.size {
        found.push(BuildDiagnostic::error(
            DiagnosticPhase::Unification,
            "unify.size-mismatch",
            format!(
                "field '{name}' is {} bits in format '{origin}' but {} bits in format '{format}'",
                canonical.size, field.size
            ),
            name.clone(),
        ));
    }
    if canonical.first_bit != field.first_bit {
        found.push(BuildDiagnostic::error(
            DiagnosticPhase::Unification,
            "unify.position-mismatch",
            format!(
                "field '{name}' starts at bit {} in format '{origin}' but at bit {} in format '{format}'",
                canonical.first_bit, field.first_bit
            ),
            name.clone(),
        ));
    }
    if canonical.is_signed() != field.is_signed() {
        found.push(BuildDiagnostic::error(
            DiagnosticPhase::Unification,
            "unify.sign-mismatch",
            format!("field '{name}' signedness differs between formats '{origin}' and '{format}'"),
            name.clone(),
        ));
    }
    found
}
