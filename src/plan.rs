use crate::schema::ColumnSet;
use crate::value::ValueKind;

/// How one target column gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Copied from the source column at this ordinal.
    Bound { source_ordinal: usize },
    /// No source column; filled with a default of the declared kind.
    Unbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub column: String,
    pub binding: Binding,
    /// Declared kind of the target column, `None` when the driver's type name is not classifiable.
    pub kind: Option<ValueKind>,
}

/// One entry per target column, in target order. The insert statement and the
/// per-row value list are both built from this and must agree positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPlan {
    entries: Vec<PlanEntry>,
}

impl ColumnPlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.column.as_str())
    }

    #[cfg(test)]
    pub fn unbound_columns(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.binding == Binding::Unbound)
            .map(|e| e.column.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub plan: ColumnPlan,
    /// Source columns with no counterpart in the target; their data is dropped.
    pub missing: Vec<String>,
}

pub fn reconcile(source: &ColumnSet, target: &ColumnSet) -> Reconciliation {
    let entries = target
        .iter()
        .map(|column| {
            let binding = match source.position(&column.name) {
                Some(source_ordinal) => Binding::Bound { source_ordinal },
                None => Binding::Unbound,
            };
            PlanEntry {
                column: column.name.clone(),
                binding,
                kind: column.kind(),
            }
        })
        .collect();

    let missing = source
        .iter()
        .filter(|c| !target.contains(&c.name))
        .map(|c| c.name.clone())
        .collect();

    Reconciliation {
        plan: ColumnPlan { entries },
        missing,
    }
}
