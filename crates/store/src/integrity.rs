use std::collections::HashMap;
use std::fmt;

use sea_orm::ConnectionTrait;
use sea_orm::sea_query::Order as SortOrder;

use gitspace_core::{PathTarget, PathTargetType, StoreResult, paths};

use crate::db::Paths;
use crate::path::{PathStore, path_from_row, select_paths};
use crate::sql::query_all;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// A target with paths must have exactly one primary.
    PrimaryCount { target: PathTarget, primaries: usize },
    /// A nested primary whose parent value is not the primary path of a space.
    DanglingParent { value: String, parent: String },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::PrimaryCount { target, primaries } => {
                write!(f, "{target} has {primaries} primary paths")
            }
            IntegrityViolation::DanglingParent { value, parent } => {
                write!(f, "'{value}' sits below '{parent}', which is not a space's primary path")
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IntegrityReport {
    pub paths_scanned: usize,
    pub targets_scanned: usize,
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.violations.is_empty()
    }
}

impl PathStore<'_> {
    /// Scans the whole path table.
    pub async fn integrity_report<C: ConnectionTrait>(&self, conn: &C) -> StoreResult<IntegrityReport> {
        let select = select_paths()
            .order_by(Paths::PathValue, SortOrder::Asc)
            .to_owned();
        let rows = query_all(conn, &select).await?;
        let mut all = Vec::with_capacity(rows.len());
        for row in &rows {
            all.push(path_from_row(row)?);
        }

        let mut primaries: HashMap<PathTarget, usize> = HashMap::new();
        // value_unique -> (is_alias, kind)
        let mut by_unique: HashMap<&str, (bool, PathTargetType)> = HashMap::new();
        for path in &all {
            let count = primaries.entry(path.target()).or_default();
            if !path.is_alias {
                *count += 1;
            }
            by_unique.insert(path.value_unique.as_str(), (path.is_alias, path.target_type));
        }

        let mut report = IntegrityReport {
            paths_scanned: all.len(),
            targets_scanned: primaries.len(),
            violations: Vec::new(),
        };
        let mut counts: Vec<_> = primaries.into_iter().filter(|(_, n)| *n != 1).collect();
        counts.sort_by_key(|(target, _)| (target.kind.as_str(), target.id));
        report.violations.extend(
            counts
                .into_iter()
                .map(|(target, primaries)| IntegrityViolation::PrimaryCount { target, primaries }),
        );

        for path in all.iter().filter(|path| !path.is_alias) {
            let Some(parent) = paths::parent(&path.value) else {
                continue;
            };
            let parent_unique = self.transform(parent)?;
            let resolves = matches!(
                by_unique.get(parent_unique.as_str()),
                Some((false, PathTargetType::Space))
            );
            if !resolves {
                report.violations.push(IntegrityViolation::DanglingParent {
                    value: path.value.clone(),
                    parent: parent.to_string(),
                });
            }
        }
        Ok(report)
    }
}
