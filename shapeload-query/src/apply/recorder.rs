//! A query that records the directives it receives.

use smol_str::SmolStr;

use super::{Directive, LoadQuery};
use crate::error::DirectiveError;
use crate::plan::RelationPath;
use shapeload_schema::{Cardinality, RelationLoadStrategy, UnplannedAccess};

/// Records every directive in application order.
///
/// Useful to inspect what a plan installs, and as the reference for
/// comparing two applications of the same plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveRecorder {
    directives: Vec<(RelationPath, Directive)>,
}

impl DirectiveRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded directives.
    pub fn directives(&self) -> &[(RelationPath, Directive)] {
        &self.directives
    }

    /// Directives recorded at one path.
    pub fn at<'a>(&'a self, path: &'a RelationPath) -> impl Iterator<Item = &'a Directive> + 'a {
        self.directives
            .iter()
            .filter(move |(p, _)| p == path)
            .map(|(_, d)| d)
    }

    /// Paths that were requested eagerly, in order.
    pub fn eager_paths(&self) -> Vec<&RelationPath> {
        self.directives
            .iter()
            .filter(|(_, d)| matches!(d, Directive::EagerLoad { .. }))
            .map(|(p, _)| p)
            .collect()
    }

    /// One line per directive, `path: directive`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, directive) in &self.directives {
            out.push_str(&format!("{}: {}\n", path, directive));
        }
        out
    }

    /// Number of recorded directives.
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl LoadQuery for DirectiveRecorder {
    fn load_only(&mut self, path: &RelationPath, columns: &[SmolStr]) -> Result<(), DirectiveError> {
        self.directives.push((
            path.clone(),
            Directive::LoadOnly {
                columns: columns.to_vec(),
            },
        ));
        Ok(())
    }

    fn eager_load(
        &mut self,
        path: &RelationPath,
        cardinality: Cardinality,
        strategy: RelationLoadStrategy,
    ) -> Result<(), DirectiveError> {
        if path.is_root() {
            return Err(DirectiveError::UnknownPath {
                path: path.to_string(),
            });
        }
        self.directives.push((
            path.clone(),
            Directive::EagerLoad {
                cardinality,
                strategy,
            },
        ));
        Ok(())
    }

    fn forbid_unplanned(
        &mut self,
        path: &RelationPath,
        policy: UnplannedAccess,
    ) -> Result<(), DirectiveError> {
        self.directives
            .push((path.clone(), Directive::ForbidUnplanned { policy }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut recorder = DirectiveRecorder::new();
        let images = RelationPath::parse("images");
        recorder
            .eager_load(&images, Cardinality::Many, RelationLoadStrategy::Separate)
            .unwrap();
        recorder.load_only(&images, &["id".into()]).unwrap();

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.eager_paths(), vec![&images]);
        assert_eq!(recorder.at(&images).count(), 2);
        assert_eq!(
            recorder.render(),
            "images: eager_load(many, separate)\nimages: load_only(id)\n"
        );
    }

    #[test]
    fn test_root_cannot_be_eager() {
        let mut recorder = DirectiveRecorder::new();
        let err = recorder
            .eager_load(&RelationPath::root(), Cardinality::One, RelationLoadStrategy::Join)
            .unwrap_err();
        assert_eq!(err, DirectiveError::UnknownPath { path: "<root>".into() });
        assert!(recorder.is_empty());
    }
}
