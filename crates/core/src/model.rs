use std::fmt;

use serde::{Deserialize, Serialize};

use crate::optimistic::{Sequenced, Versioned};
use crate::{Id, PathId, PipelineId, PrincipalId, RepoId, SpaceId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathTargetType {
    Space,
    #[serde(rename = "repo")]
    Repository,
}

impl PathTargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            PathTargetType::Space => "space",
            PathTargetType::Repository => "repo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "space" => Some(PathTargetType::Space),
            "repo" => Some(PathTargetType::Repository),
            _ => None,
        }
    }
}

impl fmt::Display for PathTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity a path row names.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PathTarget {
    pub kind: PathTargetType,
    pub id: Id,
}

impl PathTarget {
    pub fn space(id: SpaceId) -> Self {
        Self {
            kind: PathTargetType::Space,
            id: id.0,
        }
    }

    pub fn repo(id: RepoId) -> Self {
        Self {
            kind: PathTargetType::Repository,
            id: id.0,
        }
    }
}

impl fmt::Display for PathTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub id: PathId,
    pub target_type: PathTargetType,
    pub target_id: Id,
    pub is_alias: bool,
    pub value: String,
    pub value_unique: String,
    pub created_by: PrincipalId,
    pub created: i64,
    pub updated: i64,
}

impl Path {
    pub fn target(&self) -> PathTarget {
        PathTarget {
            kind: self.target_type,
            id: self.target_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub parent_id: Option<SpaceId>,
    pub uid: String,
    pub path: String,
    pub description: String,
    pub is_public: bool,
    pub created_by: PrincipalId,
    pub created: i64,
    pub updated: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSpaceInput {
    pub parent_id: Option<SpaceId>,
    pub uid: String,
    pub description: String,
    pub is_public: bool,
    pub created_by: PrincipalId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    pub parent_id: SpaceId,
    pub uid: String,
    pub path: String,
    pub description: String,
    pub is_public: bool,
    pub created_by: PrincipalId,
    pub created: i64,
    pub updated: i64,
    pub git_uid: String,
    pub default_branch: String,
    pub fork_id: Option<RepoId>,
    pub num_forks: i64,
    pub num_pulls: i64,
    pub num_closed_pulls: i64,
    pub num_open_pulls: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRepoInput {
    pub parent_id: SpaceId,
    pub uid: String,
    pub description: String,
    pub is_public: bool,
    pub created_by: PrincipalId,
    pub git_uid: String,
    pub default_branch: String,
    pub fork_id: Option<RepoId>,
}

/// Relocation request shared by spaces and repositories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    pub actor: PrincipalId,
    /// `None` moves a space to the namespace root and keeps a repository in its current space.
    pub new_parent_id: Option<SpaceId>,
    pub new_uid: String,
    pub keep_as_alias: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub description: String,
    pub space_id: SpaceId,
    pub uid: String,
    pub seq: i64,
    pub repo_id: Option<RepoId>,
    pub repo_type: String,
    pub repo_name: String,
    pub default_branch: String,
    pub config_path: String,
    pub created: i64,
    pub updated: i64,
    pub version: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePipelineInput {
    pub space_id: SpaceId,
    pub uid: String,
    pub description: String,
    pub repo_id: Option<RepoId>,
    pub repo_type: String,
    pub repo_name: String,
    pub default_branch: String,
    pub config_path: String,
}

impl Versioned for Pipeline {
    type Key = PipelineId;

    fn key(&self) -> PipelineId {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn mark_committed(&mut self, version: i64, updated: i64) {
        self.version = version;
        self.updated = updated;
    }
}

impl Sequenced for Pipeline {
    fn seq(&self) -> i64 {
        self.seq
    }

    fn set_seq(&mut self, seq: i64) {
        self.seq = seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_type_roundtrips_storage_tags() {
        for kind in [PathTargetType::Space, PathTargetType::Repository] {
            assert_eq!(PathTargetType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PathTargetType::parse("pipeline"), None);
        assert_eq!(
            serde_json::to_string(&PathTargetType::Repository).unwrap(),
            "\"repo\""
        );
    }

    #[test]
    fn targets_carry_kind_and_id() {
        let repo = RepoId::new();
        let target = PathTarget::repo(repo);
        assert_eq!(target.kind, PathTargetType::Repository);
        assert_eq!(target.id, repo.0);
        assert!(target.to_string().starts_with("repo "));
    }
}
